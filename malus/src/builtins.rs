use crate::{
    env::{Env, EnvRef},
    eval::{self, EvalError},
    expr::{ExprError, Expression, Map, MapKey, Proc},
    prelude::*,
};
use std::rc::Rc;
use thiserror::Error;

/// Error representing runtime stdlib exceptions.
#[derive(Error, Debug)]
#[error("{name}: {msg}")]
pub struct StdErr {
    name: &'static str,
    msg: String,
}

impl StdErr {
    pub fn new(name: &'static str, msg: impl Into<String>) -> Self {
        Self {
            name,
            msg: msg.into(),
        }
    }
}

type BResult = Result<Expression, EvalError>;

/// Checks that exactly `N` arguments were passed.
fn arity<const N: usize>(args: &[Expression]) -> Result<&[Expression; N], EvalError> {
    args.try_into().map_err(|_| EvalError::WrongArgCount {
        required: N,
        passed: args.len(),
    })
}

fn at_least(required: usize, args: &[Expression]) -> Result<(), EvalError> {
    if args.len() < required {
        return Err(EvalError::WrongArgCount {
            required,
            passed: args.len(),
        });
    }
    Ok(())
}

/// one-argument type predicates
macro_rules! predicate {
    ($fn_name:ident, $pred:expr) => {
        pub fn $fn_name(args: &[Expression], _env: EnvRef) -> BResult {
            let pred: fn(&Expression) -> bool = $pred;
            let [arg] = arity::<1>(args)?;
            Ok(Expression::Bool(pred(arg)))
        }
    };
}

/// NOTE: math ops do NOT short-circuit, every argument is checked to be a number first
pub mod math {
    use super::*;
    use ordered_float::OrderedFloat;
    use std::{cmp::Ordering, ops};
    use variantly::Variantly;

    type Float = OrderedFloat<f64>;

    #[derive(Variantly, Debug, Copy, Clone, Eq)]
    pub enum Number {
        Integer(i64),
        Float(Float),
    }

    impl Number {
        #[inline]
        fn upcast(self) -> Float {
            match self {
                Self::Integer(i) => OrderedFloat(i as f64),
                Self::Float(f) => f,
            }
        }

        /// integer op when both sides are integers (`None` on overflow), float op otherwise
        #[inline]
        fn op(
            self,
            rhs: Self,
            op_i: fn(i64, i64) -> Option<i64>,
            op_f: fn(Float, Float) -> Float,
        ) -> Option<Self> {
            if let (Self::Integer(lhs), Self::Integer(rhs)) = (self, rhs) {
                return op_i(lhs, rhs).map(Self::Integer);
            }
            Some(Self::Float(op_f(self.upcast(), rhs.upcast())))
        }
    }

    impl PartialEq for Number {
        fn eq(&self, other: &Self) -> bool {
            self.cmp(other) == Ordering::Equal
        }
    }

    impl Ord for Number {
        fn cmp(&self, other: &Self) -> Ordering {
            if let (Self::Integer(lhs), Self::Integer(rhs)) = (self, other) {
                return lhs.cmp(rhs);
            }
            self.upcast().cmp(&other.upcast())
        }
    }

    impl PartialOrd for Number {
        fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
            Some(self.cmp(other))
        }
    }

    impl TryFrom<&Expression> for Number {
        type Error = ExprError;

        fn try_from(value: &Expression) -> Result<Self, Self::Error> {
            match value {
                Expression::Integer(i) => Ok(Self::Integer(*i)),
                Expression::Float(f) => Ok(Self::Float(*f)),
                _ => Err(ExprError::NotANum),
            }
        }
    }

    impl From<Number> for Expression {
        fn from(value: Number) -> Self {
            match value {
                Number::Integer(i) => Expression::Integer(i),
                Number::Float(f) => Expression::Float(f),
            }
        }
    }

    fn numbers(args: &[Expression]) -> Result<Vec<Number>, EvalError> {
        args.iter()
            .map(|a| Number::try_from(a).map_err(EvalError::from))
            .collect()
    }

    /// Folds `nums` into `init`, failing on integer overflow.
    fn fold(
        name: &'static str,
        init: Number,
        nums: &[Number],
        op_i: fn(i64, i64) -> Option<i64>,
        op_f: fn(Float, Float) -> Float,
    ) -> BResult {
        nums.iter()
            .try_fold(init, |acc, n| acc.op(*n, op_i, op_f))
            .map(Expression::from)
            .ok_or_else(|| StdErr::new(name, "integer overflow").into())
    }

    pub fn add(args: &[Expression], _env: EnvRef) -> BResult {
        fold("+", Number::Integer(0), &numbers(args)?, i64::checked_add, ops::Add::add)
    }

    pub fn mul(args: &[Expression], _env: EnvRef) -> BResult {
        fold("*", Number::Integer(1), &numbers(args)?, i64::checked_mul, ops::Mul::mul)
    }

    pub fn sub(args: &[Expression], _env: EnvRef) -> BResult {
        match numbers(args)?.as_slice() {
            [] => Ok(Expression::int(0)),
            [only] => fold("-", Number::Integer(0), &[*only], i64::checked_sub, ops::Sub::sub),
            [first, rest @ ..] => fold("-", *first, rest, i64::checked_sub, ops::Sub::sub),
        }
    }

    pub fn div(args: &[Expression], _env: EnvRef) -> BResult {
        let nums = numbers(args)?;
        let (init, divisors) = match nums.as_slice() {
            [] => return Ok(Expression::int(1)),
            [only] => (Number::Integer(1), std::slice::from_ref(only)),
            [first, rest @ ..] => (*first, rest),
        };
        divisors
            .iter()
            .try_fold(init, |acc, d| match (acc, d) {
                (Number::Integer(_), Number::Integer(0)) => {
                    Err(StdErr::new("/", "division by zero"))
                }
                _ => acc
                    .op(*d, i64::checked_div, ops::Div::div)
                    .ok_or_else(|| StdErr::new("/", "integer overflow")),
            })
            .map(Expression::from)
            .map_err(EvalError::from)
    }

    /// `true` if `cmp` holds for every adjacent pair of arguments.
    fn compare(args: &[Expression], cmp: fn(&Number, &Number) -> bool) -> BResult {
        let nums = numbers(args)?;
        Ok(Expression::Bool(
            nums.iter().tuple_windows().all(|(a, b)| cmp(a, b)),
        ))
    }

    pub fn lt(args: &[Expression], _env: EnvRef) -> BResult {
        compare(args, PartialOrd::lt)
    }

    pub fn le(args: &[Expression], _env: EnvRef) -> BResult {
        compare(args, PartialOrd::le)
    }

    pub fn gt(args: &[Expression], _env: EnvRef) -> BResult {
        compare(args, PartialOrd::gt)
    }

    pub fn ge(args: &[Expression], _env: EnvRef) -> BResult {
        compare(args, PartialOrd::ge)
    }

    /// General value equality, not limited to numbers.
    pub fn eq(args: &[Expression], _env: EnvRef) -> BResult {
        Ok(Expression::Bool(
            args.iter().tuple_windows().all(|(a, b)| a == b),
        ))
    }
}

pub mod seq {
    use super::*;

    pub fn list(args: &[Expression], _env: EnvRef) -> BResult {
        Ok(Expression::List(args.to_vec()))
    }

    predicate!(is_list, Expression::is_list);

    pub fn vector(args: &[Expression], _env: EnvRef) -> BResult {
        Ok(Expression::Vector(args.to_vec()))
    }

    predicate!(is_vector, Expression::is_vector);

    predicate!(is_sequential, |e| e.is_list() || e.is_vector());

    pub fn is_empty(args: &[Expression], _env: EnvRef) -> BResult {
        let [seq] = arity::<1>(args)?;
        Ok(Expression::Bool(seq.as_seq()?.is_empty()))
    }

    pub fn count(args: &[Expression], _env: EnvRef) -> BResult {
        let [seq] = arity::<1>(args)?;
        Ok(Expression::int(seq.as_seq()?.len() as i64))
    }

    pub fn cons(args: &[Expression], _env: EnvRef) -> BResult {
        let [head, tail] = arity::<2>(args)?;
        let tail = tail.as_seq()?;
        Ok(Expression::List(
            vec![head.clone()].tap_mut(|l| l.extend_from_slice(tail)),
        ))
    }

    pub fn concat(args: &[Expression], _env: EnvRef) -> BResult {
        let mut out = vec![];
        for seq in args {
            out.extend_from_slice(seq.as_seq()?);
        }
        Ok(Expression::List(out))
    }

    pub fn nth(args: &[Expression], _env: EnvRef) -> BResult {
        let [seq, idx] = arity::<2>(args)?;
        let items = seq.as_seq()?;
        let idx = i64::try_from(idx)?;
        usize::try_from(idx)
            .ok()
            .and_then(|i| items.get(i))
            .cloned()
            .ok_or_else(|| StdErr::new("nth", format!("index {idx} out of range")).into())
    }

    pub fn first(args: &[Expression], _env: EnvRef) -> BResult {
        let [seq] = arity::<1>(args)?;
        Ok(seq.as_seq()?.first().cloned().unwrap_or(Expression::Nil))
    }

    pub fn rest(args: &[Expression], _env: EnvRef) -> BResult {
        let [seq] = arity::<1>(args)?;
        Ok(Expression::List(
            seq.as_seq()?.iter().skip(1).cloned().collect(),
        ))
    }

    /// Appends to a vector, prepends (one by one) to a list.
    pub fn conj(args: &[Expression], _env: EnvRef) -> BResult {
        at_least(1, args)?;
        let (coll, items) = (&args[0], &args[1..]);
        match coll {
            Expression::Vector(v) => Ok(Expression::Vector(
                v.clone().tap_mut(|v| v.extend_from_slice(items)),
            )),
            Expression::List(_) | Expression::Nil => Ok(Expression::List(
                items.iter().rev().chain(coll.as_seq()?).cloned().collect(),
            )),
            _ => Err(ExprError::NotASeq.into()),
        }
    }

    pub fn map(args: &[Expression], env: EnvRef) -> BResult {
        let [f, seq] = arity::<2>(args)?;
        seq.as_seq()?
            .iter()
            .map(|item| eval::apply(f, std::slice::from_ref(item), env.clone()))
            .collect::<Result<_, _>>()
            .map(Expression::List)
    }

    /// `(apply f a b [c d])` calls `f` with `a b c d`.
    pub fn apply(args: &[Expression], env: EnvRef) -> BResult {
        let [f, middle @ .., last] = args else {
            return Err(EvalError::WrongArgCount {
                required: 2,
                passed: args.len(),
            });
        };
        let call_args = middle
            .iter()
            .chain(last.as_seq()?)
            .cloned()
            .collect_vec();
        eval::apply(f, &call_args, env)
    }
}

pub mod hash {
    use super::*;

    fn insert_pairs(
        map: &mut Map,
        name: &'static str,
        kvs: &[Expression],
    ) -> Result<(), EvalError> {
        if kvs.len() % 2 != 0 {
            return Err(StdErr::new(name, "odd number of key/value arguments").into());
        }
        for (key, val) in kvs.iter().tuples() {
            map.insert(MapKey::try_from(key)?, val.clone());
        }
        Ok(())
    }

    pub fn hash_map(args: &[Expression], _env: EnvRef) -> BResult {
        let mut map = Map::new();
        insert_pairs(&mut map, "hash-map", args)?;
        Ok(Expression::HashMap(map))
    }

    predicate!(is_map, |e| matches!(e, Expression::HashMap(_)));

    pub fn assoc(args: &[Expression], _env: EnvRef) -> BResult {
        at_least(1, args)?;
        let mut map = args[0].as_map()?.clone();
        insert_pairs(&mut map, "assoc", &args[1..])?;
        Ok(Expression::HashMap(map))
    }

    pub fn dissoc(args: &[Expression], _env: EnvRef) -> BResult {
        at_least(1, args)?;
        let mut map = args[0].as_map()?.clone();
        for key in &args[1..] {
            map.shift_remove(&MapKey::try_from(key)?);
        }
        Ok(Expression::HashMap(map))
    }

    /// `get` on `nil` yields `nil`.
    pub fn get(args: &[Expression], _env: EnvRef) -> BResult {
        let [map, key] = arity::<2>(args)?;
        if map.is_nil() {
            return Ok(Expression::Nil);
        }
        Ok(map
            .as_map()?
            .get(&MapKey::try_from(key)?)
            .cloned()
            .unwrap_or(Expression::Nil))
    }

    pub fn contains(args: &[Expression], _env: EnvRef) -> BResult {
        let [map, key] = arity::<2>(args)?;
        Ok(Expression::Bool(
            map.as_map()?.contains_key(&MapKey::try_from(key)?),
        ))
    }

    pub fn keys(args: &[Expression], _env: EnvRef) -> BResult {
        let [map] = arity::<1>(args)?;
        Ok(Expression::List(
            map.as_map()?.keys().cloned().map(Expression::from).collect(),
        ))
    }

    pub fn vals(args: &[Expression], _env: EnvRef) -> BResult {
        let [map] = arity::<1>(args)?;
        Ok(Expression::List(map.as_map()?.values().cloned().collect()))
    }
}

pub mod atom {
    use super::*;

    pub fn atom(args: &[Expression], _env: EnvRef) -> BResult {
        let [val] = arity::<1>(args)?;
        Ok(Expression::new_atom(val.clone()))
    }

    predicate!(is_atom, Expression::is_atom);

    pub fn deref(args: &[Expression], _env: EnvRef) -> BResult {
        let [atom] = arity::<1>(args)?;
        Ok(atom.as_atom()?.borrow().clone())
    }

    pub fn reset(args: &[Expression], _env: EnvRef) -> BResult {
        let [atom, val] = arity::<2>(args)?;
        atom.as_atom()?.replace(val.clone());
        Ok(val.clone())
    }

    /// `(swap! a f x y)` sets `a` to `(f @a x y)`.
    pub fn swap(args: &[Expression], env: EnvRef) -> BResult {
        at_least(2, args)?;
        let (cell, f, extra) = (args[0].as_atom()?, &args[1], &args[2..]);
        // the borrow must end before `f` runs, it may deref the same atom
        let current = cell.borrow().clone();
        let call_args = std::iter::once(current)
            .chain(extra.iter().cloned())
            .collect_vec();
        let val = eval::apply(f, &call_args, env)?;
        cell.replace(val.clone());
        Ok(val)
    }
}

pub mod io {
    use super::*;
    use crate::{parser, printer::pr_str};
    use std::fs;

    fn join(args: &[Expression], readable: bool, sep: &str) -> String {
        args.iter().map(|a| pr_str(a, readable)).join(sep)
    }

    pub fn pr_string(args: &[Expression], _env: EnvRef) -> BResult {
        Ok(Expression::String(join(args, true, " ")))
    }

    pub fn str(args: &[Expression], _env: EnvRef) -> BResult {
        Ok(Expression::String(join(args, false, "")))
    }

    pub fn prn(args: &[Expression], _env: EnvRef) -> BResult {
        println!("{}", join(args, true, " "));
        Ok(Expression::Nil)
    }

    pub fn println(args: &[Expression], _env: EnvRef) -> BResult {
        println!("{}", join(args, false, " "));
        Ok(Expression::Nil)
    }

    pub fn read_string(args: &[Expression], _env: EnvRef) -> BResult {
        let [source] = arity::<1>(args)?;
        let source = source.string_ref_or(ExprError::NotAString)?;
        Ok(parser::read_str(source)?.unwrap_or(Expression::Nil))
    }

    pub fn slurp(args: &[Expression], _env: EnvRef) -> BResult {
        let [path] = arity::<1>(args)?;
        let path = path.string_ref_or(ExprError::NotAString)?;
        Ok(Expression::String(fs::read_to_string(path)?))
    }
}

pub mod core {
    use super::*;

    /// Evaluates its argument in the root scope, whatever scope it is called from.
    pub fn eval(args: &[Expression], env: EnvRef) -> BResult {
        let [ast] = arity::<1>(args)?;
        eval::eval(ast, Env::root(&env))
    }

    pub fn throw(args: &[Expression], _env: EnvRef) -> BResult {
        let [val] = arity::<1>(args)?;
        Err(EvalError::Thrown(val.clone()))
    }

    pub fn symbol(args: &[Expression], _env: EnvRef) -> BResult {
        let [name] = arity::<1>(args)?;
        Ok(Expression::sym(name.string_ref_or(ExprError::NotAString)?))
    }

    predicate!(is_symbol, Expression::is_symbol);

    pub fn keyword(args: &[Expression], _env: EnvRef) -> BResult {
        let [name] = arity::<1>(args)?;
        match name {
            Expression::Keyword(_) => Ok(name.clone()),
            Expression::String(s) => Ok(Expression::kw(s)),
            _ => Err(ExprError::NotAKey.into()),
        }
    }

    predicate!(is_keyword, Expression::is_keyword);

    predicate!(is_nil, Expression::is_nil);

    predicate!(is_true, |e| matches!(e, Expression::Bool(true)));

    predicate!(is_false, |e| matches!(e, Expression::Bool(false)));

    predicate!(is_string, Expression::is_string);

    predicate!(is_number, |e| e.is_integer() || e.is_float());

    predicate!(is_fn, |e| match e {
        Expression::Proc(_) => true,
        Expression::Lambda(f) => !f.is_macro,
        _ => false,
    });

    predicate!(is_macro, |e| matches!(e, Expression::Lambda(f) if f.is_macro));

    /// Metadata of an interpreted function, `nil` for anything else.
    pub fn meta(args: &[Expression], _env: EnvRef) -> BResult {
        let [val] = arity::<1>(args)?;
        Ok(match val {
            Expression::Lambda(f) => f.meta.clone(),
            _ => Expression::Nil,
        })
    }

    /// Returns a copy of the function carrying `meta`, the original is untouched.
    pub fn with_meta(args: &[Expression], _env: EnvRef) -> BResult {
        let [val, meta] = arity::<2>(args)?;
        match val {
            Expression::Lambda(f) => Ok(Expression::Lambda(Rc::new(f.with_meta(meta.clone())))),
            _ => Err(StdErr::new("with-meta", "metadata is only supported on functions").into()),
        }
    }
}

/// Every builtin, keyed by the symbol it is bound to.
pub fn namespace() -> Vec<Proc> {
    vec![
        Proc::new("+", math::add),
        Proc::new("-", math::sub),
        Proc::new("*", math::mul),
        Proc::new("/", math::div),
        Proc::new("<", math::lt),
        Proc::new("<=", math::le),
        Proc::new(">", math::gt),
        Proc::new(">=", math::ge),
        Proc::new("=", math::eq),
        Proc::new("list", seq::list),
        Proc::new("list?", seq::is_list),
        Proc::new("vector", seq::vector),
        Proc::new("vector?", seq::is_vector),
        Proc::new("sequential?", seq::is_sequential),
        Proc::new("empty?", seq::is_empty),
        Proc::new("count", seq::count),
        Proc::new("cons", seq::cons),
        Proc::new("concat", seq::concat),
        Proc::new("nth", seq::nth),
        Proc::new("first", seq::first),
        Proc::new("rest", seq::rest),
        Proc::new("conj", seq::conj),
        Proc::new("map", seq::map),
        Proc::new("apply", seq::apply),
        Proc::new("hash-map", hash::hash_map),
        Proc::new("map?", hash::is_map),
        Proc::new("assoc", hash::assoc),
        Proc::new("dissoc", hash::dissoc),
        Proc::new("get", hash::get),
        Proc::new("contains?", hash::contains),
        Proc::new("keys", hash::keys),
        Proc::new("vals", hash::vals),
        Proc::new("atom", atom::atom),
        Proc::new("atom?", atom::is_atom),
        Proc::new("deref", atom::deref),
        Proc::new("reset!", atom::reset),
        Proc::new("swap!", atom::swap),
        Proc::new("pr-str", io::pr_string),
        Proc::new("str", io::str),
        Proc::new("prn", io::prn),
        Proc::new("println", io::println),
        Proc::new("read-string", io::read_string),
        Proc::new("slurp", io::slurp),
        Proc::new("eval", core::eval),
        Proc::new("throw", core::throw),
        Proc::new("symbol", core::symbol),
        Proc::new("symbol?", core::is_symbol),
        Proc::new("keyword", core::keyword),
        Proc::new("keyword?", core::is_keyword),
        Proc::new("nil?", core::is_nil),
        Proc::new("true?", core::is_true),
        Proc::new("false?", core::is_false),
        Proc::new("string?", core::is_string),
        Proc::new("number?", core::is_number),
        Proc::new("fn?", core::is_fn),
        Proc::new("macro?", core::is_macro),
        Proc::new("meta", core::meta),
        Proc::new("with-meta", core::with_meta),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{expr::list, parser};

    type Result<T = (), E = EvalError> = std::result::Result<T, E>;

    fn test_eval_expr(code: &str) -> Result<Expression> {
        let script = parser::parse_script(code)?;
        eval::eval_script(&script, Env::new_global_rc())
    }

    /// macro to setup test boilerplate for evaluating builtin calls
    macro_rules! builtin_test {
        ($fn_name:ident, $code:literal, $expected:expr) => {
            #[test]
            fn $fn_name() -> Result<()> {
                let result = test_eval_expr($code)?;
                assert_eq!(result, $expected);
                Ok(())
            }
        };
    }

    mod math {
        use super::*;

        builtin_test!(addition, "(+ 2 3)", Expression::int(5));

        builtin_test!(addition_default, "(+)", Expression::int(0));

        builtin_test!(addition_float, "(+ 1 0.5)", Expression::from_f64(1.5));

        builtin_test!(substraction, "(- 4 3)", Expression::int(1));

        builtin_test!(substraction_chain, "(- 10 3 2)", Expression::int(5));

        builtin_test!(substraction_one_arg, "(- 3)", Expression::int(-3));

        builtin_test!(substraction_default, "(-)", Expression::int(0));

        builtin_test!(multiplication_nested, "(* (+ 1 2) (+ 5 3))", Expression::int(24));

        builtin_test!(integer_division_truncates, "(/ 7 2)", Expression::int(3));

        builtin_test!(float_division, "(/ 3.0 2)", Expression::from_f64(1.5));

        builtin_test!(division_default, "(/)", Expression::int(1));

        builtin_test!(division_one_arg, "(/ 2.0)", Expression::from_f64(0.5));

        builtin_test!(float_division_by_zero, "(/ 1.0 0)", Expression::from_f64(f64::INFINITY));

        builtin_test!(less_chain, "(< 1 2 3)", Expression::Bool(true));

        builtin_test!(less_chain_broken, "(< 1 3 2)", Expression::Bool(false));

        builtin_test!(less_equal_mixed, "(<= 1 1.0 2)", Expression::Bool(true));

        builtin_test!(greater, "(> 3 2)", Expression::Bool(true));

        builtin_test!(greater_equal, "(>= 2 3)", Expression::Bool(false));

        builtin_test!(eq_sequences, "(= [1 2 3] (list 1 2 3))", Expression::Bool(true));

        builtin_test!(eq_maps, r#"(= {"a" 1} {"a" 1})"#, Expression::Bool(true));

        builtin_test!(eq_map_and_list, "(= {} ())", Expression::Bool(false));

        builtin_test!(eq_strings, r#"(= "a" "a" "b")"#, Expression::Bool(false));

        #[test]
        fn integer_division_by_zero() {
            let err = test_eval_expr("(/ 1 0)").unwrap_err();
            assert_eq!(err.to_string(), "/: division by zero");
        }

        #[test]
        fn overflow() {
            let err = test_eval_expr("(* 9223372036854775807 2)").unwrap_err();
            assert_eq!(err.to_string(), "*: integer overflow");
        }

        #[test]
        fn not_a_number() {
            let err = test_eval_expr(r#"(+ 1 "2")"#).unwrap_err();
            assert!(matches!(err, EvalError::ExprErr(ExprError::NotANum)));
        }
    }

    mod seq {
        use super::*;

        builtin_test!(
            list,
            "(list 1 2)",
            list![Expression::int(1), Expression::int(2)]
        );

        builtin_test!(is_list, "(list? (list))", Expression::Bool(true));

        builtin_test!(vector_is_not_list, "(list? [])", Expression::Bool(false));

        builtin_test!(is_vector, "(vector? (vector 1))", Expression::Bool(true));

        builtin_test!(is_sequential, "(sequential? [])", Expression::Bool(true));

        builtin_test!(empty, "(empty? [])", Expression::Bool(true));

        builtin_test!(count_nil, "(count nil)", Expression::int(0));

        builtin_test!(count, "(count [1 2 3])", Expression::int(3));

        builtin_test!(
            cons_onto_vector,
            "(cons 1 [2])",
            list![Expression::int(1), Expression::int(2)]
        );

        builtin_test!(
            concat,
            "(concat (list 1) [2] nil ())",
            list![Expression::int(1), Expression::int(2)]
        );

        builtin_test!(nth, "(nth [1 2 3] 2)", Expression::int(3));

        builtin_test!(first_of_nil, "(first nil)", Expression::Nil);

        builtin_test!(first_of_empty, "(first ())", Expression::Nil);

        builtin_test!(rest_of_nil, "(rest nil)", list![]);

        builtin_test!(rest, "(rest [1 2])", list![Expression::int(2)]);

        builtin_test!(
            conj_list_prepends,
            "(conj (list 1) 2 3)",
            list![Expression::int(3), Expression::int(2), Expression::int(1)]
        );

        builtin_test!(
            conj_vector_appends,
            "(conj [1] 2 3)",
            Expression::Vector(vec![Expression::int(1), Expression::int(2), Expression::int(3)])
        );

        builtin_test!(
            map_lambda,
            "(map (fn* (x) (* x x)) [1 2 3])",
            list![Expression::int(1), Expression::int(4), Expression::int(9)]
        );

        builtin_test!(
            map_builtin,
            "(map list? (list () []))",
            list![Expression::Bool(true), Expression::Bool(false)]
        );

        builtin_test!(apply_spreads_last, "(apply + 1 2 [3 4])", Expression::int(10));

        builtin_test!(apply_lambda, "(apply (fn* (a b) (- a b)) (list 5 2))", Expression::int(3));

        #[test]
        fn nth_out_of_range() {
            let err = test_eval_expr("(nth (list 1) 1)").unwrap_err();
            assert_eq!(err.to_string(), "nth: index 1 out of range");
        }

        #[test]
        fn wrong_arity() {
            let err = test_eval_expr("(count 1 2)").unwrap_err();
            assert!(matches!(
                err,
                EvalError::WrongArgCount {
                    required: 1,
                    passed: 2
                }
            ));
        }
    }

    mod hash {
        use super::*;

        builtin_test!(get, r#"(get (hash-map "a" 1) "a")"#, Expression::int(1));

        builtin_test!(get_missing, "(get {:a 1} :b)", Expression::Nil);

        builtin_test!(get_nil, "(get nil :a)", Expression::Nil);

        builtin_test!(is_map, "(map? {})", Expression::Bool(true));

        builtin_test!(assoc, "(get (assoc {} :a 1 :b 2) :b)", Expression::int(2));

        builtin_test!(
            assoc_keeps_original,
            "(let* (m {:a 1}) (do (assoc m :a 2) (get m :a)))",
            Expression::int(1)
        );

        builtin_test!(dissoc, "(contains? (dissoc {:a 1 :b 2} :a) :a)", Expression::Bool(false));

        builtin_test!(contains, "(contains? {:a nil} :a)", Expression::Bool(true));

        builtin_test!(
            keys_in_insertion_order,
            r#"(keys {:b 1 "a" 2})"#,
            list![Expression::kw("b"), Expression::str("a")]
        );

        builtin_test!(
            vals,
            "(vals {:b 1 :a 2})",
            list![Expression::int(1), Expression::int(2)]
        );

        #[test]
        fn odd_arguments() {
            assert!(test_eval_expr("(hash-map :a)").is_err());
        }

        #[test]
        fn invalid_key() {
            let err = test_eval_expr("(assoc {} 1 2)").unwrap_err();
            assert!(matches!(err, EvalError::ExprErr(ExprError::NotAKey)));
        }
    }

    mod atom {
        use super::*;

        builtin_test!(deref, "(deref (atom 1))", Expression::int(1));

        builtin_test!(deref_reader_macro, "@(atom 2)", Expression::int(2));

        builtin_test!(is_atom, "(atom? (atom nil))", Expression::Bool(true));

        builtin_test!(
            reset,
            "(def! a (atom 1)) (reset! a 5) @a",
            Expression::int(5)
        );

        builtin_test!(
            swap_with_extra_args,
            "(def! a (atom 1)) (swap! a + 2 3) @a",
            Expression::int(6)
        );

        builtin_test!(
            swap_with_lambda_reading_atom,
            "(def! a (atom 2)) (swap! a (fn* (x) (* x @a)))",
            Expression::int(4)
        );
    }

    mod io {
        use super::*;

        builtin_test!(
            pr_str,
            r#"(pr-str "a" 1 :k)"#,
            Expression::str(r#""a" 1 :k"#)
        );

        builtin_test!(str, r#"(str "a" 1 nil [2 "b"])"#, Expression::str("a1nil[2 b]"));

        builtin_test!(
            read_string,
            r#"(read-string "(+ 1 2)")"#,
            list![Expression::sym("+"), Expression::int(1), Expression::int(2)]
        );

        builtin_test!(read_string_empty, r#"(read-string "")"#, Expression::Nil);

        builtin_test!(prn_returns_nil, "(prn 1)", Expression::Nil);

        #[test]
        fn slurp() -> Result<()> {
            let path = std::env::temp_dir().join("malus-slurp-test.txt");
            std::fs::write(&path, "contents")?;
            let code = format!(r#"(slurp "{}")"#, path.display());
            assert_eq!(test_eval_expr(&code)?, Expression::str("contents"));
            Ok(())
        }

        #[test]
        fn slurp_missing_file() {
            let err = test_eval_expr(r#"(slurp "/definitely/not/here.mal")"#).unwrap_err();
            assert!(matches!(err, EvalError::IOErr(_)));
        }
    }

    mod core {
        use super::*;

        builtin_test!(eval, "(eval (list + 1 3))", Expression::int(4));

        builtin_test!(
            eval_uses_root_scope,
            "(def! x 1) (let* (x 2) (eval 'x))",
            Expression::int(1)
        );

        builtin_test!(symbol, r#"(symbol "abc")"#, Expression::sym("abc"));

        builtin_test!(is_symbol, "(symbol? 'a)", Expression::Bool(true));

        builtin_test!(keyword, r#"(keyword "k")"#, Expression::kw("k"));

        builtin_test!(keyword_of_keyword, "(keyword :k)", Expression::kw("k"));

        builtin_test!(is_keyword, r#"(keyword? "k")"#, Expression::Bool(false));

        builtin_test!(is_nil, "(nil? nil)", Expression::Bool(true));

        builtin_test!(is_true, "(true? 1)", Expression::Bool(false));

        builtin_test!(is_false, "(false? false)", Expression::Bool(true));

        builtin_test!(is_string, r#"(string? "")"#, Expression::Bool(true));

        builtin_test!(is_number, "(number? 1.5)", Expression::Bool(true));

        builtin_test!(builtin_is_fn, "(fn? +)", Expression::Bool(true));

        builtin_test!(
            macro_is_not_fn,
            "(defmacro! m (fn* () 1)) (list (fn? m) (macro? m))",
            list![Expression::Bool(false), Expression::Bool(true)]
        );

        builtin_test!(
            with_meta,
            "(def! f (fn* () 1)) (def! g (with-meta f {:doc 1})) (list (meta f) (meta g) (g))",
            list![
                Expression::Nil,
                Expression::HashMap(Map::from_iter([(
                    MapKey::Keyword("doc".to_owned()),
                    Expression::int(1)
                )])),
                Expression::int(1)
            ]
        );

        builtin_test!(meta_of_non_function, "(meta 1)", Expression::Nil);

        #[test]
        fn throw() {
            let err = test_eval_expr("(throw [1])").unwrap_err();
            assert!(matches!(err, EvalError::Thrown(Expression::Vector(_))));
            assert_eq!(err.to_string(), "[1]");
        }

        #[test]
        fn with_meta_on_builtin() {
            assert!(test_eval_expr("(with-meta + {})").is_err());
        }
    }

    #[test]
    fn namespace_names_are_unique() {
        let ns = namespace();
        assert_eq!(ns.iter().map(|p| p.name).unique().count(), ns.len());
    }
}
