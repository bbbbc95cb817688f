use crate::{
    builtins::StdErr,
    env::{Env, EnvRef},
    expr::{list, Call, ExprError, Expression, Lambda},
    parser::ParseError,
};
use std::{io, rc::Rc};
use thiserror::Error;
use tracing::{debug, trace};

#[derive(Error, Debug)]
pub enum EvalError {
    #[error("'{0}' not found")]
    SymbolNotFound(String),
    #[error("Wrong number of arguments: required {required}, passed {passed}")]
    WrongArgCount { required: usize, passed: usize },
    #[error("Ill-formed {0} expression!")]
    IllFormed(&'static str),
    #[error("{0} is not a function")]
    NotCallable(String),
    /// A value raised by `throw`, printed readably.
    #[error("{0}")]
    Thrown(Expression),
    #[error(transparent)]
    ExprErr(#[from] ExprError),
    #[error(transparent)]
    ParseErr(#[from] ParseError),
    #[error(transparent)]
    StdErr(#[from] StdErr),
    #[error(transparent)]
    IOErr(#[from] io::Error),
}

impl EvalError {
    /// The value a `catch*` clause binds for this error.
    pub fn into_value(self) -> Expression {
        match self {
            Self::Thrown(val) => val,
            err => Expression::String(err.to_string()),
        }
    }
}

/// special forms that require different evaluation than normal procedures
pub mod special {
    use std::str::FromStr;

    use super::*;
    use crate::{expr::Params, prelude::*};

    pub enum SpecialForm {
        Def,
        DefMacro,
        MacroExpand,
        Do,
        If,
        Quote,
        Quasiquote,
        Fn,
        Let,
        Try,
    }

    impl FromStr for SpecialForm {
        type Err = (); // no need for more here for now

        fn from_str(s: &str) -> Result<Self, Self::Err> {
            Ok(match s {
                "def!" => Self::Def,
                "defmacro!" => Self::DefMacro,
                "macroexpand" => Self::MacroExpand,
                "do" => Self::Do,
                "if" => Self::If,
                "quote" => Self::Quote,
                "quasiquote" => Self::Quasiquote,
                "fn*" => Self::Fn,
                "let*" => Self::Let,
                "try*" => Self::Try,
                _ => return Err(()),
            })
        }
    }

    /// Where the evaluator goes after a special form.
    pub enum Tail {
        /// the form produced its final value
        Done(Expression),
        /// continue the eval loop with this expression in this scope
        Loop(Expression, EnvRef),
    }

    pub fn eval_special(
        form: SpecialForm,
        rest: &[Expression],
        env: &EnvRef,
    ) -> Result<Tail, EvalError> {
        match form {
            SpecialForm::Def => eval_def(rest, env),
            SpecialForm::DefMacro => eval_defmacro(rest, env),
            SpecialForm::MacroExpand => eval_macroexpand(rest, env),
            SpecialForm::Do => eval_do(rest, env),
            SpecialForm::If => eval_if(rest, env),
            SpecialForm::Quote => eval_quote(rest),
            SpecialForm::Quasiquote => eval_quasiquote(rest, env),
            SpecialForm::Fn => eval_fn(rest, env),
            SpecialForm::Let => eval_let(rest, env),
            SpecialForm::Try => eval_try(rest, env),
        }
    }

    pub fn eval_def(rest: &[Expression], env: &EnvRef) -> Result<Tail, EvalError> {
        let [Expression::Symbol(name), exp] = rest else {
            return Err(EvalError::IllFormed("def!"));
        };
        let val = eval(exp, env.clone())?;
        debug!(symbol = %name, "def!");
        Ok(Tail::Done(env.borrow_mut().set(name, val)))
    }

    pub fn eval_defmacro(rest: &[Expression], env: &EnvRef) -> Result<Tail, EvalError> {
        let [Expression::Symbol(name), exp] = rest else {
            return Err(EvalError::IllFormed("defmacro!"));
        };
        let Expression::Lambda(f) = eval(exp, env.clone())? else {
            return Err(ExprError::NotAProc.into());
        };
        debug!(symbol = %name, "defmacro!");
        let mac = Expression::Lambda(Rc::new(f.as_macro()));
        Ok(Tail::Done(env.borrow_mut().set(name, mac)))
    }

    pub fn eval_macroexpand(rest: &[Expression], env: &EnvRef) -> Result<Tail, EvalError> {
        let [form] = rest else {
            return Err(EvalError::IllFormed("macroexpand"));
        };
        macroexpand(form.clone(), env).map(Tail::Done)
    }

    pub fn eval_do(rest: &[Expression], env: &EnvRef) -> Result<Tail, EvalError> {
        let Some((last, init)) = rest.split_last() else {
            return Ok(Tail::Done(Expression::Nil));
        };
        for exp in init {
            eval(exp, env.clone())?;
        }
        Ok(Tail::Loop(last.clone(), env.clone()))
    }

    /// Only `nil` and `false` select the else branch.
    pub fn eval_if(rest: &[Expression], env: &EnvRef) -> Result<Tail, EvalError> {
        let (cond, then, otherwise) = match rest {
            [cond, then] => (cond, then, None),
            [cond, then, otherwise] => (cond, then, Some(otherwise)),
            _ => return Err(EvalError::IllFormed("if")),
        };
        Ok(if eval(cond, env.clone())?.is_truthy() {
            Tail::Loop(then.clone(), env.clone())
        } else if let Some(otherwise) = otherwise {
            Tail::Loop(otherwise.clone(), env.clone())
        } else {
            Tail::Done(Expression::Nil)
        })
    }

    pub fn eval_quote(rest: &[Expression]) -> Result<Tail, EvalError> {
        let [form] = rest else {
            return Err(EvalError::IllFormed("quote"));
        };
        Ok(Tail::Done(form.clone()))
    }

    pub fn eval_quasiquote(rest: &[Expression], env: &EnvRef) -> Result<Tail, EvalError> {
        let [form] = rest else {
            return Err(EvalError::IllFormed("quasiquote"));
        };
        Ok(Tail::Loop(quasiquote(form)?, env.clone()))
    }

    pub fn eval_fn(rest: &[Expression], env: &EnvRef) -> Result<Tail, EvalError> {
        let [params, body] = rest else {
            return Err(EvalError::IllFormed("fn*"));
        };
        let f = Lambda::new(Params::try_from(params)?, body.clone(), env.clone());
        Ok(Tail::Done(Expression::Lambda(Rc::new(f))))
    }

    pub fn eval_let(rest: &[Expression], env: &EnvRef) -> Result<Tail, EvalError> {
        let [Expression::List(bindings) | Expression::Vector(bindings), body] = rest else {
            return Err(EvalError::IllFormed("let*"));
        };
        if bindings.len() % 2 != 0 {
            return Err(EvalError::IllFormed("let*"));
        }
        let scope = Env::child(env.clone()).into_rc();
        for (sym, exp) in bindings.iter().tuples() {
            let Expression::Symbol(name) = sym else {
                return Err(EvalError::IllFormed("let*"));
            };
            let val = eval(exp, scope.clone())?;
            scope.borrow_mut().set(name, val);
        }
        Ok(Tail::Loop(body.clone(), scope))
    }

    pub fn eval_try(rest: &[Expression], env: &EnvRef) -> Result<Tail, EvalError> {
        let (protected, catch) = match rest {
            [protected] => return Ok(Tail::Loop(protected.clone(), env.clone())),
            [protected, Expression::List(catch)] => (protected, catch),
            _ => return Err(EvalError::IllFormed("try*")),
        };
        let [Expression::Symbol(head), Expression::Symbol(bind), handler] = catch.as_slice() else {
            return Err(EvalError::IllFormed("catch*"));
        };
        if head != "catch*" {
            return Err(EvalError::IllFormed("catch*"));
        }
        match eval(protected, env.clone()) {
            Ok(val) => Ok(Tail::Done(val)),
            Err(err) => {
                debug!(%err, "caught");
                let mut scope = Env::child(env.clone());
                scope.set(bind, err.into_value());
                Ok(Tail::Loop(handler.clone(), scope.into_rc()))
            }
        }
    }
}

fn is_symbol(exp: &Expression, name: &str) -> bool {
    matches!(exp, Expression::Symbol(s) if s == name)
}

/// Head and tail of a non-empty List or Vector.
fn pair(exp: &Expression) -> Option<(&Expression, &[Expression])> {
    match exp {
        Expression::List(items) | Expression::Vector(items) => items.split_first(),
        _ => None,
    }
}

/// Rewrites a quasiquoted template into the `cons`/`concat` calls that build it.
pub fn quasiquote(ast: &Expression) -> Result<Expression, EvalError> {
    let Some((head, rest)) = pair(ast) else {
        return Ok(list![Expression::sym("quote"), ast.clone()]);
    };
    if is_symbol(head, "unquote") {
        return rest.first().cloned().ok_or(EvalError::IllFormed("unquote"));
    }
    let tail = Expression::List(rest.to_vec());
    if let Some((inner, [spliced, ..])) = pair(head) {
        if is_symbol(inner, "splice-unquote") {
            return Ok(list![
                Expression::sym("concat"),
                spliced.clone(),
                quasiquote(&tail)?
            ]);
        }
    }
    Ok(list![
        Expression::sym("cons"),
        quasiquote(head)?,
        quasiquote(&tail)?
    ])
}

/// The macro `ast` calls, if it is a macro call.
fn macro_fn(ast: &Expression, env: &EnvRef) -> Option<Rc<Lambda>> {
    let Expression::List(items) = ast else {
        return None;
    };
    let Some(Expression::Symbol(sym)) = items.first() else {
        return None;
    };
    match env.borrow().lookup(sym)? {
        Expression::Lambda(f) if f.is_macro => Some(f),
        _ => None,
    }
}

/// Expands `ast` until its head is no longer a macro.
pub fn macroexpand(mut ast: Expression, env: &EnvRef) -> Result<Expression, EvalError> {
    while let Some(mac) = macro_fn(&ast, env) {
        trace!(form = %ast, "macroexpand");
        let Expression::List(items) = &ast else {
            break;
        };
        ast = mac.call(&items[1..], env.clone())?;
    }
    Ok(ast)
}

fn eval_each(forms: &[Expression], env: &EnvRef) -> Result<Vec<Expression>, EvalError> {
    forms.iter().map(|exp| eval(exp, env.clone())).collect()
}

/// Evaluates everything but lists: symbols are looked up, vectors and maps
/// have their elements evaluated, the rest evaluates to itself.
fn eval_ast(ast: &Expression, env: &EnvRef) -> Result<Expression, EvalError> {
    Ok(match ast {
        Expression::Symbol(sym) => env.borrow().get(sym)?,
        Expression::List(items) => Expression::List(eval_each(items, env)?),
        Expression::Vector(items) => Expression::Vector(eval_each(items, env)?),
        Expression::HashMap(map) => Expression::HashMap(
            map.iter()
                .map(|(key, val)| Ok((key.clone(), eval(val, env.clone())?)))
                .collect::<Result<_, EvalError>>()?,
        ),
        Expression::Integer(_)
        | Expression::Float(_)
        | Expression::Keyword(_)
        | Expression::String(_)
        | Expression::Bool(_)
        | Expression::Nil
        | Expression::Atom(_)
        | Expression::Lambda(_)
        | Expression::Proc(_) => ast.clone(),
    })
}

/// Calls `f` with already evaluated `args`, for builtins taking functions.
pub fn apply(f: &Expression, args: &[Expression], env: EnvRef) -> Result<Expression, EvalError> {
    match f {
        Expression::Proc(p) => p.call(args, env),
        Expression::Lambda(l) => l.call(args, env),
        other => Err(EvalError::NotCallable(other.to_string())),
    }
}

/// Evaluates `exp` in `env`.
///
/// Forms in tail position (`if` branches, the last form of `do`, `let*` and
/// `catch*` bodies, calls to interpreted functions) replace the current
/// expression and scope instead of recursing, so tail calls run in constant
/// stack space.
pub fn eval(exp: &Expression, env: EnvRef) -> Result<Expression, EvalError> {
    let mut ast = exp.clone();
    let mut env = env;
    loop {
        trace!(form = %ast, "eval");
        ast = macroexpand(ast, &env)?;
        let Expression::List(list) = &ast else {
            return eval_ast(&ast, &env);
        };
        let Some((head, rest)) = list.split_first() else {
            return Ok(Expression::new_list());
        };

        // handle special forms
        if let Expression::Symbol(sym) = head {
            if let Ok(form) = sym.parse() {
                match special::eval_special(form, rest, &env)? {
                    special::Tail::Done(val) => return Ok(val),
                    special::Tail::Loop(next, scope) => {
                        ast = next;
                        env = scope;
                        continue;
                    }
                }
            }
        }

        let mut args = eval_each(list, &env)?;
        let op = args.remove(0);
        match op {
            Expression::Proc(p) => return p.call(&args, env),
            Expression::Lambda(f) => {
                env = f.bind(args)?;
                ast = f.body.clone();
            }
            other => return Err(EvalError::NotCallable(other.to_string())),
        }
    }
}

/// Evaluates `script` form by form, returning the last value.
pub fn eval_script(script: &[Expression], env: EnvRef) -> Result<Expression, EvalError> {
    script
        .iter()
        .try_fold(Expression::Nil, |_, exp| eval(exp, env.clone()))
}
