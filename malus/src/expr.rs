use crate::{
    env::{Env, EnvRef},
    eval::{self, EvalError},
};
use indexmap::IndexMap;
use ordered_float::OrderedFloat;
use std::{cell::RefCell, fmt, rc::Rc};
use thiserror::Error;
use variantly::Variantly;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExprError {
    #[error("Not a List!")]
    NotAList,
    #[error("Not a List or Vector!")]
    NotASeq,
    #[error("Not a Procedure!")]
    NotAProc,
    #[error("Not a Number!")]
    NotANum,
    #[error("Not an Integer!")]
    NotAnInt,
    #[error("Not a Bool!")]
    NotABool,
    #[error("Not a Symbol!")]
    NotASym,
    #[error("Not a String!")]
    NotAString,
    #[error("Not an Atom!")]
    NotAnAtom,
    #[error("Not a HashMap!")]
    NotAMap,
    #[error("Not a String or Keyword!")]
    NotAKey,
}

pub trait Call {
    fn call(&self, args: &[Expression], env: EnvRef) -> Result<Expression, EvalError>;
}

pub type ProcFn = fn(&[Expression], EnvRef) -> Result<Expression, EvalError>;

/// A builtin implemented in Rust.
#[derive(Debug, Copy, Clone)]
pub struct Proc {
    pub name: &'static str,
    pub f: ProcFn,
}

impl Proc {
    pub fn new(name: &'static str, f: ProcFn) -> Self {
        Self { name, f }
    }
}

impl PartialEq for Proc {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Call for Proc {
    fn call(&self, args: &[Expression], env: EnvRef) -> Result<Expression, EvalError> {
        (self.f)(args, env)
    }
}

/// Parameter list of a `fn*`, with the optional `&` rest parameter split off.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct Params {
    pub required: Vec<String>,
    pub rest: Option<String>,
}

impl TryFrom<&Expression> for Params {
    type Error = EvalError;

    fn try_from(value: &Expression) -> Result<Self, Self::Error> {
        let (Expression::List(forms) | Expression::Vector(forms)) = value else {
            return Err(EvalError::IllFormed("fn*"));
        };
        let mut names = forms.iter().map(|form| match form {
            Expression::Symbol(name) => Ok(name.as_str()),
            _ => Err(EvalError::IllFormed("fn*")),
        });
        let mut required = vec![];
        while let Some(name) = names.next() {
            let name = name?;
            if name == "&" {
                let (Some(rest), None) = (names.next(), names.next()) else {
                    return Err(EvalError::IllFormed("fn*"));
                };
                return Ok(Self {
                    required,
                    rest: Some(rest?.to_owned()),
                });
            }
            required.push(name.to_owned());
        }
        Ok(Self {
            required,
            rest: None,
        })
    }
}

/// An interpreted closure, created by `fn*`.
#[derive(Clone)]
pub struct Lambda {
    pub params: Params,
    pub body: Expression,
    pub env: EnvRef,
    pub is_macro: bool,
    pub meta: Expression,
}

impl Lambda {
    pub fn new(params: Params, body: Expression, env: EnvRef) -> Self {
        Self {
            params,
            body,
            env,
            is_macro: false,
            meta: Expression::Nil,
        }
    }

    /// Copy of this closure flagged as a macro.
    pub fn as_macro(&self) -> Self {
        Self {
            is_macro: true,
            ..self.clone()
        }
    }

    pub fn with_meta(&self, meta: Expression) -> Self {
        Self {
            meta,
            ..self.clone()
        }
    }

    /// Creates the scope the body runs in for a call with `args`.
    pub fn bind(&self, args: Vec<Expression>) -> Result<EnvRef, EvalError> {
        Env::bind(self.env.clone(), &self.params, args).map(Env::into_rc)
    }
}

// the captured env can reach this closure again, so it is left out
impl fmt::Debug for Lambda {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lambda")
            .field("params", &self.params)
            .field("body", &self.body)
            .field("is_macro", &self.is_macro)
            .finish_non_exhaustive()
    }
}

impl Call for Lambda {
    fn call(&self, args: &[Expression], _env: EnvRef) -> Result<Expression, EvalError> {
        eval::eval(&self.body, self.bind(args.to_vec())?)
    }
}

/// Key of a [`Expression::HashMap`], only strings and keywords are allowed.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub enum MapKey {
    String(String),
    Keyword(String),
}

impl TryFrom<&Expression> for MapKey {
    type Error = ExprError;

    fn try_from(value: &Expression) -> Result<Self, Self::Error> {
        match value {
            Expression::String(s) => Ok(Self::String(s.clone())),
            Expression::Keyword(k) => Ok(Self::Keyword(k.clone())),
            _ => Err(ExprError::NotAKey),
        }
    }
}

impl From<MapKey> for Expression {
    fn from(value: MapKey) -> Self {
        match value {
            MapKey::String(s) => Expression::String(s),
            MapKey::Keyword(k) => Expression::Keyword(k),
        }
    }
}

pub type Map = IndexMap<MapKey, Expression>;

#[derive(Variantly, Debug, Clone)]
pub enum Expression {
    Integer(i64),
    Float(OrderedFloat<f64>),
    Symbol(String),
    /// name without the leading `:`
    Keyword(String),
    String(String),
    Bool(bool),
    Nil,
    List(Vec<Expression>),
    Vector(Vec<Expression>),
    HashMap(Map),
    Atom(Rc<RefCell<Expression>>),
    Lambda(Rc<Lambda>),
    Proc(Proc),
}

impl Expression {
    pub fn sym(s: &str) -> Self {
        Self::Symbol(s.to_owned())
    }

    pub fn kw(s: &str) -> Self {
        Self::Keyword(s.to_owned())
    }

    pub fn str(s: &str) -> Self {
        Self::String(s.to_owned())
    }

    pub fn int(i: i64) -> Self {
        Self::Integer(i)
    }

    pub fn from_f64(f: f64) -> Self {
        Self::Float(OrderedFloat(f))
    }

    pub fn new_list() -> Self {
        Self::List(vec![])
    }

    pub fn new_atom(val: Expression) -> Self {
        Self::Atom(Rc::new(RefCell::new(val)))
    }

    /// Only `nil` and `false` are falsy.
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Self::Nil | Self::Bool(false))
    }

    /// Elements of a List or Vector; `nil` is treated as an empty sequence.
    pub fn as_seq(&self) -> Result<&[Expression], ExprError> {
        match self {
            Self::List(items) | Self::Vector(items) => Ok(items),
            Self::Nil => Ok(&[]),
            _ => Err(ExprError::NotASeq),
        }
    }

    pub fn as_map(&self) -> Result<&Map, ExprError> {
        match self {
            Self::HashMap(m) => Ok(m),
            _ => Err(ExprError::NotAMap),
        }
    }

    pub fn as_atom(&self) -> Result<&Rc<RefCell<Expression>>, ExprError> {
        match self {
            Self::Atom(cell) => Ok(cell),
            _ => Err(ExprError::NotAnAtom),
        }
    }
}

impl PartialEq for Expression {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Integer(a), Self::Integer(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a == b,
            (Self::Integer(i), Self::Float(f)) | (Self::Float(f), Self::Integer(i)) => {
                OrderedFloat(*i as f64) == *f
            }
            (Self::Symbol(a), Self::Symbol(b)) => a == b,
            (Self::Keyword(a), Self::Keyword(b)) => a == b,
            (Self::String(a), Self::String(b)) => a == b,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Nil, Self::Nil) => true,
            (Self::List(a) | Self::Vector(a), Self::List(b) | Self::Vector(b)) => a == b,
            (Self::HashMap(a), Self::HashMap(b)) => a == b,
            (Self::Atom(a), Self::Atom(b)) => Rc::ptr_eq(a, b),
            (Self::Lambda(a), Self::Lambda(b)) => Rc::ptr_eq(a, b),
            (Self::Proc(a), Self::Proc(b)) => a == b,
            _ => false,
        }
    }
}

// copy types

macro_rules! impl_from_copy {
    ($type:ty, $body:expr, $unwrap_or:ident, $ref_unwrap_or:ident, $err:expr) => {
        impl From<$type> for Expression {
            fn from(value: $type) -> Self {
                $body(value)
            }
        }

        impl From<&$type> for Expression {
            fn from(value: &$type) -> Self {
                $body(*value)
            }
        }

        impl TryFrom<Expression> for $type {
            type Error = ExprError;

            fn try_from(value: Expression) -> Result<Self, Self::Error> {
                value.$unwrap_or($err)
            }
        }

        impl TryFrom<&Expression> for $type {
            type Error = ExprError;

            fn try_from(value: &Expression) -> Result<Self, Self::Error> {
                value.$ref_unwrap_or($err).map(|x| *x)
            }
        }
    };
}

impl From<()> for Expression {
    fn from(_: ()) -> Self {
        Expression::Nil
    }
}

impl_from_copy!(
    i64,
    Expression::Integer,
    integer_or,
    integer_ref_or,
    ExprError::NotAnInt
);

impl_from_copy!(
    bool,
    Expression::Bool,
    bool_or,
    bool_ref_or,
    ExprError::NotABool
);

// non-copy types
macro_rules! impl_from {
    ($type:ty, $body:expr, $unwrap_or:ident, $err:expr) => {
        impl From<$type> for Expression {
            fn from(value: $type) -> Self {
                $body(value)
            }
        }

        impl TryFrom<Expression> for $type {
            type Error = ExprError;

            fn try_from(value: Expression) -> Result<Self, Self::Error> {
                value.$unwrap_or($err)
            }
        }
    };
}

impl_from!(
    Vec<Expression>,
    Expression::List,
    list_or,
    ExprError::NotAList
);

impl_from!(String, Expression::String, string_or, ExprError::NotAString);

/// Creates a [`Expression::List`] like `vec!`.
///
/// A thin wrapper around `vec!`, expands to `Expression::List(vec![/*...*/])`.
/// - Create a [`Expression::List`] containing a given list of elements:
///
/// ```
/// # use malus::expr::{list, Expression};
/// let l = list![Expression::int(1), Expression::sym("2")].unwrap_list();
/// assert_eq!(l[0], Expression::int(1));
/// assert_eq!(l[1], Expression::sym("2"));
/// ```
#[macro_export]
macro_rules! list {
    [] => (
        $crate::expr::Expression::new_list()
    );
    [$elem:expr; $n:expr] => (
        $crate::expr::Expression::List(vec![$elem; $n])
    );
    [$($x:expr),+ $(,)?] => (
        $crate::expr::Expression::List(vec![$($x),+])
    );
}

pub use list;

#[cfg(test)]
mod tests {
    use super::*;

    type Result<T = (), E = EvalError> = std::result::Result<T, E>;

    #[test]
    fn list_and_vector_compare_by_content() {
        let list = list![Expression::int(1), Expression::int(2)];
        let vector = Expression::Vector(vec![Expression::int(1), Expression::int(2)]);
        assert_eq!(list, vector);
        assert_ne!(list, Expression::Vector(vec![Expression::int(1)]));
    }

    #[test]
    fn map_never_equals_sequence() {
        assert_ne!(Expression::HashMap(Map::new()), list![]);
    }

    #[test]
    fn symbol_keyword_and_string_are_distinct() {
        assert_eq!(Expression::sym("a"), Expression::sym("a"));
        assert_ne!(Expression::sym("a"), Expression::kw("a"));
        assert_ne!(Expression::kw("a"), Expression::str("a"));
    }

    #[test]
    fn numbers_compare_across_variants() {
        assert_eq!(Expression::int(2), Expression::from_f64(2.));
        assert_ne!(Expression::int(2), Expression::from_f64(2.5));
    }

    #[test]
    fn atoms_compare_by_identity() {
        let a = Expression::new_atom(Expression::int(1));
        let b = Expression::new_atom(Expression::int(1));
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
    }

    #[test]
    fn truthiness() {
        assert!(!Expression::Nil.is_truthy());
        assert!(!Expression::Bool(false).is_truthy());
        assert!(Expression::int(0).is_truthy());
        assert!(Expression::str("").is_truthy());
        assert!(list![].is_truthy());
    }

    #[test]
    fn params_split_rest() -> Result<()> {
        let params = Params::try_from(&list![
            Expression::sym("a"),
            Expression::sym("&"),
            Expression::sym("more"),
        ])?;
        assert_eq!(params.required, vec!["a".to_owned()]);
        assert_eq!(params.rest.as_deref(), Some("more"));
        Ok(())
    }

    #[test]
    fn params_reject_dangling_ampersand() {
        let params = Params::try_from(&Expression::Vector(vec![Expression::sym("&")]));
        assert!(matches!(params, Err(EvalError::IllFormed("fn*"))));
        let params = Params::try_from(&list![Expression::sym("a"), Expression::int(1)]);
        assert!(params.is_err());
    }

    #[test]
    fn try_from_conversions() -> Result<()> {
        let i: i64 = (&Expression::int(4)).try_into()?;
        assert_eq!(i, 4);
        let err = bool::try_from(&Expression::Nil).unwrap_err();
        assert_eq!(err, ExprError::NotABool);
        assert!(MapKey::try_from(&Expression::int(1)).is_err());
        Ok(())
    }
}
