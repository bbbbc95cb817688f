use crate::{
    builtins,
    eval::EvalError,
    expr::{Expression, Params},
};
use std::{cell::RefCell, collections::HashMap, rc::Rc};

pub type EnvRef = Rc<RefCell<Env>>;

/// A single lexical scope, linked to the scope it was created in.
#[derive(Debug, Default)]
pub struct Env {
    vars: HashMap<String, Expression>,
    outer: Option<EnvRef>,
}

impl Env {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn child(outer: EnvRef) -> Self {
        Self {
            vars: HashMap::new(),
            outer: Some(outer),
        }
    }

    /// Root scope with every builtin installed.
    pub fn new_global() -> Self {
        let mut env = Self::new();
        for proc in builtins::namespace() {
            env.set(proc.name, Expression::Proc(proc));
        }
        env
    }

    pub fn new_global_rc() -> EnvRef {
        Self::new_global().into_rc()
    }

    pub fn into_rc(self) -> EnvRef {
        Rc::new(RefCell::new(self))
    }

    /// Scope for a function call: binds `params` positionally, the rest
    /// parameter (if any) receives the leftover arguments as a list.
    pub fn bind(outer: EnvRef, params: &Params, args: Vec<Expression>) -> Result<Self, EvalError> {
        let passed = args.len();
        let required = params.required.len();
        if passed < required || (params.rest.is_none() && passed > required) {
            return Err(EvalError::WrongArgCount { required, passed });
        }
        let mut env = Self::child(outer);
        let mut args = args.into_iter();
        for (name, val) in params.required.iter().zip(args.by_ref()) {
            env.set(name, val);
        }
        if let Some(rest) = &params.rest {
            env.set(rest, Expression::List(args.collect()));
        }
        Ok(env)
    }

    /// Outermost scope of the chain `env` belongs to.
    pub fn root(env: &EnvRef) -> EnvRef {
        let mut current = env.clone();
        loop {
            let outer = current.borrow().outer.clone();
            match outer {
                Some(outer) => current = outer,
                None => return current,
            }
        }
    }

    pub fn lookup(&self, name: &str) -> Option<Expression> {
        if let Some(val) = self.vars.get(name) {
            return Some(val.clone());
        }
        let mut current = self.outer.clone();
        while let Some(scope) = current {
            let scope = scope.borrow();
            if let Some(val) = scope.vars.get(name) {
                return Some(val.clone());
            }
            current = scope.outer.clone();
        }
        None
    }

    pub fn get(&self, name: &str) -> Result<Expression, EvalError> {
        self.lookup(name)
            .ok_or_else(|| EvalError::SymbolNotFound(name.to_owned()))
    }

    /// Binds `name` in this scope only, returning the bound value.
    pub fn set(&mut self, name: &str, val: Expression) -> Expression {
        self.vars.insert(name.to_owned(), val.clone());
        val
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type Result<T = (), E = EvalError> = std::result::Result<T, E>;

    fn params(required: &[&str], rest: Option<&str>) -> Params {
        Params {
            required: required.iter().map(|s| s.to_string()).collect(),
            rest: rest.map(str::to_owned),
        }
    }

    #[test]
    fn lookup_walks_outer_scopes() -> Result<()> {
        let root = Env::new().into_rc();
        root.borrow_mut().set("x", Expression::int(1));
        let inner = Env::child(Env::child(root).into_rc());
        assert_eq!(inner.get("x")?, Expression::int(1));
        Ok(())
    }

    #[test]
    fn inner_binding_shadows_outer() -> Result<()> {
        let root = Env::new().into_rc();
        root.borrow_mut().set("x", Expression::int(1));
        let mut inner = Env::child(root.clone());
        inner.set("x", Expression::int(2));
        assert_eq!(inner.get("x")?, Expression::int(2));
        assert_eq!(root.borrow().get("x")?, Expression::int(1));
        Ok(())
    }

    #[test]
    fn missing_symbol_is_named() {
        let err = Env::new().get("nope").unwrap_err();
        assert_eq!(err.to_string(), "'nope' not found");
    }

    #[test]
    fn bind_positional_and_rest() -> Result<()> {
        let env = Env::bind(
            Env::new().into_rc(),
            &params(&["a"], Some("more")),
            vec![Expression::int(1), Expression::int(2), Expression::int(3)],
        )?;
        assert_eq!(env.get("a")?, Expression::int(1));
        assert_eq!(
            env.get("more")?,
            Expression::List(vec![Expression::int(2), Expression::int(3)])
        );
        Ok(())
    }

    #[test]
    fn bind_empty_rest() -> Result<()> {
        let env = Env::bind(Env::new().into_rc(), &params(&[], Some("xs")), vec![])?;
        assert_eq!(env.get("xs")?, Expression::new_list());
        Ok(())
    }

    #[test]
    fn bind_checks_arity() {
        let err = Env::bind(
            Env::new().into_rc(),
            &params(&["a", "b"], None),
            vec![Expression::int(1)],
        )
        .unwrap_err();
        assert!(matches!(
            err,
            EvalError::WrongArgCount {
                required: 2,
                passed: 1
            }
        ));
        assert!(Env::bind(
            Env::new().into_rc(),
            &params(&["a"], None),
            vec![Expression::Nil, Expression::Nil]
        )
        .is_err());
    }

    #[test]
    fn root_of_nested_scope() {
        let root = Env::new().into_rc();
        let inner = Env::child(Env::child(root.clone()).into_rc()).into_rc();
        assert!(Rc::ptr_eq(&Env::root(&inner), &root));
    }
}
