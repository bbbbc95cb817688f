use crate::{
    env::{Env, EnvRef},
    eval, expr, parser, printer,
};
use std::io;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    ParseErr(#[from] parser::ParseError),
    #[error(transparent)]
    EvalErr(#[from] eval::EvalError),
    #[error(transparent)]
    IOErr(#[from] io::Error),
}

pub type Result<T = expr::Expression> = std::result::Result<T, Error>;

/// Definitions evaluated in every fresh root scope, before any user code.
const PRELUDE: &[&str] = &[
    r#"(def! *host-language* "malus")"#,
    "(def! not (fn* (a) (if a false true)))",
    r#"(def! load-file (fn* (f) (eval (read-string (str "(do " (slurp f) "\nnil)")))))"#,
    r#"(defmacro! cond (fn* (& xs) (if (> (count xs) 0) (list 'if (first xs) (if (> (count xs) 1) (nth xs 1) (throw "odd number of forms to cond")) (cons 'cond (rest (rest xs)))))))"#,
    "(def! *gensym-counter* (atom 0))",
    r#"(def! gensym (fn* [] (symbol (str "G__" (swap! *gensym-counter* (fn* [x] (+ 1 x)))))))"#,
    "(defmacro! or (fn* (& xs) (if (empty? xs) nil (if (= 1 (count xs)) (first xs) (let* (condvar (gensym)) `(let* (~condvar ~(first xs)) (if ~condvar ~condvar (or ~@(rest xs)))))))))",
];

pub fn eval_with_env(code: &str, env: EnvRef) -> Result {
    let ast = parser::parse_script(code)?;
    Ok(eval::eval_script(&ast, env)?)
}

#[derive(Debug)]
pub struct Interpreter {
    env: EnvRef,
}

impl Interpreter {
    pub fn new() -> Result<Self> {
        Self::with_args(Vec::<String>::new())
    }

    /// Bootstrapped interpreter with `*ARGV*` bound to `args`.
    pub fn with_args<I, S>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let env = Env::new_global_rc();
        let argv = args
            .into_iter()
            .map(|arg| expr::Expression::String(arg.into()))
            .collect();
        env.borrow_mut().set("*ARGV*", expr::Expression::List(argv));
        for def in PRELUDE {
            eval_with_env(def, env.clone())?;
        }
        debug!(definitions = PRELUDE.len(), "bootstrapped root environment");
        Ok(Self { env })
    }

    pub fn env(&self) -> EnvRef {
        self.env.clone()
    }

    /// Reads one form, evaluates it and prints the result readably.
    /// Returns `None` when `line` holds no form.
    pub fn rep(&mut self, line: &str) -> Result<Option<String>> {
        let Some(ast) = parser::read_str(line)? else {
            return Ok(None);
        };
        let val = eval::eval(&ast, self.env.clone())?;
        Ok(Some(printer::pr_str(&val, true)))
    }

    pub fn eval(&mut self, code: &str) -> Result {
        eval_with_env(code, self.env.clone())
    }

    pub fn run(&mut self, mut source: impl io::Read) -> Result {
        let code = {
            let mut s = String::new();
            source.read_to_string(&mut s)?;
            s
        };
        self.eval(&code)
    }
}

pub fn eval(code: &str) -> Result {
    Interpreter::new()?.eval(code)
}

pub fn run(source: impl io::Read) -> Result {
    Interpreter::new()?.run(source)
}
