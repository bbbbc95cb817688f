use crate::{expr::Expression, prelude::*};
use std::{cell::RefCell, fmt, rc::Rc};

/// Atoms currently being printed, an atom reached again inside itself prints as `(atom ...)`.
type Seen = Vec<*const RefCell<Expression>>;

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '"' => out.push_str("\\\""),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

// keep the decimal point so the output reads back as a float
fn float(f: f64) -> String {
    if f.is_finite() && f.fract() == 0. {
        format!("{f:.1}")
    } else {
        f.to_string()
    }
}

fn join(items: &[Expression], readable: bool, seen: &mut Seen) -> String {
    items.iter().map(|item| print(item, readable, seen)).join(" ")
}

/// Serializes `exp`; `readable` quotes and escapes strings.
pub fn pr_str(exp: &Expression, readable: bool) -> String {
    print(exp, readable, &mut Seen::new())
}

fn print(exp: &Expression, readable: bool, seen: &mut Seen) -> String {
    match exp {
        Expression::Integer(i) => i.to_string(),
        Expression::Float(f) => float(f.0),
        Expression::Symbol(s) => s.clone(),
        Expression::Keyword(k) => format!(":{k}"),
        Expression::String(s) if readable => escape(s),
        Expression::String(s) => s.clone(),
        Expression::Bool(b) => b.to_string(),
        Expression::Nil => "nil".to_owned(),
        Expression::List(l) => format!("({})", join(l, readable, seen)),
        Expression::Vector(v) => format!("[{}]", join(v, readable, seen)),
        Expression::HashMap(m) => format!(
            "{{{}}}",
            m.iter()
                .map(|(key, val)| format!(
                    "{} {}",
                    print(&Expression::from(key.clone()), readable, seen),
                    print(val, readable, seen)
                ))
                .join(" ")
        ),
        Expression::Atom(cell) => {
            let ptr = Rc::as_ptr(cell);
            if seen.contains(&ptr) {
                return "(atom ...)".to_owned();
            }
            seen.push(ptr);
            let inner = print(&cell.borrow(), readable, seen);
            seen.pop();
            format!("(atom {inner})")
        }
        Expression::Lambda(f) if f.is_macro => "#<macro>".to_owned(),
        Expression::Lambda(_) => "#<function>".to_owned(),
        Expression::Proc(p) => format!("#<builtin {}>", p.name),
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", pr_str(self, true))
    }
}
