// the reader: tokens in, expressions out
use crate::{
    expr::{list, Expression, Map, MapKey},
    lexer::{self, Delim, Token},
    prelude::*,
};
use lazy_static::lazy_static;
use regex::Regex;
use thiserror::Error;

/// Enum representing parser errors.
#[derive(Error, Debug, Clone, Eq, PartialEq)]
pub enum ParseError {
    #[error("expected '{0}', got EOF")]
    UnclosedCollection(char),
    #[error("expected '\"', got EOF")]
    UnbalancedString,
    #[error("unexpected EOF")]
    UnexpectedEOF,
    #[error("unexpected '{0}'")]
    UnexpectedCloser(char),
    #[error("odd number of forms in a hash-map literal")]
    OddMapForms,
    #[error("invalid hash-map key: {0}")]
    InvalidMapKey(String),
    #[error("invalid number literal: {0}")]
    InvalidNumber(String),
    #[error("forms nested deeper than {0} levels")]
    TooDeep(usize),
}

/// How deep collections and reader macros may nest.
pub const MAX_DEPTH: usize = 512;

type PResult<'tok, T, E = ParseError> = Result<(T, &'tok [Token]), E>;

/// module dedicated to parsing a singular Expression
mod single_expr {
    use super::*;

    #[derive(Error, Debug, Clone)]
    /// implementation error representing `parse` errors
    pub enum Error {
        #[error("Empty slice!")]
        EmptySlice,
        #[error(transparent)]
        ParseErr(#[from] ParseError),
    }

    impl Error {
        pub fn on_empty(self, slice_alt: ParseError) -> ParseError {
            match self {
                Error::EmptySlice => slice_alt,
                Error::ParseErr(e) => e,
            }
        }
    }

    /// What a single step of the parser produced.
    pub enum Parsed {
        Expr(Expression),
        Close(Delim),
    }

    lazy_static! {
        static ref KEYWORD: Regex = Regex::new(r"^:[a-zA-Z]+").expect("keyword pattern is valid");
        static ref INTEGER: Regex = Regex::new(r"^[-+]?[0-9]+$").expect("integer pattern is valid");
        static ref FLOAT: Regex =
            Regex::new(r"^[-+]?[0-9]*\.[0-9]+$").expect("float pattern is valid");
        static ref STRING: Regex =
            Regex::new(r#"^"(?:\\.|[^\\"])*"$"#).expect("string pattern is valid");
    }

    /// Reqursively parse the tokens until an [`Expression`] is parsed,
    /// a closing delimiter is hit or an error occurs
    pub fn parse(tokens: &[Token], depth: usize) -> PResult<Parsed, Error> {
        let (first, rest) = tokens.split_first().ok_or(Error::EmptySlice)?;
        let (exp, rest) = match first {
            Token::Close(delim) => return Ok((Parsed::Close(*delim), rest)),
            Token::Open(delim) => {
                let (forms, rest) = parse_seq(*delim, rest, nested(depth)?)?;
                (collection(*delim, forms)?, rest)
            }
            Token::Quote => wrap("quote", rest, depth)?,
            Token::Quasiquote => wrap("quasiquote", rest, depth)?,
            Token::Unquote => wrap("unquote", rest, depth)?,
            Token::SpliceUnquote => wrap("splice-unquote", rest, depth)?,
            Token::Deref => wrap("deref", rest, depth)?,
            Token::Meta => {
                let depth = nested(depth)?;
                let (meta, rest) = parse_form(rest, depth)?;
                let (target, rest) = parse_form(rest, depth)?;
                (list![Expression::sym("with-meta"), target, meta], rest)
            }
            Token::Atom(atom) => (parse_atom(atom)?, rest),
        };
        Ok((Parsed::Expr(exp), rest))
    }

    /// One level deeper than `depth`, unless that passes [`MAX_DEPTH`].
    fn nested(depth: usize) -> Result<usize, ParseError> {
        if depth >= MAX_DEPTH {
            return Err(ParseError::TooDeep(MAX_DEPTH));
        }
        Ok(depth + 1)
    }

    /// Parses exactly one form, a closer here is an error.
    fn parse_form(tokens: &[Token], depth: usize) -> PResult<Expression> {
        let (parsed, rest) =
            parse(tokens, depth).map_err(|e| e.on_empty(ParseError::UnexpectedEOF))?;
        match parsed {
            Parsed::Expr(exp) => Ok((exp, rest)),
            Parsed::Close(delim) => Err(ParseError::UnexpectedCloser(delim.close())),
        }
    }

    #[inline]
    /// Expands a reader macro into `(name form)`.
    fn wrap<'a>(name: &str, tokens: &'a [Token], depth: usize) -> PResult<'a, Expression> {
        let (form, rest) = parse_form(tokens, nested(depth)?)?;
        Ok((list![Expression::sym(name), form], rest))
    }

    #[inline]
    /// Parses an atom into [`Expression`].
    /// The order of the checks decides how ambiguous tokens are read.
    fn parse_atom(token: &str) -> Result<Expression, ParseError> {
        Ok(match token {
            "true" => Expression::Bool(true),
            "false" => Expression::Bool(false),
            "nil" => Expression::Nil,
            t if KEYWORD.is_match(t) => Expression::kw(&t[1..]),
            t if INTEGER.is_match(t) => t
                .parse()
                .map(Expression::Integer)
                .map_err(|_| ParseError::InvalidNumber(t.to_owned()))?,
            t if FLOAT.is_match(t) => t
                .parse()
                .map(Expression::from_f64)
                .map_err(|_| ParseError::InvalidNumber(t.to_owned()))?,
            t if STRING.is_match(t) => Expression::String(unescape(&t[1..t.len() - 1])),
            t if t.starts_with('"') => return Err(ParseError::UnbalancedString),
            t => Expression::sym(t),
        })
    }

    fn unescape(s: &str) -> String {
        let mut out = String::with_capacity(s.len());
        let mut chars = s.chars();
        while let Some(c) = chars.next() {
            if c != '\\' {
                out.push(c);
                continue;
            }
            match chars.next() {
                Some('n') => out.push('\n'),
                Some(escaped @ ('"' | '\\')) => out.push(escaped),
                // unknown escapes are kept as written
                Some(other) => {
                    out.push('\\');
                    out.push(other);
                }
                None => out.push('\\'),
            }
        }
        out
    }

    #[inline]
    /// Parses the forms up to the closer matching `delim`.
    fn parse_seq(delim: Delim, mut tokens: &[Token], depth: usize) -> PResult<Vec<Expression>> {
        let mut forms: Vec<Expression> = vec![];
        loop {
            let (parsed, rest) = parse(tokens, depth)
                .map_err(|e| e.on_empty(ParseError::UnclosedCollection(delim.close())))?;
            match parsed {
                Parsed::Expr(exp) => forms.push(exp),
                Parsed::Close(closer) if closer == delim => return Ok((forms, rest)),
                Parsed::Close(closer) => {
                    return Err(ParseError::UnexpectedCloser(closer.close()))
                }
            }
            tokens = rest;
        }
    }

    fn collection(delim: Delim, forms: Vec<Expression>) -> Result<Expression, ParseError> {
        Ok(match delim {
            Delim::Paren => Expression::List(forms),
            Delim::Bracket => Expression::Vector(forms),
            Delim::Brace => {
                if forms.len() % 2 != 0 {
                    return Err(ParseError::OddMapForms);
                }
                forms
                    .into_iter()
                    .tuples()
                    .map(|(key, val)| {
                        MapKey::try_from(&key)
                            .map(|key| (key, val))
                            .map_err(|_| ParseError::InvalidMapKey(key.to_string()))
                    })
                    .collect::<Result<Map, _>>()?
                    .pipe(Expression::HashMap)
            }
        })
    }
}

pub fn parse_tokens(tokens: &[Token]) -> PResult<Expression> {
    let (res, rest) =
        single_expr::parse(tokens, 0).map_err(|e| e.on_empty(ParseError::UnexpectedEOF))?;
    match res {
        single_expr::Parsed::Expr(exp) => Ok((exp, rest)),
        single_expr::Parsed::Close(delim) => Err(ParseError::UnexpectedCloser(delim.close())),
    }
}

/// Reads the first form of `source`, ignoring whatever follows it.
/// Returns `None` when there is nothing to read.
pub fn read_str(source: &str) -> Result<Option<Expression>, ParseError> {
    let tokens = lexer::tokenize(source);
    if tokens.is_empty() {
        return Ok(None);
    }
    let (exp, _) = parse_tokens(&tokens)?;
    Ok(Some(exp))
}

pub fn parse_script(source: &str) -> Result<Vec<Expression>, ParseError> {
    let tokens = lexer::tokenize(source);
    let mut expressions = vec![];
    let mut unparsed: &[Token] = &tokens;

    while !unparsed.is_empty() {
        let (exp, rest) = parse_tokens(unparsed)?;
        expressions.push(exp);
        unparsed = rest;
    }

    Ok(expressions)
}
