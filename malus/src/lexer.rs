use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// whitespace and commas are skipped, group 1 holds the token
    static ref TOKEN: Regex = Regex::new(
        r#"[\s,]*(~@|[\[\]{}()'`~^@]|"(?:\\.|[^\\"])*"?|;.*|[^\s\[\]{}('"`,;)]+)"#
    )
    .expect("token pattern is valid");
}

/// Bracket kinds, each opening a different collection.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Delim {
    /// `( )`
    Paren,
    /// `[ ]`
    Bracket,
    /// `{ }`
    Brace,
}

impl Delim {
    pub fn open(self) -> char {
        match self {
            Self::Paren => '(',
            Self::Bracket => '[',
            Self::Brace => '{',
        }
    }

    pub fn close(self) -> char {
        match self {
            Self::Paren => ')',
            Self::Bracket => ']',
            Self::Brace => '}',
        }
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Token {
    Open(Delim),
    Close(Delim),
    /// '
    Quote,
    /// `
    Quasiquote,
    /// ~
    Unquote,
    /// ~@
    SpliceUnquote,
    /// @
    Deref,
    /// ^
    Meta,
    /// Numbers, strings, symbols, keywords... classified by the parser
    Atom(String),
}

impl Token {
    pub fn atom(s: &str) -> Self {
        Self::Atom(s.to_owned())
    }
}

impl From<&str> for Token {
    fn from(s: &str) -> Self {
        match s {
            "(" => Token::Open(Delim::Paren),
            ")" => Token::Close(Delim::Paren),
            "[" => Token::Open(Delim::Bracket),
            "]" => Token::Close(Delim::Bracket),
            "{" => Token::Open(Delim::Brace),
            "}" => Token::Close(Delim::Brace),
            "'" => Token::Quote,
            "`" => Token::Quasiquote,
            "~" => Token::Unquote,
            "~@" => Token::SpliceUnquote,
            "@" => Token::Deref,
            "^" => Token::Meta,
            x => Token::atom(x),
        }
    }
}

pub fn tokenize(source: &str) -> Vec<Token> {
    TOKEN
        .captures_iter(source)
        .filter_map(|caps| caps.get(1))
        .map(|lex| lex.as_str())
        .filter(|lex| !lex.starts_with(';'))
        .map(Token::from)
        .collect()
}
