use std::fmt;

use strum::{Display, EnumString};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum Keyword {
    Program,
    Procedure,
    Begin,
    End,
    If,
    Then,
    Else,
    While,
    Loop,
    Print,
    Int,
    Bool,
    Not,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Display)]
pub enum Punct {
    #[strum(serialize = ";")]
    Semicolon,
    #[strum(serialize = ":")]
    Colon,
    #[strum(serialize = ":=")]
    Assign,
    #[strum(serialize = ",")]
    Comma,
    #[strum(serialize = "(")]
    Open,
    #[strum(serialize = ")")]
    Close,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Display)]
pub enum AddOp {
    #[strum(serialize = "+")]
    Add,
    #[strum(serialize = "-")]
    Sub,
    #[strum(serialize = "or")]
    Or,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Display)]
pub enum MulOp {
    #[strum(serialize = "*")]
    Mul,
    #[strum(serialize = "/")]
    Div,
    #[strum(serialize = "and")]
    And,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Display)]
pub enum RelOp {
    #[strum(serialize = "=")]
    Eq,
    #[strum(serialize = "<>")]
    Ne,
    #[strum(serialize = "<")]
    Lt,
    #[strum(serialize = "<=")]
    Le,
    #[strum(serialize = ">")]
    Gt,
    #[strum(serialize = ">=")]
    Ge,
}

/// One lexeme with its category and attribute. Tokens are immutable; the
/// parser owns the current lookahead and clones nothing past it.
#[derive(Clone, Debug, PartialEq)]
pub enum Token {
    Keyword(Keyword),
    Punct(Punct),
    AddOp(AddOp),
    MulOp(MulOp),
    RelOp(RelOp),
    Ident(String),
    Num(i32),
    Eof,
}

impl fmt::Display for Token {
    /// Diagnostic rendering, `TOKEN_<CATEGORY>:<lexeme>`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Keyword(kw) => write!(f, "TOKEN_KEYWORD:{kw}"),
            Token::Punct(p) => write!(f, "TOKEN_PUNC:{p}"),
            Token::AddOp(op) => write!(f, "TOKEN_ADDOP:{op}"),
            Token::MulOp(op) => write!(f, "TOKEN_MULOP:{op}"),
            Token::RelOp(op) => write!(f, "TOKEN_RELOP:{op}"),
            Token::Ident(name) => write!(f, "TOKEN_ID:{name}"),
            Token::Num(value) => write!(f, "TOKEN_NUM:{value}"),
            Token::Eof => write!(f, "TOKEN_EOF:EOF"),
        }
    }
}
