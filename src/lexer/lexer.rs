use std::str::FromStr;

use crate::error::{CompileError, CompileResult};

use super::{AddOp, Keyword, MulOp, Punct, RelOp, Token};

/// Hand-written scanner. Two-character lexemes are matched before
/// one-character ones; `or` and `and` are spelled like words but lex as
/// operator tokens.
#[derive(Debug)]
pub struct Lexer {
    chars: Vec<char>,
    index: usize,
    tokens: Vec<Token>,
}

impl Lexer {
    pub fn tokenize(source: &str) -> CompileResult<Vec<Token>> {
        let mut lexer = Lexer {
            chars: source.chars().collect(),
            index: 0,
            tokens: vec![],
        };
        while lexer.index < lexer.chars.len() {
            lexer.tokenize_next()?;
        }
        lexer.tokens.push(Token::Eof);
        Ok(lexer.tokens)
    }

    fn new_token(&mut self, token: Token, len: usize) {
        self.tokens.push(token);
        self.index += len;
    }

    fn peek_second(&self) -> Option<char> {
        self.chars.get(self.index + 1).copied()
    }

    fn tokenize_next(&mut self) -> CompileResult<()> {
        let c = self.chars[self.index];
        match c {
            c if c.is_ascii_whitespace() => self.index += 1,
            ';' => self.new_token(Token::Punct(Punct::Semicolon), 1),
            ',' => self.new_token(Token::Punct(Punct::Comma), 1),
            '(' => self.new_token(Token::Punct(Punct::Open), 1),
            ')' => self.new_token(Token::Punct(Punct::Close), 1),
            ':' => match self.peek_second() {
                Some('=') => self.new_token(Token::Punct(Punct::Assign), 2),
                _ => self.new_token(Token::Punct(Punct::Colon), 1),
            },
            '+' => self.new_token(Token::AddOp(AddOp::Add), 1),
            '-' => self.new_token(Token::AddOp(AddOp::Sub), 1),
            '*' => self.new_token(Token::MulOp(MulOp::Mul), 1),
            '/' => self.new_token(Token::MulOp(MulOp::Div), 1),
            '=' => self.new_token(Token::RelOp(RelOp::Eq), 1),
            '<' => match self.peek_second() {
                Some('>') => self.new_token(Token::RelOp(RelOp::Ne), 2),
                Some('=') => self.new_token(Token::RelOp(RelOp::Le), 2),
                _ => self.new_token(Token::RelOp(RelOp::Lt), 1),
            },
            '>' => match self.peek_second() {
                Some('=') => self.new_token(Token::RelOp(RelOp::Ge), 2),
                _ => self.new_token(Token::RelOp(RelOp::Gt), 1),
            },
            c if c.is_ascii_digit() => self.tokenize_number()?,
            c if c.is_ascii_alphabetic() => self.tokenize_word(),
            c => {
                return Err(CompileError::Lexical(format!(
                    "unexpected character '{c}'"
                )))
            }
        }
        Ok(())
    }

    fn tokenize_number(&mut self) -> CompileResult<()> {
        let text: String = self.chars[self.index..]
            .iter()
            .take_while(|c| c.is_ascii_digit())
            .collect();
        let value = text.parse().map_err(|_| {
            CompileError::Lexical(format!("integer literal out of range: {text}"))
        })?;
        self.new_token(Token::Num(value), text.len());
        Ok(())
    }

    fn tokenize_word(&mut self) {
        let word: String = self.chars[self.index..]
            .iter()
            .take_while(|c| c.is_ascii_alphanumeric())
            .collect();
        let len = word.len();

        // Operator spellings first so they never reach the keyword table.
        let token = match word.as_str() {
            "or" => Token::AddOp(AddOp::Or),
            "and" => Token::MulOp(MulOp::And),
            _ => match Keyword::from_str(&word) {
                Ok(kw) => Token::Keyword(kw),
                Err(_) => Token::Ident(word),
            },
        };
        self.new_token(token, len);
    }
}

/// Cursor over the token vector. Exhaustion yields `Eof` on every call.
#[derive(Debug)]
pub struct TokenStream {
    tokens: Vec<Token>,
    pos: usize,
}

impl TokenStream {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, pos: 0 }
    }

    pub fn next_token(&mut self) -> Token {
        match self.tokens.get(self.pos) {
            Some(token) => {
                self.pos += 1;
                token.clone()
            }
            None => Token::Eof,
        }
    }
}
