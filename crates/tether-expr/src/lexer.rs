#![forbid(unsafe_code)]

//! Tokenizer shared by the expression and predicate parsers.
//!
//! The lexer is eager: [`tokenize`] returns the full token stream terminated
//! by [`TokenKind::Eof`], or the first lexical error. Every token records the
//! byte offset of its first character so parse errors can point into the
//! source text.

use std::fmt;

use crate::error::{ParseError, ParseErrorKind};

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    /// `[A-Za-z_@][A-Za-z0-9_]*`
    Identifier(String),
    /// `$name`, stored without the sigil.
    Variable(String),
    String(String),
    Integer(i64),
    Double(f64),
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    LParen,
    RParen,
    Colon,
    Comma,
    Dot,
    Less,
    Greater,
    LessEq,
    GreaterEq,
    EqEq,
    NotEq,
    AndAnd,
    OrOr,
    Bang,
    Eof,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Identifier(name) => write!(f, "identifier '{name}'"),
            Self::Variable(name) => write!(f, "'${name}'"),
            Self::String(_) => f.write_str("string literal"),
            Self::Integer(i) => write!(f, "integer {i}"),
            Self::Double(d) => write!(f, "number {d}"),
            Self::LBrace => f.write_str("'{'"),
            Self::RBrace => f.write_str("'}'"),
            Self::LBracket => f.write_str("'['"),
            Self::RBracket => f.write_str("']'"),
            Self::LParen => f.write_str("'('"),
            Self::RParen => f.write_str("')'"),
            Self::Colon => f.write_str("':'"),
            Self::Comma => f.write_str("','"),
            Self::Dot => f.write_str("'.'"),
            Self::Less => f.write_str("'<'"),
            Self::Greater => f.write_str("'>'"),
            Self::LessEq => f.write_str("'<='"),
            Self::GreaterEq => f.write_str("'>='"),
            Self::EqEq => f.write_str("'=='"),
            Self::NotEq => f.write_str("'!='"),
            Self::AndAnd => f.write_str("'&&'"),
            Self::OrOr => f.write_str("'||'"),
            Self::Bang => f.write_str("'!'"),
            Self::Eof => f.write_str("end of input"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub offset: usize,
}

/// Split `source` into tokens.
pub fn tokenize(source: &str) -> Result<Vec<Token>, ParseError> {
    Lexer::new(source).run()
}

struct Lexer<'a> {
    source: &'a str,
    pos: usize,
    tokens: Vec<Token>,
}

impl<'a> Lexer<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            pos: 0,
            tokens: Vec::new(),
        }
    }

    fn peek(&self) -> Option<char> {
        self.source[self.pos..].chars().next()
    }

    fn peek_second(&self) -> Option<char> {
        let mut chars = self.source[self.pos..].chars();
        chars.next();
        chars.next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn push(&mut self, kind: TokenKind, offset: usize) {
        self.tokens.push(Token { kind, offset });
    }

    fn run(mut self) -> Result<Vec<Token>, ParseError> {
        while let Some(c) = self.peek() {
            let start = self.pos;
            if c.is_whitespace() {
                self.bump();
                continue;
            }
            match c {
                '{' | '}' | '[' | ']' | '(' | ')' | ':' | ',' | '.' => {
                    self.bump();
                    let kind = match c {
                        '{' => TokenKind::LBrace,
                        '}' => TokenKind::RBrace,
                        '[' => TokenKind::LBracket,
                        ']' => TokenKind::RBracket,
                        '(' => TokenKind::LParen,
                        ')' => TokenKind::RParen,
                        ':' => TokenKind::Colon,
                        ',' => TokenKind::Comma,
                        _ => TokenKind::Dot,
                    };
                    self.push(kind, start);
                }
                '<' | '>' | '=' | '!' => self.operator(c, start)?,
                '&' | '|' => {
                    self.bump();
                    if self.peek() != Some(c) {
                        return Err(ParseError::new(ParseErrorKind::UnexpectedCharacter(c), start));
                    }
                    self.bump();
                    let kind = if c == '&' {
                        TokenKind::AndAnd
                    } else {
                        TokenKind::OrOr
                    };
                    self.push(kind, start);
                }
                '"' => {
                    let s = self.string(start)?;
                    self.push(TokenKind::String(s), start);
                }
                '$' => {
                    self.bump();
                    let name = self.word();
                    if name.is_empty() || name.starts_with(|c: char| c.is_ascii_digit()) {
                        return Err(ParseError::new(ParseErrorKind::UnexpectedCharacter('$'), start));
                    }
                    self.push(TokenKind::Variable(name), start);
                }
                '-' if self.peek_second().is_some_and(|d| d.is_ascii_digit()) => {
                    let kind = self.number(start)?;
                    self.push(kind, start);
                }
                c if c.is_ascii_digit() && self.after_dot() => {
                    let kind = self.segment_index(start)?;
                    self.push(kind, start);
                }
                c if c.is_ascii_digit() => {
                    let kind = self.number(start)?;
                    self.push(kind, start);
                }
                c if c.is_ascii_alphabetic() || c == '_' || c == '@' => {
                    self.bump();
                    let rest = self.word();
                    let mut name = String::with_capacity(rest.len() + 1);
                    name.push(c);
                    name.push_str(&rest);
                    self.push(TokenKind::Identifier(name), start);
                }
                other => {
                    return Err(ParseError::new(
                        ParseErrorKind::UnexpectedCharacter(other),
                        start,
                    ));
                }
            }
        }
        let end = self.pos;
        self.push(TokenKind::Eof, end);
        Ok(self.tokens)
    }

    /// `[A-Za-z0-9_]*`
    fn word(&mut self) -> String {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            self.bump();
        }
        self.source[start..self.pos].to_owned()
    }

    fn operator(&mut self, c: char, start: usize) -> Result<(), ParseError> {
        self.bump();
        let followed_by_eq = self.peek() == Some('=');
        if followed_by_eq {
            self.bump();
        }
        let kind = match (c, followed_by_eq) {
            ('<', false) => TokenKind::Less,
            ('<', true) => TokenKind::LessEq,
            ('>', false) => TokenKind::Greater,
            ('>', true) => TokenKind::GreaterEq,
            ('=', true) => TokenKind::EqEq,
            ('!', true) => TokenKind::NotEq,
            ('!', false) => TokenKind::Bang,
            _ => {
                return Err(ParseError::new(ParseErrorKind::UnexpectedCharacter(c), start));
            }
        };
        self.push(kind, start);
        Ok(())
    }

    fn string(&mut self, start: usize) -> Result<String, ParseError> {
        self.bump(); // opening quote
        let mut out = String::new();
        loop {
            let Some(c) = self.bump() else {
                return Err(ParseError::new(ParseErrorKind::UnterminatedString, start));
            };
            match c {
                '"' => return Ok(out),
                '\\' => {
                    let escape_at = self.pos;
                    let Some(escaped) = self.bump() else {
                        return Err(ParseError::new(ParseErrorKind::UnterminatedString, start));
                    };
                    match escaped {
                        '"' => out.push('"'),
                        '\\' => out.push('\\'),
                        'n' => out.push('\n'),
                        'r' => out.push('\r'),
                        't' => out.push('\t'),
                        'u' => out.push(self.unicode_escape(escape_at)?),
                        other => {
                            return Err(ParseError::new(
                                ParseErrorKind::InvalidEscape(other),
                                escape_at,
                            ));
                        }
                    }
                }
                other => out.push(other),
            }
        }
    }

    /// `\u{XXXX}`, positioned after the `u`.
    fn unicode_escape(&mut self, escape_at: usize) -> Result<char, ParseError> {
        let invalid = || ParseError::new(ParseErrorKind::InvalidEscape('u'), escape_at);
        if self.bump() != Some('{') {
            return Err(invalid());
        }
        let digits_start = self.pos;
        while self.peek().is_some_and(|c| c.is_ascii_hexdigit()) {
            self.bump();
        }
        let digits = &self.source[digits_start..self.pos];
        if digits.is_empty() || digits.len() > 6 || self.bump() != Some('}') {
            return Err(invalid());
        }
        u32::from_str_radix(digits, 16)
            .ok()
            .and_then(char::from_u32)
            .ok_or_else(invalid)
    }

    fn digits(&mut self) {
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.bump();
        }
    }

    fn after_dot(&self) -> bool {
        self.tokens.last().is_some_and(|token| matches!(token.kind, TokenKind::Dot))
    }

    /// Digits following a `.` name a key path segment: `matrix.0.1` is two
    /// integer segments, not `0.1`.
    fn segment_index(&mut self, start: usize) -> Result<TokenKind, ParseError> {
        self.digits();
        let text = &self.source[start..self.pos];
        text.parse::<i64>()
            .map(TokenKind::Integer)
            .map_err(|_| ParseError::new(ParseErrorKind::InvalidNumber(text.to_owned()), start))
    }

    fn number(&mut self, start: usize) -> Result<TokenKind, ParseError> {
        if self.peek() == Some('-') {
            self.bump();
        }
        self.digits();
        let mut is_double = false;
        if self.peek() == Some('.') && self.peek_second().is_some_and(|c| c.is_ascii_digit()) {
            is_double = true;
            self.bump();
            self.digits();
        }
        if matches!(self.peek(), Some('e' | 'E')) {
            let mut lookahead = self.source[self.pos + 1..].chars();
            let next = lookahead.next();
            let exponent_follows = match next {
                Some('-' | '+') => lookahead.next().is_some_and(|c| c.is_ascii_digit()),
                Some(c) => c.is_ascii_digit(),
                None => false,
            };
            if exponent_follows {
                is_double = true;
                self.bump();
                if matches!(self.peek(), Some('-' | '+')) {
                    self.bump();
                }
                self.digits();
            }
        }
        let text = &self.source[start..self.pos];
        let invalid = || ParseError::new(ParseErrorKind::InvalidNumber(text.to_owned()), start);
        if is_double {
            match text.parse::<f64>() {
                Ok(d) if d.is_finite() => Ok(TokenKind::Double(d)),
                _ => Err(invalid()),
            }
        } else {
            text.parse::<i64>()
                .map(TokenKind::Integer)
                .map_err(|_| invalid())
        }
    }
}
