use std::fmt;
use std::iter::Peekable;
use std::str::CharIndices;

use serde::{Deserialize, Serialize};

/// Token types produced by the GROQ lexer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Token {
    /// A string literal with escapes resolved.
    String(String),
    /// An integer literal.
    Integer(i64),
    /// A floating-point literal.
    Float(f64),
    /// A boolean literal.
    Bool(bool),
    /// The null literal.
    Null,

    /// An identifier.
    Ident(String),
    /// A query parameter, without the leading `$`.
    Param(String),

    /// Equality, `==`.
    Eq, // ==
    /// Inequality, `!=`.
    Neq, // !=
    /// Less than.
    Lt, // <
    /// Greater than.
    Gt, // >
    /// Less than or equal.
    Lte, // <=
    /// Greater than or equal.
    Gte, // >=
    /// Logical conjunction.
    And, // &&
    /// Logical disjunction.
    Or, // ||
    /// Logical negation.
    Not, // !
    /// Membership keyword.
    In, // in
    /// Ascending sort keyword inside `order()`.
    Asc, // asc
    /// Descending sort keyword inside `order()`.
    Desc, // desc

    /// Everything: the whole dataset.
    Star, // *
    /// Attribute access.
    Dot, // .
    /// Inclusive slice range.
    Range, // ..
    /// Exclusive slice range, or a spread inside a projection.
    Ellipsis, // ...
    /// Separator between arguments, items and fields.
    Comma, // ,
    /// Separator between a projection alias and its value.
    Colon, // :
    /// Pipe into a function such as `order()`.
    Pipe, // |
    /// Reference dereference.
    Arrow, // ->
    /// The current value.
    At, // @
    /// The enclosing scope.
    Caret, // ^

    /// Opening parenthesis.
    LParen, // (
    /// Closing parenthesis.
    RParen, // )
    /// Opening bracket of a filter, index or slice.
    LBracket, // [
    /// Closing bracket.
    RBracket, // ]
    /// Opening brace of a projection or object.
    LBrace, // {
    /// Closing brace.
    RBrace, // }

    /// The end of the input.
    Eof,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::String(s) => write!(f, "\"{s}\""),
            Token::Integer(n) => write!(f, "{n}"),
            Token::Float(n) => write!(f, "{n}"),
            Token::Bool(b) => write!(f, "{b}"),
            Token::Null => write!(f, "null"),
            Token::Ident(s) => write!(f, "{s}"),
            Token::Param(s) => write!(f, "${s}"),
            Token::Eof => write!(f, "end of input"),
            other => write!(f, "{other:?}"),
        }
    }
}

/// Byte range of a token in the source query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

/// A token with its source position.
#[derive(Debug, Clone, PartialEq)]
pub struct SpannedToken {
    pub token: Token,
    pub span: Span,
}

/// Lexer error.
#[derive(Debug, thiserror::Error)]
pub enum LexError {
    #[error("unexpected character '{0}' at position {1}")]
    UnexpectedChar(char, usize),
    #[error("unterminated string starting at position {0}")]
    UnterminatedString(usize),
    #[error("invalid number literal '{0}' at position {1}")]
    InvalidNumber(String, usize),
    #[error("empty parameter name at position {0}")]
    EmptyParam(usize),
    #[error("invalid unicode escape at position {0}")]
    InvalidEscape(usize),
}

struct Lexer<'a> {
    input: &'a str,
    chars: Peekable<CharIndices<'a>>,
}

impl<'a> Lexer<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input,
            chars: input.char_indices().peekable(),
        }
    }

    fn offset(&mut self) -> usize {
        self.chars
            .peek()
            .map(|(i, _)| *i)
            .unwrap_or(self.input.len())
    }

    fn peek_char(&mut self) -> Option<char> {
        self.chars.peek().map(|(_, c)| *c)
    }

    /// Look one character past the current peek position.
    fn peek_second(&self) -> Option<char> {
        let mut it = self.chars.clone();
        it.next();
        it.next().map(|(_, c)| c)
    }

    fn bump_if(&mut self, expected: char) -> bool {
        if self.peek_char() == Some(expected) {
            self.chars.next();
            true
        } else {
            false
        }
    }

    fn skip_trivia(&mut self) {
        loop {
            match self.peek_char() {
                Some(c) if c.is_whitespace() => {
                    self.chars.next();
                }
                Some('/') if self.peek_second() == Some('/') => {
                    while let Some(c) = self.peek_char() {
                        if c == '\n' {
                            break;
                        }
                        self.chars.next();
                    }
                }
                _ => return,
            }
        }
    }

    fn take_word(&mut self, start: usize) -> &'a str {
        while matches!(self.peek_char(), Some(c) if c.is_alphanumeric() || c == '_') {
            self.chars.next();
        }
        let end = self.offset();
        &self.input[start..end]
    }

    fn number(&mut self, start: usize, negative: bool) -> Result<Token, LexError> {
        let digits_start = self.offset();
        let mut is_float = false;
        while let Some(c) = self.peek_char() {
            if c.is_ascii_digit() {
                self.chars.next();
            } else if c == '.' && !is_float && self.peek_second() != Some('.') {
                // `1..5` is a range, not a float
                is_float = true;
                self.chars.next();
            } else {
                break;
            }
        }
        let text = &self.input[digits_start..self.offset()];
        let invalid = || LexError::InvalidNumber(text.to_string(), start);
        let sign = if negative { -1 } else { 1 };
        if is_float {
            let n: f64 = text.parse().map_err(|_| invalid())?;
            Ok(Token::Float(n * sign as f64))
        } else {
            let n: i64 = text.parse().map_err(|_| invalid())?;
            Ok(Token::Integer(n * sign))
        }
    }

    fn string(&mut self, start: usize, quote: char) -> Result<Token, LexError> {
        let mut out = String::new();
        loop {
            match self.chars.next() {
                None => return Err(LexError::UnterminatedString(start)),
                Some((_, c)) if c == quote => return Ok(Token::String(out)),
                Some((_, '\\')) => match self.chars.next() {
                    None => return Err(LexError::UnterminatedString(start)),
                    Some((_, 'n')) => out.push('\n'),
                    Some((_, 't')) => out.push('\t'),
                    Some((_, 'r')) => out.push('\r'),
                    Some((at, 'u')) => out.push(self.unicode_escape(at)?),
                    Some((_, other)) => out.push(other),
                },
                Some((_, c)) => out.push(c),
            }
        }
    }

    /// The four hex digits after `\u`.
    fn unicode_escape(&mut self, at: usize) -> Result<char, LexError> {
        let mut code = 0u32;
        for _ in 0..4 {
            let digit = self
                .chars
                .next()
                .and_then(|(_, c)| c.to_digit(16))
                .ok_or(LexError::InvalidEscape(at))?;
            code = code * 16 + digit;
        }
        char::from_u32(code).ok_or(LexError::InvalidEscape(at))
    }

    fn next_token(&mut self) -> Result<Option<SpannedToken>, LexError> {
        self.skip_trivia();
        let Some(&(start, ch)) = self.chars.peek() else {
            return Ok(None);
        };
        if ch.is_ascii_digit() {
            let token = self.number(start, false)?;
            let end = self.offset();
            return Ok(Some(SpannedToken {
                token,
                span: Span { start, end },
            }));
        }
        self.chars.next();

        let token = match ch {
            '*' => Token::Star,
            ',' => Token::Comma,
            ':' => Token::Colon,
            '@' => Token::At,
            '^' => Token::Caret,
            '(' => Token::LParen,
            ')' => Token::RParen,
            '[' => Token::LBracket,
            ']' => Token::RBracket,
            '{' => Token::LBrace,
            '}' => Token::RBrace,
            '.' => {
                if self.bump_if('.') {
                    if self.bump_if('.') {
                        Token::Ellipsis
                    } else {
                        Token::Range
                    }
                } else {
                    Token::Dot
                }
            }
            '=' if self.bump_if('=') => Token::Eq,
            '!' => {
                if self.bump_if('=') {
                    Token::Neq
                } else {
                    Token::Not
                }
            }
            '<' => {
                if self.bump_if('=') {
                    Token::Lte
                } else {
                    Token::Lt
                }
            }
            '>' => {
                if self.bump_if('=') {
                    Token::Gte
                } else {
                    Token::Gt
                }
            }
            '&' if self.bump_if('&') => Token::And,
            '|' => {
                if self.bump_if('|') {
                    Token::Or
                } else {
                    Token::Pipe
                }
            }
            '-' if self.bump_if('>') => Token::Arrow,
            '-' if matches!(self.peek_char(), Some(c) if c.is_ascii_digit()) => {
                self.number(start, true)?
            }
            '"' | '\'' => self.string(start, ch)?,
            '$' => {
                let name_start = self.offset();
                let name = self.take_word(name_start);
                if name.is_empty() {
                    return Err(LexError::EmptyParam(start));
                }
                Token::Param(name.to_string())
            }
            c if c.is_alphabetic() || c == '_' => match self.take_word(start) {
                "true" => Token::Bool(true),
                "false" => Token::Bool(false),
                "null" => Token::Null,
                "in" => Token::In,
                "asc" => Token::Asc,
                "desc" => Token::Desc,
                word => Token::Ident(word.to_string()),
            },
            other => return Err(LexError::UnexpectedChar(other, start)),
        };

        let end = self.offset();
        Ok(Some(SpannedToken {
            token,
            span: Span { start, end },
        }))
    }
}

/// Tokenize a GROQ query string. The returned sequence always ends with [`Token::Eof`].
pub fn tokenize(input: &str) -> Result<Vec<SpannedToken>, LexError> {
    let mut lexer = Lexer::new(input);
    let mut tokens = Vec::new();
    while let Some(token) = lexer.next_token()? {
        tokens.push(token);
    }
    let end = input.len();
    tokens.push(SpannedToken {
        token: Token::Eof,
        span: Span { start: end, end },
    });
    Ok(tokens)
}
