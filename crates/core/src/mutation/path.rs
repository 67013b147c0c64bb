//! Attribute paths addressed by patch operations.
//!
//! Paths use the GROQ attribute syntax (`a.b`, `a[2]`, `a[_key == "k"]`) and
//! are tokenized with the GROQ lexer, so a rendered path always parses back
//! to the same segments whatever the matched value contains.

use std::fmt;

use homefind_groq::lexer::{tokenize, LexError, SpannedToken, Token};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    Field(String),
    /// Array index; negative values count from the end.
    Index(i64),
    /// Array items whose `attr` equals `value`.
    Matching { attr: String, value: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Path(Vec<Segment>);

#[derive(Debug, thiserror::Error)]
pub enum PathError {
    #[error(transparent)]
    Lex(#[from] LexError),
    #[error("unexpected {found} at position {position} in path")]
    Unexpected { found: Token, position: usize },
    #[error("path must start with an attribute name")]
    Empty,
}

impl Path {
    pub fn field(name: &'static str) -> Self {
        Self(vec![Segment::Field(name.to_string())])
    }

    pub fn then(mut self, name: &'static str) -> Self {
        self.0.push(Segment::Field(name.to_string()));
        self
    }

    pub fn at(mut self, index: i64) -> Self {
        self.0.push(Segment::Index(index));
        self
    }

    /// Select array items whose `attr` equals `value`. The value is
    /// escaped on rendering.
    pub fn matching(mut self, attr: &'static str, value: impl Into<String>) -> Self {
        self.0.push(Segment::Matching {
            attr: attr.to_string(),
            value: value.into(),
        });
        self
    }

    pub fn key(self, key: impl Into<String>) -> Self {
        self.matching("_key", key)
    }

    pub fn segments(&self) -> &[Segment] {
        &self.0
    }

    pub fn parse(source: &str) -> Result<Self, PathError> {
        let tokens = tokenize(source)?;
        let mut cursor = tokens.iter();
        let mut segments = match cursor.next() {
            Some(SpannedToken {
                token: Token::Ident(name),
                ..
            }) => vec![Segment::Field(name.clone())],
            _ => return Err(PathError::Empty),
        };

        loop {
            let next = expect_any(&mut cursor)?;
            match &next.token {
                Token::Eof => break,
                Token::Dot => match expect_any(&mut cursor)? {
                    SpannedToken {
                        token: Token::Ident(name),
                        ..
                    } => segments.push(Segment::Field(name.clone())),
                    other => return Err(unexpected(other)),
                },
                Token::LBracket => {
                    let segment = match expect_any(&mut cursor)? {
                        SpannedToken {
                            token: Token::Integer(n),
                            ..
                        } => Segment::Index(*n),
                        SpannedToken {
                            token: Token::Ident(attr),
                            ..
                        } => {
                            expect(&mut cursor, &Token::Eq)?;
                            match expect_any(&mut cursor)? {
                                SpannedToken {
                                    token: Token::String(value),
                                    ..
                                } => Segment::Matching {
                                    attr: attr.clone(),
                                    value: value.clone(),
                                },
                                other => return Err(unexpected(other)),
                            }
                        }
                        other => return Err(unexpected(other)),
                    };
                    expect(&mut cursor, &Token::RBracket)?;
                    segments.push(segment);
                }
                _ => return Err(unexpected(next)),
            }
        }
        Ok(Self(segments))
    }

    /// Split into the parent path and the final segment.
    pub fn split_last(&self) -> Option<(&Segment, &[Segment])> {
        self.0.split_last()
    }
}

fn expect_any<'t>(
    cursor: &mut std::slice::Iter<'t, SpannedToken>,
) -> Result<&'t SpannedToken, PathError> {
    // tokenize always ends with Eof, and parsing stops there
    cursor.next().ok_or(PathError::Empty)
}

fn expect(cursor: &mut std::slice::Iter<'_, SpannedToken>, token: &Token) -> Result<(), PathError> {
    let next = expect_any(cursor)?;
    if &next.token == token {
        Ok(())
    } else {
        Err(unexpected(next))
    }
}

fn unexpected(token: &SpannedToken) -> PathError {
    PathError::Unexpected {
        found: token.token.clone(),
        position: token.span.start,
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.0.iter().enumerate() {
            match segment {
                Segment::Field(name) if i == 0 => f.write_str(name)?,
                Segment::Field(name) => write!(f, ".{name}")?,
                Segment::Index(n) => write!(f, "[{n}]")?,
                Segment::Matching { attr, value } => {
                    // serde_json renders a correctly escaped string literal
                    write!(f, "[{attr}=={}]", Value::String(value.clone()))?
                }
            }
        }
        Ok(())
    }
}

impl std::str::FromStr for Path {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
