use crate::ast::{Expr, OrderTerm, ProjectionField};
use crate::lexer::{tokenize, LexError, SpannedToken, Token};

/// Parser error types.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("lex error: {0}")]
    Lex(#[from] LexError),
    #[error("unexpected token {found} at position {position}, expected {expected}")]
    UnexpectedToken {
        found: String,
        expected: String,
        position: usize,
    },
    #[error("unexpected end of input")]
    UnexpectedEof,
    #[error("unknown pipe function '{0}'")]
    UnknownPipeFunction(String),
    #[error("projection field at position {0} needs a name")]
    UnnamedProjectionField(usize),
}

/// Parse a GROQ query string into an AST.
pub fn parse(input: &str) -> Result<Expr, ParseError> {
    let tokens = tokenize(input)?;
    let mut parser = Parser::new(tokens);
    let expr = parser.parse_expr()?;
    parser.expect(&Token::Eof)?;
    Ok(expr)
}

struct Parser {
    tokens: Vec<SpannedToken>,
    pos: usize,
}

impl Parser {
    fn new(tokens: Vec<SpannedToken>) -> Self {
        Self { tokens, pos: 0 }
    }

    fn peek(&self) -> &Token {
        self.tokens
            .get(self.pos)
            .map(|t| &t.token)
            .unwrap_or(&Token::Eof)
    }

    fn position(&self) -> usize {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map(|t| t.span.start)
            .unwrap_or_default()
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        self.pos += 1;
        token
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == expected {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn unexpected(&self, expected: &str) -> ParseError {
        match self.peek() {
            Token::Eof if expected != "end of input" => ParseError::UnexpectedEof,
            found => ParseError::UnexpectedToken {
                found: found.to_string(),
                expected: expected.to_string(),
                position: self.position(),
            },
        }
    }

    fn expect(&mut self, expected: &Token) -> Result<(), ParseError> {
        if self.eat(expected) {
            Ok(())
        } else {
            Err(self.unexpected(&expected.to_string()))
        }
    }

    /// Full expression, including trailing `| order(...)` stages.
    fn parse_expr(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_or()?;
        while self.eat(&Token::Pipe) {
            expr = self.parse_pipe_function(expr)?;
            expr = self.parse_postfix_ops(expr)?;
        }
        Ok(expr)
    }

    fn parse_pipe_function(&mut self, base: Expr) -> Result<Expr, ParseError> {
        let name = match self.advance() {
            Token::Ident(name) => name,
            _ => return Err(self.unexpected("pipe function")),
        };
        if name != "order" {
            return Err(ParseError::UnknownPipeFunction(name));
        }
        self.expect(&Token::LParen)?;
        let mut terms = Vec::new();
        loop {
            let expr = self.parse_or()?;
            let ascending = if self.eat(&Token::Desc) {
                false
            } else {
                self.eat(&Token::Asc);
                true
            };
            terms.push(OrderTerm { expr, ascending });
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        self.expect(&Token::RParen)?;
        Ok(Expr::Order(Box::new(base), terms))
    }

    fn parse_or(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_and()?;
        while self.eat(&Token::Or) {
            let right = self.parse_and()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_comparison()?;
        while self.eat(&Token::And) {
            let right = self.parse_comparison()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_comparison(&mut self) -> Result<Expr, ParseError> {
        let left = self.parse_unary()?;
        let build: fn(Box<Expr>, Box<Expr>) -> Expr = match self.peek() {
            Token::Eq => Expr::Eq,
            Token::Neq => Expr::Neq,
            Token::Lt => Expr::Lt,
            Token::Gt => Expr::Gt,
            Token::Lte => Expr::Lte,
            Token::Gte => Expr::Gte,
            Token::In => Expr::In,
            _ => return Ok(left),
        };
        self.advance();
        let right = self.parse_unary()?;
        Ok(build(Box::new(left), Box::new(right)))
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        if self.eat(&Token::Not) {
            let inner = self.parse_unary()?;
            return Ok(Expr::Not(Box::new(inner)));
        }
        let primary = self.parse_primary()?;
        self.parse_postfix_ops(primary)
    }

    fn parse_postfix_ops(&mut self, mut expr: Expr) -> Result<Expr, ParseError> {
        loop {
            match self.peek() {
                Token::Dot => {
                    self.advance();
                    match self.advance() {
                        Token::Ident(field) => expr = Expr::DotAccess(Box::new(expr), field),
                        _ => {
                            self.pos -= 1;
                            return Err(self.unexpected("attribute name"));
                        }
                    }
                }
                Token::Arrow => {
                    self.advance();
                    expr = Expr::Deref(Box::new(expr));
                    if let Token::Ident(field) = self.peek().clone() {
                        self.advance();
                        expr = Expr::DotAccess(Box::new(expr), field);
                    }
                }
                Token::LBrace => {
                    self.advance();
                    let fields = self.parse_projection()?;
                    expr = Expr::Projection(Box::new(expr), fields);
                }
                Token::LBracket => {
                    self.advance();
                    expr = self.parse_subscript(expr)?;
                }
                _ => return Ok(expr),
            }
        }
    }

    /// Everything after `base[`: traversal, element, slice or filter.
    fn parse_subscript(&mut self, base: Expr) -> Result<Expr, ParseError> {
        if self.eat(&Token::RBracket) {
            return Ok(Expr::Traverse(Box::new(base)));
        }
        let inner = self.parse_or()?;
        let inclusive = match self.peek() {
            Token::Range => Some(true),
            Token::Ellipsis => Some(false),
            _ => None,
        };
        let expr = if let Some(inclusive) = inclusive {
            self.advance();
            let end = self.parse_or()?;
            Expr::Slice {
                base: Box::new(base),
                start: Box::new(inner),
                end: Box::new(end),
                inclusive,
            }
        } else if let Expr::IntLiteral(index) = inner {
            Expr::Element(Box::new(base), index)
        } else {
            Expr::Filter(Box::new(base), Box::new(inner))
        };
        self.expect(&Token::RBracket)?;
        Ok(expr)
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        let expr = match self.peek().clone() {
            Token::Star => Expr::Everything,
            Token::At => Expr::This,
            Token::Caret => Expr::Parent,
            Token::String(s) => Expr::StringLiteral(s),
            Token::Integer(n) => Expr::IntLiteral(n),
            Token::Float(n) => Expr::FloatLiteral(n),
            Token::Bool(b) => Expr::BoolLiteral(b),
            Token::Null => Expr::Null,
            Token::Param(name) => Expr::Param(name),
            Token::Ident(name) => {
                self.advance();
                if self.eat(&Token::LParen) {
                    let args = self.parse_arguments()?;
                    return Ok(Expr::FuncCall(name, args));
                }
                return Ok(Expr::Ident(name));
            }
            Token::LParen => {
                self.advance();
                let expr = self.parse_expr()?;
                self.expect(&Token::RParen)?;
                return Ok(expr);
            }
            Token::LBracket => {
                self.advance();
                let mut items = Vec::new();
                if !self.eat(&Token::RBracket) {
                    loop {
                        items.push(self.parse_expr()?);
                        if !self.eat(&Token::Comma) {
                            break;
                        }
                    }
                    self.expect(&Token::RBracket)?;
                }
                return Ok(Expr::Array(items));
            }
            Token::LBrace => {
                self.advance();
                let fields = self.parse_projection()?;
                return Ok(Expr::Projection(Box::new(Expr::This), fields));
            }
            _ => return Err(self.unexpected("expression")),
        };
        self.advance();
        Ok(expr)
    }

    /// Arguments after `name(`, consuming the closing parenthesis.
    fn parse_arguments(&mut self) -> Result<Vec<Expr>, ParseError> {
        let mut args = Vec::new();
        if self.eat(&Token::RParen) {
            return Ok(args);
        }
        loop {
            args.push(self.parse_expr()?);
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        self.expect(&Token::RParen)?;
        Ok(args)
    }

    /// Fields after `{`, consuming the closing brace.
    fn parse_projection(&mut self) -> Result<Vec<ProjectionField>, ParseError> {
        let mut fields = Vec::new();
        while !self.eat(&Token::RBrace) {
            if self.eat(&Token::Ellipsis) {
                fields.push(ProjectionField::Spread);
            } else if let (Token::String(alias), Some(Token::Colon)) = (
                self.peek().clone(),
                self.tokens.get(self.pos + 1).map(|t| &t.token),
            ) {
                self.pos += 2;
                let value = self.parse_expr()?;
                fields.push(ProjectionField::Named(alias, value));
            } else {
                let start = self.position();
                let expr = self.parse_expr()?;
                if self.eat(&Token::Colon) {
                    let Expr::Ident(name) = expr else {
                        return Err(ParseError::UnnamedProjectionField(start));
                    };
                    let value = self.parse_expr()?;
                    fields.push(ProjectionField::Named(name, value));
                } else {
                    let name = root_name(&expr)
                        .ok_or(ParseError::UnnamedProjectionField(start))?
                        .to_string();
                    fields.push(ProjectionField::Named(name, expr));
                }
            }

            if !self.eat(&Token::Comma) {
                self.expect(&Token::RBrace)?;
                break;
            }
        }
        Ok(fields)
    }
}

/// The attribute a bare projection entry like `agent->{name}` is stored under.
fn root_name(expr: &Expr) -> Option<&str> {
    match expr {
        Expr::Ident(name) => Some(name),
        Expr::DotAccess(base, field) => match base.as_ref() {
            Expr::Deref(_) => Some(field),
            _ => root_name(base),
        },
        Expr::Deref(base)
        | Expr::Traverse(base)
        | Expr::Projection(base, _)
        | Expr::Filter(base, _)
        | Expr::Element(base, _)
        | Expr::Slice { base, .. }
        | Expr::Order(base, _) => root_name(base),
        _ => None,
    }
}
