//! Recursive descent parser with precedence climbing for binary operators.

use super::QueryError;
use super::lexer::{Lexeme, Lexer};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    /// `$`: the evaluation context.
    Context,
    /// A bare field name, looked up on the context.
    Field(String),
    Variable(String),
    Negate(Box<Expr>),
    Binary {
        left: Box<Expr>,
        op: BinaryOp,
        right: Box<Expr>,
    },
    PropertyAccess {
        object: Box<Expr>,
        property: String,
    },
    IndexAccess {
        object: Box<Expr>,
        index: Box<Expr>,
    },
    FunctionCall {
        name: String,
        args: Vec<Expr>,
    },
    Conditional {
        condition: Box<Expr>,
        then_expr: Box<Expr>,
        else_expr: Option<Box<Expr>>,
    },
    Array(Vec<Expr>),
    Object(Vec<(Expr, Expr)>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Concat,
    Equal,
    NotEqual,
    LessThan,
    LessEqual,
    GreaterThan,
    GreaterEqual,
    And,
    Or,
}

pub struct Parser {
    tokens: Vec<(Lexeme, usize)>,
    position: usize,
}

impl Parser {
    pub fn new(tokens: Vec<(Lexeme, usize)>) -> Self {
        Self {
            tokens,
            position: 0,
        }
    }

    /// Parse a complete expression; trailing input is an error.
    pub fn parse(input: &str) -> Result<Expr, QueryError> {
        let mut parser = Self::new(Lexer::new(input).tokenize()?);
        let expr = parser.parse_expression()?;
        if parser.current() != &Lexeme::Eof {
            return Err(parser.error(format!("unexpected {:?}", parser.current())));
        }
        Ok(expr)
    }

    fn parse_expression(&mut self) -> Result<Expr, QueryError> {
        let condition = self.parse_binary_expression(1)?;
        if !self.match_token(&Lexeme::Question) {
            return Ok(condition);
        }
        let then_expr = Box::new(self.parse_expression()?);
        let else_expr = if self.match_token(&Lexeme::Colon) {
            Some(Box::new(self.parse_expression()?))
        } else {
            None
        };
        Ok(Expr::Conditional {
            condition: Box::new(condition),
            then_expr,
            else_expr,
        })
    }

    fn parse_binary_expression(&mut self, min_precedence: u8) -> Result<Expr, QueryError> {
        let mut left = self.parse_unary_expression()?;

        loop {
            let precedence = self.current().precedence();
            if precedence == 0 || precedence < min_precedence {
                break;
            }
            let op = match self.current() {
                Lexeme::Plus => BinaryOp::Add,
                Lexeme::Minus => BinaryOp::Subtract,
                Lexeme::Star => BinaryOp::Multiply,
                Lexeme::Slash => BinaryOp::Divide,
                Lexeme::Percent => BinaryOp::Modulo,
                Lexeme::Ampersand => BinaryOp::Concat,
                Lexeme::Equal => BinaryOp::Equal,
                Lexeme::NotEqual => BinaryOp::NotEqual,
                Lexeme::LessThan => BinaryOp::LessThan,
                Lexeme::LessEqual => BinaryOp::LessEqual,
                Lexeme::GreaterThan => BinaryOp::GreaterThan,
                Lexeme::GreaterEqual => BinaryOp::GreaterEqual,
                Lexeme::Name(n) if n == "and" => BinaryOp::And,
                Lexeme::Name(n) if n == "or" => BinaryOp::Or,
                other => return Err(self.error(format!("unexpected operator {:?}", other))),
            };
            self.advance();

            let right = self.parse_binary_expression(precedence + 1)?;
            left = Expr::Binary {
                left: Box::new(left),
                op,
                right: Box::new(right),
            };
        }

        Ok(left)
    }

    fn parse_unary_expression(&mut self) -> Result<Expr, QueryError> {
        if self.match_token(&Lexeme::Minus) {
            let expr = self.parse_unary_expression()?;
            return Ok(Expr::Negate(Box::new(expr)));
        }
        self.parse_postfix_expression()
    }

    fn parse_postfix_expression(&mut self) -> Result<Expr, QueryError> {
        let mut expr = self.parse_primary_expression()?;

        loop {
            match self.current() {
                Lexeme::Dot => {
                    self.advance();
                    let property = match self.current().clone() {
                        Lexeme::Name(name) => name,
                        Lexeme::String(name) => name,
                        other => {
                            return Err(
                                self.error(format!("expected property name after '.', got {:?}", other))
                            );
                        }
                    };
                    self.advance();
                    expr = Expr::PropertyAccess {
                        object: Box::new(expr),
                        property,
                    };
                }
                Lexeme::LeftBracket => {
                    self.advance();
                    let index = self.parse_expression()?;
                    self.expect_token(Lexeme::RightBracket)?;
                    expr = Expr::IndexAccess {
                        object: Box::new(expr),
                        index: Box::new(index),
                    };
                }
                _ => break,
            }
        }

        Ok(expr)
    }

    fn parse_primary_expression(&mut self) -> Result<Expr, QueryError> {
        match self.current().clone() {
            Lexeme::Number(n) => {
                self.advance();
                Ok(Expr::Literal(number_value(n)))
            }
            Lexeme::String(s) => {
                self.advance();
                Ok(Expr::Literal(Value::String(s)))
            }
            Lexeme::Name(name) => {
                self.advance();
                Ok(match name.as_str() {
                    "true" => Expr::Literal(Value::Bool(true)),
                    "false" => Expr::Literal(Value::Bool(false)),
                    "null" => Expr::Literal(Value::Null),
                    _ => Expr::Field(name),
                })
            }
            Lexeme::Variable(name) => {
                self.advance();
                if name.is_empty() {
                    return Ok(Expr::Context);
                }
                if self.current() == &Lexeme::LeftParen {
                    let args = self.parse_function_args()?;
                    return Ok(Expr::FunctionCall { name, args });
                }
                Ok(Expr::Variable(name))
            }
            Lexeme::LeftParen => {
                self.advance();
                let expr = self.parse_expression()?;
                self.expect_token(Lexeme::RightParen)?;
                Ok(expr)
            }
            Lexeme::LeftBracket => {
                self.advance();
                let mut elements = Vec::new();
                if self.current() != &Lexeme::RightBracket {
                    loop {
                        elements.push(self.parse_expression()?);
                        if !self.match_token(&Lexeme::Comma) {
                            break;
                        }
                    }
                }
                self.expect_token(Lexeme::RightBracket)?;
                Ok(Expr::Array(elements))
            }
            Lexeme::LeftBrace => {
                self.advance();
                let mut pairs = Vec::new();
                if self.current() != &Lexeme::RightBrace {
                    loop {
                        let key = self.parse_binary_expression(1)?;
                        self.expect_token(Lexeme::Colon)?;
                        let value = self.parse_expression()?;
                        pairs.push((key, value));
                        if !self.match_token(&Lexeme::Comma) {
                            break;
                        }
                    }
                }
                self.expect_token(Lexeme::RightBrace)?;
                Ok(Expr::Object(pairs))
            }
            other => Err(self.error(format!("unexpected {:?}", other))),
        }
    }

    fn parse_function_args(&mut self) -> Result<Vec<Expr>, QueryError> {
        self.expect_token(Lexeme::LeftParen)?;
        let mut args = Vec::new();
        if self.current() != &Lexeme::RightParen {
            loop {
                args.push(self.parse_expression()?);
                if !self.match_token(&Lexeme::Comma) {
                    break;
                }
            }
        }
        self.expect_token(Lexeme::RightParen)?;
        Ok(args)
    }

    fn current(&self) -> &Lexeme {
        self.tokens
            .get(self.position)
            .map(|(lexeme, _)| lexeme)
            .unwrap_or(&Lexeme::Eof)
    }

    fn advance(&mut self) {
        if self.position < self.tokens.len() {
            self.position += 1;
        }
    }

    fn match_token(&mut self, expected: &Lexeme) -> bool {
        if self.current() == expected {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect_token(&mut self, expected: Lexeme) -> Result<(), QueryError> {
        if self.current() == &expected {
            self.advance();
            Ok(())
        } else {
            Err(self.error(format!("expected {:?}, got {:?}", expected, self.current())))
        }
    }

    fn error(&self, message: String) -> QueryError {
        let position = self
            .tokens
            .get(self.position)
            .map(|(_, offset)| *offset)
            .unwrap_or_default();
        QueryError::Syntax { position, message }
    }
}

/// Integral literals stay integers so `1 + 1` renders as `2`.
pub(crate) fn number_value(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < 9.0e15 {
        Value::from(n as i64)
    } else {
        serde_json::Number::from_f64(n).map_or(Value::Null, Value::Number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_precedence() {
        let expr = Parser::parse("1 + 2 * 3").unwrap();
        assert_eq!(
            expr,
            Expr::Binary {
                left: Box::new(Expr::Literal(json!(1))),
                op: BinaryOp::Add,
                right: Box::new(Expr::Binary {
                    left: Box::new(Expr::Literal(json!(2))),
                    op: BinaryOp::Multiply,
                    right: Box::new(Expr::Literal(json!(3))),
                }),
            }
        );
    }

    #[test]
    fn test_path_with_index() {
        let expr = Parser::parse("users[0].name").unwrap();
        assert_eq!(
            expr,
            Expr::PropertyAccess {
                object: Box::new(Expr::IndexAccess {
                    object: Box::new(Expr::Field("users".into())),
                    index: Box::new(Expr::Literal(json!(0))),
                }),
                property: "name".into(),
            }
        );
    }

    #[test]
    fn test_function_call_and_ternary() {
        let expr = Parser::parse("$exists(a) ? 'yes' : 'no'").unwrap();
        assert!(matches!(expr, Expr::Conditional { else_expr: Some(_), .. }));
    }

    #[test]
    fn test_trailing_input_is_an_error() {
        assert!(Parser::parse("a b").is_err());
        assert!(Parser::parse("(1").is_err());
    }
}
