//! Recursive-descent parser for the expression sub-language.
//!
//! Precedence, loosest first: `||`, `&&`, equality (`==` `!=`), relational
//! (`<` `<=` `>` `>=`), unary `!`, then the postfix chain of member access,
//! index access and splat.

use super::ast::{CompareKind, LogicalKind, Node};
use super::lexer::{Lexer, Token, TokenKind};
use super::ExprError;

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

/// Parse one expression terminated by the `}}` sentinel.
pub fn parse(src: &str) -> Result<Node, ExprError> {
    let tokens = Lexer::new(src).tokenize()?;
    Parser { tokens, pos: 0 }.parse_root()
}

impl Parser {
    fn parse_root(&mut self) -> Result<Node, ExprError> {
        let node = self.parse_or()?;
        let next = self.peek();
        if next.kind != TokenKind::End {
            return Err(self.error(next.clone(), "unexpected token after expression"));
        }
        Ok(node)
    }

    fn parse_or(&mut self) -> Result<Node, ExprError> {
        let mut left = self.parse_and()?;
        while self.peek().kind == TokenKind::Or {
            self.advance();
            let right = self.parse_and()?;
            left = Node::Logical {
                kind: LogicalKind::Or,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Node, ExprError> {
        let mut left = self.parse_equality()?;
        while self.peek().kind == TokenKind::And {
            self.advance();
            let right = self.parse_equality()?;
            left = Node::Logical {
                kind: LogicalKind::And,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_equality(&mut self) -> Result<Node, ExprError> {
        let mut left = self.parse_relational()?;
        loop {
            let kind = match self.peek().kind {
                TokenKind::Eq => CompareKind::Eq,
                TokenKind::NotEq => CompareKind::NotEq,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.parse_relational()?;
            left = Node::Compare {
                kind,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
    }

    fn parse_relational(&mut self) -> Result<Node, ExprError> {
        let mut left = self.parse_unary()?;
        loop {
            let kind = match self.peek().kind {
                TokenKind::Less => CompareKind::Less,
                TokenKind::LessEq => CompareKind::LessEq,
                TokenKind::Greater => CompareKind::Greater,
                TokenKind::GreaterEq => CompareKind::GreaterEq,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.parse_unary()?;
            left = Node::Compare {
                kind,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
    }

    fn parse_unary(&mut self) -> Result<Node, ExprError> {
        if self.peek().kind == TokenKind::Not {
            let token = self.advance().clone();
            let operand = self.parse_unary()?;
            return Ok(Node::Not {
                operand: Box::new(operand),
                token,
            });
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Result<Node, ExprError> {
        let mut node = self.parse_primary()?;
        loop {
            match self.peek().kind {
                TokenKind::Dot => {
                    self.advance();
                    let next = self.peek().clone();
                    match next.kind {
                        TokenKind::Star => {
                            self.advance();
                            node = Node::Splat {
                                receiver: Box::new(node),
                            };
                        }
                        // reserved words are fine as property names
                        TokenKind::Ident
                        | TokenKind::True
                        | TokenKind::False
                        | TokenKind::Null => {
                            self.advance();
                            node = Node::Member {
                                receiver: Box::new(node),
                                property: next.value,
                            };
                        }
                        _ => {
                            return Err(
                                self.error(next, "expected property name or '*' after '.'")
                            );
                        }
                    }
                }
                TokenKind::LeftBracket => {
                    self.advance();
                    let index = self.parse_or()?;
                    self.expect(TokenKind::RightBracket, "expected ']' after index")?;
                    node = Node::Index {
                        receiver: Box::new(node),
                        index: Box::new(index),
                    };
                }
                _ => return Ok(node),
            }
        }
    }

    fn parse_primary(&mut self) -> Result<Node, ExprError> {
        let token = self.advance().clone();
        match token.kind {
            TokenKind::LeftParen => {
                let node = self.parse_or()?;
                self.expect(TokenKind::RightParen, "expected ')'")?;
                Ok(node)
            }
            TokenKind::Null => Ok(Node::Null { token }),
            TokenKind::True => Ok(Node::Bool { value: true, token }),
            TokenKind::False => Ok(Node::Bool { value: false, token }),
            TokenKind::Int => {
                let value = token.value.parse::<i64>().map_err(|_| {
                    self.error(token.clone(), "integer literal out of range")
                })?;
                Ok(Node::Int { value, token })
            }
            TokenKind::Float => {
                let value = token.value.parse::<f64>().map_err(|_| {
                    self.error(token.clone(), "invalid float literal")
                })?;
                Ok(Node::Float { value, token })
            }
            TokenKind::String => Ok(Node::String {
                value: token.value.clone(),
                token,
            }),
            TokenKind::Ident => {
                if self.peek().kind == TokenKind::LeftParen {
                    self.advance();
                    let args = self.parse_call_args()?;
                    Ok(Node::Call {
                        callee: token.value.clone(),
                        args,
                        token,
                    })
                } else {
                    Ok(Node::Variable {
                        name: token.value.clone(),
                        token,
                    })
                }
            }
            _ => Err(self.error(token, "unexpected token")),
        }
    }

    fn parse_call_args(&mut self) -> Result<Vec<Node>, ExprError> {
        let mut args = Vec::new();
        if self.peek().kind == TokenKind::RightParen {
            self.advance();
            return Ok(args);
        }
        loop {
            args.push(self.parse_or()?);
            let next = self.advance().clone();
            match next.kind {
                TokenKind::Comma => {
                    // a trailing comma before ')' is a syntax error
                    if self.peek().kind == TokenKind::RightParen {
                        let tok = self.peek().clone();
                        return Err(self.error(tok, "trailing comma in function arguments"));
                    }
                }
                TokenKind::RightParen => return Ok(args),
                _ => return Err(self.error(next, "expected ',' or ')' in function arguments")),
            }
        }
    }

    fn peek(&self) -> &Token {
        // the token stream always ends with the End sentinel
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) -> &Token {
        let idx = self.pos.min(self.tokens.len() - 1);
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        &self.tokens[idx]
    }

    fn expect(&mut self, kind: TokenKind, message: &str) -> Result<&Token, ExprError> {
        let token = self.advance().clone();
        if token.kind != kind {
            return Err(self.error(token, message));
        }
        let idx = self.pos - 1;
        Ok(&self.tokens[idx])
    }

    fn error(&self, token: Token, message: &str) -> ExprError {
        ExprError::Parse {
            line: token.line,
            column: token.column,
            offset: token.offset,
            message: format!("{message}, got {:?}", token.value),
        }
    }
}
