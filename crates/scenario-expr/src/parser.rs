// crates/scenario-expr/src/parser.rs
// ============================================================================
// Module: Expression Parser
// Description: Recursive-descent / precedence-climbing parser building an
//              `Expr` tree from lexed tokens.
// Purpose: Implement the grammar documented in `scenario_expr` crate docs.
// Dependencies: crate::ast, crate::lexer
// ============================================================================

use std::fmt;

use crate::ast::BinOp;
use crate::ast::Expr;
use crate::ast::UnOp;
use crate::lexer::LexError;
use crate::lexer::SpannedToken;
use crate::lexer::Token;
use crate::lexer::lex;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors produced while parsing a scenario expression.
///
/// # Invariants
/// - Variants are stable for programmatic matching by callers that want to
///   distinguish syntax errors from evaluation errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// The expression text was empty.
    UnexpectedEof {
        /// Byte offset where more input was expected.
        position: usize,
    },
    /// A character outside the grammar's alphabet was encountered.
    UnexpectedChar {
        /// The offending character.
        found: char,
        /// Byte offset in the original input.
        position: usize,
    },
    /// A token was present but not valid at that point in the grammar.
    UnexpectedToken {
        /// Human-readable description of what was expected.
        expected: &'static str,
        /// Byte offset in the original input.
        position: usize,
    },
    /// Trailing tokens remained after a complete expression was parsed.
    TrailingInput {
        /// Byte offset where unexpected input begins.
        position: usize,
    },
    /// A numeric literal failed to parse.
    InvalidNumber {
        /// The raw numeric text.
        raw: String,
        /// Byte offset in the original input.
        position: usize,
    },
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnexpectedEof { position } => {
                write!(f, "unexpected end of expression at {position}")
            }
            Self::UnexpectedChar { found, position } => {
                write!(f, "unexpected character '{found}' at {position}")
            }
            Self::UnexpectedToken { expected, position } => {
                write!(f, "unexpected token at {position}, expected {expected}")
            }
            Self::TrailingInput { position } => {
                write!(f, "unexpected trailing input at {position}")
            }
            Self::InvalidNumber { raw, position } => {
                write!(f, "invalid number '{raw}' at {position}")
            }
        }
    }
}

impl std::error::Error for ParseError {}

impl From<LexError> for ParseError {
    fn from(err: LexError) -> Self {
        match err {
            LexError::UnexpectedChar { found, position } => Self::UnexpectedChar { found, position },
            LexError::UnexpectedEof { position } => Self::UnexpectedEof { position },
        }
    }
}

/// Parses `input` into an [`Expr`] tree.
///
/// # Errors
///
/// Returns [`ParseError`] for lexical errors, malformed syntax, or trailing
/// input after a complete expression.
pub fn parse(input: &str) -> Result<Expr, ParseError> {
    let tokens = lex(input)?;
    let mut parser = Parser { tokens: &tokens, pos: 0 };
    let expr = parser.parse_or()?;
    parser.expect_eof()?;
    Ok(expr)
}

// ============================================================================
// SECTION: Precedence-climbing parser
// ============================================================================

/// Recursive-descent parser walking the spanned token stream.
struct Parser<'a, 'b> {
    /// Full token stream, terminated by `Eof`.
    tokens: &'b [SpannedToken<'a>],
    /// Index of the next unconsumed token.
    pos: usize,
}

impl<'a> Parser<'a, '_> {
    fn current(&self) -> SpannedToken<'a> {
        self.tokens[self.pos]
    }

    fn advance(&mut self) -> SpannedToken<'a> {
        let tok = self.current();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn expect_eof(&self) -> Result<(), ParseError> {
        match self.current().token {
            Token::Eof => Ok(()),
            _ => Err(ParseError::TrailingInput { position: self.current().position }),
        }
    }

    /// `||`
    fn parse_or(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_and()?;
        while matches!(self.current().token, Token::OrOr) {
            self.advance();
            let rhs = self.parse_and()?;
            lhs = Expr::Binary(BinOp::Or, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    /// `&&`
    fn parse_and(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_equality()?;
        while matches!(self.current().token, Token::AndAnd) {
            self.advance();
            let rhs = self.parse_equality()?;
            lhs = Expr::Binary(BinOp::And, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    /// `==` `!=`
    fn parse_equality(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_comparison()?;
        loop {
            let op = match self.current().token {
                Token::EqEq => BinOp::Eq,
                Token::NotEq => BinOp::NotEq,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_comparison()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    /// `<` `<=` `>` `>=`
    fn parse_comparison(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_additive()?;
        loop {
            let op = match self.current().token {
                Token::Lt => BinOp::Lt,
                Token::LtEq => BinOp::LtEq,
                Token::Gt => BinOp::Gt,
                Token::GtEq => BinOp::GtEq,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_additive()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    /// `+` `-`
    fn parse_additive(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_multiplicative()?;
        loop {
            let op = match self.current().token {
                Token::Plus => BinOp::Add,
                Token::Minus => BinOp::Sub,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_multiplicative()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    /// `*` `/`
    fn parse_multiplicative(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.current().token {
                Token::Star => BinOp::Mul,
                Token::Slash => BinOp::Div,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_unary()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    /// Unary `+` `-`
    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        match self.current().token {
            Token::Plus => {
                self.advance();
                Ok(Expr::Unary(UnOp::Plus, Box::new(self.parse_unary()?)))
            }
            Token::Minus => {
                self.advance();
                Ok(Expr::Unary(UnOp::Minus, Box::new(self.parse_unary()?)))
            }
            _ => self.parse_power(),
        }
    }

    /// `^` is right-associative and binds tighter than unary, except that a
    /// leading sign is consumed first (`-2^2 == -(2^2)`).
    fn parse_power(&mut self) -> Result<Expr, ParseError> {
        let base = self.parse_primary()?;
        if matches!(self.current().token, Token::Caret) {
            self.advance();
            // Right-associative: recurse into parse_unary so `2^-2` and
            // `2^2^3` both parse as expected.
            let exponent = self.parse_unary()?;
            Ok(Expr::Binary(BinOp::Pow, Box::new(base), Box::new(exponent)))
        } else {
            Ok(base)
        }
    }

    /// number | identifier | call | `(` expr `)`
    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        let tok = self.current();
        match tok.token {
            Token::Number(raw) => {
                self.advance();
                let value: f64 = raw
                    .parse()
                    .map_err(|_err| ParseError::InvalidNumber { raw: raw.to_string(), position: tok.position })?;
                Ok(Expr::Number(value))
            }
            Token::Ident(name) => {
                self.advance();
                if matches!(self.current().token, Token::LParen) {
                    self.advance();
                    let args = self.parse_arg_list()?;
                    Ok(Expr::Call(name.to_string(), args))
                } else {
                    Ok(Expr::Ident(name.to_string()))
                }
            }
            Token::LParen => {
                self.advance();
                let inner = self.parse_or()?;
                match self.current().token {
                    Token::RParen => {
                        self.advance();
                        Ok(inner)
                    }
                    _ => Err(ParseError::UnexpectedToken { expected: "')'", position: self.current().position }),
                }
            }
            Token::Eof => Err(ParseError::UnexpectedEof { position: tok.position }),
            _ => Err(ParseError::UnexpectedToken {
                expected: "number, identifier, or '('",
                position: tok.position,
            }),
        }
    }

    fn parse_arg_list(&mut self) -> Result<Vec<Expr>, ParseError> {
        let mut args = Vec::new();
        if matches!(self.current().token, Token::RParen) {
            self.advance();
            return Ok(args);
        }
        loop {
            args.push(self.parse_or()?);
            match self.current().token {
                Token::Comma => {
                    self.advance();
                }
                Token::RParen => {
                    self.advance();
                    break;
                }
                _ => {
                    return Err(ParseError::UnexpectedToken {
                        expected: "',' or ')'",
                        position: self.current().position,
                    });
                }
            }
        }
        Ok(args)
    }
}
