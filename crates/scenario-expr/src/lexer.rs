// crates/scenario-expr/src/lexer.rs
// ============================================================================
// Module: Expression Lexer
// Description: Tokenizes scenario expression text for the recursive-descent
//              parser.
// Purpose: Split raw expression text into spanned tokens, reporting byte
//          offsets for error messages.
// Dependencies: none
// ============================================================================

// ============================================================================
// SECTION: Tokens
// ============================================================================

/// Lexer token produced from expression text.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Token<'a> {
    /// Identifier token (`[A-Za-z_$][A-Za-z0-9_$]*`).
    Ident(&'a str),
    /// Numeric literal token, not yet parsed into `f64`.
    Number(&'a str),
    /// `(`
    LParen,
    /// `)`
    RParen,
    /// `,`
    Comma,
    /// `||`
    OrOr,
    /// `&&`
    AndAnd,
    /// `==`
    EqEq,
    /// `!=`
    NotEq,
    /// `<=`
    LtEq,
    /// `>=`
    GtEq,
    /// `<`
    Lt,
    /// `>`
    Gt,
    /// `+`
    Plus,
    /// `-`
    Minus,
    /// `*`
    Star,
    /// `/`
    Slash,
    /// `^`
    Caret,
    /// End-of-input marker.
    Eof,
}

/// Token paired with its byte offset in the source.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SpannedToken<'a> {
    /// Token value.
    pub token: Token<'a>,
    /// Byte offset into the source string.
    pub position: usize,
}

/// Lexer error, mapped 1-to-1 onto `ParseError::UnexpectedChar`/`UnexpectedEof`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum LexError {
    /// An unrecognized character was encountered.
    UnexpectedChar {
        /// The offending character.
        found: char,
        /// Byte offset in the original input.
        position: usize,
    },
    /// Input ended mid-token (e.g. a lone `&`).
    #[allow(dead_code, reason = "reserved for future multi-byte operator lexing")]
    UnexpectedEof {
        /// Byte offset in the original input.
        position: usize,
    },
}

// ============================================================================
// SECTION: Lexer
// ============================================================================

/// Tokenizes `input` into a sequence of spanned tokens terminated by `Eof`.
pub(crate) fn lex(input: &str) -> Result<Vec<SpannedToken<'_>>, LexError> {
    let bytes = input.as_bytes();
    let mut offset = 0usize;
    let mut tokens = Vec::new();

    while offset < bytes.len() {
        let ch = bytes[offset];
        match ch {
            b' ' | b'\t' | b'\n' | b'\r' => {
                offset += 1;
            }
            b'(' => {
                tokens.push(SpannedToken { token: Token::LParen, position: offset });
                offset += 1;
            }
            b')' => {
                tokens.push(SpannedToken { token: Token::RParen, position: offset });
                offset += 1;
            }
            b',' => {
                tokens.push(SpannedToken { token: Token::Comma, position: offset });
                offset += 1;
            }
            b'+' => {
                tokens.push(SpannedToken { token: Token::Plus, position: offset });
                offset += 1;
            }
            b'-' => {
                tokens.push(SpannedToken { token: Token::Minus, position: offset });
                offset += 1;
            }
            b'*' => {
                tokens.push(SpannedToken { token: Token::Star, position: offset });
                offset += 1;
            }
            b'/' => {
                tokens.push(SpannedToken { token: Token::Slash, position: offset });
                offset += 1;
            }
            b'^' => {
                tokens.push(SpannedToken { token: Token::Caret, position: offset });
                offset += 1;
            }
            b'|' => {
                if bytes.get(offset + 1) == Some(&b'|') {
                    tokens.push(SpannedToken { token: Token::OrOr, position: offset });
                    offset += 2;
                } else {
                    return Err(LexError::UnexpectedChar { found: '|', position: offset });
                }
            }
            b'&' => {
                if bytes.get(offset + 1) == Some(&b'&') {
                    tokens.push(SpannedToken { token: Token::AndAnd, position: offset });
                    offset += 2;
                } else {
                    return Err(LexError::UnexpectedChar { found: '&', position: offset });
                }
            }
            b'=' => {
                if bytes.get(offset + 1) == Some(&b'=') {
                    tokens.push(SpannedToken { token: Token::EqEq, position: offset });
                    offset += 2;
                } else {
                    return Err(LexError::UnexpectedChar { found: '=', position: offset });
                }
            }
            b'!' => {
                if bytes.get(offset + 1) == Some(&b'=') {
                    tokens.push(SpannedToken { token: Token::NotEq, position: offset });
                    offset += 2;
                } else {
                    return Err(LexError::UnexpectedChar { found: '!', position: offset });
                }
            }
            b'<' => {
                if bytes.get(offset + 1) == Some(&b'=') {
                    tokens.push(SpannedToken { token: Token::LtEq, position: offset });
                    offset += 2;
                } else {
                    tokens.push(SpannedToken { token: Token::Lt, position: offset });
                    offset += 1;
                }
            }
            b'>' => {
                if bytes.get(offset + 1) == Some(&b'=') {
                    tokens.push(SpannedToken { token: Token::GtEq, position: offset });
                    offset += 2;
                } else {
                    tokens.push(SpannedToken { token: Token::Gt, position: offset });
                    offset += 1;
                }
            }
            b'0'..=b'9' | b'.' => {
                let start = offset;
                offset = consume_while(bytes, offset, |b| b.is_ascii_digit() || b == b'.');
                // Accept an exponent suffix (`1e-3`).
                if matches!(bytes.get(offset), Some(b'e' | b'E')) {
                    let mut lookahead = offset + 1;
                    if matches!(bytes.get(lookahead), Some(b'+' | b'-')) {
                        lookahead += 1;
                    }
                    if matches!(bytes.get(lookahead), Some(b'0'..=b'9')) {
                        offset = consume_while(bytes, lookahead, |b| b.is_ascii_digit());
                    }
                }
                tokens.push(SpannedToken {
                    token: Token::Number(&input[start..offset]),
                    position: start,
                });
            }
            b'A'..=b'Z' | b'a'..=b'z' | b'_' | b'$' => {
                let start = offset;
                offset = consume_while(bytes, offset, |b| {
                    b.is_ascii_alphanumeric() || b == b'_' || b == b'$'
                });
                tokens.push(SpannedToken {
                    token: Token::Ident(&input[start..offset]),
                    position: start,
                });
            }
            other => {
                return Err(LexError::UnexpectedChar { found: char::from(other), position: offset });
            }
        }
    }

    tokens.push(SpannedToken { token: Token::Eof, position: offset });
    Ok(tokens)
}

/// Advances `offset` while `pred` holds for the current byte.
fn consume_while(bytes: &[u8], mut offset: usize, pred: impl Fn(u8) -> bool) -> usize {
    while let Some(&b) = bytes.get(offset) {
        if pred(b) {
            offset += 1;
        } else {
            break;
        }
    }
    offset
}
