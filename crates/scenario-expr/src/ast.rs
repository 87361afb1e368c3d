// crates/scenario-expr/src/ast.rs
// ============================================================================
// Module: Expression AST
// Description: Parsed representation of a scenario expression.
// Purpose: Decouple parsing from evaluation so the tree can be inspected or
//          cached by callers (e.g. the loader re-parses `playback-time` once).
// Dependencies: none
// ============================================================================

// ============================================================================
// SECTION: Binary / Unary operators
// ============================================================================

/// Binary operator recognized by the grammar.
///
/// # Invariants
/// - Variants are ordered by ascending precedence grouping, not by
///   discriminant value; precedence itself lives in the parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    /// Logical OR (`||`).
    Or,
    /// Logical AND (`&&`).
    And,
    /// Equality (`==`).
    Eq,
    /// Inequality (`!=`).
    NotEq,
    /// Less than (`<`).
    Lt,
    /// Less than or equal (`<=`).
    LtEq,
    /// Greater than (`>`).
    Gt,
    /// Greater than or equal (`>=`).
    GtEq,
    /// Addition (`+`).
    Add,
    /// Subtraction (`-`).
    Sub,
    /// Multiplication (`*`).
    Mul,
    /// Division (`/`).
    Div,
    /// Right-associative power (`^`).
    Pow,
}

/// Unary prefix operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnOp {
    /// Unary plus (`+x`), a no-op kept for grammar completeness.
    Plus,
    /// Unary minus (`-x`).
    Minus,
}

// ============================================================================
// SECTION: Expression tree
// ============================================================================

/// A parsed scenario expression.
///
/// # Invariants
/// - `Call` argument lists are validated for arity only at evaluation time,
///   since built-in arity is a property of the evaluator, not the grammar.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Numeric literal.
    Number(f64),
    /// Identifier to be resolved through the caller's lookup.
    Ident(String),
    /// Function call, e.g. `min(a, b)`.
    Call(String, Vec<Expr>),
    /// Unary prefix expression.
    Unary(UnOp, Box<Expr>),
    /// Binary infix expression.
    Binary(BinOp, Box<Expr>, Box<Expr>),
}
