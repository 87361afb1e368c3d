// crates/scenario-expr/src/eval.rs
// ============================================================================
// Module: Expression Evaluator
// Description: Evaluates a parsed `Expr` against a variable lookup.
// Purpose: Implement C1 of the scenario engine: arithmetic / comparison /
//          min-max evaluation with named variables.
// Dependencies: crate::ast, crate::parser, std::collections::HashMap
// ============================================================================

use std::collections::HashMap;
use std::fmt;

use crate::ast::BinOp;
use crate::ast::Expr;
use crate::ast::UnOp;
use crate::is_truthy;
use crate::parser::ParseError;
use crate::parser::parse;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors produced while evaluating an expression.
///
/// # Invariants
/// - Variants are stable for programmatic matching.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EvalError {
    /// The expression text failed to parse.
    Parse(ParseError),
    /// An identifier had no binding in the supplied lookup.
    UnknownIdentifier {
        /// The unresolved identifier.
        name: String,
    },
    /// A function call used an unrecognized name.
    UnknownFunction {
        /// The unrecognized function name.
        name: String,
    },
    /// A function call was given the wrong number of arguments.
    ArityMismatch {
        /// The function name.
        name: String,
        /// Number of arguments expected.
        expected: usize,
        /// Number of arguments actually supplied.
        found: usize,
    },
    /// Division by zero.
    DivisionByZero,
}

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parse(err) => write!(f, "{err}"),
            Self::UnknownIdentifier { name } => write!(f, "unknown identifier '{name}'"),
            Self::UnknownFunction { name } => write!(f, "unknown function '{name}'"),
            Self::ArityMismatch { name, expected, found } => {
                write!(f, "'{name}' expects {expected} argument(s), found {found}")
            }
            Self::DivisionByZero => write!(f, "division by zero"),
        }
    }
}

impl std::error::Error for EvalError {}

impl From<ParseError> for EvalError {
    fn from(err: ParseError) -> Self {
        Self::Parse(err)
    }
}

// ============================================================================
// SECTION: Variable lookup
// ============================================================================

/// Resolves identifiers referenced by an expression to their numeric value.
///
/// Implemented for `HashMap<String, f64>` directly, and for any
/// `Fn(&str) -> Option<f64>` closure, mirroring the resolver-trait shape used
/// elsewhere in the scenario engine for symbol tables.
pub trait Lookup {
    /// Returns the value bound to `name`, or `None` if unbound.
    fn lookup(&self, name: &str) -> Option<f64>;
}

impl Lookup for HashMap<String, f64> {
    fn lookup(&self, name: &str) -> Option<f64> {
        self.get(name).copied()
    }
}

impl<F> Lookup for F
where
    F: Fn(&str) -> Option<f64>,
{
    fn lookup(&self, name: &str) -> Option<f64> {
        (self)(name)
    }
}

// ============================================================================
// SECTION: Public evaluation entry points
// ============================================================================

/// Parses and evaluates `expr` against `lookup` in one step.
///
/// # Errors
///
/// Returns [`EvalError`] on parse failure, an unresolved identifier, an
/// unknown function, a call with the wrong arity, or division by zero.
pub fn eval<L: Lookup>(expr: &str, lookup: &L) -> Result<f64, EvalError> {
    let ast = parse(expr)?;
    eval_with(&ast, lookup)
}

/// Evaluates an already-parsed expression tree against `lookup`.
///
/// # Errors
///
/// See [`eval`].
pub fn eval_with<L: Lookup>(expr: &Expr, lookup: &L) -> Result<f64, EvalError> {
    match expr {
        Expr::Number(value) => Ok(*value),
        Expr::Ident(name) => {
            lookup.lookup(name).ok_or_else(|| EvalError::UnknownIdentifier { name: name.clone() })
        }
        Expr::Unary(op, inner) => {
            let value = eval_with(inner, lookup)?;
            Ok(match op {
                UnOp::Plus => value,
                UnOp::Minus => -value,
            })
        }
        Expr::Binary(op, lhs, rhs) => eval_binary(*op, lhs, rhs, lookup),
        Expr::Call(name, args) => eval_call(name, args, lookup),
    }
}

fn eval_binary<L: Lookup>(op: BinOp, lhs: &Expr, rhs: &Expr, lookup: &L) -> Result<f64, EvalError> {
    // Logical operators short-circuit like their Rust/C counterparts.
    match op {
        BinOp::Or => {
            let l = eval_with(lhs, lookup)?;
            if is_truthy(l) {
                return Ok(1.0);
            }
            let r = eval_with(rhs, lookup)?;
            return Ok(f64::from(is_truthy(r)));
        }
        BinOp::And => {
            let l = eval_with(lhs, lookup)?;
            if !is_truthy(l) {
                return Ok(0.0);
            }
            let r = eval_with(rhs, lookup)?;
            return Ok(f64::from(is_truthy(r)));
        }
        _ => {}
    }

    let l = eval_with(lhs, lookup)?;
    let r = eval_with(rhs, lookup)?;
    match op {
        BinOp::Eq => Ok(f64::from((l - r).abs() <= crate::EQUALITY_TOLERANCE)),
        BinOp::NotEq => Ok(f64::from((l - r).abs() > crate::EQUALITY_TOLERANCE)),
        BinOp::Lt => Ok(f64::from(l < r)),
        BinOp::LtEq => Ok(f64::from(l <= r)),
        BinOp::Gt => Ok(f64::from(l > r)),
        BinOp::GtEq => Ok(f64::from(l >= r)),
        BinOp::Add => Ok(l + r),
        BinOp::Sub => Ok(l - r),
        BinOp::Mul => Ok(l * r),
        BinOp::Div => {
            if r == 0.0 {
                Err(EvalError::DivisionByZero)
            } else {
                Ok(l / r)
            }
        }
        BinOp::Pow => Ok(l.powf(r)),
        BinOp::Or | BinOp::And => unreachable!("handled above"),
    }
}

fn eval_call<L: Lookup>(name: &str, args: &[Expr], lookup: &L) -> Result<f64, EvalError> {
    match name {
        "min" | "max" => {
            if args.len() != 2 {
                return Err(EvalError::ArityMismatch {
                    name: name.to_string(),
                    expected: 2,
                    found: args.len(),
                });
            }
            let a = eval_with(&args[0], lookup)?;
            let b = eval_with(&args[1], lookup)?;
            Ok(if name == "min" { a.min(b) } else { a.max(b) })
        }
        other => Err(EvalError::UnknownFunction { name: other.to_string() }),
    }
}
