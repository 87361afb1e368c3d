// crates/scenario-core/src/error.rs
// ============================================================================
// Module: Scenario Error
// Description: Top-level error type unifying the failure modes of this
//              crate.
// Purpose: Give `scenario-loader`/`scenario-engine` one error type to
//          convert into a `Report` via `From`, instead of matching on each
//          leaf error type individually.
// Dependencies: crate::report, crate::time, crate::vars, thiserror
// ============================================================================

//! ## Overview
//!
//! One `#[derive(thiserror::Error)]` enum per crate boundary, with `#[from]`
//! conversions from leaf error types so call sites can use `?` freely.
//! [`ScenarioError::code`] maps each variant onto the stable
//! [`crate::report::ReportCode`] taxonomy, so a caller only has to build a
//! [`crate::report::Report`] once at the point it actually reports.

use crate::report::ReportCode;
use crate::time::ClockTimeParseError;
use crate::vars::SubstitutionError;

/// Unified error type for scenario loading and execution.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ScenarioError {
    /// The scenario file's structure text could not be parsed.
    #[error("malformed scenario file: {0}")]
    Malformed(String),

    /// An action referenced a type name with no registration.
    #[error("unknown action type '{0}'")]
    UnknownActionType(String),

    /// A mandatory parameter was missing.
    #[error("action '{action}' is missing mandatory field(s): {}", .fields.join(", "))]
    MissingMandatoryField {
        /// The action-type name being validated.
        action: String,
        /// The missing field names.
        fields: Vec<String>,
    },

    /// An `include` structure referenced a file that could not be found.
    #[error("include target not found: {0}")]
    IncludeNotFound(String),

    /// More than one non-config scenario was loaded.
    #[error("more than one action scenario loaded (already have '{existing}', got '{new}')")]
    MultipleActionScenarios {
        /// The first-loaded scenario's name.
        existing: String,
        /// The second, rejected scenario's name.
        new: String,
    },

    /// A handler failed during execution.
    #[error("action '{action}' (#{number}) failed to execute: {reason}")]
    ActionExecutionFailed {
        /// The action-type name.
        action: String,
        /// The action's load-order number.
        number: u32,
        /// Human-readable cause.
        reason: String,
    },

    /// An `ASYNC` action outlived its `timeout`.
    #[error("action '{action}' (#{number}) timed out")]
    ActionTimeout {
        /// The action-type name.
        action: String,
        /// The action's load-order number.
        number: u32,
    },

    /// A requested pipeline state change failed.
    #[error("state change to {0} failed")]
    StateChangeFailure(String),

    /// `repeat` resolved to a non-integer expression result.
    #[error("'repeat' expression '{0}' did not evaluate to an integer")]
    NonIntegerRepeat(String),

    /// `$(name)` substitution failed.
    #[error(transparent)]
    Substitution(#[from] SubstitutionError),

    /// A clock-time literal failed to parse.
    #[error(transparent)]
    ClockTime(#[from] ClockTimeParseError),

    /// The expression evaluator rejected an expression.
    #[error("expression error: {0}")]
    Expression(String),
}

impl ScenarioError {
    /// Maps this error onto its stable [`ReportCode`].
    #[must_use]
    pub const fn code(&self) -> ReportCode {
        match self {
            Self::Malformed(_) => ReportCode::ScenarioFileMalformed,
            Self::UnknownActionType(_) => ReportCode::UnknownActionType,
            Self::MissingMandatoryField { .. } => ReportCode::MissingMandatoryField,
            Self::IncludeNotFound(_) => ReportCode::IncludeNotFound,
            Self::MultipleActionScenarios { .. } => ReportCode::MultipleActionScenarios,
            Self::ActionTimeout { .. } => ReportCode::ScenarioActionTimeout,
            Self::StateChangeFailure(_) => ReportCode::StateChangeFailure,
            Self::ActionExecutionFailed { .. }
            | Self::NonIntegerRepeat(_)
            | Self::Substitution(_)
            | Self::ClockTime(_)
            | Self::Expression(_) => ReportCode::ScenarioActionExecutionError,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_to_expected_report_code() {
        let err = ScenarioError::UnknownActionType("frobnicate".to_string());
        assert_eq!(err.code(), ReportCode::UnknownActionType);
    }

    #[test]
    fn transparent_variants_carry_their_display_through() {
        let err = ScenarioError::NonIntegerRepeat("duration / 2.5".to_string());
        assert!(err.to_string().contains("duration / 2.5"));
    }
}
