// crates/scenario-core/src/report.rs
// ============================================================================
// Module: Reporting Taxonomy
// Description: Report levels/codes and the `report(level, code, message)`
//              sink interface.
// Purpose: Translate internal errors/invariant violations into the single
//          external reporting surface the engine is allowed to use.
// Dependencies: std::collections::HashMap, std::fmt
// ============================================================================

//! ## Overview
//!
//! The report aggregator and its wire serializer are external collaborators:
//! this crate defines only the `report(level, code, message)` call shape
//! ([`Reporter`]) and the severity-override hook (`Overrides`) the engine is
//! required to consult before emitting a report. The trait is the contract,
//! concrete sinks live one layer up (`scenario-engine::reporting`).

use std::collections::HashMap;
use std::fmt;

// ============================================================================
// SECTION: Report Level
// ============================================================================

/// Severity of a reported event.
///
/// # Invariants
/// - Ordering is significant: `Critical > Warning > Issue` for the purpose
///   of the `fatal_*`/`print_*` configuration flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ReportLevel {
    /// Informational; never fatal.
    Issue,
    /// A likely-but-not-certain problem.
    Warning,
    /// A definite, scenario-ending-grade problem.
    Critical,
}

impl fmt::Display for ReportLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Issue => "issue",
            Self::Warning => "warning",
            Self::Critical => "critical",
        };
        write!(f, "{s}")
    }
}

// ============================================================================
// SECTION: Report Code
// ============================================================================

/// The internal -> report-code taxonomy, one-to-one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReportCode {
    // Loader errors (abort the scenario).
    /// The scenario file's structure text could not be parsed.
    ScenarioFileMalformed,
    /// An action referenced a type name with no registration.
    UnknownActionType,
    /// A mandatory parameter was missing from a loaded action.
    MissingMandatoryField,
    /// An `include` structure referenced a file that could not be found.
    IncludeNotFound,
    /// More than one non-config scenario was loaded.
    MultipleActionScenarios,

    // Runtime scheduling errors.
    /// A handler could not execute (no pipeline, missing target element,
    /// unlinked pad, etc).
    ScenarioActionExecutionError,
    /// An `ASYNC` action outlived its `timeout`.
    ScenarioActionTimeout,
    /// A requested pipeline state change failed.
    StateChangeFailure,

    // Observational errors (invariant violations; never fatal by
    // themselves).
    /// Position fell outside `[segment_start, segment_stop]` beyond
    /// tolerance.
    QueryPositionOutOfSegment,
    /// Position exceeded the stream duration.
    QueryPositionSuperiorDuration,
    /// An accurate seek's resulting position did not match its target.
    EventSeekResultPositionWrong,
    /// A seek was never acknowledged by the pipeline.
    EventSeekNotHandled,
    /// Observed pipeline latency exceeded `max-latency`.
    ConfigLatencyTooHigh,
    /// QoS-reported dropped-buffer count exceeded `max-dropped`.
    ConfigTooManyBuffersDropped,
    /// EOS was observed with non-executed, non-optional actions remaining.
    ScenarioNotEnded,
}

impl ReportCode {
    /// The code's default severity, before any reporter-specific override.
    #[must_use]
    pub const fn default_level(self) -> ReportLevel {
        match self {
            Self::ScenarioFileMalformed
            | Self::UnknownActionType
            | Self::MissingMandatoryField
            | Self::IncludeNotFound
            | Self::MultipleActionScenarios
            | Self::ScenarioActionExecutionError
            | Self::StateChangeFailure
            | Self::EventSeekResultPositionWrong
            | Self::ScenarioNotEnded => ReportLevel::Critical,
            Self::ScenarioActionTimeout
            | Self::QueryPositionOutOfSegment
            | Self::QueryPositionSuperiorDuration
            | Self::EventSeekNotHandled
            | Self::ConfigLatencyTooHigh
            | Self::ConfigTooManyBuffersDropped => ReportLevel::Warning,
        }
    }

    /// The code's stable wire name, as used in `Overrides` keys and CLI
    /// output (kebab-case).
    #[must_use]
    pub const fn code_name(self) -> &'static str {
        match self {
            Self::ScenarioFileMalformed => "scenario-file-malformed",
            Self::UnknownActionType => "unknown-action-type",
            Self::MissingMandatoryField => "missing-mandatory-field",
            Self::IncludeNotFound => "include-not-found",
            Self::MultipleActionScenarios => "multiple-action-scenarios",
            Self::ScenarioActionExecutionError => "scenario-action-execution-error",
            Self::ScenarioActionTimeout => "scenario-action-timeout",
            Self::StateChangeFailure => "state-change-failure",
            Self::QueryPositionOutOfSegment => "query-position-out-of-segment",
            Self::QueryPositionSuperiorDuration => "query-position-superior-duration",
            Self::EventSeekResultPositionWrong => "event-seek-result-position-wrong",
            Self::EventSeekNotHandled => "event-seek-not-handled",
            Self::ConfigLatencyTooHigh => "config-latency-too-high",
            Self::ConfigTooManyBuffersDropped => "config-too-many-buffers-dropped",
            Self::ScenarioNotEnded => "scenario-not-ended",
        }
    }
}

impl fmt::Display for ReportCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code_name())
    }
}

// ============================================================================
// SECTION: Report / Reporter
// ============================================================================

/// A single reportable event.
#[derive(Debug, Clone)]
pub struct Report {
    /// Effective severity, after override resolution.
    pub level: ReportLevel,
    /// Stable report code.
    pub code: ReportCode,
    /// Human-readable message.
    pub message: String,
    /// Optional backtrace-like detail (action number, sub-action chain).
    pub trace: Option<String>,
}

/// The only external logging surface the engine is allowed to use.
pub trait Reporter {
    /// Emits a report.
    fn report(&self, report: &Report);
}

/// No-op reporter, useful for tests that only assert on engine-internal
/// state.
#[derive(Debug, Default)]
pub struct NullReporter;

impl Reporter for NullReporter {
    fn report(&self, _report: &Report) {}
}

// ============================================================================
// SECTION: Severity Overrides
// ============================================================================

/// Per-report-code severity overrides, keyed by issue-id per reporter.
///
/// # Invariants
/// - An override only ever changes `level`; `code`/`message` are untouched.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    by_code: HashMap<&'static str, ReportLevel>,
}

impl Overrides {
    /// Creates an empty override table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides the severity used for `code`.
    pub fn set(&mut self, code: ReportCode, level: ReportLevel) {
        self.by_code.insert(code.code_name(), level);
    }

    /// Resolves the effective level for `code`: the override if one is
    /// configured, otherwise the code's default level.
    #[must_use]
    pub fn resolve(&self, code: ReportCode) -> ReportLevel {
        self.by_code.get(code.code_name()).copied().unwrap_or_else(|| code.default_level())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_to_default_level_without_override() {
        let overrides = Overrides::new();
        assert_eq!(overrides.resolve(ReportCode::ScenarioNotEnded), ReportLevel::Critical);
    }

    #[test]
    fn override_replaces_default_level() {
        let mut overrides = Overrides::new();
        overrides.set(ReportCode::ScenarioActionTimeout, ReportLevel::Critical);
        assert_eq!(overrides.resolve(ReportCode::ScenarioActionTimeout), ReportLevel::Critical);
    }
}
