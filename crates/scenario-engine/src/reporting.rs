// crates/scenario-engine/src/reporting.rs
// ============================================================================
// Module: Reporting Sinks
// Description: Concrete `Reporter` implementations.
// Purpose: Fan a `Report` out to stdout/stderr, a file, or an in-process
//          channel, applying severity overrides first.
// Dependencies: scenario_core::report, std::sync::mpsc, std::io, std::fs
// ============================================================================

//! ## Overview
//!
//! One sink per destination, plus a `CompositeReporter` that fans a report
//! out to several sinks at once and applies
//! `scenario_core::report::Overrides` itself, before a report ever reaches
//! a sink — overrides are a scenario-wide policy, not a per-sink concern.
//!
//! `std::sync::mpsc` is deliberate: the main loop is single-threaded and
//! cooperative with no async runtime, so a blocking std channel is the
//! correct tool here (see `DESIGN.md`).

use std::fs::File;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::sync::mpsc::SendError;
use std::sync::mpsc::Sender;
use std::sync::Mutex;

use scenario_core::Overrides;
use scenario_core::Report;
use scenario_core::ReportCode;
use scenario_core::ReportLevel;
use scenario_core::Reporter;

// ============================================================================
// SECTION: Stdout / Stderr
// ============================================================================

/// Writes every report as one line to stdout.
#[derive(Debug, Default)]
pub struct StdoutReporter;

impl Reporter for StdoutReporter {
    #[allow(clippy::print_stdout, reason = "this sink's entire purpose is writing reports to stdout")]
    fn report(&self, report: &Report) {
        println!("[{}] {}: {}", report.level, report.code, report.message);
    }
}

/// Writes every report as one line to stderr.
#[derive(Debug, Default)]
pub struct StderrReporter;

impl Reporter for StderrReporter {
    #[allow(clippy::print_stderr, reason = "this sink's entire purpose is writing reports to stderr")]
    fn report(&self, report: &Report) {
        eprintln!("[{}] {}: {}", report.level, report.code, report.message);
    }
}

// ============================================================================
// SECTION: File
// ============================================================================

/// Errors raised opening or writing a [`FileReporter`]'s backing file.
#[derive(Debug, thiserror::Error)]
pub enum FileReporterError {
    /// The backing file could not be opened for appending.
    #[error("failed to open report output file: {0}")]
    Open(#[source] std::io::Error),
}

/// Appends every report as one line to a file.
pub struct FileReporter {
    file: Mutex<File>,
}

impl FileReporter {
    /// Opens `path` for appending, creating it if necessary.
    ///
    /// # Errors
    ///
    /// Returns [`FileReporterError::Open`] if the file cannot be opened.
    pub fn open(path: &Path) -> Result<Self, FileReporterError> {
        let file = OpenOptions::new().create(true).append(true).open(path).map_err(FileReporterError::Open)?;
        Ok(Self { file: Mutex::new(file) })
    }
}

impl Reporter for FileReporter {
    fn report(&self, report: &Report) {
        let Ok(mut file) = self.file.lock() else { return };
        let _ = writeln!(file, "[{}] {}: {}", report.level, report.code, report.message);
    }
}

// ============================================================================
// SECTION: Channel
// ============================================================================

/// Sends every report through an in-process channel, for embedding the
/// engine inside another program (e.g. `scenario-cli`'s live progress
/// view).
#[derive(Debug, Clone)]
pub struct ChannelReporter {
    sender: Sender<Report>,
}

impl ChannelReporter {
    /// Creates a channel reporter over `sender`.
    #[must_use]
    pub const fn new(sender: Sender<Report>) -> Self {
        Self { sender }
    }
}

impl Reporter for ChannelReporter {
    fn report(&self, report: &Report) {
        let _ = self.sender.send(report.clone());
    }
}

/// `ChannelReporter::report` never surfaces a [`SendError`] (a disconnected
/// receiver just means nobody is watching); kept here so downstream crates
/// can match on it if they construct their own channel-backed reporter.
pub type ChannelSendError = SendError<Report>;

// ============================================================================
// SECTION: Composite
// ============================================================================

/// Fans a report out to every configured sink, applying [`Overrides`]
/// first.
#[derive(Default)]
pub struct CompositeReporter {
    sinks: Vec<Box<dyn Reporter + Send + Sync>>,
    overrides: Overrides,
}

impl CompositeReporter {
    /// Creates an empty composite reporter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a sink to the fan-out set.
    #[must_use]
    pub fn with_sink(mut self, sink: impl Reporter + Send + Sync + 'static) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }

    /// Sets the severity-override table consulted before fan-out.
    #[must_use]
    pub fn with_overrides(mut self, overrides: Overrides) -> Self {
        self.overrides = overrides;
        self
    }

    /// Reports `code`/`message` at the code's effective level (default or
    /// overridden), fanning out to every configured sink.
    pub fn report_code(&self, code: ReportCode, message: impl Into<String>, trace: Option<String>) {
        let level = self.overrides.resolve(code);
        self.report(&Report { level, code, message: message.into(), trace });
    }
}

impl Reporter for CompositeReporter {
    fn report(&self, report: &Report) {
        let level = self.overrides.resolve(report.code);
        let effective = if level == report.level { report.clone() } else { Report { level, ..report.clone() } };
        for sink in &self.sinks {
            sink.report(&effective);
        }
    }
}

/// Convenience used by handlers: true when `level` is at least
/// [`ReportLevel::Warning`].
#[must_use]
pub const fn is_warning_or_above(level: ReportLevel) -> bool {
    matches!(level, ReportLevel::Warning | ReportLevel::Critical)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, reason = "test assertions may panic directly")]
    use super::*;
    use std::sync::mpsc::channel;

    #[test]
    fn channel_reporter_forwards_reports() {
        let (tx, rx) = channel();
        let reporter = ChannelReporter::new(tx);
        reporter.report(&Report {
            level: ReportLevel::Warning,
            code: ReportCode::ScenarioActionTimeout,
            message: "slow".to_string(),
            trace: None,
        });
        let received = rx.recv().unwrap();
        assert_eq!(received.message, "slow");
    }

    #[test]
    fn composite_reporter_applies_override_before_fanout() {
        let (tx, rx) = channel();
        let mut overrides = Overrides::new();
        overrides.set(ReportCode::ScenarioActionTimeout, ReportLevel::Critical);
        let composite = CompositeReporter::new().with_sink(ChannelReporter::new(tx)).with_overrides(overrides);
        composite.report_code(ReportCode::ScenarioActionTimeout, "late", None);
        let received = rx.recv().unwrap();
        assert_eq!(received.level, ReportLevel::Critical);
    }
}
