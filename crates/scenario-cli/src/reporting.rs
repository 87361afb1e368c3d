// crates/scenario-cli/src/reporting.rs
// ============================================================================
// Module: CLI Reporting Setup
// Description: Builds the `scenario_engine::CompositeReporter` the `run`/
//              `validate` commands install, from `OUTPUT_FILES` and a
//              config file's severity overrides.
// Purpose: Keep sink selection and the FLAGS-driven fatal/print policy in
//          one place rather than duplicated across command modules.
// Dependencies: scenario_engine::reporting, crate::config
// ============================================================================

use std::sync::mpsc::channel;
use std::sync::mpsc::Receiver;
use std::sync::Arc;

use scenario_core::Overrides;
use scenario_core::Report;
use scenario_engine::ChannelReporter;
use scenario_engine::CompositeReporter;
use scenario_engine::FileReporter;
use scenario_engine::FileReporterError;
use scenario_engine::StderrReporter;
use scenario_engine::StdoutReporter;

use crate::config::Env;

/// Failure building one of the requested `OUTPUT_FILES` sinks.
#[derive(Debug, thiserror::Error)]
pub enum ReportingSetupError {
    /// A file sink could not be opened.
    #[error(transparent)]
    File(#[from] FileReporterError),
}

/// Builds the reporter the dispatcher/bus reactor/handlers report through,
/// wired from `env.output_files` (defaulting to stdout when empty) and
/// `overrides`, plus a channel the caller drains for the FLAGS-driven
/// fatal-abort decision.
///
/// # Errors
///
/// Returns [`ReportingSetupError`] if a file sink named in `OUTPUT_FILES`
/// cannot be opened.
pub fn build_reporter(env: &Env, overrides: Overrides) -> Result<(Arc<CompositeReporter>, Receiver<Report>), ReportingSetupError> {
    let (tx, rx) = channel();
    let mut composite = CompositeReporter::new().with_overrides(overrides).with_sink(ChannelReporter::new(tx));

    if env.output_files.is_empty() {
        composite = composite.with_sink(StdoutReporter);
    } else {
        for destination in &env.output_files {
            composite = match destination.as_str() {
                "stdout" => composite.with_sink(StdoutReporter),
                "stderr" => composite.with_sink(StderrReporter),
                path => composite.with_sink(FileReporter::open(std::path::Path::new(path))?),
            };
        }
    }

    Ok((Arc::new(composite), rx))
}
