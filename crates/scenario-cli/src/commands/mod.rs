// crates/scenario-cli/src/commands/mod.rs
// ============================================================================
// Module: CLI Commands
// Description: One module per subcommand.
// Purpose: Group `run`/`list-scenarios`/`validate` command bodies away from
//          argument parsing in `main.rs`.
// Dependencies: scenario_core, scenario_loader, scenario_engine
// ============================================================================

pub mod list_scenarios;
pub mod run;
pub mod validate;

use std::fmt;

/// Unified error surface for every command body; `main.rs` maps this to an
/// exit code and a single printed line.
#[derive(Debug)]
pub struct CliError(pub String);

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for CliError {}

impl From<crate::config::ConfigError> for CliError {
    fn from(err: crate::config::ConfigError) -> Self {
        Self(err.to_string())
    }
}

impl From<crate::reporting::ReportingSetupError> for CliError {
    fn from(err: crate::reporting::ReportingSetupError) -> Self {
        Self(err.to_string())
    }
}

impl From<scenario_core::ScenarioError> for CliError {
    fn from(err: scenario_core::ScenarioError) -> Self {
        Self(err.to_string())
    }
}
