// crates/scenario-cli/src/commands/validate.rs
// ============================================================================
// Module: `validate` Command
// Description: Loads a scenario's references without running it, reporting
//              structural or mandatory-field errors.
// Purpose: Let a caller confirm a scenario file parses and its actions
//          resolve against the built-in registry, without paying for a
//          full simulated run.
// Dependencies: scenario_core, scenario_loader, scenario_engine
// ============================================================================

use std::sync::Arc;
use std::sync::Mutex;

use scenario_core::ActionTypeRegistry;
use scenario_core::Scenario;
use scenario_engine::register_builtins;
use scenario_engine::Runtime;
use scenario_engine::SharedRuntime;
use scenario_loader::load_references;
use scenario_loader::split_references;
use scenario_loader::ScenarioDescription;

use crate::commands::CliError;
use crate::sim_pipeline::SimulatedMedia;
use crate::sim_pipeline::SimulatedPipeline;

/// Outcome of a successful `validate` run: the parsed description plus the
/// number of actions the scenario queued, as a cheap sanity signal that
/// something was actually loaded.
#[derive(Debug, Clone)]
pub struct ValidationReport {
    /// Parsed `description` fields.
    pub description: ScenarioDescription,
    /// Count of actions queued by the loaded scenario.
    pub action_count: usize,
}

/// Loads `references` against the built-in action registry and reports
/// whether the result is well-formed.
///
/// # Errors
///
/// Returns [`CliError`] if any reference fails to resolve, parse, or
/// references a mandatory field that was never supplied, or an unknown
/// action type without `optional-action-type` set.
pub fn execute(references: &str) -> Result<ValidationReport, CliError> {
    let media = SimulatedMedia::default();
    let pipeline = Box::new(SimulatedPipeline::new(media));
    let runtime = Runtime::new(Scenario::new("validate"), pipeline);
    let shared: SharedRuntime = Arc::new(Mutex::new(runtime));

    let mut registry = ActionTypeRegistry::new();
    register_builtins(&mut registry, &shared);

    let refs = split_references(references);
    let loaded = load_references(&refs, &registry, &scenario_core::NullReporter)?;

    Ok(ValidationReport { description: loaded.description, action_count: loaded.scenario.actions.len() })
}
