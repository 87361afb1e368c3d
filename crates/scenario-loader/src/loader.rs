// crates/scenario-loader/src/loader.rs
// ============================================================================
// Module: Scenario Loader
// Description: Builds a `scenario_core::Scenario` from scenario-file text,
//              registered action types, and the `include`/search-path
//              rules.
// Purpose: Tie the tokenizer, structure parser, search-path resolver and
//          action-type registry together into the one loading entry point
//          the CLI and engine use.
// Dependencies: scenario_core, std::fs
// ============================================================================

//! ## Overview
//!
//! [`load_references`] is the loader's single public entry point: given a
//! colon-separated list of scenario references, it resolves each one
//! through [`crate::searchpath`], parses its records with [`crate::parser`],
//! and folds every action structure into one shared [`Scenario`].
//! `CONFIG`-flagged (and `as-config=true`) actions run immediately at load
//! time and are discarded; everything else is queued.

use std::fs;
use std::path::Path;
use std::path::PathBuf;

use scenario_core::Action;
use scenario_core::ActionNumber;
use scenario_core::ActionTypeFlags;
use scenario_core::ActionTypeRegistry;
use scenario_core::ExecuteResult;
use scenario_core::HandlerContext;
use scenario_core::Report;
use scenario_core::ReportCode;
use scenario_core::ReportLevel;
use scenario_core::Reporter;
use scenario_core::Scenario;
use scenario_core::ScenarioError;
use scenario_core::Structure;
use scenario_core::Value;

use crate::description::ScenarioDescription;
use crate::parser::parse_structure;
use crate::searchpath;
use crate::tokenizer::split_records;

/// Result of loading one or more scenario references into a single
/// [`Scenario`].
#[derive(Debug)]
pub struct LoadedScenario {
    /// The merged, queued scenario state.
    pub scenario: Scenario,
    /// The non-config scenario's description, or a default one if only
    /// config scenarios were loaded.
    pub description: ScenarioDescription,
}

/// Loads the colon-separated `references` list into one [`Scenario`].
///
/// # Errors
///
/// Returns [`ScenarioError::MultipleActionScenarios`] if more than one
/// non-config scenario is present, or any loader-stage error encountered
/// while reading, parsing or validating a referenced file.
pub fn load_references(
    references: &[&str],
    registry: &ActionTypeRegistry,
    reporter: &dyn Reporter,
) -> Result<LoadedScenario, ScenarioError> {
    let name = references.first().copied().unwrap_or("scenario").to_string();
    let mut scenario = Scenario::new(name);
    let mut any_needs_clock = false;
    let mut action_description: Option<ScenarioDescription> = None;

    for reference in references {
        let path = searchpath::resolve(reference).map_err(|e| ScenarioError::Malformed(e.to_string()))?;
        let description = load_file(&path, registry, reporter, &mut scenario, &mut any_needs_clock, true)?;
        let Some(description) = description else { continue };
        if description.is_config {
            apply_config_overrides(&mut scenario, &description);
        } else if let Some(existing) = &action_description {
            return Err(ScenarioError::MultipleActionScenarios {
                existing: existing.summary.clone().unwrap_or_default(),
                new: description.summary.clone().unwrap_or_default(),
            });
        } else {
            apply_config_overrides(&mut scenario, &description);
            action_description = Some(description);
        }
    }

    let mut description = action_description.unwrap_or_default();
    description.need_clock_sync = description.need_clock_sync || any_needs_clock;
    Ok(LoadedScenario { scenario, description })
}

/// Applies a description's `max-latency`/`max-dropped` overrides to
/// `scenario`.
fn apply_config_overrides(scenario: &mut Scenario, description: &ScenarioDescription) {
    if let Some(max_latency) = description.max_latency {
        scenario.max_latency = Some(max_latency);
    }
    if let Some(max_dropped) = description.max_dropped {
        scenario.max_dropped = Some(max_dropped);
    }
}

/// Loads one file's records into `scenario`, recursing into `include`
/// targets. Returns the file's own `description`, if `collect_description`
/// is set and one was present (included files never contribute theirs).
fn load_file(
    path: &Path,
    registry: &ActionTypeRegistry,
    reporter: &dyn Reporter,
    scenario: &mut Scenario,
    any_needs_clock: &mut bool,
    collect_description: bool,
) -> Result<Option<ScenarioDescription>, ScenarioError> {
    let text = fs::read_to_string(path).map_err(|e| ScenarioError::Malformed(format!("{}: {e}", path.display())))?;
    load_text(&text, path.parent(), registry, reporter, scenario, any_needs_clock, collect_description)
}

/// Loads scenario-file `text` into `scenario`. See [`load_file`].
fn load_text(
    text: &str,
    base_dir: Option<&Path>,
    registry: &ActionTypeRegistry,
    reporter: &dyn Reporter,
    scenario: &mut Scenario,
    any_needs_clock: &mut bool,
    collect_description: bool,
) -> Result<Option<ScenarioDescription>, ScenarioError> {
    let mut description = None;
    for record in split_records(text) {
        let structure = parse_structure(&record).map_err(|e| ScenarioError::Malformed(e.to_string()))?;
        match structure.name.as_str() {
            "description" => {
                if collect_description {
                    description = Some(ScenarioDescription::from_structure(&structure));
                }
            }
            "include" => {
                let location = structure
                    .get_str("location")
                    .ok_or_else(|| ScenarioError::Malformed("include is missing 'location'".to_string()))?;
                let target = resolve_include(location, base_dir)?;
                load_file(&target, registry, reporter, scenario, any_needs_clock, false)?;
            }
            type_name => {
                load_action(type_name, structure, registry, reporter, scenario, any_needs_clock)?;
            }
        }
    }
    Ok(description)
}

/// Resolves an `include` target, trying relative to the including file
/// first and falling back to the normal search path.
fn resolve_include(location: &str, base_dir: Option<&Path>) -> Result<PathBuf, ScenarioError> {
    if let Some(base_dir) = base_dir {
        let candidate = base_dir.join(location);
        if candidate.is_file() {
            return Ok(candidate);
        }
    }
    searchpath::resolve(location).map_err(|_| ScenarioError::IncludeNotFound(location.to_string()))
}

/// Validates and enqueues (or immediately executes) a single loaded action
/// structure.
fn load_action(
    type_name: &str,
    structure: Structure,
    registry: &ActionTypeRegistry,
    reporter: &dyn Reporter,
    scenario: &mut Scenario,
    any_needs_clock: &mut bool,
) -> Result<(), ScenarioError> {
    let optional_action_type = structure.get_bool("optional-action-type").unwrap_or(false);
    let Some(action_type) = registry.lookup(type_name) else {
        return if optional_action_type { Ok(()) } else { Err(ScenarioError::UnknownActionType(type_name.to_string())) };
    };

    action_type.check_mandatory(&structure).map_err(|fields| ScenarioError::MissingMandatoryField {
        action: type_name.to_string(),
        fields,
    })?;

    if action_type.flags.contains(ActionTypeFlags::NEEDS_CLOCK) {
        *any_needs_clock = true;
    }

    let number = ActionNumber(u32::try_from(scenario.actions_arena.len() + scenario.interlaced_actions.len()).unwrap_or(u32::MAX));
    let mut action = Action::new(number, type_name, structure);

    match action.structure.get("playback-time").cloned() {
        Some(Value::Int(v)) => action.playback_time = Some(v as f64),
        Some(Value::Double(v)) => action.playback_time = Some(v),
        Some(Value::String(_)) => action.flags.needs_playback_parsing = true,
        _ => {}
    }
    if let Some(timeout_secs) = action.structure.get_f64("timeout") {
        action.timeout = Some(std::time::Duration::from_secs_f64(timeout_secs.max(0.0)));
    }
    if action_type.flags.contains(ActionTypeFlags::CAN_BE_OPTIONAL) {
        action.flags.optional = action.structure.get_bool("optional").unwrap_or(false);
    }

    let as_config = action.structure.get_bool("as-config").unwrap_or(false);
    if action_type.flags.contains(ActionTypeFlags::CONFIG) || as_config {
        let mut ctx = HandlerContext { action: &mut action };
        if let Some(prepare) = &action_type.prepare {
            if let Err(reason) = prepare(&mut ctx) {
                reporter.report(&Report {
                    level: ReportLevel::Critical,
                    code: ReportCode::ScenarioActionExecutionError,
                    message: format!("config action '{type_name}' failed to prepare: {reason}"),
                    trace: None,
                });
            }
        }
        match (action_type.execute)(&mut ctx) {
            ExecuteResult::Ok | ExecuteResult::Async | ExecuteResult::Interlaced => {}
            ExecuteResult::Error | ExecuteResult::ErrorReported => {
                reporter.report(&Report {
                    level: ReportLevel::Critical,
                    code: ReportCode::ScenarioActionExecutionError,
                    message: format!("config action '{type_name}' failed to execute"),
                    trace: None,
                });
            }
        }
        return Ok(());
    }

    let can_execute_on_addition = action_type.flags.contains(ActionTypeFlags::CAN_EXECUTE_ON_ADDITION);
    let no_earlier_queued_has_playback_time = scenario.actions.iter().all(|id| scenario.action(*id).playback_time.is_none());
    if can_execute_on_addition && action.playback_time.is_none() && no_earlier_queued_has_playback_time {
        let id = scenario_core::ActionId(u32::try_from(scenario.actions_arena.len()).unwrap_or(u32::MAX));
        scenario.actions_arena.push(action);
        scenario.on_addition_actions.push(id);
    } else {
        scenario.push_action(action);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, reason = "test assertions may panic directly")]
    use super::*;
    use scenario_core::ActionType;
    use scenario_core::ParameterSchema;
    use std::sync::Arc;

    fn registry_with_wait() -> ActionTypeRegistry {
        let mut registry = ActionTypeRegistry::new();
        registry.register(ActionType {
            name: "wait".to_string(),
            implementer_namespace: "test".to_string(),
            rank: 0,
            flags: ActionTypeFlags::NONE,
            parameters: vec![ParameterSchema::optional("duration", "double", "seconds to wait", "0")],
            prepare: None,
            execute: Arc::new(|_ctx| ExecuteResult::Ok),
            overriden_type: None,
        });
        registry
    }

    fn registry_with_config_action() -> ActionTypeRegistry {
        let mut registry = ActionTypeRegistry::new();
        registry.register(ActionType {
            name: "set-vars".to_string(),
            implementer_namespace: "test".to_string(),
            rank: 0,
            flags: ActionTypeFlags::CONFIG,
            parameters: Vec::new(),
            prepare: None,
            execute: Arc::new(|_ctx| ExecuteResult::Ok),
            overriden_type: None,
        });
        registry
    }

    #[test]
    fn loads_a_simple_scenario_with_description() {
        let registry = registry_with_wait();
        let text = "description, summary=\"simple\";\nwait, duration=1.0, playback-time=2.0;";
        let mut scenario = Scenario::new("t");
        let mut needs_clock = false;
        let description =
            load_text(text, None, &registry, &scenario_core::NullReporter, &mut scenario, &mut needs_clock, true)
                .unwrap()
                .unwrap();
        assert_eq!(description.summary.as_deref(), Some("simple"));
        assert_eq!(scenario.actions.len(), 1);
    }

    #[test]
    fn unknown_action_type_is_rejected_unless_marked_optional() {
        let registry = ActionTypeRegistry::new();
        let mut scenario = Scenario::new("t");
        let mut needs_clock = false;
        let err = load_text(
            "frobnicate, x=1;",
            None,
            &registry,
            &scenario_core::NullReporter,
            &mut scenario,
            &mut needs_clock,
            true,
        )
        .unwrap_err();
        assert!(matches!(err, ScenarioError::UnknownActionType(_)));

        let mut scenario = Scenario::new("t");
        load_text(
            "frobnicate, x=1, optional-action-type=true;",
            None,
            &registry,
            &scenario_core::NullReporter,
            &mut scenario,
            &mut needs_clock,
            true,
        )
        .unwrap();
        assert!(scenario.actions.is_empty());
    }

    #[test]
    fn config_action_executes_immediately_and_is_not_queued() {
        let registry = registry_with_config_action();
        let mut scenario = Scenario::new("t");
        let mut needs_clock = false;
        load_text(
            "set-vars, foo=1;",
            None,
            &registry,
            &scenario_core::NullReporter,
            &mut scenario,
            &mut needs_clock,
            true,
        )
        .unwrap();
        assert!(scenario.actions.is_empty());
        assert!(scenario.actions_arena.is_empty());
    }

    #[test]
    fn missing_mandatory_field_is_rejected() {
        let mut registry = ActionTypeRegistry::new();
        registry.register(ActionType {
            name: "seek".to_string(),
            implementer_namespace: "test".to_string(),
            rank: 0,
            flags: ActionTypeFlags::NONE,
            parameters: vec![ParameterSchema::mandatory("start", "double", "seek target")],
            prepare: None,
            execute: Arc::new(|_ctx| ExecuteResult::Ok),
            overriden_type: None,
        });
        let mut scenario = Scenario::new("t");
        let mut needs_clock = false;
        let err = load_text("seek, flush=true;", None, &registry, &scenario_core::NullReporter, &mut scenario, &mut needs_clock, true)
            .unwrap_err();
        assert!(matches!(err, ScenarioError::MissingMandatoryField { .. }));
    }
}
