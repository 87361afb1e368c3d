// crates/scenario-engine/src/lifecycle.rs
// ============================================================================
// Module: Action Lifecycle
// Description: `prepare`/`execute`/`set_done` state machine for one action.
// Purpose: Implement variable substitution, time-field coercion, `repeat`
//          resolution, sub-action chaining and the deferred `set_done`
//          ordering rule.
// Dependencies: scenario_core, scenario_expr
// ============================================================================

//! ## Overview
//!
//! [`prepare`] and [`execute`] are called by [`crate::dispatcher`] for the
//! head of the main queue (and by the caller directly for interlaced /
//! on-addition actions). `set_done` is modeled as [`mark_pending_set_done`]
//! plus [`drain_pending_set_done`]: a handler thread only ever calls the
//! former -- the only thread-safe cross-thread API -- and the main loop
//! calls the latter once per tick, which is what actually transitions
//! state and runs any queued sub-action.

use std::time::Instant;

use scenario_core::Action;
use scenario_core::ActionState;
use scenario_core::ActionType;
use scenario_core::ClockTime;
use scenario_core::ExecuteResult;
use scenario_core::HandlerContext;
use scenario_core::ScenarioError;
use scenario_core::Value;
use scenario_core::VariableStore;

/// Field names treated as clock-time literals when loaded as strings,
/// force-converted regardless of the parameter schema's declared type.
const TIME_FIELDS: &[&str] = &["start", "stop", "playback-time", "timeout", "duration"];

/// Runs the `prepare` phase: variable substitution, time-field coercion,
/// and `repeat` resolution.
///
/// # Errors
///
/// Returns [`ScenarioError::Substitution`] if a `$(name)` reference is
/// undefined or unterminated, [`ScenarioError::ClockTime`] if a time field
/// fails to parse, [`ScenarioError::NonIntegerRepeat`] if `repeat`
/// resolves to a non-integer, or
/// [`ScenarioError::Expression`] if a `repeat` expression fails to
/// evaluate.
pub fn prepare(action: &mut Action, action_type: &ActionType, vars: &VariableStore) -> Result<(), ScenarioError> {
    substitute_strings(action, vars)?;
    coerce_time_fields(action)?;
    resolve_repeat(action, vars)?;

    if let Some(prepare_fn) = &action_type.prepare {
        let mut ctx = HandlerContext { action };
        prepare_fn(&mut ctx).map_err(ScenarioError::Expression)?;
    }
    Ok(())
}

/// Substitutes `$(name)` tokens in every string field of `action.structure`.
fn substitute_strings(action: &mut Action, vars: &VariableStore) -> Result<(), ScenarioError> {
    let mut error = None;
    let mut structure = std::mem::replace(&mut action.structure, scenario_core::Structure::new(""));
    structure.name = action.structure.name.clone();
    for value in structure.fields.values_mut() {
        value.map_strings(&mut |s| match vars.substitute(s) {
            Ok(substituted) => substituted,
            Err(e) => {
                error.get_or_insert(e);
                s.to_string()
            }
        });
    }
    action.structure = structure;
    match error {
        Some(e) => Err(ScenarioError::Substitution(e)),
        None => Ok(()),
    }
}

/// Parses string-valued time fields into numeric seconds.
fn coerce_time_fields(action: &mut Action) -> Result<(), ScenarioError> {
    for &field in TIME_FIELDS {
        if let Some(Value::String(text)) = action.structure.get(field).cloned() {
            let parsed = ClockTime::parse(&text)?;
            action.structure.set(field, Value::Double(parsed.0));
        }
    }
    Ok(())
}

/// Resolves `repeat` (integer, double, or expression) into
/// `action.repeat`.
fn resolve_repeat(action: &mut Action, vars: &VariableStore) -> Result<(), ScenarioError> {
    let Some(value) = action.structure.get("repeat").cloned() else { return Ok(()) };
    let resolved = match value {
        Value::Int(v) => v,
        Value::Double(v) if (v - v.trunc()).abs() < f64::EPSILON => v as i64,
        Value::Double(v) => return Err(ScenarioError::NonIntegerRepeat(v.to_string())),
        Value::String(expr) => {
            let evaluated = scenario_expr::eval(&expr, vars).map_err(|e| ScenarioError::Expression(e.to_string()))?;
            if (evaluated - evaluated.trunc()).abs() >= f64::EPSILON {
                return Err(ScenarioError::NonIntegerRepeat(expr));
            }
            evaluated as i64
        }
        Value::Bool(_) | Value::Structure(_) | Value::List(_) => {
            return Err(ScenarioError::NonIntegerRepeat("repeat must be numeric".to_string()));
        }
    };
    action.repeat = resolved;
    Ok(())
}

/// Runs the `execute` phase, recording `execution_time` for timeout
/// tracking and advancing `action.state` to match the handler's result.
pub fn execute(action: &mut Action, action_type: &ActionType) -> ExecuteResult {
    action.execution_time = Some(Instant::now());
    action.state = ActionState::InProgress;
    let mut ctx = HandlerContext { action };
    let result = (action_type.execute)(&mut ctx);
    action.state = match result {
        ExecuteResult::Ok => ActionState::Ok,
        ExecuteResult::Error => ActionState::Error,
        ExecuteResult::ErrorReported => ActionState::ErrorReported,
        ExecuteResult::Async => ActionState::Async,
        ExecuteResult::Interlaced => ActionState::Interlaced,
    };
    result
}

/// Marks `action` as having a deferred completion pending. The only
/// operation a handler thread may call.
pub fn mark_pending_set_done(action: &mut Action) {
    action.flags.pending_set_done = true;
}

/// Drains a pending `set_done`: transitions `action.state` to `Ok`, chains
/// into a queued sub-action if one is set, and otherwise restores
/// `repeat`. Called once per main-loop tick, never from a handler
/// thread.
///
/// Returns `true` if `action` is now fully terminal (no sub-action chained
/// and no repeat iterations remain).
pub fn drain_pending_set_done(action: &mut Action) -> bool {
    if !action.flags.pending_set_done {
        return action.state.is_terminal();
    }
    action.flags.pending_set_done = false;
    action.state = ActionState::Ok;
    advance_after_completion(action)
}

/// Shared by both the synchronous-`Ok` path and the deferred `set_done`
/// path: chains into a sub-action if one is queued, otherwise applies
/// `repeat`.
///
/// Returns `true` if `action` is now fully terminal.
pub fn advance_after_completion(action: &mut Action) -> bool {
    if let Some(next) = pop_inline_sub_action(action) {
        action.structure = next;
        action.state = ActionState::None;
        return false;
    }
    if let Some(sub) = action.sub_actions.pop() {
        action.flags.executing_last_subaction = action.sub_actions.is_empty();
        action.structure = sub.structure;
        action.state = ActionState::None;
        return false;
    }
    if action.repeat > 0 {
        action.repeat -= 1;
        action.restore_main_structure();
        action.state = ActionState::None;
        return false;
    }
    true
}

/// Reads an inline `sub-action` field (string form) off `action.structure`
/// and, if present, parses and removes it, leaving the field untouched if
/// it is not a string (an already-structured sub-action is expected to
/// have been pushed onto `action.sub_actions` by the handler itself).
fn pop_inline_sub_action(action: &mut Action) -> Option<scenario_core::Structure> {
    match action.structure.get("sub-action").cloned() {
        Some(Value::String(text)) => {
            action.structure.fields.remove("sub-action");
            scenario_engine_sub_action_text_to_structure(&text)
        }
        _ => None,
    }
}

/// Parses a `sub-action` string field's text into a `Structure`. Kept as a
/// thin wrapper so `scenario-loader`'s record parser stays the single
/// source of truth for structure-text syntax.
fn scenario_engine_sub_action_text_to_structure(text: &str) -> Option<scenario_core::Structure> {
    // A sub-action field is written exactly like a top-level scenario
    // record (`name, key=value, ...`), so it is parsed through the same
    // tokenizer/parser pair the loader uses rather than a bespoke grammar
    // living here.
    scenario_loader_record_to_structure(text)
}

fn scenario_loader_record_to_structure(text: &str) -> Option<scenario_core::Structure> {
    scenario_loader::parse_structure(text).ok()
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, reason = "test assertions may panic directly")]
    use super::*;
    use scenario_core::ActionFlags;
    use scenario_core::ActionNumber;
    use scenario_core::Structure;
    use std::sync::Arc;

    fn dummy_type() -> ActionType {
        ActionType {
            name: "wait".to_string(),
            implementer_namespace: "test".to_string(),
            rank: 0,
            flags: scenario_core::ActionTypeFlags::NONE,
            parameters: Vec::new(),
            prepare: None,
            execute: Arc::new(|_ctx| ExecuteResult::Ok),
            overriden_type: None,
        }
    }

    #[test]
    fn substitutes_and_coerces_time_field() {
        let mut structure = Structure::new("wait");
        structure.set("duration", Value::String("$(base)".to_string()));
        let mut action = Action::new(ActionNumber(0), "wait", structure);
        let mut vars = VariableStore::new();
        vars.set("base", scenario_core::VarValue::Number(2.0));
        prepare(&mut action, &dummy_type(), &vars).unwrap();
        assert_eq!(action.structure.get_f64("duration"), Some(2.0));
    }

    #[test]
    fn non_integer_repeat_expression_is_rejected() {
        let mut structure = Structure::new("wait");
        structure.set("repeat", Value::String("1 / 3".to_string()));
        let mut action = Action::new(ActionNumber(0), "wait", structure);
        let vars = VariableStore::new();
        let err = prepare(&mut action, &dummy_type(), &vars).unwrap_err();
        assert!(matches!(err, ScenarioError::NonIntegerRepeat(_)));
    }

    #[test]
    fn execute_transitions_state_from_handler_result() {
        let mut action = Action::new(ActionNumber(0), "wait", Structure::new("wait"));
        let result = execute(&mut action, &dummy_type());
        assert_eq!(result, ExecuteResult::Ok);
        assert_eq!(action.state, ActionState::Ok);
    }

    #[test]
    fn drain_pending_set_done_restores_repeat_and_reenters_none() {
        let mut action = Action::new(ActionNumber(0), "wait", Structure::new("wait"));
        action.repeat = 2;
        action.flags = ActionFlags { pending_set_done: true, ..action.flags };
        let terminal = drain_pending_set_done(&mut action);
        assert!(!terminal);
        assert_eq!(action.repeat, 1);
        assert_eq!(action.state, ActionState::None);
    }

    #[test]
    fn drain_pending_set_done_is_terminal_once_repeat_exhausted() {
        let mut action = Action::new(ActionNumber(0), "wait", Structure::new("wait"));
        action.flags.pending_set_done = true;
        let terminal = drain_pending_set_done(&mut action);
        assert!(terminal);
        assert_eq!(action.state, ActionState::Ok);
    }
}
