// crates/scenario-engine/src/reactor.rs
// ============================================================================
// Module: Bus Reactor
// Description: Consumes pipeline bus messages and advances waiting actions.
// Purpose: Couple asynchronous pipeline observations (async-done,
//          state-changed, eos, error, buffering, streams-selected, latency,
//          qos, named messages) back onto action completion via the
//          deferred `set_done` mechanism `crate::lifecycle` defines.
// Dependencies: scenario_core, crate::lifecycle, crate::pipeline, crate::runtime
// ============================================================================

//! ## Overview
//!
//! [`BusReactor::drain`] is meant to be called once per dispatcher tick,
//! before [`crate::dispatcher::Dispatcher::tick`]: it polls
//! [`crate::pipeline::Pipeline::poll_message`] until the pipeline reports no
//! further pending message, translating each [`crate::pipeline::BusMessage`]
//! into the scenario-wide bookkeeping updates below. Every branch that
//! resolves a waiting action does so through
//! [`crate::lifecycle::mark_pending_set_done`] rather than mutating
//! `action.state` directly: `set_done` must be deferred so EOS handling can
//! drain it before counting "not ended" actions, and routing every
//! reactor-side completion through the same deferred path keeps that
//! guarantee in one place instead of two.

use scenario_core::Action;
use scenario_core::ActionState;
use scenario_core::ActionTypeFlags;
use scenario_core::ActionTypeRegistry;
use scenario_core::Report;
use scenario_core::ReportCode;
use scenario_core::TargetState;

use crate::lifecycle;
use crate::pipeline::BusMessage;
use crate::pipeline::PipelineState;
use crate::pipeline::SeekType;
use crate::runtime::lock;
use crate::runtime::Runtime;
use crate::runtime::SharedRuntime;
use crate::runtime::WaitCondition;

/// Drives scenario state off pipeline bus observations.
#[derive(Debug, Default, Clone, Copy)]
pub struct BusReactor;

impl BusReactor {
    /// Creates a reactor. Stateless: every field the reactor reads or
    /// mutates lives on [`crate::runtime::Runtime`].
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Drains every currently pending bus message, applying each to
    /// `shared`. `registry` is consulted only by the EOS/error path, to
    /// weigh `NO_EXECUTION_NOT_FATAL` action types when deciding whether to
    /// report `SCENARIO_NOT_ENDED`.
    pub fn drain(&self, shared: &SharedRuntime, registry: &ActionTypeRegistry) {
        loop {
            let message = { lock(shared).pipeline.poll_message() };
            let Some(message) = message else { break };
            self.handle(shared, registry, message);
        }
    }

    /// Dispatches one [`BusMessage`] to its handler.
    fn handle(&self, shared: &SharedRuntime, registry: &ActionTypeRegistry, message: BusMessage) {
        match message {
            BusMessage::AsyncDone => self.on_async_done(shared),
            BusMessage::StateChanged { new_state } => self.on_state_changed(shared, new_state),
            BusMessage::Error { message } => self.on_error(shared, registry, message),
            BusMessage::Eos => self.on_eos(shared, registry),
            BusMessage::Buffering { percent } => self.on_buffering(shared, percent),
            BusMessage::StreamsSelected { stream_ids } => self.on_streams_selected(shared, stream_ids),
            BusMessage::Latency => self.on_latency(shared),
            BusMessage::Qos { dropped } => self.on_qos(shared, dropped),
            BusMessage::Named { type_name } => self.on_named(shared, &type_name),
        }
    }

    /// ASYNC-DONE: resolves whichever seek/state-change is
    /// outstanding, re-parses any deferred `playback-time` expressions now
    /// that `duration` is known, and clears the scenario-wide async gate.
    fn on_async_done(&self, shared: &SharedRuntime) {
        let mut rt = lock(shared);
        rt.scenario.needs_async_done = false;
        rt.scenario.changing_state = false;
        if let Some(seek) = rt.pending_seek.take() {
            if seek.start_type == SeekType::Set {
                rt.scenario.segment_start = seek.start;
            }
            if seek.stop_type == SeekType::Set {
                rt.scenario.segment_stop = seek.stop;
            }
            rt.scenario.seeked_in_pause = rt.scenario.target_state == TargetState::Paused;
        }
        let pending = std::mem::take(&mut rt.pending_async_done);
        for id in pending {
            lifecycle::mark_pending_set_done(rt.scenario.action_mut(id));
        }
        reparse_deferred_playback_times(&mut rt);
    }

    /// STATE-CHANGED: resolves a state-setting head action
    /// when the pipeline confirms it reached `target_state` this way
    /// instead of via an `ASYNC-DONE`, and checks latency on reaching
    /// `PLAYING`.
    fn on_state_changed(&self, shared: &SharedRuntime, new_state: PipelineState) {
        let mut rt = lock(shared);
        let reached_target = matches!(
            (new_state, rt.scenario.target_state),
            (PipelineState::Null | PipelineState::Ready, TargetState::Null)
                | (PipelineState::Paused, TargetState::Paused)
                | (PipelineState::Playing, TargetState::Playing)
        );
        if reached_target && rt.scenario.changing_state {
            rt.scenario.changing_state = false;
            rt.scenario.needs_async_done = false;
            let pending = std::mem::take(&mut rt.pending_async_done);
            for id in pending {
                lifecycle::mark_pending_set_done(rt.scenario.action_mut(id));
            }
        }
        if new_state == PipelineState::Playing {
            check_latency(&mut rt);
        }
    }

    /// ERROR: an unrecoverable pipeline error, handled as
    /// terminal identically to EOS.
    fn on_error(&self, shared: &SharedRuntime, registry: &ActionTypeRegistry, message: String) {
        {
            let rt = lock(shared);
            let level = rt.scenario.overrides.resolve(ReportCode::ScenarioActionExecutionError);
            rt.reporter.report(&Report {
                level,
                code: ReportCode::ScenarioActionExecutionError,
                message: format!("pipeline error: {message}"),
                trace: None,
            });
        }
        self.on_eos(shared, registry);
    }

    /// EOS: marks `got_eos`, drains pending `set_done` before counting
    /// not-ended actions (required so a deferred completion isn't
    /// mistaken for a still-running action), reports `SCENARIO_NOT_ENDED`
    /// if any remain, then synthesizes and runs a `stop`.
    fn on_eos(&self, shared: &SharedRuntime, registry: &ActionTypeRegistry) {
        let mut rt = lock(shared);
        if rt.scenario.got_eos {
            return;
        }
        rt.scenario.got_eos = true;

        for action in &mut rt.scenario.actions_arena {
            if action.flags.pending_set_done {
                lifecycle::drain_pending_set_done(action);
            }
        }

        let not_ended: Vec<String> = rt
            .scenario
            .actions_arena
            .iter()
            .filter(|a| !a.state.is_terminal())
            .filter(|a| !a.flags.optional)
            .filter(|a| !type_is_no_execution_not_fatal(registry, &a.type_name))
            .map(|a| format!("{} (#{})", a.type_name, a.action_number.0))
            .collect();
        if !not_ended.is_empty() {
            let level = rt.scenario.overrides.resolve(ReportCode::ScenarioNotEnded);
            rt.reporter.report(&Report {
                level,
                code: ReportCode::ScenarioNotEnded,
                message: format!("actions not ended at EOS: {}", not_ended.join(", ")),
                trace: None,
            });
        }

        synthesize_stop(&mut rt);
    }

    /// BUFFERING: below 100% blocks the dispatcher; 100%
    /// clears the block.
    fn on_buffering(&self, shared: &SharedRuntime, percent: u8) {
        lock(shared).scenario.buffering = percent < 100;
    }

    /// STREAMS-SELECTED: resolves a pending `switch-track`, comparing the
    /// observed selection against the set the handler recorded as
    /// expected.
    fn on_streams_selected(&self, shared: &SharedRuntime, stream_ids: Vec<String>) {
        let mut rt = lock(shared);
        let Some(pending) = rt.pending_switch.take() else { return };

        let mut expected = pending.expected.clone();
        expected.sort_unstable();
        let mut observed = stream_ids.clone();
        observed.sort_unstable();

        if expected == observed {
            lifecycle::mark_pending_set_done(rt.scenario.action_mut(pending.action_id));
        } else {
            let level = rt.scenario.overrides.resolve(ReportCode::ScenarioActionExecutionError);
            rt.reporter.report(&Report {
                level,
                code: ReportCode::ScenarioActionExecutionError,
                message: format!(
                    "Stream {:?} has not been activated, selected streams are {:?}",
                    pending.expected, stream_ids
                ),
                trace: None,
            });
            rt.scenario.action_mut(pending.action_id).state = ActionState::ErrorReported;
        }
        rt.scenario.pending_switch_track = None;
    }

    /// LATENCY: re-queries pipeline latency and reports if
    /// it now exceeds `max_latency`.
    fn on_latency(&self, shared: &SharedRuntime) {
        let mut rt = lock(shared);
        check_latency(&mut rt);
    }

    /// QOS: accumulates the dropped-buffer tally for the `stop`'s
    /// `max-dropped` budget check.
    fn on_qos(&self, shared: &SharedRuntime, dropped: u64) {
        lock(shared).scenario.record_dropped(dropped);
    }

    /// Named bus message ("message-type wait"; also used as the
    /// signal-fired equivalent a `wait`'s `signal-name` form maps onto,
    /// see `runtime.rs::WaitCondition::Signal`).
    fn on_named(&self, shared: &SharedRuntime, type_name: &str) {
        let mut rt = lock(shared);
        let matching: Vec<_> = rt
            .pending_waits
            .iter()
            .filter(|(_, condition)| match condition {
                WaitCondition::MessageType { type_name: expected } | WaitCondition::Signal { signal_name: expected } => {
                    expected == type_name
                }
                WaitCondition::Duration { .. } => false,
            })
            .map(|(id, _)| *id)
            .collect();
        for id in matching {
            rt.pending_waits.remove(&id);
            lifecycle::mark_pending_set_done(rt.scenario.action_mut(id));
        }
    }
}

/// True if `type_name` resolves to a registered type carrying
/// `NO_EXECUTION_NOT_FATAL` (such actions never count against
/// `SCENARIO_NOT_ENDED`). An unregistered type name (should not
/// happen for an action that reached the arena) is treated as fatal.
fn type_is_no_execution_not_fatal(registry: &ActionTypeRegistry, type_name: &str) -> bool {
    registry.lookup(type_name).is_some_and(|t| t.flags.contains(ActionTypeFlags::NO_EXECUTION_NOT_FATAL))
}

/// Re-queries pipeline latency and reports `CONFIG_LATENCY_TOO_HIGH` if it
/// exceeds the `description`'s `max-latency` field.
fn check_latency(rt: &mut Runtime) {
    let Some(latency) = rt.pipeline.latency() else { return };
    let Some(max) = rt.scenario.max_latency else { return };
    if latency > max {
        let level = rt.scenario.overrides.resolve(ReportCode::ConfigLatencyTooHigh);
        rt.reporter.report(&Report {
            level,
            code: ReportCode::ConfigLatencyTooHigh,
            message: format!("observed latency {latency}s exceeds max-latency {max}s"),
            trace: None,
        });
    }
}

/// Re-evaluates every action's `playback-time` expression still flagged
/// `needs_playback_parsing`, now that `duration` is known (at the latest
/// by reaching the state where duration is known, on first `async-done`).
fn reparse_deferred_playback_times(rt: &mut Runtime) {
    let position = rt.pipeline.position();
    let duration = rt.pipeline.duration();
    rt.scenario.vars.refresh_position_duration(position, duration);
    let vars = rt.scenario.vars.clone();
    for action in &mut rt.scenario.actions_arena {
        reparse_one(action, &vars);
    }
}

/// Re-evaluates one action's deferred `playback-time`, if flagged.
fn reparse_one(action: &mut Action, vars: &scenario_core::VariableStore) {
    if !action.flags.needs_playback_parsing {
        return;
    }
    let Some(scenario_core::Value::String(expr)) = action.structure.get("playback-time").cloned() else {
        action.flags.needs_playback_parsing = false;
        return;
    };
    if let Ok(value) = scenario_expr::eval(&expr, vars) {
        action.playback_time = Some(value);
        action.flags.needs_playback_parsing = false;
    }
}

/// Synthesizes and runs an implicit `stop` on EOS: clears the remaining
/// queues (nothing left to dispatch once EOS has been observed) and
/// requests a transition to `Null`, mirroring `crate::handlers::h_stop`
/// without needing a registered action to run it through.
fn synthesize_stop(rt: &mut Runtime) {
    rt.scenario.actions.clear();
    rt.scenario.interlaced_actions.clear();
    rt.scenario.on_addition_actions.clear();
    let _ = rt.pipeline.request_state(PipelineState::Null);
    rt.scenario.target_state = TargetState::Null;
    rt.scenario.changing_state = false;
    rt.scenario.needs_async_done = false;
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, reason = "test assertions may panic directly")]
    use std::path::Path;
    use std::sync::Arc;
    use std::sync::Mutex;

    use scenario_core::Action;
    use scenario_core::ActionNumber;
    use scenario_core::ActionTypeRegistry;
    use scenario_core::Scenario;
    use scenario_core::Structure;
    use scenario_core::Value;

    use super::*;
    use crate::pipeline::Pipeline;
    use crate::pipeline::PipelineError;
    use crate::pipeline::SeekRequest;
    use crate::pipeline::StateChangeOutcome;
    use crate::pipeline::TargetSelector;
    use crate::pipeline::TrackIndex;
    use crate::reporting::ChannelReporter;
    use crate::runtime::ExpectedStreams;
    use crate::runtime::Runtime as EngineRuntime;

    /// Minimal scripted `Pipeline` double: a queue of messages to hand back
    /// from `poll_message`, everything else a fixed/no-op value.
    struct ScriptedPipeline {
        messages: Vec<BusMessage>,
        state: PipelineState,
        position: Option<f64>,
        duration: Option<f64>,
        latency: Option<f64>,
    }

    impl ScriptedPipeline {
        fn new() -> Self {
            Self { messages: Vec::new(), state: PipelineState::Paused, position: Some(0.0), duration: Some(10.0), latency: None }
        }
    }

    impl Pipeline for ScriptedPipeline {
        fn state(&self) -> PipelineState {
            self.state
        }
        fn target_state(&self) -> PipelineState {
            self.state
        }
        fn request_state(&mut self, state: PipelineState) -> Result<StateChangeOutcome, PipelineError> {
            self.state = state;
            Ok(StateChangeOutcome::Sync)
        }
        fn position(&self) -> Option<f64> {
            self.position
        }
        fn duration(&self) -> Option<f64> {
            self.duration
        }
        fn latency(&self) -> Option<f64> {
            self.latency
        }
        fn seek(&mut self, _request: &SeekRequest) -> Result<(), PipelineError> {
            Ok(())
        }
        fn send_eos(&mut self) -> Result<(), PipelineError> {
            Ok(())
        }
        fn get_property(&self, _target: &TargetSelector, _property: &str) -> Result<Value, PipelineError> {
            Err(PipelineError::Unsupported("get_property".to_string()))
        }
        fn set_property(&mut self, _target: &TargetSelector, _property: &str, _value: &Value) -> Result<(), PipelineError> {
            Ok(())
        }
        fn emit_signal(&mut self, _target: &TargetSelector, _signal: &str) -> Result<(), PipelineError> {
            Ok(())
        }
        fn flush(&mut self, _target: &TargetSelector, _reset_time: bool) -> Result<(), PipelineError> {
            Ok(())
        }
        fn push_appsrc_buffer(&mut self, _target: &TargetSelector, _bytes: &[u8], _caps: Option<&str>) -> Result<(), PipelineError> {
            Ok(())
        }
        fn appsrc_eos(&mut self, _target: &TargetSelector) -> Result<(), PipelineError> {
            Ok(())
        }
        fn last_sample_bytes(&self, _target: &TargetSelector) -> Result<Vec<u8>, PipelineError> {
            Ok(Vec::new())
        }
        fn switch_track(&mut self, _stream_type: &str, _index: TrackIndex) -> Result<(), PipelineError> {
            Ok(())
        }
        fn stream_ids(&self, _stream_type: &str) -> Vec<String> {
            Vec::new()
        }
        fn selected_stream_ids(&self) -> Vec<String> {
            Vec::new()
        }
        fn dump_dot(&self, _dir: &Path, _name: &str) -> Result<(), PipelineError> {
            Ok(())
        }
        fn set_rank(&mut self, _factory_name: &str, _rank: i32) -> Result<(), PipelineError> {
            Ok(())
        }
        fn set_feature_rank(&mut self, _feature_name: &str, _rank: i32) -> Result<(), PipelineError> {
            Ok(())
        }
        fn disable_plugin(&mut self, _plugin_name: &str) -> Result<(), PipelineError> {
            Ok(())
        }
        fn set_debug_threshold(&mut self, _threshold: &str) -> Result<(), PipelineError> {
            Ok(())
        }
        fn poll_message(&mut self) -> Option<BusMessage> {
            self.messages.pop()
        }
    }

    fn shared_runtime(pipeline: ScriptedPipeline, scenario: Scenario) -> SharedRuntime {
        Arc::new(Mutex::new(EngineRuntime::new(scenario, Box::new(pipeline))))
    }

    #[test]
    fn async_done_resolves_pending_state_change_action() {
        let mut scenario = Scenario::new("t");
        let action = Action::new(ActionNumber(0), "set-state", Structure::new("set-state"));
        let id = scenario.push_action(action);
        scenario.actions_arena[0].state = ActionState::Async;

        let shared = shared_runtime(ScriptedPipeline::new(), scenario);
        lock(&shared).pending_async_done.push(id);

        BusReactor::new().handle(&shared, &ActionTypeRegistry::new(), BusMessage::AsyncDone);

        let rt = lock(&shared);
        assert!(rt.scenario.action(id).flags.pending_set_done);
        assert!(!rt.scenario.needs_async_done);
    }

    #[test]
    fn eos_reports_not_ended_actions_and_requests_null() {
        let mut scenario = Scenario::new("t");
        scenario.push_action(Action::new(ActionNumber(0), "wait", Structure::new("wait")));
        let (tx, rx) = std::sync::mpsc::channel();
        let reporter = Arc::new(ChannelReporter::new(tx));

        let shared = shared_runtime(ScriptedPipeline::new(), scenario);
        lock(&shared).reporter = reporter;

        BusReactor::new().handle(&shared, &ActionTypeRegistry::new(), BusMessage::Eos);

        let report = rx.try_recv().expect("scenario-not-ended report");
        assert_eq!(report.code, ReportCode::ScenarioNotEnded);
        assert_eq!(lock(&shared).pipeline.state(), PipelineState::Null);
        assert!(lock(&shared).scenario.got_eos);
    }

    #[test]
    fn eos_is_idempotent() {
        let mut scenario = Scenario::new("t");
        scenario.got_eos = true;
        let shared = shared_runtime(ScriptedPipeline::new(), scenario);
        // Should not panic or double-report; nothing to assert beyond "no
        // change" since got_eos short-circuits.
        BusReactor::new().handle(&shared, &ActionTypeRegistry::new(), BusMessage::Eos);
        assert!(lock(&shared).scenario.got_eos);
    }

    #[test]
    fn streams_selected_matching_expectation_completes_switch() {
        let mut scenario = Scenario::new("t");
        let action = Action::new(ActionNumber(0), "switch-track", Structure::new("switch-track"));
        let id = scenario.push_action(action);

        let shared = shared_runtime(ScriptedPipeline::new(), scenario);
        lock(&shared).pending_switch = Some(ExpectedStreams { action_id: id, expected: vec!["audio-1".to_string()] });

        BusReactor::new().handle(
            &shared,
            &ActionTypeRegistry::new(),
            BusMessage::StreamsSelected { stream_ids: vec!["audio-1".to_string()] },
        );

        let rt = lock(&shared);
        assert!(rt.scenario.action(id).flags.pending_set_done);
        assert!(rt.pending_switch.is_none());
    }

    #[test]
    fn streams_selected_mismatch_errors_the_action() {
        let mut scenario = Scenario::new("t");
        let action = Action::new(ActionNumber(0), "switch-track", Structure::new("switch-track"));
        let id = scenario.push_action(action);

        let shared = shared_runtime(ScriptedPipeline::new(), scenario);
        lock(&shared).pending_switch = Some(ExpectedStreams { action_id: id, expected: vec!["audio-1".to_string()] });

        BusReactor::new().handle(
            &shared,
            &ActionTypeRegistry::new(),
            BusMessage::StreamsSelected { stream_ids: vec!["audio-0".to_string()] },
        );

        let rt = lock(&shared);
        assert_eq!(rt.scenario.action(id).state, ActionState::ErrorReported);
    }

    #[test]
    fn buffering_below_full_blocks_and_full_clears() {
        let scenario = Scenario::new("t");
        let shared = shared_runtime(ScriptedPipeline::new(), scenario);
        BusReactor::new().handle(&shared, &ActionTypeRegistry::new(), BusMessage::Buffering { percent: 42 });
        assert!(lock(&shared).scenario.buffering);
        BusReactor::new().handle(&shared, &ActionTypeRegistry::new(), BusMessage::Buffering { percent: 100 });
        assert!(!lock(&shared).scenario.buffering);
    }

    #[test]
    fn qos_accumulates_dropped_count() {
        let scenario = Scenario::new("t");
        let shared = shared_runtime(ScriptedPipeline::new(), scenario);
        BusReactor::new().handle(&shared, &ActionTypeRegistry::new(), BusMessage::Qos { dropped: 3 });
        BusReactor::new().handle(&shared, &ActionTypeRegistry::new(), BusMessage::Qos { dropped: 4 });
        assert_eq!(lock(&shared).scenario.dropped, 7);
    }

    #[test]
    fn named_message_resolves_matching_wait() {
        let mut scenario = Scenario::new("t");
        let action = Action::new(ActionNumber(0), "wait", Structure::new("wait"));
        let id = scenario.push_action(action);

        let shared = shared_runtime(ScriptedPipeline::new(), scenario);
        lock(&shared).pending_waits.insert(id, WaitCondition::MessageType { type_name: "custom-marker".to_string() });

        BusReactor::new().handle(&shared, &ActionTypeRegistry::new(), BusMessage::Named { type_name: "custom-marker".to_string() });

        let rt = lock(&shared);
        assert!(rt.scenario.action(id).flags.pending_set_done);
        assert!(!rt.pending_waits.contains_key(&id));
    }

    #[test]
    fn latency_above_max_is_reported() {
        let mut scenario = Scenario::new("t");
        scenario.max_latency = Some(0.1);
        let (tx, rx) = std::sync::mpsc::channel();
        let reporter = Arc::new(ChannelReporter::new(tx));

        let mut pipeline = ScriptedPipeline::new();
        pipeline.latency = Some(0.5);
        let shared = shared_runtime(pipeline, scenario);
        lock(&shared).reporter = reporter;

        BusReactor::new().handle(&shared, &ActionTypeRegistry::new(), BusMessage::Latency);

        let report = rx.try_recv().expect("latency report");
        assert_eq!(report.code, ReportCode::ConfigLatencyTooHigh);
    }

    #[test]
    fn deferred_playback_time_reparses_once_duration_known() {
        let mut scenario = Scenario::new("t");
        let mut structure = Structure::new("seek");
        structure.set("playback-time", Value::String("duration / 2".to_string()));
        let mut action = Action::new(ActionNumber(0), "seek", structure);
        action.flags.needs_playback_parsing = true;
        scenario.push_action(action);

        let shared = shared_runtime(ScriptedPipeline::new(), scenario);
        BusReactor::new().handle(&shared, &ActionTypeRegistry::new(), BusMessage::AsyncDone);

        let rt = lock(&shared);
        assert_eq!(rt.scenario.actions_arena[0].playback_time, Some(5.0));
        assert!(!rt.scenario.actions_arena[0].flags.needs_playback_parsing);
    }

    #[test]
    fn error_message_is_treated_as_terminal_like_eos() {
        let mut scenario = Scenario::new("t");
        scenario.push_action(Action::new(ActionNumber(0), "wait", Structure::new("wait")));
        let shared = shared_runtime(ScriptedPipeline::new(), scenario);

        BusReactor::new().handle(&shared, &ActionTypeRegistry::new(), BusMessage::Error { message: "decoder fault".to_string() });

        assert!(lock(&shared).scenario.got_eos);
        assert_eq!(lock(&shared).pipeline.state(), PipelineState::Null);
    }
}
