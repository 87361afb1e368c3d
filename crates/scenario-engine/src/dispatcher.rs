// crates/scenario-engine/src/dispatcher.rs
// ============================================================================
// Module: Dispatcher
// Description: Drives the main action queue.
// Purpose: Gate advancement on buffering/async-completion state, resolve
//          timed waits and synthetic async completions, and run the head
//          action's `prepare`/`execute` cycle when the position and
//          execution gates allow it.
// Dependencies: scenario_core, crate::runtime, crate::lifecycle, crate::pipeline
// ============================================================================

//! ## Overview
//!
//! The dispatcher is modeled as a re-entrant main-loop task: it either
//! recurses synchronously into the next action or reinstalls itself as a
//! low-priority task. This crate has no event-loop reactor of its own
//! (`scenario-cli` or another embedder drives the loop), so
//! [`Dispatcher::tick`] is that single task, meant to be called repeatedly
//! on a caller-owned schedule (a timer at `action_execution_interval`, or a
//! tight loop in a test). Internally it still performs that "recursion":
//! [`Dispatcher::tick`] advances as many actions as complete synchronously
//! in one call, stopping only once the head action is genuinely waiting on
//! something (the pipeline, a timer, or the bus reactor).
//!
//! `on_addition_actions` has no real "element added" signal to key off in
//! this crate (the `Pipeline` trait has no element-enumeration API), so
//! [`Dispatcher::run_on_addition`] is the closest equivalent available
//! here: run them all once the caller believes the pipeline topology is
//! ready. Recorded as a design decision in `DESIGN.md`.

use std::time::Instant;

use scenario_core::ActionState;
use scenario_core::ActionType;
use scenario_core::ActionTypeFlags;
use scenario_core::ActionTypeRegistry;
use scenario_core::ExecuteResult;
use scenario_core::Report;
use scenario_core::ReportCode;

use crate::lifecycle;
use crate::pipeline::PipelineState;
use crate::runtime::lock;
use crate::runtime::Runtime;
use crate::runtime::SharedRuntime;

/// Default position-gate tolerance, in seconds (`seek_pos_tol`, default
/// 1 ms).
pub const DEFAULT_SEEK_POS_TOL: f64 = 0.001;

/// What one [`Dispatcher::tick`] call accomplished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// At least one action's `prepare`/`execute` cycle ran.
    Advanced,
    /// Nothing ran; the head action (or the scenario as a whole) is
    /// blocked on buffering, an in-flight async completion, a timer, or a
    /// bus message.
    Idle,
    /// Every loaded action has reached a terminal state and no
    /// interlaced/on-addition actions remain.
    ScenarioDone,
}

/// Drives the main queue.
#[derive(Debug, Clone, Copy)]
pub struct Dispatcher {
    /// Position-gate tolerance, in seconds.
    seek_pos_tol: f64,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher {
    /// Creates a dispatcher with the spec-default position-gate tolerance.
    #[must_use]
    pub const fn new() -> Self {
        Self { seek_pos_tol: DEFAULT_SEEK_POS_TOL }
    }

    /// Creates a dispatcher with a caller-chosen position-gate tolerance.
    #[must_use]
    pub const fn with_seek_pos_tol(seek_pos_tol: f64) -> Self {
        Self { seek_pos_tol }
    }

    /// Runs one dispatcher pass: resolves due timers and synthetic
    /// completions, drains any pending `set_done`, then advances the main
    /// queue as far as it can without blocking.
    pub fn tick(&self, shared: &SharedRuntime, registry: &ActionTypeRegistry) -> DispatchOutcome {
        self.resolve_due_waits(shared);
        self.resolve_pending_appsrc(shared);
        self.restore_after_pause(shared);
        self.drain_all_pending_set_done(shared);

        loop {
            match self.advance_once(shared, registry) {
                DispatchOutcome::Advanced => continue,
                other => return other,
            }
        }
    }

    /// Runs every `on_addition_actions` entry once. This crate has no
    /// "element added" signal to wait for (see module docs); the caller
    /// decides when the pipeline topology is considered ready.
    pub fn run_on_addition(&self, shared: &SharedRuntime, registry: &ActionTypeRegistry) {
        let pending: Vec<_> = {
            let mut rt = lock(shared);
            std::mem::take(&mut rt.scenario.on_addition_actions)
        };
        for id in pending {
            let type_name = lock(shared).scenario.action(id).type_name.clone();
            let Some(action_type) = registry.lookup(&type_name) else { continue };
            self.run_action(shared, id, &action_type);
        }
    }

    /// Resolves `Duration`-kind pending waits whose deadline has passed.
    fn resolve_due_waits(&self, shared: &SharedRuntime) {
        let now = Instant::now();
        let mut rt = lock(shared);
        let due: Vec<_> = rt
            .pending_waits
            .iter()
            .filter_map(|(id, condition)| match condition {
                crate::runtime::WaitCondition::Duration { until } if *until <= now => Some(*id),
                _ => None,
            })
            .collect();
        for id in due {
            rt.pending_waits.remove(&id);
            lifecycle::mark_pending_set_done(rt.scenario.action_mut(id));
        }
    }

    /// Resolves pending `appsrc-push` transit acknowledgements.
    ///
    /// The `Pipeline` trait has no pad-probe equivalent (see `pipeline.rs`),
    /// so a push is considered transited as soon as the handler's call to
    /// [`crate::pipeline::Pipeline::push_appsrc_buffer`] returns `Ok`; this
    /// resolves every still-pending entry on the very next tick.
    fn resolve_pending_appsrc(&self, shared: &SharedRuntime) {
        let mut rt = lock(shared);
        let pending: Vec<_> = rt.pending_appsrc.keys().copied().collect();
        for id in pending {
            rt.pending_appsrc.remove(&id);
            lifecycle::mark_pending_set_done(rt.scenario.action_mut(id));
        }
    }

    /// Requests a return to `PLAYING` once a `pause, duration=...`'s
    /// restore deadline has passed.
    fn restore_after_pause(&self, shared: &SharedRuntime) {
        let now = Instant::now();
        let mut rt = lock(shared);
        let Some(at) = rt.pause_restore_at else { return };
        if at > now {
            return;
        }
        rt.pause_restore_at = None;
        let _ = rt.pipeline.request_state(PipelineState::Playing);
    }

    /// Drains every action's `pending_set_done` flag, wherever it lives in
    /// the arena (main queue head, interlaced, or otherwise): this must
    /// happen before any "not ended" count is taken, and doing it
    /// unconditionally every tick keeps that true without tracking which
    /// queue an async action is parked in.
    fn drain_all_pending_set_done(&self, shared: &SharedRuntime) {
        let mut rt = lock(shared);
        for action in &mut rt.scenario.actions_arena {
            if action.flags.pending_set_done {
                lifecycle::drain_pending_set_done(action);
            }
        }
    }

    /// Advances the main queue by exactly one step, if the gates allow it.
    fn advance_once(&self, shared: &SharedRuntime, registry: &ActionTypeRegistry) -> DispatchOutcome {
        let head = {
            let rt = lock(shared);
            if rt.scenario.buffering {
                return DispatchOutcome::Idle;
            }
            if rt.scenario.changing_state || rt.scenario.needs_async_done {
                return DispatchOutcome::Idle;
            }
            rt.scenario.actions.front().copied()
        };

        let Some(head_id) = head else {
            let rt = lock(shared);
            return if rt.scenario.all_actions_terminal() { DispatchOutcome::ScenarioDone } else { DispatchOutcome::Idle };
        };

        let head_state = lock(shared).scenario.action(head_id).state;
        match head_state {
            ActionState::InProgress | ActionState::Async | ActionState::Interlaced => {
                self.check_timeout(shared, head_id);
                DispatchOutcome::Idle
            }
            ActionState::Ok | ActionState::Error | ActionState::ErrorReported => {
                lock(shared).scenario.actions.pop_front();
                DispatchOutcome::Advanced
            }
            ActionState::None => self.run_head(shared, head_id, registry),
        }
    }

    /// Reports `SCENARIO_ACTION_TIMEOUT` and marks the action errored-out
    /// if its `timeout` has elapsed while `ASYNC`.
    fn check_timeout(&self, shared: &SharedRuntime, id: scenario_core::ActionId) {
        let mut rt = lock(shared);
        let now = Instant::now();
        let timed_out = rt.scenario.action(id).is_timed_out(now);
        if !timed_out {
            return;
        }
        rt.scenario.action_mut(id).state = ActionState::ErrorReported;
        rt.reporter.report(&Report {
            level: rt.scenario.overrides.resolve(ReportCode::ScenarioActionTimeout),
            code: ReportCode::ScenarioActionTimeout,
            message: format!("action #{} timed out", id.0),
            trace: None,
        });
    }

    /// Applies the position gate, then the execution gate, to the head
    /// action, running it if both allow.
    fn run_head(&self, shared: &SharedRuntime, id: scenario_core::ActionId, registry: &ActionTypeRegistry) -> DispatchOutcome {
        self.apply_position_gate(shared);

        let type_name = lock(shared).scenario.action(id).type_name.clone();
        let Some(action_type) = registry.lookup(&type_name) else {
            let mut rt = lock(shared);
            rt.scenario.action_mut(id).state = ActionState::ErrorReported;
            rt.reporter.report(&Report {
                level: ReportCode::UnknownActionType.default_level(),
                code: ReportCode::UnknownActionType,
                message: format!("no registered action type '{type_name}'"),
                trace: None,
            });
            drop(rt);
            lock(shared).scenario.actions.pop_front();
            return DispatchOutcome::Advanced;
        };

        if !self.execution_gate_open(shared, id, &action_type) {
            return DispatchOutcome::Idle;
        }

        self.run_action(shared, id, &action_type);
        DispatchOutcome::Advanced
    }

    /// Runs `prepare`/`execute` for `id`, using `action_type`, and advances
    /// the queue if it completed synchronously.
    ///
    /// The action is removed from the arena (swapped for a placeholder) for
    /// the duration of `execute`: a built-in handler reaches the pipeline
    /// and scenario state through its own [`crate::runtime::lock`] call, and
    /// `std::sync::Mutex` is not reentrant, so the dispatcher must not hold
    /// the runtime lock while a handler runs (see `runtime.rs`'s module
    /// docs).
    fn run_action(&self, shared: &SharedRuntime, id: scenario_core::ActionId, action_type: &ActionType) {
        let vars = {
            let mut rt = lock(shared);
            let position = rt.pipeline.position();
            let duration = rt.pipeline.duration();
            rt.scenario.vars.refresh_position_duration(position, duration);
            rt.scenario.vars.clone()
        };
        let (number, placeholder_name) = {
            let rt = lock(shared);
            let action = rt.scenario.action(id);
            (action.action_number, format!("{}-reserved", action.type_name))
        };
        let placeholder = scenario_core::Action::new(number, placeholder_name, scenario_core::Structure::new("reserved"));
        let mut action = {
            let mut rt = lock(shared);
            std::mem::replace(rt.scenario.action_mut(id), placeholder)
        };

        if let Err(err) = lifecycle::prepare(&mut action, action_type, &vars) {
            action.state = ActionState::ErrorReported;
            let mut rt = lock(shared);
            *rt.scenario.action_mut(id) = action;
            rt.reporter.report(&Report {
                level: err.code().default_level(),
                code: err.code(),
                message: err.to_string(),
                trace: None,
            });
            rt.scenario.actions.pop_front();
            return;
        }

        let result = lifecycle::execute(&mut action, action_type);

        let mut rt = lock(shared);
        *rt.scenario.action_mut(id) = action;
        match result {
            ExecuteResult::Ok => {
                let terminal = lifecycle::advance_after_completion(rt.scenario.action_mut(id));
                if terminal {
                    rt.scenario.actions.pop_front();
                }
            }
            ExecuteResult::Error | ExecuteResult::ErrorReported => {
                if matches!(result, ExecuteResult::Error) {
                    rt.reporter.report(&Report {
                        level: rt.scenario.overrides.resolve(ReportCode::ScenarioActionExecutionError),
                        code: ReportCode::ScenarioActionExecutionError,
                        message: format!("action '{}' failed", rt.scenario.action(id).type_name),
                        trace: None,
                    });
                }
                rt.scenario.actions.pop_front();
            }
            ExecuteResult::Async => {
                // Stays at the front of the queue; the bus reactor's
                // `set_done` transitions it onward.
            }
            ExecuteResult::Interlaced => {
                rt.scenario.actions.pop_front();
                rt.scenario.interlaced_actions.push(id);
            }
        }
    }

    /// Position gate: compares the pipeline's current
    /// position against `segment_start`/`segment_stop`/`duration`,
    /// reporting observational-severity codes when it falls outside them.
    fn apply_position_gate(&self, shared: &SharedRuntime) {
        let mut rt = lock(shared);
        let Some(pos) = rt.pipeline.position() else { return };
        let duration = rt.pipeline.duration();
        let tol = self.seek_pos_tol;
        let (start, stop, accurate, seeked_in_pause) =
            (rt.scenario.segment_start, rt.scenario.segment_stop, rt.scenario.seek_flags.accurate, rt.scenario.seeked_in_pause);

        if (accurate && pos < start - tol) || pos > stop + tol {
            report(&mut rt, ReportCode::QueryPositionOutOfSegment, format!("position {pos} outside segment [{start}, {stop}]"));
        }
        if duration.is_some_and(|d| pos > d) {
            report(&mut rt, ReportCode::QueryPositionSuperiorDuration, format!("position {pos} exceeds duration"));
        }
        if seeked_in_pause && accurate && (pos - start).abs() > tol {
            report(&mut rt, ReportCode::EventSeekResultPositionWrong, format!("position {pos} does not match seek target {start}"));
            rt.scenario.seeked_in_pause = false;
        }
    }

    /// Execution gate: true when the head action should run
    /// now, given its `playback_time`, the current position/rate, and
    /// whether it needs a live pipeline.
    fn execution_gate_open(&self, shared: &SharedRuntime, id: scenario_core::ActionId, action_type: &ActionType) -> bool {
        let rt = lock(shared);
        let action = rt.scenario.action(id);
        let Some(playback_time) = action.playback_time else { return true };

        let pipeline_not_ready = rt.pipeline.state() < PipelineState::Paused;
        if pipeline_not_ready {
            return true;
        }
        if action_type.flags.contains(ActionTypeFlags::DOESNT_NEED_PIPELINE) {
            return true;
        }

        let Some(position) = rt.pipeline.position() else { return false };
        if rt.last_rate > 0.0 {
            position >= playback_time
        } else if rt.last_rate < 0.0 {
            position <= playback_time
        } else {
            true
        }
    }
}

/// Reports `code`/`message` at its resolved severity.
fn report(rt: &mut Runtime, code: ReportCode, message: String) {
    let level = rt.scenario.overrides.resolve(code);
    rt.reporter.report(&Report { level, code, message, trace: None });
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, reason = "test assertions may panic directly")]
    use std::path::Path;
    use std::sync::Arc;
    use std::sync::Mutex;

    use scenario_core::Action;
    use scenario_core::ActionNumber;
    use scenario_core::Scenario;
    use scenario_core::Structure;
    use scenario_core::Value;

    use super::*;
    use crate::pipeline::BusMessage;
    use crate::pipeline::Pipeline;
    use crate::pipeline::PipelineError;
    use crate::pipeline::SeekRequest;
    use crate::pipeline::StateChangeOutcome;
    use crate::pipeline::TargetSelector;
    use crate::pipeline::TrackIndex;
    use crate::reporting::ChannelReporter;

    /// Fixed-answer `Pipeline` double: no bus messages, a caller-set
    /// state/position/duration, everything else a no-op.
    struct FixedPipeline {
        state: PipelineState,
        position: Option<f64>,
        duration: Option<f64>,
    }

    impl FixedPipeline {
        fn new() -> Self {
            Self { state: PipelineState::Paused, position: Some(0.0), duration: Some(10.0) }
        }
    }

    impl Pipeline for FixedPipeline {
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
            None
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
            None
        }
    }

    fn shared_runtime(pipeline: FixedPipeline, scenario: Scenario) -> SharedRuntime {
        Arc::new(Mutex::new(Runtime::new(scenario, Box::new(pipeline))))
    }

    /// Registers a trivial action type that completes synchronously.
    fn sync_action_type(name: &str) -> ActionType {
        ActionType {
            name: name.to_string(),
            implementer_namespace: "test".to_string(),
            rank: 0,
            flags: ActionTypeFlags::NONE,
            parameters: Vec::new(),
            prepare: None,
            execute: std::sync::Arc::new(|_ctx| ExecuteResult::Ok),
            overriden_type: None,
        }
    }

    #[test]
    fn tick_reports_scenario_done_on_empty_queue() {
        let shared = shared_runtime(FixedPipeline::new(), Scenario::new("t"));
        let outcome = Dispatcher::new().tick(&shared, &ActionTypeRegistry::new());
        assert_eq!(outcome, DispatchOutcome::ScenarioDone);
    }

    #[test]
    fn tick_advances_a_synchronous_action_to_completion() {
        let mut scenario = Scenario::new("t");
        scenario.push_action(Action::new(ActionNumber(0), "noop", Structure::new("noop")));
        let shared = shared_runtime(FixedPipeline::new(), scenario);

        let mut registry = ActionTypeRegistry::new();
        registry.register(sync_action_type("noop"));

        let outcome = Dispatcher::new().tick(&shared, &registry);
        assert_eq!(outcome, DispatchOutcome::Advanced);
        assert_eq!(Dispatcher::new().tick(&shared, &registry), DispatchOutcome::ScenarioDone);
    }

    #[test]
    fn unknown_action_type_is_reported_and_popped() {
        let mut scenario = Scenario::new("t");
        scenario.push_action(Action::new(ActionNumber(0), "missing", Structure::new("missing")));
        let (tx, rx) = std::sync::mpsc::channel();
        let shared = shared_runtime(FixedPipeline::new(), scenario);
        lock(&shared).reporter = Arc::new(ChannelReporter::new(tx));

        let outcome = Dispatcher::new().tick(&shared, &ActionTypeRegistry::new());

        assert_eq!(outcome, DispatchOutcome::ScenarioDone);
        let report = rx.try_recv().expect("unknown-action-type report");
        assert_eq!(report.code, ReportCode::UnknownActionType);
    }

    #[test]
    fn execution_gate_blocks_before_playback_time_and_opens_after() {
        let mut registry = ActionTypeRegistry::new();
        registry.register(sync_action_type("noop"));

        let mut early = Scenario::new("t");
        let mut action = Action::new(ActionNumber(0), "noop", Structure::new("noop"));
        action.playback_time = Some(5.0);
        early.push_action(action);
        let mut pipeline = FixedPipeline::new();
        pipeline.position = Some(1.0);
        let shared = shared_runtime(pipeline, early);
        lock(&shared).last_rate = 1.0;
        assert_eq!(Dispatcher::new().tick(&shared, &registry), DispatchOutcome::Idle);

        let mut late = Scenario::new("t");
        let mut action = Action::new(ActionNumber(0), "noop", Structure::new("noop"));
        action.playback_time = Some(5.0);
        late.push_action(action);
        let mut pipeline = FixedPipeline::new();
        pipeline.position = Some(9.0);
        let shared = shared_runtime(pipeline, late);
        lock(&shared).last_rate = 1.0;
        assert_eq!(Dispatcher::new().tick(&shared, &registry), DispatchOutcome::Advanced);
    }

    #[test]
    fn async_action_times_out_and_is_reported() {
        let mut scenario = Scenario::new("t");
        let mut action = Action::new(ActionNumber(0), "hang", Structure::new("hang"));
        action.state = ActionState::Async;
        action.timeout = Some(std::time::Duration::from_millis(1));
        action.execution_time = Some(std::time::Instant::now() - std::time::Duration::from_secs(1));
        let id = scenario.push_action(action);
        let (tx, rx) = std::sync::mpsc::channel();
        let shared = shared_runtime(FixedPipeline::new(), scenario);
        lock(&shared).reporter = Arc::new(ChannelReporter::new(tx));

        Dispatcher::new().tick(&shared, &ActionTypeRegistry::new());

        let report = rx.try_recv().expect("scenario-action-timeout report");
        assert_eq!(report.code, ReportCode::ScenarioActionTimeout);
        assert_eq!(lock(&shared).scenario.action(id).state, ActionState::ErrorReported);
    }

    #[test]
    fn position_gate_reports_out_of_segment() {
        let mut scenario = Scenario::new("t");
        scenario.segment_start = 0.0;
        scenario.segment_stop = 2.0;
        scenario.push_action(Action::new(ActionNumber(0), "noop", Structure::new("noop")));
        let mut pipeline = FixedPipeline::new();
        pipeline.position = Some(9.0);
        let (tx, rx) = std::sync::mpsc::channel();
        let shared = shared_runtime(pipeline, scenario);
        lock(&shared).reporter = Arc::new(ChannelReporter::new(tx));

        let mut registry = ActionTypeRegistry::new();
        registry.register(sync_action_type("noop"));
        Dispatcher::new().tick(&shared, &registry);

        let report = rx.try_recv().expect("query-position-out-of-segment report");
        assert_eq!(report.code, ReportCode::QueryPositionOutOfSegment);
    }
}
