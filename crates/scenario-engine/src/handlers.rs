// crates/scenario-engine/src/handlers.rs
// ============================================================================
// Module: Built-in Action Handlers
// Description: The concrete `execute` closures for every action kind this
//              crate supports.
// Purpose: Translate a loaded action's structure into calls against the
//          `Pipeline` collaborator, using `Runtime` for everything that
//          outlives one action (pending waits, switch-track bookkeeping,
//          appsrc transit, severity-overridden reporting).
// Dependencies: scenario_core, crate::pipeline, crate::runtime, sha1
// ============================================================================

//! ## Overview
//!
//! [`register_builtins`] registers one [`scenario_core::ActionType`] per
//! supported action kind into a caller-supplied
//! [`scenario_core::ActionTypeRegistry`], each wrapping a closure that
//! captures a clone of the [`crate::runtime::SharedRuntime`] handed to this
//! function. Every closure follows the same shape: read parameters off
//! `ctx.action.structure`, borrow the runtime just long enough to reach the
//! pipeline or scenario-wide state, and translate the result into an
//! [`scenario_core::ExecuteResult`].
//!
//! `set-rank`/`set-feature-rank`/`disable-plugin` are registered as
//! ordinary (non-`CONFIG`) action types here, not handled at load time.
//! `scenario-loader`'s `CONFIG` path runs a
//! handler with no `Runtime` available (see `loader.rs`'s `load_action`),
//! and these three need the pipeline's plugin registry, which only exists
//! once a `Runtime` is constructed. Placing them on the dispatcher queue
//! like anything else achieves the same practical effect -- a scenario
//! still writes them before any `seek`/`play` it wants them to affect --
//! without requiring the loader to carry a pipeline reference. Recorded as
//! an open-question resolution in `DESIGN.md`.

use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;

use scenario_core::ActionType;
use scenario_core::ActionTypeFlags;
use scenario_core::ActionTypeRegistry;
use scenario_core::ExecuteResult;
use scenario_core::HandlerContext;
use scenario_core::ParameterSchema;
use scenario_core::ReportCode;
use scenario_core::Structure;
use scenario_core::Value;

use crate::pipeline::PipelineError;
use crate::pipeline::PipelineState;
use crate::pipeline::SeekRequest;
use crate::pipeline::SeekType;
use crate::pipeline::TargetSelector;
use crate::pipeline::TrackIndex;
use crate::runtime::lock;
use crate::runtime::ExpectedStreams;
use crate::runtime::PendingAppsrcPush;
use crate::runtime::SharedRuntime;
use crate::runtime::WaitCondition;

// ============================================================================
// SECTION: Target selector helpers
// ============================================================================

/// Recovers the [`scenario_core::ActionId`] an in-flight action will be
/// found under once the dispatcher restores it to the arena.
///
/// The loader assigns `action_number` from the arena's length at the
/// moment of insertion (`loader.rs::load_action`), and every action is
/// pushed onto the same arena regardless of which queue it lands in, so
/// `action_number` and the eventual arena index coincide for the lifetime
/// of one loaded scenario.
fn action_id_of(action: &scenario_core::Action) -> scenario_core::ActionId {
    scenario_core::ActionId(action.action_number.0)
}

/// Reads `target-element-name`/`target-element-class-name`/
/// `target-element-factory-name` off `structure` into a [`TargetSelector`].
fn target_selector(structure: &Structure) -> TargetSelector {
    TargetSelector {
        name: structure.get_str("target-element-name").map(str::to_string),
        class: structure.get_str("target-element-class-name").map(str::to_string),
        factory_name: structure.get_str("target-element-factory-name").map(str::to_string),
        sinkpad_caps: None,
    }
}

/// Reads `sink-name`/`sink-factory-name`/`sinkpad-caps` off `structure`
/// into a [`TargetSelector`] (`check-last-sample` uses a distinct naming
/// convention from the generic `target-element-*` fields).
fn sink_selector(structure: &Structure) -> TargetSelector {
    TargetSelector {
        name: structure.get_str("sink-name").map(str::to_string),
        class: None,
        factory_name: structure.get_str("sink-factory-name").map(str::to_string),
        sinkpad_caps: structure.get_str("sinkpad-caps").map(str::to_string),
    }
}

/// Reports `code`/`message` through the runtime's reporter and returns
/// [`ExecuteResult::ErrorReported`], the uniform failure path every handler
/// below uses once it has a specific diagnosis.
fn report_error(rt: &crate::runtime::Runtime, code: ReportCode, message: impl Into<String>) -> ExecuteResult {
    rt.reporter.report(&scenario_core::Report {
        level: rt.scenario.overrides.resolve(code),
        code,
        message: message.into(),
        trace: None,
    });
    ExecuteResult::ErrorReported
}

// ============================================================================
// SECTION: seek
// ============================================================================

/// Parses a `+`-joined flag list (`"accurate+flush"`) into [`scenario_core::SeekFlags`].
fn parse_seek_flags(text: &str) -> scenario_core::SeekFlags {
    let mut flags = scenario_core::SeekFlags::default();
    for token in text.split('+').map(str::trim) {
        match token {
            "flush" => flags.flush = true,
            "accurate" => flags.accurate = true,
            "key-unit" | "key_unit" => flags.key_unit = true,
            "snap-before" | "snap_before" => flags.snap_before = true,
            "snap-after" | "snap_after" => flags.snap_after = true,
            "trickmode" => flags.trickmode = true,
            _ => {}
        }
    }
    flags
}

/// Parses a `start-type`/`stop-type` field; absent defaults to
/// [`SeekType::Set`] when the matching endpoint is present, [`SeekType::None`]
/// otherwise.
fn parse_seek_type(structure: &Structure, key: &str, endpoint_present: bool) -> SeekType {
    match structure.get_str(key) {
        Some("none") => SeekType::None,
        Some("end") => SeekType::End,
        Some("set") | None if endpoint_present => SeekType::Set,
        _ => SeekType::None,
    }
}

/// Executes a `seek` action.
fn h_seek(ctx: &mut HandlerContext<'_>, shared: &SharedRuntime) -> ExecuteResult {
    let structure = ctx.action.structure.clone();
    let start = structure.get_f64("start");
    let stop = structure.get_f64("stop");
    let request = SeekRequest {
        start: start.unwrap_or(0.0),
        stop: stop.unwrap_or(f64::INFINITY),
        rate: structure.get_f64("rate").unwrap_or(1.0),
        flags: structure.get_str("flags").map(parse_seek_flags).unwrap_or_default(),
        start_type: parse_seek_type(&structure, "start-type", start.is_some()),
        stop_type: parse_seek_type(&structure, "stop-type", stop.is_some()),
    };

    let action_id = action_id_of(ctx.action);
    let mut rt = lock(shared);
    match rt.pipeline.seek(&request) {
        Ok(()) => {
            rt.scenario.seek_flags = request.flags;
            rt.scenario.needs_async_done = true;
            rt.pending_async_done.push(action_id);
            rt.last_rate = request.rate;
            rt.pending_seek = Some(request);
            drop(rt);
            ExecuteResult::Async
        }
        Err(PipelineError::Unsupported(reason)) => report_error(&rt, ReportCode::EventSeekNotHandled, reason),
        Err(err) => report_error(&rt, ReportCode::ScenarioActionExecutionError, err.to_string()),
    }
}

// ============================================================================
// SECTION: state changes (set-state / play / pause / stop)
// ============================================================================

/// Parses a `state`/`set-state` target name.
fn parse_target_state(name: &str) -> Option<PipelineState> {
    match name {
        "null" => Some(PipelineState::Null),
        "ready" => Some(PipelineState::Ready),
        "paused" => Some(PipelineState::Paused),
        "playing" => Some(PipelineState::Playing),
        _ => None,
    }
}

/// Shared by `set-state`/`play`/`pause`/`stop`: requests `state`, parking
/// the action for an `ASYNC-DONE`-equivalent bus message if the pipeline
/// does not complete synchronously.
fn request_state(ctx: &mut HandlerContext<'_>, shared: &SharedRuntime, state: PipelineState) -> ExecuteResult {
    let action_id = action_id_of(ctx.action);
    let mut rt = lock(shared);
    match rt.pipeline.request_state(state) {
        Ok(crate::pipeline::StateChangeOutcome::Sync) => {
            rt.scenario.target_state = target_state_of(state);
            ExecuteResult::Ok
        }
        Ok(crate::pipeline::StateChangeOutcome::Async) => {
            rt.scenario.target_state = target_state_of(state);
            rt.scenario.changing_state = true;
            rt.scenario.needs_async_done = true;
            rt.pending_async_done.push(action_id);
            ExecuteResult::Async
        }
        Err(err) => report_error(&rt, ReportCode::StateChangeFailure, err.to_string()),
    }
}

/// Maps a pipeline state onto the scenario-wide target-state enum.
fn target_state_of(state: PipelineState) -> scenario_core::TargetState {
    match state {
        PipelineState::Null | PipelineState::Ready => scenario_core::TargetState::Null,
        PipelineState::Paused => scenario_core::TargetState::Paused,
        PipelineState::Playing => scenario_core::TargetState::Playing,
    }
}

/// Executes `set-state`.
fn h_set_state(ctx: &mut HandlerContext<'_>, shared: &SharedRuntime) -> ExecuteResult {
    let Some(state_name) = ctx.action.structure.get_str("state").map(str::to_string) else {
        let rt = lock(shared);
        return report_error(&rt, ReportCode::ScenarioActionExecutionError, "set-state is missing 'state'");
    };
    let Some(state) = parse_target_state(&state_name) else {
        let rt = lock(shared);
        return report_error(&rt, ReportCode::ScenarioActionExecutionError, format!("unknown state '{state_name}'"));
    };
    request_state(ctx, shared, state)
}

/// Executes `play`, a `set-state` shorthand for `playing`.
fn h_play(ctx: &mut HandlerContext<'_>, shared: &SharedRuntime) -> ExecuteResult {
    request_state(ctx, shared, PipelineState::Playing)
}

/// Executes `pause`, optionally scheduling a `duration`-based resume.
fn h_pause(ctx: &mut HandlerContext<'_>, shared: &SharedRuntime) -> ExecuteResult {
    let duration = ctx.action.structure.get_f64("duration");
    let result = request_state(ctx, shared, PipelineState::Paused);
    if let Some(duration) = duration {
        let mut rt = lock(shared);
        let multiplier = rt.wait_multiplier;
        rt.pause_restore_at = Some(Instant::now() + Duration::from_secs_f64((duration * multiplier).max(0.0)));
    }
    result
}

/// Executes `stop`, checking the dropped-buffer budget first.
fn h_stop(ctx: &mut HandlerContext<'_>, shared: &SharedRuntime) -> ExecuteResult {
    let rt = lock(shared);
    if let Some(max) = rt.scenario.max_dropped {
        if rt.scenario.dropped > max {
            return report_error(
                &rt,
                ReportCode::ConfigTooManyBuffersDropped,
                format!("stop reached with {} dropped buffers (max {max})", rt.scenario.dropped),
            );
        }
    }
    drop(rt);
    request_state(ctx, shared, PipelineState::Null)
}

/// Executes `eos`, sending end-of-stream into the pipeline.
fn h_eos(_ctx: &mut HandlerContext<'_>, shared: &SharedRuntime) -> ExecuteResult {
    let mut rt = lock(shared);
    match rt.pipeline.send_eos() {
        Ok(()) => ExecuteResult::Ok,
        Err(err) => report_error(&rt, ReportCode::ScenarioActionExecutionError, err.to_string()),
    }
}

// ============================================================================
// SECTION: switch-track
// ============================================================================

/// Parses `disable`/`index` into a [`TrackIndex`] for `switch-track`.
fn parse_track_index(structure: &Structure) -> TrackIndex {
    if structure.get_bool("disable").unwrap_or(false) {
        return TrackIndex::Disable;
    }
    match structure.get("index") {
        Some(Value::Int(v)) => TrackIndex::Absolute(*v),
        #[allow(clippy::cast_possible_truncation, reason = "track indices never approach i64::MAX")]
        Some(Value::Double(v)) => TrackIndex::Absolute(*v as i64),
        Some(Value::String(s)) if s.starts_with('+') || s.starts_with('-') => {
            TrackIndex::Relative(s.parse().unwrap_or(1))
        }
        Some(Value::String(s)) => TrackIndex::Absolute(s.parse().unwrap_or(0)),
        _ => TrackIndex::Relative(1),
    }
}

/// Executes `switch-track`.
fn h_switch_track(ctx: &mut HandlerContext<'_>, shared: &SharedRuntime) -> ExecuteResult {
    let Some(stream_type) = ctx.action.structure.get_str("type").map(str::to_string) else {
        let rt = lock(shared);
        return report_error(&rt, ReportCode::ScenarioActionExecutionError, "switch-track is missing 'type'");
    };
    let index = parse_track_index(&ctx.action.structure);

    let mut rt = lock(shared);
    let available = rt.pipeline.stream_ids(&stream_type);
    let resolved = match index {
        TrackIndex::Disable => None,
        TrackIndex::Absolute(n) => usize::try_from(n).ok().and_then(|i| available.get(i).cloned()),
        TrackIndex::Relative(_) => None,
    };
    let playing = rt.pipeline.state() == PipelineState::Playing;

    match rt.pipeline.switch_track(&stream_type, index) {
        Ok(()) if playing => {
            rt.scenario.pending_switch_track =
                Some(scenario_core::PendingSwitchTrack { stream_type: stream_type.clone(), index: match index {
                    TrackIndex::Absolute(n) => Some(n),
                    _ => None,
                } });
            let mut expected: Vec<String> = rt
                .pipeline
                .selected_stream_ids()
                .into_iter()
                .filter(|id| !available.contains(id))
                .collect();
            if let Some(resolved) = resolved {
                expected.push(resolved);
            } else if !matches!(index, TrackIndex::Disable) {
                expected.extend(available.first().cloned());
            }
            rt.pending_switch = Some(ExpectedStreams { action_id: action_id_of(ctx.action), expected });
            rt.scenario.needs_async_done = true;
            drop(rt);
            ExecuteResult::Async
        }
        Ok(()) => ExecuteResult::Interlaced,
        Err(err) => report_error(&rt, ReportCode::ScenarioActionExecutionError, err.to_string()),
    }
}

// ============================================================================
// SECTION: wait
// ============================================================================

/// Executes `wait`, parking on a duration, signal, or named message.
fn h_wait(ctx: &mut HandlerContext<'_>, shared: &SharedRuntime) -> ExecuteResult {
    let structure = ctx.action.structure.clone();
    let action_id = action_id_of(ctx.action);
    let mut rt = lock(shared);

    if let Some(signal_name) = structure.get_str("signal-name") {
        rt.pending_waits.insert(action_id, WaitCondition::Signal { signal_name: signal_name.to_string() });
        return ExecuteResult::Async;
    }
    if let Some(message_type) = structure.get_str("message-type") {
        rt.pending_waits.insert(action_id, WaitCondition::MessageType { type_name: message_type.to_string() });
        return ExecuteResult::Async;
    }
    let duration = structure.get_f64("duration").unwrap_or(0.0) * rt.wait_multiplier;
    if duration <= 0.0 {
        return ExecuteResult::Ok;
    }
    rt.pending_waits.insert(action_id, WaitCondition::Duration { until: Instant::now() + Duration::from_secs_f64(duration) });
    ExecuteResult::Async
}

// ============================================================================
// SECTION: set-property
// ============================================================================

/// Executes `set-property`, setting then reading back a property.
fn h_set_property(ctx: &mut HandlerContext<'_>, shared: &SharedRuntime) -> ExecuteResult {
    let structure = ctx.action.structure.clone();
    let Some(property) = structure.get_str("property-name") else {
        let rt = lock(shared);
        return report_error(&rt, ReportCode::ScenarioActionExecutionError, "set-property is missing 'property-name'");
    };
    let Some(value) = structure.get("property-value").cloned() else {
        let rt = lock(shared);
        return report_error(&rt, ReportCode::ScenarioActionExecutionError, "set-property is missing 'property-value'");
    };
    let target = target_selector(&structure);
    let mut rt = lock(shared);
    match rt.pipeline.set_property(&target, property, &value) {
        Ok(()) => ExecuteResult::Ok,
        Err(err) => report_error(&rt, ReportCode::ScenarioActionExecutionError, err.to_string()),
    }
}

// ============================================================================
// SECTION: set-rank / set-feature-rank / disable-plugin
// ============================================================================

/// Reads field `key` as a rank value, clamped to `i32`'s range.
#[allow(clippy::cast_possible_truncation, reason = "ranks are small plugin-registry integers, clamped below i32::MAX")]
fn field_as_rank(structure: &Structure, key: &str) -> i32 {
    structure.get_f64(key).unwrap_or(0.0).clamp(f64::from(i32::MIN), f64::from(i32::MAX)) as i32
}

/// Executes `set-rank`.
fn h_set_rank(ctx: &mut HandlerContext<'_>, shared: &SharedRuntime) -> ExecuteResult {
    let structure = ctx.action.structure.clone();
    let factory = structure.get_str("target-element-factory-name").unwrap_or_default().to_string();
    let rank = field_as_rank(&structure, "rank");
    let mut rt = lock(shared);
    match rt.pipeline.set_rank(&factory, rank) {
        Ok(()) => ExecuteResult::Ok,
        Err(err) => report_error(&rt, ReportCode::ScenarioActionExecutionError, err.to_string()),
    }
}

/// Executes `set-feature-rank`.
fn h_set_feature_rank(ctx: &mut HandlerContext<'_>, shared: &SharedRuntime) -> ExecuteResult {
    let structure = ctx.action.structure.clone();
    let feature = structure.get_str("feature-name").unwrap_or_default().to_string();
    let rank = field_as_rank(&structure, "rank");
    let mut rt = lock(shared);
    match rt.pipeline.set_feature_rank(&feature, rank) {
        Ok(()) => ExecuteResult::Ok,
        Err(err) => report_error(&rt, ReportCode::ScenarioActionExecutionError, err.to_string()),
    }
}

/// Executes `disable-plugin`.
fn h_disable_plugin(ctx: &mut HandlerContext<'_>, shared: &SharedRuntime) -> ExecuteResult {
    let plugin = ctx.action.structure.get_str("plugin-name").unwrap_or_default().to_string();
    let mut rt = lock(shared);
    match rt.pipeline.disable_plugin(&plugin) {
        Ok(()) => ExecuteResult::Ok,
        Err(err) => report_error(&rt, ReportCode::ScenarioActionExecutionError, err.to_string()),
    }
}

// ============================================================================
// SECTION: set-vars
// ============================================================================

/// Executes `set-vars`, copying every field into the variable store.
fn h_set_vars(ctx: &mut HandlerContext<'_>, shared: &SharedRuntime) -> ExecuteResult {
    let mut rt = lock(shared);
    for (name, value) in ctx.action.structure.fields.clone() {
        let binding = match value {
            Value::Int(v) => scenario_core::VarValue::Number(v as f64),
            Value::Double(v) => scenario_core::VarValue::Number(v),
            Value::Bool(v) => scenario_core::VarValue::Number(f64::from(v)),
            Value::String(v) => scenario_core::VarValue::String(v),
            Value::Structure(_) | Value::List(_) => continue,
        };
        rt.scenario.vars.set(name, binding);
    }
    ExecuteResult::Ok
}

// ============================================================================
// SECTION: set-debug-threshold
// ============================================================================

/// Executes `set-debug-threshold`.
fn h_set_debug_threshold(ctx: &mut HandlerContext<'_>, shared: &SharedRuntime) -> ExecuteResult {
    let threshold = ctx.action.structure.get_str("threshold").unwrap_or_default().to_string();
    let mut rt = lock(shared);
    match rt.pipeline.set_debug_threshold(&threshold) {
        Ok(()) => ExecuteResult::Ok,
        Err(err) => report_error(&rt, ReportCode::ScenarioActionExecutionError, err.to_string()),
    }
}

// ============================================================================
// SECTION: appsrc-push / appsrc-eos
// ============================================================================

/// Executes `appsrc-push`, reading a file slice and pushing it.
fn h_appsrc_push(ctx: &mut HandlerContext<'_>, shared: &SharedRuntime) -> ExecuteResult {
    let structure = ctx.action.structure.clone();
    let target = target_selector(&structure);
    let Some(file_name) = structure.get_str("file-name") else {
        let rt = lock(shared);
        return report_error(&rt, ReportCode::ScenarioActionExecutionError, "appsrc-push is missing 'file-name'");
    };
    let bytes = match std::fs::read(file_name) {
        Ok(bytes) => bytes,
        Err(err) => {
            let rt = lock(shared);
            return report_error(&rt, ReportCode::ScenarioActionExecutionError, format!("{file_name}: {err}"));
        }
    };
    #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation, reason = "file offsets/sizes are bounded by the file's own byte length")]
    let offset = structure.get_f64("offset").unwrap_or(0.0).max(0.0) as usize;
    #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation, reason = "file offsets/sizes are bounded by the file's own byte length")]
    let size = structure.get_f64("size").map(|s| s.max(0.0) as usize).unwrap_or(bytes.len());
    let slice = bytes.get(offset..(offset + size).min(bytes.len())).unwrap_or(&[]);
    let caps = structure.get_str("caps");

    let action_id = action_id_of(ctx.action);
    let mut rt = lock(shared);
    let playing_or_paused = rt.pipeline.state() >= PipelineState::Paused;
    match rt.pipeline.push_appsrc_buffer(&target, slice, caps) {
        Ok(()) => {
            rt.pending_appsrc.insert(action_id, PendingAppsrcPush { target });
            if playing_or_paused { ExecuteResult::Async } else { ExecuteResult::Interlaced }
        }
        Err(err) => report_error(&rt, ReportCode::ScenarioActionExecutionError, err.to_string()),
    }
}

/// Executes `appsrc-eos`.
fn h_appsrc_eos(ctx: &mut HandlerContext<'_>, shared: &SharedRuntime) -> ExecuteResult {
    let target = target_selector(&ctx.action.structure);
    let mut rt = lock(shared);
    match rt.pipeline.appsrc_eos(&target) {
        Ok(()) => ExecuteResult::Ok,
        Err(err) => report_error(&rt, ReportCode::ScenarioActionExecutionError, err.to_string()),
    }
}

// ============================================================================
// SECTION: flush / emit-signal / dot-pipeline
// ============================================================================

/// Executes `flush`.
fn h_flush(ctx: &mut HandlerContext<'_>, shared: &SharedRuntime) -> ExecuteResult {
    let structure = ctx.action.structure.clone();
    let target = target_selector(&structure);
    let reset_time = structure.get_bool("reset-time").unwrap_or(true);
    let mut rt = lock(shared);
    match rt.pipeline.flush(&target, reset_time) {
        Ok(()) => ExecuteResult::Ok,
        Err(err) => report_error(&rt, ReportCode::ScenarioActionExecutionError, err.to_string()),
    }
}

/// Executes `emit-signal`.
fn h_emit_signal(ctx: &mut HandlerContext<'_>, shared: &SharedRuntime) -> ExecuteResult {
    let structure = ctx.action.structure.clone();
    let Some(signal) = structure.get_str("signal-name") else {
        let rt = lock(shared);
        return report_error(&rt, ReportCode::ScenarioActionExecutionError, "emit-signal is missing 'signal-name'");
    };
    let target = target_selector(&structure);
    let mut rt = lock(shared);
    match rt.pipeline.emit_signal(&target, signal) {
        Ok(()) => ExecuteResult::Ok,
        Err(err) => report_error(&rt, ReportCode::ScenarioActionExecutionError, err.to_string()),
    }
}

/// Executes `dot-pipeline`.
fn h_dot_pipeline(ctx: &mut HandlerContext<'_>, shared: &SharedRuntime) -> ExecuteResult {
    let name = ctx.action.structure.get_str("name").unwrap_or("scenario").to_string();
    let rt = lock(shared);
    let dir = rt.dump_dot_dir.clone().unwrap_or_else(|| std::path::PathBuf::from("."));
    match rt.pipeline.dump_dot(&dir, &name) {
        Ok(()) => ExecuteResult::Ok,
        Err(err) => report_error(&rt, ReportCode::ScenarioActionExecutionError, err.to_string()),
    }
}

// ============================================================================
// SECTION: check-last-sample
// ============================================================================

/// Executes `check-last-sample`, hashing the last delivered sample.
fn h_check_last_sample(ctx: &mut HandlerContext<'_>, shared: &SharedRuntime) -> ExecuteResult {
    let structure = ctx.action.structure.clone();
    let Some(expected) = structure.get_str("checksum") else {
        let rt = lock(shared);
        return report_error(&rt, ReportCode::ScenarioActionExecutionError, "check-last-sample is missing 'checksum'");
    };
    let target = sink_selector(&structure);
    let rt = lock(shared);
    let bytes = match rt.pipeline.last_sample_bytes(&target) {
        Ok(bytes) => bytes,
        Err(PipelineError::AmbiguousTarget(reason)) => {
            return report_error(&rt, ReportCode::ScenarioActionExecutionError, format!("duplicate sink match: {reason}"));
        }
        Err(err) => return report_error(&rt, ReportCode::ScenarioActionExecutionError, err.to_string()),
    };

    use sha1::Digest;
    let mut hasher = sha1::Sha1::new();
    hasher.update(&bytes);
    let digest = hasher.finalize();
    let computed: String = digest.iter().map(|b| format!("{b:02x}")).collect();
    if computed == expected {
        ExecuteResult::Ok
    } else {
        report_error(
            &rt,
            ReportCode::ScenarioActionExecutionError,
            format!("check-last-sample checksum mismatch: expected {expected}, got {computed}"),
        )
    }
}

// ============================================================================
// SECTION: registration
// ============================================================================

/// Registers every built-in action kind into `registry`, with handler
/// closures capturing a clone of `shared`.
pub fn register_builtins(registry: &mut ActionTypeRegistry, shared: &SharedRuntime) {
    macro_rules! register {
        ($name:literal, $flags:expr, $params:expr, $handler:ident) => {{
            let shared = std::sync::Arc::clone(shared);
            registry.register(ActionType {
                name: $name.to_string(),
                implementer_namespace: "scenario-engine".to_string(),
                rank: 0,
                flags: $flags,
                parameters: $params,
                prepare: None,
                execute: Arc::new(move |ctx| $handler(ctx, &shared)),
                overriden_type: None,
            });
        }};
    }

    register!(
        "seek",
        ActionTypeFlags::ASYNC | ActionTypeFlags::CAN_BE_OPTIONAL,
        vec![
            ParameterSchema::optional("start", "double, string", "seek start position", "0"),
            ParameterSchema::optional("stop", "double, string", "seek stop position", "+inf"),
            ParameterSchema::optional("rate", "double", "playback rate", "1.0"),
            ParameterSchema::optional("flags", "string", "+-joined seek flag names", ""),
        ],
        h_seek
    );
    register!(
        "set-state",
        ActionTypeFlags::ASYNC | ActionTypeFlags::CAN_BE_OPTIONAL,
        vec![ParameterSchema::mandatory("state", "string", "target pipeline state")],
        h_set_state
    );
    register!("play", ActionTypeFlags::ASYNC | ActionTypeFlags::CAN_BE_OPTIONAL, Vec::new(), h_play);
    register!(
        "pause",
        ActionTypeFlags::ASYNC | ActionTypeFlags::CAN_BE_OPTIONAL,
        vec![ParameterSchema::optional("duration", "double, string", "seconds to remain paused", "0")],
        h_pause
    );
    register!("stop", ActionTypeFlags::ASYNC | ActionTypeFlags::CAN_BE_OPTIONAL, Vec::new(), h_stop);
    register!("eos", ActionTypeFlags::CAN_BE_OPTIONAL, Vec::new(), h_eos);
    register!(
        "switch-track",
        ActionTypeFlags::ASYNC | ActionTypeFlags::INTERLACED | ActionTypeFlags::CAN_BE_OPTIONAL,
        vec![
            ParameterSchema::mandatory("type", "string", "stream type: audio, video, text"),
            ParameterSchema::optional("index", "int, string", "absolute or relative (+1/-1) index", "+1"),
            ParameterSchema::optional("disable", "bool", "disable this stream type", "false"),
        ],
        h_switch_track
    );
    register!(
        "wait",
        ActionTypeFlags::ASYNC | ActionTypeFlags::CAN_BE_OPTIONAL,
        vec![
            ParameterSchema::optional("duration", "double, string", "seconds to wait", "0"),
            ParameterSchema::optional("signal-name", "string", "signal name to wait for", ""),
            ParameterSchema::optional("message-type", "string", "named bus message to wait for", ""),
        ],
        h_wait
    );
    register!(
        "set-property",
        ActionTypeFlags::CAN_BE_OPTIONAL,
        vec![
            ParameterSchema::mandatory("property-name", "string", "property to set"),
            ParameterSchema::mandatory("property-value", "any", "value to set and read back"),
        ],
        h_set_property
    );
    register!(
        "set-rank",
        ActionTypeFlags::CAN_BE_OPTIONAL,
        vec![
            ParameterSchema::mandatory("target-element-factory-name", "string", "factory to re-rank"),
            ParameterSchema::mandatory("rank", "int", "new rank"),
        ],
        h_set_rank
    );
    register!(
        "set-feature-rank",
        ActionTypeFlags::CAN_BE_OPTIONAL,
        vec![
            ParameterSchema::mandatory("feature-name", "string", "plugin feature to re-rank"),
            ParameterSchema::mandatory("rank", "int", "new rank"),
        ],
        h_set_feature_rank
    );
    register!(
        "disable-plugin",
        ActionTypeFlags::CAN_BE_OPTIONAL,
        vec![ParameterSchema::mandatory("plugin-name", "string", "plugin to disable")],
        h_disable_plugin
    );
    register!(
        "set-vars",
        ActionTypeFlags::CAN_BE_OPTIONAL,
        vec![],
        h_set_vars
    );
    register!(
        "set-debug-threshold",
        ActionTypeFlags::CAN_BE_OPTIONAL,
        vec![ParameterSchema::mandatory("threshold", "string", "debug threshold spec")],
        h_set_debug_threshold
    );
    register!(
        "appsrc-push",
        ActionTypeFlags::ASYNC | ActionTypeFlags::INTERLACED | ActionTypeFlags::CAN_BE_OPTIONAL,
        vec![
            ParameterSchema::mandatory("file-name", "string", "file to read the pushed buffer from"),
            ParameterSchema::optional("offset", "int", "byte offset into file-name", "0"),
            ParameterSchema::optional("size", "int", "bytes to push, default rest of file", ""),
            ParameterSchema::optional("caps", "string", "caps to caption the buffer with", ""),
        ],
        h_appsrc_push
    );
    register!(
        "appsrc-eos",
        ActionTypeFlags::CAN_BE_OPTIONAL,
        vec![],
        h_appsrc_eos
    );
    register!(
        "flush",
        ActionTypeFlags::CAN_BE_OPTIONAL,
        vec![ParameterSchema::optional("reset-time", "bool", "reset running time on flush", "true")],
        h_flush
    );
    register!(
        "emit-signal",
        ActionTypeFlags::CAN_BE_OPTIONAL,
        vec![ParameterSchema::mandatory("signal-name", "string", "signal to emit")],
        h_emit_signal
    );
    register!(
        "dot-pipeline",
        ActionTypeFlags::CAN_BE_OPTIONAL,
        vec![ParameterSchema::optional("name", "string", "dot file base name", "scenario")],
        h_dot_pipeline
    );
    register!(
        "check-last-sample",
        ActionTypeFlags::INTERLACED | ActionTypeFlags::CAN_BE_OPTIONAL,
        vec![ParameterSchema::mandatory("checksum", "string", "expected sha1 hex digest of the last sample")],
        h_check_last_sample
    );
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, reason = "test assertions may panic directly")]
    use std::path::Path;

    use scenario_core::Action;
    use scenario_core::ActionNumber;
    use scenario_core::Scenario;

    use super::*;
    use crate::pipeline::BusMessage;
    use crate::pipeline::Pipeline;
    use crate::pipeline::StateChangeOutcome;
    use crate::runtime::Runtime;

    /// Fixed-answer `Pipeline` double, local to the handler tests: every
    /// state change succeeds synchronously, every target-element call
    /// succeeds against an in-memory property table.
    struct FixedPipeline {
        state: PipelineState,
        properties: std::collections::HashMap<(String, String), Value>,
        streams: std::collections::HashMap<String, Vec<String>>,
        selected: Vec<String>,
    }

    impl FixedPipeline {
        fn new() -> Self {
            Self {
                state: PipelineState::Null,
                properties: std::collections::HashMap::new(),
                streams: std::collections::HashMap::from([("audio".to_string(), vec!["a0".to_string(), "a1".to_string()])]),
                selected: vec!["a0".to_string()],
            }
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
            Some(0.0)
        }
        fn duration(&self) -> Option<f64> {
            Some(10.0)
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
        fn get_property(&self, target: &TargetSelector, property: &str) -> Result<Value, PipelineError> {
            let name = target.name.clone().unwrap_or_default();
            self.properties.get(&(name, property.to_string())).cloned().ok_or(PipelineError::Unsupported("unset".to_string()))
        }
        fn set_property(&mut self, target: &TargetSelector, property: &str, value: &Value) -> Result<(), PipelineError> {
            let name = target.name.clone().unwrap_or_default();
            self.properties.insert((name, property.to_string()), value.clone());
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
        fn switch_track(&mut self, stream_type: &str, index: TrackIndex) -> Result<(), PipelineError> {
            let ids = self.streams.get(stream_type).cloned().unwrap_or_default();
            match index {
                TrackIndex::Disable => self.selected.clear(),
                _ => self.selected = ids.last().cloned().into_iter().collect(),
            }
            Ok(())
        }
        fn stream_ids(&self, stream_type: &str) -> Vec<String> {
            self.streams.get(stream_type).cloned().unwrap_or_default()
        }
        fn selected_stream_ids(&self) -> Vec<String> {
            self.selected.clone()
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

    fn shared_runtime() -> SharedRuntime {
        std::sync::Arc::new(std::sync::Mutex::new(Runtime::new(Scenario::new("t"), Box::new(FixedPipeline::new()))))
    }

    fn action_with(type_name: &str, build: impl FnOnce(&mut Structure)) -> Action {
        let mut structure = Structure::new(type_name);
        build(&mut structure);
        Action::new(ActionNumber(0), type_name, structure)
    }

    #[test]
    fn wait_with_duration_parks_async() {
        let shared = shared_runtime();
        let mut action = action_with("wait", |s| s.set("duration", Value::Double(1.0)));
        let mut ctx = HandlerContext { action: &mut action };
        assert_eq!(h_wait(&mut ctx, &shared), ExecuteResult::Async);
        assert!(lock(&shared).pending_waits.contains_key(&action_id_of(&action)));
    }

    #[test]
    fn wait_with_zero_duration_completes_immediately() {
        let shared = shared_runtime();
        let mut action = action_with("wait", |_| {});
        let mut ctx = HandlerContext { action: &mut action };
        assert_eq!(h_wait(&mut ctx, &shared), ExecuteResult::Ok);
    }

    #[test]
    fn set_state_with_unknown_name_is_reported() {
        let shared = shared_runtime();
        let mut action = action_with("set-state", |s| s.set("state", Value::String("sideways".to_string())));
        let mut ctx = HandlerContext { action: &mut action };
        assert_eq!(h_set_state(&mut ctx, &shared), ExecuteResult::ErrorReported);
    }

    #[test]
    fn set_state_with_known_name_requests_pipeline_state() {
        let shared = shared_runtime();
        let mut action = action_with("set-state", |s| s.set("state", Value::String("playing".to_string())));
        let mut ctx = HandlerContext { action: &mut action };
        assert_eq!(h_set_state(&mut ctx, &shared), ExecuteResult::Ok);
        assert_eq!(lock(&shared).pipeline.state(), PipelineState::Playing);
    }

    #[test]
    fn set_property_missing_name_is_reported() {
        let shared = shared_runtime();
        let mut action = action_with("set-property", |s| s.set("property-value", Value::Double(1.0)));
        let mut ctx = HandlerContext { action: &mut action };
        assert_eq!(h_set_property(&mut ctx, &shared), ExecuteResult::ErrorReported);
    }

    #[test]
    fn set_property_round_trips_through_pipeline() {
        let shared = shared_runtime();
        let mut action = action_with("set-property", |s| {
            s.set("target-element-name", Value::String("sink".to_string()));
            s.set("property-name", Value::String("volume".to_string()));
            s.set("property-value", Value::Double(0.3));
        });
        let mut ctx = HandlerContext { action: &mut action };
        assert_eq!(h_set_property(&mut ctx, &shared), ExecuteResult::Ok);
        let target = TargetSelector { name: Some("sink".to_string()), ..Default::default() };
        assert_eq!(lock(&shared).pipeline.get_property(&target, "volume").unwrap(), Value::Double(0.3));
    }

    #[test]
    fn stop_reports_when_dropped_exceeds_budget() {
        let shared = shared_runtime();
        lock(&shared).scenario.max_dropped = Some(5);
        lock(&shared).scenario.dropped = 6;
        let mut action = action_with("stop", |_| {});
        let mut ctx = HandlerContext { action: &mut action };
        assert_eq!(h_stop(&mut ctx, &shared), ExecuteResult::ErrorReported);
    }

    #[test]
    fn switch_track_missing_type_is_reported() {
        let shared = shared_runtime();
        let mut action = action_with("switch-track", |_| {});
        let mut ctx = HandlerContext { action: &mut action };
        assert_eq!(h_switch_track(&mut ctx, &shared), ExecuteResult::ErrorReported);
    }

    #[test]
    fn switch_track_valid_type_parks_async_pending_switch() {
        let shared = shared_runtime();
        let mut action = action_with("switch-track", |s| s.set("type", Value::String("audio".to_string())));
        let mut ctx = HandlerContext { action: &mut action };
        assert_eq!(h_switch_track(&mut ctx, &shared), ExecuteResult::Async);
        assert!(lock(&shared).pending_switch.is_some());
    }
}
