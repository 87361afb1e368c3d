// demos/ci-gate/src/main.rs
// ============================================================================
// Module: Scenario Engine CI Gate Example
// Description: Validates a set of scenario files without running them,
//              exiting non-zero if any fails to load.
// Purpose: Demonstrate a companion test-suite launcher's use of the
//          loader/registry surface ahead of a full pipeline run.
// Dependencies: scenario-core, scenario-engine, scenario-loader
// ============================================================================

//! ## Overview
//! A CI job typically wants to know a batch of scenario files are
//! well-formed (every mandatory field present, every action type resolves)
//! before it spends minutes actually driving a pipeline through them. This
//! mirrors `scenario-cli validate`, but as a standalone library consumer
//! gating a merge on the result rather than printing a report.

#![allow(clippy::print_stdout, clippy::print_stderr, reason = "this example's output is its product")]

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::Mutex;

use scenario_core::ActionTypeRegistry;
use scenario_core::Scenario;
use scenario_core::Value;
use scenario_engine::register_builtins;
use scenario_engine::BusMessage;
use scenario_engine::Pipeline;
use scenario_engine::PipelineError;
use scenario_engine::PipelineState;
use scenario_engine::Runtime;
use scenario_engine::SeekRequest;
use scenario_engine::StateChangeOutcome;
use scenario_engine::TargetSelector;
use scenario_engine::TrackIndex;
use scenario_loader::load_references;

/// A pipeline stand-in that refuses every operation: `validate` never
/// drives an action's `execute` phase, only its loader-time checks, so no
/// handler should ever reach this pipeline.
struct UnreachablePipeline;

impl Pipeline for UnreachablePipeline {
    fn state(&self) -> PipelineState {
        PipelineState::Null
    }

    fn target_state(&self) -> PipelineState {
        PipelineState::Null
    }

    fn request_state(&mut self, _state: PipelineState) -> Result<StateChangeOutcome, PipelineError> {
        Err(PipelineError::Unsupported("validation does not execute actions".to_string()))
    }

    fn position(&self) -> Option<f64> {
        None
    }

    fn duration(&self) -> Option<f64> {
        None
    }

    fn latency(&self) -> Option<f64> {
        None
    }

    fn seek(&mut self, _request: &SeekRequest) -> Result<(), PipelineError> {
        Err(PipelineError::Unsupported("validation does not execute actions".to_string()))
    }

    fn send_eos(&mut self) -> Result<(), PipelineError> {
        Err(PipelineError::Unsupported("validation does not execute actions".to_string()))
    }

    fn get_property(&self, _target: &TargetSelector, _property: &str) -> Result<Value, PipelineError> {
        Err(PipelineError::Unsupported("validation does not execute actions".to_string()))
    }

    fn set_property(&mut self, _target: &TargetSelector, _property: &str, _value: &Value) -> Result<(), PipelineError> {
        Err(PipelineError::Unsupported("validation does not execute actions".to_string()))
    }

    fn emit_signal(&mut self, _target: &TargetSelector, _signal: &str) -> Result<(), PipelineError> {
        Err(PipelineError::Unsupported("validation does not execute actions".to_string()))
    }

    fn flush(&mut self, _target: &TargetSelector, _reset_time: bool) -> Result<(), PipelineError> {
        Err(PipelineError::Unsupported("validation does not execute actions".to_string()))
    }

    fn push_appsrc_buffer(&mut self, _target: &TargetSelector, _bytes: &[u8], _caps: Option<&str>) -> Result<(), PipelineError> {
        Err(PipelineError::Unsupported("validation does not execute actions".to_string()))
    }

    fn appsrc_eos(&mut self, _target: &TargetSelector) -> Result<(), PipelineError> {
        Err(PipelineError::Unsupported("validation does not execute actions".to_string()))
    }

    fn last_sample_bytes(&self, _target: &TargetSelector) -> Result<Vec<u8>, PipelineError> {
        Err(PipelineError::Unsupported("validation does not execute actions".to_string()))
    }

    fn switch_track(&mut self, _stream_type: &str, _index: TrackIndex) -> Result<(), PipelineError> {
        Err(PipelineError::Unsupported("validation does not execute actions".to_string()))
    }

    fn stream_ids(&self, _stream_type: &str) -> Vec<String> {
        Vec::new()
    }

    fn selected_stream_ids(&self) -> Vec<String> {
        Vec::new()
    }

    fn dump_dot(&self, _dir: &Path, _name: &str) -> Result<(), PipelineError> {
        Err(PipelineError::Unsupported("validation does not execute actions".to_string()))
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

/// Scenario files this gate checks before letting a merge proceed. A real
/// CI job would instead glob a `data/scenarios` directory; this example
/// hard-codes two representative scenarios to stay self-contained.
const CANDIDATE_SCENARIOS: &[(&str, &str)] = &[
    (
        "seek-accurate.scenario",
        "description, summary=\"seek accurate\";\nplay;\nseek, start=5.0, flags=accurate+flush, playback-time=1.0;\nstop, playback-time=10.0;",
    ),
    ("missing-state.scenario", "description, summary=\"broken\";\nset-state;"),
];

fn main() -> ExitCode {
    let pipeline = Box::new(UnreachablePipeline);
    let runtime = Runtime::new(Scenario::new("ci-gate"), pipeline);
    let shared = Arc::new(Mutex::new(runtime));

    let mut registry = ActionTypeRegistry::new();
    register_builtins(&mut registry, &shared);

    let mut failures = Vec::new();
    for (name, text) in CANDIDATE_SCENARIOS {
        match validate_one(name, text, &registry) {
            Ok(action_count) => println!("ok: {name} ({action_count} action(s))"),
            Err(err) => failures.push(format!("{name}: {err}")),
        }
    }

    if failures.is_empty() {
        ExitCode::SUCCESS
    } else {
        for failure in &failures {
            eprintln!("gate failed: {failure}");
        }
        ExitCode::FAILURE
    }
}

/// Writes `text` to a temporary scenario file and loads it against
/// `registry`, returning the number of actions queued.
fn validate_one(name: &str, text: &str, registry: &ActionTypeRegistry) -> Result<usize, Box<dyn std::error::Error>> {
    let file = tempfile::Builder::new().prefix(name).suffix(".scenario").tempfile()?;
    std::fs::write(file.path(), text)?;
    let reference = file.path().to_string_lossy().into_owned();
    let loaded = load_references(&[reference.as_str()], registry, &scenario_core::NullReporter)?;
    Ok(loaded.scenario.actions.len())
}
