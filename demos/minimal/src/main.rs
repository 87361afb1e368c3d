// examples/minimal/src/main.rs
// ============================================================================
// Module: Scenario Engine Minimal Example
// Description: Minimal end-to-end scenario run using an in-memory pipeline.
// Purpose: Demonstrate loading a scenario, driving the dispatcher/bus
//          reactor loop to completion, and reading back the reports.
// Dependencies: scenario-core, scenario-engine, scenario-loader
// ============================================================================

//! ## Overview
//! Runs a two-action scenario (`play` then `stop`) against a tiny in-memory
//! pipeline whose position advances with wall-clock time once playing. This
//! example is backend-agnostic and suitable for quick verification that the
//! engine crates link and schedule correctly.

#![allow(clippy::print_stdout, reason = "this example's output is its product")]

use std::path::Path;
use std::sync::Arc;
use std::sync::Mutex;
use std::thread;
use std::time::Duration;
use std::time::Instant;

use scenario_core::ActionTypeRegistry;
use scenario_core::Scenario;
use scenario_core::Value;
use scenario_engine::register_builtins;
use scenario_engine::runtime::lock;
use scenario_engine::BusMessage;
use scenario_engine::BusReactor;
use scenario_engine::DispatchOutcome;
use scenario_engine::Dispatcher;
use scenario_engine::Pipeline;
use scenario_engine::PipelineError;
use scenario_engine::PipelineState;
use scenario_engine::Runtime;
use scenario_engine::SeekRequest;
use scenario_engine::StateChangeOutcome;
use scenario_engine::TargetSelector;
use scenario_engine::TrackIndex;
use scenario_loader::load_references;

/// A pipeline stand-in that completes every state change synchronously and
/// whose reported position is wall-clock elapsed time since it started
/// playing. Good enough to drive the dispatcher/bus reactor loop for a
/// scenario that only exercises `play`/`stop`.
struct InMemoryPipeline {
    state: PipelineState,
    playing_since: Option<Instant>,
    elapsed_before_pause: f64,
}

impl InMemoryPipeline {
    const fn new() -> Self {
        Self { state: PipelineState::Null, playing_since: None, elapsed_before_pause: 0.0 }
    }
}

impl Pipeline for InMemoryPipeline {
    fn state(&self) -> PipelineState {
        self.state
    }

    fn target_state(&self) -> PipelineState {
        self.state
    }

    fn request_state(&mut self, state: PipelineState) -> Result<StateChangeOutcome, PipelineError> {
        match (self.state, state) {
            (PipelineState::Playing, next) if next != PipelineState::Playing => {
                if let Some(since) = self.playing_since.take() {
                    self.elapsed_before_pause += since.elapsed().as_secs_f64();
                }
            }
            (_, PipelineState::Playing) => self.playing_since = Some(Instant::now()),
            _ => {}
        }
        self.state = state;
        Ok(StateChangeOutcome::Sync)
    }

    fn position(&self) -> Option<f64> {
        let live = self.playing_since.map_or(0.0, |since| since.elapsed().as_secs_f64());
        Some(self.elapsed_before_pause + live)
    }

    fn duration(&self) -> Option<f64> {
        Some(30.0)
    }

    fn latency(&self) -> Option<f64> {
        Some(0.0)
    }

    fn seek(&mut self, request: &SeekRequest) -> Result<(), PipelineError> {
        self.elapsed_before_pause = request.start;
        if self.state == PipelineState::Playing {
            self.playing_since = Some(Instant::now());
        }
        Ok(())
    }

    fn send_eos(&mut self) -> Result<(), PipelineError> {
        Ok(())
    }

    fn get_property(&self, target: &TargetSelector, property: &str) -> Result<Value, PipelineError> {
        Err(PipelineError::ElementNotFound(format!("{target:?}/{property}")))
    }

    fn set_property(&mut self, target: &TargetSelector, property: &str, _value: &Value) -> Result<(), PipelineError> {
        Err(PipelineError::ElementNotFound(format!("{target:?}/{property}")))
    }

    fn emit_signal(&mut self, target: &TargetSelector, _signal: &str) -> Result<(), PipelineError> {
        Err(PipelineError::ElementNotFound(format!("{target:?}")))
    }

    fn flush(&mut self, target: &TargetSelector, _reset_time: bool) -> Result<(), PipelineError> {
        Err(PipelineError::ElementNotFound(format!("{target:?}")))
    }

    fn push_appsrc_buffer(&mut self, target: &TargetSelector, _bytes: &[u8], _caps: Option<&str>) -> Result<(), PipelineError> {
        Err(PipelineError::ElementNotFound(format!("{target:?}")))
    }

    fn appsrc_eos(&mut self, target: &TargetSelector) -> Result<(), PipelineError> {
        Err(PipelineError::ElementNotFound(format!("{target:?}")))
    }

    fn last_sample_bytes(&self, target: &TargetSelector) -> Result<Vec<u8>, PipelineError> {
        Err(PipelineError::ElementNotFound(format!("{target:?}")))
    }

    fn switch_track(&mut self, stream_type: &str, _index: TrackIndex) -> Result<(), PipelineError> {
        Err(PipelineError::Unsupported(format!("no {stream_type} streams in this example")))
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

/// A minimal two-action scenario: go to `playing`, then `stop` once the
/// stream reaches one second.
const SCENARIO_TEXT: &str = r#"
description, summary="minimal playthrough", handles-states=true;
play;
stop, playback-time=1.0;
"#;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let pipeline = Box::new(InMemoryPipeline::new());
    let runtime = Runtime::new(Scenario::new("minimal"), pipeline);
    let shared = Arc::new(Mutex::new(runtime));

    let mut registry = ActionTypeRegistry::new();
    register_builtins(&mut registry, &shared);

    let file = tempfile::Builder::new().suffix(".scenario").tempfile()?;
    std::fs::write(file.path(), SCENARIO_TEXT)?;
    let reference = file.path().to_string_lossy().into_owned();
    let loaded = load_references(&[reference.as_str()], &registry, &scenario_core::NullReporter)?;
    lock(&shared).scenario = loaded.scenario;

    let dispatcher = Dispatcher::new();
    let reactor = BusReactor::new();
    dispatcher.run_on_addition(&shared, &registry);

    let start = Instant::now();
    loop {
        reactor.drain(&shared, &registry);
        match dispatcher.tick(&shared, &registry) {
            DispatchOutcome::ScenarioDone => break,
            DispatchOutcome::Advanced | DispatchOutcome::Idle => {}
        }
        if start.elapsed() > Duration::from_secs(5) {
            return Err("scenario did not finish within 5s".into());
        }
        thread::sleep(Duration::from_millis(10));
    }

    println!("scenario finished: {} action(s) ran", lock(&shared).scenario.actions_arena.len());
    Ok(())
}
