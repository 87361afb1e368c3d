// crates/scenario-cli/src/sim_pipeline.rs
// ============================================================================
// Module: Simulated Pipeline
// Description: An in-process `scenario_engine::Pipeline` implementation with
//              no real media backend, used by `scenario-cli run` to execute
//              a scenario file against a deterministic stand-in.
// Purpose: Let the CLI drive a scenario to completion (and exercise every
//          built-in handler) without depending on an external media
//          framework; this workspace deliberately implements no new
//          pipeline semantics of its own.
// Dependencies: scenario_engine::pipeline, std::time::Instant
// ============================================================================

//! ## Overview
//!
//! Grounded on the `ScriptedPipeline` test double in
//! `scenario-engine::reactor`'s test module, generalized from a
//! fixed message script into a small state machine driven by real handler
//! calls: state changes and seeks complete one tick later by queuing a bus
//! message, position advances with wall-clock time while playing, and every
//! element-targeted operation (`set-property`, `flush`, `emit-signal`,
//! `check-last-sample`, appsrc) runs against an in-memory element table
//! keyed by name (`set-property` additionally type-checks and reads back
//! against whatever was stored for that name/property pair before). This
//! is explicitly a dry-run harness, not a media
//! pipeline: `last_sample_bytes` returns whatever was last pushed via
//! `push_appsrc_buffer` for the same target, and track switching operates
//! over a caller-seeded stream-id table rather than real demuxed streams.

use std::collections::HashMap;
use std::collections::VecDeque;
use std::path::Path;
use std::time::Instant;

use scenario_core::Value;
use scenario_engine::BusMessage;
use scenario_engine::Pipeline;
use scenario_engine::PipelineError;
use scenario_engine::PipelineState;
use scenario_engine::SeekRequest;
use scenario_engine::SeekType;
use scenario_engine::StateChangeOutcome;
use scenario_engine::TargetSelector;
use scenario_engine::TrackIndex;

/// Seed data for [`SimulatedPipeline`]: the duration and stream layout the
/// CLI should pretend the target media has.
#[derive(Debug, Clone)]
pub struct SimulatedMedia {
    /// Reported stream duration, in seconds.
    pub duration: Option<f64>,
    /// Reported latency, in seconds.
    pub latency: Option<f64>,
    /// Stream ids available per stream type (`audio`, `video`, `text`).
    pub streams: HashMap<String, Vec<String>>,
}

impl Default for SimulatedMedia {
    fn default() -> Self {
        Self {
            duration: Some(30.0),
            latency: Some(0.0),
            streams: HashMap::from([
                ("video".to_string(), vec!["video-0".to_string()]),
                ("audio".to_string(), vec!["audio-0".to_string(), "audio-1".to_string()]),
            ]),
        }
    }
}

/// A dependency-free stand-in pipeline used to actually run a scenario end
/// to end from the CLI.
pub struct SimulatedPipeline {
    state: PipelineState,
    target_state: PipelineState,
    media: SimulatedMedia,
    /// Position at the moment the current play segment began, in seconds.
    position_base: f64,
    /// Wall-clock instant `position_base` was recorded at.
    position_anchor: Instant,
    rate: f64,
    selected: Vec<String>,
    pending: VecDeque<BusMessage>,
    properties: HashMap<(String, String), Value>,
    last_sample: HashMap<String, Vec<u8>>,
}

impl SimulatedPipeline {
    /// Creates a simulated pipeline seeded with `media`, starting in the
    /// `Null` state with every listed stream initially selected.
    #[must_use]
    pub fn new(media: SimulatedMedia) -> Self {
        let selected = media.streams.values().flat_map(|ids| ids.first().cloned()).collect();
        Self {
            state: PipelineState::Null,
            target_state: PipelineState::Null,
            media,
            position_base: 0.0,
            position_anchor: Instant::now(),
            rate: 1.0,
            selected,
            pending: VecDeque::new(),
            properties: HashMap::new(),
            last_sample: HashMap::new(),
        }
    }

    /// Current position given wall-clock elapsed time since the last
    /// state/seek change, clamped to `[0, duration]`.
    fn live_position(&self) -> f64 {
        let raw = if self.state == PipelineState::Playing {
            let elapsed = self.position_anchor.elapsed().as_secs_f64();
            self.position_base + elapsed * self.rate
        } else {
            self.position_base
        };
        let upper = self.media.duration.unwrap_or(f64::INFINITY);
        raw.clamp(0.0, upper)
    }

    /// Resolves `selector` to a single element-like name for the in-memory
    /// tables, using whichever identifying field is set.
    fn target_name(selector: &TargetSelector) -> Result<String, PipelineError> {
        selector
            .name
            .clone()
            .or_else(|| selector.factory_name.clone())
            .or_else(|| selector.class.clone())
            .ok_or_else(|| PipelineError::ElementNotFound("<unspecified target>".to_string()))
    }
}

/// Type-coerces `value` against `existing`'s variant (numeric int/double
/// cross-coercion only), rejecting anything that does not agree with a
/// previously set value's type. A property with no prior value accepts
/// whatever variant is first written.
#[allow(clippy::cast_possible_truncation, reason = "guarded by a fractional-part check above")]
fn coerce_property_value(existing: Option<&Value>, value: &Value) -> Result<Value, String> {
    let Some(existing) = existing else { return Ok(value.clone()) };
    match (existing, value) {
        (Value::Int(_), Value::Int(i)) => Ok(Value::Int(*i)),
        (Value::Int(_), Value::Double(d)) if (d - d.trunc()).abs() < f64::EPSILON => Ok(Value::Int(*d as i64)),
        (Value::Double(_), Value::Double(d)) => Ok(Value::Double(*d)),
        (Value::Double(_), Value::Int(i)) => Ok(Value::Double(*i as f64)),
        (Value::Bool(_), Value::Bool(b)) => Ok(Value::Bool(*b)),
        (Value::String(_), Value::String(s)) => Ok(Value::String(s.clone())),
        (Value::Structure(_), Value::Structure(s)) => Ok(Value::Structure(s.clone())),
        (Value::List(_), Value::List(items)) => Ok(Value::List(items.clone())),
        _ => Err(format!("type mismatch: existing value is {existing:?}, new value is {value:?}")),
    }
}

impl Pipeline for SimulatedPipeline {
    fn state(&self) -> PipelineState {
        self.state
    }

    fn target_state(&self) -> PipelineState {
        self.target_state
    }

    fn request_state(&mut self, state: PipelineState) -> Result<StateChangeOutcome, PipelineError> {
        self.position_base = self.live_position();
        self.position_anchor = Instant::now();
        self.target_state = state;
        self.state = state;
        self.pending.push_back(BusMessage::StateChanged { new_state: state });
        self.pending.push_back(BusMessage::AsyncDone);
        Ok(StateChangeOutcome::Async)
    }

    fn position(&self) -> Option<f64> {
        Some(self.live_position())
    }

    fn duration(&self) -> Option<f64> {
        self.media.duration
    }

    fn latency(&self) -> Option<f64> {
        self.media.latency
    }

    fn seek(&mut self, request: &SeekRequest) -> Result<(), PipelineError> {
        if request.start_type == SeekType::End || request.stop_type == SeekType::End {
            return Err(PipelineError::Unsupported("seek relative to stream end is not implemented".to_string()));
        }
        self.position_base = request.start;
        self.position_anchor = Instant::now();
        self.rate = request.rate;
        self.pending.push_back(BusMessage::AsyncDone);
        Ok(())
    }

    fn send_eos(&mut self) -> Result<(), PipelineError> {
        self.pending.push_back(BusMessage::Eos);
        Ok(())
    }

    fn get_property(&self, target: &TargetSelector, property: &str) -> Result<Value, PipelineError> {
        let name = Self::target_name(target)?;
        self.properties.get(&(name, property.to_string())).cloned().ok_or_else(|| {
            PipelineError::Property { target: property.to_string(), property: property.to_string(), reason: "no value set".to_string() }
        })
    }

    fn set_property(&mut self, target: &TargetSelector, property: &str, value: &Value) -> Result<(), PipelineError> {
        let name = Self::target_name(target)?;
        let key = (name.clone(), property.to_string());
        let existing = self.properties.get(&key).cloned();
        let coerced = coerce_property_value(existing.as_ref(), value).map_err(|reason| PipelineError::Property {
            target: name.clone(),
            property: property.to_string(),
            reason,
        })?;
        self.properties.insert(key, coerced.clone());
        let read_back = self.get_property(target, property)?;
        if read_back != coerced {
            return Err(PipelineError::Property {
                target: name,
                property: property.to_string(),
                reason: format!("read back {read_back:?}, expected {coerced:?}"),
            });
        }
        Ok(())
    }

    fn emit_signal(&mut self, target: &TargetSelector, signal: &str) -> Result<(), PipelineError> {
        let _ = Self::target_name(target)?;
        self.pending.push_back(BusMessage::Named { type_name: format!("signal::{signal}") });
        Ok(())
    }

    fn flush(&mut self, target: &TargetSelector, _reset_time: bool) -> Result<(), PipelineError> {
        let _ = Self::target_name(target)?;
        Ok(())
    }

    fn push_appsrc_buffer(&mut self, target: &TargetSelector, bytes: &[u8], _caps: Option<&str>) -> Result<(), PipelineError> {
        let name = Self::target_name(target)?;
        self.last_sample.insert(name, bytes.to_vec());
        Ok(())
    }

    fn appsrc_eos(&mut self, target: &TargetSelector) -> Result<(), PipelineError> {
        let _ = Self::target_name(target)?;
        Ok(())
    }

    fn last_sample_bytes(&self, target: &TargetSelector) -> Result<Vec<u8>, PipelineError> {
        let name = Self::target_name(target)?;
        self.last_sample.get(&name).cloned().ok_or_else(|| PipelineError::ElementNotFound(name))
    }

    fn switch_track(&mut self, stream_type: &str, index: TrackIndex) -> Result<(), PipelineError> {
        let ids = self.media.streams.get(stream_type).cloned().unwrap_or_default();
        if ids.is_empty() {
            return Err(PipelineError::ElementNotFound(format!("no '{stream_type}' streams")));
        }
        let current = ids.iter().position(|id| self.selected.contains(id)).unwrap_or(0);
        let next = match index {
            TrackIndex::Absolute(i) => usize::try_from(i).ok().filter(|i| *i < ids.len()),
            TrackIndex::Relative(delta) => {
                let signed = i64::try_from(current).unwrap_or(0) + delta;
                usize::try_from(signed.rem_euclid(i64::try_from(ids.len()).unwrap_or(1))).ok()
            }
            TrackIndex::Disable => {
                self.selected.retain(|id| !ids.contains(id));
                self.pending.push_back(BusMessage::StreamsSelected { stream_ids: self.selected.clone() });
                return Ok(());
            }
        };
        let Some(next) = next else {
            return Err(PipelineError::ElementNotFound(format!("index out of range for '{stream_type}'")));
        };
        self.selected.retain(|id| !ids.contains(id));
        self.selected.push(ids[next].clone());
        self.pending.push_back(BusMessage::StreamsSelected { stream_ids: self.selected.clone() });
        Ok(())
    }

    fn stream_ids(&self, stream_type: &str) -> Vec<String> {
        self.media.streams.get(stream_type).cloned().unwrap_or_default()
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
        self.pending.pop_front()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, reason = "test assertions may panic directly")]
    use super::*;

    #[test]
    fn request_state_queues_state_changed_then_async_done() {
        let mut pipeline = SimulatedPipeline::new(SimulatedMedia::default());
        pipeline.request_state(PipelineState::Playing).unwrap();
        assert_eq!(pipeline.poll_message(), Some(BusMessage::StateChanged { new_state: PipelineState::Playing }));
        assert_eq!(pipeline.poll_message(), Some(BusMessage::AsyncDone));
        assert_eq!(pipeline.poll_message(), None);
    }

    #[test]
    fn seek_to_end_type_is_unsupported() {
        let mut pipeline = SimulatedPipeline::new(SimulatedMedia::default());
        let request = SeekRequest {
            start: 0.0,
            stop: f64::INFINITY,
            rate: 1.0,
            flags: scenario_core::SeekFlags::default(),
            start_type: SeekType::End,
            stop_type: SeekType::None,
        };
        assert!(matches!(pipeline.seek(&request), Err(PipelineError::Unsupported(_))));
    }

    #[test]
    fn switch_track_relative_wraps_and_reports_selection() {
        let mut pipeline = SimulatedPipeline::new(SimulatedMedia::default());
        pipeline.switch_track("audio", TrackIndex::Relative(1)).unwrap();
        let Some(BusMessage::StreamsSelected { stream_ids }) = pipeline.poll_message() else {
            panic!("expected StreamsSelected");
        };
        assert!(stream_ids.contains(&"audio-1".to_string()));
    }

    #[test]
    fn property_round_trips_through_set_and_get() {
        let mut pipeline = SimulatedPipeline::new(SimulatedMedia::default());
        let target = TargetSelector { name: Some("sink".to_string()), ..Default::default() };
        pipeline.set_property(&target, "volume", &Value::Double(0.5)).unwrap();
        assert_eq!(pipeline.get_property(&target, "volume").unwrap(), Value::Double(0.5));
    }

    #[test]
    fn appsrc_push_is_retrievable_as_last_sample() {
        let mut pipeline = SimulatedPipeline::new(SimulatedMedia::default());
        let target = TargetSelector { name: Some("src".to_string()), ..Default::default() };
        pipeline.push_appsrc_buffer(&target, &[1, 2, 3], None).unwrap();
        assert_eq!(pipeline.last_sample_bytes(&target).unwrap(), vec![1, 2, 3]);
    }
}
