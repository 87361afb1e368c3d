// crates/scenario-engine/src/pipeline.rs
// ============================================================================
// Module: Pipeline Collaborator
// Description: The external pipeline interface handlers and the bus
//              reactor operate through.
// Purpose: Keep this crate's scheduling logic independent of any concrete
//          media-pipeline implementation; a caller supplies a `Pipeline`.
// Dependencies: scenario_core::{Value, Structure}, std::path::Path
// ============================================================================

//! ## Overview
//!
//! This crate never talks to a real media pipeline itself. [`Pipeline`] is
//! the seam: every built-in handler in [`crate::handlers`] is written
//! against this trait, and an embedder supplies a concrete implementation,
//! keeping the boundary between policy (this crate) and mechanism (the
//! embedder) a plain trait object.

use std::path::Path;

use scenario_core::Value;

// ============================================================================
// SECTION: State
// ============================================================================

/// Coarse pipeline state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PipelineState {
    /// Fully torn down.
    Null,
    /// Resources allocated, not yet able to process data.
    Ready,
    /// Paused; clock not running.
    Paused,
    /// Actively playing.
    Playing,
}

/// Outcome of requesting a state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateChangeOutcome {
    /// Completed synchronously.
    Sync,
    /// Will complete asynchronously; await an `ASYNC-DONE`-equivalent bus
    /// message.
    Async,
}

// ============================================================================
// SECTION: Seek
// ============================================================================

/// How a seek's `start`/`stop` endpoint is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekType {
    /// No change to this endpoint.
    None,
    /// Set this endpoint to the given absolute position.
    Set,
    /// Relative to the stream's current end; not implemented. Rejected
    /// with an error rather than silently treated as `Set`.
    End,
}

/// A `seek` action's resolved request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeekRequest {
    /// Start position, in seconds.
    pub start: f64,
    /// Stop position, in seconds.
    pub stop: f64,
    /// Playback rate; negative values request reverse playback.
    pub rate: f64,
    /// Flags requested on the seek.
    pub flags: scenario_core::SeekFlags,
    /// How `start` is interpreted.
    pub start_type: SeekType,
    /// How `stop` is interpreted.
    pub stop_type: SeekType,
}

// ============================================================================
// SECTION: Target selection
// ============================================================================

/// Selects a pipeline element by name, class, or factory name. Used by
/// `set-property`, `flush`, `emit-signal`, and `check-last-sample`.
///
/// # Invariants
/// - At least one field should be set; an all-`None` selector matches
///   nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TargetSelector {
    /// Exact element name.
    pub name: Option<String>,
    /// Element class (e.g. `Video/Sink`).
    pub class: Option<String>,
    /// Factory name used to create the element.
    pub factory_name: Option<String>,
    /// Caps the target's sink pad must match (`check-last-sample`'s
    /// `sinkpad-caps`).
    pub sinkpad_caps: Option<String>,
}

/// A `switch-track` index request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackIndex {
    /// Select this absolute index.
    Absolute(i64),
    /// Move relative to the current selection (`+1`/`-1`).
    Relative(i64),
    /// Disable this stream type entirely.
    Disable,
}

// ============================================================================
// SECTION: Bus messages
// ============================================================================

/// A pipeline bus observation. Names are semantic rather than any specific
/// media framework's literal message-type enum.
#[derive(Debug, Clone, PartialEq)]
pub enum BusMessage {
    /// An asynchronous state change or seek has completed.
    AsyncDone,
    /// The pipeline (or an element within it) changed state.
    StateChanged {
        /// The element's new state.
        new_state: PipelineState,
    },
    /// An unrecoverable pipeline error.
    Error {
        /// Human-readable error detail.
        message: String,
    },
    /// End of stream was reached.
    Eos,
    /// Buffering percentage changed.
    Buffering {
        /// Current buffering percentage, `0..=100`.
        percent: u8,
    },
    /// Stream selection finished; carries the selected stream IDs.
    StreamsSelected {
        /// Identifiers of the currently selected streams.
        stream_ids: Vec<String>,
    },
    /// Latency changed and should be re-queried.
    Latency,
    /// Quality-of-service report; `dropped` buffers since the last report.
    Qos {
        /// Buffers dropped since the previous QoS message.
        dropped: u64,
    },
    /// A named application or custom message, used by `wait`'s
    /// `message-type` form.
    Named {
        /// The message's type name.
        type_name: String,
    },
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Failure performing an operation against the pipeline collaborator.
#[derive(Debug, Clone, thiserror::Error)]
pub enum PipelineError {
    /// No pipeline is currently attached.
    #[error("no pipeline available")]
    NoPipeline,
    /// A named target element could not be found.
    #[error("target element not found: {0}")]
    ElementNotFound(String),
    /// A target selector matched more than one element where exactly one
    /// was required.
    #[error("target selector matched more than one element: {0}")]
    AmbiguousTarget(String),
    /// A requested pad was not linked.
    #[error("pad not linked: {0}")]
    PadNotLinked(String),
    /// A property set or read-back failed.
    #[error("property '{property}' on '{target}': {reason}")]
    Property {
        /// The target element's diagnostic name.
        target: String,
        /// The property name.
        property: String,
        /// Human-readable cause.
        reason: String,
    },
    /// A state change request failed.
    #[error("state change failed: {0}")]
    StateChange(String),
    /// An operation is not supported by this `Pipeline` implementation.
    #[error("unsupported operation: {0}")]
    Unsupported(String),
    /// Filesystem or I/O failure performing the operation.
    #[error("io failure: {0}")]
    Io(String),
}

// ============================================================================
// SECTION: Pipeline trait
// ============================================================================

/// The pipeline operations every built-in handler is written against.
///
/// # Invariants
/// - Implementations must fail closed: an operation that cannot be
///   completed returns `Err`, never a silent no-op.
pub trait Pipeline: Send {
    /// Current pipeline state.
    fn state(&self) -> PipelineState;

    /// Most recently requested target state.
    fn target_state(&self) -> PipelineState;

    /// Requests a state change, returning whether it completed
    /// synchronously.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::StateChange`] if the pipeline refuses the
    /// transition.
    fn request_state(&mut self, state: PipelineState) -> Result<StateChangeOutcome, PipelineError>;

    /// Current stream position, in seconds, if known.
    fn position(&self) -> Option<f64>;

    /// Stream duration, in seconds, if known.
    fn duration(&self) -> Option<f64>;

    /// Current observed latency, in seconds, if known.
    fn latency(&self) -> Option<f64>;

    /// Issues a seek.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Unsupported`] for `SeekType::End` endpoints
    /// (fails loudly rather than silently) or [`PipelineError::StateChange`]
    /// if the pipeline rejects the seek.
    fn seek(&mut self, request: &SeekRequest) -> Result<(), PipelineError>;

    /// Sends end-of-stream into the pipeline.
    fn send_eos(&mut self) -> Result<(), PipelineError>;

    /// Reads a property from the element matching `target`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::ElementNotFound`] or
    /// [`PipelineError::AmbiguousTarget`] if resolution fails.
    fn get_property(&self, target: &TargetSelector, property: &str) -> Result<Value, PipelineError>;

    /// Sets a property on the element matching `target` and reads it back
    /// to verify.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Property`] on a type mismatch or read-back
    /// disagreement.
    fn set_property(&mut self, target: &TargetSelector, property: &str, value: &Value) -> Result<(), PipelineError>;

    /// Emits a zero-argument signal on the element matching `target`.
    fn emit_signal(&mut self, target: &TargetSelector, signal: &str) -> Result<(), PipelineError>;

    /// Sends flush-start then flush-stop to the element matching `target`.
    fn flush(&mut self, target: &TargetSelector, reset_time: bool) -> Result<(), PipelineError>;

    /// Pushes `bytes` (optionally captioned with `caps`) into the appsrc
    /// matching `target`.
    fn push_appsrc_buffer(&mut self, target: &TargetSelector, bytes: &[u8], caps: Option<&str>) -> Result<(), PipelineError>;

    /// Emits end-of-stream on the appsrc matching `target`.
    fn appsrc_eos(&mut self, target: &TargetSelector) -> Result<(), PipelineError>;

    /// Returns the raw bytes of the most recent sample delivered to the
    /// sink matching `target`, for `check-last-sample`.
    fn last_sample_bytes(&self, target: &TargetSelector) -> Result<Vec<u8>, PipelineError>;

    /// Switches the active track of `stream_type` (`audio`/`video`/`text`).
    fn switch_track(&mut self, stream_type: &str, index: TrackIndex) -> Result<(), PipelineError>;

    /// Lists the stream ids of `stream_type` currently known, in selection
    /// order, so `switch-track`'s relative (`+1`/`-1`) indices and expected
    /// post-switch sets can be computed.
    fn stream_ids(&self, stream_type: &str) -> Vec<String>;

    /// Returns the subset of `stream_ids` currently selected, across every
    /// stream type, for the STREAMS-SELECTED comparison.
    fn selected_stream_ids(&self) -> Vec<String>;

    /// Dumps a pipeline graph into `dir`, named `name`.
    fn dump_dot(&self, dir: &Path, name: &str) -> Result<(), PipelineError>;

    /// Sets the rank of an element factory.
    fn set_rank(&mut self, factory_name: &str, rank: i32) -> Result<(), PipelineError>;

    /// Sets the rank of a named plugin feature.
    fn set_feature_rank(&mut self, feature_name: &str, rank: i32) -> Result<(), PipelineError>;

    /// Disables a plugin by name.
    fn disable_plugin(&mut self, plugin_name: &str) -> Result<(), PipelineError>;

    /// Sets the logging subsystem's debug threshold.
    fn set_debug_threshold(&mut self, threshold: &str) -> Result<(), PipelineError>;

    /// Polls for the next pending bus message, if any. Bus messages are
    /// delivered to the main loop via a signal-watch; this trait models
    /// that as non-blocking polling the reactor drains every tick.
    fn poll_message(&mut self) -> Option<BusMessage>;
}
