// crates/scenario-engine/src/runtime.rs
// ============================================================================
// Module: Engine Runtime
// Description: The mutable state shared between the dispatcher, the bus
//              reactor and every built-in handler.
// Purpose: Give handler closures registered into the type-erased
//          `scenario_core::ActionTypeRegistry` a way to reach the pipeline
//          and scenario-wide bookkeeping that `HandlerContext` deliberately
//          omits.
// Dependencies: scenario_core::Scenario, crate::pipeline::Pipeline
// ============================================================================

//! ## Overview
//!
//! [`Runtime`] is one place owning everything a handler might need, reached
//! through `Arc<Mutex<Runtime>>` rather than being threaded through every
//! function call. Since the dispatcher/bus reactor run a single-threaded
//! cooperative main loop, the mutex is never contended in practice; it
//! exists only so `ActionType::execute` closures (which must be
//! `Send + Sync` to live in a process-wide registry) can capture a handle
//! to this state.
//!
//! The dispatcher briefly removes the action it is about to run from
//! `Runtime::scenario`'s arena before calling its handler, so the handler's
//! own `Runtime` lock (taken to reach the pipeline or scenario fields) never
//! nests inside the dispatcher's.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;
use std::time::Instant;

use std::sync::Arc;

use scenario_core::ActionId;
use scenario_core::NullReporter;
use scenario_core::Reporter;
use scenario_core::Scenario;

use crate::pipeline::Pipeline;
use crate::pipeline::SeekRequest;
use crate::pipeline::TargetSelector;

// ============================================================================
// SECTION: Wait conditions
// ============================================================================

/// What a parked `wait` action is waiting for.
#[derive(Debug, Clone)]
pub enum WaitCondition {
    /// Resolved once `Instant::now() >= until`.
    Duration {
        /// The wall-clock deadline.
        until: Instant,
    },
    /// Resolved by a named bus message (message-type wait).
    MessageType {
        /// The expected message type name.
        type_name: String,
    },
    /// Resolved by a named signal on a target element, modeled as a bus
    /// [`crate::pipeline::BusMessage::Named`] carrying the signal name
    /// (this crate has no separate signal-subscription channel; an
    /// embedder's `Pipeline` surfaces a fired signal the same way it
    /// surfaces any other named event).
    Signal {
        /// The expected signal name.
        signal_name: String,
    },
}

// ============================================================================
// SECTION: Switch-track bookkeeping
// ============================================================================

/// The stream set a pending `switch-track` action expects to observe once
/// resolved, once the pipeline reports STREAMS-SELECTED.
#[derive(Debug, Clone)]
pub struct ExpectedStreams {
    /// The action awaiting resolution.
    pub action_id: ActionId,
    /// The full stream-id set expected to be selected afterwards.
    pub expected: Vec<String>,
}

// ============================================================================
// SECTION: Appsrc bookkeeping
// ============================================================================

/// A pushed appsrc buffer awaiting its transit acknowledgement: a one-shot
/// chain-wrapper calls `set_done` when the buffer transits.
#[derive(Debug, Clone)]
pub struct PendingAppsrcPush {
    /// The element the buffer was pushed into.
    pub target: TargetSelector,
}

// ============================================================================
// SECTION: Runtime
// ============================================================================

/// Everything a built-in handler, the dispatcher, or the bus reactor may
/// need to read or mutate in one tick.
pub struct Runtime {
    /// The loaded scenario's full state (queues, vars, segment bookkeeping).
    pub scenario: Scenario,
    /// The external pipeline collaborator.
    pub pipeline: Box<dyn Pipeline>,
    /// Scales `wait duration` (`SCENARIO_WAIT_MULTIPLIER`; `0.0` disables
    /// waits entirely, resolving them immediately).
    pub wait_multiplier: f64,
    /// Destination directory for `dot-pipeline` dumps (`DUMP_DOT_DIR`).
    pub dump_dot_dir: Option<PathBuf>,
    /// Per-action-id wait conditions for parked `wait` actions.
    pub pending_waits: HashMap<ActionId, WaitCondition>,
    /// The single outstanding `switch-track` resolution, if any.
    pub pending_switch: Option<ExpectedStreams>,
    /// Per-action-id appsrc pushes awaiting transit.
    pub pending_appsrc: HashMap<ActionId, PendingAppsrcPush>,
    /// When a `pause, duration=...` should restore playback, if any.
    pub pause_restore_at: Option<Instant>,
    /// Actions awaiting an `ASYNC-DONE`-equivalent bus message (issued by
    /// `seek` and any state change the pipeline completes asynchronously).
    pub pending_async_done: Vec<ActionId>,
    /// Playback rate of the most recently issued seek, used by the
    /// execution gate's rate-relative playback-time comparison.
    pub last_rate: f64,
    /// The most recently issued seek, awaiting its `ASYNC-DONE` to apply
    /// its segment/pause bookkeeping.
    pub pending_seek: Option<SeekRequest>,
    /// The only external logging surface handlers are allowed to use;
    /// defaults to [`NullReporter`] until an embedder installs one via
    /// [`Runtime::with_reporter`].
    pub reporter: Arc<dyn Reporter + Send + Sync>,
}

impl Runtime {
    /// Creates a runtime over an already-loaded scenario and a supplied
    /// pipeline collaborator.
    #[must_use]
    pub fn new(scenario: Scenario, pipeline: Box<dyn Pipeline>) -> Self {
        Self {
            scenario,
            pipeline,
            wait_multiplier: 1.0,
            dump_dot_dir: None,
            pending_waits: HashMap::new(),
            pending_switch: None,
            pending_appsrc: HashMap::new(),
            pause_restore_at: None,
            pending_async_done: Vec::new(),
            last_rate: 1.0,
            pending_seek: None,
            reporter: Arc::new(NullReporter),
        }
    }

    /// Installs `reporter` as the destination for handler/dispatcher/bus
    /// reactor reports.
    #[must_use]
    pub fn with_reporter(mut self, reporter: Arc<dyn Reporter + Send + Sync>) -> Self {
        self.reporter = reporter;
        self
    }
}

/// A `Mutex<Runtime>` shared between the dispatcher and every registered
/// handler closure.
pub type SharedRuntime = std::sync::Arc<Mutex<Runtime>>;

/// Locks `shared`, recovering from poisoning rather than panicking: a
/// handler that panics mid-execution should not wedge every subsequent
/// action.
pub fn lock(shared: &Mutex<Runtime>) -> MutexGuard<'_, Runtime> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}
