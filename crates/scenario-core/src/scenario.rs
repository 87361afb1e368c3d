// crates/scenario-core/src/scenario.rs
// ============================================================================
// Module: Scenario
// Description: The loaded scenario's full runtime state.
// Purpose: Own the action arena and the three scheduling queues, plus the
//          segment/seek/target-state bookkeeping the dispatcher and bus
//          reactor read and mutate every tick.
// Dependencies: crate::action, crate::report, crate::vars, std::collections::VecDeque
// ============================================================================

//! ## Overview
//!
//! `Scenario` is the aggregate root of this crate: it does not itself
//! execute anything (that's `scenario-engine`'s dispatcher/bus-reactor), it
//! only owns the state those components read and mutate. Actions live in a
//! single arena (`actions_arena`); the three scheduling queues are
//! `Vec<ActionId>` index lists over that arena rather than three separate
//! owning collections, so an action's identity survives being moved between
//! queues (loaded -> interlaced, on-addition -> loaded, etc).

use std::collections::VecDeque;

use crate::action::Action;
use crate::action::ActionId;
use crate::action::SceneEpoch;
use crate::report::Overrides;
use crate::vars::VariableStore;

// ============================================================================
// SECTION: Seek flags
// ============================================================================

/// Subset of pipeline seek flags a `seek` action can request. Represented
/// as named booleans rather than a bitmask: the set is small and fixed, so
/// a mask buys nothing but unreadable call sites.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SeekFlags {
    /// Flush the pipeline before seeking.
    pub flush: bool,
    /// Seek to the exact requested position rather than the nearest
    /// keyframe.
    pub accurate: bool,
    /// Seek to the nearest keyframe.
    pub key_unit: bool,
    /// Snap to the keyframe before the requested position.
    pub snap_before: bool,
    /// Snap to the keyframe after the requested position.
    pub snap_after: bool,
    /// Request trick-mode playback.
    pub trickmode: bool,
}

// ============================================================================
// SECTION: Target state
// ============================================================================

/// Pipeline state a scenario can request (subset relevant to scheduling
/// decisions; the exact state enum is owned by the pipeline collaborator
/// in `scenario-engine`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TargetState {
    /// No explicit target requested yet.
    #[default]
    Unset,
    /// Paused.
    Paused,
    /// Playing.
    Playing,
    /// Fully stopped (post `stop`/`eos`).
    Null,
}

// ============================================================================
// SECTION: Track switch request
// ============================================================================

/// A pending `switch-track` request: at most one may be outstanding at a
/// time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingSwitchTrack {
    /// Stream type being switched (`audio`, `video`, `text`, ...).
    pub stream_type: String,
    /// Requested index, or `None` for "next".
    pub index: Option<i64>,
}

// ============================================================================
// SECTION: Scenario
// ============================================================================

/// The full runtime state of one loaded scenario.
///
/// # Invariants
/// - Exactly zero or one [`Scenario`] instance governs a pipeline at a
///   time; this crate does not model multiple concurrent scenarios.
/// - `dropped <= max_dropped` and observed latency `<= max_latency` are
///   invariants the dispatcher/bus reactor enforce; this struct only holds
///   the counters and limits.
#[derive(Debug, Clone)]
pub struct Scenario {
    /// Scenario name, from the loaded file's `description` structure, or
    /// the file stem if absent.
    pub name: String,
    /// Every action ever loaded, indexed by [`ActionId`]; queues below hold
    /// indices into this arena rather than owning actions directly.
    pub actions_arena: Vec<Action>,
    /// Ordered, playback-timed actions awaiting dispatch.
    pub actions: VecDeque<ActionId>,
    /// Actions currently running in parallel with `actions`.
    pub interlaced_actions: Vec<ActionId>,
    /// Actions waiting for a matching pipeline element to be added.
    pub on_addition_actions: Vec<ActionId>,
    /// The variable store backing expression evaluation and `$(name)`
    /// substitution.
    pub vars: VariableStore,
    /// Current segment start, in seconds.
    pub segment_start: f64,
    /// Current segment stop, in seconds (`+inf` if unbounded).
    pub segment_stop: f64,
    /// Flags of the most recently issued seek.
    pub seek_flags: SeekFlags,
    /// Whether the most recent seek was issued while paused.
    pub seeked_in_pause: bool,
    /// Most recently requested pipeline state.
    pub target_state: TargetState,
    /// True while an async state change is in flight.
    pub changing_state: bool,
    /// True once an `ASYNC_DONE` is expected before further dispatch.
    pub needs_async_done: bool,
    /// True while the pipeline reports itself buffering.
    pub buffering: bool,
    /// True once `EOS` has been observed on the bus.
    pub got_eos: bool,
    /// At most one outstanding `switch-track` request.
    pub pending_switch_track: Option<PendingSwitchTrack>,
    /// Cumulative QoS-reported dropped buffer count.
    pub dropped: u64,
    /// Configured ceiling for `dropped`, set by config overrides.
    pub max_dropped: Option<u64>,
    /// Configured ceiling for observed latency, in seconds.
    pub max_latency: Option<f64>,
    /// Minimum interval between dispatcher ticks, in seconds; `0.0` means
    /// "dispatch as soon as the pipeline is idle".
    pub action_execution_interval: f64,
    /// Per-report-code severity overrides.
    pub overrides: Overrides,
    /// Epoch token identifying this scenario instance; handlers capture it
    /// at dispatch time so late `set_done` callbacks can recognize a
    /// torn-down scenario and no-op instead of touching stale state.
    pub epoch: SceneEpoch,
}

/// Default dispatcher tick interval, in seconds (10 ms).
pub const DEFAULT_ACTION_EXECUTION_INTERVAL: f64 = 0.010;

impl Scenario {
    /// Creates an empty scenario with the default tick interval and epoch
    /// zero.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            actions_arena: Vec::new(),
            actions: VecDeque::new(),
            interlaced_actions: Vec::new(),
            on_addition_actions: Vec::new(),
            vars: VariableStore::new(),
            segment_start: 0.0,
            segment_stop: f64::INFINITY,
            seek_flags: SeekFlags::default(),
            seeked_in_pause: false,
            target_state: TargetState::default(),
            changing_state: false,
            needs_async_done: false,
            buffering: false,
            got_eos: false,
            pending_switch_track: None,
            dropped: 0,
            max_dropped: None,
            max_latency: None,
            action_execution_interval: DEFAULT_ACTION_EXECUTION_INTERVAL,
            overrides: Overrides::new(),
            epoch: SceneEpoch(0),
        }
    }

    /// Appends `action` to the arena and its load-order queue, returning
    /// its stable [`ActionId`].
    pub fn push_action(&mut self, action: Action) -> ActionId {
        let id = ActionId(u32::try_from(self.actions_arena.len()).unwrap_or(u32::MAX));
        self.actions_arena.push(action);
        self.actions.push_back(id);
        id
    }

    /// Borrows the action identified by `id`.
    #[must_use]
    pub fn action(&self, id: ActionId) -> &Action {
        &self.actions_arena[id.0 as usize]
    }

    /// Mutably borrows the action identified by `id`.
    pub fn action_mut(&mut self, id: ActionId) -> &mut Action {
        &mut self.actions_arena[id.0 as usize]
    }

    /// True once every loaded action has reached a terminal state and no
    /// interlaced/on-addition actions remain (short of the EOS-not-ended
    /// check, which also weighs `optional`).
    #[must_use]
    pub fn all_actions_terminal(&self) -> bool {
        self.actions_arena.iter().all(|a| a.state.is_terminal())
            && self.interlaced_actions.is_empty()
            && self.on_addition_actions.is_empty()
    }

    /// Increments the dropped-buffer counter and reports whether the
    /// configured ceiling (if any) has now been exceeded.
    pub fn record_dropped(&mut self, count: u64) -> bool {
        self.dropped += count;
        self.max_dropped.is_some_and(|max| self.dropped > max)
    }

    /// Advances to a fresh epoch, invalidating any in-flight `set_done`
    /// callbacks captured under the previous one.
    pub fn advance_epoch(&mut self) {
        self.epoch = SceneEpoch(self.epoch.0.wrapping_add(1));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::ActionNumber;
    use crate::value::Structure;

    fn sample_action(number: u32) -> Action {
        Action::new(ActionNumber(number), "wait", Structure::new("wait"))
    }

    #[test]
    fn push_action_assigns_sequential_ids_and_enqueues() {
        let mut scenario = Scenario::new("t");
        let first = scenario.push_action(sample_action(0));
        let second = scenario.push_action(sample_action(1));
        assert_eq!(first, ActionId(0));
        assert_eq!(second, ActionId(1));
        assert_eq!(scenario.actions.len(), 2);
    }

    #[test]
    fn all_actions_terminal_false_with_pending_action() {
        let mut scenario = Scenario::new("t");
        scenario.push_action(sample_action(0));
        assert!(!scenario.all_actions_terminal());
    }

    #[test]
    fn record_dropped_reports_ceiling_exceeded() {
        let mut scenario = Scenario::new("t");
        scenario.max_dropped = Some(5);
        assert!(!scenario.record_dropped(3));
        assert!(scenario.record_dropped(3));
    }

    #[test]
    fn advance_epoch_changes_value() {
        let mut scenario = Scenario::new("t");
        let before = scenario.epoch;
        scenario.advance_epoch();
        assert_ne!(before, scenario.epoch);
    }
}
