// crates/scenario-core/src/action.rs
// ============================================================================
// Module: Action
// Description: Per-action record and lifecycle state.
// Purpose: Represent a single scripted operation, its working/original
//          parameter structures, and its position in the action lifecycle
//          state machine.
// Dependencies: crate::value, crate::time
// ============================================================================

//! ## Overview
//!
//! An [`Action`] is an immutable identity (`action_number`, `main_structure`)
//! plus a mutable, append-only-in-spirit working copy (`structure`, `state`)
//! that the dispatcher and bus reactor advance.
//!
//! Actions never hold a strong reference to their owning [`crate::Scenario`];
//! back-pointers are modeled as an arena with stable indices instead of
//! `Weak`/`RefCell` plumbing. Here that arena is `Scenario::actions_arena` (a
//! `Vec<Action>` indexed by [`ActionId`]), and the "weak pointer" from an
//! async completion callback back to the scenario is a [`SceneEpoch`] token:
//! a callback that fires after the scenario has been torn down (epoch
//! mismatch) is a no-op, giving cross-thread completions the same
//! cancellation semantics a `Weak` upgrade failure would.

use std::time::Duration;
use std::time::Instant;

use crate::value::Structure;

// ============================================================================
// SECTION: Identifiers
// ============================================================================

/// Stable index of an [`Action`] inside its owning scenario's arena.
///
/// # Invariants
/// - Valid only in combination with the [`SceneEpoch`] the action was
///   created under; see [`crate::Scenario::epoch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ActionId(pub u32);

/// Serial index assigned by the loader, in load order, starting at zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ActionNumber(pub u32);

/// Epoch token identifying one "instance" of a running scenario.
///
/// A `set_done` message carries the epoch that was current when the
/// triggering handler was dispatched. If the scenario's current epoch has
/// since changed (teardown, or a fresh `Scenario` reusing the same engine),
/// the message is dropped: a weak-reference-style cancellation that avoids
/// `Weak`/`RefCell` plumbing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SceneEpoch(pub u64);

// ============================================================================
// SECTION: Action State
// ============================================================================

/// Lifecycle state of an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionState {
    /// Freshly loaded; `prepare` has not yet run.
    None,
    /// Execution completed synchronously and successfully.
    Ok,
    /// Execution failed and has not yet been reported.
    Error,
    /// Execution failed and the failure has already been reported.
    ErrorReported,
    /// Execution returned asynchronously; awaiting `set_done`.
    Async,
    /// Execution is running in parallel with the main queue.
    Interlaced,
    /// Currently being executed by the dispatcher (re-entrancy guard).
    InProgress,
}

impl ActionState {
    /// True for states that must never persist past scenario end
    /// (`ASYNC`/`INTERLACED`/`IN_PROGRESS`).
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Ok | Self::Error | Self::ErrorReported)
    }
}

// ============================================================================
// SECTION: Action Flags
// ============================================================================

/// Per-action boolean flags.
///
/// # Invariants
/// - `executing_last_subaction` is only meaningful while a sub-action stack
///   is non-empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ActionFlags {
    /// The action's failure/success has already been printed/reported.
    pub printed: bool,
    /// Failure is non-fatal: report at reduced severity, continue.
    pub optional: bool,
    /// The currently executing sub-action is the last one on the stack.
    pub executing_last_subaction: bool,
    /// `set_done` has been requested but not yet drained by the main loop.
    pub pending_set_done: bool,
    /// `playback-time` was given as an expression and still needs
    /// evaluation once `duration` becomes known.
    pub needs_playback_parsing: bool,
}

// ============================================================================
// SECTION: Sub-actions
// ============================================================================

/// A sub-action stack entry: the structure to run once the parent's
/// synchronous phase (or previous sub-action) completes.
///
/// Represented as a stack on the action record rather than by swapping
/// `structure` in place, so the parent structure is trivially restored by
/// popping.
#[derive(Debug, Clone, PartialEq)]
pub struct SubAction {
    /// The sub-action's own structure, already parsed.
    pub structure: Structure,
}

// ============================================================================
// SECTION: Action
// ============================================================================

/// A single scripted action.
#[derive(Debug, Clone)]
pub struct Action {
    /// Serial index assigned by the loader.
    pub action_number: ActionNumber,
    /// Registered action-kind name.
    pub type_name: String,
    /// Mutable working copy of the loaded record.
    pub structure: Structure,
    /// Immutable copy of the originally loaded record, used to restart a
    /// `repeat` iteration.
    pub main_structure: Structure,
    /// Optional stream-time trigger, in seconds.
    pub playback_time: Option<f64>,
    /// Optional timeout, in seconds.
    pub timeout: Option<Duration>,
    /// Remaining repeat iterations; `-1` means "not set".
    pub repeat: i64,
    /// Current lifecycle state.
    pub state: ActionState,
    /// Per-action boolean flags.
    pub flags: ActionFlags,
    /// Wall-clock timestamp recorded at dispatch, for timeout checks.
    pub execution_time: Option<Instant>,
    /// Sub-action stack; the top entry runs next.
    pub sub_actions: Vec<SubAction>,
}

impl Action {
    /// Creates a freshly loaded action in [`ActionState::None`].
    #[must_use]
    pub fn new(action_number: ActionNumber, type_name: impl Into<String>, structure: Structure) -> Self {
        Self {
            action_number,
            type_name: type_name.into(),
            main_structure: structure.clone(),
            structure,
            playback_time: None,
            timeout: None,
            repeat: -1,
            state: ActionState::None,
            flags: ActionFlags::default(),
            execution_time: None,
            sub_actions: Vec::new(),
        }
    }

    /// Restores `structure` from `main_structure`, as done before each
    /// `repeat` iteration.
    pub fn restore_main_structure(&mut self) {
        self.structure = self.main_structure.clone();
    }

    /// True when an ASYNC action has outlived its timeout, relative to
    /// `now`.
    #[must_use]
    pub fn is_timed_out(&self, now: Instant) -> bool {
        match (self.timeout, self.execution_time) {
            (Some(timeout), Some(started)) => now.duration_since(started) > timeout,
            _ => false,
        }
    }
}
