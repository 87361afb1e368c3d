// crates/scenario-core/src/registry.rs
// ============================================================================
// Module: Action Type Registry
// Description: Named action kinds with parameter schemas and rank-based
//              override.
// Purpose: Let built-in and third-party action kinds register themselves,
//          with later/higher-ranked registrations replacing earlier ones.
// Dependencies: crate::value
// ============================================================================

//! ## Overview
//!
//! The registry follows a rank-based provider/plugin shape: registering a
//! name that already exists either discards the new registration (lower
//! rank) or replaces the current one, linking the replaced type as
//! `overriden_type` so a full history remains inspectable for debugging.
//!
//! The registry itself holds no handler closures: [`ActionType`] carries a
//! type-erased `execute`/`prepare` callback pair so `scenario-engine` can
//! register built-ins without this crate depending on a pipeline type.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::action::Action;
use crate::value::Structure;

// ============================================================================
// SECTION: Minimal bitflags support
// ============================================================================

/// A tiny, dependency-free stand-in for the `bitflags!` macro, scoped to
/// this crate's single use site so we don't pull in an extra crate for one
/// flag set.
macro_rules! bitflags_lite {
    (
        $(#[$meta:meta])*
        pub struct $name:ident: $ty:ty {
            $(
                $(#[$field_meta:meta])*
                const $field:ident = $value:expr;
            )*
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
        pub struct $name($ty);

        impl $name {
            $(
                $(#[$field_meta])*
                pub const $field: Self = Self($value);
            )*

            /// Empty flag set.
            pub const NONE: Self = Self(0);

            /// Returns the union of `self` and `other`.
            #[must_use]
            pub const fn union(self, other: Self) -> Self {
                Self(self.0 | other.0)
            }

            /// Returns true if every bit in `other` is set in `self`.
            #[must_use]
            pub const fn contains(self, other: Self) -> bool {
                (self.0 & other.0) == other.0
            }
        }

        impl core::ops::BitOr for $name {
            type Output = Self;
            fn bitor(self, rhs: Self) -> Self {
                self.union(rhs)
            }
        }
    };
}

// ============================================================================
// SECTION: Flags
// ============================================================================

bitflags_lite! {
    /// Scheduling/behavior flags for a registered action type.
    pub struct ActionTypeFlags: u32 {
        /// Executed at load time, never queued.
        const CONFIG = 1 << 0;
        /// Requires the pipeline to have a synchronized clock.
        const NEEDS_CLOCK = 1 << 1;
        /// `execute` may return `ASYNC`.
        const ASYNC = 1 << 2;
        /// May run from the on-addition queue (before any playback-time is
        /// known), if no earlier queued action has one.
        const CAN_EXECUTE_ON_ADDITION = 1 << 3;
        /// The loaded structure's `optional=true` field is honored.
        const CAN_BE_OPTIONAL = 1 << 4;
        /// `execute` does not require a pipeline reference to run.
        const DOESNT_NEED_PIPELINE = 1 << 5;
        /// A handler that does not execute is not considered fatal, even if
        /// not marked `optional` by the scenario file.
        const NO_EXECUTION_NOT_FATAL = 1 << 6;
        /// `execute` may return `INTERLACED`.
        const INTERLACED = 1 << 7;
        /// Consumed entirely by configuration handling; never reaches the
        /// dispatcher (equivalent to `CONFIG` for scheduling purposes, kept
        /// distinct because it additionally suppresses parameter-schema
        /// validation against the live pipeline).
        const HANDLED_IN_CONFIG = 1 << 8;
    }
}

// ============================================================================
// SECTION: Parameter Schema
// ============================================================================

/// One entry of an action type's parameter schema.
#[derive(Debug, Clone)]
pub struct ParameterSchema {
    /// Parameter name.
    pub name: String,
    /// Whether the loader requires this parameter to be present.
    pub mandatory: bool,
    /// Textual description of accepted types, for docs/validation messages.
    pub types: String,
    /// Human-readable description.
    pub description: String,
    /// Default value rendered as text, if any.
    pub default: Option<String>,
    /// Names of variables commonly substituted into this field, for docs.
    pub possible_variables: Vec<String>,
}

impl ParameterSchema {
    /// Creates a mandatory parameter with no default.
    #[must_use]
    pub fn mandatory(name: impl Into<String>, types: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            mandatory: true,
            types: types.into(),
            description: description.into(),
            default: None,
            possible_variables: Vec::new(),
        }
    }

    /// Creates an optional parameter with the given default.
    #[must_use]
    pub fn optional(
        name: impl Into<String>,
        types: impl Into<String>,
        description: impl Into<String>,
        default: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            mandatory: false,
            types: types.into(),
            description: description.into(),
            default: Some(default.into()),
            possible_variables: Vec::new(),
        }
    }
}

// ============================================================================
// SECTION: Handler signatures
// ============================================================================

/// Result of an action handler's synchronous execution phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecuteResult {
    /// Completed successfully.
    Ok,
    /// Failed; not yet reported by the caller.
    Error,
    /// Failed; already reported by the handler itself.
    ErrorReported,
    /// Completion will be signalled later via `set_done`.
    Async,
    /// Runs in parallel with subsequent main-queue actions.
    Interlaced,
}

/// Context handed to a `prepare`/`execute` hook.
///
/// Kept intentionally minimal in `scenario-core`: it carries only what every
/// action kind needs regardless of pipeline backend. `scenario-engine`
/// extends this with pipeline access through its own handler trait.
pub struct HandlerContext<'a> {
    /// The action currently being prepared/executed.
    pub action: &'a mut Action,
}

/// Type-erased prepare hook: runs before `execute`, typically to validate or
/// normalize `structure` beyond generic variable substitution.
pub type PrepareFn = Arc<dyn Fn(&mut HandlerContext<'_>) -> Result<(), String> + Send + Sync>;

/// Type-erased execute hook.
pub type ExecuteFn = Arc<dyn Fn(&mut HandlerContext<'_>) -> ExecuteResult + Send + Sync>;

// ============================================================================
// SECTION: Action Type
// ============================================================================

/// A registered action kind.
///
/// # Invariants
/// - `rank` determines whether a subsequent `register` call for the same
///   `name` is discarded or replaces this entry.
#[derive(Clone)]
pub struct ActionType {
    /// Registered name, unique within one registry generation.
    pub name: String,
    /// Namespace of the implementer (e.g. a plugin crate name), for
    /// diagnostics only.
    pub implementer_namespace: String,
    /// Override rank; higher (or equal) replaces a lower-ranked entry.
    pub rank: i32,
    /// Scheduling/behavior flags.
    pub flags: ActionTypeFlags,
    /// Parameter schema, used by the loader for validation.
    pub parameters: Vec<ParameterSchema>,
    /// Optional pre-execute hook.
    pub prepare: Option<PrepareFn>,
    /// Execute hook.
    pub execute: ExecuteFn,
    /// The action type this one replaced, if any (override history).
    pub overriden_type: Option<Arc<ActionType>>,
}

impl fmt::Debug for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionType")
            .field("name", &self.name)
            .field("implementer_namespace", &self.implementer_namespace)
            .field("rank", &self.rank)
            .field("flags", &self.flags)
            .field("parameters", &self.parameters.len())
            .finish_non_exhaustive()
    }
}

impl ActionType {
    /// Looks up a mandatory-ness flag for `name` within this type's schema.
    #[must_use]
    pub fn parameter(&self, name: &str) -> Option<&ParameterSchema> {
        self.parameters.iter().find(|p| p.name == name)
    }

    /// Validates that every mandatory parameter of this type is present in
    /// `structure`.
    ///
    /// # Errors
    ///
    /// Returns the list of missing mandatory parameter names, if any.
    pub fn check_mandatory(&self, structure: &Structure) -> Result<(), Vec<String>> {
        let missing: Vec<String> = self
            .parameters
            .iter()
            .filter(|p| p.mandatory && structure.get(&p.name).is_none())
            .map(|p| p.name.clone())
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(missing)
        }
    }
}

// ============================================================================
// SECTION: Registry
// ============================================================================

/// The process-wide action-type registry.
///
/// # Invariants
/// - `lookup` always returns the highest-ranked live registration for a
///   name; `history` retains every registration ever made for debugging.
#[derive(Debug, Default)]
pub struct ActionTypeRegistry {
    current: BTreeMap<String, Arc<ActionType>>,
}

impl ActionTypeRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `action_type`, applying rank-based override.
    ///
    /// Returns the type that is now current for `action_type.name` — either
    /// the newly registered one, or the pre-existing higher-ranked one.
    pub fn register(&mut self, mut action_type: ActionType) -> Arc<ActionType> {
        let name = action_type.name.clone();
        match self.current.get(&name) {
            Some(existing) if existing.rank > action_type.rank => Arc::clone(existing),
            Some(existing) => {
                action_type.overriden_type = Some(Arc::clone(existing));
                let registered = Arc::new(action_type);
                self.current.insert(name, Arc::clone(&registered));
                registered
            }
            None => {
                let registered = Arc::new(action_type);
                self.current.insert(name, Arc::clone(&registered));
                registered
            }
        }
    }

    /// Returns the current registration for `name`, if any.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<Arc<ActionType>> {
        self.current.get(name).cloned()
    }

    /// Lists every currently registered type, ordered by name.
    #[must_use]
    pub fn list(&self) -> Vec<Arc<ActionType>> {
        self.current.values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, reason = "test assertions may panic directly")]
    use super::*;

    fn dummy_type(name: &str, rank: i32) -> ActionType {
        ActionType {
            name: name.to_string(),
            implementer_namespace: "test".to_string(),
            rank,
            flags: ActionTypeFlags::NONE,
            parameters: Vec::new(),
            prepare: None,
            execute: Arc::new(|_ctx| ExecuteResult::Ok),
            overriden_type: None,
        }
    }

    #[test]
    fn higher_rank_replaces_lower_rank() {
        let mut registry = ActionTypeRegistry::new();
        registry.register(dummy_type("wait", 0));
        registry.register(dummy_type("wait", 5));
        let current = registry.lookup("wait").unwrap();
        assert_eq!(current.rank, 5);
        assert_eq!(current.overriden_type.as_ref().unwrap().rank, 0);
    }

    #[test]
    fn lower_rank_registration_is_discarded() {
        let mut registry = ActionTypeRegistry::new();
        registry.register(dummy_type("wait", 5));
        registry.register(dummy_type("wait", 0));
        let current = registry.lookup("wait").unwrap();
        assert_eq!(current.rank, 5);
        assert!(current.overriden_type.is_none());
    }

    #[test]
    fn equal_rank_replaces_previous() {
        let mut registry = ActionTypeRegistry::new();
        registry.register(dummy_type("seek", 1));
        registry.register(dummy_type("seek", 1));
        let current = registry.lookup("seek").unwrap();
        assert!(current.overriden_type.is_some());
    }
}
