// crates/scenario-core/src/lib.rs
// ============================================================================
// Module: scenario-core
// Description: Data model, variable store, action-type registry and
//              reporting taxonomy shared by the loader and the engine.
// Purpose: Crate root; wires the submodules together and re-exports the
//          public surface the rest of the workspace depends on.
// Dependencies: scenario_expr
// ============================================================================

//! ## Overview
//!
//! `scenario-core` has no knowledge of a pipeline: it defines the shape of
//! a loaded scenario ([`Scenario`], [`Action`]), the dynamically typed
//! value model parsed scenario files resolve to ([`Value`], [`Structure`]),
//! the open action-type registry ([`ActionTypeRegistry`]) third-party
//! handlers register into, and the reporting taxonomy
//! ([`ReportCode`]/[`Reporter`]) used to surface failures. `scenario-loader`
//! builds a [`Scenario`] from scenario-file text; `scenario-engine` drives
//! one by registering built-in [`ActionType`]s and running the dispatcher
//! and bus reactor described in the top-level design document.

pub mod action;
pub mod error;
pub mod registry;
pub mod report;
pub mod scenario;
pub mod time;
pub mod value;
pub mod vars;

pub use action::Action;
pub use action::ActionFlags;
pub use action::ActionId;
pub use action::ActionNumber;
pub use action::ActionState;
pub use action::SceneEpoch;
pub use action::SubAction;
pub use error::ScenarioError;
pub use registry::ActionType;
pub use registry::ActionTypeFlags;
pub use registry::ActionTypeRegistry;
pub use registry::ExecuteFn;
pub use registry::ExecuteResult;
pub use registry::HandlerContext;
pub use registry::ParameterSchema;
pub use registry::PrepareFn;
pub use report::NullReporter;
pub use report::Overrides;
pub use report::Report;
pub use report::ReportCode;
pub use report::ReportLevel;
pub use report::Reporter;
pub use scenario::PendingSwitchTrack;
pub use scenario::Scenario;
pub use scenario::SeekFlags;
pub use scenario::TargetState;
pub use scenario::DEFAULT_ACTION_EXECUTION_INTERVAL;
pub use time::ClockTime;
pub use time::ClockTimeParseError;
pub use value::Structure;
pub use value::Value;
pub use vars::SubstitutionError;
pub use vars::VarValue;
pub use vars::VariableStore;
pub use vars::DURATION;
pub use vars::POSITION;
