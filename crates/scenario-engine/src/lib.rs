// crates/scenario-engine/src/lib.rs
// ============================================================================
// Module: scenario-engine
// Description: Drives a loaded `scenario-core::Scenario` against an
//              embedder-supplied pipeline: the action lifecycle, dispatcher,
//              bus reactor, built-in action handlers and reporting sinks.
// Purpose: Crate root; wires the submodules together and re-exports the
//          public surface `scenario-cli` (or another embedder) drives.
// Dependencies: scenario_core, scenario_expr, scenario_loader, sha1
// ============================================================================

//! ## Overview
//!
//! `scenario-engine` has no knowledge of scenario-file syntax
//! (`scenario-loader` owns that) and no opinion on what a "pipeline" is made
//! of ([`pipeline::Pipeline`] is the seam an embedder implements). Given a
//! loaded [`scenario_core::Scenario`] and a `Pipeline`, [`runtime::Runtime`]
//! holds the mutable state every other module reads and mutates;
//! [`dispatcher::Dispatcher`] advances the main queue;
//! [`reactor::BusReactor`] drains pipeline bus observations and resolves
//! waiting actions; [`handlers::register_builtins`] wires every supported
//! action kind into a [`scenario_core::ActionTypeRegistry`]; and
//! [`reporting`] provides the concrete `Reporter` sinks. A typical
//! embedder's main loop is: build a `Runtime`, register builtins, then call
//! `BusReactor::drain` followed by `Dispatcher::tick` on a fixed interval
//! (`action_execution_interval`) until `DispatchOutcome::ScenarioDone`.

pub mod dispatcher;
pub mod handlers;
pub mod lifecycle;
pub mod pipeline;
pub mod reactor;
pub mod reporting;
pub mod runtime;

pub use dispatcher::DispatchOutcome;
pub use dispatcher::Dispatcher;
pub use dispatcher::DEFAULT_SEEK_POS_TOL;
pub use handlers::register_builtins;
pub use pipeline::BusMessage;
pub use pipeline::Pipeline;
pub use pipeline::PipelineError;
pub use pipeline::PipelineState;
pub use pipeline::SeekRequest;
pub use pipeline::SeekType;
pub use pipeline::StateChangeOutcome;
pub use pipeline::TargetSelector;
pub use pipeline::TrackIndex;
pub use reactor::BusReactor;
pub use reporting::ChannelReporter;
pub use reporting::ChannelSendError;
pub use reporting::CompositeReporter;
pub use reporting::FileReporter;
pub use reporting::FileReporterError;
pub use reporting::StderrReporter;
pub use reporting::StdoutReporter;
pub use runtime::ExpectedStreams;
pub use runtime::PendingAppsrcPush;
pub use runtime::Runtime;
pub use runtime::SharedRuntime;
pub use runtime::WaitCondition;
