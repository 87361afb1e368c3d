// crates/scenario-loader/src/lib.rs
// ============================================================================
// Module: scenario-loader
// Description: Scenario-file tokenizer/parser, search-path resolution and
//              registry validation.
// Purpose: Crate root; wires the submodules together and re-exports the
//          public loading entry point.
// Dependencies: scenario_core
// ============================================================================

//! ## Overview
//!
//! `scenario-loader` turns scenario-file text into a
//! `scenario_core::Scenario`: [`tokenizer`] strips comments and joins
//! continuation lines into logical records, [`parser`] turns each record
//! into a `Structure`, [`searchpath`] resolves bare scenario references to
//! files on disk, and [`loader`] ties all three together with
//! `include`/`description`/action-type validation.

pub mod description;
pub mod loader;
pub mod parser;
pub mod searchpath;
pub mod tokenizer;

pub use description::ScenarioDescription;
pub use loader::load_references;
pub use loader::LoadedScenario;
pub use parser::parse_structure;
pub use parser::StructureParseError;
pub use searchpath::resolve;
pub use searchpath::split_references;
pub use searchpath::ScenarioNotFound;
pub use searchpath::SCENARIOS_PATH_VAR;
pub use searchpath::SCENARIO_EXTENSION;
pub use tokenizer::split_records;
