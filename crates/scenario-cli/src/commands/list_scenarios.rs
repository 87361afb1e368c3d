// crates/scenario-cli/src/commands/list_scenarios.rs
// ============================================================================
// Module: `list-scenarios` Command
// Description: Lists every `.scenario` file under the given paths (or the
//              default search path) with its parsed description fields.
// Purpose: Let a caller discover what scenarios are available and what
//          pipeline capabilities (clock sync, seek, min tracks...) each
//          one declares, without running any of them.
// Dependencies: scenario_core, scenario_loader, scenario_engine
// ============================================================================

use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;

use scenario_core::ActionTypeRegistry;
use scenario_core::NullReporter;
use scenario_core::Scenario;
use scenario_engine::register_builtins;
use scenario_engine::Runtime;
use scenario_engine::SharedRuntime;
use scenario_loader::load_references;
use scenario_loader::ScenarioDescription;
use scenario_loader::SCENARIO_EXTENSION;

use crate::commands::CliError;
use crate::sim_pipeline::SimulatedMedia;
use crate::sim_pipeline::SimulatedPipeline;

/// One listed scenario: its file path and parsed `description` fields.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ScenarioListing {
    /// Path the scenario was loaded from.
    pub path: PathBuf,
    /// Parsed description fields, `need-clock-sync` already OR'd with any
    /// loaded action's `NEEDS_CLOCK` flag.
    pub description: ScenarioDescription,
}

impl ScenarioListing {
    /// Renders `listings` as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns a [`CliError`] if serialization fails, which should not
    /// happen for this plain-data shape.
    pub fn to_json(listings: &[Self]) -> Result<String, CliError> {
        serde_json::to_string_pretty(listings).map_err(|e| CliError(e.to_string()))
    }

    /// Renders this listing as a `key=value` block, one block per
    /// scenario separated by a blank line.
    #[must_use]
    pub fn to_key_value_block(&self) -> String {
        let d = &self.description;
        let mut lines = vec![format!("path={}", self.path.display())];
        if let Some(summary) = &d.summary {
            lines.push(format!("summary={summary}"));
        }
        lines.push(format!("is-config={}", d.is_config));
        lines.push(format!("need-clock-sync={}", d.need_clock_sync));
        lines.push(format!("seek={}", d.seek));
        lines.push(format!("reverse-playback={}", d.reverse_playback));
        if let Some(v) = d.max_latency {
            lines.push(format!("max-latency={v}"));
        }
        if let Some(v) = d.max_dropped {
            lines.push(format!("max-dropped={v}"));
        }
        if let Some(v) = d.min_media_duration {
            lines.push(format!("min-media-duration={v}"));
        }
        if let Some(v) = d.min_audio_track {
            lines.push(format!("min-audio-track={v}"));
        }
        if let Some(v) = d.min_video_track {
            lines.push(format!("min-video-track={v}"));
        }
        if let Some(v) = d.duration {
            lines.push(format!("duration={v}"));
        }
        lines.join("\n")
    }
}

/// Lists every `.scenario` file reachable from `roots`: each entry may be a
/// single file or a directory searched non-recursively.
///
/// # Errors
///
/// Returns [`CliError`] if a root cannot be read, or a discovered file
/// fails to load (malformed text, unknown action type with
/// `optional-action-type` unset, etc).
pub fn execute(roots: &[PathBuf]) -> Result<Vec<ScenarioListing>, CliError> {
    let registry = builtin_registry();
    let mut files = Vec::new();
    for root in roots {
        collect_scenario_files(root, &mut files).map_err(|e| CliError(format!("{}: {e}", root.display())))?;
    }
    files.sort();
    files.dedup();

    let mut listings = Vec::with_capacity(files.len());
    for path in files {
        let reference = path.to_string_lossy().into_owned();
        let loaded = load_references(&[reference.as_str()], &registry, &NullReporter)?;
        listings.push(ScenarioListing { path, description: loaded.description });
    }
    Ok(listings)
}

/// Writes `listings` as `key=value` blocks to `path`,
/// overwriting any existing content.
///
/// # Errors
///
/// Returns [`CliError`] if `path` cannot be written.
pub fn write_output_file(listings: &[ScenarioListing], path: &Path) -> Result<(), CliError> {
    let body = listings.iter().map(ScenarioListing::to_key_value_block).collect::<Vec<_>>().join("\n\n");
    fs::write(path, body).map_err(|e| CliError(format!("{}: {e}", path.display())))
}

/// Builds a registry carrying every built-in action type, over a throwaway
/// runtime: `list-scenarios` never runs an action, but needs the
/// `NEEDS_CLOCK` flags to derive `need-clock-sync` during loading.
fn builtin_registry() -> ActionTypeRegistry {
    let pipeline = Box::new(SimulatedPipeline::new(SimulatedMedia::default()));
    let runtime = Runtime::new(Scenario::new("list-scenarios"), pipeline);
    let shared: SharedRuntime = Arc::new(Mutex::new(runtime));
    let mut registry = ActionTypeRegistry::new();
    register_builtins(&mut registry, &shared);
    registry
}

/// Appends every `.scenario`-extensioned file under `root` to `out`: `root`
/// itself if it is a file, or its immediate (non-recursive) directory
/// entries otherwise.
fn collect_scenario_files(root: &Path, out: &mut Vec<PathBuf>) -> std::io::Result<()> {
    if root.is_file() {
        out.push(root.to_path_buf());
        return Ok(());
    }
    for entry in fs::read_dir(root)? {
        let path = entry?.path();
        if path.extension().is_some_and(|ext| ext == SCENARIO_EXTENSION) {
            out.push(path);
        }
    }
    Ok(())
}
