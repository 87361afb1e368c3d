// crates/scenario-loader/src/searchpath.rs
// ============================================================================
// Module: Scenario Search Path
// Description: Resolves a scenario reference (path or basename) to a file
//              on disk.
// Purpose: Implement the documented search order without pulling in a
//          directories-lookup crate for something this small.
// Dependencies: std::env, std::fs, std::path
// ============================================================================

//! ## Overview
//!
//! Search order for a basename reference:
//! 1. treated as an absolute path, if it is one;
//! 2. each directory listed in `SCENARIOS_PATH` (platform path-list
//!    separator), in order;
//! 3. `./data/scenarios`;
//! 4. the user data dir (`$XDG_DATA_HOME/scenario-engine`, falling back to
//!    `$HOME/.local/share/scenario-engine`);
//! 5. the system data dir (`/usr/local/share/scenario-engine`, then
//!    `/usr/share/scenario-engine`).
//!
//! A bare basename with no extension is also tried with a `.scenario`
//! extension appended at every search step, matching how gst-validate
//! scenario references are written without their file extension.

use std::env;
use std::path::Path;
use std::path::PathBuf;

/// The conventional extension a bare scenario basename implies.
pub const SCENARIO_EXTENSION: &str = "scenario";

/// Name of the environment variable holding the colon/semicolon-separated
/// search-path list.
pub const SCENARIOS_PATH_VAR: &str = "SCENARIOS_PATH";

/// `reference` could not be resolved to an existing file anywhere in the
/// search path.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("scenario reference '{0}' not found in search path")]
pub struct ScenarioNotFound(pub String);

/// Resolves a single scenario reference to an existing file path, searching
/// in the order documented above.
///
/// # Errors
///
/// Returns [`ScenarioNotFound`] if no candidate path exists.
pub fn resolve(reference: &str) -> Result<PathBuf, ScenarioNotFound> {
    let as_path = Path::new(reference);
    if as_path.is_absolute() {
        return existing_candidate(as_path).ok_or_else(|| ScenarioNotFound(reference.to_string()));
    }

    for dir in search_directories() {
        if let Some(found) = existing_candidate(&dir.join(reference)) {
            return Ok(found);
        }
    }
    Err(ScenarioNotFound(reference.to_string()))
}

/// Splits `SCENARIOS_PATH`-style text on the platform path-list separator.
fn split_search_list(value: &str) -> Vec<PathBuf> {
    env::split_paths(value).collect()
}

/// Returns the ordered list of directories to search.
fn search_directories() -> Vec<PathBuf> {
    let mut dirs = Vec::new();
    if let Ok(scenarios_path) = env::var(SCENARIOS_PATH_VAR) {
        dirs.extend(split_search_list(&scenarios_path));
    }
    dirs.push(PathBuf::from("./data/scenarios"));
    if let Some(user_data_dir) = user_data_dir() {
        dirs.push(user_data_dir);
    }
    dirs.push(PathBuf::from("/usr/local/share/scenario-engine"));
    dirs.push(PathBuf::from("/usr/share/scenario-engine"));
    dirs
}

/// Resolves the user data directory, honoring `XDG_DATA_HOME` before
/// falling back to `$HOME/.local/share`.
fn user_data_dir() -> Option<PathBuf> {
    if let Ok(xdg) = env::var("XDG_DATA_HOME") {
        if !xdg.is_empty() {
            return Some(PathBuf::from(xdg).join("scenario-engine"));
        }
    }
    env::var("HOME").ok().map(|home| PathBuf::from(home).join(".local/share/scenario-engine"))
}

/// Returns `path` if it exists as-is, or `path` with [`SCENARIO_EXTENSION`]
/// appended if that exists instead.
fn existing_candidate(path: &Path) -> Option<PathBuf> {
    if path.is_file() {
        return Some(path.to_path_buf());
    }
    if path.extension().is_none() {
        let with_ext = path.with_extension(SCENARIO_EXTENSION);
        if with_ext.is_file() {
            return Some(with_ext);
        }
    }
    None
}

/// Splits a colon-separated list of scenario references (the loader's
/// input format) into its individual reference strings.
#[must_use]
pub fn split_references(list: &str) -> Vec<&str> {
    list.split(':').map(str::trim).filter(|s| !s.is_empty()).collect()
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, reason = "test assertions may panic directly")]
    use super::*;
    use std::fs;

    #[test]
    fn resolves_absolute_path_directly() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.scenario");
        fs::write(&file, "description, summary=\"x\";").unwrap();
        let resolved = resolve(file.to_str().unwrap()).unwrap();
        assert_eq!(resolved, file);
    }

    #[test]
    fn resolves_absolute_basename_with_implied_extension() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.scenario");
        fs::write(&file, "description, summary=\"x\";").unwrap();
        let bare = dir.path().join("a");
        let resolved = resolve(bare.to_str().unwrap()).unwrap();
        assert_eq!(resolved, file);
    }

    #[test]
    fn missing_reference_is_an_error() {
        assert!(resolve("/nonexistent/path/to/nowhere.scenario").is_err());
    }

    #[test]
    fn split_references_trims_and_drops_empties() {
        assert_eq!(split_references(" a : b: :c "), vec!["a", "b", "c"]);
    }
}
