// crates/scenario-cli/src/config.rs
// ============================================================================
// Module: CLI Configuration
// Description: Process-wide configuration loaded from a TOML file, plus
//              the environment variable facade documented below.
// Purpose: Give `run`/`validate` a single place to resolve config-action
//          injection, per-report-code severity overrides and the
//          FLAGS/SCENARIOS_PATH/SCENARIO_WAIT_MULTIPLIER/OUTPUT_FILES/
//          DUMP_DOT_DIR/UUID/SERVER environment into typed values.
// Dependencies: serde, toml, std::env
// ============================================================================

//! ## Overview
//!
//! A plain `serde`-derived struct deserialized from TOML, with every field
//! optional so a config file only needs to state what it overrides.
//! [`Env`] reads the handful of relevant environment variables once,
//! rather than scattering `std::env::var` calls through the command
//! modules.

use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// A configuration file could not be read or parsed.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file could not be read from disk.
    #[error("failed to read config file {path}: {source}")]
    Read {
        /// The path that failed to read.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },
    /// The file's contents were not valid TOML, or did not match the
    /// expected shape.
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        /// The path that failed to parse.
        path: PathBuf,
        /// Underlying parse failure.
        #[source]
        source: toml::de::Error,
    },
}

// ============================================================================
// SECTION: Config-injected action
// ============================================================================

/// One `action=<type>` config entry.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigAction {
    /// The registered action-type name to run as config.
    #[serde(rename = "type")]
    pub type_name: String,
    /// Field values, rendered into scenario-file syntax before loading.
    #[serde(default)]
    pub params: BTreeMap<String, toml::Value>,
}

impl ConfigAction {
    /// Renders this entry as a scenario-file action record, forcing
    /// `as-config=true` so the loader executes it immediately regardless
    /// of whether the type itself carries the `CONFIG` flag.
    #[must_use]
    pub fn to_record(&self) -> String {
        let mut out = self.type_name.clone();
        for (key, value) in &self.params {
            out.push_str(", ");
            out.push_str(key);
            out.push('=');
            out.push_str(&render_toml_scalar(value));
        }
        out.push_str(", as-config=true;");
        out
    }
}

/// Renders a TOML scalar using scenario-file literal syntax
/// (`scenario-loader::parser`'s grammar).
fn render_toml_scalar(value: &toml::Value) -> String {
    match value {
        toml::Value::String(s) => format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\"")),
        toml::Value::Integer(i) => i.to_string(),
        toml::Value::Float(f) => f.to_string(),
        toml::Value::Boolean(b) => b.to_string(),
        toml::Value::Datetime(dt) => format!("\"{dt}\""),
        toml::Value::Array(items) => {
            let rendered: Vec<String> = items.iter().map(render_toml_scalar).collect();
            format!("<{}>", rendered.join(", "))
        }
        toml::Value::Table(_) => String::from("\"\""),
    }
}

// ============================================================================
// SECTION: Scenario config
// ============================================================================

/// Process-wide configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScenarioConfig {
    /// Overrides `Scenario::action_execution_interval`, in milliseconds.
    #[serde(rename = "scenario-action-execution-interval")]
    pub scenario_action_execution_interval_ms: Option<u64>,
    /// Overrides `Scenario::max_latency`, in seconds.
    #[serde(rename = "max-latency")]
    pub max_latency: Option<f64>,
    /// Overrides `Scenario::max_dropped`.
    #[serde(rename = "max-dropped")]
    pub max_dropped: Option<u64>,
    /// Config actions to run before the requested scenario loads.
    #[serde(default, rename = "action")]
    pub actions: Vec<ConfigAction>,
    /// Per-report-code severity overrides, keyed by `ReportCode::code_name`.
    #[serde(default)]
    pub overrides: BTreeMap<String, String>,
}

impl ScenarioConfig {
    /// Loads a config file from `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or does not parse
    /// as TOML matching this shape.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;
        toml::from_str(&text).map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })
    }

    /// Renders every config action as one scenario-file-syntax document,
    /// suitable for writing to a temporary file and passed alongside the
    /// user's requested scenario references.
    #[must_use]
    pub fn render_config_scenario_text(&self) -> String {
        let mut out = String::new();
        for action in &self.actions {
            out.push_str(&action.to_record());
            out.push('\n');
        }
        out
    }

    /// Resolves this config's severity overrides into
    /// [`scenario_core::Overrides`], skipping entries whose code or level
    /// name is unrecognized.
    #[must_use]
    pub fn resolve_overrides(&self) -> scenario_core::Overrides {
        let mut resolved = scenario_core::Overrides::new();
        for (code_name, level_name) in &self.overrides {
            let Some(code) = code_by_name(code_name) else { continue };
            let Some(level) = level_by_name(level_name) else { continue };
            resolved.set(code, level);
        }
        resolved
    }
}

/// Maps a report code's wire name back onto its `ReportCode` variant.
fn code_by_name(name: &str) -> Option<scenario_core::ReportCode> {
    use scenario_core::ReportCode as C;
    [
        C::ScenarioFileMalformed,
        C::UnknownActionType,
        C::MissingMandatoryField,
        C::IncludeNotFound,
        C::MultipleActionScenarios,
        C::ScenarioActionExecutionError,
        C::ScenarioActionTimeout,
        C::StateChangeFailure,
        C::QueryPositionOutOfSegment,
        C::QueryPositionSuperiorDuration,
        C::EventSeekResultPositionWrong,
        C::EventSeekNotHandled,
        C::ConfigLatencyTooHigh,
        C::ConfigTooManyBuffersDropped,
        C::ScenarioNotEnded,
    ]
    .into_iter()
    .find(|code| code.code_name() == name)
}

/// Maps a severity name (`issue`/`warning`/`critical`) onto a [`scenario_core::ReportLevel`].
fn level_by_name(name: &str) -> Option<scenario_core::ReportLevel> {
    match name {
        "issue" => Some(scenario_core::ReportLevel::Issue),
        "warning" => Some(scenario_core::ReportLevel::Warning),
        "critical" => Some(scenario_core::ReportLevel::Critical),
        _ => None,
    }
}

// ============================================================================
// SECTION: FLAGS
// ============================================================================

/// Parsed `FLAGS` environment keys: which severities abort the run and
/// which are printed.
#[derive(Debug, Clone, Copy, Default)]
pub struct Flags {
    /// Abort with a non-zero exit code on any `Issue`-level report.
    pub fatal_issues: bool,
    /// Abort with a non-zero exit code on any `Warning`-level report.
    pub fatal_warnings: bool,
    /// Abort with a non-zero exit code on any `Critical`-level report.
    pub fatal_criticals: bool,
    /// Print `Issue`-level reports to the selected sinks.
    pub print_issues: bool,
    /// Print `Warning`-level reports to the selected sinks.
    pub print_warnings: bool,
    /// Print `Critical`-level reports to the selected sinks.
    pub print_criticals: bool,
}

impl Flags {
    /// Parses a `FLAGS` value: a comma-separated list of keys, each
    /// present or absent (no `=value` suffix; presence means enabled).
    /// Unknown keys are ignored.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let mut flags = Self::default();
        for key in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            match key {
                "fatal_issues" => flags.fatal_issues = true,
                "fatal_warnings" => flags.fatal_warnings = true,
                "fatal_criticals" => flags.fatal_criticals = true,
                "print_issues" => flags.print_issues = true,
                "print_warnings" => flags.print_warnings = true,
                "print_criticals" => flags.print_criticals = true,
                _ => {}
            }
        }
        flags
    }

    /// Default policy when `FLAGS` is unset: print everything, abort only on
    /// `Critical` reports.
    #[must_use]
    pub const fn lenient() -> Self {
        Self {
            fatal_issues: false,
            fatal_warnings: false,
            fatal_criticals: true,
            print_issues: true,
            print_warnings: true,
            print_criticals: true,
        }
    }

    /// Whether a report at `level` should abort the run.
    #[must_use]
    pub const fn is_fatal(self, level: scenario_core::ReportLevel) -> bool {
        use scenario_core::ReportLevel as L;
        match level {
            L::Issue => self.fatal_issues,
            L::Warning => self.fatal_warnings,
            L::Critical => self.fatal_criticals,
        }
    }

    /// Whether a report at `level` should reach the print sinks.
    #[must_use]
    pub const fn should_print(self, level: scenario_core::ReportLevel) -> bool {
        use scenario_core::ReportLevel as L;
        match level {
            L::Issue => self.print_issues,
            L::Warning => self.print_warnings,
            L::Critical => self.print_criticals,
        }
    }
}

// ============================================================================
// SECTION: Environment facade
// ============================================================================

/// Reads the relevant environment variables once, rather than scattering
/// `std::env::var` calls across the command modules.
#[derive(Debug, Clone, Default)]
pub struct Env {
    /// Parsed `FLAGS`, or the lenient default if unset.
    pub flags: Flags,
    /// Parsed `OUTPUT_FILES` entries (`stdout`, `stderr`, or a file path).
    pub output_files: Vec<String>,
    /// `SCENARIO_WAIT_MULTIPLIER`, defaulting to `1.0`.
    pub wait_multiplier: f64,
    /// `DUMP_DOT_DIR`, if set.
    pub dump_dot_dir: Option<PathBuf>,
    /// `UUID` + `SERVER` (`host:port`), for report streaming, if both are set.
    pub report_stream_target: Option<(String, String)>,
}

impl Env {
    /// Reads the current process environment.
    #[must_use]
    pub fn from_process() -> Self {
        let flags = env::var("FLAGS").map_or_else(|_| Flags::lenient(), |raw| Flags::parse(&raw));
        let output_files = env::var("OUTPUT_FILES")
            .ok()
            .map(|raw| env::split_paths(&raw).map(|p| p.to_string_lossy().into_owned()).collect())
            .unwrap_or_default();
        let wait_multiplier = env::var("SCENARIO_WAIT_MULTIPLIER").ok().and_then(|raw| raw.parse().ok()).unwrap_or(1.0);
        let dump_dot_dir = env::var("DUMP_DOT_DIR").ok().map(PathBuf::from);
        let report_stream_target = match (env::var("UUID"), env::var("SERVER")) {
            (Ok(uuid), Ok(server)) => Some((uuid, server)),
            _ => None,
        };
        Self { flags, output_files, wait_multiplier, dump_dot_dir, report_stream_target }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, reason = "test assertions may panic directly")]
    use super::*;

    #[test]
    fn flags_parses_known_keys_and_ignores_unknown() {
        let flags = Flags::parse("fatal_criticals, print_issues, bogus_key");
        assert!(flags.fatal_criticals);
        assert!(flags.print_issues);
        assert!(!flags.fatal_issues);
    }

    #[test]
    fn config_action_renders_as_scenario_record() {
        let mut params = BTreeMap::new();
        params.insert("foo".to_string(), toml::Value::Integer(1));
        params.insert("name".to_string(), toml::Value::String("x".to_string()));
        let action = ConfigAction { type_name: "set-vars".to_string(), params };
        let record = action.to_record();
        assert!(record.starts_with("set-vars, "));
        assert!(record.contains("foo=1"));
        assert!(record.contains("name=\"x\""));
        assert!(record.ends_with("as-config=true;"));
    }

    #[test]
    fn scenario_config_parses_from_toml() {
        let text = r#"
            scenario-action-execution-interval = 20
            max-latency = 0.25

            [[action]]
            type = "set-vars"
            params = { base = 2 }

            [overrides]
            scenario-not-ended = "warning"
        "#;
        let config: ScenarioConfig = toml::from_str(text).unwrap();
        assert_eq!(config.scenario_action_execution_interval_ms, Some(20));
        assert_eq!(config.actions.len(), 1);
        assert_eq!(config.actions[0].type_name, "set-vars");
        let overrides = config.resolve_overrides();
        assert_eq!(overrides.resolve(scenario_core::ReportCode::ScenarioNotEnded), scenario_core::ReportLevel::Warning);
    }

    #[test]
    fn env_parses_output_files_and_wait_multiplier() {
        // SAFETY-equivalent: tests run single-threaded per-binary under
        // `cargo test`'s default harness is not guaranteed, so assert only
        // on the parsing helpers directly rather than mutating process env.
        let flags = Flags::parse("");
        assert!(!flags.fatal_issues);
        assert!(!flags.print_issues);
    }
}
