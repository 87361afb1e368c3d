// crates/scenario-loader/src/description.rs
// ============================================================================
// Module: Scenario Description
// Description: Parsed `description` structure fields.
// Purpose: Carry the scenario-level metadata the loader reads out of the
//          one `description` record a (non-included) scenario file may
//          have, for both loading and `list_scenarios` use.
// Dependencies: scenario_core::Structure
// ============================================================================

use scenario_core::Structure;

/// Parsed fields of a scenario file's `description` structure.
///
/// # Invariants
/// - A scenario reached via `include` never contributes its own
///   description; it is ignored.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct ScenarioDescription {
    /// Whether this scenario is config-only (composes rather than runs
    /// alone).
    pub is_config: bool,
    /// Pipeline states this scenario is prepared to react to.
    pub handles_states: Option<String>,
    /// Expected pipeline name, for diagnostics.
    pub pipeline_name: Option<String>,
    /// Ceiling for observed latency, in seconds.
    pub max_latency: Option<f64>,
    /// Ceiling for QoS-reported dropped buffers.
    pub max_dropped: Option<u64>,
    /// Whether the scenario issues seeks.
    pub seek: bool,
    /// Whether the scenario exercises reverse playback.
    pub reverse_playback: bool,
    /// Whether the scenario requires a clock-synced pipeline. Also derived
    /// (OR'd) from any loaded action type flagged `NEEDS_CLOCK`.
    pub need_clock_sync: bool,
    /// Minimum media duration the scenario requires, in seconds.
    pub min_media_duration: Option<f64>,
    /// Minimum number of audio tracks required.
    pub min_audio_track: Option<u64>,
    /// Minimum number of video tracks required.
    pub min_video_track: Option<u64>,
    /// Scenario's own declared duration, in seconds.
    pub duration: Option<f64>,
    /// Human-readable summary.
    pub summary: Option<String>,
}

impl ScenarioDescription {
    /// Parses a `description` structure's fields.
    #[must_use]
    pub fn from_structure(structure: &Structure) -> Self {
        Self {
            is_config: structure.get_bool("is-config").unwrap_or(false),
            handles_states: structure.get_str("handles-states").map(str::to_string),
            pipeline_name: structure.get_str("pipeline-name").map(str::to_string),
            max_latency: structure.get_f64("max-latency"),
            max_dropped: structure.get_f64("max-dropped").map(|v| v.max(0.0) as u64),
            seek: structure.get_bool("seek").unwrap_or(false),
            reverse_playback: structure.get_bool("reverse-playback").unwrap_or(false),
            need_clock_sync: structure.get_bool("need-clock-sync").unwrap_or(false),
            min_media_duration: structure.get_f64("min-media-duration"),
            min_audio_track: structure.get_f64("min-audio-track").map(|v| v.max(0.0) as u64),
            min_video_track: structure.get_f64("min-video-track").map(|v| v.max(0.0) as u64),
            duration: structure.get_f64("duration"),
            summary: structure.get_str("summary").map(str::to_string),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_known_fields() {
        let mut s = Structure::new("description");
        s.set("is-config", scenario_core::Value::Bool(true));
        s.set("max-latency", scenario_core::Value::Double(0.5));
        s.set("summary", scenario_core::Value::String("hi".to_string()));
        let desc = ScenarioDescription::from_structure(&s);
        assert!(desc.is_config);
        assert_eq!(desc.max_latency, Some(0.5));
        assert_eq!(desc.summary.as_deref(), Some("hi"));
    }

    #[test]
    fn defaults_when_fields_absent() {
        let s = Structure::new("description");
        let desc = ScenarioDescription::from_structure(&s);
        assert!(!desc.is_config);
        assert_eq!(desc.max_latency, None);
    }
}
