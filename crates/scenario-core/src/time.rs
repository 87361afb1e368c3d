// crates/scenario-core/src/time.rs
// ============================================================================
// Module: Clock Time
// Description: Stream-time helpers shared by the loader and the engine.
// Purpose: Convert between the scenario file's human-readable duration
//          syntax and the `f64`-seconds representation used everywhere else
//          in this crate.
// Dependencies: std::fmt, std::time::Duration
// ============================================================================

//! ## Overview
//!
//! gst-validate scenario files write positions as clock-time strings
//! (`0:00:01.500000000`) as well as bare seconds (`1.5`). This module keeps
//! that parsing in one place rather than scattering it across the loader
//! and the `seek`/`wait` handlers.

use std::fmt;
use std::time::Duration;

/// A stream position or duration, always normalized to seconds.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct ClockTime(pub f64);

impl ClockTime {
    /// Zero.
    pub const ZERO: Self = Self(0.0);

    /// Builds a `ClockTime` from a plain seconds value.
    #[must_use]
    pub const fn from_secs(secs: f64) -> Self {
        Self(secs)
    }

    /// Parses either a bare seconds literal (`1.5`) or an
    /// `h:mm:ss.nanoseconds` clock-time literal (`0:00:01.500000000`).
    ///
    /// # Errors
    ///
    /// Returns [`ClockTimeParseError`] if `text` matches neither form.
    pub fn parse(text: &str) -> Result<Self, ClockTimeParseError> {
        if let Ok(secs) = text.parse::<f64>() {
            return Ok(Self(secs));
        }
        let parts: Vec<&str> = text.split(':').collect();
        if parts.len() != 3 {
            return Err(ClockTimeParseError { text: text.to_string() });
        }
        let hours: f64 = parts[0].parse().map_err(|_| ClockTimeParseError { text: text.to_string() })?;
        let minutes: f64 = parts[1].parse().map_err(|_| ClockTimeParseError { text: text.to_string() })?;
        let seconds: f64 = parts[2].parse().map_err(|_| ClockTimeParseError { text: text.to_string() })?;
        Ok(Self(hours * 3600.0 + minutes * 60.0 + seconds))
    }

    /// Converts to a [`Duration`], clamping negative values to zero.
    #[must_use]
    pub fn to_duration(self) -> Duration {
        Duration::from_secs_f64(self.0.max(0.0))
    }
}

impl fmt::Display for ClockTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// `text` was not a valid clock-time literal.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid clock time '{text}'")]
pub struct ClockTimeParseError {
    text: String,
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, reason = "test assertions may panic directly")]
    use super::*;

    #[test]
    fn parses_bare_seconds() {
        assert_eq!(ClockTime::parse("1.5").unwrap().0, 1.5);
    }

    #[test]
    fn parses_clock_time_literal() {
        let parsed = ClockTime::parse("0:01:01.500000000").unwrap();
        assert!((parsed.0 - 61.5).abs() < 1e-9);
    }

    #[test]
    fn rejects_garbage() {
        assert!(ClockTime::parse("not-a-time").is_err());
    }
}
