// crates/scenario-core/src/vars.rs
// ============================================================================
// Module: Variable Store
// Description: Named scalar bindings used for expression evaluation and
//              string substitution.
// Purpose: Hold `position`/`duration` pseudo-variables plus user-defined
//          `set-vars` bindings, and substitute `$(name)` tokens in strings.
// Dependencies: scenario_expr, std::collections::BTreeMap
// ============================================================================

//! ## Overview
//!
//! The variable store backs both the expression evaluator's identifier
//! lookup (`scenario_expr::Lookup`) and literal `$(name)` substitution in
//! string fields. `position` and `duration` are recomputed once per
//! variable-substitution pass by the engine (see `scenario-engine`'s
//! dispatcher); every other binding comes from `set-vars` or is inherited
//! across ticks.
//!
//! A variable lookup never falls back to returning the identifier's own
//! name as a string literal for later re-parsing: numeric bindings always
//! substitute their numeric text, even when the field being substituted is
//! nominally a double-typed field.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use scenario_expr::Lookup;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised while substituting `$(name)` tokens into a string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubstitutionError {
    /// A `$(name)` token referenced a name with no binding.
    #[error("undefined variable '{name}' referenced in '{field}'")]
    UndefinedVariable {
        /// The referenced but unbound variable name.
        name: String,
        /// The original field text containing the reference.
        field: String,
    },
    /// A `$(` token was never closed.
    #[error("unterminated '$(' in '{field}'")]
    Unterminated {
        /// The original field text containing the reference.
        field: String,
    },
}

// ============================================================================
// SECTION: Variable Store
// ============================================================================

/// A scalar binding: either a string or a number.
#[derive(Debug, Clone, PartialEq)]
pub enum VarValue {
    /// A textual binding.
    String(String),
    /// A numeric binding.
    Number(f64),
}

impl VarValue {
    /// Renders the binding as it would appear substituted into a string.
    #[must_use]
    pub fn as_text(&self) -> String {
        match self {
            Self::String(s) => s.clone(),
            Self::Number(n) => {
                let mut out = String::new();
                // `{n}` already drops a trailing `.0` for integral f64s via
                // Display, matching how a loaded numeric literal would read.
                let _ = write!(out, "{n}");
                out
            }
        }
    }

    /// Returns the binding as `f64`, if numeric.
    #[must_use]
    pub const fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::String(_) => None,
        }
    }
}

/// Named scalar bindings updated per tick and substituted into string
/// fields.
///
/// # Invariants
/// - `position` and `duration` are recomputed at the start of every
///   variable-substitution pass; undefined maps to `+inf`.
#[derive(Debug, Clone, Default)]
pub struct VariableStore {
    bindings: BTreeMap<String, VarValue>,
}

/// Pseudo-variable name for the current stream position, in seconds.
pub const POSITION: &str = "position";
/// Pseudo-variable name for the stream duration, in seconds.
pub const DURATION: &str = "duration";

impl VariableStore {
    /// Creates an empty store; `position`/`duration` read as `+inf` until
    /// [`VariableStore::refresh_position_duration`] is called.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Recomputes the `position`/`duration` pseudo-variables. Call this once
    /// at the start of each variable-substitution pass.
    pub fn refresh_position_duration(&mut self, position_secs: Option<f64>, duration_secs: Option<f64>) {
        self.bindings.insert(
            POSITION.to_string(),
            VarValue::Number(position_secs.unwrap_or(f64::INFINITY)),
        );
        self.bindings.insert(
            DURATION.to_string(),
            VarValue::Number(duration_secs.unwrap_or(f64::INFINITY)),
        );
    }

    /// Binds a user-defined variable (from `set-vars`).
    pub fn set(&mut self, name: impl Into<String>, value: VarValue) {
        self.bindings.insert(name.into(), value);
    }

    /// Returns the raw binding for `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&VarValue> {
        self.bindings.get(name)
    }

    /// Substitutes every `$(name)` occurrence in `field` with its current
    /// binding.
    ///
    /// # Errors
    ///
    /// Returns [`SubstitutionError::UndefinedVariable`] if a referenced name
    /// has no binding, or [`SubstitutionError::Unterminated`] if a `$(` is
    /// never closed. Both are fatal.
    pub fn substitute(&self, field: &str) -> Result<String, SubstitutionError> {
        let mut out = String::with_capacity(field.len());
        let bytes = field.as_bytes();
        let mut i = 0;
        while i < bytes.len() {
            if bytes[i] == b'$' && bytes.get(i + 1) == Some(&b'(') {
                let start = i + 2;
                let Some(rel_end) = field[start..].find(')') else {
                    return Err(SubstitutionError::Unterminated { field: field.to_string() });
                };
                let name = &field[start..start + rel_end];
                let value = self
                    .bindings
                    .get(name)
                    .ok_or_else(|| SubstitutionError::UndefinedVariable {
                        name: name.to_string(),
                        field: field.to_string(),
                    })?;
                out.push_str(&value.as_text());
                i = start + rel_end + 1;
            } else {
                // Safe: `field` is valid UTF-8 and we always advance to a
                // preceding char boundary (ASCII `$`/`(` or a full char).
                let ch = field[i..].chars().next().unwrap_or('\u{0}');
                out.push(ch);
                i += ch.len_utf8();
            }
        }
        Ok(out)
    }
}

impl Lookup for VariableStore {
    fn lookup(&self, name: &str) -> Option<f64> {
        self.bindings.get(name).and_then(VarValue::as_number)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, reason = "test assertions may panic directly")]
    use super::*;

    #[test]
    fn substitutes_known_variables() {
        let mut store = VariableStore::new();
        store.set("base", VarValue::Number(2.0));
        assert_eq!(store.substitute("value=$(base)").unwrap(), "value=2");
    }

    #[test]
    fn numeric_binding_never_falls_back_to_identifier_text() {
        // Substituting a double-typed field must yield the numeric
        // literal, not the bare variable name.
        let mut store = VariableStore::new();
        store.set("duration", VarValue::Number(12.5));
        assert_eq!(store.substitute("$(duration)").unwrap(), "12.5");
    }

    #[test]
    fn undefined_variable_is_an_error() {
        let store = VariableStore::new();
        assert!(matches!(
            store.substitute("$(missing)"),
            Err(SubstitutionError::UndefinedVariable { .. })
        ));
    }

    #[test]
    fn unterminated_token_is_an_error() {
        let store = VariableStore::new();
        assert!(matches!(store.substitute("$(oops"), Err(SubstitutionError::Unterminated { .. })));
    }

    #[test]
    fn idempotent_on_strings_without_tokens() {
        let store = VariableStore::new();
        let text = "no substitution here";
        assert_eq!(store.substitute(text).unwrap(), text);
    }

    #[test]
    fn position_duration_default_to_infinity() {
        let store = VariableStore::new();
        assert_eq!(store.lookup(POSITION), None);
        let mut store = VariableStore::new();
        store.refresh_position_duration(None, None);
        assert_eq!(store.lookup(POSITION), Some(f64::INFINITY));
        assert_eq!(store.lookup(DURATION), Some(f64::INFINITY));
    }
}
