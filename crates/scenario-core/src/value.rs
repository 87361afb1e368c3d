// crates/scenario-core/src/value.rs
// ============================================================================
// Module: Scenario Structure Value
// Description: Dynamically typed value stored in an action's `structure` map.
// Purpose: Represent the name-keyed, typed parameter mapping of a parsed
//          action record without requiring a compile-time type per
//          registered action kind (the registry is open: third parties
//          register new kinds at runtime, so no fixed enum of "action
//          parameter structs" can cover them all).
// Dependencies: serde, std::collections::BTreeMap
// ============================================================================

//! ## Overview
//!
//! `Value` covers every primitive a scenario file can express: numbers,
//! strings, booleans, nested structures (sub-action / caps literals) and
//! lists. [`Structure`] is the ordered name-keyed bag a parsed action record
//! (and its nested sub-action / caps literals) resolves to; field lookups
//! never drop unrecognized keys, which gives forward compatibility for free
//! instead of a per-kind residual `extra` map.

use std::collections::BTreeMap;
use std::fmt;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Value
// ============================================================================

/// A single field value inside a parsed structure.
///
/// # Invariants
/// - `Structure` values never alias; cloning a `Value` deep-copies nested
///   structures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// Boolean literal (`true`/`false`).
    Bool(bool),
    /// Integer literal, kept distinct from `Double` so that `repeat` and
    /// similar fields can reject non-integral expressions.
    Int(i64),
    /// Floating point literal.
    Double(f64),
    /// Quoted or unquoted string literal, post variable-substitution.
    String(String),
    /// Nested structure literal, e.g. a caps description or an inline
    /// sub-action.
    Structure(Structure),
    /// A composite list literal (`<a, b, c>` style structures).
    List(Vec<Value>),
}

impl Value {
    /// Returns the value as `f64` if it is numeric or a boolean.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(v) => Some(*v as f64),
            Self::Double(v) => Some(*v),
            Self::Bool(v) => Some(f64::from(*v)),
            Self::String(_) | Self::Structure(_) | Self::List(_) => None,
        }
    }

    /// Returns the value as an `i64` only when it is exactly integral.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            Self::Double(v) if (v - v.trunc()).abs() < f64::EPSILON => Some(*v as i64),
            Self::Bool(_) | Self::Double(_) | Self::String(_) | Self::Structure(_) | Self::List(_) => None,
        }
    }

    /// Returns the value as a borrowed string slice, if it is a string.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s.as_str()),
            Self::Bool(_) | Self::Int(_) | Self::Double(_) | Self::Structure(_) | Self::List(_) => None,
        }
    }

    /// Returns the value as a bool, if it is one.
    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            Self::Int(_) | Self::Double(_) | Self::String(_) | Self::Structure(_) | Self::List(_) => None,
        }
    }

    /// Returns the value as a nested structure, if it is one.
    #[must_use]
    pub const fn as_structure(&self) -> Option<&Structure> {
        match self {
            Self::Structure(s) => Some(s),
            Self::Bool(_) | Self::Int(_) | Self::Double(_) | Self::String(_) | Self::List(_) => None,
        }
    }

    /// Applies `f` to every string field, recursing into nested structures
    /// and lists. Used by variable substitution.
    pub fn map_strings(&mut self, f: &mut impl FnMut(&str) -> String) {
        match self {
            Self::String(s) => *s = f(s),
            Self::Structure(structure) => {
                for value in structure.fields.values_mut() {
                    value.map_strings(f);
                }
            }
            Self::List(items) => {
                for item in items {
                    item.map_strings(f);
                }
            }
            Self::Bool(_) | Self::Int(_) | Self::Double(_) => {}
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Double(v) => write!(f, "{v}"),
            Self::String(v) => write!(f, "{v}"),
            Self::Structure(s) => write!(f, "{}", s.name),
            Self::List(items) => {
                write!(f, "<")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, ">")
            }
        }
    }
}

// ============================================================================
// SECTION: Structure
// ============================================================================

/// A parsed name-keyed structure: `name, key1=value1, key2=value2;`.
///
/// # Invariants
/// - `fields` preserves no particular order requirement beyond lookup; a
///   `BTreeMap` is used for deterministic iteration in reports and tests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Structure {
    /// The structure's name (an action type name, or a structural keyword
    /// such as `description`/`include`).
    pub name: String,
    /// Name-keyed field values.
    pub fields: BTreeMap<String, Value>,
}

impl Structure {
    /// Creates an empty structure with the given name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), fields: BTreeMap::new() }
    }

    /// Returns a field value by name.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Returns a field's `f64` value, if present and numeric.
    #[must_use]
    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(Value::as_f64)
    }

    /// Returns a field's string value, if present and a string.
    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    /// Returns a field's bool value, if present and a bool.
    #[must_use]
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(Value::as_bool)
    }

    /// Inserts or overwrites a field.
    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.fields.insert(key.into(), value);
    }
}
