// crates/scenario-loader/src/parser.rs
// ============================================================================
// Module: Scenario Structure Parser
// Description: Parses one logical record (from `tokenizer::split_records`)
//              into a `scenario_core::Structure`.
// Purpose: Turn `name, key1=value1, key2=value2` text into the dynamically
//          typed value model the rest of the workspace operates on.
// Dependencies: scenario_core::Structure, scenario_core::Value
// ============================================================================

//! ## Overview
//!
//! Field values accept: quoted strings (`"..."`, with `\"` and `\\`
//! escapes), composite list literals (`<a, b, c>`), booleans, integers,
//! doubles, and bare identifiers (read as strings). A `sub-action` field is
//! deliberately left as a plain string when quoted — the action that
//! executes it resolves that string back into a `Structure` itself, so the
//! loader does not need a fully recursive structure grammar here.

use scenario_core::Structure;
use scenario_core::Value;

/// A record failed to parse as a structure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed structure record '{record}': {reason}")]
pub struct StructureParseError {
    record: String,
    reason: String,
}

/// Parses one logical record into a [`Structure`].
///
/// # Errors
///
/// Returns [`StructureParseError`] if the record has no name, a field has
/// no `=`, or a value is malformed (unterminated quote or list).
pub fn parse_structure(record: &str) -> Result<Structure, StructureParseError> {
    let err = |reason: &str| StructureParseError { record: record.to_string(), reason: reason.to_string() };

    let fields_text = split_top_level(record, ',');
    let mut iter = fields_text.into_iter();
    let name = iter.next().map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).ok_or_else(|| err("missing structure name"))?;

    let mut structure = Structure::new(name);
    for field in iter {
        let field = field.trim();
        if field.is_empty() {
            continue;
        }
        let Some((key, value_text)) = field.split_once('=') else {
            return Err(err(&format!("field '{field}' has no '='")));
        };
        let key = key.trim();
        if key.is_empty() {
            return Err(err("empty field name"));
        }
        let value = parse_value(value_text.trim()).map_err(|reason| err(&reason))?;
        structure.set(key, value);
    }
    Ok(structure)
}

/// Splits `text` on top-level occurrences of `sep`, respecting quotes and
/// `<...>` nesting so commas inside a list or string are not treated as
/// field separators.
fn split_top_level(text: &str, sep: char) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut depth = 0i32;
    for ch in text.chars() {
        match ch {
            '"' => {
                in_quotes = !in_quotes;
                current.push(ch);
            }
            '<' if !in_quotes => {
                depth += 1;
                current.push(ch);
            }
            '>' if !in_quotes => {
                depth -= 1;
                current.push(ch);
            }
            c if c == sep && !in_quotes && depth == 0 => {
                parts.push(current.clone());
                current.clear();
            }
            _ => current.push(ch),
        }
    }
    parts.push(current);
    parts
}

/// Parses a single field's value text.
fn parse_value(text: &str) -> Result<Value, String> {
    if let Some(stripped) = text.strip_prefix('"') {
        let Some(inner) = stripped.strip_suffix('"') else {
            return Err(format!("unterminated quoted value '{text}'"));
        };
        return Ok(Value::String(unescape(inner)));
    }
    if let Some(stripped) = text.strip_prefix('<') {
        let Some(inner) = stripped.strip_suffix('>') else {
            return Err(format!("unterminated list value '{text}'"));
        };
        let items = split_top_level(inner, ',')
            .into_iter()
            .map(|item| parse_value(item.trim()))
            .collect::<Result<Vec<_>, _>>()?;
        return Ok(Value::List(items));
    }
    match text {
        "true" => return Ok(Value::Bool(true)),
        "false" => return Ok(Value::Bool(false)),
        _ => {}
    }
    if let Ok(int) = text.parse::<i64>() {
        return Ok(Value::Int(int));
    }
    if let Ok(double) = text.parse::<f64>() {
        return Ok(Value::Double(double));
    }
    Ok(Value::String(text.to_string()))
}

/// Resolves `\"` and `\\` escapes inside a quoted string's interior.
fn unescape(inner: &str) -> String {
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(ch) = chars.next() {
        if ch == '\\' {
            match chars.next() {
                Some('"') => out.push('"'),
                Some('\\') => out.push('\\'),
                Some(other) => {
                    out.push('\\');
                    out.push(other);
                }
                None => out.push('\\'),
            }
        } else {
            out.push(ch);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, reason = "test assertions may panic directly")]
    use super::*;

    #[test]
    fn parses_name_and_scalar_fields() {
        let s = parse_structure(r#"seek, start=1.5, flush=true, playback-time=3"#).unwrap();
        assert_eq!(s.name, "seek");
        assert_eq!(s.get_f64("start"), Some(1.5));
        assert_eq!(s.get_bool("flush"), Some(true));
        assert_eq!(s.get_f64("playback-time"), Some(3.0));
    }

    #[test]
    fn parses_quoted_string_with_escapes() {
        let s = parse_structure(r#"description, summary="has a \"quote\" in it""#).unwrap();
        assert_eq!(s.get_str("summary"), Some("has a \"quote\" in it"));
    }

    #[test]
    fn parses_list_literal() {
        let s = parse_structure("wait, signals=<a, b, c>").unwrap();
        let Some(Value::List(items)) = s.get("signals").cloned() else {
            panic!("expected list");
        };
        assert_eq!(items.len(), 3);
    }

    #[test]
    fn comma_inside_quotes_is_not_a_field_separator() {
        let s = parse_structure(r#"description, summary="has, a comma""#).unwrap();
        assert_eq!(s.get_str("summary"), Some("has, a comma"));
    }

    #[test]
    fn rejects_field_without_equals() {
        assert!(parse_structure("seek, oops").is_err());
    }

    #[test]
    fn rejects_empty_record() {
        assert!(parse_structure("").is_err());
    }
}
