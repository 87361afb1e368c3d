// crates/scenario-loader/src/tokenizer.rs
// ============================================================================
// Module: Scenario File Tokenizer
// Description: Splits raw scenario-file text into semicolon-terminated
//              structure records.
// Purpose: Strip comments and join backslash-continued lines before the
//          structure parser ever sees a record, so the parser itself only
//          has to deal with one logical line per structure.
// Dependencies: none
// ============================================================================

//! ## Overview
//!
//! A scenario file is line-oriented at the text level (comments and line
//! continuations are resolved per physical line) but record-oriented at
//! the structure level (one record may itself span several physical
//! lines). This module produces the intermediate representation: a
//! `Vec<String>`, one joined-and-comment-stripped logical record per
//! entry, split on top-level `;` (not inside a quoted string).

/// Splits scenario-file `text` into logical, semicolon-terminated records
/// with comments stripped and backslash continuations joined.
#[must_use]
pub fn split_records(text: &str) -> Vec<String> {
    let joined = join_continuations(text);
    let mut records = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = joined.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '"' => {
                in_quotes = !in_quotes;
                current.push(ch);
            }
            ';' if !in_quotes => {
                let trimmed = current.trim();
                if !trimmed.is_empty() {
                    records.push(trimmed.to_string());
                }
                current.clear();
            }
            _ => current.push(ch),
        }
    }
    let trailing = current.trim();
    if !trailing.is_empty() {
        records.push(trailing.to_string());
    }
    records
}

/// Strips `#`-to-end-of-line comments from each physical line, then joins
/// lines ending in a trailing backslash with the next line.
fn join_continuations(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_continuation = false;
    for line in text.lines() {
        let stripped = strip_comment(line);
        let trimmed_end = stripped.trim_end();
        let continues = trimmed_end.ends_with('\\');
        let body = if continues { &trimmed_end[..trimmed_end.len() - 1] } else { trimmed_end };
        if pending_continuation {
            out.push(' ');
        } else if !out.is_empty() {
            out.push('\n');
        }
        out.push_str(body.trim_start());
        pending_continuation = continues;
    }
    out
}

/// Removes a `#`-started comment from `line`, respecting quoted strings so
/// a `#` inside a string literal is not treated as a comment marker.
fn strip_comment(line: &str) -> &str {
    let mut in_quotes = false;
    for (idx, ch) in line.char_indices() {
        match ch {
            '"' => in_quotes = !in_quotes,
            '#' if !in_quotes => return &line[..idx],
            _ => {}
        }
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_multiple_records_on_one_line() {
        let records = split_records("a, x=1; b, y=2;");
        assert_eq!(records, vec!["a, x=1", "b, y=2"]);
    }

    #[test]
    fn strips_comments() {
        let records = split_records("a, x=1; # trailing note\nb, y=2;");
        assert_eq!(records, vec!["a, x=1", "b, y=2"]);
    }

    #[test]
    fn joins_backslash_continuations() {
        let records = split_records("a, x=1, \\\n    y=2;");
        assert_eq!(records, vec!["a, x=1, y=2"]);
    }

    #[test]
    fn keeps_hash_inside_quoted_string() {
        let records = split_records(r#"a, name="not # a comment";"#);
        assert_eq!(records, vec![r#"a, name="not # a comment""#]);
    }

    #[test]
    fn ignores_blank_input() {
        assert!(split_records("   \n\n  ").is_empty());
    }
}
