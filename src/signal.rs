//! Signal query extraction.
//!
//! A signal query either carries a `MATCHES` clause, whose pattern is
//! translated, or just names an activity, which becomes an occurrence count.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::error::{SigqlError, SigqlResult};

static MATCHES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?ms)^\s*MATCHES\b\s*(.*)").expect("MATCHES regex must compile"));

static ACTIVITY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"'([^']*)'").expect("activity regex must compile"));

/// What a signal query asks for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum SignalQuery {
    /// A sequence pattern from a `MATCHES` clause.
    Pattern(String),
    /// Cases containing the activity at least once.
    Occurrence(String),
}

impl SignalQuery {
    pub fn parse(text: &str) -> SigqlResult<Self> {
        if let Some(captures) = MATCHES.captures(text) {
            let pattern = strip_outer_group(captures[1].trim());
            return Ok(SignalQuery::Pattern(pattern.to_string()));
        }

        match ACTIVITY.captures(text) {
            Some(captures) => Ok(SignalQuery::Occurrence(captures[1].to_string())),
            None => Err(SigqlError::Signal(format!(
                "no MATCHES clause or quoted activity in '{}'",
                text.trim()
            ))),
        }
    }

    /// Text handed to the translator, for logs and errors.
    pub fn source(&self) -> String {
        match self {
            SignalQuery::Pattern(pattern) => pattern.clone(),
            SignalQuery::Occurrence(activity) => format!("'{}'", activity),
        }
    }
}

/// Remove one pair of parentheses enclosing the whole text.
fn strip_outer_group(text: &str) -> &str {
    if !text.starts_with('(') || !text.ends_with(')') {
        return text;
    }

    let mut depth = 0usize;
    let mut quoted = false;
    for (i, ch) in text.char_indices() {
        match ch {
            '\'' => quoted = !quoted,
            '(' if !quoted => depth += 1,
            ')' if !quoted => {
                depth = depth.saturating_sub(1);
                // The first group closes before the end: not an outer group
                if depth == 0 && i + 1 < text.len() {
                    return text;
                }
            }
            _ => {}
        }
    }

    text[1..text.len() - 1].trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matches_clause() {
        let query = SignalQuery::parse(
            "SELECT COUNT(CASE_ID) FROM THIS_PROCESS\nWHERE EVENT_NAME\nMATCHES (^ NOT( 'a' )* ('a' ~> 'b')* $)",
        )
        .unwrap();
        assert_eq!(
            query,
            SignalQuery::Pattern("^ NOT( 'a' )* ('a' ~> 'b')* $".to_string())
        );
    }

    #[test]
    fn test_inner_groups_are_kept() {
        let query = SignalQuery::parse("MATCHES ( 'a' ~> 'b' )* ( 'c' ~> 'd' )*").unwrap();
        assert_eq!(
            query.source(),
            "( 'a' ~> 'b' )* ( 'c' ~> 'd' )*"
        );
    }

    #[test]
    fn test_parenthesis_inside_activity() {
        let query = SignalQuery::parse("MATCHES ('a)' ~> 'b')").unwrap();
        assert_eq!(query, SignalQuery::Pattern("'a)' ~> 'b'".to_string()));
    }

    #[test]
    fn test_occurrence() {
        let query = SignalQuery::parse(
            "SELECT COUNT(CASE_ID) FROM THIS_PROCESS WHERE EVENT_NAME = 'Clear Invoice'",
        )
        .unwrap();
        assert_eq!(query, SignalQuery::Occurrence("Clear Invoice".to_string()));
        assert_eq!(query.source(), "'Clear Invoice'");
    }

    #[test]
    fn test_nothing_to_translate() {
        let err = SignalQuery::parse("SELECT COUNT(*) FROM THIS_PROCESS").unwrap_err();
        assert!(matches!(err, SigqlError::Signal(_)));
    }
}
