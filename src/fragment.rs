//! CTE fragments and their validated chain.
//!
//! The regex emitter builds fragments as data (name, body, dependencies);
//! this module checks that every reference points backwards and renders the
//! chain as SQL.

use serde::Serialize;

use crate::error::{SigqlError, SigqlResult};

/// Name of the base CTE holding one serialized trace per case.
pub const RAW_TRACES: &str = "raw_traces";

/// A named CTE body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Fragment {
    pub name: String,
    pub body: String,
    pub depends_on: Vec<String>,
}

/// The final `SELECT COUNT(...)` of a chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Terminal {
    pub body: String,
    pub depends_on: Vec<String>,
}

/// Fragments in scan order followed by the terminal projection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FragmentChain {
    fragments: Vec<Fragment>,
    terminal: Terminal,
}

impl FragmentChain {
    /// Build a chain, rejecting duplicate names and forward or dangling
    /// references.
    pub fn new(fragments: Vec<Fragment>, terminal: Terminal) -> SigqlResult<Self> {
        let mut defined: Vec<&str> = vec![RAW_TRACES];

        for fragment in &fragments {
            if defined.contains(&fragment.name.as_str()) {
                return Err(SigqlError::Chain {
                    fragment: fragment.name.clone(),
                    missing: format!("unique name (duplicate '{}')", fragment.name),
                });
            }
            check_references(&fragment.name, &fragment.depends_on, &defined)?;
            defined.push(&fragment.name);
        }
        check_references("terminal", &terminal.depends_on, &defined)?;

        Ok(Self {
            fragments,
            terminal,
        })
    }

    pub fn fragments(&self) -> &[Fragment] {
        &self.fragments
    }

    pub fn terminal(&self) -> &Terminal {
        &self.terminal
    }

    /// Fragment names in order.
    pub fn names(&self) -> Vec<&str> {
        self.fragments.iter().map(|f| f.name.as_str()).collect()
    }

    /// SQL that follows the `raw_traces` CTE: `,\nname AS (...)` per
    /// fragment, then the terminal select.
    pub fn render(&self) -> String {
        let mut sql = String::new();
        for fragment in &self.fragments {
            sql.push_str(&format!(
                ",\n{} AS (\n{}\n)",
                fragment.name,
                indent(&fragment.body)
            ));
        }
        sql.push('\n');
        sql.push_str(&self.terminal.body);
        sql
    }
}

fn check_references(owner: &str, references: &[String], defined: &[&str]) -> SigqlResult<()> {
    match references.iter().find(|r| !defined.contains(&r.as_str())) {
        Some(missing) => Err(SigqlError::Chain {
            fragment: owner.to_string(),
            missing: missing.clone(),
        }),
        None => Ok(()),
    }
}

/// Indent every non-empty line by four spaces.
pub fn indent(text: &str) -> String {
    text.lines()
        .map(|line| {
            if line.is_empty() {
                String::new()
            } else {
                format!("    {}", line)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fragment(name: &str, depends_on: &[&str]) -> Fragment {
        Fragment {
            name: name.to_string(),
            body: format!("SELECT * FROM {}", depends_on.join(", ")),
            depends_on: depends_on.iter().map(|d| d.to_string()).collect(),
        }
    }

    fn terminal(depends_on: &[&str]) -> Terminal {
        Terminal {
            body: "SELECT 1".to_string(),
            depends_on: depends_on.iter().map(|d| d.to_string()).collect(),
        }
    }

    #[test]
    fn test_linear_chain() {
        let chain = FragmentChain::new(
            vec![
                fragment("initial_segment", &["raw_traces"]),
                fragment("sequences_of_interest", &["initial_segment"]),
            ],
            terminal(&["initial_segment", "sequences_of_interest"]),
        )
        .unwrap();
        assert_eq!(chain.names(), vec!["initial_segment", "sequences_of_interest"]);
        assert_eq!(
            chain.render(),
            ",\ninitial_segment AS (\n    SELECT * FROM raw_traces\n),\n\
             sequences_of_interest AS (\n    SELECT * FROM initial_segment\n)\n\
             SELECT 1"
        );
    }

    #[test]
    fn test_forward_reference_rejected() {
        let err = FragmentChain::new(
            vec![
                fragment("sequences_of_interest", &["initial_segment"]),
                fragment("initial_segment", &["raw_traces"]),
            ],
            terminal(&[]),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            SigqlError::Chain { ref fragment, ref missing }
                if fragment == "sequences_of_interest" && missing == "initial_segment"
        ));
    }

    #[test]
    fn test_terminal_reference_checked() {
        let err = FragmentChain::new(vec![], terminal(&["initial_segment"])).unwrap_err();
        assert!(matches!(err, SigqlError::Chain { .. }));
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let err = FragmentChain::new(
            vec![
                fragment("sequences_of_interest", &["raw_traces"]),
                fragment("sequences_of_interest", &["raw_traces"]),
            ],
            terminal(&[]),
        )
        .unwrap_err();
        assert!(matches!(err, SigqlError::Chain { .. }));
    }

    #[test]
    fn test_indent_skips_blank_lines() {
        assert_eq!(indent("a\n\n  b"), "    a\n\n      b");
    }
}
