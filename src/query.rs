//! Query assembler.
//!
//! Wraps a native pattern or a fragment chain into a complete statement with
//! the `-- QUERY:` / `-- TYPE:` header the benchmark runner splits on.

use std::fmt;

use serde::Serialize;

use crate::config::TraceColumns;
use crate::fragment::{FragmentChain, RAW_TRACES, indent};
use crate::match_recognize::NativePattern;

/// Trait for rendering a statement as SQL.
pub trait ToSql {
    /// Convert this statement to a SQL string.
    fn to_sql(&self) -> String;
}

/// Statement tag written to the `-- TYPE:` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum QueryType {
    #[serde(rename = "MATCH_RECOGNIZE")]
    MatchRecognize,
    #[serde(rename = "regex")]
    Regex,
}

impl fmt::Display for QueryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryType::MatchRecognize => write!(f, "MATCH_RECOGNIZE"),
            QueryType::Regex => write!(f, "regex"),
        }
    }
}

/// Quote a string as a SQL literal.
pub fn sql_string(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

fn header(number: usize, query_type: QueryType, notes: &[String]) -> String {
    let mut sql = format!("-- QUERY: {}\n-- TYPE: {}\n", number, query_type);
    for note in notes {
        sql.push_str(&format!("-- UNRECOGNIZED: {}\n", note));
    }
    sql
}

/// A `MATCH_RECOGNIZE` statement counting matching cases.
#[derive(Debug, Clone)]
pub struct MatchRecognizeQuery {
    pub number: usize,
    pub table: String,
    pub columns: TraceColumns,
    pub pattern: NativePattern,
    /// Skipped input, written as comments.
    pub notes: Vec<String>,
}

impl ToSql for MatchRecognizeQuery {
    fn to_sql(&self) -> String {
        let mut sql = header(self.number, QueryType::MatchRecognize, &self.notes);
        sql.push_str(&format!("SELECT COUNT({})\n", self.columns.case_id));
        sql.push_str(&format!("FROM {}\n", self.table));
        sql.push_str("MATCH_RECOGNIZE (\n");
        sql.push_str(&format!("    PARTITION BY {}\n", self.columns.case_id));
        sql.push_str(&format!("    ORDER BY {}\n", self.columns.position));
        sql.push_str("    ONE ROW PER MATCH\n");
        sql.push_str(&format!("    PATTERN {}\n", self.pattern.pattern_clause()));
        sql.push_str(&format!(
            "    DEFINE {}\n",
            self.pattern.define_clause(&self.columns.activity)
        ));
        sql.push(')');
        sql
    }
}

/// A CTE-chain statement over serialized traces.
#[derive(Debug, Clone)]
pub struct RegexQuery {
    pub number: usize,
    pub table: String,
    pub columns: TraceColumns,
    pub chain: FragmentChain,
    pub notes: Vec<String>,
}

impl RegexQuery {
    /// The base CTE: one `<a><b><c>` string per case.
    fn raw_traces(&self) -> String {
        let c = &self.columns;
        let body = format!(
            "SELECT\n    {case} AS case_id,\n    \
             ARRAY_JOIN(ARRAY_AGG('<' || {activity} || '>' ORDER BY {position}), '') AS full_trace\n\
             FROM {table}\n\
             GROUP BY {case}",
            case = c.case_id,
            activity = c.activity,
            position = c.position,
            table = self.table,
        );
        format!("{} AS (\n{}\n)", RAW_TRACES, indent(&body))
    }
}

impl ToSql for RegexQuery {
    fn to_sql(&self) -> String {
        let mut sql = header(self.number, QueryType::Regex, &self.notes);
        sql.push_str("WITH ");
        sql.push_str(&self.raw_traces());
        sql.push_str(&self.chain.render());
        sql
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::translator::Translator;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_sql_string_escapes_quotes() {
        assert_eq!(sql_string("O'Brien"), "'O''Brien'");
    }

    #[test]
    fn test_match_recognize_statement() {
        let translation = Translator::default().translate("^ NOT ( 'a' ) ANY* $").unwrap();
        let pair = translation.queries(4, "postgresql.public.model0_m_10", &TraceColumns::default());
        assert_eq!(
            pair.match_recognize.to_sql(),
            "-- QUERY: 4\n\
             -- TYPE: MATCH_RECOGNIZE\n\
             SELECT COUNT(case_id)\n\
             FROM postgresql.public.model0_m_10\n\
             MATCH_RECOGNIZE (\n    \
             PARTITION BY case_id\n    \
             ORDER BY position\n    \
             ONE ROW PER MATCH\n    \
             PATTERN (^A ANY*$)\n    \
             DEFINE A AS activity != 'a'\n\
             )"
        );
    }

    #[test]
    fn test_regex_statement_starts_with_raw_traces() {
        let translation = Translator::default().translate("( 'a' ~> 'b' )*").unwrap();
        let pair = translation.queries(0, "events", &TraceColumns::default());
        let sql = pair.regex.to_sql();
        assert!(sql.starts_with(
            "-- QUERY: 0\n\
             -- TYPE: regex\n\
             WITH raw_traces AS (\n    \
             SELECT\n        \
             case_id AS case_id,\n        \
             ARRAY_JOIN(ARRAY_AGG('<' || activity || '>' ORDER BY position), '') AS full_trace\n    \
             FROM events\n    \
             GROUP BY case_id\n\
             ),\n\
             sequences_of_interest AS ("
        ));
        assert!(sql.ends_with("LEFT OUTER JOIN sequences_of_interest soi ON soi.case_id = b.case_id"));
    }

    #[test]
    fn test_custom_columns() {
        let columns = TraceColumns {
            case_id: "trace".to_string(),
            activity: "event_name".to_string(),
            position: "ts".to_string(),
        };
        let translation = Translator::default().translate("'a'").unwrap();
        let sql = translation.queries(1, "t", &columns).match_recognize.to_sql();
        assert!(sql.contains("SELECT COUNT(trace)"));
        assert!(sql.contains("PARTITION BY trace\n    ORDER BY ts"));
        assert!(sql.contains("DEFINE A AS event_name = 'a'"));
    }

    #[test]
    fn test_notes_become_comments() {
        let translation = Translator::default().translate("'a' ?").unwrap();
        let sql = translation
            .queries(2, "t", &TraceColumns::default())
            .match_recognize
            .to_sql();
        assert!(sql.starts_with(
            "-- QUERY: 2\n-- TYPE: MATCH_RECOGNIZE\n-- UNRECOGNIZED: input '?' at position 4\n"
        ));
    }
}
