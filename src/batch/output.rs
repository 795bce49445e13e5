//! Reading generated query files back.
//!
//! Downstream runners split a file on the `-- QUERY: ` marker and classify
//! each statement by whether its body mentions `MATCH_RECOGNIZE`.

use serde::Serialize;

use crate::query::QueryType;

const MARKER: &str = "-- QUERY: ";

/// One statement from a generated file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatementEntry {
    pub number: usize,
    pub query_type: QueryType,
    /// The statement including its header.
    pub sql: String,
}

/// Split a generated file into statements.
pub fn parse_statements(text: &str) -> Vec<StatementEntry> {
    text.split(MARKER)
        .skip(1)
        .filter_map(|chunk| {
            let first_line = chunk.lines().next().unwrap_or_default();
            let number = match first_line.trim().parse() {
                Ok(number) => number,
                Err(_) => {
                    tracing::warn!("Skipping statement with bad number '{}'", first_line);
                    return None;
                }
            };
            let query_type = if chunk.contains("MATCH_RECOGNIZE") {
                QueryType::MatchRecognize
            } else {
                QueryType::Regex
            };
            Some(StatementEntry {
                number,
                query_type,
                sql: format!("{}{}", MARKER, chunk.trim_end()),
            })
        })
        .collect()
}
