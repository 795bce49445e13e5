//! Error types for sigql.

use thiserror::Error;

/// The main error type for sigql operations.
#[derive(Debug, Error)]
pub enum SigqlError {
    /// Input that matches no lexical form.
    #[error("Unrecognized input at position {position}: '{text}'")]
    Lex { position: usize, text: String },

    /// A token window that matches no shape in the catalog.
    #[error("Unrecognized pattern shape at position {position}: '{text}'")]
    UnknownShape { position: usize, text: String },

    /// A group opened but never closed.
    #[error("Unterminated {construct} starting at position {position}")]
    Unterminated {
        construct: &'static str,
        position: usize,
    },

    /// Malformed grouping or negation.
    #[error("Structural error at position {position}: {message}")]
    Structure { position: usize, message: String },

    /// More symbols than single-letter aliases.
    #[error("Alias range exhausted: a pattern may bind at most {limit} symbols")]
    AliasExhausted { limit: usize },

    /// A fragment references a CTE that is not defined before it.
    #[error("Fragment '{fragment}' references undefined CTE '{missing}'")]
    Chain { fragment: String, missing: String },

    /// A failure while translating one query of a batch.
    #[error("Query {query} ('{pattern}'): {source}")]
    Translation {
        query: usize,
        pattern: String,
        #[source]
        source: Box<SigqlError>,
    },

    /// Signal query text with neither a pattern nor an activity.
    #[error("Invalid signal query: {0}")]
    Signal(String),

    /// Malformed CSV input.
    #[error("CSV error on line {line}: {message}")]
    Csv { line: usize, message: String },

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SigqlError {
    /// Create a structural error at the given position.
    pub fn structure(position: usize, message: impl Into<String>) -> Self {
        Self::Structure {
            position,
            message: message.into(),
        }
    }

    /// Attach the query index and source pattern to a translation failure.
    pub fn in_query(self, query: usize, pattern: impl Into<String>) -> Self {
        Self::Translation {
            query,
            pattern: pattern.into(),
            source: Box::new(self),
        }
    }

    /// Whether leniency may downgrade this error to a diagnostic.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Lex { .. } | Self::UnknownShape { .. })
    }
}

/// Result type alias for sigql operations.
pub type SigqlResult<T> = Result<T, SigqlError>;
