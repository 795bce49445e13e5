//! # sigql: signal patterns to SQL
//!
//! sigql translates sequence patterns over event-log traces into two
//! independently executable SQL forms: a native `MATCH_RECOGNIZE` clause and
//! a chain of CTEs built on regular-expression string functions.
//!
//! ## Quick Example
//!
//! ```rust,ignore
//! use sigql::prelude::*;
//!
//! let translation = sigql::translate("^ NOT( 'a' )* ( 'a' ~> 'b' )* NOT( 'a' )* $")?;
//! let pair = translation.queries(0, "events", &TraceColumns::default());
//! println!("{}", pair.match_recognize.to_sql());
//! println!("{}", pair.regex.to_sql());
//! ```
//!
//! ## Pattern Language
//!
//! | Form        | Meaning                                 |
//! |-------------|-----------------------------------------|
//! | `'a'`       | One event with activity `a`             |
//! | `NOT('a')`  | One event with any other activity       |
//! | `ANY`       | One event with any activity             |
//! | `~>`        | Zero or more events in between          |
//! | `( ... )*`  | Grouping and repetition                 |
//! | `^` `$`     | Start and end of the trace              |
//!
//! Alternatives inside a group are separated by a vertical bar.

pub mod alias;
pub mod batch;
pub mod catalog;
pub mod chain;
pub mod config;
pub mod error;
pub mod fragment;
pub mod lexer;
pub mod match_recognize;
pub mod query;
pub mod signal;
pub mod translator;

pub mod prelude {
    pub use crate::catalog::{Catalog, Shape};
    pub use crate::config::{Config, Leniency, TraceColumns};
    pub use crate::error::*;
    pub use crate::fragment::FragmentChain;
    pub use crate::lexer::{Token, TokenKind, tokenize};
    pub use crate::match_recognize::NativePattern;
    pub use crate::query::{MatchRecognizeQuery, QueryType, RegexQuery, ToSql};
    pub use crate::signal::SignalQuery;
    pub use crate::translator::{Diagnostic, QueryPair, Translation, Translator};
}

/// Translate a pattern with the default (lenient) settings.
///
/// # Example
///
/// ```
/// let translation = sigql::translate("( 'a' ~> 'b' )*").unwrap();
/// assert_eq!(translation.native.pattern_clause(), "(^ANY* (A (ANY)* B)* ANY*$)");
/// ```
pub fn translate(pattern: &str) -> Result<translator::Translation, error::SigqlError> {
    translator::Translator::default().translate(pattern)
}
