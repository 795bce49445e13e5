//! Native pattern emitter.
//!
//! Turns the token stream into a `MATCH_RECOGNIZE` pattern and its `DEFINE`
//! list. Every production is a pure step from a cursor to the next cursor
//! and the pattern part it contributes.

use std::fmt;

use serde::Serialize;

use crate::alias::{Alias, AliasAllocator};
use crate::error::SigqlResult;
use crate::lexer::{self, Token, TokenKind};
use crate::query::sql_string;
use crate::translator::TranslationContext;

/// One element of the emitted pattern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternPart {
    StartAnchor,
    EndAnchor,
    Open,
    Close,
    Repetition,
    Alternation,
    Symbol(Alias),
    /// A single row with any activity.
    Any,
    /// `~>`: zero or more rows with any activity.
    AnyRun,
    /// Implicit `^ANY*` for patterns not anchored at the start.
    AnyPrefix,
    /// Implicit `ANY*$` for patterns not anchored at the end.
    AnySuffix,
}

impl PatternPart {
    /// Parts written without a separating space.
    fn glues(&self) -> bool {
        matches!(
            self,
            PatternPart::Close
                | PatternPart::Repetition
                | PatternPart::StartAnchor
                | PatternPart::EndAnchor
        )
    }
}

impl fmt::Display for PatternPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PatternPart::StartAnchor => write!(f, "^"),
            PatternPart::EndAnchor => write!(f, "$"),
            PatternPart::Open => write!(f, "("),
            PatternPart::Close => write!(f, ")"),
            PatternPart::Repetition => write!(f, "*"),
            PatternPart::Alternation => write!(f, "|"),
            PatternPart::Symbol(alias) => write!(f, "{}", alias),
            PatternPart::Any => write!(f, "ANY"),
            PatternPart::AnyRun => write!(f, "(ANY)*"),
            PatternPart::AnyPrefix => write!(f, "^ANY*"),
            PatternPart::AnySuffix => write!(f, "ANY*$"),
        }
    }
}

/// A row-level condition on the activity column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Predicate {
    Equals(String),
    /// None of the listed activities.
    NotIn(Vec<String>),
}

impl Predicate {
    pub fn to_sql(&self, column: &str) -> String {
        match self {
            Predicate::Equals(activity) => format!("{} = {}", column, sql_string(activity)),
            Predicate::NotIn(activities) => activities
                .iter()
                .map(|a| format!("{} != {}", column, sql_string(a)))
                .collect::<Vec<_>>()
                .join(" AND "),
        }
    }

    /// Evaluate against one activity.
    pub fn holds(&self, activity: &str) -> bool {
        match self {
            Predicate::Equals(expected) => expected == activity,
            Predicate::NotIn(excluded) => !excluded.iter().any(|e| e == activity),
        }
    }
}

/// `alias AS predicate`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Definition {
    pub alias: Alias,
    pub predicate: Predicate,
}

impl Definition {
    pub fn to_sql(&self, column: &str) -> String {
        format!("{} AS {}", self.alias, self.predicate.to_sql(column))
    }
}

/// The `PATTERN` and `DEFINE` parts of a `MATCH_RECOGNIZE` clause.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NativePattern {
    pub parts: Vec<PatternPart>,
    pub definitions: Vec<Definition>,
}

impl NativePattern {
    /// The parenthesized pattern, e.g. `(^ANY* (A (ANY)* B)* ANY*$)`.
    pub fn pattern_clause(&self) -> String {
        let mut out = String::from("(");
        let mut previous = &PatternPart::Open;

        for part in self.parts.iter().chain(std::iter::once(&PatternPart::Close)) {
            let tight = part.glues()
                || matches!(previous, PatternPart::Open | PatternPart::StartAnchor);
            if !tight {
                out.push(' ');
            }
            out.push_str(&part.to_string());
            previous = part;
        }

        out
    }

    /// The definitions joined by commas.
    ///
    /// A pattern without symbols still needs one definition, so it gets the
    /// always-true `ANY AS true`.
    pub fn define_clause(&self, column: &str) -> String {
        if self.definitions.is_empty() {
            return "ANY AS true".to_string();
        }
        self.definitions
            .iter()
            .map(|d| d.to_sql(column))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Aliases in pattern order.
    pub fn symbols(&self) -> Vec<Alias> {
        self.parts
            .iter()
            .filter_map(|p| match p {
                PatternPart::Symbol(alias) => Some(*alias),
                _ => None,
            })
            .collect()
    }
}

/// What one production contributes.
struct Emitted {
    part: PatternPart,
    definition: Option<Definition>,
}

impl Emitted {
    fn plain(part: PatternPart) -> Self {
        Self {
            part,
            definition: None,
        }
    }

    fn bound(aliases: &mut AliasAllocator, predicate: Predicate) -> SigqlResult<Self> {
        let alias = aliases.next()?;
        Ok(Self {
            part: PatternPart::Symbol(alias),
            definition: Some(Definition { alias, predicate }),
        })
    }
}

/// Emit the native pattern for a token stream.
pub fn emit(tokens: &[Token], ctx: &mut TranslationContext) -> SigqlResult<NativePattern> {
    let mut pattern = NativePattern::default();

    if !matches!(tokens.first(), Some(t) if t.is(&TokenKind::StartAnchor)) {
        pattern.parts.push(PatternPart::AnyPrefix);
    }

    let mut cursor = 0;
    while cursor < tokens.len() {
        let (next, emitted) = production(tokens, cursor, &mut ctx.aliases)?;
        pattern.parts.push(emitted.part);
        pattern.definitions.extend(emitted.definition);
        cursor = next;
    }

    if !matches!(tokens.last(), Some(t) if t.is(&TokenKind::EndAnchor)) {
        pattern.parts.push(PatternPart::AnySuffix);
    }

    Ok(pattern)
}

/// The production for the token at `cursor`.
fn production(
    tokens: &[Token],
    cursor: usize,
    aliases: &mut AliasAllocator,
) -> SigqlResult<(usize, Emitted)> {
    let emitted = match &tokens[cursor].kind {
        TokenKind::Literal(activity) => {
            Emitted::bound(aliases, Predicate::Equals(activity.clone()))?
        }
        TokenKind::Negation => {
            let (next, activities) = lexer::negation_group(tokens, cursor)?;
            return Ok((next, Emitted::bound(aliases, Predicate::NotIn(activities))?));
        }
        TokenKind::Wildcard => Emitted::plain(PatternPart::Any),
        TokenKind::IndirectlyFollows => Emitted::plain(PatternPart::AnyRun),
        TokenKind::StartAnchor => Emitted::plain(PatternPart::StartAnchor),
        TokenKind::EndAnchor => Emitted::plain(PatternPart::EndAnchor),
        TokenKind::OpenGroup => Emitted::plain(PatternPart::Open),
        TokenKind::CloseGroup => Emitted::plain(PatternPart::Close),
        TokenKind::Repetition => Emitted::plain(PatternPart::Repetition),
        TokenKind::Alternation => Emitted::plain(PatternPart::Alternation),
    };
    Ok((cursor + 1, emitted))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Leniency;
    use crate::error::SigqlError;
    use crate::lexer::tokenize;
    use pretty_assertions::assert_eq;

    fn native(input: &str) -> SigqlResult<NativePattern> {
        let tokens = tokenize(input).tokens;
        emit(&tokens, &mut TranslationContext::new(Leniency::Strict))
    }

    #[test]
    fn test_anchored_negation() {
        let pattern = native("^ NOT ( 'a' ) ANY* $").unwrap();
        assert_eq!(pattern.pattern_clause(), "(^A ANY*$)");
        assert_eq!(pattern.define_clause("activity"), "A AS activity != 'a'");
        assert_eq!(pattern.symbols().len(), 1);
    }

    #[test]
    fn test_indirectly_follows() {
        let pattern = native("( 'a' ~> 'b' )*").unwrap();
        assert_eq!(pattern.pattern_clause(), "(^ANY* (A (ANY)* B)* ANY*$)");
        assert_eq!(
            pattern.define_clause("activity"),
            "A AS activity = 'a', B AS activity = 'b'"
        );
    }

    #[test]
    fn test_response_pattern() {
        let pattern =
            native("^ NOT( 'a' | 'b' )* ( 'a' ~> 'b' )* NOT( 'a' | 'b' )* $").unwrap();
        assert_eq!(pattern.pattern_clause(), "(^A* (B (ANY)* C)* D*$)");
        assert_eq!(
            pattern.define_clause("event_name"),
            "A AS event_name != 'a' AND event_name != 'b', \
             B AS event_name = 'a', \
             C AS event_name = 'b', \
             D AS event_name != 'a' AND event_name != 'b'"
        );
    }

    #[test]
    fn test_alternation_spacing() {
        let pattern = native("(( 'a' ANY* 'b' ANY*) | ( 'c' ANY* 'd' ANY*))*").unwrap();
        assert_eq!(
            pattern.pattern_clause(),
            "(^ANY* ((A ANY* B ANY*) | (C ANY* D ANY*))* ANY*$)"
        );
    }

    #[test]
    fn test_literals_get_one_definition_each() {
        let pattern = native("'a' 'b' 'a' 'c'").unwrap();
        assert_eq!(pattern.definitions.len(), 4);
        let symbols = pattern.symbols();
        for definition in &pattern.definitions {
            assert_eq!(symbols.iter().filter(|s| **s == definition.alias).count(), 1);
        }
        assert_eq!(pattern.pattern_clause(), "(^ANY* A B C D ANY*$)");
    }

    #[test]
    fn test_empty_pattern_stays_well_formed() {
        let pattern = native("").unwrap();
        assert_eq!(pattern.pattern_clause(), "(^ANY* ANY*$)");
        assert_eq!(pattern.define_clause("activity"), "ANY AS true");
    }

    #[test]
    fn test_negation_order_is_irrelevant() {
        let left = native("NOT( 'a' | 'b' )").unwrap();
        let right = native("NOT( 'b' | 'a' )").unwrap();
        for activity in ["a", "b", "c", ""] {
            assert_eq!(
                left.definitions[0].predicate.holds(activity),
                right.definitions[0].predicate.holds(activity)
            );
        }
    }

    #[test]
    fn test_too_many_symbols() {
        let input: Vec<String> = (0..27).map(|i| format!("'e{}'", i)).collect();
        let err = native(&input.join(" ")).unwrap_err();
        assert!(matches!(err, SigqlError::AliasExhausted { .. }));
    }
}
