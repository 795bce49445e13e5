//! Shape catalog for the regex emitter.
//!
//! Every token maps to one character of a small alphabet:
//!
//! ```text
//! ^  start anchor     (  open group      ~  indirectly-follows
//! $  end anchor       )  close group     .  ANY
//! *  repetition       |  alternation     !  NOT
//! L  literal
//! ```
//!
//! A rule is an anchored regular expression over that alphabet. At each
//! cursor the first matching rule wins, so rule order is the precedence.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::lexer::Token;

/// A negation group: `NOT ( 'a' | 'b' ... )`.
const NEG: &str = r"!\(L(?:\|L)*\)";

/// A recognized idiom.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Shape {
    Absence,
    OpeningNegation,
    ClosingNegationOr,
    ClosingDirectlyFollowsNegation,
    ClosingNegation,
    NoConsecutive,
    FollowsWithTrailing,
    IndirectlyFollows,
    IndirectlyAnyFollows,
    DirectlyFollowsNegation,
    OpenWildcard,
}

impl Shape {
    pub fn name(&self) -> &'static str {
        match self {
            Shape::Absence => "absence",
            Shape::OpeningNegation => "opening-negation",
            Shape::ClosingNegationOr => "closing-negation-or",
            Shape::ClosingDirectlyFollowsNegation => "closing-directly-follows-negation",
            Shape::ClosingNegation => "closing-negation",
            Shape::NoConsecutive => "no-consecutive",
            Shape::FollowsWithTrailing => "follows-with-trailing",
            Shape::IndirectlyFollows => "indirectly-follows",
            Shape::IndirectlyAnyFollows => "indirectly-any-follows",
            Shape::DirectlyFollowsNegation => "directly-follows-negation",
            Shape::OpenWildcard => "open-wildcard",
        }
    }

    /// Shapes that end the pattern and produce the terminal count.
    pub fn is_closing(&self) -> bool {
        matches!(
            self,
            Shape::Absence
                | Shape::ClosingNegationOr
                | Shape::ClosingDirectlyFollowsNegation
                | Shape::ClosingNegation
        )
    }

    /// Shapes only valid before anything else was emitted.
    pub fn is_leading(&self) -> bool {
        matches!(self, Shape::Absence | Shape::OpeningNegation)
    }

    /// A sample pattern with this shape.
    pub fn example(&self) -> &'static str {
        match self {
            Shape::Absence => "^ NOT( 'a' | 'b' )* $",
            Shape::OpeningNegation => "^ NOT( 'a' )*",
            Shape::ClosingNegationOr => "(( 'a' NOT( 'b' ) )* | ( 'a' NOT( 'b' ) ))* $",
            Shape::ClosingDirectlyFollowsNegation => "( 'a' NOT( 'b' )* ) $",
            Shape::ClosingNegation => "NOT( 'a' | 'b' )* $",
            Shape::NoConsecutive => "( 'a' NOT( 'b' )* 'c' NOT( 'b' )* )*",
            Shape::FollowsWithTrailing => "(( 'a' ANY* 'b' ANY* ) | ( 'c' ANY* 'd' ANY* ))*",
            Shape::IndirectlyFollows => "( 'a' ~> 'b' )*",
            Shape::IndirectlyAnyFollows => "( 'a' ANY* 'b' )*",
            Shape::DirectlyFollowsNegation => "( 'a' NOT( 'b' )* )*",
            Shape::OpenWildcard => "ANY* $",
        }
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// One catalog entry.
#[derive(Debug, Clone)]
pub struct Rule {
    pub shape: Shape,
    pub matcher: Regex,
}

/// A span of tokens, `start..end`, with the shape it matched if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Window {
    pub start: usize,
    pub end: usize,
    pub shape: Option<Shape>,
}

impl Window {
    pub fn tokens<'a>(&self, tokens: &'a [Token]) -> &'a [Token] {
        &tokens[self.start..self.end]
    }

    /// The window as pattern text, for diagnostics.
    pub fn text(&self, tokens: &[Token]) -> String {
        self.tokens(tokens)
            .iter()
            .map(|t| t.kind.to_string())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// The ordered rule list.
#[derive(Debug, Clone)]
pub struct Catalog {
    rules: Vec<Rule>,
}

static STANDARD: LazyLock<Catalog> = LazyLock::new(Catalog::new);

impl Default for Catalog {
    fn default() -> Self {
        Self::new()
    }
}

impl Catalog {
    /// Build the catalog, highest precedence first.
    pub fn new() -> Self {
        let rules = [
            (Shape::Absence, r"\^NEG\*\$"),
            (Shape::OpeningNegation, r"\^NEG\*?"),
            (Shape::ClosingNegationOr, r"\(\(LNEG\)\*\|\(LNEG\)\)\*\$"),
            (Shape::ClosingDirectlyFollowsNegation, r"\(LNEG\*\)\$"),
            (Shape::ClosingNegation, r"NEG\*\$"),
            (Shape::NoConsecutive, r"\(LNEG\*LNEG\*\)\*"),
            (Shape::FollowsWithTrailing, r"\(\(L\.\*L\.\*\)\|\(L\.\*L\.\*\)\)\*"),
            (Shape::IndirectlyFollows, r"\(L~L\)\*"),
            (Shape::IndirectlyAnyFollows, r"\(L\.\*L\)\*"),
            (Shape::DirectlyFollowsNegation, r"\(LNEG\*\)\*"),
            (Shape::OpenWildcard, r"\^?\.\*\$?"),
        ];

        Self {
            rules: rules
                .into_iter()
                .map(|(shape, pattern)| Rule {
                    shape,
                    matcher: Regex::new(&format!(r"\A(?:{})", pattern.replace("NEG", NEG)))
                        .expect("catalog rule must compile"),
                })
                .collect(),
        }
    }

    /// The shared catalog.
    pub fn standard() -> &'static Catalog {
        &STANDARD
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// The first rule matching at `cursor`, with the number of tokens it
    /// covers.
    pub fn match_at(&self, alphabet: &str, cursor: usize) -> Option<(Shape, usize)> {
        let rest = alphabet.get(cursor..)?;
        self.rules.iter().find_map(|rule| {
            rule.matcher
                .find(rest)
                .filter(|m| !m.is_empty())
                .map(|m| (rule.shape, m.end()))
        })
    }

    /// Split a token stream into windows. Tokens no rule covers are grouped
    /// into unrecognized windows, one per contiguous run.
    pub fn segment(&self, tokens: &[Token]) -> Vec<Window> {
        let alphabet = alphabet(tokens);
        let mut windows: Vec<Window> = Vec::new();
        let mut cursor = 0;

        while cursor < tokens.len() {
            match self.match_at(&alphabet, cursor) {
                Some((shape, len)) => {
                    windows.push(Window {
                        start: cursor,
                        end: cursor + len,
                        shape: Some(shape),
                    });
                    cursor += len;
                }
                None => {
                    match windows.last_mut() {
                        Some(last) if last.shape.is_none() => last.end = cursor + 1,
                        _ => windows.push(Window {
                            start: cursor,
                            end: cursor + 1,
                            shape: None,
                        }),
                    }
                    cursor += 1;
                }
            }
        }

        windows
    }
}

/// Map tokens to the shape alphabet, one ASCII character per token.
pub fn alphabet(tokens: &[Token]) -> String {
    tokens.iter().map(|t| t.kind.symbol()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;

    fn shapes(input: &str) -> Vec<Option<Shape>> {
        let tokens = tokenize(input).tokens;
        Catalog::standard()
            .segment(&tokens)
            .into_iter()
            .map(|w| w.shape)
            .collect()
    }

    #[test]
    fn test_alphabet() {
        let tokens = tokenize("^ NOT( 'a' | 'b' )* ( 'a' ~> 'b' )* ANY* $").tokens;
        assert_eq!(alphabet(&tokens), "^!(L|L)*(L~L)*.*$");
    }

    #[test]
    fn test_every_example_matches_its_shape() {
        for rule in Catalog::standard().rules() {
            let tokens = tokenize(rule.shape.example()).tokens;
            let windows = Catalog::standard().segment(&tokens);
            assert_eq!(windows.len(), 1, "{}", rule.shape);
            assert_eq!(windows[0].shape, Some(rule.shape));
            assert_eq!(windows[0].end, tokens.len());
        }
    }

    #[test]
    fn test_response_pattern() {
        assert_eq!(
            shapes("^ NOT( 'a' | 'b' )* ( 'a' ~> 'b' )* NOT( 'a' | 'b' )* $"),
            vec![
                Some(Shape::OpeningNegation),
                Some(Shape::IndirectlyFollows),
                Some(Shape::ClosingNegation),
            ]
        );
    }

    #[test]
    fn test_absence_wins_over_opening_negation() {
        assert_eq!(shapes("^ NOT( 'a' )* $"), vec![Some(Shape::Absence)]);
    }

    #[test]
    fn test_opening_negation_without_star() {
        assert_eq!(
            shapes("^ NOT ( 'a' ) ANY* $"),
            vec![Some(Shape::OpeningNegation), Some(Shape::OpenWildcard)]
        );
    }

    #[test]
    fn test_no_consecutive_before_directly_follows_negation() {
        assert_eq!(
            shapes("( 'a' NOT( 'b' )* 'c' NOT( 'b' )* )*"),
            vec![Some(Shape::NoConsecutive)]
        );
        assert_eq!(
            shapes("( 'a' NOT( 'b' | 'c' )* )*"),
            vec![Some(Shape::DirectlyFollowsNegation)]
        );
    }

    #[test]
    fn test_unknown_tokens_merge() {
        let tokens = tokenize("'a' 'b' ( 'c' ~> 'd' )*").tokens;
        let windows = Catalog::standard().segment(&tokens);
        assert_eq!(
            windows[0],
            Window {
                start: 0,
                end: 2,
                shape: None
            }
        );
        assert_eq!(windows[0].text(&tokens), "'a' 'b'");
        assert_eq!(windows[1].shape, Some(Shape::IndirectlyFollows));
    }
}
