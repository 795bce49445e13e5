//! Signal pattern tokenizer using nom.
//!
//! Splits a pattern into its lexical units and validates grouping.
//!
//! # Lexical forms
//!
//! ```text
//! ^ NOT( 'a' | 'b' )* ( 'a' ~> 'b' )* ANY* $
//! ┬ ─┬─  ─┬─ ┬ ─┬─  ┬    ─┬─ ┬─  ─┬─   ─┬─ ┬
//! │  │    │  │  │   │     │  │    │     │  └── End anchor
//! │  │    │  │  │   │     │  │    │     └── Wildcard
//! │  │    │  │  │   │     │  │    └── Literal
//! │  │    │  │  │   │     │  └── Indirectly-follows
//! │  │    │  │  │   │     └── Literal
//! │  │    │  │  │   └── Repetition
//! │  │    │  │  └── Literal
//! │  │    │  └── Alternation
//! │  │    └── Literal (quoted activity)
//! │  └── Negation keyword
//! └── Start anchor
//! ```

use std::fmt;

use nom::{
    branch::alt,
    bytes::complete::{tag, take_while},
    character::complete::{char, multispace1, satisfy},
    combinator::{map, not, value},
    sequence::{delimited, terminated},
    IResult,
};
use serde::Serialize;

use crate::error::{SigqlError, SigqlResult};

/// The classification of a lexical unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "activity", rename_all = "snake_case")]
pub enum TokenKind {
    StartAnchor,
    EndAnchor,
    OpenGroup,
    CloseGroup,
    Repetition,
    Alternation,
    IndirectlyFollows,
    Wildcard,
    Negation,
    /// A quoted activity; holds the name without quotes.
    Literal(String),
}

impl TokenKind {
    /// The single character this token contributes to the shape alphabet.
    pub fn symbol(&self) -> char {
        match self {
            TokenKind::StartAnchor => '^',
            TokenKind::EndAnchor => '$',
            TokenKind::OpenGroup => '(',
            TokenKind::CloseGroup => ')',
            TokenKind::Repetition => '*',
            TokenKind::Alternation => '|',
            TokenKind::IndirectlyFollows => '~',
            TokenKind::Wildcard => '.',
            TokenKind::Negation => '!',
            TokenKind::Literal(_) => 'L',
        }
    }

    /// The activity name, for literals.
    pub fn activity(&self) -> Option<&str> {
        match self {
            TokenKind::Literal(name) => Some(name),
            _ => None,
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::StartAnchor => write!(f, "^"),
            TokenKind::EndAnchor => write!(f, "$"),
            TokenKind::OpenGroup => write!(f, "("),
            TokenKind::CloseGroup => write!(f, ")"),
            TokenKind::Repetition => write!(f, "*"),
            TokenKind::Alternation => write!(f, "|"),
            TokenKind::IndirectlyFollows => write!(f, "~>"),
            TokenKind::Wildcard => write!(f, "ANY"),
            TokenKind::Negation => write!(f, "NOT"),
            TokenKind::Literal(name) => write!(f, "'{}'", name),
        }
    }
}

/// A classified lexical unit and its byte offset in the pattern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Token {
    pub kind: TokenKind,
    pub position: usize,
}

impl Token {
    pub fn is(&self, kind: &TokenKind) -> bool {
        &self.kind == kind
    }
}

/// Input that matched no lexical form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LexError {
    pub position: usize,
    pub text: String,
}

impl From<LexError> for SigqlError {
    fn from(e: LexError) -> Self {
        SigqlError::Lex {
            position: e.position,
            text: e.text,
        }
    }
}

/// The result of scanning a pattern: tokens in input order plus the
/// unrecognized spans that were skipped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Lexed {
    pub tokens: Vec<Token>,
    pub errors: Vec<LexError>,
}

/// Tokenize a pattern string.
///
/// Never fails: unrecognized input is collected in [`Lexed::errors`] so the
/// caller decides whether to skip it or reject the pattern.
pub fn tokenize(input: &str) -> Lexed {
    let mut lexed = Lexed::default();
    let mut rest = input;

    while let Some(ch) = rest.chars().next() {
        let position = input.len() - rest.len();

        if let Ok((next, _)) = multispace1::<_, nom::error::Error<&str>>(rest) {
            rest = next;
            continue;
        }

        match parse_token(rest) {
            Ok((next, kind)) => {
                lexed.tokens.push(Token { kind, position });
                rest = next;
            }
            Err(_) => {
                // Adjacent unrecognized characters form one error
                match lexed.errors.last_mut() {
                    Some(last) if last.position + last.text.len() == position => last.text.push(ch),
                    _ => lexed.errors.push(LexError {
                        position,
                        text: ch.to_string(),
                    }),
                }
                rest = &rest[ch.len_utf8()..];
            }
        }
    }

    lexed
}

/// Parse one token at the start of the input.
fn parse_token(input: &str) -> IResult<&str, TokenKind> {
    alt((
        value(TokenKind::StartAnchor, char('^')),
        value(TokenKind::EndAnchor, char('$')),
        value(TokenKind::OpenGroup, char('(')),
        value(TokenKind::CloseGroup, char(')')),
        value(TokenKind::Repetition, char('*')),
        value(TokenKind::Alternation, char('|')),
        value(TokenKind::IndirectlyFollows, tag("~>")),
        value(TokenKind::Wildcard, keyword("ANY")),
        value(TokenKind::Negation, keyword("NOT")),
        map(parse_literal, |s: &str| TokenKind::Literal(s.to_string())),
    ))(input)
}

/// A keyword that is not the prefix of a longer identifier.
fn keyword<'a>(word: &'static str) -> impl FnMut(&'a str) -> IResult<&'a str, &'a str> {
    terminated(
        tag(word),
        not(satisfy(|c: char| c.is_alphanumeric() || c == '_')),
    )
}

/// Parse a single-quoted activity name.
fn parse_literal(input: &str) -> IResult<&str, &str> {
    delimited(char('\''), take_while(|c| c != '\''), char('\''))(input)
}

/// Parse a negation group `NOT ( 'a' | 'b' )` starting at the `NOT` token.
///
/// Returns the cursor after the closing parenthesis and the negated
/// activities in first-seen order, without duplicates.
pub fn negation_group(tokens: &[Token], cursor: usize) -> SigqlResult<(usize, Vec<String>)> {
    let start = tokens
        .get(cursor)
        .map(|t| t.position)
        .unwrap_or_default();

    match tokens.get(cursor + 1) {
        Some(t) if t.is(&TokenKind::OpenGroup) => {}
        Some(t) => return Err(SigqlError::structure(t.position, "expected '(' after NOT")),
        None => return Err(SigqlError::structure(start, "expected '(' after NOT")),
    }

    let close = tokens[cursor + 2..]
        .iter()
        .position(|t| t.is(&TokenKind::CloseGroup))
        .map(|offset| cursor + 2 + offset)
        .ok_or(SigqlError::Unterminated {
            construct: "negation group",
            position: start,
        })?;

    let mut activities: Vec<String> = Vec::new();
    let mut expect_literal = true;
    for token in &tokens[cursor + 2..close] {
        match &token.kind {
            TokenKind::Literal(name) if expect_literal => {
                if !activities.contains(name) {
                    activities.push(name.clone());
                }
                expect_literal = false;
            }
            TokenKind::Alternation if !expect_literal => expect_literal = true,
            other => {
                return Err(SigqlError::structure(
                    token.position,
                    format!("unexpected '{}' in negation group", other),
                ));
            }
        }
    }

    if expect_literal {
        return Err(SigqlError::structure(
            tokens[close].position,
            "negation group must end with an activity",
        ));
    }

    Ok((close + 1, activities))
}

/// Validate grouping: balanced parentheses and well-formed negation groups.
pub fn check_structure(tokens: &[Token]) -> SigqlResult<()> {
    let mut open: Vec<usize> = Vec::new();
    let mut cursor = 0;

    while let Some(token) = tokens.get(cursor) {
        match token.kind {
            TokenKind::Negation => {
                let (next, _) = negation_group(tokens, cursor)?;
                cursor = next;
                continue;
            }
            TokenKind::OpenGroup => open.push(token.position),
            TokenKind::CloseGroup => {
                if open.pop().is_none() {
                    return Err(SigqlError::structure(token.position, "unmatched ')'"));
                }
            }
            _ => {}
        }
        cursor += 1;
    }

    match open.first() {
        Some(&position) => Err(SigqlError::Unterminated {
            construct: "group",
            position,
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<TokenKind> {
        tokenize(input).tokens.into_iter().map(|t| t.kind).collect()
    }

    fn lit(name: &str) -> TokenKind {
        TokenKind::Literal(name.to_string())
    }

    #[test]
    fn test_opening_negation_tokens() {
        assert_eq!(
            kinds("^ NOT ( 'a' ) ANY* $"),
            vec![
                TokenKind::StartAnchor,
                TokenKind::Negation,
                TokenKind::OpenGroup,
                lit("a"),
                TokenKind::CloseGroup,
                TokenKind::Wildcard,
                TokenKind::Repetition,
                TokenKind::EndAnchor,
            ]
        );
    }

    #[test]
    fn test_follows_without_spaces() {
        assert_eq!(
            kinds("('a'~>'b')*"),
            vec![
                TokenKind::OpenGroup,
                lit("a"),
                TokenKind::IndirectlyFollows,
                lit("b"),
                TokenKind::CloseGroup,
                TokenKind::Repetition,
            ]
        );
    }

    #[test]
    fn test_literal_keeps_inner_spaces() {
        assert_eq!(kinds("'Create Purchase Order'"), vec![lit("Create Purchase Order")]);
    }

    #[test]
    fn test_positions() {
        let lexed = tokenize("^ NOT('x')");
        let positions: Vec<usize> = lexed.tokens.iter().map(|t| t.position).collect();
        assert_eq!(positions, vec![0, 2, 5, 6, 9]);
    }

    #[test]
    fn test_keyword_needs_boundary() {
        let lexed = tokenize("ANYTHING 'a'");
        assert_eq!(lexed.tokens.len(), 1);
        assert_eq!(
            lexed.errors,
            vec![LexError {
                position: 0,
                text: "ANYTHING".to_string()
            }]
        );
    }

    #[test]
    fn test_unterminated_quote_is_lex_error() {
        let lexed = tokenize("( 'abc");
        assert_eq!(lexed.tokens, vec![Token { kind: TokenKind::OpenGroup, position: 0 }]);
        assert_eq!(lexed.errors[0].text, "'abc");
        assert_eq!(lexed.errors[0].position, 2);
    }

    #[test]
    fn test_negation_group_dedupes() {
        let tokens = tokenize("NOT( 'a' | 'b' | 'a' )*").tokens;
        let (next, activities) = negation_group(&tokens, 0).unwrap();
        assert_eq!(next, 8);
        assert_eq!(activities, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_unterminated_negation() {
        let tokens = tokenize("NOT ( 'a'").tokens;
        let err = check_structure(&tokens).unwrap_err();
        assert!(matches!(
            err,
            SigqlError::Unterminated {
                construct: "negation group",
                position: 0
            }
        ));
    }

    #[test]
    fn test_unterminated_group() {
        let tokens = tokenize("^ ( 'a' ~> 'b' $").tokens;
        assert!(matches!(
            check_structure(&tokens),
            Err(SigqlError::Unterminated { construct: "group", position: 2 })
        ));
    }

    #[test]
    fn test_stray_close() {
        let tokens = tokenize("'a' )").tokens;
        assert!(matches!(
            check_structure(&tokens),
            Err(SigqlError::Structure { position: 4, .. })
        ));
    }

    #[test]
    fn test_negation_requires_group() {
        let tokens = tokenize("NOT 'a'").tokens;
        assert!(matches!(
            check_structure(&tokens),
            Err(SigqlError::Structure { position: 4, .. })
        ));
    }

    #[test]
    fn test_empty_negation_group() {
        let tokens = tokenize("NOT ( )").tokens;
        assert!(check_structure(&tokens).is_err());
        let tokens = tokenize("NOT ( 'a' | )").tokens;
        assert!(check_structure(&tokens).is_err());
    }
}
