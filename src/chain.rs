//! Shape-recognizing regex emitter.
//!
//! Segments the token stream with the [`Catalog`] and turns each recognized
//! window into CTE fragments over the serialized trace `<a><b><c>`.
//!
//! Chain layout:
//!
//! ```text
//! raw_traces                      full_trace
//!   └─ initial_segment            segment_after_first            (opening negation)
//!        └─ sequences_of_interest segment_after_last_occurrence  (each narrowing)
//!             └─ sequences_of_interest_2 ...
//! terminal                        SELECT COUNT(b.case_id) ...
//! ```

use crate::catalog::{Catalog, Shape, Window};
use crate::error::{SigqlError, SigqlResult};
use crate::fragment::{Fragment, FragmentChain, RAW_TRACES, Terminal};
use crate::lexer::{self, Token, TokenKind};
use crate::translator::TranslationContext;

const INITIAL_SEGMENT: &str = "initial_segment";
const SEQUENCES_OF_INTEREST: &str = "sequences_of_interest";

/// Any single serialized event.
const EVENT: &str = "<[^>]*>";

/// A segment column and the CTE that holds it.
#[derive(Debug, Clone)]
struct Segment {
    cte: String,
    column: &'static str,
}

impl Segment {
    fn raw() -> Self {
        Self {
            cte: RAW_TRACES.to_string(),
            column: "full_trace",
        }
    }
}

/// Literals outside negation groups and the union of all negated sets.
#[derive(Debug, Default)]
struct Parts {
    literals: Vec<String>,
    negated: Vec<String>,
    /// Literals opening the window or an alternative.
    leading: Vec<String>,
}

fn parts(tokens: &[Token]) -> SigqlResult<Parts> {
    let mut parts = Parts::default();
    let mut previous: Option<&TokenKind> = None;
    let mut cursor = 0;

    while let Some(token) = tokens.get(cursor) {
        match &token.kind {
            TokenKind::Negation => {
                let (next, activities) = lexer::negation_group(tokens, cursor)?;
                for activity in activities {
                    if !parts.negated.contains(&activity) {
                        parts.negated.push(activity);
                    }
                }
                previous = Some(&TokenKind::Negation);
                cursor = next;
                continue;
            }
            TokenKind::Literal(name) => {
                if matches!(
                    previous,
                    None | Some(TokenKind::OpenGroup) | Some(TokenKind::Alternation)
                ) && !parts.leading.contains(name)
                {
                    parts.leading.push(name.clone());
                }
                parts.literals.push(name.clone());
            }
            _ => {}
        }
        previous = Some(&token.kind);
        cursor += 1;
    }

    Ok(parts)
}

/// An activity name as a regex literal inside a SQL string.
fn quote_activity(activity: &str) -> String {
    regex::escape(activity).replace('\'', "''")
}

/// `<a>`
fn event(activity: &str) -> String {
    format!("<{}>", quote_activity(activity))
}

/// `<a>` or `<(?:a|b)>`
fn event_set(activities: &[String]) -> String {
    match activities {
        [single] => event(single),
        _ => format!(
            "<(?:{})>",
            activities
                .iter()
                .map(|a| quote_activity(a))
                .collect::<Vec<_>>()
                .join("|")
        ),
    }
}

/// `<a>` followed, eventually, by `<b>`.
fn follows(first: &str, second: &str) -> String {
    format!("{}(?:{})*{}", event(first), EVENT, event(second))
}

/// One event whose activity is outside the set.
fn other_event(activities: &[String]) -> String {
    let names = match activities {
        [single] => quote_activity(single),
        _ => format!(
            "(?:{})",
            activities
                .iter()
                .map(|a| quote_activity(a))
                .collect::<Vec<_>>()
                .join("|")
        ),
    };
    format!("<(?!{names}>)[^>]*>")
}

/// Segment the trace from the first event in `set`, or `''` without one.
fn from_first_occurrence(set: &str) -> String {
    format!(
        "SELECT\n    \
         rt.case_id,\n    \
         CASE\n        \
         WHEN first_occurrence.pos > 0 THEN substring(rt.full_trace FROM first_occurrence.pos)\n        \
         ELSE ''\n    \
         END AS segment_after_first,\n    \
         first_occurrence.activity_match AS first_matched_activity\n\
         FROM raw_traces rt\n\
         CROSS JOIN LATERAL (\n    \
         SELECT\n        \
         regexp_position(rt.full_trace, '{set}') AS pos,\n        \
         regexp_extract(rt.full_trace, '{set}') AS activity_match\n\
         ) AS first_occurrence"
    )
}

/// Literal and negated set of each `( 'a' NOT( ... ) )` alternative.
fn alternatives(tokens: &[Token]) -> SigqlResult<Vec<(String, Vec<String>)>> {
    let mut found: Vec<(String, Vec<String>)> = Vec::new();
    let mut literal: Option<String> = None;
    let mut cursor = 0;

    while let Some(token) = tokens.get(cursor) {
        match &token.kind {
            TokenKind::Literal(name) => literal = Some(name.clone()),
            TokenKind::Negation => {
                let (next, negated) = lexer::negation_group(tokens, cursor)?;
                if let Some(name) = literal.take() {
                    let alternative = (name, negated);
                    if !found.contains(&alternative) {
                        found.push(alternative);
                    }
                }
                cursor = next;
                continue;
            }
            _ => {}
        }
        cursor += 1;
    }

    Ok(found)
}

/// Accumulates fragments and tracks the segment each reads.
#[derive(Debug)]
struct Builder {
    fragments: Vec<Fragment>,
    base: Segment,
    narrowed: Option<String>,
    terminal: Option<Terminal>,
}

impl Builder {
    fn new() -> Self {
        Self {
            fragments: Vec::new(),
            base: Segment::raw(),
            narrowed: None,
            terminal: None,
        }
    }

    fn is_empty(&self) -> bool {
        self.fragments.is_empty() && self.terminal.is_none()
    }

    /// The segment the next narrowing fragment reads.
    fn current(&self) -> Segment {
        match &self.narrowed {
            Some(cte) => Segment {
                cte: cte.clone(),
                column: "segment_after_last_occurrence",
            },
            None => self.base.clone(),
        }
    }

    fn push_narrowing(&mut self, body: String, input: &Segment) {
        let earlier = self
            .fragments
            .iter()
            .filter(|f| f.name.starts_with(SEQUENCES_OF_INTEREST))
            .count();
        let name = match earlier {
            0 => SEQUENCES_OF_INTEREST.to_string(),
            n => format!("{}_{}", SEQUENCES_OF_INTEREST, n + 1),
        };
        self.fragments.push(Fragment {
            name: name.clone(),
            body,
            depends_on: vec![input.cte.clone()],
        });
        self.narrowed = Some(name);
    }

    /// `next` holds the leading literals of the following window;
    /// `before_closing` is set when that window is a closing shape.
    fn opening_negation(
        &mut self,
        negated: &[String],
        starred: bool,
        next: &[String],
        before_closing: bool,
    ) {
        let neg = event_set(negated);
        let body = if !starred {
            format!(
                "SELECT\n    \
                 rt.case_id,\n    \
                 regexp_replace(rt.full_trace, '^{EVENT}', '') AS segment_after_first,\n    \
                 regexp_extract(rt.full_trace, '^<([^>]*)>', 1) AS first_matched_activity\n\
                 FROM raw_traces rt\n\
                 WHERE\n    \
                 regexp_like(rt.full_trace, '^{EVENT}')\n    \
                 AND NOT regexp_like(rt.full_trace, '^{neg}')"
            )
        } else if !next.is_empty() {
            let mut union: Vec<String> = negated.to_vec();
            for activity in next {
                if !union.contains(activity) {
                    union.push(activity.clone());
                }
            }
            let next_set = event_set(next);
            format!(
                "{}\n\
                 WHERE\n    \
                 first_occurrence.activity_match IS NULL\n    \
                 OR regexp_like(first_occurrence.activity_match, '^{next_set}$')",
                from_first_occurrence(&event_set(&union))
            )
        } else if before_closing {
            from_first_occurrence(&neg)
        } else {
            "SELECT\n    \
             rt.case_id,\n    \
             rt.full_trace AS segment_after_first,\n    \
             CAST(NULL AS varchar) AS first_matched_activity\n\
             FROM raw_traces rt"
                .to_string()
        };

        self.fragments.push(Fragment {
            name: INITIAL_SEGMENT.to_string(),
            body,
            depends_on: vec![RAW_TRACES.to_string()],
        });
        self.base = Segment {
            cte: INITIAL_SEGMENT.to_string(),
            column: "segment_after_first",
        };
    }

    /// Last occurrence of `pattern`; the segment after it.
    fn last_occurrence(&mut self, pattern: &str) {
        let input = self.current();
        let Segment { cte, column } = &input;
        let body = format!(
            "WITH all_target_sequences AS (\n    \
             SELECT\n        \
             case_id,\n        \
             {column} AS segment,\n        \
             regexp_position({column}, '{pattern}') AS sequence_position,\n        \
             regexp_extract({column}, '{pattern}') AS sequence\n    \
             FROM {cte}\n\
             )\n\
             SELECT\n    \
             case_id,\n    \
             sequence_position + length(sequence) AS resume_position,\n    \
             substring(segment FROM sequence_position + length(sequence)) AS segment_after_last_occurrence\n\
             FROM all_target_sequences\n\
             WHERE sequence IS NOT NULL"
        );
        self.push_narrowing(body, &input);
    }

    /// `a` then `c` with no `b` after the last such pair.
    fn no_consecutive(&mut self, first: &str, second: &str, negated: &[String]) {
        let input = self.current();
        let Segment { cte, column } = &input;
        let pattern = format!("{}(?:{})*?{}", event(first), EVENT, event(second));
        let excluded = event_set(negated);
        let last = "sequences[cardinality(sequences)]";
        let body = format!(
            "WITH all_target_sequences AS (\n    \
             SELECT\n        \
             case_id,\n        \
             {column} AS segment,\n        \
             regexp_extract_all({column}, '{pattern}') AS sequences\n    \
             FROM {cte}\n\
             ),\n\
             last_occurrences AS (\n    \
             SELECT\n        \
             case_id,\n        \
             segment,\n        \
             sequences,\n        \
             regexp_position(segment, '{pattern}', 1, CAST(cardinality(sequences) AS INTEGER)) AS last_occurrence_position\n    \
             FROM all_target_sequences\n    \
             WHERE cardinality(sequences) > 0\n\
             )\n\
             SELECT\n    \
             case_id,\n    \
             last_occurrence_position + length({last}) AS resume_position,\n    \
             substring(segment FROM last_occurrence_position + length({last})) AS segment_after_last_occurrence\n\
             FROM last_occurrences\n\
             WHERE NOT regexp_like(substring(segment FROM last_occurrence_position + length({last})), '{excluded}')"
        );
        self.push_narrowing(body, &input);
    }

    /// The segment avoids the negated set; nothing trails it.
    fn directly_follows_negation(&mut self, negated: &[String]) {
        let input = self.current();
        let Segment { cte, column } = &input;
        let excluded = event_set(negated);
        let body = format!(
            "SELECT\n    \
             case_id,\n    \
             {column} AS segment,\n    \
             '' AS segment_after_last_occurrence\n\
             FROM {cte}\n\
             WHERE NOT regexp_like({column}, '{excluded}')"
        );
        self.push_narrowing(body, &input);
    }

    /// Count cases whose trailing segment satisfies `condition`, which is
    /// given the segment column.
    fn closing(&mut self, condition: impl Fn(&str) -> String) {
        let Segment { cte, column } = &self.base;
        let base_holds = condition(format!("b.{column}").as_str());
        let (body, depends_on) = match &self.narrowed {
            Some(narrowed) => (
                format!(
                    "SELECT COUNT(b.case_id)\n\
                     FROM {cte} b\n\
                     LEFT OUTER JOIN {narrowed} soi ON soi.case_id = b.case_id\n\
                     WHERE\n    \
                     (soi.case_id IS NULL AND {base_holds})\n    \
                     OR {}",
                    condition("soi.segment_after_last_occurrence")
                ),
                vec![cte.clone(), narrowed.clone()],
            ),
            None => (
                format!(
                    "SELECT COUNT(b.case_id)\n\
                     FROM {cte} b\n\
                     WHERE {base_holds}"
                ),
                vec![cte.clone()],
            ),
        };
        self.terminal = Some(Terminal { body, depends_on });
    }

    /// The trailing segment avoids the negated set.
    fn closing_negation(&mut self, negated: &[String]) {
        let excluded = event_set(negated);
        self.closing(|column| format!("NOT regexp_like({column}, '{excluded}')"));
    }

    /// The trailing segment matches `pattern` from start to end.
    fn closing_exact(&mut self, pattern: &str) {
        self.closing(|column| format!("regexp_like({column}, '^{pattern}$')"));
    }

    fn finish(self) -> SigqlResult<FragmentChain> {
        let terminal = match self.terminal {
            Some(terminal) => terminal,
            None => {
                let cte = &self.base.cte;
                match &self.narrowed {
                    Some(narrowed) => Terminal {
                        body: format!(
                            "SELECT COUNT(b.case_id)\n\
                             FROM {cte} b\n\
                             LEFT OUTER JOIN {narrowed} soi ON soi.case_id = b.case_id"
                        ),
                        depends_on: vec![cte.clone(), narrowed.clone()],
                    },
                    None => Terminal {
                        body: format!("SELECT COUNT(b.case_id)\nFROM {cte} b"),
                        depends_on: vec![cte.clone()],
                    },
                }
            }
        };
        FragmentChain::new(self.fragments, terminal)
    }
}

/// Emit the fragment chain for a token stream.
pub fn emit(tokens: &[Token], ctx: &mut TranslationContext) -> SigqlResult<FragmentChain> {
    let windows = Catalog::standard().segment(tokens);
    let mut builder = Builder::new();
    // Without `^` the native form absorbs any prefix, so a closing shape
    // cannot constrain the trailing segment.
    let anchored = tokens.first().is_some_and(|t| t.is(&TokenKind::StartAnchor));

    for (index, window) in windows.iter().enumerate() {
        let shape = match window.shape {
            Some(shape) if shape.is_leading() && !builder.is_empty() => None,
            Some(shape) if shape.is_closing() && !anchored => None,
            Some(_) if builder.terminal.is_some() => None,
            other => other,
        };

        let Some(shape) = shape else {
            ctx.skip(SigqlError::UnknownShape {
                position: tokens[window.start].position,
                text: window.text(tokens),
            })?;
            continue;
        };

        tracing::debug!("Recognized {} at token {}", shape, window.start);
        let parts = parts(window.tokens(tokens))?;

        match shape {
            Shape::Absence | Shape::ClosingNegation => {
                builder.closing_negation(&parts.negated);
            }
            Shape::OpeningNegation => {
                let starred = window
                    .tokens(tokens)
                    .last()
                    .is_some_and(|t| t.is(&TokenKind::Repetition));
                let following = windows.get(index + 1);
                let next = next_literals(tokens, following)?;
                let before_closing = following
                    .and_then(|w| w.shape)
                    .is_some_and(|s| s.is_closing() && !s.is_leading());
                builder.opening_negation(&parts.negated, starred, &next, before_closing);
            }
            Shape::ClosingNegationOr => {
                let pairs: Vec<String> = alternatives(window.tokens(tokens))?
                    .iter()
                    .map(|(literal, negated)| format!("{}{}", event(literal), other_event(negated)))
                    .collect();
                builder.closing_exact(&format!("(?:{})*", pairs.join("|")));
            }
            Shape::ClosingDirectlyFollowsNegation => {
                let pattern: String = alternatives(window.tokens(tokens))?
                    .iter()
                    .map(|(literal, negated)| {
                        format!("{}(?:{})*", event(literal), other_event(negated))
                    })
                    .collect();
                builder.closing_exact(&pattern);
            }
            Shape::NoConsecutive => {
                builder.no_consecutive(&parts.literals[0], &parts.literals[1], &parts.negated);
            }
            Shape::FollowsWithTrailing => {
                let l = &parts.literals;
                let pattern = format!(
                    "(?:{}|{})(?:{})*",
                    follows(&l[0], &l[1]),
                    follows(&l[2], &l[3]),
                    EVENT
                );
                builder.last_occurrence(&pattern);
            }
            Shape::IndirectlyFollows | Shape::IndirectlyAnyFollows => {
                builder.last_occurrence(&follows(&parts.literals[0], &parts.literals[1]));
            }
            Shape::DirectlyFollowsNegation => {
                builder.directly_follows_negation(&parts.negated);
            }
            Shape::OpenWildcard => {}
        }
    }

    builder.finish()
}

/// Leading literals of the window after an opening negation.
fn next_literals(tokens: &[Token], next: Option<&Window>) -> SigqlResult<Vec<String>> {
    match next {
        Some(window) if window.shape.is_some_and(|s| !s.is_leading()) => {
            Ok(parts(window.tokens(tokens))?.leading)
        }
        _ => Ok(Vec::new()),
    }
}

/// Chain for a single-activity occurrence query.
pub fn occurrence(activity: &str) -> SigqlResult<FragmentChain> {
    FragmentChain::new(
        Vec::new(),
        Terminal {
            body: format!(
                "SELECT COUNT(rt.case_id)\n\
                 FROM raw_traces rt\n\
                 WHERE regexp_like(rt.full_trace, '{}')",
                event(activity)
            ),
            depends_on: vec![RAW_TRACES.to_string()],
        },
    )
}
