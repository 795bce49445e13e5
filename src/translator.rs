//! Translation driver.
//!
//! Tokenizes a pattern once and runs both emitters over the same tokens
//! with a fresh per-run [`TranslationContext`].

use std::fmt;

use serde::Serialize;

use crate::alias::AliasAllocator;
use crate::chain;
use crate::config::{Config, Leniency, TraceColumns};
use crate::error::{SigqlError, SigqlResult};
use crate::fragment::FragmentChain;
use crate::lexer::{self, Token, TokenKind};
use crate::match_recognize::{self, NativePattern};
use crate::query::{MatchRecognizeQuery, RegexQuery};
use crate::signal::SignalQuery;

/// Where skipped input was detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Lexer,
    Shape,
}

/// Input that was skipped under [`Leniency::Lenient`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub stage: Stage,
    pub position: usize,
    pub text: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let what = match self.stage {
            Stage::Lexer => "input",
            Stage::Shape => "shape",
        };
        write!(f, "{} '{}' at position {}", what, self.text, self.position)
    }
}

/// State owned by one translation run and lent to both emitters.
#[derive(Debug)]
pub struct TranslationContext {
    pub aliases: AliasAllocator,
    pub leniency: Leniency,
    pub diagnostics: Vec<Diagnostic>,
}

impl TranslationContext {
    pub fn new(leniency: Leniency) -> Self {
        Self {
            aliases: AliasAllocator::new(),
            leniency,
            diagnostics: Vec::new(),
        }
    }

    /// Record a recoverable error as a diagnostic, or return it when the
    /// policy is strict or the error is not recoverable.
    pub fn skip(&mut self, err: SigqlError) -> SigqlResult<()> {
        if self.leniency == Leniency::Strict || !err.is_recoverable() {
            return Err(err);
        }
        let diagnostic = match err {
            SigqlError::Lex { position, text } => Diagnostic {
                stage: Stage::Lexer,
                position,
                text,
            },
            SigqlError::UnknownShape { position, text } => Diagnostic {
                stage: Stage::Shape,
                position,
                text,
            },
            other => return Err(other),
        };
        tracing::warn!("Skipping unrecognized {}", diagnostic);
        self.diagnostics.push(diagnostic);
        Ok(())
    }
}

/// The two SQL realizations of one pattern, before table binding.
#[derive(Debug, Clone, Serialize)]
pub struct Translation {
    pub source: String,
    pub tokens: Vec<Token>,
    pub native: NativePattern,
    pub chain: FragmentChain,
    pub diagnostics: Vec<Diagnostic>,
}

/// A numbered statement pair bound to one table.
#[derive(Debug, Clone)]
pub struct QueryPair {
    pub match_recognize: MatchRecognizeQuery,
    pub regex: RegexQuery,
}

impl Translation {
    /// Bind both realizations to a table as statement `number`.
    pub fn queries(&self, number: usize, table: &str, columns: &TraceColumns) -> QueryPair {
        let notes_for = |stages: &[Stage]| -> Vec<String> {
            self.diagnostics
                .iter()
                .filter(|d| stages.contains(&d.stage))
                .map(|d| d.to_string())
                .collect()
        };

        QueryPair {
            match_recognize: MatchRecognizeQuery {
                number,
                table: table.to_string(),
                columns: columns.clone(),
                pattern: self.native.clone(),
                notes: notes_for(&[Stage::Lexer]),
            },
            regex: RegexQuery {
                number,
                table: table.to_string(),
                columns: columns.clone(),
                chain: self.chain.clone(),
                notes: notes_for(&[Stage::Lexer, Stage::Shape]),
            },
        }
    }

    /// Whether anything was skipped.
    pub fn is_partial(&self) -> bool {
        !self.diagnostics.is_empty()
    }
}

/// Translates signal patterns. Holds only settings, so one translator can
/// serve any number of runs.
#[derive(Debug, Clone, Default)]
pub struct Translator {
    leniency: Leniency,
}

impl Translator {
    pub fn new(leniency: Leniency) -> Self {
        Self { leniency }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.leniency)
    }

    /// Translate a pattern such as `^ NOT( 'a' )* ( 'a' ~> 'b' )* NOT( 'a' )* $`.
    pub fn translate(&self, pattern: &str) -> SigqlResult<Translation> {
        let mut ctx = TranslationContext::new(self.leniency);

        let lexed = lexer::tokenize(pattern);
        for error in lexed.errors {
            ctx.skip(error.into())?;
        }
        lexer::check_structure(&lexed.tokens)?;

        let native = match_recognize::emit(&lexed.tokens, &mut ctx)?;
        let chain = chain::emit(&lexed.tokens, &mut ctx)?;

        Ok(Translation {
            source: pattern.to_string(),
            tokens: lexed.tokens,
            native,
            chain,
            diagnostics: ctx.diagnostics,
        })
    }

    /// Translate a signal query: its `MATCHES` pattern, or the occurrence of
    /// a single activity when it has none.
    pub fn translate_signal(&self, signal: &SignalQuery) -> SigqlResult<Translation> {
        match signal {
            SignalQuery::Pattern(pattern) => self.translate(pattern),
            SignalQuery::Occurrence(activity) => {
                let mut ctx = TranslationContext::new(self.leniency);
                let tokens = vec![Token {
                    kind: TokenKind::Literal(activity.clone()),
                    position: 0,
                }];
                let native = match_recognize::emit(&tokens, &mut ctx)?;
                let chain = chain::occurrence(activity)?;

                Ok(Translation {
                    source: format!("'{}'", activity),
                    tokens,
                    native,
                    chain,
                    diagnostics: ctx.diagnostics,
                })
            }
        }
    }
}
