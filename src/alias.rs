//! Single-letter pattern symbol allocation.

use std::fmt;

use serde::Serialize;

use crate::error::{SigqlError, SigqlResult};

/// Number of single-letter aliases available to one pattern.
pub const ALIAS_LIMIT: usize = 26;

/// A pattern symbol name, `A` through `Z`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Alias(char);

impl fmt::Display for Alias {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Hands out aliases in order. One allocator per translation run.
#[derive(Debug, Default)]
pub struct AliasAllocator {
    issued: usize,
}

impl AliasAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// The next unused alias, or [`SigqlError::AliasExhausted`] after `Z`.
    pub fn next(&mut self) -> SigqlResult<Alias> {
        if self.issued >= ALIAS_LIMIT {
            return Err(SigqlError::AliasExhausted { limit: ALIAS_LIMIT });
        }
        let alias = Alias(char::from(b'A' + self.issued as u8));
        self.issued += 1;
        Ok(alias)
    }
}
