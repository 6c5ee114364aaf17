//! Structural comparison of token sequences.

use super::Snapshot;
use crate::token::Token;

/// The first point where two token sequences diverge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mismatch {
    /// Index of the first diverging token.
    pub index: usize,
    /// Stored token at `index`, absent when the stored sequence is shorter.
    pub expected: Option<Token>,
    /// Fresh token at `index`, absent when the fresh sequence is shorter.
    pub actual: Option<Token>,
    /// Number of indices at which the sequences differ.
    pub diverging: usize,
    pub expected_len: usize,
    pub actual_len: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Comparison {
    Match,
    Mismatch(Mismatch),
}

impl Comparison {
    pub fn is_match(&self) -> bool {
        matches!(self, Comparison::Match)
    }
}

/// Compares tokens by offsets and scope sets, in order.
pub fn compare_tokens<'a, E, A>(expected: E, actual: A) -> Comparison
where
    E: IntoIterator<Item = &'a Token>,
    A: IntoIterator<Item = &'a Token>,
{
    let expected: Vec<&Token> = expected.into_iter().collect();
    let actual: Vec<&Token> = actual.into_iter().collect();

    let longest = expected.len().max(actual.len());
    let mut first = None;
    let mut diverging = 0;
    for index in 0..longest {
        let (e, a) = (expected.get(index), actual.get(index));
        if e == a {
            continue;
        }
        diverging += 1;
        if first.is_none() {
            first = Some((index, e.map(|t| (*t).clone()), a.map(|t| (*t).clone())));
        }
    }

    match first {
        None => Comparison::Match,
        Some((index, expected_token, actual_token)) => Comparison::Mismatch(Mismatch {
            index,
            expected: expected_token,
            actual: actual_token,
            diverging,
            expected_len: expected.len(),
            actual_len: actual.len(),
        }),
    }
}

/// Result of comparing a stored snapshot with a fresh one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotComparison {
    pub comparison: Comparison,
    /// The fixture bytes differ from the ones the snapshot was taken from.
    pub source_changed: bool,
}

pub fn compare(stored: &Snapshot, fresh: &Snapshot) -> SnapshotComparison {
    SnapshotComparison {
        comparison: compare_tokens(stored.tokens(), fresh.tokens()),
        source_changed: stored.source_digest != fresh.source_digest
            || stored.source_len != fresh.source_len,
    }
}
