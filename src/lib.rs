//! Snapshot tests for syntax-highlighting grammars.
//!
//! Fixtures are tokenized with a grammar from an explicit
//! [`GrammarRegistry`], the scoped tokens are recorded as a [`Snapshot`], and
//! later runs compare fresh tokenizations with the committed snapshots.

pub mod cli;
pub mod config;
pub mod diagnostics;
pub mod discovery;
pub mod grammar;
pub mod runner;
pub mod snapshot;
pub mod token;
pub mod tokenizer;

pub use crate::config::HarnessConfig;
pub use crate::diagnostics::{ErrorType, Result, ScopesnapError};
pub use crate::discovery::{Fixture, FixtureDiscoverer};
pub use crate::grammar::{Grammar, GrammarRegistry};
pub use crate::runner::{FixtureOutcome, FixtureReport, Harness, Mode, RunSummary};
pub use crate::snapshot::{compare, compare_tokens, Comparison, Mismatch, Snapshot, SnapshotStore};
pub use crate::token::{ScopeName, ScopeTag, Token};
pub use crate::tokenizer::{tokenize, Tokenization, Tokenizer, TokenizerLimits};
