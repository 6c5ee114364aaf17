//! # Overview
//!
//! This module defines the unified, `miette`-based error type for the harness.
//! Every failure produced while loading grammars, tokenizing fixtures, or
//! reading and writing snapshots is a [`ScopesnapError`].
//!
//! Errors fall in two groups:
//!
//! - **Fatal** errors abort the whole run: a grammar that cannot be loaded, a
//!   malformed configuration file, or a fixtures directory that cannot be
//!   walked. These are configuration problems, not fixture problems.
//! - **Per-fixture** errors are recorded against a single fixture and the run
//!   continues with the next one.
//!
//! Use [`ScopesnapError::is_fatal`] to tell them apart and
//! [`ScopesnapError::error_type`] for type-safe classification in reports and
//! tests.

use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

use crate::snapshot::Mismatch;

/// Type-safe error classification that corresponds to [`ScopesnapError`] variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ErrorType {
    GrammarLoad,
    Tokenize,
    SnapshotMismatch,
    Io,
    MissingSnapshot,
    CorruptSnapshot,
    Timeout,
    NoGrammar,
    Config,
    Discovery,
}

impl ErrorType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorType::GrammarLoad => "GrammarLoadError",
            ErrorType::Tokenize => "TokenizeError",
            ErrorType::SnapshotMismatch => "SnapshotMismatch",
            ErrorType::Io => "IOError",
            ErrorType::MissingSnapshot => "MissingSnapshot",
            ErrorType::CorruptSnapshot => "CorruptSnapshot",
            ErrorType::Timeout => "Timeout",
            ErrorType::NoGrammar => "NoGrammar",
            ErrorType::Config => "ConfigError",
            ErrorType::Discovery => "DiscoveryError",
        }
    }
}

impl std::fmt::Display for ErrorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Unified error type for all harness failure modes.
#[derive(Debug, Error, Diagnostic)]
pub enum ScopesnapError {
    #[error("Grammar load error for '{grammar}': {message}")]
    #[diagnostic(
        code(scopesnap::grammar_load),
        help("check the grammar directories and the grammar definition; the run cannot continue without it")
    )]
    GrammarLoad { grammar: String, message: String },

    #[error("Tokenize error in {fixture}: {message}")]
    #[diagnostic(code(scopesnap::tokenize))]
    Tokenize { fixture: String, message: String },

    #[error("Snapshot mismatch in {fixture} at token {}", .mismatch.index)]
    #[diagnostic(
        code(scopesnap::snapshot_mismatch),
        help("if the new scopes are intended, regenerate the snapshot with `scopesnap update`")
    )]
    SnapshotMismatch {
        fixture: String,
        mismatch: Box<Mismatch>,
        /// Serialized stored snapshot.
        expected: String,
        /// Serialized fresh snapshot.
        actual: String,
    },

    #[error("I/O error on {}: {source}", .path.display())]
    #[diagnostic(code(scopesnap::io))]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("No snapshot recorded at {}", .path.display())]
    #[diagnostic(
        code(scopesnap::missing_snapshot),
        help("record one with `scopesnap update`")
    )]
    MissingSnapshot { path: PathBuf },

    #[error("Corrupt snapshot {}: line {line}: {message}", .path.display())]
    #[diagnostic(
        code(scopesnap::corrupt_snapshot),
        help("snapshots are generated files; regenerate it with `scopesnap update`")
    )]
    CorruptSnapshot {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error("Tokenizing {fixture} exceeded the {timeout_ms} ms wall-clock guard")]
    #[diagnostic(code(scopesnap::timeout))]
    Timeout { fixture: String, timeout_ms: u64 },

    #[error("No grammar is mapped to {fixture}")]
    #[diagnostic(
        code(scopesnap::no_grammar),
        help("add the extension to a grammar's `file_types`, map it under `extensions` in the config, or pass --grammar")
    )]
    NoGrammar { fixture: String },

    #[error("Configuration error in {}: {message}", .path.display())]
    #[diagnostic(code(scopesnap::config))]
    Config { path: PathBuf, message: String },

    #[error("Fixture discovery failed: {message}")]
    #[diagnostic(code(scopesnap::discovery))]
    Discovery { message: String },
}

pub type Result<T, E = ScopesnapError> = std::result::Result<T, E>;

impl ScopesnapError {
    pub fn error_type(&self) -> ErrorType {
        match self {
            Self::GrammarLoad { .. } => ErrorType::GrammarLoad,
            Self::Tokenize { .. } => ErrorType::Tokenize,
            Self::SnapshotMismatch { .. } => ErrorType::SnapshotMismatch,
            Self::Io { .. } => ErrorType::Io,
            Self::MissingSnapshot { .. } => ErrorType::MissingSnapshot,
            Self::CorruptSnapshot { .. } => ErrorType::CorruptSnapshot,
            Self::Timeout { .. } => ErrorType::Timeout,
            Self::NoGrammar { .. } => ErrorType::NoGrammar,
            Self::Config { .. } => ErrorType::Config,
            Self::Discovery { .. } => ErrorType::Discovery,
        }
    }

    /// Fatal errors abort the whole run instead of failing a single fixture.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self.error_type(),
            ErrorType::GrammarLoad | ErrorType::Config | ErrorType::Discovery
        )
    }

    pub(crate) fn grammar_load(grammar: impl Into<String>, message: impl Into<String>) -> Self {
        Self::GrammarLoad {
            grammar: grammar.into(),
            message: message.into(),
        }
    }

    pub(crate) fn tokenize(fixture: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Tokenize {
            fixture: fixture.into(),
            message: message.into(),
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Prints a fatal error with full miette diagnostics.
pub fn print_error(error: ScopesnapError) {
    let report = miette::Report::new(error);
    eprintln!("{report:?}");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fatal_errors_are_configuration_problems() {
        assert!(ScopesnapError::grammar_load("go", "not found").is_fatal());
        assert!(ScopesnapError::Discovery {
            message: "bad glob".into()
        }
        .is_fatal());
        assert!(!ScopesnapError::tokenize("a.go", "invalid UTF-8").is_fatal());
        assert!(!ScopesnapError::MissingSnapshot {
            path: PathBuf::from("a.go.snap")
        }
        .is_fatal());
    }

    #[test]
    fn diagnostic_codes_are_stable() {
        let err = ScopesnapError::grammar_load("go", "not found");
        let code = err.code().map(|c| c.to_string());
        assert_eq!(code.as_deref(), Some("scopesnap::grammar_load"));
        assert_eq!(err.error_type().as_str(), "GrammarLoadError");
    }

    #[test]
    fn messages_name_the_fixture() {
        let err = ScopesnapError::Timeout {
            fixture: "slow.go".into(),
            timeout_ms: 50,
        };
        assert_eq!(
            err.to_string(),
            "Tokenizing slow.go exceeded the 50 ms wall-clock guard"
        );
    }
}
