//! Defines the command-line arguments and subcommands for the scopesnap CLI.
//!
//! This module uses the `clap` crate with its "derive" feature to create a
//! declarative and type-safe argument parsing structure.

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::config::HarnessConfig;

/// The main CLI argument structure.
#[derive(Debug, Parser)]
#[command(
    name = "scopesnap",
    version,
    about = "Snapshot tests for syntax-highlighting grammars and the scopes themes colour."
)]
pub struct ScopesnapArgs {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Command,
}

/// Options shared by every subcommand. Each one overrides the value from the
/// config file.
#[derive(Debug, Args)]
pub struct GlobalArgs {
    /// Config file to read instead of `./scopesnap.yaml`.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Directory containing the fixtures.
    #[arg(long, global = true)]
    pub fixtures: Option<PathBuf>,

    /// Directory snapshots are read from and written to.
    #[arg(long, global = true)]
    pub snapshots: Option<PathBuf>,

    /// Directory to load grammars from. May be repeated.
    #[arg(long = "grammars", global = true)]
    pub grammar_dirs: Vec<PathBuf>,

    /// Tokenize every fixture with this grammar.
    #[arg(long, global = true)]
    pub grammar: Option<String>,

    /// Number of worker threads (default: one per core).
    #[arg(long, global = true)]
    pub jobs: Option<usize>,

    /// Per-fixture wall-clock limit in milliseconds; 0 disables it.
    #[arg(long, global = true)]
    pub timeout_ms: Option<u64>,

    /// When to use coloured output.
    #[arg(long, value_enum, default_value_t = ColorMode::Auto, global = true)]
    pub color: ColorMode,
}

impl GlobalArgs {
    /// Applies the command-line overrides on top of `config`.
    pub fn apply(&self, config: &mut HarnessConfig) {
        if let Some(fixtures) = &self.fixtures {
            config.fixtures = fixtures.clone();
        }
        if let Some(snapshots) = &self.snapshots {
            config.snapshots = snapshots.clone();
        }
        if !self.grammar_dirs.is_empty() {
            config.grammar_dirs = self.grammar_dirs.clone();
        }
        if let Some(grammar) = &self.grammar {
            config.grammar = Some(grammar.clone());
        }
        if let Some(jobs) = self.jobs {
            config.jobs = jobs;
        }
        if let Some(timeout_ms) = self.timeout_ms {
            config.timeout_ms = timeout_ms;
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColorMode {
    Auto,
    Always,
    Never,
}

/// An enumeration of all available CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Tokenize every fixture and compare it with its stored snapshot.
    Run {
        /// Only run fixtures whose path (relative to the fixtures directory) matches this glob.
        #[arg(long)]
        filter: Option<String>,
    },
    /// Tokenize every fixture and overwrite its stored snapshot.
    Update {
        /// Only update fixtures whose path (relative to the fixtures directory) matches this glob.
        #[arg(long)]
        filter: Option<String>,
    },
    /// List discovered fixtures with their grammar and snapshot path.
    List {
        #[arg(long)]
        filter: Option<String>,
    },
    /// Print the tokenization of a single file without touching snapshots.
    Tokens {
        #[arg(required = true)]
        file: PathBuf,
    },
}
