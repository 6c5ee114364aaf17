//! The scopesnap command-line interface.
//!
//! This module is the entry point for all CLI commands. It layers the
//! command-line overrides over the configuration file, builds the
//! [`Harness`], dispatches to the subcommand, and maps the outcome to an exit
//! code:
//!
//! | code | meaning                                                    |
//! |------|------------------------------------------------------------|
//! | 0    | every fixture passed (or was written)                      |
//! | 1    | at least one fixture failed                                |
//! | 2    | fatal problem: config, grammar loading, fixture discovery  |

use std::process::ExitCode;

use clap::Parser;
use log::warn;
use termcolor::StandardStream;

use crate::cli::args::{Command, ScopesnapArgs};
use crate::config::HarnessConfig;
use crate::diagnostics::{print_error, Result};
use crate::runner::{Harness, Mode};

pub mod args;
pub mod output;

pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_FAILURE: u8 = 1;
pub const EXIT_FATAL: u8 = 2;

/// The main entry point for the CLI.
pub fn run() -> ExitCode {
    let args = ScopesnapArgs::parse();
    match dispatch(args) {
        Ok(code) => ExitCode::from(code),
        Err(error) => {
            let code = if error.is_fatal() { EXIT_FATAL } else { EXIT_FAILURE };
            print_error(error);
            ExitCode::from(code)
        }
    }
}

fn dispatch(args: ScopesnapArgs) -> Result<u8> {
    let mut config = HarnessConfig::load(args.global.config.as_deref())?;
    args.global.apply(&mut config);
    let harness = Harness::new(config)?;
    let mut stdout = StandardStream::stdout(output::color_choice(args.global.color));

    match args.command {
        Command::Run { filter } => handle_run(&harness, Mode::Check, filter.as_deref(), &mut stdout),
        Command::Update { filter } => {
            handle_run(&harness, Mode::Update, filter.as_deref(), &mut stdout)
        }
        Command::List { filter } => {
            let fixtures = harness.discover(filter.as_deref())?;
            report_io(output::print_fixture_list(&mut stdout, &fixtures, harness.store()));
            Ok(EXIT_SUCCESS)
        }
        Command::Tokens { file } => {
            let (_, text, tokenization) = harness.tokenize_file(&file)?;
            report_io(output::print_tokens(&mut stdout, &text, &tokenization));
            Ok(EXIT_SUCCESS)
        }
    }
}

/// Handles the `run` and `update` subcommands.
fn handle_run(
    harness: &Harness,
    mode: Mode,
    filter: Option<&str>,
    stdout: &mut StandardStream,
) -> Result<u8> {
    let fixtures = harness.discover(filter)?;
    if fixtures.is_empty() {
        warn!("no fixtures matched");
    }

    let summary = harness.run_fixtures(fixtures, mode);
    for report in &summary.reports {
        report_io(output::print_report(stdout, report));
    }
    report_io(output::print_summary(stdout, &summary, mode));

    Ok(if summary.is_success() {
        EXIT_SUCCESS
    } else {
        EXIT_FAILURE
    })
}

/// A closed stdout is not worth failing the run over.
fn report_io(result: std::io::Result<()>) {
    if let Err(e) = result {
        warn!("cannot write report: {e}");
    }
}
