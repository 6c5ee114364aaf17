//! Handles all user-facing output for the CLI.
//!
//! Fixture lines, failure details, snapshot diffs, and the run summary are
//! written here so every subcommand reports the same way. Writers are generic
//! over [`WriteColor`] so tests can capture output in a [`termcolor::Buffer`].

use std::io::{self, Write};

use difference::{Changeset, Difference};
use termcolor::{Color, ColorChoice, ColorSpec, WriteColor};

use crate::cli::args::ColorMode;
use crate::diagnostics::ScopesnapError;
use crate::discovery::Fixture;
use crate::runner::{FixtureOutcome, FixtureReport, Mode, RunSummary};
use crate::snapshot::{Mismatch, SnapshotStore, WriteStatus};
use crate::token::Token;
use crate::tokenizer::Tokenization;

/// Unchanged lines kept on each side of a change when printing diffs.
const DIFF_CONTEXT_LINES: usize = 2;

// ============================================================================
// COLOR SELECTION
// ============================================================================

/// `auto` only colours when stdout is a terminal.
pub fn color_choice(mode: ColorMode) -> ColorChoice {
    match mode {
        ColorMode::Always => ColorChoice::Always,
        ColorMode::Never => ColorChoice::Never,
        ColorMode::Auto if atty::is(atty::Stream::Stdout) => ColorChoice::Auto,
        ColorMode::Auto => ColorChoice::Never,
    }
}

// ============================================================================
// RUN REPORTING
// ============================================================================

/// Prints one line per fixture, plus details for failures.
pub fn print_report<W: WriteColor>(out: &mut W, report: &FixtureReport) -> io::Result<()> {
    let name = report.fixture.name();
    let elapsed = report.elapsed.as_secs_f64() * 1000.0;
    match &report.outcome {
        FixtureOutcome::Passed => {
            print_label(out, "PASS", Color::Green)?;
            writeln!(out, " {name} ({elapsed:.1} ms)")
        }
        FixtureOutcome::Written(status) => {
            let color = match status {
                WriteStatus::Created => Color::Green,
                WriteStatus::Updated => Color::Yellow,
                WriteStatus::Unchanged => Color::White,
            };
            print_label(out, &status.as_str().to_uppercase(), color)?;
            writeln!(out, " {name} ({elapsed:.1} ms)")
        }
        FixtureOutcome::Failed(error) => {
            print_label(out, "FAIL", Color::Red)?;
            writeln!(out, " {name} [{}]", error.error_type())?;
            print_failure(out, error)
        }
    }
}

/// Prints the counts at the end of a run.
pub fn print_summary<W: WriteColor>(out: &mut W, summary: &RunSummary, mode: Mode) -> io::Result<()> {
    writeln!(out)?;
    write!(out, "Summary: total {}, ", summary.total())?;
    print_count(out, "passed", summary.passed(), Color::Green)?;
    write!(out, ", ")?;
    print_count(out, "failed", summary.failed(), Color::Red)?;
    if mode == Mode::Update {
        write!(
            out,
            " (created {}, updated {}, unchanged {})",
            summary.written(WriteStatus::Created),
            summary.written(WriteStatus::Updated),
            summary.written(WriteStatus::Unchanged),
        )?;
    }
    writeln!(out)?;

    for (error_type, count) in summary.failures_by_type() {
        writeln!(out, "  {error_type}: {count}")?;
    }
    Ok(())
}

fn print_failure<W: WriteColor>(out: &mut W, error: &ScopesnapError) -> io::Result<()> {
    writeln!(out, "  {error}")?;
    if let ScopesnapError::SnapshotMismatch {
        mismatch,
        expected,
        actual,
        ..
    } = error
    {
        print_mismatch(out, mismatch)?;
        writeln!(out, "  Diff (- stored, + fresh):")?;
        let changeset = Changeset::new(expected, actual, "\n");
        print_diff(out, &changeset.diffs)?;
    }
    Ok(())
}

fn print_mismatch<W: WriteColor>(out: &mut W, mismatch: &Mismatch) -> io::Result<()> {
    let show = |token: &Option<Token>| {
        token
            .as_ref()
            .map_or_else(|| "<none>".to_string(), ToString::to_string)
    };
    writeln!(out, "  expected: {}", show(&mismatch.expected))?;
    writeln!(out, "  actual:   {}", show(&mismatch.actual))?;
    writeln!(
        out,
        "  {} diverging token(s); stored {}, fresh {}",
        mismatch.diverging, mismatch.expected_len, mismatch.actual_len
    )
}

// ============================================================================
// OTHER SUBCOMMANDS
// ============================================================================

/// One line per fixture: relative path, grammar, snapshot path.
pub fn print_fixture_list<W: WriteColor>(
    out: &mut W,
    fixtures: &[Fixture],
    store: &SnapshotStore,
) -> io::Result<()> {
    for fixture in fixtures {
        writeln!(
            out,
            "{}\t{}\t{}",
            fixture.name(),
            fixture.grammar.as_deref().unwrap_or("-"),
            store.path_for(&fixture.relative).display()
        )?;
    }
    Ok(())
}

/// Prints every token of a full tokenization, unscoped ones included.
pub fn print_tokens<W: WriteColor>(
    out: &mut W,
    text: &str,
    tokenization: &Tokenization,
) -> io::Result<()> {
    for token in tokenization.tokens() {
        let source = token.text(text).unwrap_or_default();
        let literal = serde_json::Value::String(source.to_string());
        if token.is_scoped() {
            write!(out, "{}..{}\t", token.start, token.end)?;
            out.set_color(ColorSpec::new().set_fg(Some(Color::Cyan)))?;
            write!(out, "{}", token.scope_list())?;
            out.reset()?;
            writeln!(out, "\t{literal}")?;
        } else {
            writeln!(out, "{}..{}\t-\t{literal}", token.start, token.end)?;
        }
    }
    Ok(())
}

// ============================================================================
// PRIVATE HELPERS
// ============================================================================

fn print_label<W: WriteColor>(out: &mut W, label: &str, color: Color) -> io::Result<()> {
    out.set_color(ColorSpec::new().set_fg(Some(color)).set_bold(true))?;
    write!(out, "{label}")?;
    out.reset()
}

fn print_count<W: WriteColor>(out: &mut W, what: &str, count: usize, color: Color) -> io::Result<()> {
    out.set_color(ColorSpec::new().set_fg(Some(color)))?;
    write!(out, "{what}")?;
    out.reset()?;
    write!(out, " {count}")
}

fn print_diff<W: WriteColor>(out: &mut W, diffs: &[Difference]) -> io::Result<()> {
    for (i, diff) in diffs.iter().enumerate() {
        match diff {
            Difference::Same(x) => {
                out.reset()?;
                let lines: Vec<&str> = x.lines().collect();
                let head = if i == 0 { 0 } else { DIFF_CONTEXT_LINES };
                let tail = if i + 1 == diffs.len() { 0 } else { DIFF_CONTEXT_LINES };
                if lines.len() > head + tail {
                    for line in &lines[..head] {
                        writeln!(out, "   {line}")?;
                    }
                    writeln!(out, "   ...")?;
                    for line in &lines[lines.len() - tail..] {
                        writeln!(out, "   {line}")?;
                    }
                } else {
                    for line in lines {
                        writeln!(out, "   {line}")?;
                    }
                }
            }
            Difference::Add(x) => {
                out.set_color(ColorSpec::new().set_fg(Some(Color::Green)))?;
                for line in x.lines() {
                    writeln!(out, "  +{line}")?;
                }
            }
            Difference::Rem(x) => {
                out.set_color(ColorSpec::new().set_fg(Some(Color::Red)))?;
                for line in x.lines() {
                    writeln!(out, "  -{line}")?;
                }
            }
        }
    }
    out.reset()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::Snapshot;
    use crate::token::ScopeName;
    use std::path::PathBuf;
    use std::time::Duration;
    use termcolor::Buffer;

    fn fixture(name: &str) -> Fixture {
        Fixture {
            path: PathBuf::from("fixtures").join(name),
            relative: PathBuf::from(name),
            grammar: Some("go".into()),
        }
    }

    fn report(name: &str, outcome: FixtureOutcome) -> FixtureReport {
        FixtureReport {
            fixture: fixture(name),
            outcome,
            elapsed: Duration::from_millis(3),
        }
    }

    fn render(f: impl FnOnce(&mut Buffer) -> io::Result<()>) -> String {
        let mut buffer = Buffer::no_color();
        f(&mut buffer).unwrap();
        String::from_utf8(buffer.into_inner()).unwrap()
    }

    fn package_main(second: &str) -> Snapshot {
        let tokens = vec![
            Token::new(0, 7, vec![ScopeName::parse("keyword").unwrap()]),
            Token::new(8, 12, vec![ScopeName::parse(second).unwrap()]),
        ];
        Snapshot::capture("go", "package main", &tokens)
    }

    #[test]
    fn passing_fixture_is_one_line() {
        let text = render(|out| print_report(out, &report("go/a.go", FixtureOutcome::Passed)));
        assert_eq!(text, "PASS go/a.go (3.0 ms)\n");
    }

    #[test]
    fn written_fixture_shows_its_status() {
        let outcome = FixtureOutcome::Written(WriteStatus::Created);
        let text = render(|out| print_report(out, &report("go/a.go", outcome)));
        assert!(text.starts_with("CREATED go/a.go"));
    }

    #[test]
    fn mismatch_prints_both_tokens_and_a_diff() {
        let stored = package_main("keyword");
        let fresh = package_main("identifier");
        let crate::snapshot::Comparison::Mismatch(mismatch) =
            crate::snapshot::compare_tokens(stored.tokens(), fresh.tokens())
        else {
            panic!("expected a mismatch");
        };
        let error = ScopesnapError::SnapshotMismatch {
            fixture: "go/a.go".into(),
            mismatch: Box::new(mismatch),
            expected: stored.serialize(),
            actual: fresh.serialize(),
        };
        let text = render(|out| print_report(out, &report("go/a.go", FixtureOutcome::Failed(error))));

        assert!(text.starts_with("FAIL go/a.go [SnapshotMismatch]\n"));
        assert!(text.contains("expected: 8..12 [keyword]"));
        assert!(text.contains("actual:   8..12 [identifier]"));
        assert!(text.contains("  -8..12\tkeyword\t\"main\""));
        assert!(text.contains("  +8..12\tidentifier\t\"main\""));
    }

    #[test]
    fn summary_counts_failures_by_type() {
        let summary = RunSummary {
            reports: vec![
                report("go/a.go", FixtureOutcome::Passed),
                report(
                    "go/b.go",
                    FixtureOutcome::Failed(ScopesnapError::NoGrammar {
                        fixture: "go/b.go".into(),
                    }),
                ),
            ],
        };
        let text = render(|out| print_summary(out, &summary, Mode::Check));
        assert!(text.contains("Summary: total 2, passed 1, failed 1\n"));
        assert!(text.contains("  NoGrammar: 1\n"));
    }

    #[test]
    fn fixture_list_shows_grammar_and_snapshot_path() {
        let store = SnapshotStore::new("snapshots");
        let text = render(|out| print_fixture_list(out, &[fixture("go/a.go")], &store));
        let expected = format!(
            "go/a.go\tgo\t{}\n",
            PathBuf::from("snapshots/go/a.go.snap").display()
        );
        assert_eq!(text, expected);
    }
}
