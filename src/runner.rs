//! Fixture execution.
//!
//! Each fixture goes through the same linear pipeline, isolated from the
//! others:
//!
//! 1. **Grammar**: the grammar chosen at discovery time is resolved
//! 2. **Read**: the fixture bytes are read and checked for UTF-8
//! 3. **Tokenize**: the tokenizer runs on its own thread under a wall-clock
//!    guard
//! 4. **Capture**: the scoped tokens become a fresh [`Snapshot`]
//! 5. **Compare** or **Write**: the fresh snapshot is compared with the stored
//!    one, or written over it in update mode
//!
//! Fixtures are spread over a fixed pool of worker threads. Reports come back
//! in discovery order no matter which worker finished first.

use std::{
    collections::BTreeMap,
    fs,
    panic::{self, AssertUnwindSafe},
    path::Path,
    sync::{
        atomic::{AtomicUsize, Ordering},
        mpsc, Arc,
    },
    thread,
    time::{Duration, Instant},
};

use log::{debug, info, warn};

use crate::config::HarnessConfig;
use crate::diagnostics::{ErrorType, Result, ScopesnapError};
use crate::discovery::{Fixture, FixtureDiscoverer};
use crate::grammar::GrammarRegistry;
use crate::snapshot::{compare, Comparison, Snapshot, SnapshotStore, WriteStatus};
use crate::tokenizer::{panic_message, Tokenization, Tokenizer};

// =============================================================================
// CORE TYPES
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Compare fresh tokenizations with the stored snapshots.
    Check,
    /// Overwrite stored snapshots with fresh tokenizations.
    Update,
}

#[derive(Debug)]
pub enum FixtureOutcome {
    Passed,
    Written(WriteStatus),
    Failed(ScopesnapError),
}

impl FixtureOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, FixtureOutcome::Failed(_))
    }

    pub fn error(&self) -> Option<&ScopesnapError> {
        match self {
            FixtureOutcome::Failed(e) => Some(e),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub struct FixtureReport {
    pub fixture: Fixture,
    pub outcome: FixtureOutcome,
    pub elapsed: Duration,
}

/// All fixture reports of one run, in discovery order.
#[derive(Debug, Default)]
pub struct RunSummary {
    pub reports: Vec<FixtureReport>,
}

impl RunSummary {
    pub fn total(&self) -> usize {
        self.reports.len()
    }

    pub fn failed(&self) -> usize {
        self.reports.iter().filter(|r| r.outcome.is_failure()).count()
    }

    pub fn passed(&self) -> usize {
        self.total() - self.failed()
    }

    /// Number of snapshots with the given write status.
    pub fn written(&self, status: WriteStatus) -> usize {
        self.reports
            .iter()
            .filter(|r| matches!(r.outcome, FixtureOutcome::Written(s) if s == status))
            .count()
    }

    /// Failure counts per error type.
    pub fn failures_by_type(&self) -> BTreeMap<ErrorType, usize> {
        let mut counts = BTreeMap::new();
        for error in self.reports.iter().filter_map(|r| r.outcome.error()) {
            *counts.entry(error.error_type()).or_insert(0) += 1;
        }
        counts
    }

    pub fn is_success(&self) -> bool {
        self.failed() == 0
    }
}

/// Result of running a closure under a wall-clock guard.
#[derive(Debug, PartialEq, Eq)]
pub enum Deadline<T> {
    Finished(T),
    TimedOut,
    /// The closure panicked before producing a value.
    Aborted,
}

/// Runs `f` on a fresh thread and waits at most `timeout` for it.
///
/// A thread that overruns is detached and left to finish on its own; its
/// result is dropped.
pub fn with_deadline<T, F>(name: &str, timeout: Duration, f: F) -> std::io::Result<Deadline<T>>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    let (tx, rx) = mpsc::sync_channel(1);
    thread::Builder::new()
        .name(name.to_string())
        .spawn(move || {
            let _ = tx.send(f());
        })?;
    Ok(match rx.recv_timeout(timeout) {
        Ok(value) => Deadline::Finished(value),
        Err(mpsc::RecvTimeoutError::Timeout) => Deadline::TimedOut,
        Err(mpsc::RecvTimeoutError::Disconnected) => Deadline::Aborted,
    })
}

// =============================================================================
// HARNESS
// =============================================================================

/// Owns everything a run needs: configuration, the grammar registry, and the
/// snapshot store.
#[derive(Debug)]
pub struct Harness {
    config: HarnessConfig,
    registry: Arc<GrammarRegistry>,
    store: SnapshotStore,
}

impl Harness {
    /// Builds the grammar registry from `config`. Grammar problems are fatal
    /// and surface here, before any fixture runs.
    pub fn new(config: HarnessConfig) -> Result<Self> {
        let registry = config.build_registry()?;
        Ok(Self::with_registry(config, registry))
    }

    pub fn with_registry(config: HarnessConfig, registry: GrammarRegistry) -> Self {
        let store = SnapshotStore::new(&config.snapshots);
        Self {
            config,
            registry: Arc::new(registry),
            store,
        }
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    pub fn registry(&self) -> &GrammarRegistry {
        &self.registry
    }

    pub fn store(&self) -> &SnapshotStore {
        &self.store
    }

    pub fn discover(&self, filter: Option<&str>) -> Result<Vec<Fixture>> {
        FixtureDiscoverer::discover(
            &self.config.fixtures,
            filter,
            &self.registry,
            self.config.grammar.as_deref(),
        )
    }

    /// Discovers and runs every fixture matching `filter`.
    pub fn run(&self, mode: Mode, filter: Option<&str>) -> Result<RunSummary> {
        let fixtures = self.discover(filter)?;
        Ok(self.run_fixtures(fixtures, mode))
    }

    /// Runs `fixtures` on the worker pool.
    pub fn run_fixtures(&self, fixtures: Vec<Fixture>, mode: Mode) -> RunSummary {
        if fixtures.is_empty() {
            return RunSummary::default();
        }
        let workers = self.config.worker_count().min(fixtures.len());
        info!(
            "running {} fixture(s) on {} worker(s) in {:?} mode",
            fixtures.len(),
            workers,
            mode
        );

        let next = AtomicUsize::new(0);
        let (tx, rx) = mpsc::channel();
        thread::scope(|scope| {
            for _ in 0..workers {
                let tx = tx.clone();
                let next = &next;
                let fixtures = &fixtures;
                scope.spawn(move || loop {
                    let index = next.fetch_add(1, Ordering::Relaxed);
                    let Some(fixture) = fixtures.get(index) else {
                        break;
                    };
                    let report = self.run_fixture(fixture, mode);
                    if tx.send((index, report)).is_err() {
                        break;
                    }
                });
            }
        });
        drop(tx);

        let mut reports: Vec<(usize, FixtureReport)> = rx.into_iter().collect();
        reports.sort_by_key(|(index, _)| *index);
        RunSummary {
            reports: reports.into_iter().map(|(_, report)| report).collect(),
        }
    }

    /// Runs a single fixture. Never panics and never aborts the run: every
    /// problem becomes a failed outcome.
    pub fn run_fixture(&self, fixture: &Fixture, mode: Mode) -> FixtureReport {
        let started = Instant::now();
        let outcome = isolate(&fixture.name(), || self.execute(fixture, mode));
        let elapsed = started.elapsed();
        debug!("{} finished in {:?}", fixture.name(), elapsed);
        FixtureReport {
            fixture: fixture.clone(),
            outcome,
            elapsed,
        }
    }

    /// Tokenizes a single file outside the fixture tree, with the forced
    /// grammar if one is configured. Returns the grammar used, the text, and
    /// the full tokenization.
    pub fn tokenize_file(&self, path: &Path) -> Result<(String, String, Tokenization)> {
        let name = path.display().to_string();
        let grammar = match self.config.grammar.as_deref() {
            Some(id) => id,
            None => self
                .registry
                .grammar_for_path(path)
                .ok_or_else(|| ScopesnapError::NoGrammar {
                    fixture: name.clone(),
                })?,
        }
        .to_string();
        let tokenizer = Tokenizer::for_grammar(&self.registry, &grammar, self.config.limits())?;
        let bytes = fs::read(path).map_err(|e| ScopesnapError::io(path, e))?;
        let text = String::from_utf8(bytes).map_err(|e| {
            ScopesnapError::tokenize(&name, format!("fixture is not valid UTF-8: {e}"))
        })?;
        let tokenization = tokenizer.tokenize(&name, &text)?;
        Ok((grammar, text, tokenization))
    }

    // =========================================================================
    // PIPELINE PHASES
    // =========================================================================

    fn execute(&self, fixture: &Fixture, mode: Mode) -> Result<FixtureOutcome> {
        let name = fixture.name();
        let grammar = fixture
            .grammar
            .as_deref()
            .ok_or_else(|| ScopesnapError::NoGrammar {
                fixture: name.clone(),
            })?;
        let tokenizer = Tokenizer::for_grammar(&self.registry, grammar, self.config.limits())?;

        let bytes = fs::read(&fixture.path).map_err(|e| ScopesnapError::io(&fixture.path, e))?;
        let text: Arc<str> = String::from_utf8(bytes)
            .map_err(|e| {
                ScopesnapError::tokenize(&name, format!("fixture is not valid UTF-8: {e}"))
            })?
            .into();

        let tokenization = self.tokenize_guarded(&name, tokenizer, Arc::clone(&text))?;
        let fresh = Snapshot::capture(grammar, &text, tokenization.tokens());

        match mode {
            Mode::Update => {
                let status = self.store.write(&fixture.relative, &fresh)?;
                Ok(FixtureOutcome::Written(status))
            }
            Mode::Check => self.compare_with_stored(fixture, &name, fresh),
        }
    }

    fn tokenize_guarded(
        &self,
        name: &str,
        tokenizer: Tokenizer,
        text: Arc<str>,
    ) -> Result<Tokenization> {
        let timeout_ms = self.config.timeout_ms;
        if timeout_ms == 0 {
            return tokenizer.tokenize(name, &text);
        }

        let fixture = name.to_string();
        let outcome = with_deadline(
            "scopesnap-tokenize",
            self.config.timeout(),
            move || tokenizer.tokenize(&fixture, &text),
        )
        .map_err(|e| {
            ScopesnapError::tokenize(name, format!("cannot start tokenizer thread: {e}"))
        })?;

        settle(name, timeout_ms, outcome)
    }

    fn compare_with_stored(
        &self,
        fixture: &Fixture,
        name: &str,
        fresh: Snapshot,
    ) -> Result<FixtureOutcome> {
        let stored = self
            .store
            .load(&fixture.relative)?
            .ok_or_else(|| ScopesnapError::MissingSnapshot {
                path: self.store.path_for(&fixture.relative),
            })?;

        let result = compare(&stored, &fresh);
        if result.source_changed {
            warn!("{name}: fixture changed since its snapshot was recorded");
        }
        if stored.grammar != fresh.grammar {
            warn!(
                "{name}: snapshot was recorded with grammar '{}', now '{}'",
                stored.grammar, fresh.grammar
            );
        }

        match result.comparison {
            Comparison::Match => Ok(FixtureOutcome::Passed),
            Comparison::Mismatch(mismatch) => Err(ScopesnapError::SnapshotMismatch {
                fixture: name.to_string(),
                mismatch: Box::new(mismatch),
                expected: stored.serialize(),
                actual: fresh.serialize(),
            }),
        }
    }
}

/// Runs one fixture's pipeline, turning a panic anywhere in it into a
/// failed outcome that carries the panic message.
fn isolate<F>(name: &str, f: F) -> FixtureOutcome
where
    F: FnOnce() -> Result<FixtureOutcome>,
{
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(outcome)) => outcome,
        Ok(Err(error)) => FixtureOutcome::Failed(error),
        Err(payload) => FixtureOutcome::Failed(ScopesnapError::tokenize(
            name,
            format!("fixture run panicked: {}", panic_message(payload.as_ref())),
        )),
    }
}

/// Maps a guarded tokenizer run to the fixture's result.
fn settle(
    name: &str,
    timeout_ms: u64,
    outcome: Deadline<Result<Tokenization>>,
) -> Result<Tokenization> {
    match outcome {
        Deadline::Finished(result) => result,
        Deadline::TimedOut => {
            warn!("{name}: tokenizer exceeded {timeout_ms} ms, detaching it");
            Err(ScopesnapError::Timeout {
                fixture: name.to_string(),
                timeout_ms,
            })
        }
        Deadline::Aborted => Err(ScopesnapError::tokenize(name, "tokenizer thread aborted")),
    }
}
