use std::path::{Path, PathBuf};

use glob::{MatchOptions, Pattern};
use log::debug;
use walkdir::WalkDir;

use crate::diagnostics::{Result, ScopesnapError};
use crate::grammar::GrammarRegistry;

/// A fixture file found under the fixtures root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fixture {
    /// Path on disk.
    pub path: PathBuf,
    /// Path relative to the fixtures root. Used for filtering, reporting, and
    /// for locating the snapshot.
    pub relative: PathBuf,
    /// Grammar selected for this fixture, if any.
    pub grammar: Option<String>,
}

impl Fixture {
    /// Display name: the relative path with `/` separators.
    pub fn name(&self) -> String {
        self.relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")
    }
}

/// Finds fixtures and pairs them with grammars.
///
/// The discovery process follows this flow:
/// 1. Walk the fixtures root for regular files, skipping snapshot files
/// 2. Sort them so every run visits fixtures in the same order
/// 3. Keep the ones whose relative path matches the `--filter` glob
/// 4. Pick a grammar: the forced one, or whatever the registry maps the
///    extension to
#[derive(Debug)]
pub struct FixtureDiscoverer;

impl FixtureDiscoverer {
    // =====================
    // Public API - File Discovery
    // =====================

    /// Recursively lists fixture files under `root`, sorted.
    pub fn discover_fixture_files<P: AsRef<Path>>(root: P) -> Result<Vec<PathBuf>> {
        let root = root.as_ref();
        if !root.is_dir() {
            return Err(ScopesnapError::Discovery {
                message: format!("fixtures directory {} does not exist", root.display()),
            });
        }

        let mut files = Vec::new();
        for entry in WalkDir::new(root) {
            let entry = entry.map_err(|e| ScopesnapError::Discovery {
                message: format!("failed to walk {}: {e}", root.display()),
            })?;

            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            if Self::is_snapshot_file(path) {
                continue;
            }

            files.push(path.to_path_buf());
        }
        files.sort();
        Ok(files)
    }

    /// Compiles a `--filter` glob. `None` keeps every fixture.
    pub fn compile_filter(filter: Option<&str>) -> Result<Option<Pattern>> {
        filter
            .map(|glob| {
                Pattern::new(glob).map_err(|e| ScopesnapError::Discovery {
                    message: format!("invalid filter '{glob}': {e}"),
                })
            })
            .transpose()
    }

    /// Discovers fixtures under `root`, applying `filter` to relative paths
    /// and choosing a grammar for each one.
    pub fn discover(
        root: &Path,
        filter: Option<&str>,
        registry: &GrammarRegistry,
        forced_grammar: Option<&str>,
    ) -> Result<Vec<Fixture>> {
        let pattern = Self::compile_filter(filter)?;

        let mut fixtures = Vec::new();
        for path in Self::discover_fixture_files(root)? {
            let relative = path.strip_prefix(root).unwrap_or(&path).to_path_buf();
            if !Self::matches_filter(pattern.as_ref(), &relative) {
                continue;
            }
            let grammar = match forced_grammar {
                Some(id) => Some(id.to_string()),
                None => registry.grammar_for_path(&path).map(str::to_string),
            };
            fixtures.push(Fixture {
                path,
                relative,
                grammar,
            });
        }

        debug!("discovered {} fixture(s) under {}", fixtures.len(), root.display());
        Ok(fixtures)
    }

    // =====================
    // Internal - Helpers
    // =====================

    fn matches_filter(pattern: Option<&Pattern>, relative: &Path) -> bool {
        let Some(pattern) = pattern else {
            return true;
        };
        // `*` stays within one path component; `**` crosses directories.
        let options = MatchOptions {
            case_sensitive: true,
            require_literal_separator: true,
            require_literal_leading_dot: false,
        };
        pattern.matches_path_with(relative, options)
    }

    fn is_snapshot_file(path: &Path) -> bool {
        path.extension().is_some_and(|ext| ext == "snap")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::ErrorType;
    use crate::grammar::Grammar;
    use std::fs;
    use tempfile::TempDir;

    fn registry() -> GrammarRegistry {
        let mut registry = GrammarRegistry::new();
        let grammar =
            Grammar::from_yaml("name: go\nscope: source.go\nfile_types: [go]\n", "go.yaml")
                .unwrap();
        registry.insert(grammar).unwrap();
        registry
    }

    fn fixtures_dir() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("go/nested")).unwrap();
        fs::write(dir.path().join("go/b.go"), "package b").unwrap();
        fs::write(dir.path().join("go/a.go"), "package a").unwrap();
        fs::write(dir.path().join("go/nested/c.go"), "package c").unwrap();
        fs::write(dir.path().join("go/a.go.snap"), "stray").unwrap();
        fs::write(dir.path().join("notes.txt"), "hello").unwrap();
        dir
    }

    fn names(fixtures: &[Fixture]) -> Vec<String> {
        fixtures.iter().map(Fixture::name).collect()
    }

    #[test]
    fn files_are_sorted_and_snapshots_skipped() {
        let dir = fixtures_dir();
        let fixtures = FixtureDiscoverer::discover(dir.path(), None, &registry(), None).unwrap();
        assert_eq!(
            names(&fixtures),
            ["go/a.go", "go/b.go", "go/nested/c.go", "notes.txt"]
        );
    }

    #[test]
    fn grammar_follows_the_extension() {
        let dir = fixtures_dir();
        let fixtures = FixtureDiscoverer::discover(dir.path(), None, &registry(), None).unwrap();
        assert_eq!(fixtures[0].grammar.as_deref(), Some("go"));
        assert_eq!(fixtures[3].grammar, None);
    }

    #[test]
    fn forced_grammar_applies_to_every_fixture() {
        let dir = fixtures_dir();
        let fixtures =
            FixtureDiscoverer::discover(dir.path(), None, &registry(), Some("go")).unwrap();
        assert!(fixtures.iter().all(|f| f.grammar.as_deref() == Some("go")));
    }

    #[test]
    fn filter_matches_relative_paths() {
        let dir = fixtures_dir();
        let fixtures =
            FixtureDiscoverer::discover(dir.path(), Some("go/*.go"), &registry(), None).unwrap();
        assert_eq!(names(&fixtures), ["go/a.go", "go/b.go"]);

        let fixtures =
            FixtureDiscoverer::discover(dir.path(), Some("go/**/*.go"), &registry(), None)
                .unwrap();
        assert_eq!(names(&fixtures), ["go/a.go", "go/b.go", "go/nested/c.go"]);

        let fixtures =
            FixtureDiscoverer::discover(dir.path(), Some("**/c.go"), &registry(), None).unwrap();
        assert_eq!(names(&fixtures), ["go/nested/c.go"]);
    }

    #[test]
    fn filter_matching_nothing_is_not_an_error() {
        let dir = fixtures_dir();
        let fixtures =
            FixtureDiscoverer::discover(dir.path(), Some("*.rs"), &registry(), None).unwrap();
        assert!(fixtures.is_empty());
    }

    #[test]
    fn invalid_filter_is_a_discovery_error() {
        let err = FixtureDiscoverer::compile_filter(Some("go/[")).unwrap_err();
        assert_eq!(err.error_type(), ErrorType::Discovery);
    }

    #[test]
    fn missing_root_is_a_discovery_error() {
        let dir = TempDir::new().unwrap();
        let err = FixtureDiscoverer::discover_fixture_files(dir.path().join("absent")).unwrap_err();
        assert_eq!(err.error_type(), ErrorType::Discovery);
        assert!(err.is_fatal());
    }
}
