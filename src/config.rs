//! Harness configuration.
//!
//! Values come from three layers, later ones winning: built-in defaults, an
//! optional YAML file (`scopesnap.yaml` in the working directory, or the file
//! given with `--config`), and command-line overrides. Relative paths in the
//! file are resolved against the file's own directory.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::Deserialize;

use crate::diagnostics::{Result, ScopesnapError};
use crate::grammar::GrammarRegistry;
use crate::tokenizer::TokenizerLimits;

pub const DEFAULT_CONFIG_FILE: &str = "scopesnap.yaml";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HarnessConfig {
    /// Root directory scanned for fixtures.
    pub fixtures: PathBuf,
    /// Root directory snapshots are written under.
    pub snapshots: PathBuf,
    /// Directories scanned for grammar files.
    pub grammar_dirs: Vec<PathBuf>,
    /// Use this grammar for every fixture instead of mapping by extension.
    pub grammar: Option<String>,
    /// Extension to grammar overrides.
    pub extensions: BTreeMap<String, String>,
    /// Worker threads; `0` means one per available core.
    pub jobs: usize,
    /// Per-fixture wall-clock guard.
    pub timeout_ms: u64,
    pub max_depth: usize,
    pub max_tokens: usize,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        let limits = TokenizerLimits::default();
        Self {
            fixtures: PathBuf::from("fixtures"),
            snapshots: PathBuf::from("snapshots"),
            grammar_dirs: vec![PathBuf::from("grammars")],
            grammar: None,
            extensions: BTreeMap::new(),
            jobs: 0,
            timeout_ms: 5_000,
            max_depth: limits.max_depth,
            max_tokens: limits.max_tokens,
        }
    }
}

impl HarnessConfig {
    /// Loads the config file at `path`, or `None` if there is none.
    pub fn load_from_path(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let text = std::fs::read_to_string(path).map_err(|e| ScopesnapError::Config {
            path: path.to_path_buf(),
            message: format!("cannot read file: {e}"),
        })?;
        let config = Self::from_yaml_str(&text, path)?;
        Ok(Some(config.relative_to(path.parent().unwrap_or(Path::new("")))))
    }

    /// Loads an explicitly named config file (which must exist), or the
    /// default file if present, or falls back to defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) => Self::load_from_path(path)?.ok_or_else(|| ScopesnapError::Config {
                path: path.to_path_buf(),
                message: "config file not found".to_string(),
            }),
            None => Ok(Self::load_from_path(Path::new(DEFAULT_CONFIG_FILE))?.unwrap_or_default()),
        }
    }

    pub fn from_yaml_str(text: &str, origin: &Path) -> Result<Self> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(text).map_err(|e| ScopesnapError::Config {
            path: origin.to_path_buf(),
            message: e.to_string(),
        })
    }

    fn relative_to(mut self, base: &Path) -> Self {
        let resolve = |path: &mut PathBuf| {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        };
        resolve(&mut self.fixtures);
        resolve(&mut self.snapshots);
        self.grammar_dirs.iter_mut().for_each(resolve);
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn worker_count(&self) -> usize {
        if self.jobs > 0 {
            return self.jobs;
        }
        std::thread::available_parallelism().map_or(1, usize::from)
    }

    pub fn limits(&self) -> TokenizerLimits {
        TokenizerLimits {
            max_depth: self.max_depth,
            max_tokens: self.max_tokens,
        }
    }

    /// Loads every grammar the configuration points at and applies the
    /// extension overrides. Any failure here is fatal for the run.
    pub fn build_registry(&self) -> Result<GrammarRegistry> {
        let mut registry = GrammarRegistry::load_dirs(&self.grammar_dirs)?;
        for (ext, id) in &self.extensions {
            registry.map_extension(ext, id)?;
        }
        if let Some(id) = &self.grammar {
            registry.get(id)?;
        }
        Ok(registry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::ErrorType;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn empty_file_means_defaults() {
        let config = HarnessConfig::from_yaml_str("", Path::new("scopesnap.yaml")).unwrap();
        assert_eq!(config, HarnessConfig::default());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let yaml = "fixtures: samples\ntimeout_ms: 250\nextensions:\n  gox: go\n";
        let config = HarnessConfig::from_yaml_str(yaml, Path::new("scopesnap.yaml")).unwrap();
        assert_eq!(config.fixtures, PathBuf::from("samples"));
        assert_eq!(config.timeout(), Duration::from_millis(250));
        assert_eq!(config.extensions.get("gox").map(String::as_str), Some("go"));
        assert_eq!(config.snapshots, PathBuf::from("snapshots"));
    }

    #[test]
    fn unknown_keys_are_config_errors() {
        let err = HarnessConfig::from_yaml_str("fixturez: x\n", Path::new("scopesnap.yaml"))
            .unwrap_err();
        assert_eq!(err.error_type(), ErrorType::Config);
        assert!(err.is_fatal());
    }

    #[test]
    fn paths_resolve_against_the_config_directory() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("scopesnap.yaml");
        fs::write(&path, "fixtures: samples\ngrammar_dirs: [g, /abs/g]\n").unwrap();

        let config = HarnessConfig::load_from_path(&path).unwrap().unwrap();
        assert_eq!(config.fixtures, dir.path().join("samples"));
        assert_eq!(config.snapshots, dir.path().join("snapshots"));
        assert_eq!(
            config.grammar_dirs,
            vec![dir.path().join("g"), PathBuf::from("/abs/g")]
        );
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let err = HarnessConfig::load(Some(dir.path().join("nope.yaml").as_path())).unwrap_err();
        assert_eq!(err.error_type(), ErrorType::Config);
    }

    #[test]
    fn jobs_zero_uses_available_parallelism() {
        let config = HarnessConfig::default();
        assert!(config.worker_count() >= 1);
        let config = HarnessConfig {
            jobs: 3,
            ..HarnessConfig::default()
        };
        assert_eq!(config.worker_count(), 3);
    }

    #[test]
    fn forced_grammar_must_exist() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("go.yaml"),
            "name: go\nscope: source.go\nfile_types: [go]\n",
        )
        .unwrap();
        let config = HarnessConfig {
            grammar_dirs: vec![dir.path().to_path_buf()],
            grammar: Some("rust".into()),
            ..HarnessConfig::default()
        };
        let err = config.build_registry().unwrap_err();
        assert_eq!(err.error_type(), ErrorType::GrammarLoad);
    }
}
