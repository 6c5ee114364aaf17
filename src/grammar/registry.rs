use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    sync::Arc,
};

use log::{debug, info};
use walkdir::WalkDir;

use super::Grammar;
use crate::diagnostics::{Result, ScopesnapError};

/// Grammars by identifier, plus the extension map used to pick a grammar for
/// a fixture. Built once from configuration and passed to whoever needs it.
#[derive(Debug, Default)]
pub struct GrammarRegistry {
    grammars: BTreeMap<String, Arc<Grammar>>,
    extensions: BTreeMap<String, String>,
}

impl GrammarRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads every `.yaml`/`.yml` grammar under the given directories.
    ///
    /// Files are visited in sorted order so that extension conflicts resolve
    /// the same way on every machine: the first grammar to claim an extension
    /// keeps it.
    pub fn load_dirs(dirs: &[PathBuf]) -> Result<Self> {
        let mut registry = Self::new();
        for dir in dirs {
            for path in Self::discover_grammar_files(dir)? {
                registry.load_file(&path)?;
            }
        }
        info!("loaded {} grammar(s)", registry.grammars.len());
        Ok(registry)
    }

    pub fn load_file(&mut self, path: &Path) -> Result<()> {
        debug!("loading grammar {}", path.display());
        let grammar = Grammar::from_file(path)?;
        self.insert(grammar)
    }

    pub fn insert(&mut self, grammar: Grammar) -> Result<()> {
        let name = grammar.name().to_string();
        if self.grammars.contains_key(&name) {
            return Err(ScopesnapError::grammar_load(
                &name,
                "a grammar with this name is already loaded",
            ));
        }
        for ext in grammar.file_types() {
            self.extensions
                .entry(ext.clone())
                .or_insert_with(|| name.clone());
        }
        self.grammars.insert(name, Arc::new(grammar));
        Ok(())
    }

    /// Looks a grammar up by identifier.
    pub fn get(&self, id: &str) -> Result<Arc<Grammar>> {
        self.grammars.get(id).cloned().ok_or_else(|| {
            let known = self.names().collect::<Vec<_>>().join(", ");
            ScopesnapError::grammar_load(id, format!("grammar not found (loaded: [{known}])"))
        })
    }

    pub fn contains(&self, id: &str) -> bool {
        self.grammars.contains_key(id)
    }

    /// Maps an extension to a grammar, overriding what the grammar files
    /// declared.
    pub fn map_extension(&mut self, ext: &str, id: &str) -> Result<()> {
        if !self.contains(id) {
            return Err(ScopesnapError::grammar_load(
                id,
                format!("extension '{ext}' is mapped to a grammar that is not loaded"),
            ));
        }
        self.extensions
            .insert(ext.trim_start_matches('.').to_ascii_lowercase(), id.to_string());
        Ok(())
    }

    /// Identifier of the grammar that handles files like `path`.
    pub fn grammar_for_path(&self, path: &Path) -> Option<&str> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        self.extensions.get(&ext).map(String::as_str)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.grammars.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.grammars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.grammars.is_empty()
    }

    fn discover_grammar_files(dir: &Path) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in WalkDir::new(dir) {
            let entry = entry.map_err(|e| {
                ScopesnapError::grammar_load(
                    dir.display().to_string(),
                    format!("cannot read grammar directory: {e}"),
                )
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            if path
                .extension()
                .is_some_and(|ext| ext == "yaml" || ext == "yml")
            {
                files.push(path.to_path_buf());
            }
        }
        files.sort();
        Ok(files)
    }
}
