//! # Grammars
//!
//! A grammar is a YAML document of regex rules that assign scope names to
//! ranges of text:
//!
//! ```yaml
//! name: go
//! scope: source.go
//! file_types: [go]
//! patterns:
//!   - match: '\b(package|import)\b'
//!     scope: keyword.control.go
//!   - match: '\b(func)\s+([A-Za-z_]\w*)'
//!     captures:
//!       1: keyword.control.go
//!       2: entity.name.function.go
//!   - begin: '"'
//!     end: '"'
//!     scope: string.quoted.double.go
//!     patterns:
//!       - match: '\\.'
//!         scope: constant.character.escape.go
//! ```
//!
//! A rule is either a `match` rule or a `begin`/`end` region whose nested
//! `patterns` apply until `end` matches. `captures` scopes numbered groups of
//! a match on top of the rule's own scope; regions take `begin_captures` and
//! `end_captures`, or `captures` for both. Every regex is compiled and every
//! scope name is checked against the closed tag set when the grammar is
//! loaded, so a grammar that loads is one the tokenizer can always run.

use std::collections::BTreeMap;
use std::path::Path;

use regex::Regex;
use serde::Deserialize;

use crate::diagnostics::{Result, ScopesnapError};
use crate::token::ScopeName;

mod registry;

pub use registry::GrammarRegistry;

// =====================
// Definition (as written on disk)
// =====================

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GrammarDefinition {
    pub name: String,
    pub scope: String,
    #[serde(default)]
    pub file_types: Vec<String>,
    #[serde(default)]
    pub patterns: Vec<PatternDefinition>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PatternDefinition {
    #[serde(rename = "match")]
    pub match_: Option<String>,
    pub begin: Option<String>,
    pub end: Option<String>,
    pub scope: Option<String>,
    #[serde(default)]
    pub captures: BTreeMap<usize, String>,
    #[serde(default)]
    pub begin_captures: BTreeMap<usize, String>,
    #[serde(default)]
    pub end_captures: BTreeMap<usize, String>,
    #[serde(default)]
    pub patterns: Vec<PatternDefinition>,
}

// =====================
// Compiled grammar
// =====================

/// Index of a rule in [`Grammar::rule`].
pub type RuleId = usize;

/// A scope for one numbered capture group, in group order.
pub type Capture = (usize, ScopeName);

#[derive(Debug)]
pub enum Rule {
    Match {
        regex: Regex,
        scope: Option<ScopeName>,
        captures: Vec<Capture>,
    },
    Region {
        begin: Regex,
        end: Regex,
        scope: Option<ScopeName>,
        patterns: Vec<RuleId>,
        begin_captures: Vec<Capture>,
        end_captures: Vec<Capture>,
    },
}

impl Rule {
    pub fn scope(&self) -> Option<&ScopeName> {
        match self {
            Rule::Match { scope, .. } | Rule::Region { scope, .. } => scope.as_ref(),
        }
    }
}

/// A loaded grammar. Rules live in a flat arena and refer to each other by
/// [`RuleId`].
#[derive(Debug)]
pub struct Grammar {
    name: String,
    root_scope: ScopeName,
    file_types: Vec<String>,
    patterns: Vec<RuleId>,
    rules: Vec<Rule>,
}

impl Grammar {
    pub fn from_yaml(text: &str, origin: &str) -> Result<Self> {
        let definition: GrammarDefinition = serde_yaml::from_str(text)
            .map_err(|e| ScopesnapError::grammar_load(origin, format!("invalid YAML: {e}")))?;
        Self::from_definition(definition)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let origin = path.display().to_string();
        let text = std::fs::read_to_string(path)
            .map_err(|e| ScopesnapError::grammar_load(&origin, format!("cannot read file: {e}")))?;
        Self::from_yaml(&text, &origin)
    }

    pub fn from_definition(definition: GrammarDefinition) -> Result<Self> {
        let GrammarDefinition {
            name,
            scope,
            file_types,
            patterns,
        } = definition;

        if name.trim().is_empty() {
            return Err(ScopesnapError::grammar_load(
                "<unnamed>",
                "grammar name must not be empty",
            ));
        }
        // The name is written verbatim into snapshot headers.
        if name.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(ScopesnapError::grammar_load(
                name.escape_debug().to_string(),
                "grammar name must not contain whitespace or control characters",
            ));
        }

        let root_scope = ScopeName::parse(&scope)
            .map_err(|e| ScopesnapError::grammar_load(&name, e.to_string()))?;

        let mut compiler = RuleCompiler {
            grammar: &name,
            rules: Vec::new(),
        };
        let patterns = compiler.compile_list(&patterns, "patterns")?;
        let rules = compiler.rules;

        let file_types = file_types
            .into_iter()
            .map(|ext| ext.trim_start_matches('.').to_ascii_lowercase())
            .collect();

        Ok(Self {
            name,
            root_scope,
            file_types,
            patterns,
            rules,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn root_scope(&self) -> &ScopeName {
        &self.root_scope
    }

    pub fn file_types(&self) -> &[String] {
        &self.file_types
    }

    /// Top-level rules, in priority order.
    pub fn patterns(&self) -> &[RuleId] {
        &self.patterns
    }

    pub fn rule(&self, id: RuleId) -> &Rule {
        &self.rules[id]
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }
}

struct RuleCompiler<'a> {
    grammar: &'a str,
    rules: Vec<Rule>,
}

impl RuleCompiler<'_> {
    fn compile_list(&mut self, patterns: &[PatternDefinition], path: &str) -> Result<Vec<RuleId>> {
        patterns
            .iter()
            .enumerate()
            .map(|(i, pattern)| self.compile(pattern, &format!("{path}[{i}]")))
            .collect()
    }

    fn compile(&mut self, pattern: &PatternDefinition, path: &str) -> Result<RuleId> {
        let scope = match &pattern.scope {
            Some(scope) => Some(ScopeName::parse(scope).map_err(|e| self.error(path, e))?),
            None => None,
        };

        let rule = match (&pattern.match_, &pattern.begin, &pattern.end) {
            (Some(source), None, None) => {
                if !pattern.patterns.is_empty() {
                    return Err(self.error(path, "a match rule cannot have nested patterns"));
                }
                if !pattern.begin_captures.is_empty() || !pattern.end_captures.is_empty() {
                    return Err(self.error(
                        path,
                        "a match rule takes `captures`, not `begin_captures`/`end_captures`",
                    ));
                }
                let regex = self.regex(source, path, "match")?;
                let captures = self.captures(&pattern.captures, &regex, path, "captures")?;
                Rule::Match {
                    regex,
                    scope,
                    captures,
                }
            }
            (None, Some(begin), Some(end)) => {
                let begin = self.regex(begin, path, "begin")?;
                let end = self.regex(end, path, "end")?;
                let begin_captures = if pattern.begin_captures.is_empty() {
                    self.captures(&pattern.captures, &begin, path, "captures")?
                } else {
                    self.captures(&pattern.begin_captures, &begin, path, "begin_captures")?
                };
                let end_captures = if pattern.end_captures.is_empty() {
                    self.captures(&pattern.captures, &end, path, "captures")?
                } else {
                    self.captures(&pattern.end_captures, &end, path, "end_captures")?
                };
                let patterns = self.compile_list(&pattern.patterns, &format!("{path}.patterns"))?;
                Rule::Region {
                    begin,
                    end,
                    scope,
                    patterns,
                    begin_captures,
                    end_captures,
                }
            }
            (None, Some(_), None) => return Err(self.error(path, "region is missing `end`")),
            (None, None, Some(_)) => return Err(self.error(path, "region is missing `begin`")),
            (None, None, None) => {
                return Err(self.error(path, "rule needs either `match` or `begin`/`end`"))
            }
            (Some(_), _, _) => {
                return Err(self.error(path, "rule cannot combine `match` with `begin`/`end`"))
            }
        };

        self.rules.push(rule);
        Ok(self.rules.len() - 1)
    }

    fn regex(&self, source: &str, path: &str, field: &str) -> Result<Regex> {
        Regex::new(source).map_err(|e| self.error(path, format!("invalid `{field}` regex: {e}")))
    }

    fn captures(
        &self,
        captures: &BTreeMap<usize, String>,
        regex: &Regex,
        path: &str,
        field: &str,
    ) -> Result<Vec<Capture>> {
        captures
            .iter()
            .map(|(&group, scope)| {
                if group >= regex.captures_len() {
                    return Err(self.error(
                        path,
                        format!("`{field}` names group {group}, but the regex has no such group"),
                    ));
                }
                let scope = ScopeName::parse(scope)
                    .map_err(|e| self.error(&format!("{path}.{field}[{group}]"), e))?;
                Ok((group, scope))
            })
            .collect()
    }

    fn error(&self, path: &str, message: impl std::fmt::Display) -> ScopesnapError {
        ScopesnapError::grammar_load(self.grammar, format!("{path}: {message}"))
    }
}
