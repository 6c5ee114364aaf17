//! Tokens, scope names, and the closed set of scope tags.
//!
//! A scope name is a dotted label such as `keyword.control.go`. Its first
//! segment must be one of the [`ScopeTag`]s; grammars are rejected at load
//! time when they use anything else, so the tokenizer only ever hands out
//! validated names.

use std::{fmt, ops::Range, str::FromStr, sync::Arc};

use thiserror::Error;

/// Root category of a scope name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ScopeTag {
    Comment,
    Constant,
    Entity,
    Identifier,
    Invalid,
    Keyword,
    Markup,
    Meta,
    Operator,
    Punctuation,
    Source,
    Storage,
    String,
    Support,
    Text,
    Variable,
}

impl ScopeTag {
    pub const ALL: [ScopeTag; 16] = [
        ScopeTag::Comment,
        ScopeTag::Constant,
        ScopeTag::Entity,
        ScopeTag::Identifier,
        ScopeTag::Invalid,
        ScopeTag::Keyword,
        ScopeTag::Markup,
        ScopeTag::Meta,
        ScopeTag::Operator,
        ScopeTag::Punctuation,
        ScopeTag::Source,
        ScopeTag::Storage,
        ScopeTag::String,
        ScopeTag::Support,
        ScopeTag::Text,
        ScopeTag::Variable,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            ScopeTag::Comment => "comment",
            ScopeTag::Constant => "constant",
            ScopeTag::Entity => "entity",
            ScopeTag::Identifier => "identifier",
            ScopeTag::Invalid => "invalid",
            ScopeTag::Keyword => "keyword",
            ScopeTag::Markup => "markup",
            ScopeTag::Meta => "meta",
            ScopeTag::Operator => "operator",
            ScopeTag::Punctuation => "punctuation",
            ScopeTag::Source => "source",
            ScopeTag::Storage => "storage",
            ScopeTag::String => "string",
            ScopeTag::Support => "support",
            ScopeTag::Text => "text",
            ScopeTag::Variable => "variable",
        }
    }

    pub fn from_segment(segment: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|tag| tag.as_str() == segment)
    }
}

impl fmt::Display for ScopeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScopeNameError {
    #[error("scope name is empty")]
    Empty,
    #[error("scope name '{0}' contains whitespace")]
    Whitespace(String),
    #[error("scope name '{0}' has an empty segment")]
    EmptySegment(String),
    #[error("scope name '{name}' starts with unknown tag '{tag}'")]
    UnknownTag { name: String, tag: String },
}

/// A validated, hierarchical scope label.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeName {
    tag: ScopeTag,
    name: Arc<str>,
}

impl ScopeName {
    pub fn parse(name: &str) -> Result<Self, ScopeNameError> {
        if name.is_empty() {
            return Err(ScopeNameError::Empty);
        }
        if name.chars().any(char::is_whitespace) {
            return Err(ScopeNameError::Whitespace(name.to_string()));
        }
        if name.split('.').any(str::is_empty) {
            return Err(ScopeNameError::EmptySegment(name.to_string()));
        }

        let head = name.split('.').next().unwrap_or(name);
        let tag = ScopeTag::from_segment(head).ok_or_else(|| ScopeNameError::UnknownTag {
            name: name.to_string(),
            tag: head.to_string(),
        })?;

        Ok(Self {
            tag,
            name: Arc::from(name),
        })
    }

    pub fn tag(&self) -> ScopeTag {
        self.tag
    }

    pub fn as_str(&self) -> &str {
        &self.name
    }
}

impl FromStr for ScopeName {
    type Err = ScopeNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for ScopeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// A byte range of the source text with the scopes assigned to it,
/// outermost first.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Token {
    pub start: usize,
    pub end: usize,
    pub scopes: Vec<ScopeName>,
}

impl Token {
    pub fn new(start: usize, end: usize, scopes: Vec<ScopeName>) -> Self {
        Self { start, end, scopes }
    }

    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Tokens with no scopes are gap filler between matched ranges.
    pub fn is_scoped(&self) -> bool {
        !self.scopes.is_empty()
    }

    pub fn text<'a>(&self, source: &'a str) -> Option<&'a str> {
        source.get(self.range())
    }

    /// Space-separated scope list, as written in snapshots.
    pub fn scope_list(&self) -> String {
        self.scopes
            .iter()
            .map(ScopeName::as_str)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{} [{}]", self.start, self.end, self.scope_list())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SequenceError {
    #[error("token {index} ends before it starts")]
    Inverted { index: usize },
    #[error("token {index} overlaps the previous token")]
    Overlap { index: usize },
    #[error("token {index} repeats scope '{scope}'")]
    DuplicateScope { index: usize, scope: String },
    #[error("gap before token {index}: expected offset {expected}, found {found}")]
    Gap {
        index: usize,
        expected: usize,
        found: usize,
    },
    #[error("tokens cover 0..{end} but the text is {len} bytes long")]
    Incomplete { end: usize, len: usize },
}

impl SequenceError {
    /// Index of the offending token, when there is one.
    pub fn index(&self) -> Option<usize> {
        match self {
            Self::Inverted { index }
            | Self::Overlap { index }
            | Self::DuplicateScope { index, .. }
            | Self::Gap { index, .. } => Some(*index),
            Self::Incomplete { .. } => None,
        }
    }
}

/// Checks that offsets are ordered, non-overlapping, and that no token
/// repeats a scope.
pub fn check_sequence(tokens: &[Token]) -> Result<(), SequenceError> {
    let mut previous_end = 0;
    for (index, token) in tokens.iter().enumerate() {
        if token.end < token.start {
            return Err(SequenceError::Inverted { index });
        }
        if token.start < previous_end {
            return Err(SequenceError::Overlap { index });
        }
        for (i, scope) in token.scopes.iter().enumerate() {
            if token.scopes[..i].contains(scope) {
                return Err(SequenceError::DuplicateScope {
                    index,
                    scope: scope.to_string(),
                });
            }
        }
        previous_end = token.end;
    }
    Ok(())
}

/// Checks [`check_sequence`] plus gap-free coverage of `0..len`.
pub fn check_coverage(tokens: &[Token], len: usize) -> Result<(), SequenceError> {
    check_sequence(tokens)?;
    let mut expected = 0;
    for (index, token) in tokens.iter().enumerate() {
        if token.start != expected {
            return Err(SequenceError::Gap {
                index,
                expected,
                found: token.start,
            });
        }
        expected = token.end;
    }
    if expected != len {
        return Err(SequenceError::Incomplete { end: expected, len });
    }
    Ok(())
}
