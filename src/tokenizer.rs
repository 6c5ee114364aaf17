//! # Tokenizer Adapter
//!
//! Runs a [`Grammar`] over a fixture and produces a gap-free sequence of
//! [`Token`]s.
//!
//! At each position the earliest match wins among the active region's `end`
//! pattern and the active rule list. Ties go to the region `end`, then to
//! rule order. Text that no rule claims becomes a token carrying only the
//! enclosing region scopes, so the result always covers `0..len`. Adjacent
//! tokens with identical scopes are merged.
//!
//! Capture scopes split a match into pieces. Groups that overlap an earlier
//! group are dropped; on an equal start the wider group wins.

use std::{
    cmp::Reverse,
    panic::{self, AssertUnwindSafe},
    sync::Arc,
};

use log::debug;
use regex::Regex;

use crate::diagnostics::{Result, ScopesnapError};
use crate::grammar::{Capture, Grammar, GrammarRegistry, Rule, RuleId};
use crate::token::{ScopeName, Token};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenizerLimits {
    /// Deepest allowed nesting of `begin`/`end` regions.
    pub max_depth: usize,
    /// Upper bound on emitted tokens for a single fixture.
    pub max_tokens: usize,
}

impl Default for TokenizerLimits {
    fn default() -> Self {
        Self {
            max_depth: 64,
            max_tokens: 1_000_000,
        }
    }
}

/// The full, gap-free result of tokenizing one text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tokenization {
    tokens: Vec<Token>,
    len: usize,
}

impl Tokenization {
    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    /// Length in bytes of the tokenized text.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Tokens that carry at least one scope. This is the view snapshots record.
    pub fn significant(&self) -> impl Iterator<Item = &Token> {
        self.tokens.iter().filter(|t| t.is_scoped())
    }

    pub fn into_significant(self) -> Vec<Token> {
        self.tokens.into_iter().filter(Token::is_scoped).collect()
    }
}

#[derive(Debug, Clone)]
pub struct Tokenizer {
    grammar: Arc<Grammar>,
    limits: TokenizerLimits,
}

impl Tokenizer {
    pub fn new(grammar: Arc<Grammar>, limits: TokenizerLimits) -> Self {
        Self { grammar, limits }
    }

    /// Resolves `grammar_id` in the registry. Fails with a grammar load error
    /// when the registry does not know it.
    pub fn for_grammar(
        registry: &GrammarRegistry,
        grammar_id: &str,
        limits: TokenizerLimits,
    ) -> Result<Self> {
        Ok(Self::new(registry.get(grammar_id)?, limits))
    }

    pub fn grammar(&self) -> &Grammar {
        &self.grammar
    }

    /// Tokenizes raw fixture bytes. Non-UTF-8 input is a tokenize error.
    pub fn tokenize_bytes(&self, fixture: &str, bytes: &[u8]) -> Result<Tokenization> {
        let text = std::str::from_utf8(bytes).map_err(|e| {
            ScopesnapError::tokenize(fixture, format!("fixture is not valid UTF-8: {e}"))
        })?;
        self.tokenize(fixture, text)
    }

    /// Tokenizes `text`. A panic inside the scanner is caught and reported as
    /// a tokenize error for `fixture`.
    pub fn tokenize(&self, fixture: &str, text: &str) -> Result<Tokenization> {
        let scanned = panic::catch_unwind(AssertUnwindSafe(|| self.scan(fixture, text)));
        let tokens = match scanned {
            Ok(result) => result?,
            Err(payload) => {
                return Err(ScopesnapError::tokenize(
                    fixture,
                    format!("tokenizer panicked: {}", panic_message(payload.as_ref())),
                ))
            }
        };
        debug!(
            "{fixture}: {} token(s) with grammar '{}'",
            tokens.len(),
            self.grammar.name()
        );
        Ok(Tokenization {
            tokens,
            len: text.len(),
        })
    }

    fn scan(&self, fixture: &str, text: &str) -> Result<Vec<Token>> {
        let grammar = &*self.grammar;
        let mut out = TokenSink::new(fixture, self.limits.max_tokens);
        let mut stack: Vec<Frame> = Vec::new();
        let mut pos = 0;

        while pos < text.len() {
            let (patterns, end, scopes) = match stack.last() {
                Some(frame) => (frame.patterns, Some(frame.end), frame.scopes.as_slice()),
                None => (grammar.patterns(), None, &[] as &[ScopeName]),
            };

            let Some(next) = next_match(grammar, text, pos, end, patterns) else {
                out.push(pos, text.len(), scopes)?;
                break;
            };

            out.push(pos, next.start, scopes)?;
            match next.action {
                Action::End => {
                    if let Some(frame) = stack.last() {
                        out.push_captures(text, frame.end, &next, scopes, frame.end_captures)?;
                    }
                    stack.pop();
                }
                Action::Match(id) => {
                    let Rule::Match { regex, scope, captures } = grammar.rule(id) else {
                        unreachable!("match action on a region rule");
                    };
                    let scoped = with_scope(scopes, scope.as_ref());
                    out.push_captures(text, regex, &next, &scoped, captures)?;
                }
                Action::Begin(id) => {
                    let Rule::Region {
                        begin,
                        end,
                        patterns,
                        scope,
                        begin_captures,
                        end_captures,
                    } = grammar.rule(id)
                    else {
                        unreachable!("begin action on a match rule");
                    };
                    if stack.len() >= self.limits.max_depth {
                        return Err(ScopesnapError::tokenize(
                            fixture,
                            format!(
                                "region nesting exceeds {} at byte {}",
                                self.limits.max_depth, next.start
                            ),
                        ));
                    }
                    let scoped = with_scope(scopes, scope.as_ref());
                    out.push_captures(text, begin, &next, &scoped, begin_captures)?;
                    stack.push(Frame {
                        end,
                        end_captures: end_captures.as_slice(),
                        patterns: patterns.as_slice(),
                        scopes: scoped,
                    });
                }
            }
            pos = next.end;
        }

        Ok(out.tokens)
    }
}

/// Convenience entry point: resolve `grammar_id` and tokenize `text` with
/// default limits.
pub fn tokenize(registry: &GrammarRegistry, grammar_id: &str, text: &str) -> Result<Tokenization> {
    Tokenizer::for_grammar(registry, grammar_id, TokenizerLimits::default())?
        .tokenize(grammar_id, text)
}

// =====================
// Internal - Scanner state
// =====================

struct Frame<'g> {
    end: &'g Regex,
    end_captures: &'g [Capture],
    patterns: &'g [RuleId],
    scopes: Vec<ScopeName>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    End,
    Match(RuleId),
    Begin(RuleId),
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    start: usize,
    end: usize,
    action: Action,
}

fn next_match(
    grammar: &Grammar,
    text: &str,
    pos: usize,
    end: Option<&Regex>,
    patterns: &[RuleId],
) -> Option<Candidate> {
    // A zero-width end is allowed: it closes the region without consuming text.
    let mut best = end.and_then(|re| re.find_at(text, pos)).map(|m| Candidate {
        start: m.start(),
        end: m.end(),
        action: Action::End,
    });

    for &id in patterns {
        if best.is_some_and(|b| b.start == pos) {
            break;
        }
        let (regex, action) = match grammar.rule(id) {
            Rule::Match { regex, .. } => (regex, Action::Match(id)),
            Rule::Region { begin, .. } => (begin, Action::Begin(id)),
        };
        if let Some((start, end)) = find_non_empty(regex, text, pos) {
            if best.map_or(true, |b| start < b.start) {
                best = Some(Candidate { start, end, action });
            }
        }
    }
    best
}

/// First non-empty match at or after `from`.
fn find_non_empty(regex: &Regex, text: &str, from: usize) -> Option<(usize, usize)> {
    let mut at = from;
    while at <= text.len() {
        let m = regex.find_at(text, at)?;
        if !m.is_empty() {
            return Some((m.start(), m.end()));
        }
        let step = text[m.start()..].chars().next().map_or(1, char::len_utf8);
        at = m.start() + step;
    }
    None
}

fn with_scope(scopes: &[ScopeName], scope: Option<&ScopeName>) -> Vec<ScopeName> {
    let mut out = scopes.to_vec();
    if let Some(scope) = scope {
        if !out.contains(scope) {
            out.push(scope.clone());
        }
    }
    out
}

struct TokenSink<'a> {
    fixture: &'a str,
    max_tokens: usize,
    tokens: Vec<Token>,
}

impl<'a> TokenSink<'a> {
    fn new(fixture: &'a str, max_tokens: usize) -> Self {
        Self {
            fixture,
            max_tokens,
            tokens: Vec::new(),
        }
    }

    fn push(&mut self, start: usize, end: usize, scopes: &[ScopeName]) -> Result<()> {
        if start >= end {
            return Ok(());
        }
        if let Some(last) = self.tokens.last_mut() {
            if last.end == start && last.scopes == scopes {
                last.end = end;
                return Ok(());
            }
        }
        if self.tokens.len() >= self.max_tokens {
            return Err(ScopesnapError::tokenize(
                self.fixture,
                format!("more than {} tokens produced", self.max_tokens),
            ));
        }
        self.tokens.push(Token::new(start, end, scopes.to_vec()));
        Ok(())
    }

    /// Pushes the matched range of `candidate`, split by the scoped capture
    /// groups of `regex`.
    fn push_captures(
        &mut self,
        text: &str,
        regex: &Regex,
        candidate: &Candidate,
        scopes: &[ScopeName],
        captures: &[Capture],
    ) -> Result<()> {
        let (start, end) = (candidate.start, candidate.end);
        if captures.is_empty() {
            return self.push(start, end, scopes);
        }
        let Some(caps) = regex
            .captures_at(text, start)
            .filter(|caps| caps.get(0).is_some_and(|m| m.range() == (start..end)))
        else {
            return self.push(start, end, scopes);
        };

        let mut groups: Vec<(usize, usize, &ScopeName)> = captures
            .iter()
            .filter_map(|(group, scope)| caps.get(*group).map(|m| (m.start(), m.end(), scope)))
            .filter(|(s, e, _)| s < e)
            .collect();
        groups.sort_by_key(|&(s, e, _)| (s, Reverse(e)));

        let mut pos = start;
        for (group_start, group_end, scope) in groups {
            if group_start < pos {
                continue;
            }
            self.push(pos, group_start, scopes)?;
            self.push(group_start, group_end, &with_scope(scopes, Some(scope)))?;
            pos = group_end;
        }
        self.push(pos, end, scopes)
    }
}

pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        return (*s).to_string();
    }
    if let Some(s) = payload.downcast_ref::<String>() {
        return s.clone();
    }
    "unknown panic".to_string()
}
