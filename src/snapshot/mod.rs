//! # Snapshots
//!
//! A snapshot is the committed, expected tokenization of one fixture. It is
//! written as line-oriented text so that it diffs well in review:
//!
//! ```text
//! # scopesnap snapshot v1
//! grammar	go
//! source	12	sha256:<hex>
//! tokens	2
//! 0..7	keyword	"package"
//! 8..12	identifier	"main"
//! ```
//!
//! Fields are tab-separated and always in this order. Only scoped tokens are
//! recorded; unscoped text is implied by the offsets. Token text is written
//! as a JSON string literal so that control characters and tabs stay on one
//! line.

use std::fmt;

use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::token::{check_sequence, ScopeName, Token};

mod compare;
mod store;

pub use compare::{compare, compare_tokens, Comparison, Mismatch, SnapshotComparison};
pub use store::{SnapshotStore, WriteStatus};

pub const HEADER: &str = "# scopesnap snapshot v1";

/// Line number of the first token record; the four header records precede it.
const FIRST_TOKEN_LINE: usize = 5;

/// One recorded token together with the source text it covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotEntry {
    pub token: Token,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub grammar: String,
    pub source_len: usize,
    /// Lowercase hex SHA-256 of the fixture.
    pub source_digest: String,
    pub entries: Vec<SnapshotEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("line {line}: {message}")]
pub struct SnapshotParseError {
    pub line: usize,
    pub message: String,
}

impl Snapshot {
    /// Captures the scoped tokens of `tokens` against `source`.
    ///
    /// `tokens` must index into `source`; ranges that fall outside it or off
    /// a char boundary record empty text.
    pub fn capture(grammar: &str, source: &str, tokens: &[Token]) -> Self {
        let entries = tokens
            .iter()
            .filter(|t| t.is_scoped())
            .map(|token| SnapshotEntry {
                text: token.text(source).unwrap_or_default().to_string(),
                token: token.clone(),
            })
            .collect();

        Self {
            grammar: grammar.to_string(),
            source_len: source.len(),
            source_digest: digest(source),
            entries,
        }
    }

    pub fn tokens(&self) -> impl Iterator<Item = &Token> {
        self.entries.iter().map(|e| &e.token)
    }

    pub fn to_tokens(&self) -> Vec<Token> {
        self.tokens().cloned().collect()
    }

    pub fn serialize(&self) -> String {
        self.to_string()
    }

    pub fn parse(input: &str) -> Result<Self, SnapshotParseError> {
        Parser::new(input).parse()
    }
}

impl fmt::Display for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{HEADER}")?;
        writeln!(f, "grammar\t{}", self.grammar)?;
        writeln!(
            f,
            "source\t{}\tsha256:{}",
            self.source_len, self.source_digest
        )?;
        writeln!(f, "tokens\t{}", self.entries.len())?;
        for entry in &self.entries {
            writeln!(
                f,
                "{}..{}\t{}\t{}",
                entry.token.start,
                entry.token.end,
                entry.token.scope_list(),
                serde_json::Value::String(entry.text.clone())
            )?;
        }
        Ok(())
    }
}

/// Lowercase hex SHA-256 of `source`.
pub fn digest(source: &str) -> String {
    format!("{:x}", Sha256::digest(source.as_bytes()))
}

// =====================
// Internal - Parsing
// =====================

struct Parser<'a> {
    lines: std::iter::Enumerate<std::str::Lines<'a>>,
    line: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            lines: input.lines().enumerate(),
            line: 0,
        }
    }

    fn parse(mut self) -> Result<Snapshot, SnapshotParseError> {
        let header = self.next_line("header")?;
        if header != HEADER {
            return Err(self.error(format!("expected `{HEADER}`, found `{header}`")));
        }

        let grammar = self.field("grammar")?.to_string();
        if grammar.is_empty() {
            return Err(self.error("grammar is empty"));
        }

        let source = self.field("source")?;
        let (len, digest) = source
            .split_once('\t')
            .ok_or_else(|| self.error("expected `source<TAB><len><TAB>sha256:<hex>`"))?;
        let source_len = self.number(len, "source length")?;
        let source_digest = digest
            .strip_prefix("sha256:")
            .filter(|hex| hex.len() == 64 && hex.chars().all(|c| matches!(c, '0'..='9' | 'a'..='f')))
            .ok_or_else(|| self.error(format!("invalid digest `{digest}`")))?
            .to_string();

        let count = self.field("tokens")?;
        let count = self.number(count, "token count")?;

        // The header count is untrusted until the lines are there to back it.
        let mut entries = Vec::new();
        for _ in 0..count {
            let line = self.next_line("token")?;
            entries.push(self.entry(line, source_len)?);
        }

        if let Some((index, extra)) = self.lines.next() {
            if !extra.is_empty() || self.lines.next().is_some() {
                self.line = index + 1;
                return Err(self.error("unexpected content after the last token"));
            }
        }

        let tokens: Vec<Token> = entries.iter().map(|e: &SnapshotEntry| e.token.clone()).collect();
        check_sequence(&tokens).map_err(|e| SnapshotParseError {
            line: FIRST_TOKEN_LINE + e.index().unwrap_or(0),
            message: e.to_string(),
        })?;

        Ok(Snapshot {
            grammar,
            source_len,
            source_digest,
            entries,
        })
    }

    fn entry(&self, line: &str, source_len: usize) -> Result<SnapshotEntry, SnapshotParseError> {
        let mut fields = line.splitn(3, '\t');
        let (Some(range), Some(scopes), Some(text)) = (fields.next(), fields.next(), fields.next())
        else {
            return Err(self.error("expected `<start>..<end><TAB><scopes><TAB><text>`"));
        };

        let (start, end) = range
            .split_once("..")
            .ok_or_else(|| self.error(format!("invalid range `{range}`")))?;
        let start = self.number(start, "token start")?;
        let end = self.number(end, "token end")?;
        if start >= end || end > source_len {
            return Err(self.error(format!(
                "range {start}..{end} is empty or outside the {source_len}-byte source"
            )));
        }

        let scopes = scopes
            .split(' ')
            .map(|s| ScopeName::parse(s).map_err(|e| self.error(e.to_string())))
            .collect::<Result<Vec<_>, _>>()?;

        let text: String = serde_json::from_str(text)
            .map_err(|e| self.error(format!("invalid token text: {e}")))?;
        if text.len() != end - start {
            return Err(self.error(format!(
                "token text is {} bytes but the range covers {}",
                text.len(),
                end - start
            )));
        }

        Ok(SnapshotEntry {
            token: Token::new(start, end, scopes),
            text,
        })
    }

    fn next_line(&mut self, what: &str) -> Result<&'a str, SnapshotParseError> {
        match self.lines.next() {
            Some((index, line)) => {
                self.line = index + 1;
                Ok(line)
            }
            None => Err(SnapshotParseError {
                line: self.line + 1,
                message: format!("unexpected end of snapshot, expected {what}"),
            }),
        }
    }

    fn field(&mut self, name: &str) -> Result<&'a str, SnapshotParseError> {
        let line = self.next_line(name)?;
        line.strip_prefix(name)
            .and_then(|rest| rest.strip_prefix('\t'))
            .ok_or_else(|| self.error(format!("expected `{name}` record, found `{line}`")))
    }

    fn number(&self, text: &str, what: &str) -> Result<usize, SnapshotParseError> {
        text.parse()
            .map_err(|_| self.error(format!("invalid {what} `{text}`")))
    }

    fn error(&self, message: impl Into<String>) -> SnapshotParseError {
        SnapshotParseError {
            line: self.line,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn scope(name: &str) -> ScopeName {
        ScopeName::parse(name).unwrap()
    }

    fn package_main() -> Snapshot {
        let tokens = vec![
            Token::new(0, 7, vec![scope("keyword")]),
            Token::new(7, 8, vec![]),
            Token::new(8, 12, vec![scope("identifier")]),
        ];
        Snapshot::capture("go", "package main", &tokens)
    }

    #[test]
    fn capture_keeps_only_scoped_tokens() {
        let snapshot = package_main();
        assert_eq!(snapshot.entries.len(), 2);
        assert_eq!(snapshot.entries[0].text, "package");
        assert_eq!(snapshot.entries[1].text, "main");
        assert_eq!(snapshot.source_len, 12);
    }

    #[test]
    fn serializes_in_a_fixed_layout() {
        let text = package_main().serialize();
        let expected = format!(
            "# scopesnap snapshot v1\ngrammar\tgo\nsource\t12\tsha256:{}\ntokens\t2\n0..7\tkeyword\t\"package\"\n8..12\tidentifier\t\"main\"\n",
            digest("package main")
        );
        assert_eq!(text, expected);
    }

    #[test]
    fn parse_restores_the_token_sequence() {
        let snapshot = package_main();
        let parsed = Snapshot::parse(&snapshot.serialize()).unwrap();
        assert_eq!(parsed.to_tokens(), snapshot.to_tokens());
        assert_eq!(parsed, snapshot);
    }

    #[test]
    fn control_characters_stay_on_one_line() {
        let source = "\"a\tb\"\n";
        let tokens = vec![
            Token::new(0, 5, vec![scope("string.quoted.double")]),
            Token::new(5, 6, vec![]),
        ];
        let snapshot = Snapshot::capture("go", source, &tokens);
        let text = snapshot.serialize();
        assert_eq!(text.lines().count(), 5);
        assert!(text.ends_with("0..5\tstring.quoted.double\t\"\\\"a\\tb\\\"\"\n"));
        assert_eq!(Snapshot::parse(&text).unwrap(), snapshot);
    }

    #[test]
    fn digest_is_lowercase_hex_sha256() {
        assert_eq!(
            digest(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn rejects_unknown_versions() {
        let err = Snapshot::parse("# scopesnap snapshot v2\n").unwrap_err();
        assert_eq!(err.line, 1);
    }

    #[test]
    fn rejects_token_count_disagreeing_with_header() {
        let text = package_main().serialize().replace("tokens\t2", "tokens\t3");
        let err = Snapshot::parse(&text).unwrap_err();
        assert_eq!(err.line, 7);
        assert!(err.message.contains("unexpected end"));

        let text = package_main().serialize().replace("tokens\t2", "tokens\t1");
        let err = Snapshot::parse(&text).unwrap_err();
        assert!(err.message.contains("after the last token"));
    }

    #[test]
    fn huge_token_counts_fail_at_the_end_of_input() {
        for count in [(usize::MAX / 2).to_string(), "1000000000000".to_string()] {
            let text = package_main()
                .serialize()
                .replace("tokens\t2", &format!("tokens\t{count}"));
            let err = Snapshot::parse(&text).unwrap_err();
            assert_eq!(err.line, 7);
            assert!(err.message.contains("unexpected end"), "{}", err.message);
        }
    }

    #[test]
    fn rejects_text_that_does_not_fit_the_range() {
        let text = package_main()
            .serialize()
            .replace("\"main\"", "\"mains\"");
        let err = Snapshot::parse(&text).unwrap_err();
        assert_eq!(err.line, 6);
        assert!(err.message.contains("5 bytes"));
    }

    #[test]
    fn rejects_overlapping_tokens() {
        let text = package_main().serialize().replace("8..12", "6..10");
        let err = Snapshot::parse(&text).unwrap_err();
        assert!(err.message.contains("overlaps"));
    }

    #[test]
    fn rejects_unknown_scope_tags() {
        let text = package_main()
            .serialize()
            .replace("\tidentifier\t", "\tcolour\t");
        let err = Snapshot::parse(&text).unwrap_err();
        assert!(err.message.contains("unknown tag"));
    }
}
