//! Diagnostics for the cmdtree command engine.
//!
//! Provides [`Diagnostic`], [`Severity`], [`Span`], and [`LineIndex`] types
//! used to report dispatch failures with precise source positions, plus
//! [`caret_annotation`] for rendering a `^` marker under the offending input.
//! Diagnostic codes are defined in the [`codes`] module.

#![warn(missing_docs)]

/// Diagnostic ID constants auto-generated from the code table.
pub mod codes;

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::BTreeMap;

// ── LineIndex ────────────────────────────────────────────────────────────

/// Maps byte offsets in a source string to line and column positions.
///
/// Lines and columns are **0-indexed**. Columns are byte offsets from the
/// start of the line; use [`LineIndex::display_col`] for a character column
/// suitable for aligning a caret.
#[derive(Debug, Clone)]
pub struct LineIndex {
    /// Byte offset of the start of each line.
    /// `line_starts[0]` is always 0.
    line_starts: Vec<usize>,
}

impl LineIndex {
    /// Build a `LineIndex` from source text.
    pub fn new(text: &str) -> Self {
        let mut line_starts = vec![0usize];
        for (i, b) in text.bytes().enumerate() {
            if b == b'\n' {
                line_starts.push(i + 1);
            }
        }
        Self { line_starts }
    }

    /// Convert a byte offset to a 0-indexed `(line, column)` pair.
    ///
    /// If `offset` is past the end of the source, the last line is returned
    /// with the column measured from that line's start.
    pub fn line_col(&self, offset: usize) -> (usize, usize) {
        let line = match self.line_starts.binary_search(&offset) {
            Ok(exact) => exact,
            Err(next) => next.saturating_sub(1),
        };
        let col = offset.saturating_sub(self.line_starts[line]);
        (line, col)
    }

    /// Character column of `offset` within its line of `text`.
    pub fn display_col(&self, text: &str, offset: usize) -> usize {
        let (line, _) = self.line_col(offset);
        let start = self.line_starts[line].min(text.len());
        let end = offset.min(text.len());
        text.get(start..end).map_or(end - start, |s| s.chars().count())
    }

    /// Byte offset of the start of the given 0-indexed line.
    ///
    /// Returns `None` if `line` is out of bounds.
    pub fn line_start(&self, line: usize) -> Option<usize> {
        self.line_starts.get(line).copied()
    }

    /// Total number of lines (at least 1, even for empty input).
    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }
}

/// Severity level for a diagnostic message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[non_exhaustive]
pub enum Severity {
    /// Hard error; dispatch was aborted.
    Error,
    /// Warning: the input was accepted but may not do what was intended.
    Warn,
    /// Informational note.
    Info,
}

/// Byte span in the source input.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Span {
    /// Byte offset of the first character (0-based).
    pub start: usize,
    /// Byte offset one past the last character.
    pub end: usize,
}

impl Span {
    /// Create a span covering `[start, end)`.
    ///
    /// Panics if `end < start`.
    pub fn new(start: usize, end: usize) -> Self {
        assert!(end >= start, "Span end ({end}) < start ({start})");
        Self { start, end }
    }

    /// Create a zero-width span at the given position.
    pub fn empty(pos: usize) -> Self {
        Self {
            start: pos,
            end: pos,
        }
    }

    /// Length of the span in bytes.
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// Whether the span covers no bytes.
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// A diagnostic message produced from a dispatch failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Unique diagnostic code (e.g., `"CMD1101"`).
    pub id: Cow<'static, str>,
    /// Severity level.
    pub severity: Severity,
    /// Human-readable diagnostic message.
    pub message: String,
    /// Optional byte span in the source input that this diagnostic relates to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub span: Option<Span>,
    /// Machine-readable context for tooling. Keys and values are free-form strings.
    ///
    /// Uses `BTreeMap` for deterministic key ordering in serialized output.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<BTreeMap<String, String>>,
}

impl Diagnostic {
    /// Create a diagnostic with the given fields.
    pub fn new(
        id: impl Into<Cow<'static, str>>,
        severity: Severity,
        message: impl Into<String>,
        span: Option<Span>,
    ) -> Self {
        Self {
            id: id.into(),
            severity,
            message: message.into(),
            span,
            context: None,
        }
    }

    /// Create a diagnostic whose severity is the code's default severity
    /// (falling back to `Error` for unknown codes).
    pub fn for_code(id: &'static str, message: impl Into<String>, span: Option<Span>) -> Self {
        let severity = default_severity(id).unwrap_or(Severity::Error);
        Self::new(id, severity, message, span)
    }

    /// Shorthand for an `Error` diagnostic.
    pub fn error(
        id: impl Into<Cow<'static, str>>,
        message: impl Into<String>,
        span: Option<Span>,
    ) -> Self {
        Self::new(id, Severity::Error, message, span)
    }

    /// Shorthand for an `Info` diagnostic.
    pub fn info(
        id: impl Into<Cow<'static, str>>,
        message: impl Into<String>,
        span: Option<Span>,
    ) -> Self {
        Self::new(id, Severity::Info, message, span)
    }

    /// Attach machine-readable context metadata (builder pattern).
    pub fn with_context(mut self, ctx: BTreeMap<String, String>) -> Self {
        self.context = Some(ctx);
        self
    }

    /// Returns the human-readable explanation for this diagnostic's code, if available.
    pub fn explain(&self) -> Option<&'static str> {
        explain(&self.id)
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warn => write!(f, "warn"),
            Severity::Info => write!(f, "info"),
        }
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}[{}]: {}", self.severity, self.id, self.message)
    }
}

/// Returns the human-readable explanation for a diagnostic code, if known.
pub fn explain(id: &str) -> Option<&'static str> {
    include!(concat!(env!("OUT_DIR"), "/generated_explain.rs"))
}

/// Returns the default severity for a diagnostic code, if known.
pub fn default_severity(id: &str) -> Option<Severity> {
    include!(concat!(env!("OUT_DIR"), "/generated_severity.rs"))
}

// ── Caret annotation ─────────────────────────────────────────────────────

/// Render the source line containing `span` followed by a caret line that
/// marks the spanned characters.
///
/// ```text
/// give @s diamond abc
///                 ^^^
/// ```
///
/// A zero-width span (e.g. "input ended here") gets a single caret. Spans
/// are clamped to the source so truncated input never panics.
pub fn caret_annotation(source: &str, span: Span) -> String {
    let index = LineIndex::new(source);
    let start = span.start.min(source.len());
    let end = span.end.min(source.len()).max(start);
    let (line, _) = index.line_col(start);
    let line_start = index.line_start(line).unwrap_or(0);
    let line_end = source[line_start..]
        .find('\n')
        .map_or(source.len(), |i| line_start + i);
    let text = &source[line_start..line_end];

    let col = index.display_col(source, start);
    let width = source
        .get(start..end.min(line_end.max(start)))
        .map_or(0, |s| s.chars().count())
        .max(1);

    format!("{text}\n{}{}", " ".repeat(col), "^".repeat(width))
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── LineIndex ────────────────────────────────────────────────────────

    #[test]
    fn line_index_single_line() {
        let idx = LineIndex::new("hello");
        assert_eq!(idx.line_count(), 1);
        assert_eq!(idx.line_col(0), (0, 0));
        assert_eq!(idx.line_col(4), (0, 4));
    }

    #[test]
    fn line_index_two_lines() {
        let idx = LineIndex::new("ab\ncd");
        assert_eq!(idx.line_count(), 2);
        assert_eq!(idx.line_col(2), (0, 2)); // '\n'
        assert_eq!(idx.line_col(3), (1, 0)); // 'c'
    }

    #[test]
    fn line_index_display_col_counts_chars() {
        // 'é' is 2 bytes in UTF-8
        let text = "é x";
        let idx = LineIndex::new(text);
        assert_eq!(idx.line_col(3), (0, 3));
        assert_eq!(idx.display_col(text, 3), 2);
    }

    #[test]
    fn line_index_offset_past_end() {
        let idx = LineIndex::new("hi");
        assert_eq!(idx.line_col(100), (0, 100));
    }

    // ── Span ────────────────────────────────────────────────────────────

    #[test]
    fn span_len_and_empty() {
        assert_eq!(Span::new(5, 10).len(), 5);
        assert!(Span::empty(7).is_empty());
    }

    #[test]
    #[should_panic(expected = "Span end (3) < start (5)")]
    fn span_new_inverted_panics() {
        Span::new(5, 3);
    }

    // ── Diagnostic ──────────────────────────────────────────────────────

    #[test]
    fn diagnostic_display() {
        let d = Diagnostic::error(codes::INVALID_INTEGER, "expected an integer, found 'abc'", None);
        assert_eq!(
            format!("{d}"),
            "error[CMD1101]: expected an integer, found 'abc'"
        );
    }

    #[test]
    fn for_code_uses_default_severity() {
        let d = Diagnostic::for_code(codes::SENDABLE_MESSAGE, "hello", None);
        assert_eq!(d.severity, Severity::Info);
        let d = Diagnostic::for_code(codes::UNKNOWN_COMMAND, "nope", None);
        assert_eq!(d.severity, Severity::Error);
    }

    #[test]
    fn all_codes_have_explanations() {
        let all = [
            codes::UNCLOSED_QUOTE,
            codes::INVALID_ESCAPE,
            codes::EXPECTED_WHITESPACE,
            codes::INVALID_INTEGER,
            codes::INVALID_DECIMAL,
            codes::INVALID_BOOLEAN,
            codes::MISSING_ARGUMENT,
            codes::TOO_MANY_ARGUMENTS,
            codes::UNKNOWN_COMMAND,
            codes::UNKNOWN_PARAMETER,
            codes::INVALID_VALUE,
            codes::NO_PERMISSION,
            codes::ON_COOLDOWN,
            codes::COMMAND_INVOCATION_FAILED,
            codes::SENDABLE_MESSAGE,
        ];
        for code in &all {
            assert!(
                explain(code).is_some(),
                "diagnostic code {code} has no explain() entry"
            );
            assert!(default_severity(code).is_some());
        }
    }

    #[test]
    fn diagnostic_explain_unknown() {
        let d = Diagnostic::error("UNKNOWN_CODE", "test", None);
        assert!(d.explain().is_none());
    }

    #[test]
    fn diagnostic_serde_omits_none_fields() {
        let d = Diagnostic::error(codes::MISSING_ARGUMENT, "missing", None);
        let json = serde_json::to_string(&d).unwrap();
        assert!(!json.contains("span"), "None span should be omitted: {json}");
        assert!(!json.contains("context"), "None context should be omitted: {json}");
    }

    #[test]
    fn diagnostic_context_deterministic_order() {
        let d = Diagnostic::error(codes::INVALID_VALUE, "bad", Some(Span::new(0, 3)))
            .with_context(BTreeMap::from([
                ("parameter".into(), "amount".into()),
                ("command".into(), "give".into()),
                ("input".into(), "abc".into()),
            ]));
        let json = serde_json::to_string(&d).unwrap();
        let c = json.find("\"command\"").unwrap();
        let i = json.find("\"input\"").unwrap();
        let p = json.find("\"parameter\"").unwrap();
        assert!(c < i && i < p, "keys should serialize sorted: {json}");
    }

    // ── Caret annotation ────────────────────────────────────────────────

    #[test]
    fn caret_under_token() {
        let out = caret_annotation("give @s diamond abc", Span::new(16, 19));
        assert_eq!(out, "give @s diamond abc\n                ^^^");
    }

    #[test]
    fn caret_for_empty_span_at_end() {
        let out = caret_annotation("give", Span::empty(4));
        assert_eq!(out, "give\n    ^");
    }

    #[test]
    fn caret_clamps_out_of_range_span() {
        let out = caret_annotation("ab", Span::new(10, 20));
        assert_eq!(out, "ab\n  ^");
    }

    #[test]
    fn caret_on_second_line() {
        let out = caret_annotation("first\nsecond x", Span::new(13, 14));
        assert_eq!(out, "second x\n       ^");
    }
}
