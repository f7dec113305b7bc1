//! Cursor-based readers over command input.
//!
//! [`StringStream`] is an immutable snapshot (peek only); [`MutableStringStream`]
//! owns a cursor that reads advance destructively. Both share the same
//! `Arc<str>` source, so converting between them only copies the cursor.
//!
//! Positions are byte offsets into the source and always sit on a `char`
//! boundary. Counts passed to `peek_n`/`read_n`/`can_read` are in characters.

use std::ops::Deref;
use std::sync::Arc;

use crate::error::CommandError;

const ESCAPE: char = '\\';
const DOUBLE_QUOTE: char = '"';

// ── StringStream ─────────────────────────────────────────────────────────

/// A read-only view of command input at a fixed cursor position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StringStream {
    source: Arc<str>,
    pos: usize,
}

impl StringStream {
    /// Create a stream positioned at the start of `source`.
    pub fn new(source: impl Into<Arc<str>>) -> Self {
        Self {
            source: source.into(),
            pos: 0,
        }
    }

    /// Create a stream over `source` positioned at byte offset `pos`.
    ///
    /// The position is clamped to the source length and moved back to the
    /// nearest `char` boundary.
    pub fn at(source: Arc<str>, pos: usize) -> Self {
        let mut pos = pos.min(source.len());
        while !source.is_char_boundary(pos) {
            pos -= 1;
        }
        Self { source, pos }
    }

    /// The full source text, independent of the cursor.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Shared handle to the source text.
    pub fn shared_source(&self) -> Arc<str> {
        Arc::clone(&self.source)
    }

    /// Current cursor position (byte offset).
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Number of bytes left after the cursor.
    pub fn remaining(&self) -> usize {
        self.source.len() - self.pos
    }

    /// Whether at least one character is left.
    pub fn has_remaining(&self) -> bool {
        self.pos < self.source.len()
    }

    /// Whether the cursor is at the end of the input.
    pub fn has_finished(&self) -> bool {
        !self.has_remaining()
    }

    /// Whether at least `n` more characters can be read.
    pub fn can_read(&self, n: usize) -> bool {
        n == 0 || self.rest().chars().nth(n - 1).is_some()
    }

    /// Whether the source text is empty.
    pub fn is_empty(&self) -> bool {
        self.source.is_empty()
    }

    /// Text between the start of the source and the cursor.
    pub fn consumed(&self) -> &str {
        &self.source[..self.pos]
    }

    /// The next character, without advancing.
    pub fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    /// Up to `n` characters after the cursor, without advancing.
    ///
    /// Returns the whole remainder when fewer than `n` characters are left.
    pub fn peek_n(&self, n: usize) -> &str {
        let rest = self.rest();
        &rest[..byte_len_of_chars(rest, n)]
    }

    /// The character `k` positions after the cursor (`k = 0` is [`peek`](Self::peek)).
    pub fn peek_offset(&self, k: usize) -> Option<char> {
        self.rest().chars().nth(k)
    }

    /// Everything after the cursor, without advancing.
    pub fn peek_remaining(&self) -> &str {
        self.rest()
    }

    /// The next whitespace-delimited word, without advancing.
    pub fn peek_unquoted_string(&self) -> &str {
        let rest = self.rest();
        let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
        &rest[..end]
    }

    /// The next string token as [`MutableStringStream::read_string`] would
    /// read it, without advancing.
    pub fn peek_string(&self) -> Result<String, CommandError> {
        self.to_mutable().read_string()
    }

    /// A mutable stream sharing this source, starting at the same cursor.
    pub fn to_mutable(&self) -> MutableStringStream {
        MutableStringStream {
            inner: self.clone(),
        }
    }

    fn rest(&self) -> &str {
        &self.source[self.pos..]
    }
}

fn byte_len_of_chars(s: &str, n: usize) -> usize {
    s.char_indices().nth(n).map_or(s.len(), |(i, _)| i)
}

// ── MutableStringStream ──────────────────────────────────────────────────

/// A stream whose reads advance the cursor.
///
/// Dereferences to [`StringStream`] for all non-destructive operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutableStringStream {
    inner: StringStream,
}

impl Deref for MutableStringStream {
    type Target = StringStream;

    fn deref(&self) -> &StringStream {
        &self.inner
    }
}

impl From<&str> for MutableStringStream {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl MutableStringStream {
    /// Create a mutable stream positioned at the start of `source`.
    pub fn new(source: impl Into<Arc<str>>) -> Self {
        Self {
            inner: StringStream::new(source),
        }
    }

    /// A read-only snapshot at the current cursor.
    pub fn to_immutable(&self) -> StringStream {
        self.inner.clone()
    }

    /// Move the cursor to byte offset `pos` (clamped to a valid boundary).
    pub fn set_position(&mut self, pos: usize) {
        self.inner = StringStream::at(self.inner.shared_source(), pos);
    }

    /// Read one character.
    pub fn read(&mut self) -> Option<char> {
        let c = self.inner.peek()?;
        self.inner.pos += c.len_utf8();
        Some(c)
    }

    /// Read up to `n` characters. Reads whatever is left, without failing,
    /// when fewer than `n` remain.
    pub fn read_n(&mut self, n: usize) -> String {
        let len = byte_len_of_chars(self.inner.rest(), n);
        self.take_bytes(len)
    }

    /// Advance past `n` characters (or to the end).
    pub fn move_forward(&mut self, n: usize) {
        let len = byte_len_of_chars(self.inner.rest(), n);
        self.inner.pos += len;
    }

    /// Move the cursor back by `n` characters (stopping at the start).
    pub fn move_backward(&mut self, n: usize) {
        let consumed = self.inner.consumed();
        let back = consumed
            .char_indices()
            .rev()
            .nth(n.saturating_sub(1))
            .map_or(0, |(i, _)| i);
        if n > 0 {
            self.inner.pos = back;
        }
    }

    /// Skip consecutive whitespace characters (the same set
    /// [`read_unquoted_string`](Self::read_unquoted_string) stops at).
    pub fn skip_whitespace(&mut self) {
        let rest = self.inner.rest();
        let len = rest.find(|c: char| !c.is_whitespace()).unwrap_or(rest.len());
        self.inner.pos += len;
    }

    /// Read everything up to the end and leave the stream finished.
    pub fn consume_remaining(&mut self) -> String {
        let len = self.inner.remaining();
        self.take_bytes(len)
    }

    /// Move the cursor to the end without reading.
    pub fn skip_to_end(&mut self) {
        self.inner.pos = self.inner.source.len();
    }

    /// Read characters while `predicate` holds.
    pub fn read_while(&mut self, mut predicate: impl FnMut(char) -> bool) -> String {
        let rest = self.inner.rest();
        let len = rest.find(|c| !predicate(c)).unwrap_or(rest.len());
        self.take_bytes(len)
    }

    /// Read until the next whitespace character.
    pub fn read_unquoted_string(&mut self) -> String {
        self.read_while(|c| !c.is_whitespace())
    }

    /// Read until an unescaped `delimiter`, consuming the delimiter.
    ///
    /// A backslash escapes the delimiter or another backslash. Any other
    /// escaped character fails with [`CommandError::InvalidEscapeCharacter`]
    /// and leaves the cursor on that character. Reaching the end without
    /// seeing the delimiter fails with [`CommandError::UnclosedQuote`].
    pub fn read_until(&mut self, delimiter: char) -> Result<String, CommandError> {
        let mut result = String::new();
        let mut escaped = false;
        while let Some(c) = self.read() {
            if escaped {
                if c == delimiter || c == ESCAPE {
                    result.push(c);
                    escaped = false;
                } else {
                    self.move_backward(1);
                    return Err(CommandError::InvalidEscapeCharacter(c));
                }
            } else if c == ESCAPE {
                escaped = true;
            } else if c == delimiter {
                return Ok(result);
            } else {
                result.push(c);
            }
        }
        Err(CommandError::UnclosedQuote)
    }

    /// Read a double-quoted string (quotes removed, escapes applied), or an
    /// unquoted word if the next character is not a quote.
    pub fn read_string(&mut self) -> Result<String, CommandError> {
        if self.inner.peek() == Some(DOUBLE_QUOTE) {
            self.move_forward(1);
            self.read_until(DOUBLE_QUOTE)
        } else {
            Ok(self.read_unquoted_string())
        }
    }

    /// Read an `i8`, reverting the cursor on failure.
    pub fn read_byte(&mut self) -> Result<i8, CommandError> {
        self.read_integer()
    }

    /// Read an `i16`, reverting the cursor on failure.
    pub fn read_short(&mut self) -> Result<i16, CommandError> {
        self.read_integer()
    }

    /// Read an `i32`, reverting the cursor on failure.
    pub fn read_int(&mut self) -> Result<i32, CommandError> {
        self.read_integer()
    }

    /// Read an `i64`, reverting the cursor on failure.
    pub fn read_long(&mut self) -> Result<i64, CommandError> {
        self.read_integer()
    }

    /// Read a finite `f32`, reverting the cursor on failure.
    pub fn read_float(&mut self) -> Result<f32, CommandError> {
        self.read_decimal::<f32>(|v| v.is_finite())
    }

    /// Read a finite `f64`, reverting the cursor on failure.
    pub fn read_double(&mut self) -> Result<f64, CommandError> {
        self.read_decimal::<f64>(|v| v.is_finite())
    }

    /// Read a boolean word: `true`/`yes` or `false`/`no`/`nope`, any case.
    pub fn read_boolean(&mut self) -> Result<bool, CommandError> {
        let start = self.inner.pos;
        let word = self.read_string()?;
        match word.to_lowercase().as_str() {
            "true" | "yes" => Ok(true),
            "false" | "no" | "nope" => Ok(false),
            _ => {
                self.inner.pos = start;
                Err(CommandError::InvalidBoolean { input: word })
            }
        }
    }

    fn read_integer<T: std::str::FromStr>(&mut self) -> Result<T, CommandError> {
        let start = self.inner.pos;
        let word = self.read_unquoted_string();
        word.parse().map_err(|_| {
            self.inner.pos = start;
            CommandError::InvalidInteger { input: word.clone() }
        })
    }

    fn read_decimal<T: std::str::FromStr>(
        &mut self,
        finite: impl Fn(&T) -> bool,
    ) -> Result<T, CommandError> {
        let start = self.inner.pos;
        let word = self.read_unquoted_string();
        match word.parse::<T>() {
            Ok(v) if finite(&v) => Ok(v),
            _ => {
                self.inner.pos = start;
                Err(CommandError::InvalidDecimal { input: word })
            }
        }
    }

    fn take_bytes(&mut self, len: usize) -> String {
        let start = self.inner.pos;
        self.inner.pos += len;
        self.inner.source[start..start + len].to_string()
    }
}

/// Quote `text` so that [`MutableStringStream::read_string`] reads it back
/// unchanged: wraps it in double quotes and escapes `"` and `\`.
pub fn quote(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push(DOUBLE_QUOTE);
    for c in text.chars() {
        if c == DOUBLE_QUOTE || c == ESCAPE {
            out.push(ESCAPE);
        }
        out.push(c);
    }
    out.push(DOUBLE_QUOTE);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn peek_does_not_advance() {
        let s = StringStream::new("hello world");
        assert_eq!(s.peek(), Some('h'));
        assert_eq!(s.peek_n(5), "hello");
        assert_eq!(s.peek_offset(6), Some('w'));
        assert_eq!(s.peek_unquoted_string(), "hello");
        assert_eq!(s.position(), 0);
    }

    #[test]
    fn read_n_past_end_returns_rest() {
        let mut s = MutableStringStream::new("abc");
        assert!(!s.can_read(5));
        assert_eq!(s.read_n(5), "abc");
        assert!(s.has_finished());
    }

    #[test]
    fn can_read_counts_chars() {
        let s = StringStream::new("éé");
        assert!(s.can_read(2));
        assert!(!s.can_read(3));
        assert_eq!(s.remaining(), 4);
    }

    #[test]
    fn read_unquoted_stops_at_whitespace() {
        let mut s = MutableStringStream::new("give @s");
        assert_eq!(s.read_unquoted_string(), "give");
        assert_eq!(s.peek(), Some(' '));
        s.skip_whitespace();
        assert_eq!(s.read_unquoted_string(), "@s");
        assert!(s.has_finished());
    }

    #[test]
    fn skip_whitespace_covers_tabs_and_newlines() {
        let mut s = MutableStringStream::new("give\t @s\n\r\ndiamond");
        assert_eq!(s.read_unquoted_string(), "give");
        s.skip_whitespace();
        assert_eq!(s.read_unquoted_string(), "@s");
        s.skip_whitespace();
        assert_eq!(s.position(), 11);
        assert_eq!(s.read_unquoted_string(), "diamond");
        assert!(s.has_finished());
    }

    #[test]
    fn read_string_quoted_with_escapes() {
        let mut s = MutableStringStream::new(r#""say \"hi\" \\ now" rest"#);
        assert_eq!(s.read_string().unwrap(), r#"say "hi" \ now"#);
        assert_eq!(s.peek_remaining(), " rest");
    }

    #[test]
    fn unclosed_quote() {
        let mut s = MutableStringStream::new("\"never closed");
        assert!(matches!(s.read_string(), Err(CommandError::UnclosedQuote)));
    }

    #[test]
    fn invalid_escape_rewinds_to_offending_char() {
        let mut s = MutableStringStream::new(r#""ab\xc""#);
        let err = s.read_string().unwrap_err();
        assert!(matches!(err, CommandError::InvalidEscapeCharacter('x')));
        assert_eq!(s.position(), 4);
        assert_eq!(s.peek(), Some('x'));
    }

    #[test]
    fn read_until_custom_delimiter() {
        let mut s = MutableStringStream::new(r"a\,b,c");
        assert_eq!(s.read_until(',').unwrap(), "a,b");
        assert_eq!(s.peek_remaining(), "c");
    }

    #[test]
    fn integer_failure_reverts_cursor() {
        let mut s = MutableStringStream::new("abc 5");
        let err = s.read_int().unwrap_err();
        assert!(matches!(err, CommandError::InvalidInteger { ref input } if input == "abc"));
        assert_eq!(s.position(), 0);
    }

    #[test]
    fn integer_ranges_per_width() {
        assert_eq!(MutableStringStream::new("127").read_byte().unwrap(), 127);
        assert!(MutableStringStream::new("128").read_byte().is_err());
        assert_eq!(MutableStringStream::new("-32768").read_short().unwrap(), -32768);
        assert_eq!(
            MutableStringStream::new("9000000000").read_long().unwrap(),
            9_000_000_000
        );
        assert!(MutableStringStream::new("9000000000").read_int().is_err());
    }

    #[test]
    fn decimals_must_be_finite() {
        assert_eq!(MutableStringStream::new("2.5").read_double().unwrap(), 2.5);
        let mut s = MutableStringStream::new("inf");
        assert!(matches!(
            s.read_double(),
            Err(CommandError::InvalidDecimal { .. })
        ));
        assert_eq!(s.position(), 0);
        assert!(MutableStringStream::new("NaN").read_float().is_err());
    }

    #[test]
    fn booleans_accept_aliases() {
        for (word, expected) in [("true", true), ("YES", true), ("no", false), ("nope", false)] {
            assert_eq!(
                MutableStringStream::new(word).read_boolean().unwrap(),
                expected,
                "{word}"
            );
        }
        let mut s = MutableStringStream::new("maybe");
        assert!(matches!(
            s.read_boolean(),
            Err(CommandError::InvalidBoolean { .. })
        ));
        assert_eq!(s.position(), 0);
    }

    #[test]
    fn consume_remaining_finishes() {
        let mut s = MutableStringStream::new("say hello world");
        s.move_forward(4);
        assert_eq!(s.consume_remaining(), "hello world");
        assert!(s.has_finished());
        assert_eq!(s.consume_remaining(), "");
    }

    #[test]
    fn mutable_and_immutable_share_source() {
        let mut m = MutableStringStream::new("one two");
        m.read_unquoted_string();
        let snap = m.to_immutable();
        assert_eq!(snap.position(), 3);
        assert!(Arc::ptr_eq(&snap.shared_source(), &m.shared_source()));
        let mut again = snap.to_mutable();
        again.skip_whitespace();
        assert_eq!(again.read_unquoted_string(), "two");
        assert_eq!(snap.position(), 3);
    }

    #[test]
    fn move_backward_handles_multibyte() {
        let mut s = MutableStringStream::new("aé b");
        s.move_forward(2);
        assert_eq!(s.position(), 3);
        s.move_backward(1);
        assert_eq!(s.position(), 1);
        s.move_backward(10);
        assert_eq!(s.position(), 0);
    }

    #[test]
    fn quote_round_trips() {
        for text in ["plain", "with space", r#"a "quoted" word"#, r"back\slash", ""] {
            let quoted = quote(text);
            let mut s = MutableStringStream::new(quoted.as_str());
            assert_eq!(s.read_string().unwrap(), text);
            assert!(s.has_finished());
        }
    }
}
