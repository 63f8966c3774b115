//! Rope-backed text storage
//!
//! Offsets are character offsets into the rope. Every line except the last
//! carries its terminator (`\n`, `\r\n` or `\r`), so the buffer length always
//! equals the sum of line lengths including terminators.

use std::fmt;
use std::ops::Range;

use ropey::{Rope, RopeSlice};
use thiserror::Error;

/// Errors raised at the buffer boundary
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BufferError {
    #[error("offset {offset} is out of range (length {len})")]
    OutOfRange { offset: usize, len: usize },

    #[error("range {start}..{end} is invalid (length {len})")]
    InvalidRange { start: usize, end: usize, len: usize },

    #[error("line {line} is out of range ({count} lines)")]
    LineOutOfRange { line: usize, count: usize },
}

pub type Result<T> = std::result::Result<T, BufferError>;

/// Text content of a document
#[derive(Debug, Clone, Default)]
pub struct TextBuffer {
    rope: Rope,
}

impl TextBuffer {
    pub fn new() -> Self {
        Self { rope: Rope::new() }
    }

    pub fn from_text(text: &str) -> Self {
        Self {
            rope: Rope::from_str(text),
        }
    }

    /// Length in characters
    pub fn len_chars(&self) -> usize {
        self.rope.len_chars()
    }

    /// Length in bytes
    pub fn len_bytes(&self) -> usize {
        self.rope.len_bytes()
    }

    pub fn is_empty(&self) -> bool {
        self.rope.len_chars() == 0
    }

    /// Insert `text` before the character at `offset`
    pub fn insert(&mut self, offset: usize, text: &str) -> Result<()> {
        self.check_offset(offset)?;
        self.rope.insert(offset, text);
        Ok(())
    }

    /// Remove `range` and return the removed text
    pub fn delete(&mut self, range: Range<usize>) -> Result<String> {
        self.check_range(&range)?;
        let removed = self.rope.slice(range.clone()).to_string();
        self.rope.remove(range);
        Ok(removed)
    }

    pub fn slice(&self, range: Range<usize>) -> Result<String> {
        self.check_range(&range)?;
        Ok(self.rope.slice(range).to_string())
    }

    /// Number of lines. An empty buffer has one empty line, and a trailing
    /// terminator opens a new empty last line.
    pub fn line_count(&self) -> usize {
        self.rope.len_lines()
    }

    /// Character range of `line`, including its terminator
    pub fn line_range(&self, line: usize) -> Result<Range<usize>> {
        self.check_line(line)?;
        let start = self.rope.line_to_char(line);
        let end = start + self.rope.line(line).len_chars();
        Ok(start..end)
    }

    /// Length of `line` in characters, excluding its terminator
    pub fn line_len(&self, line: usize) -> usize {
        if line >= self.line_count() {
            return 0;
        }
        let slice = self.rope.line(line);
        slice.len_chars() - terminator_len(slice)
    }

    /// Text of `line` without its terminator
    pub fn line_text(&self, line: usize) -> Option<String> {
        if line >= self.line_count() {
            return None;
        }
        let slice = self.rope.line(line);
        let end = slice.len_chars() - terminator_len(slice);
        Some(slice.slice(..end).to_string())
    }

    /// Line index containing `offset`
    pub fn line_of(&self, offset: usize) -> usize {
        self.rope.char_to_line(offset.min(self.len_chars()))
    }

    /// First character offset of `line` (buffer end for lines past the end)
    pub fn line_start(&self, line: usize) -> usize {
        if line >= self.line_count() {
            return self.len_chars();
        }
        self.rope.line_to_char(line)
    }

    pub fn offset_to_line_col(&self, offset: usize) -> Result<(usize, usize)> {
        self.check_offset(offset)?;
        let line = self.rope.char_to_line(offset);
        Ok((line, offset - self.rope.line_to_char(line)))
    }

    /// Offset of (`line`, `col`); both clamp to the nearest valid position.
    pub fn line_col_to_offset(&self, line: usize, col: usize) -> usize {
        let line = line.min(self.line_count() - 1);
        self.rope.line_to_char(line) + col.min(self.line_len(line))
    }

    pub fn char_at(&self, offset: usize) -> Option<char> {
        (offset < self.len_chars()).then(|| self.rope.char(offset))
    }

    pub fn char_to_byte(&self, offset: usize) -> usize {
        self.rope.char_to_byte(offset.min(self.len_chars()))
    }

    pub fn byte_to_char(&self, byte: usize) -> usize {
        self.rope.byte_to_char(byte.min(self.len_bytes()))
    }

    pub fn clamp(&self, offset: usize) -> usize {
        offset.min(self.len_chars())
    }

    /// O(1) copy of the content, shared with the original until either side
    /// is modified
    pub fn snapshot(&self) -> Rope {
        self.rope.clone()
    }

    pub fn rope(&self) -> &Rope {
        &self.rope
    }

    fn check_offset(&self, offset: usize) -> Result<()> {
        let len = self.len_chars();
        if offset > len {
            return Err(BufferError::OutOfRange { offset, len });
        }
        Ok(())
    }

    fn check_range(&self, range: &Range<usize>) -> Result<()> {
        let len = self.len_chars();
        if range.start > range.end || range.end > len {
            return Err(BufferError::InvalidRange {
                start: range.start,
                end: range.end,
                len,
            });
        }
        Ok(())
    }

    fn check_line(&self, line: usize) -> Result<()> {
        let count = self.line_count();
        if line >= count {
            return Err(BufferError::LineOutOfRange { line, count });
        }
        Ok(())
    }
}

impl fmt::Display for TextBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for chunk in self.rope.chunks() {
            f.write_str(chunk)?;
        }
        Ok(())
    }
}

/// Length of the line terminator at the end of `line` (0, 1 or 2)
pub(crate) fn terminator_len(line: RopeSlice) -> usize {
    let n = line.len_chars();
    if n == 0 {
        return 0;
    }
    match line.char(n - 1) {
        '\n' if n >= 2 && line.char(n - 2) == '\r' => 2,
        '\n' | '\r' | '\u{0B}' | '\u{0C}' | '\u{85}' | '\u{2028}' | '\u{2029}' => 1,
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_empty_buffer() {
        let buf = TextBuffer::new();
        assert!(buf.is_empty());
        assert_eq!(buf.line_count(), 1);
        assert_eq!(buf.line_range(0), Ok(0..0));
        assert_eq!(buf.offset_to_line_col(0), Ok((0, 0)));
    }

    #[test]
    fn test_lines_and_terminators() {
        let buf = TextBuffer::from_text("ab\r\ncd\nef");
        assert_eq!(buf.line_count(), 3);
        assert_eq!(buf.line_range(0), Ok(0..4));
        assert_eq!(buf.line_len(0), 2);
        assert_eq!(buf.line_text(0).as_deref(), Some("ab"));
        assert_eq!(buf.line_range(2), Ok(7..9));
        assert_eq!(buf.line_len(2), 2);

        let total: usize = (0..buf.line_count())
            .map(|l| buf.line_range(l).map(|r| r.len()).unwrap_or(0))
            .sum();
        assert_eq!(total, buf.len_chars());
    }

    #[test]
    fn test_offset_conversions() {
        let buf = TextBuffer::from_text("hello\nworld");
        assert_eq!(buf.offset_to_line_col(7), Ok((1, 1)));
        assert_eq!(buf.offset_to_line_col(11), Ok((1, 5)));
        assert_eq!(buf.line_col_to_offset(0, 99), 5);
        assert_eq!(buf.line_col_to_offset(42, 0), 6);
        assert_eq!(
            buf.offset_to_line_col(12),
            Err(BufferError::OutOfRange { offset: 12, len: 11 })
        );
    }

    #[test]
    fn test_out_of_range_edits() {
        let mut buf = TextBuffer::from_text("abc");
        assert_eq!(
            buf.insert(4, "x"),
            Err(BufferError::OutOfRange { offset: 4, len: 3 })
        );
        assert!(buf.delete(2..5).is_err());
        #[allow(clippy::reversed_empty_ranges)]
        let reversed = 2..1;
        assert!(buf.delete(reversed).is_err());
        assert_eq!(buf.to_string(), "abc");
    }

    #[test]
    fn test_multibyte_offsets() {
        let mut buf = TextBuffer::from_text("añb");
        buf.insert(2, "é").unwrap();
        assert_eq!(buf.to_string(), "añéb");
        assert_eq!(buf.char_to_byte(3), 5);
        assert_eq!(buf.byte_to_char(5), 3);
        assert_eq!(buf.delete(1..3).unwrap(), "ñé");
    }

    proptest! {
        #[test]
        fn insert_then_delete_restores_content(
            base in "[a-z\n é]{0,40}",
            text in "[a-z\n ]{0,12}",
            at in 0usize..64,
        ) {
            let mut buf = TextBuffer::from_text(&base);
            let at = at.min(buf.len_chars());
            buf.insert(at, &text).unwrap();
            let inserted = text.chars().count();
            let removed = buf.delete(at..at + inserted).unwrap();
            prop_assert_eq!(removed, text);
            prop_assert_eq!(buf.to_string(), base);
        }
    }
}
