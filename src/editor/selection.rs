//! Cursor and selection model
//!
//! A selection is an (anchor, head) pair of character offsets. The head is
//! the caret; an empty selection is a plain cursor. Motions never fail: they
//! clamp into `[0, len]`.

use std::ops::Range;

use super::buffer::TextBuffer;
use super::history::EditOperation;

/// Cursor movement primitives
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Motion {
    CharLeft,
    CharRight,
    WordLeft,
    WordRight,
    LineUp,
    LineDown,
    LineStart,
    LineEnd,
    DocumentStart,
    DocumentEnd,
    PageUp(usize),
    PageDown(usize),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Selection {
    pub anchor: usize,
    pub head: usize,
    /// Column kept across vertical moves
    goal_col: Option<usize>,
}

impl Selection {
    pub fn point(offset: usize) -> Self {
        Self {
            anchor: offset,
            head: offset,
            goal_col: None,
        }
    }

    pub fn new(anchor: usize, head: usize) -> Self {
        Self {
            anchor,
            head,
            goal_col: None,
        }
    }

    pub fn cursor(&self) -> usize {
        self.head
    }

    pub fn is_empty(&self) -> bool {
        self.anchor == self.head
    }

    /// Ordered range covered by the selection
    pub fn range(&self) -> Range<usize> {
        self.anchor.min(self.head)..self.anchor.max(self.head)
    }

    pub fn len(&self) -> usize {
        self.range().len()
    }

    /// Move the head to `offset`; the anchor follows unless extending.
    pub fn move_to(&mut self, offset: usize, extend: bool) {
        self.head = offset;
        if !extend {
            self.anchor = offset;
        }
        self.goal_col = None;
    }

    pub fn collapse(&mut self) {
        self.anchor = self.head;
    }

    pub fn clamp(&mut self, len: usize) {
        self.anchor = self.anchor.min(len);
        self.head = self.head.min(len);
    }

    /// Shift both ends so they keep pointing at the same text after `op`
    pub fn remap(&mut self, op: &EditOperation) {
        self.anchor = remap_offset(self.anchor, op);
        self.head = remap_offset(self.head, op);
    }

    /// Apply `motion` against `buffer`
    pub fn apply(&mut self, buffer: &TextBuffer, motion: Motion, extend: bool) {
        self.clamp(buffer.len_chars());

        // A plain horizontal move over a selection collapses to its edge
        if !extend && !self.is_empty() {
            let edge = match motion {
                Motion::CharLeft => Some(self.range().start),
                Motion::CharRight => Some(self.range().end),
                _ => None,
            };
            if let Some(edge) = edge {
                self.move_to(edge, false);
                return;
            }
        }

        let head = self.head;
        let target = match motion {
            Motion::CharLeft => prev_char_boundary(buffer, head),
            Motion::CharRight => next_char_boundary(buffer, head),
            Motion::WordLeft => word_left(buffer, head),
            Motion::WordRight => word_right(buffer, head),
            Motion::LineUp => return self.move_vertical(buffer, -1, extend),
            Motion::LineDown => return self.move_vertical(buffer, 1, extend),
            Motion::PageUp(n) => return self.move_vertical(buffer, -(n.max(1) as isize), extend),
            Motion::PageDown(n) => return self.move_vertical(buffer, n.max(1) as isize, extend),
            Motion::LineStart => line_start_smart(buffer, head),
            Motion::LineEnd => {
                let line = buffer.line_of(head);
                buffer.line_start(line) + buffer.line_len(line)
            }
            Motion::DocumentStart => 0,
            Motion::DocumentEnd => buffer.len_chars(),
        };
        self.move_to(target, extend);
    }

    fn move_vertical(&mut self, buffer: &TextBuffer, delta: isize, extend: bool) {
        let line = buffer.line_of(self.head);
        let col = self.head - buffer.line_start(line);
        let goal = self.goal_col.unwrap_or(col);

        let last = buffer.line_count() as isize - 1;
        let target_line = line as isize + delta;
        let target = if target_line < 0 {
            0
        } else if target_line > last {
            buffer.len_chars()
        } else {
            buffer.line_col_to_offset(target_line as usize, goal)
        };

        self.head = target;
        if !extend {
            self.anchor = target;
        }
        self.goal_col = Some(goal);
    }
}

/// Remap a single offset across an edit
pub fn remap_offset(offset: usize, op: &EditOperation) -> usize {
    match op {
        EditOperation::Insert { offset: at, text } => {
            if offset >= *at {
                offset + text.chars().count()
            } else {
                offset
            }
        }
        EditOperation::Delete { offset: at, text } => {
            let end = at + text.chars().count();
            if offset <= *at {
                offset
            } else if offset <= end {
                *at
            } else {
                offset - (end - at)
            }
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum CharClass {
    Space,
    Newline,
    Word,
    Punct,
}

fn classify(ch: char) -> CharClass {
    match ch {
        '\n' | '\r' => CharClass::Newline,
        c if c.is_whitespace() => CharClass::Space,
        c if c.is_alphanumeric() || c == '_' => CharClass::Word,
        _ => CharClass::Punct,
    }
}

fn prev_char_boundary(buffer: &TextBuffer, offset: usize) -> usize {
    if offset == 0 {
        return 0;
    }
    if offset >= 2
        && buffer.char_at(offset - 1) == Some('\n')
        && buffer.char_at(offset - 2) == Some('\r')
    {
        return offset - 2;
    }
    offset - 1
}

fn next_char_boundary(buffer: &TextBuffer, offset: usize) -> usize {
    let len = buffer.len_chars();
    if offset >= len {
        return len;
    }
    if buffer.char_at(offset) == Some('\r') && buffer.char_at(offset + 1) == Some('\n') {
        return offset + 2;
    }
    offset + 1
}

fn word_right(buffer: &TextBuffer, offset: usize) -> usize {
    let len = buffer.len_chars();
    let mut pos = offset;
    let Some(first) = buffer.char_at(pos) else {
        return len;
    };

    let class = classify(first);
    if class == CharClass::Newline {
        return next_char_boundary(buffer, pos);
    }
    if class != CharClass::Space {
        while buffer.char_at(pos).map(classify) == Some(class) {
            pos += 1;
        }
    }
    while buffer.char_at(pos).map(classify) == Some(CharClass::Space) {
        pos += 1;
    }
    pos
}

fn word_left(buffer: &TextBuffer, offset: usize) -> usize {
    let mut pos = offset;
    while pos > 0 && buffer.char_at(pos - 1).map(classify) == Some(CharClass::Space) {
        pos -= 1;
    }
    let Some(prev) = pos.checked_sub(1).and_then(|p| buffer.char_at(p)) else {
        return 0;
    };

    let class = classify(prev);
    if class == CharClass::Newline {
        return prev_char_boundary(buffer, pos);
    }
    while pos > 0 && buffer.char_at(pos - 1).map(classify) == Some(class) {
        pos -= 1;
    }
    pos
}

/// First non-blank column of the line, or column 0 when already there
fn line_start_smart(buffer: &TextBuffer, offset: usize) -> usize {
    let line = buffer.line_of(offset);
    let start = buffer.line_start(line);
    let end = start + buffer.line_len(line);
    let mut first = start;
    while first < end && buffer.char_at(first).map(classify) == Some(CharClass::Space) {
        first += 1;
    }
    if offset == first {
        start
    } else {
        first
    }
}
