//! Undo/redo history for a document
//!
//! Each undo unit is a batch of [`EditOperation`]s plus the selections before
//! and after it. Typed characters coalesce into the open unit while they stay
//! contiguous, arrive within [`COALESCE_WINDOW`] of each other, and do not
//! start a new word. A newline, a non-typing edit, an undo/redo, or a
//! [`History::seal`] call closes the unit.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use tracing::trace;

use super::buffer::{self, TextBuffer};
use super::selection::Selection;

/// Maximum number of undo units kept
const HISTORY_LIMIT: usize = 1000;

/// Maximum pause between keystrokes that still coalesce
pub const COALESCE_WINDOW: Duration = Duration::from_millis(1000);

/// A reversible buffer mutation
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EditOperation {
    Insert { offset: usize, text: String },
    /// `text` is the removed content, kept so the delete can be inverted
    Delete { offset: usize, text: String },
}

impl EditOperation {
    pub fn inverse(&self) -> Self {
        match self {
            EditOperation::Insert { offset, text } => EditOperation::Delete {
                offset: *offset,
                text: text.clone(),
            },
            EditOperation::Delete { offset, text } => EditOperation::Insert {
                offset: *offset,
                text: text.clone(),
            },
        }
    }

    pub fn apply(&self, buffer: &mut TextBuffer) -> buffer::Result<()> {
        match self {
            EditOperation::Insert { offset, text } => buffer.insert(*offset, text),
            EditOperation::Delete { offset, text } => {
                let end = offset + text.chars().count();
                buffer.delete(*offset..end).map(|_| ())
            }
        }
    }

    pub fn offset(&self) -> usize {
        match self {
            EditOperation::Insert { offset, .. } | EditOperation::Delete { offset, .. } => *offset,
        }
    }

    pub fn text(&self) -> &str {
        match self {
            EditOperation::Insert { text, .. } | EditOperation::Delete { text, .. } => text,
        }
    }
}

/// How an edit was produced, for coalescing
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EditKind {
    /// Characters typed at the caret
    Typing,
    /// Everything else: paste, cut, newline, delete, replace
    Command,
}

/// One undo unit
#[derive(Clone, Debug)]
pub struct EditBatch {
    pub ops: Vec<EditOperation>,
    pub before: Selection,
    pub after: Selection,
}

/// Operations to apply for an undo or redo step
#[derive(Clone, Debug)]
pub struct Replay {
    pub ops: Vec<EditOperation>,
    pub selection: Selection,
}

/// State of the unit still accepting typed characters
#[derive(Clone, Copy, Debug)]
struct TypingRun {
    end: usize,
    last_char: char,
    at: Instant,
}

#[derive(Debug)]
pub struct History {
    undo: VecDeque<EditBatch>,
    redo: Vec<EditBatch>,
    run: Option<TypingRun>,
    max_entries: usize,
}

impl Default for History {
    fn default() -> Self {
        Self::new()
    }
}

impl History {
    pub fn new() -> Self {
        Self {
            undo: VecDeque::new(),
            redo: Vec::new(),
            run: None,
            max_entries: HISTORY_LIMIT,
        }
    }

    /// Record a committed batch. Clears the redo list.
    pub fn record(
        &mut self,
        ops: Vec<EditOperation>,
        kind: EditKind,
        before: Selection,
        after: Selection,
        now: Instant,
    ) {
        if ops.is_empty() {
            return;
        }
        self.redo.clear();

        let typed = match (kind, ops.last()) {
            (EditKind::Typing, Some(EditOperation::Insert { offset, text }))
                if !text.is_empty() && !text.contains(['\n', '\r']) =>
            {
                Some((*offset, text.clone()))
            }
            _ => None,
        };

        let Some((offset, text)) = typed else {
            trace!(target: "editor.history", ops = ops.len(), "record command batch");
            self.run = None;
            self.push(EditBatch { ops, before, after });
            return;
        };

        let next_run = TypingRun {
            end: offset + text.chars().count(),
            last_char: text.chars().last().unwrap_or(' '),
            at: now,
        };

        if self.continues_run(offset, &text, now) {
            if let Some(top) = self.undo.back_mut() {
                trace!(target: "editor.history", offset, "coalesce typing");
                top.ops.extend(ops);
                top.after = after;
                self.run = Some(next_run);
                return;
            }
        }

        trace!(target: "editor.history", offset, "start typing unit");
        self.push(EditBatch { ops, before, after });
        self.run = Some(next_run);
    }

    fn continues_run(&self, offset: usize, text: &str, now: Instant) -> bool {
        let Some(run) = self.run else {
            return false;
        };
        if offset != run.end || now.saturating_duration_since(run.at) > COALESCE_WINDOW {
            return false;
        }
        let starts_word_gap = text.starts_with(char::is_whitespace);
        !(starts_word_gap && !run.last_char.is_whitespace())
    }

    fn push(&mut self, batch: EditBatch) {
        self.undo.push_back(batch);
        while self.undo.len() > self.max_entries {
            self.undo.pop_front();
        }
    }

    /// Close the open typing unit
    pub fn seal(&mut self) {
        self.run = None;
    }

    /// Pop the newest unit and return its inverse, most recent op first.
    /// Returns `None` when there is nothing to undo.
    pub fn undo(&mut self) -> Option<Replay> {
        let batch = self.undo.pop_back()?;
        self.run = None;
        let replay = Replay {
            ops: batch.ops.iter().rev().map(EditOperation::inverse).collect(),
            selection: batch.before,
        };
        self.redo.push(batch);
        Some(replay)
    }

    pub fn redo(&mut self) -> Option<Replay> {
        let batch = self.redo.pop()?;
        self.run = None;
        let replay = Replay {
            ops: batch.ops.clone(),
            selection: batch.after,
        };
        self.undo.push_back(batch);
        Some(replay)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    pub fn undo_len(&self) -> usize {
        self.undo.len()
    }

    pub fn redo_len(&self) -> usize {
        self.redo.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn typed(history: &mut History, buf: &mut TextBuffer, at: usize, text: &str, now: Instant) {
        let op = EditOperation::Insert {
            offset: at,
            text: text.to_string(),
        };
        op.apply(buf).unwrap();
        let after = Selection::point(at + text.chars().count());
        history.record(vec![op], EditKind::Typing, Selection::point(at), after, now);
    }

    fn replay(buf: &mut TextBuffer, replay: Replay) {
        for op in &replay.ops {
            op.apply(buf).unwrap();
        }
    }

    #[test]
    fn test_word_boundary_starts_new_unit() {
        let mut history = History::new();
        let mut buf = TextBuffer::new();
        let t0 = Instant::now();

        for (i, ch) in "hello world".chars().enumerate() {
            typed(&mut history, &mut buf, i, &ch.to_string(), t0);
        }
        assert_eq!(history.undo_len(), 2);

        replay(&mut buf, history.undo().unwrap());
        assert_eq!(buf.to_string(), "hello");
        replay(&mut buf, history.undo().unwrap());
        assert_eq!(buf.to_string(), "");
        assert!(history.undo().is_none());
    }

    #[test]
    fn test_pause_starts_new_unit() {
        let mut history = History::new();
        let mut buf = TextBuffer::new();
        let t0 = Instant::now();

        typed(&mut history, &mut buf, 0, "a", t0);
        typed(&mut history, &mut buf, 1, "b", t0 + Duration::from_millis(200));
        typed(&mut history, &mut buf, 2, "c", t0 + Duration::from_millis(1500));
        assert_eq!(history.undo_len(), 2);
    }

    #[test]
    fn test_non_contiguous_and_commands_do_not_coalesce() {
        let mut history = History::new();
        let mut buf = TextBuffer::new();
        let t0 = Instant::now();

        typed(&mut history, &mut buf, 0, "ab", t0);
        typed(&mut history, &mut buf, 0, "x", t0);
        assert_eq!(history.undo_len(), 2);

        history.seal();
        typed(&mut history, &mut buf, 1, "y", t0);
        assert_eq!(history.undo_len(), 3);

        let op = EditOperation::Insert {
            offset: 2,
            text: "\n".into(),
        };
        op.apply(&mut buf).unwrap();
        history.record(vec![op], EditKind::Typing, Selection::point(2), Selection::point(3), t0);
        typed(&mut history, &mut buf, 3, "z", t0);
        assert_eq!(history.undo_len(), 5);
    }

    #[test]
    fn test_undo_all_then_redo_all() {
        let mut history = History::new();
        let mut buf = TextBuffer::from_text("base");
        let t0 = Instant::now();

        typed(&mut history, &mut buf, 4, "!", t0);
        let del = EditOperation::Delete {
            offset: 0,
            text: "ba".into(),
        };
        del.apply(&mut buf).unwrap();
        history.record(vec![del], EditKind::Command, Selection::point(2), Selection::point(0), t0);
        typed(&mut history, &mut buf, 0, "X", t0 + Duration::from_secs(5));
        let latest = buf.to_string();
        assert_eq!(latest, "Xse!");

        while let Some(step) = history.undo() {
            replay(&mut buf, step);
        }
        assert_eq!(buf.to_string(), "base");

        while let Some(step) = history.redo() {
            replay(&mut buf, step);
        }
        assert_eq!(buf.to_string(), latest);
    }

    #[test]
    fn test_new_edit_clears_redo() {
        let mut history = History::new();
        let mut buf = TextBuffer::new();
        let t0 = Instant::now();

        typed(&mut history, &mut buf, 0, "a", t0);
        replay(&mut buf, history.undo().unwrap());
        assert!(history.can_redo());
        typed(&mut history, &mut buf, 0, "b", t0);
        assert!(!history.can_redo());
        assert!(history.redo().is_none());
    }

    #[test]
    fn test_history_limit() {
        let mut history = History::new();
        let t0 = Instant::now();
        for i in 0..(HISTORY_LIMIT + 10) {
            let op = EditOperation::Insert {
                offset: i,
                text: "\n".into(),
            };
            history.record(vec![op], EditKind::Command, Selection::default(), Selection::default(), t0);
        }
        assert_eq!(history.undo_len(), HISTORY_LIMIT);
    }
}
