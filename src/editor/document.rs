//! Document: one buffer with its selection, history and syntax cache
//!
//! Every mutation goes through [`Document::apply_op`], which keeps the
//! selection, the syntax cache and the version counter in step with the
//! buffer. Public editing commands clamp their inputs first, so buffer
//! range errors are never expected here.

use std::fs;
use std::io;
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use thiserror::Error;
use tracing::{error, info};

use super::buffer::TextBuffer;
use super::history::{EditKind, EditOperation, History};
use super::search::{self, SearchQuery};
use super::selection::{Motion, Selection};
use super::syntax::worker::{TokenizeJob, TokenizeResult};
use super::syntax::{Language, SyntaxCache};
use super::DocumentId;
use crate::config::EditorConfig;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Document I/O errors
#[derive(Error, Debug)]
pub enum DocumentError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{path} is not valid UTF-8")]
    Encoding { path: PathBuf },

    #[error("document has no file name")]
    NoPath,
}

pub type Result<T> = std::result::Result<T, DocumentError>;

/// Line terminator style
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LineEnding {
    #[default]
    Lf,
    CrLf,
    Cr,
}

impl LineEnding {
    /// Style of the first terminator in `text`, LF when there is none
    pub fn detect(text: &str) -> Self {
        match text.find(['\n', '\r']) {
            Some(i) if text[i..].starts_with("\r\n") => LineEnding::CrLf,
            Some(i) if text[i..].starts_with('\r') => LineEnding::Cr,
            _ => LineEnding::Lf,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LineEnding::Lf => "\n",
            LineEnding::CrLf => "\r\n",
            LineEnding::Cr => "\r",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            LineEnding::Lf => "LF",
            LineEnding::CrLf => "CRLF",
            LineEnding::Cr => "CR",
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Encoding {
    #[default]
    Utf8,
    Utf8Bom,
}

impl Encoding {
    pub fn name(&self) -> &'static str {
        match self {
            Encoding::Utf8 => "UTF-8",
            Encoding::Utf8Bom => "UTF-8 BOM",
        }
    }
}

/// Whether typed text is inserted or replaces what is under the cursor
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum EditMode {
    #[default]
    Insert,
    Overwrite,
}

/// Snapshot consumed by the status line
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DocumentStatus {
    pub title: String,
    /// 1-based
    pub line: usize,
    pub total_lines: usize,
    /// 1-based, in characters
    pub column: usize,
    pub selection_len: usize,
    pub mode: EditMode,
    pub line_ending: LineEnding,
    pub encoding: Encoding,
    pub language: &'static str,
    pub dirty: bool,
}

pub struct Document {
    id: DocumentId,
    buffer: TextBuffer,
    selection: Selection,
    history: History,
    syntax: SyntaxCache,
    path: Option<PathBuf>,
    dirty: bool,
    line_ending: LineEnding,
    encoding: Encoding,
    mode: EditMode,
    /// Incremented on every buffer mutation
    version: u64,
    settings: EditorConfig,
    cancel: Arc<AtomicBool>,
    job_pending: bool,
    /// First visible line
    pub scroll_top: usize,
    /// First visible column
    pub scroll_left: usize,
}

impl Document {
    /// Create an empty, untitled document
    pub fn new(id: DocumentId, settings: EditorConfig) -> Self {
        Self::from_text(id, "", settings)
    }

    pub fn from_text(id: DocumentId, text: &str, settings: EditorConfig) -> Self {
        let buffer = TextBuffer::from_text(text);
        let syntax = SyntaxCache::new(Language::plain(), buffer.line_count());
        Self {
            id,
            line_ending: LineEnding::detect(text),
            buffer,
            selection: Selection::default(),
            history: History::new(),
            syntax,
            path: None,
            dirty: false,
            encoding: Encoding::Utf8,
            mode: EditMode::Insert,
            version: 0,
            settings,
            cancel: Arc::new(AtomicBool::new(false)),
            job_pending: false,
            scroll_top: 0,
            scroll_left: 0,
        }
    }

    /// Load a document from disk
    pub fn open(id: DocumentId, path: &Path, settings: EditorConfig) -> Result<Self> {
        let bytes = fs::read(path).map_err(|source| DocumentError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let (body, encoding) = match bytes.strip_prefix(UTF8_BOM) {
            Some(rest) => (rest, Encoding::Utf8Bom),
            None => (&bytes[..], Encoding::Utf8),
        };
        let text = std::str::from_utf8(body).map_err(|_| DocumentError::Encoding {
            path: path.to_path_buf(),
        })?;

        let mut doc = Self::from_text(id, text, settings);
        doc.encoding = encoding;
        doc.syntax.set_language(language_for(path));
        doc.path = Some(path.to_path_buf());
        info!(
            "Opened {} ({} lines, {}, {})",
            path.display(),
            doc.buffer.line_count(),
            doc.line_ending.name(),
            doc.syntax.language().name()
        );
        Ok(doc)
    }

    /// Write the buffer to its path
    pub fn save(&mut self) -> Result<()> {
        let path = self.path.clone().ok_or(DocumentError::NoPath)?;

        let mut bytes = Vec::with_capacity(self.buffer.len_bytes() + UTF8_BOM.len());
        if self.encoding == Encoding::Utf8Bom {
            bytes.extend_from_slice(UTF8_BOM);
        }
        for chunk in self.buffer.rope().chunks() {
            bytes.extend_from_slice(chunk.as_bytes());
        }

        fs::write(&path, bytes).map_err(|source| DocumentError::Write {
            path: path.clone(),
            source,
        })?;

        self.dirty = false;
        self.history.seal();
        info!("Saved {}", path.display());
        Ok(())
    }

    /// Save under a new path; the language is re-detected from it
    pub fn save_as(&mut self, path: &Path) -> Result<()> {
        let previous = self.path.replace(path.to_path_buf());
        if let Err(e) = self.save() {
            self.path = previous;
            return Err(e);
        }
        let language = language_for(path);
        if language != self.syntax.language() {
            self.syntax.set_language(language);
        }
        Ok(())
    }

    pub fn id(&self) -> DocumentId {
        self.id
    }

    pub fn buffer(&self) -> &TextBuffer {
        &self.buffer
    }

    pub fn selection(&self) -> Selection {
        self.selection
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn mode(&self) -> EditMode {
        self.mode
    }

    pub fn line_ending(&self) -> LineEnding {
        self.line_ending
    }

    pub fn language(&self) -> Language {
        self.syntax.language()
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn title(&self) -> String {
        self.path
            .as_deref()
            .and_then(Path::file_name)
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "untitled".to_string())
    }

    pub fn status(&self) -> DocumentStatus {
        let head = self.buffer.clamp(self.selection.head);
        let (line, col) = self.buffer.offset_to_line_col(head).unwrap_or((0, 0));
        DocumentStatus {
            title: self.title(),
            line: line + 1,
            total_lines: self.buffer.line_count(),
            column: col + 1,
            selection_len: self.selection.len(),
            mode: self.mode,
            line_ending: self.line_ending,
            encoding: self.encoding,
            language: self.syntax.language().name(),
            dirty: self.dirty,
        }
    }

    pub fn toggle_mode(&mut self) {
        self.mode = match self.mode {
            EditMode::Insert => EditMode::Overwrite,
            EditMode::Overwrite => EditMode::Insert,
        };
    }

    // ---- Cursor ----

    pub fn move_cursor(&mut self, motion: Motion, extend: bool) {
        self.selection.apply(&self.buffer, motion, extend);
        self.history.seal();
    }

    /// Place the cursor at a (line, column) position, clamped
    pub fn set_cursor(&mut self, line: usize, col: usize, extend: bool) {
        let offset = self.buffer.line_col_to_offset(line, col);
        self.selection.move_to(offset, extend);
        self.history.seal();
    }

    pub fn select_all(&mut self) {
        self.selection = Selection::new(0, self.buffer.len_chars());
        self.history.seal();
    }

    pub fn selected_text(&self) -> Option<String> {
        if self.selection.is_empty() {
            return None;
        }
        self.buffer.slice(self.selection.range()).ok()
    }

    // ---- Editing ----

    /// Type text at the caret, replacing the selection (or the characters
    /// under the caret in overwrite mode)
    pub fn type_text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        let before = self.selection;
        let mut ops = Vec::new();
        let replaced = self.delete_selection_into(&mut ops);

        if self.mode == EditMode::Overwrite && !replaced {
            let head = self.selection.head;
            let line = self.buffer.line_of(head);
            let line_end = self.buffer.line_start(line) + self.buffer.line_len(line);
            let end = (head + text.chars().count()).min(line_end);
            if end > head {
                self.delete_into(head..end, &mut ops);
            }
        }

        self.insert_into(text, &mut ops);
        let kind = if replaced {
            EditKind::Command
        } else {
            EditKind::Typing
        };
        self.history
            .record(ops, kind, before, self.selection, Instant::now());
    }

    /// Insert text as a single command, converting line breaks to the
    /// document's style
    pub fn paste(&mut self, text: &str) {
        let text = normalize_line_endings(text, self.line_ending);
        self.command(|doc, ops| {
            doc.delete_selection_into(ops);
            doc.insert_into(&text, ops);
        });
    }

    /// Break the line, carrying indentation over when auto-indent is on
    pub fn insert_newline(&mut self) {
        let mut text = self.line_ending.as_str().to_string();
        if self.settings.auto_indent {
            let head = self.selection.range().start;
            let line = self.buffer.line_of(head);
            let start = self.buffer.line_start(line);
            let indent: String = self
                .buffer
                .rope()
                .slice(start..head)
                .chars()
                .take_while(|c| *c == ' ' || *c == '\t')
                .collect();
            text.push_str(&indent);
        }
        self.command(|doc, ops| {
            doc.delete_selection_into(ops);
            doc.insert_into(&text, ops);
        });
    }

    /// Insert a tab, or spaces up to the next tab stop
    pub fn insert_tab(&mut self) {
        if !self.settings.insert_spaces {
            self.type_text("\t");
            return;
        }
        let width = self.settings.tab_width.max(1);
        let head = self.selection.range().start;
        let col = head - self.buffer.line_start(self.buffer.line_of(head));
        let spaces = " ".repeat(width - col % width);
        self.type_text(&spaces);
    }

    /// Delete the selection or the character before the caret
    pub fn backspace(&mut self) {
        if !self.selection.is_empty() {
            self.command(|doc, ops| {
                doc.delete_selection_into(ops);
            });
            return;
        }
        let head = self.buffer.clamp(self.selection.head);
        if head == 0 {
            return;
        }
        let mut step = Selection::point(head);
        step.apply(&self.buffer, Motion::CharLeft, false);
        let start = step.head;
        self.command(|doc, ops| doc.delete_into(start..head, ops));
    }

    /// Delete the selection or the character after the caret
    pub fn delete_forward(&mut self) {
        if !self.selection.is_empty() {
            self.command(|doc, ops| {
                doc.delete_selection_into(ops);
            });
            return;
        }
        let head = self.buffer.clamp(self.selection.head);
        if head >= self.buffer.len_chars() {
            return;
        }
        let mut step = Selection::point(head);
        step.apply(&self.buffer, Motion::CharRight, false);
        let end = step.head;
        self.command(|doc, ops| doc.delete_into(head..end, ops));
    }

    /// Delete the caret's line including its terminator
    pub fn delete_line(&mut self) {
        let line = self.buffer.line_of(self.selection.head);
        let Ok(mut range) = self.buffer.line_range(line) else {
            return;
        };
        // The last line has no terminator of its own; take the previous one
        if line > 0 && line + 1 == self.buffer.line_count() {
            range.start -= self.buffer.line_range(line - 1).map_or(0, |r| {
                r.len() - self.buffer.line_len(line - 1)
            });
        }
        if range.is_empty() {
            return;
        }
        self.command(|doc, ops| doc.delete_into(range, ops));
        let line = self.buffer.line_of(self.selection.head);
        self.selection = Selection::point(self.buffer.line_start(line));
    }

    /// Remove and return the selected text
    pub fn cut(&mut self) -> Option<String> {
        let text = self.selected_text()?;
        self.command(|doc, ops| {
            doc.delete_selection_into(ops);
        });
        Some(text)
    }

    pub fn copy(&self) -> Option<String> {
        self.selected_text()
    }

    pub fn undo(&mut self) -> bool {
        let Some(replay) = self.history.undo() else {
            return false;
        };
        for op in &replay.ops {
            self.apply_op(op);
        }
        self.selection = replay.selection;
        self.selection.clamp(self.buffer.len_chars());
        true
    }

    pub fn redo(&mut self) -> bool {
        let Some(replay) = self.history.redo() else {
            return false;
        };
        for op in &replay.ops {
            self.apply_op(op);
        }
        self.selection = replay.selection;
        self.selection.clamp(self.buffer.len_chars());
        true
    }

    // ---- Search ----

    /// Select the next match after the selection. Returns false if none.
    pub fn find_next(&mut self, query: &SearchQuery) -> bool {
        let from = self.selection.range().end;
        self.select_match(search::find_next(&self.buffer, query, from))
    }

    pub fn find_prev(&mut self, query: &SearchQuery) -> bool {
        let from = self.selection.range().start;
        self.select_match(search::find_prev(&self.buffer, query, from))
    }

    fn select_match(&mut self, found: Option<Range<usize>>) -> bool {
        match found {
            Some(range) => {
                self.selection = Selection::new(range.start, range.end);
                self.history.seal();
                true
            }
            None => false,
        }
    }

    /// Replace every match in one undo unit. Returns the match count.
    pub fn replace_all(&mut self, query: &SearchQuery, replacement: &str) -> usize {
        let matches = search::find_all(&self.buffer, query);
        if matches.is_empty() {
            return 0;
        }
        let caret = self.selection.head;
        self.command(|doc, ops| {
            for range in matches.iter().rev() {
                doc.delete_into(range.clone(), ops);
                let op = EditOperation::Insert {
                    offset: range.start,
                    text: replacement.to_string(),
                };
                if doc.apply_op(&op) {
                    ops.push(op);
                }
            }
        });
        self.selection = Selection::point(self.buffer.clamp(caret));
        matches.len()
    }

    // ---- Syntax ----

    pub fn syntax(&self) -> &SyntaxCache {
        &self.syntax
    }

    /// Tokenize synchronously on the calling thread
    pub fn highlight_now(&mut self) {
        self.syntax
            .retokenize(self.buffer.rope(), self.version, Some(&*self.cancel));
    }

    /// Build a background job if the cache is dirty and none is in flight
    pub fn take_highlight_job(&mut self) -> Option<TokenizeJob> {
        if self.job_pending || !self.syntax.is_dirty() {
            return None;
        }
        self.job_pending = true;
        Some(TokenizeJob {
            document: self.id,
            version: self.version,
            text: self.buffer.snapshot(),
            cache: self.syntax.clone(),
            cancel: Arc::clone(&self.cancel),
        })
    }

    /// Install a finished job. Stale results are dropped and the caller
    /// should submit a fresh job.
    pub fn apply_highlight(&mut self, result: TokenizeResult) -> bool {
        self.job_pending = false;
        if result.document != self.id || result.version != self.version {
            return false;
        }
        self.syntax = result.cache;
        true
    }

    /// Keep the caret inside a `height` x `width` viewport
    pub fn scroll_to_cursor(&mut self, height: usize, width: usize) {
        let head = self.buffer.clamp(self.selection.head);
        let (line, col) = self.buffer.offset_to_line_col(head).unwrap_or((0, 0));
        let height = height.max(1);
        let width = width.max(1);

        if line < self.scroll_top {
            self.scroll_top = line;
        } else if line >= self.scroll_top + height {
            self.scroll_top = line + 1 - height;
        }
        if col < self.scroll_left {
            self.scroll_left = col;
        } else if col >= self.scroll_left + width {
            self.scroll_left = col + 1 - width;
        }
    }

    // ---- Internals ----

    /// Run an edit closure and record its ops as one command unit
    fn command(&mut self, edit: impl FnOnce(&mut Self, &mut Vec<EditOperation>)) {
        let before = self.selection;
        let mut ops = Vec::new();
        edit(self, &mut ops);
        self.history
            .record(ops, EditKind::Command, before, self.selection, Instant::now());
    }

    fn delete_selection_into(&mut self, ops: &mut Vec<EditOperation>) -> bool {
        if self.selection.is_empty() {
            return false;
        }
        let range = self.selection.range();
        self.delete_into(range, ops);
        true
    }

    fn delete_into(&mut self, range: Range<usize>, ops: &mut Vec<EditOperation>) {
        let len = self.buffer.len_chars();
        let range = range.start.min(len)..range.end.min(len);
        let Ok(text) = self.buffer.slice(range.clone()) else {
            return;
        };
        if text.is_empty() {
            return;
        }
        let op = EditOperation::Delete {
            offset: range.start,
            text,
        };
        if self.apply_op(&op) {
            ops.push(op);
        }
    }

    fn insert_into(&mut self, text: &str, ops: &mut Vec<EditOperation>) {
        if text.is_empty() {
            return;
        }
        let op = EditOperation::Insert {
            offset: self.buffer.clamp(self.selection.head),
            text: text.to_string(),
        };
        if self.apply_op(&op) {
            ops.push(op);
        }
    }

    /// Apply one operation and bring selection, syntax cache and version
    /// along. Returns false (leaving everything untouched) if the buffer
    /// rejected it.
    fn apply_op(&mut self, op: &EditOperation) -> bool {
        let line = self.buffer.line_of(op.offset());
        let lines_before = self.buffer.line_count();

        if let Err(e) = op.apply(&mut self.buffer) {
            error!("Dropped edit on document {}: {}", self.id, e);
            return false;
        }

        let lines_after = self.buffer.line_count();
        self.syntax.splice(
            line,
            lines_before.saturating_sub(lines_after),
            lines_after.saturating_sub(lines_before),
        );
        self.selection.remap(op);
        self.version += 1;
        self.dirty = true;
        true
    }
}

impl Drop for Document {
    fn drop(&mut self) {
        self.cancel.store(true, Ordering::Relaxed);
    }
}

fn language_for(path: &Path) -> Language {
    path.file_name()
        .map(|n| Language::detect(&n.to_string_lossy()))
        .unwrap_or_else(Language::plain)
}

fn normalize_line_endings(text: &str, ending: LineEnding) -> String {
    let unified = text.replace("\r\n", "\n").replace('\r', "\n");
    match ending {
        LineEnding::Lf => unified,
        other => unified.replace('\n', other.as_str()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::editor::syntax::StyleTag;

    fn settings() -> EditorConfig {
        EditorConfig::default()
    }

    fn doc(text: &str) -> Document {
        Document::from_text(1, text, settings())
    }

    #[test]
    fn test_hello_world_undo_scenario() {
        let mut d = doc("");
        d.type_text("hello");
        d.type_text(" world");
        assert_eq!(d.buffer().to_string(), "hello world");

        assert!(d.undo());
        assert_eq!(d.buffer().to_string(), "hello");
        assert!(d.undo());
        assert_eq!(d.buffer().to_string(), "");
        assert!(!d.undo());

        assert!(d.redo());
        assert!(d.redo());
        assert_eq!(d.buffer().to_string(), "hello world");
        assert_eq!(d.selection().head, 11);
        assert!(!d.redo());
    }

    #[test]
    fn test_typing_replaces_selection() {
        let mut d = doc("hello world");
        d.set_cursor(0, 6, false);
        d.move_cursor(Motion::LineEnd, true);
        d.type_text("there");
        assert_eq!(d.buffer().to_string(), "hello there");
        assert!(d.undo());
        assert_eq!(d.buffer().to_string(), "hello world");
        assert_eq!(d.selection().range(), 6..11);
    }

    #[test]
    fn test_overwrite_mode() {
        let mut d = doc("abcd\nxy");
        d.toggle_mode();
        d.set_cursor(0, 2, false);
        d.type_text("ZZZ");
        assert_eq!(d.buffer().to_string(), "abZZZ\nxy");
        assert_eq!(d.status().mode, EditMode::Overwrite);
        assert!(d.undo());
        assert_eq!(d.buffer().to_string(), "abcd\nxy");
    }

    #[test]
    fn test_newline_keeps_indent_and_line_ending() {
        let mut d = doc("fn a() {\r\n    body\r\n}");
        assert_eq!(d.line_ending(), LineEnding::CrLf);
        d.set_cursor(1, 8, false);
        d.insert_newline();
        assert_eq!(d.buffer().to_string(), "fn a() {\r\n    body\r\n    \r\n}");
        assert_eq!(d.status().line, 3);
        assert_eq!(d.status().column, 5);
    }

    #[test]
    fn test_tab_to_next_stop() {
        let mut d = doc("ab");
        d.move_cursor(Motion::LineEnd, false);
        d.insert_tab();
        assert_eq!(d.buffer().to_string(), "ab  ");

        let mut d = Document::from_text(
            1,
            "",
            EditorConfig {
                insert_spaces: false,
                ..settings()
            },
        );
        d.insert_tab();
        assert_eq!(d.buffer().to_string(), "\t");
    }

    #[test]
    fn test_backspace_and_delete_at_edges() {
        let mut d = doc("a\r\nb");
        d.backspace();
        assert_eq!(d.buffer().to_string(), "a\r\nb");

        d.set_cursor(1, 0, false);
        d.backspace();
        assert_eq!(d.buffer().to_string(), "ab");

        d.move_cursor(Motion::DocumentEnd, false);
        d.delete_forward();
        assert_eq!(d.buffer().to_string(), "ab");
        assert!(d.is_dirty());
    }

    #[test]
    fn test_delete_line() {
        let mut d = doc("one\ntwo\nthree");
        d.set_cursor(1, 1, false);
        d.delete_line();
        assert_eq!(d.buffer().to_string(), "one\nthree");
        assert_eq!(d.selection().head, 4);

        d.move_cursor(Motion::DocumentEnd, false);
        d.delete_line();
        assert_eq!(d.buffer().to_string(), "one");
    }

    #[test]
    fn test_cut_copy_paste() {
        let mut d = doc("alpha beta");
        d.move_cursor(Motion::WordRight, true);
        assert_eq!(d.copy().as_deref(), Some("alpha "));
        assert_eq!(d.cut().as_deref(), Some("alpha "));
        assert_eq!(d.buffer().to_string(), "beta");
        assert_eq!(d.cut(), None);

        d.move_cursor(Motion::DocumentEnd, false);
        d.paste("\r\nx\ry");
        assert_eq!(d.buffer().to_string(), "beta\nx\ny");
    }

    #[test]
    fn test_motions_clamp_after_edits() {
        let mut d = doc("short");
        d.set_cursor(99, 99, false);
        assert_eq!(d.selection().head, 5);
        d.select_all();
        d.backspace();
        assert_eq!(d.buffer().to_string(), "");
        d.move_cursor(Motion::WordRight, false);
        d.move_cursor(Motion::LineDown, true);
        assert_eq!(d.selection().head, 0);
        assert!(d.selection().is_empty());
    }

    #[test]
    fn test_find_and_replace_all() {
        let mut d = doc("cat dog cat");
        let query = SearchQuery::new("cat");
        assert!(d.find_next(&query));
        assert_eq!(d.selection().range(), 0..3);
        assert!(d.find_next(&query));
        assert_eq!(d.selection().range(), 8..11);
        assert!(d.find_prev(&query));
        assert_eq!(d.selection().range(), 0..3);

        assert_eq!(d.replace_all(&query, "bird"), 2);
        assert_eq!(d.buffer().to_string(), "bird dog bird");
        assert!(d.undo());
        assert_eq!(d.buffer().to_string(), "cat dog cat");
        assert!(!d.find_next(&SearchQuery::new("zebra")));
    }

    #[test]
    fn test_save_and_open_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.py");
        fs::write(&path, b"\xEF\xBB\xBFx = 1\r\n").unwrap();

        let mut d = Document::open(3, &path, settings()).unwrap();
        let status = d.status();
        assert_eq!(status.encoding, Encoding::Utf8Bom);
        assert_eq!(status.line_ending, LineEnding::CrLf);
        assert_eq!(status.language, "Python");
        assert_eq!(status.title, "notes.py");
        assert!(!status.dirty);

        d.move_cursor(Motion::DocumentEnd, false);
        d.type_text("y");
        assert!(d.is_dirty());
        d.save().unwrap();
        assert!(!d.is_dirty());
        assert_eq!(fs::read(&path).unwrap(), b"\xEF\xBB\xBFx = 1\r\ny");

        let other = dir.path().join("copy.rs");
        d.save_as(&other).unwrap();
        assert_eq!(d.language().name(), "Rust");
        assert!(other.exists());
    }

    #[test]
    fn test_open_errors() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.txt");
        assert!(matches!(
            Document::open(1, &missing, settings()),
            Err(DocumentError::Read { .. })
        ));

        let binary = dir.path().join("blob.bin");
        fs::write(&binary, [0xFF, 0xFE, 0x00]).unwrap();
        assert!(matches!(
            Document::open(1, &binary, settings()),
            Err(DocumentError::Encoding { .. })
        ));

        assert!(matches!(doc("x").save(), Err(DocumentError::NoPath)));
    }

    #[test]
    fn test_stale_highlight_is_discarded() {
        let mut d = doc("let a = 1;");
        let mut job = d.take_highlight_job().unwrap();
        assert!(d.take_highlight_job().is_none());

        d.type_text("x");
        job.cache.retokenize(&job.text, job.version, None);
        let stale = TokenizeResult {
            document: job.document,
            version: job.version,
            cache: job.cache,
        };
        assert!(!d.apply_highlight(stale));
        assert!(d.syntax().is_dirty());

        let mut job = d.take_highlight_job().unwrap();
        job.cache.retokenize(&job.text, job.version, None);
        let fresh = TokenizeResult {
            document: job.document,
            version: job.version,
            cache: job.cache,
        };
        assert!(d.apply_highlight(fresh));
        assert!(!d.syntax().is_dirty());
    }

    #[test]
    fn test_closing_cancels_pending_job() {
        let mut d = doc("a");
        let job = d.take_highlight_job().unwrap();
        drop(d);
        assert!(job.cancel.load(Ordering::Relaxed));
    }

    #[test]
    fn test_syntax_follows_edits() {
        let mut d = Document::from_text(1, "", settings());
        d.syntax.set_language(Language::detect("main.rs"));
        d.type_text("fn main() {}");
        d.insert_newline();
        d.type_text("// note");
        d.highlight_now();
        assert_eq!(d.syntax().version(), d.version());
        assert!(d.syntax().line_spans(0).is_some_and(|s| !s.is_empty()));
        assert_eq!(
            d.syntax().line_spans(1).and_then(|s| s.first()).map(|s| s.style),
            Some(StyleTag::Comment)
        );
    }
}
