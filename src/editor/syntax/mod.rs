//! Incremental syntax tokenizer
//!
//! Lines are parsed with syntect grammars. The parser's only cross-line
//! state is a [`LineState`], cached per line as the state at that line's
//! start. After an edit the cache is spliced to the new line count and the
//! edited lines are marked dirty. [`SyntaxCache::retokenize`] then restarts
//! at the first dirty line and stops at the first line past the dirty region
//! whose recomputed entry state equals the cached one.
//!
//! - **languages**: grammar lookup by file name
//! - **worker**: background thread running `retokenize` on snapshots

pub mod languages;
pub mod worker;

use std::ops::Range;
use std::sync::atomic::{AtomicBool, Ordering};

use ropey::Rope;
use syntect::parsing::{ParseState, ScopeStack};
use tracing::debug;

use super::buffer::terminator_len;
use languages::syntax_set;
pub use languages::Language;

/// Parser state carried across line boundaries
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LineState {
    parse: ParseState,
    scopes: ScopeStack,
}

impl LineState {
    /// State at the start of a document in `language`
    pub fn new(language: Language) -> Self {
        Self {
            parse: ParseState::new(language.syntax()),
            scopes: ScopeStack::new(),
        }
    }
}

/// Style class of a span
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StyleTag {
    Keyword,
    Type,
    Constant,
    Function,
    String,
    Comment,
    Number,
    Operator,
}

/// Styled byte range within one line
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Span {
    pub range: Range<usize>,
    pub style: StyleTag,
}

/// Style for a single TextMate scope name
fn scope_style(scope: &str) -> Option<StyleTag> {
    let style = if scope.starts_with("comment") {
        StyleTag::Comment
    } else if scope.starts_with("string") {
        StyleTag::String
    } else if scope.starts_with("constant.numeric") {
        StyleTag::Number
    } else if scope.starts_with("constant") {
        StyleTag::Constant
    } else if scope.starts_with("keyword.operator") {
        StyleTag::Operator
    } else if scope.starts_with("keyword")
        || scope.starts_with("storage.modifier")
        || scope.starts_with("storage.type.function")
    {
        StyleTag::Keyword
    } else if scope.starts_with("storage.type")
        || scope.starts_with("support.type")
        || scope.starts_with("support.class")
        || scope.starts_with("entity.name.type")
        || scope.starts_with("entity.name.class")
        || scope.starts_with("entity.name.struct")
        || scope.starts_with("entity.name.enum")
    {
        StyleTag::Type
    } else if scope.starts_with("entity.name.function")
        || scope.starts_with("support.function")
        || scope.starts_with("variable.function")
    {
        StyleTag::Function
    } else {
        return None;
    };
    Some(style)
}

/// Innermost scope with a style wins
fn stack_style(scopes: &ScopeStack) -> Option<StyleTag> {
    scopes
        .as_slice()
        .iter()
        .rev()
        .find_map(|scope| scope_style(&scope.build_string()))
}

fn push_span(spans: &mut Vec<Span>, range: Range<usize>, style: Option<StyleTag>) {
    let Some(style) = style else {
        return;
    };
    if range.is_empty() {
        return;
    }
    // Merge adjacent spans of the same style
    if let Some(last) = spans.last_mut() {
        if last.style == style && last.range.end == range.start {
            last.range.end = range.end;
            return;
        }
    }
    spans.push(Span { range, style });
}

/// Tokenize one line (without terminator) starting in `entry`.
/// Returns the styled spans and the state at the end of the line.
pub fn tokenize_line(entry: &LineState, line: &str) -> (Vec<Span>, LineState) {
    let mut state = entry.clone();
    let mut spans = Vec::new();

    // Grammars loaded for newline mode expect the terminator
    let text = format!("{line}\n");
    let ops = match state.parse.parse_line(&text, syntax_set()) {
        Ok(ops) => ops,
        Err(e) => {
            debug!("Grammar failed on line: {}", e);
            return (spans, entry.clone());
        }
    };

    let mut pos = 0;
    for (offset, op) in ops {
        let offset = offset.min(line.len());
        if offset > pos {
            push_span(&mut spans, pos..offset, stack_style(&state.scopes));
            pos = offset;
        }
        if let Err(e) = state.scopes.apply(&op) {
            debug!("Scope stack rejected operation: {:?}", e);
        }
    }
    push_span(&mut spans, pos..line.len(), stack_style(&state.scopes));

    (spans, state)
}

/// Per-document tokenizer cache
#[derive(Clone, Debug)]
pub struct SyntaxCache {
    language: Language,
    /// Parser state at the start of each line; `None` when not yet known
    states: Vec<Option<LineState>>,
    spans: Vec<Option<Vec<Span>>>,
    /// Lines needing re-tokenization
    dirty: Option<Range<usize>>,
    /// Buffer version the spans were computed against
    version: u64,
}

impl SyntaxCache {
    pub fn new(language: Language, line_count: usize) -> Self {
        let line_count = line_count.max(1);
        let mut states = vec![None; line_count];
        states[0] = Some(LineState::new(language));
        Self {
            language,
            states,
            spans: vec![None; line_count],
            dirty: Some(0..line_count),
            version: 0,
        }
    }

    pub fn language(&self) -> Language {
        self.language
    }

    /// Switch language and invalidate everything
    pub fn set_language(&mut self, language: Language) {
        *self = Self::new(language, self.states.len());
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.is_some()
    }

    pub fn dirty_range(&self) -> Option<Range<usize>> {
        self.dirty.clone()
    }

    /// Spans for `line`, if it has been tokenized since its last change
    pub fn line_spans(&self, line: usize) -> Option<&[Span]> {
        self.spans.get(line).and_then(|s| s.as_deref())
    }

    /// Record an edit starting on `line` that removed `removed` line breaks
    /// and inserted `inserted` line breaks.
    pub fn splice(&mut self, line: usize, removed: usize, inserted: usize) {
        let line = line.min(self.states.len() - 1);
        let first = line + 1;
        let last = (first + removed).min(self.states.len());

        self.states
            .splice(first..last, std::iter::repeat(None).take(inserted));
        self.spans
            .splice(first..last, std::iter::repeat(None).take(inserted));
        self.spans[line] = None;

        let edit_end = line + inserted + 1;
        let dirty = match self.dirty.take() {
            None => line..edit_end,
            Some(old) => {
                // Ends past the edited lines move with the line count
                let old_end = if old.end > line + removed + 1 {
                    old.end + inserted - removed
                } else {
                    old.end
                };
                old.start.min(line)..old_end.max(edit_end)
            }
        };
        self.dirty = Some(dirty.start..dirty.end.min(self.states.len()));
    }

    /// Re-tokenize dirty lines of `text` until the state cache converges.
    /// Returns the number of lines tokenized. Stops early, leaving the
    /// remainder dirty, when `cancel` is set.
    pub fn retokenize(&mut self, text: &Rope, version: u64, cancel: Option<&AtomicBool>) -> usize {
        let line_count = text.len_lines();
        if self.states.len() != line_count {
            self.states.resize(line_count, None);
            self.spans.resize(line_count, None);
            self.mark_dirty_from(0);
        }

        let Some(dirty) = self.dirty.take() else {
            self.version = version;
            return 0;
        };

        // Back up to the nearest line with a known entry state
        let mut line = dirty.start.min(line_count - 1);
        while line > 0 && self.states[line].is_none() {
            line -= 1;
        }
        let mut state = self.states[line]
            .clone()
            .unwrap_or_else(|| LineState::new(self.language));
        let mut count = 0;

        while line < line_count {
            if cancel.is_some_and(|c| c.load(Ordering::Relaxed)) {
                self.dirty = Some(line..dirty.end.max(line + 1).min(line_count));
                return count;
            }

            let slice = text.line(line);
            let content = slice.slice(..slice.len_chars() - terminator_len(slice));
            let content = content.to_string();
            let (spans, exit) = tokenize_line(&state, &content);
            self.states[line] = Some(state);
            self.spans[line] = Some(spans);
            count += 1;
            line += 1;

            if line >= line_count {
                break;
            }
            if line >= dirty.end
                && self.states[line].as_ref() == Some(&exit)
                && self.spans[line].is_some()
            {
                break;
            }
            state = exit;
        }

        self.version = version;
        count
    }

    fn mark_dirty_from(&mut self, line: usize) {
        let end = self.states.len();
        self.dirty = Some(match self.dirty.take() {
            Some(old) => old.start.min(line)..end,
            None => line..end,
        });
    }
}
