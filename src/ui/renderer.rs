//! Screen renderer using crossterm
//!
//! [`draw`] paints a [`Frame`] into a [`Canvas`]; [`Renderer::present`]
//! writes the rows that changed since the previous frame.

use std::io::{self, Write};

use crossterm::{
    cursor::{Hide, MoveTo, Show},
    event::{DisableBracketedPaste, DisableMouseCapture, EnableBracketedPaste, EnableMouseCapture},
    execute, queue,
    style::{Attribute, ResetColor, SetAttribute, SetBackgroundColor, SetForegroundColor},
    terminal::{
        self, Clear, ClearType, DisableLineWrap, EnableLineWrap, EnterAlternateScreen,
        LeaveAlternateScreen,
    },
};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use super::canvas::{Canvas, CanvasCell, Style};
use super::layout::{Layout, Rect};
use crate::config::{ColorScheme, EditorConfig};
use crate::core::term::{AttrFlags, CellAttrs, TerminalState};
use crate::editor::{Document, EditMode};
use crate::filetree::FileTree;
use crate::input::Focus;

/// One-line input shown in the status line
pub struct Prompt<'a> {
    pub label: &'a str,
    pub input: &'a str,
}

pub struct TerminalView<'a> {
    /// Locked emulator state; `None` when no shell is running
    pub state: Option<&'a TerminalState>,
    pub title: &'a str,
    /// Exit or spawn-failure notice
    pub notice: Option<&'a str>,
}

/// Everything one frame shows
pub struct Frame<'a> {
    pub layout: Layout,
    pub focus: Focus,
    pub scheme: &'a ColorScheme,
    pub editor: &'a EditorConfig,
    pub tree: &'a FileTree,
    pub documents: &'a [Document],
    pub active: usize,
    pub terminal: TerminalView<'a>,
    pub message: Option<&'a str>,
    pub prompt: Option<Prompt<'a>>,
}

/// Gutter columns for a document of `line_count` lines
pub fn gutter_width(line_count: usize, show_line_numbers: bool) -> u16 {
    if !show_line_numbers {
        return 0;
    }
    let digits = line_count.max(1).ilog10() as u16 + 1;
    digits.max(3) + 1
}

fn char_width(ch: char, visual: usize, tab_width: usize) -> usize {
    if ch == '\t' {
        let tab = tab_width.max(1);
        tab - visual % tab
    } else {
        ch.width().unwrap_or(0)
    }
}

/// Visual column of char `col` in `line`, measured from char `skip`
pub fn visual_offset(line: &str, skip: usize, col: usize, tab_width: usize) -> usize {
    let mut visual: usize = 0;
    let mut skip_visual: usize = 0;
    for (i, ch) in line.chars().enumerate() {
        if i == skip {
            skip_visual = visual;
        }
        if i == col {
            return visual.saturating_sub(skip_visual);
        }
        visual += char_width(ch, visual, tab_width);
    }
    if skip >= line.chars().count() {
        skip_visual = visual;
    }
    visual.saturating_sub(skip_visual)
}

/// Char column drawn at visual column `x`, with the line scrolled by `skip`
/// chars. Past the end of the line this is the line length.
pub fn char_at_column(line: &str, skip: usize, x: usize, tab_width: usize) -> usize {
    let mut visual = 0;
    let mut skip_visual = None;
    let mut count = 0;
    for (i, ch) in line.chars().enumerate() {
        count = i + 1;
        let w = char_width(ch, visual, tab_width);
        if i >= skip {
            let start = *skip_visual.get_or_insert(visual);
            if visual - start + w > x {
                return i;
            }
        }
        visual += w;
    }
    count
}

fn truncate_to_width(text: &str, width: usize) -> String {
    let mut out = String::new();
    let mut used = 0;
    for ch in text.chars() {
        let w = ch.width().unwrap_or(0);
        if used + w > width {
            break;
        }
        used += w;
        out.push(ch);
    }
    out
}

/// Paint a frame
pub fn draw(frame: &Frame) -> Canvas {
    let width = frame.layout.status.width;
    let height = frame.layout.status.y + frame.layout.status.height;
    let mut canvas = Canvas::new(width, height);

    if let Some(rect) = frame.layout.tree {
        draw_tree(&mut canvas, frame, rect);
    }
    draw_editor(&mut canvas, frame);
    if let (Some(title), Some(rect)) = (frame.layout.terminal_title, frame.layout.terminal) {
        draw_terminal(&mut canvas, frame, title, rect);
    }
    draw_status(&mut canvas, frame);
    canvas
}

fn draw_tree(canvas: &mut Canvas, frame: &Frame, rect: Rect) {
    let scheme = frame.scheme;
    let base = Style::new(scheme.tree_fg.to_crossterm(), scheme.editor_bg.to_crossterm());
    canvas.fill(rect.x, rect.y, rect.width, rect.height, base);

    let focused = frame.focus == Focus::FileTree;
    let tree = frame.tree;
    let limit = rect.x + rect.width;

    for (row, (idx, entry)) in tree
        .entries()
        .iter()
        .enumerate()
        .skip(tree.scroll_offset())
        .take(rect.height as usize)
        .enumerate()
    {
        let y = rect.y + row as u16;
        let mut style = if entry.is_dir {
            base.with_fg(scheme.tree_dir_fg.to_crossterm())
        } else {
            base
        };
        if idx == tree.selected() {
            style = style.with_bg(scheme.tree_selected_bg.to_crossterm());
            if focused {
                style = style.bold();
            }
            canvas.fill(rect.x, y, rect.width, 1, style);
        }

        let marker = match (entry.is_dir, entry.expanded) {
            (true, true) => "▾ ",
            (true, false) => "▸ ",
            (false, _) => "  ",
        };
        let indent = "  ".repeat(entry.depth);
        let x = canvas.put_str(rect.x, y, &indent, style, limit);
        let x = canvas.put_str(x, y, marker, style, limit);
        canvas.put_str(x, y, &entry.name, style, limit);
    }

    // Separator column between tree and editor
    let border = if focused {
        scheme.border_active
    } else {
        scheme.border
    };
    let sep = Style::new(border.to_crossterm(), scheme.editor_bg.to_crossterm());
    let x = rect.x + rect.width;
    for y in rect.y..rect.y + rect.height {
        canvas.put_char(x, y, '│', sep, x + 1);
    }
}

fn draw_editor(canvas: &mut Canvas, frame: &Frame) {
    let scheme = frame.scheme;
    let header = frame.layout.editor_header;
    let rect = frame.layout.editor;
    let bar = Style::new(
        scheme.status_bar_fg.to_crossterm(),
        scheme.status_bar_bg.to_crossterm(),
    );
    let text_style = Style::new(
        scheme.editor_fg.to_crossterm(),
        scheme.editor_bg.to_crossterm(),
    );

    canvas.fill(header.x, header.y, header.width, header.height, bar);
    canvas.fill(rect.x, rect.y, rect.width, rect.height, text_style);

    let limit = header.x + header.width;
    let mut x = header.x;
    for (i, doc) in frame.documents.iter().enumerate() {
        let mark = if doc.is_dirty() { "●" } else { "" };
        let label = format!(" {}{} ", doc.title(), mark);
        let style = if i == frame.active {
            bar.with_bg(scheme.border_active.to_crossterm())
                .with_fg(scheme.editor_bg.to_crossterm())
                .bold()
        } else {
            bar
        };
        x = canvas.put_str(x, header.y, &label, style, limit);
        if x >= limit {
            break;
        }
    }

    let Some(doc) = frame.documents.get(frame.active) else {
        return;
    };
    let buffer = doc.buffer();
    let tab_width = frame.editor.tab_width;
    let gutter = gutter_width(buffer.line_count(), frame.editor.show_line_numbers);
    let text_x = rect.x + gutter.min(rect.width);
    let limit = rect.x + rect.width;
    let selection = doc.selection().range();
    let cursor_line = buffer.line_of(buffer.clamp(doc.selection().head));

    for row in 0..rect.height {
        let line = doc.scroll_top + row as usize;
        if line >= buffer.line_count() {
            break;
        }
        let y = rect.y + row;

        if gutter > 0 {
            let fg = if line == cursor_line {
                scheme.current_line_fg
            } else {
                scheme.gutter_fg
            };
            let number = format!("{:>w$} ", line + 1, w = gutter as usize - 1);
            canvas.put_str(rect.x, y, &number, text_style.with_fg(fg.to_crossterm()), text_x);
        }

        let Some(text) = buffer.line_text(line) else {
            continue;
        };
        let spans = doc.syntax().line_spans(line).unwrap_or(&[]);
        let line_start = buffer.line_start(line);

        let mut span_idx = 0;
        let mut visual = 0;
        let mut skip_visual = 0;
        for (i, (byte, ch)) in text.char_indices().enumerate() {
            let w = char_width(ch, visual, tab_width);
            if i == doc.scroll_left {
                skip_visual = visual;
            }
            if i < doc.scroll_left {
                visual += w;
                continue;
            }

            while span_idx < spans.len() && spans[span_idx].range.end <= byte {
                span_idx += 1;
            }
            let mut style = text_style;
            if let Some(span) = spans.get(span_idx).filter(|s| s.range.contains(&byte)) {
                style = style.with_fg(scheme.style(span.style).to_crossterm());
            }
            if selection.contains(&(line_start + i)) {
                style = style.with_bg(scheme.selection_bg.to_crossterm());
            }

            let x = text_x as usize + (visual - skip_visual);
            if x >= limit as usize {
                break;
            }
            let x = x as u16;
            if ch == '\t' {
                canvas.fill(x, y, (w as u16).min(limit - x), 1, style);
            } else {
                canvas.put_char(x, y, ch, style, limit);
            }
            visual += w;
        }
    }

    if frame.focus == Focus::Editor && frame.prompt.is_none() {
        let head = buffer.clamp(doc.selection().head);
        let (line, col) = buffer.offset_to_line_col(head).unwrap_or((0, 0));
        if line >= doc.scroll_top && line < doc.scroll_top + rect.height as usize {
            let text = buffer.line_text(line).unwrap_or_default();
            let x = text_x as usize + visual_offset(&text, doc.scroll_left, col, tab_width);
            if x < limit as usize {
                canvas.set_cursor(x as u16, rect.y + (line - doc.scroll_top) as u16);
            }
        }
    }
}

fn term_style(attrs: CellAttrs, selected: bool) -> Style {
    let mut flags = attrs.flags;
    if selected {
        flags.toggle(AttrFlags::INVERSE);
    }
    Style {
        fg: attrs.fg.to_crossterm(),
        bg: attrs.bg.to_crossterm(),
        flags,
    }
}

fn draw_terminal(canvas: &mut Canvas, frame: &Frame, title_rect: Rect, rect: Rect) {
    let scheme = frame.scheme;
    let focused = frame.focus == Focus::Terminal;
    let border = if focused {
        scheme.border_active
    } else {
        scheme.border
    };
    let title_style = Style::new(border.to_crossterm(), scheme.editor_bg.to_crossterm());
    let limit = title_rect.x + title_rect.width;

    for x in title_rect.x..limit {
        canvas.put_char(x, title_rect.y, '─', title_style, limit);
    }
    let label = if frame.terminal.title.is_empty() {
        " Terminal ".to_string()
    } else {
        format!(" Terminal: {} ", frame.terminal.title)
    };
    let label_style = if focused {
        title_style.bold()
    } else {
        title_style
    };
    canvas.put_str(title_rect.x + 1, title_rect.y, &label, label_style, limit);

    canvas.fill(rect.x, rect.y, rect.width, rect.height, Style::default());
    let limit = rect.x + rect.width;

    if let Some(state) = frame.terminal.state {
        let offset = state.scrollback.view_offset();
        if offset > 0 {
            let tag = format!(" [↑ {} lines] ", offset);
            let x = limit.saturating_sub(tag.width() as u16 + 1);
            canvas.put_str(x, title_rect.y, &tag, label_style, title_rect.x + title_rect.width);
        }

        let has_selection = state.selection.is_some();
        for row in 0..rect.height.min(state.rows) {
            let Some(cells) = state.visible_row(row as usize) else {
                continue;
            };
            let y = rect.y + row;
            for (col, cell) in cells.cells.iter().enumerate() {
                if cell.width == 0 {
                    continue;
                }
                let x = rect.x + col as u16;
                if x >= limit {
                    break;
                }
                let selected = has_selection && state.is_selected(col as u16, row);
                let ch = if cell.attrs.flags.contains(AttrFlags::HIDDEN) {
                    ' '
                } else {
                    cell.ch
                };
                canvas.put_char(x, y, ch, term_style(cell.attrs, selected), limit);
            }
        }

        if focused && frame.prompt.is_none() {
            if let Some((row, col)) = state.visible_cursor() {
                if row < rect.height && col < rect.width {
                    canvas.set_cursor(rect.x + col, rect.y + row);
                }
            }
        }
    }

    if let Some(notice) = frame.terminal.notice {
        let y = if frame.terminal.state.is_some() {
            rect.y + rect.height.saturating_sub(1)
        } else {
            rect.y
        };
        let style = Style::new(
            scheme.status_dirty_fg.to_crossterm(),
            scheme.editor_bg.to_crossterm(),
        )
        .bold();
        canvas.fill(rect.x, y, rect.width, 1, style);
        canvas.put_str(rect.x + 1, y, notice, style, limit);
    }
}

fn draw_status(canvas: &mut Canvas, frame: &Frame) {
    let scheme = frame.scheme;
    let rect = frame.layout.status;
    if rect.is_empty() {
        return;
    }
    let style = Style::new(
        scheme.status_bar_fg.to_crossterm(),
        scheme.status_bar_bg.to_crossterm(),
    );
    canvas.fill(rect.x, rect.y, rect.width, rect.height, style);
    let limit = rect.x + rect.width;

    if let Some(prompt) = &frame.prompt {
        let x = canvas.put_str(rect.x, rect.y, &format!(" {}: ", prompt.label), style.bold(), limit);
        let x = canvas.put_str(x, rect.y, prompt.input, style, limit);
        canvas.set_cursor(x.min(limit.saturating_sub(1)), rect.y);
        return;
    }

    let mut x = canvas.put_str(
        rect.x,
        rect.y,
        &format!(" {} ", frame.focus.name().to_uppercase()),
        style.bold(),
        limit,
    );

    let right = match (frame.focus, frame.documents.get(frame.active)) {
        (Focus::FileTree, _) => format!("{} ", frame.tree.root().display()),
        (_, Some(doc)) => {
            let s = doc.status();
            let selection = if s.selection_len > 0 {
                format!("({} sel) ", s.selection_len)
            } else {
                String::new()
            };
            let mode = match s.mode {
                EditMode::Insert => "INS",
                EditMode::Overwrite => "OVR",
            };
            format!(
                "Ln {}/{}, Col {} {}│ {} │ {} │ {} │ {} ",
                s.line,
                s.total_lines,
                s.column,
                selection,
                mode,
                s.line_ending.name(),
                s.encoding.name(),
                s.language
            )
        }
        (_, None) => String::new(),
    };

    let left = match (frame.message, frame.documents.get(frame.active)) {
        (Some(message), _) => format!("│ {}", message),
        (None, Some(doc)) => {
            let dirty = if doc.is_dirty() { " [+]" } else { "" };
            format!("│ {}{}", doc.title(), dirty)
        }
        (None, None) => String::new(),
    };

    let right_width = right.width() as u16;
    let right_x = limit.saturating_sub(right_width);
    let room = right_x.saturating_sub(x + 1) as usize;
    let left = truncate_to_width(&left, room);
    let left_style = if frame.message.is_some() {
        style.with_fg(scheme.status_dirty_fg.to_crossterm())
    } else {
        style
    };
    x = canvas.put_str(x, rect.y, &left, left_style, right_x);
    if right_x > x {
        canvas.put_str(right_x, rect.y, &right, style, limit);
    }
}

/// Terminal output with per-row diffing
pub struct Renderer {
    initialized: bool,
    previous: Option<Canvas>,
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer {
    pub fn new() -> Self {
        Self {
            initialized: false,
            previous: None,
        }
    }

    /// Enter raw mode and the alternate screen
    pub fn init(&mut self) -> io::Result<()> {
        terminal::enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(
            stdout,
            EnterAlternateScreen,
            EnableMouseCapture,
            EnableBracketedPaste,
            DisableLineWrap,
            Clear(ClearType::All),
            MoveTo(0, 0)
        )?;
        self.initialized = true;
        self.previous = None;
        Ok(())
    }

    /// Restore the terminal; safe to call twice
    pub fn cleanup(&mut self) -> io::Result<()> {
        if !self.initialized {
            return Ok(());
        }
        self.initialized = false;

        let mut stdout = io::stdout();
        let _ = execute!(
            stdout,
            ResetColor,
            SetAttribute(Attribute::Reset),
            Show,
            EnableLineWrap,
            DisableBracketedPaste,
            DisableMouseCapture,
            LeaveAlternateScreen
        );
        let _ = stdout.flush();
        terminal::disable_raw_mode()
    }

    /// Force a full redraw on the next frame
    pub fn invalidate(&mut self) {
        self.previous = None;
    }

    /// Write the rows that changed since the last frame
    pub fn present(&mut self, canvas: &Canvas) -> io::Result<()> {
        let stdout = io::stdout();
        let mut out = io::BufWriter::with_capacity(65536, stdout.lock());
        self.present_to(&mut out, canvas)?;
        out.flush()
    }

    fn present_to<W: Write>(&mut self, out: &mut W, canvas: &Canvas) -> io::Result<()> {
        let full = self
            .previous
            .as_ref()
            .map_or(true, |p| p.width() != canvas.width() || p.height() != canvas.height());

        // Synchronized update
        write!(out, "\x1b[?2026h")?;
        queue!(out, Hide)?;

        for y in 0..canvas.height() {
            let row = canvas.row(y);
            if !full && self.previous.as_ref().is_some_and(|p| p.row(y) == row) {
                continue;
            }
            queue!(out, MoveTo(0, y))?;
            write_row(out, row)?;
        }
        queue!(out, ResetColor, SetAttribute(Attribute::Reset))?;

        if let Some((x, y)) = canvas.cursor() {
            queue!(out, MoveTo(x, y), Show)?;
        }
        write!(out, "\x1b[?2026l")?;

        self.previous = Some(canvas.clone());
        Ok(())
    }

    pub fn size() -> io::Result<(u16, u16)> {
        terminal::size()
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        let _ = self.cleanup();
    }
}

fn write_row<W: Write>(out: &mut W, cells: &[CanvasCell]) -> io::Result<()> {
    let mut current: Option<Style> = None;
    let mut run = String::with_capacity(cells.len());
    for cell in cells.iter().filter(|c| c.width > 0) {
        if current != Some(cell.style) {
            if let Some(style) = current {
                apply_style(out, style)?;
                out.write_all(run.as_bytes())?;
                run.clear();
            }
            current = Some(cell.style);
        }
        run.push(cell.ch);
    }
    if let Some(style) = current {
        apply_style(out, style)?;
        out.write_all(run.as_bytes())?;
    }
    Ok(())
}

fn apply_style<W: Write>(out: &mut W, style: Style) -> io::Result<()> {
    queue!(out, SetAttribute(Attribute::Reset))?;

    let flags = style.flags;
    let attrs = [
        (AttrFlags::BOLD, Attribute::Bold),
        (AttrFlags::DIM, Attribute::Dim),
        (AttrFlags::ITALIC, Attribute::Italic),
        (AttrFlags::UNDERLINE, Attribute::Underlined),
        (AttrFlags::BLINK, Attribute::SlowBlink),
        (AttrFlags::INVERSE, Attribute::Reverse),
        (AttrFlags::STRIKETHROUGH, Attribute::CrossedOut),
    ];
    for (flag, attr) in attrs {
        if flags.contains(flag) {
            queue!(out, SetAttribute(attr))?;
        }
    }
    queue!(
        out,
        SetForegroundColor(style.fg),
        SetBackgroundColor(style.bg)
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::term::Terminal;
    use crate::ui::layout::LayoutRequest;
    use std::fs;
    use tempfile::TempDir;

    fn layout(show_tree: bool, show_terminal: bool) -> Layout {
        Layout::compute(
            80,
            24,
            LayoutRequest {
                show_tree,
                show_terminal,
                tree_width: 20,
                terminal_height: 6,
            },
        )
    }

    #[test]
    fn test_gutter_width() {
        assert_eq!(gutter_width(1, true), 4);
        assert_eq!(gutter_width(12_345, true), 6);
        assert_eq!(gutter_width(10, false), 0);
    }

    #[test]
    fn test_tab_aware_columns() {
        let line = "\tab\tc";
        assert_eq!(visual_offset(line, 0, 1, 4), 4);
        assert_eq!(visual_offset(line, 0, 4, 4), 8);
        assert_eq!(visual_offset(line, 1, 3, 4), 2);
        assert_eq!(char_at_column(line, 0, 2, 4), 0);
        assert_eq!(char_at_column(line, 0, 5, 4), 2);
        assert_eq!(char_at_column(line, 0, 40, 4), 5);
        assert_eq!(char_at_column("", 0, 3, 4), 0);
    }

    #[test]
    fn test_draw_editor_and_status() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("notes.txt"), "").unwrap();
        let tree = FileTree::new(dir.path(), false);
        let config = EditorConfig::default();
        let docs = vec![Document::from_text(1, "hello\nworld", config.clone())];
        let scheme = ColorScheme::default();

        let frame = Frame {
            layout: layout(true, false),
            focus: Focus::Editor,
            scheme: &scheme,
            editor: &config,
            tree: &tree,
            documents: &docs,
            active: 0,
            terminal: TerminalView {
                state: None,
                title: "",
                notice: None,
            },
            message: None,
            prompt: None,
        };
        let canvas = draw(&frame);

        // Tree row, separator, then gutter and text
        assert!(canvas.row_text(0).starts_with("  notes.txt"));
        assert!(canvas.row_text(1).contains("│  1 hello"));
        assert!(canvas.row_text(2).contains("│  2 world"));
        assert!(canvas.row_text(0).contains("untitled"));
        assert!(canvas.row_text(23).contains("Ln 1/2, Col 1"));
        // Cursor at the first text column
        assert_eq!(canvas.cursor(), Some((25, 1)));
    }

    #[test]
    fn test_draw_terminal_and_prompt() {
        let dir = TempDir::new().unwrap();
        let tree = FileTree::new(dir.path(), false);
        let config = EditorConfig::default();
        let docs = vec![Document::new(1, config.clone())];
        let scheme = ColorScheme::default();
        let mut term = Terminal::new(80, 6, 100);
        term.feed(b"$ ls\r\nsrc");

        let frame = Frame {
            layout: layout(false, true),
            focus: Focus::Terminal,
            scheme: &scheme,
            editor: &config,
            tree: &tree,
            documents: &docs,
            active: 0,
            terminal: TerminalView {
                state: Some(term.state()),
                title: "sh",
                notice: None,
            },
            message: None,
            prompt: None,
        };
        let canvas = draw(&frame);
        let terminal = frame.layout.terminal.unwrap();
        assert!(canvas.row_text(terminal.y - 1).contains("Terminal: sh"));
        assert_eq!(canvas.row_text(terminal.y), "$ ls");
        assert_eq!(canvas.row_text(terminal.y + 1), "src");
        assert_eq!(canvas.cursor(), Some((3, terminal.y + 1)));

        let frame = Frame {
            prompt: Some(Prompt {
                label: "Find",
                input: "abc",
            }),
            ..frame
        };
        let canvas = draw(&frame);
        assert_eq!(canvas.row_text(23), " Find: abc");
        assert_eq!(canvas.cursor(), Some((10, 23)));
    }

    #[test]
    fn test_present_skips_unchanged_rows() {
        let mut renderer = Renderer::new();
        let mut canvas = Canvas::new(10, 3);
        canvas.put_str(0, 0, "abc", Style::default(), 10);

        let mut first = Vec::new();
        renderer.present_to(&mut first, &canvas).unwrap();
        assert!(String::from_utf8_lossy(&first).contains("abc"));

        canvas.put_str(0, 2, "xyz", Style::default(), 10);
        let mut second = Vec::new();
        renderer.present_to(&mut second, &canvas).unwrap();
        let text = String::from_utf8_lossy(&second);
        assert!(text.contains("xyz"));
        assert!(!text.contains("abc"));
    }
}
