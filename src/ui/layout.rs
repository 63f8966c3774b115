//! Screen split into file tree, editor, terminal and status line
//!
//! ```text
//! ┌──────────┬──────────────────────────┐
//! │ tree     │ header (open documents)  │
//! │          │ editor text              │
//! ├──────────┴──────────────────────────┤
//! │ terminal title                      │
//! │ terminal grid                       │
//! ├─────────────────────────────────────┤
//! │ status line                         │
//! └─────────────────────────────────────┘
//! ```

use crate::input::Focus;

/// Narrowest screen that still gets a file tree
const MIN_WIDTH_FOR_TREE: u16 = 40;
/// Editor rows kept when the terminal is shown
const MIN_EDITOR_ROWS: u16 = 3;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Rect {
    pub x: u16,
    pub y: u16,
    pub width: u16,
    pub height: u16,
}

impl Rect {
    pub const fn new(x: u16, y: u16, width: u16, height: u16) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn contains(&self, col: u16, row: u16) -> bool {
        col >= self.x
            && row >= self.y
            && u32::from(col) < u32::from(self.x) + u32::from(self.width)
            && u32::from(row) < u32::from(self.y) + u32::from(self.height)
    }

    /// Position relative to the top-left corner, if inside
    pub fn relative(&self, col: u16, row: u16) -> Option<(u16, u16)> {
        self.contains(col, row)
            .then(|| (col - self.x, row - self.y))
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Layout {
    pub tree: Option<Rect>,
    pub editor_header: Rect,
    pub editor: Rect,
    pub terminal_title: Option<Rect>,
    pub terminal: Option<Rect>,
    pub status: Rect,
}

/// Requested pane arrangement
#[derive(Clone, Copy, Debug)]
pub struct LayoutRequest {
    pub show_tree: bool,
    pub show_terminal: bool,
    pub tree_width: u16,
    pub terminal_height: u16,
}

impl Layout {
    /// Split a `width` x `height` screen. Panes that do not fit are dropped.
    pub fn compute(width: u16, height: u16, req: LayoutRequest) -> Self {
        let status = Rect::new(0, height.saturating_sub(1), width, height.min(1));
        let body = height.saturating_sub(1);

        let mut top = body;
        let mut terminal_title = None;
        let mut terminal = None;
        if req.show_terminal && body > MIN_EDITOR_ROWS + 2 {
            let max_rows = (body - MIN_EDITOR_ROWS - 1).max(1);
            let rows = req.terminal_height.clamp(1, max_rows);
            top = body - rows - 1;
            terminal_title = Some(Rect::new(0, top, width, 1));
            terminal = Some(Rect::new(0, top + 1, width, rows));
        }

        let mut editor_x = 0;
        let mut tree = None;
        if req.show_tree && width >= MIN_WIDTH_FOR_TREE {
            let tree_width = req.tree_width.clamp(8, width / 2);
            tree = Some(Rect::new(0, 0, tree_width, top));
            // One column for the separator
            editor_x = tree_width + 1;
        }

        let editor_width = width.saturating_sub(editor_x);
        let editor_header = Rect::new(editor_x, 0, editor_width, top.min(1));
        let editor = Rect::new(editor_x, top.min(1), editor_width, top.saturating_sub(1));

        Self {
            tree,
            editor_header,
            editor,
            terminal_title,
            terminal,
            status,
        }
    }

    /// Pane under a screen position
    pub fn pane_at(&self, col: u16, row: u16) -> Option<Focus> {
        if self.tree.is_some_and(|r| r.contains(col, row)) {
            Some(Focus::FileTree)
        } else if self.editor_header.contains(col, row) || self.editor.contains(col, row) {
            Some(Focus::Editor)
        } else if self.terminal_title.is_some_and(|r| r.contains(col, row))
            || self.terminal.is_some_and(|r| r.contains(col, row))
        {
            Some(Focus::Terminal)
        } else {
            None
        }
    }

    /// Content area of a pane
    pub fn content(&self, pane: Focus) -> Option<Rect> {
        match pane {
            Focus::FileTree => self.tree,
            Focus::Editor => Some(self.editor),
            Focus::Terminal => self.terminal,
        }
    }
}
