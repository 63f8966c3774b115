//! Terminal grid state
//!
//! Screen rows, cursors, attributes and modes. The dispatcher in the parent
//! module drives these operations; nothing here knows about escape syntax.

use bitflags::bitflags;
use unicode_width::UnicodeWidthChar;

use super::scrollback::Scrollback;

const TAB_WIDTH: u16 = 8;

/// Terminal state holding all screen data
pub struct TerminalState {
    pub cols: u16,
    pub rows: u16,
    primary: Screen,
    alternate: Screen,
    pub using_alternate: bool,
    primary_cursor: CursorState,
    alternate_cursor: CursorState,
    pub current_attrs: CellAttrs,
    pub modes: TerminalModes,
    pub title: String,
    /// Scroll region (top, bottom), 0-indexed, inclusive
    pub scroll_region: (u16, u16),
    pub scrollback: Scrollback,
    /// Mouse selection used for copying
    pub selection: Option<GridSelection>,
}

/// Selection in absolute rows (scrollback first, then the screen)
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GridSelection {
    pub start: (u16, usize),
    pub end: (u16, usize),
    /// Mouse button still held
    pub active: bool,
}

impl TerminalState {
    pub fn new(cols: u16, rows: u16, scrollback: usize) -> Self {
        let cols = cols.max(1);
        let rows = rows.max(1);
        Self {
            cols,
            rows,
            primary: Screen::new(cols, rows),
            alternate: Screen::new(cols, rows),
            using_alternate: false,
            primary_cursor: CursorState::default(),
            alternate_cursor: CursorState::default(),
            current_attrs: CellAttrs::default(),
            modes: TerminalModes::default(),
            title: String::new(),
            scroll_region: (0, rows - 1),
            scrollback: Scrollback::new(scrollback),
            selection: None,
        }
    }

    /// Full reset (RIS). Scrollback survives.
    pub fn reset(&mut self) {
        let capacity = self.scrollback.capacity();
        let scrollback = std::mem::replace(&mut self.scrollback, Scrollback::new(0));
        *self = Self::new(self.cols, self.rows, capacity);
        self.scrollback = scrollback;
    }

    pub fn active_screen(&self) -> &Screen {
        if self.using_alternate {
            &self.alternate
        } else {
            &self.primary
        }
    }

    pub fn active_screen_mut(&mut self) -> &mut Screen {
        if self.using_alternate {
            &mut self.alternate
        } else {
            &mut self.primary
        }
    }

    pub fn active_cursor(&self) -> &CursorState {
        if self.using_alternate {
            &self.alternate_cursor
        } else {
            &self.primary_cursor
        }
    }

    pub fn active_cursor_mut(&mut self) -> &mut CursorState {
        if self.using_alternate {
            &mut self.alternate_cursor
        } else {
            &mut self.primary_cursor
        }
    }

    /// Resize both screens.
    ///
    /// Columns are clipped or padded on the right. When the height shrinks,
    /// rows above the cursor go to scrollback until the cursor fits, then
    /// rows are dropped from the bottom. Growing pads blank rows at the
    /// bottom.
    pub fn resize(&mut self, cols: u16, rows: u16) {
        let cols = cols.max(1);
        let rows = rows.max(1);
        if cols == self.cols && rows == self.rows {
            return;
        }

        resize_screen(
            &mut self.primary,
            Some(&mut self.scrollback),
            &mut self.primary_cursor,
            cols,
            rows,
        );
        resize_screen(
            &mut self.alternate,
            None,
            &mut self.alternate_cursor,
            cols,
            rows,
        );
        self.scrollback.resize_cols(cols);

        self.cols = cols;
        self.rows = rows;
        self.scroll_region = (0, rows - 1);
        self.selection = None;
    }

    /// Put a character at the cursor with the current attributes
    pub fn put_char(&mut self, ch: char) {
        // Zero-width characters have no cell of their own
        let width = match ch.width() {
            Some(0) | None => return,
            Some(w) => w.min(2) as u16,
        };
        let cols = self.cols;

        if self.active_cursor().pending_wrap {
            if self.modes.auto_wrap {
                self.wrap_line();
            } else {
                self.active_cursor_mut().pending_wrap = false;
            }
        }

        // A wide character never straddles the right margin
        if width == 2 && self.active_cursor().col + 1 >= cols {
            if cols < 2 {
                return;
            }
            if self.modes.auto_wrap {
                self.wrap_line();
            } else {
                self.active_cursor_mut().col = cols - 2;
            }
        }

        if self.modes.insert_mode {
            self.insert_chars(width);
        }

        let (row, col) = {
            let cursor = self.active_cursor();
            (cursor.row as usize, cursor.col as usize)
        };
        let attrs = self.current_attrs;
        let cells = &mut self.active_screen_mut().rows[row].cells;

        // Do not leave half of a wide character behind
        if cells[col].width == 0 && col > 0 {
            cells[col - 1] = Cell::default();
        }
        let span_end = col + width as usize;
        if span_end < cells.len() && cells[span_end].width == 0 {
            cells[span_end] = Cell::default();
        }

        cells[col] = Cell {
            ch,
            width: width as u8,
            attrs,
        };
        if width == 2 {
            cells[col + 1] = Cell::continuation(attrs);
        }

        let auto_wrap = self.modes.auto_wrap;
        let cursor = self.active_cursor_mut();
        if span_end >= cols as usize {
            cursor.col = cols - 1;
            cursor.pending_wrap = auto_wrap;
        } else {
            cursor.col = span_end as u16;
        }
    }

    fn wrap_line(&mut self) {
        let row = self.active_cursor().row as usize;
        self.active_screen_mut().rows[row].wrapped = true;
        let cursor = self.active_cursor_mut();
        cursor.col = 0;
        cursor.pending_wrap = false;
        self.linefeed();
    }

    /// Move to an absolute 0-based position, clamped
    fn move_to(&mut self, row: u16, col: u16) {
        let rows = self.rows;
        let cols = self.cols;
        let cursor = self.active_cursor_mut();
        cursor.row = row.min(rows - 1);
        cursor.col = col.min(cols - 1);
        cursor.pending_wrap = false;
    }

    pub fn carriage_return(&mut self) {
        let row = self.active_cursor().row;
        self.move_to(row, 0);
    }

    /// Move down one row, scrolling at the bottom margin
    pub fn linefeed(&mut self) {
        let cursor = *self.active_cursor();
        let bottom = self.scroll_region.1;

        if cursor.row == bottom {
            self.scroll_up(1);
            self.active_cursor_mut().pending_wrap = false;
        } else {
            self.move_to(cursor.row + 1, cursor.col);
        }
        if self.modes.linefeed_newline {
            self.carriage_return();
        }
    }

    pub fn backspace(&mut self) {
        let cursor = *self.active_cursor();
        self.move_to(cursor.row, cursor.col.saturating_sub(1));
    }

    pub fn horizontal_tab(&mut self) {
        let cursor = *self.active_cursor();
        let next = (cursor.col / TAB_WIDTH + 1) * TAB_WIDTH;
        self.move_to(cursor.row, next);
    }

    /// Scroll the region up by n lines
    pub fn scroll_up(&mut self, n: u16) {
        let (top, bottom) = self.scroll_region;
        let cols = self.cols;
        let n = n.min(bottom - top + 1);

        let (screen, scrollback) = if self.using_alternate {
            (&mut self.alternate, None)
        } else {
            (&mut self.primary, Some(&mut self.scrollback))
        };
        // Only rows leaving the top of the full screen are kept
        let mut scrollback = scrollback.filter(|_| top == 0);

        for _ in 0..n {
            let removed = screen.rows.remove(top as usize);
            if let Some(sb) = scrollback.as_mut() {
                sb.push(removed);
            }
            screen.rows.insert(bottom as usize, Row::new(cols));
        }
    }

    /// Scroll the region down by n lines
    pub fn scroll_down(&mut self, n: u16) {
        let (top, bottom) = self.scroll_region;
        let cols = self.cols;
        let n = n.min(bottom - top + 1);
        let screen = self.active_screen_mut();

        for _ in 0..n {
            screen.rows.remove(bottom as usize);
            screen.rows.insert(top as usize, Row::new(cols));
        }
    }

    pub fn cursor_up(&mut self, n: u16) {
        let cursor = *self.active_cursor();
        // Stop at the top margin when starting inside the region
        let floor = if cursor.row >= self.scroll_region.0 {
            self.scroll_region.0
        } else {
            0
        };
        self.move_to(cursor.row.saturating_sub(n).max(floor), cursor.col);
    }

    pub fn cursor_down(&mut self, n: u16) {
        let cursor = *self.active_cursor();
        let ceiling = if cursor.row <= self.scroll_region.1 {
            self.scroll_region.1
        } else {
            self.rows - 1
        };
        self.move_to(cursor.row.saturating_add(n).min(ceiling), cursor.col);
    }

    pub fn cursor_forward(&mut self, n: u16) {
        let cursor = *self.active_cursor();
        self.move_to(cursor.row, cursor.col.saturating_add(n));
    }

    pub fn cursor_backward(&mut self, n: u16) {
        let cursor = *self.active_cursor();
        self.move_to(cursor.row, cursor.col.saturating_sub(n));
    }

    /// Set cursor position (1-indexed parameters)
    pub fn cursor_position(&mut self, row: u16, col: u16) {
        self.move_to(row.saturating_sub(1), col.saturating_sub(1));
    }

    /// Column absolute (1-indexed)
    pub fn set_column(&mut self, col: u16) {
        let row = self.active_cursor().row;
        self.move_to(row, col.saturating_sub(1));
    }

    /// Row absolute (1-indexed)
    pub fn set_row(&mut self, row: u16) {
        let col = self.active_cursor().col;
        self.move_to(row.saturating_sub(1), col);
    }

    pub fn erase_in_display(&mut self, mode: u16) {
        let row = self.active_cursor().row as usize;
        match mode {
            0 => {
                self.erase_in_line(0);
                for r in &mut self.active_screen_mut().rows[row + 1..] {
                    r.clear();
                }
            }
            1 => {
                for r in &mut self.active_screen_mut().rows[..row] {
                    r.clear();
                }
                self.erase_in_line(1);
            }
            2 => {
                for r in &mut self.active_screen_mut().rows {
                    r.clear();
                }
            }
            3 => self.scrollback.clear(),
            _ => {}
        }
    }

    pub fn erase_in_line(&mut self, mode: u16) {
        let cursor = *self.active_cursor();
        let cols = self.cols as usize;
        let col = cursor.col as usize;
        let row = &mut self.active_screen_mut().rows[cursor.row as usize];

        let range = match mode {
            0 => col..cols,
            1 => 0..col + 1,
            2 => 0..cols,
            _ => return,
        };
        for cell in &mut row.cells[range] {
            *cell = Cell::default();
        }
        if mode != 1 {
            row.wrapped = false;
        }
    }

    /// ECH: blank n cells from the cursor without moving anything
    pub fn erase_chars(&mut self, n: u16) {
        let cursor = *self.active_cursor();
        let col = cursor.col as usize;
        let cells = &mut self.active_screen_mut().rows[cursor.row as usize].cells;
        let end = (col + n as usize).min(cells.len());
        for cell in &mut cells[col..end] {
            *cell = Cell::default();
        }
    }

    /// ICH: shift the rest of the line right by n blanks
    pub fn insert_chars(&mut self, n: u16) {
        let cursor = *self.active_cursor();
        let cols = self.cols as usize;
        let col = cursor.col as usize;
        let cells = &mut self.active_screen_mut().rows[cursor.row as usize].cells;
        let n = (n as usize).min(cols - col);
        for _ in 0..n {
            cells.insert(col, Cell::default());
        }
        cells.truncate(cols);
    }

    /// DCH: remove n cells at the cursor, padding on the right
    pub fn delete_chars(&mut self, n: u16) {
        let cursor = *self.active_cursor();
        let cols = self.cols as usize;
        let col = cursor.col as usize;
        let cells = &mut self.active_screen_mut().rows[cursor.row as usize].cells;
        let n = (n as usize).min(cols - col);
        cells.drain(col..col + n);
        cells.resize(cols, Cell::default());
    }

    /// IL: insert blank lines at the cursor inside the scroll region
    pub fn insert_lines(&mut self, n: u16) {
        let row = self.active_cursor().row;
        let (top, bottom) = self.scroll_region;
        if row < top || row > bottom {
            return;
        }
        let cols = self.cols;
        let screen = self.active_screen_mut();
        for _ in 0..n.min(bottom - row + 1) {
            screen.rows.remove(bottom as usize);
            screen.rows.insert(row as usize, Row::new(cols));
        }
        self.move_to(row, 0);
    }

    /// DL: delete lines at the cursor inside the scroll region
    pub fn delete_lines(&mut self, n: u16) {
        let row = self.active_cursor().row;
        let (top, bottom) = self.scroll_region;
        if row < top || row > bottom {
            return;
        }
        let cols = self.cols;
        let screen = self.active_screen_mut();
        for _ in 0..n.min(bottom - row + 1) {
            screen.rows.remove(row as usize);
            screen.rows.insert(bottom as usize, Row::new(cols));
        }
        self.move_to(row, 0);
    }

    /// DECSTBM (1-indexed); invalid regions are ignored. Homes the cursor.
    pub fn set_scroll_region(&mut self, top: u16, bottom: u16) {
        let last = self.rows - 1;
        let top = top.saturating_sub(1).min(last);
        let bottom = if bottom == 0 {
            last
        } else {
            (bottom - 1).min(last)
        };
        if top < bottom {
            self.scroll_region = (top, bottom);
            self.move_to(0, 0);
        }
    }

    pub fn save_cursor(&mut self) {
        let attrs = self.current_attrs;
        let cursor = self.active_cursor_mut();
        cursor.saved = Some(SavedCursor {
            col: cursor.col,
            row: cursor.row,
            attrs,
        });
    }

    pub fn restore_cursor(&mut self) {
        if let Some(saved) = self.active_cursor().saved {
            self.move_to(saved.row, saved.col);
            self.current_attrs = saved.attrs;
        }
    }

    /// DEC private mode set/reset
    pub fn set_private_mode(&mut self, mode: u16, enable: bool) {
        match mode {
            1 => self.modes.application_cursor = enable,
            7 => {
                self.modes.auto_wrap = enable;
                self.active_cursor_mut().pending_wrap = false;
            }
            25 => self.active_cursor_mut().visible = enable,
            47 | 1047 => self.switch_screen(enable),
            1048 => {
                if enable {
                    self.save_cursor();
                } else {
                    self.restore_cursor();
                }
            }
            1049 => {
                if enable {
                    self.save_cursor();
                    self.switch_screen(true);
                    let saved = self.primary_cursor.saved;
                    self.alternate_cursor = CursorState {
                        saved,
                        ..CursorState::default()
                    };
                } else {
                    self.switch_screen(false);
                    self.restore_cursor();
                }
            }
            1000 => self.set_mouse(MouseTracking::Click, enable),
            1002 => self.set_mouse(MouseTracking::Drag, enable),
            1003 => self.set_mouse(MouseTracking::Motion, enable),
            1006 => self.modes.sgr_mouse = enable,
            2004 => self.modes.bracketed_paste = enable,
            _ => tracing::debug!("Ignored private mode {} = {}", mode, enable),
        }
    }

    fn set_mouse(&mut self, tracking: MouseTracking, enable: bool) {
        if enable {
            self.modes.mouse = tracking;
        } else if self.modes.mouse == tracking {
            self.modes.mouse = MouseTracking::Off;
        }
    }

    fn switch_screen(&mut self, alternate: bool) {
        if alternate == self.using_alternate {
            return;
        }
        if alternate {
            self.alternate = Screen::new(self.cols, self.rows);
        }
        self.using_alternate = alternate;
        self.selection = None;
    }

    /// RI: cursor up, scrolling at the top margin
    pub fn reverse_index(&mut self) {
        let row = self.active_cursor().row;
        if row == self.scroll_region.0 {
            self.scroll_down(1);
        } else {
            self.cursor_up(1);
        }
    }

    /// IND
    pub fn index(&mut self) {
        let newline = std::mem::replace(&mut self.modes.linefeed_newline, false);
        self.linefeed();
        self.modes.linefeed_newline = newline;
    }

    // ---- Viewport ----

    /// Row shown at `view_row`, following the scrollback view offset
    pub fn visible_row(&self, view_row: usize) -> Option<&Row> {
        self.row_absolute(self.view_to_absolute(view_row))
    }

    fn view_to_absolute(&self, view_row: usize) -> usize {
        if self.using_alternate {
            return view_row;
        }
        self.scrollback.len() - self.scrollback.view_offset() + view_row
    }

    /// Row by absolute index: scrollback rows first, then the screen
    fn row_absolute(&self, abs: usize) -> Option<&Row> {
        if self.using_alternate {
            return self.alternate.rows.get(abs);
        }
        let history = self.scrollback.len();
        if abs < history {
            self.scrollback.get(abs)
        } else {
            self.primary.rows.get(abs - history)
        }
    }

    /// Cursor position on the viewport, if it is visible
    pub fn visible_cursor(&self) -> Option<(u16, u16)> {
        let cursor = self.active_cursor();
        if !cursor.visible || (!self.using_alternate && self.scrollback.is_scrolled()) {
            return None;
        }
        Some((cursor.row, cursor.col))
    }

    // ---- Selection ----

    pub fn start_selection(&mut self, col: u16, view_row: u16) {
        let abs = self.view_to_absolute(view_row as usize);
        self.selection = Some(GridSelection {
            start: (col, abs),
            end: (col, abs),
            active: true,
        });
    }

    pub fn update_selection(&mut self, col: u16, view_row: u16) {
        let abs = self.view_to_absolute(view_row as usize);
        if let Some(sel) = self.selection.as_mut() {
            sel.end = (col, abs);
        }
    }

    pub fn end_selection(&mut self) {
        if let Some(sel) = self.selection.as_mut() {
            sel.active = false;
        }
    }

    pub fn clear_selection(&mut self) {
        self.selection = None;
    }

    fn ordered_selection(&self) -> Option<((u16, usize), (u16, usize))> {
        let sel = self.selection?;
        let (a, b) = (sel.start, sel.end);
        if (a.1, a.0) <= (b.1, b.0) {
            Some((a, b))
        } else {
            Some((b, a))
        }
    }

    pub fn is_selected(&self, col: u16, view_row: u16) -> bool {
        let Some((start, end)) = self.ordered_selection() else {
            return false;
        };
        let abs = self.view_to_absolute(view_row as usize);
        if abs < start.1 || abs > end.1 {
            return false;
        }
        (abs != start.1 || col >= start.0) && (abs != end.1 || col <= end.0)
    }

    /// Selected text; wrapped rows are joined without a newline
    pub fn selected_text(&self) -> Option<String> {
        let (start, end) = self.ordered_selection()?;
        let mut text = String::new();

        for abs in start.1..=end.1 {
            let Some(row) = self.row_absolute(abs) else {
                continue;
            };
            let from = if abs == start.1 { start.0 as usize } else { 0 };
            let to = if abs == end.1 {
                end.0 as usize + 1
            } else {
                row.cells.len()
            };
            let mut line: String = row
                .cells
                .iter()
                .take(to)
                .skip(from)
                .filter(|c| c.width > 0)
                .map(|c| c.ch)
                .collect();
            if abs < end.1 && !row.wrapped {
                line.truncate(line.trim_end().len());
                line.push('\n');
            }
            text.push_str(&line);
        }

        let text = text.trim_end_matches(' ').to_string();
        (!text.is_empty()).then_some(text)
    }
}

fn resize_screen(
    screen: &mut Screen,
    mut scrollback: Option<&mut Scrollback>,
    cursor: &mut CursorState,
    cols: u16,
    rows: u16,
) {
    for row in &mut screen.rows {
        row.resize(cols);
    }

    let rows = rows as usize;
    if screen.rows.len() > rows {
        let overflow = (cursor.row as usize + 1).saturating_sub(rows);
        for row in screen.rows.drain(..overflow) {
            if let Some(sb) = scrollback.as_mut() {
                sb.push(row);
            }
        }
        cursor.row -= overflow as u16;
        screen.rows.truncate(rows);
    }
    while screen.rows.len() < rows {
        screen.rows.push(Row::new(cols));
    }

    let last_row = rows as u16 - 1;
    cursor.row = cursor.row.min(last_row);
    cursor.col = cursor.col.min(cols - 1);
    cursor.pending_wrap = false;
    if let Some(saved) = cursor.saved.as_mut() {
        saved.row = saved.row.min(last_row);
        saved.col = saved.col.min(cols - 1);
    }
}

/// One screen's worth of rows
pub struct Screen {
    pub rows: Vec<Row>,
}

impl Screen {
    fn new(cols: u16, rows: u16) -> Self {
        Self {
            rows: (0..rows).map(|_| Row::new(cols)).collect(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Row {
    pub cells: Vec<Cell>,
    /// Content continues on the next row
    pub wrapped: bool,
}

impl Row {
    pub fn new(cols: u16) -> Self {
        Self {
            cells: vec![Cell::default(); cols as usize],
            wrapped: false,
        }
    }

    pub fn resize(&mut self, cols: u16) {
        self.cells.resize(cols as usize, Cell::default());
    }

    pub fn clear(&mut self) {
        self.cells.fill(Cell::default());
        self.wrapped = false;
    }

    /// Visible text with trailing blanks trimmed
    pub fn text(&self) -> String {
        let text: String = self
            .cells
            .iter()
            .filter(|c| c.width > 0)
            .map(|c| c.ch)
            .collect();
        text.trim_end().to_string()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Cell {
    pub ch: char,
    /// 1 or 2; 0 marks the right half of a wide character
    pub width: u8,
    pub attrs: CellAttrs,
}

impl Default for Cell {
    fn default() -> Self {
        Self {
            ch: ' ',
            width: 1,
            attrs: CellAttrs::default(),
        }
    }
}

impl Cell {
    pub fn continuation(attrs: CellAttrs) -> Self {
        Self {
            ch: ' ',
            width: 0,
            attrs,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CellAttrs {
    pub fg: Color,
    pub bg: Color,
    pub flags: AttrFlags,
}

impl CellAttrs {
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Color {
    #[default]
    Default,
    Indexed(u8),
    Rgb(u8, u8, u8),
}

impl Color {
    pub fn to_crossterm(self) -> crossterm::style::Color {
        match self {
            Color::Default => crossterm::style::Color::Reset,
            Color::Indexed(n) => crossterm::style::Color::AnsiValue(n),
            Color::Rgb(r, g, b) => crossterm::style::Color::Rgb { r, g, b },
        }
    }
}

bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct AttrFlags: u16 {
        const BOLD          = 0b0000_0000_0001;
        const DIM           = 0b0000_0000_0010;
        const ITALIC        = 0b0000_0000_0100;
        const UNDERLINE     = 0b0000_0000_1000;
        const BLINK         = 0b0000_0001_0000;
        const INVERSE       = 0b0000_0010_0000;
        const HIDDEN        = 0b0000_0100_0000;
        const STRIKETHROUGH = 0b0000_1000_0000;
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CursorState {
    pub col: u16,
    pub row: u16,
    pub visible: bool,
    /// Last column was written; the next print wraps first
    pub pending_wrap: bool,
    pub saved: Option<SavedCursor>,
}

impl Default for CursorState {
    fn default() -> Self {
        Self {
            col: 0,
            row: 0,
            visible: true,
            pending_wrap: false,
            saved: None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SavedCursor {
    pub col: u16,
    pub row: u16,
    pub attrs: CellAttrs,
}

/// Mouse reporting requested by the application
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MouseTracking {
    #[default]
    Off,
    /// 1000: presses and releases
    Click,
    /// 1002: plus motion while a button is held
    Drag,
    /// 1003: all motion
    Motion,
}

#[derive(Clone, Debug)]
pub struct TerminalModes {
    pub application_cursor: bool,
    pub auto_wrap: bool,
    pub insert_mode: bool,
    pub linefeed_newline: bool,
    pub bracketed_paste: bool,
    pub mouse: MouseTracking,
    /// 1006 extended coordinates
    pub sgr_mouse: bool,
}

impl Default for TerminalModes {
    fn default() -> Self {
        Self {
            application_cursor: false,
            auto_wrap: true,
            insert_mode: false,
            linefeed_newline: false,
            bracketed_paste: false,
            mouse: MouseTracking::Off,
            sgr_mouse: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn print(state: &mut TerminalState, text: &str) {
        for ch in text.chars() {
            state.put_char(ch);
        }
    }

    fn line(state: &TerminalState, row: usize) -> String {
        state.active_screen().rows[row].text()
    }

    #[test]
    fn test_exact_width_defers_wrap() {
        let mut state = TerminalState::new(5, 3, 100);
        print(&mut state, "abcde");
        assert_eq!(line(&state, 0), "abcde");
        assert_eq!(state.active_cursor().col, 4);
        assert!(state.active_cursor().pending_wrap);

        // CR LF after a full line does not leave an empty row
        state.carriage_return();
        state.linefeed();
        print(&mut state, "x");
        assert_eq!(line(&state, 1), "x");

        print(&mut state, "1234");
        print(&mut state, "5");
        assert_eq!(line(&state, 2), "5");
        assert!(state.active_screen().rows[1].wrapped);
    }

    #[test]
    fn test_wide_char_wraps_before_margin() {
        let mut state = TerminalState::new(4, 2, 0);
        print(&mut state, "abc日");
        assert_eq!(line(&state, 0), "abc");
        assert_eq!(line(&state, 1), "日");
        assert_eq!(state.active_screen().rows[1].cells[1].width, 0);
    }

    #[test]
    fn test_overwriting_half_of_wide_char() {
        let mut state = TerminalState::new(6, 1, 0);
        print(&mut state, "日本");
        state.cursor_position(1, 2);
        print(&mut state, "x");
        assert_eq!(line(&state, 0), " x本");
    }

    #[test]
    fn test_scroll_feeds_scrollback() {
        let mut state = TerminalState::new(3, 2, 2);
        for word in ["a", "b", "c", "d", "e"] {
            print(&mut state, word);
            state.carriage_return();
            state.linefeed();
        }
        assert_eq!(state.scrollback.len(), 2);
        assert_eq!(state.scrollback.get(0).map(Row::text).as_deref(), Some("c"));
        assert_eq!(line(&state, 0), "e");
    }

    #[test]
    fn test_scroll_region_bounds() {
        let mut state = TerminalState::new(3, 4, 10);
        for (i, word) in ["a", "b", "c", "d"].iter().enumerate() {
            state.cursor_position(i as u16 + 1, 1);
            print(&mut state, word);
        }
        state.set_scroll_region(2, 3);
        state.cursor_position(3, 1);
        state.linefeed();
        assert_eq!(
            (0..4).map(|r| line(&state, r)).collect::<Vec<_>>(),
            vec!["a", "c", "", "d"]
        );
        // Region scrolls never feed scrollback
        assert!(state.scrollback.is_empty());
    }

    #[test]
    fn test_erase_uses_default_attrs() {
        let mut state = TerminalState::new(4, 2, 0);
        state.current_attrs.bg = Color::Indexed(4);
        print(&mut state, "abcd");
        state.cursor_position(1, 3);
        state.erase_in_line(0);
        let row = &state.active_screen().rows[0];
        assert_eq!(row.text(), "ab");
        assert_eq!(row.cells[3].attrs, CellAttrs::default());
        assert_eq!(row.cells[0].attrs.bg, Color::Indexed(4));
    }

    #[test]
    fn test_insert_delete_chars() {
        let mut state = TerminalState::new(5, 1, 0);
        print(&mut state, "abcde");
        state.cursor_position(1, 2);
        state.insert_chars(2);
        assert_eq!(line(&state, 0), "a  bc");
        state.delete_chars(3);
        assert_eq!(line(&state, 0), "ac");
        state.erase_chars(10);
        assert_eq!(line(&state, 0), "a");
    }

    #[test]
    fn test_resize_keeps_cursor_on_screen() {
        let mut state = TerminalState::new(10, 5, 100);
        for word in ["1", "2", "3", "4"] {
            print(&mut state, word);
            state.carriage_return();
            state.linefeed();
        }
        print(&mut state, "5");
        assert_eq!(state.active_cursor().row, 4);

        state.resize(3, 2);
        assert_eq!((state.cols, state.rows), (3, 2));
        assert_eq!(state.active_screen().rows.len(), 2);
        assert!(state.active_screen().rows.iter().all(|r| r.cells.len() == 3));
        assert_eq!(line(&state, 0), "4");
        assert_eq!(line(&state, 1), "5");
        assert_eq!(state.scrollback.len(), 3);
        assert_eq!(state.active_cursor().row, 1);

        state.resize(4, 6);
        assert_eq!(state.active_screen().rows.len(), 6);
        assert_eq!(line(&state, 1), "5");
        assert_eq!(line(&state, 5), "");
        assert_eq!(state.scroll_region, (0, 5));
    }

    #[test]
    fn test_shrink_with_cursor_at_top_drops_bottom() {
        let mut state = TerminalState::new(4, 4, 100);
        state.cursor_position(4, 1);
        print(&mut state, "end");
        state.cursor_position(1, 1);
        state.resize(4, 2);
        assert!(state.scrollback.is_empty());
        assert_eq!(state.active_cursor().row, 0);
        assert_eq!(line(&state, 1), "");
    }

    #[test]
    fn test_alternate_screen_round_trip() {
        let mut state = TerminalState::new(4, 2, 10);
        print(&mut state, "main");
        state.cursor_position(2, 2);
        state.set_private_mode(1049, true);
        assert!(state.using_alternate);
        assert_eq!(line(&state, 0), "");
        print(&mut state, "alt");

        state.set_private_mode(1049, false);
        assert_eq!(line(&state, 0), "main");
        assert_eq!(
            (state.active_cursor().row, state.active_cursor().col),
            (1, 1)
        );
    }

    #[test]
    fn test_scrollback_view_and_selection() {
        let mut state = TerminalState::new(5, 2, 10);
        for word in ["one", "two", "three"] {
            print(&mut state, word);
            state.carriage_return();
            state.linefeed();
        }
        // Screen: "three", ""; scrollback: "one", "two"
        state.scrollback.scroll_view_up(1);
        assert_eq!(state.visible_row(0).map(Row::text).as_deref(), Some("two"));
        assert_eq!(state.visible_cursor(), None);

        state.start_selection(0, 0);
        state.update_selection(4, 1);
        state.end_selection();
        assert!(state.is_selected(2, 0));
        assert_eq!(state.selected_text().as_deref(), Some("two\nthree"));

        state.scrollback.scroll_to_bottom();
        assert_eq!(state.visible_row(0).map(Row::text).as_deref(), Some("three"));
    }

    #[test]
    fn test_mouse_modes() {
        let mut state = TerminalState::new(4, 2, 0);
        state.set_private_mode(1002, true);
        state.set_private_mode(1006, true);
        assert_eq!(state.modes.mouse, MouseTracking::Drag);
        state.set_private_mode(1000, false);
        assert_eq!(state.modes.mouse, MouseTracking::Drag);
        state.set_private_mode(1002, false);
        assert_eq!(state.modes.mouse, MouseTracking::Off);
        assert!(state.modes.sgr_mouse);
    }
}
