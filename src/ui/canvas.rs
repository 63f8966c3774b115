//! Off-screen cell buffer
//!
//! Panes draw into a [`Canvas`]; the renderer then writes only the rows that
//! differ from the previous frame.

use crossterm::style::Color;
use unicode_width::UnicodeWidthChar;

use crate::core::term::AttrFlags;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Style {
    pub fg: Color,
    pub bg: Color,
    pub flags: AttrFlags,
}

impl Default for Style {
    fn default() -> Self {
        Self {
            fg: Color::Reset,
            bg: Color::Reset,
            flags: AttrFlags::empty(),
        }
    }
}

impl Style {
    pub fn new(fg: Color, bg: Color) -> Self {
        Self {
            fg,
            bg,
            flags: AttrFlags::empty(),
        }
    }

    pub fn bold(mut self) -> Self {
        self.flags |= AttrFlags::BOLD;
        self
    }

    pub fn with_bg(mut self, bg: Color) -> Self {
        self.bg = bg;
        self
    }

    pub fn with_fg(mut self, fg: Color) -> Self {
        self.fg = fg;
        self
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CanvasCell {
    pub ch: char,
    /// 0 for the right half of a wide character
    pub width: u8,
    pub style: Style,
}

impl Default for CanvasCell {
    fn default() -> Self {
        Self {
            ch: ' ',
            width: 1,
            style: Style::default(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Canvas {
    width: u16,
    height: u16,
    cells: Vec<CanvasCell>,
    cursor: Option<(u16, u16)>,
}

impl Canvas {
    pub fn new(width: u16, height: u16) -> Self {
        Self {
            width,
            height,
            cells: vec![CanvasCell::default(); width as usize * height as usize],
            cursor: None,
        }
    }

    pub fn width(&self) -> u16 {
        self.width
    }

    pub fn height(&self) -> u16 {
        self.height
    }

    pub fn cursor(&self) -> Option<(u16, u16)> {
        self.cursor
    }

    pub fn set_cursor(&mut self, x: u16, y: u16) {
        if x < self.width && y < self.height {
            self.cursor = Some((x, y));
        }
    }

    pub fn row(&self, y: u16) -> &[CanvasCell] {
        let w = self.width as usize;
        let start = (y as usize * w).min(self.cells.len());
        let end = (start + w).min(self.cells.len());
        &self.cells[start..end]
    }

    fn index(&self, x: u16, y: u16) -> Option<usize> {
        (x < self.width && y < self.height).then(|| y as usize * self.width as usize + x as usize)
    }

    /// Fill a rectangle with blanks in `style`
    pub fn fill(&mut self, x: u16, y: u16, width: u16, height: u16, style: Style) {
        for row in y..y.saturating_add(height).min(self.height) {
            for col in x..x.saturating_add(width).min(self.width) {
                if let Some(i) = self.index(col, row) {
                    self.cells[i] = CanvasCell {
                        ch: ' ',
                        width: 1,
                        style,
                    };
                }
            }
        }
    }

    /// Draw one character, clipped at `limit`. Returns the columns used.
    pub fn put_char(&mut self, x: u16, y: u16, ch: char, style: Style, limit: u16) -> u16 {
        let limit = limit.min(self.width);
        let (ch, width) = match ch.width() {
            Some(0) | None => return 0,
            Some(w) if ch.is_control() => (' ', w as u16),
            Some(w) => (ch, w as u16),
        };
        if x >= limit {
            return 0;
        }
        if x + width > limit {
            // Half a wide character does not fit
            self.fill(x, y, limit - x, 1, style);
            return limit - x;
        }
        let Some(i) = self.index(x, y) else {
            return 0;
        };
        self.cells[i] = CanvasCell {
            ch,
            width: width as u8,
            style,
        };
        for k in 1..width {
            if let Some(j) = self.index(x + k, y) {
                self.cells[j] = CanvasCell {
                    ch: ' ',
                    width: 0,
                    style,
                };
            }
        }
        width
    }

    /// Draw text left to right, stopping at `limit`. Returns the next column.
    pub fn put_str(&mut self, x: u16, y: u16, text: &str, style: Style, limit: u16) -> u16 {
        let mut col = x;
        for ch in text.chars() {
            if col >= limit {
                break;
            }
            col += self.put_char(col, y, ch, style, limit);
        }
        col
    }

    /// Row as plain text, for tests and debugging
    pub fn row_text(&self, y: u16) -> String {
        self.row(y)
            .iter()
            .filter(|c| c.width > 0)
            .map(|c| c.ch)
            .collect::<String>()
            .trim_end()
            .to_string()
    }
}
