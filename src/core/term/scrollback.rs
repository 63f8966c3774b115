//! Rows scrolled off the top of the primary screen

use std::collections::VecDeque;

use super::state::Row;

/// Capacity-bounded history, oldest row first
pub struct Scrollback {
    rows: VecDeque<Row>,
    capacity: usize,
    /// Rows the viewport is scrolled back by (0 = live view)
    view_offset: usize,
}

impl Scrollback {
    pub fn new(capacity: usize) -> Self {
        Self {
            rows: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
            view_offset: 0,
        }
    }

    /// Append a row, evicting the oldest when full
    pub fn push(&mut self, row: Row) {
        if self.capacity == 0 {
            return;
        }
        if self.rows.len() == self.capacity {
            self.rows.pop_front();
        } else if self.view_offset > 0 {
            // Keep a scrolled-back view on the same content
            self.view_offset += 1;
        }
        self.rows.push_back(row);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Row by age, 0 being the oldest
    pub fn get(&self, index: usize) -> Option<&Row> {
        self.rows.get(index)
    }

    pub fn clear(&mut self) {
        self.rows.clear();
        self.view_offset = 0;
    }

    /// Clip or pad every stored row to `cols`
    pub fn resize_cols(&mut self, cols: u16) {
        for row in &mut self.rows {
            row.resize(cols);
        }
    }

    pub fn view_offset(&self) -> usize {
        self.view_offset
    }

    pub fn is_scrolled(&self) -> bool {
        self.view_offset > 0
    }

    pub fn scroll_view_up(&mut self, n: usize) {
        self.view_offset = (self.view_offset + n).min(self.rows.len());
    }

    pub fn scroll_view_down(&mut self, n: usize) {
        self.view_offset = self.view_offset.saturating_sub(n);
    }

    pub fn scroll_to_top(&mut self) {
        self.view_offset = self.rows.len();
    }

    pub fn scroll_to_bottom(&mut self) {
        self.view_offset = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(ch: char) -> Row {
        let mut row = Row::new(3);
        row.cells[0].ch = ch;
        row
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let mut sb = Scrollback::new(3);
        for ch in ['a', 'b', 'c', 'd', 'e'] {
            sb.push(row(ch));
            assert!(sb.len() <= sb.capacity());
        }
        assert_eq!(sb.len(), 3);
        assert_eq!(sb.get(0).map(|r| r.cells[0].ch), Some('c'));
        assert_eq!(sb.get(2).map(|r| r.cells[0].ch), Some('e'));
    }

    #[test]
    fn test_zero_capacity_keeps_nothing() {
        let mut sb = Scrollback::new(0);
        sb.push(row('a'));
        assert!(sb.is_empty());
    }

    #[test]
    fn test_view_offset_is_clamped_and_anchored() {
        let mut sb = Scrollback::new(10);
        sb.push(row('a'));
        sb.push(row('b'));
        sb.scroll_view_up(5);
        assert_eq!(sb.view_offset(), 2);

        sb.push(row('c'));
        assert_eq!(sb.view_offset(), 3);

        sb.scroll_view_down(10);
        assert!(!sb.is_scrolled());
        sb.scroll_to_top();
        assert_eq!(sb.view_offset(), 3);
        sb.clear();
        assert_eq!(sb.view_offset(), 0);
    }
}
