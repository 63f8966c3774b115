//! Terminal emulator
//!
//! [`VtParser`] splits the byte stream into actions; [`Terminal`] applies
//! them to [`TerminalState`] and collects the replies the child expects.

pub mod parser;
pub mod scrollback;
pub mod state;

pub use parser::{Action, VtParser};
pub use state::{AttrFlags, CellAttrs, Color, MouseTracking, TerminalModes, TerminalState};

use tracing::debug;

/// Reply that must be written back to the PTY
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// Cursor position report: ESC [ row ; col R
    CursorPosition(u16, u16),
    /// DSR 5: terminal OK
    StatusOk,
    DeviceAttributes,
    SecondaryDeviceAttributes,
}

impl Response {
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            Response::CursorPosition(row, col) => format!("\x1b[{};{}R", row, col).into_bytes(),
            Response::StatusOk => b"\x1b[0n".to_vec(),
            // VT220
            Response::DeviceAttributes => b"\x1b[?62;c".to_vec(),
            Response::SecondaryDeviceAttributes => b"\x1b[>1;10;0c".to_vec(),
        }
    }
}

/// Parser plus grid
pub struct Terminal {
    parser: VtParser,
    state: TerminalState,
}

impl Terminal {
    pub fn new(cols: u16, rows: u16, scrollback: usize) -> Self {
        Self {
            parser: VtParser::new(),
            state: TerminalState::new(cols, rows, scrollback),
        }
    }

    pub fn state(&self) -> &TerminalState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut TerminalState {
        &mut self.state
    }

    pub fn size(&self) -> (u16, u16) {
        (self.state.rows, self.state.cols)
    }

    pub fn resize(&mut self, rows: u16, cols: u16) {
        self.state.resize(cols, rows);
    }

    pub fn title(&self) -> &str {
        &self.state.title
    }

    /// Apply PTY output, returning replies in order
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<Response> {
        let mut responses = Vec::new();
        let Self { parser, state } = self;
        for &byte in bytes {
            parser.advance(byte, &mut |action| {
                if let Some(response) = dispatch(state, action) {
                    responses.push(response);
                }
            });
        }
        responses
    }
}

fn dispatch(state: &mut TerminalState, action: Action) -> Option<Response> {
    match action {
        Action::Print(ch) => {
            state.put_char(ch);
            None
        }
        Action::Execute(byte) => {
            execute(state, byte);
            None
        }
        Action::Csi {
            params,
            intermediates,
            final_byte,
        } => execute_csi(state, &params, &intermediates, final_byte),
        Action::Esc {
            intermediates,
            final_byte,
        } => {
            execute_esc(state, &intermediates, final_byte);
            None
        }
        Action::Osc(payload) => {
            execute_osc(state, &payload);
            None
        }
    }
}

fn execute(state: &mut TerminalState, byte: u8) {
    match byte {
        0x08 => state.backspace(),
        0x09 => state.horizontal_tab(),
        0x0A..=0x0C => state.linefeed(),
        0x0D => state.carriage_return(),
        // BEL and the rest
        _ => {}
    }
}

fn execute_esc(state: &mut TerminalState, intermediates: &[u8], final_byte: u8) {
    if !intermediates.is_empty() {
        // Charset designations and the like
        return;
    }
    match final_byte {
        b'7' => state.save_cursor(),
        b'8' => state.restore_cursor(),
        b'D' => state.index(),
        b'E' => {
            state.carriage_return();
            state.index();
        }
        b'M' => state.reverse_index(),
        b'c' => state.reset(),
        _ => debug!("Unknown ESC {:?}", final_byte as char),
    }
}

/// First parameter, with 0 or missing meaning `default`
fn param(params: &[u16], index: usize, default: u16) -> u16 {
    match params.get(index).copied() {
        None | Some(0) => default,
        Some(n) => n,
    }
}

fn execute_csi(
    state: &mut TerminalState,
    params: &[u16],
    intermediates: &[u8],
    final_byte: u8,
) -> Option<Response> {
    let private = intermediates.first() == Some(&b'?');
    let secondary = intermediates.first() == Some(&b'>');
    let plain = intermediates.is_empty();
    let n = param(params, 0, 1);

    match final_byte {
        b'A' if plain => state.cursor_up(n),
        b'B' if plain => state.cursor_down(n),
        b'C' if plain => state.cursor_forward(n),
        b'D' if plain => state.cursor_backward(n),
        b'E' if plain => {
            state.cursor_down(n);
            state.carriage_return();
        }
        b'F' if plain => {
            state.cursor_up(n);
            state.carriage_return();
        }
        b'G' | b'`' if plain => state.set_column(n),
        b'H' | b'f' if plain => state.cursor_position(n, param(params, 1, 1)),
        b'd' if plain => state.set_row(n),
        b'J' if plain => state.erase_in_display(params.first().copied().unwrap_or(0)),
        b'K' if plain => state.erase_in_line(params.first().copied().unwrap_or(0)),
        b'@' if plain => state.insert_chars(n),
        b'P' if plain => state.delete_chars(n),
        b'X' if plain => state.erase_chars(n),
        b'L' if plain => state.insert_lines(n),
        b'M' if plain => state.delete_lines(n),
        b'S' if plain => state.scroll_up(n),
        b'T' if plain => state.scroll_down(n),
        b'r' if plain => state.set_scroll_region(param(params, 0, 1), param(params, 1, 0)),
        b'm' if plain => execute_sgr(state, params),
        b's' if plain => state.save_cursor(),
        b'u' if plain => state.restore_cursor(),
        b'n' if plain => {
            return match params.first() {
                Some(5) => Some(Response::StatusOk),
                Some(6) => {
                    let cursor = state.active_cursor();
                    Some(Response::CursorPosition(cursor.row + 1, cursor.col + 1))
                }
                _ => None,
            };
        }
        b'c' if plain => return Some(Response::DeviceAttributes),
        b'c' if secondary => return Some(Response::SecondaryDeviceAttributes),
        b'h' | b'l' if private => {
            for &mode in params {
                state.set_private_mode(mode, final_byte == b'h');
            }
        }
        b'h' | b'l' if plain => {
            let enable = final_byte == b'h';
            for &mode in params {
                match mode {
                    4 => state.modes.insert_mode = enable,
                    20 => state.modes.linefeed_newline = enable,
                    _ => {}
                }
            }
        }
        _ => debug!(
            "Unknown CSI: intermediates={:?}, params={:?}, final={:?}",
            intermediates, params, final_byte as char
        ),
    }
    None
}

fn execute_sgr(state: &mut TerminalState, params: &[u16]) {
    if params.is_empty() {
        state.current_attrs.reset();
        return;
    }

    let attrs = &mut state.current_attrs;
    let mut iter = params.iter().copied();

    while let Some(param) = iter.next() {
        match param {
            0 => attrs.reset(),
            1 => attrs.flags |= AttrFlags::BOLD,
            2 => attrs.flags |= AttrFlags::DIM,
            3 => attrs.flags |= AttrFlags::ITALIC,
            4 => attrs.flags |= AttrFlags::UNDERLINE,
            5 | 6 => attrs.flags |= AttrFlags::BLINK,
            7 => attrs.flags |= AttrFlags::INVERSE,
            8 => attrs.flags |= AttrFlags::HIDDEN,
            9 => attrs.flags |= AttrFlags::STRIKETHROUGH,

            22 => attrs.flags &= !(AttrFlags::BOLD | AttrFlags::DIM),
            23 => attrs.flags &= !AttrFlags::ITALIC,
            24 => attrs.flags &= !AttrFlags::UNDERLINE,
            25 => attrs.flags &= !AttrFlags::BLINK,
            27 => attrs.flags &= !AttrFlags::INVERSE,
            28 => attrs.flags &= !AttrFlags::HIDDEN,
            29 => attrs.flags &= !AttrFlags::STRIKETHROUGH,

            30..=37 => attrs.fg = Color::Indexed((param - 30) as u8),
            38 => {
                if let Some(color) = extended_color(&mut iter) {
                    attrs.fg = color;
                }
            }
            39 => attrs.fg = Color::Default,
            40..=47 => attrs.bg = Color::Indexed((param - 40) as u8),
            48 => {
                if let Some(color) = extended_color(&mut iter) {
                    attrs.bg = color;
                }
            }
            49 => attrs.bg = Color::Default,
            90..=97 => attrs.fg = Color::Indexed((param - 90 + 8) as u8),
            100..=107 => attrs.bg = Color::Indexed((param - 100 + 8) as u8),
            _ => debug!("Unknown SGR {}", param),
        }
    }
}

/// `5;n` (256 colors) or `2;r;g;b` (truecolor) after 38/48
fn extended_color(iter: &mut impl Iterator<Item = u16>) -> Option<Color> {
    let channel = |v: Option<u16>| v.unwrap_or(0).min(255) as u8;
    match iter.next()? {
        5 => iter.next().map(|n| Color::Indexed(n.min(255) as u8)),
        2 => {
            let r = channel(iter.next());
            let g = channel(iter.next());
            let b = channel(iter.next());
            Some(Color::Rgb(r, g, b))
        }
        _ => None,
    }
}

fn execute_osc(state: &mut TerminalState, payload: &str) {
    let Some((code, text)) = payload.split_once(';') else {
        return;
    };
    match code {
        "0" | "1" | "2" => state.title = text.to_string(),
        _ => debug!("Ignored OSC {}", code),
    }
}

#[cfg(test)]
mod tests {
    use super::state::Row;
    use super::*;

    fn screen_text(term: &Terminal) -> Vec<String> {
        term.state()
            .active_screen()
            .rows
            .iter()
            .map(Row::text)
            .collect()
    }

    fn cursor(term: &Terminal) -> (u16, u16) {
        let c = term.state().active_cursor();
        (c.row, c.col)
    }

    #[test]
    fn test_clear_and_home() {
        let mut term = Terminal::new(10, 3, 100);
        term.feed(b"hello\r\nworld");
        term.feed(b"\x1b[2J\x1b[H");
        assert!(screen_text(&term).iter().all(String::is_empty));
        assert_eq!(cursor(&term), (0, 0));
    }

    #[test]
    fn test_cursor_movement_clamps() {
        let mut term = Terminal::new(80, 24, 0);
        term.feed(b"\x1b[5;10H");
        assert_eq!(cursor(&term), (4, 9));
        term.feed(b"\x1b[200;300H");
        assert_eq!(cursor(&term), (23, 79));
        term.feed(b"\x1b[99A\x1b[3C");
        assert_eq!(cursor(&term), (0, 79));
        term.feed(b"\x1b[0G");
        assert_eq!(cursor(&term), (0, 0));
    }

    #[test]
    fn test_exact_wrap() {
        let mut term = Terminal::new(4, 3, 0);
        term.feed(b"abcd");
        assert_eq!(cursor(&term), (0, 3));
        term.feed(b"e");
        assert_eq!(screen_text(&term), vec!["abcd", "e", ""]);
        assert_eq!(cursor(&term), (1, 1));
    }

    #[test]
    fn test_recovers_after_malformed_sequences() {
        let mut term = Terminal::new(20, 2, 0);
        term.feed(b"\x1b[12;\xff\x1b[?25\x18\x1b]0;unterminated\x1b[1;1H");
        term.feed(b"A");
        assert_eq!(screen_text(&term)[0], "A");
        assert!(term.state().active_cursor().visible);
    }

    #[test]
    fn test_sgr_colors_and_reset() {
        let mut term = Terminal::new(10, 1, 0);
        term.feed(b"\x1b[1;31;48;2;10;20;30mX\x1b[0mY");
        let cells = &term.state().active_screen().rows[0].cells;
        assert_eq!(cells[0].attrs.fg, Color::Indexed(1));
        assert_eq!(cells[0].attrs.bg, Color::Rgb(10, 20, 30));
        assert!(cells[0].attrs.flags.contains(AttrFlags::BOLD));
        assert_eq!(cells[1].attrs, CellAttrs::default());

        term.feed(b"\x1b[38;5;200;94m");
        assert_eq!(term.state().current_attrs.fg, Color::Indexed(12));
        term.feed(b"\x1b[38;5;200m");
        assert_eq!(term.state().current_attrs.fg, Color::Indexed(200));
    }

    #[test]
    fn test_osc_title() {
        let mut term = Terminal::new(10, 1, 0);
        term.feed(b"\x1b]2;build \xe2\x9c\x93\x07");
        assert_eq!(term.title(), "build ✓");
    }

    #[test]
    fn test_reports() {
        let mut term = Terminal::new(10, 5, 0);
        term.feed(b"\x1b[3;4H");
        assert_eq!(term.feed(b"\x1b[6n"), vec![Response::CursorPosition(3, 4)]);
        assert_eq!(
            term.feed(b"\x1b[c\x1b[>c\x1b[5n"),
            vec![
                Response::DeviceAttributes,
                Response::SecondaryDeviceAttributes,
                Response::StatusOk
            ]
        );
        assert_eq!(Response::CursorPosition(3, 4).to_bytes(), b"\x1b[3;4R");
    }

    #[test]
    fn test_modes() {
        let mut term = Terminal::new(10, 2, 0);
        term.feed(b"\x1b[?1h\x1b[?2004h\x1b[?1000h\x1b[?1006h\x1b[?25l");
        let modes = &term.state().modes;
        assert!(modes.application_cursor);
        assert!(modes.bracketed_paste);
        assert_eq!(modes.mouse, MouseTracking::Click);
        assert!(modes.sgr_mouse);
        assert!(!term.state().active_cursor().visible);

        term.feed(b"ab\x1b[4hX");
        assert_eq!(screen_text(&term)[0], "abX");
        term.feed(b"\x1b[1G\x1b[4hZ");
        assert_eq!(screen_text(&term)[0], "ZabX");
    }

    #[test]
    fn test_line_feed_scrolls_into_scrollback() {
        let mut term = Terminal::new(5, 2, 1);
        term.feed(b"1\r\n2\r\n3\r\n4");
        assert_eq!(screen_text(&term), vec!["3", "4"]);
        assert_eq!(term.state().scrollback.len(), 1);
        assert_eq!(
            term.state().scrollback.get(0).map(Row::text).as_deref(),
            Some("2")
        );
    }

    #[test]
    fn test_resize_matches_requested_size() {
        let mut term = Terminal::new(80, 24, 100);
        term.resize(10, 40);
        assert_eq!(term.size(), (10, 40));
        let screen = term.state().active_screen();
        assert_eq!(screen.rows.len(), 10);
        assert!(screen.rows.iter().all(|r| r.cells.len() == 40));
    }

    #[test]
    fn test_save_restore_and_reverse_index() {
        let mut term = Terminal::new(10, 3, 0);
        term.feed(b"\x1b[2;3H\x1b7\x1b[H\x1b8");
        assert_eq!(cursor(&term), (1, 2));
        term.feed(b"\x1b[Htop\x1bM");
        assert_eq!(screen_text(&term), vec!["", "top", ""]);
    }
}
