//! Key and mouse encoding for the embedded shell
//!
//! Turns crossterm events into the byte sequences an xterm-compatible
//! application expects on its input.

use bitflags::bitflags;
use crossterm::event::{
    KeyCode, KeyEvent, KeyEventKind, KeyModifiers, MouseButton, MouseEvent, MouseEventKind,
};

use crate::core::term::{MouseTracking, TerminalModes};

bitflags! {
    /// Modifier keys, in xterm's parameter bit order
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct Modifiers: u8 {
        const SHIFT = 0b0001;
        const ALT   = 0b0010;
        const CTRL  = 0b0100;
    }
}

impl From<KeyModifiers> for Modifiers {
    fn from(mods: KeyModifiers) -> Self {
        let mut result = Modifiers::empty();
        result.set(Modifiers::SHIFT, mods.contains(KeyModifiers::SHIFT));
        result.set(Modifiers::ALT, mods.contains(KeyModifiers::ALT));
        result.set(Modifiers::CTRL, mods.contains(KeyModifiers::CONTROL));
        result
    }
}

impl Modifiers {
    /// xterm modifier parameter (1 + bits)
    fn param(self) -> u8 {
        1 + self.bits()
    }
}

/// Final byte or tilde code of F1..F12
const FUNCTION_KEYS: [FnKey; 12] = [
    FnKey::Ss3(b'P'),
    FnKey::Ss3(b'Q'),
    FnKey::Ss3(b'R'),
    FnKey::Ss3(b'S'),
    FnKey::Tilde(15),
    FnKey::Tilde(17),
    FnKey::Tilde(18),
    FnKey::Tilde(19),
    FnKey::Tilde(20),
    FnKey::Tilde(21),
    FnKey::Tilde(23),
    FnKey::Tilde(24),
];

#[derive(Clone, Copy)]
enum FnKey {
    Ss3(u8),
    Tilde(u8),
}

pub struct KeyMapper;

impl KeyMapper {
    /// Bytes for a key press, or `None` when the key has no encoding
    pub fn map(event: &KeyEvent, modes: &TerminalModes) -> Option<Vec<u8>> {
        if event.kind == KeyEventKind::Release {
            return None;
        }
        let mods = Modifiers::from(event.modifiers);

        let bytes = match event.code {
            KeyCode::Char(ch) => Self::map_char(ch, mods),
            KeyCode::Enter if modes.linefeed_newline => b"\r\n".to_vec(),
            KeyCode::Enter => with_alt(mods, b"\r"),
            KeyCode::Backspace if mods.contains(Modifiers::CTRL) => vec![0x08],
            KeyCode::Backspace => with_alt(mods, b"\x7f"),
            KeyCode::Tab if mods.contains(Modifiers::SHIFT) => b"\x1b[Z".to_vec(),
            KeyCode::BackTab => b"\x1b[Z".to_vec(),
            KeyCode::Tab => b"\t".to_vec(),
            KeyCode::Esc => vec![0x1b],

            KeyCode::Up => Self::cursor_key(b'A', mods, modes),
            KeyCode::Down => Self::cursor_key(b'B', mods, modes),
            KeyCode::Right => Self::cursor_key(b'C', mods, modes),
            KeyCode::Left => Self::cursor_key(b'D', mods, modes),
            KeyCode::Home => Self::cursor_key(b'H', mods, modes),
            KeyCode::End => Self::cursor_key(b'F', mods, modes),

            KeyCode::Insert => tilde(2, mods),
            KeyCode::Delete => tilde(3, mods),
            KeyCode::PageUp => tilde(5, mods),
            KeyCode::PageDown => tilde(6, mods),

            KeyCode::F(n @ 1..=12) => match FUNCTION_KEYS[usize::from(n - 1)] {
                FnKey::Ss3(key) if mods.is_empty() => vec![0x1b, b'O', key],
                FnKey::Ss3(key) => format!("\x1b[1;{}{}", mods.param(), key as char).into_bytes(),
                FnKey::Tilde(code) => tilde(code, mods),
            },

            _ => return None,
        };
        Some(bytes)
    }

    fn map_char(ch: char, mods: Modifiers) -> Vec<u8> {
        if mods.contains(Modifiers::CTRL) {
            if let Some(code) = control_code(ch) {
                return with_alt(mods, &[code]);
            }
        }
        let mut buf = [0u8; 4];
        with_alt(mods, ch.encode_utf8(&mut buf).as_bytes())
    }

    /// Arrows, Home and End: SS3 form in application cursor mode
    fn cursor_key(key: u8, mods: Modifiers, modes: &TerminalModes) -> Vec<u8> {
        if !mods.is_empty() {
            format!("\x1b[1;{}{}", mods.param(), key as char).into_bytes()
        } else if modes.application_cursor {
            vec![0x1b, b'O', key]
        } else {
            vec![0x1b, b'[', key]
        }
    }

    /// Encode a pane-relative mouse event for the application, honouring the
    /// tracking mode it requested. `None` when nothing should be reported.
    pub fn encode_mouse(event: &MouseEvent, modes: &TerminalModes) -> Option<Vec<u8>> {
        let (mut cb, pressed) = match (event.kind, modes.mouse) {
            (_, MouseTracking::Off) => return None,
            (MouseEventKind::Down(btn), _) => (button_code(btn), true),
            (MouseEventKind::Up(btn), _) => {
                // X10 encoding cannot say which button went up
                let code = if modes.sgr_mouse { button_code(btn) } else { 3 };
                (code, false)
            }
            (MouseEventKind::Drag(btn), MouseTracking::Drag | MouseTracking::Motion) => {
                (button_code(btn) + 32, true)
            }
            (MouseEventKind::Moved, MouseTracking::Motion) => (35, true),
            (MouseEventKind::ScrollUp, _) => (64, true),
            (MouseEventKind::ScrollDown, _) => (65, true),
            _ => return None,
        };

        if event.modifiers.contains(KeyModifiers::SHIFT) {
            cb += 4;
        }
        if event.modifiers.contains(KeyModifiers::ALT) {
            cb += 8;
        }
        if event.modifiers.contains(KeyModifiers::CONTROL) {
            cb += 16;
        }

        let x = u32::from(event.column) + 1;
        let y = u32::from(event.row) + 1;

        if modes.sgr_mouse {
            let suffix = if pressed { 'M' } else { 'm' };
            return Some(format!("\x1b[<{};{};{}{}", cb, x, y, suffix).into_bytes());
        }

        // Legacy encoding stops at column/row 223
        let encode = |v: u32| u8::try_from(v + 32).ok();
        Some(vec![
            0x1b,
            b'[',
            b'M',
            cb.checked_add(32)?,
            encode(x)?,
            encode(y)?,
        ])
    }
}

fn with_alt(mods: Modifiers, bytes: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(bytes.len() + 1);
    if mods.contains(Modifiers::ALT) {
        out.push(0x1b);
    }
    out.extend_from_slice(bytes);
    out
}

fn tilde(code: u8, mods: Modifiers) -> Vec<u8> {
    if mods.is_empty() {
        format!("\x1b[{}~", code).into_bytes()
    } else {
        format!("\x1b[{};{}~", code, mods.param()).into_bytes()
    }
}

/// C0 code for Ctrl+<ch>
fn control_code(ch: char) -> Option<u8> {
    match ch {
        'a'..='z' => Some(ch as u8 - b'a' + 1),
        'A'..='Z' => Some(ch as u8 - b'A' + 1),
        '@' | ' ' | '`' | '2' => Some(0x00),
        '[' | '3' => Some(0x1b),
        '\\' | '4' => Some(0x1c),
        ']' | '5' => Some(0x1d),
        '^' | '~' | '6' => Some(0x1e),
        '_' | '/' | '7' => Some(0x1f),
        '?' | '8' => Some(0x7f),
        _ => None,
    }
}

fn button_code(button: MouseButton) -> u8 {
    match button {
        MouseButton::Left => 0,
        MouseButton::Middle => 1,
        MouseButton::Right => 2,
    }
}
