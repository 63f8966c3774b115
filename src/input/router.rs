//! Focus tracking and event dispatch
//!
//! Global shortcuts are checked first; everything else goes to the key table
//! of the focused pane. The router owns pane visibility so focus can never
//! rest on a hidden pane.

use crossterm::event::{
    KeyCode, KeyEvent, KeyEventKind, KeyModifiers, MouseButton, MouseEvent, MouseEventKind,
};
use tracing::debug;

use super::keymapper::KeyMapper;
use crate::core::term::{MouseTracking, TerminalModes};
use crate::editor::Motion;
use crate::ui::layout::Layout;

/// Lines moved per wheel notch
const WHEEL_LINES: usize = 3;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Focus {
    FileTree,
    Editor,
    Terminal,
}

impl Focus {
    /// Cycling order
    const ORDER: [Focus; 3] = [Focus::FileTree, Focus::Editor, Focus::Terminal];

    pub fn name(self) -> &'static str {
        match self {
            Focus::FileTree => "Files",
            Focus::Editor => "Editor",
            Focus::Terminal => "Terminal",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EditorCommand {
    Insert(char),
    Newline,
    Tab,
    Backspace,
    Delete,
    Move { motion: Motion, extend: bool },
    Page { down: bool, extend: bool },
    ToggleMode,
    Undo,
    Redo,
    Cut,
    Copy,
    Paste,
    SelectAll,
    DeleteLine,
    Save,
    SaveAs,
    NewDocument,
    CloseDocument,
    NextDocument,
    PrevDocument,
    Find,
    FindNext,
    FindPrev,
    Replace,
    /// Pane-relative click in the text area
    Click { col: u16, row: u16, extend: bool },
    Scroll(isize),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TreeCommand {
    Up,
    Down,
    PageUp,
    PageDown,
    First,
    Last,
    Activate,
    Collapse,
    Expand,
    ToggleHidden,
    Refresh,
    Click(u16),
    Scroll(isize),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TerminalCommand {
    /// Bytes for the shell
    Input(Vec<u8>),
    Copy,
    Paste,
    ScrollUp(usize),
    ScrollDown(usize),
    /// Page-sized scroll; the caller knows the page height
    PageUp,
    PageDown,
    ScrollTop,
    ScrollBottom,
    SelectStart { col: u16, row: u16 },
    SelectUpdate { col: u16, row: u16 },
    SelectEnd,
}

/// Outcome of routing one event
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Routed {
    Quit,
    /// Consumed by the router itself (focus or visibility change)
    Handled,
    Ignored,
    Editor(EditorCommand),
    Tree(TreeCommand),
    Terminal(TerminalCommand),
}

pub struct InputRouter {
    focus: Focus,
    show_tree: bool,
    show_terminal: bool,
}

impl InputRouter {
    pub fn new(show_tree: bool, show_terminal: bool) -> Self {
        Self {
            focus: Focus::Editor,
            show_tree,
            show_terminal,
        }
    }

    pub fn focus(&self) -> Focus {
        self.focus
    }

    pub fn is_visible(&self, pane: Focus) -> bool {
        match pane {
            Focus::FileTree => self.show_tree,
            Focus::Editor => true,
            Focus::Terminal => self.show_terminal,
        }
    }

    /// Focus `pane`, revealing it if hidden
    pub fn set_focus(&mut self, pane: Focus) {
        match pane {
            Focus::FileTree => self.show_tree = true,
            Focus::Terminal => self.show_terminal = true,
            Focus::Editor => {}
        }
        if self.focus != pane {
            debug!("Focus {:?} -> {:?}", self.focus, pane);
        }
        self.focus = pane;
    }

    pub fn toggle_tree(&mut self) {
        self.show_tree = !self.show_tree;
        self.fix_focus();
    }

    pub fn toggle_terminal(&mut self) {
        self.show_terminal = !self.show_terminal;
        self.fix_focus();
    }

    /// Hiding the focused pane hands focus to the editor
    fn fix_focus(&mut self) {
        if !self.is_visible(self.focus) {
            self.focus = Focus::Editor;
        }
    }

    /// Move focus to the next visible pane
    pub fn cycle(&mut self, forward: bool) {
        let len = Focus::ORDER.len();
        let current = Focus::ORDER
            .iter()
            .position(|&f| f == self.focus)
            .unwrap_or(1);
        for step in 1..len {
            let idx = if forward {
                (current + step) % len
            } else {
                (current + len - step) % len
            };
            let pane = Focus::ORDER[idx];
            if self.is_visible(pane) {
                self.focus = pane;
                return;
            }
        }
    }

    pub fn route_key(&mut self, key: &KeyEvent, modes: &TerminalModes) -> Routed {
        if key.kind == KeyEventKind::Release {
            return Routed::Ignored;
        }
        if let Some(routed) = self.route_global(key) {
            return routed;
        }
        match self.focus {
            // Plain Shift+Tab belongs to the shell when it has focus
            Focus::Editor | Focus::FileTree if key.code == KeyCode::BackTab => {
                self.cycle(false);
                Routed::Handled
            }
            Focus::Editor => route_editor_key(key),
            Focus::FileTree => route_tree_key(key),
            Focus::Terminal => route_terminal_key(key, modes),
        }
    }

    fn route_global(&mut self, key: &KeyEvent) -> Option<Routed> {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        let routed = match key.code {
            KeyCode::Char('q') | KeyCode::Char('Q') if ctrl => Routed::Quit,
            KeyCode::F(2) => {
                self.set_focus(Focus::Editor);
                Routed::Handled
            }
            KeyCode::F(3) => {
                self.set_focus(Focus::FileTree);
                Routed::Handled
            }
            KeyCode::F(4) => {
                self.set_focus(Focus::Terminal);
                Routed::Handled
            }
            KeyCode::Tab if ctrl => {
                self.cycle(!key.modifiers.contains(KeyModifiers::SHIFT));
                Routed::Handled
            }
            // Terminals report Ctrl+Shift+Tab as BackTab with Ctrl held
            KeyCode::BackTab if ctrl => {
                self.cycle(false);
                Routed::Handled
            }
            KeyCode::Char('b') if ctrl => {
                self.toggle_tree();
                Routed::Handled
            }
            KeyCode::Char('t') if ctrl => {
                self.toggle_terminal();
                Routed::Handled
            }
            _ => return None,
        };
        Some(routed)
    }

    /// Mouse events in screen coordinates. A press outside the focused pane
    /// moves focus first; wheel events go to the pane under the pointer.
    pub fn route_mouse(
        &mut self,
        event: &MouseEvent,
        layout: &Layout,
        modes: &TerminalModes,
    ) -> Routed {
        let hovered = layout.pane_at(event.column, event.row);

        let target = match event.kind {
            MouseEventKind::Down(_) => {
                let Some(pane) = hovered else {
                    return Routed::Ignored;
                };
                if pane != self.focus {
                    self.set_focus(pane);
                }
                pane
            }
            MouseEventKind::ScrollUp | MouseEventKind::ScrollDown => match hovered {
                Some(pane) => pane,
                None => return Routed::Ignored,
            },
            // Drags and releases stay with the pane that saw the press
            _ => self.focus,
        };

        let Some(rect) = layout.content(target) else {
            return Routed::Handled;
        };
        // Clamp so a drag past the edge still selects up to it
        let col = event
            .column
            .clamp(rect.x, rect.x + rect.width.saturating_sub(1))
            - rect.x;
        let row = event
            .row
            .clamp(rect.y, rect.y + rect.height.saturating_sub(1))
            - rect.y;
        let inside = rect.contains(event.column, event.row);

        match target {
            Focus::Editor => route_editor_mouse(event, col, row, inside),
            Focus::FileTree => route_tree_mouse(event, row, inside),
            Focus::Terminal => route_terminal_mouse(event, col, row, inside, modes),
        }
    }
}

fn route_editor_key(key: &KeyEvent) -> Routed {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    let shift = key.modifiers.contains(KeyModifiers::SHIFT);
    let alt = key.modifiers.contains(KeyModifiers::ALT);
    let mv = |motion| {
        Routed::Editor(EditorCommand::Move {
            motion,
            extend: shift,
        })
    };

    let cmd = match key.code {
        KeyCode::Char(c) if ctrl => match c.to_ascii_lowercase() {
            's' if shift => EditorCommand::SaveAs,
            's' => EditorCommand::Save,
            'n' => EditorCommand::NewDocument,
            'w' => EditorCommand::CloseDocument,
            'z' if shift => EditorCommand::Redo,
            'z' => EditorCommand::Undo,
            'y' => EditorCommand::Redo,
            'x' => EditorCommand::Cut,
            'c' => EditorCommand::Copy,
            'v' => EditorCommand::Paste,
            'a' => EditorCommand::SelectAll,
            'k' => EditorCommand::DeleteLine,
            'f' => EditorCommand::Find,
            'g' if shift => EditorCommand::FindPrev,
            'g' => EditorCommand::FindNext,
            'h' => EditorCommand::Replace,
            _ => return Routed::Ignored,
        },
        KeyCode::Char(_) if alt => return Routed::Ignored,
        KeyCode::Char(c) => EditorCommand::Insert(c),

        KeyCode::Left if ctrl => return mv(Motion::WordLeft),
        KeyCode::Right if ctrl => return mv(Motion::WordRight),
        KeyCode::Home if ctrl => return mv(Motion::DocumentStart),
        KeyCode::End if ctrl => return mv(Motion::DocumentEnd),
        KeyCode::Left => return mv(Motion::CharLeft),
        KeyCode::Right => return mv(Motion::CharRight),
        KeyCode::Up => return mv(Motion::LineUp),
        KeyCode::Down => return mv(Motion::LineDown),
        KeyCode::Home => return mv(Motion::LineStart),
        KeyCode::End => return mv(Motion::LineEnd),

        KeyCode::PageDown if ctrl => EditorCommand::NextDocument,
        KeyCode::PageUp if ctrl => EditorCommand::PrevDocument,
        KeyCode::PageUp => EditorCommand::Page {
            down: false,
            extend: shift,
        },
        KeyCode::PageDown => EditorCommand::Page {
            down: true,
            extend: shift,
        },

        KeyCode::Enter => EditorCommand::Newline,
        KeyCode::Tab => EditorCommand::Tab,
        KeyCode::Backspace => EditorCommand::Backspace,
        KeyCode::Delete => EditorCommand::Delete,
        KeyCode::Insert => EditorCommand::ToggleMode,
        _ => return Routed::Ignored,
    };
    Routed::Editor(cmd)
}

fn route_tree_key(key: &KeyEvent) -> Routed {
    let cmd = match key.code {
        KeyCode::Up | KeyCode::Char('k') => TreeCommand::Up,
        KeyCode::Down | KeyCode::Char('j') => TreeCommand::Down,
        KeyCode::PageUp => TreeCommand::PageUp,
        KeyCode::PageDown => TreeCommand::PageDown,
        KeyCode::Home | KeyCode::Char('g') => TreeCommand::First,
        KeyCode::End | KeyCode::Char('G') => TreeCommand::Last,
        KeyCode::Enter | KeyCode::Char(' ') => TreeCommand::Activate,
        KeyCode::Right | KeyCode::Char('l') => TreeCommand::Expand,
        KeyCode::Left | KeyCode::Char('h') => TreeCommand::Collapse,
        KeyCode::Char('.') => TreeCommand::ToggleHidden,
        KeyCode::Char('r') | KeyCode::F(5) => TreeCommand::Refresh,
        _ => return Routed::Ignored,
    };
    Routed::Tree(cmd)
}

fn route_terminal_key(key: &KeyEvent, modes: &TerminalModes) -> Routed {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    let shift = key.modifiers.contains(KeyModifiers::SHIFT);

    // Local interception before anything reaches the shell
    let local = match key.code {
        KeyCode::Char('c') | KeyCode::Char('C') if ctrl && shift => Some(TerminalCommand::Copy),
        KeyCode::Char('v') | KeyCode::Char('V') if ctrl && shift => Some(TerminalCommand::Paste),
        KeyCode::PageUp if shift => Some(TerminalCommand::PageUp),
        KeyCode::PageDown if shift => Some(TerminalCommand::PageDown),
        KeyCode::Home if shift => Some(TerminalCommand::ScrollTop),
        KeyCode::End if shift => Some(TerminalCommand::ScrollBottom),
        _ => None,
    };
    if let Some(cmd) = local {
        return Routed::Terminal(cmd);
    }

    match KeyMapper::map(key, modes) {
        Some(bytes) if !bytes.is_empty() => Routed::Terminal(TerminalCommand::Input(bytes)),
        _ => Routed::Ignored,
    }
}

fn wheel(kind: MouseEventKind) -> Option<isize> {
    match kind {
        MouseEventKind::ScrollUp => Some(-(WHEEL_LINES as isize)),
        MouseEventKind::ScrollDown => Some(WHEEL_LINES as isize),
        _ => None,
    }
}

fn route_editor_mouse(event: &MouseEvent, col: u16, row: u16, inside: bool) -> Routed {
    if let Some(delta) = wheel(event.kind) {
        return Routed::Editor(EditorCommand::Scroll(delta));
    }
    match event.kind {
        MouseEventKind::Down(MouseButton::Left) if inside => Routed::Editor(EditorCommand::Click {
            col,
            row,
            extend: event.modifiers.contains(KeyModifiers::SHIFT),
        }),
        MouseEventKind::Drag(MouseButton::Left) => Routed::Editor(EditorCommand::Click {
            col,
            row,
            extend: true,
        }),
        // Header clicks only move focus
        MouseEventKind::Down(_) => Routed::Handled,
        _ => Routed::Ignored,
    }
}

fn route_tree_mouse(event: &MouseEvent, row: u16, inside: bool) -> Routed {
    if let Some(delta) = wheel(event.kind) {
        return Routed::Tree(TreeCommand::Scroll(delta));
    }
    match event.kind {
        MouseEventKind::Down(MouseButton::Left) if inside => Routed::Tree(TreeCommand::Click(row)),
        MouseEventKind::Down(_) => Routed::Handled,
        _ => Routed::Ignored,
    }
}

fn route_terminal_mouse(
    event: &MouseEvent,
    col: u16,
    row: u16,
    inside: bool,
    modes: &TerminalModes,
) -> Routed {
    // Shift bypasses application mouse reporting, as in xterm
    let reporting = modes.mouse != MouseTracking::Off
        && !event.modifiers.contains(KeyModifiers::SHIFT);
    if reporting {
        if !inside && matches!(event.kind, MouseEventKind::Down(_)) {
            return Routed::Handled;
        }
        let relative = MouseEvent {
            column: col,
            row,
            ..*event
        };
        return match KeyMapper::encode_mouse(&relative, modes) {
            Some(bytes) => Routed::Terminal(TerminalCommand::Input(bytes)),
            None if matches!(event.kind, MouseEventKind::Down(_)) => Routed::Handled,
            None => Routed::Ignored,
        };
    }

    let cmd = match event.kind {
        MouseEventKind::ScrollUp => TerminalCommand::ScrollUp(WHEEL_LINES),
        MouseEventKind::ScrollDown => TerminalCommand::ScrollDown(WHEEL_LINES),
        MouseEventKind::Down(MouseButton::Left) if inside => {
            TerminalCommand::SelectStart { col, row }
        }
        MouseEventKind::Drag(MouseButton::Left) => TerminalCommand::SelectUpdate { col, row },
        MouseEventKind::Up(MouseButton::Left) => TerminalCommand::SelectEnd,
        MouseEventKind::Down(_) => return Routed::Handled,
        _ => return Routed::Ignored,
    };
    Routed::Terminal(cmd)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ui::layout::LayoutRequest;

    fn key(code: KeyCode, mods: KeyModifiers) -> KeyEvent {
        KeyEvent::new(code, mods)
    }

    fn layout() -> Layout {
        Layout::compute(
            120,
            40,
            LayoutRequest {
                show_tree: true,
                show_terminal: true,
                tree_width: 28,
                terminal_height: 12,
            },
        )
    }

    fn click(column: u16, row: u16) -> MouseEvent {
        MouseEvent {
            kind: MouseEventKind::Down(MouseButton::Left),
            column,
            row,
            modifiers: KeyModifiers::NONE,
        }
    }

    #[test]
    fn test_global_shortcuts_come_first() {
        let mut router = InputRouter::new(true, true);
        let modes = TerminalModes::default();
        router.set_focus(Focus::Terminal);

        let routed = router.route_key(&key(KeyCode::F(2), KeyModifiers::NONE), &modes);
        assert_eq!(routed, Routed::Handled);
        assert_eq!(router.focus(), Focus::Editor);

        let routed = router.route_key(&key(KeyCode::Char('q'), KeyModifiers::CONTROL), &modes);
        assert_eq!(routed, Routed::Quit);
    }

    #[test]
    fn test_focus_cycle_skips_hidden_panes() {
        let mut router = InputRouter::new(false, true);
        assert_eq!(router.focus(), Focus::Editor);
        router.cycle(true);
        assert_eq!(router.focus(), Focus::Terminal);
        router.cycle(true);
        assert_eq!(router.focus(), Focus::Editor);
        router.cycle(false);
        assert_eq!(router.focus(), Focus::Terminal);

        router.toggle_terminal();
        assert_eq!(router.focus(), Focus::Editor);
        router.cycle(true);
        assert_eq!(router.focus(), Focus::Editor);
    }

    #[test]
    fn test_shift_tab_cycles_panes_but_reaches_the_shell() {
        let mut router = InputRouter::new(true, true);
        let modes = TerminalModes::default();
        let back_tab = key(KeyCode::BackTab, KeyModifiers::SHIFT);

        assert_eq!(router.route_key(&back_tab, &modes), Routed::Handled);
        assert_eq!(router.focus(), Focus::FileTree);
        assert_eq!(router.route_key(&back_tab, &modes), Routed::Handled);
        assert_eq!(router.focus(), Focus::Terminal);

        assert_eq!(
            router.route_key(&back_tab, &modes),
            Routed::Terminal(TerminalCommand::Input(b"\x1b[Z".to_vec()))
        );
        assert_eq!(router.focus(), Focus::Terminal);

        let ctrl_back_tab = key(KeyCode::BackTab, KeyModifiers::CONTROL | KeyModifiers::SHIFT);
        assert_eq!(router.route_key(&ctrl_back_tab, &modes), Routed::Handled);
        assert_eq!(router.focus(), Focus::Editor);
    }

    #[test]
    fn test_focusing_hidden_pane_reveals_it() {
        let mut router = InputRouter::new(false, false);
        let modes = TerminalModes::default();
        router.route_key(&key(KeyCode::F(3), KeyModifiers::NONE), &modes);
        assert_eq!(router.focus(), Focus::FileTree);
        assert!(router.is_visible(Focus::FileTree));
    }

    #[test]
    fn test_editor_key_table() {
        let mut router = InputRouter::new(true, true);
        let modes = TerminalModes::default();
        let mut route = |code, mods| router.route_key(&key(code, mods), &modes);

        assert_eq!(
            route(KeyCode::Char('x'), KeyModifiers::NONE),
            Routed::Editor(EditorCommand::Insert('x'))
        );
        assert_eq!(
            route(KeyCode::Char('Z'), KeyModifiers::SHIFT),
            Routed::Editor(EditorCommand::Insert('Z'))
        );
        assert_eq!(
            route(KeyCode::Char('z'), KeyModifiers::CONTROL),
            Routed::Editor(EditorCommand::Undo)
        );
        assert_eq!(
            route(KeyCode::Right, KeyModifiers::CONTROL | KeyModifiers::SHIFT),
            Routed::Editor(EditorCommand::Move {
                motion: Motion::WordRight,
                extend: true
            })
        );
        assert_eq!(
            route(KeyCode::Insert, KeyModifiers::NONE),
            Routed::Editor(EditorCommand::ToggleMode)
        );
    }

    #[test]
    fn test_terminal_keys_become_bytes() {
        let mut router = InputRouter::new(true, true);
        router.set_focus(Focus::Terminal);
        let mut modes = TerminalModes::default();
        modes.application_cursor = true;

        assert_eq!(
            router.route_key(&key(KeyCode::Up, KeyModifiers::NONE), &modes),
            Routed::Terminal(TerminalCommand::Input(b"\x1bOA".to_vec()))
        );
        assert_eq!(
            router.route_key(&key(KeyCode::Char('c'), KeyModifiers::CONTROL), &modes),
            Routed::Terminal(TerminalCommand::Input(vec![0x03]))
        );
        assert_eq!(
            router.route_key(
                &key(KeyCode::Char('C'), KeyModifiers::CONTROL | KeyModifiers::SHIFT),
                &modes
            ),
            Routed::Terminal(TerminalCommand::Copy)
        );
        assert_eq!(
            router.route_key(&key(KeyCode::PageUp, KeyModifiers::SHIFT), &modes),
            Routed::Terminal(TerminalCommand::PageUp)
        );
    }

    #[test]
    fn test_click_moves_focus_then_dispatches() {
        let mut router = InputRouter::new(true, true);
        let modes = TerminalModes::default();
        let layout = layout();

        let routed = router.route_mouse(&click(3, 4), &layout, &modes);
        assert_eq!(router.focus(), Focus::FileTree);
        assert_eq!(routed, Routed::Tree(TreeCommand::Click(4)));

        let routed = router.route_mouse(&click(40, 6), &layout, &modes);
        assert_eq!(router.focus(), Focus::Editor);
        assert_eq!(
            routed,
            Routed::Editor(EditorCommand::Click {
                col: 11,
                row: 5,
                extend: false
            })
        );

        let routed = router.route_mouse(&click(10, 30), &layout, &modes);
        assert_eq!(router.focus(), Focus::Terminal);
        assert_eq!(
            routed,
            Routed::Terminal(TerminalCommand::SelectStart { col: 10, row: 3 })
        );
    }

    #[test]
    fn test_terminal_mouse_reporting() {
        let mut router = InputRouter::new(true, true);
        let layout = layout();
        let modes = TerminalModes {
            mouse: MouseTracking::Click,
            sgr_mouse: true,
            ..TerminalModes::default()
        };
        let routed = router.route_mouse(&click(0, 27), &layout, &modes);
        assert_eq!(
            routed,
            Routed::Terminal(TerminalCommand::Input(b"\x1b[<0;1;1M".to_vec()))
        );
    }

    #[test]
    fn test_wheel_goes_to_hovered_pane_without_focus() {
        let mut router = InputRouter::new(true, true);
        let layout = layout();
        let wheel = MouseEvent {
            kind: MouseEventKind::ScrollDown,
            column: 5,
            row: 30,
            modifiers: KeyModifiers::NONE,
        };
        let routed = router.route_mouse(&wheel, &layout, &TerminalModes::default());
        assert_eq!(routed, Routed::Terminal(TerminalCommand::ScrollDown(3)));
        assert_eq!(router.focus(), Focus::Editor);
    }
}
