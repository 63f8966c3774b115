//! Keyboard and mouse input.
//!
//! - **router**: focus, global shortcuts, per-pane key tables
//! - **keymapper**: key and mouse events to PTY byte sequences

pub mod keymapper;
pub mod router;

pub use router::{EditorCommand, Focus, InputRouter, Routed, TerminalCommand, TreeCommand};
