//! Embedded terminal components.
//!
//! - **pty**: shell process on a native pseudo-terminal
//! - **term**: VT parser, cell grid and scrollback
//! - **session**: PTY plus emulator, fed by a reader thread
//!
//! # Architecture
//!
//! ```text
//! TerminalSession
//! ├── PtySession (shell I/O, resize, exit status)
//! ├── reader thread ──feed──▶ Terminal
//! └── Terminal
//!     ├── VtParser (escape sequences, UTF-8)
//!     └── TerminalState
//!         ├── Screen x2 (primary / alternate)
//!         ├── CursorState
//!         └── Scrollback
//! ```

pub mod pty;
pub mod session;
pub mod term;

pub use pty::{resolve_shell, SessionState};
pub use session::{SessionEvent, TerminalSession};
