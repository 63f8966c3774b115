//! Screen output.
//!
//! - **layout**: splits the screen into panes
//! - **canvas**: off-screen cell buffer the panes draw into
//! - **renderer**: pane drawing and diffed presentation to the terminal

pub mod canvas;
pub mod layout;
pub mod renderer;

pub use layout::{Layout, LayoutRequest};
pub use renderer::{draw, Frame, Prompt, Renderer, TerminalView};
