//! Text editing core: buffer, cursor, undo history, highlighting and the
//! document that ties them together

pub mod buffer;
pub mod document;
pub mod history;
pub mod search;
pub mod selection;
pub mod syntax;

pub use document::{Document, EditMode};
pub use selection::Motion;

/// Identifies an open document across threads
pub type DocumentId = u64;
