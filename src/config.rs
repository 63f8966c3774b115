//! Configuration and color schemes.
//!
//! Settings are read from `<config dir>/edterm/config.toml`. Every field is
//! optional; a missing file yields the defaults, and an unreadable or invalid
//! one yields the defaults plus a warning in the log.
//!
//! ```toml
//! color_scheme = "tokyo-night"   # default, nord, tokyo-night
//!
//! [editor]
//! tab_width = 4
//! insert_spaces = true
//! auto_indent = true
//! show_line_numbers = true
//!
//! [terminal]
//! shell = "/bin/zsh"
//! scrollback = 10000
//! shutdown_grace_ms = 500
//!
//! [ui]
//! show_file_tree = true
//! show_terminal = true
//! file_tree_width = 28
//! terminal_height = 12
//!
//! [file_tree]
//! show_hidden = false
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::core::resolve_shell;
use crate::editor::syntax::StyleTag;

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Color scheme name
    pub color_scheme: String,
    pub editor: EditorConfig,
    pub terminal: TerminalConfig,
    pub ui: UiConfig,
    pub file_tree: FileTreeConfig,
}

/// Editing behaviour, shared by every open document
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    pub tab_width: usize,
    pub insert_spaces: bool,
    pub auto_indent: bool,
    pub show_line_numbers: bool,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            tab_width: 4,
            insert_spaces: true,
            auto_indent: true,
            show_line_numbers: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TerminalConfig {
    /// Shell command line; `$SHELL` when unset
    pub shell: Option<String>,
    /// Rows kept above the screen
    pub scrollback: usize,
    /// Time between SIGTERM and kill on shutdown
    pub shutdown_grace_ms: u64,
}

impl Default for TerminalConfig {
    fn default() -> Self {
        Self {
            shell: None,
            scrollback: 10_000,
            shutdown_grace_ms: 500,
        }
    }
}

impl TerminalConfig {
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    pub show_file_tree: bool,
    pub show_terminal: bool,
    pub file_tree_width: u16,
    pub terminal_height: u16,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            show_file_tree: true,
            show_terminal: true,
            file_tree_width: 28,
            terminal_height: 12,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FileTreeConfig {
    pub show_hidden: bool,
}

impl Config {
    /// Load from the default location
    pub fn load() -> Self {
        match Self::config_path() {
            Some(path) => Self::load_from(&path),
            None => Self::default(),
        }
    }

    /// Load from `path`, falling back to defaults
    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                warn!("Cannot read {}: {}; using defaults", path.display(), e);
                return Self::default();
            }
        };
        match toml::from_str(&content) {
            Ok(config) => {
                info!("Loaded config from {}", path.display());
                config
            }
            Err(e) => {
                warn!("Invalid config {}: {}; using defaults", path.display(), e);
                Self::default()
            }
        }
    }

    /// `<config dir>/edterm/config.toml`
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("edterm").join("config.toml"))
    }

    /// Shell to launch in the terminal pane
    pub fn shell(&self) -> String {
        resolve_shell(self.terminal.shell.as_deref())
    }

    pub fn color_scheme(&self) -> ColorScheme {
        ColorScheme::by_name(&self.color_scheme)
    }
}

/// Color definition (RGB)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub fn to_crossterm(self) -> crossterm::style::Color {
        crossterm::style::Color::Rgb {
            r: self.r,
            g: self.g,
            b: self.b,
        }
    }
}

/// UI and syntax colors
#[derive(Debug, Clone)]
pub struct ColorScheme {
    pub name: &'static str,

    pub editor_bg: Color,
    pub editor_fg: Color,
    pub gutter_fg: Color,
    pub current_line_fg: Color,
    pub selection_bg: Color,
    pub search_match_bg: Color,

    pub tree_fg: Color,
    pub tree_dir_fg: Color,
    pub tree_selected_bg: Color,

    pub border: Color,
    pub border_active: Color,

    pub status_bar_bg: Color,
    pub status_bar_fg: Color,
    pub status_dirty_fg: Color,

    pub keyword: Color,
    pub type_name: Color,
    pub constant: Color,
    pub function: Color,
    pub string: Color,
    pub comment: Color,
    pub number: Color,
    pub operator: Color,
}

impl Default for ColorScheme {
    fn default() -> Self {
        Self::default_scheme()
    }
}

impl ColorScheme {
    pub fn default_scheme() -> Self {
        Self {
            name: "default",

            editor_bg: Color::new(30, 30, 30),
            editor_fg: Color::new(212, 212, 212),
            gutter_fg: Color::new(110, 110, 110),
            current_line_fg: Color::new(200, 200, 200),
            selection_bg: Color::new(38, 79, 120),
            search_match_bg: Color::new(120, 90, 20),

            tree_fg: Color::new(190, 190, 190),
            tree_dir_fg: Color::new(100, 150, 255),
            tree_selected_bg: Color::new(60, 60, 60),

            border: Color::new(80, 80, 80),
            border_active: Color::new(100, 150, 255),

            status_bar_bg: Color::new(0, 100, 0),
            status_bar_fg: Color::new(255, 255, 255),
            status_dirty_fg: Color::new(255, 220, 0),

            keyword: Color::new(86, 156, 214),
            type_name: Color::new(78, 201, 176),
            constant: Color::new(79, 193, 255),
            function: Color::new(220, 220, 170),
            string: Color::new(206, 145, 120),
            comment: Color::new(106, 153, 85),
            number: Color::new(181, 206, 168),
            operator: Color::new(212, 212, 212),
        }
    }

    pub fn nord() -> Self {
        Self {
            name: "nord",

            editor_bg: Color::new(46, 52, 64),
            editor_fg: Color::new(216, 222, 233),
            gutter_fg: Color::new(76, 86, 106),
            current_line_fg: Color::new(216, 222, 233),
            selection_bg: Color::new(67, 76, 94),
            search_match_bg: Color::new(94, 129, 172),

            tree_fg: Color::new(216, 222, 233),
            tree_dir_fg: Color::new(136, 192, 208),
            tree_selected_bg: Color::new(59, 66, 82),

            border: Color::new(59, 66, 82),
            border_active: Color::new(136, 192, 208),

            status_bar_bg: Color::new(59, 66, 82),
            status_bar_fg: Color::new(216, 222, 233),
            status_dirty_fg: Color::new(235, 203, 139),

            keyword: Color::new(129, 161, 193),
            type_name: Color::new(143, 188, 187),
            constant: Color::new(180, 142, 173),
            function: Color::new(136, 192, 208),
            string: Color::new(163, 190, 140),
            comment: Color::new(97, 110, 136),
            number: Color::new(180, 142, 173),
            operator: Color::new(129, 161, 193),
        }
    }

    pub fn tokyo_night() -> Self {
        Self {
            name: "tokyo-night",

            editor_bg: Color::new(26, 27, 38),
            editor_fg: Color::new(192, 202, 245),
            gutter_fg: Color::new(59, 66, 97),
            current_line_fg: Color::new(115, 122, 162),
            selection_bg: Color::new(51, 59, 91),
            search_match_bg: Color::new(61, 89, 161),

            tree_fg: Color::new(169, 177, 214),
            tree_dir_fg: Color::new(122, 162, 247),
            tree_selected_bg: Color::new(36, 40, 59),

            border: Color::new(41, 46, 66),
            border_active: Color::new(122, 162, 247),

            status_bar_bg: Color::new(36, 40, 59),
            status_bar_fg: Color::new(169, 177, 214),
            status_dirty_fg: Color::new(224, 175, 104),

            keyword: Color::new(187, 154, 247),
            type_name: Color::new(42, 195, 222),
            constant: Color::new(255, 158, 100),
            function: Color::new(122, 162, 247),
            string: Color::new(158, 206, 106),
            comment: Color::new(86, 95, 137),
            number: Color::new(255, 158, 100),
            operator: Color::new(137, 221, 255),
        }
    }

    /// Scheme by name; unknown names give the default
    pub fn by_name(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "nord" => Self::nord(),
            "tokyo-night" | "tokyo_night" | "tokyonight" => Self::tokyo_night(),
            _ => Self::default_scheme(),
        }
    }

    pub fn style(&self, tag: StyleTag) -> Color {
        match tag {
            StyleTag::Keyword => self.keyword,
            StyleTag::Type => self.type_name,
            StyleTag::Constant => self.constant,
            StyleTag::Function => self.function,
            StyleTag::String => self.string,
            StyleTag::Comment => self.comment,
            StyleTag::Number => self.number,
            StyleTag::Operator => self.operator,
        }
    }
}
