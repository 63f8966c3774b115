//! Language detection over syntect's bundled grammars

use std::fmt;
use std::sync::OnceLock;

use syntect::parsing::{SyntaxReference, SyntaxSet};

/// Grammars shipped with syntect, loaded on first use
pub fn syntax_set() -> &'static SyntaxSet {
    static SET: OnceLock<SyntaxSet> = OnceLock::new();
    SET.get_or_init(SyntaxSet::load_defaults_newlines)
}

/// Grammar a document is highlighted with
#[derive(Clone, Copy)]
pub struct Language {
    syntax: &'static SyntaxReference,
}

impl Language {
    pub fn plain() -> Self {
        Self {
            syntax: syntax_set().find_syntax_plain_text(),
        }
    }

    /// Pick a grammar from a file name, falling back to plain text.
    /// Whole names such as `.bashrc` are tried before the extension.
    pub fn detect(file_name: &str) -> Self {
        let set = syntax_set();
        let ext = file_name.rsplit_once('.').map(|(_, ext)| ext);
        let syntax = set
            .find_syntax_by_extension(file_name)
            .or_else(|| ext.and_then(|ext| set.find_syntax_by_extension(ext)))
            .or_else(|| {
                ext.map(str::to_ascii_lowercase)
                    .and_then(|ext| set.find_syntax_by_extension(&ext))
            });
        match syntax {
            Some(syntax) => Self { syntax },
            None => Self::plain(),
        }
    }

    /// Name shown in the status line
    pub fn name(&self) -> &'static str {
        &self.syntax.name
    }

    pub(super) fn syntax(&self) -> &'static SyntaxReference {
        self.syntax
    }
}

impl PartialEq for Language {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.syntax, other.syntax)
    }
}

impl Eq for Language {}

impl fmt::Debug for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Language").field(&self.syntax.name).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect() {
        assert_eq!(Language::detect("main.rs").name(), "Rust");
        assert_eq!(Language::detect("setup.py").name(), "Python");
        assert_eq!(Language::detect("Setup.PY").name(), "Python");
        assert_eq!(Language::detect("run.bash"), Language::detect("run.sh"));
        assert_eq!(Language::detect("README"), Language::plain());
        assert_eq!(Language::detect("archive.unknown-ext"), Language::plain());
        assert_ne!(Language::detect("main.go"), Language::plain());
    }
}
