//! Directory browser
//!
//! Keeps the set of expanded directories and a flattened list of visible
//! entries, rebuilt from disk whenever the shape changes.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TreeEntry {
    pub path: PathBuf,
    pub name: String,
    /// 0 for direct children of the root
    pub depth: usize,
    pub is_dir: bool,
    pub expanded: bool,
}

/// What the caller should do after activating an entry
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TreeAction {
    None,
    Open(PathBuf),
}

pub struct FileTree {
    root: PathBuf,
    entries: Vec<TreeEntry>,
    expanded: HashSet<PathBuf>,
    selected: usize,
    scroll: usize,
    show_hidden: bool,
}

impl FileTree {
    pub fn new(root: impl Into<PathBuf>, show_hidden: bool) -> Self {
        let root = root.into();
        let root = fs::canonicalize(&root).unwrap_or(root);
        let mut tree = Self {
            root,
            entries: Vec::new(),
            expanded: HashSet::new(),
            selected: 0,
            scroll: 0,
            show_hidden,
        };
        tree.refresh();
        tree
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Display name of the root directory
    pub fn root_name(&self) -> String {
        self.root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.root.display().to_string())
    }

    pub fn entries(&self) -> &[TreeEntry] {
        &self.entries
    }

    pub fn selected(&self) -> usize {
        self.selected
    }

    pub fn selected_entry(&self) -> Option<&TreeEntry> {
        self.entries.get(self.selected)
    }

    pub fn scroll_offset(&self) -> usize {
        self.scroll
    }

    pub fn show_hidden(&self) -> bool {
        self.show_hidden
    }

    /// Re-read the directory structure, keeping the selection on the same
    /// path when it still exists
    pub fn refresh(&mut self) {
        let keep = self.selected_entry().map(|e| e.path.clone());

        // Forget directories that disappeared
        self.expanded.retain(|p| p.is_dir());

        let mut entries = Vec::new();
        self.collect(&self.root, 0, &mut entries);
        self.entries = entries;

        if let Some(path) = keep {
            if let Some(idx) = self.entries.iter().position(|e| e.path == path) {
                self.selected = idx;
            }
        }
        self.selected = self.selected.min(self.entries.len().saturating_sub(1));
        debug!("File tree: {} entries", self.entries.len());
    }

    fn collect(&self, dir: &Path, depth: usize, out: &mut Vec<TreeEntry>) {
        let read = match fs::read_dir(dir) {
            Ok(read) => read,
            Err(e) => {
                warn!("Cannot list {}: {}", dir.display(), e);
                return;
            }
        };

        let mut children: Vec<TreeEntry> = read
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                let name = entry.file_name().to_string_lossy().into_owned();
                if !self.show_hidden && name.starts_with('.') {
                    return None;
                }
                let path = entry.path();
                // Follows symlinks so linked directories can be expanded
                let is_dir = path.is_dir();
                Some(TreeEntry {
                    expanded: is_dir && self.expanded.contains(&path),
                    path,
                    name,
                    depth,
                    is_dir,
                })
            })
            .collect();

        children.sort_by(|a, b| match (a.is_dir, b.is_dir) {
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            _ => a
                .name
                .to_lowercase()
                .cmp(&b.name.to_lowercase())
                .then_with(|| a.name.cmp(&b.name)),
        });

        for child in children {
            let recurse = child.expanded.then(|| child.path.clone());
            out.push(child);
            if let Some(path) = recurse {
                self.collect(&path, depth + 1, out);
            }
        }
    }

    pub fn move_up(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }

    pub fn move_down(&mut self) {
        if self.selected + 1 < self.entries.len() {
            self.selected += 1;
        }
    }

    pub fn page_up(&mut self, page: usize) {
        self.selected = self.selected.saturating_sub(page.max(1));
    }

    pub fn page_down(&mut self, page: usize) {
        let last = self.entries.len().saturating_sub(1);
        self.selected = (self.selected + page.max(1)).min(last);
    }

    pub fn select_first(&mut self) {
        self.selected = 0;
    }

    pub fn select_last(&mut self) {
        self.selected = self.entries.len().saturating_sub(1);
    }

    /// Select the entry shown on `row` of the pane. Returns false when the
    /// row is past the end of the list.
    pub fn select_row(&mut self, row: usize) -> bool {
        let idx = self.scroll + row;
        if idx < self.entries.len() {
            self.selected = idx;
            true
        } else {
            false
        }
    }

    /// Enter: toggle a directory, open a file
    pub fn activate(&mut self) -> TreeAction {
        let Some(entry) = self.selected_entry() else {
            return TreeAction::None;
        };
        if entry.is_dir {
            let path = entry.path.clone();
            self.set_expanded(path, !entry.expanded);
            TreeAction::None
        } else {
            TreeAction::Open(entry.path.clone())
        }
    }

    /// Right: expand a collapsed directory, or step into an expanded one
    pub fn expand(&mut self) {
        let Some(entry) = self.selected_entry() else {
            return;
        };
        if !entry.is_dir {
            return;
        }
        if entry.expanded {
            let depth = entry.depth;
            if self
                .entries
                .get(self.selected + 1)
                .is_some_and(|next| next.depth > depth)
            {
                self.selected += 1;
            }
        } else {
            let path = entry.path.clone();
            self.set_expanded(path, true);
        }
    }

    /// Left: collapse an expanded directory, or jump to the parent
    pub fn collapse(&mut self) {
        let Some(entry) = self.selected_entry() else {
            return;
        };
        if entry.is_dir && entry.expanded {
            let path = entry.path.clone();
            self.set_expanded(path, false);
            return;
        }
        let depth = entry.depth;
        if depth == 0 {
            return;
        }
        if let Some(parent) = self.entries[..self.selected]
            .iter()
            .rposition(|e| e.depth < depth)
        {
            self.selected = parent;
        }
    }

    pub fn toggle_hidden(&mut self) {
        self.show_hidden = !self.show_hidden;
        self.refresh();
    }

    fn set_expanded(&mut self, path: PathBuf, expanded: bool) {
        if expanded {
            self.expanded.insert(path);
        } else {
            // Nested expansions are remembered for the next time
            self.expanded.remove(&path);
        }
        self.refresh();
    }

    /// Keep the selection inside a pane of `height` rows
    pub fn scroll_to_selected(&mut self, height: usize) {
        let height = height.max(1);
        if self.selected < self.scroll {
            self.scroll = self.selected;
        } else if self.selected >= self.scroll + height {
            self.scroll = self.selected + 1 - height;
        }
        let max_scroll = self.entries.len().saturating_sub(height);
        self.scroll = self.scroll.min(max_scroll);
    }

    /// Wheel scrolling; drags the selection along when it leaves the view
    pub fn scroll_by(&mut self, delta: isize, height: usize) {
        let max_scroll = self.entries.len().saturating_sub(height.max(1));
        self.scroll = self.scroll.saturating_add_signed(delta).min(max_scroll);
        let last_visible = self.scroll + height.max(1) - 1;
        self.selected = self.selected.clamp(self.scroll, last_visible);
        self.selected = self.selected.min(self.entries.len().saturating_sub(1));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample() -> TempDir {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("src/nested")).unwrap();
        fs::create_dir(root.join("docs")).unwrap();
        fs::write(root.join("src/main.rs"), "fn main() {}\n").unwrap();
        fs::write(root.join("src/nested/deep.rs"), "").unwrap();
        fs::write(root.join("Cargo.toml"), "").unwrap();
        fs::write(root.join("README.md"), "").unwrap();
        fs::write(root.join(".hidden"), "").unwrap();
        dir
    }

    fn names(tree: &FileTree) -> Vec<&str> {
        tree.entries().iter().map(|e| e.name.as_str()).collect()
    }

    #[test]
    fn test_directories_first_then_case_insensitive() {
        let dir = sample();
        let tree = FileTree::new(dir.path(), false);
        assert_eq!(names(&tree), ["docs", "src", "Cargo.toml", "README.md"]);
    }

    #[test]
    fn test_hidden_toggle() {
        let dir = sample();
        let mut tree = FileTree::new(dir.path(), false);
        tree.toggle_hidden();
        assert!(tree.show_hidden());
        assert!(names(&tree).contains(&".hidden"));
        tree.toggle_hidden();
        assert!(!names(&tree).contains(&".hidden"));
    }

    #[test]
    fn test_expand_collapse_and_open() {
        let dir = sample();
        let mut tree = FileTree::new(dir.path(), false);

        tree.move_down();
        assert_eq!(tree.selected_entry().unwrap().name, "src");
        assert_eq!(tree.activate(), TreeAction::None);
        assert_eq!(
            names(&tree),
            ["docs", "src", "nested", "main.rs", "Cargo.toml", "README.md"]
        );
        assert_eq!(tree.entries()[2].depth, 1);

        // Step into the expanded directory and open a file
        tree.expand();
        tree.move_down();
        let action = tree.activate();
        assert_eq!(action, TreeAction::Open(tree.root().join("src/main.rs")));

        // Left jumps to the parent, then collapses it
        tree.collapse();
        assert_eq!(tree.selected_entry().unwrap().name, "src");
        tree.collapse();
        assert_eq!(names(&tree), ["docs", "src", "Cargo.toml", "README.md"]);
        assert_eq!(tree.selected_entry().unwrap().name, "src");
    }

    #[test]
    fn test_selection_survives_refresh() {
        let dir = sample();
        let mut tree = FileTree::new(dir.path(), false);
        tree.select_last();
        assert_eq!(tree.selected_entry().unwrap().name, "README.md");

        fs::write(dir.path().join("AAA.txt"), "").unwrap();
        tree.refresh();
        assert_eq!(tree.selected_entry().unwrap().name, "README.md");

        fs::remove_file(dir.path().join("README.md")).unwrap();
        tree.refresh();
        assert!(tree.selected() < tree.entries().len());
    }

    #[test]
    fn test_scrolling_keeps_selection_visible() {
        let dir = TempDir::new().unwrap();
        for i in 0..20 {
            fs::write(dir.path().join(format!("f{:02}", i)), "").unwrap();
        }
        let mut tree = FileTree::new(dir.path(), false);
        tree.page_down(15);
        tree.scroll_to_selected(5);
        assert_eq!(tree.selected(), 15);
        assert_eq!(tree.scroll_offset(), 11);

        assert!(tree.select_row(0));
        assert_eq!(tree.selected(), 11);
        assert!(!tree.select_row(30));

        tree.scroll_by(-100, 5);
        assert_eq!(tree.scroll_offset(), 0);
        assert!(tree.selected() < 5);
    }
}
