//! Application state and event dispatch
//!
//! [`App`] owns the open documents, the file tree, the terminal session and
//! the input router. The main loop feeds it crossterm events, calls
//! [`App::tick`] to collect background work, and asks it to render when
//! something changed.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};
use std::time::{Duration, Instant};

use crossterm::event::{Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers, MouseEvent};
use tracing::{debug, error, info, warn};

use crate::clipboard::Clipboard;
use crate::config::{ColorScheme, Config};
use crate::core::term::TerminalModes;
use crate::core::{SessionEvent, SessionState, TerminalSession};
use crate::editor::search::SearchQuery;
use crate::editor::syntax::worker::TokenizerWorker;
use crate::editor::{Document, DocumentId, Motion};
use crate::filetree::{FileTree, TreeAction};
use crate::input::{EditorCommand, Focus, InputRouter, Routed, TerminalCommand, TreeCommand};
use crate::ui::renderer::{char_at_column, gutter_width};
use crate::ui::{draw, Frame, Layout, LayoutRequest, Prompt, Renderer, TerminalView};

/// How long a status message stays up
const MESSAGE_TIMEOUT: Duration = Duration::from_secs(4);

#[derive(Clone, Debug, PartialEq, Eq)]
enum PromptKind {
    Find,
    ReplaceFind,
    ReplaceWith { pattern: String },
    SaveAs,
}

impl PromptKind {
    fn label(&self) -> &'static str {
        match self {
            PromptKind::Find => "Find: ",
            PromptKind::ReplaceFind => "Replace: ",
            PromptKind::ReplaceWith { .. } => "Replace with: ",
            PromptKind::SaveAs => "Save as: ",
        }
    }
}

#[derive(Clone, Debug)]
struct PromptState {
    kind: PromptKind,
    input: String,
}

/// Action waiting for a second keypress because it would lose changes
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Pending {
    Quit,
    Close(DocumentId),
}

/// Startup choices made on the command line
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StartupOptions {
    pub shell: Option<String>,
    /// Directory shown in the file tree; the working directory when unset
    pub root: Option<PathBuf>,
    pub files: Vec<PathBuf>,
}

pub struct App {
    config: Config,
    scheme: ColorScheme,
    shell: String,

    documents: Vec<Document>,
    active: usize,
    next_id: DocumentId,

    tree: FileTree,
    router: InputRouter,
    layout: Layout,
    size: (u16, u16),

    session: Option<TerminalSession>,
    session_tx: Sender<SessionEvent>,
    session_rx: Receiver<SessionEvent>,
    /// Shown in the terminal pane when there is no live shell
    terminal_notice: Option<String>,
    /// Size last applied to the PTY, as (rows, cols)
    pty_size: Option<(u16, u16)>,

    worker: Option<TokenizerWorker>,
    clipboard: Clipboard,

    prompt: Option<PromptState>,
    search: Option<SearchQuery>,
    pending: Option<Pending>,
    message: Option<(String, Instant)>,

    needs_redraw: bool,
    full_redraw: bool,
    quit: bool,
}

impl App {
    /// Build the application for a `width` x `height` screen and start the
    /// shell
    pub fn new(config: Config, options: StartupOptions, width: u16, height: u16) -> Self {
        let scheme = config.color_scheme();
        let shell = match options.shell {
            Some(shell) => shell,
            None => config.shell(),
        };
        let root = options
            .root
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("."));
        let tree = FileTree::new(root, config.file_tree.show_hidden);
        let router = InputRouter::new(config.ui.show_file_tree, config.ui.show_terminal);

        let worker = match TokenizerWorker::spawn() {
            Ok(worker) => Some(worker),
            Err(e) => {
                warn!("Tokenizer thread unavailable, highlighting inline: {}", e);
                None
            }
        };

        let (session_tx, session_rx) = mpsc::channel();
        let mut app = Self {
            documents: vec![Document::new(1, config.editor.clone())],
            active: 0,
            next_id: 2,
            scheme,
            shell,
            tree,
            router,
            layout: Layout::default(),
            size: (width, height),
            session: None,
            session_tx,
            session_rx,
            terminal_notice: None,
            pty_size: None,
            worker,
            clipboard: Clipboard::new(),
            prompt: None,
            search: None,
            pending: None,
            message: None,
            needs_redraw: true,
            full_redraw: true,
            quit: false,
            config,
        };
        app.layout = Layout::compute(width, height, app.layout_request());

        for path in &options.files {
            app.open_path(path);
        }
        app.start_terminal();
        app
    }

    pub fn should_quit(&self) -> bool {
        self.quit
    }

    pub fn focus(&self) -> Focus {
        self.router.focus()
    }

    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    pub fn active_document(&self) -> &Document {
        &self.documents[self.active]
    }

    fn doc(&mut self) -> &mut Document {
        &mut self.documents[self.active]
    }

    /// Returns true once if the screen needs repainting
    pub fn take_redraw(&mut self) -> bool {
        std::mem::take(&mut self.needs_redraw)
    }

    fn set_message(&mut self, text: impl Into<String>) {
        let text = text.into();
        debug!("Status: {}", text);
        self.message = Some((text, Instant::now()));
    }

    // ---- Layout and terminal lifecycle ----

    fn layout_request(&self) -> LayoutRequest {
        LayoutRequest {
            show_tree: self.router.is_visible(Focus::FileTree),
            show_terminal: self.router.is_visible(Focus::Terminal),
            tree_width: self.config.ui.file_tree_width,
            terminal_height: self.config.ui.terminal_height,
        }
    }

    /// Recompute pane rectangles and keep the PTY the size of its pane
    fn sync_layout(&mut self) {
        self.layout = Layout::compute(self.size.0, self.size.1, self.layout_request());
        let Some(rect) = self.layout.terminal else {
            return;
        };
        let wanted = (rect.height, rect.width);
        if self.pty_size == Some(wanted) {
            return;
        }
        if let Some(session) = &self.session {
            match session.resize(wanted.0, wanted.1) {
                Ok(()) => self.pty_size = Some(wanted),
                Err(e) => warn!("Terminal resize failed: {}", e),
            }
        }
    }

    fn start_terminal(&mut self) {
        let (rows, cols) = match self.layout.terminal {
            Some(rect) => (rect.height, rect.width),
            None => (self.config.ui.terminal_height, self.size.0),
        };
        let (rows, cols) = (rows.max(1), cols.max(1));

        match TerminalSession::spawn(
            &self.shell,
            rows,
            cols,
            self.config.terminal.scrollback,
            self.session_tx.clone(),
        ) {
            Ok(session) => {
                info!("Terminal started: {} ({}x{})", self.shell, cols, rows);
                self.session = Some(session);
                self.terminal_notice = None;
                self.pty_size = Some((rows, cols));
            }
            Err(e) => {
                error!("Failed to start shell: {}", e);
                self.session = None;
                self.terminal_notice = Some(format!("{}. Press Enter to retry.", e));
            }
        }
        self.needs_redraw = true;
    }

    fn terminal_closed(&self) -> bool {
        self.session
            .as_ref()
            .map_or(true, |s| s.state() == SessionState::Closed)
    }

    fn terminal_modes(&self) -> TerminalModes {
        self.session
            .as_ref()
            .map(|s| s.terminal().state().modes.clone())
            .unwrap_or_default()
    }

    /// Stop the shell, waiting up to the configured grace period
    pub fn shutdown(&mut self) {
        if let Some(session) = self.session.take() {
            session.terminate(self.config.terminal.shutdown_grace());
        }
        for doc in &self.documents {
            if doc.is_dirty() {
                warn!("Discarding unsaved changes in {}", doc.title());
            }
        }
    }

    // ---- Events ----

    pub fn handle_event(&mut self, event: Event) {
        match event {
            Event::Key(key) => self.handle_key(key),
            Event::Mouse(mouse) => self.handle_mouse(mouse),
            Event::Paste(text) => self.handle_paste(&text),
            Event::Resize(width, height) => {
                self.size = (width, height);
                self.full_redraw = true;
            }
            Event::FocusGained | Event::FocusLost => return,
        }
        self.sync_layout();
        self.needs_redraw = true;
    }

    fn handle_key(&mut self, key: KeyEvent) {
        if key.kind == KeyEventKind::Release {
            return;
        }
        if self.prompt.is_some() {
            self.handle_prompt_key(key);
            return;
        }

        let pending = self.pending.take();
        let modes = self.terminal_modes();
        match self.router.route_key(&key, &modes) {
            Routed::Quit => self.request_quit(pending),
            Routed::Handled | Routed::Ignored => {}
            Routed::Editor(cmd) => self.editor_command(cmd, pending),
            Routed::Tree(cmd) => self.tree_command(cmd),
            Routed::Terminal(cmd) => self.terminal_command(cmd),
        }
    }

    fn handle_mouse(&mut self, mouse: MouseEvent) {
        let modes = self.terminal_modes();
        match self.router.route_mouse(&mouse, &self.layout, &modes) {
            Routed::Editor(cmd) => self.editor_command(cmd, None),
            Routed::Tree(cmd) => self.tree_command(cmd),
            Routed::Terminal(cmd) => self.terminal_command(cmd),
            Routed::Quit | Routed::Handled | Routed::Ignored => {}
        }
    }

    fn handle_paste(&mut self, text: &str) {
        if let Some(prompt) = &mut self.prompt {
            prompt.input.push_str(text.lines().next().unwrap_or(""));
            return;
        }
        match self.router.focus() {
            Focus::Editor => {
                self.doc().paste(text);
                self.scroll_editor();
            }
            Focus::Terminal => self.paste_to_terminal(text),
            Focus::FileTree => {}
        }
    }

    fn request_quit(&mut self, pending: Option<Pending>) {
        let dirty = self.documents.iter().filter(|d| d.is_dirty()).count();
        if dirty == 0 || pending == Some(Pending::Quit) {
            info!("Quit requested");
            self.quit = true;
            return;
        }
        self.pending = Some(Pending::Quit);
        self.set_message(format!(
            "{} unsaved document(s). Press Ctrl+Q again to quit.",
            dirty
        ));
    }

    // ---- Prompt ----

    fn open_prompt(&mut self, kind: PromptKind, input: String) {
        self.prompt = Some(PromptState { kind, input });
    }

    fn handle_prompt_key(&mut self, key: KeyEvent) {
        let Some(prompt) = &mut self.prompt else {
            return;
        };
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Esc => self.prompt = None,
            KeyCode::Enter => {
                if let Some(prompt) = self.prompt.take() {
                    self.submit_prompt(prompt);
                }
            }
            KeyCode::Backspace => {
                prompt.input.pop();
            }
            KeyCode::Char('u') if ctrl => prompt.input.clear(),
            KeyCode::Char(c) if !ctrl => prompt.input.push(c),
            _ => {}
        }
    }

    fn submit_prompt(&mut self, prompt: PromptState) {
        let input = prompt.input;
        match prompt.kind {
            PromptKind::Find => {
                if input.is_empty() {
                    return;
                }
                let query = SearchQuery::new(input);
                self.find(&query, true);
                self.search = Some(query);
            }
            PromptKind::ReplaceFind => {
                if !input.is_empty() {
                    self.open_prompt(PromptKind::ReplaceWith { pattern: input }, String::new());
                }
            }
            PromptKind::ReplaceWith { pattern } => {
                let query = SearchQuery::new(pattern);
                let count = self.doc().replace_all(&query, &input);
                self.scroll_editor();
                self.set_message(format!("Replaced {} occurrence(s)", count));
                self.search = Some(query);
            }
            PromptKind::SaveAs => {
                if input.is_empty() {
                    return;
                }
                let path = self.resolve_path(Path::new(&input));
                match self.doc().save_as(&path) {
                    Ok(()) => {
                        self.set_message(format!("Saved {}", path.display()));
                        self.tree.refresh();
                    }
                    Err(e) => self.set_message(e.to_string()),
                }
            }
        }
    }

    /// Relative paths are taken from the file tree root
    fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.tree.root().join(path)
        }
    }

    fn find(&mut self, query: &SearchQuery, forward: bool) {
        let found = if forward {
            self.doc().find_next(query)
        } else {
            self.doc().find_prev(query)
        };
        if found {
            self.scroll_editor();
        } else {
            self.set_message(format!("Not found: {}", query.pattern));
        }
    }

    // ---- Editor ----

    fn scroll_editor(&mut self) {
        let rect = self.layout.editor;
        let gutter = gutter_width(
            self.active_document().buffer().line_count(),
            self.config.editor.show_line_numbers,
        );
        let width = rect.width.saturating_sub(gutter) as usize;
        self.doc().scroll_to_cursor(rect.height as usize, width);
    }

    fn editor_command(&mut self, cmd: EditorCommand, pending: Option<Pending>) {
        let page = (self.layout.editor.height as usize).max(1);
        match cmd {
            EditorCommand::Insert(c) => {
                let mut buf = [0u8; 4];
                self.doc().type_text(c.encode_utf8(&mut buf));
            }
            EditorCommand::Newline => self.doc().insert_newline(),
            EditorCommand::Tab => self.doc().insert_tab(),
            EditorCommand::Backspace => self.doc().backspace(),
            EditorCommand::Delete => self.doc().delete_forward(),
            EditorCommand::Move { motion, extend } => self.doc().move_cursor(motion, extend),
            EditorCommand::Page { down, extend } => {
                let motion = if down {
                    Motion::PageDown(page)
                } else {
                    Motion::PageUp(page)
                };
                self.doc().move_cursor(motion, extend);
            }
            EditorCommand::ToggleMode => self.doc().toggle_mode(),
            EditorCommand::Undo => {
                if !self.doc().undo() {
                    self.set_message("Nothing to undo");
                }
            }
            EditorCommand::Redo => {
                if !self.doc().redo() {
                    self.set_message("Nothing to redo");
                }
            }
            EditorCommand::Cut => {
                if let Some(text) = self.doc().cut() {
                    self.clipboard.set_text(&text);
                }
            }
            EditorCommand::Copy => {
                if let Some(text) = self.doc().copy() {
                    self.clipboard.set_text(&text);
                    self.set_message("Copied");
                }
            }
            EditorCommand::Paste => {
                if let Some(text) = self.clipboard.get_text() {
                    self.doc().paste(&text);
                }
            }
            EditorCommand::SelectAll => self.doc().select_all(),
            EditorCommand::DeleteLine => self.doc().delete_line(),
            EditorCommand::Save => self.save_active(),
            EditorCommand::SaveAs => {
                let current = self
                    .active_document()
                    .path()
                    .map(|p| p.display().to_string())
                    .unwrap_or_default();
                self.open_prompt(PromptKind::SaveAs, current);
            }
            EditorCommand::NewDocument => self.new_document(),
            EditorCommand::CloseDocument => self.close_active(pending),
            EditorCommand::NextDocument => self.switch_document(true),
            EditorCommand::PrevDocument => self.switch_document(false),
            EditorCommand::Find => {
                let initial = self
                    .active_document()
                    .selected_text()
                    .filter(|t| !t.contains('\n'))
                    .or_else(|| self.search.as_ref().map(|q| q.pattern.clone()))
                    .unwrap_or_default();
                self.open_prompt(PromptKind::Find, initial);
            }
            EditorCommand::FindNext | EditorCommand::FindPrev => match self.search.clone() {
                Some(query) => self.find(&query, cmd == EditorCommand::FindNext),
                None => self.open_prompt(PromptKind::Find, String::new()),
            },
            EditorCommand::Replace => {
                let initial = self
                    .search
                    .as_ref()
                    .map(|q| q.pattern.clone())
                    .unwrap_or_default();
                self.open_prompt(PromptKind::ReplaceFind, initial);
            }
            EditorCommand::Click { col, row, extend } => self.click_editor(col, row, extend),
            EditorCommand::Scroll(delta) => {
                let doc = self.doc();
                let last = doc.buffer().line_count().saturating_sub(1);
                doc.scroll_top = doc.scroll_top.saturating_add_signed(delta).min(last);
                // Wheel scrolling leaves the caret where it is
                return;
            }
        }
        self.scroll_editor();
    }

    fn click_editor(&mut self, col: u16, row: u16, extend: bool) {
        let tab_width = self.config.editor.tab_width;
        let show_numbers = self.config.editor.show_line_numbers;
        let doc = self.doc();
        let line_count = doc.buffer().line_count();
        let line = (doc.scroll_top + row as usize).min(line_count.saturating_sub(1));
        let gutter = gutter_width(line_count, show_numbers);
        let x = col.saturating_sub(gutter) as usize;
        let text = doc.buffer().line_text(line).unwrap_or_default();
        let char_col = char_at_column(&text, doc.scroll_left, x, tab_width);
        doc.set_cursor(line, char_col, extend);
    }

    fn save_active(&mut self) {
        if self.active_document().path().is_none() {
            self.open_prompt(PromptKind::SaveAs, String::new());
            return;
        }
        match self.doc().save() {
            Ok(()) => {
                let title = self.active_document().title();
                self.set_message(format!("Saved {}", title));
            }
            Err(e) => {
                error!("Save failed: {}", e);
                self.set_message(e.to_string());
            }
        }
    }

    fn new_document(&mut self) {
        let id = self.next_id;
        self.next_id += 1;
        self.documents
            .push(Document::new(id, self.config.editor.clone()));
        self.active = self.documents.len() - 1;
    }

    fn close_active(&mut self, pending: Option<Pending>) {
        let doc = self.active_document();
        let id = doc.id();
        let title = doc.title();
        if doc.is_dirty() && pending != Some(Pending::Close(id)) {
            self.pending = Some(Pending::Close(id));
            self.set_message(format!(
                "{} has unsaved changes. Press Ctrl+W again to discard.",
                title
            ));
            return;
        }
        let closed = self.documents.remove(self.active);
        debug!("Closed {}", closed.title());
        if self.documents.is_empty() {
            self.new_document();
        }
        self.active = self.active.min(self.documents.len() - 1);
    }

    fn switch_document(&mut self, forward: bool) {
        let len = self.documents.len();
        self.active = if forward {
            (self.active + 1) % len
        } else {
            (self.active + len - 1) % len
        };
    }

    /// Open `path`, or switch to it when it is already open
    pub fn open_path(&mut self, path: &Path) {
        let path = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        if let Some(idx) = self.documents.iter().position(|d| d.path() == Some(path.as_path())) {
            self.active = idx;
        } else {
            match Document::open(self.next_id, &path, self.config.editor.clone()) {
                Ok(doc) => {
                    self.next_id += 1;
                    // Replace the untouched scratch buffer
                    let scratch = self.documents.len() == 1
                        && self.documents[0].path().is_none()
                        && !self.documents[0].is_dirty()
                        && self.documents[0].buffer().len_chars() == 0;
                    if scratch {
                        self.documents[0] = doc;
                        self.active = 0;
                    } else {
                        self.documents.push(doc);
                        self.active = self.documents.len() - 1;
                    }
                }
                Err(e) => {
                    error!("Open failed: {}", e);
                    self.set_message(e.to_string());
                    return;
                }
            }
        }
        self.router.set_focus(Focus::Editor);
        self.scroll_editor();
    }

    // ---- File tree ----

    fn tree_command(&mut self, cmd: TreeCommand) {
        let page = self.layout.tree.map_or(1, |r| r.height as usize).max(1);
        match cmd {
            TreeCommand::Up => self.tree.move_up(),
            TreeCommand::Down => self.tree.move_down(),
            TreeCommand::PageUp => self.tree.page_up(page),
            TreeCommand::PageDown => self.tree.page_down(page),
            TreeCommand::First => self.tree.select_first(),
            TreeCommand::Last => self.tree.select_last(),
            TreeCommand::Activate => self.activate_tree_entry(),
            TreeCommand::Collapse => self.tree.collapse(),
            TreeCommand::Expand => self.tree.expand(),
            TreeCommand::ToggleHidden => self.tree.toggle_hidden(),
            TreeCommand::Refresh => self.tree.refresh(),
            TreeCommand::Click(row) => {
                let before = self.tree.selected();
                // A click on the selected entry activates it
                if self.tree.select_row(row as usize) && self.tree.selected() == before {
                    self.activate_tree_entry();
                }
            }
            TreeCommand::Scroll(delta) => {
                self.tree.scroll_by(delta, page);
                return;
            }
        }
        self.tree.scroll_to_selected(page);
    }

    fn activate_tree_entry(&mut self) {
        if let TreeAction::Open(path) = self.tree.activate() {
            self.open_path(&path);
        }
    }

    // ---- Terminal ----

    fn paste_to_terminal(&mut self, text: &str) {
        let Some(session) = &self.session else {
            return;
        };
        if let Err(e) = session.paste(text) {
            debug!("Paste to terminal failed: {}", e);
        }
    }

    fn terminal_command(&mut self, cmd: TerminalCommand) {
        if let TerminalCommand::Input(bytes) = &cmd {
            if self.terminal_closed() {
                if bytes.as_slice() == b"\r" {
                    self.start_terminal();
                }
                return;
            }
        }
        if let TerminalCommand::Paste = cmd {
            if let Some(text) = self.clipboard.get_text() {
                self.paste_to_terminal(&text);
            }
            return;
        }

        let Some(session) = &self.session else {
            return;
        };
        let page = self.layout.terminal.map_or(1, |r| r.height as usize).max(1);
        match cmd {
            TerminalCommand::Input(bytes) => {
                if let Err(e) = session.write(&bytes) {
                    debug!("Terminal write failed: {}", e);
                }
            }
            TerminalCommand::Copy => {
                let text = session.terminal().state().selected_text();
                match text {
                    Some(text) if !text.is_empty() => {
                        self.clipboard.set_text(&text);
                        self.set_message("Copied");
                    }
                    _ => {}
                }
            }
            TerminalCommand::Paste => {}
            cmd => {
                let mut term = session.terminal();
                let state = term.state_mut();
                match cmd {
                    TerminalCommand::ScrollUp(n) => state.scrollback.scroll_view_up(n),
                    TerminalCommand::ScrollDown(n) => state.scrollback.scroll_view_down(n),
                    TerminalCommand::PageUp => state.scrollback.scroll_view_up(page),
                    TerminalCommand::PageDown => state.scrollback.scroll_view_down(page),
                    TerminalCommand::ScrollTop => state.scrollback.scroll_to_top(),
                    TerminalCommand::ScrollBottom => state.scrollback.scroll_to_bottom(),
                    TerminalCommand::SelectStart { col, row } => state.start_selection(col, row),
                    TerminalCommand::SelectUpdate { col, row } => {
                        state.update_selection(col, row)
                    }
                    TerminalCommand::SelectEnd => state.end_selection(),
                    TerminalCommand::Input(_) | TerminalCommand::Copy | TerminalCommand::Paste => {}
                }
            }
        }
    }

    // ---- Background work ----

    /// Collect shell output and highlighting results
    pub fn tick(&mut self) {
        while let Ok(event) = self.session_rx.try_recv() {
            match event {
                SessionEvent::Output => {}
                SessionEvent::Exited(code) => {
                    info!("Shell exited with {:?}", code);
                    let status = code.map_or_else(|| "unknown status".to_string(), |c| c.to_string());
                    self.terminal_notice = Some(format!(
                        "Process exited ({}). Press Enter to restart.",
                        status
                    ));
                }
            }
            self.needs_redraw = true;
        }

        if self.pump_highlighting() {
            self.needs_redraw = true;
        }

        if self
            .message
            .as_ref()
            .is_some_and(|(_, at)| at.elapsed() >= MESSAGE_TIMEOUT)
        {
            self.message = None;
            self.needs_redraw = true;
        }
    }

    fn pump_highlighting(&mut self) -> bool {
        let mut changed = false;
        if let Some(worker) = &self.worker {
            for result in worker.poll() {
                if let Some(doc) = self.documents.iter_mut().find(|d| d.id() == result.document) {
                    // A stale result is dropped; the next pass resubmits
                    changed |= doc.apply_highlight(result);
                }
            }
        }

        let mut worker_gone = false;
        for doc in &mut self.documents {
            match &self.worker {
                Some(worker) if !worker_gone => {
                    if let Some(job) = doc.take_highlight_job() {
                        if !worker.submit(job) {
                            worker_gone = true;
                            doc.highlight_now();
                            changed = true;
                        }
                    }
                }
                _ => {
                    if doc.syntax().is_dirty() {
                        doc.highlight_now();
                        changed = true;
                    }
                }
            }
        }
        if worker_gone {
            warn!("Tokenizer thread stopped, highlighting inline");
            self.worker = None;
        }
        changed
    }

    // ---- Rendering ----

    pub fn render(&mut self, renderer: &mut Renderer) -> io::Result<()> {
        if std::mem::take(&mut self.full_redraw) {
            renderer.invalidate();
        }
        if let Some(rect) = self.layout.tree {
            self.tree.scroll_to_selected(rect.height as usize);
        }

        let terminal = self.session.as_ref().map(|s| s.terminal());
        let title = terminal
            .as_ref()
            .map(|t| t.title())
            .filter(|t| !t.is_empty())
            .unwrap_or(self.shell.as_str());
        let frame = Frame {
            layout: self.layout,
            focus: self.router.focus(),
            scheme: &self.scheme,
            editor: &self.config.editor,
            tree: &self.tree,
            documents: &self.documents,
            active: self.active,
            terminal: TerminalView {
                state: terminal.as_deref().map(|t| t.state()),
                title,
                notice: self.terminal_notice.as_deref(),
            },
            message: self.message.as_ref().map(|(m, _)| m.as_str()),
            prompt: self.prompt.as_ref().map(|p| Prompt {
                label: p.kind.label(),
                input: &p.input,
            }),
        };
        let canvas = draw(&frame);
        drop(terminal);
        renderer.present(&canvas)
    }
}
