//! Clipboard with an in-process fallback
//!
//! The system clipboard is opened lazily and kept alive so X11 selections
//! stay owned. Copies always land in the local register as well, so cut and
//! paste keep working on headless machines.

use tracing::debug;

#[derive(Default)]
pub struct Clipboard {
    system: Option<arboard::Clipboard>,
    /// Set after the first failed attempt to open the system clipboard
    unavailable: bool,
    register: String,
}

impl Clipboard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register-only clipboard, for tests
    #[cfg(test)]
    pub fn local() -> Self {
        Self {
            unavailable: true,
            ..Self::default()
        }
    }

    fn system(&mut self) -> Option<&mut arboard::Clipboard> {
        if self.system.is_none() && !self.unavailable {
            match arboard::Clipboard::new() {
                Ok(cb) => self.system = Some(cb),
                Err(e) => {
                    debug!("System clipboard unavailable: {}", e);
                    self.unavailable = true;
                }
            }
        }
        self.system.as_mut()
    }

    pub fn set_text(&mut self, text: &str) {
        self.register = text.to_string();
        if let Some(cb) = self.system() {
            if let Err(e) = cb.set_text(text.to_string()) {
                debug!("Clipboard write failed: {}", e);
            }
        }
    }

    /// System clipboard contents, or the register when the system one is
    /// empty or unreachable
    pub fn get_text(&mut self) -> Option<String> {
        let system = self.system().and_then(|cb| cb.get_text().ok());
        match system {
            Some(text) if !text.is_empty() => Some(text),
            _ if !self.register.is_empty() => Some(self.register.clone()),
            _ => None,
        }
    }
}
