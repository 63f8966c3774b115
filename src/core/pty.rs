//! Pseudo-terminal wrapper
//!
//! Spawns the shell on a native PTY through `portable-pty` and tracks the
//! child's lifecycle. Reading happens on the session's reader thread, which
//! receives the reader half from [`PtySession::spawn`].

use std::io::{self, Read, Write};

use portable_pty::{native_pty_system, Child, CommandBuilder, MasterPty, PtySize};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum PtyError {
    #[error("failed to open pty: {0}")]
    Open(String),

    #[error("failed to start '{shell}': {reason}")]
    Spawn { shell: String, reason: String },

    #[error("failed to resize pty: {0}")]
    Resize(String),

    #[error("pty I/O failed: {0}")]
    Io(#[from] io::Error),

    #[error("shell is not running")]
    NotRunning,
}

pub type Result<T> = std::result::Result<T, PtyError>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    /// Spawned, no output seen yet
    Starting,
    Running,
    Closed,
}

/// Shell process attached to a PTY
pub struct PtySession {
    master: Box<dyn MasterPty + Send>,
    writer: Box<dyn Write + Send>,
    child: Box<dyn Child + Send + Sync>,
    pid: Option<u32>,
    rows: u16,
    cols: u16,
    state: SessionState,
    exit_code: Option<u32>,
}

impl PtySession {
    /// Start `shell` on a new PTY of the given size.
    ///
    /// `shell` may carry arguments separated by whitespace. Returns the
    /// session and the reader half of the master side.
    pub fn spawn(shell: &str, rows: u16, cols: u16) -> Result<(Self, Box<dyn Read + Send>)> {
        let rows = rows.max(1);
        let cols = cols.max(1);

        let mut parts = shell.split_whitespace();
        let program = parts.next().ok_or_else(|| PtyError::Spawn {
            shell: shell.to_string(),
            reason: "empty command".to_string(),
        })?;

        let pair = native_pty_system()
            .openpty(PtySize {
                rows,
                cols,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(|e| PtyError::Open(format!("{e:#}")))?;

        let mut cmd = CommandBuilder::new(program);
        cmd.args(parts);
        cmd.env("TERM", "xterm-256color");
        cmd.env("COLORTERM", "truecolor");
        if let Ok(cwd) = std::env::current_dir() {
            cmd.cwd(cwd);
        }

        let child = pair
            .slave
            .spawn_command(cmd)
            .map_err(|e| PtyError::Spawn {
                shell: shell.to_string(),
                reason: format!("{e:#}"),
            })?;
        // The child holds its own handle; ours would keep the PTY open
        // after it exits
        drop(pair.slave);

        let reader = pair
            .master
            .try_clone_reader()
            .map_err(|e| PtyError::Open(format!("{e:#}")))?;
        let writer = pair
            .master
            .take_writer()
            .map_err(|e| PtyError::Open(format!("{e:#}")))?;

        let pid = child.process_id();
        info!("Spawned '{}' (pid {:?}) at {}x{}", shell, pid, cols, rows);

        let session = Self {
            master: pair.master,
            writer,
            child,
            pid,
            rows,
            cols,
            state: SessionState::Running,
            exit_code: None,
        };
        Ok((session, reader))
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == SessionState::Running
    }

    /// (rows, cols) last acknowledged by the PTY
    pub fn size(&self) -> (u16, u16) {
        (self.rows, self.cols)
    }

    pub fn exit_code(&self) -> Option<u32> {
        self.exit_code
    }

    pub fn write(&mut self, bytes: &[u8]) -> Result<()> {
        if !self.is_running() {
            return Err(PtyError::NotRunning);
        }
        self.writer.write_all(bytes)?;
        self.writer.flush()?;
        Ok(())
    }

    pub fn resize(&mut self, rows: u16, cols: u16) -> Result<()> {
        if !self.is_running() {
            return Err(PtyError::NotRunning);
        }
        let rows = rows.max(1);
        let cols = cols.max(1);
        self.master
            .resize(PtySize {
                rows,
                cols,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(|e| PtyError::Resize(format!("{e:#}")))?;
        self.rows = rows;
        self.cols = cols;
        Ok(())
    }

    /// Check for exit without blocking. Returns true once the child is gone.
    pub fn poll_exit(&mut self) -> bool {
        if self.state == SessionState::Closed {
            return true;
        }
        match self.child.try_wait() {
            Ok(Some(status)) => {
                self.close(Some(status.exit_code()));
                true
            }
            Ok(None) => false,
            Err(e) => {
                warn!("Failed to query shell status: {}", e);
                self.close(None);
                true
            }
        }
    }

    /// Politely ask the shell to exit. SIGTERM where available, otherwise
    /// a kill.
    pub fn request_stop(&mut self) {
        if self.state == SessionState::Closed {
            return;
        }

        #[cfg(unix)]
        if let Some(pid) = self.pid {
            use nix::sys::signal::{kill, Signal};
            use nix::unistd::Pid;

            match i32::try_from(pid) {
                Ok(raw) => match kill(Pid::from_raw(raw), Signal::SIGTERM) {
                    Ok(()) => return,
                    Err(e) => warn!("SIGTERM to {} failed: {}", pid, e),
                },
                Err(_) => warn!("pid {} out of range", pid),
            }
        }

        self.kill();
    }

    pub fn kill(&mut self) {
        if self.state == SessionState::Closed {
            return;
        }
        if let Err(e) = self.child.kill() {
            warn!("Failed to kill shell: {}", e);
        }
    }

    /// Give up on a child that survived a kill; input is refused from now on
    pub fn abandon(&mut self) {
        if self.state != SessionState::Closed {
            warn!("Shell (pid {:?}) did not exit after kill", self.pid);
            self.close(None);
        }
    }

    fn close(&mut self, code: Option<u32>) {
        if self.state != SessionState::Closed {
            info!("Shell exited with {:?}", code);
        }
        self.state = SessionState::Closed;
        self.exit_code = code;
    }
}

impl Drop for PtySession {
    fn drop(&mut self) {
        if self.state != SessionState::Closed {
            let _ = self.child.kill();
        }
    }
}

/// Shell to launch: explicit override, then `$SHELL`, then the platform
/// default
pub fn resolve_shell(override_shell: Option<&str>) -> String {
    if let Some(shell) = override_shell.filter(|s| !s.trim().is_empty()) {
        return shell.to_string();
    }
    default_shell()
}

#[cfg(unix)]
fn default_shell() -> String {
    std::env::var("SHELL")
        .ok()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "/bin/sh".to_string())
}

#[cfg(not(unix))]
fn default_shell() -> String {
    std::env::var("COMSPEC")
        .ok()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "cmd.exe".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    fn wait_exit(pty: &mut PtySession, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while !pty.poll_exit() {
            if Instant::now() >= deadline {
                return false;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        true
    }

    #[test]
    fn test_resolve_shell_prefers_override() {
        assert_eq!(resolve_shell(Some("/bin/zsh -l")), "/bin/zsh -l");
        assert!(!resolve_shell(Some("  ")).is_empty());
        assert!(!resolve_shell(None).is_empty());
    }

    #[test]
    fn test_spawn_failure_is_reported() {
        let result = PtySession::spawn("/definitely/not/a/shell", 24, 80);
        assert!(matches!(result, Err(PtyError::Spawn { .. })));
        assert!(matches!(
            PtySession::spawn("", 24, 80),
            Err(PtyError::Spawn { .. })
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_spawn_echo_and_exit() {
        let (mut pty, mut reader) = PtySession::spawn("/bin/sh", 24, 80).unwrap();
        assert!(pty.is_running());
        assert_eq!(pty.size(), (24, 80));
        assert!(pty.pid().is_some());

        pty.resize(30, 100).unwrap();
        assert_eq!(pty.size(), (30, 100));

        pty.write(b"echo edterm-$((40+2)); exit 3\n").unwrap();
        let mut output = Vec::new();
        let mut buf = [0u8; 1024];
        while let Ok(n) = reader.read(&mut buf) {
            if n == 0 {
                break;
            }
            output.extend_from_slice(&buf[..n]);
            if String::from_utf8_lossy(&output).contains("edterm-42") {
                break;
            }
        }
        assert!(String::from_utf8_lossy(&output).contains("edterm-42"));

        assert!(wait_exit(&mut pty, Duration::from_secs(5)));
        assert_eq!(pty.state(), SessionState::Closed);
        assert_eq!(pty.exit_code(), Some(3));
        assert!(matches!(pty.write(b"x"), Err(PtyError::NotRunning)));
    }

    #[cfg(unix)]
    #[test]
    fn test_stop_then_kill_closes_shell() {
        let (mut pty, _reader) = PtySession::spawn("/bin/sh", 24, 80).unwrap();
        pty.write(b"trap '' TERM\n").unwrap();
        pty.request_stop();
        if !wait_exit(&mut pty, Duration::from_millis(300)) {
            pty.kill();
            assert!(wait_exit(&mut pty, Duration::from_secs(5)));
        }
        assert_eq!(pty.state(), SessionState::Closed);

        // Further stop requests are no-ops once closed
        pty.request_stop();
        pty.kill();
        pty.abandon();
        assert_eq!(pty.state(), SessionState::Closed);
    }
}
