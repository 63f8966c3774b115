//! Shell session
//!
//! Couples a [`PtySession`] with a [`Terminal`]. A dedicated reader thread is
//! the only writer of the grid: it parses PTY output under the grid lock and
//! then notifies the UI loop over a channel. The renderer takes the same lock
//! while drawing.
//!
//! A second thread watches the child's wait status. Background jobs can
//! keep the PTY open long after the shell is gone, so end of output alone
//! does not mean the session ended.
//!
//! Lock order is terminal, then pty. Neither lock is held while sleeping.

use std::io::{ErrorKind, Read};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info};

use super::pty::{PtyError, PtySession, SessionState};
use super::term::Terminal;

/// How often the waiter and `terminate` poll the child's status
const WAIT_INTERVAL: Duration = Duration::from_millis(20);
/// How long the final output may take to drain once the shell exited
const DRAIN_TIMEOUT: Duration = Duration::from_millis(250);
/// Grace period used when a session is dropped without being terminated
const DROP_GRACE: Duration = Duration::from_millis(100);

/// Notifications sent to the UI loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// The grid changed
    Output,
    /// The shell exited; sent at most once
    Exited(Option<u32>),
}

pub struct TerminalSession {
    terminal: Arc<Mutex<Terminal>>,
    pty: Arc<Mutex<PtySession>>,
    /// Set once the first output has been parsed
    started: Arc<AtomicBool>,
    exit_reported: Arc<AtomicBool>,
    events: Sender<SessionEvent>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl TerminalSession {
    /// Start `shell` at the given size and begin reading its output
    pub fn spawn(
        shell: &str,
        rows: u16,
        cols: u16,
        scrollback: usize,
        events: Sender<SessionEvent>,
    ) -> Result<Self, PtyError> {
        let (pty, reader) = PtySession::spawn(shell, rows, cols)?;
        let (rows, cols) = pty.size();

        let session = Self {
            terminal: Arc::new(Mutex::new(Terminal::new(cols, rows, scrollback))),
            pty: Arc::new(Mutex::new(pty)),
            started: Arc::new(AtomicBool::new(false)),
            exit_reported: Arc::new(AtomicBool::new(false)),
            events,
        };

        let reader_done = Arc::new(AtomicBool::new(false));

        let terminal = Arc::clone(&session.terminal);
        let pty = Arc::clone(&session.pty);
        let started = Arc::clone(&session.started);
        let done = Arc::clone(&reader_done);
        let events = session.events.clone();
        thread::Builder::new()
            .name("pty-reader".to_string())
            .spawn(move || {
                read_loop(reader, &terminal, &pty, &started, &events);
                done.store(true, Ordering::Release);
            })?;

        let pty = Arc::clone(&session.pty);
        let exit_reported = Arc::clone(&session.exit_reported);
        let events = session.events.clone();
        thread::Builder::new()
            .name("pty-waiter".to_string())
            .spawn(move || {
                let code = wait_for_child(&pty);
                // Let the reader parse what the shell printed last
                let deadline = Instant::now() + DRAIN_TIMEOUT;
                while !reader_done.load(Ordering::Acquire) && Instant::now() < deadline {
                    thread::sleep(Duration::from_millis(5));
                }
                notify_exit(&exit_reported, &events, code);
            })?;

        Ok(session)
    }

    /// Lock the emulator for reading or local changes (scroll, selection)
    pub fn terminal(&self) -> MutexGuard<'_, Terminal> {
        lock(&self.terminal)
    }

    pub fn state(&self) -> SessionState {
        match lock(&self.pty).state() {
            SessionState::Running if !self.started.load(Ordering::Acquire) => {
                SessionState::Starting
            }
            state => state,
        }
    }

    pub fn exit_code(&self) -> Option<u32> {
        lock(&self.pty).exit_code()
    }

    pub fn title(&self) -> String {
        self.terminal().title().to_string()
    }

    /// Send input to the shell, snapping the view back to the live screen
    pub fn write(&self, bytes: &[u8]) -> Result<(), PtyError> {
        lock(&self.pty).write(bytes)?;
        self.terminal().state_mut().scrollback.scroll_to_bottom();
        Ok(())
    }

    /// Paste text, bracketed when the application asked for it
    pub fn paste(&self, text: &str) -> Result<(), PtyError> {
        let bracketed = self.terminal().state().modes.bracketed_paste;
        // Line breaks are sent as carriage returns, like typed Enter
        let body = text.replace("\r\n", "\r").replace('\n', "\r");
        let mut bytes = Vec::with_capacity(body.len() + 12);
        if bracketed {
            bytes.extend_from_slice(b"\x1b[200~");
        }
        bytes.extend_from_slice(body.as_bytes());
        if bracketed {
            bytes.extend_from_slice(b"\x1b[201~");
        }
        self.write(&bytes)
    }

    /// Resize PTY and grid together. The grid only changes once the PTY
    /// accepted the new size, unless the shell is already gone.
    pub fn resize(&self, rows: u16, cols: u16) -> Result<(), PtyError> {
        let mut terminal = lock(&self.terminal);
        let mut pty = lock(&self.pty);
        match pty.resize(rows, cols) {
            Ok(()) => {
                let (rows, cols) = pty.size();
                terminal.resize(rows, cols);
                Ok(())
            }
            Err(PtyError::NotRunning) => {
                terminal.resize(rows.max(1), cols.max(1));
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// SIGTERM, wait up to `grace`, then kill. The PTY lock is only taken
    /// for each status check, so readers of the session are never blocked
    /// for the grace period.
    pub fn terminate(&self, grace: Duration) {
        if !lock(&self.pty).poll_exit() {
            lock(&self.pty).request_stop();
            if wait_closed(&self.pty, grace) {
                info!("Shell exited after SIGTERM");
            } else {
                lock(&self.pty).kill();
                if !wait_closed(&self.pty, grace) {
                    lock(&self.pty).abandon();
                }
            }
        }
        let code = lock(&self.pty).exit_code();
        notify_exit(&self.exit_reported, &self.events, code);
    }
}

impl Drop for TerminalSession {
    fn drop(&mut self) {
        // The reader thread keeps the PTY alive until the child is gone
        if lock(&self.pty).state() != SessionState::Closed {
            self.terminate(DROP_GRACE);
        }
    }
}

fn read_loop(
    mut reader: Box<dyn Read + Send>,
    terminal: &Mutex<Terminal>,
    pty: &Mutex<PtySession>,
    started: &AtomicBool,
    events: &Sender<SessionEvent>,
) {
    let mut buf = [0u8; 8192];
    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            // EIO once the child side closes
            Err(e) => {
                debug!("PTY read ended: {}", e);
                break;
            }
        };

        let responses = lock(terminal).feed(&buf[..n]);
        started.store(true, Ordering::Release);

        if !responses.is_empty() {
            let mut pty = lock(pty);
            for response in responses {
                if let Err(e) = pty.write(&response.to_bytes()) {
                    debug!("Dropped terminal reply {:?}: {}", response, e);
                }
            }
        }

        if events.send(SessionEvent::Output).is_err() {
            // Owner is gone
            break;
        }
    }
}

/// Block until the child is gone; the lock is released between polls
fn wait_for_child(pty: &Mutex<PtySession>) -> Option<u32> {
    loop {
        {
            let mut pty = lock(pty);
            if pty.poll_exit() {
                return pty.exit_code();
            }
        }
        thread::sleep(WAIT_INTERVAL);
    }
}

/// Poll until the child is gone or `timeout` elapses
fn wait_closed(pty: &Mutex<PtySession>, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if lock(pty).poll_exit() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        thread::sleep(WAIT_INTERVAL);
    }
}

fn notify_exit(reported: &AtomicBool, events: &Sender<SessionEvent>, code: Option<u32>) {
    if reported.swap(true, Ordering::AcqRel) {
        return;
    }
    info!("Terminal session ended ({:?})", code);
    let _ = events.send(SessionEvent::Exited(code));
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc::{self, Receiver};

    #[cfg(unix)]
    fn wait_for_exit(rx: &Receiver<SessionEvent>) -> Option<Option<u32>> {
        let deadline = Instant::now() + Duration::from_secs(10);
        while Instant::now() < deadline {
            match rx.recv_timeout(Duration::from_millis(100)) {
                Ok(SessionEvent::Exited(code)) => return Some(code),
                Ok(SessionEvent::Output) | Err(_) => {}
            }
        }
        None
    }

    #[test]
    fn test_spawn_failure_is_reported() {
        let (tx, _rx) = mpsc::channel();
        let result = TerminalSession::spawn("/no/such/shell", 24, 80, 100, tx);
        assert!(matches!(result, Err(PtyError::Spawn { .. })));
    }

    #[cfg(unix)]
    #[test]
    fn test_output_reaches_grid_and_exit_is_reported_once() {
        let (tx, rx) = mpsc::channel();
        let session = TerminalSession::spawn("/bin/sh", 24, 80, 100, tx).unwrap();
        session.write(b"printf 'ok-%s\\n' $((6*7)); exit 0\n").unwrap();

        assert_eq!(wait_for_exit(&rx), Some(Some(0)));
        assert_eq!(session.state(), SessionState::Closed);

        let found = {
            let terminal = session.terminal();
            let state = terminal.state();
            (0..state.rows as usize)
                .filter_map(|r| state.visible_row(r))
                .any(|row| row.text().contains("ok-42"))
        };
        assert!(found);

        session.terminate(Duration::from_millis(10));
        assert!(!rx.try_iter().any(|e| matches!(e, SessionEvent::Exited(_))));
        assert!(matches!(session.write(b"x"), Err(PtyError::NotRunning)));
    }

    #[cfg(unix)]
    #[test]
    fn test_resize_keeps_pty_and_grid_in_step() {
        let (tx, _rx) = mpsc::channel();
        let session = TerminalSession::spawn("/bin/sh", 24, 80, 100, tx).unwrap();
        session.resize(10, 40).unwrap();
        assert_eq!(session.terminal().size(), (10, 40));
        assert_eq!(lock(&session.pty).size(), (10, 40));
        session.terminate(Duration::from_millis(200));
        assert_eq!(session.state(), SessionState::Closed);
    }

    #[cfg(unix)]
    #[test]
    fn test_terminate_reports_exit() {
        let (tx, rx) = mpsc::channel();
        let session = TerminalSession::spawn("/bin/sh", 24, 80, 100, tx).unwrap();
        session.terminate(Duration::from_millis(200));
        assert!(wait_for_exit(&rx).is_some());
        assert!(wait_for_exit_quick(&rx).is_none());
    }

    #[cfg(unix)]
    #[test]
    fn test_exit_reported_while_background_job_holds_pty() {
        let (tx, rx) = mpsc::channel();
        let session = TerminalSession::spawn("/bin/sh", 24, 80, 100, tx).unwrap();
        let started = Instant::now();
        session.write(b"sleep 5 & exit 0\n").unwrap();

        assert_eq!(wait_for_exit(&rx), Some(Some(0)));
        assert!(
            started.elapsed() < Duration::from_secs(3),
            "exit took {:?}",
            started.elapsed()
        );
        assert_eq!(session.state(), SessionState::Closed);
        assert!(wait_for_exit_quick(&rx).is_none());
    }

    #[cfg(unix)]
    #[test]
    fn test_terminate_does_not_block_state_queries() {
        let (tx, _rx) = mpsc::channel();
        let session = TerminalSession::spawn("/bin/sh", 24, 80, 100, tx).unwrap();
        session.write(b"trap '' TERM\n").unwrap();
        thread::sleep(Duration::from_millis(100));

        thread::scope(|scope| {
            let stopper = scope.spawn(|| session.terminate(Duration::from_millis(800)));
            thread::sleep(Duration::from_millis(100));

            let asked = Instant::now();
            let _ = session.state();
            let _ = session.exit_code();
            assert!(
                asked.elapsed() < Duration::from_millis(300),
                "state query waited {:?}",
                asked.elapsed()
            );
            stopper.join().unwrap();
        });
        assert_eq!(session.state(), SessionState::Closed);
    }

    #[cfg(unix)]
    fn wait_for_exit_quick(rx: &Receiver<SessionEvent>) -> Option<Option<u32>> {
        let deadline = Instant::now() + Duration::from_millis(500);
        while Instant::now() < deadline {
            if let Ok(SessionEvent::Exited(code)) = rx.recv_timeout(Duration::from_millis(50)) {
                return Some(code);
            }
        }
        None
    }
}
