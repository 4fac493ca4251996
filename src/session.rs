//! Interactive session management
//!
//! A [`Session`] wraps one child process attached to a pseudo-terminal and
//! the virtual [`Screen`] its output is decoded into. The lifecycle is
//! `Unstarted -> Running -> Closed`: the pty attaches lazily on first draw
//! (but always before the first input byte is delivered), and `Closed` is
//! terminal - input delivery and resize become no-ops.
//!
//! Output never touches shared state from the reader task. The task only
//! reads raw bytes off the pty and posts them over a channel; the render
//! thread owns the screen buffer and feeds it via [`Session::handle_output`].

use portable_pty::{Child, CommandBuilder, MasterPty, NativePtySystem, PtySize, PtySystem};
use std::io::{Read, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};

use crate::screen::Screen;

/// Pty read buffer size; 4KB matches typical terminal output bursts
const READ_BUFFER_SIZE: usize = 4 * 1024;

/// Errors raised while preparing or starting a session
#[derive(Debug, Error)]
pub enum SpawnError {
    /// The requested command is not on the search path. Recoverable:
    /// reported inline, no tab is created.
    #[error("executable not found: {command}")]
    ExecutableNotFound { command: String },

    #[error("failed to open pty: {0}")]
    Pty(String),

    #[error("failed to spawn {command}: {source}")]
    Spawn {
        command: String,
        source: std::io::Error,
    },
}

/// What a tab needs to start its process: a resolved executable, arguments,
/// and the display title. Supplied by the surrounding application when the
/// operator triggers "open shell" or "log into cluster".
#[derive(Debug, Clone)]
pub struct SpawnSpec {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub title: String,
}

impl SpawnSpec {
    /// Resolve `command` on the search path. This is the only place
    /// `ExecutableNotFound` originates, so the check happens before any
    /// tab is created.
    pub fn resolve(
        command: &str,
        args: Vec<String>,
        title: impl Into<String>,
    ) -> Result<Self, SpawnError> {
        let program = which::which(command).map_err(|_| SpawnError::ExecutableNotFound {
            command: command.to_string(),
        })?;

        Ok(Self {
            program,
            args,
            title: title.into(),
        })
    }
}

/// Events posted by session reader tasks, consumed on the render thread.
/// Carries the owning tab's region id so stale events (tab already removed)
/// can be dropped by a registry miss instead of crashing.
#[derive(Debug)]
pub enum SessionEvent {
    Output { region_id: u64, bytes: Vec<u8> },
    Closed { region_id: u64 },
}

enum SessionState {
    Unstarted,
    Running(Running),
    Closed,
}

struct Running {
    master: Box<dyn MasterPty + Send>,
    writer: Box<dyn Write + Send>,
    child: Box<dyn Child + Send + Sync>,
    /// Cleared when the session closes so the reader task stops posting
    alive: Arc<AtomicBool>,
}

/// One spawned child process on a pty with its decoded screen buffer
pub struct Session {
    spec: SpawnSpec,
    region_id: u64,
    state: SessionState,
    events: UnboundedSender<SessionEvent>,
    parser: vte::Parser,
    screen: Screen,
    cols: u16,
    rows: u16,
}

impl Session {
    /// Create an unstarted session. The pty attaches on the first call to
    /// [`Session::ensure_started`].
    #[must_use]
    pub fn new(
        spec: SpawnSpec,
        region_id: u64,
        cols: u16,
        rows: u16,
        events: UnboundedSender<SessionEvent>,
    ) -> Self {
        Self {
            spec,
            region_id,
            state: SessionState::Unstarted,
            events,
            parser: vte::Parser::new(),
            screen: Screen::new(cols, rows),
            cols,
            rows,
        }
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.spec.title
    }

    #[must_use]
    pub fn running(&self) -> bool {
        matches!(self.state, SessionState::Running(_))
    }

    #[must_use]
    pub fn screen(&self) -> &Screen {
        &self.screen
    }

    /// Attach the pty and start the child process plus its reader task.
    /// No-op when already running or closed.
    ///
    /// # Errors
    /// Returns an error if pty creation or process spawn fails.
    pub fn ensure_started(&mut self) -> Result<(), SpawnError> {
        if !matches!(self.state, SessionState::Unstarted) {
            return Ok(());
        }

        let pty_system = NativePtySystem::default();
        let pair = pty_system
            .openpty(PtySize {
                rows: self.rows,
                cols: self.cols,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(|e| SpawnError::Pty(e.to_string()))?;

        let mut cmd = CommandBuilder::new(&self.spec.program);
        cmd.args(&self.spec.args);

        let child = pair.slave.spawn_command(cmd).map_err(|e| SpawnError::Spawn {
            command: self.spec.program.display().to_string(),
            source: std::io::Error::other(e.to_string()),
        })?;
        drop(pair.slave);

        let reader = pair
            .master
            .try_clone_reader()
            .map_err(|e| SpawnError::Pty(e.to_string()))?;
        let writer = pair
            .master
            .take_writer()
            .map_err(|e| SpawnError::Pty(e.to_string()))?;

        let alive = Arc::new(AtomicBool::new(true));
        self.spawn_reader(reader, alive.clone());

        info!(
            "Session started: {} ({})",
            self.spec.title,
            self.spec.program.display()
        );

        self.state = SessionState::Running(Running {
            master: pair.master,
            writer,
            child,
            alive,
        });

        Ok(())
    }

    /// Reader task: blocking pty reads off the render thread. Bytes are
    /// posted to the event channel; decoding happens on the render thread.
    /// Posts `Closed` exactly once, on EOF or read error, unless the
    /// session was torn down first.
    fn spawn_reader(&self, mut reader: Box<dyn Read + Send>, alive: Arc<AtomicBool>) {
        let events = self.events.clone();
        let region_id = self.region_id;

        tokio::task::spawn_blocking(move || {
            let mut buf = [0u8; READ_BUFFER_SIZE];
            loop {
                match reader.read(&mut buf) {
                    Ok(0) | Err(_) => break,
                    Ok(n) => {
                        if !alive.load(Ordering::Relaxed) {
                            return;
                        }
                        if events
                            .send(SessionEvent::Output {
                                region_id,
                                bytes: buf[..n].to_vec(),
                            })
                            .is_err()
                        {
                            return;
                        }
                    }
                }
            }

            if alive.load(Ordering::Relaxed) {
                debug!("Session {} pty reached EOF", region_id);
                let _ = events.send(SessionEvent::Closed { region_id });
            }
        });
    }

    /// Decode a chunk of process output into the screen buffer. Called on
    /// the render thread only.
    pub fn handle_output(&mut self, bytes: &[u8]) {
        if matches!(self.state, SessionState::Closed) {
            return;
        }
        self.parser.advance(&mut self.screen, bytes);
    }

    /// Forward raw keyboard input to the process. No interpretation, no
    /// waiting; a no-op once closed.
    pub fn deliver_input(&mut self, bytes: &[u8]) {
        if let SessionState::Running(ref mut running) = self.state {
            if running.writer.write_all(bytes).and_then(|()| running.writer.flush()).is_err() {
                // The process side is gone; the reader task will notice
                // EOF and post the close event.
                debug!("Session {} input dropped, pty closed", self.region_id);
            }
        }
    }

    /// Propagate a geometry change to the pty and the screen buffer.
    /// Idempotent and cheap, safe to call on every render pass.
    pub fn resize(&mut self, cols: u16, rows: u16) {
        if matches!(self.state, SessionState::Closed) {
            return;
        }
        if cols == self.cols && rows == self.rows {
            return;
        }

        self.cols = cols;
        self.rows = rows;
        self.screen.resize(cols, rows);

        if let SessionState::Running(ref running) = self.state {
            if let Err(e) = running.master.resize(PtySize {
                rows,
                cols,
                pixel_width: 0,
                pixel_height: 0,
            }) {
                warn!("Failed to resize pty for {}: {}", self.spec.title, e);
            }
        }
    }

    /// Tear the session down: stop the reader task from posting, kill and
    /// reap the child, release the pty. Transition to `Closed` happens
    /// exactly once.
    pub fn close(&mut self) {
        if let SessionState::Running(mut running) =
            std::mem::replace(&mut self.state, SessionState::Closed)
        {
            running.alive.store(false, Ordering::Relaxed);
            if let Err(e) = running.child.kill() {
                debug!("Session {} child already gone: {}", self.region_id, e);
            }
            let _ = running.child.wait();
            info!("Session closed: {}", self.spec.title);
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_missing_executable() {
        let err = SpawnSpec::resolve("definitely-not-a-real-binary-42", vec![], "nope")
            .expect_err("lookup should fail");
        assert!(matches!(err, SpawnError::ExecutableNotFound { .. }));
    }

    #[test]
    fn test_unstarted_session_ignores_input_and_resize() {
        let spec = SpawnSpec {
            program: PathBuf::from("/bin/sh"),
            args: vec![],
            title: "shell".to_string(),
        };
        let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
        let mut session = Session::new(spec, 0, 80, 24, tx);

        assert!(!session.running());
        // Neither of these may start the process or panic
        session.deliver_input(b"ls\r");
        session.resize(100, 40);
        assert!(!session.running());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_reader_posts_closed_exactly_once() {
        use tokio::time::{timeout, Duration};

        let spec = SpawnSpec::resolve("sh", vec!["-c".to_string(), "exit 0".to_string()], "shell")
            .expect("sh is on the search path");
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let mut session = Session::new(spec, 7, 80, 24, tx);
        session.ensure_started().expect("spawn sh");

        // Drain any startup output; the close notice must carry our region id
        let closed_region = loop {
            match timeout(Duration::from_secs(10), rx.recv())
                .await
                .expect("session should reach EOF")
            {
                Some(SessionEvent::Output { region_id, .. }) => assert_eq!(region_id, 7),
                Some(SessionEvent::Closed { region_id }) => break region_id,
                None => panic!("event channel dropped before the close notice"),
            }
        };
        assert_eq!(closed_region, 7);

        // The reader task has exited; nothing further may arrive
        assert!(timeout(Duration::from_millis(300), rx.recv()).await.is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_close_stops_reader_from_posting() {
        use tokio::time::{timeout, Duration};

        let spec = SpawnSpec::resolve("cat", vec![], "cat").expect("cat is on the search path");
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let mut session = Session::new(spec, 3, 80, 24, tx);
        session.ensure_started().expect("spawn cat");

        session.close();
        assert!(!session.running());

        // Teardown kills the child and clears the alive flag before the
        // reader observes EOF, so no close notice may follow
        while let Ok(event) = timeout(Duration::from_millis(500), rx.recv()).await {
            match event {
                Some(SessionEvent::Closed { .. }) => panic!("close notice after teardown"),
                Some(SessionEvent::Output { .. }) => {}
                None => break,
            }
        }
    }

    #[test]
    fn test_output_decodes_into_screen() {
        let spec = SpawnSpec {
            program: PathBuf::from("/bin/sh"),
            args: vec![],
            title: "shell".to_string(),
        };
        let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
        let mut session = Session::new(spec, 0, 20, 4, tx);

        session.handle_output(b"$ uptime\r\n 12:00  up 3 days");
        assert_eq!(session.screen().row_text(0), "$ uptime");
    }
}
