//! ShellSessionManager: pty-backed interactive shells, one per session id.
//!
//! Each session owns a pseudo-terminal master, its writer, and the child
//! process.  A monitor thread (`rcs-shell-<id>`) reads the master and appends
//! every chunk to the session's FIFO, which `poll` drains.  When the process
//! exits the read hits end-of-stream, the monitor removes the session and
//! emits [`EngineEvent::ShellClosed`].
//!
//! Monitors are never joined: a blocked pty read only returns once the pty
//! is closed.  Every session carries a serial number so that a late monitor
//! can never remove a newer session registered under the same id.

use std::collections::{HashMap, VecDeque};
use std::io::{Read, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::thread;

use portable_pty::{native_pty_system, Child, CommandBuilder, MasterPty, PtySize};
use rcs_core::{EngineError, EngineEvent, EngineResult};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::lock;
use super::platform::emit_event;

const READ_BUFFER: usize = 4096;

/// Which shell to launch and where.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShellSettings {
    /// Program to run; the platform default shell when `None`.
    pub program: Option<String>,
    pub args: Vec<String>,
    /// Initial working directory; inherited when `None`.
    pub working_dir: Option<PathBuf>,
}

impl ShellSettings {
    /// The configured program, or `$SHELL` / `/bin/sh` on Unix and
    /// `%COMSPEC%` / `cmd.exe` on Windows.
    pub fn program(&self) -> String {
        if let Some(program) = &self.program {
            return program.clone();
        }
        #[cfg(windows)]
        {
            std::env::var("COMSPEC").unwrap_or_else(|_| "cmd.exe".to_string())
        }
        #[cfg(not(windows))]
        {
            std::env::var("SHELL").unwrap_or_else(|_| "/bin/sh".to_string())
        }
    }
}

type OutputQueue = Arc<Mutex<VecDeque<Vec<u8>>>>;

struct ShellSession {
    serial: u64,
    master: Box<dyn MasterPty + Send>,
    writer: Box<dyn Write + Send>,
    child: Box<dyn Child + Send + Sync>,
    dimensions: (u16, u16),
    output: OutputQueue,
}

impl ShellSession {
    /// Kills the process.  The pty closes when the session is dropped.
    fn terminate(&mut self, id: &str) {
        if let Err(e) = self.child.kill() {
            debug!(session_id = id, "kill failed (process likely exited): {e}");
        }
        match self.child.try_wait() {
            Ok(Some(status)) => debug!(session_id = id, ?status, "shell reaped"),
            Ok(None) => debug!(session_id = id, "shell not yet reaped"),
            Err(e) => debug!(session_id = id, "try_wait failed: {e}"),
        }
    }
}

struct Inner {
    settings: ShellSettings,
    sessions: Mutex<HashMap<String, ShellSession>>,
    next_serial: AtomicU64,
    events: mpsc::Sender<EngineEvent>,
}

impl Inner {
    /// Removes `id` if it is still the session numbered `serial`.
    fn remove_if_current(&self, id: &str, serial: u64) -> bool {
        let removed = {
            let mut sessions = lock(&self.sessions);
            match sessions.get(id) {
                Some(session) if session.serial == serial => sessions.remove(id),
                _ => None,
            }
        };
        match removed {
            Some(mut session) => {
                session.terminate(id);
                true
            }
            None => false,
        }
    }
}

/// The shell session use case.
pub struct ShellSessionManager {
    inner: Arc<Inner>,
}

impl ShellSessionManager {
    pub fn new(settings: ShellSettings, events: mpsc::Sender<EngineEvent>) -> Self {
        Self {
            inner: Arc::new(Inner {
                settings,
                sessions: Mutex::new(HashMap::new()),
                next_serial: AtomicU64::new(1),
                events,
            }),
        }
    }

    /// Spawns the configured shell on a new `cols` x `rows` pty.
    ///
    /// # Errors
    ///
    /// - [`EngineError::PreconditionViolation`] for zero dimensions or an id
    ///   that is already in use.
    /// - [`EngineError::DeviceUnavailable`] if the pty or process cannot be
    ///   created.  Nothing is registered in that case.
    pub fn create_session(&self, id: &str, cols: u16, rows: u16) -> EngineResult<()> {
        validate_dimensions(cols, rows)?;
        if lock(&self.inner.sessions).contains_key(id) {
            return Err(EngineError::PreconditionViolation(format!(
                "shell session {id} already exists"
            )));
        }

        let program = self.inner.settings.program();
        let pair = native_pty_system()
            .openpty(pty_size(cols, rows))
            .map_err(|e| EngineError::DeviceUnavailable(format!("open pty: {e}")))?;

        let mut cmd = CommandBuilder::new(&program);
        cmd.args(&self.inner.settings.args);
        cmd.env("TERM", "xterm-256color");
        if let Some(dir) = &self.inner.settings.working_dir {
            cmd.cwd(dir);
        }

        let mut child = pair
            .slave
            .spawn_command(cmd)
            .map_err(|e| EngineError::DeviceUnavailable(format!("spawn {program}: {e}")))?;
        drop(pair.slave);

        let master = pair.master;
        let io = master
            .try_clone_reader()
            .and_then(|reader| master.take_writer().map(|writer| (reader, writer)));
        let (reader, writer) = match io {
            Ok(io) => io,
            Err(e) => {
                let _ = child.kill();
                return Err(EngineError::DeviceUnavailable(format!("pty handles: {e}")));
            }
        };

        let serial = self.inner.next_serial.fetch_add(1, Ordering::Relaxed);
        let output: OutputQueue = Arc::new(Mutex::new(VecDeque::new()));

        // Registered before the monitor starts, so an immediate exit still
        // finds (and removes) its own entry.
        let mut sessions = lock(&self.inner.sessions);
        if sessions.contains_key(id) {
            let _ = child.kill();
            return Err(EngineError::PreconditionViolation(format!(
                "shell session {id} already exists"
            )));
        }
        sessions.insert(
            id.to_string(),
            ShellSession {
                serial,
                master,
                writer,
                child,
                dimensions: (cols, rows),
                output: Arc::clone(&output),
            },
        );

        let monitor = OutputMonitor {
            id: id.to_string(),
            serial,
            output,
            inner: Arc::downgrade(&self.inner),
        };
        let short: String = id.chars().take(8).collect();
        let spawned = thread::Builder::new()
            .name(format!("rcs-shell-{short}"))
            .spawn(move || monitor.run(reader));
        if let Err(e) = spawned {
            if let Some(mut session) = sessions.remove(id) {
                session.terminate(id);
            }
            return Err(EngineError::TransientIo(format!("spawn shell monitor: {e}")));
        }

        info!(session_id = id, %program, cols, rows, "shell session created");
        Ok(())
    }

    /// Forwards raw bytes to the shell's stdin.
    pub fn write(&self, id: &str, data: &[u8]) -> EngineResult<()> {
        let mut sessions = lock(&self.inner.sessions);
        let session = sessions
            .get_mut(id)
            .ok_or_else(|| unknown_session(id))?;
        session
            .writer
            .write_all(data)
            .and_then(|()| session.writer.flush())
            .map_err(|e| EngineError::TransientIo(format!("shell write: {e}")))
    }

    /// Drains everything the shell has produced since the previous poll.
    ///
    /// Returns `None` when no output is buffered.
    pub fn poll(&self, id: &str) -> EngineResult<Option<Vec<u8>>> {
        let output = {
            let sessions = lock(&self.inner.sessions);
            let session = sessions.get(id).ok_or_else(|| unknown_session(id))?;
            Arc::clone(&session.output)
        };
        let chunks: Vec<Vec<u8>> = lock(&output).drain(..).collect();
        if chunks.is_empty() {
            Ok(None)
        } else {
            Ok(Some(chunks.concat()))
        }
    }

    /// Resizes the pty.  An unknown id is ignored whatever the dimensions;
    /// zero dimensions for a live session are a precondition violation.
    pub fn resize(&self, id: &str, cols: u16, rows: u16) -> EngineResult<()> {
        let mut sessions = lock(&self.inner.sessions);
        let Some(session) = sessions.get_mut(id) else {
            debug!(session_id = id, "resize for unknown shell ignored");
            return Ok(());
        };
        validate_dimensions(cols, rows)?;
        session
            .master
            .resize(pty_size(cols, rows))
            .map_err(|e| EngineError::TransientIo(format!("pty resize: {e}")))?;
        session.dimensions = (cols, rows);
        debug!(session_id = id, cols, rows, "shell resized");
        Ok(())
    }

    /// Kills the shell and forgets the session.  Unknown ids are ignored.
    pub fn cleanup(&self, id: &str) {
        let removed = lock(&self.inner.sessions).remove(id);
        if let Some(mut session) = removed {
            session.terminate(id);
            info!(session_id = id, "shell session cleaned up");
        }
    }

    pub fn cleanup_all(&self) {
        let drained: Vec<(String, ShellSession)> =
            lock(&self.inner.sessions).drain().collect();
        for (id, mut session) in drained {
            session.terminate(&id);
            info!(session_id = %id, "shell session cleaned up");
        }
    }

    pub fn session_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = lock(&self.inner.sessions).keys().cloned().collect();
        ids.sort();
        ids
    }

    /// `(cols, rows)` of a live session.
    pub fn dimensions(&self, id: &str) -> Option<(u16, u16)> {
        lock(&self.inner.sessions).get(id).map(|s| s.dimensions)
    }
}

impl Drop for ShellSessionManager {
    fn drop(&mut self) {
        self.cleanup_all();
    }
}

struct OutputMonitor {
    id: String,
    serial: u64,
    output: OutputQueue,
    inner: Weak<Inner>,
}

impl OutputMonitor {
    fn run(self, mut reader: Box<dyn Read + Send>) {
        let mut buf = [0u8; READ_BUFFER];
        let reason = loop {
            match reader.read(&mut buf) {
                Ok(0) => break "end of stream".to_string(),
                Ok(n) => lock(&self.output).push_back(buf[..n].to_vec()),
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
                Err(e) => break format!("read error: {e}"),
            }
        };

        let Some(inner) = self.inner.upgrade() else {
            return;
        };
        if inner.remove_if_current(&self.id, self.serial) {
            info!(session_id = %self.id, %reason, "shell exited");
            emit_event(
                &inner.events,
                EngineEvent::ShellClosed {
                    session_id: self.id.clone(),
                },
            );
        } else {
            debug!(session_id = %self.id, %reason, "shell monitor exited after cleanup");
        }
    }
}

fn pty_size(cols: u16, rows: u16) -> PtySize {
    PtySize {
        rows,
        cols,
        pixel_width: 0,
        pixel_height: 0,
    }
}

fn validate_dimensions(cols: u16, rows: u16) -> EngineResult<()> {
    if cols == 0 || rows == 0 {
        warn!(cols, rows, "rejected shell dimensions");
        return Err(EngineError::PreconditionViolation(format!(
            "shell dimensions must be non-zero, got {cols}x{rows}"
        )));
    }
    Ok(())
}

fn unknown_session(id: &str) -> EngineError {
    EngineError::InvalidSession(format!("no shell session {id}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> ShellSessionManager {
        let (tx, _rx) = mpsc::channel(4);
        ShellSessionManager::new(ShellSettings::default(), tx)
    }

    #[test]
    fn test_zero_dimensions_are_rejected_without_registering() {
        let shells = manager();

        let err = shells.create_session("s1", 0, 24).unwrap_err();

        assert!(matches!(err, EngineError::PreconditionViolation(_)));
        assert!(shells.session_ids().is_empty());
    }

    #[test]
    fn test_write_and_poll_unknown_session_are_invalid() {
        let shells = manager();

        assert!(matches!(
            shells.write("missing", b"ls\n").unwrap_err(),
            EngineError::InvalidSession(_)
        ));
        assert!(matches!(
            shells.poll("missing").unwrap_err(),
            EngineError::InvalidSession(_)
        ));
    }

    #[test]
    fn test_resize_and_cleanup_of_unknown_session_are_no_ops() {
        let shells = manager();

        shells.resize("missing", 80, 24).unwrap();
        shells.resize("missing", 0, 0).unwrap();
        shells.cleanup("missing");
        shells.cleanup("missing");

        assert_eq!(shells.dimensions("missing"), None);
    }

    #[test]
    fn test_configured_program_wins_over_environment() {
        let settings = ShellSettings {
            program: Some("/usr/bin/zsh".into()),
            ..ShellSettings::default()
        };
        assert_eq!(settings.program(), "/usr/bin/zsh");
    }
}
