//! Pseudo-terminal process driver.
//!
//! Spawns a child on a pty so that it behaves as if driven from an
//! interactive terminal, and exposes its output as a sequence of lines
//! with a per-read timeout. Prompts are written by the child without a
//! line terminator and then block; the driver surfaces such a pending
//! partial buffer as a line once it has stayed quiet briefly, so the
//! caller can classify and answer it.

use crate::{PeriscanError, Result};
use once_cell::sync::Lazy;
use portable_pty::{native_pty_system, Child as PtyChild, CommandBuilder, MasterPty, PtySize};
use regex::Regex;
use std::collections::VecDeque;
use std::io::{Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

/// How long a non-empty partial line must stay quiet before it is
/// surfaced as a line. Prompts flush without a terminator and then
/// block, so a short grace period is enough to tell them apart from a
/// line still being written.
const PARTIAL_QUIET_PERIOD: Duration = Duration::from_millis(200);

/// One read event from the child's output stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineEvent {
    /// A complete output line (or a quiesced partial, e.g. a prompt).
    Line(String),
    /// Nothing arrived within the timeout.
    Timeout,
    /// The child closed its side of the pty.
    Eof,
}

/// A child process attached to a pseudo-terminal.
///
/// The handle is closed exactly once regardless of which path
/// terminates the session: `close` is idempotent and also runs from
/// `Drop`.
pub struct PtyProcess {
    child: Box<dyn PtyChild + Send + Sync>,
    master: Option<Box<dyn MasterPty + Send>>,
    writer: Option<Box<dyn Write + Send>>,
    chunks: Receiver<Vec<u8>>,
    reader: Option<std::thread::JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
    pending: VecDeque<String>,
    partial: String,
    exit_code: Option<i32>,
    closed: bool,
}

impl PtyProcess {
    /// Spawn `cmd` attached to a fresh pty.
    pub fn spawn(cmd: CommandBuilder) -> Result<Self> {
        let pty_system = native_pty_system();

        // Wide enough that the tool's prompts do not wrap mid-line.
        let pair = pty_system
            .openpty(PtySize {
                rows: 50,
                cols: 200,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(|e| PeriscanError::Pty(e.to_string()))?;

        let child = pair
            .slave
            .spawn_command(cmd)
            .map_err(|e| PeriscanError::SpawnFailed(e.to_string()))?;

        let mut reader = pair
            .master
            .try_clone_reader()
            .map_err(|e| PeriscanError::Pty(e.to_string()))?;

        let writer = pair
            .master
            .take_writer()
            .map_err(|e| PeriscanError::Pty(e.to_string()))?;

        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_for_thread = shutdown.clone();
        let (tx, rx) = mpsc::channel::<Vec<u8>>();

        // PTY reads are blocking; a dedicated thread drains the master
        // into a channel so read_line can time out. Dropping the master
        // unblocks the read and ends the thread.
        let handle = std::thread::spawn(move || {
            let mut buf = [0u8; 4096];
            loop {
                if shutdown_for_thread.load(Ordering::SeqCst) {
                    break;
                }
                match reader.read(&mut buf) {
                    Ok(0) => break,
                    Ok(n) => {
                        if tx.send(buf[..n].to_vec()).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        if !shutdown_for_thread.load(Ordering::SeqCst) {
                            trace!(target: "periscan::pty", "PTY read ended: {}", e);
                        }
                        break;
                    }
                }
            }
        });

        Ok(Self {
            child,
            master: Some(pair.master),
            writer: Some(writer),
            chunks: rx,
            reader: Some(handle),
            shutdown,
            pending: VecDeque::new(),
            partial: String::new(),
            exit_code: None,
            closed: false,
        })
    }

    /// Read the next output line, waiting at most `timeout`.
    pub fn read_line(&mut self, timeout: Duration) -> LineEvent {
        if let Some(line) = self.pending.pop_front() {
            return LineEvent::Line(line);
        }

        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let wait = if self.partial.is_empty() {
                remaining
            } else {
                remaining.min(PARTIAL_QUIET_PERIOD)
            };

            match self.chunks.recv_timeout(wait) {
                Ok(chunk) => {
                    self.absorb(&chunk);
                    if let Some(line) = self.pending.pop_front() {
                        return LineEvent::Line(line);
                    }
                }
                Err(RecvTimeoutError::Timeout) => {
                    if !self.partial.is_empty() {
                        return LineEvent::Line(self.take_partial());
                    }
                    if Instant::now() >= deadline {
                        return LineEvent::Timeout;
                    }
                }
                Err(RecvTimeoutError::Disconnected) => {
                    if !self.partial.is_empty() {
                        return LineEvent::Line(self.take_partial());
                    }
                    return LineEvent::Eof;
                }
            }
        }
    }

    /// Send `text` followed by a carriage return to the child's input.
    pub fn write_line(&mut self, text: &str) -> Result<()> {
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| PeriscanError::WriteFailed("process already closed".to_string()))?;
        writer
            .write_all(text.as_bytes())
            .and_then(|_| writer.write_all(b"\r"))
            .and_then(|_| writer.flush())
            .map_err(|e| PeriscanError::WriteFailed(e.to_string()))
    }

    /// Exit code of the child. Blocks until the child exits, so only
    /// call after observing `Eof`.
    pub fn wait_exit(&mut self) -> Option<i32> {
        if self.exit_code.is_none() {
            match self.child.wait() {
                Ok(status) => self.exit_code = Some(status.exit_code() as i32),
                Err(e) => warn!(target: "periscan::pty", "Failed to reap child: {}", e),
            }
        }
        self.exit_code
    }

    /// Release the pty, the reader thread, and the child. Idempotent;
    /// callable from any exit path and again from `Drop`.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.shutdown.store(true, Ordering::SeqCst);

        // Dropping writer and master unblocks the reader thread.
        self.writer.take();
        self.master.take();

        if self.exit_code.is_none() {
            match self.child.try_wait() {
                Ok(Some(status)) => self.exit_code = Some(status.exit_code() as i32),
                _ => {
                    // The tool spawns build children of its own; kill
                    // the whole group, then reap.
                    #[cfg(unix)]
                    if let Some(pid) = self.child.process_id() {
                        debug!(target: "periscan::pty", "Killing process group {}", pid);
                        unsafe {
                            libc::kill(-(pid as i32), libc::SIGKILL);
                        }
                    }
                    let _ = self.child.kill();
                    if let Ok(status) = self.child.wait() {
                        self.exit_code = Some(status.exit_code() as i32);
                    }
                }
            }
        }

        if let Some(handle) = self.reader.take() {
            if handle.join().is_err() {
                warn!(target: "periscan::pty", "PTY reader thread panicked");
            }
        }
    }

    fn absorb(&mut self, chunk: &[u8]) {
        let text = String::from_utf8_lossy(chunk);
        // Normalize terminal line endings so both \r\n and bare \r
        // progress updates split into lines.
        let text = text.replace("\r\n", "\n").replace('\r', "\n");
        self.partial.push_str(&text);

        while let Some(idx) = self.partial.find('\n') {
            let rest = self.partial.split_off(idx + 1);
            let mut line = std::mem::replace(&mut self.partial, rest);
            line.truncate(line.len() - 1);
            self.pending.push_back(strip_ansi_codes(&line));
        }
    }

    fn take_partial(&mut self) -> String {
        strip_ansi_codes(&std::mem::take(&mut self.partial))
    }
}

impl Drop for PtyProcess {
    fn drop(&mut self) {
        self.close();
    }
}

/// Strip ANSI escape codes from text.
fn strip_ansi_codes(text: &str) -> String {
    static ANSI_RE: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r"\x1b\[[0-9;]*[a-zA-Z]|\x1b\]8;;[^\x07]*\x07|\x1b\]8;;\x07")
            .expect("Invalid ANSI regex")
    });

    ANSI_RE.replace_all(text, "").to_string()
}
