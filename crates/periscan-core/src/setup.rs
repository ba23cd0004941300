//! Guided-setup session: drives the tool's interactive setup through
//! the pty driver, answers its prompts, and captures the configuration
//! document it emits.

use crate::{
    classify, discover_project, discover_scheme, synthesize, LineEvent, LineKind, PeriscanError,
    ProjectKind, PtyProcess, Result,
};
use periscan_types::SetupOutcome;
use portable_pty::CommandBuilder;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, trace, warn};
use uuid::Uuid;

/// Name of the configuration file the tool accepts on subsequent runs.
pub const CONFIG_FILE_NAME: &str = ".periphery.yml";

/// Line that signals the start of the emitted configuration document
/// within the tool's mixed log/output stream. The sentinel itself is
/// not part of the document.
pub const CONFIG_SENTINEL: &str = "---";

/// At most this many log lines are kept and returned to the caller.
const LOG_TAIL_LIMIT: usize = 200;

const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(10);

/// Whole-session ceiling; the per-line read timeout only bounds a
/// single read, not a child that keeps chattering forever.
const DEFAULT_SETUP_TIMEOUT: Duration = Duration::from_secs(600);

/// Bounded tail of the most recent output lines, oldest first.
#[derive(Debug)]
pub struct LogTail {
    lines: VecDeque<String>,
    limit: usize,
}

impl LogTail {
    pub fn new() -> Self {
        Self::with_limit(LOG_TAIL_LIMIT)
    }

    pub fn with_limit(limit: usize) -> Self {
        Self {
            lines: VecDeque::new(),
            limit,
        }
    }

    /// Append a line, evicting the oldest once over the limit.
    pub fn push(&mut self, line: impl Into<String>) {
        if self.lines.len() == self.limit {
            self.lines.pop_front();
        }
        self.lines.push_back(line.into());
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn into_lines(self) -> Vec<String> {
        self.lines.into()
    }
}

impl Default for LogTail {
    fn default() -> Self {
        Self::new()
    }
}

/// Options for a guided-setup run.
#[derive(Debug, Clone)]
pub struct SetupOptions {
    pub project_dir: PathBuf,
    pub periphery_path: PathBuf,
    pub xcodebuild_path: PathBuf,
    /// Scheme the discovery phase settled on; offered-option prompts
    /// are answered with its index when it matches.
    pub preferred_scheme: Option<String>,
    pub read_timeout: Duration,
    pub overall_timeout: Duration,
    /// External cancellation (operator abort, server shutdown). The
    /// loop observes it between reads and force-closes the process.
    pub cancel: Arc<AtomicBool>,
}

impl SetupOptions {
    pub fn new(project_dir: impl Into<PathBuf>) -> Self {
        Self {
            project_dir: project_dir.into(),
            periphery_path: PathBuf::from("periphery"),
            xcodebuild_path: PathBuf::from("xcodebuild"),
            preferred_scheme: None,
            read_timeout: DEFAULT_READ_TIMEOUT,
            overall_timeout: DEFAULT_SETUP_TIMEOUT,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }
}

enum SessionState {
    Streaming,
    Draining,
}

/// One automation run over the tool's guided setup.
pub struct SetupSession {
    session_id: Uuid,
    opts: SetupOptions,
    log: LogTail,
    config_lines: Vec<String>,
    capturing: bool,
}

impl SetupSession {
    pub fn new(opts: SetupOptions) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            opts,
            log: LogTail::new(),
            config_lines: Vec::new(),
            capturing: false,
        }
    }

    /// Run the session to completion. The process handle never
    /// outlives this call, whichever path terminates the loop.
    pub fn run(mut self) -> SetupOutcome {
        info!(
            target: "periscan::setup",
            "Setup session {} starting in {:?}", self.session_id, self.opts.project_dir
        );

        if !self.opts.project_dir.is_dir() {
            let e = PeriscanError::InvalidProjectDir(self.opts.project_dir.clone());
            self.log.push(format!("spawn failed: {}", e));
            return SetupOutcome::failure(self.log.into_lines());
        }

        let mut cmd = CommandBuilder::new(&self.opts.periphery_path);
        cmd.args(["scan", "--setup"]);
        cmd.cwd(&self.opts.project_dir);

        let mut child = match PtyProcess::spawn(cmd) {
            Ok(child) => child,
            Err(e) => {
                error!(target: "periscan::setup", "Setup session {}: {}", self.session_id, e);
                self.log.push(format!("spawn failed: {}", e));
                return SetupOutcome::failure(self.log.into_lines());
            }
        };

        let outcome = self.stream(&mut child);
        child.close();
        outcome
    }

    fn stream(&mut self, child: &mut PtyProcess) -> SetupOutcome {
        let deadline = Instant::now() + self.opts.overall_timeout;
        let mut state = SessionState::Streaming;

        loop {
            match state {
                SessionState::Streaming => {
                    if self.opts.cancel.load(Ordering::SeqCst) {
                        info!(target: "periscan::setup", "Setup session {} cancelled", self.session_id);
                        self.log.push("Error: setup cancelled");
                        child.close();
                        return self.fail();
                    }
                    if Instant::now() >= deadline {
                        warn!(target: "periscan::setup", "Setup session {} timed out", self.session_id);
                        self.log.push(format!(
                            "Error: setup timed out after {} seconds",
                            self.opts.overall_timeout.as_secs()
                        ));
                        child.close();
                        return self.fail();
                    }

                    match child.read_line(self.opts.read_timeout) {
                        LineEvent::Line(line) => {
                            if !self.consume(&line, child) {
                                state = SessionState::Draining;
                            }
                        }
                        // A stalled read is not fatal; the overall
                        // deadline bounds the session.
                        LineEvent::Timeout => {}
                        LineEvent::Eof => state = SessionState::Draining,
                    }
                }
                SessionState::Draining => {
                    let exit = child.wait_exit();
                    let success = exit == Some(0) && !self.config_lines.is_empty();
                    info!(
                        target: "periscan::setup",
                        "Setup session {} finished: exit={:?} captured={} success={}",
                        self.session_id, exit, self.config_lines.len(), success
                    );
                    if success {
                        let log = std::mem::take(&mut self.log);
                        return SetupOutcome {
                            success: true,
                            yml: Some(self.config_lines.join("\n")),
                            log_tail: log.into_lines(),
                        };
                    }
                    return self.fail();
                }
            }
        }
    }

    /// Process one output line. Returns false when the child turned
    /// out to be gone while answering, in which case the caller drains.
    fn consume(&mut self, line: &str, child: &mut PtyProcess) -> bool {
        trace!(target: "periscan::setup", "Session {} line: {}", self.session_id, line);
        self.log.push(line);

        if self.capturing {
            // The document is emitted after the last prompt; keys like
            // `schemes:` must not be answered, or the echoed answer
            // would be captured into the document.
            self.config_lines.push(line.to_string());
            return true;
        }
        if line.trim() == CONFIG_SENTINEL {
            debug!(target: "periscan::setup", "Session {} configuration document started", self.session_id);
            self.capturing = true;
            return true;
        }

        if classify(line) == LineKind::Prompt {
            let response = synthesize(line, self.opts.preferred_scheme.as_deref());
            if let Err(e) = child.write_line(&response) {
                // Child already exited: the stream is effectively over.
                warn!(target: "periscan::setup", "Session {} answer not delivered: {}", self.session_id, e);
                return false;
            }
        }
        true
    }

    fn fail(&mut self) -> SetupOutcome {
        SetupOutcome::failure(std::mem::take(&mut self.log).into_lines())
    }
}

/// Full guided-setup operation: path validation, early return on an
/// existing configuration, project and scheme discovery, then the
/// interactive session on a blocking thread.
pub async fn run_guided_setup(opts: SetupOptions) -> SetupOutcome {
    let dir = opts.project_dir.clone();
    if !dir.is_dir() {
        return SetupOutcome::failure(vec![format!(
            "Error: Project path does not exist: {}",
            dir.display()
        )]);
    }

    let config_file = dir.join(CONFIG_FILE_NAME);
    if config_file.exists() {
        debug!(target: "periscan::setup", "Configuration file already exists in {:?}", dir);
        return match std::fs::read_to_string(&config_file) {
            Ok(yml) => SetupOutcome {
                success: true,
                yml: Some(yml),
                log_tail: vec!["Configuration file already exists".to_string()],
            },
            Err(e) => SetupOutcome::failure(vec![format!(
                "Error: failed to read existing configuration: {}",
                e
            )]),
        };
    }

    let descriptor = match discover_project(&dir) {
        Ok(descriptor) => descriptor,
        Err(e) => return SetupOutcome::failure(vec![format!("Error: {}", e)]),
    };

    let preferred_scheme = match descriptor.kind {
        ProjectKind::Package => None,
        _ => Some(discover_scheme(&opts.xcodebuild_path, &descriptor).await),
    };

    let opts = SetupOptions {
        preferred_scheme,
        ..opts
    };

    match tokio::task::spawn_blocking(move || SetupSession::new(opts).run()).await {
        Ok(outcome) => outcome,
        Err(e) => SetupOutcome::failure(vec![format!("Error: setup task failed: {}", e)]),
    }
}

/// Persist a captured configuration document to the project root.
/// The document must parse as YAML; a trailing newline is ensured.
pub fn write_config(project_dir: &Path, yml: &str) -> Result<()> {
    serde_yaml::from_str::<serde_yaml::Value>(yml)?;

    let path = project_dir.join(CONFIG_FILE_NAME);
    let mut contents = yml.to_string();
    if !contents.ends_with('\n') {
        contents.push('\n');
    }
    std::fs::write(&path, contents)?;
    info!(target: "periscan::setup", "Configuration written to {:?}", path);
    Ok(())
}
