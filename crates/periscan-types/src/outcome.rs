//! Outcome types returned by the automation engine.
//!
//! Every operation reports its result in-band as one of these values;
//! failures carry a bounded log tail instead of crossing the API
//! boundary as errors.

use serde::{Deserialize, Serialize};

/// Result of a guided-setup session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetupOutcome {
    /// Whether the tool exited cleanly and emitted a usable document.
    pub success: bool,
    /// The captured configuration document, newline-joined.
    /// Always `None` when `success` is false, even if some lines were
    /// captured before the failure.
    pub yml: Option<String>,
    /// The most recent output lines (at most 200, oldest first).
    pub log_tail: Vec<String>,
}

impl SetupOutcome {
    /// A failed outcome carrying the given log tail.
    pub fn failure(log_tail: Vec<String>) -> Self {
        Self {
            success: false,
            yml: None,
            log_tail,
        }
    }
}

/// Result of a project build attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildOutcome {
    pub build_ok: bool,
    /// Last lines of build output on failure (at most 200); empty on
    /// success.
    pub log_tail: Vec<String>,
}

/// Structured description of a failed scan or build step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildError {
    /// One-line summary, truncated to 250 characters.
    pub summary: String,
    /// Last lines of the failing command's output (at most 200).
    pub log_tail: Vec<String>,
    /// Exit code of the failing command, or -1 when it never ran to
    /// completion (timeout, spawn failure, unparseable output).
    pub exit_code: i32,
}

/// A single unused-code finding reported by the scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanIssue {
    /// Declaration kind (e.g. "class", "function").
    pub kind: String,
    /// Name of the unused declaration.
    pub identifier: String,
    /// Source file containing the declaration.
    pub file: String,
    /// 1-based line number.
    pub line: u32,
}

/// Result of a full scan run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanOutcome {
    pub build_ok: bool,
    pub issues: Vec<ScanIssue>,
    /// The tool's raw JSON output, when it parsed.
    pub raw_json: Option<serde_json::Value>,
    pub build_error: Option<BuildError>,
}

impl ScanOutcome {
    /// A failed outcome wrapping the given error description.
    pub fn failure(build_error: BuildError) -> Self {
        Self {
            build_ok: false,
            issues: Vec::new(),
            raw_json: None,
            build_error: Some(build_error),
        }
    }
}
