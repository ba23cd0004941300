//! Full scan run: auto-setup when no configuration exists, then the
//! tool's batch scan with structured issue parsing.

use crate::{run_guided_setup, write_config, SetupOptions, CONFIG_FILE_NAME};
use periscan_types::{BuildError, ScanIssue, ScanOutcome};
use serde_json::Value;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Whole-scan ceiling; the scan builds the project, which can take a
/// long time on first run.
pub const SCAN_TIMEOUT: Duration = Duration::from_secs(1800);

const SUMMARY_LIMIT: usize = 250;
const LOG_TAIL_LIMIT: usize = 200;

/// Options for a scan run.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    pub project_dir: PathBuf,
    pub periphery_path: PathBuf,
    pub xcodebuild_path: PathBuf,
    pub extra_args: Vec<String>,
}

impl ScanOptions {
    pub fn new(project_dir: impl Into<PathBuf>) -> Self {
        Self {
            project_dir: project_dir.into(),
            periphery_path: PathBuf::from("periphery"),
            xcodebuild_path: PathBuf::from("xcodebuild"),
            extra_args: Vec::new(),
        }
    }
}

/// Run a scan, setting up a configuration first when none exists.
pub async fn run_scan(opts: ScanOptions) -> ScanOutcome {
    if !opts.project_dir.is_dir() {
        return ScanOutcome::failure(BuildError {
            summary: format!("Project path does not exist: {}", opts.project_dir.display()),
            log_tail: Vec::new(),
            exit_code: -1,
        });
    }

    let config_file = opts.project_dir.join(CONFIG_FILE_NAME);
    if !config_file.exists() {
        info!(target: "periscan::scan", "No configuration in {:?}, running guided setup", opts.project_dir);
        let setup_opts = SetupOptions {
            periphery_path: opts.periphery_path.clone(),
            xcodebuild_path: opts.xcodebuild_path.clone(),
            ..SetupOptions::new(&opts.project_dir)
        };
        let setup = run_guided_setup(setup_opts).await;
        if !setup.success {
            return ScanOutcome::failure(BuildError {
                summary: "Periphery setup failed - this usually means the project doesn't build"
                    .to_string(),
                log_tail: setup.log_tail,
                exit_code: -1,
            });
        }
        if let Some(yml) = &setup.yml {
            if let Err(e) = write_config(&opts.project_dir, yml) {
                warn!(target: "periscan::scan", "Could not write config file: {}", e);
            }
        }
    } else {
        debug!(target: "periscan::scan", "Using existing configuration in {:?}", opts.project_dir);
    }

    let mut cmd = tokio::process::Command::new(&opts.periphery_path);
    cmd.args(["scan", "--format", "json"]);
    cmd.args(&opts.extra_args);
    cmd.current_dir(&opts.project_dir);
    cmd.kill_on_drop(true);

    info!(target: "periscan::scan", "Running scan in {:?}", opts.project_dir);
    let output = match tokio::time::timeout(SCAN_TIMEOUT, cmd.output()).await {
        Ok(Ok(output)) => output,
        Ok(Err(e)) => {
            return ScanOutcome::failure(BuildError {
                summary: format!("Failed to run scan: {}", e),
                log_tail: Vec::new(),
                exit_code: -1,
            });
        }
        Err(_) => {
            warn!(target: "periscan::scan", "Scan timed out in {:?}", opts.project_dir);
            return ScanOutcome::failure(BuildError {
                summary: "Scan timed out after 30 minutes".to_string(),
                log_tail: vec!["Error: Periphery scan timed out".to_string()],
                exit_code: -1,
            });
        }
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let summary = stderr
            .lines()
            .find(|l| !l.trim().is_empty())
            .unwrap_or("scan failed");
        return ScanOutcome::failure(BuildError {
            summary: truncate_summary(summary),
            log_tail: tail_lines(&stderr),
            exit_code: output.status.code().unwrap_or(-1),
        });
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let data: Value = match serde_json::from_str(&stdout) {
        Ok(data) => data,
        Err(e) => {
            return ScanOutcome::failure(BuildError {
                summary: "Failed to parse Periphery output".to_string(),
                log_tail: vec![format!("JSON decode error: {}", e)],
                exit_code: -1,
            });
        }
    };

    let issues = parse_issues(&data);
    info!(target: "periscan::scan", "Scan found {} issues", issues.len());
    ScanOutcome {
        build_ok: true,
        issues,
        raw_json: Some(data),
        build_error: None,
    }
}

/// Extract issues from the tool's JSON output. The tool has emitted a
/// bare list, a `{"results": [...]}` object, and a bare object over
/// its versions; accept all three.
fn parse_issues(data: &Value) -> Vec<ScanIssue> {
    let results: Vec<&Value> = match data {
        Value::Array(items) => items.iter().collect(),
        Value::Object(map) => match map.get("results") {
            Some(Value::Array(items)) => items.iter().collect(),
            _ => vec![data],
        },
        _ => Vec::new(),
    };

    results.into_iter().filter_map(issue_from_value).collect()
}

fn issue_from_value(value: &Value) -> Option<ScanIssue> {
    let kind = value.get("kind")?.as_str()?;
    let name = value.get("name")?.as_str()?;
    let location = value.get("location")?.as_str()?;
    let (file, line) = split_location(location);
    Some(ScanIssue {
        kind: kind.to_string(),
        identifier: name.to_string(),
        file,
        line,
    })
}

/// Split a `file:line:column` location; unparseable locations keep the
/// full string and line 1.
fn split_location(location: &str) -> (String, u32) {
    let mut parts: Vec<&str> = location.rsplitn(3, ':').collect();
    parts.reverse();
    let line = parts.get(1).and_then(|l| l.parse().ok()).unwrap_or(1);
    (parts[0].to_string(), line)
}

fn truncate_summary(summary: &str) -> String {
    summary.chars().take(SUMMARY_LIMIT).collect()
}

/// Last `LOG_TAIL_LIMIT` lines of a command's output.
pub(crate) fn tail_lines(text: &str) -> Vec<String> {
    let lines: Vec<String> = text.lines().map(|l| l.to_string()).collect();
    let skip = lines.len().saturating_sub(LOG_TAIL_LIMIT);
    lines.into_iter().skip(skip).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn issues_parse_from_a_bare_list() {
        let data = json!([
            {"kind": "class", "name": "Unused", "location": "/src/Unused.swift:39:18"},
            {"kind": "function", "name": "dead()", "location": "/src/Dead.swift:7:1"}
        ]);
        let issues = parse_issues(&data);
        assert_eq!(issues.len(), 2);
        assert_eq!(issues[0].identifier, "Unused");
        assert_eq!(issues[0].file, "/src/Unused.swift");
        assert_eq!(issues[0].line, 39);
    }

    #[test]
    fn issues_parse_from_a_results_object() {
        let data = json!({"results": [
            {"kind": "var", "name": "x", "location": "/src/A.swift:2:5"}
        ]});
        assert_eq!(parse_issues(&data).len(), 1);
    }

    #[test]
    fn entries_missing_keys_are_skipped() {
        let data = json!([
            {"kind": "class", "name": "NoLocation"},
            {"kind": "class", "name": "Ok", "location": "/src/Ok.swift:1:1"}
        ]);
        let issues = parse_issues(&data);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].identifier, "Ok");
    }

    #[test]
    fn locations_without_column_still_split() {
        assert_eq!(split_location("/src/A.swift:12"), ("/src/A.swift".to_string(), 12));
        assert_eq!(split_location("/src/A.swift:12:3"), ("/src/A.swift".to_string(), 12));
        assert_eq!(split_location("no-line-info"), ("no-line-info".to_string(), 1));
    }

    #[test]
    fn tail_is_bounded_to_the_most_recent_lines() {
        let text = (0..250).map(|i| format!("line {}", i)).collect::<Vec<_>>().join("\n");
        let tail = tail_lines(&text);
        assert_eq!(tail.len(), 200);
        assert_eq!(tail[0], "line 50");
        assert_eq!(tail[199], "line 249");
    }

    #[tokio::test]
    async fn missing_project_dir_is_an_in_band_error() {
        let outcome = run_scan(ScanOptions::new("/definitely/not/a/dir")).await;
        assert!(!outcome.build_ok);
        let err = outcome.build_error.unwrap();
        assert!(err.summary.contains("does not exist"));
    }
}
