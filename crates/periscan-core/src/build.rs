//! Project build check via the external build tool.

use crate::discovery::{discover_project, ProjectKind};
use crate::scan::tail_lines;
use periscan_types::BuildOutcome;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

/// Whole-build ceiling.
pub const BUILD_TIMEOUT: Duration = Duration::from_secs(900);

/// Options for a build run.
#[derive(Debug, Clone)]
pub struct BuildOptions {
    pub project_dir: PathBuf,
    pub xcodebuild_path: PathBuf,
    /// Scheme to build; defaults to the descriptor's file stem.
    pub scheme: Option<String>,
}

impl BuildOptions {
    pub fn new(project_dir: impl Into<PathBuf>) -> Self {
        Self {
            project_dir: project_dir.into(),
            xcodebuild_path: PathBuf::from("xcodebuild"),
            scheme: None,
        }
    }
}

/// Try to build the project and report the result in-band.
pub async fn run_build(opts: BuildOptions) -> BuildOutcome {
    if !opts.project_dir.is_dir() {
        return BuildOutcome {
            build_ok: false,
            log_tail: vec![format!(
                "Error: Project path does not exist: {}",
                opts.project_dir.display()
            )],
        };
    }

    let descriptor = match discover_project(&opts.project_dir) {
        Ok(descriptor) if descriptor.kind != ProjectKind::Package => descriptor,
        Ok(_) => {
            return BuildOutcome {
                build_ok: false,
                log_tail: vec![
                    "Error: No Xcode project or workspace found in directory".to_string(),
                ],
            };
        }
        Err(e) => {
            return BuildOutcome {
                build_ok: false,
                log_tail: vec![format!("Error: {}", e)],
            };
        }
    };

    let scheme = opts.scheme.clone().unwrap_or_else(|| descriptor.stem());
    info!(
        target: "periscan::build",
        "Building {:?} scheme {} in {:?}", descriptor.path.file_name(), scheme, opts.project_dir
    );

    let mut cmd = tokio::process::Command::new(&opts.xcodebuild_path);
    match descriptor.kind {
        ProjectKind::Workspace => cmd.arg("-workspace"),
        _ => cmd.arg("-project"),
    };
    cmd.arg(&descriptor.path);
    cmd.arg("-scheme").arg(&scheme);
    // Same build arguments the scan tool uses, for index-store parity.
    cmd.args([
        "-quiet",
        "build-for-testing",
        "CODE_SIGNING_ALLOWED=NO",
        "ENABLE_BITCODE=NO",
        "DEBUG_INFORMATION_FORMAT=dwarf",
        "COMPILER_INDEX_STORE_ENABLE=YES",
        "INDEX_ENABLE_DATA_STORE=YES",
    ]);
    cmd.current_dir(&opts.project_dir);
    cmd.kill_on_drop(true);

    match tokio::time::timeout(BUILD_TIMEOUT, cmd.output()).await {
        Ok(Ok(output)) if output.status.success() => {
            info!(target: "periscan::build", "Build succeeded for scheme {}", scheme);
            BuildOutcome {
                build_ok: true,
                log_tail: Vec::new(),
            }
        }
        Ok(Ok(output)) => {
            warn!(
                target: "periscan::build",
                "Build failed with {:?} for scheme {}", output.status.code(), scheme
            );
            BuildOutcome {
                build_ok: false,
                log_tail: tail_lines(&String::from_utf8_lossy(&output.stderr)),
            }
        }
        Ok(Err(e)) => BuildOutcome {
            build_ok: false,
            log_tail: vec![format!("Error: failed to run build tool: {}", e)],
        },
        Err(_) => {
            warn!(target: "periscan::build", "Build timed out for scheme {}", scheme);
            BuildOutcome {
                build_ok: false,
                log_tail: vec!["Error: Build timed out after 15 minutes".to_string()],
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn missing_project_dir_is_an_in_band_error() {
        let outcome = run_build(BuildOptions::new("/definitely/not/a/dir")).await;
        assert!(!outcome.build_ok);
        assert!(outcome.log_tail[0].contains("does not exist"));
    }

    #[tokio::test]
    async fn directory_without_descriptor_is_an_in_band_error() {
        let dir = TempDir::new().unwrap();
        let outcome = run_build(BuildOptions::new(dir.path())).await;
        assert!(!outcome.build_ok);
        assert!(outcome.log_tail[0].starts_with("Error:"));
    }

    #[tokio::test]
    async fn failing_build_tool_reports_failure() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("App.xcodeproj")).unwrap();

        let opts = BuildOptions {
            xcodebuild_path: PathBuf::from("false"),
            ..BuildOptions::new(dir.path())
        };
        let outcome = run_build(opts).await;
        assert!(!outcome.build_ok);
    }
}
