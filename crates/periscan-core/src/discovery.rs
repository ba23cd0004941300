//! Project descriptor discovery and scheme selection.
//!
//! Decides which setup strategy applies before any process is spawned:
//! a combined workspace wins over a single project, which wins over a
//! package manifest. For workspace/project strategies the build tool's
//! listing mode supplies the scheme candidates.

use crate::{PeriscanError, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

/// How long the listing invocation may run before falling back to the
/// stem-derived scheme name.
pub const LIST_TIMEOUT: Duration = Duration::from_secs(30);

/// Which kind of descriptor the project directory carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectKind {
    /// A `.xcworkspace` bundle.
    Workspace,
    /// A `.xcodeproj` bundle.
    Project,
    /// A `Package.swift` manifest.
    Package,
}

/// The descriptor the fallback chain settled on. Immutable for the
/// lifetime of the session built on it.
#[derive(Debug, Clone)]
pub struct ProjectDescriptor {
    pub kind: ProjectKind,
    pub path: PathBuf,
}

impl ProjectDescriptor {
    /// File name without the bundle extension, used as the fallback
    /// scheme name.
    pub fn stem(&self) -> String {
        self.path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Locate the project descriptor in `dir`.
///
/// Preference order: workspace over project over package manifest.
/// Fails fast when none of the three exist; nothing is spawned in that
/// case.
pub fn discover_project(dir: &Path) -> Result<ProjectDescriptor> {
    let mut workspace = None;
    let mut project = None;

    for entry in std::fs::read_dir(dir)?.flatten() {
        let path = entry.path();
        match path.extension().and_then(|e| e.to_str()) {
            Some("xcworkspace") if workspace.is_none() => workspace = Some(path),
            Some("xcodeproj") if project.is_none() => project = Some(path),
            _ => {}
        }
    }

    if let Some(path) = workspace {
        debug!(target: "periscan::discovery", "Found workspace: {:?}", path.file_name());
        return Ok(ProjectDescriptor {
            kind: ProjectKind::Workspace,
            path,
        });
    }
    if let Some(path) = project {
        debug!(target: "periscan::discovery", "Found project: {:?}", path.file_name());
        return Ok(ProjectDescriptor {
            kind: ProjectKind::Project,
            path,
        });
    }

    let package = dir.join("Package.swift");
    if package.exists() {
        debug!(target: "periscan::discovery", "Found Package.swift");
        return Ok(ProjectDescriptor {
            kind: ProjectKind::Package,
            path: package,
        });
    }

    Err(PeriscanError::NoProjectFound(dir.to_path_buf()))
}

/// Query the build tool's listing mode and pick a scheme.
///
/// Any listing failure (spawn error, non-zero exit, timeout, no
/// parseable section) falls back to the descriptor's stem.
pub async fn discover_scheme(xcodebuild: &Path, descriptor: &ProjectDescriptor) -> String {
    discover_scheme_within(xcodebuild, descriptor, LIST_TIMEOUT).await
}

async fn discover_scheme_within(
    xcodebuild: &Path,
    descriptor: &ProjectDescriptor,
    timeout: Duration,
) -> String {
    let stem = descriptor.stem();

    let mut cmd = tokio::process::Command::new(xcodebuild);
    cmd.arg("-list");
    match descriptor.kind {
        ProjectKind::Workspace => {
            cmd.arg("-workspace").arg(&descriptor.path);
        }
        ProjectKind::Project => {
            cmd.arg("-project").arg(&descriptor.path);
        }
        // Package manifests have no listing mode.
        ProjectKind::Package => return stem,
    }
    if let Some(parent) = descriptor.path.parent() {
        cmd.current_dir(parent);
    }
    cmd.kill_on_drop(true);

    match tokio::time::timeout(timeout, cmd.output()).await {
        Ok(Ok(output)) if output.status.success() => {
            let schemes = parse_schemes(&String::from_utf8_lossy(&output.stdout));
            debug!(target: "periscan::discovery", "Available schemes: {:?}", schemes);
            if schemes.is_empty() {
                debug!(target: "periscan::discovery", "No schemes listed, using fallback: {}", stem);
                stem
            } else {
                select_scheme(&schemes, &stem)
            }
        }
        Ok(Ok(output)) => {
            warn!(
                target: "periscan::discovery",
                "Scheme listing exited with {:?}, using fallback: {}", output.status.code(), stem
            );
            stem
        }
        Ok(Err(e)) => {
            warn!(target: "periscan::discovery", "Scheme listing failed ({}), using fallback: {}", e, stem);
            stem
        }
        Err(_) => {
            warn!(target: "periscan::discovery", "Scheme listing timed out, using fallback: {}", stem);
            stem
        }
    }
}

/// Parse scheme names out of `xcodebuild -list` output: the lines of
/// the `Schemes:` section, up to the next labeled section, a blank
/// line, or end of output.
pub fn parse_schemes(output: &str) -> Vec<String> {
    let mut schemes = Vec::new();
    let mut in_section = false;

    for line in output.lines() {
        let line = line.trim();
        if line == "Schemes:" {
            in_section = true;
        } else if in_section {
            if line.is_empty() || line.ends_with(':') {
                break;
            }
            schemes.push(line.to_string());
        }
    }

    schemes
}

/// Pick one scheme from a non-empty candidate list: the first whose
/// name case-insensitively equals `stem`, else the first candidate in
/// original order.
pub fn select_scheme(schemes: &[String], stem: &str) -> String {
    schemes
        .iter()
        .find(|s| s.eq_ignore_ascii_case(stem))
        .unwrap_or(&schemes[0])
        .clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn parses_the_schemes_section() {
        let output = "Information about project \"Foo\":\n\
                      Schemes:\n\
                      Foo\n\
                      Bar\n\
                      \n\
                      Build Configurations:\n\
                      Debug\n";
        assert_eq!(parse_schemes(output), vec!["Foo", "Bar"]);
    }

    #[test]
    fn section_ends_at_next_label_without_blank_line() {
        let output = "Schemes:\n    Foo\n    Bar\nTargets:\n    Baz\n";
        assert_eq!(parse_schemes(output), vec!["Foo", "Bar"]);
    }

    #[test]
    fn missing_section_yields_nothing() {
        assert!(parse_schemes("error: no project found\n").is_empty());
    }

    #[test]
    fn selection_prefers_the_stem_match() {
        let schemes = vec!["Bar".to_string(), "Foo".to_string()];
        assert_eq!(select_scheme(&schemes, "foo"), "Foo");
        assert_eq!(select_scheme(&schemes, "Foo"), "Foo");
    }

    #[test]
    fn selection_falls_back_to_first_candidate() {
        let schemes = vec!["Foo".to_string(), "Bar".to_string()];
        assert_eq!(select_scheme(&schemes, "Other"), "Foo");
    }

    #[test]
    fn workspace_wins_over_project_and_package() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("App.xcodeproj")).unwrap();
        std::fs::create_dir(dir.path().join("App.xcworkspace")).unwrap();
        std::fs::write(dir.path().join("Package.swift"), "// swift-tools-version:5.9\n").unwrap();

        let descriptor = discover_project(dir.path()).unwrap();
        assert_eq!(descriptor.kind, ProjectKind::Workspace);
        assert_eq!(descriptor.stem(), "App");
    }

    #[test]
    fn project_wins_over_package() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("App.xcodeproj")).unwrap();
        std::fs::write(dir.path().join("Package.swift"), "// swift-tools-version:5.9\n").unwrap();

        let descriptor = discover_project(dir.path()).unwrap();
        assert_eq!(descriptor.kind, ProjectKind::Project);
    }

    #[test]
    fn package_manifest_alone_is_detected() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("Package.swift"), "// swift-tools-version:5.9\n").unwrap();

        let descriptor = discover_project(dir.path()).unwrap();
        assert_eq!(descriptor.kind, ProjectKind::Package);
        assert_eq!(descriptor.stem(), "Package");
    }

    #[test]
    fn empty_directory_is_an_error() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            discover_project(dir.path()),
            Err(PeriscanError::NoProjectFound(_))
        ));
    }

    #[tokio::test]
    async fn listing_failure_falls_back_to_stem() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("Foo.xcodeproj")).unwrap();
        let descriptor = discover_project(dir.path()).unwrap();

        // `false` exits non-zero without producing a listing.
        let scheme = discover_scheme(Path::new("false"), &descriptor).await;
        assert_eq!(scheme, "Foo");
    }

    #[tokio::test]
    async fn missing_build_tool_falls_back_to_stem() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("Foo.xcodeproj")).unwrap();
        let descriptor = discover_project(dir.path()).unwrap();

        let scheme = discover_scheme(Path::new("no-such-build-tool-7f3a"), &descriptor).await;
        assert_eq!(scheme, "Foo");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn listing_timeout_falls_back_to_stem() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("Foo.xcodeproj")).unwrap();
        let descriptor = discover_project(dir.path()).unwrap();

        let tool = dir.path().join("slow-xcodebuild");
        std::fs::write(&tool, "#!/bin/sh\nsleep 30\n").unwrap();
        let mut perms = std::fs::metadata(&tool).unwrap().permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&tool, perms).unwrap();

        let scheme =
            discover_scheme_within(&tool, &descriptor, Duration::from_millis(200)).await;
        assert_eq!(scheme, "Foo");
    }
}
