//! Error types for Periscan.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PeriscanError {
    #[error("Process spawn failed: {0}")]
    SpawnFailed(String),

    #[error("PTY error: {0}")]
    Pty(String),

    #[error("Write to child failed: {0}")]
    WriteFailed(String),

    #[error("No Xcode workspace, project, or Package.swift found in {0:?}")]
    NoProjectFound(PathBuf),

    #[error("Project path does not exist: {0:?}")]
    InvalidProjectDir(PathBuf),

    #[error("Configuration document is not valid YAML: {0}")]
    InvalidConfig(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
