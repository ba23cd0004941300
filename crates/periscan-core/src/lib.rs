//! Core automation engine for driving Periphery's guided setup and the
//! scan/build operations layered on top of it.

mod answer;
mod build;
mod discovery;
mod error;
mod prompt;
mod pty;
mod scan;
mod setup;

pub use answer::synthesize;
pub use build::{run_build, BuildOptions};
pub use discovery::{
    discover_project, discover_scheme, parse_schemes, select_scheme, ProjectDescriptor,
    ProjectKind,
};
pub use error::PeriscanError;
pub use prompt::{classify, LineKind};
pub use pty::{LineEvent, PtyProcess};
pub use scan::{run_scan, ScanOptions};
pub use setup::{
    run_guided_setup, write_config, LogTail, SetupOptions, SetupSession, CONFIG_FILE_NAME,
    CONFIG_SENTINEL,
};

/// Result type for Periscan operations.
pub type Result<T> = std::result::Result<T, PeriscanError>;
