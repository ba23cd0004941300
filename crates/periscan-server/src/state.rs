//! Shared application state.

use crate::config::Config;
use tokio::sync::Semaphore;

/// Shared application state.
///
/// Each automation job spawns its own child process on its own pty;
/// the semaphore is the only state shared across jobs.
pub struct AppState {
    pub config: Config,
    pub jobs: Semaphore,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let jobs = Semaphore::new(config.max_concurrent_jobs);
        Self { config, jobs }
    }
}
