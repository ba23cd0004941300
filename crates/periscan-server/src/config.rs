//! Server configuration.

use anyhow::Result;
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Analysis tool executable; resolved on PATH when not absolute.
    #[serde(default = "default_periphery_path")]
    pub periphery_path: PathBuf,
    /// Build tool executable; resolved on PATH when not absolute.
    #[serde(default = "default_xcodebuild_path")]
    pub xcodebuild_path: PathBuf,
    /// Upper bound on concurrently running automation jobs. Each job
    /// owns its own child process and pty.
    #[serde(default = "default_max_jobs")]
    pub max_concurrent_jobs: usize,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_periphery_path() -> PathBuf {
    PathBuf::from("periphery")
}

fn default_xcodebuild_path() -> PathBuf {
    PathBuf::from("xcodebuild")
}

fn default_max_jobs() -> usize {
    4
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            periphery_path: default_periphery_path(),
            xcodebuild_path: default_xcodebuild_path(),
            max_concurrent_jobs: default_max_jobs(),
        }
    }
}

impl Config {
    /// Load config from a specific file path.
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load config from default location (config/default.toml) or fall back to defaults.
    pub fn load() -> Result<Self> {
        let config_path = PathBuf::from("config/default.toml");
        if config_path.exists() {
            return Self::load_from(&config_path);
        }

        Ok(Config::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_fills_in_defaults() {
        let config: Config = toml::from_str("port = 9000\n").unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.periphery_path, PathBuf::from("periphery"));
        assert_eq!(config.max_concurrent_jobs, 4);
    }
}
