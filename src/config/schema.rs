//! Configuration schema for Pavilion
//!
//! Site configuration is stored at `~/.config/pavilion/pavilion.toml`

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Root of the shared `tests/`, `builds/` and `downloads/` directories
    pub working_dir: PathBuf,

    /// Ordered search path for relative test sources
    pub config_dirs: Vec<PathBuf>,

    /// General settings
    pub general: GeneralConfig,

    /// Lock settings
    pub locks: LockConfig,

    /// Remote source download settings
    pub downloads: DownloadConfig,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."));
        let config_dir = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        Self {
            working_dir: data_dir.join("pavilion").join("working_dir"),
            config_dirs: vec![config_dir.join("pavilion")],
            general: GeneralConfig::default(),
            locks: LockConfig::default(),
            downloads: DownloadConfig::default(),
        }
    }
}

impl Config {
    /// Directory holding one subdirectory per test instance
    pub fn tests_dir(&self) -> PathBuf {
        self.working_dir.join("tests")
    }

    /// Directory holding the shared build cache
    pub fn builds_dir(&self) -> PathBuf {
        self.working_dir.join("builds")
    }

    /// Directory holding fetched remote sources
    pub fn downloads_dir(&self) -> PathBuf {
        self.working_dir.join("downloads")
    }
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log format: "text" or "json"
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_format: "text".to_string(),
        }
    }
}

/// Lock acquisition settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LockConfig {
    /// Maximum time to wait for an id or build lock
    pub timeout_secs: u64,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self { timeout_secs: 3 }
    }
}

impl LockConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Remote source download settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadConfig {
    /// Overall timeout for a single download
    pub timeout_secs: u64,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self { timeout_secs: 300 }
    }
}

impl DownloadConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = Config::default();
        let toml = toml::to_string_pretty(&config).unwrap();
        assert!(toml.contains("working_dir"));
        assert!(toml.contains("[locks]"));
    }

    #[test]
    fn config_deserializes_empty() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.locks.timeout_secs, 3);
        assert_eq!(config.general.log_format, "text");
    }

    #[test]
    fn config_deserializes_partial() {
        let toml = r#"
            working_dir = "/scratch/pav"
            config_dirs = ["/etc/pav", "/home/me/.pav"]

            [locks]
            timeout_secs = 10
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.tests_dir(), PathBuf::from("/scratch/pav/tests"));
        assert_eq!(config.builds_dir(), PathBuf::from("/scratch/pav/builds"));
        assert_eq!(config.config_dirs.len(), 2);
        assert_eq!(config.locks.timeout(), Duration::from_secs(10));
        assert_eq!(config.downloads.timeout_secs, 300); // default preserved
    }
}
