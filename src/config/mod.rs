//! Configuration management for Pavilion

pub mod schema;

pub use schema::Config;

use crate::error::{PavError, PavResult};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

/// Configuration manager
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Create a new config manager with default path
    pub fn new() -> Self {
        Self {
            config_path: Self::default_config_path(),
        }
    }

    /// Create a config manager with a custom path
    pub fn with_path(path: PathBuf) -> Self {
        Self { config_path: path }
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("pavilion")
            .join("pavilion.toml")
    }

    /// Load configuration, falling back to defaults if the file is absent
    pub async fn load(&self) -> PavResult<Config> {
        if !self.config_path.exists() {
            debug!("Config file not found, using defaults");
            return Ok(Config::default());
        }

        self.load_from_file(&self.config_path).await
    }

    /// Load configuration from a specific file
    pub async fn load_from_file(&self, path: &Path) -> PavResult<Config> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| PavError::io(format!("reading config from {}", path.display()), e))?;

        toml::from_str(&content).map_err(|e| PavError::ConfigInvalid {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Save configuration to the config file
    pub async fn save(&self, config: &Config) -> PavResult<()> {
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                PavError::io(format!("creating config dir {}", parent.display()), e)
            })?;
        }

        let content = toml::to_string_pretty(config)?;
        fs::write(&self.config_path, content).await.map_err(|e| {
            PavError::io(
                format!("writing config to {}", self.config_path.display()),
                e,
            )
        })?;

        info!("Configuration saved to {}", self.config_path.display());
        Ok(())
    }

    /// Ensure the shared working directories exist
    pub async fn ensure_working_dirs(config: &Config) -> PavResult<()> {
        let dirs = [
            config.tests_dir(),
            config.builds_dir(),
            config.downloads_dir(),
        ];

        for dir in &dirs {
            fs::create_dir_all(dir)
                .await
                .map_err(|e| PavError::io(format!("creating directory {}", dir.display()), e))?;
        }

        Ok(())
    }

    /// Get the config file path
    pub fn path(&self) -> &Path {
        &self.config_path
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn load_default_when_missing() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nonexistent.toml");
        let manager = ConfigManager::with_path(path);

        let config = manager.load().await.unwrap();
        assert_eq!(config.locks.timeout_secs, 3);
    }

    #[tokio::test]
    async fn load_reports_invalid_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("pavilion.toml");
        std::fs::write(&path, "working_dir = [").unwrap();

        let err = ConfigManager::with_path(path.clone()).load().await.unwrap_err();
        match err {
            PavError::ConfigInvalid { path: p, .. } => assert_eq!(p, path),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn save_and_load_roundtrip() {
        let temp = TempDir::new().unwrap();
        let manager = ConfigManager::with_path(temp.path().join("site").join("pavilion.toml"));

        let mut config = Config::default();
        config.working_dir = temp.path().join("wd");
        config.locks.timeout_secs = 30;

        manager.save(&config).await.unwrap();
        let loaded = manager.load().await.unwrap();

        assert_eq!(loaded.working_dir, temp.path().join("wd"));
        assert_eq!(loaded.locks.timeout_secs, 30);
    }

    #[tokio::test]
    async fn ensure_working_dirs_creates_layout() {
        let temp = TempDir::new().unwrap();
        let config = Config {
            working_dir: temp.path().join("wd"),
            ..Config::default()
        };

        ConfigManager::ensure_working_dirs(&config).await.unwrap();

        assert!(config.tests_dir().is_dir());
        assert!(config.builds_dir().is_dir());
        assert!(config.downloads_dir().is_dir());
    }
}
