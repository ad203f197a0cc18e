//! Error types for Pavilion
//!
//! All modules use `PavResult<T>` as their return type.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for Pavilion operations
pub type PavResult<T> = Result<T, PavError>;

/// All errors that can occur in Pavilion
#[derive(Error, Debug)]
pub enum PavError {
    // Identity errors
    #[error("Could not allocate a test id under {path}: {reason}")]
    Allocation { path: PathBuf, reason: String },

    #[error("Test id {id} does not fit in {digits} digits")]
    IdOverflow { id: u64, digits: usize },

    #[error("Test {id} not found at {path}")]
    TestNotFound { id: String, path: PathBuf },

    // Lock errors
    #[error("Timed out after {timeout:?} waiting for lock {path}")]
    LockTimeout { path: PathBuf, timeout: Duration },

    // Source errors
    #[error("Source location '{location}' not found (searched: {searched})")]
    SourceNotFound { location: String, searched: String },

    #[error("Source location {0} is neither a regular file nor a directory")]
    SourceUnusable(PathBuf),

    #[error("Download of {url} failed: {reason}")]
    Download { url: String, reason: String },

    // Build errors
    #[error("Could not materialize {path}: {reason}")]
    Extraction { path: PathBuf, reason: String },

    #[error("Build function returned without creating {0}")]
    BuildIncomplete(PathBuf),

    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Invalid test configuration: {0}")]
    TestConfig(String),

    // Scheduler errors
    #[error("No scheduler named '{0}'")]
    SchedulerNotFound(String),

    #[error("Command failed: {command}")]
    CommandFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    // General errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    User(String),
}

impl PavError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a command failed error
    pub fn command_failed(command: impl Into<String>, source: std::io::Error) -> Self {
        Self::CommandFailed {
            command: command.into(),
            source,
        }
    }

    /// Create an extraction error for `path`
    pub fn extraction(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::Extraction {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Check if error is retryable
    ///
    /// Nothing in the core retries on its own; this only tells the caller
    /// whether resubmitting the same operation can succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::LockTimeout { .. } | Self::Download { .. })
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<String> {
        match self {
            Self::LockTimeout { .. } => Some(
                "Another process holds the lock; retry, or raise locks.timeout_secs".to_string(),
            ),
            Self::SourceNotFound { .. } => {
                Some("Relative sources are looked up under <config_dir>/test_src/".to_string())
            }
            Self::IdOverflow { .. } => {
                Some("Remove finished tests from the working directory".to_string())
            }
            Self::SchedulerNotFound(_) => Some(format!(
                "Available schedulers: {}",
                crate::scheduler::available_schedulers().join(", ")
            )),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = PavError::SourceNotFound {
            location: "pkg.tar.gz".to_string(),
            searched: "/etc/pav/test_src".to_string(),
        };
        assert!(err.to_string().contains("pkg.tar.gz"));
        assert!(err.to_string().contains("/etc/pav/test_src"));
    }

    #[test]
    fn error_hint() {
        let err = PavError::SchedulerNotFound("slurm".to_string());
        assert_eq!(err.hint().as_deref(), Some("Available schedulers: raw"));
        assert_eq!(PavError::User("x".to_string()).hint(), None);
    }

    #[test]
    fn error_retryable() {
        let timeout = PavError::LockTimeout {
            path: PathBuf::from("/w/builds/foo-00.lock"),
            timeout: Duration::from_secs(1),
        };
        assert!(timeout.is_retryable());
        assert!(!PavError::extraction("/w/builds/foo", "bad tar").is_retryable());
    }
}
