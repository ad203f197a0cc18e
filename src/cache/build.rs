//! Shared build directories
//!
//! `builds/<name>-<key>` exists only once a build for that key finished.
//! Construction happens under `builds/<name>-<key>.lock`, with the
//! existence check repeated after the lock is taken.

use crate::error::{PavError, PavResult};
use crate::lock::LockFile;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Result of [`BuildCache::ensure_built`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOutcome {
    /// Canonical build directory
    pub path: PathBuf,
    /// True if an earlier build was reused
    pub reused: bool,
}

/// The `builds/` directory of a working dir
#[derive(Debug, Clone)]
pub struct BuildCache {
    root: PathBuf,
    lock_timeout: Duration,
}

impl BuildCache {
    pub fn new(root: PathBuf, lock_timeout: Duration) -> Self {
        Self { root, lock_timeout }
    }

    /// Canonical path of a build
    pub fn build_path(&self, build_name: &str) -> PathBuf {
        self.root.join(build_name)
    }

    /// Lock file guarding a build path
    pub fn lock_path(build_path: &Path) -> PathBuf {
        let mut name = build_path.file_name().unwrap_or_default().to_os_string();
        name.push(".lock");
        build_path.with_file_name(name)
    }

    /// Return the build directory for `build_name`, running `build_fn` to
    /// create it if it does not exist yet.
    ///
    /// `build_fn` runs with the build lock held and must create the path
    /// atomically (populate a scratch dir, then rename it into place). An
    /// existing path is trusted without re-verification.
    pub fn ensure_built<F>(&self, build_name: &str, build_fn: F) -> PavResult<BuildOutcome>
    where
        F: FnOnce(&Path) -> PavResult<()>,
    {
        let path = self.build_path(build_name);
        if path.exists() {
            debug!("Build {} already exists", path.display());
            return Ok(BuildOutcome { path, reused: true });
        }

        fs::create_dir_all(&self.root).map_err(|e| {
            PavError::io(format!("creating builds dir {}", self.root.display()), e)
        })?;

        let _lock = LockFile::acquire(&Self::lock_path(&path), self.lock_timeout)?;

        // Another process may have finished while we waited.
        if path.exists() {
            debug!("Build {} finished while waiting for lock", path.display());
            return Ok(BuildOutcome { path, reused: true });
        }

        info!("Building {}", path.display());
        build_fn(&path)?;

        if !path.exists() {
            return Err(PavError::BuildIncomplete(path));
        }

        Ok(BuildOutcome {
            path,
            reused: false,
        })
    }
}
