//! Advisory file locks shared between processes
//!
//! Locks are `flock(2)` based, scoped to a single lock file, and always
//! acquired with a bounded wait. A lock is released when its guard is
//! dropped, on every exit path. Locks are not re-entrant: taking the same
//! lock twice from one process blocks until the timeout.

use crate::error::{PavError, PavResult};
use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(50);
const CONTENTION_WARN_AFTER: Duration = Duration::from_millis(500);

/// Exclusive lock on a lock file, held until dropped
#[derive(Debug)]
pub struct LockFile {
    path: PathBuf,
    file: File,
}

impl LockFile {
    /// Acquire an exclusive lock on `path`, creating the file if needed.
    ///
    /// Waits up to `timeout`; expiry yields `PavError::LockTimeout`.
    pub fn acquire(path: &Path, timeout: Duration) -> PavResult<Self> {
        let start = Instant::now();
        let mut warned = false;

        loop {
            match try_lock_exclusive(path) {
                Ok(file) => {
                    if warned {
                        info!(
                            "Lock acquired after {:.1}s contention: {}",
                            start.elapsed().as_secs_f64(),
                            path.display()
                        );
                    } else {
                        debug!("Acquired lock {}", path.display());
                    }
                    return Ok(Self {
                        path: path.to_path_buf(),
                        file,
                    });
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    if !warned && start.elapsed() > CONTENTION_WARN_AFTER {
                        warn!("Lock contention on {}, waiting...", path.display());
                        warned = true;
                    }
                }
                Err(e) => {
                    return Err(PavError::io(format!("locking {}", path.display()), e));
                }
            }

            if start.elapsed() >= timeout {
                return Err(PavError::LockTimeout {
                    path: path.to_path_buf(),
                    timeout,
                });
            }

            std::thread::sleep(POLL_INTERVAL);
        }
    }

    /// Path of the lock file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for LockFile {
    fn drop(&mut self) {
        // Closing the descriptor would release the lock as well; unlock
        // explicitly so the release does not depend on other fd clones.
        #[cfg(unix)]
        {
            use std::os::unix::io::AsRawFd;
            // SAFETY: the fd is owned by `self.file`, which is still open here.
            // LOCK_UN only drops our lock and touches no memory.
            unsafe {
                libc::flock(self.file.as_raw_fd(), libc::LOCK_UN);
            }
        }
        // Without flock the lock is the file's existence.
        #[cfg(not(unix))]
        {
            if let Err(e) = std::fs::remove_file(&self.path) {
                warn!("Could not remove lock {}: {}", self.path.display(), e);
            }
        }
        debug!("Released lock {}", self.path.display());
    }
}

#[cfg(unix)]
fn try_lock_exclusive(path: &Path) -> io::Result<File> {
    use std::os::unix::fs::OpenOptionsExt;
    use std::os::unix::io::AsRawFd;

    // Never truncate: the file may be locked and in use by another holder.
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .mode(0o664)
        .open(path)?;

    // SAFETY: `file` owns a valid open fd for the duration of the call.
    // LOCK_EX | LOCK_NB requests an exclusive lock without blocking.
    let result = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
    if result == 0 {
        return Ok(file);
    }

    let err = io::Error::last_os_error();
    if err.raw_os_error() == Some(libc::EWOULDBLOCK) {
        Err(io::Error::new(io::ErrorKind::WouldBlock, "lock held"))
    } else {
        Err(err)
    }
}

/// Lock files are created exclusively and removed again when the guard
/// drops.
#[cfg(not(unix))]
fn try_lock_exclusive(path: &Path) -> io::Result<File> {
    match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(file) => Ok(file),
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
            Err(io::Error::new(io::ErrorKind::WouldBlock, "lock held"))
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::thread;
    use tempfile::TempDir;

    #[test]
    fn acquire_creates_lock_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("builds.lock");

        let lock = LockFile::acquire(&path, Duration::from_secs(1)).unwrap();

        assert!(path.exists());
        assert_eq!(lock.path(), path);
    }

    #[test]
    fn released_on_drop() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.lock");

        {
            let _lock = LockFile::acquire(&path, Duration::from_secs(1)).unwrap();
        }

        let _again = LockFile::acquire(&path, Duration::from_millis(100)).unwrap();
    }

    #[test]
    fn lock_can_be_taken_repeatedly() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tests.lock");

        for _ in 0..3 {
            let lock = LockFile::acquire(&path, Duration::from_millis(200)).unwrap();
            drop(lock);
        }
    }

    #[test]
    #[cfg(unix)]
    fn contended_lock_times_out() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.lock");
        let path2 = path.clone();

        let held = LockFile::acquire(&path, Duration::from_secs(1)).unwrap();

        let (tx, rx) = mpsc::channel();
        let handle = thread::spawn(move || {
            let result = LockFile::acquire(&path2, Duration::from_millis(150));
            tx.send(matches!(result, Err(PavError::LockTimeout { .. })))
                .unwrap();
        });

        assert!(rx.recv().unwrap(), "second acquisition should time out");
        handle.join().unwrap();
        drop(held);
    }

    #[test]
    #[cfg(unix)]
    fn waiter_gets_lock_after_release() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.lock");
        let path2 = path.clone();

        let held = LockFile::acquire(&path, Duration::from_secs(1)).unwrap();
        let handle = thread::spawn(move || LockFile::acquire(&path2, Duration::from_secs(5)).is_ok());

        thread::sleep(Duration::from_millis(200));
        drop(held);

        assert!(handle.join().unwrap());
    }
}
