//! Test identity allocation
//!
//! Ids are the smallest positive integer with no directory under `tests/`,
//! so ids freed by removing a test are handed out again. Allocation lists
//! and claims under `tests/.lock`.

use crate::error::{PavError, PavResult};
use crate::lock::LockFile;
use std::collections::BTreeSet;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

/// Width of a test directory name
pub const TEST_ID_DIGITS: usize = 6;

/// Largest id that fits in [`TEST_ID_DIGITS`] digits
pub const MAX_TEST_ID: u64 = 999_999;

const LOCK_FILE: &str = ".lock";

/// A test instance's identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TestId(u64);

impl TestId {
    pub fn new(id: u64) -> PavResult<Self> {
        if id == 0 {
            return Err(PavError::User("test ids start at 1".to_string()));
        }
        if id > MAX_TEST_ID {
            return Err(PavError::IdOverflow {
                id,
                digits: TEST_ID_DIGITS,
            });
        }
        Ok(Self(id))
    }

    pub fn get(self) -> u64 {
        self.0
    }

    /// Zero-padded directory name
    pub fn dir_name(self) -> String {
        format!("{:0width$}", self.0, width = TEST_ID_DIGITS)
    }
}

impl fmt::Display for TestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TestId {
    type Err = PavError;

    /// Accepts `7` as well as `000007`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(PavError::User(format!("invalid test id '{}'", s)));
        }
        let id = s
            .parse::<u64>()
            .map_err(|_| PavError::User(format!("invalid test id '{}'", s)))?;
        Self::new(id)
    }
}

/// Hands out test ids under a shared `tests/` directory
#[derive(Debug, Clone)]
pub struct IdAllocator {
    tests_dir: PathBuf,
    lock_timeout: Duration,
}

impl IdAllocator {
    pub fn new(tests_dir: PathBuf, lock_timeout: Duration) -> Self {
        Self {
            tests_dir,
            lock_timeout,
        }
    }

    /// Claim the smallest free id and create its directory.
    ///
    /// The directory exists before the lock is released, so no other
    /// allocator can pick the same id.
    pub fn allocate(&self) -> PavResult<TestId> {
        fs::create_dir_all(&self.tests_dir).map_err(|e| self.allocation_error(e))?;

        let _lock = LockFile::acquire(&self.tests_dir.join(LOCK_FILE), self.lock_timeout)?;

        let taken = existing_ids(&self.tests_dir).map_err(|e| self.allocation_error(e))?;
        let mut from = 1;
        loop {
            let id = next_free(&taken, from)?;
            let path = self.tests_dir.join(id.dir_name());

            match fs::create_dir(&path) {
                Ok(()) => {
                    info!("Allocated test id {} at {}", id, path.display());
                    return Ok(id);
                }
                // Created by something that bypassed the lock; skip it.
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    debug!("{} appeared without the lock, skipping", path.display());
                    from = id.get() + 1;
                }
                Err(e) => return Err(self.allocation_error(e)),
            }
        }
    }

    fn allocation_error(&self, e: io::Error) -> PavError {
        PavError::Allocation {
            path: self.tests_dir.clone(),
            reason: e.to_string(),
        }
    }
}

/// Smallest id not in `taken`, starting the search at `from`
fn next_free(taken: &BTreeSet<u64>, from: u64) -> PavResult<TestId> {
    let mut candidate = from;
    while taken.contains(&candidate) {
        candidate += 1;
    }
    TestId::new(candidate)
}

/// Ids of all purely numeric entries under `tests_dir`
pub fn existing_ids(tests_dir: &Path) -> io::Result<BTreeSet<u64>> {
    let mut ids = BTreeSet::new();
    for entry in fs::read_dir(tests_dir)? {
        let name = entry?.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if !name.is_empty() && name.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(id) = name.parse::<u64>() {
                ids.insert(id);
            }
        }
    }
    Ok(ids)
}
