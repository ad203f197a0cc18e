use crate::cache::BuildCache;
use crate::config::Config;
use crate::error::{PavError, PavResult};
use crate::source::SourceResolver;
use crate::test_run::allocator::{existing_ids, IdAllocator, TestId};
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// The shared working directory and the search path used with it
#[derive(Debug, Clone)]
pub struct WorkingDir {
    root: PathBuf,
    resolver: SourceResolver,
    builds: BuildCache,
    lock_timeout: Duration,
}

impl WorkingDir {
    pub fn new(root: PathBuf, config_dirs: Vec<PathBuf>, lock_timeout: Duration) -> Self {
        let resolver = SourceResolver::new(config_dirs, root.join("downloads"));
        let builds = BuildCache::new(root.join("builds"), lock_timeout);
        Self {
            root,
            resolver,
            builds,
            lock_timeout,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.working_dir.clone(),
            config.config_dirs.clone(),
            config.locks.timeout(),
        )
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn tests_dir(&self) -> PathBuf {
        self.root.join("tests")
    }

    pub fn test_path(&self, id: TestId) -> PathBuf {
        self.tests_dir().join(id.dir_name())
    }

    pub fn resolver(&self) -> &SourceResolver {
        &self.resolver
    }

    pub fn builds(&self) -> &BuildCache {
        &self.builds
    }

    pub fn allocator(&self) -> IdAllocator {
        IdAllocator::new(self.tests_dir(), self.lock_timeout)
    }

    /// Ids of every test instance, ascending
    pub fn test_ids(&self) -> PavResult<Vec<TestId>> {
        let tests_dir = self.tests_dir();
        let ids = match existing_ids(&tests_dir) {
            Ok(ids) => ids,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(PavError::io(format!("listing {}", tests_dir.display()), e));
            }
        };
        Ok(ids
            .into_iter()
            .filter_map(|id| TestId::new(id).ok())
            .collect())
    }
}
