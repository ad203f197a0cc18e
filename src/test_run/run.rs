//! Test instances
//!
//! A test instance lives in `tests/<id>/`:
//! - `config`: the test config as pretty JSON, written once
//! - `status`: the status log
//! - `build`: symlink to the shared build directory, once built

use crate::cache::{build_name, BuildKey, BuildOutcome, FileHashes};
use crate::error::{PavError, PavResult};
use crate::extract;
use crate::source::{Fetcher, ResolvedSource};
use crate::test_run::allocator::TestId;
use crate::test_run::config::{BuildConfig, TestConfig};
use crate::test_run::status::{StatusLog, StatusRecord, TestState};
use crate::test_run::workspace::WorkingDir;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const CONFIG_FILE: &str = "config";
const STATUS_FILE: &str = "status";
const BUILD_LINK: &str = "build";

/// One test instance on disk
#[derive(Debug)]
pub struct TestRun {
    id: TestId,
    path: PathBuf,
    config: TestConfig,
    build: Option<BuildConfig>,
    build_key: Option<BuildKey>,
    status: StatusLog,
}

impl TestRun {
    /// Allocate an id, persist `config` and compute the build key.
    ///
    /// Computing the key resolves the build source, which fetches remote
    /// sources. A failure there is recorded as `BUILD_FAILED`.
    pub fn create(ws: &WorkingDir, config: TestConfig, fetcher: &dyn Fetcher) -> PavResult<Self> {
        let build = config.build()?;
        let id = ws.allocator().allocate()?;
        let path = ws.test_path(id);

        write_config(&path, &config)?;
        let status = StatusLog::new(path.join(STATUS_FILE));
        status.append(TestState::Created, &format!("Created test {}", config.name()))?;

        let build_key = match &build {
            Some(build) => match compute_key(ws, build, fetcher) {
                Ok((key, _)) => Some(key),
                Err(e) => {
                    status.append(TestState::BuildFailed, &e.to_string())?;
                    return Err(e);
                }
            },
            None => None,
        };

        info!("Created test {} ({})", id, config.name());
        Ok(Self {
            id,
            path,
            config,
            build,
            build_key,
            status,
        })
    }

    /// Rehydrate an existing test instance.
    ///
    /// The build key comes from the `build` link when there is one;
    /// otherwise it is computed when the test is built.
    pub fn load(ws: &WorkingDir, id: TestId) -> PavResult<Self> {
        let path = ws.test_path(id);
        if !path.is_dir() {
            return Err(PavError::TestNotFound {
                id: id.dir_name(),
                path,
            });
        }

        let config_path = path.join(CONFIG_FILE);
        let text = fs::read_to_string(&config_path)
            .map_err(|e| PavError::io(format!("reading {}", config_path.display()), e))?;
        let config = TestConfig::from_json(&text).map_err(|e| PavError::ConfigInvalid {
            path: config_path.clone(),
            reason: e.to_string(),
        })?;
        let build = config.build()?;

        let build_key = fs::read_link(path.join(BUILD_LINK))
            .ok()
            .and_then(|target| BuildKey::from_build_path(&target));
        debug!("Loaded test {} with build key {:?}", id, build_key);

        Ok(Self {
            id,
            status: StatusLog::new(path.join(STATUS_FILE)),
            path,
            config,
            build,
            build_key,
        })
    }

    /// Make sure this test's build exists and link it from the test dir.
    ///
    /// Returns `None` for tests without a build section.
    pub fn build(&mut self, ws: &WorkingDir, fetcher: &dyn Fetcher) -> PavResult<Option<BuildOutcome>> {
        let Some(build) = self.build.clone() else {
            return Ok(None);
        };

        self.status.append(TestState::Building, "")?;
        match self.build_and_link(ws, &build, fetcher) {
            Ok(outcome) => {
                let (state, verb) = if outcome.reused {
                    (TestState::BuildReused, "Reused")
                } else {
                    (TestState::BuildDone, "Built")
                };
                self.status
                    .append(state, &format!("{} {}", verb, outcome.path.display()))?;
                Ok(Some(outcome))
            }
            Err(e) => {
                self.status.append(TestState::BuildFailed, &e.to_string())?;
                Err(e)
            }
        }
    }

    fn build_and_link(
        &mut self,
        ws: &WorkingDir,
        build: &BuildConfig,
        fetcher: &dyn Fetcher,
    ) -> PavResult<BuildOutcome> {
        let mut resolved: Option<Option<ResolvedSource>> = None;
        let key = match self.build_key {
            Some(key) => key,
            None => {
                let (key, source) = compute_key(ws, build, fetcher)?;
                self.build_key = Some(key);
                resolved = Some(source);
                key
            }
        };

        let resolver = ws.resolver();
        let outcome = ws
            .builds()
            .ensure_built(&build_name(&self.config.name(), &key), |dest| {
                let source = match resolved {
                    Some(source) => source,
                    None => resolver.resolve(build, fetcher)?,
                };
                let extras = build
                    .extra_files
                    .iter()
                    .map(|extra| {
                        resolver.find_file(extra).ok_or_else(|| {
                            PavError::extraction(extra, "extra file not found on the search path")
                        })
                    })
                    .collect::<PavResult<Vec<_>>>()?;
                extract::materialize(source.as_ref(), &extras, dest)
            })?;

        self.link_build(&outcome.path)?;
        Ok(outcome)
    }

    /// Point `tests/<id>/build` at `target`, replacing any older link
    fn link_build(&self, target: &Path) -> PavResult<()> {
        let link = self.path.join(BUILD_LINK);
        if fs::read_link(&link).is_ok_and(|current| current == target) {
            return Ok(());
        }

        let staged = self.path.join(format!(".{}.{}", BUILD_LINK, std::process::id()));
        match fs::remove_file(&staged) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(PavError::io(format!("removing {}", staged.display()), e)),
        }
        symlink(target, &staged)?;
        fs::rename(&staged, &link)
            .map_err(|e| PavError::io(format!("linking {}", link.display()), e))?;

        debug!("Linked {} -> {}", link.display(), target.display());
        Ok(())
    }

    /// True if the test needs no build, or its build link resolves
    pub fn is_built(&self) -> bool {
        if self.build.is_none() {
            return true;
        }
        let link = self.path.join(BUILD_LINK);
        let is_link = fs::symlink_metadata(&link).is_ok_and(|m| m.file_type().is_symlink());
        is_link && fs::metadata(&link).is_ok()
    }

    /// Canonical build directory this test is linked to
    pub fn build_path(&self) -> Option<PathBuf> {
        fs::read_link(self.path.join(BUILD_LINK)).ok()
    }

    pub fn status(&self) -> PavResult<StatusRecord> {
        self.status.last()
    }

    pub fn set_status(&self, state: TestState, message: &str) -> PavResult<StatusRecord> {
        self.status.append(state, message)
    }

    pub fn id(&self) -> TestId {
        self.id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn name(&self) -> String {
        self.config.name()
    }

    pub fn config(&self) -> &TestConfig {
        &self.config
    }

    pub fn build_config(&self) -> Option<&BuildConfig> {
        self.build.as_ref()
    }

    pub fn build_key(&self) -> Option<BuildKey> {
        self.build_key
    }

    /// `<name>-<key>`, once the key is known
    pub fn build_name(&self) -> Option<String> {
        self.build_key.map(|key| build_name(&self.config.name(), &key))
    }
}

fn compute_key(
    ws: &WorkingDir,
    build: &BuildConfig,
    fetcher: &dyn Fetcher,
) -> PavResult<(BuildKey, Option<ResolvedSource>)> {
    let resolver = ws.resolver();
    let source = resolver.resolve(build, fetcher)?;
    let key = BuildKey::compute(build, source.as_ref(), resolver, &mut FileHashes::new())?;
    Ok((key, source))
}

/// Write the config next to its final name, then rename it into place
fn write_config(dir: &Path, config: &TestConfig) -> PavResult<()> {
    let dest = dir.join(CONFIG_FILE);
    let json = config.to_json()?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir)
        .map_err(|e| PavError::io(format!("creating temp config in {}", dir.display()), e))?;
    tmp.write_all(json.as_bytes())
        .map_err(|e| PavError::io(format!("writing {}", tmp.path().display()), e))?;
    tmp.persist(&dest)
        .map_err(|e| PavError::io(format!("saving {}", dest.display()), e.error))?;
    Ok(())
}

#[cfg(unix)]
fn symlink(target: &Path, link: &Path) -> PavResult<()> {
    std::os::unix::fs::symlink(target, link)
        .map_err(|e| PavError::io(format!("creating link {}", link.display()), e))
}

#[cfg(not(unix))]
fn symlink(_target: &Path, link: &Path) -> PavResult<()> {
    Err(PavError::Internal(format!(
        "cannot create build link {}: symlinks need a unix filesystem",
        link.display()
    )))
}
