//! Build source resolution
//!
//! Turns a build's `source_location` into a local path:
//! 1. URL: fetched into `downloads/<name>` by a [`Fetcher`]
//! 2. Absolute path: must exist as given
//! 3. Relative path: `{config_dir}/test_src/{location}`, first match wins
//!
//! Directory sources are "dated" during resolution: their mtime is raised
//! to the newest mtime found anywhere below them.

pub mod fetch;

pub use fetch::{Fetcher, HttpFetcher};

use crate::error::{PavError, PavResult};
use crate::test_run::BuildConfig;
use filetime::FileTime;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use ureq::http::Uri;
use walkdir::WalkDir;

/// Subdirectory of each config dir that holds test sources
pub const TEST_SRC_DIR: &str = "test_src";

/// What a resolved source location points at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// A local regular file
    File,
    /// A local directory
    Directory,
    /// A local copy of a remote file
    Remote,
}

/// A source location resolved to a local path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSource {
    pub kind: SourceKind,
    pub path: PathBuf,
}

/// Resolves source locations and extra files against the search path
#[derive(Debug, Clone)]
pub struct SourceResolver {
    config_dirs: Vec<PathBuf>,
    downloads_dir: PathBuf,
}

impl SourceResolver {
    pub fn new(config_dirs: Vec<PathBuf>, downloads_dir: PathBuf) -> Self {
        Self {
            config_dirs,
            downloads_dir,
        }
    }

    /// Resolve the build's source, fetching remote sources and dating
    /// directory sources. Returns `None` when the build has no source.
    pub fn resolve(
        &self,
        build: &BuildConfig,
        fetcher: &dyn Fetcher,
    ) -> PavResult<Option<ResolvedSource>> {
        let Some(location) = build.source_location.as_deref() else {
            return Ok(None);
        };

        if is_url(location) {
            let dest = self.download_path(location, build.source_download_name.as_deref());
            if let Some(parent) = dest.parent() {
                fs::create_dir_all(parent).map_err(|e| {
                    PavError::io(format!("creating downloads dir {}", parent.display()), e)
                })?;
            }
            info!("Updating {} from {}", dest.display(), location);
            fetcher.update(location, &dest)?;
            return Ok(Some(ResolvedSource {
                kind: SourceKind::Remote,
                path: dest,
            }));
        }

        let resolved = self.local_source(location)?;
        if resolved.kind == SourceKind::Directory {
            date_dir(&resolved.path)?;
        }
        Ok(Some(resolved))
    }

    /// Like [`resolve`](Self::resolve) but without fetching or dating.
    ///
    /// Used once the build key is fixed and only the path is needed.
    pub fn locate(&self, build: &BuildConfig) -> PavResult<Option<ResolvedSource>> {
        let Some(location) = build.source_location.as_deref() else {
            return Ok(None);
        };

        if is_url(location) {
            let path = self.download_path(location, build.source_download_name.as_deref());
            if !path.is_file() {
                return Err(PavError::SourceNotFound {
                    location: location.to_string(),
                    searched: path.display().to_string(),
                });
            }
            return Ok(Some(ResolvedSource {
                kind: SourceKind::Remote,
                path,
            }));
        }

        self.local_source(location).map(Some)
    }

    fn local_source(&self, location: &str) -> PavResult<ResolvedSource> {
        let path = self.require_file(location)?;
        let kind = if path.is_dir() {
            SourceKind::Directory
        } else if path.is_file() {
            SourceKind::File
        } else {
            return Err(PavError::SourceUnusable(path));
        };
        Ok(ResolvedSource { kind, path })
    }

    /// Find `location` on disk, or `None`.
    ///
    /// Absolute paths are taken verbatim; relative ones are searched for
    /// under each config dir's `test_src/` in order.
    pub fn find_file(&self, location: &str) -> Option<PathBuf> {
        let path = Path::new(location);
        if path.is_absolute() {
            return path.exists().then(|| path.to_path_buf());
        }

        self.candidates(location).into_iter().find_map(|candidate| {
            if candidate.exists() {
                debug!("Found {} at {}", location, candidate.display());
                Some(fs::canonicalize(&candidate).unwrap_or(candidate))
            } else {
                None
            }
        })
    }

    /// [`find_file`](Self::find_file), failing with `SourceNotFound`
    pub fn require_file(&self, location: &str) -> PavResult<PathBuf> {
        self.find_file(location).ok_or_else(|| {
            let searched = if Path::new(location).is_absolute() {
                location.to_string()
            } else {
                self.candidates(location)
                    .iter()
                    .map(|p| p.display().to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            };
            PavError::SourceNotFound {
                location: location.to_string(),
                searched,
            }
        })
    }

    fn candidates(&self, location: &str) -> Vec<PathBuf> {
        self.config_dirs
            .iter()
            .map(|dir| dir.join(TEST_SRC_DIR).join(location))
            .collect()
    }

    /// Where a remote source is cached.
    ///
    /// Named by the explicit download name, else the URL's last path
    /// segment, else the SHA-256 of the URL.
    pub fn download_path(&self, url: &str, download_name: Option<&str>) -> PathBuf {
        let file_name = download_name
            .map(str::to_string)
            .or_else(|| {
                url.parse::<Uri>().ok().and_then(|uri| {
                    uri.path()
                        .rsplit('/')
                        .next()
                        .filter(|seg| !seg.is_empty())
                        .map(str::to_string)
                })
            })
            .unwrap_or_else(|| hex::encode(Sha256::digest(url.as_bytes())));

        self.downloads_dir.join(file_name)
    }
}

/// Whether `location` is a URL (has a non-empty scheme)
pub fn is_url(location: &str) -> bool {
    location
        .parse::<Uri>()
        .map(|uri| uri.scheme().is_some())
        .unwrap_or(false)
}

/// Raise a directory's mtime to the newest mtime anywhere beneath it.
///
/// The directory's identity token (see `hash_dir_identity`) then changes
/// whenever anything inside it changes.
pub fn date_dir(path: &Path) -> PavResult<()> {
    let meta = fs::metadata(path)
        .map_err(|e| PavError::io(format!("reading metadata of {}", path.display()), e))?;
    let own = FileTime::from_last_modification_time(&meta);
    let mut latest = own;

    for entry in WalkDir::new(path).min_depth(1) {
        let entry = entry.map_err(|e| PavError::io(format!("walking {}", path.display()), e.into()))?;
        let meta = entry
            .metadata()
            .map_err(|e| PavError::io(format!("reading {}", entry.path().display()), e.into()))?;
        let mtime = FileTime::from_last_modification_time(&meta);
        if mtime > latest {
            latest = mtime;
        }
    }

    if latest != own {
        let atime = FileTime::from_last_access_time(&meta);
        filetime::set_file_times(path, atime, latest)
            .map_err(|e| PavError::io(format!("setting mtime of {}", path.display()), e))?;
        debug!("Dated {} to {}", path.display(), latest.unix_seconds());
    }

    Ok(())
}
