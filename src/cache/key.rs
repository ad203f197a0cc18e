//! Build keys
//!
//! A build key is the truncated SHA-256 of everything a build consumes, in
//! this order:
//! 1. the build config section (keys sorted)
//! 2. the source: file digest, or directory identity token
//! 3. each extra file, in declared order
//! 4. the `specificity` string
//!
//! Eight bytes keep build directory names short. For 10 million builds the
//! birthday bound puts the collision chance near 0.0003%.

use crate::cache::hash::{hash_config, hash_dir_identity, FileHashes};
use crate::error::{PavError, PavResult};
use crate::source::{date_dir, ResolvedSource, SourceKind, SourceResolver};
use crate::test_run::BuildConfig;
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use tracing::debug;

/// Bytes of digest kept in a build key
pub const BUILD_KEY_BYTES: usize = 8;

/// Truncated digest identifying a build's inputs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BuildKey([u8; BUILD_KEY_BYTES]);

impl BuildKey {
    /// Compute the key for `build` with its already-resolved source.
    ///
    /// Extra files are looked up through `resolver`; directories among them
    /// are dated before their identity token is taken.
    pub fn compute(
        build: &BuildConfig,
        source: Option<&ResolvedSource>,
        resolver: &SourceResolver,
        memo: &mut FileHashes,
    ) -> PavResult<Self> {
        let mut hasher = Sha256::new();

        hasher.update(hash_config(&build.raw));

        if let Some(source) = source {
            match source.kind {
                SourceKind::File | SourceKind::Remote => {
                    hasher.update(memo.hash_file(&source.path)?);
                }
                SourceKind::Directory => {
                    hasher.update(hash_dir_identity(&source.path)?.as_bytes());
                }
            }
        }

        for extra in &build.extra_files {
            let path = resolver.require_file(extra)?;
            if path.is_file() {
                hasher.update(memo.hash_file(&path)?);
            } else if path.is_dir() {
                date_dir(&path)?;
                hasher.update(hash_dir_identity(&path)?.as_bytes());
            } else {
                return Err(PavError::SourceUnusable(path));
            }
        }

        hasher.update(build.specificity.as_bytes());

        let digest = hasher.finalize();
        let mut bytes = [0u8; BUILD_KEY_BYTES];
        bytes.copy_from_slice(&digest[..BUILD_KEY_BYTES]);

        let key = Self(bytes);
        debug!("Computed build key {}", key);
        Ok(key)
    }

    /// Recover the key from a build path ending in `-<hex key>`
    pub fn from_build_path(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_str()?;
        let (_, hash) = name.rsplit_once('-')?;
        hash.parse().ok()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for BuildKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl FromStr for BuildKey {
    type Err = PavError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bytes = [0u8; BUILD_KEY_BYTES];
        hex::decode_to_slice(s, &mut bytes)
            .map_err(|e| PavError::User(format!("invalid build key '{}': {}", s, e)))?;
        Ok(Self(bytes))
    }
}

/// Directory name of a build: `<test name>-<key>`
pub fn build_name(test_name: &str, key: &BuildKey) -> String {
    format!("{}-{}", test_name, key)
}
