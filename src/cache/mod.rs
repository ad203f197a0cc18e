//! Content-addressed build cache
//!
//! Builds are keyed by a digest of their inputs. Tests with identical build
//! inputs share one build directory, which is constructed at most once.
//!
//! # Build States
//!
//! | State | On disk | Description |
//! |-------|---------|-------------|
//! | Absent | nothing | Never built, or every attempt failed |
//! | Building | `<name>-<key>.lock` held, scratch dir | One process populating |
//! | Complete | `<name>-<key>/` | Finished; shared read-only |

pub mod build;
pub mod hash;
pub mod key;

pub use build::{BuildCache, BuildOutcome};
pub use hash::{hash_config, hash_dir_identity, hash_file, Digest, FileHashes};
pub use key::{build_name, BuildKey, BUILD_KEY_BYTES};
