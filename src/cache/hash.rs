//! Deterministic hashing of configs, files and directories
//!
//! Configs are hashed with keys in sorted order so key insertion order never
//! matters. Files are streamed through SHA-256. Directories are not content
//! hashed; their path and (dated) mtime stand in for their contents.

use crate::error::{PavError, PavResult};
use filetime::FileTime;
use serde_json::{Map, Value};
use sha2::{Digest as _, Sha256};
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::debug;

/// SHA-256 output
pub type Digest = [u8; 32];

/// Read size when streaming files through the hasher
pub const BLOCK_SIZE: usize = 4 * 1024 * 1024;

// Separates folded components so ("ab", "c") and ("a", "bc") differ.
const SEP: &[u8] = b"\0";

/// Hash a config mapping, independent of key order.
///
/// Every value is prefixed with a type tag. Strings are hashed as their
/// bytes, other scalars as their JSON text, lists element-wise in order and
/// nested mappings recursively.
pub fn hash_config(mapping: &Map<String, Value>) -> Digest {
    let mut hasher = Sha256::new();

    let mut keys: Vec<&String> = mapping.keys().collect();
    keys.sort();

    for key in keys {
        hasher.update(key.as_bytes());
        hasher.update(SEP);
        hash_value(&mut hasher, &mapping[key.as_str()]);
    }

    finish(hasher)
}

fn finish(hasher: Sha256) -> Digest {
    let mut out = [0u8; 32];
    out.copy_from_slice(&hasher.finalize());
    out
}

// One tag byte per value type, so `true` and `"true"` hash differently.
const TAG_NULL: u8 = b'n';
const TAG_BOOL: u8 = b'b';
const TAG_NUMBER: u8 = b'i';
const TAG_STRING: u8 = b's';
const TAG_LIST: u8 = b'l';
const TAG_MAP: u8 = b'm';

fn hash_value(hasher: &mut Sha256, value: &Value) {
    match value {
        Value::Null => hasher.update([TAG_NULL]),
        Value::Bool(b) => {
            hasher.update([TAG_BOOL]);
            hasher.update(if *b { b"1" } else { b"0" });
        }
        Value::Number(n) => {
            hasher.update([TAG_NUMBER]);
            hasher.update(n.to_string().as_bytes());
        }
        Value::String(s) => {
            hasher.update([TAG_STRING]);
            hasher.update(s.as_bytes());
        }
        Value::Array(items) => {
            hasher.update([TAG_LIST]);
            hasher.update((items.len() as u64).to_le_bytes());
            for item in items {
                hash_value(hasher, item);
            }
        }
        Value::Object(map) => {
            hasher.update([TAG_MAP]);
            hasher.update(hash_config(map));
        }
    }
    hasher.update(SEP);
}

/// Hash a file's contents in `BLOCK_SIZE` chunks
pub fn hash_file(path: &Path) -> PavResult<Digest> {
    let mut file = File::open(path)
        .map_err(|e| PavError::io(format!("opening {} for hashing", path.display()), e))?;

    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; BLOCK_SIZE];
    loop {
        let n = file
            .read(&mut buf)
            .map_err(|e| PavError::io(format!("reading {} for hashing", path.display()), e))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }

    Ok(finish(hasher))
}

/// Identity token for a directory: its path plus its modification time.
///
/// Only meaningful after the directory has been dated with
/// [`crate::source::date_dir`], otherwise changes deep in the tree are missed.
pub fn hash_dir_identity(path: &Path) -> PavResult<String> {
    let meta = fs::metadata(path)
        .map_err(|e| PavError::io(format!("reading metadata of {}", path.display()), e))?;
    let mtime = FileTime::from_last_modification_time(&meta);
    let secs = mtime.unix_seconds() as f64 + f64::from(mtime.nanoseconds()) / 1e9;

    Ok(format!("{} {:.5}", path.display(), secs))
}

/// Caller-owned memo of file digests, scoped to one key computation
#[derive(Debug, Default)]
pub struct FileHashes {
    seen: HashMap<PathBuf, Digest>,
}

impl FileHashes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hash `path`, reusing an earlier digest of the same path
    pub fn hash_file(&mut self, path: &Path) -> PavResult<Digest> {
        if let Some(digest) = self.seen.get(path) {
            debug!("Reusing digest of {}", path.display());
            return Ok(*digest);
        }

        let digest = hash_file(path)?;
        self.seen.insert(path.to_path_buf(), digest);
        Ok(digest)
    }
}
