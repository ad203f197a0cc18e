//! Source format detection by content inspection

use crate::error::{PavError, PavResult};
use bzip2::read::MultiBzDecoder;
use flate2::read::MultiGzDecoder;
use std::fmt;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use xz2::read::XzDecoder;

const GZIP_MAGIC: &[u8] = &[0x1f, 0x8b];
const BZIP2_MAGIC: &[u8] = b"BZh";
const XZ_MAGIC: &[u8] = &[0xfd, b'7', b'z', b'X', b'Z', 0x00];
const ZIP_MAGICS: &[&[u8]] = &[b"PK\x03\x04", b"PK\x05\x06"];

const TAR_BLOCK: usize = 512;
const TAR_MAGIC_OFFSET: usize = 257;

/// Single-stream compression wrapping a file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Codec {
    Plain,
    Gzip,
    Bzip2,
    Xz,
}

impl Codec {
    fn sniff(head: &[u8]) -> Self {
        if head.starts_with(GZIP_MAGIC) {
            Self::Gzip
        } else if head.starts_with(BZIP2_MAGIC) {
            Self::Bzip2
        } else if head.starts_with(XZ_MAGIC) {
            Self::Xz
        } else {
            Self::Plain
        }
    }

    /// Decompressing reader over `file`
    pub fn reader(self, file: File) -> Box<dyn Read> {
        let file = BufReader::new(file);
        match self {
            Self::Plain => Box::new(file),
            Self::Gzip => Box::new(MultiGzDecoder::new(file)),
            Self::Bzip2 => Box::new(MultiBzDecoder::new(file)),
            Self::Xz => Box::new(XzDecoder::new_multi_decoder(file)),
        }
    }

    /// File name suffixes conventionally used for this codec
    pub fn suffixes(self) -> &'static [&'static str] {
        match self {
            Self::Plain => &[],
            Self::Gzip => &[".gz", ".gzip", ".z"],
            Self::Bzip2 => &[".bz2", ".bzip2"],
            Self::Xz => &[".xz", ".lzma"],
        }
    }

    /// `file_name` without this codec's suffix, if it carries one
    pub fn strip_suffix(self, file_name: &str) -> String {
        let lower = file_name.to_ascii_lowercase();
        self.suffixes()
            .iter()
            .find(|suffix| lower.ends_with(*suffix) && lower.len() > suffix.len())
            .map(|suffix| file_name[..file_name.len() - suffix.len()].to_string())
            .unwrap_or_else(|| file_name.to_string())
    }
}

impl fmt::Display for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Plain => "plain",
            Self::Gzip => "gzip",
            Self::Bzip2 => "bzip2",
            Self::Xz => "xz",
        };
        write!(f, "{}", name)
    }
}

/// How a build source gets materialized
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    /// Copied recursively
    Directory,
    /// Tar container, possibly compressed
    Tar(Codec),
    /// Zip archive
    Zip,
    /// A single compressed stream that is not a tar
    Compressed(Codec),
    /// Anything else, copied verbatim
    PlainFile,
}

impl ArchiveKind {
    /// Inspect `path` and decide how to materialize it
    pub fn detect(path: &Path) -> PavResult<Self> {
        let meta = std::fs::metadata(path).map_err(|e| PavError::extraction(path, e))?;
        if meta.is_dir() {
            return Ok(Self::Directory);
        }

        let file = File::open(path).map_err(|e| PavError::extraction(path, e))?;
        let head = read_head(file.take(TAR_BLOCK as u64));

        if ZIP_MAGICS.iter().any(|magic| head.starts_with(magic)) {
            return Ok(Self::Zip);
        }

        let kind = match Codec::sniff(&head) {
            Codec::Plain if is_tar_header(&head) => Self::Tar(Codec::Plain),
            Codec::Plain => Self::PlainFile,
            codec => {
                let file = File::open(path).map_err(|e| PavError::extraction(path, e))?;
                let inner = read_head(codec.reader(file).take(TAR_BLOCK as u64));
                if is_tar_header(&inner) {
                    Self::Tar(codec)
                } else {
                    Self::Compressed(codec)
                }
            }
        };
        Ok(kind)
    }
}

impl fmt::Display for ArchiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Directory => write!(f, "directory"),
            Self::Tar(Codec::Plain) => write!(f, "tar"),
            Self::Tar(codec) => write!(f, "tar+{}", codec),
            Self::Zip => write!(f, "zip"),
            Self::Compressed(codec) => write!(f, "{}", codec),
            Self::PlainFile => write!(f, "file"),
        }
    }
}

/// Read up to the reader's limit; a decode error just ends the head early.
fn read_head(mut reader: impl Read) -> Vec<u8> {
    let mut head = Vec::with_capacity(TAR_BLOCK);
    let mut buf = [0u8; TAR_BLOCK];
    loop {
        match reader.read(&mut buf) {
            Ok(0) | Err(_) => break,
            Ok(n) => head.extend_from_slice(&buf[..n]),
        }
    }
    head
}

/// A ustar magic, or failing that a valid v7 header checksum
fn is_tar_header(block: &[u8]) -> bool {
    if block.len() < TAR_BLOCK {
        return false;
    }
    if &block[TAR_MAGIC_OFFSET..TAR_MAGIC_OFFSET + 5] == b"ustar" {
        return true;
    }

    let field = &block[148..156];
    let digits: String = field
        .iter()
        .take_while(|b| **b != 0)
        .map(|b| *b as char)
        .collect();
    let Ok(stored) = u32::from_str_radix(digits.trim(), 8) else {
        return false;
    };
    let computed: u32 = block[..TAR_BLOCK]
        .iter()
        .enumerate()
        .map(|(i, b)| if (148..156).contains(&i) { 32 } else { u32::from(*b) })
        .sum();
    stored == computed
}
