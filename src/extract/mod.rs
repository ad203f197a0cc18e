//! Build directory materialization
//!
//! A build directory is assembled in a scratch directory next to its final
//! location and renamed into place only once complete, so a build path
//! either does not exist or holds a finished tree.
//!
//! Archives whose top level is a single directory are flattened: that
//! directory's contents become the build directory's contents.

mod copy;
pub mod kind;

pub use kind::{ArchiveKind, Codec};

use crate::error::{PavError, PavResult};
use crate::source::ResolvedSource;
use std::fs::{self, File};
use std::io;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info};

/// Name of the staged tree inside the scratch dir, when no archive member
/// supplies one.
const STAGE_DIR: &str = "build";
/// Where archives are unpacked inside the scratch dir
const UNPACK_DIR: &str = "contents";

/// A top-level member of an archive
#[derive(Debug, Clone, PartialEq, Eq)]
struct TopLevel {
    name: String,
    is_dir: bool,
}

/// Populate `dest` from `source` and `extra_files`.
///
/// `dest` must not exist; its parent must. With no source, `dest` is an
/// empty directory holding only the extra files. Nothing is left behind on
/// failure.
pub fn materialize(
    source: Option<&ResolvedSource>,
    extra_files: &[PathBuf],
    dest: &Path,
) -> PavResult<()> {
    let parent = dest
        .parent()
        .ok_or_else(|| PavError::extraction(dest, "destination has no parent directory"))?;
    let prefix = format!(
        ".{}.",
        dest.file_name().unwrap_or_default().to_string_lossy()
    );
    let scratch = tempfile::Builder::new()
        .prefix(&prefix)
        .suffix(".tmp")
        .tempdir_in(parent)
        .map_err(|e| PavError::extraction(dest, e))?;

    let staged = match source {
        Some(source) => stage_source(&source.path, scratch.path())?,
        None => {
            let staged = scratch.path().join(STAGE_DIR);
            fs::create_dir(&staged).map_err(|e| PavError::extraction(dest, e))?;
            staged
        }
    };

    for extra in extra_files {
        copy::copy_into(extra, &staged)?;
    }

    fs::rename(&staged, dest).map_err(|e| PavError::extraction(dest, e))?;
    info!("Materialized {}", dest.display());
    Ok(())
}

/// Unpack or copy `src` somewhere under `scratch`, returning the directory
/// that should become the build directory.
fn stage_source(src: &Path, scratch: &Path) -> PavResult<PathBuf> {
    let kind = ArchiveKind::detect(src)?;
    debug!("Source {} detected as {}", src.display(), kind);

    match kind {
        ArchiveKind::Directory => {
            let staged = scratch.join(STAGE_DIR);
            copy::copy_tree(src, &staged)?;
            Ok(staged)
        }
        ArchiveKind::Tar(codec) => {
            let top = tar_top_level(src, codec)?;
            let out = unpack_dir(src, scratch)?;
            let mut archive = tar::Archive::new(open_decoded(src, codec)?);
            archive
                .unpack(&out)
                .map_err(|e| PavError::extraction(src, e))?;
            flattened(src, out, &top)
        }
        ArchiveKind::Zip => {
            let file = File::open(src).map_err(|e| PavError::extraction(src, e))?;
            let mut archive =
                zip::ZipArchive::new(file).map_err(|e| PavError::extraction(src, e))?;
            let top = zip_top_level(&mut archive, src)?;
            let out = unpack_dir(src, scratch)?;
            archive
                .extract(&out)
                .map_err(|e| PavError::extraction(src, e))?;
            flattened(src, out, &top)
        }
        ArchiveKind::Compressed(codec) => {
            let staged = scratch.join(STAGE_DIR);
            fs::create_dir(&staged).map_err(|e| PavError::extraction(src, e))?;
            let name = codec.strip_suffix(&file_name(src)?);
            let mut reader = open_decoded(src, codec)?;
            let mut out =
                File::create(staged.join(name)).map_err(|e| PavError::extraction(src, e))?;
            io::copy(&mut reader, &mut out).map_err(|e| PavError::extraction(src, e))?;
            Ok(staged)
        }
        ArchiveKind::PlainFile => {
            let staged = scratch.join(STAGE_DIR);
            fs::create_dir(&staged).map_err(|e| PavError::extraction(src, e))?;
            copy::copy_into(src, &staged)?;
            Ok(staged)
        }
    }
}

fn unpack_dir(src: &Path, scratch: &Path) -> PavResult<PathBuf> {
    let out = scratch.join(UNPACK_DIR);
    fs::create_dir(&out).map_err(|e| PavError::extraction(src, e))?;
    Ok(out)
}

fn open_decoded(src: &Path, codec: Codec) -> PavResult<Box<dyn io::Read>> {
    let file = File::open(src).map_err(|e| PavError::extraction(src, e))?;
    Ok(codec.reader(file))
}

fn file_name(path: &Path) -> PavResult<String> {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| PavError::extraction(path, "path has no file name"))
}

/// The directory to stage: the lone top-level directory if there is one,
/// otherwise everything that was unpacked.
fn flattened(src: &Path, out: PathBuf, top: &[TopLevel]) -> PavResult<PathBuf> {
    match top {
        [only] if only.is_dir => {
            let inner = out.join(&only.name);
            if !inner.is_dir() {
                return Err(PavError::extraction(
                    src,
                    format!("top-level directory '{}' was not unpacked", only.name),
                ));
            }
            debug!("Flattening top-level directory {}", only.name);
            Ok(inner)
        }
        _ => Ok(out),
    }
}

fn tar_top_level(src: &Path, codec: Codec) -> PavResult<Vec<TopLevel>> {
    let mut archive = tar::Archive::new(open_decoded(src, codec)?);
    let entries = archive
        .entries()
        .map_err(|e| PavError::extraction(src, e))?;

    let mut top = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| PavError::extraction(src, e))?;
        let path = entry.path().map_err(|e| PavError::extraction(src, e))?;
        let parts: Vec<_> = path
            .components()
            .filter(|c| !matches!(c, Component::CurDir | Component::RootDir))
            .collect();
        if let [Component::Normal(name)] = parts.as_slice() {
            top.push(TopLevel {
                name: name.to_string_lossy().into_owned(),
                is_dir: entry.header().entry_type().is_dir(),
            });
        }
    }
    Ok(top)
}

fn zip_top_level(archive: &mut zip::ZipArchive<File>, src: &Path) -> PavResult<Vec<TopLevel>> {
    let mut top = Vec::new();
    for index in 0..archive.len() {
        let member = archive
            .by_index_raw(index)
            .map_err(|e| PavError::extraction(src, e))?;
        let name = member.name().trim_start_matches("./").trim_end_matches('/');
        if !name.is_empty() && !name.contains('/') {
            top.push(TopLevel {
                name: name.to_string(),
                is_dir: member.is_dir(),
            });
        }
    }
    Ok(top)
}
