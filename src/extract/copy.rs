use crate::error::{PavError, PavResult};
use std::fs;
use std::path::Path;
use walkdir::WalkDir;

/// Recursively copy `src` to `dst`, recreating symlinks rather than
/// following them.
pub(super) fn copy_tree(src: &Path, dst: &Path) -> PavResult<()> {
    for entry in WalkDir::new(src).follow_links(false) {
        let entry = entry.map_err(|e| PavError::extraction(src, e))?;
        let rel = entry
            .path()
            .strip_prefix(src)
            .map_err(|e| PavError::extraction(entry.path(), e))?;
        let target = dst.join(rel);
        let file_type = entry.file_type();

        if file_type.is_dir() {
            fs::create_dir_all(&target).map_err(|e| PavError::extraction(&target, e))?;
        } else if file_type.is_symlink() {
            copy_symlink(entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), &target).map_err(|e| PavError::extraction(entry.path(), e))?;
        }
    }
    Ok(())
}

/// Copy a file (or directory) into `dir`, keeping its base name
pub(super) fn copy_into(src: &Path, dir: &Path) -> PavResult<()> {
    let name = src
        .file_name()
        .ok_or_else(|| PavError::extraction(src, "path has no file name"))?;
    let meta = fs::metadata(src).map_err(|e| PavError::extraction(src, e))?;
    let target = dir.join(name);

    if meta.is_dir() {
        copy_tree(src, &target)
    } else {
        fs::copy(src, &target).map_err(|e| PavError::extraction(src, e))?;
        Ok(())
    }
}

#[cfg(unix)]
fn copy_symlink(link: &Path, target: &Path) -> PavResult<()> {
    let pointee = fs::read_link(link).map_err(|e| PavError::extraction(link, e))?;
    std::os::unix::fs::symlink(&pointee, target).map_err(|e| PavError::extraction(target, e))
}

#[cfg(not(unix))]
fn copy_symlink(link: &Path, target: &Path) -> PavResult<()> {
    fs::copy(link, target).map_err(|e| PavError::extraction(link, e))?;
    Ok(())
}
