//! Recursive directory copies.

use camino::Utf8Path;
use std::fs;
use std::io;
use walkdir::WalkDir;

/// Copy every file and directory under `source` into `destination`,
/// overwriting existing files. Returns the number of files copied.
///
/// # Errors
///
/// Returns the first I/O error encountered.
pub fn mirror(source: &Utf8Path, destination: &Utf8Path) -> io::Result<usize> {
    fs::create_dir_all(destination)?;
    let mut copied = 0;
    for entry in WalkDir::new(source).min_depth(1).follow_links(false) {
        let entry = entry.map_err(io::Error::other)?;
        let relative = entry
            .path()
            .strip_prefix(source)
            .map_err(io::Error::other)?;
        let target = destination.as_std_path().join(relative);
        let kind = entry.file_type();
        if kind.is_dir() {
            fs::create_dir_all(&target)?;
        } else if kind.is_file() {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(entry.path(), &target)?;
            copied += 1;
        } else {
            log::debug!("skipping special file {}", entry.path().display());
        }
    }
    log::debug!("mirrored {copied} files from {source} to {destination}");
    Ok(copied)
}
