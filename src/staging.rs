//! Hidden per-run staging directories.
//!
//! A [`StagingArea`] is created next to its final destination so that moving
//! files out of it never crosses a filesystem. Dropping the area removes it;
//! [`StagingArea::close`] does the same but reports failures.

use camino::{Utf8Path, Utf8PathBuf};
use std::io;
use tempfile::TempDir;

/// Prefix of every staging directory name.
pub const STAGING_PREFIX: &str = ".wirefetch-";

/// A uniquely named hidden directory owned by a single run.
#[derive(Debug)]
pub struct StagingArea {
    dir: TempDir,
    path: Utf8PathBuf,
}

impl StagingArea {
    /// Create a fresh staging directory inside `root`, creating `root` when
    /// needed.
    ///
    /// # Errors
    ///
    /// Returns an I/O error when the directory cannot be created or its path
    /// is not UTF-8.
    pub fn create_in(root: &Utf8Path) -> io::Result<Self> {
        std::fs::create_dir_all(root)?;
        let dir = tempfile::Builder::new()
            .prefix(STAGING_PREFIX)
            .tempdir_in(root)?;
        let path = Utf8PathBuf::try_from(dir.path().to_path_buf())
            .map_err(camino::FromPathBufError::into_io_error)?;
        log::debug!("created staging area {path}");
        Ok(Self { dir, path })
    }

    /// The staging directory.
    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// A path for `name` inside the staging directory.
    #[must_use]
    pub fn file(&self, name: &str) -> Utf8PathBuf {
        self.path.join(name)
    }

    /// Remove the staging directory and everything in it.
    ///
    /// # Errors
    ///
    /// Returns the I/O error raised while deleting.
    pub fn close(self) -> io::Result<()> {
        log::debug!("removing staging area {}", self.path);
        self.dir.close()
    }
}

/// Remove `staging`, logging instead of failing when deletion goes wrong.
pub fn release(staging: StagingArea) {
    let path = staging.path().to_owned();
    if let Err(err) = staging.close() {
        log::warn!("could not remove staging area {path}: {err}");
    }
}
