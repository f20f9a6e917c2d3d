//! Archive validation and extraction.
//!
//! Extraction happens in two passes. The first reads the whole container
//! without writing anything, so corrupted or empty archives are rejected
//! before the destination is touched. The second unpacks entries, eliding a
//! single shared top-level directory when asked, and refuses entries that
//! would land outside the destination (zip-slip).

use crate::archive::{ArchiveFormat, ArchiveHandle};
use camino::{Utf8Path, Utf8PathBuf};
use flate2::read::GzDecoder;
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Component, Path, PathBuf};

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Errors arising from archive extraction.
#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    /// The file is not a readable container of the expected format.
    #[error("archive {archive} is corrupted: {reason}")]
    Corrupted {
        /// The archive path.
        archive: Utf8PathBuf,
        /// What failed to decode.
        reason: String,
    },

    /// The file is zero bytes long or the container has no entries.
    #[error("archive {archive} is empty")]
    Empty {
        /// The archive path.
        archive: Utf8PathBuf,
    },

    /// The destination cannot be created or written.
    #[error("cannot write to {destination}: {reason}")]
    Permission {
        /// The destination directory.
        destination: Utf8PathBuf,
        /// Underlying failure.
        reason: String,
    },

    /// Unpacking failed part-way.
    #[error("extraction into {destination} failed: {reason}")]
    Failed {
        /// The destination directory.
        destination: Utf8PathBuf,
        /// Underlying failure.
        reason: String,
    },
}

impl ExtractionError {
    /// Remediation text for the CLI.
    #[must_use]
    pub fn hint(&self) -> String {
        match self {
            Self::Corrupted { .. } => {
                "the downloaded package is corrupted; run the command again to re-download it"
                    .to_owned()
            }
            Self::Empty { .. } => {
                "the package is empty; check the source archive and run the command again"
                    .to_owned()
            }
            Self::Permission { destination, .. } => {
                format!("check that {destination} is writable and run the command again")
            }
            Self::Failed { .. } => {
                "the package could not be unpacked; check disk space and permissions, then run the command again"
                    .to_owned()
            }
        }
    }
}

/// Trait for extracting archives, enabling test mocking.
///
/// # Examples
///
/// ```no_run
/// use camino::Utf8Path;
/// use wirefetch::archive::{ArchiveFormat, ArchiveHandle};
/// use wirefetch::extract::{ArchiveExtractor, NativeExtractor};
///
/// let handle = ArchiveHandle::new("/tmp/pw.zip", ArchiveFormat::Zip);
/// NativeExtractor.extract(&handle, Utf8Path::new("/srv/site"), true)?;
/// # Ok::<(), wirefetch::extract::ExtractionError>(())
/// ```
#[cfg_attr(test, mockall::automock)]
pub trait ArchiveExtractor {
    /// Extract `handle` into `destination`, eliding a shared top-level
    /// directory when `strip_root` is set.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractionError::Empty`] or [`ExtractionError::Corrupted`]
    /// before touching `destination`, [`ExtractionError::Permission`] when
    /// `destination` is not writable, and [`ExtractionError::Failed`] for
    /// anything that goes wrong while unpacking.
    fn extract(
        &self,
        handle: &ArchiveHandle,
        destination: &Utf8Path,
        strip_root: bool,
    ) -> Result<(), ExtractionError>;
}

/// Extractor built on the `zip`, `tar`, and `flate2` crates.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeExtractor;

impl ArchiveExtractor for NativeExtractor {
    fn extract(
        &self,
        handle: &ArchiveHandle,
        destination: &Utf8Path,
        strip_root: bool,
    ) -> Result<(), ExtractionError> {
        let entries = inspect(handle)?;
        ensure_writable(destination)?;

        let root = if strip_root {
            shared_root(&entries)
        } else {
            None
        };
        let context = Unpack {
            destination,
            root: root.as_deref(),
        };
        let written = match handle.format() {
            ArchiveFormat::Zip => context.zip(handle.source_path()),
            ArchiveFormat::TarGz => context.tar_gz(handle.source_path()),
        }
        .map_err(|err| failed(destination, err))?;

        if written == 0 && entries.iter().any(|entry| !entry.is_dir) {
            return Err(failed(
                destination,
                "the archive lists files but none were written",
            ));
        }
        log::debug!(
            "extracted {written} files from {} into {destination}",
            handle.source_path()
        );
        Ok(())
    }
}

/// A listed entry, recorded during validation.
#[derive(Debug)]
struct ListedEntry {
    path: PathBuf,
    is_dir: bool,
}

fn inspect(handle: &ArchiveHandle) -> Result<Vec<ListedEntry>, ExtractionError> {
    let archive = handle.source_path();
    let metadata = fs::metadata(archive).map_err(|err| corrupted(archive, err))?;
    if metadata.len() == 0 {
        return Err(ExtractionError::Empty {
            archive: archive.to_owned(),
        });
    }

    let entries = match handle.format() {
        ArchiveFormat::Zip => list_zip(archive),
        ArchiveFormat::TarGz => list_tar_gz(archive),
    }
    .map_err(|err| corrupted(archive, err))?;

    if entries.is_empty() {
        return Err(ExtractionError::Empty {
            archive: archive.to_owned(),
        });
    }
    Ok(entries)
}

fn list_zip(archive: &Utf8Path) -> io::Result<Vec<ListedEntry>> {
    let zip = zip::ZipArchive::new(File::open(archive)?).map_err(io::Error::other)?;
    Ok(zip
        .file_names()
        .map(|name| ListedEntry {
            path: PathBuf::from(name),
            is_dir: name.ends_with('/'),
        })
        .collect())
}

fn list_tar_gz(archive: &Utf8Path) -> io::Result<Vec<ListedEntry>> {
    let mut file = File::open(archive)?;
    let mut magic = [0_u8; 2];
    file.read_exact(&mut magic)?;
    if magic != GZIP_MAGIC {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "not a gzip stream",
        ));
    }

    let mut tar = tar::Archive::new(GzDecoder::new(File::open(archive)?));
    let mut listed = Vec::new();
    for entry in tar.entries()? {
        let entry = entry?;
        let kind = entry.header().entry_type();
        if is_metadata_entry(kind) {
            continue;
        }
        listed.push(ListedEntry {
            path: entry.path()?.into_owned(),
            is_dir: kind.is_dir(),
        });
    }
    Ok(listed)
}

fn is_metadata_entry(kind: tar::EntryType) -> bool {
    kind.is_pax_global_extensions() || kind.is_pax_local_extensions()
}

fn ensure_writable(destination: &Utf8Path) -> Result<(), ExtractionError> {
    let denied = |err: io::Error| ExtractionError::Permission {
        destination: destination.to_owned(),
        reason: err.to_string(),
    };
    fs::create_dir_all(destination).map_err(denied)?;
    tempfile::Builder::new()
        .prefix(".wirefetch-probe")
        .tempfile_in(destination)
        .map_err(denied)?;
    Ok(())
}

/// The single top-level directory shared by every entry, if any.
fn shared_root(entries: &[ListedEntry]) -> Option<OsString> {
    let mut root: Option<&std::ffi::OsStr> = None;
    let mut has_nested = false;
    for entry in entries {
        let mut components = entry
            .path
            .components()
            .filter(|component| !matches!(component, Component::CurDir));
        let Some(Component::Normal(first)) = components.next() else {
            return None;
        };
        match root {
            None => root = Some(first),
            Some(existing) if existing == first => {}
            Some(_) => return None,
        }
        if components.next().is_some() {
            has_nested = true;
        } else if !entry.is_dir {
            return None;
        }
    }
    if has_nested {
        root.map(std::ffi::OsStr::to_os_string)
    } else {
        None
    }
}

/// Validate that an entry path does not escape the destination directory
/// via `..` components or absolute paths.
fn validate_entry_path(path: &Path) -> io::Result<()> {
    let escapes = path.is_absolute()
        || path
            .components()
            .any(|component| matches!(component, Component::ParentDir | Component::Prefix(_)));
    if escapes {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("path traversal detected: {}", path.display()),
        ));
    }
    Ok(())
}

/// Reject link entries that could point outside the destination.
///
/// Symlinks must use relative targets without `..`; hard links are not
/// supported at all.
fn validate_link<R: Read>(entry: &tar::Entry<'_, R>, entry_path: &Path) -> io::Result<()> {
    let kind = entry.header().entry_type();
    if kind.is_hard_link() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("hard link entries are not supported: {}", entry_path.display()),
        ));
    }
    if kind.is_symlink() {
        let Some(link) = entry.link_name()? else {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("symlink without a target: {}", entry_path.display()),
            ));
        };
        validate_entry_path(&link)?;
    }
    Ok(())
}

struct Unpack<'a> {
    destination: &'a Utf8Path,
    root: Option<&'a std::ffi::OsStr>,
}

impl Unpack<'_> {
    /// Map an archive path to its target, or `None` when it is the elided
    /// root itself.
    fn target(&self, entry_path: &Path) -> io::Result<Option<PathBuf>> {
        validate_entry_path(entry_path)?;
        let mut components = entry_path
            .components()
            .filter(|component| !matches!(component, Component::CurDir))
            .peekable();
        if let (Some(root), Some(Component::Normal(first))) = (self.root, components.peek()) {
            if *first == root {
                components.next();
            }
        }
        let relative: PathBuf = components.collect();
        if relative.as_os_str().is_empty() {
            return Ok(None);
        }
        Ok(Some(self.destination.as_std_path().join(relative)))
    }

    fn zip(&self, archive: &Utf8Path) -> io::Result<usize> {
        let mut zip = zip::ZipArchive::new(File::open(archive)?).map_err(io::Error::other)?;
        let mut written = 0;
        for index in 0..zip.len() {
            let mut entry = zip.by_index(index).map_err(io::Error::other)?;
            let Some(name) = entry.enclosed_name() else {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("path traversal detected: {}", entry.name()),
                ));
            };
            let Some(target) = self.target(&name)? else {
                continue;
            };
            log::trace!("unpacking {}", target.display());

            if entry.is_dir() {
                fs::create_dir_all(&target)?;
                continue;
            }
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut out = File::create(&target)?;
            io::copy(&mut entry, &mut out)?;
            apply_mode(&target, entry.unix_mode())?;
            written += 1;
        }
        Ok(written)
    }

    fn tar_gz(&self, archive: &Utf8Path) -> io::Result<usize> {
        let mut tar = tar::Archive::new(GzDecoder::new(File::open(archive)?));
        let mut written = 0;
        for entry in tar.entries()? {
            let mut entry = entry?;
            let kind = entry.header().entry_type();
            if is_metadata_entry(kind) {
                continue;
            }
            let entry_path = entry.path()?.into_owned();
            validate_link(&entry, &entry_path)?;
            let Some(target) = self.target(&entry_path)? else {
                continue;
            };
            log::trace!("unpacking {}", target.display());

            if kind.is_dir() {
                fs::create_dir_all(&target)?;
                continue;
            }
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            entry.unpack(&target)?;
            if kind.is_file() {
                written += 1;
            }
        }
        Ok(written)
    }
}

#[cfg(unix)]
fn apply_mode(target: &Path, mode: Option<u32>) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    match mode {
        Some(mode) => fs::set_permissions(target, fs::Permissions::from_mode(mode & 0o7777)),
        None => Ok(()),
    }
}

#[cfg(not(unix))]
fn apply_mode(_target: &Path, _mode: Option<u32>) -> io::Result<()> {
    Ok(())
}

fn corrupted(archive: &Utf8Path, reason: impl std::fmt::Display) -> ExtractionError {
    ExtractionError::Corrupted {
        archive: archive.to_owned(),
        reason: reason.to_string(),
    }
}

fn failed(destination: &Utf8Path, reason: impl std::fmt::Display) -> ExtractionError {
    ExtractionError::Failed {
        destination: destination.to_owned(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
#[path = "extract_tests.rs"]
mod tests;
