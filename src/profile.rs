//! Site profile unpacking.
//!
//! A profile is either the name of a `site-*` directory shipped with the
//! release or a ZIP archive containing one. Archives are unpacked into a
//! staging area, copied into the project, and the staging area is removed.

use crate::archive::{ArchiveFormat, ArchiveHandle};
use crate::error::{Error, Result};
use crate::extract::{ArchiveExtractor, ExtractionError};
use crate::mirror::mirror;
use crate::staging::{self, StagingArea};
use camino::{Utf8Path, Utf8PathBuf};

const UNPACK_DIR: &str = "profile";

/// Unpack `profile` into `project_dir` when it is a ZIP archive and return
/// the name of its top-level directory. Other profile names are returned
/// unchanged.
///
/// # Errors
///
/// Returns [`Error::Extraction`] when the archive cannot be unpacked or
/// holds no directory, and [`Error::Io`] when copying fails.
pub fn extract_profile(
    profile: &str,
    project_dir: &Utf8Path,
    extractor: &dyn ArchiveExtractor,
) -> Result<String> {
    if ArchiveFormat::from_name(profile) != Some(ArchiveFormat::Zip) {
        return Ok(profile.to_owned());
    }

    let staging = StagingArea::create_in(project_dir)?;
    let result = unpack(profile, project_dir, &staging, extractor);
    staging::release(staging);
    result
}

fn unpack(
    profile: &str,
    project_dir: &Utf8Path,
    staging: &StagingArea,
    extractor: &dyn ArchiveExtractor,
) -> Result<String> {
    let handle = ArchiveHandle::new(profile, ArchiveFormat::Zip);
    let unpacked = staging.file(UNPACK_DIR);
    extractor.extract(&handle, &unpacked, true)?;

    let name = first_directory(&unpacked)?.ok_or_else(|| {
        Error::Extraction(ExtractionError::Failed {
            destination: unpacked.clone(),
            reason: format!("profile {profile} contains no site directory"),
        })
    })?;
    mirror(&unpacked, project_dir)?;
    log::debug!("installed profile {name} from {profile}");
    Ok(name)
}

fn first_directory(dir: &Utf8Path) -> std::io::Result<Option<String>> {
    let mut names: Vec<String> = dir
        .read_dir_utf8()?
        .filter_map(std::result::Result::ok)
        .filter(|entry| entry.file_type().is_ok_and(|kind| kind.is_dir()))
        .map(|entry| entry.file_name().to_owned())
        .collect();
    names.sort();
    Ok(names.into_iter().next())
}

/// Location of a named profile inside a project.
#[must_use]
pub fn profile_dir(project_dir: &Utf8Path, name: &str) -> Utf8PathBuf {
    project_dir.join(name)
}
