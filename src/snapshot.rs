//! The locally installed core and modules.
//!
//! [`LocalSnapshotProvider`] is the seam between reconciliation and the
//! hosting installation. [`FilesystemSnapshot`] reads an install root
//! directly: the core version from its descriptor, module versions from
//! `<Name>.info.json` files or the `getModuleInfo` arrays in module sources.

use crate::error::{Error, Result};
use crate::module_install::MODULES_SUBDIR;
use crate::probe::parse_version;
use crate::version::{
    JsonVersion, ReleaseVersion, VersionRequirement, parse_module_version, parse_requirement_entry,
};
use camino::{Utf8Path, Utf8PathBuf};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::collections::BTreeMap;

/// Default number of parent directories searched for an install root.
pub const MAX_ASCENT: usize = 16;

/// Core descriptor relative to an install root.
pub const CORE_DESCRIPTOR: &str = "wire/core/ProcessWire.php";

/// Component name under which the core version is reported.
pub const CORE_NAME: &str = "ProcessWire";

static MODULE_VERSION: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r#"['"]version['"]\s*=>\s*['"]?([0-9][0-9.]*)"#).ok());
static MODULE_TITLE: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r#"['"]title['"]\s*=>\s*['"]([^'"]*)['"]"#).ok());

/// An installed module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalComponent {
    /// Module class name.
    pub name: String,
    /// Human-readable title.
    pub title: String,
    /// Installed version.
    pub version: ReleaseVersion,
    /// Declared requirements on other components.
    pub requires_versions: BTreeMap<String, VersionRequirement>,
}

impl LocalComponent {
    /// A component with no declared requirements.
    #[must_use]
    pub fn new(name: impl Into<String>, title: impl Into<String>, version: ReleaseVersion) -> Self {
        Self {
            name: name.into(),
            title: title.into(),
            version,
            requires_versions: BTreeMap::new(),
        }
    }
}

/// Source of the installed core version and module set.
#[cfg_attr(test, mockall::automock)]
pub trait LocalSnapshotProvider {
    /// Version of the installed core.
    ///
    /// # Errors
    ///
    /// Returns an error when the installation cannot be read.
    fn core_version(&self) -> Result<ReleaseVersion>;

    /// Installed modules, sorted by name.
    ///
    /// # Errors
    ///
    /// Returns an error when the installation cannot be read.
    fn components(&self) -> Result<Vec<LocalComponent>>;
}

/// [`LocalSnapshotProvider`] reading an install root on disk.
#[derive(Debug, Clone)]
pub struct FilesystemSnapshot {
    root: Utf8PathBuf,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ModuleInfoFile {
    title: Option<String>,
    version: Option<JsonVersion>,
    requires: Option<RequiresField>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RequiresField {
    One(String),
    Many(Vec<String>),
}

impl FilesystemSnapshot {
    /// Read the installation at `root`.
    #[must_use]
    pub fn new(root: impl Into<Utf8PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The install root.
    #[must_use]
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    /// The modules directory.
    #[must_use]
    pub fn modules_dir(&self) -> Utf8PathBuf {
        self.root.join(MODULES_SUBDIR)
    }

    fn read_component(dir: &Utf8Path, name: &str) -> Option<LocalComponent> {
        let info = dir.join(format!("{name}.info.json"));
        if let Ok(text) = std::fs::read_to_string(&info) {
            return match serde_json::from_str::<ModuleInfoFile>(&text) {
                Ok(parsed) => Some(component_from_info(name, parsed)),
                Err(err) => {
                    log::warn!("ignoring unreadable {info}: {err}");
                    Some(LocalComponent::new(name, name, ReleaseVersion::Unknown))
                }
            };
        }

        ["module.php", "module"].iter().find_map(|extension| {
            let source = std::fs::read_to_string(dir.join(format!("{name}.{extension}"))).ok()?;
            Some(component_from_source(name, &source))
        })
    }
}

fn component_from_info(name: &str, info: ModuleInfoFile) -> LocalComponent {
    let version = info
        .version
        .as_ref()
        .map_or(ReleaseVersion::Unknown, JsonVersion::to_release_version);
    let requires: Vec<String> = match info.requires {
        Some(RequiresField::One(entry)) => entry.split(',').map(str::to_owned).collect(),
        Some(RequiresField::Many(entries)) => entries,
        None => Vec::new(),
    };
    LocalComponent {
        name: name.to_owned(),
        title: info.title.unwrap_or_else(|| name.to_owned()),
        version,
        requires_versions: requires
            .iter()
            .filter_map(|entry| parse_requirement_entry(entry))
            .collect(),
    }
}

fn component_from_source(name: &str, source: &str) -> LocalComponent {
    let capture = |pattern: &Lazy<Option<Regex>>| {
        pattern
            .as_ref()
            .and_then(|regex| regex.captures(source))
            .and_then(|captures| captures.get(1))
            .map(|found| found.as_str().to_owned())
    };
    let version = capture(&MODULE_VERSION)
        .map_or(ReleaseVersion::Unknown, |raw| parse_module_version(&raw));
    let title = capture(&MODULE_TITLE).unwrap_or_else(|| name.to_owned());
    LocalComponent::new(name, title, version)
}

impl LocalSnapshotProvider for FilesystemSnapshot {
    fn core_version(&self) -> Result<ReleaseVersion> {
        let descriptor = self.root.join(CORE_DESCRIPTOR);
        match std::fs::read_to_string(&descriptor) {
            Ok(text) => Ok(parse_version(&text)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                log::warn!("no core descriptor at {descriptor}");
                Ok(ReleaseVersion::Unknown)
            }
            Err(err) => Err(err.into()),
        }
    }

    fn components(&self) -> Result<Vec<LocalComponent>> {
        let modules_dir = self.modules_dir();
        let entries = match modules_dir.read_dir_utf8() {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };

        let mut components = Vec::new();
        for entry in entries {
            let entry = entry?;
            let name = entry.file_name();
            if name.starts_with('.') || !entry.file_type()?.is_dir() {
                continue;
            }
            match Self::read_component(entry.path(), name) {
                Some(component) => components.push(component),
                None => log::debug!("{} holds no module definition", entry.path()),
            }
        }
        components.sort_by(|left, right| left.name.cmp(&right.name));
        Ok(components)
    }
}

/// Find the install root at, below, or above `start`.
///
/// Each examined directory is checked itself, then its immediate children,
/// before moving to its parent. At most `max_ascent` parents are examined.
///
/// # Errors
///
/// Returns [`Error::InstallRootNotFound`] when the search is exhausted.
pub fn locate_install_root(start: &Utf8Path, max_ascent: usize) -> Result<Utf8PathBuf> {
    let mut current = Some(start);
    for _ in 0..=max_ascent {
        let Some(dir) = current else {
            break;
        };
        if is_install_root(dir) {
            return Ok(dir.to_owned());
        }
        if let Some(child) = child_install_root(dir) {
            return Ok(child);
        }
        current = dir.parent();
    }
    Err(Error::InstallRootNotFound {
        start: start.to_owned(),
        max_ascent,
    })
}

fn is_install_root(dir: &Utf8Path) -> bool {
    dir.join(CORE_DESCRIPTOR).is_file()
}

fn child_install_root(dir: &Utf8Path) -> Option<Utf8PathBuf> {
    let mut candidates: Vec<Utf8PathBuf> = dir
        .read_dir_utf8()
        .ok()?
        .filter_map(std::result::Result::ok)
        .map(|entry| entry.path().to_owned())
        .filter(|path| is_install_root(path))
        .collect();
    candidates.sort();
    candidates.into_iter().next()
}
