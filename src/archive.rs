//! Archive formats and handles.

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use std::fmt;

/// Supported compressed container formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ArchiveFormat {
    /// ZIP container.
    Zip,
    /// Gzip-compressed tarball.
    TarGz,
}

impl ArchiveFormat {
    /// File extension written for staged downloads.
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Zip => "zip",
            Self::TarGz => "tar.gz",
        }
    }

    /// Detect the format from a file name or URL path.
    ///
    /// # Examples
    ///
    /// ```
    /// use wirefetch::archive::ArchiveFormat;
    ///
    /// assert_eq!(ArchiveFormat::from_name("pw.zip"), Some(ArchiveFormat::Zip));
    /// assert_eq!(ArchiveFormat::from_name("https://x.test/a.tgz?dl=1"), Some(ArchiveFormat::TarGz));
    /// assert_eq!(ArchiveFormat::from_name("notes.txt"), None);
    /// ```
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        let path = name.split(['?', '#']).next().unwrap_or_default();
        let lower = path.to_ascii_lowercase();
        if lower.ends_with(".zip") {
            Some(Self::Zip)
        } else if lower.ends_with(".tar.gz") || lower.ends_with(".tgz") {
            Some(Self::TarGz)
        } else {
            None
        }
    }

    /// Lower ranks compress better and are preferred.
    const fn rank(self) -> u8 {
        match self {
            Self::TarGz => 0,
            Self::Zip => 1,
        }
    }

    /// Pick the smallest available format among candidate URLs.
    ///
    /// Candidates whose format is not recognised are ignored; ties keep the
    /// first candidate.
    #[must_use]
    pub fn preferred(candidates: &[String]) -> Option<(&str, Self)> {
        candidates
            .iter()
            .filter_map(|url| Self::from_name(url).map(|format| (url.as_str(), format)))
            .min_by_key(|(_, format)| format.rank())
    }
}

impl fmt::Display for ArchiveFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// An archive on disk awaiting extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveHandle {
    source_path: Utf8PathBuf,
    format: ArchiveFormat,
}

impl ArchiveHandle {
    /// Wrap an archive at `source_path` with a known format.
    #[must_use]
    pub fn new(source_path: impl Into<Utf8PathBuf>, format: ArchiveFormat) -> Self {
        Self {
            source_path: source_path.into(),
            format,
        }
    }

    /// Wrap an archive whose format is implied by its file name.
    #[must_use]
    pub fn detect(source_path: &Utf8Path) -> Option<Self> {
        ArchiveFormat::from_name(source_path.as_str()).map(|format| Self::new(source_path, format))
    }

    /// Location of the archive.
    #[must_use]
    pub fn source_path(&self) -> &Utf8Path {
        &self.source_path
    }

    /// Container format.
    #[must_use]
    pub const fn format(&self) -> ArchiveFormat {
        self.format
    }
}
