//! Error types for release acquisition and module reconciliation.
//!
//! Each variant maps onto one failure a user can act on. [`Error::hint`]
//! returns the remediation text the CLI prints beneath the error itself.

use crate::extract::ExtractionError;
use crate::fetch::FetchError;
use crate::settings::SettingsError;
use camino::Utf8PathBuf;
use thiserror::Error;

/// Errors surfaced by the acquisition pipeline and the version reconciler.
#[derive(Debug, Error)]
pub enum Error {
    /// A remote endpoint could not be reached or returned unusable data.
    #[error("could not reach {url}: {reason}")]
    Network {
        /// The URL that was requested.
        url: String,
        /// Description of the failure.
        reason: String,
    },

    /// The requested release identifier does not resolve to a release.
    #[error("release `{identifier}` could not be resolved{}", resolution_detail(.status, .transport_error))]
    Resolution {
        /// The branch name or commit identifier that was requested.
        identifier: String,
        /// HTTP status returned by the check, when one was received.
        status: Option<u16>,
        /// Transport failure description, when no status was received.
        transport_error: Option<String>,
    },

    /// The release archive could not be downloaded.
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// The release archive could not be unpacked.
    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    /// The remote module catalog could not answer the lookup.
    #[error("module catalog unavailable: {reason}")]
    CatalogUnavailable {
        /// Description of the failure.
        reason: String,
    },

    /// The destination already holds files that are not a finished install.
    #[error("there is already a `{name}` project in {path}")]
    ProjectExists {
        /// Project name derived from the destination.
        name: String,
        /// The occupied destination.
        path: Utf8PathBuf,
    },

    /// A module directory already exists and is not empty.
    #[error("module `{name}` is already present in {path}")]
    ModuleExists {
        /// Module class name.
        name: String,
        /// The occupied module directory.
        path: Utf8PathBuf,
    },

    /// A local source passed in place of a download cannot be used.
    #[error("source {path} cannot be used: {reason}")]
    SourceUnusable {
        /// The rejected source path.
        path: Utf8PathBuf,
        /// Why it was rejected.
        reason: String,
    },

    /// No installation root was found near the starting directory.
    #[error("no ProcessWire installation found at or above {start} (searched {max_ascent} levels)")]
    InstallRootNotFound {
        /// Directory the search started from.
        start: Utf8PathBuf,
        /// Number of parent directories examined.
        max_ascent: usize,
    },

    /// Configuration could not be loaded.
    #[error(transparent)]
    Settings(#[from] SettingsError),

    /// An I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn resolution_detail(status: &Option<u16>, transport_error: &Option<String>) -> String {
    match (status, transport_error) {
        (Some(code), _) => format!(" (HTTP {code})"),
        (None, Some(reason)) => format!(": {reason}"),
        (None, None) => String::new(),
    }
}

impl Error {
    /// Remediation text shown beneath the error message.
    ///
    /// # Examples
    ///
    /// ```
    /// use wirefetch::error::Error;
    ///
    /// let err = Error::CatalogUnavailable { reason: "timed out".to_owned() };
    /// assert!(err.hint().contains("module service"));
    /// ```
    #[must_use]
    pub fn hint(&self) -> String {
        match self {
            Self::Network { url, .. } => {
                format!("check your network connection and that {url} is reachable, then try again")
            }
            Self::Resolution { identifier, .. } => format!(
                "check that `{identifier}` names an existing branch or commit; `master` always resolves to the latest stable release"
            ),
            Self::Fetch(err) => err.hint().to_owned(),
            Self::Extraction(err) => err.hint(),
            Self::CatalogUnavailable { .. } => {
                "check the module service URL and key (WIREFETCH_MODULE_SERVICE_URL, WIREFETCH_MODULE_SERVICE_KEY) and try again".to_owned()
            }
            Self::ProjectExists { .. } => {
                "choose a different project name or an empty directory".to_owned()
            }
            Self::ModuleExists { path, .. } => {
                format!("remove {path} first if you want to reinstall the module")
            }
            Self::SourceUnusable { .. } => {
                "pass an existing directory or a .zip, .tgz, or .tar.gz archive".to_owned()
            }
            Self::InstallRootNotFound { .. } => {
                "run the command from inside a ProcessWire project or pass its location with --path".to_owned()
            }
            Self::Settings(err) => format!("fix the configuration file at {}", err.path()),
            Self::Io(_) => "check file permissions and available disk space, then try again".to_owned(),
        }
    }
}

/// Convenience alias for results with [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
