//! Endpoint and module-service configuration.
//!
//! Defaults point at the public ProcessWire repository and module directory.
//! A `wirefetch.toml` file may override any field, and a small set of
//! environment variables override the file.
//!
//! ```toml
//! [endpoints]
//! archive_urls = ["https://github.com/processwire/processwire/archive/{branch}.zip"]
//! lookup_timeout_ms = 4500
//!
//! [module_service]
//! url = "https://modules.processwire.com/export-json/"
//! key = "pw300"
//! ```

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Placeholder substituted with a branch name or commit identifier.
pub const BRANCH_PLACEHOLDER: &str = "{branch}";

/// Environment variable overriding [`ModuleServiceSettings::url`].
pub const ENV_MODULE_SERVICE_URL: &str = "WIREFETCH_MODULE_SERVICE_URL";
/// Environment variable overriding [`ModuleServiceSettings::key`].
pub const ENV_MODULE_SERVICE_KEY: &str = "WIREFETCH_MODULE_SERVICE_KEY";
/// Environment variable overriding [`Endpoints::lookup_timeout_ms`].
pub const ENV_LOOKUP_TIMEOUT_MS: &str = "WIREFETCH_LOOKUP_TIMEOUT_MS";

const DEFAULT_LOOKUP_TIMEOUT_MS: u64 = 4500;

/// Remote locations of the release repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Endpoints {
    /// JSON listing of branches (`[{"name": …}, …]`).
    pub branches_url: String,
    /// Version descriptor template containing [`BRANCH_PLACEHOLDER`].
    pub version_url: String,
    /// Candidate archive URL templates; the smallest format wins.
    pub archive_urls: Vec<String>,
    /// Path, relative to a project, whose presence marks a finished install.
    pub installed_marker: String,
    /// Timeout for metadata lookups, in milliseconds.
    pub lookup_timeout_ms: u64,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            branches_url: "https://api.github.com/repos/processwire/processwire/branches"
                .to_owned(),
            version_url: "https://raw.githubusercontent.com/processwire/processwire/{branch}/wire/core/ProcessWire.php"
                .to_owned(),
            archive_urls: vec![
                "https://github.com/processwire/processwire/archive/{branch}.zip".to_owned(),
            ],
            installed_marker: "site/install".to_owned(),
            lookup_timeout_ms: DEFAULT_LOOKUP_TIMEOUT_MS,
        }
    }
}

impl Endpoints {
    /// Timeout applied to branch listings, probes, and pre-flight checks.
    #[must_use]
    pub const fn lookup_timeout(&self) -> Duration {
        Duration::from_millis(self.lookup_timeout_ms)
    }

    /// Version descriptor URL for `identifier`.
    #[must_use]
    pub fn version_url_for(&self, identifier: &str) -> String {
        substitute(&self.version_url, identifier)
    }

    /// Candidate archive URLs for `identifier`, in configured order.
    #[must_use]
    pub fn archive_urls_for(&self, identifier: &str) -> Vec<String> {
        self.archive_urls
            .iter()
            .map(|template| substitute(template, identifier))
            .collect()
    }
}

/// Replace [`BRANCH_PLACEHOLDER`] in `template` with `identifier`.
///
/// # Examples
///
/// ```
/// use wirefetch::settings::substitute;
///
/// assert_eq!(substitute("https://x.test/{branch}.zip", "dev"), "https://x.test/dev.zip");
/// ```
#[must_use]
pub fn substitute(template: &str, identifier: &str) -> String {
    template.replace(BRANCH_PLACEHOLDER, identifier)
}

/// Location and credentials of the remote module catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModuleServiceSettings {
    /// Base URL of the JSON export service.
    pub url: String,
    /// API key sent as the `apikey` query parameter.
    pub key: String,
}

impl Default for ModuleServiceSettings {
    fn default() -> Self {
        Self {
            url: "https://modules.processwire.com/export-json/".to_owned(),
            key: "pw300".to_owned(),
        }
    }
}

/// Complete runtime configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Release repository endpoints.
    pub endpoints: Endpoints,
    /// Module catalog service.
    pub module_service: ModuleServiceSettings,
}

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// The configuration file could not be read.
    #[error("failed to read configuration {path}: {source}")]
    Read {
        /// Path of the configuration file.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid TOML for [`Settings`].
    #[error("invalid configuration {path}: {reason}")]
    Parse {
        /// Path of the configuration file.
        path: Utf8PathBuf,
        /// Parser message.
        reason: String,
    },

    /// An environment override holds an unusable value.
    #[error("invalid value `{value}` for {variable}")]
    InvalidOverride {
        /// Variable name.
        variable: &'static str,
        /// The rejected value.
        value: String,
    },
}

impl SettingsError {
    /// The configuration source the error refers to.
    #[must_use]
    pub fn path(&self) -> &str {
        match self {
            Self::Read { path, .. } | Self::Parse { path, .. } => path.as_str(),
            Self::InvalidOverride { variable, .. } => variable,
        }
    }
}

impl Settings {
    /// Parse settings from TOML text; `origin` is used in error messages.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::Parse`] when the text is not valid.
    pub fn from_toml_str(text: &str, origin: &Utf8Path) -> Result<Self, SettingsError> {
        toml::from_str(text).map_err(|err| SettingsError::Parse {
            path: origin.to_owned(),
            reason: err.message().to_owned(),
        })
    }

    /// Load settings from `path`, falling back to defaults when the file is
    /// absent.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError`] when the file exists but cannot be read or
    /// parsed.
    pub fn load(path: &Utf8Path) -> Result<Self, SettingsError> {
        match std::fs::read_to_string(path) {
            Ok(text) => Self::from_toml_str(&text, path),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("no configuration at {path}; using defaults");
                Ok(Self::default())
            }
            Err(source) => Err(SettingsError::Read {
                path: path.to_owned(),
                source,
            }),
        }
    }

    /// Apply environment overrides read through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::InvalidOverride`] when the timeout override
    /// is not a positive integer.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), SettingsError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_MODULE_SERVICE_URL) {
            self.module_service.url = url;
        }
        if let Some(key) = lookup(ENV_MODULE_SERVICE_KEY) {
            self.module_service.key = key;
        }
        if let Some(raw) = lookup(ENV_LOOKUP_TIMEOUT_MS) {
            self.endpoints.lookup_timeout_ms = raw
                .trim()
                .parse::<u64>()
                .ok()
                .filter(|millis| *millis > 0)
                .ok_or(SettingsError::InvalidOverride {
                    variable: ENV_LOOKUP_TIMEOUT_MS,
                    value: raw,
                })?;
        }
        Ok(())
    }

    /// Apply overrides from the process environment.
    ///
    /// # Errors
    ///
    /// See [`Settings::apply_overrides`].
    pub fn apply_env(&mut self) -> Result<(), SettingsError> {
        self.apply_overrides(|name| std::env::var(name).ok())
    }
}
