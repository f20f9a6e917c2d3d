//! Release branches, target identifiers, and the core upgrade check.

use crate::archive::ArchiveFormat;
use crate::error::{Error, Result};
use crate::http::{HttpTransport, TransportError};
use crate::probe::VersionProbe;
use crate::settings::Endpoints;
use crate::version::ReleaseVersion;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

/// Name of the stable release branch.
pub const MASTER_BRANCH: &str = "master";

/// Catalog key for a target that is not a listed branch.
pub const SHA_KEY: &str = "sha";

const MASTER_TITLE: &str = "Stable/Master";
const SHA_TITLE: &str = "Specific commit sha";

/// What kind of identifier a [`ReleaseRef`] carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RefKind {
    /// A named branch.
    Branch,
    /// A commit hash or any other identifier that is not a listed branch.
    CommitSha,
}

/// The release a caller asked for.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReleaseRef {
    identifier: String,
    kind: RefKind,
}

impl ReleaseRef {
    /// Reference a named branch.
    #[must_use]
    pub fn branch(name: impl Into<String>) -> Self {
        Self {
            identifier: name.into(),
            kind: RefKind::Branch,
        }
    }

    /// Reference a commit.
    #[must_use]
    pub fn commit(sha: impl Into<String>) -> Self {
        Self {
            identifier: sha.into(),
            kind: RefKind::CommitSha,
        }
    }

    /// The stable release.
    #[must_use]
    pub fn master() -> Self {
        Self::branch(MASTER_BRANCH)
    }

    /// Classify `identifier` against the branches known to exist.
    ///
    /// # Examples
    ///
    /// ```
    /// use wirefetch::catalog::{RefKind, ReleaseRef};
    ///
    /// let known = ["master", "dev"];
    /// assert_eq!(ReleaseRef::classify("dev", known).kind(), RefKind::Branch);
    /// assert_eq!(ReleaseRef::classify("4f2a9c1", known).kind(), RefKind::CommitSha);
    /// ```
    #[must_use]
    pub fn classify<'k>(identifier: &str, known_branches: impl IntoIterator<Item = &'k str>) -> Self {
        if known_branches.into_iter().any(|name| name == identifier) {
            Self::branch(identifier)
        } else {
            Self::commit(identifier)
        }
    }

    /// Guess the kind without a branch listing: hexadecimal strings of seven
    /// to forty characters are commits, everything else is a branch.
    #[must_use]
    pub fn guess(identifier: &str) -> Self {
        let looks_like_sha = (7..=40).contains(&identifier.len())
            && identifier.bytes().all(|b| b.is_ascii_hexdigit());
        if looks_like_sha {
            Self::commit(identifier)
        } else {
            Self::branch(identifier)
        }
    }

    /// The branch name or commit identifier.
    #[must_use]
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// The identifier kind.
    #[must_use]
    pub const fn kind(&self) -> RefKind {
        self.kind
    }
}

impl fmt::Display for ReleaseRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.identifier)
    }
}

/// A release candidate described by the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BranchInfo {
    /// Branch name or commit identifier.
    pub name: String,
    /// Human-readable title.
    pub title: String,
    /// Archive download URL.
    pub zip_url: String,
    /// Version descriptor URL.
    pub version_url: String,
    /// Probed version.
    pub version: ReleaseVersion,
}

#[derive(Deserialize)]
struct BranchListing {
    name: String,
}

/// Lists release branches and annotates them with probed versions.
pub struct BranchCatalog<'a> {
    transport: &'a dyn HttpTransport,
    endpoints: &'a Endpoints,
}

impl<'a> BranchCatalog<'a> {
    /// Create a catalog over `transport`.
    #[must_use]
    pub fn new(transport: &'a dyn HttpTransport, endpoints: &'a Endpoints) -> Self {
        Self {
            transport,
            endpoints,
        }
    }

    /// List every branch plus, when `target` is not a listed branch, a
    /// [`SHA_KEY`] entry for it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Network`] when the listing cannot be fetched, is not
    /// valid JSON, or lacks `master`. Returns [`Error::Resolution`] when the
    /// target is unlisted and its descriptor answers with a non-success
    /// status.
    pub fn list_branches(&self, target: &ReleaseRef) -> Result<BTreeMap<String, BranchInfo>> {
        let names = self.fetch_branch_names()?;
        if !names.iter().any(|name| name == MASTER_BRANCH) {
            return Err(Error::Network {
                url: self.endpoints.branches_url.clone(),
                reason: format!("branch listing does not include `{MASTER_BRANCH}`"),
            });
        }

        let probe = VersionProbe::new(self.transport, self.endpoints);
        let mut branches = BTreeMap::new();
        for name in names {
            let version = probe.probe(&name).unwrap_or_else(|err| {
                log::warn!("could not determine the version of branch {name}: {err}");
                ReleaseVersion::Unknown
            });
            let info = self.describe(&name, branch_title(&name), version);
            branches.insert(name, info);
        }

        if !branches.contains_key(target.identifier()) {
            let version = probe
                .probe(target.identifier())
                .map_err(|err| unresolved_target(target, self.endpoints, err))?;
            let info = self.describe(target.identifier(), SHA_TITLE.to_owned(), version);
            branches.insert(SHA_KEY.to_owned(), info);
        }

        Ok(branches)
    }

    fn fetch_branch_names(&self) -> Result<Vec<String>> {
        let url = &self.endpoints.branches_url;
        let body = self
            .transport
            .get_text(url)
            .map_err(|err| Error::Network {
                url: url.clone(),
                reason: err.to_string(),
            })?;
        let listing: Vec<BranchListing> =
            serde_json::from_str(&body).map_err(|err| Error::Network {
                url: url.clone(),
                reason: format!("invalid branch listing: {err}"),
            })?;
        Ok(listing.into_iter().map(|entry| entry.name).collect())
    }

    fn describe(&self, identifier: &str, title: String, version: ReleaseVersion) -> BranchInfo {
        let candidates = self.endpoints.archive_urls_for(identifier);
        let zip_url = ArchiveFormat::preferred(&candidates)
            .map(|(url, _)| url.to_owned())
            .or_else(|| candidates.first().cloned())
            .unwrap_or_default();
        BranchInfo {
            name: identifier.to_owned(),
            title,
            zip_url,
            version_url: self.endpoints.version_url_for(identifier),
            version,
        }
    }
}

fn branch_title(name: &str) -> String {
    if name == MASTER_BRANCH {
        return MASTER_TITLE.to_owned();
    }
    let mut chars = name.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars).collect()
    })
}

fn unresolved_target(target: &ReleaseRef, endpoints: &Endpoints, err: TransportError) -> Error {
    match err {
        TransportError::Status { status, .. } => Error::Resolution {
            identifier: target.identifier().to_owned(),
            status: Some(status),
            transport_error: None,
        },
        other => Error::Network {
            url: endpoints.version_url_for(target.identifier()),
            reason: other.to_string(),
        },
    }
}

/// Outcome of comparing the installed core with the requested release.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UpgradeStatus {
    /// The requested release is newer than the installed core.
    Available,
    /// The installed core is the same or newer.
    UpToDate,
    /// One of the two versions is unknown.
    Undetermined,
}

/// The release chosen for comparison and the verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CoreUpgrade {
    /// Comparison verdict.
    pub status: UpgradeStatus,
    /// The catalog entry compared against.
    pub candidate: BranchInfo,
}

/// Compare `installed` with the catalog entry for `target`.
///
/// The entry is the branch named by `target`, or the [`SHA_KEY`] entry when
/// the target was not a listed branch. Returns `None` when neither exists.
#[must_use]
pub fn check_core_upgrade(
    branches: &BTreeMap<String, BranchInfo>,
    target: &ReleaseRef,
    installed: ReleaseVersion,
) -> Option<CoreUpgrade> {
    let candidate = branches
        .get(target.identifier())
        .or_else(|| branches.get(SHA_KEY))?;
    let status = match candidate.version.compare(&installed) {
        Some(Ordering::Greater) => UpgradeStatus::Available,
        Some(_) => UpgradeStatus::UpToDate,
        None => UpgradeStatus::Undetermined,
    };
    Some(CoreUpgrade {
        status,
        candidate: candidate.clone(),
    })
}
