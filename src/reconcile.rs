//! Installed versus published module versions.
//!
//! The reconciler joins the installed set from a [`LocalSnapshotProvider`]
//! with answers from a [`ModuleCatalog`] and classifies every module by
//! whether a newer release is published. Records are rebuilt on every call.

use crate::error::Result;
use crate::module_catalog::ModuleCatalog;
use crate::snapshot::{CORE_NAME, LocalComponent, LocalSnapshotProvider};
use crate::version::{ReleaseVersion, VersionRequirement, VersionTriple, ordering_sign};
use serde::Serialize;
use std::collections::BTreeMap;

/// Suffix appended to a project URL to obtain its default-branch archive.
pub const ARCHIVE_SUFFIX: &str = "/archive/master.zip";

/// Version comparison for one installed module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModuleVersionRecord {
    /// Module class name.
    pub name: String,
    /// Human-readable title.
    pub title: String,
    /// Installed version.
    pub local_version: ReleaseVersion,
    /// Published version, when the catalog knows the module.
    pub remote_version: Option<VersionTriple>,
    /// Sign of `remote.compare(local)`; `None` when undetermined.
    pub is_newer: Option<i8>,
    /// Requirements of the version that would be installed.
    pub required_versions: BTreeMap<String, VersionRequirement>,
    /// Archive of the published version, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
}

/// A requirement the installed set does not meet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnmetRequirement {
    /// Required component.
    pub name: String,
    /// The declared requirement.
    pub requirement: VersionRequirement,
    /// Installed version of the component, if installed at all.
    pub installed: Option<VersionTriple>,
}

impl ModuleVersionRecord {
    fn from_local(component: &LocalComponent) -> Self {
        Self {
            name: component.name.clone(),
            title: component.title.clone(),
            local_version: component.version,
            remote_version: None,
            is_newer: None,
            required_versions: component.requires_versions.clone(),
            download_url: None,
        }
    }

    /// Whether a strictly newer version is published.
    #[must_use]
    pub fn is_upgradable(&self) -> bool {
        self.is_newer == Some(1)
    }

    /// Record the published version and its requirements.
    fn apply_remote(
        &mut self,
        version: ReleaseVersion,
        requires: BTreeMap<String, VersionRequirement>,
    ) {
        self.remote_version = version.known();
        self.is_newer = version.compare(&self.local_version).map(ordering_sign);
        if self.is_upgradable() {
            self.required_versions = requires;
        }
    }

    /// Requirements not met by `installed`.
    ///
    /// A component that is missing, or installed at a version the
    /// requirement rejects, is reported. Components whose installed version
    /// is unknown are not.
    #[must_use]
    pub fn unmet_requirements(
        &self,
        installed: &BTreeMap<String, ReleaseVersion>,
    ) -> Vec<UnmetRequirement> {
        self.required_versions
            .iter()
            .filter_map(|(name, requirement)| {
                let current = installed.get(name);
                let unmet = match current {
                    None => true,
                    Some(ReleaseVersion::Known(version)) => !requirement.is_satisfied_by(version),
                    Some(ReleaseVersion::Unknown) => false,
                };
                unmet.then(|| UnmetRequirement {
                    name: name.clone(),
                    requirement: *requirement,
                    installed: current.and_then(|version| version.known()),
                })
            })
            .collect()
    }
}

fn keep(record: &ModuleVersionRecord, only_new: bool) -> bool {
    !only_new || record.is_upgradable()
}

/// Compare every component in `local` against `catalog`.
///
/// # Errors
///
/// Returns [`crate::error::Error::CatalogUnavailable`] when the bulk lookup
/// fails.
pub fn reconcile(
    local: &[LocalComponent],
    catalog: &dyn ModuleCatalog,
    only_new: bool,
) -> Result<BTreeMap<String, ModuleVersionRecord>> {
    if local.is_empty() {
        return Ok(BTreeMap::new());
    }

    let names: Vec<String> = local.iter().map(|component| component.name.clone()).collect();
    let mut records: BTreeMap<String, ModuleVersionRecord> = local
        .iter()
        .map(|component| {
            (
                component.name.clone(),
                ModuleVersionRecord::from_local(component),
            )
        })
        .collect();

    for remote in catalog.lookup_many(&names)? {
        match records.get_mut(&remote.class_name) {
            Some(record) => record.apply_remote(remote.version, remote.requires_versions),
            None => log::debug!("catalog returned unrequested module {}", remote.class_name),
        }
    }

    records.retain(|_, record| keep(record, only_new));
    Ok(records)
}

/// Compare one component against `catalog`'s single-item endpoint.
///
/// Returns `None` when `only_new` filters the record out.
///
/// # Errors
///
/// Returns [`crate::error::Error::CatalogUnavailable`] when the lookup fails.
pub fn reconcile_one(
    local: &LocalComponent,
    catalog: &dyn ModuleCatalog,
    only_new: bool,
) -> Result<Option<ModuleVersionRecord>> {
    let detail = catalog.lookup_one(&local.name)?;
    let mut record = ModuleVersionRecord::from_local(local);
    record.apply_remote(detail.version, detail.requires_versions);
    record.download_url = detail
        .project_url
        .map(|url| format!("{}{ARCHIVE_SUFFIX}", url.trim_end_matches('/')));
    Ok(keep(&record, only_new).then_some(record))
}

/// Reconciler bound to an installation and a catalog.
pub struct VersionReconciler<'a> {
    snapshot: &'a dyn LocalSnapshotProvider,
    catalog: &'a dyn ModuleCatalog,
}

impl<'a> VersionReconciler<'a> {
    /// Create a reconciler.
    #[must_use]
    pub fn new(snapshot: &'a dyn LocalSnapshotProvider, catalog: &'a dyn ModuleCatalog) -> Self {
        Self { snapshot, catalog }
    }

    /// Reconcile every installed module.
    ///
    /// # Errors
    ///
    /// Returns an error when the installation cannot be read or the catalog
    /// is unavailable.
    pub fn reconcile(&self, only_new: bool) -> Result<BTreeMap<String, ModuleVersionRecord>> {
        let components = self.snapshot.components()?;
        reconcile(&components, self.catalog, only_new)
    }

    /// Reconcile the module called `name`.
    ///
    /// A module that is not installed is compared as version unknown.
    ///
    /// # Errors
    ///
    /// Returns an error when the installation cannot be read or the catalog
    /// is unavailable.
    pub fn reconcile_one(&self, name: &str, only_new: bool) -> Result<Option<ModuleVersionRecord>> {
        let local = self
            .snapshot
            .components()?
            .into_iter()
            .find(|component| component.name == name)
            .unwrap_or_else(|| LocalComponent::new(name, name, ReleaseVersion::Unknown));
        reconcile_one(&local, self.catalog, only_new)
    }

    /// Installed versions of the core and every module, keyed by name.
    ///
    /// # Errors
    ///
    /// Returns an error when the installation cannot be read.
    pub fn installed_versions(&self) -> Result<BTreeMap<String, ReleaseVersion>> {
        let mut versions: BTreeMap<String, ReleaseVersion> = self
            .snapshot
            .components()?
            .into_iter()
            .map(|component| (component.name, component.version))
            .collect();
        versions.insert(CORE_NAME.to_owned(), self.snapshot.core_version()?);
        Ok(versions)
    }
}
