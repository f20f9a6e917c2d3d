//! Release acquisition and module version reconciliation for ProcessWire
//! projects.
//!
//! The acquisition side resolves a branch or commit to a downloadable
//! archive, fetches it into a private staging area, unpacks it into a project
//! directory, and tidies up afterwards ([`pipeline::AcquisitionPipeline`]).
//! The reconciliation side compares the modules installed in a project with
//! the versions published in the module directory
//! ([`reconcile::VersionReconciler`]).
//!
//! Network access goes through [`http::HttpTransport`] so every component can
//! be exercised against canned replies.

pub mod archive;
pub mod catalog;
pub mod cleanup;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod http;
pub mod mirror;
pub mod module_catalog;
pub mod module_install;
pub mod pipeline;
pub mod probe;
pub mod profile;
pub mod reconcile;
pub mod resolver;
pub mod settings;
pub mod snapshot;
pub mod staging;
pub mod version;

#[cfg(any(test, feature = "test-support"))]
#[allow(
    clippy::expect_used,
    clippy::panic,
    missing_docs,
    reason = "test helpers fail loudly on broken fixtures"
)]
pub mod test_utils;

pub use error::{Error, Result};
pub use settings::Settings;
pub use version::{ReleaseVersion, VersionTriple};
