//! Target identifier to download location, with pre-flight check.

use crate::archive::ArchiveFormat;
use crate::catalog::ReleaseRef;
use crate::error::{Error, Result};
use crate::http::HttpTransport;
use crate::settings::Endpoints;

/// A concrete download location for a release.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedArchive {
    /// The requested identifier.
    pub identifier: String,
    /// Archive download URL.
    pub download_url: String,
    /// URL checked before downloading.
    pub check_url: String,
    /// Container format of the download.
    pub format: ArchiveFormat,
}

/// Templates identifiers into download URLs and verifies they exist.
pub struct ArchiveResolver<'a> {
    transport: &'a dyn HttpTransport,
    endpoints: &'a Endpoints,
}

impl<'a> ArchiveResolver<'a> {
    /// Create a resolver.
    #[must_use]
    pub fn new(transport: &'a dyn HttpTransport, endpoints: &'a Endpoints) -> Self {
        Self {
            transport,
            endpoints,
        }
    }

    /// Build the download and check URLs for `target` without any network
    /// access.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Resolution`] when no configured archive URL has a
    /// supported format.
    pub fn resolve(&self, target: &ReleaseRef) -> Result<ResolvedArchive> {
        let identifier = target.identifier();
        let candidates = self.endpoints.archive_urls_for(identifier);
        let (download_url, format) =
            ArchiveFormat::preferred(&candidates).ok_or_else(|| Error::Resolution {
                identifier: identifier.to_owned(),
                status: None,
                transport_error: Some(format!(
                    "no supported archive format among {}",
                    candidates.join(", ")
                )),
            })?;
        Ok(ResolvedArchive {
            identifier: identifier.to_owned(),
            download_url: download_url.to_owned(),
            check_url: self.endpoints.version_url_for(identifier),
            format,
        })
    }

    /// Confirm that `resolved` exists with a HEAD request.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Resolution`] for any status other than 200 and for
    /// transport failures.
    pub fn preflight(&self, resolved: &ResolvedArchive) -> Result<()> {
        let unresolved = |status: Option<u16>, transport_error: Option<String>| Error::Resolution {
            identifier: resolved.identifier.clone(),
            status,
            transport_error,
        };
        match self.transport.head_status(&resolved.check_url) {
            Ok(200) => Ok(()),
            Ok(status) => Err(unresolved(Some(status), None)),
            Err(err) => Err(unresolved(None, Some(err.to_string()))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::StubTransport;
    use rstest::{fixture, rstest};

    const CHECK_URL: &str = "https://raw.test/dev/ProcessWire.php";

    #[fixture]
    fn endpoints() -> Endpoints {
        Endpoints {
            version_url: "https://raw.test/{branch}/ProcessWire.php".to_owned(),
            archive_urls: vec![
                "https://archive.test/{branch}.zip".to_owned(),
                "https://archive.test/{branch}.tar.gz".to_owned(),
            ],
            ..Endpoints::default()
        }
    }

    #[rstest]
    fn resolve_templates_identifier(endpoints: Endpoints) {
        let transport = StubTransport::default();
        let resolver = ArchiveResolver::new(&transport, &endpoints);

        let resolved = resolver
            .resolve(&ReleaseRef::branch("dev"))
            .expect("resolves");

        assert_eq!(resolved.download_url, "https://archive.test/dev.tar.gz");
        assert_eq!(resolved.format, ArchiveFormat::TarGz);
        assert_eq!(resolved.check_url, CHECK_URL);
        assert!(transport.requests().is_empty());
    }

    #[rstest]
    fn resolve_rejects_unsupported_templates(mut endpoints: Endpoints) {
        endpoints.archive_urls = vec!["https://archive.test/{branch}.rar".to_owned()];
        let transport = StubTransport::default();
        let resolver = ArchiveResolver::new(&transport, &endpoints);

        let err = resolver
            .resolve(&ReleaseRef::branch("dev"))
            .expect_err("no supported format");
        assert!(matches!(err, Error::Resolution { status: None, transport_error: Some(_), .. }));
    }

    #[rstest]
    fn preflight_accepts_ok(endpoints: Endpoints) {
        let transport = StubTransport::default().with_head(CHECK_URL, 200);
        let resolver = ArchiveResolver::new(&transport, &endpoints);
        let resolved = resolver.resolve(&ReleaseRef::branch("dev")).expect("resolves");

        resolver.preflight(&resolved).expect("preflight passes");
        assert_eq!(transport.requests(), vec![format!("HEAD {CHECK_URL}")]);
    }

    #[rstest]
    #[case::not_found(404)]
    #[case::redirect(302)]
    #[case::server_error(500)]
    fn preflight_rejects_other_statuses(endpoints: Endpoints, #[case] status: u16) {
        let transport = StubTransport::default().with_head(CHECK_URL, status);
        let resolver = ArchiveResolver::new(&transport, &endpoints);
        let resolved = resolver.resolve(&ReleaseRef::branch("dev")).expect("resolves");

        let err = resolver.preflight(&resolved).expect_err("preflight fails");
        assert!(matches!(err, Error::Resolution { status: Some(s), .. } if s == status));
    }

    #[rstest]
    fn preflight_transport_failure_is_resolution_error(endpoints: Endpoints) {
        let transport = StubTransport::default().with_failure(CHECK_URL);
        let resolver = ArchiveResolver::new(&transport, &endpoints);
        let resolved = resolver.resolve(&ReleaseRef::branch("dev")).expect("resolves");

        let err = resolver.preflight(&resolved).expect_err("preflight fails");
        assert!(matches!(
            err,
            Error::Resolution { status: None, transport_error: Some(_), .. }
        ));
    }
}
