//! Version descriptor probing.
//!
//! A release's version lives in its `wire/core/ProcessWire.php` as three
//! labelled constants. The probe scans for them and never fails on content:
//! a descriptor missing any label yields [`ReleaseVersion::Unknown`].

use crate::http::{HttpTransport, TransportError};
use crate::settings::Endpoints;
use crate::version::{ReleaseVersion, VersionTriple};
use once_cell::sync::Lazy;
use regex::Regex;

static VERSION_CONSTANT: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"const\s+version(Major|Minor|Revision)\s*=\s*(\d+)").ok());

/// Extract the release version from descriptor text.
///
/// The first occurrence of each label wins.
///
/// # Examples
///
/// ```
/// use wirefetch::probe::parse_version;
/// use wirefetch::version::{ReleaseVersion, VersionTriple};
///
/// let text = "const versionMajor = 3; const versionMinor = 0; const versionRevision = 184;";
/// assert_eq!(parse_version(text), ReleaseVersion::Known(VersionTriple::new(3, 0, 184)));
/// assert_eq!(parse_version("const versionMajor = 3;"), ReleaseVersion::Unknown);
/// ```
#[must_use]
pub fn parse_version(content: &str) -> ReleaseVersion {
    let Some(pattern) = VERSION_CONSTANT.as_ref() else {
        return ReleaseVersion::Unknown;
    };

    let mut major = None;
    let mut minor = None;
    let mut revision = None;
    for captures in pattern.captures_iter(content) {
        let (Some(label), Some(value)) = (captures.get(1), captures.get(2)) else {
            continue;
        };
        let Ok(value) = value.as_str().parse::<u32>() else {
            continue;
        };
        let slot = match label.as_str() {
            "Major" => &mut major,
            "Minor" => &mut minor,
            _ => &mut revision,
        };
        slot.get_or_insert(value);
    }

    match (major, minor, revision) {
        (Some(major), Some(minor), Some(revision)) => {
            ReleaseVersion::Known(VersionTriple::new(major, minor, revision))
        }
        _ => ReleaseVersion::Unknown,
    }
}

/// Fetches and parses version descriptors for branches or commits.
pub struct VersionProbe<'a> {
    transport: &'a dyn HttpTransport,
    endpoints: &'a Endpoints,
}

impl<'a> VersionProbe<'a> {
    /// Create a probe over `transport` using the descriptor template in
    /// `endpoints`.
    #[must_use]
    pub fn new(transport: &'a dyn HttpTransport, endpoints: &'a Endpoints) -> Self {
        Self {
            transport,
            endpoints,
        }
    }

    /// Fetch the descriptor for `identifier` and parse it.
    ///
    /// # Errors
    ///
    /// Returns the [`TransportError`] when the descriptor cannot be fetched.
    pub fn probe(&self, identifier: &str) -> Result<ReleaseVersion, TransportError> {
        let url = self.endpoints.version_url_for(identifier);
        let content = self.transport.get_text(&url)?;
        let version = parse_version(&content);
        log::debug!("probed {identifier}: {version}");
        Ok(version)
    }

    /// Parse `content` when it was already fetched, otherwise probe.
    ///
    /// # Errors
    ///
    /// Returns the [`TransportError`] when a fetch was needed and failed.
    pub fn resolve(
        &self,
        content: Option<&str>,
        identifier: &str,
    ) -> Result<ReleaseVersion, TransportError> {
        match content {
            Some(text) => Ok(parse_version(text)),
            None => self.probe(identifier),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{StubTransport, descriptor_source};
    use rstest::rstest;

    #[test]
    fn parses_all_three_labels() {
        let text = descriptor_source(3, 0, 184);
        assert_eq!(
            parse_version(&text),
            ReleaseVersion::Known(VersionTriple::new(3, 0, 184))
        );
    }

    #[rstest]
    #[case::missing_revision("const versionMajor = 3;\nconst versionMinor = 0;")]
    #[case::missing_major("const versionMinor = 1;\nconst versionRevision = 2;")]
    #[case::empty("")]
    #[case::non_numeric("const versionMajor = 'x'; const versionMinor = 1; const versionRevision = 2;")]
    fn missing_labels_yield_unknown(#[case] text: &str) {
        assert_eq!(parse_version(text), ReleaseVersion::Unknown);
    }

    #[test]
    fn first_occurrence_wins() {
        let text = format!("{}\nconst versionMajor = 9;", descriptor_source(2, 7, 3));
        assert_eq!(
            parse_version(&text),
            ReleaseVersion::Known(VersionTriple::new(2, 7, 3))
        );
    }

    #[test]
    fn probe_fetches_templated_url() {
        let endpoints = Endpoints {
            version_url: "https://raw.test/{branch}/ProcessWire.php".to_owned(),
            ..Endpoints::default()
        };
        let transport = StubTransport::default()
            .with_text("https://raw.test/dev/ProcessWire.php", descriptor_source(3, 0, 200));
        let probe = VersionProbe::new(&transport, &endpoints);

        let version = probe.probe("dev").expect("probe succeeds");
        assert_eq!(version, ReleaseVersion::Known(VersionTriple::new(3, 0, 200)));
        assert_eq!(transport.requests(), vec!["GET https://raw.test/dev/ProcessWire.php"]);
    }

    #[test]
    fn resolve_uses_supplied_content_without_network() {
        let endpoints = Endpoints::default();
        let transport = StubTransport::default();
        let probe = VersionProbe::new(&transport, &endpoints);

        let version = probe
            .resolve(Some(&descriptor_source(1, 2, 3)), "master")
            .expect("parse succeeds");
        assert_eq!(version, ReleaseVersion::Known(VersionTriple::new(1, 2, 3)));
        assert!(transport.requests().is_empty());
    }

    #[test]
    fn probe_propagates_status_errors() {
        let endpoints = Endpoints::default();
        let transport = StubTransport::default();
        let probe = VersionProbe::new(&transport, &endpoints);

        let err = probe.probe("missing").expect_err("unknown url");
        assert_eq!(err.status(), Some(404));
    }
}
