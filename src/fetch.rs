//! Archive download into a fresh staging area.

use crate::archive::{ArchiveFormat, ArchiveHandle};
use crate::http::{HttpTransport, ProgressObserver, TransportError};
use crate::staging::{self, StagingArea};
use camino::Utf8Path;
use std::fs::File;
use std::io::{BufWriter, Write};

/// Errors arising while downloading an archive.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// The server reported that the release does not exist (403 or 404).
    #[error("release `{identifier}` does not exist at {url}")]
    NotFound {
        /// The requested identifier.
        identifier: String,
        /// The download URL.
        url: String,
    },

    /// Any other download failure.
    #[error("release `{identifier}` could not be downloaded: {cause}")]
    Download {
        /// The requested identifier.
        identifier: String,
        /// Description of the failure.
        cause: String,
    },
}

impl FetchError {
    /// Remediation text for the CLI.
    #[must_use]
    pub const fn hint(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => {
                "the selected version does not exist; try the latest stable release (`master`) instead"
            }
            Self::Download { .. } => {
                "try again; if the problem persists download the archive yourself and pass it with --src"
            }
        }
    }
}

/// What to download and how to name it in staging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    /// Identifier reported in errors.
    pub identifier: String,
    /// Download URL.
    pub url: String,
    /// Container format of the download.
    pub format: ArchiveFormat,
    /// File name stem inside the staging area.
    pub file_stem: String,
}

/// A downloaded archive and the staging area that holds it.
///
/// The caller owns the staging area and must release it.
#[derive(Debug)]
pub struct FetchedArchive {
    /// The staged archive.
    pub handle: ArchiveHandle,
    /// The staging area holding it.
    pub staging: StagingArea,
    /// Bytes received.
    pub bytes: u64,
}

/// Downloads archives into staging areas.
pub trait ArchiveFetcher {
    /// Download `request` into a new staging area under `staging_root`.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::NotFound`] for 403/404 responses and
    /// [`FetchError::Download`] for any other failure. No staging area is
    /// left behind on error.
    fn fetch(
        &self,
        request: &FetchRequest,
        staging_root: &Utf8Path,
        progress: &mut dyn ProgressObserver,
    ) -> Result<FetchedArchive, FetchError>;
}

/// [`ArchiveFetcher`] streaming through an [`HttpTransport`].
pub struct HttpArchiveFetcher<'a> {
    transport: &'a dyn HttpTransport,
}

impl<'a> HttpArchiveFetcher<'a> {
    /// Create a fetcher over `transport`.
    #[must_use]
    pub fn new(transport: &'a dyn HttpTransport) -> Self {
        Self { transport }
    }
}

impl ArchiveFetcher for HttpArchiveFetcher<'_> {
    fn fetch(
        &self,
        request: &FetchRequest,
        staging_root: &Utf8Path,
        progress: &mut dyn ProgressObserver,
    ) -> Result<FetchedArchive, FetchError> {
        let staging = StagingArea::create_in(staging_root)
            .map_err(|err| download_error(request, &err))?;
        let path = staging.file(&format!(
            "{}.{}",
            request.file_stem,
            request.format.extension()
        ));

        match stream_to(self.transport, request, &path, progress) {
            Ok(bytes) => {
                log::debug!("downloaded {bytes} bytes from {} to {path}", request.url);
                Ok(FetchedArchive {
                    handle: ArchiveHandle::new(path, request.format),
                    staging,
                    bytes,
                })
            }
            Err(err) => {
                staging::release(staging);
                Err(err)
            }
        }
    }
}

fn stream_to(
    transport: &dyn HttpTransport,
    request: &FetchRequest,
    path: &Utf8Path,
    progress: &mut dyn ProgressObserver,
) -> Result<u64, FetchError> {
    let file = File::create(path).map_err(|err| download_error(request, &err))?;
    let mut sink = BufWriter::new(file);
    let bytes = transport
        .download(&request.url, &mut sink, progress)
        .map_err(|err| map_transport_error(request, err))?;
    sink.flush().map_err(|err| download_error(request, &err))?;
    Ok(bytes)
}

fn download_error(request: &FetchRequest, cause: &dyn std::fmt::Display) -> FetchError {
    FetchError::Download {
        identifier: request.identifier.clone(),
        cause: cause.to_string(),
    }
}

fn map_transport_error(request: &FetchRequest, err: TransportError) -> FetchError {
    match err.status() {
        Some(403 | 404) => FetchError::NotFound {
            identifier: request.identifier.clone(),
            url: request.url.clone(),
        },
        _ => download_error(request, &err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::staging::STAGING_PREFIX;
    use crate::test_utils::{StubTransport, staging_dirs, utf8_tempdir};
    use rstest::rstest;

    const URL: &str = "https://archive.test/master.zip";

    fn request() -> FetchRequest {
        FetchRequest {
            identifier: "master".to_owned(),
            url: URL.to_owned(),
            format: ArchiveFormat::Zip,
            file_stem: "pw".to_owned(),
        }
    }

    #[test]
    fn streams_body_into_staging_area() {
        let (_guard, root) = utf8_tempdir();
        let transport = StubTransport::default().with_download(URL, b"archive-bytes".to_vec());
        let fetcher = HttpArchiveFetcher::new(&transport);
        let mut reports = Vec::new();
        let mut observer = |total: Option<u64>, downloaded: u64| reports.push((total, downloaded));

        let fetched = fetcher
            .fetch(&request(), &root, &mut observer)
            .expect("download succeeds");

        assert_eq!(fetched.bytes, 13);
        assert_eq!(fetched.handle.format(), ArchiveFormat::Zip);
        assert_eq!(fetched.handle.source_path().file_name(), Some("pw.zip"));
        assert!(fetched.handle.source_path().starts_with(fetched.staging.path()));
        assert_eq!(
            std::fs::read(fetched.handle.source_path()).expect("read staged file"),
            b"archive-bytes"
        );
        let name = fetched.staging.path().file_name().expect("staging name");
        assert!(name.starts_with(STAGING_PREFIX));
        drop(fetched);
        assert_eq!(reports, vec![(Some(13), 13)]);
    }

    #[rstest]
    #[case::not_found(404)]
    #[case::forbidden(403)]
    fn missing_release_is_not_found_and_leaves_no_staging(#[case] status: u16) {
        let (_guard, root) = utf8_tempdir();
        let transport = StubTransport::default().with_download_status(URL, status);
        let fetcher = HttpArchiveFetcher::new(&transport);

        let err = fetcher
            .fetch(&request(), &root, &mut crate::http::NoProgress)
            .expect_err("download fails");

        assert!(matches!(err, FetchError::NotFound { ref identifier, .. } if identifier == "master"));
        assert!(staging_dirs(&root).is_empty());
    }

    #[rstest]
    #[case::server_error(StubTransport::default().with_download_status(URL, 500))]
    #[case::transport(StubTransport::default().with_failure(URL))]
    fn other_failures_are_download_errors(#[case] transport: StubTransport) {
        let (_guard, root) = utf8_tempdir();
        let fetcher = HttpArchiveFetcher::new(&transport);

        let err = fetcher
            .fetch(&request(), &root, &mut crate::http::NoProgress)
            .expect_err("download fails");

        assert!(matches!(err, FetchError::Download { .. }));
        assert!(staging_dirs(&root).is_empty());
    }
}
