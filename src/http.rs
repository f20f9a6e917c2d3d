//! Blocking HTTP transport for lookups and archive transfers.
//!
//! All network access goes through [`HttpTransport`], so every component
//! above it can be exercised without a network. [`UreqTransport`] is the
//! production implementation: lookups share an agent with a short global
//! timeout, transfers use a second agent that only bounds connection setup.

use std::io::{Read, Write};
use std::time::Duration;

/// User agent sent with every request.
pub const USER_AGENT: &str = concat!("wirefetch/", env!("CARGO_PKG_VERSION"));

/// Bound on connection establishment for archive transfers.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Size of the buffer used when streaming response bodies.
const CHUNK_SIZE: usize = 64 * 1024;

/// Receives transfer progress once per received chunk.
pub trait ProgressObserver {
    /// `total` is the announced body length when the server sent one.
    fn on_progress(&mut self, total: Option<u64>, downloaded: u64);
}

impl<F> ProgressObserver for F
where
    F: FnMut(Option<u64>, u64),
{
    fn on_progress(&mut self, total: Option<u64>, downloaded: u64) {
        self(total, downloaded);
    }
}

/// Observer that discards progress.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressObserver for NoProgress {
    fn on_progress(&mut self, _total: Option<u64>, _downloaded: u64) {}
}

/// Errors raised by an [`HttpTransport`].
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The server answered with a non-success status.
    #[error("HTTP {status} from {url}")]
    Status {
        /// The URL that was requested.
        url: String,
        /// The status code received.
        status: u16,
    },

    /// The request did not complete (DNS, TLS, timeout, reset).
    #[error("request to {url} failed: {reason}")]
    Transport {
        /// The URL that was requested.
        url: String,
        /// Description of the failure.
        reason: String,
    },

    /// Reading the body or writing it to the sink failed.
    #[error("I/O error while transferring {url}: {source}")]
    Io {
        /// The URL that was requested.
        url: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

impl TransportError {
    /// The HTTP status, when the failure carried one.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Transport { .. } | Self::Io { .. } => None,
        }
    }
}

/// Blocking HTTP operations used by the acquisition pipeline.
pub trait HttpTransport {
    /// GET `url` with the lookup timeout and return the body as text.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Status`] for non-2xx responses and
    /// [`TransportError::Transport`] when the request fails.
    fn get_text(&self, url: &str) -> Result<String, TransportError>;

    /// HEAD `url` with the lookup timeout and return the status code.
    ///
    /// Non-2xx statuses are returned as values, not errors.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Transport`] when no response was received.
    fn head_status(&self, url: &str) -> Result<u16, TransportError>;

    /// GET `url` without an overall timeout, streaming the body into `sink`.
    ///
    /// Returns the number of bytes written.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] when the request fails, the status is not
    /// a success, or the body cannot be copied.
    fn download(
        &self,
        url: &str,
        sink: &mut dyn Write,
        progress: &mut dyn ProgressObserver,
    ) -> Result<u64, TransportError>;
}

/// [`HttpTransport`] backed by `ureq`.
pub struct UreqTransport {
    lookup: ureq::Agent,
    transfer: ureq::Agent,
}

impl UreqTransport {
    /// Build a transport whose lookups time out after `lookup_timeout`.
    #[must_use]
    pub fn new(lookup_timeout: Duration) -> Self {
        let lookup = ureq::Agent::config_builder()
            .timeout_global(Some(lookup_timeout))
            .user_agent(USER_AGENT)
            .build();
        let transfer = ureq::Agent::config_builder()
            .timeout_connect(Some(CONNECT_TIMEOUT))
            .user_agent(USER_AGENT)
            .build();
        Self {
            lookup: ureq::Agent::new_with_config(lookup),
            transfer: ureq::Agent::new_with_config(transfer),
        }
    }
}

impl HttpTransport for UreqTransport {
    fn get_text(&self, url: &str) -> Result<String, TransportError> {
        log::debug!("GET {url}");
        let response = self
            .lookup
            .get(url)
            .call()
            .map_err(|err| map_ureq_error(url, &err))?;
        response
            .into_body()
            .read_to_string()
            .map_err(|err| map_ureq_error(url, &err))
    }

    fn head_status(&self, url: &str) -> Result<u16, TransportError> {
        log::debug!("HEAD {url}");
        match self.lookup.head(url).call() {
            Ok(response) => Ok(response.status().as_u16()),
            Err(ureq::Error::StatusCode(status)) => Ok(status),
            Err(err) => Err(map_ureq_error(url, &err)),
        }
    }

    fn download(
        &self,
        url: &str,
        sink: &mut dyn Write,
        progress: &mut dyn ProgressObserver,
    ) -> Result<u64, TransportError> {
        log::debug!("GET {url} (transfer)");
        let response = self
            .transfer
            .get(url)
            .call()
            .map_err(|err| map_ureq_error(url, &err))?;
        let status = response.status().as_u16();
        let total = response
            .headers()
            .get("content-length")
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse::<u64>().ok());
        let mut reader = response.into_body().into_reader();
        copy_with_progress(url, &mut reader, sink, status < 300, total, progress)
    }
}

/// Copy `reader` into `sink` chunk by chunk, notifying `progress` for final
/// responses only.
pub(crate) fn copy_with_progress(
    url: &str,
    reader: &mut dyn Read,
    sink: &mut dyn Write,
    is_final: bool,
    total: Option<u64>,
    progress: &mut dyn ProgressObserver,
) -> Result<u64, TransportError> {
    let io_error = |source: std::io::Error| TransportError::Io {
        url: url.to_owned(),
        source,
    };
    let mut buffer = vec![0_u8; CHUNK_SIZE];
    let mut downloaded = 0_u64;
    loop {
        let read = reader.read(&mut buffer).map_err(io_error)?;
        if read == 0 {
            break;
        }
        let chunk = buffer.get(..read).unwrap_or_default();
        sink.write_all(chunk).map_err(io_error)?;
        downloaded += chunk.len() as u64;
        if is_final {
            progress.on_progress(total, downloaded);
        }
    }
    sink.flush().map_err(io_error)?;
    Ok(downloaded)
}

/// Map a ureq error to a [`TransportError`].
fn map_ureq_error(url: &str, err: &ureq::Error) -> TransportError {
    match err {
        ureq::Error::StatusCode(status) => TransportError::Status {
            url: url.to_owned(),
            status: *status,
        },
        other => TransportError::Transport {
            url: url.to_owned(),
            reason: other.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::not_found(404)]
    #[case::forbidden(403)]
    #[case::server_error(500)]
    fn status_codes_are_preserved(#[case] code: u16) {
        let mapped = map_ureq_error("https://example.test/a", &ureq::Error::StatusCode(code));
        assert_eq!(mapped.status(), Some(code));
    }

    #[test]
    fn other_errors_map_to_transport() {
        let mapped = map_ureq_error("https://example.test/a", &ureq::Error::HostNotFound);
        assert!(matches!(mapped, TransportError::Transport { .. }));
        assert_eq!(mapped.status(), None);
    }

    #[test]
    fn copy_reports_each_chunk_for_final_responses() {
        let body = vec![7_u8; CHUNK_SIZE + 10];
        let mut sink = Vec::new();
        let mut seen = Vec::new();
        let mut observer = |total: Option<u64>, downloaded: u64| seen.push((total, downloaded));
        let copied = copy_with_progress(
            "https://example.test/a",
            &mut body.as_slice(),
            &mut sink,
            true,
            Some(body.len() as u64),
            &mut observer,
        )
        .expect("copy succeeds");

        assert_eq!(copied, body.len() as u64);
        assert_eq!(sink, body);
        assert!(!seen.is_empty());
        assert_eq!(seen.last(), Some(&(Some(body.len() as u64), body.len() as u64)));
    }

    #[test]
    fn copy_stays_silent_for_non_final_responses() {
        let body = b"redirect body".to_vec();
        let mut sink = Vec::new();
        let mut calls = 0;
        let mut observer = |_: Option<u64>, _: u64| calls += 1;
        copy_with_progress(
            "https://example.test/a",
            &mut body.as_slice(),
            &mut sink,
            false,
            None,
            &mut observer,
        )
        .expect("copy succeeds");
        assert_eq!(calls, 0);
    }
}
