//! Shared test utilities: archive builders, descriptor text, and a stub
//! HTTP transport.

use crate::http::{HttpTransport, ProgressObserver, TransportError};
use crate::staging::STAGING_PREFIX;
use camino::{Utf8Path, Utf8PathBuf};
use flate2::Compression;
use flate2::write::GzEncoder;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fs::File;
use std::io::Write;
use tempfile::TempDir;
use zip::write::SimpleFileOptions;

/// Creates a temporary directory and returns it with its UTF-8 path.
///
/// Keep the guard alive for as long as the directory is needed.
pub fn utf8_tempdir() -> (TempDir, Utf8PathBuf) {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = Utf8PathBuf::try_from(dir.path().to_path_buf()).expect("utf8 temp path");
    (dir, path)
}

/// Lists staging directories directly inside `root`.
pub fn staging_dirs(root: &Utf8Path) -> Vec<Utf8PathBuf> {
    let Ok(entries) = root.read_dir_utf8() else {
        return Vec::new();
    };
    entries
        .filter_map(Result::ok)
        .filter(|entry| entry.file_name().starts_with(STAGING_PREFIX))
        .map(|entry| entry.path().to_owned())
        .collect()
}

/// Text of a version descriptor declaring `major.minor.revision`.
pub fn descriptor_source(major: u32, minor: u32, revision: u32) -> String {
    format!(
        concat!(
            "<?php namespace ProcessWire;\n",
            "class ProcessWire extends Wire {{\n",
            "\tconst versionMajor = {};\n",
            "\tconst versionMinor = {};\n",
            "\tconst versionRevision = {};\n",
            "\tconst versionSuffix = '';\n",
            "}}\n"
        ),
        major, minor, revision
    )
}

/// Writes a ZIP archive. Names ending in `/` become directories.
pub fn write_zip(path: &Utf8Path, entries: &[(&str, &[u8])]) {
    let mut writer = zip::ZipWriter::new(File::create(path).expect("create zip"));
    let options = SimpleFileOptions::default();
    for (name, contents) in entries {
        if name.ends_with('/') {
            writer.add_directory(*name, options).expect("add directory");
        } else {
            writer.start_file(*name, options).expect("start file");
            writer.write_all(contents).expect("write entry");
        }
    }
    writer.finish().expect("finish zip");
}

/// Writes a gzip-compressed tarball. Names ending in `/` become directories.
pub fn write_tar_gz(path: &Utf8Path, entries: &[(&str, &[u8])]) {
    let encoder = GzEncoder::new(File::create(path).expect("create tarball"), Compression::default());
    let mut builder = tar::Builder::new(encoder);
    for (name, contents) in entries {
        let mut header = tar::Header::new_gnu();
        if name.ends_with('/') {
            header.set_entry_type(tar::EntryType::Directory);
            header.set_mode(0o755);
            header.set_size(0);
            builder
                .append_data(&mut header, name, std::io::empty())
                .expect("append directory");
        } else {
            header.set_entry_type(tar::EntryType::Regular);
            header.set_mode(0o644);
            header.set_size(contents.len() as u64);
            builder
                .append_data(&mut header, name, *contents)
                .expect("append file");
        }
    }
    let encoder = builder.into_inner().expect("finish tar");
    encoder.finish().expect("finish gzip");
}

/// The archive layout of a minimal release, rooted like a GitHub download.
pub fn release_entries(root: &str) -> Vec<(String, Vec<u8>)> {
    vec![
        (format!("{root}/"), Vec::new()),
        (format!("{root}/index.php"), b"<?php // bootstrap".to_vec()),
        (format!("{root}/LICENSE.TXT"), b"MPL".to_vec()),
        (format!("{root}/CHANGELOG.md"), b"# Changes".to_vec()),
        (format!("{root}/wire/core/"), Vec::new()),
        (
            format!("{root}/wire/core/ProcessWire.php"),
            descriptor_source(3, 0, 184).into_bytes(),
        ),
        (format!("{root}/site-blank/install/"), Vec::new()),
        (format!("{root}/site-blank/install/install.sql"), b"--".to_vec()),
    ]
}

/// Borrow owned entries in the shape the writers expect.
pub fn borrow_entries(entries: &[(String, Vec<u8>)]) -> Vec<(&str, &[u8])> {
    entries
        .iter()
        .map(|(name, contents)| (name.as_str(), contents.as_slice()))
        .collect()
}

/// Bytes of a release ZIP built in memory.
pub fn release_zip_bytes(root: &str) -> Vec<u8> {
    let (_guard, dir) = utf8_tempdir();
    let path = dir.join("release.zip");
    let entries = release_entries(root);
    write_zip(&path, &borrow_entries(&entries));
    std::fs::read(&path).expect("read release zip")
}

#[derive(Debug, Clone)]
enum Reply {
    Body(Vec<u8>),
    Status(u16),
    Failure,
}

/// An [`HttpTransport`] answering from canned replies.
///
/// Unknown URLs answer 404. Every request is recorded as `"<METHOD> <url>"`.
#[derive(Debug, Default)]
pub struct StubTransport {
    texts: HashMap<String, Reply>,
    heads: HashMap<String, Reply>,
    downloads: HashMap<String, Reply>,
    requests: RefCell<Vec<String>>,
}

impl StubTransport {
    /// Answer GETs of `url` with `body`.
    #[must_use]
    pub fn with_text(mut self, url: impl Into<String>, body: impl Into<String>) -> Self {
        self.texts
            .insert(url.into(), Reply::Body(body.into().into_bytes()));
        self
    }

    /// Answer GETs of `url` with `status`.
    #[must_use]
    pub fn with_text_status(mut self, url: impl Into<String>, status: u16) -> Self {
        self.texts.insert(url.into(), Reply::Status(status));
        self
    }

    /// Answer HEADs of `url` with `status`.
    #[must_use]
    pub fn with_head(mut self, url: impl Into<String>, status: u16) -> Self {
        self.heads.insert(url.into(), Reply::Status(status));
        self
    }

    /// Answer downloads of `url` with `body`.
    #[must_use]
    pub fn with_download(mut self, url: impl Into<String>, body: Vec<u8>) -> Self {
        self.downloads.insert(url.into(), Reply::Body(body));
        self
    }

    /// Answer downloads of `url` with `status`.
    #[must_use]
    pub fn with_download_status(mut self, url: impl Into<String>, status: u16) -> Self {
        self.downloads.insert(url.into(), Reply::Status(status));
        self
    }

    /// Fail every kind of request to `url` at the transport level.
    #[must_use]
    pub fn with_failure(mut self, url: impl Into<String>) -> Self {
        let url = url.into();
        self.texts.insert(url.clone(), Reply::Failure);
        self.heads.insert(url.clone(), Reply::Failure);
        self.downloads.insert(url, Reply::Failure);
        self
    }

    /// Requests received so far.
    pub fn requests(&self) -> Vec<String> {
        self.requests.borrow().clone()
    }

    fn record(&self, method: &str, url: &str, replies: &HashMap<String, Reply>) -> Reply {
        self.requests.borrow_mut().push(format!("{method} {url}"));
        replies.get(url).cloned().unwrap_or(Reply::Status(404))
    }
}

fn status_error(url: &str, status: u16) -> TransportError {
    TransportError::Status {
        url: url.to_owned(),
        status,
    }
}

fn transport_failure(url: &str) -> TransportError {
    TransportError::Transport {
        url: url.to_owned(),
        reason: "connection refused".to_owned(),
    }
}

impl HttpTransport for StubTransport {
    fn get_text(&self, url: &str) -> Result<String, TransportError> {
        match self.record("GET", url, &self.texts) {
            Reply::Body(body) => Ok(String::from_utf8_lossy(&body).into_owned()),
            Reply::Status(status) => Err(status_error(url, status)),
            Reply::Failure => Err(transport_failure(url)),
        }
    }

    fn head_status(&self, url: &str) -> Result<u16, TransportError> {
        match self.record("HEAD", url, &self.heads) {
            Reply::Body(_) => Ok(200),
            Reply::Status(status) => Ok(status),
            Reply::Failure => Err(transport_failure(url)),
        }
    }

    fn download(
        &self,
        url: &str,
        sink: &mut dyn Write,
        progress: &mut dyn ProgressObserver,
    ) -> Result<u64, TransportError> {
        match self.record("DOWNLOAD", url, &self.downloads) {
            Reply::Body(body) => {
                sink.write_all(&body).map_err(|source| TransportError::Io {
                    url: url.to_owned(),
                    source,
                })?;
                let len = body.len() as u64;
                progress.on_progress(Some(len), len);
                Ok(len)
            }
            Reply::Status(status) => Err(status_error(url, status)),
            Reply::Failure => Err(transport_failure(url)),
        }
    }
}
