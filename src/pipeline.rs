//! The acquisition state machine.
//!
//! A run moves through [`Stage`]s from `Start` to `Done`, or to `Failed`
//! followed by `CleaningUp`. Every transition is logged and recorded in the
//! [`AcquisitionReport`]. The staging area created by the fetcher belongs to
//! the run and is removed on every exit path.

use crate::archive::{ArchiveFormat, ArchiveHandle};
use crate::catalog::ReleaseRef;
use crate::cleanup;
use crate::error::{Error, Result};
use crate::extract::ArchiveExtractor;
use crate::fetch::{ArchiveFetcher, FetchRequest};
use crate::http::{HttpTransport, ProgressObserver};
use crate::mirror::mirror;
use crate::resolver::ArchiveResolver;
use crate::settings::Endpoints;
use crate::snapshot::CORE_DESCRIPTOR;
use crate::staging::{self, StagingArea};
use camino::{Utf8Path, Utf8PathBuf};
use std::fmt;

/// File stem of staged release downloads.
const ARCHIVE_STEM: &str = "pw";

/// Where the release comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AcquisitionSource {
    /// Download the given release.
    Remote(ReleaseRef),
    /// Use an already downloaded directory or archive.
    Local(Utf8PathBuf),
}

/// Inputs of a pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcquisitionRequest {
    /// Release source.
    pub source: AcquisitionSource,
    /// Project directory to populate.
    pub destination: Utf8PathBuf,
}

impl AcquisitionRequest {
    /// Acquire `target` into `destination`.
    #[must_use]
    pub fn remote(target: ReleaseRef, destination: impl Into<Utf8PathBuf>) -> Self {
        Self {
            source: AcquisitionSource::Remote(target),
            destination: destination.into(),
        }
    }

    /// Populate `destination` from the local `source`.
    #[must_use]
    pub fn local(source: impl Into<Utf8PathBuf>, destination: impl Into<Utf8PathBuf>) -> Self {
        Self {
            source: AcquisitionSource::Local(source.into()),
            destination: destination.into(),
        }
    }

    /// Project name derived from the destination's final component.
    #[must_use]
    pub fn project_name(&self) -> &str {
        self.destination.file_name().unwrap_or("project")
    }
}

/// Pipeline states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Nothing has happened yet.
    Start,
    /// Looking for an existing install or a local source.
    CheckPreexisting,
    /// The download location passed pre-flight.
    Resolved,
    /// The release files are already on disk.
    AlreadyPresent,
    /// The archive is being downloaded.
    Downloading,
    /// The archive is in the staging area.
    Downloaded,
    /// The archive is being unpacked.
    Extracting,
    /// The release files are in the destination.
    Extracted,
    /// Temporary files are being removed.
    CleaningUp,
    /// The run finished successfully.
    Done,
    /// The run failed; cleanup follows.
    Failed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// How a successful run populated the destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquisitionOutcome {
    /// The installed marker was already present; nothing was done.
    AlreadyInstalled,
    /// A local directory was copied in.
    Mirrored,
    /// An archive was unpacked.
    Extracted {
        /// Format of the unpacked archive.
        format: ArchiveFormat,
    },
}

/// Result of a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcquisitionReport {
    /// What the run did.
    pub outcome: AcquisitionOutcome,
    /// Every stage entered, in order.
    pub transitions: Vec<Stage>,
}

/// Resolver → fetcher → extractor with idempotency and guaranteed cleanup.
pub struct AcquisitionPipeline<'a> {
    endpoints: &'a Endpoints,
    transport: &'a dyn HttpTransport,
    fetcher: &'a dyn ArchiveFetcher,
    extractor: &'a dyn ArchiveExtractor,
}

/// Mutable state of one run.
struct Run {
    transitions: Vec<Stage>,
    staging: Option<StagingArea>,
}

impl Run {
    fn new() -> Self {
        let mut run = Self {
            transitions: Vec::new(),
            staging: None,
        };
        run.enter(Stage::Start);
        run
    }

    fn enter(&mut self, stage: Stage) {
        log::debug!("acquisition stage: {stage}");
        self.transitions.push(stage);
    }

    fn release_staging(&mut self) {
        if let Some(area) = self.staging.take() {
            staging::release(area);
        }
    }

    fn finish(mut self, outcome: AcquisitionOutcome) -> AcquisitionReport {
        self.enter(Stage::Done);
        AcquisitionReport {
            outcome,
            transitions: self.transitions,
        }
    }
}

impl<'a> AcquisitionPipeline<'a> {
    /// Assemble a pipeline from its collaborators.
    #[must_use]
    pub fn new(
        endpoints: &'a Endpoints,
        transport: &'a dyn HttpTransport,
        fetcher: &'a dyn ArchiveFetcher,
        extractor: &'a dyn ArchiveExtractor,
    ) -> Self {
        Self {
            endpoints,
            transport,
            fetcher,
            extractor,
        }
    }

    /// Whether `project_dir` already holds a finished install, or the
    /// files of an earlier successful run.
    #[must_use]
    pub fn is_installed(&self, project_dir: &Utf8Path) -> bool {
        if project_dir.join(&self.endpoints.installed_marker).exists() {
            return true;
        }
        project_dir.join(CORE_DESCRIPTOR).is_file() && cleanup::has_project_readme(project_dir)
    }

    /// Execute one run.
    ///
    /// # Errors
    ///
    /// Returns the error of the stage that failed, after cleanup.
    pub fn run(
        &self,
        request: &AcquisitionRequest,
        progress: &mut dyn ProgressObserver,
    ) -> Result<AcquisitionReport> {
        let mut run = Run::new();
        run.enter(Stage::CheckPreexisting);
        if self.is_installed(&request.destination) {
            log::debug!("{} is already installed", request.destination);
            return Ok(run.finish(AcquisitionOutcome::AlreadyInstalled));
        }

        match self.advance(&mut run, request, progress) {
            Ok(outcome) => {
                run.enter(Stage::CleaningUp);
                run.release_staging();
                cleanup::tidy_project(
                    &request.destination,
                    request.project_name(),
                    &chrono::Local::now(),
                );
                Ok(run.finish(outcome))
            }
            Err(err) => {
                run.enter(Stage::Failed);
                run.enter(Stage::CleaningUp);
                run.release_staging();
                log::debug!("acquisition failed after {:?}", run.transitions);
                Err(err)
            }
        }
    }

    fn advance(
        &self,
        run: &mut Run,
        request: &AcquisitionRequest,
        progress: &mut dyn ProgressObserver,
    ) -> Result<AcquisitionOutcome> {
        let destination = &request.destination;
        match &request.source {
            AcquisitionSource::Local(source) => match classify_local(source)? {
                LocalSource::Directory => {
                    mirror(source, destination)?;
                    run.enter(Stage::AlreadyPresent);
                    run.enter(Stage::Extracted);
                    Ok(AcquisitionOutcome::Mirrored)
                }
                LocalSource::Archive(handle) => self.extract(run, &handle, destination),
            },
            AcquisitionSource::Remote(target) => {
                ensure_vacant(destination, request.project_name())?;

                let resolver = ArchiveResolver::new(self.transport, self.endpoints);
                let resolved = resolver.resolve(target)?;
                resolver.preflight(&resolved)?;
                run.enter(Stage::Resolved);

                run.enter(Stage::Downloading);
                let fetch = FetchRequest {
                    identifier: resolved.identifier,
                    url: resolved.download_url,
                    format: resolved.format,
                    file_stem: ARCHIVE_STEM.to_owned(),
                };
                let fetched = self.fetcher.fetch(&fetch, destination, progress)?;
                run.staging = Some(fetched.staging);
                run.enter(Stage::Downloaded);

                self.extract(run, &fetched.handle, destination)
            }
        }
    }

    fn extract(
        &self,
        run: &mut Run,
        handle: &ArchiveHandle,
        destination: &Utf8Path,
    ) -> Result<AcquisitionOutcome> {
        run.enter(Stage::Extracting);
        self.extractor.extract(handle, destination, true)?;
        run.enter(Stage::Extracted);
        Ok(AcquisitionOutcome::Extracted {
            format: handle.format(),
        })
    }
}

enum LocalSource {
    Directory,
    Archive(ArchiveHandle),
}

fn classify_local(source: &Utf8Path) -> Result<LocalSource> {
    let unusable = |reason: &str| Error::SourceUnusable {
        path: source.to_owned(),
        reason: reason.to_owned(),
    };
    let metadata = std::fs::metadata(source).map_err(|err| unusable(&err.to_string()))?;
    if metadata.is_dir() {
        return Ok(LocalSource::Directory);
    }
    ArchiveHandle::detect(source)
        .map(LocalSource::Archive)
        .ok_or_else(|| unusable("not a .zip, .tgz, or .tar.gz archive"))
}

/// Refuse to download into a directory that already has content.
fn ensure_vacant(destination: &Utf8Path, project_name: &str) -> Result<()> {
    let occupied = match destination.read_dir_utf8() {
        Ok(mut entries) => entries.next().is_some(),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => false,
        Err(err) => return Err(err.into()),
    };
    if occupied {
        return Err(Error::ProjectExists {
            name: project_name.to_owned(),
            path: destination.to_owned(),
        });
    }
    Ok(())
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
