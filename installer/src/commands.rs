//! Command implementations.
//!
//! Every command receives a [`CommandContext`] holding the loaded settings,
//! the HTTP transport, and the working directory, so the binary wires real
//! collaborators while tests pass stubs.

use crate::cli::{Command, ModuleInstallArgs, ModulesArgs, NewArgs, UpgradeArgs};
use crate::dirs::{BaseDirs, default_config_file};
use crate::output::{
    format_branches, format_records, format_records_json, format_upgrade,
};
use crate::progress::StderrProgress;
use camino::{Utf8Path, Utf8PathBuf};
use std::collections::BTreeMap;
use std::io::Write;
use wirefetch::catalog::{BranchCatalog, ReleaseRef, check_core_upgrade};
use wirefetch::error::{Error, Result};
use wirefetch::extract::NativeExtractor;
use wirefetch::fetch::HttpArchiveFetcher;
use wirefetch::http::{HttpTransport, NoProgress, ProgressObserver};
use wirefetch::module_catalog::HttpModuleCatalog;
use wirefetch::module_install::{MODULES_SUBDIR, install_module};
use wirefetch::pipeline::{AcquisitionOutcome, AcquisitionPipeline, AcquisitionRequest};
use wirefetch::profile::{extract_profile, profile_dir};
use wirefetch::reconcile::{ModuleVersionRecord, VersionReconciler};
use wirefetch::settings::Settings;
use wirefetch::snapshot::{FilesystemSnapshot, LocalSnapshotProvider, MAX_ASCENT, locate_install_root};

/// Prefix of the site directories shipped with a release.
const PROFILE_PREFIX: &str = "site-";

/// Collaborators shared by every command.
pub struct CommandContext<'a> {
    /// Loaded configuration.
    pub settings: &'a Settings,
    /// HTTP transport for lookups and downloads.
    pub transport: &'a dyn HttpTransport,
    /// Directory relative paths are resolved against.
    pub cwd: &'a Utf8Path,
}

impl CommandContext<'_> {
    fn absolute(&self, path: &Utf8Path) -> Utf8PathBuf {
        if path.is_absolute() {
            path.to_owned()
        } else {
            self.cwd.join(path)
        }
    }

    fn install_root(&self, path: Option<&Utf8Path>) -> Result<Utf8PathBuf> {
        let start = path.map_or_else(|| self.cwd.to_owned(), |path| self.absolute(path));
        locate_install_root(&start, MAX_ASCENT)
    }
}

/// Load settings from `explicit`, or from the platform configuration file,
/// then apply environment overrides.
///
/// # Errors
///
/// Returns [`Error::Settings`] when the file or an override is invalid.
pub fn load_settings(explicit: Option<&Utf8Path>, dirs: &dyn BaseDirs) -> Result<Settings> {
    let path = explicit
        .map(Utf8Path::to_owned)
        .or_else(|| default_config_file(dirs));
    let mut settings = match path {
        Some(path) => Settings::load(&path)?,
        None => Settings::default(),
    };
    settings.apply_env()?;
    Ok(settings)
}

/// Run `command`, writing reports to `stdout` and progress to `stderr`.
///
/// # Errors
///
/// Returns the error of the failing command.
pub fn dispatch(
    command: &Command,
    context: &CommandContext<'_>,
    stdout: &mut dyn Write,
    stderr: &mut dyn Write,
) -> Result<()> {
    match command {
        Command::New(args) => run_new(context, args, stderr),
        Command::Upgrade(args) => run_upgrade(context, args, stdout),
        Command::Modules(args) => run_modules(context, args, stdout),
        Command::ModuleInstall(args) => run_module_install(context, args, stderr),
    }
}

/// Write one line, ignoring failures.
pub fn write_line(out: &mut dyn Write, message: impl std::fmt::Display) {
    writeln!(out, "{message}").ok();
}

fn release_target(sha: Option<&str>) -> ReleaseRef {
    sha.map_or_else(ReleaseRef::master, ReleaseRef::guess)
}

/// Map a bundled profile name such as `blank` to its directory name.
fn profile_name(profile: &str) -> String {
    if profile.ends_with(".zip") || profile.starts_with(PROFILE_PREFIX) {
        profile.to_owned()
    } else {
        format!("{PROFILE_PREFIX}{profile}")
    }
}

/// Create a project.
///
/// # Errors
///
/// Returns the acquisition or profile extraction error.
pub fn run_new(context: &CommandContext<'_>, args: &NewArgs, stderr: &mut dyn Write) -> Result<()> {
    let destination = args
        .directory
        .as_deref()
        .map_or_else(|| context.cwd.to_owned(), |dir| context.absolute(dir));
    let request = match &args.src {
        Some(src) => AcquisitionRequest::local(context.absolute(src), &destination),
        None => AcquisitionRequest::remote(release_target(args.sha.as_deref()), &destination),
    };

    let endpoints = &context.settings.endpoints;
    let fetcher = HttpArchiveFetcher::new(context.transport);
    let pipeline = AcquisitionPipeline::new(endpoints, context.transport, &fetcher, &NativeExtractor);

    if !args.quiet {
        write_line(stderr, format!("Preparing {} in {destination}...", request.project_name()));
    }
    let report = if args.quiet {
        pipeline.run(&request, &mut NoProgress)?
    } else {
        pipeline.run(&request, &mut StderrProgress::new(stderr))?
    };

    if !args.quiet {
        let summary = match report.outcome {
            AcquisitionOutcome::AlreadyInstalled => {
                format!("ProcessWire is already installed in {destination}.")
            }
            AcquisitionOutcome::Mirrored => format!("ProcessWire copied to {destination}."),
            AcquisitionOutcome::Extracted { format } => {
                format!("ProcessWire ({}) extracted to {destination}.", format.extension())
            }
        };
        write_line(stderr, summary);
    }

    if let Some(profile) = &args.profile {
        let profile = profile_name(profile);
        let profile = if profile.ends_with(".zip") {
            context.absolute(Utf8Path::new(&profile)).into_string()
        } else {
            profile
        };
        let name = extract_profile(&profile, &destination, &NativeExtractor)?;
        if !profile_dir(&destination, &name).is_dir() {
            log::warn!("site profile {name} is not present in {destination}");
        }
        if !args.quiet {
            write_line(stderr, format!("Site profile: {name}"));
        }
    }
    Ok(())
}

/// Compare the installed core with the requested release.
///
/// # Errors
///
/// Returns an error when no installation is found or the catalog cannot be
/// read.
pub fn run_upgrade(
    context: &CommandContext<'_>,
    args: &UpgradeArgs,
    stdout: &mut dyn Write,
) -> Result<()> {
    let root = context.install_root(args.path.as_deref())?;
    let installed = FilesystemSnapshot::new(&root).core_version()?;
    let target = release_target(args.sha.as_deref());
    let branches = BranchCatalog::new(context.transport, &context.settings.endpoints)
        .list_branches(&target)?;

    let upgrade =
        check_core_upgrade(&branches, &target, installed).ok_or_else(|| Error::Resolution {
            identifier: target.identifier().to_owned(),
            status: None,
            transport_error: None,
        })?;

    write_line(stdout, format_upgrade(installed, &upgrade));
    if args.branches {
        write_line(stdout, "");
        write_line(stdout, "Branches:");
        write_line(stdout, format_branches(&branches));
    }
    Ok(())
}

/// Report installed modules against the module directory.
///
/// # Errors
///
/// Returns an error when no installation is found or the catalog is
/// unavailable.
pub fn run_modules(
    context: &CommandContext<'_>,
    args: &ModulesArgs,
    stdout: &mut dyn Write,
) -> Result<()> {
    let root = context.install_root(args.path.as_deref())?;
    let snapshot = FilesystemSnapshot::new(&root);
    let catalog = HttpModuleCatalog::new(context.transport, &context.settings.module_service);
    let reconciler = VersionReconciler::new(&snapshot, &catalog);

    let records: BTreeMap<String, ModuleVersionRecord> = match &args.module {
        Some(name) => reconciler
            .reconcile_one(name, args.only_new)?
            .map(|record| (record.name.clone(), record))
            .into_iter()
            .collect(),
        None => reconciler.reconcile(args.only_new)?,
    };

    if args.json {
        write_line(stdout, format_records_json(&records));
    } else {
        let installed = reconciler.installed_versions()?;
        write_line(stdout, format_records(&records, &installed).trim_end());
    }
    Ok(())
}

/// Download a module into the project.
///
/// # Errors
///
/// Returns an error when no installation is found, the module is already
/// present, no archive URL is known, or the download fails.
pub fn run_module_install(
    context: &CommandContext<'_>,
    args: &ModuleInstallArgs,
    stderr: &mut dyn Write,
) -> Result<()> {
    let root = context.install_root(args.path.as_deref())?;
    let url = match &args.url {
        Some(url) => url.clone(),
        None => published_archive(context, &root, &args.name)?,
    };

    let fetcher = HttpArchiveFetcher::new(context.transport);
    let modules_dir = root.join(MODULES_SUBDIR);
    if !args.quiet {
        write_line(stderr, format!("Downloading {} from {url}...", args.name));
    }
    let mut quiet = NoProgress;
    let mut verbose;
    let progress: &mut dyn ProgressObserver = if args.quiet {
        &mut quiet
    } else {
        verbose = StderrProgress::new(stderr);
        &mut verbose
    };
    let target = install_module(
        &args.name,
        &url,
        &modules_dir,
        &fetcher,
        &NativeExtractor,
        progress,
    )?;
    if !args.quiet {
        write_line(stderr, format!("Module {} downloaded successfully to {target}.", args.name));
    }
    Ok(())
}

fn published_archive(context: &CommandContext<'_>, root: &Utf8Path, name: &str) -> Result<String> {
    let snapshot = FilesystemSnapshot::new(root);
    let catalog = HttpModuleCatalog::new(context.transport, &context.settings.module_service);
    VersionReconciler::new(&snapshot, &catalog)
        .reconcile_one(name, false)?
        .and_then(|record| record.download_url)
        .ok_or_else(|| Error::CatalogUnavailable {
            reason: format!("the module directory lists no project URL for {name}"),
        })
}

#[cfg(test)]
#[path = "commands_tests.rs"]
mod tests;
