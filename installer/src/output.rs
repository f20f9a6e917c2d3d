//! Human-readable and JSON rendering of command results.

use std::collections::BTreeMap;
use wirefetch::catalog::{BranchInfo, CoreUpgrade, UpgradeStatus};
use wirefetch::error::Error;
use wirefetch::reconcile::ModuleVersionRecord;
use wirefetch::version::ReleaseVersion;

/// Render a failed command: the error, its remediation, and how to retry.
///
/// # Examples
///
/// ```
/// use wirefetch::error::Error;
/// use wirefetch_installer::output::render_error;
///
/// let err = Error::CatalogUnavailable { reason: "timed out".to_owned() };
/// let text = render_error(&err, "wirefetch modules");
/// assert!(text.starts_with("error: module catalog unavailable"));
/// assert!(text.ends_with("run again with: wirefetch modules"));
/// ```
#[must_use]
pub fn render_error(err: &Error, rerun: &str) -> String {
    format!("error: {err}\nhint: {}\nrun again with: {rerun}", err.hint())
}

/// Reconstruct the invoked command line for the retry hint.
///
/// The program path is reduced to its file name.
#[must_use]
pub fn rerun_command<I>(args: I) -> String
where
    I: IntoIterator<Item = String>,
{
    let mut args = args.into_iter();
    let program = args
        .next()
        .map(|path| {
            std::path::Path::new(&path)
                .file_name()
                .and_then(|name| name.to_str())
                .map_or_else(|| path.clone(), str::to_owned)
        })
        .unwrap_or_else(|| "wirefetch".to_owned());
    std::iter::once(program)
        .chain(args)
        .collect::<Vec<_>>()
        .join(" ")
}

fn status_label(record: &ModuleVersionRecord) -> &'static str {
    match (record.is_newer, record.remote_version) {
        (Some(1), _) => "upgrade available",
        (Some(0), _) => "up to date",
        (Some(_), _) => "newer than published",
        (None, None) => "not in directory",
        (None, Some(_)) => "unknown",
    }
}

/// Format reconciled modules as a table.
///
/// Unmet requirements of each record are listed beneath it, checked
/// against `installed`.
#[must_use]
pub fn format_records(
    records: &BTreeMap<String, ModuleVersionRecord>,
    installed: &BTreeMap<String, ReleaseVersion>,
) -> String {
    if records.is_empty() {
        return String::from("No modules to report.");
    }

    let width = records
        .keys()
        .map(|name| name.chars().count())
        .max()
        .unwrap_or(0)
        .max("Module".len());
    let mut output = format!(
        "{:<width$}  {:<10}  {:<10}  Status\n",
        "Module", "Installed", "Published"
    );
    for record in records.values() {
        let published = record
            .remote_version
            .map_or_else(|| "-".to_owned(), |version| version.to_string());
        output.push_str(&format!(
            "{:<width$}  {:<10}  {:<10}  {}\n",
            record.name,
            record.local_version.to_string(),
            published,
            status_label(record)
        ));
        for unmet in record.unmet_requirements(installed) {
            let current = unmet
                .installed
                .map_or_else(|| "not installed".to_owned(), |v| format!("installed {v}"));
            output.push_str(&format!(
                "    requires {}{} ({current})\n",
                unmet.name, unmet.requirement
            ));
        }
    }
    output
}

/// Format reconciled modules as JSON.
#[must_use]
pub fn format_records_json(records: &BTreeMap<String, ModuleVersionRecord>) -> String {
    serde_json::to_string_pretty(records).unwrap_or_else(|_| "{}".to_owned())
}

/// Describe the outcome of a core upgrade check.
#[must_use]
pub fn format_upgrade(installed: ReleaseVersion, upgrade: &CoreUpgrade) -> String {
    let verdict = match upgrade.status {
        UpgradeStatus::Available => "An upgrade is available.",
        UpgradeStatus::UpToDate => "ProcessWire is up to date.",
        UpgradeStatus::Undetermined => "Could not compare versions.",
    };
    format!(
        "Installed: {installed}\n{} ({}): {}\n{verdict}",
        upgrade.candidate.title, upgrade.candidate.name, upgrade.candidate.version
    )
}

/// List catalog entries, one per line.
#[must_use]
pub fn format_branches(branches: &BTreeMap<String, BranchInfo>) -> String {
    branches
        .values()
        .map(|info| format!("  {:<12} {:<22} {}", info.name, info.title, info.version))
        .collect::<Vec<_>>()
        .join("\n")
}
