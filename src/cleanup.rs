//! Best-effort project tidying after a successful acquisition.
//!
//! Nothing here may fail an acquisition: every step runs through
//! [`best_effort`], which logs and swallows errors.

use camino::Utf8Path;
use chrono::{DateTime, Local};
use std::fmt::Display;

/// Release files that have no place in a new project.
pub const EXTRANEOUS_PATTERNS: [&str; 3] = ["LICENSE*", "UPGRADE*.md", "CHANGELOG*.md"];

/// Name of the project marker written into the destination.
pub const README_NAME: &str = "README.md";

/// Sentence that identifies a README written by [`tidy_project`].
const README_SIGNATURE: &str = "A ProcessWire project created on";

/// Run `op`, logging and discarding its error.
///
/// # Examples
///
/// ```
/// use wirefetch::cleanup::best_effort;
///
/// let value = best_effort("parse", || "42".parse::<u8>());
/// assert_eq!(value, Some(42));
/// assert_eq!(best_effort("parse", || "x".parse::<u8>()), None);
/// ```
pub fn best_effort<T, E, F>(action: &str, op: F) -> Option<T>
where
    E: Display,
    F: FnOnce() -> Result<T, E>,
{
    match op() {
        Ok(value) => Some(value),
        Err(err) => {
            log::warn!("{action} failed (ignored): {err}");
            None
        }
    }
}

/// Contents of the README marker.
#[must_use]
pub fn project_readme(name: &str, created: &DateTime<Local>) -> String {
    format!(
        "{name}\n{underline}\n\n{README_SIGNATURE} {date}.\n",
        underline = "=".repeat(name.chars().count().max(4)),
        date = created.format("%B %-d, %Y at %H:%M"),
    )
}

/// Whether `project_dir` holds the README marker written by [`tidy_project`].
#[must_use]
pub fn has_project_readme(project_dir: &Utf8Path) -> bool {
    std::fs::read_to_string(project_dir.join(README_NAME))
        .is_ok_and(|text| text.contains(README_SIGNATURE))
}

/// Remove extraneous release files from `project_dir` and write the README
/// marker. Returns the number of files removed.
pub fn tidy_project(project_dir: &Utf8Path, project_name: &str, now: &DateTime<Local>) -> usize {
    let mut removed = 0;
    let escaped_dir = glob::Pattern::escape(project_dir.as_str());
    for pattern in EXTRANEOUS_PATTERNS {
        let full = format!("{escaped_dir}/{pattern}");
        let Some(paths) = best_effort("listing release files", || glob::glob(&full)) else {
            continue;
        };
        for path in paths.filter_map(|entry| best_effort("reading release file entry", || entry)) {
            if !path.is_file() {
                continue;
            }
            if best_effort("removing release file", || std::fs::remove_file(&path)).is_some() {
                log::debug!("removed {}", path.display());
                removed += 1;
            }
        }
    }

    let readme = project_dir.join(README_NAME);
    best_effort("writing project README", || {
        std::fs::write(&readme, project_readme(project_name, now))
    });
    removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::utf8_tempdir;
    use chrono::TimeZone;

    fn fixed_time() -> DateTime<Local> {
        Local
            .with_ymd_and_hms(2024, 3, 5, 14, 30, 0)
            .single()
            .expect("unambiguous local time")
    }

    #[test]
    fn readme_names_project_and_date() {
        let text = project_readme("shop", &fixed_time());
        assert!(text.starts_with("shop\n====\n\n"));
        assert!(text.contains("created on March 5, 2024 at 14:30."));
    }

    #[test]
    fn underline_matches_long_names() {
        let text = project_readme("my-big-site", &fixed_time());
        assert!(text.contains("\n===========\n"));
    }

    #[test]
    fn tidy_removes_release_files_and_writes_readme() {
        let (_guard, dir) = utf8_tempdir();
        for name in ["LICENSE.TXT", "UPGRADE-3.0.md", "CHANGELOG.md", "index.php"] {
            std::fs::write(dir.join(name), b"x").expect("write fixture");
        }

        let removed = tidy_project(&dir, "shop", &fixed_time());

        assert_eq!(removed, 3);
        assert!(dir.join("index.php").is_file());
        assert!(!dir.join("LICENSE.TXT").exists());
        assert!(!dir.join("CHANGELOG.md").exists());
        let readme = std::fs::read_to_string(dir.join(README_NAME)).expect("readme written");
        assert!(readme.starts_with("shop\n"));
    }

    #[test]
    fn project_readme_is_recognised_but_release_readme_is_not() {
        let (_guard, dir) = utf8_tempdir();
        std::fs::write(dir.join(README_NAME), "# ProcessWire\n").expect("write release readme");
        assert!(!has_project_readme(&dir));

        tidy_project(&dir, "shop", &fixed_time());

        assert!(has_project_readme(&dir));
    }

    #[test]
    fn tidy_tolerates_missing_directory() {
        let (_guard, dir) = utf8_tempdir();
        let missing = dir.join("gone");
        assert_eq!(tidy_project(&missing, "gone", &fixed_time()), 0);
        assert!(!missing.exists());
    }

    #[test]
    fn best_effort_swallows_errors() {
        let result: Option<()> = best_effort("failing step", || Err("boom"));
        assert!(result.is_none());
    }
}
