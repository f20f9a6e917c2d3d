//! Module download and installation.

use crate::archive::ArchiveFormat;
use crate::error::{Error, Result};
use crate::extract::ArchiveExtractor;
use crate::fetch::{ArchiveFetcher, FetchRequest};
use crate::http::ProgressObserver;
use crate::staging;
use camino::{Utf8Path, Utf8PathBuf};

/// Modules directory relative to an install root.
pub const MODULES_SUBDIR: &str = "site/modules";

/// Whether `modules_dir/<name>` exists and has content.
#[must_use]
pub fn module_exists(modules_dir: &Utf8Path, name: &str) -> bool {
    modules_dir
        .join(name)
        .read_dir_utf8()
        .is_ok_and(|mut entries| entries.next().is_some())
}

/// Downloads module archives and unpacks them into a modules directory.
pub struct ModuleInstaller<'a> {
    fetcher: &'a dyn ArchiveFetcher,
    extractor: &'a dyn ArchiveExtractor,
}

impl<'a> ModuleInstaller<'a> {
    /// Create an installer from its collaborators.
    #[must_use]
    pub fn new(fetcher: &'a dyn ArchiveFetcher, extractor: &'a dyn ArchiveExtractor) -> Self {
        Self { fetcher, extractor }
    }

    /// Install module `name` from `url` into `modules_dir/<name>` and return
    /// that directory.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ModuleExists`] when the module is already present,
    /// and the fetch or extraction error otherwise. The staging area is
    /// removed in every case.
    pub fn install(
        &self,
        name: &str,
        url: &str,
        modules_dir: &Utf8Path,
        progress: &mut dyn ProgressObserver,
    ) -> Result<Utf8PathBuf> {
        let target = modules_dir.join(name);
        if module_exists(modules_dir, name) {
            return Err(Error::ModuleExists {
                name: name.to_owned(),
                path: target,
            });
        }

        let request = FetchRequest {
            identifier: name.to_owned(),
            url: url.to_owned(),
            format: ArchiveFormat::from_name(url).unwrap_or(ArchiveFormat::Zip),
            file_stem: name.to_owned(),
        };
        let fetched = self.fetcher.fetch(&request, modules_dir, progress)?;
        let result = self
            .extractor
            .extract(&fetched.handle, &target, true)
            .map_err(Error::from)
            .and_then(|()| normalize_permissions(&target).map_err(Error::from));
        staging::release(fetched.staging);
        result?;

        log::debug!("installed module {name} into {target}");
        Ok(target)
    }
}

/// Install module `name` from `url` with a one-off [`ModuleInstaller`].
///
/// # Errors
///
/// See [`ModuleInstaller::install`].
pub fn install_module(
    name: &str,
    url: &str,
    modules_dir: &Utf8Path,
    fetcher: &dyn ArchiveFetcher,
    extractor: &dyn ArchiveExtractor,
    progress: &mut dyn ProgressObserver,
) -> Result<Utf8PathBuf> {
    ModuleInstaller::new(fetcher, extractor).install(name, url, modules_dir, progress)
}

/// Set `0755` on the module tree so the web server can read it.
#[cfg(unix)]
fn normalize_permissions(target: &Utf8Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    for entry in walkdir::WalkDir::new(target) {
        let entry = entry.map_err(std::io::Error::other)?;
        if entry.file_type().is_symlink() {
            continue;
        }
        std::fs::set_permissions(entry.path(), std::fs::Permissions::from_mode(0o755))?;
    }
    Ok(())
}

#[cfg(not(unix))]
fn normalize_permissions(_target: &Utf8Path) -> std::io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::{ExtractionError, MockArchiveExtractor, NativeExtractor};
    use crate::fetch::{FetchError, HttpArchiveFetcher};
    use crate::http::NoProgress;
    use crate::test_utils::{StubTransport, staging_dirs, utf8_tempdir, write_zip};

    const URL: &str = "https://github.test/ryan/Hello/archive/master.zip";

    fn module_zip() -> Vec<u8> {
        let (_guard, dir) = utf8_tempdir();
        let path = dir.join("module.zip");
        write_zip(
            &path,
            &[
                ("Hello-master/", b"".as_slice()),
                ("Hello-master/Hello.module", b"<?php".as_slice()),
                ("Hello-master/Hello.info.json", br#"{"version": 102}"#.as_slice()),
            ],
        );
        std::fs::read(&path).expect("read zip")
    }

    #[test]
    fn installs_into_named_directory() {
        let (_guard, dir) = utf8_tempdir();
        let modules = dir.join("site/modules");
        let transport = StubTransport::default().with_download(URL, module_zip());
        let fetcher = HttpArchiveFetcher::new(&transport);
        let installer = ModuleInstaller::new(&fetcher, &NativeExtractor);

        let target = installer
            .install("Hello", URL, &modules, &mut NoProgress)
            .expect("install succeeds");

        assert_eq!(target, modules.join("Hello"));
        assert!(target.join("Hello.module").is_file());
        assert!(module_exists(&modules, "Hello"));
        assert!(staging_dirs(&modules).is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn installed_files_are_world_readable() {
        use std::os::unix::fs::PermissionsExt;

        let (_guard, dir) = utf8_tempdir();
        let modules = dir.join("site/modules");
        let transport = StubTransport::default().with_download(URL, module_zip());
        let fetcher = HttpArchiveFetcher::new(&transport);
        let installer = ModuleInstaller::new(&fetcher, &NativeExtractor);

        let target = installer
            .install("Hello", URL, &modules, &mut NoProgress)
            .expect("install succeeds");

        let mode = std::fs::metadata(target.join("Hello.module"))
            .expect("module file")
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o755);
    }

    #[test]
    fn existing_module_is_not_overwritten() {
        let (_guard, dir) = utf8_tempdir();
        let modules = dir.join("site/modules");
        std::fs::create_dir_all(modules.join("Hello")).expect("create module dir");
        std::fs::write(modules.join("Hello/Hello.module"), b"local").expect("write");
        let transport = StubTransport::default().with_download(URL, module_zip());
        let fetcher = HttpArchiveFetcher::new(&transport);
        let installer = ModuleInstaller::new(&fetcher, &NativeExtractor);

        let err = installer
            .install("Hello", URL, &modules, &mut NoProgress)
            .expect_err("module exists");

        assert!(matches!(err, Error::ModuleExists { .. }));
        assert!(transport.requests().is_empty());
    }

    #[test]
    fn missing_archive_is_not_found() {
        let (_guard, dir) = utf8_tempdir();
        let modules = dir.join("site/modules");
        let transport = StubTransport::default();
        let fetcher = HttpArchiveFetcher::new(&transport);

        let err = install_module(
            "Hello",
            URL,
            &modules,
            &fetcher,
            &NativeExtractor,
            &mut NoProgress,
        )
        .expect_err("404");

        assert!(matches!(err, Error::Fetch(FetchError::NotFound { .. })));
        assert!(staging_dirs(&modules).is_empty());
    }

    #[test]
    fn extraction_failure_removes_staging_area() {
        let (_guard, dir) = utf8_tempdir();
        let modules = dir.join("site/modules");
        let transport = StubTransport::default().with_download(URL, module_zip());
        let fetcher = HttpArchiveFetcher::new(&transport);
        let mut extractor = MockArchiveExtractor::new();
        extractor.expect_extract().times(1).returning(|handle, _, _| {
            Err(ExtractionError::Corrupted {
                archive: handle.source_path().to_owned(),
                reason: "truncated".to_owned(),
            })
        });
        let installer = ModuleInstaller::new(&fetcher, &extractor);

        let err = installer
            .install("Hello", URL, &modules, &mut NoProgress)
            .expect_err("extraction fails");

        assert!(matches!(err, Error::Extraction(ExtractionError::Corrupted { .. })));
        assert!(staging_dirs(&modules).is_empty());
    }
}
