//! Platform directory lookup.

use camino::Utf8PathBuf;
use std::path::PathBuf;

/// Name of the configuration file inside the configuration directory.
pub const CONFIG_FILE_NAME: &str = "wirefetch.toml";

/// Source of platform-specific directories.
#[cfg_attr(test, mockall::automock)]
pub trait BaseDirs {
    /// The wirefetch configuration directory, if the platform has one.
    fn config_dir(&self) -> Option<PathBuf>;
}

/// [`BaseDirs`] backed by `directories-next`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemBaseDirs;

impl BaseDirs for SystemBaseDirs {
    fn config_dir(&self) -> Option<PathBuf> {
        directories_next::ProjectDirs::from("", "", "wirefetch")
            .map(|dirs| dirs.config_dir().to_path_buf())
    }
}

/// Default location of the configuration file.
///
/// Returns `None` when the platform has no configuration directory or its
/// path is not valid UTF-8.
#[must_use]
pub fn default_config_file(dirs: &dyn BaseDirs) -> Option<Utf8PathBuf> {
    let dir = dirs.config_dir()?;
    match Utf8PathBuf::try_from(dir) {
        Ok(dir) => Some(dir.join(CONFIG_FILE_NAME)),
        Err(err) => {
            log::warn!("ignoring non-UTF-8 configuration directory: {err}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_file_lives_in_config_dir() {
        let mut dirs = MockBaseDirs::new();
        dirs.expect_config_dir()
            .returning(|| Some(PathBuf::from("/home/test/.config/wirefetch")));

        assert_eq!(
            default_config_file(&dirs),
            Some(Utf8PathBuf::from("/home/test/.config/wirefetch/wirefetch.toml"))
        );
    }

    #[test]
    fn missing_config_dir_yields_none() {
        let mut dirs = MockBaseDirs::new();
        dirs.expect_config_dir().returning(|| None);

        assert_eq!(default_config_file(&dirs), None);
    }

    #[cfg(unix)]
    #[test]
    fn non_utf8_config_dir_yields_none() {
        use std::ffi::OsString;
        use std::os::unix::ffi::OsStringExt;

        let mut dirs = MockBaseDirs::new();
        dirs.expect_config_dir()
            .return_once(|| Some(PathBuf::from(OsString::from_vec(vec![b'/', 0xff]))));

        assert_eq!(default_config_file(&dirs), None);
    }
}
