//! Tests for archive extraction.

use super::*;
use crate::test_utils::{borrow_entries, release_entries, utf8_tempdir, write_tar_gz, write_zip};
use rstest::rstest;

fn release_archive(dir: &Utf8Path, format: ArchiveFormat) -> ArchiveHandle {
    let path = dir.join(format!("release.{}", format.extension()));
    let entries = release_entries("processwire-master");
    match format {
        ArchiveFormat::Zip => write_zip(&path, &borrow_entries(&entries)),
        ArchiveFormat::TarGz => write_tar_gz(&path, &borrow_entries(&entries)),
    }
    ArchiveHandle::new(path, format)
}

#[rstest]
#[case::zip(ArchiveFormat::Zip)]
#[case::tar_gz(ArchiveFormat::TarGz)]
fn strips_single_root_directory(#[case] format: ArchiveFormat) {
    let (_guard, dir) = utf8_tempdir();
    let handle = release_archive(&dir, format);
    let destination = dir.join("site");

    NativeExtractor
        .extract(&handle, &destination, true)
        .expect("extraction succeeds");

    assert!(destination.join("index.php").is_file());
    assert!(destination.join("wire/core/ProcessWire.php").is_file());
    assert!(destination.join("site-blank/install/install.sql").is_file());
    assert!(!destination.join("processwire-master").exists());
}

#[rstest]
#[case::zip(ArchiveFormat::Zip)]
#[case::tar_gz(ArchiveFormat::TarGz)]
fn keeps_root_when_not_stripping(#[case] format: ArchiveFormat) {
    let (_guard, dir) = utf8_tempdir();
    let handle = release_archive(&dir, format);
    let destination = dir.join("site");

    NativeExtractor
        .extract(&handle, &destination, false)
        .expect("extraction succeeds");

    assert!(destination.join("processwire-master/index.php").is_file());
}

#[test]
fn several_top_level_entries_are_kept_as_is() {
    let (_guard, dir) = utf8_tempdir();
    let path = dir.join("flat.zip");
    write_zip(
        &path,
        &[("a/one.txt", b"1".as_slice()), ("b/two.txt", b"2".as_slice())],
    );
    let destination = dir.join("out");

    NativeExtractor
        .extract(&ArchiveHandle::new(path, ArchiveFormat::Zip), &destination, true)
        .expect("extraction succeeds");

    assert!(destination.join("a/one.txt").is_file());
    assert!(destination.join("b/two.txt").is_file());
}

#[rstest]
#[case::zip(ArchiveFormat::Zip)]
#[case::tar_gz(ArchiveFormat::TarGz)]
fn zero_byte_archive_is_empty_and_destination_untouched(#[case] format: ArchiveFormat) {
    let (_guard, dir) = utf8_tempdir();
    let path = dir.join(format!("empty.{}", format.extension()));
    std::fs::write(&path, b"").expect("write empty file");
    let destination = dir.join("site");

    let err = NativeExtractor
        .extract(&ArchiveHandle::new(path, format), &destination, true)
        .expect_err("empty archive");

    assert!(matches!(err, ExtractionError::Empty { .. }));
    assert!(!destination.exists());
}

#[test]
fn archive_without_entries_is_empty() {
    let (_guard, dir) = utf8_tempdir();
    let path = dir.join("none.zip");
    write_zip(&path, &[]);

    let err = NativeExtractor
        .extract(&ArchiveHandle::new(path, ArchiveFormat::Zip), &dir.join("out"), true)
        .expect_err("no entries");

    assert!(matches!(err, ExtractionError::Empty { .. }));
}

#[rstest]
#[case::zip(ArchiveFormat::Zip)]
#[case::tar_gz(ArchiveFormat::TarGz)]
fn garbage_is_corrupted_and_destination_untouched(#[case] format: ArchiveFormat) {
    let (_guard, dir) = utf8_tempdir();
    let path = dir.join(format!("garbage.{}", format.extension()));
    std::fs::write(&path, b"<html>Not Found</html>").expect("write garbage");
    let destination = dir.join("site");

    let err = NativeExtractor
        .extract(&ArchiveHandle::new(path, format), &destination, true)
        .expect_err("corrupted archive");

    assert!(matches!(err, ExtractionError::Corrupted { .. }));
    assert!(!destination.exists());
}

#[test]
fn zip_slip_entries_fail() {
    let (_guard, dir) = utf8_tempdir();
    let path = dir.join("evil.zip");
    write_zip(&path, &[("../evil.txt", b"boom".as_slice())]);
    let destination = dir.join("site");

    let err = NativeExtractor
        .extract(&ArchiveHandle::new(path, ArchiveFormat::Zip), &destination, true)
        .expect_err("traversal rejected");

    assert!(matches!(err, ExtractionError::Failed { .. }));
    assert!(!dir.join("evil.txt").exists());
}

/// Write a tarball whose first entry is a symlink to `link_target`, followed
/// by a file written through that link.
fn write_linked_tar_gz(path: &Utf8Path, kind: tar::EntryType, link_target: &str) {
    let file = File::create(path).expect("create tarball");
    let encoder = flate2::write::GzEncoder::new(file, flate2::Compression::default());
    let mut builder = tar::Builder::new(encoder);

    let mut link = tar::Header::new_gnu();
    link.set_entry_type(kind);
    link.set_size(0);
    link.set_mode(0o777);
    builder
        .append_link(&mut link, "pkg/link", link_target)
        .expect("append link");

    let mut header = tar::Header::new_gnu();
    header.set_entry_type(tar::EntryType::Regular);
    header.set_size(4);
    header.set_mode(0o644);
    builder
        .append_data(&mut header, "pkg/link/escaped.txt", b"boom".as_slice())
        .expect("append file");

    builder
        .into_inner()
        .expect("finish tar")
        .finish()
        .expect("finish gzip");
}

#[rstest]
#[case::absolute_symlink(tar::EntryType::Symlink, true)]
#[case::parent_symlink(tar::EntryType::Symlink, false)]
#[case::hard_link(tar::EntryType::Link, true)]
fn tar_links_leaving_destination_fail(#[case] kind: tar::EntryType, #[case] absolute: bool) {
    let (_guard, dir) = utf8_tempdir();
    let outside = dir.join("outside");
    fs::create_dir_all(&outside).expect("create outside dir");
    let link_target = if absolute {
        outside.to_string()
    } else {
        "../../outside".to_owned()
    };
    let path = dir.join("evil.tar.gz");
    write_linked_tar_gz(&path, kind, &link_target);
    let destination = dir.join("site");

    let err = NativeExtractor
        .extract(&ArchiveHandle::new(path, ArchiveFormat::TarGz), &destination, false)
        .expect_err("link rejected");

    assert!(matches!(err, ExtractionError::Failed { .. }), "unexpected error: {err}");
    assert!(!outside.join("escaped.txt").exists());
}

#[cfg(unix)]
#[test]
fn tar_symlinks_inside_destination_are_kept() {
    let (_guard, dir) = utf8_tempdir();
    let path = dir.join("links.tar.gz");
    let file = File::create(&path).expect("create tarball");
    let encoder = flate2::write::GzEncoder::new(file, flate2::Compression::default());
    let mut builder = tar::Builder::new(encoder);
    let mut header = tar::Header::new_gnu();
    header.set_entry_type(tar::EntryType::Regular);
    header.set_size(5);
    header.set_mode(0o644);
    builder
        .append_data(&mut header, "pkg/index.php", b"<?php".as_slice())
        .expect("append file");
    let mut link = tar::Header::new_gnu();
    link.set_entry_type(tar::EntryType::Symlink);
    link.set_size(0);
    link.set_mode(0o777);
    builder
        .append_link(&mut link, "pkg/alias.php", "index.php")
        .expect("append link");
    builder
        .into_inner()
        .expect("finish tar")
        .finish()
        .expect("finish gzip");
    let destination = dir.join("site");

    NativeExtractor
        .extract(&ArchiveHandle::new(path, ArchiveFormat::TarGz), &destination, true)
        .expect("extraction succeeds");

    let alias = destination.join("alias.php");
    assert!(alias.is_symlink());
    assert_eq!(fs::read_to_string(alias).expect("read through link"), "<?php");
}

#[rstest]
#[case::parent_dir("../escape.txt")]
#[case::nested_parent("foo/../../escape.txt")]
#[case::absolute("/etc/passwd")]
fn rejects_path_traversal(#[case] bad_path: &str) {
    assert!(validate_entry_path(Path::new(bad_path)).is_err());
}

#[test]
fn accepts_normal_paths() {
    assert!(validate_entry_path(Path::new("wire/core/ProcessWire.php")).is_ok());
}

fn listed(entries: &[(&str, bool)]) -> Vec<ListedEntry> {
    entries
        .iter()
        .map(|(path, is_dir)| ListedEntry {
            path: PathBuf::from(path),
            is_dir: *is_dir,
        })
        .collect()
}

#[rstest]
#[case::shared(&[("root", true), ("root/a.txt", false)], Some("root"))]
#[case::implicit_dir(&[("root/a.txt", false), ("root/b/c.txt", false)], Some("root"))]
#[case::top_level_file(&[("root/a.txt", false), ("README", false)], None)]
#[case::two_roots(&[("a/x", false), ("b/y", false)], None)]
#[case::only_directory(&[("root", true)], None)]
fn detects_shared_root(#[case] entries: &[(&str, bool)], #[case] expected: Option<&str>) {
    let root = shared_root(&listed(entries));
    assert_eq!(root.as_deref().and_then(std::ffi::OsStr::to_str), expected);
}

#[cfg(unix)]
#[test]
fn zip_modes_are_restored() {
    use std::os::unix::fs::PermissionsExt;

    let (_guard, dir) = utf8_tempdir();
    let path = dir.join("modes.zip");
    {
        let mut writer = zip::ZipWriter::new(File::create(&path).expect("create zip"));
        let options = zip::write::SimpleFileOptions::default().unix_permissions(0o755);
        writer.start_file("tool/run.sh", options).expect("start file");
        std::io::Write::write_all(&mut writer, b"#!/bin/sh\n").expect("write");
        writer.finish().expect("finish");
    }
    let destination = dir.join("out");

    NativeExtractor
        .extract(&ArchiveHandle::new(path, ArchiveFormat::Zip), &destination, true)
        .expect("extraction succeeds");

    let mode = std::fs::metadata(destination.join("run.sh"))
        .expect("extracted file")
        .permissions()
        .mode();
    assert_eq!(mode & 0o777, 0o755);
}

#[cfg(unix)]
#[test]
fn unwritable_destination_is_a_permission_error() {
    use std::os::unix::fs::PermissionsExt;

    // Root bypasses permission bits.
    if unsafe { libc::geteuid() } == 0 {
        return;
    }

    let (_guard, dir) = utf8_tempdir();
    let handle = release_archive(&dir, ArchiveFormat::Zip);
    let locked = dir.join("locked");
    std::fs::create_dir(&locked).expect("create locked dir");
    std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o555))
        .expect("lock directory");

    let result = NativeExtractor.extract(&handle, &locked.join("site"), true);

    std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o755))
        .expect("unlock directory");
    assert!(matches!(result, Err(ExtractionError::Permission { .. })));
}
