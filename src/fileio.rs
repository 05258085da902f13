//! File access primitives.
//!
//! Thin wrappers around std I/O that pin down the store's discipline:
//! user-only permissions on every created file, exact-length reads for the
//! fixed record fields, fsync before any write is considered done, and the
//! temp-then-rename commit used for atomic rewrites. Interrupted reads and
//! writes are retried inside std (`read_exact`/`write_all` swallow
//! `ErrorKind::Interrupted`).

use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Read, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;

use anyhow::{Context, Result};
use walkdir::WalkDir;

/// Creates a new file for writing, mode 0600.
///
/// Fails if the file already exists; creation is the commit that brings an
/// item from absent to live, so it must be exclusive.
pub fn create_exclusive(path: &Path) -> Result<File> {
    OpenOptions::new()
        .write(true)
        .create_new(true)
        .mode(0o600)
        .open(path)
        .with_context(|| format!("could not create {}", path.display()))
}

/// Creates or truncates a file for writing, mode 0600.
///
/// Used for the temp file, which may survive a crashed rewrite and must be
/// reusable.
pub fn create_truncate(path: &Path) -> Result<File> {
    OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)
        .with_context(|| format!("could not create {}", path.display()))
}

/// Opens a file for reading.
pub fn open_read(path: &Path) -> Result<File> {
    File::open(path).with_context(|| format!("could not open {}", path.display()))
}

/// Writes the whole buffer and flushes it to disk.
pub fn write_all_sync(file: &mut File, buf: &[u8]) -> Result<()> {
    file.write_all(buf).context("could not write file")?;
    file.sync_all().context("could not flush to disk")
}

/// Reads exactly `buf.len()` bytes or fails.
///
/// Fixed-length record fields are read strictly; a short field means the
/// file is not a record of the expected shape.
pub fn read_exact_buf(file: &mut File, buf: &mut [u8]) -> Result<()> {
    file.read_exact(buf).context("unexpected end of file")
}

/// Checks whether a path exists.
///
/// Only "no such entry" maps to `false`; any other stat failure is an
/// error.
pub fn exists(path: &Path) -> Result<bool> {
    match fs::symlink_metadata(path) {
        Ok(_) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e).with_context(|| format!("Internal error: could not stat {}", path.display())),
    }
}

/// Commits a rewrite by renaming the temp file over the target.
pub fn commit_rename(temp: &Path, target: &Path) -> Result<()> {
    fs::rename(temp, target).with_context(|| format!("could not save {}", target.display()))
}

/// Removes a file, a symlink, or a whole directory tree.
///
/// A missing target is not an error. Directories are walked physically
/// (no symlink following), children removed before their parents.
pub fn remove_tree(path: &Path) -> Result<()> {
    let meta = match fs::symlink_metadata(path) {
        Ok(meta) => meta,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e).with_context(|| format!("could not stat {}", path.display())),
    };

    if !meta.is_dir() {
        return fs::remove_file(path).with_context(|| format!("could not remove {}", path.display()));
    }

    for entry in WalkDir::new(path).follow_links(false).contents_first(true) {
        let entry = entry.context("could not walk directory")?;
        let entry_path = entry.path();

        if entry.file_type().is_dir() {
            fs::remove_dir(entry_path).with_context(|| format!("could not remove {}", entry_path.display()))?;
        } else {
            fs::remove_file(entry_path).with_context(|| format!("could not remove {}", entry_path.display()))?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::tempdir;

    #[test]
    fn test_create_exclusive_rejects_existing() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("record");

        let mut file = create_exclusive(&path).unwrap();
        write_all_sync(&mut file, b"abc").unwrap();

        assert!(create_exclusive(&path).is_err());
    }

    #[test]
    fn test_created_files_are_user_only() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("record");

        create_exclusive(&path).unwrap();
        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_read_exact_rejects_short_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("record");

        let mut file = create_exclusive(&path).unwrap();
        write_all_sync(&mut file, b"12345").unwrap();

        let mut file = open_read(&path).unwrap();
        let mut buf = [0u8; 5];
        read_exact_buf(&mut file, &mut buf).unwrap();
        assert_eq!(&buf, b"12345");

        let mut file = open_read(&path).unwrap();
        let mut buf = [0u8; 6];
        assert!(read_exact_buf(&mut file, &mut buf).is_err());
    }

    #[test]
    fn test_exists() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("record");

        assert!(!exists(&path).unwrap());
        create_exclusive(&path).unwrap();
        assert!(exists(&path).unwrap());
    }

    #[test]
    fn test_commit_rename_replaces_target() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("record");
        let temp = dir.path().join("temp");

        let mut file = create_exclusive(&target).unwrap();
        write_all_sync(&mut file, b"old").unwrap();

        let mut file = create_truncate(&temp).unwrap();
        write_all_sync(&mut file, b"new").unwrap();

        commit_rename(&temp, &target).unwrap();
        assert_eq!(fs::read(&target).unwrap(), b"new");
        assert!(!exists(&temp).unwrap());
    }

    #[test]
    fn test_remove_tree() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("store");
        fs::create_dir(&root).unwrap();
        fs::write(root.join("a"), b"1").unwrap();
        fs::create_dir(root.join("sub")).unwrap();
        fs::write(root.join("sub").join("b"), b"2").unwrap();

        remove_tree(&root).unwrap();
        assert!(!exists(&root).unwrap());

        // Missing target is fine.
        remove_tree(&root).unwrap();
    }
}
