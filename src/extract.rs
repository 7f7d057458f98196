//! Materialise an archive as a directory tree.
//!
//! Entries are applied in archive order.  The `.` root record stands for the
//! target directory itself and is skipped.  Directory records are created
//! (an existing directory is fine); every other record becomes a regular
//! file whose payload is copied through bounded reads.  The first failure
//! aborts the extraction; whatever was already written stays on disk.

use std::fs::{DirBuilder, File, OpenOptions};
use std::io::{BufReader, Read, Seek};
use std::path::{Component, Path, PathBuf};

#[cfg(unix)]
use std::os::unix::fs::{DirBuilderExt, OpenOptionsExt};

use serde::Serialize;

use crate::entry::{CpioEntry, EntryName};
use crate::error::{CpioError, Result};
use crate::header::DOT_NAME;
use crate::io_stream::{CpioReader, DEFAULT_CHUNK_SIZE};
use crate::mode::EntryKind;

/// Mode used for the target directory when it has to be created.
pub const DEFAULT_ROOT_MODE: u32 = 0o766;

/// Configuration for [`extract_with_options`].
#[derive(Debug, Clone)]
pub struct ExtractOptions {
    /// Payload copy buffer size.
    pub chunk_size:        usize,
    /// Mode for a missing target directory.
    pub root_mode:         u32,
    /// Create entries with their archived permission bits.  When false,
    /// directories get 0o755 and files 0o644 (before umask).
    pub apply_permissions: bool,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            chunk_size:        DEFAULT_CHUNK_SIZE,
            root_mode:         DEFAULT_ROOT_MODE,
            apply_permissions: true,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ExtractStats {
    pub directories: u64,
    pub files:       u64,
    pub bytes:       u64,
}

/// Extract the archive at `source` into `target`.
pub fn extract<P: AsRef<Path>, Q: AsRef<Path>>(source: P, target: Q) -> Result<ExtractStats> {
    extract_with_options(source, target, &ExtractOptions::default())
}

pub fn extract_with_options<P: AsRef<Path>, Q: AsRef<Path>>(
    source:  P,
    target:  Q,
    options: &ExtractOptions,
) -> Result<ExtractStats> {
    let (source, target) = (source.as_ref(), target.as_ref());
    if source.as_os_str().is_empty() || target.as_os_str().is_empty() {
        return Err(CpioError::InvalidArgument("source and target paths must be non-empty".into()));
    }
    let mut reader = CpioReader::new(BufReader::new(File::open(source)?));
    extract_entries(&mut reader, target, options)
}

/// Extract every remaining entry of `reader` into `target`.
pub fn extract_entries<R: Read + Seek>(
    reader:  &mut CpioReader<R>,
    target:  &Path,
    options: &ExtractOptions,
) -> Result<ExtractStats> {
    ensure_root(target, options.root_mode)?;

    let mut stats = ExtractStats::default();
    while let Some(entry) = reader.next_entry()? {
        if entry.name == DOT_NAME {
            continue;
        }
        let relative = relative_entry_path(&entry.name)?;
        if relative.as_os_str().is_empty() {
            continue;
        }
        let path = target.join(&relative);

        if entry.is_dir() {
            create_dir(&path, dir_mode(&entry, options))?;
            stats.directories += 1;
        } else {
            if entry.kind() != EntryKind::Regular {
                tracing::debug!(name = %entry.name.to_string_lossy(), kind = ?entry.kind(), "extracting as regular file");
            }
            let mut out = create_file(&path, file_mode(&entry, options))?;
            stats.bytes += reader.copy_payload(&mut out, options.chunk_size)?;
            stats.files += 1;
        }
        tracing::debug!(path = %path.display(), size = entry.size, "extracted entry");
    }

    tracing::info!(
        dest = %target.display(),
        directories = stats.directories,
        files = stats.files,
        bytes = stats.bytes,
        "extraction complete"
    );
    Ok(stats)
}

/// Entry name as a path relative to the target; absolute names and `..`
/// components are rejected.
pub fn relative_entry_path(name: &EntryName) -> Result<PathBuf> {
    let mut out = PathBuf::new();
    for component in name.to_path().components() {
        match component {
            Component::Normal(part) => out.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(CpioError::UnsafePath(name.to_string()));
            }
        }
    }
    Ok(out)
}

fn dir_mode(entry: &CpioEntry, options: &ExtractOptions) -> u32 {
    if options.apply_permissions { entry.permissions() } else { 0o755 }
}

fn file_mode(entry: &CpioEntry, options: &ExtractOptions) -> u32 {
    if options.apply_permissions { entry.permissions() } else { 0o644 }
}

fn ensure_root(target: &Path, mode: u32) -> Result<()> {
    if target.is_dir() {
        return Ok(());
    }
    let mut builder = DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    builder.mode(mode);
    #[cfg(not(unix))]
    let _ = mode;
    builder.create(target)?;
    Ok(())
}

fn create_dir(path: &Path, mode: u32) -> Result<()> {
    let mut builder = DirBuilder::new();
    #[cfg(unix)]
    builder.mode(mode);
    #[cfg(not(unix))]
    let _ = mode;
    match builder.create(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists && path.is_dir() => Ok(()),
        Err(e) => Err(e.into()),
    }
}

fn create_file(path: &Path, mode: u32) -> Result<File> {
    let mut opts = OpenOptions::new();
    opts.write(true).create(true).truncate(true);
    #[cfg(unix)]
    opts.mode(mode);
    #[cfg(not(unix))]
    let _ = mode;
    Ok(opts.open(path)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::io_stream::CpioWriter;
    use std::fs;
    use std::io::Cursor;
    use tempfile::tempdir;

    fn archive(entries: &[(&str, u32, &[u8])]) -> CpioReader<Cursor<Vec<u8>>> {
        let mut w = CpioWriter::new(Vec::new()).unwrap();
        for (name, mode, data) in entries {
            w.write_entry(&CpioEntry::new(*name, *mode, data.len() as u64)).unwrap();
            w.write_data(data).unwrap();
        }
        CpioReader::new(Cursor::new(w.finish().unwrap()))
    }

    #[test]
    fn extracts_directory_and_file() {
        let tmp = tempdir().unwrap();
        let target = tmp.path().join("T");
        let mut r = archive(&[("dir", 0o040755, b""), ("dir/a.txt", 0o100644, b"hello")]);

        let stats = extract_entries(&mut r, &target, &ExtractOptions::default()).unwrap();
        assert_eq!(stats, ExtractStats { directories: 1, files: 1, bytes: 5 });
        assert!(target.join("dir").is_dir());
        assert_eq!(fs::read(target.join("dir/a.txt")).unwrap(), b"hello");
    }

    #[test]
    fn existing_directories_are_reused() {
        let tmp = tempdir().unwrap();
        fs::create_dir(tmp.path().join("dir")).unwrap();
        let mut r = archive(&[("dir", 0o040755, b""), ("./dir/b", 0o100600, b"xy")]);
        extract_entries(&mut r, tmp.path(), &ExtractOptions::default()).unwrap();
        assert_eq!(fs::read(tmp.path().join("dir/b")).unwrap(), b"xy");
    }

    #[test]
    fn small_chunks_copy_everything() {
        let tmp = tempdir().unwrap();
        let data: Vec<u8> = (0u8..=255).cycle().take(5000).collect();
        let mut r = archive(&[("blob", 0o100644, &data)]);
        let opts = ExtractOptions { chunk_size: 7, ..ExtractOptions::default() };
        let stats = extract_entries(&mut r, tmp.path(), &opts).unwrap();
        assert_eq!(stats.bytes, 5000);
        assert_eq!(fs::read(tmp.path().join("blob")).unwrap(), data);
    }

    #[test]
    fn parent_traversal_is_rejected() {
        let tmp = tempdir().unwrap();
        let target = tmp.path().join("out");
        let mut r = archive(&[("../evil", 0o100644, b"x")]);
        let err = extract_entries(&mut r, &target, &ExtractOptions::default()).unwrap_err();
        assert!(matches!(err, CpioError::UnsafePath(_)));
        assert_eq!(err.kind(), ErrorKind::Format);
        assert!(!tmp.path().join("evil").exists());
    }

    #[test]
    fn relative_paths() {
        let rel = |name: &str| relative_entry_path(&EntryName::from(name));
        assert_eq!(rel("a/b").unwrap(), PathBuf::from("a/b"));
        assert_eq!(rel("./a").unwrap(), PathBuf::from("a"));
        assert!(rel("/etc/passwd").is_err());
        assert!(rel("a/../../b").is_err());
    }

    #[cfg(unix)]
    #[test]
    fn non_utf8_names_are_extracted_byte_exact() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let tmp = tempdir().unwrap();
        let mut w = CpioWriter::new(Vec::new()).unwrap();
        w.write_entry(&CpioEntry::file(&b"caf\xE9"[..], 0o644, 3)).unwrap();
        w.write_data(b"bon").unwrap();
        let mut r = CpioReader::new(Cursor::new(w.finish().unwrap()));

        let stats = extract_entries(&mut r, tmp.path(), &ExtractOptions::default()).unwrap();
        assert_eq!(stats.files, 1);
        let path = tmp.path().join(OsStr::from_bytes(b"caf\xE9"));
        assert_eq!(fs::read(path).unwrap(), b"bon");
    }

    #[test]
    fn missing_parent_aborts() {
        let tmp = tempdir().unwrap();
        let mut r = archive(&[("nodir/file", 0o100644, b"x"), ("later", 0o100644, b"y")]);
        let err = extract_entries(&mut r, tmp.path(), &ExtractOptions::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
        assert!(!tmp.path().join("later").exists());
    }

    #[cfg(unix)]
    #[test]
    fn applies_archived_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = tempdir().unwrap();
        let mut r = archive(&[("script", 0o100700, b"#!/bin/sh\n")]);
        extract_entries(&mut r, tmp.path(), &ExtractOptions::default()).unwrap();
        let mode = fs::metadata(tmp.path().join("script")).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o700);
    }
}
