//! High-level [`Archive`] API — a newc archive on disk, opened by path.
//!
//! ```no_run
//! use newcpio::archive::Archive;
//! use newcpio::CpioEntry;
//!
//! // Write
//! let mut ar = Archive::create("out.cpio")?;
//! ar.write_entry(&CpioEntry::file("readme.txt", 0o644, 13))?;
//! ar.write_data(b"Hello, world!")?;
//! ar.close()?;
//!
//! // Read
//! let mut ar = Archive::open("out.cpio")?;
//! while let Some(entry) = ar.next_entry()? {
//!     let mut buf = [0u8; 64];
//!     let n = ar.read(&mut buf)?;
//!     println!("{} {:?}", entry.name, &buf[..n]);
//! }
//! ar.close()?;
//! # Ok::<(), newcpio::CpioError>(())
//! ```

use std::fs::{File, OpenOptions};
use std::io::{BufReader, BufWriter, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use crate::entry::{CpioEntry, EntryName};
use crate::error::{CpioError, Result};
use crate::extract::{self, ExtractOptions, ExtractStats};
use crate::header::CpioHeader;
use crate::io_stream::{CpioReader, CpioWriter, WriteOptions};

// ── OpenMode ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Create or truncate; the `.` root record is written immediately.
    Create,
    /// Continue an existing file from its end.  The file must exist.
    Append,
    /// Forward-only iteration from offset 0.
    Read,
}

// ── ArchiveMode ───────────────────────────────────────────────────────────────

enum ArchiveMode {
    Read(CpioReader<BufReader<File>>),
    Write(CpioWriter<BufWriter<File>>),
    Closed,
}

// ── Archive ───────────────────────────────────────────────────────────────────

pub struct Archive {
    path: PathBuf,
    mode: ArchiveMode,
}

impl Archive {
    // ── Constructors ─────────────────────────────────────────────────────────

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with(path, OpenMode::Read)
    }

    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with(path, OpenMode::Create)
    }

    pub fn append<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with(path, OpenMode::Append)
    }

    pub fn open_with<P: AsRef<Path>>(path: P, mode: OpenMode) -> Result<Self> {
        Self::open_with_options(path, mode, WriteOptions::default())
    }

    pub fn open_with_options<P: AsRef<Path>>(
        path:    P,
        mode:    OpenMode,
        options: WriteOptions,
    ) -> Result<Self> {
        let path = path.as_ref().to_owned();
        if path.as_os_str().is_empty() {
            return Err(CpioError::InvalidArgument("archive path is empty".into()));
        }

        let mode = match mode {
            OpenMode::Read => {
                ArchiveMode::Read(CpioReader::new(BufReader::new(File::open(&path)?)))
            }
            OpenMode::Create => {
                let file = File::create(&path)?;
                ArchiveMode::Write(CpioWriter::with_options(BufWriter::new(file), options)?)
            }
            OpenMode::Append => {
                // No `create(true)`: a missing file is an I/O error.
                let mut file = OpenOptions::new().write(true).open(&path)?;
                let end = file.seek(SeekFrom::End(0))?;
                ArchiveMode::Write(CpioWriter::resume(BufWriter::new(file), end, options))
            }
        };

        tracing::debug!(path = %path.display(), mode = mode_label(&mode), "opened cpio archive");
        Ok(Self { path, mode })
    }

    // ── Write ─────────────────────────────────────────────────────────────────

    pub fn write_entry(&mut self, entry: &CpioEntry) -> Result<()> {
        match &mut self.mode {
            ArchiveMode::Write(w) => w.write_entry(entry),
            ArchiveMode::Read(_)  => Err(CpioError::ReadOnly),
            ArchiveMode::Closed   => Err(CpioError::Closed),
        }
    }

    pub fn write_data(&mut self, data: &[u8]) -> Result<()> {
        match &mut self.mode {
            ArchiveMode::Write(w) => w.write_data(data),
            ArchiveMode::Read(_)  => Err(CpioError::ReadOnly),
            ArchiveMode::Closed   => Err(CpioError::Closed),
        }
    }

    /// Convenience: one entry plus its whole payload.
    pub fn add_file(&mut self, name: impl Into<EntryName>, permissions: u32, data: &[u8]) -> Result<()> {
        self.write_entry(&CpioEntry::file(name, permissions, data.len() as u64))?;
        if !data.is_empty() {
            self.write_data(data)?;
        }
        Ok(())
    }

    pub fn add_directory(&mut self, name: impl Into<EntryName>, permissions: u32) -> Result<()> {
        self.write_entry(&CpioEntry::directory(name, permissions))
    }

    // ── Read ──────────────────────────────────────────────────────────────────

    pub fn next_entry(&mut self) -> Result<Option<CpioEntry>> {
        match &mut self.mode {
            ArchiveMode::Read(r)  => r.next_entry(),
            ArchiveMode::Write(_) => Err(CpioError::WriteOnly),
            ArchiveMode::Closed   => Err(CpioError::Closed),
        }
    }

    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        match &mut self.mode {
            ArchiveMode::Read(r)  => r.read(buf),
            ArchiveMode::Write(_) => Err(CpioError::WriteOnly),
            ArchiveMode::Closed   => Err(CpioError::Closed),
        }
    }

    /// Header of the entry last returned by [`next_entry`](Self::next_entry).
    pub fn header(&self) -> Option<&CpioHeader> {
        match &self.mode {
            ArchiveMode::Read(r) => r.header(),
            _                    => None,
        }
    }

    /// Extract every remaining entry into `dest`, creating it if necessary.
    pub fn extract_all<P: AsRef<Path>>(&mut self, dest: P) -> Result<ExtractStats> {
        self.extract_all_with_options(dest, &ExtractOptions::default())
    }

    pub fn extract_all_with_options<P: AsRef<Path>>(
        &mut self,
        dest:    P,
        options: &ExtractOptions,
    ) -> Result<ExtractStats> {
        match &mut self.mode {
            ArchiveMode::Read(r)  => extract::extract_entries(r, dest.as_ref(), options),
            ArchiveMode::Write(_) => Err(CpioError::WriteOnly),
            ArchiveMode::Closed   => Err(CpioError::Closed),
        }
    }

    // ── Close ─────────────────────────────────────────────────────────────────

    /// Finish the archive.  Writable archives get the trailer and final
    /// block padding.  Closing twice fails.
    ///
    /// A short payload on the last entry fails with
    /// [`CpioError::SizeMismatch`] and leaves the archive open, so the rest
    /// can be written and `close` retried.
    pub fn close(&mut self) -> Result<()> {
        if let ArchiveMode::Write(w) = &self.mode {
            w.check_complete()?;
        }
        match std::mem::replace(&mut self.mode, ArchiveMode::Closed) {
            ArchiveMode::Write(w) => {
                let file = w.finish()?;
                file.into_inner().map_err(|e| CpioError::Io(e.into_error()))?;
                tracing::debug!(path = %self.path.display(), "closed cpio archive");
                Ok(())
            }
            ArchiveMode::Read(_) => Ok(()),
            ArchiveMode::Closed  => Err(CpioError::Closed),
        }
    }

    // ── Metadata ─────────────────────────────────────────────────────────────

    pub fn path(&self) -> &Path { &self.path }

    pub fn is_writable(&self) -> bool {
        matches!(self.mode, ArchiveMode::Write(_))
    }

    pub fn is_closed(&self) -> bool {
        matches!(self.mode, ArchiveMode::Closed)
    }
}

impl Drop for Archive {
    fn drop(&mut self) {
        if self.is_writable() {
            tracing::warn!(
                path = %self.path.display(),
                "writable archive dropped without close(); no trailer was written"
            );
        }
    }
}

fn mode_label(mode: &ArchiveMode) -> &'static str {
    match mode {
        ArchiveMode::Read(_)  => "read",
        ArchiveMode::Write(_) => "write",
        ArchiveMode::Closed   => "closed",
    }
}
