//! Streaming newc engine — reader and writer.
//!
//! # Reader
//! [`CpioReader`] walks an archive strictly forward.  Each
//! [`next_entry`](CpioReader::next_entry) call seeks to the recorded start
//! of the next header, decodes it and its name, and leaves the stream at the
//! first payload byte.  [`read`](CpioReader::read) is bounded by the end of
//! the current payload, so a caller can never read into the following
//! header.  The `TRAILER!!!` record ends iteration.
//!
//! # Writer
//! [`CpioWriter`] emits the `.` root record on creation, then one header +
//! name per [`write_entry`](CpioWriter::write_entry) followed by raw
//! payload via [`write_data`](CpioWriter::write_data).  The writer counts
//! the bytes it has emitted, so it only needs `Write`, not `Seek`.  Payload
//! padding is deferred until the next record or [`finish`](CpioWriter::finish).
//!
//! Declared payload sizes are enforced: writing more than an entry declares,
//! or starting the next entry before the payload is complete, fails with
//! [`CpioError::SizeMismatch`].

use std::io::{Read, Seek, SeekFrom, Write};

use crate::entry::{CpioEntry, EntryName};
use crate::error::{CpioError, Result};
use crate::header::{
    CpioHeader, DEFAULT_MTIME, DOT, DOT_NAME, HEADER_SIZE, MAX_NAME_SIZE, TRAILER, TRAILER_NAME,
};
use crate::padding::{self, BLOCK_SIZE, ENTRY_ALIGNMENT};

/// Payload copy chunk used by extraction.
pub const DEFAULT_CHUNK_SIZE: usize = 512;

// ── Reader ───────────────────────────────────────────────────────────────────

/// Cursor bookkeeping, updated only by [`CpioReader::next_entry`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamOffsets {
    /// Where the next header starts.
    pub next_header_offset: u64,
    /// One past the last payload byte of the current entry.
    pub payload_end_offset: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReadState {
    AtHeader,
    AtPayload,
    Terminated,
}

pub struct CpioReader<R: Read + Seek> {
    reader:  R,
    offsets: StreamOffsets,
    header:  Option<CpioHeader>,
    state:   ReadState,
}

impl<R: Read + Seek> CpioReader<R> {
    /// Wrap a stream whose archive starts at offset 0.
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            offsets: StreamOffsets::default(),
            header:  None,
            state:   ReadState::AtHeader,
        }
    }

    pub fn offsets(&self) -> StreamOffsets {
        self.offsets
    }

    /// The most recently decoded header, trailer included.
    pub fn header(&self) -> Option<&CpioHeader> {
        self.header.as_ref()
    }

    pub fn is_terminated(&self) -> bool {
        self.state == ReadState::Terminated
    }

    pub fn into_inner(self) -> R {
        self.reader
    }

    /// Decode the next record.
    ///
    /// Returns `Ok(None)` once the trailer is reached, and keeps returning it
    /// on further calls.
    pub fn next_entry(&mut self) -> Result<Option<CpioEntry>> {
        if self.state == ReadState::Terminated {
            return Ok(None);
        }

        let header_offset = self.offsets.next_header_offset;
        self.reader.seek(SeekFrom::Start(header_offset))?;
        let header = CpioHeader::read(&mut self.reader)?;
        let name_len = header.name_len()?;

        let mut raw_name = vec![0u8; name_len];
        self.reader
            .read_exact(&mut raw_name)
            .map_err(|e| CpioError::from_read(e, "entry name"))?;
        let name = decode_name(raw_name)?;

        let payload_start = padding::skip_padding(&mut self.reader)?;
        let payload_end   = payload_start + u64::from(header.filesize);
        self.offsets = StreamOffsets {
            next_header_offset: padding::round_up(payload_end, ENTRY_ALIGNMENT),
            payload_end_offset: payload_end,
        };
        self.header = Some(header);

        tracing::debug!(
            offset = format_args!("{:#x}", header_offset),
            payload = format_args!("{:#x}..{:#x}", payload_start, payload_end),
            mode = format_args!("{:#o}", header.mode),
            name = %name.to_string_lossy(),
            "decoded cpio header"
        );

        if name == TRAILER_NAME {
            self.state = ReadState::Terminated;
            return Ok(None);
        }

        self.state = ReadState::AtPayload;
        Ok(Some(CpioEntry {
            name,
            mode: header.mode,
            size: u64::from(header.filesize),
        }))
    }

    /// Read payload bytes of the current entry into `buf`.
    ///
    /// The request is clamped to what remains of the payload; `Ok(0)` means
    /// the payload is exhausted.  A stream that ends early is
    /// [`CpioError::Truncated`].
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        match self.state {
            ReadState::AtHeader   => return Err(CpioError::NoCurrentEntry),
            ReadState::Terminated => return Ok(0),
            ReadState::AtPayload  => {}
        }

        let position = self.reader.stream_position()?;
        let end      = self.offsets.payload_end_offset;
        if position > end {
            return Err(CpioError::PastEntryEnd { position, end });
        }

        let n = (end - position).min(buf.len() as u64) as usize;
        self.reader
            .read_exact(&mut buf[..n])
            .map_err(|e| CpioError::from_read(e, "entry payload"))?;
        Ok(n)
    }

    /// Copy the rest of the current payload into `out`, `chunk_size` bytes
    /// at a time.  Returns the number of bytes copied.
    pub fn copy_payload<W: Write>(&mut self, out: &mut W, chunk_size: usize) -> Result<u64> {
        let mut chunk = vec![0u8; chunk_size.max(1)];
        let mut total = 0u64;
        loop {
            let n = self.read(&mut chunk)?;
            if n == 0 {
                break;
            }
            out.write_all(&chunk[..n])?;
            total += n as u64;
        }
        Ok(total)
    }

    /// Remaining payload of the current entry as a buffer.
    pub fn read_to_vec(&mut self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        self.copy_payload(&mut out, DEFAULT_CHUNK_SIZE)?;
        Ok(out)
    }
}

/// Strip the terminator.  Any other byte sequence is a valid name.
fn decode_name(mut raw: Vec<u8>) -> Result<EntryName> {
    if raw.pop() != Some(0) {
        return Err(CpioError::BadName("name is not NUL-terminated".into()));
    }
    if raw.contains(&0) {
        return Err(CpioError::BadName("name contains an embedded NUL".into()));
    }
    Ok(EntryName::from(raw))
}

// ── Writer ───────────────────────────────────────────────────────────────────

/// Configuration for [`CpioWriter`].
#[derive(Debug, Clone)]
pub struct WriteOptions {
    /// Modification time stamped on every caller entry.
    pub mtime: u32,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self { mtime: DEFAULT_MTIME }
    }
}

#[derive(Debug)]
struct PendingPayload {
    name:     String,
    declared: u64,
    written:  u64,
}

pub struct CpioWriter<W: Write> {
    writer:   W,
    position: u64,
    pending:  Option<PendingPayload>,
    options:  WriteOptions,
}

impl<W: Write> CpioWriter<W> {
    /// Start a new archive: the `.` root record is written immediately.
    pub fn new(writer: W) -> Result<Self> {
        Self::with_options(writer, WriteOptions::default())
    }

    pub fn with_options(writer: W, options: WriteOptions) -> Result<Self> {
        let mut w = Self::resume(writer, 0, options);
        w.write_record(&DOT, DOT_NAME.as_bytes())?;
        Ok(w)
    }

    /// Continue writing to a stream that already holds `position` bytes.
    /// No root record is emitted.
    pub fn resume(writer: W, position: u64, options: WriteOptions) -> Self {
        Self { writer, position, pending: None, options }
    }

    /// Bytes written to the underlying stream so far (including any
    /// `position` handed to [`resume`](Self::resume)).
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Emit the header and name for `entry`.  Its payload must follow via
    /// [`write_data`](Self::write_data), exactly `entry.size` bytes in total.
    pub fn write_entry(&mut self, entry: &CpioEntry) -> Result<()> {
        self.close_pending()?;

        let namesize = validate_name(&entry.name)?;
        let filesize = u32::try_from(entry.size).map_err(|_| CpioError::LimitExceeded {
            what:  "filesize",
            value: entry.size,
            limit: u64::from(u32::MAX),
        })?;

        let header = CpioHeader::for_entry(entry.mode, filesize, namesize, self.options.mtime);
        self.write_record(&header, entry.name.as_bytes())?;

        if entry.size > 0 {
            self.pending = Some(PendingPayload {
                name:     entry.name.to_string(),
                declared: entry.size,
                written:  0,
            });
        }
        Ok(())
    }

    /// Append raw payload bytes for the current entry.  An empty slice is
    /// always accepted.
    pub fn write_data(&mut self, data: &[u8]) -> Result<()> {
        if data.is_empty() {
            return Ok(());
        }
        let pending = self.pending.as_mut().ok_or(CpioError::NoOpenEntry)?;
        let written = pending.written + data.len() as u64;
        if written > pending.declared {
            return Err(CpioError::SizeMismatch {
                name:     pending.name.clone(),
                declared: pending.declared,
                written,
            });
        }
        self.writer.write_all(data)?;
        self.position += data.len() as u64;
        pending.written = written;
        if written == pending.declared {
            self.pending = None;
        }
        Ok(())
    }

    /// Pad, write the trailer, pad to the 512-byte block and flush.
    /// Returns the underlying stream.
    pub fn finish(mut self) -> Result<W> {
        self.close_pending()?;
        self.write_record(&TRAILER, TRAILER_NAME.as_bytes())?;
        self.position = padding::write_padding(&mut self.writer, self.position, BLOCK_SIZE)?;
        self.writer.flush()?;
        tracing::debug!(length = self.position, "finished cpio archive");
        Ok(self.writer)
    }

    /// Fails with [`CpioError::SizeMismatch`] while the current entry still
    /// expects payload bytes.  The writer is left untouched, so the caller
    /// can supply the rest and try again.
    pub fn check_complete(&self) -> Result<()> {
        match &self.pending {
            Some(p) if p.written != p.declared => Err(CpioError::SizeMismatch {
                name:     p.name.clone(),
                declared: p.declared,
                written:  p.written,
            }),
            _ => Ok(()),
        }
    }

    fn close_pending(&mut self) -> Result<()> {
        self.check_complete()?;
        self.pending = None;
        Ok(())
    }

    /// Header + NUL-terminated name, aligned on both sides.
    fn write_record(&mut self, header: &CpioHeader, name: &[u8]) -> Result<()> {
        self.position = padding::write_padding(&mut self.writer, self.position, ENTRY_ALIGNMENT)?;
        let header_offset = self.position;

        header.write(&mut self.writer)?;
        self.writer.write_all(name)?;
        self.writer.write_all(&[0])?;
        self.position += (HEADER_SIZE + name.len() + 1) as u64;
        self.position = padding::write_padding(&mut self.writer, self.position, ENTRY_ALIGNMENT)?;

        tracing::debug!(
            offset = format_args!("{:#x}", header_offset),
            mode = format_args!("{:#o}", header.mode),
            size = header.filesize,
            name = %String::from_utf8_lossy(name),
            "wrote cpio header"
        );
        Ok(())
    }
}

/// Returns the on-disk `namesize` (terminator included).
fn validate_name(name: &EntryName) -> Result<u32> {
    if name.is_empty() {
        return Err(CpioError::InvalidArgument("entry name is empty".into()));
    }
    if *name == TRAILER_NAME {
        return Err(CpioError::BadName(format!("`{TRAILER_NAME}` is reserved")));
    }
    if name.as_bytes().contains(&0) {
        return Err(CpioError::BadName("name contains an embedded NUL".into()));
    }
    let namesize = name.len() + 1;
    if namesize >= MAX_NAME_SIZE {
        return Err(CpioError::LimitExceeded {
            what:  "namesize",
            value: namesize as u64,
            limit: MAX_NAME_SIZE as u64 - 1,
        });
    }
    Ok(namesize as u32)
}
