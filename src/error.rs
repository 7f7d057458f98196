//! Crate-wide error type.
//!
//! Every fallible operation returns [`CpioError`].  Callers that only care
//! about the broad failure class use [`CpioError::kind`]; the variants carry
//! enough context for a useful message.

use std::io;
use thiserror::Error;

use crate::hex::HexError;

pub type Result<T> = std::result::Result<T, CpioError>;

/// Broad classification of a [`CpioError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad caller input: empty path, bad entry, wrong session direction,
    /// operation on a closed session.
    InvalidArgument,
    /// The archive bytes (or an entry about to be written) violate the
    /// newc format or one of its limits.
    Format,
    /// The underlying stream or filesystem failed.
    Io,
    /// The stream ended before a header, name or payload was complete.
    Truncated,
}

#[derive(Error, Debug)]
pub enum CpioError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid magic: expected \"070701\", found {found:?}")]
    BadMagic { found: String },

    #[error("Invalid `{field}` header field: {source}")]
    BadField {
        field:  &'static str,
        #[source]
        source: HexError,
    },

    #[error("Malformed entry name: {0}")]
    BadName(String),

    #[error("{what} of {value} exceeds the limit of {limit}")]
    LimitExceeded { what: &'static str, value: u64, limit: u64 },

    #[error("Refusing to extract unsafe path `{0}`")]
    UnsafePath(String),

    #[error("Entry `{name}` declares {declared} payload bytes but {written} were written")]
    SizeMismatch { name: String, declared: u64, written: u64 },

    #[error("Archive truncated while reading {0}")]
    Truncated(&'static str),

    #[error("Read position {position} is past the end of the current entry ({end})")]
    PastEntryEnd { position: u64, end: u64 },

    #[error("No entry is open for writing")]
    NoOpenEntry,

    #[error("No current entry; call next_entry() first")]
    NoCurrentEntry,

    #[error("Archive is read-only")]
    ReadOnly,

    #[error("Archive is write-only")]
    WriteOnly,

    #[error("Archive is already closed")]
    Closed,

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl CpioError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CpioError::InvalidArgument(_)
            | CpioError::NoOpenEntry
            | CpioError::NoCurrentEntry
            | CpioError::ReadOnly
            | CpioError::WriteOnly
            | CpioError::Closed => ErrorKind::InvalidArgument,

            CpioError::BadMagic { .. }
            | CpioError::BadField { .. }
            | CpioError::BadName(_)
            | CpioError::LimitExceeded { .. }
            | CpioError::UnsafePath(_)
            | CpioError::SizeMismatch { .. } => ErrorKind::Format,

            CpioError::Truncated(_) => ErrorKind::Truncated,

            CpioError::PastEntryEnd { .. } | CpioError::Io(_) => ErrorKind::Io,
        }
    }

    /// Map an `UnexpectedEof` from `read_exact` onto [`CpioError::Truncated`].
    pub(crate) fn from_read(err: io::Error, what: &'static str) -> Self {
        if err.kind() == io::ErrorKind::UnexpectedEof {
            CpioError::Truncated(what)
        } else {
            CpioError::Io(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eof_maps_to_truncated() {
        let err = CpioError::from_read(io::Error::from(io::ErrorKind::UnexpectedEof), "name");
        assert_eq!(err.kind(), ErrorKind::Truncated);
        assert_eq!(err.to_string(), "Archive truncated while reading name");
    }

    #[test]
    fn other_read_errors_stay_io() {
        let err = CpioError::from_read(io::Error::from(io::ErrorKind::PermissionDenied), "header");
        assert_eq!(err.kind(), ErrorKind::Io);
    }

    #[test]
    fn session_misuse_is_invalid_argument() {
        assert_eq!(CpioError::Closed.kind(), ErrorKind::InvalidArgument);
        assert_eq!(CpioError::ReadOnly.kind(), ErrorKind::InvalidArgument);
        assert_eq!(CpioError::NoOpenEntry.kind(), ErrorKind::InvalidArgument);
    }
}
