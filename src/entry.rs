use std::borrow::Cow;
use std::fmt;
use std::path::Path;

use serde::{Serialize, Serializer};

use crate::mode::{self, EntryKind};

// ── EntryName ────────────────────────────────────────────────────────────────

/// Archive path of an entry, kept as the raw bytes found on disk.
///
/// newc names are arbitrary NUL-terminated byte strings; archives written on
/// Latin-1 systems carry names that are not UTF-8.  `Display` and the serde
/// representation are lossy, the bytes themselves are preserved.
#[derive(Clone, PartialEq, Eq, Hash, Default)]
pub struct EntryName(Vec<u8>);

impl EntryName {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The name as `str`, when it is UTF-8.
    pub fn to_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.0).ok()
    }

    pub fn to_string_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.0)
    }

    /// The name as a filesystem path.  Exact on unix; other platforms get
    /// the lossy UTF-8 form.
    #[cfg(unix)]
    pub fn to_path(&self) -> Cow<'_, Path> {
        use std::os::unix::ffi::OsStrExt;
        Cow::Borrowed(Path::new(std::ffi::OsStr::from_bytes(&self.0)))
    }

    #[cfg(not(unix))]
    pub fn to_path(&self) -> Cow<'_, Path> {
        Cow::Owned(self.to_string_lossy().into_owned().into())
    }
}

impl fmt::Display for EntryName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_string_lossy())
    }
}

impl fmt::Debug for EntryName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{}\"", self.0.escape_ascii())
    }
}

impl Serialize for EntryName {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string_lossy())
    }
}

impl From<&str> for EntryName {
    fn from(s: &str) -> Self { Self(s.as_bytes().to_vec()) }
}

impl From<String> for EntryName {
    fn from(s: String) -> Self { Self(s.into_bytes()) }
}

impl From<&[u8]> for EntryName {
    fn from(b: &[u8]) -> Self { Self(b.to_vec()) }
}

impl From<Vec<u8>> for EntryName {
    fn from(b: Vec<u8>) -> Self { Self(b) }
}

impl PartialEq<str> for EntryName {
    fn eq(&self, other: &str) -> bool { self.0 == other.as_bytes() }
}

impl PartialEq<&str> for EntryName {
    fn eq(&self, other: &&str) -> bool { self.0 == other.as_bytes() }
}

impl PartialEq<String> for EntryName {
    fn eq(&self, other: &String) -> bool { self.0 == other.as_bytes() }
}

// ── CpioEntry ────────────────────────────────────────────────────────────────

/// One archive record as seen by callers.
///
/// `name` is stored without the on-disk NUL terminator.  Readers hand out
/// a fresh value per [`next_entry`](crate::io_stream::CpioReader::next_entry)
/// call; the payload is only readable until the reader advances.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CpioEntry {
    pub name: EntryName,
    pub mode: u32,
    pub size: u64,
}

impl CpioEntry {
    pub fn new(name: impl Into<EntryName>, mode: u32, size: u64) -> Self {
        Self { name: name.into(), mode, size }
    }

    /// Directory entry with no payload.
    pub fn directory(name: impl Into<EntryName>, permissions: u32) -> Self {
        Self::new(name, mode::S_IFDIR | (permissions & mode::PERMISSION_MASK), 0)
    }

    /// Regular file entry.
    pub fn file(name: impl Into<EntryName>, permissions: u32, size: u64) -> Self {
        Self::new(name, mode::S_IFREG | (permissions & mode::PERMISSION_MASK), size)
    }

    pub fn kind(&self) -> EntryKind {
        EntryKind::from_mode(self.mode)
    }

    pub fn is_dir(&self) -> bool {
        mode::is_dir(self.mode)
    }

    pub fn permissions(&self) -> u32 {
        self.mode & mode::PERMISSION_MASK
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructors_set_type_bits() {
        let d = CpioEntry::directory("dir", 0o755);
        assert_eq!(d.mode, 0o040755);
        assert!(d.is_dir());
        assert_eq!(d.size, 0);

        let f = CpioEntry::file("dir/a.txt", 0o100644, 5);
        assert_eq!(f.mode, 0o100644);
        assert_eq!(f.kind(), EntryKind::Regular);
        assert_eq!(f.permissions(), 0o644);
    }

    #[test]
    fn non_utf8_names_keep_their_bytes() {
        let name = EntryName::from(&b"caf\xE9"[..]);
        assert_eq!(name.as_bytes(), b"caf\xE9");
        assert_eq!(name.to_str(), None);
        assert_eq!(name.to_string(), "caf\u{FFFD}");
        assert_eq!(format!("{:?}", name), "\"caf\\xe9\"");
        assert_eq!(serde_json::to_string(&name).unwrap(), "\"caf\u{FFFD}\"");
    }

    #[test]
    fn compares_with_strings() {
        let name = EntryName::from("etc/hostname");
        assert_eq!(name, "etc/hostname");
        assert_eq!(name, String::from("etc/hostname"));
        assert_eq!(name.to_str(), Some("etc/hostname"));
        assert_eq!(name.len(), 12);
    }

    #[cfg(unix)]
    #[test]
    fn path_is_byte_exact_on_unix() {
        use std::os::unix::ffi::OsStrExt;
        let name = EntryName::from(&b"dir/caf\xE9"[..]);
        assert_eq!(name.to_path().as_os_str().as_bytes(), b"dir/caf\xE9");
    }
}
