//! The 110-byte newc header.
//!
//! ```text
//! magic    [6]  "070701"
//! ino      [8]  mode  [8]  uid       [8]  gid       [8]  nlink [8]
//! mtime    [8]  filesize [8]
//! devmajor [8]  devminor [8]  rdevmajor [8]  rdevminor [8]
//! namesize [8]  check [8]
//! ```
//!
//! All numeric fields are fixed-width ASCII hex; see [`crate::hex`].  The
//! magic is the only format-detection mechanism and is checked before any
//! other field is decoded.

use std::io::{Read, Write};

use crate::error::{CpioError, Result};
use crate::hex::{decode_uint, encode_uint, FIELD_LEN};

pub const MAGIC: &[u8; 6] = b"070701";
pub const MAGIC_LEN: usize = 6;
pub const HEADER_SIZE: usize = MAGIC_LEN + 13 * FIELD_LEN;

/// `PATH_MAX`.  A `namesize` (terminator included) at or above this is
/// rejected on both the read and the write path.
pub const MAX_NAME_SIZE: usize = 4096;

/// Name of the root sentinel written first on create.
pub const DOT_NAME: &str = ".";
/// Name of the sentinel that terminates an archive.
pub const TRAILER_NAME: &str = "TRAILER!!!";

/// Modification time stamped on every entry written with default options.
pub const DEFAULT_MTIME: u32 = 0x5673_4BA4;
pub const DEFAULT_DEVMAJOR: u32 = 8;
pub const DEFAULT_DEVMINOR: u32 = 2;

const FIELD_NAMES: [&str; 13] = [
    "ino", "mode", "uid", "gid", "nlink", "mtime", "filesize",
    "devmajor", "devminor", "rdevmajor", "rdevminor", "namesize", "check",
];

/// Decoded newc header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CpioHeader {
    pub ino:       u32,
    pub mode:      u32,
    pub uid:       u32,
    pub gid:       u32,
    pub nlink:     u32,
    pub mtime:     u32,
    pub filesize:  u32,
    pub devmajor:  u32,
    pub devminor:  u32,
    pub rdevmajor: u32,
    pub rdevminor: u32,
    pub namesize:  u32,
    pub check:     u32,
}

/// Root directory sentinel, byte-identical to what the archive creator has
/// always emitted.
pub const DOT: CpioHeader = CpioHeader {
    ino:       0x00B6_6448,
    mode:      0o040755,
    uid:       0,
    gid:       0,
    nlink:     2,
    mtime:     0x5BE3_1EB3,
    filesize:  0,
    devmajor:  DEFAULT_DEVMAJOR,
    devminor:  DEFAULT_DEVMINOR,
    rdevmajor: 0,
    rdevminor: 0,
    namesize:  DOT_NAME.len() as u32 + 1,
    check:     0,
};

/// End-of-archive sentinel.
pub const TRAILER: CpioHeader = CpioHeader {
    ino:       0,
    mode:      0,
    uid:       0,
    gid:       0,
    nlink:     2,
    mtime:     0,
    filesize:  0,
    devmajor:  0,
    devminor:  0,
    rdevmajor: 0,
    rdevminor: 0,
    namesize:  TRAILER_NAME.len() as u32 + 1,
    check:     0,
};

/// True iff `bytes` starts with the newc magic.
pub fn is_valid_magic(bytes: &[u8]) -> bool {
    bytes.len() >= MAGIC_LEN && &bytes[..MAGIC_LEN] == MAGIC
}

impl CpioHeader {
    /// Header for a caller-supplied entry: inode 0, uid/gid 0, one link,
    /// device 8/2, no rdev, no checksum.
    pub fn for_entry(mode: u32, filesize: u32, namesize: u32, mtime: u32) -> Self {
        Self {
            ino:       0,
            mode,
            uid:       0,
            gid:       0,
            nlink:     1,
            mtime,
            filesize,
            devmajor:  DEFAULT_DEVMAJOR,
            devminor:  DEFAULT_DEVMINOR,
            rdevmajor: 0,
            rdevminor: 0,
            namesize,
            check:     0,
        }
    }

    fn fields(&self) -> [u32; 13] {
        [
            self.ino, self.mode, self.uid, self.gid, self.nlink,
            self.mtime, self.filesize,
            self.devmajor, self.devminor, self.rdevmajor, self.rdevminor,
            self.namesize, self.check,
        ]
    }

    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut out = [0u8; HEADER_SIZE];
        out[..MAGIC_LEN].copy_from_slice(MAGIC);
        for (i, value) in self.fields().iter().enumerate() {
            let start = MAGIC_LEN + i * FIELD_LEN;
            out[start..start + FIELD_LEN].copy_from_slice(&encode_uint(*value));
        }
        out
    }

    /// Validate the magic, then decode every numeric field.
    pub fn from_bytes(bytes: &[u8; HEADER_SIZE]) -> Result<Self> {
        if !is_valid_magic(bytes) {
            return Err(CpioError::BadMagic {
                found: String::from_utf8_lossy(&bytes[..MAGIC_LEN]).into_owned(),
            });
        }
        let mut values = [0u32; 13];
        for (i, slot) in values.iter_mut().enumerate() {
            let start = MAGIC_LEN + i * FIELD_LEN;
            *slot = decode_uint(&bytes[start..start + FIELD_LEN])
                .map_err(|source| CpioError::BadField { field: FIELD_NAMES[i], source })?;
        }
        let [ino, mode, uid, gid, nlink, mtime, filesize,
             devmajor, devminor, rdevmajor, rdevminor, namesize, check] = values;
        Ok(Self {
            ino, mode, uid, gid, nlink, mtime, filesize,
            devmajor, devminor, rdevmajor, rdevminor, namesize, check,
        })
    }

    pub fn read<R: Read>(mut reader: R) -> Result<Self> {
        let mut buf = [0u8; HEADER_SIZE];
        reader
            .read_exact(&mut buf)
            .map_err(|e| CpioError::from_read(e, "header"))?;
        Self::from_bytes(&buf)
    }

    pub fn write<W: Write>(&self, mut writer: W) -> Result<()> {
        writer.write_all(&self.to_bytes())?;
        Ok(())
    }

    /// `namesize` as a buffer length, rejecting values that leave no room
    /// for the terminator or reach `PATH_MAX`.
    pub fn name_len(&self) -> Result<usize> {
        let namesize = self.namesize as usize;
        if namesize == 0 {
            return Err(CpioError::BadName("namesize is zero".into()));
        }
        if namesize >= MAX_NAME_SIZE {
            return Err(CpioError::LimitExceeded {
                what:  "namesize",
                value: namesize as u64,
                limit: MAX_NAME_SIZE as u64 - 1,
            });
        }
        Ok(namesize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    const DOT_BYTES: &[u8; HEADER_SIZE] = b"070701\
00B66448000041ED0000000000000000000000025BE31EB3000000000000000800000002\
00000000000000000000000200000000";

    #[test]
    fn header_is_110_bytes() {
        assert_eq!(HEADER_SIZE, 110);
    }

    #[test]
    fn dot_sentinel_is_bit_exact() {
        assert_eq!(&DOT.to_bytes(), DOT_BYTES);
        assert_eq!(CpioHeader::from_bytes(DOT_BYTES).unwrap(), DOT);
    }

    #[test]
    fn trailer_sentinel_fields() {
        let bytes = TRAILER.to_bytes();
        assert!(is_valid_magic(&bytes));
        assert_eq!(&bytes[94..102], b"0000000B");
        assert_eq!(&bytes[54..62], b"00000000");
    }

    #[test]
    fn entry_header_roundtrip() {
        let h = CpioHeader::for_entry(0o100644, 5, 10, DEFAULT_MTIME);
        let bytes = h.to_bytes();
        assert_eq!(&bytes[14..22], b"000081A4");
        assert_eq!(&bytes[38..46], b"00000001");
        assert_eq!(&bytes[46..54], b"56734BA4");
        assert_eq!(CpioHeader::from_bytes(&bytes).unwrap(), h);
    }

    #[test]
    fn every_magic_byte_is_checked() {
        for i in 0..MAGIC_LEN {
            let mut bytes = DOT.to_bytes();
            bytes[i] ^= 0x01;
            let err = CpioHeader::from_bytes(&bytes).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Format, "byte {i}");
            assert!(matches!(err, CpioError::BadMagic { .. }));
        }
    }

    #[test]
    fn bad_digit_names_the_field() {
        let mut bytes = DOT.to_bytes();
        bytes[54] = b'G'; // filesize
        match CpioHeader::from_bytes(&bytes) {
            Err(CpioError::BadField { field, .. }) => assert_eq!(field, "filesize"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn short_header_is_truncated() {
        let bytes = DOT.to_bytes();
        let err = CpioHeader::read(&bytes[..60]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Truncated);
    }

    #[test]
    fn name_len_limits() {
        let mut h = DOT;
        assert_eq!(h.name_len().unwrap(), 2);
        h.namesize = 0;
        assert_eq!(h.name_len().unwrap_err().kind(), ErrorKind::Format);
        h.namesize = MAX_NAME_SIZE as u32;
        assert!(matches!(h.name_len(), Err(CpioError::LimitExceeded { .. })));
        h.namesize = MAX_NAME_SIZE as u32 - 1;
        assert_eq!(h.name_len().unwrap(), MAX_NAME_SIZE - 1);
    }
}
