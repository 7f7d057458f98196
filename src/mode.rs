//! POSIX mode bits as carried in the newc `mode` field.

use serde::Serialize;

pub const S_IFMT:   u32 = 0o170000;
pub const S_IFSOCK: u32 = 0o140000;
pub const S_IFLNK:  u32 = 0o120000;
pub const S_IFREG:  u32 = 0o100000;
pub const S_IFBLK:  u32 = 0o060000;
pub const S_IFDIR:  u32 = 0o040000;
pub const S_IFCHR:  u32 = 0o020000;
pub const S_IFIFO:  u32 = 0o010000;

pub const S_ISUID: u32 = 0o4000;
pub const S_ISGID: u32 = 0o2000;
pub const S_ISVTX: u32 = 0o1000;

pub const S_IRWXU: u32 = 0o700;
pub const S_IRWXG: u32 = 0o070;
pub const S_IRWXO: u32 = 0o007;

/// Permission and special bits (everything outside `S_IFMT`).
pub const PERMISSION_MASK: u32 = S_ISUID | S_ISGID | S_ISVTX | S_IRWXU | S_IRWXG | S_IRWXO;

/// File type encoded in the upper bits of a mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Regular,
    Directory,
    Symlink,
    BlockDevice,
    CharDevice,
    Fifo,
    Socket,
    Unknown,
}

impl EntryKind {
    pub fn from_mode(mode: u32) -> Self {
        match mode & S_IFMT {
            S_IFREG  => EntryKind::Regular,
            S_IFDIR  => EntryKind::Directory,
            S_IFLNK  => EntryKind::Symlink,
            S_IFBLK  => EntryKind::BlockDevice,
            S_IFCHR  => EntryKind::CharDevice,
            S_IFIFO  => EntryKind::Fifo,
            S_IFSOCK => EntryKind::Socket,
            _        => EntryKind::Unknown,
        }
    }

    /// `ls -l` style type character.
    pub fn type_char(self) -> char {
        match self {
            EntryKind::Regular     => '-',
            EntryKind::Directory   => 'd',
            EntryKind::Symlink     => 'l',
            EntryKind::BlockDevice => 'b',
            EntryKind::CharDevice  => 'c',
            EntryKind::Fifo        => 'p',
            EntryKind::Socket      => 's',
            EntryKind::Unknown     => '?',
        }
    }
}

pub fn is_dir(mode: u32) -> bool {
    mode & S_IFMT == S_IFDIR
}

/// Render `mode` as `drwxr-xr-x`.
pub fn format_mode(mode: u32) -> String {
    let mut out = String::with_capacity(10);
    out.push(EntryKind::from_mode(mode).type_char());
    for shift in [6u32, 3, 0] {
        let bits = (mode >> shift) & 0o7;
        out.push(if bits & 0o4 != 0 { 'r' } else { '-' });
        out.push(if bits & 0o2 != 0 { 'w' } else { '-' });
        out.push(if bits & 0o1 != 0 { 'x' } else { '-' });
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_common_modes() {
        assert_eq!(EntryKind::from_mode(0o040755), EntryKind::Directory);
        assert_eq!(EntryKind::from_mode(0o100644), EntryKind::Regular);
        assert_eq!(EntryKind::from_mode(0o120777), EntryKind::Symlink);
        assert_eq!(EntryKind::from_mode(0o000644), EntryKind::Unknown);
        assert!(is_dir(0x41ED));
        assert!(!is_dir(0o100755));
    }

    #[test]
    fn formats_like_ls() {
        assert_eq!(format_mode(0o040755), "drwxr-xr-x");
        assert_eq!(format_mode(0o100640), "-rw-r-----");
        assert_eq!(format_mode(0o120777), "lrwxrwxrwx");
    }

    #[test]
    fn permission_mask_excludes_type() {
        assert_eq!(0o104755 & PERMISSION_MASK, 0o4755);
    }
}
