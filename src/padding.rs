//! Alignment bookkeeping.
//!
//! newc pads the name and the payload of every record independently to a
//! 4-byte boundary, and the archive as a whole to a 512-byte block after the
//! trailer.  Both paddings are zero bytes.

use std::io::{self, Seek, SeekFrom, Write};

/// Alignment of names and payloads.
pub const ENTRY_ALIGNMENT: u64 = 4;
/// Archive block size; the finished archive length is a multiple of this.
pub const BLOCK_SIZE: u64 = 512;

const ZEROS: [u8; BLOCK_SIZE as usize] = [0u8; BLOCK_SIZE as usize];

/// Smallest multiple of `modulus` that is `>= pos`.
pub fn round_up(pos: u64, modulus: u64) -> u64 {
    debug_assert!(modulus > 0);
    pos.div_ceil(modulus) * modulus
}

/// Number of zero bytes needed after `pos`.
pub fn padding_len(pos: u64, modulus: u64) -> u64 {
    round_up(pos, modulus) - pos
}

/// Write zero bytes until `position` is a multiple of `modulus`.
///
/// `position` is the caller's count of bytes already written to `writer`.
/// Returns the new position.
pub fn write_padding<W: Write>(writer: &mut W, position: u64, modulus: u64) -> io::Result<u64> {
    let mut remaining = padding_len(position, modulus);
    while remaining > 0 {
        let n = remaining.min(ZEROS.len() as u64);
        writer.write_all(&ZEROS[..n as usize])?;
        remaining -= n;
    }
    Ok(round_up(position, modulus))
}

/// Advance a readable stream to the next 4-byte boundary without looking
/// at the skipped bytes.  Already-aligned streams are left alone.
pub fn skip_padding<S: Seek>(stream: &mut S) -> io::Result<u64> {
    let pos = stream.stream_position()?;
    let aligned = round_up(pos, ENTRY_ALIGNMENT);
    if aligned != pos {
        stream.seek(SeekFrom::Start(aligned))?;
    }
    Ok(aligned)
}
