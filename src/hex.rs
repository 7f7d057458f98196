//! Fixed-width ASCII hex fields.
//!
//! Every numeric newc header field is exactly [`FIELD_LEN`] hexadecimal
//! digits, most significant digit first, with no sign and no terminator.
//! Encoding always produces uppercase digits.  Decoding also accepts
//! lowercase, which GNU cpio emits.

use thiserror::Error;

/// Width of one numeric header field.
pub const FIELD_LEN: usize = 8;

const DIGITS: &[u8; 16] = b"0123456789ABCDEF";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HexError {
    #[error("expected 8 hex digits, got {0} bytes")]
    WrongLength(usize),
    #[error("invalid hex digit {byte:#04x} at position {index}")]
    InvalidDigit { byte: u8, index: usize },
}

/// Decode an 8-digit big-endian hex field.
pub fn decode_uint(field: &[u8]) -> Result<u32, HexError> {
    if field.len() != FIELD_LEN {
        return Err(HexError::WrongLength(field.len()));
    }
    let mut value: u32 = 0;
    for (index, &byte) in field.iter().enumerate() {
        let digit = match byte {
            b'0'..=b'9' => byte - b'0',
            b'A'..=b'F' => byte - b'A' + 10,
            b'a'..=b'f' => byte - b'a' + 10,
            _ => return Err(HexError::InvalidDigit { byte, index }),
        };
        // Eight digits never exceed 32 bits.
        value = (value << 4) | u32::from(digit);
    }
    Ok(value)
}

/// Encode `value` as 8 zero-padded uppercase hex digits.
pub fn encode_uint(value: u32) -> [u8; FIELD_LEN] {
    let mut out = [b'0'; FIELD_LEN];
    for (i, slot) in out.iter_mut().enumerate() {
        let shift = (FIELD_LEN - 1 - i) * 4;
        *slot = DIGITS[((value >> shift) & 0xF) as usize];
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn encodes_uppercase_zero_padded() {
        assert_eq!(&encode_uint(0), b"00000000");
        assert_eq!(&encode_uint(0x41ED), b"000041ED");
        assert_eq!(&encode_uint(u32::MAX), b"FFFFFFFF");
    }

    #[test]
    fn decodes_both_cases() {
        assert_eq!(decode_uint(b"0000000B"), Ok(11));
        assert_eq!(decode_uint(b"0000000b"), Ok(11));
        assert_eq!(decode_uint(b"5BE31EB3"), Ok(0x5BE3_1EB3));
        assert_eq!(decode_uint(b"FFFFFFFF"), Ok(u32::MAX));
    }

    #[test]
    fn rejects_non_hex() {
        assert_eq!(
            decode_uint(b"0000-001"),
            Err(HexError::InvalidDigit { byte: b'-', index: 4 })
        );
        assert_eq!(
            decode_uint(b"0000000\0"),
            Err(HexError::InvalidDigit { byte: 0, index: 7 })
        );
        assert!(decode_uint(b" 0000001").is_err());
    }

    #[test]
    fn rejects_wrong_width() {
        assert_eq!(decode_uint(b"123"), Err(HexError::WrongLength(3)));
        assert_eq!(decode_uint(b"000000001"), Err(HexError::WrongLength(9)));
    }

    proptest! {
        #[test]
        fn decode_inverts_encode(x in any::<u32>()) {
            prop_assert_eq!(decode_uint(&encode_uint(x)), Ok(x));
        }

        #[test]
        fn encoding_is_always_hex(x in any::<u32>()) {
            let field = encode_uint(x);
            prop_assert!(field.iter().all(|b| b.is_ascii_digit() || (b'A'..=b'F').contains(b)));
        }
    }
}
