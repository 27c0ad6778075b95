//! Base-128 varints and zig-zag mapping.

use crate::error::{Error, Result};

/// Varints are at most 10 bytes for a 64-bit value
pub const MAX_VARINT_LEN: usize = 10;

/// An encoded varint held inline, without allocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodedVarint {
    buf: [u8; MAX_VARINT_LEN],
    len: u8,
}

impl EncodedVarint {
    /// Returns the encoded bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.len as usize]
    }

    /// Number of encoded bytes
    pub fn len(&self) -> usize {
        self.len as usize
    }

    /// Always false: every value encodes to at least one byte
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl AsRef<[u8]> for EncodedVarint {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

/// Encode a value as a varint, least significant group first.
pub fn encode_varint(mut value: u64) -> EncodedVarint {
    let mut buf = [0u8; MAX_VARINT_LEN];
    let mut i = 0;
    loop {
        let byte = (value & 0x7F) as u8;
        value >>= 7;
        if value == 0 {
            buf[i] = byte;
            i += 1;
            break;
        }
        buf[i] = byte | 0x80;
        i += 1;
    }

    EncodedVarint { buf, len: i as u8 }
}

/// Decode a varint from the given bytes.
///
/// Returns the decoded value and the number of bytes consumed. Offsets in
/// errors are relative to the start of `data`.
pub fn decode_varint(data: &[u8]) -> Result<(u64, usize)> {
    let mut result: u64 = 0;

    for (i, &byte) in data.iter().enumerate() {
        if i == MAX_VARINT_LEN - 1 && byte > 0x01 {
            // The tenth byte may only carry the top bit of a u64
            return Err(Error::MalformedVarint { offset: 0 });
        }

        result |= u64::from(byte & 0x7F) << (7 * i);

        if byte & 0x80 == 0 {
            return Ok((result, i + 1));
        }
    }

    Err(Error::truncated_field(0, data.len() + 1, data.len()))
}

/// Number of bytes `value` occupies as a varint
pub fn encoded_len(value: u64) -> usize {
    let bits = 64 - (value | 1).leading_zeros() as usize;
    (bits + 6) / 7
}

/// Map a signed value onto an unsigned one, small magnitudes first
pub fn encode_zigzag(value: i64) -> u64 {
    ((value << 1) ^ (value >> 63)) as u64
}

/// Inverse of [`encode_zigzag`]
pub fn decode_zigzag(value: u64) -> i64 {
    ((value >> 1) as i64) ^ -((value & 1) as i64)
}
