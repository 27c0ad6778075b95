//! Bounds-checked cursor over encoded input.

use super::varint::decode_varint;
use super::WireType;
use crate::error::{Error, Result};
use crate::MAX_FIELD_NUMBER;
use bytes::Buf;

/// Sequential reader over a borrowed buffer.
///
/// The buffer is never modified. A reader created by
/// [`read_submessage`](Reader::read_submessage) shares the parent's buffer
/// with a narrower end offset, so error offsets always refer to positions in
/// the original input.
#[derive(Debug, Clone)]
pub struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
    end: usize,
}

impl<'a> Reader<'a> {
    /// Creates a reader over the whole buffer
    pub fn new(buf: &'a [u8]) -> Self {
        Self {
            buf,
            pos: 0,
            end: buf.len(),
        }
    }

    /// Current absolute offset
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Bytes left before the end offset
    pub fn remaining(&self) -> usize {
        self.end - self.pos
    }

    /// True once the end offset has been reached
    pub fn is_empty(&self) -> bool {
        self.pos == self.end
    }

    /// Unread bytes up to the end offset
    pub fn remaining_bytes(&self) -> &'a [u8] {
        &self.buf[self.pos..self.end]
    }

    /// Takes exactly `n` bytes, or fails without advancing
    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.remaining() < n {
            return Err(Error::truncated_field(self.pos, n, self.remaining()));
        }
        let bytes = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(bytes)
    }

    /// Reads a field tag, returning the field number and wire type.
    pub fn read_tag(&mut self) -> Result<(u32, WireType)> {
        let start = self.pos;
        if self.is_empty() {
            return Err(Error::EndOfInput { offset: start });
        }

        let (tag, len) = decode_varint(self.remaining_bytes()).map_err(|e| match e {
            Error::TruncatedField { .. } => Error::TruncatedMessage { offset: start },
            other => other.shifted(start),
        })?;

        let number = tag >> 3;
        if number == 0 || number > u64::from(MAX_FIELD_NUMBER) {
            return Err(Error::InvalidFieldNumber {
                offset: start,
                number,
            });
        }

        let wire_type = WireType::try_from((tag & 0x07) as u8)
            .map_err(|value| Error::InvalidWireType {
                offset: start,
                value,
            })?;

        self.pos += len;
        Ok((number as u32, wire_type))
    }

    /// Reads a varint value
    pub fn read_varint(&mut self) -> Result<u64> {
        let start = self.pos;
        let (value, len) = decode_varint(self.remaining_bytes()).map_err(|e| e.shifted(start))?;
        self.pos += len;
        Ok(value)
    }

    /// Reads a little-endian 32-bit value
    pub fn read_fixed32(&mut self) -> Result<u32> {
        let mut bytes = self.take(4)?;
        Ok(bytes.get_u32_le())
    }

    /// Reads a little-endian 64-bit value
    pub fn read_fixed64(&mut self) -> Result<u64> {
        let mut bytes = self.take(8)?;
        Ok(bytes.get_u64_le())
    }

    /// Reads a length prefix and returns a zero-copy view of the payload.
    pub fn read_length_delimited(&mut self) -> Result<&'a [u8]> {
        let start = self.pos;
        let length = self.read_varint()?;
        let remaining = self.remaining();

        if length > remaining as u64 {
            self.pos = start;
            return Err(Error::LengthOverflow {
                offset: start,
                length,
                remaining,
            });
        }

        self.take(length as usize)
    }

    /// Reads a length prefix and returns a reader bounded to the payload.
    ///
    /// The parent reader advances past the payload.
    pub fn read_submessage(&mut self) -> Result<Reader<'a>> {
        let payload = self.read_length_delimited()?;
        let end = self.pos;
        Ok(Reader {
            buf: self.buf,
            pos: end - payload.len(),
            end,
        })
    }

    /// Advances past one value of the given wire type without interpreting it.
    pub fn skip_field(&mut self, wire_type: WireType) -> Result<()> {
        match wire_type {
            WireType::Varint => {
                self.read_varint()?;
            }
            WireType::Fixed64 => {
                self.take(8)?;
            }
            WireType::LengthDelimited => {
                self.read_length_delimited()?;
            }
            WireType::Fixed32 => {
                self.take(4)?;
            }
        }
        Ok(())
    }
}
