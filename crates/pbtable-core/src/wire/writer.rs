//! Output cursor with a size-only mode.

use super::varint::encode_varint;
use super::{make_tag, WireType};
use crate::error::{Error, Result};
use bytes::BufMut;

#[derive(Debug)]
enum Sink<'a> {
    /// Count bytes, write nothing
    Sizing,
    /// Write into the unused tail of a caller buffer
    Slice(&'a mut [u8]),
}

/// Sequential writer over a caller-provided buffer, or a byte counter.
///
/// Both modes run the same emission code, so the count reported by a size
/// pass is exactly what a write pass over the same message produces.
#[derive(Debug)]
pub struct Writer<'a> {
    sink: Sink<'a>,
    written: usize,
}

impl Writer<'static> {
    /// Creates a writer that only counts bytes
    pub fn sizing() -> Self {
        Self {
            sink: Sink::Sizing,
            written: 0,
        }
    }
}

impl<'a> Writer<'a> {
    /// Creates a writer that fills `buf` from the start
    pub fn new(buf: &'a mut [u8]) -> Self {
        Self {
            sink: Sink::Slice(buf),
            written: 0,
        }
    }

    /// True for a size pass
    pub fn is_sizing(&self) -> bool {
        matches!(self.sink, Sink::Sizing)
    }

    /// Bytes written (or counted) so far
    pub fn bytes_written(&self) -> usize {
        self.written
    }

    /// Bytes still available, `None` for a size pass
    pub fn remaining(&self) -> Option<usize> {
        match &self.sink {
            Sink::Sizing => None,
            Sink::Slice(buf) => Some(buf.len()),
        }
    }

    /// Writes raw bytes with no framing
    pub fn write_bytes(&mut self, data: &[u8]) -> Result<()> {
        if let Sink::Slice(buf) = &mut self.sink {
            if buf.remaining_mut() < data.len() {
                return Err(Error::BufferExhausted {
                    needed: data.len(),
                    remaining: buf.remaining_mut(),
                });
            }
            buf.put_slice(data);
        }
        self.written += data.len();
        Ok(())
    }

    /// Accounts for `len` bytes in a size pass without producing them.
    ///
    /// Only valid while sizing; a write pass must emit real bytes.
    pub(crate) fn advance_sized(&mut self, len: usize) {
        debug_assert!(self.is_sizing());
        self.written += len;
    }

    /// Writes a field tag
    pub fn write_tag(&mut self, field_number: u32, wire_type: WireType) -> Result<()> {
        self.write_varint(make_tag(field_number, wire_type))
    }

    /// Writes a varint value
    pub fn write_varint(&mut self, value: u64) -> Result<()> {
        self.write_bytes(encode_varint(value).as_bytes())
    }

    /// Writes a little-endian 32-bit value
    pub fn write_fixed32(&mut self, value: u32) -> Result<()> {
        self.write_bytes(&value.to_le_bytes())
    }

    /// Writes a little-endian 64-bit value
    pub fn write_fixed64(&mut self, value: u64) -> Result<()> {
        self.write_bytes(&value.to_le_bytes())
    }

    /// Writes a length prefix followed by the payload
    pub fn write_length_delimited(&mut self, data: &[u8]) -> Result<()> {
        self.write_varint(data.len() as u64)?;
        self.write_bytes(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_primitives() {
        let mut buf = [0u8; 16];
        let mut writer = Writer::new(&mut buf);
        writer.write_tag(1, WireType::LengthDelimited).unwrap();
        writer.write_length_delimited(b"abc").unwrap();
        writer.write_fixed32(0x0403_0201).unwrap();
        let written = writer.bytes_written();
        assert_eq!(writer.remaining(), Some(7));
        assert_eq!(
            &buf[..written],
            &[0x0A, 0x03, b'a', b'b', b'c', 0x01, 0x02, 0x03, 0x04]
        );
    }

    #[test]
    fn test_sizing_matches_writing() {
        let mut sizer = Writer::sizing();
        sizer.write_tag(2, WireType::Varint).unwrap();
        sizer.write_varint(300).unwrap();
        sizer.write_fixed64(7).unwrap();
        assert!(sizer.is_sizing());
        assert_eq!(sizer.remaining(), None);

        let mut buf = vec![0u8; sizer.bytes_written()];
        let mut writer = Writer::new(&mut buf);
        writer.write_tag(2, WireType::Varint).unwrap();
        writer.write_varint(300).unwrap();
        writer.write_fixed64(7).unwrap();
        assert_eq!(writer.bytes_written(), sizer.bytes_written());
        assert_eq!(writer.remaining(), Some(0));
    }

    #[test]
    fn test_buffer_exhausted() {
        let mut buf = [0u8; 2];
        let mut writer = Writer::new(&mut buf);
        writer.write_varint(1).unwrap();
        assert_eq!(
            writer.write_fixed32(5),
            Err(Error::BufferExhausted {
                needed: 4,
                remaining: 1
            })
        );
        assert_eq!(writer.bytes_written(), 1);
    }
}
