//! Low-level protobuf wire format primitives.
//!
//! ## Wire Format Overview
//!
//! Each protobuf field is encoded as:
//! - A varint "tag" containing the field number and wire type
//! - The field data (format depends on wire type)
//!
//! Wire types:
//! - 0: VARINT (int32, int64, uint32, uint64, sint32, sint64, bool, enum)
//! - 1: I64 (fixed64, sfixed64, double)
//! - 2: LEN (string, bytes, embedded messages, packed repeated fields)
//! - 5: I32 (fixed32, sfixed32, float)
//!
//! Groups (wire types 3 and 4) are not supported and are rejected when read.

mod reader;
pub mod varint;
mod writer;

pub use reader::Reader;
pub use varint::{
    decode_varint, decode_zigzag, encode_varint, encode_zigzag, encoded_len, EncodedVarint,
    MAX_VARINT_LEN,
};
pub use writer::Writer;

/// Protobuf wire types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum WireType {
    /// Variable-length integer
    Varint = 0,
    /// 64-bit little-endian fixed-width
    Fixed64 = 1,
    /// Length-delimited (strings, bytes, embedded messages, packed runs)
    LengthDelimited = 2,
    /// 32-bit little-endian fixed-width
    Fixed32 = 5,
}

impl WireType {
    /// Short lowercase name, as used in diagnostics
    pub fn as_str(&self) -> &'static str {
        match self {
            WireType::Varint => "varint",
            WireType::Fixed64 => "fixed64",
            WireType::LengthDelimited => "len",
            WireType::Fixed32 => "fixed32",
        }
    }
}

impl TryFrom<u8> for WireType {
    /// The rejected raw value
    type Error = u8;

    fn try_from(value: u8) -> std::result::Result<Self, u8> {
        match value {
            0 => Ok(WireType::Varint),
            1 => Ok(WireType::Fixed64),
            2 => Ok(WireType::LengthDelimited),
            5 => Ok(WireType::Fixed32),
            other => Err(other),
        }
    }
}

/// Combines a field number and wire type into a tag value
pub fn make_tag(field_number: u32, wire_type: WireType) -> u64 {
    (u64::from(field_number) << 3) | wire_type as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_type_conversion() {
        assert_eq!(WireType::try_from(0).unwrap(), WireType::Varint);
        assert_eq!(WireType::try_from(1).unwrap(), WireType::Fixed64);
        assert_eq!(WireType::try_from(2).unwrap(), WireType::LengthDelimited);
        assert_eq!(WireType::try_from(5).unwrap(), WireType::Fixed32);
        assert_eq!(WireType::try_from(3), Err(3));
        assert_eq!(WireType::try_from(6), Err(6));
    }

    #[test]
    fn test_make_tag() {
        assert_eq!(make_tag(1, WireType::LengthDelimited), 0x0A);
        assert_eq!(make_tag(1, WireType::Varint), 0x08);
        assert_eq!(make_tag(16, WireType::Varint), 0x80);
    }
}
