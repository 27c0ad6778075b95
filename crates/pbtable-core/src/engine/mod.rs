//! Table-driven encode and decode engines.
//!
//! ## Architecture
//!
//! Both engines walk a [`FieldTable`](crate::table::FieldTable) and talk to
//! the host structure only through the [`Message`](crate::table::Message)
//! trait:
//!
//! 1. The decoder reads `(tag, wire type)` pairs, looks up each descriptor,
//!    and stores values through [`FieldMut`](crate::table::FieldMut) views or
//!    hands them to callbacks. Unknown tags are skipped.
//! 2. The encoder visits descriptors in table order and emits whatever the
//!    [`FieldRef`](crate::table::FieldRef) views hold. Embedded messages are
//!    sized first, because their length prefix precedes their bytes.
//!
//! Decoding recursion is bounded by [`DecoderConfig::max_depth`].

mod decode;
mod encode;

use crate::error::{Error, Result};
use crate::table::{DataType, FieldDescriptor, Scalar};
use crate::wire::{decode_zigzag, encode_zigzag, Reader, Writer};

pub use decode::{decode, decode_delimited, decode_into, Decoded, Decoder, NestedMessage};
pub use encode::{encode, encode_delimited, encode_to_bytes, encoded_size, FieldEmitter};

/// Default limit on message nesting while decoding
pub const DEFAULT_MAX_DEPTH: usize = 32;

/// Configuration for the decoder
#[derive(Debug, Clone)]
pub struct DecoderConfig {
    /// Maximum message nesting, counting the outermost message as 1
    pub max_depth: usize,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl DecoderConfig {
    /// Creates a new decoder config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum message nesting depth
    pub fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }
}

/// Reads one scalar value of the field's type
fn read_scalar(reader: &mut Reader<'_>, data_type: DataType, tag: u32) -> Result<Scalar> {
    let value = match data_type {
        DataType::Int32 | DataType::Enum => Scalar::I32(reader.read_varint()? as i32),
        DataType::Int64 => Scalar::I64(reader.read_varint()? as i64),
        DataType::UInt32 => Scalar::U32(reader.read_varint()? as u32),
        DataType::UInt64 => Scalar::U64(reader.read_varint()?),
        DataType::SInt32 => Scalar::I32(decode_zigzag(reader.read_varint()?) as i32),
        DataType::SInt64 => Scalar::I64(decode_zigzag(reader.read_varint()?)),
        DataType::Bool => Scalar::Bool(reader.read_varint()? != 0),
        DataType::Fixed32 => Scalar::U32(reader.read_fixed32()?),
        DataType::SFixed32 => Scalar::I32(reader.read_fixed32()? as i32),
        DataType::Float => Scalar::F32(f32::from_bits(reader.read_fixed32()?)),
        DataType::Fixed64 => Scalar::U64(reader.read_fixed64()?),
        DataType::SFixed64 => Scalar::I64(reader.read_fixed64()? as i64),
        DataType::Double => Scalar::F64(f64::from_bits(reader.read_fixed64()?)),
        DataType::String | DataType::Bytes | DataType::Message => {
            return Err(Error::storage_mismatch(
                tag,
                format!("{} is not a scalar type", data_type.as_str()),
            ))
        }
    };
    Ok(value)
}

/// Writes one scalar value (without tag) in the field's encoding
fn write_scalar(writer: &mut Writer<'_>, field: &FieldDescriptor, value: Scalar) -> Result<()> {
    match (field.data_type, value) {
        // Negative int32 values are sign-extended to ten bytes
        (DataType::Int32 | DataType::Enum, Scalar::I32(v)) => writer.write_varint(i64::from(v) as u64),
        (DataType::Int64, Scalar::I64(v)) => writer.write_varint(v as u64),
        (DataType::UInt32, Scalar::U32(v)) => writer.write_varint(u64::from(v)),
        (DataType::UInt64, Scalar::U64(v)) => writer.write_varint(v),
        (DataType::SInt32, Scalar::I32(v)) => writer.write_varint(encode_zigzag(i64::from(v))),
        (DataType::SInt64, Scalar::I64(v)) => writer.write_varint(encode_zigzag(v)),
        (DataType::Bool, Scalar::Bool(v)) => writer.write_varint(u64::from(v)),
        (DataType::Fixed32, Scalar::U32(v)) => writer.write_fixed32(v),
        (DataType::SFixed32, Scalar::I32(v)) => writer.write_fixed32(v as u32),
        (DataType::Float, Scalar::F32(v)) => writer.write_fixed32(v.to_bits()),
        (DataType::Fixed64, Scalar::U64(v)) => writer.write_fixed64(v),
        (DataType::SFixed64, Scalar::I64(v)) => writer.write_fixed64(v as u64),
        (DataType::Double, Scalar::F64(v)) => writer.write_fixed64(v.to_bits()),
        (data_type, value) => Err(Error::storage_mismatch(
            field.tag,
            format!("{} field holds {:?}", data_type.as_str(), value),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(data_type: DataType, value: Scalar) -> (Vec<u8>, Scalar) {
        let field = FieldDescriptor::new(1, data_type, 0);
        let mut buf = [0u8; 16];
        let mut writer = Writer::new(&mut buf);
        write_scalar(&mut writer, &field, value).unwrap();
        let len = writer.bytes_written();
        let bytes = buf[..len].to_vec();
        let mut reader = Reader::new(&bytes);
        let decoded = read_scalar(&mut reader, data_type, 1).unwrap();
        assert!(reader.is_empty());
        (bytes, decoded)
    }

    #[test]
    fn test_config_builder() {
        let config = DecoderConfig::new().max_depth(4);
        assert_eq!(config.max_depth, 4);
        assert_eq!(DecoderConfig::default().max_depth, DEFAULT_MAX_DEPTH);
    }

    #[test]
    fn test_negative_int32_is_ten_bytes() {
        let (bytes, decoded) = roundtrip(DataType::Int32, Scalar::I32(-1));
        assert_eq!(bytes.len(), 10);
        assert_eq!(decoded, Scalar::I32(-1));
    }

    #[test]
    fn test_sint32_is_compact() {
        let (bytes, decoded) = roundtrip(DataType::SInt32, Scalar::I32(-1));
        assert_eq!(bytes, vec![0x01]);
        assert_eq!(decoded, Scalar::I32(-1));

        let (_, decoded) = roundtrip(DataType::SInt32, Scalar::I32(i32::MIN));
        assert_eq!(decoded, Scalar::I32(i32::MIN));
    }

    #[test]
    fn test_fixed_width_scalars() {
        let (bytes, decoded) = roundtrip(DataType::Float, Scalar::F32(1.0));
        assert_eq!(bytes, vec![0x00, 0x00, 0x80, 0x3F]);
        assert_eq!(decoded, Scalar::F32(1.0));

        let (bytes, decoded) = roundtrip(DataType::SFixed64, Scalar::I64(-2));
        assert_eq!(bytes.len(), 8);
        assert_eq!(decoded, Scalar::I64(-2));

        let (_, decoded) = roundtrip(DataType::Double, Scalar::F64(-0.25));
        assert_eq!(decoded, Scalar::F64(-0.25));
    }

    #[test]
    fn test_mismatched_scalar_rejected() {
        let field = FieldDescriptor::new(9, DataType::UInt32, 0);
        let mut writer = Writer::sizing();
        let err = write_scalar(&mut writer, &field, Scalar::I32(1)).unwrap_err();
        assert!(matches!(err, Error::StorageMismatch { tag: 9, .. }));
    }
}
