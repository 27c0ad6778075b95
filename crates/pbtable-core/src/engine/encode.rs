//! Encode engine.

use super::write_scalar;
use crate::error::{Error, Result};
use crate::table::{DataType, FieldDescriptor, FieldRef, FieldTable, Message, RepeatedRef, Scalar};
use crate::wire::{WireType, Writer};
use bytes::{Bytes, BytesMut};
use tracing::{debug, trace};

/// Emission handle passed to an [`EncodeCallback`](crate::table::EncodeCallback).
///
/// Every `emit_*` call writes one complete field (tag and value) for the
/// field the callback is attached to.
pub struct FieldEmitter<'w, 'b> {
    writer: &'w mut Writer<'b>,
    field: &'w FieldDescriptor,
    emitted: usize,
}

impl<'w, 'b> FieldEmitter<'w, 'b> {
    fn new(writer: &'w mut Writer<'b>, field: &'w FieldDescriptor) -> Self {
        Self {
            writer,
            field,
            emitted: 0,
        }
    }

    /// The field being emitted
    pub fn field(&self) -> &FieldDescriptor {
        self.field
    }

    /// True during the size pass
    pub fn is_sizing(&self) -> bool {
        self.writer.is_sizing()
    }

    /// Number of `emit_*` calls so far
    pub fn emitted(&self) -> usize {
        self.emitted
    }

    /// Emits one numeric value
    pub fn emit_scalar(&mut self, value: Scalar) -> Result<()> {
        self.writer.write_tag(self.field.tag, self.field.wire_type())?;
        write_scalar(self.writer, self.field, value)?;
        self.emitted += 1;
        Ok(())
    }

    /// Emits numeric values as one packed run
    pub fn emit_packed(&mut self, values: &[Scalar]) -> Result<()> {
        if !self.field.accepts_packed() {
            return Err(Error::storage_mismatch(
                self.field.tag,
                "only repeated numeric fields can be packed",
            ));
        }
        write_packed(self.writer, self.field, values.iter().copied().map(Ok))?;
        self.emitted += 1;
        Ok(())
    }

    /// Emits one bytes value
    pub fn emit_bytes(&mut self, data: &[u8]) -> Result<()> {
        write_payload(self.writer, self.field, data)?;
        self.emitted += 1;
        Ok(())
    }

    /// Emits one string value
    pub fn emit_str(&mut self, text: &str) -> Result<()> {
        self.emit_bytes(text.as_bytes())
    }

    /// Emits one embedded message described by the field's submessage table
    pub fn emit_message(&mut self, message: &dyn Message) -> Result<()> {
        encode_submessage(self.writer, self.field, message)?;
        self.emitted += 1;
        Ok(())
    }
}

/// Computes the encoded size of a message without writing it
pub fn encoded_size(table: &FieldTable, message: &dyn Message) -> Result<usize> {
    let mut sizer = Writer::sizing();
    encode_message(&mut sizer, table, message)?;
    Ok(sizer.bytes_written())
}

/// Encodes a message into `buf`, returning the number of bytes written.
///
/// Fails with [`Error::BufferExhausted`] if `buf` is smaller than
/// [`encoded_size`] reports.
pub fn encode(table: &FieldTable, message: &dyn Message, buf: &mut [u8]) -> Result<usize> {
    let mut writer = Writer::new(buf);
    encode_message(&mut writer, table, message)?;
    debug!(
        "Encoded {} into {} bytes",
        table.name(),
        writer.bytes_written()
    );
    Ok(writer.bytes_written())
}

/// Encodes a message into a freshly allocated buffer of exactly its size
pub fn encode_to_bytes(table: &FieldTable, message: &dyn Message) -> Result<Bytes> {
    let size = encoded_size(table, message)?;
    let mut buf = BytesMut::zeroed(size);
    let written = encode(table, message, &mut buf[..])?;
    buf.truncate(written);
    Ok(buf.freeze())
}

/// Encodes a message preceded by its length as a varint.
///
/// Returns the total number of bytes written, prefix included.
pub fn encode_delimited(table: &FieldTable, message: &dyn Message, buf: &mut [u8]) -> Result<usize> {
    let size = encoded_size(table, message)?;
    let mut writer = Writer::new(buf);
    writer.write_varint(size as u64)?;

    let start = writer.bytes_written();
    encode_message(&mut writer, table, message)?;
    let actual = writer.bytes_written() - start;
    if actual != size {
        return Err(Error::SubmessageSizeChanged {
            tag: 0,
            expected: size,
            actual,
        });
    }

    debug!(
        "Encoded delimited {} into {} bytes",
        table.name(),
        writer.bytes_written()
    );
    Ok(writer.bytes_written())
}

fn encode_message(writer: &mut Writer<'_>, table: &FieldTable, message: &dyn Message) -> Result<()> {
    for field in table.fields() {
        if let Some(group) = field.oneof {
            match message.which_oneof(group) {
                Some(active) if active == field.tag => {}
                Some(_) => continue,
                None => {
                    // No active alternative, so every alternative must be empty
                    if !matches!(
                        message.field(field),
                        None | Some(FieldRef::Absent) | Some(FieldRef::Callback(None))
                    ) {
                        return Err(Error::storage_mismatch(
                            field.tag,
                            "oneof alternative holds a value but which_oneof reports none active",
                        ));
                    }
                    continue;
                }
            }
        }

        let storage = message
            .field(field)
            .ok_or_else(|| Error::storage_mismatch(field.tag, "host has no storage for this field"))?;

        encode_field(writer, field, storage)?;
    }

    Ok(())
}

fn encode_field(writer: &mut Writer<'_>, field: &FieldDescriptor, storage: FieldRef<'_>) -> Result<()> {
    match storage {
        FieldRef::Absent | FieldRef::Callback(None) => Ok(()),
        FieldRef::Scalar(value) => {
            writer.write_tag(field.tag, field.wire_type())?;
            write_scalar(writer, field, value)
        }
        FieldRef::Bytes(data) => write_payload(writer, field, data),
        FieldRef::Message(message) => encode_submessage(writer, field, message),
        FieldRef::Repeated(list) => {
            if field.packed {
                return encode_packed(writer, field, list);
            }
            for index in 0..list.len() {
                let element = list.element(index).ok_or_else(|| {
                    Error::storage_mismatch(field.tag, format!("missing element {}", index))
                })?;
                encode_field(writer, field, element)?;
            }
            Ok(())
        }
        FieldRef::Messages(list) => {
            for index in 0..list.len() {
                let message = list.get_message(index).ok_or_else(|| {
                    Error::storage_mismatch(field.tag, format!("missing message {}", index))
                })?;
                encode_submessage(writer, field, message)?;
            }
            Ok(())
        }
        FieldRef::Callback(Some(callback)) => {
            let mut emitter = FieldEmitter::new(writer, field);
            let count = callback.encode(field, &mut emitter)?;
            trace!(
                "Callback for field {} emitted {} values ({} calls)",
                field.tag,
                count,
                emitter.emitted()
            );
            Ok(())
        }
    }
}

/// Writes a tagged string or bytes value
fn write_payload(writer: &mut Writer<'_>, field: &FieldDescriptor, data: &[u8]) -> Result<()> {
    if !matches!(field.data_type, DataType::String | DataType::Bytes) {
        return Err(Error::storage_mismatch(
            field.tag,
            format!("{} field holds a byte payload", field.data_type.as_str()),
        ));
    }
    writer.write_tag(field.tag, WireType::LengthDelimited)?;
    writer.write_length_delimited(data)
}

/// Writes a tagged embedded message: size pass, then tag, length and bytes
fn encode_submessage(writer: &mut Writer<'_>, field: &FieldDescriptor, message: &dyn Message) -> Result<()> {
    let table = field
        .submessage
        .ok_or_else(|| Error::storage_mismatch(field.tag, "message field has no submessage table"))?;

    let size = encoded_size(table, message)?;
    writer.write_tag(field.tag, WireType::LengthDelimited)?;
    writer.write_varint(size as u64)?;

    if writer.is_sizing() {
        writer.advance_sized(size);
        return Ok(());
    }

    let start = writer.bytes_written();
    encode_message(writer, table, message)?;
    let actual = writer.bytes_written() - start;
    if actual != size {
        return Err(Error::SubmessageSizeChanged {
            tag: field.tag,
            expected: size,
            actual,
        });
    }

    Ok(())
}

fn encode_packed(writer: &mut Writer<'_>, field: &FieldDescriptor, list: &dyn RepeatedRef) -> Result<()> {
    let values = (0..list.len()).map(|index| match list.element(index) {
        Some(FieldRef::Scalar(value)) => Ok(value),
        _ => Err(Error::storage_mismatch(
            field.tag,
            format!("packed element {} is not a scalar", index),
        )),
    });
    write_packed(writer, field, values)
}

/// Writes a packed run; an empty run emits nothing
fn write_packed<I>(writer: &mut Writer<'_>, field: &FieldDescriptor, values: I) -> Result<()>
where
    I: Iterator<Item = Result<Scalar>> + Clone,
{
    let mut sizer = Writer::sizing();
    let mut count = 0usize;
    for value in values.clone() {
        write_scalar(&mut sizer, field, value?)?;
        count += 1;
    }
    if count == 0 {
        return Ok(());
    }

    writer.write_tag(field.tag, WireType::LengthDelimited)?;
    writer.write_varint(sizer.bytes_written() as u64)?;
    for value in values {
        write_scalar(writer, field, value?)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::FieldMut;

    static BLOB: FieldTable = FieldTable::new(
        "Blob",
        &[
            FieldDescriptor::new(1, DataType::Bytes, 0),
            FieldDescriptor::new(2, DataType::Fixed32, 1).repeated().packed(),
        ],
    );

    #[derive(Debug, Default)]
    struct Blob {
        data: Vec<u8>,
        words: Vec<u32>,
    }

    impl Message for Blob {
        fn field(&self, field: &FieldDescriptor) -> Option<FieldRef<'_>> {
            match field.tag {
                1 if self.data.is_empty() => Some(FieldRef::Absent),
                1 => Some(FieldRef::Bytes(&self.data)),
                2 => Some(FieldRef::Repeated(&self.words)),
                _ => None,
            }
        }

        fn field_mut(&mut self, field: &FieldDescriptor) -> Option<FieldMut<'_>> {
            match field.tag {
                1 => Some(FieldMut::Bytes(&mut self.data)),
                2 => Some(FieldMut::Repeated(&mut self.words)),
                _ => None,
            }
        }
    }

    #[test]
    fn test_empty_message_is_empty() {
        let blob = Blob::default();
        assert_eq!(encoded_size(&BLOB, &blob).unwrap(), 0);
        assert!(encode_to_bytes(&BLOB, &blob).unwrap().is_empty());
    }

    #[test]
    fn test_packed_run_layout() {
        let blob = Blob {
            data: vec![],
            words: vec![1, 2],
        };
        let bytes = encode_to_bytes(&BLOB, &blob).unwrap();
        assert_eq!(
            &bytes[..],
            &[0x12, 0x08, 0x01, 0x00, 0x00, 0x00, 0x02, 0x00, 0x00, 0x00]
        );
    }

    #[test]
    fn test_buffer_exhausted_is_usage_error() {
        let blob = Blob {
            data: vec![0xAA; 8],
            words: vec![],
        };
        let mut buf = [0u8; 4];
        let err = encode(&BLOB, &blob, &mut buf).unwrap_err();
        assert!(matches!(err, Error::BufferExhausted { .. }));
        assert!(err.is_usage_error());
    }

    #[test]
    fn test_encode_delimited_prefix() {
        let blob = Blob {
            data: vec![0x01],
            words: vec![],
        };
        let mut buf = [0u8; 8];
        let written = encode_delimited(&BLOB, &blob, &mut buf).unwrap();
        assert_eq!(&buf[..written], &[0x03, 0x0A, 0x01, 0x01]);
    }

    static PICK: FieldTable = FieldTable::new(
        "Pick",
        &[
            FieldDescriptor::new(1, DataType::UInt32, 0).oneof(0),
            FieldDescriptor::new(2, DataType::String, 0).oneof(0),
        ],
    );

    /// Oneof host relying on the default `which_oneof`
    #[derive(Debug, Default)]
    struct Pick {
        number: Option<u32>,
    }

    impl Message for Pick {
        fn field(&self, field: &FieldDescriptor) -> Option<FieldRef<'_>> {
            match field.tag {
                1 => Some(FieldRef::optional(self.number)),
                2 => Some(FieldRef::Absent),
                _ => None,
            }
        }

        fn field_mut(&mut self, field: &FieldDescriptor) -> Option<FieldMut<'_>> {
            match field.tag {
                1 => Some(FieldMut::Scalar(self.number.get_or_insert(0).into())),
                _ => None,
            }
        }
    }

    #[test]
    fn test_oneof_value_without_active_alternative() {
        let pick = Pick { number: Some(5) };
        assert!(matches!(
            encode_to_bytes(&PICK, &pick),
            Err(Error::StorageMismatch { tag: 1, .. })
        ));
        assert!(matches!(
            encoded_size(&PICK, &pick),
            Err(Error::StorageMismatch { tag: 1, .. })
        ));

        assert!(encode_to_bytes(&PICK, &Pick::default()).unwrap().is_empty());
    }

    #[test]
    fn test_size_matches_encode() {
        let blob = Blob {
            data: vec![7; 200],
            words: vec![u32::MAX; 3],
        };
        let size = encoded_size(&BLOB, &blob).unwrap();
        let mut buf = vec![0u8; size];
        assert_eq!(encode(&BLOB, &blob, &mut buf).unwrap(), size);
    }
}
