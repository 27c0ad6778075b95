//! Decode engine.

use super::{read_scalar, DecoderConfig};
use crate::error::{Error, Result};
use crate::table::{
    DataType, DecodeCallback, FieldDescriptor, FieldMut, FieldTable, Message, RepeatedMut, Scalar,
    Value,
};
use crate::wire::{Reader, WireType};
use tracing::{debug, trace};

/// A value handed to a [`DecodeCallback`]
#[derive(Debug)]
pub enum Decoded<'a> {
    /// Numeric or boolean value
    Scalar(Scalar),
    /// Raw payload of a string or bytes field, borrowed from the input
    Bytes(&'a [u8]),
    /// Embedded message, not yet decoded
    Message(NestedMessage<'a>),
}

impl<'a> Decoded<'a> {
    /// The scalar, if this is one
    pub fn as_scalar(&self) -> Option<Scalar> {
        match self {
            Decoded::Scalar(value) => Some(*value),
            _ => None,
        }
    }

    /// The payload bytes, if this is a string or bytes value
    pub fn as_bytes(&self) -> Option<&'a [u8]> {
        match self {
            Decoded::Bytes(bytes) => Some(*bytes),
            _ => None,
        }
    }

    /// The embedded message handle, if this is one
    pub fn into_message(self) -> Option<NestedMessage<'a>> {
        match self {
            Decoded::Message(nested) => Some(nested),
            _ => None,
        }
    }
}

/// An embedded message received by a callback.
///
/// The callback decides what host value to decode it into. Its reader is
/// bounded to the message's bytes and is independent of the outer reader.
#[derive(Debug)]
pub struct NestedMessage<'a> {
    reader: Reader<'a>,
    table: &'static FieldTable,
    depth: usize,
    max_depth: usize,
}

impl<'a> NestedMessage<'a> {
    /// Table describing the embedded message
    pub fn table(&self) -> &'static FieldTable {
        self.table
    }

    /// Encoded bytes of the embedded message
    pub fn as_bytes(&self) -> &'a [u8] {
        self.reader.remaining_bytes()
    }

    /// Nesting depth of the embedded message
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Decodes the embedded message into `message`, merging with its contents
    pub fn decode_into(mut self, message: &mut dyn Message) -> Result<()> {
        decode_message(
            &mut self.reader,
            self.table,
            message,
            self.depth,
            self.max_depth,
        )
    }

    /// Decodes the embedded message into a fresh host value
    pub fn decode<M: Message + Default>(self) -> Result<M> {
        let mut message = M::default();
        self.decode_into(&mut message)?;
        Ok(message)
    }
}

/// Decoder with a fixed configuration
#[derive(Debug, Clone, Default)]
pub struct Decoder {
    config: DecoderConfig,
}

impl Decoder {
    /// Creates a decoder with default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a decoder with custom configuration
    pub fn with_config(config: DecoderConfig) -> Self {
        Self { config }
    }

    /// The decoder's configuration
    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    /// Decodes `buf` into a fresh host value
    pub fn decode<M: Message + Default>(&self, table: &FieldTable, buf: &[u8]) -> Result<M> {
        let mut message = M::default();
        self.decode_into(table, buf, &mut message)?;
        Ok(message)
    }

    /// Decodes `buf` into an existing host value.
    ///
    /// Fields present in the input overwrite (scalars, strings), merge
    /// (embedded messages) or append (repeated fields); fields absent from
    /// the input are left untouched. On error the host value is partially
    /// updated and must be discarded.
    pub fn decode_into(&self, table: &FieldTable, buf: &[u8], message: &mut dyn Message) -> Result<()> {
        let mut reader = Reader::new(buf);
        decode_message(&mut reader, table, message, 1, self.config.max_depth)?;
        debug!("Decoded {} from {} bytes", table.name(), buf.len());
        Ok(())
    }

    /// Decodes one length-prefixed message from the front of `buf`.
    ///
    /// Returns the message and the number of bytes consumed, prefix included,
    /// so consecutive messages can be read from one buffer. An empty `buf`
    /// fails with [`Error::EndOfInput`]; a cut-off prefix or body fails with
    /// a truncation error.
    pub fn decode_delimited<M: Message + Default>(
        &self,
        table: &FieldTable,
        buf: &[u8],
    ) -> Result<(M, usize)> {
        if buf.is_empty() {
            return Err(Error::EndOfInput { offset: 0 });
        }
        let mut reader = Reader::new(buf);
        let mut body = reader.read_submessage()?;
        let mut message = M::default();
        decode_message(&mut body, table, &mut message, 1, self.config.max_depth)?;
        debug!(
            "Decoded delimited {} from {} bytes",
            table.name(),
            reader.position()
        );
        Ok((message, reader.position()))
    }
}

/// Decodes `buf` into a fresh host value with default configuration
pub fn decode<M: Message + Default>(table: &FieldTable, buf: &[u8]) -> Result<M> {
    Decoder::new().decode(table, buf)
}

/// Decodes `buf` into an existing host value with default configuration
pub fn decode_into(table: &FieldTable, buf: &[u8], message: &mut dyn Message) -> Result<()> {
    Decoder::new().decode_into(table, buf, message)
}

/// Decodes one length-prefixed message with default configuration
pub fn decode_delimited<M: Message + Default>(table: &FieldTable, buf: &[u8]) -> Result<(M, usize)> {
    Decoder::new().decode_delimited(table, buf)
}

/// Tag lookup that resumes after the previous match.
///
/// Fields usually arrive in table order, so the next tag is normally found
/// on the first comparison.
struct FieldLookup<'t> {
    fields: &'t [FieldDescriptor],
    next: usize,
}

impl<'t> FieldLookup<'t> {
    fn new(table: &'t FieldTable) -> Self {
        Self {
            fields: table.fields(),
            next: 0,
        }
    }

    fn find(&mut self, tag: u32) -> Option<&'t FieldDescriptor> {
        let len = self.fields.len();
        for step in 0..len {
            let index = (self.next + step) % len;
            let field = &self.fields[index];
            if field.tag == tag {
                self.next = index + 1;
                return Some(field);
            }
        }
        None
    }
}

fn decode_message(
    reader: &mut Reader<'_>,
    table: &FieldTable,
    message: &mut dyn Message,
    depth: usize,
    max_depth: usize,
) -> Result<()> {
    if depth > max_depth {
        return Err(Error::NestingTooDeep { max_depth });
    }

    let mut lookup = FieldLookup::new(table);

    while !reader.is_empty() {
        let (tag, wire_type) = reader.read_tag()?;

        let Some(field) = lookup.find(tag) else {
            trace!(
                "Skipping unknown field {} ({}) in {}",
                tag,
                wire_type.as_str(),
                table.name()
            );
            reader.skip_field(wire_type)?;
            continue;
        };

        decode_field(reader, field, wire_type, message, depth, max_depth)?;
    }

    Ok(())
}

fn decode_field(
    reader: &mut Reader<'_>,
    field: &FieldDescriptor,
    wire_type: WireType,
    message: &mut dyn Message,
    depth: usize,
    max_depth: usize,
) -> Result<()> {
    let packed = wire_type == WireType::LengthDelimited && field.accepts_packed();
    if !packed && wire_type != field.wire_type() {
        return Err(Error::WireTypeMismatch {
            tag: field.tag,
            expected: field.wire_type(),
            found: wire_type,
        });
    }

    if let Some(group) = field.oneof {
        message.select_oneof(group, field.tag);
    }

    let storage = message
        .field_mut(field)
        .ok_or_else(|| Error::storage_mismatch(field.tag, "host has no storage for this field"))?;

    match storage {
        FieldMut::Repeated(list) => {
            if packed {
                let mut run = reader.read_submessage()?;
                while !run.is_empty() {
                    check_count(field, list.len())?;
                    let value = read_scalar(&mut run, field.data_type, field.tag)?;
                    push_value(field, list, Value::Scalar(value))?;
                }
            } else {
                check_count(field, list.len())?;
                let value = read_value(reader, field)?;
                push_value(field, list, value)?;
            }
        }
        FieldMut::Callback(None) => {
            trace!("No decode callback for field {}, skipping", field.tag);
            reader.skip_field(wire_type)?;
        }
        FieldMut::Callback(Some(callback)) => {
            decode_callback(reader, field, packed, callback, depth, max_depth)?;
        }
        _ if packed => {
            return Err(Error::storage_mismatch(
                field.tag,
                "packed run needs repeated or callback storage",
            ));
        }
        FieldMut::Scalar(dst) => {
            let value = read_scalar(reader, field.data_type, field.tag)?;
            if !dst.set(value) {
                return Err(Error::storage_mismatch(
                    field.tag,
                    format!("{} value does not fit its scalar storage", field.data_type.as_str()),
                ));
            }
        }
        FieldMut::Bytes(dst) => {
            let data = read_payload(reader, field, field.capacity)?;
            dst.clear();
            dst.extend_from_slice(data);
        }
        FieldMut::String(dst) => {
            let data = read_payload(reader, field, field.capacity)?;
            let text =
                std::str::from_utf8(data).map_err(|_| Error::InvalidUtf8 { tag: field.tag })?;
            dst.clear();
            dst.push_str(text);
        }
        FieldMut::Message(sub) => {
            let table = submessage_table(field)?;
            let mut nested = reader.read_submessage()?;
            decode_message(&mut nested, table, sub, depth + 1, max_depth)?;
        }
        FieldMut::Messages(list) => {
            check_count(field, list.len())?;
            let table = submessage_table(field)?;
            let mut nested = reader.read_submessage()?;
            let item = list.push_default();
            decode_message(&mut nested, table, item, depth + 1, max_depth)?;
        }
    }

    Ok(())
}

fn decode_callback(
    reader: &mut Reader<'_>,
    field: &FieldDescriptor,
    packed: bool,
    callback: &mut dyn DecodeCallback,
    depth: usize,
    max_depth: usize,
) -> Result<()> {
    if packed {
        let mut run = reader.read_submessage()?;
        while !run.is_empty() {
            let value = read_scalar(&mut run, field.data_type, field.tag)?;
            callback.decode(field, Decoded::Scalar(value))?;
        }
        return Ok(());
    }

    let value = match field.data_type {
        DataType::Message => Decoded::Message(NestedMessage {
            table: submessage_table(field)?,
            reader: reader.read_submessage()?,
            depth: depth + 1,
            max_depth,
        }),
        DataType::String | DataType::Bytes => Decoded::Bytes(reader.read_length_delimited()?),
        data_type => Decoded::Scalar(read_scalar(reader, data_type, field.tag)?),
    };

    callback.decode(field, value)
}

/// Reads a string or bytes payload, enforcing a byte capacity
fn read_payload<'a>(
    reader: &mut Reader<'a>,
    field: &FieldDescriptor,
    capacity: Option<u32>,
) -> Result<&'a [u8]> {
    if !matches!(field.data_type, DataType::String | DataType::Bytes) {
        return Err(Error::storage_mismatch(
            field.tag,
            format!("{} field given byte storage", field.data_type.as_str()),
        ));
    }

    let data = reader.read_length_delimited()?;
    if let Some(capacity) = capacity {
        if data.len() > capacity as usize {
            return Err(Error::CapacityExceeded {
                tag: field.tag,
                capacity,
            });
        }
    }
    Ok(data)
}

/// Reads one element of a static repeated field
fn read_value<'a>(reader: &mut Reader<'a>, field: &FieldDescriptor) -> Result<Value<'a>> {
    match field.data_type {
        DataType::String => {
            let data = read_payload(reader, field, None)?;
            std::str::from_utf8(data).map_err(|_| Error::InvalidUtf8 { tag: field.tag })?;
            Ok(Value::Bytes(data))
        }
        DataType::Bytes => Ok(Value::Bytes(read_payload(reader, field, None)?)),
        DataType::Message => Err(Error::storage_mismatch(
            field.tag,
            "repeated messages need message list storage",
        )),
        data_type => Ok(Value::Scalar(read_scalar(reader, data_type, field.tag)?)),
    }
}

fn push_value(field: &FieldDescriptor, list: &mut dyn RepeatedMut, value: Value<'_>) -> Result<()> {
    if list.push_value(value) {
        Ok(())
    } else {
        Err(Error::storage_mismatch(
            field.tag,
            format!("{} value does not fit its repeated storage", field.data_type.as_str()),
        ))
    }
}

/// Fails if a repeated field already holds its capacity of elements
fn check_count(field: &FieldDescriptor, len: usize) -> Result<()> {
    match field.capacity {
        Some(capacity) if len >= capacity as usize => Err(Error::CapacityExceeded {
            tag: field.tag,
            capacity,
        }),
        _ => Ok(()),
    }
}

fn submessage_table(field: &FieldDescriptor) -> Result<&'static FieldTable> {
    field
        .submessage
        .ok_or_else(|| Error::storage_mismatch(field.tag, "message field has no submessage table"))
}
