//! Schema-less inspection of encoded messages.
//!
//! Walks a buffer without a [`FieldTable`](crate::table::FieldTable) and
//! reports every field with its raw value. Length-delimited payloads that
//! parse completely as a message, within the field limit, are expanded into
//! nested fields; anything else is kept as raw bytes. The field limit cuts
//! the top level short instead.

use crate::engine::DEFAULT_MAX_DEPTH;
use crate::error::Result;
use crate::wire::{Reader, WireType};
use tracing::{debug, trace};

/// Default limit on fields collected per message
pub const DEFAULT_MAX_FIELDS: usize = 10_000;

/// Configuration for [`inspect`]
#[derive(Debug, Clone)]
pub struct InspectConfig {
    /// Maximum nesting to expand, counting the outermost message as 1
    pub max_depth: usize,
    /// Maximum number of fields collected per message
    pub max_fields: usize,
}

impl Default for InspectConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            max_fields: DEFAULT_MAX_FIELDS,
        }
    }
}

impl InspectConfig {
    /// Creates a new inspect config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum expansion depth
    pub fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    /// Sets the maximum number of fields per message
    pub fn max_fields(mut self, fields: usize) -> Self {
        self.max_fields = fields;
        self
    }
}

/// One field found on the wire
#[derive(Debug, Clone, PartialEq)]
pub struct WireField<'a> {
    /// Field number
    pub number: u32,
    /// Wire type from the tag
    pub wire_type: WireType,
    /// Offset of the tag in the inspected buffer
    pub offset: usize,
    /// Raw value
    pub value: WireValue<'a>,
}

impl WireField<'_> {
    /// Number of fields in this subtree, this one included
    pub fn count(&self) -> usize {
        match &self.value {
            WireValue::Message(children) => 1 + children.iter().map(WireField::count).sum::<usize>(),
            _ => 1,
        }
    }
}

/// Raw value of a [`WireField`]
#[derive(Debug, Clone, PartialEq)]
pub enum WireValue<'a> {
    /// Varint value, uninterpreted
    Varint(u64),
    /// 64-bit fixed-width value
    Fixed64(u64),
    /// 32-bit fixed-width value
    Fixed32(u32),
    /// Length-delimited payload that is not shown as a message
    Bytes(&'a [u8]),
    /// Length-delimited payload that parses as a message
    Message(Vec<WireField<'a>>),
}

impl<'a> WireValue<'a> {
    /// The payload as text, if it is non-empty printable UTF-8
    pub fn as_text(&self) -> Option<&'a str> {
        match self {
            WireValue::Bytes(bytes) if !bytes.is_empty() => std::str::from_utf8(bytes)
                .ok()
                .filter(|text| !text.chars().any(|c| c.is_control() && !c.is_whitespace())),
            _ => None,
        }
    }
}

/// Walks `buf` as a sequence of fields.
///
/// Malformed input at the top level fails with the same errors as
/// [`Reader`]; malformed nested payloads are reported as bytes.
pub fn inspect<'a>(buf: &'a [u8], config: &InspectConfig) -> Result<Vec<WireField<'a>>> {
    let mut reader = Reader::new(buf);
    let fields = walk(&mut reader, config, 1)?;
    debug!("Inspected {} bytes, {} top-level fields", buf.len(), fields.len());
    Ok(fields)
}

fn walk<'a>(reader: &mut Reader<'a>, config: &InspectConfig, depth: usize) -> Result<Vec<WireField<'a>>> {
    let mut fields = Vec::new();

    while !reader.is_empty() {
        if fields.len() >= config.max_fields {
            debug!(
                "Field limit {} reached at offset {}",
                config.max_fields,
                reader.position()
            );
            break;
        }

        let offset = reader.position();
        let (number, wire_type) = reader.read_tag()?;
        let value = match wire_type {
            WireType::Varint => WireValue::Varint(reader.read_varint()?),
            WireType::Fixed64 => WireValue::Fixed64(reader.read_fixed64()?),
            WireType::Fixed32 => WireValue::Fixed32(reader.read_fixed32()?),
            WireType::LengthDelimited => {
                let mut nested = reader.read_submessage()?;
                let payload = nested.remaining_bytes();
                if payload.is_empty() || depth >= config.max_depth {
                    WireValue::Bytes(payload)
                } else {
                    match walk(&mut nested, config, depth + 1) {
                        Ok(children) if nested.is_empty() => WireValue::Message(children),
                        Ok(_) => {
                            trace!("Field {} at offset {} kept as bytes: field limit", number, offset);
                            WireValue::Bytes(payload)
                        }
                        Err(e) => {
                            trace!("Field {} at offset {} kept as bytes: {}", number, offset, e);
                            WireValue::Bytes(payload)
                        }
                    }
                }
            }
        };

        fields.push(WireField {
            number,
            wire_type,
            offset,
            value,
        });
    }

    Ok(fields)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_string_field_stays_bytes() {
        let data = [0x0A, 0x03, b'a', b'b', b'c'];
        let fields = inspect(&data, &InspectConfig::default()).unwrap();
        assert_eq!(
            fields,
            vec![WireField {
                number: 1,
                wire_type: WireType::LengthDelimited,
                offset: 0,
                value: WireValue::Bytes(b"abc"),
            }]
        );
        assert_eq!(fields[0].value.as_text(), Some("abc"));
    }

    #[test]
    fn test_nested_message_expanded() {
        // Field 2 holding {1: 150}, then field 3 fixed32
        let data = [0x12, 0x03, 0x08, 0x96, 0x01, 0x1D, 0x01, 0x00, 0x00, 0x00];
        let fields = inspect(&data, &InspectConfig::default()).unwrap();
        assert_eq!(fields.len(), 2);
        assert_eq!(
            fields[0].value,
            WireValue::Message(vec![WireField {
                number: 1,
                wire_type: WireType::Varint,
                offset: 2,
                value: WireValue::Varint(150),
            }])
        );
        assert_eq!(fields[0].count(), 2);
        assert_eq!(fields[1].value, WireValue::Fixed32(1));
        assert_eq!(fields[1].offset, 5);
    }

    #[test]
    fn test_depth_limit_keeps_bytes() {
        let data = [0x12, 0x03, 0x08, 0x96, 0x01];
        let fields = inspect(&data, &InspectConfig::new().max_depth(1)).unwrap();
        assert_eq!(fields[0].value, WireValue::Bytes(&[0x08, 0x96, 0x01]));
    }

    #[test]
    fn test_field_limit() {
        let data = [0x08, 0x01, 0x08, 0x02, 0x08, 0x03];
        let fields = inspect(&data, &InspectConfig::new().max_fields(2)).unwrap();
        assert_eq!(fields.len(), 2);
    }

    #[test]
    fn test_field_limit_keeps_nested_bytes() {
        // Field 2 holding three varints, more than the limit allows
        let data = [0x12, 0x06, 0x08, 0x01, 0x08, 0x02, 0x08, 0x03];
        let fields = inspect(&data, &InspectConfig::new().max_fields(2)).unwrap();
        assert_eq!(
            fields,
            vec![WireField {
                number: 2,
                wire_type: WireType::LengthDelimited,
                offset: 0,
                value: WireValue::Bytes(&data[2..]),
            }]
        );

        let fields = inspect(&data, &InspectConfig::new().max_fields(3)).unwrap();
        assert_eq!(fields[0].count(), 4);
    }

    #[test]
    fn test_truncated_input() {
        let data = [0x0A, 0x05, b'h', b'e'];
        assert_eq!(
            inspect(&data, &InspectConfig::default()),
            Err(Error::LengthOverflow {
                offset: 1,
                length: 5,
                remaining: 2
            })
        );
    }

    #[test]
    fn test_binary_payload_is_not_text() {
        let value = WireValue::Bytes(&[0x00, 0x01]);
        assert_eq!(value.as_text(), None);
        assert_eq!(WireValue::Bytes(&[]).as_text(), None);
    }
}
