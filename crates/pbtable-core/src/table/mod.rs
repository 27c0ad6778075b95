//! Static field descriptor tables.
//!
//! A [`FieldTable`] describes one message type as an ordered slice of
//! [`FieldDescriptor`]s. Tables are built with `const fn` constructors and
//! normally live in `static` items, so they are shared read-only by every
//! encode and decode call:
//!
//! ```
//! use pbtable_core::table::{DataType, FieldDescriptor, FieldTable};
//!
//! static TIMESTAMP: FieldTable = FieldTable::new(
//!     "Timestamp",
//!     &[
//!         FieldDescriptor::new(1, DataType::Int64, 0),
//!         FieldDescriptor::new(2, DataType::Int32, 1),
//!     ],
//! );
//!
//! static EVENT: FieldTable = FieldTable::new(
//!     "Event",
//!     &[
//!         FieldDescriptor::new(1, DataType::String, 0).capacity(64),
//!         FieldDescriptor::message(2, 1, &TIMESTAMP),
//!         FieldDescriptor::new(3, DataType::SInt32, 2).repeated().packed(),
//!     ],
//! );
//!
//! assert!(EVENT.validate_tree().is_ok());
//! ```
//!
//! Host structures connect to a table through the [`Message`] trait, which
//! maps each descriptor to a typed view of its storage.

mod access;
pub mod callback;

use crate::error::{Error, Result};
use crate::wire::WireType;
use crate::MAX_FIELD_NUMBER;
use std::collections::HashSet;
use std::fmt;

pub use access::{
    FieldMut, FieldRef, Message, MessageList, MessageListMut, RepeatedMut, RepeatedRef, Scalar,
    ScalarMut, Storable, Value,
};
pub use callback::{
    decode_fn, encode_fn, BytesList, Callback, DecodeCallback, DecodeFn, EncodeCallback, EncodeFn,
    ScalarList, StringList,
};

/// Semantic type of a field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    /// Varint, sign-extended to 64 bits when negative
    Int32,
    /// Varint
    Int64,
    /// Varint
    UInt32,
    /// Varint
    UInt64,
    /// Zig-zag varint
    SInt32,
    /// Zig-zag varint
    SInt64,
    /// Varint 0 or 1
    Bool,
    /// Varint, stored as `i32`
    Enum,
    /// Little-endian 4 bytes, unsigned
    Fixed32,
    /// Little-endian 8 bytes, unsigned
    Fixed64,
    /// Little-endian 4 bytes, signed
    SFixed32,
    /// Little-endian 8 bytes, signed
    SFixed64,
    /// IEEE 754 single precision
    Float,
    /// IEEE 754 double precision
    Double,
    /// UTF-8 text
    String,
    /// Opaque bytes
    Bytes,
    /// Embedded message described by another table
    Message,
}

impl DataType {
    /// Wire type used for a single (unpacked) value of this type
    pub const fn wire_type(self) -> WireType {
        match self {
            DataType::Int32
            | DataType::Int64
            | DataType::UInt32
            | DataType::UInt64
            | DataType::SInt32
            | DataType::SInt64
            | DataType::Bool
            | DataType::Enum => WireType::Varint,
            DataType::Fixed32 | DataType::SFixed32 | DataType::Float => WireType::Fixed32,
            DataType::Fixed64 | DataType::SFixed64 | DataType::Double => WireType::Fixed64,
            DataType::String | DataType::Bytes | DataType::Message => WireType::LengthDelimited,
        }
    }

    /// True for numeric types, which may be packed when repeated
    pub const fn is_packable(self) -> bool {
        !matches!(self, DataType::String | DataType::Bytes | DataType::Message)
    }

    /// Protobuf schema name of the type
    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::Int32 => "int32",
            DataType::Int64 => "int64",
            DataType::UInt32 => "uint32",
            DataType::UInt64 => "uint64",
            DataType::SInt32 => "sint32",
            DataType::SInt64 => "sint64",
            DataType::Bool => "bool",
            DataType::Enum => "enum",
            DataType::Fixed32 => "fixed32",
            DataType::Fixed64 => "fixed64",
            DataType::SFixed32 => "sfixed32",
            DataType::SFixed64 => "sfixed64",
            DataType::Float => "float",
            DataType::Double => "double",
            DataType::String => "string",
            DataType::Bytes => "bytes",
            DataType::Message => "message",
        }
    }
}

/// How many values a field holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cardinality {
    /// Exactly one; presence is not checked by the engine
    Required,
    /// Zero or one
    Optional,
    /// Zero or more, in wire order
    Repeated,
}

/// Where a field's data lives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Storage {
    /// Inline in the host structure
    Static,
    /// Streamed through caller-supplied callbacks
    Callback,
}

/// Metadata for one field of a message.
#[derive(Clone, Copy)]
pub struct FieldDescriptor {
    /// Field number
    pub tag: u32,
    /// Semantic type
    pub data_type: DataType,
    /// Value count
    pub cardinality: Cardinality,
    /// Storage mode
    pub storage: Storage,
    /// Index of the field's storage within the host structure.
    ///
    /// Non-decreasing in table order; alternatives of one oneof group may
    /// share a slot.
    pub slot: u16,
    /// Table of the embedded message, for [`DataType::Message`] fields
    pub submessage: Option<&'static FieldTable>,
    /// Oneof group this field belongs to
    pub oneof: Option<u8>,
    /// Maximum byte length (strings, bytes) or element count (repeated)
    /// for static storage
    pub capacity: Option<u32>,
    /// Emit repeated numeric values as one packed run
    pub packed: bool,
}

impl FieldDescriptor {
    /// Creates an optional, statically stored field
    pub const fn new(tag: u32, data_type: DataType, slot: u16) -> Self {
        Self {
            tag,
            data_type,
            cardinality: Cardinality::Optional,
            storage: Storage::Static,
            slot,
            submessage: None,
            oneof: None,
            capacity: None,
            packed: false,
        }
    }

    /// Creates an embedded message field described by `table`
    pub const fn message(tag: u32, slot: u16, table: &'static FieldTable) -> Self {
        let mut field = Self::new(tag, DataType::Message, slot);
        field.submessage = Some(table);
        field
    }

    /// Marks the field required
    pub const fn required(mut self) -> Self {
        self.cardinality = Cardinality::Required;
        self
    }

    /// Marks the field repeated
    pub const fn repeated(mut self) -> Self {
        self.cardinality = Cardinality::Repeated;
        self
    }

    /// Streams the field through callbacks instead of static storage
    pub const fn callback(mut self) -> Self {
        self.storage = Storage::Callback;
        self
    }

    /// Places the field in a oneof group
    pub const fn oneof(mut self, group: u8) -> Self {
        self.oneof = Some(group);
        self
    }

    /// Bounds static storage to `capacity` bytes or elements
    pub const fn capacity(mut self, capacity: u32) -> Self {
        self.capacity = Some(capacity);
        self
    }

    /// Emits repeated values packed
    pub const fn packed(mut self) -> Self {
        self.packed = true;
        self
    }

    /// Wire type of a single value of this field
    pub const fn wire_type(&self) -> WireType {
        self.data_type.wire_type()
    }

    /// True for repeated fields
    pub const fn is_repeated(&self) -> bool {
        matches!(self.cardinality, Cardinality::Repeated)
    }

    /// True if the decoder accepts a packed run for this field
    pub const fn accepts_packed(&self) -> bool {
        self.is_repeated() && self.data_type.is_packable()
    }
}

impl fmt::Debug for FieldDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Nested tables may be recursive, so only their names are shown
        f.debug_struct("FieldDescriptor")
            .field("tag", &self.tag)
            .field("data_type", &self.data_type)
            .field("cardinality", &self.cardinality)
            .field("storage", &self.storage)
            .field("slot", &self.slot)
            .field("submessage", &self.submessage.map(FieldTable::name))
            .field("oneof", &self.oneof)
            .field("capacity", &self.capacity)
            .field("packed", &self.packed)
            .finish()
    }
}

/// Ordered field descriptors of one message type
#[derive(Debug)]
pub struct FieldTable {
    name: &'static str,
    fields: &'static [FieldDescriptor],
}

impl FieldTable {
    /// Creates a table; the end of `fields` terminates it
    pub const fn new(name: &'static str, fields: &'static [FieldDescriptor]) -> Self {
        Self { name, fields }
    }

    /// Message name, for diagnostics
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Descriptors in table order
    pub fn fields(&self) -> &'static [FieldDescriptor] {
        self.fields
    }

    /// Number of descriptors
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// True if the table has no fields
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Finds the descriptor for a field number
    pub fn find(&self, tag: u32) -> Option<&'static FieldDescriptor> {
        self.fields.iter().find(|field| field.tag == tag)
    }

    /// Descriptors belonging to a oneof group, in table order
    pub fn oneof_alternatives(&self, group: u8) -> impl Iterator<Item = &'static FieldDescriptor> {
        self.fields
            .iter()
            .filter(move |field| field.oneof == Some(group))
    }

    /// Checks this table's structural invariants.
    ///
    /// Nested tables are not visited; see [`validate_tree`](Self::validate_tree).
    pub fn validate(&self) -> Result<()> {
        let mut tags = HashSet::with_capacity(self.fields.len());
        let mut previous: Option<&FieldDescriptor> = None;

        for field in self.fields {
            if field.tag == 0 || field.tag > MAX_FIELD_NUMBER {
                return Err(Error::invalid_table(
                    self.name,
                    format!(
                        "field number {} outside 1..={}",
                        field.tag, MAX_FIELD_NUMBER
                    ),
                ));
            }

            if !tags.insert(field.tag) {
                return Err(Error::invalid_table(
                    self.name,
                    format!("duplicate field number {}", field.tag),
                ));
            }

            if let Some(prev) = previous {
                let shares_union = field.oneof.is_some() && field.oneof == prev.oneof;
                if field.slot < prev.slot || (field.slot == prev.slot && !shares_union) {
                    return Err(Error::invalid_table(
                        self.name,
                        format!(
                            "field {} slot {} does not follow field {} slot {}",
                            field.tag, field.slot, prev.tag, prev.slot
                        ),
                    ));
                }
            }

            let is_message = field.data_type == DataType::Message;
            if is_message != field.submessage.is_some() {
                return Err(Error::invalid_table(
                    self.name,
                    format!(
                        "field {} of type {} {} a submessage table",
                        field.tag,
                        field.data_type.as_str(),
                        if is_message { "lacks" } else { "must not carry" }
                    ),
                ));
            }

            if field.packed && !field.accepts_packed() {
                return Err(Error::invalid_table(
                    self.name,
                    format!("field {} cannot be packed", field.tag),
                ));
            }

            if field.oneof.is_some() && field.is_repeated() {
                return Err(Error::invalid_table(
                    self.name,
                    format!("oneof field {} cannot be repeated", field.tag),
                ));
            }

            if field.capacity.is_some() && field.storage == Storage::Callback {
                return Err(Error::invalid_table(
                    self.name,
                    format!("callback field {} cannot declare a capacity", field.tag),
                ));
            }

            previous = Some(field);
        }

        Ok(())
    }

    /// Validates this table and every table reachable through submessages.
    ///
    /// Each table is checked once, so recursive message types terminate.
    pub fn validate_tree(&'static self) -> Result<()> {
        let mut seen: HashSet<*const FieldTable> = HashSet::new();
        let mut pending = vec![self];

        while let Some(table) = pending.pop() {
            if !seen.insert(table as *const FieldTable) {
                continue;
            }
            table.validate()?;
            pending.extend(table.fields.iter().filter_map(|field| field.submessage));
        }

        Ok(())
    }
}
