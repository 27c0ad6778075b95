//! # pbtable-core
//!
//! A table-driven Protocol Buffers encoder and decoder.
//!
//! Message layouts are described by static [`FieldTable`]s instead of
//! generated code. One generic engine encodes and decodes any message whose
//! host type implements [`Message`], which maps each descriptor to a typed
//! view of the field's storage.
//!
//! ## Architecture
//!
//! - [`wire`]: varint and zig-zag codecs, the bounds-checked [`Reader`] and
//!   the sizing-capable [`Writer`]
//! - [`table`]: field descriptors, tables, the host access trait and
//!   streaming callbacks
//! - [`engine`]: the decode and encode engines
//! - [`inspect`](mod@inspect): schema-less walk of an encoded buffer
//! - [`error`]: error types and handling
//!
//! ## Example
//!
//! ```
//! use pbtable_core::table::{DataType, FieldDescriptor, FieldMut, FieldRef, FieldTable, Message};
//!
//! static POINT: FieldTable = FieldTable::new(
//!     "Point",
//!     &[
//!         FieldDescriptor::new(1, DataType::SInt32, 0),
//!         FieldDescriptor::new(2, DataType::SInt32, 1),
//!     ],
//! );
//!
//! #[derive(Debug, Default, PartialEq)]
//! struct Point {
//!     x: i32,
//!     y: i32,
//! }
//!
//! impl Message for Point {
//!     fn field(&self, field: &FieldDescriptor) -> Option<FieldRef<'_>> {
//!         match field.tag {
//!             1 => Some(FieldRef::Scalar(self.x.into())),
//!             2 => Some(FieldRef::Scalar(self.y.into())),
//!             _ => None,
//!         }
//!     }
//!
//!     fn field_mut(&mut self, field: &FieldDescriptor) -> Option<FieldMut<'_>> {
//!         match field.tag {
//!             1 => Some(FieldMut::Scalar((&mut self.x).into())),
//!             2 => Some(FieldMut::Scalar((&mut self.y).into())),
//!             _ => None,
//!         }
//!     }
//! }
//!
//! let bytes = pbtable_core::encode_to_bytes(&POINT, &Point { x: -1, y: 2 })?;
//! assert_eq!(&bytes[..], &[0x08, 0x01, 0x10, 0x04]);
//!
//! let point: Point = pbtable_core::decode(&POINT, &bytes)?;
//! assert_eq!(point, Point { x: -1, y: 2 });
//! # Ok::<(), pbtable_core::Error>(())
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unreachable_pub)]

pub mod engine;
pub mod error;
pub mod inspect;
pub mod table;
pub mod wire;

pub use engine::{
    decode, decode_delimited, decode_into, encode, encode_delimited, encode_to_bytes, encoded_size,
    Decoder, DecoderConfig,
};
pub use error::{Error, Result};
pub use inspect::{inspect, InspectConfig, WireField, WireValue};
pub use table::{FieldDescriptor, FieldTable, Message};
pub use wire::{Reader, Writer};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Largest valid field number (2^29 - 1)
pub const MAX_FIELD_NUMBER: u32 = 536_870_911;
