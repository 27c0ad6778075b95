//! Streaming callbacks for unbounded field data.
//!
//! Fields with [`Storage::Callback`](super::Storage::Callback) are not stored
//! by the engine. While decoding, each value is handed to a
//! [`DecodeCallback`]; while encoding, an [`EncodeCallback`] emits zero or
//! more values through a [`FieldEmitter`]. Any context a callback needs lives
//! in the implementing value itself, typically a closure capture.
//!
//! Encode callbacks run once for the size pass and once for the write pass,
//! and must emit the same bytes both times.

use super::access::Scalar;
use super::FieldDescriptor;
use crate::engine::{Decoded, FieldEmitter};
use crate::error::{Error, Result};
use std::fmt;

/// Consumer invoked once per decoded value of a callback field
pub trait DecodeCallback {
    /// Receives one value. Returning an error aborts the decode.
    fn decode(&mut self, field: &FieldDescriptor, value: Decoded<'_>) -> Result<()>;
}

/// Producer invoked to emit the values of a callback field
pub trait EncodeCallback {
    /// Emits values through `out` and returns how many were emitted.
    fn encode(&self, field: &FieldDescriptor, out: &mut FieldEmitter<'_, '_>) -> Result<usize>;
}

/// Callback slot held by a host structure.
///
/// Mirrors a field that is decoded through one function and encoded through
/// another: only the direction that is set takes part in an operation.
#[derive(Default)]
pub enum Callback<'a> {
    /// No callback; the field is skipped when decoding and omitted when encoding
    #[default]
    Unset,
    /// Consumer used while decoding
    Decode(&'a mut dyn DecodeCallback),
    /// Producer used while encoding
    Encode(&'a dyn EncodeCallback),
}

impl<'a> Callback<'a> {
    /// The decode consumer, if set
    pub fn decoder(&mut self) -> Option<&mut dyn DecodeCallback> {
        match self {
            Callback::Decode(callback) => {
                let callback: &mut dyn DecodeCallback = &mut **callback;
                Some(callback)
            }
            _ => None,
        }
    }

    /// The encode producer, if set
    pub fn encoder(&self) -> Option<&dyn EncodeCallback> {
        match self {
            Callback::Encode(callback) => {
                let callback: &dyn EncodeCallback = *callback;
                Some(callback)
            }
            _ => None,
        }
    }

    /// True when no callback is set
    pub fn is_unset(&self) -> bool {
        matches!(self, Callback::Unset)
    }
}

impl fmt::Debug for Callback<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Callback::Unset => f.write_str("Callback::Unset"),
            Callback::Decode(_) => f.write_str("Callback::Decode(..)"),
            Callback::Encode(_) => f.write_str("Callback::Encode(..)"),
        }
    }
}

/// Decode callback backed by a closure, see [`decode_fn`]
pub struct DecodeFn<F>(F);

/// Encode callback backed by a closure, see [`encode_fn`]
pub struct EncodeFn<F>(F);

/// Wraps a closure as a [`DecodeCallback`]
pub fn decode_fn<F>(f: F) -> DecodeFn<F>
where
    F: FnMut(&FieldDescriptor, Decoded<'_>) -> Result<()>,
{
    DecodeFn(f)
}

/// Wraps a closure as an [`EncodeCallback`]
pub fn encode_fn<F>(f: F) -> EncodeFn<F>
where
    F: Fn(&FieldDescriptor, &mut FieldEmitter<'_, '_>) -> Result<usize>,
{
    EncodeFn(f)
}

impl<F> DecodeCallback for DecodeFn<F>
where
    F: FnMut(&FieldDescriptor, Decoded<'_>) -> Result<()>,
{
    fn decode(&mut self, field: &FieldDescriptor, value: Decoded<'_>) -> Result<()> {
        (self.0)(field, value)
    }
}

impl<F> EncodeCallback for EncodeFn<F>
where
    F: Fn(&FieldDescriptor, &mut FieldEmitter<'_, '_>) -> Result<usize>,
{
    fn encode(&self, field: &FieldDescriptor, out: &mut FieldEmitter<'_, '_>) -> Result<usize> {
        (self.0)(field, out)
    }
}

/// Collects or emits numeric values of a callback field, in wire order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScalarList(pub Vec<Scalar>);

impl DecodeCallback for ScalarList {
    fn decode(&mut self, field: &FieldDescriptor, value: Decoded<'_>) -> Result<()> {
        match value.as_scalar() {
            Some(scalar) => {
                self.0.push(scalar);
                Ok(())
            }
            None => Err(Error::callback(field.tag, "expected a numeric value")),
        }
    }
}

impl EncodeCallback for ScalarList {
    fn encode(&self, _field: &FieldDescriptor, out: &mut FieldEmitter<'_, '_>) -> Result<usize> {
        for value in &self.0 {
            out.emit_scalar(*value)?;
        }
        Ok(self.0.len())
    }
}

/// Collects or emits byte payloads of a callback field, in wire order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BytesList(pub Vec<Vec<u8>>);

impl DecodeCallback for BytesList {
    fn decode(&mut self, field: &FieldDescriptor, value: Decoded<'_>) -> Result<()> {
        match value.as_bytes() {
            Some(bytes) => {
                self.0.push(bytes.to_vec());
                Ok(())
            }
            None => Err(Error::callback(field.tag, "expected a bytes value")),
        }
    }
}

impl EncodeCallback for BytesList {
    fn encode(&self, _field: &FieldDescriptor, out: &mut FieldEmitter<'_, '_>) -> Result<usize> {
        for value in &self.0 {
            out.emit_bytes(value)?;
        }
        Ok(self.0.len())
    }
}

/// Collects or emits strings of a callback field, in wire order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StringList(pub Vec<String>);

impl DecodeCallback for StringList {
    fn decode(&mut self, field: &FieldDescriptor, value: Decoded<'_>) -> Result<()> {
        let bytes = value
            .as_bytes()
            .ok_or_else(|| Error::callback(field.tag, "expected a string value"))?;
        let text = std::str::from_utf8(bytes).map_err(|_| Error::InvalidUtf8 { tag: field.tag })?;
        self.0.push(text.to_owned());
        Ok(())
    }
}

impl EncodeCallback for StringList {
    fn encode(&self, _field: &FieldDescriptor, out: &mut FieldEmitter<'_, '_>) -> Result<usize> {
        for value in &self.0 {
            out.emit_str(value)?;
        }
        Ok(self.0.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_callback_slot_directions() {
        let mut list = ScalarList::default();
        let mut slot = Callback::Decode(&mut list);
        assert!(slot.decoder().is_some());
        assert!(slot.encoder().is_none());
        assert!(!slot.is_unset());

        let producer = StringList(vec!["a".into()]);
        let slot = Callback::Encode(&producer);
        assert!(slot.encoder().is_some());
        assert_eq!(format!("{slot:?}"), "Callback::Encode(..)");

        let mut slot = Callback::default();
        assert!(slot.is_unset());
        assert!(slot.decoder().is_none());
    }
}
