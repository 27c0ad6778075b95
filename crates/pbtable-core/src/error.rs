//! Error types for the pbtable-core library.
//!
//! This module provides error handling using the `thiserror` crate, with one
//! variant per failure mode of the wire codec. Offsets are absolute byte
//! positions in the buffer handed to the engine.

use crate::wire::WireType;
use thiserror::Error;

/// Result type alias for pbtable operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for all encode, decode and table operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// A tag was requested but no bytes remain
    #[error("unexpected end of input at offset {offset}")]
    EndOfInput {
        /// Byte offset where the read was attempted
        offset: usize,
    },

    /// A field value is cut short by the end of the buffer
    #[error("truncated field at offset {offset}: need {needed} bytes, {remaining} remaining")]
    TruncatedField {
        /// Byte offset where the value starts
        offset: usize,
        /// Bytes required by the value
        needed: usize,
        /// Bytes left in the buffer
        remaining: usize,
    },

    /// The buffer ends inside a field tag
    #[error("truncated message at offset {offset}: input ends inside a field tag")]
    TruncatedMessage {
        /// Byte offset where the partial tag starts
        offset: usize,
    },

    /// A varint did not terminate within 10 bytes, or overflows 64 bits
    #[error("malformed varint at offset {offset}")]
    MalformedVarint {
        /// Byte offset where the varint starts
        offset: usize,
    },

    /// A length prefix declares more bytes than remain
    #[error("length-delimited field at offset {offset} declares {length} bytes but only {remaining} remain")]
    LengthOverflow {
        /// Byte offset of the length prefix
        offset: usize,
        /// Declared payload length
        length: u64,
        /// Bytes left after the prefix
        remaining: usize,
    },

    /// The wire type on the wire disagrees with the field's descriptor
    #[error("wire type mismatch for field {tag}: expected {expected:?}, found {found:?}")]
    WireTypeMismatch {
        /// Field number
        tag: u32,
        /// Wire type the descriptor expects
        expected: WireType,
        /// Wire type found in the input
        found: WireType,
    },

    /// The low three bits of a tag name an unsupported wire type
    #[error("invalid wire type {value} at offset {offset}")]
    InvalidWireType {
        /// Byte offset of the tag
        offset: usize,
        /// Raw wire type bits
        value: u8,
    },

    /// A tag carries field number 0 or one above the protobuf maximum
    #[error("invalid field number {number} at offset {offset}")]
    InvalidFieldNumber {
        /// Byte offset of the tag
        offset: usize,
        /// The decoded field number
        number: u64,
    },

    /// Embedded messages nest deeper than the configured limit
    #[error("message nesting exceeds maximum depth of {max_depth}")]
    NestingTooDeep {
        /// The configured limit
        max_depth: usize,
    },

    /// The output buffer is smaller than the encoded message
    #[error("output buffer exhausted: need {needed} bytes, {remaining} remaining")]
    BufferExhausted {
        /// Bytes the pending write needs
        needed: usize,
        /// Bytes left in the output buffer
        remaining: usize,
    },

    /// A static field received more data than its declared capacity
    #[error("field {tag} exceeds its capacity of {capacity}")]
    CapacityExceeded {
        /// Field number
        tag: u32,
        /// Declared capacity (bytes or elements)
        capacity: u32,
    },

    /// A string field does not hold valid UTF-8
    #[error("field {tag} holds invalid UTF-8")]
    InvalidUtf8 {
        /// Field number
        tag: u32,
    },

    /// An embedded message produced a different size in the write pass
    #[error("embedded message in field {tag} changed size between passes: sized {expected}, wrote {actual}")]
    SubmessageSizeChanged {
        /// Field number
        tag: u32,
        /// Size from the size pass
        expected: usize,
        /// Size from the write pass
        actual: usize,
    },

    /// Host storage does not match what the descriptor describes
    #[error("storage for field {tag} does not match its descriptor: {details}")]
    StorageMismatch {
        /// Field number
        tag: u32,
        /// Description of the mismatch
        details: String,
    },

    /// A field table violates its structural invariants
    #[error("invalid field table '{table}': {details}")]
    InvalidTable {
        /// Name of the table
        table: &'static str,
        /// Description of the violation
        details: String,
    },

    /// A caller-supplied callback rejected a value
    #[error("callback for field {tag} failed: {details}")]
    Callback {
        /// Field number
        tag: u32,
        /// Reason given by the callback
        details: String,
    },
}

impl Error {
    /// Creates a new truncated field error
    pub fn truncated_field(offset: usize, needed: usize, remaining: usize) -> Self {
        Self::TruncatedField {
            offset,
            needed,
            remaining,
        }
    }

    /// Creates a new storage mismatch error
    pub fn storage_mismatch(tag: u32, details: impl Into<String>) -> Self {
        Self::StorageMismatch {
            tag,
            details: details.into(),
        }
    }

    /// Creates a new invalid table error
    pub fn invalid_table(table: &'static str, details: impl Into<String>) -> Self {
        Self::InvalidTable {
            table,
            details: details.into(),
        }
    }

    /// Creates a new callback error
    pub fn callback(tag: u32, details: impl Into<String>) -> Self {
        Self::Callback {
            tag,
            details: details.into(),
        }
    }

    /// Shifts every offset carried by this error by `base` bytes.
    ///
    /// Used when a slice-relative primitive reports into a buffer-relative
    /// cursor.
    pub(crate) fn shifted(self, base: usize) -> Self {
        match self {
            Self::EndOfInput { offset } => Self::EndOfInput {
                offset: offset + base,
            },
            Self::TruncatedField {
                offset,
                needed,
                remaining,
            } => Self::TruncatedField {
                offset: offset + base,
                needed,
                remaining,
            },
            Self::TruncatedMessage { offset } => Self::TruncatedMessage {
                offset: offset + base,
            },
            Self::MalformedVarint { offset } => Self::MalformedVarint {
                offset: offset + base,
            },
            Self::LengthOverflow {
                offset,
                length,
                remaining,
            } => Self::LengthOverflow {
                offset: offset + base,
                length,
                remaining,
            },
            Self::InvalidWireType { offset, value } => Self::InvalidWireType {
                offset: offset + base,
                value,
            },
            Self::InvalidFieldNumber { offset, number } => Self::InvalidFieldNumber {
                offset: offset + base,
                number,
            },
            other => other,
        }
    }

    /// Returns true if this error stems from a caller programming error
    /// rather than from the bytes being decoded.
    ///
    /// These are not recoverable by retrying with the same inputs: the output
    /// buffer was under-sized, a callback is nondeterministic, or the table
    /// and host storage disagree.
    pub fn is_usage_error(&self) -> bool {
        matches!(
            self,
            Self::BufferExhausted { .. }
                | Self::StorageMismatch { .. }
                | Self::InvalidTable { .. }
                | Self::SubmessageSizeChanged { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::LengthOverflow {
            offset: 1,
            length: 5,
            remaining: 2,
        };
        assert!(err.to_string().contains("declares 5 bytes"));
        assert!(err.to_string().contains("offset 1"));
    }

    #[test]
    fn test_is_usage_error() {
        assert!(Error::BufferExhausted {
            needed: 4,
            remaining: 1
        }
        .is_usage_error());
        assert!(Error::storage_mismatch(3, "no storage").is_usage_error());
        assert!(!Error::MalformedVarint { offset: 0 }.is_usage_error());
        assert!(!Error::NestingTooDeep { max_depth: 2 }.is_usage_error());
    }

    #[test]
    fn test_shifted_moves_offsets_only() {
        let err = Error::truncated_field(2, 4, 1).shifted(10);
        assert_eq!(err, Error::truncated_field(12, 4, 1));

        let err = Error::NestingTooDeep { max_depth: 3 }.shifted(10);
        assert_eq!(err, Error::NestingTooDeep { max_depth: 3 });
    }
}
