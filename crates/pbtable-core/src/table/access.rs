//! Host structure access.
//!
//! The engine never touches host memory directly. A host type implements
//! [`Message`] and hands out typed views of each field's storage when the
//! engine asks for a descriptor: [`FieldRef`] while encoding, [`FieldMut`]
//! while decoding.

use super::callback::{DecodeCallback, EncodeCallback};
use super::FieldDescriptor;

/// A host structure whose layout is described by a field table.
///
/// Implementations usually match on [`FieldDescriptor::tag`] (or
/// [`FieldDescriptor::slot`]) and return the matching storage view.
/// Returning `None` signals that the host has no storage for the descriptor,
/// which the engine reports as a storage mismatch.
///
/// # Example
///
/// ```
/// use pbtable_core::table::{DataType, FieldDescriptor, FieldMut, FieldRef, FieldTable, Message};
///
/// static COUNTER: FieldTable = FieldTable::new(
///     "Counter",
///     &[
///         FieldDescriptor::new(1, DataType::String, 0),
///         FieldDescriptor::new(2, DataType::UInt64, 1),
///     ],
/// );
///
/// #[derive(Debug, Default, PartialEq)]
/// struct Counter {
///     name: String,
///     value: Option<u64>,
/// }
///
/// impl Message for Counter {
///     fn field(&self, field: &FieldDescriptor) -> Option<FieldRef<'_>> {
///         match field.tag {
///             1 => Some(FieldRef::Bytes(self.name.as_bytes())),
///             2 => Some(FieldRef::optional(self.value)),
///             _ => None,
///         }
///     }
///
///     fn field_mut(&mut self, field: &FieldDescriptor) -> Option<FieldMut<'_>> {
///         match field.tag {
///             1 => Some(FieldMut::String(&mut self.name)),
///             2 => Some(FieldMut::Scalar(self.value.get_or_insert(0).into())),
///             _ => None,
///         }
///     }
/// }
///
/// let counter = Counter { name: "hits".into(), value: Some(3) };
/// let bytes = pbtable_core::encode_to_bytes(&COUNTER, &counter)?;
/// let decoded: Counter = pbtable_core::decode(&COUNTER, &bytes)?;
/// assert_eq!(decoded, counter);
/// # Ok::<(), pbtable_core::Error>(())
/// ```
pub trait Message {
    /// Storage view used while encoding
    fn field(&self, field: &FieldDescriptor) -> Option<FieldRef<'_>>;

    /// Storage view used while decoding.
    ///
    /// Only called when the field is present in the input, so hosts may use
    /// this to record presence.
    fn field_mut(&mut self, field: &FieldDescriptor) -> Option<FieldMut<'_>>;

    /// Tag of the active alternative of a oneof group.
    ///
    /// The encoder emits only the alternative named here. Hosts with oneof
    /// fields must override it: the default reports no active alternative,
    /// and encoding then fails with [`Error::StorageMismatch`] if any
    /// alternative holds a value.
    ///
    /// [`Error::StorageMismatch`]: crate::Error::StorageMismatch
    fn which_oneof(&self, group: u8) -> Option<u32> {
        let _ = group;
        None
    }

    /// Makes `tag` the active alternative of a oneof group.
    ///
    /// Called by the decoder before [`field_mut`](Self::field_mut) for every
    /// oneof field. Hosts should reset the group's storage when a different
    /// alternative was active and keep it when `tag` already is.
    fn select_oneof(&mut self, group: u8, tag: u32) {
        let _ = (group, tag);
    }
}

/// An owned scalar value in its storage representation
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Scalar {
    /// int32, sint32, sfixed32, enum
    I32(i32),
    /// int64, sint64, sfixed64
    I64(i64),
    /// uint32, fixed32
    U32(u32),
    /// uint64, fixed64
    U64(u64),
    /// bool
    Bool(bool),
    /// float
    F32(f32),
    /// double
    F64(f64),
}

/// Mutable reference to scalar storage
#[derive(Debug)]
pub enum ScalarMut<'a> {
    /// int32, sint32, sfixed32, enum
    I32(&'a mut i32),
    /// int64, sint64, sfixed64
    I64(&'a mut i64),
    /// uint32, fixed32
    U32(&'a mut u32),
    /// uint64, fixed64
    U64(&'a mut u64),
    /// bool
    Bool(&'a mut bool),
    /// float
    F32(&'a mut f32),
    /// double
    F64(&'a mut f64),
}

impl ScalarMut<'_> {
    /// Stores `value`; false if its variant does not match the storage
    pub fn set(self, value: Scalar) -> bool {
        match (self, value) {
            (ScalarMut::I32(dst), Scalar::I32(v)) => *dst = v,
            (ScalarMut::I64(dst), Scalar::I64(v)) => *dst = v,
            (ScalarMut::U32(dst), Scalar::U32(v)) => *dst = v,
            (ScalarMut::U64(dst), Scalar::U64(v)) => *dst = v,
            (ScalarMut::Bool(dst), Scalar::Bool(v)) => *dst = v,
            (ScalarMut::F32(dst), Scalar::F32(v)) => *dst = v,
            (ScalarMut::F64(dst), Scalar::F64(v)) => *dst = v,
            _ => return false,
        }
        true
    }
}

macro_rules! scalar_conversions {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Scalar {
                fn from(value: $ty) -> Self {
                    Scalar::$variant(value)
                }
            }

            impl<'a> From<&'a mut $ty> for ScalarMut<'a> {
                fn from(value: &'a mut $ty) -> Self {
                    ScalarMut::$variant(value)
                }
            }

            impl Storable for $ty {
                fn as_field(&self) -> FieldRef<'_> {
                    FieldRef::Scalar(Scalar::$variant(*self))
                }

                fn from_value(value: Value<'_>) -> Option<Self> {
                    match value {
                        Value::Scalar(Scalar::$variant(v)) => Some(v),
                        _ => None,
                    }
                }
            }
        )*
    };
}

scalar_conversions! {
    i32 => I32,
    i64 => I64,
    u32 => U32,
    u64 => U64,
    bool => Bool,
    f32 => F32,
    f64 => F64,
}

/// A decoded primitive, borrowed from the input where possible
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value<'a> {
    /// Numeric or boolean value
    Scalar(Scalar),
    /// Payload of a string or bytes field
    Bytes(&'a [u8]),
}

/// Read-only view of a field's storage
pub enum FieldRef<'a> {
    /// Optional field not present; nothing is emitted
    Absent,
    /// Scalar value
    Scalar(Scalar),
    /// String or bytes payload
    Bytes(&'a [u8]),
    /// Embedded message
    Message(&'a dyn Message),
    /// Static repeated scalars, strings or bytes
    Repeated(&'a dyn RepeatedRef),
    /// Static repeated embedded messages
    Messages(&'a dyn MessageList),
    /// Callback field; `None` when no encoder is set
    Callback(Option<&'a dyn EncodeCallback>),
}

impl<'a> FieldRef<'a> {
    /// Scalar view of an optional value, `Absent` when `None`
    pub fn optional<T: Into<Scalar>>(value: Option<T>) -> Self {
        match value {
            Some(value) => FieldRef::Scalar(value.into()),
            None => FieldRef::Absent,
        }
    }

    /// Byte view of optional text, `Absent` when `None`
    pub fn optional_str(value: Option<&'a str>) -> Self {
        match value {
            Some(value) => FieldRef::Bytes(value.as_bytes()),
            None => FieldRef::Absent,
        }
    }
}

/// Mutable view of a field's storage
pub enum FieldMut<'a> {
    /// Scalar storage
    Scalar(ScalarMut<'a>),
    /// Bytes storage, replaced on each occurrence
    Bytes(&'a mut Vec<u8>),
    /// String storage, replaced on each occurrence
    String(&'a mut String),
    /// Embedded message, merged on each occurrence
    Message(&'a mut dyn Message),
    /// Static repeated scalars, strings or bytes
    Repeated(&'a mut dyn RepeatedMut),
    /// Static repeated embedded messages
    Messages(&'a mut dyn MessageListMut),
    /// Callback field; `None` when no decoder is set and the field is skipped
    Callback(Option<&'a mut dyn DecodeCallback>),
}

/// Element type usable in static repeated storage
pub trait Storable: Sized {
    /// View of one element
    fn as_field(&self) -> FieldRef<'_>;

    /// Converts a decoded value, `None` if the types disagree
    fn from_value(value: Value<'_>) -> Option<Self>;
}

impl Storable for Vec<u8> {
    fn as_field(&self) -> FieldRef<'_> {
        FieldRef::Bytes(self)
    }

    fn from_value(value: Value<'_>) -> Option<Self> {
        match value {
            Value::Bytes(bytes) => Some(bytes.to_vec()),
            Value::Scalar(_) => None,
        }
    }
}

impl Storable for String {
    fn as_field(&self) -> FieldRef<'_> {
        FieldRef::Bytes(self.as_bytes())
    }

    fn from_value(value: Value<'_>) -> Option<Self> {
        match value {
            Value::Bytes(bytes) => std::str::from_utf8(bytes).ok().map(str::to_owned),
            Value::Scalar(_) => None,
        }
    }
}

/// Read access to static repeated storage
pub trait RepeatedRef {
    /// Number of elements
    fn len(&self) -> usize;

    /// View of the element at `index`
    fn element(&self, index: usize) -> Option<FieldRef<'_>>;

    /// True when there are no elements
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: Storable> RepeatedRef for Vec<T> {
    fn len(&self) -> usize {
        <[T]>::len(self)
    }

    fn element(&self, index: usize) -> Option<FieldRef<'_>> {
        self.get(index).map(Storable::as_field)
    }
}

/// Append access to static repeated storage
pub trait RepeatedMut {
    /// Number of elements
    fn len(&self) -> usize;

    /// Appends a decoded value; false if its type does not fit the storage
    fn push_value(&mut self, value: Value<'_>) -> bool;

    /// True when there are no elements
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: Storable> RepeatedMut for Vec<T> {
    fn len(&self) -> usize {
        <[T]>::len(self)
    }

    fn push_value(&mut self, value: Value<'_>) -> bool {
        match T::from_value(value) {
            Some(element) => {
                self.push(element);
                true
            }
            None => false,
        }
    }
}

/// Read access to static repeated embedded messages
pub trait MessageList {
    /// Number of messages
    fn len(&self) -> usize;

    /// The message at `index`
    fn get_message(&self, index: usize) -> Option<&dyn Message>;

    /// True when there are no messages
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<M: Message> MessageList for Vec<M> {
    fn len(&self) -> usize {
        <[M]>::len(self)
    }

    fn get_message(&self, index: usize) -> Option<&dyn Message> {
        self.get(index).map(|message| message as &dyn Message)
    }
}

/// Append access to static repeated embedded messages
pub trait MessageListMut {
    /// Number of messages
    fn len(&self) -> usize;

    /// Appends a default message and returns it for decoding
    fn push_default(&mut self) -> &mut dyn Message;

    /// True when there are no messages
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<M: Message + Default> MessageListMut for Vec<M> {
    fn len(&self) -> usize {
        <[M]>::len(self)
    }

    fn push_default(&mut self) -> &mut dyn Message {
        let index = <[M]>::len(self);
        self.push(M::default());
        &mut self[index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_mut_set() {
        let mut value = 0i32;
        assert!(ScalarMut::from(&mut value).set(Scalar::I32(-5)));
        assert_eq!(value, -5);
        assert!(!ScalarMut::from(&mut value).set(Scalar::U32(5)));
        assert_eq!(value, -5);
    }

    #[test]
    fn test_optional_ref() {
        assert!(matches!(FieldRef::optional(Some(3u64)), FieldRef::Scalar(Scalar::U64(3))));
        assert!(matches!(FieldRef::optional::<u64>(None), FieldRef::Absent));
        assert!(matches!(FieldRef::optional_str(Some("ab")), FieldRef::Bytes(b"ab")));
    }

    #[test]
    fn test_storable_conversions() {
        assert_eq!(f64::from_value(Value::Scalar(Scalar::F64(1.5))), Some(1.5));
        assert_eq!(f64::from_value(Value::Scalar(Scalar::F32(1.5))), None);
        assert_eq!(
            String::from_value(Value::Bytes(b"hi")),
            Some("hi".to_string())
        );
        assert_eq!(String::from_value(Value::Bytes(&[0xFF])), None);
        assert_eq!(Vec::<u8>::from_value(Value::Bytes(&[0xFF])), Some(vec![0xFF]));
    }

    #[test]
    fn test_repeated_storage() {
        let mut values: Vec<u32> = Vec::new();
        assert!(values.push_value(Value::Scalar(Scalar::U32(4))));
        assert!(!values.push_value(Value::Bytes(b"x")));
        assert_eq!(RepeatedMut::len(&values), 1);
        assert!(matches!(
            values.element(0),
            Some(FieldRef::Scalar(Scalar::U32(4)))
        ));
        assert!(values.element(1).is_none());
    }
}
