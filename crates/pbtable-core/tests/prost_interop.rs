//! Byte-level compatibility with prost-generated messages.

use pbtable_core::table::{DataType, FieldDescriptor, FieldMut, FieldRef, FieldTable, Message};
use pbtable_core::{decode, encode_to_bytes};
use pretty_assertions::assert_eq;
use prost::Message as ProstMessage;

#[derive(Clone, PartialEq, prost::Message)]
struct ProstReading {
    #[prost(uint64, tag = "1")]
    id: u64,
    #[prost(string, tag = "2")]
    name: String,
    #[prost(message, optional, tag = "3")]
    at: Option<prost_types::Timestamp>,
    #[prost(sint32, repeated, tag = "4")]
    deltas: Vec<i32>,
    #[prost(double, tag = "5")]
    ratio: f64,
    #[prost(bytes = "vec", tag = "6")]
    blob: Vec<u8>,
    #[prost(int32, repeated, packed = "false", tag = "7")]
    loose: Vec<i32>,
}

static TIMESTAMP: FieldTable = FieldTable::new(
    "Timestamp",
    &[
        FieldDescriptor::new(1, DataType::Int64, 0),
        FieldDescriptor::new(2, DataType::Int32, 1),
    ],
);

static READING: FieldTable = FieldTable::new(
    "Reading",
    &[
        FieldDescriptor::new(1, DataType::UInt64, 0),
        FieldDescriptor::new(2, DataType::String, 1),
        FieldDescriptor::message(3, 2, &TIMESTAMP),
        FieldDescriptor::new(4, DataType::SInt32, 3).repeated().packed(),
        FieldDescriptor::new(5, DataType::Double, 4),
        FieldDescriptor::new(6, DataType::Bytes, 5),
        FieldDescriptor::new(7, DataType::Int32, 6).repeated(),
    ],
);

#[derive(Debug, Default, Clone, PartialEq)]
struct Stamp {
    seconds: i64,
    nanos: i32,
}

impl Message for Stamp {
    fn field(&self, field: &FieldDescriptor) -> Option<FieldRef<'_>> {
        match field.tag {
            1 if self.seconds == 0 => Some(FieldRef::Absent),
            1 => Some(FieldRef::Scalar(self.seconds.into())),
            2 if self.nanos == 0 => Some(FieldRef::Absent),
            2 => Some(FieldRef::Scalar(self.nanos.into())),
            _ => None,
        }
    }

    fn field_mut(&mut self, field: &FieldDescriptor) -> Option<FieldMut<'_>> {
        match field.tag {
            1 => Some(FieldMut::Scalar((&mut self.seconds).into())),
            2 => Some(FieldMut::Scalar((&mut self.nanos).into())),
            _ => None,
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
struct Reading {
    id: u64,
    name: String,
    at: Option<Stamp>,
    deltas: Vec<i32>,
    ratio: f64,
    blob: Vec<u8>,
    loose: Vec<i32>,
}

impl Message for Reading {
    fn field(&self, field: &FieldDescriptor) -> Option<FieldRef<'_>> {
        let view = match field.tag {
            1 => FieldRef::optional(Some(self.id).filter(|id| *id != 0)),
            2 => FieldRef::optional_str(Some(self.name.as_str()).filter(|name| !name.is_empty())),
            3 => match &self.at {
                Some(at) => FieldRef::Message(at),
                None => FieldRef::Absent,
            },
            4 => FieldRef::Repeated(&self.deltas),
            5 => FieldRef::optional(Some(self.ratio).filter(|ratio| *ratio != 0.0)),
            6 if self.blob.is_empty() => FieldRef::Absent,
            6 => FieldRef::Bytes(&self.blob),
            7 => FieldRef::Repeated(&self.loose),
            _ => return None,
        };
        Some(view)
    }

    fn field_mut(&mut self, field: &FieldDescriptor) -> Option<FieldMut<'_>> {
        let view = match field.tag {
            1 => FieldMut::Scalar((&mut self.id).into()),
            2 => FieldMut::String(&mut self.name),
            3 => FieldMut::Message(self.at.get_or_insert_with(Stamp::default)),
            4 => FieldMut::Repeated(&mut self.deltas),
            5 => FieldMut::Scalar((&mut self.ratio).into()),
            6 => FieldMut::Bytes(&mut self.blob),
            7 => FieldMut::Repeated(&mut self.loose),
            _ => return None,
        };
        Some(view)
    }
}

fn sample() -> (Reading, ProstReading) {
    let ours = Reading {
        id: 1_234_567,
        name: "boiler-room".into(),
        at: Some(Stamp {
            seconds: 1_700_000_000,
            nanos: 250_000_000,
        }),
        deltas: vec![0, -1, 63, -64, i32::MAX],
        ratio: -3.75,
        blob: vec![0xDE, 0xAD, 0xBE, 0xEF],
        loose: vec![-1, 0, 150],
    };
    let theirs = ProstReading {
        id: ours.id,
        name: ours.name.clone(),
        at: Some(prost_types::Timestamp {
            seconds: 1_700_000_000,
            nanos: 250_000_000,
        }),
        deltas: ours.deltas.clone(),
        ratio: ours.ratio,
        blob: ours.blob.clone(),
        loose: ours.loose.clone(),
    };
    (ours, theirs)
}

#[test]
fn test_encoding_matches_prost() {
    let (ours, theirs) = sample();
    let bytes = encode_to_bytes(&READING, &ours).unwrap();
    assert_eq!(bytes.to_vec(), theirs.encode_to_vec());
}

#[test]
fn test_decodes_prost_output() {
    let (ours, theirs) = sample();
    let decoded: Reading = decode(&READING, &theirs.encode_to_vec()).unwrap();
    assert_eq!(decoded, ours);
}

#[test]
fn test_prost_decodes_our_output() {
    let (ours, theirs) = sample();
    let bytes = encode_to_bytes(&READING, &ours).unwrap();
    let decoded = ProstReading::decode(&bytes[..]).unwrap();
    assert_eq!(decoded, theirs);
}

#[test]
fn test_timestamp_matches_prost_types() {
    for (seconds, nanos) in [(0, 0), (1, 0), (-1, -1), (i64::MAX, 999_999_999)] {
        let ours = encode_to_bytes(&TIMESTAMP, &Stamp { seconds, nanos }).unwrap();
        let theirs = prost_types::Timestamp { seconds, nanos }.encode_to_vec();
        assert_eq!(ours.to_vec(), theirs, "seconds={} nanos={}", seconds, nanos);
    }
}

#[test]
fn test_empty_submessage_is_present() {
    let ours = Reading {
        at: Some(Stamp::default()),
        ..Reading::default()
    };
    let theirs = ProstReading {
        at: Some(prost_types::Timestamp::default()),
        ..ProstReading::default()
    };
    let bytes = encode_to_bytes(&READING, &ours).unwrap();
    assert_eq!(&bytes[..], &[0x1A, 0x00]);
    assert_eq!(bytes.to_vec(), theirs.encode_to_vec());

    let decoded: Reading = decode(&READING, &bytes).unwrap();
    assert_eq!(decoded.at, Some(Stamp::default()));
}
