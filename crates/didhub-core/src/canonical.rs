//! Record encoding.
//!
//! Records are integer-keyed CBOR maps written in RFC 8949 deterministic
//! form, so two registries holding the same record produce the same bytes
//! and the same digest. Documents and sync messages reuse
//! [`encode_canonical`].

use ciborium::value::{Integer, Value};

use crate::did::Did;
use crate::error::CoreError;
use crate::record::{Application, DocAnchor, IdentifierRecord, RECORD_VERSION};
use crate::status::Status;

/// Record field keys (integer keys for compact encoding).
mod keys {
    pub const VERSION: u64 = 0;
    pub const ID: u64 = 1;
    pub const OWNER: u64 = 2;
    pub const STATUS: u64 = 3;
    pub const DOC: u64 = 4;
    pub const APPLICATION: u64 = 5;
}

/// Encode a record to canonical CBOR bytes.
pub fn record_bytes(record: &IdentifierRecord) -> Vec<u8> {
    encode_canonical(&record_to_value(record))
}

/// Decode a record from canonical CBOR bytes.
pub fn decode_record(bytes: &[u8]) -> Result<IdentifierRecord, CoreError> {
    let value = decode_value(bytes)?;
    value_to_record(&value)
}

/// Encode any CBOR value canonically.
pub fn encode_canonical(value: &Value) -> Vec<u8> {
    let mut writer = Writer::default();
    writer.value(value);
    writer.finish()
}

/// Parse CBOR bytes into a generic value.
pub fn decode_value(bytes: &[u8]) -> Result<Value, CoreError> {
    ciborium::from_reader(bytes).map_err(|e| CoreError::DecodingError(e.to_string()))
}

/// Look up an integer key in a CBOR map.
pub fn map_get(map: &[(Value, Value)], key: u64) -> Option<&Value> {
    map.iter()
        .find(|(k, _)| matches!(k, Value::Integer(i) if i128::from(*i) == i128::from(key)))
        .map(|(_, v)| v)
}

/// Build an integer-keyed map entry.
pub fn entry(key: u64, value: Value) -> (Value, Value) {
    (Value::Integer(key.into()), value)
}

/// Read an integer value as `i64`.
pub fn as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Integer(i) => i64::try_from(i128::from(*i)).ok(),
        _ => None,
    }
}

/// Read a text value.
pub fn as_text(value: &Value) -> Option<&str> {
    match value {
        Value::Text(s) => Some(s.as_str()),
        _ => None,
    }
}

fn record_to_value(record: &IdentifierRecord) -> Value {
    let doc = match &record.doc {
        Some(anchor) => Value::Array(vec![
            Value::Text(anchor.address.clone()),
            Value::Bytes(anchor.hash.clone()),
        ]),
        None => Value::Null,
    };

    let application = match &record.application {
        Some(app) => Value::Array(vec![
            Value::Integer(app.applied_at.into()),
            Value::Array(
                app.auditors
                    .iter()
                    .map(|d| Value::Text(d.as_str().to_string()))
                    .collect(),
            ),
        ]),
        None => Value::Null,
    };

    Value::Map(vec![
        entry(keys::VERSION, Value::Integer(RECORD_VERSION.into())),
        entry(keys::ID, Value::Text(record.id.as_str().to_string())),
        entry(keys::OWNER, Value::Text(record.owner.as_str().to_string())),
        entry(keys::STATUS, Value::Integer(record.status.to_u8().into())),
        entry(keys::DOC, doc),
        entry(keys::APPLICATION, application),
    ])
}

fn value_to_record(value: &Value) -> Result<IdentifierRecord, CoreError> {
    let map = match value {
        Value::Map(m) => m,
        _ => return Err(CoreError::MalformedRecord("expected map".into())),
    };

    let version = map_get(map, keys::VERSION)
        .and_then(as_i64)
        .ok_or_else(|| CoreError::MalformedRecord("missing version".into()))?;
    if version != i64::from(RECORD_VERSION) {
        return Err(CoreError::MalformedRecord(format!(
            "unsupported version: {version}"
        )));
    }

    let id = map_get(map, keys::ID)
        .and_then(as_text)
        .map(Did::new)
        .ok_or_else(|| CoreError::MalformedRecord("missing id".into()))?;

    let owner = map_get(map, keys::OWNER)
        .and_then(as_text)
        .map(Did::new)
        .ok_or_else(|| CoreError::MalformedRecord("missing owner".into()))?;

    let status = map_get(map, keys::STATUS)
        .and_then(as_i64)
        .and_then(|n| u8::try_from(n).ok())
        .and_then(Status::from_u8)
        .ok_or_else(|| CoreError::MalformedRecord("invalid status".into()))?;

    let doc = match map_get(map, keys::DOC) {
        Some(Value::Array(parts)) => match parts.as_slice() {
            [Value::Text(address), Value::Bytes(hash)] => Some(DocAnchor {
                address: address.clone(),
                hash: hash.clone(),
            }),
            _ => return Err(CoreError::MalformedRecord("invalid doc anchor".into())),
        },
        Some(Value::Null) | None => None,
        _ => return Err(CoreError::MalformedRecord("invalid doc anchor".into())),
    };

    let application = match map_get(map, keys::APPLICATION) {
        Some(Value::Array(parts)) => match parts.as_slice() {
            [applied_at, Value::Array(auditors)] => {
                let applied_at = as_i64(applied_at)
                    .ok_or_else(|| CoreError::MalformedRecord("invalid applied_at".into()))?;
                let auditors = auditors
                    .iter()
                    .map(|v| {
                        as_text(v)
                            .map(Did::new)
                            .ok_or_else(|| CoreError::MalformedRecord("invalid auditor".into()))
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Some(Application {
                    applied_at,
                    auditors,
                })
            }
            _ => return Err(CoreError::MalformedRecord("invalid application".into())),
        },
        Some(Value::Null) | None => None,
        _ => return Err(CoreError::MalformedRecord("invalid application".into())),
    };

    Ok(IdentifierRecord {
        id,
        owner,
        status,
        doc,
        application,
    })
}

/// Deterministic CBOR writer: shortest heads, definite lengths, and map
/// entries ordered by the bytes of their encoded keys.
#[derive(Default)]
struct Writer {
    out: Vec<u8>,
}

impl Writer {
    const UINT: u8 = 0;
    const NEGINT: u8 = 1;
    const BYTES: u8 = 2;
    const TEXT: u8 = 3;
    const ARRAY: u8 = 4;
    const MAP: u8 = 5;
    const TAG: u8 = 6;

    fn finish(self) -> Vec<u8> {
        self.out
    }

    /// Major type plus argument, in the fewest bytes that hold it.
    fn head(&mut self, major: u8, arg: u64) {
        let initial = major << 5;
        match arg {
            0..=23 => self.out.push(initial | arg as u8),
            24..=0xff => self.out.extend([initial | 24, arg as u8]),
            0x100..=0xffff => {
                self.out.push(initial | 25);
                self.out.extend((arg as u16).to_be_bytes());
            }
            0x1_0000..=0xffff_ffff => {
                self.out.push(initial | 26);
                self.out.extend((arg as u32).to_be_bytes());
            }
            _ => {
                self.out.push(initial | 27);
                self.out.extend(arg.to_be_bytes());
            }
        }
    }

    fn integer(&mut self, value: Integer) {
        let n = i128::from(value);
        match u64::try_from(n) {
            Ok(unsigned) => self.head(Self::UINT, unsigned),
            // -1 - n fits a u64 for every value ciborium can hold.
            Err(_) => self.head(Self::NEGINT, (-1 - n) as u64),
        }
    }

    fn sized(&mut self, major: u8, payload: &[u8]) {
        self.head(major, payload.len() as u64);
        self.out.extend_from_slice(payload);
    }

    fn value(&mut self, value: &Value) {
        match value {
            Value::Integer(i) => self.integer(*i),
            Value::Bytes(b) => self.sized(Self::BYTES, b),
            Value::Text(t) => self.sized(Self::TEXT, t.as_bytes()),
            Value::Array(items) => {
                self.head(Self::ARRAY, items.len() as u64);
                items.iter().for_each(|item| self.value(item));
            }
            Value::Map(entries) => self.map(entries),
            Value::Tag(tag, inner) => {
                self.head(Self::TAG, *tag);
                self.value(inner);
            }
            Value::Bool(false) => self.out.push(0xf4),
            Value::Bool(true) => self.out.push(0xf5),
            Value::Null => self.out.push(0xf6),
            Value::Float(f) => {
                self.out.push(0xfb);
                self.out.extend(f.to_be_bytes());
            }
            // Nothing in this crate builds other value kinds.
            _ => self.out.push(0xf7),
        }
    }

    fn map(&mut self, entries: &[(Value, Value)]) {
        let mut sorted: Vec<(Vec<u8>, &Value)> = entries
            .iter()
            .map(|(key, value)| {
                let mut key_writer = Writer::default();
                key_writer.value(key);
                (key_writer.finish(), value)
            })
            .collect();
        sorted.sort_unstable_by(|a, b| a.0.cmp(&b.0));

        self.head(Self::MAP, sorted.len() as u64);
        for (key, value) in sorted {
            self.out.extend(key);
            self.value(value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> IdentifierRecord {
        let mut record = IdentifierRecord::applied(
            Did::new("did:bitxhub:app:."),
            Did::new("did:bitxhub:relayroot:0xalice"),
            1_736_870_400_000,
        );
        record.note_auditor(Did::new("did:bitxhub:relayroot:0xadmin"));
        record
    }

    #[test]
    fn test_record_encoding_deterministic() {
        let record = sample();
        assert_eq!(record_bytes(&record), record_bytes(&record));
        assert_eq!(record.digest(), sample().digest());
    }

    #[test]
    fn test_record_decode() {
        let mut record = sample();
        let decoded = decode_record(&record_bytes(&record)).unwrap();
        assert_eq!(decoded, record);

        record.transition(Status::Approved).unwrap();
        record
            .register(DocAnchor::new("ipfs://QmDoc", vec![1, 2, 3]).unwrap())
            .unwrap();
        let decoded = decode_record(&record_bytes(&record)).unwrap();
        assert_eq!(decoded.status, Status::Registered);
        assert_eq!(decoded.doc_address(), Some("ipfs://QmDoc"));
        assert!(decoded.application.is_none());
    }

    #[test]
    fn test_digest_tracks_status() {
        let applied = sample();
        let mut approved = sample();
        approved.transition(Status::Approved).unwrap();
        assert_ne!(applied.digest(), approved.digest());
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(decode_record(&[0xff, 0x00]).is_err());
        assert!(decode_record(&encode_canonical(&Value::Text("x".into()))).is_err());

        let bad_status = Value::Map(vec![
            entry(keys::VERSION, Value::Integer(0.into())),
            entry(keys::ID, Value::Text("did:bitxhub:app:.".into())),
            entry(keys::OWNER, Value::Text("did:bitxhub:app:0x1".into())),
            entry(keys::STATUS, Value::Integer(42.into())),
        ]);
        assert!(decode_record(&encode_canonical(&bad_status)).is_err());
    }

    #[test]
    fn test_shortest_heads() {
        let cases: [(i64, &[u8]); 6] = [
            (0, &[0x00]),
            (23, &[0x17]),
            (24, &[0x18, 24]),
            (256, &[0x19, 0x01, 0x00]),
            (70_000, &[0x1a, 0x00, 0x01, 0x11, 0x70]),
            (-1, &[0x20]),
        ];
        for (n, expected) in cases {
            assert_eq!(encode_canonical(&Value::Integer(n.into())), expected, "{n}");
        }
    }

    #[test]
    fn test_record_keys_in_order() {
        let shuffled = Value::Map(vec![
            entry(keys::STATUS, Value::Integer(3.into())),
            entry(keys::VERSION, Value::Integer(0.into())),
            entry(keys::ID, Value::Integer(1.into())),
        ]);
        assert_eq!(
            encode_canonical(&shuffled),
            vec![0xa3, 0x00, 0x00, 0x01, 0x01, 0x03, 0x03]
        );
    }

    #[test]
    fn test_map_text_keys_sorted_by_encoding() {
        let value = Value::Map(vec![
            (Value::Text("bb".into()), Value::Null),
            (Value::Text("a".into()), Value::Null),
        ]);
        let bytes = encode_canonical(&value);
        // Shorter encoded key sorts first.
        assert_eq!(&bytes[..3], &[0xa2, 0x61, b'a']);
    }

    mod props {
        use super::*;
        use crate::record::DocAnchor;
        use crate::status::Status;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn test_record_encoding_deterministic(
                sub in "[a-z][a-z0-9]{0,12}",
                owner in "0x[0-9a-f]{4,40}",
                address in "ipfs://[a-z0-9]{1,32}",
                hash in proptest::collection::vec(any::<u8>(), 1..64),
                frozen in any::<bool>(),
            ) {
                let mut record = IdentifierRecord::registered(
                    Did::method_of("bitxhub", &sub),
                    Did::new(format!("did:bitxhub:relayroot:{owner}")),
                    DocAnchor::new(address, hash).unwrap(),
                );
                if frozen {
                    record.status = Status::Frozen;
                }
                let bytes = record_bytes(&record);
                prop_assert_eq!(&bytes, &record_bytes(&record.clone()));
                let decoded = decode_record(&bytes).unwrap();
                prop_assert_eq!(record_bytes(&decoded), bytes);
            }

            #[test]
            fn test_decode_garbage_never_panics(bytes in proptest::collection::vec(any::<u8>(), 0..128)) {
                let _ = decode_record(&bytes);
            }
        }
    }
}
