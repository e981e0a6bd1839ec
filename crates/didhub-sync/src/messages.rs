//! Sync message types.
//!
//! A registry notifies its children of a change with one [`SyncMessage`] per
//! child. Each message carries a [`Payload`] that asks the destination
//! registry to run `Synchronize(fromID, recordBytes)`. All messages of one
//! change travel together in a [`MessageBatch`].

use bytes::Bytes;
use ciborium::value::Value;
use serde::{Deserialize, Serialize};

use didhub_core::canonical::{as_i64, as_text, decode_value, encode_canonical, entry, map_get};
use didhub_core::{decode_record, record_bytes, Did, IdentifierRecord};

use crate::error::{Result, SyncError};

/// Current message encoding version.
pub const PROTOCOL_VERSION: u8 = 0;

/// Function every propagated payload invokes on the destination.
pub const SYNCHRONIZE_FN: &str = "Synchronize";

/// Broker function that accepts a batch of outbound messages.
pub const RECORD_BATCH_FN: &str = "RecordIBTPs";

/// What a message asks of its destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    /// Mirror a registry change.
    Propagate,
}

impl MessageKind {
    /// Wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            MessageKind::Propagate => "propagate",
        }
    }

    /// Parse a wire name.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "propagate" => Some(MessageKind::Propagate),
            _ => None,
        }
    }
}

/// The call a message asks the destination registry to make.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload {
    pub source_contract: String,
    pub dest_contract: String,
    pub function: String,
    pub args: Vec<Bytes>,
}

impl Payload {
    /// A `Synchronize(from, record)` call.
    pub fn synchronize(contract: &str, from: &Did, record: &IdentifierRecord) -> Self {
        Self {
            source_contract: contract.to_string(),
            dest_contract: contract.to_string(),
            function: SYNCHRONIZE_FN.to_string(),
            args: vec![
                Bytes::copy_from_slice(from.as_str().as_bytes()),
                Bytes::from(record_bytes(record)),
            ],
        }
    }

    /// Read the arguments of a `Synchronize` call.
    pub fn synchronize_args(&self) -> Result<(Did, IdentifierRecord)> {
        if self.function != SYNCHRONIZE_FN {
            return Err(SyncError::UnexpectedFunction {
                expected: SYNCHRONIZE_FN.to_string(),
                got: self.function.clone(),
            });
        }
        let [from, record] = self.args.as_slice() else {
            return Err(SyncError::ArgumentCount {
                expected: 2,
                got: self.args.len(),
            });
        };
        let from = std::str::from_utf8(from)
            .map_err(|e| SyncError::InvalidMessage(format!("source id is not utf-8: {e}")))?;
        Ok((Did::new(from), decode_record(record)?))
    }

    fn to_value(&self) -> Value {
        Value::Map(vec![
            entry(0, Value::Text(self.source_contract.clone())),
            entry(1, Value::Text(self.dest_contract.clone())),
            entry(2, Value::Text(self.function.clone())),
            entry(
                3,
                Value::Array(self.args.iter().map(|a| Value::Bytes(a.to_vec())).collect()),
            ),
        ])
    }

    fn from_value(value: &Value) -> Result<Self> {
        let Value::Map(map) = value else {
            return Err(SyncError::InvalidMessage("payload is not a map".into()));
        };
        let text = |key: u64, name: &str| -> Result<String> {
            map_get(map, key)
                .and_then(as_text)
                .map(str::to_string)
                .ok_or_else(|| SyncError::InvalidMessage(format!("payload missing {name}")))
        };
        let args = match map_get(map, 3) {
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| match item {
                    Value::Bytes(b) => Ok(Bytes::from(b.clone())),
                    _ => Err(SyncError::InvalidMessage("argument is not bytes".into())),
                })
                .collect::<Result<Vec<_>>>()?,
            _ => return Err(SyncError::InvalidMessage("payload missing args".into())),
        };
        Ok(Self {
            source_contract: text(0, "source contract")?,
            dest_contract: text(1, "dest contract")?,
            function: text(2, "function")?,
            args,
        })
    }
}

/// One cross-registry notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncMessage {
    /// Transport address of the sending registry.
    pub from: String,
    /// Transport address of the receiving registry.
    pub to: String,
    pub kind: MessageKind,
    /// Nanoseconds; strictly increasing per sender.
    pub timestamp: i64,
    /// Opaque proof bytes.
    pub proof: Bytes,
    pub payload: Payload,
}

impl SyncMessage {
    /// Canonical CBOR bytes.
    pub fn encode(&self) -> Vec<u8> {
        encode_canonical(&self.to_value())
    }

    /// Parse from CBOR bytes.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        Self::from_value(&decode_value(bytes)?)
    }

    fn to_value(&self) -> Value {
        Value::Map(vec![
            entry(0, Value::Text(self.from.clone())),
            entry(1, Value::Text(self.to.clone())),
            entry(2, Value::Text(self.kind.as_str().to_string())),
            entry(3, Value::Integer(self.timestamp.into())),
            entry(4, Value::Bytes(self.proof.to_vec())),
            entry(5, self.payload.to_value()),
        ])
    }

    fn from_value(value: &Value) -> Result<Self> {
        let Value::Map(map) = value else {
            return Err(SyncError::InvalidMessage("message is not a map".into()));
        };
        let text = |key: u64, name: &str| -> Result<String> {
            map_get(map, key)
                .and_then(as_text)
                .map(str::to_string)
                .ok_or_else(|| SyncError::InvalidMessage(format!("message missing {name}")))
        };
        let kind_name = text(2, "type")?;
        let kind = MessageKind::parse(&kind_name)
            .ok_or_else(|| SyncError::InvalidMessage(format!("unknown message type {kind_name}")))?;
        let timestamp = map_get(map, 3)
            .and_then(as_i64)
            .ok_or_else(|| SyncError::InvalidMessage("message missing timestamp".into()))?;
        let proof = match map_get(map, 4) {
            Some(Value::Bytes(b)) => Bytes::from(b.clone()),
            _ => return Err(SyncError::InvalidMessage("message missing proof".into())),
        };
        let payload = map_get(map, 5)
            .ok_or_else(|| SyncError::InvalidMessage("message missing payload".into()))
            .and_then(Payload::from_value)?;
        Ok(Self {
            from: text(0, "from")?,
            to: text(1, "to")?,
            kind,
            timestamp,
            proof,
            payload,
        })
    }
}

/// The messages of one registry change, delivered in a single relay call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageBatch {
    pub messages: Vec<SyncMessage>,
}

impl MessageBatch {
    pub fn new(messages: Vec<SyncMessage>) -> Self {
        Self { messages }
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SyncMessage> {
        self.messages.iter()
    }

    /// Destination addresses, in message order.
    pub fn destinations(&self) -> Vec<&str> {
        self.messages.iter().map(|m| m.to.as_str()).collect()
    }

    /// Canonical CBOR bytes.
    pub fn encode(&self) -> Vec<u8> {
        encode_canonical(&Value::Map(vec![
            entry(0, Value::Integer(PROTOCOL_VERSION.into())),
            entry(
                1,
                Value::Array(self.messages.iter().map(SyncMessage::to_value).collect()),
            ),
        ]))
    }

    /// Parse from CBOR bytes.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let value = decode_value(bytes)?;
        let Value::Map(map) = &value else {
            return Err(SyncError::InvalidMessage("batch is not a map".into()));
        };
        let version = map_get(map, 0).and_then(as_i64);
        if version != Some(i64::from(PROTOCOL_VERSION)) {
            return Err(SyncError::InvalidMessage(format!(
                "unsupported batch version {version:?}"
            )));
        }
        let messages = match map_get(map, 1) {
            Some(Value::Array(items)) => items
                .iter()
                .map(SyncMessage::from_value)
                .collect::<Result<Vec<_>>>()?,
            _ => return Err(SyncError::InvalidMessage("batch missing messages".into())),
        };
        Ok(Self { messages })
    }
}

impl IntoIterator for MessageBatch {
    type Item = SyncMessage;
    type IntoIter = std::vec::IntoIter<SyncMessage>;

    fn into_iter(self) -> Self::IntoIter {
        self.messages.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use didhub_core::DocAnchor;

    fn record() -> IdentifierRecord {
        IdentifierRecord::registered(
            Did::new("did:bitxhub:app:."),
            Did::new("did:bitxhub:relayroot:0xalice"),
            DocAnchor::new("ipfs://x", vec![0xde, 0xad]).unwrap(),
        )
    }

    fn message(to: &str, timestamp: i64) -> SyncMessage {
        SyncMessage {
            from: "relay-chain".to_string(),
            to: to.to_string(),
            kind: MessageKind::Propagate,
            timestamp,
            proof: Bytes::from_static(b"1"),
            payload: Payload::synchronize("method-registry", &Did::relay_root(), &record()),
        }
    }

    #[test]
    fn test_synchronize_args() {
        let payload = Payload::synchronize("method-registry", &Did::relay_root(), &record());
        let (from, decoded) = payload.synchronize_args().unwrap();
        assert_eq!(from, Did::relay_root());
        assert_eq!(decoded, record());
    }

    #[test]
    fn test_synchronize_args_rejects_wrong_call() {
        let mut payload = Payload::synchronize("method-registry", &Did::relay_root(), &record());
        payload.function = "Register".to_string();
        assert!(matches!(
            payload.synchronize_args(),
            Err(SyncError::UnexpectedFunction { .. })
        ));

        let mut payload = Payload::synchronize("method-registry", &Did::relay_root(), &record());
        payload.args.pop();
        assert!(matches!(
            payload.synchronize_args(),
            Err(SyncError::ArgumentCount { expected: 2, got: 1 })
        ));

        let mut payload = Payload::synchronize("method-registry", &Did::relay_root(), &record());
        payload.args[1] = Bytes::from_static(b"junk");
        assert!(matches!(payload.synchronize_args(), Err(SyncError::Decode(_))));
    }

    #[test]
    fn test_batch_decode() {
        let batch = MessageBatch::new(vec![message("chain-a", 10), message("chain-b", 11)]);
        let decoded = MessageBatch::decode(&batch.encode()).unwrap();
        assert_eq!(decoded, batch);
        assert_eq!(decoded.destinations(), vec!["chain-a", "chain-b"]);
    }

    #[test]
    fn test_message_decode_rejects_unknown_type() {
        let mut value = message("chain-a", 1).to_value();
        if let Value::Map(entries) = &mut value {
            entries[2].1 = Value::Text("interchain".into());
        }
        assert!(SyncMessage::decode(&encode_canonical(&value)).is_err());
    }

    #[test]
    fn test_kind_serde_name() {
        assert_eq!(
            serde_json::to_string(&MessageKind::Propagate).unwrap(),
            "\"propagate\""
        );
    }
}
