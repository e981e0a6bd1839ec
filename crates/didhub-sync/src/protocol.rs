//! Outbound fan-out and inbound decoding.
//!
//! On Register a registry builds one [`SyncMessage`] per child. Source and
//! destination identifiers are translated to transport addresses through the
//! registry's converter map; an identifier with no entry is addressed by its
//! raw string. Timestamps come from a [`MonotonicClock`] so that messages from
//! one registry never go backwards.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use didhub_core::{decode_record, Did, IdentifierRecord};

use crate::error::{Result, SyncError};
use crate::messages::{MessageBatch, MessageKind, Payload, SyncMessage};

/// Configuration for outbound synchronization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Bytes placed in every message's `proof` field.
    pub proof_placeholder: Vec<u8>,
    /// Maximum number of children one batch may address.
    pub max_children: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            proof_placeholder: b"1".to_vec(),
            max_children: 256,
        }
    }
}

/// Nanosecond clock that never returns the same value twice.
#[derive(Debug, Default)]
pub struct MonotonicClock {
    last: AtomicI64,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wall-clock nanoseconds, bumped past the previous reading if needed.
    pub fn next(&self) -> i64 {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| i64::try_from(d.as_nanos()).unwrap_or(i64::MAX))
            .unwrap_or(0);
        let mut last = self.last.load(Ordering::SeqCst);
        loop {
            let next = now.max(last.saturating_add(1));
            match self
                .last
                .compare_exchange(last, next, Ordering::SeqCst, Ordering::SeqCst)
            {
                Ok(_) => return next,
                Err(actual) => last = actual,
            }
        }
    }

    /// The last value handed out.
    pub fn last(&self) -> i64 {
        self.last.load(Ordering::SeqCst)
    }
}

/// Where a change comes from and where it must go.
#[derive(Debug, Clone, Copy)]
pub struct Route<'a> {
    /// Identifier of the sending registry.
    pub self_id: &'a Did,
    /// Child registries to notify.
    pub children: &'a [Did],
    /// Identifier to transport address.
    pub converter: &'a BTreeMap<Did, String>,
    /// Registry contract on both ends.
    pub contract: &'a str,
}

impl Route<'_> {
    /// Transport address for an identifier.
    pub fn address_of(&self, did: &Did) -> String {
        transport_address(self.converter, did)
    }
}

/// Look up a transport address, falling back to the raw identifier.
pub fn transport_address(converter: &BTreeMap<Did, String>, did: &Did) -> String {
    match converter.get(did) {
        Some(address) => address.clone(),
        None => {
            tracing::warn!(id = %did, "no converter entry, addressing by identifier");
            did.as_str().to_string()
        }
    }
}

/// Builds outbound batches.
#[derive(Debug, Default)]
pub struct Propagator {
    config: SyncConfig,
    clock: MonotonicClock,
}

impl Propagator {
    pub fn new(config: SyncConfig) -> Self {
        Self {
            config,
            clock: MonotonicClock::new(),
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// One message per distinct child, in child order.
    pub fn build(&self, route: &Route<'_>, record: &IdentifierRecord) -> Result<MessageBatch> {
        let mut seen = BTreeSet::new();
        let children: Vec<&Did> = route
            .children
            .iter()
            .filter(|child| seen.insert(*child))
            .collect();
        if children.len() > self.config.max_children {
            return Err(SyncError::TooManyChildren {
                count: children.len(),
                max: self.config.max_children,
            });
        }

        let from = route.address_of(route.self_id);
        let payload = Payload::synchronize(route.contract, route.self_id, record);
        let proof = Bytes::from(self.config.proof_placeholder.clone());

        let messages = children
            .into_iter()
            .map(|child| SyncMessage {
                from: from.clone(),
                to: route.address_of(child),
                kind: MessageKind::Propagate,
                timestamp: self.clock.next(),
                proof: proof.clone(),
                payload: payload.clone(),
            })
            .collect();
        Ok(MessageBatch::new(messages))
    }
}

/// Read the `(from, record)` pair carried by an inbound message.
pub fn decode_inbound(message: &SyncMessage) -> Result<(Did, IdentifierRecord)> {
    if message.kind != MessageKind::Propagate {
        return Err(SyncError::InvalidMessage(format!(
            "unexpected message type {}",
            message.kind.as_str()
        )));
    }
    message.payload.synchronize_args()
}

/// Read raw `Synchronize` arguments.
pub fn decode_synchronize_args(from: &str, record: &[u8]) -> Result<(Did, IdentifierRecord)> {
    Ok((Did::new(from), decode_record(record)?))
}
