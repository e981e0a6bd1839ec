//! Relay abstraction for outbound sync batches.
//!
//! A registry never talks to its children directly. It hands each batch to
//! a relay broker, which records the messages for delivery. Implementations
//! may wrap a cross-chain broker contract, a queue, or anything else.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::messages::MessageBatch;

/// Hands outbound batches to a relay broker.
///
/// Implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait Relay: Send + Sync {
    /// Record one batch with `broker`. Delivery of the batch is all or nothing.
    async fn record_messages(&self, broker: &str, batch: &MessageBatch) -> Result<()>;
}

#[async_trait]
impl<R: Relay + ?Sized> Relay for Arc<R> {
    async fn record_messages(&self, broker: &str, batch: &MessageBatch) -> Result<()> {
        (**self).record_messages(broker, batch).await
    }
}

/// A relay that drops every batch.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullRelay;

#[async_trait]
impl Relay for NullRelay {
    async fn record_messages(&self, broker: &str, batch: &MessageBatch) -> Result<()> {
        tracing::trace!(broker, count = batch.len(), "dropping sync batch");
        Ok(())
    }
}

/// An in-memory relay for testing.
pub mod memory {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tokio::sync::Mutex;

    use crate::error::SyncError;
    use crate::messages::SyncMessage;

    /// Records every batch it is handed, or fails on demand.
    #[derive(Debug, Default)]
    pub struct MemoryRelay {
        outbox: Mutex<Vec<(String, MessageBatch)>>,
        failing: AtomicBool,
    }

    impl MemoryRelay {
        /// Create an empty relay.
        pub fn new() -> Arc<Self> {
            Arc::new(Self::default())
        }

        /// Make subsequent deliveries fail (or succeed again).
        pub fn set_failing(&self, failing: bool) {
            self.failing.store(failing, Ordering::SeqCst);
        }

        /// Number of batches recorded so far.
        pub async fn delivered(&self) -> usize {
            self.outbox.lock().await.len()
        }

        /// Drain all recorded batches with their broker names.
        pub async fn take(&self) -> Vec<(String, MessageBatch)> {
            std::mem::take(&mut *self.outbox.lock().await)
        }

        /// Recorded messages addressed to `to`, oldest first.
        pub async fn messages_for(&self, to: &str) -> Vec<SyncMessage> {
            self.outbox
                .lock()
                .await
                .iter()
                .flat_map(|(_, batch)| batch.iter())
                .filter(|m| m.to == to)
                .cloned()
                .collect()
        }
    }

    #[async_trait]
    impl Relay for MemoryRelay {
        async fn record_messages(&self, broker: &str, batch: &MessageBatch) -> Result<()> {
            if self.failing.load(Ordering::SeqCst) {
                return Err(SyncError::Relay {
                    broker: broker.to_string(),
                    reason: "relay unavailable".to_string(),
                });
            }
            self.outbox
                .lock()
                .await
                .push((broker.to_string(), batch.clone()));
            Ok(())
        }
    }
}
