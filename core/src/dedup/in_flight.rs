//! In-flight message tracker
//!
//! Holds messages between "processing started" and "durably committed".
//! Process-local: the contents are lost on restart, which is fine because a
//! committed message is always found in the durable store.

use dashmap::DashMap;
use tracing::trace;

use super::ids::DeduplicationKey;
use super::meta::MessageMeta;

/// Concurrent map of messages currently being processed
#[derive(Debug, Default)]
pub struct InFlightTracker {
    entries: DashMap<DeduplicationKey, MessageMeta>,
}

impl InFlightTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a message as being processed (overwrites an earlier attempt)
    pub fn start(&self, key: DeduplicationKey, meta: MessageMeta) {
        trace!(key = %key, "DEDUP: in flight");
        self.entries.insert(key, meta);
    }

    pub fn contains(&self, key: &DeduplicationKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn get(&self, key: &DeduplicationKey) -> Option<MessageMeta> {
        self.entries.get(key).map(|entry| entry.value().clone())
    }

    /// Drop a message once its durable record has committed
    pub fn finish(&self, key: &DeduplicationKey) -> Option<MessageMeta> {
        self.entries.remove(key).map(|(_, meta)| meta)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Keys currently in flight
    pub fn keys(&self) -> Vec<DeduplicationKey> {
        self.entries.iter().map(|entry| entry.key().clone()).collect()
    }
}
