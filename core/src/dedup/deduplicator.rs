//! Deduplication decision engine
//!
//! Layered lookup: the in-flight tracker first, the durable store second.
//! The tracker catches redeliveries that arrive while the first attempt's
//! transaction is still open; the store catches everything that committed,
//! including across restarts.
//!
//! # Lifecycle
//!
//! 1. `is_duplicate` -> false
//! 2. `signal_process_start` (key is now in flight)
//! 3. side effects + `persist` inside the caller's transaction
//! 4. caller commits
//! 5. `signal_process_finish` (key leaves the tracker, enters the cache)
//!
//! If the transaction aborts, step 5 never happens and the key stays in
//! flight until the process restarts.

use rusqlite::{Connection, Transaction};
use tracing::{debug, trace};

use crate::data::current_timestamp;

use super::error::DedupError;
use super::ids::{DeduplicationKey, SessionId, ShardId};
use super::in_flight::InFlightTracker;
use super::message::ReceivedMessage;
use super::meta::MessageMeta;
use super::sender::SenderDedupInfo;
use super::store::DurableDedupStore;

/// Result of a session-end signal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEndOutcome {
    /// Sender instance id or sequence number missing, nothing to record
    MissingSenderInfo,
    /// No session-end marker was ever recorded for the session
    NoMarker,
    /// The marker's last sequence number was overwritten
    Updated,
    /// The marker was found but the UPDATE affected no row
    Unchanged,
}

impl std::fmt::Display for SessionEndOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionEndOutcome::MissingSenderInfo => write!(f, "missing sender info"),
            SessionEndOutcome::NoMarker => write!(f, "no marker"),
            SessionEndOutcome::Updated => write!(f, "updated"),
            SessionEndOutcome::Unchanged => write!(f, "unchanged"),
        }
    }
}

/// Exactly-once filter for inbound messages
#[derive(Debug)]
pub struct MessageDeduplicator {
    in_flight: InFlightTracker,
    store: DurableDedupStore,
}

impl MessageDeduplicator {
    /// Create a deduplicator whose store caches up to `cache_capacity` entries
    pub fn new(cache_capacity: usize) -> Self {
        Self {
            in_flight: InFlightTracker::new(),
            store: DurableDedupStore::new(cache_capacity),
        }
    }

    /// Whether this message was already accepted (in flight or recorded)
    pub fn is_duplicate<M: ReceivedMessage + ?Sized>(
        &self,
        conn: &Connection,
        message: &M,
    ) -> Result<bool, DedupError> {
        let key = message.dedup_key();

        if self.in_flight.contains(key) {
            trace!(key = %key, result = "InFlight", "DEDUP: duplicate");
            return Ok(true);
        }

        let recorded = self.store.contains(conn, key)?;
        trace!(
            key = %key,
            result = if recorded { "Recorded" } else { "New" },
            "DEDUP: checked durable store"
        );
        Ok(recorded)
    }

    /// Mark the message as being processed
    ///
    /// Call once per delivery attempt judged new, before any side effect.
    pub fn signal_process_start<M: ReceivedMessage + ?Sized>(&self, message: &M) -> MessageMeta {
        let sender = message
            .sender_info()
            .scope(message.peer(), message.is_session_init());
        let meta = MessageMeta::new(current_timestamp(), sender);
        self.in_flight.start(message.dedup_key().clone(), meta.clone());
        meta
    }

    /// Write the in-flight metadata for `key` into the caller's transaction
    ///
    /// Fails with `NotInFlight` (writing nothing) if `signal_process_start`
    /// was never called for the key.
    pub fn persist(&self, tx: &Transaction<'_>, key: &DeduplicationKey) -> Result<(), DedupError> {
        let meta = self
            .in_flight
            .get(key)
            .ok_or_else(|| DedupError::NotInFlight(key.clone()))?;
        self.store.put(tx, key, &meta)
    }

    /// Drop the key from the tracker once its transaction has committed
    ///
    /// Never call this after an abort.
    pub fn signal_process_finish(&self, key: &DeduplicationKey) {
        match self.in_flight.finish(key) {
            Some(_) => self.store.admit(key.clone()),
            None => trace!(key = %key, "DEDUP: finish for key not in flight"),
        }
    }

    /// Record the final sequence number reported for a session
    ///
    /// Overwrites `last_sequence_number` on the session-end marker row with a
    /// single conditional UPDATE. Last writer wins. A missing marker is a no-op.
    pub fn signal_session_end(
        &self,
        tx: &Transaction<'_>,
        session_id: SessionId,
        shard_id: &ShardId,
        sender: &SenderDedupInfo,
    ) -> Result<SessionEndOutcome, DedupError> {
        let Some((_, last_sequence_number)) = sender.pair() else {
            return Ok(SessionEndOutcome::MissingSenderInfo);
        };

        let marker = DeduplicationKey::session_end_marker(session_id, shard_id);
        let Some(existing) = self.store.get(tx, &marker)? else {
            debug!(session = %session_id, shard = %shard_id, "DEDUP: no session-end marker");
            return Ok(SessionEndOutcome::NoMarker);
        };

        let updated = existing.with_last_sequence_number(Some(last_sequence_number));
        if self.store.update(tx, &marker, &updated)? {
            Ok(SessionEndOutcome::Updated)
        } else {
            Ok(SessionEndOutcome::Unchanged)
        }
    }

    /// Durable metadata for a key (joins or opens a read transaction)
    pub fn lookup(
        &self,
        conn: &Connection,
        key: &DeduplicationKey,
    ) -> Result<Option<MessageMeta>, DedupError> {
        self.store.get(conn, key)
    }

    pub fn is_in_flight(&self, key: &DeduplicationKey) -> bool {
        self.in_flight.contains(key)
    }

    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    pub fn in_flight_keys(&self) -> Vec<DeduplicationKey> {
        self.in_flight.keys()
    }

    pub fn cached_count(&self) -> usize {
        self.store.cached_len()
    }
}
