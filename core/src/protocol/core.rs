//! Deduplication service
//!
//! Long-lived owner of the database connection and the deduplicator (and
//! through it, the in-flight tracker). Construct one per node process with
//! `start`, hand it to the delivery path, and `close` it on shutdown.
//!
//! Messages already in flight are answered from the tracker without touching
//! the connection. Everything else locks the shared connection; handlers
//! passed to `deliver` run while the lock is held and must not block on it.

use std::sync::Arc;

use rusqlite::{Connection, Transaction, TransactionBehavior};
use tokio::sync::Mutex;
use tracing::{debug, info, trace, warn};

use crate::data::{count_processed_messages, count_processed_with_prefix, start_db, start_memory_db};
use crate::dedup::{
    DeduplicationKey, MessageDeduplicator, MessageMeta, MessageType, ReceivedMessage,
    SenderDedupInfo, SessionEndOutcome, SessionId, ShardId,
};

use super::config::DedupConfig;
use super::error::ProtocolError;
use super::stats::DedupStats;

/// Result of handing a delivery to the service
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery<T> {
    /// First delivery: the handler ran and its transaction committed
    Processed(T),
    /// Already accepted earlier (in flight or recorded), handler not run
    Duplicate,
}

impl<T> Delivery<T> {
    pub fn is_duplicate(&self) -> bool {
        matches!(self, Delivery::Duplicate)
    }

    pub fn processed(self) -> Option<T> {
        match self {
            Delivery::Processed(value) => Some(value),
            Delivery::Duplicate => None,
        }
    }
}

/// Exactly-once delivery on top of an at-least-once transport
pub struct DedupService {
    /// Configuration
    config: DedupConfig,
    /// Database connection (wrapped for thread safety)
    db: Arc<Mutex<Connection>>,
    /// Two-tier duplicate detection
    dedup: Arc<MessageDeduplicator>,
}

impl DedupService {
    /// Open the database described by `config` and build the service
    pub fn start(config: DedupConfig) -> Result<Self, ProtocolError> {
        let conn = if config.in_memory {
            let conn = start_memory_db().map_err(|e| ProtocolError::StartFailed(e.to_string()))?;
            info!(
                cache_capacity = config.cache_capacity,
                "Deduplication service started (in-memory)"
            );
            conn
        } else {
            let db_path = config.db_path_or_default();
            let conn = start_db(&db_path.to_string_lossy())?;
            info!(
                db_path = %db_path.display(),
                cache_capacity = config.cache_capacity,
                "Deduplication service started"
            );
            conn
        };

        Ok(Self::with_connection(conn, config))
    }

    /// Build the service around an already opened connection
    pub fn with_connection(conn: Connection, config: DedupConfig) -> Self {
        let dedup = Arc::new(MessageDeduplicator::new(config.cache_capacity));
        Self {
            config,
            db: Arc::new(Mutex::new(conn)),
            dedup,
        }
    }

    pub fn config(&self) -> &DedupConfig {
        &self.config
    }

    /// Shared database connection
    pub fn db(&self) -> &Arc<Mutex<Connection>> {
        &self.db
    }

    pub fn deduplicator(&self) -> &Arc<MessageDeduplicator> {
        &self.dedup
    }

    /// Whether the message was already accepted
    pub async fn is_duplicate<M>(&self, message: &M) -> Result<bool, ProtocolError>
    where
        M: ReceivedMessage + ?Sized,
    {
        if self.dedup.is_in_flight(message.dedup_key()) {
            return Ok(true);
        }
        let conn = self.db.lock().await;
        Ok(self.dedup.is_duplicate(&conn, message)?)
    }

    /// Run `handler` exactly once per message
    ///
    /// Duplicate check, then `signal_process_start`, then `handler` and
    /// `persist` inside one transaction, then commit and
    /// `signal_process_finish`. If the handler or the commit fails the
    /// transaction rolls back and the key stays in flight, so redeliveries in
    /// this process are still reported as duplicates.
    pub async fn deliver<M, T, E, F>(&self, message: &M, handler: F) -> Result<Delivery<T>, E>
    where
        M: ReceivedMessage + ?Sized,
        F: FnOnce(&Transaction<'_>) -> Result<T, E>,
        E: From<ProtocolError>,
    {
        let key = message.dedup_key();
        if self.dedup.is_in_flight(key) {
            trace!(key = %key, "skipping delivery already in flight");
            return Ok(Delivery::Duplicate);
        }

        let mut conn = self.db.lock().await;

        if self
            .dedup
            .is_duplicate(&conn, message)
            .map_err(ProtocolError::from)?
        {
            trace!(key = %key, "skipping duplicate delivery");
            return Ok(Delivery::Duplicate);
        }

        self.dedup.signal_process_start(message);

        let tx = conn.transaction().map_err(ProtocolError::from)?;
        let value = match handler(&tx) {
            Ok(value) => value,
            Err(e) => {
                warn!(key = %key, "delivery handler failed, message left in flight");
                return Err(e);
            }
        };
        self.dedup.persist(&tx, key).map_err(ProtocolError::from)?;
        tx.commit().map_err(ProtocolError::from)?;

        self.dedup.signal_process_finish(key);
        debug!(key = %key, "delivery committed");
        Ok(Delivery::Processed(value))
    }

    /// Record the final sequence number a peer reported for a session
    pub async fn end_session(
        &self,
        session_id: SessionId,
        shard_id: &ShardId,
        sender: &SenderDedupInfo,
    ) -> Result<SessionEndOutcome, ProtocolError> {
        let mut conn = self.db.lock().await;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let outcome = self
            .dedup
            .signal_session_end(&tx, session_id, shard_id, sender)?;
        tx.commit()?;

        debug!(session = %session_id, shard = %shard_id, outcome = %outcome, "session end");
        Ok(outcome)
    }

    /// Durable metadata for a key
    pub async fn lookup(&self, key: &DeduplicationKey) -> Result<Option<MessageMeta>, ProtocolError> {
        let conn = self.db.lock().await;
        Ok(self.dedup.lookup(&conn, key)?)
    }

    /// Current counts
    pub async fn stats(&self) -> Result<DedupStats, ProtocolError> {
        let conn = self.db.lock().await;
        let marker_prefix = format!("{}-", MessageType::SessionEnd.tag());

        Ok(DedupStats {
            processed_messages: count_processed_messages(&conn)?,
            session_end_markers: count_processed_with_prefix(&conn, &marker_prefix)?,
            in_flight: self.dedup.in_flight_count(),
            cached: self.dedup.cached_count(),
        })
    }

    /// Shut down, returning how many messages were still in flight
    ///
    /// Those messages were never durably recorded and will be treated as new
    /// when redelivered to the next process.
    pub fn close(self) -> usize {
        let abandoned = self.dedup.in_flight_keys();
        for key in &abandoned {
            warn!(key = %key, "in-flight message abandoned at shutdown");
        }
        info!(abandoned = abandoned.len(), "Deduplication service stopped");
        abandoned.len()
    }
}
