//! Durable deduplication store
//!
//! Append-only map from deduplication key to message metadata, persisted as
//! `processed_messages` rows with a read-through cache in front.
//!
//! # Cache
//!
//! The cache holds keys, not metadata. Rows never disappear, so "this key is
//! recorded" stays true forever once it was committed, while
//! `last_sequence_number` can change under `update` from any connection.
//! `contains` is answered from the cache when possible; `get` always reads the
//! row.
//!
//! Only committed keys get in:
//! - reads that run in a transaction the store opened itself are admitted
//! - reads that join a caller's open transaction are not (that transaction
//!   may still abort)
//! - writes are admitted by `admit` once the caller has confirmed the commit
//!
//! `update` never touches the cache.

use dashmap::DashSet;
use rusqlite::{Connection, Transaction};
use tracing::{debug, trace};

use crate::data::{
    get_processed_message, insert_processed_message, update_last_sequence_number,
    ProcessedMessageRow,
};

use super::error::DedupError;
use super::ids::DeduplicationKey;
use super::meta::MessageMeta;
use super::sender::SenderScope;

impl ProcessedMessageRow {
    /// Row for a key and its metadata
    pub fn from_entry(key: &DeduplicationKey, meta: &MessageMeta) -> Self {
        Self {
            message_id: key.as_str().to_string(),
            insertion_time: meta.insertion_time,
            sender: meta.sender_scope().map(|s| s.as_str().to_string()),
            sequence_number: meta.sequence_number(),
            last_sequence_number: meta.last_sequence_number,
            version: meta.version,
        }
    }

    /// Key and metadata for a stored row
    ///
    /// A half-populated sender pair (legacy or hand-edited rows) reads back as
    /// "no sender-scope information".
    pub fn into_entry(self) -> Result<(DeduplicationKey, MessageMeta), DedupError> {
        let key = DeduplicationKey::new(self.message_id)?;
        let sender = match (self.sender, self.sequence_number) {
            (Some(scope), Some(seq)) => Some((SenderScope::from_stored(scope), seq)),
            _ => None,
        };
        let meta = MessageMeta::new(self.insertion_time, sender)
            .with_last_sequence_number(self.last_sequence_number)
            .with_version(self.version);
        Ok((key, meta))
    }
}

fn is_duplicate_key(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(err, _)
            if err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
    )
}

/// Read-cached, append-only store of processed messages
#[derive(Debug)]
pub struct DurableDedupStore {
    cache: DashSet<DeduplicationKey>,
    /// New entries are not admitted once the cache holds this many
    capacity: usize,
}

impl DurableDedupStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            cache: DashSet::new(),
            capacity,
        }
    }

    /// Whether the key has a durable record
    ///
    /// Opens a read transaction if `conn` has none, otherwise joins it.
    pub fn contains(&self, conn: &Connection, key: &DeduplicationKey) -> Result<bool, DedupError> {
        if self.cache.contains(key) {
            trace!(key = %key, "DEDUP: cache hit");
            return Ok(true);
        }
        Ok(self.get(conn, key)?.is_some())
    }

    /// Metadata of the durable record for `key`
    ///
    /// Always reads the row. Opens a read transaction if `conn` has none,
    /// otherwise joins it.
    pub fn get(
        &self,
        conn: &Connection,
        key: &DeduplicationKey,
    ) -> Result<Option<MessageMeta>, DedupError> {
        if !conn.is_autocommit() {
            return self.load(conn, key);
        }

        let tx = conn.unchecked_transaction()?;
        let found = self.load(&tx, key)?;
        tx.commit()?;

        if found.is_some() {
            self.admit(key.clone());
        }
        Ok(found)
    }

    fn load(
        &self,
        conn: &Connection,
        key: &DeduplicationKey,
    ) -> Result<Option<MessageMeta>, DedupError> {
        match get_processed_message(conn, key.as_str())? {
            Some(row) => Ok(Some(row.into_entry()?.1)),
            None => Ok(None),
        }
    }

    /// Insert the durable record for a new key
    ///
    /// A key that is already recorded is a hard failure (`AlreadyRecorded`).
    /// The entry is not cached until the caller confirms the commit.
    pub fn put(
        &self,
        tx: &Transaction<'_>,
        key: &DeduplicationKey,
        meta: &MessageMeta,
    ) -> Result<(), DedupError> {
        let row = ProcessedMessageRow::from_entry(key, meta);
        match insert_processed_message(tx, &row) {
            Ok(()) => {
                debug!(
                    key = %key,
                    sequence_number = ?meta.sequence_number(),
                    "DEDUP: recorded processed message"
                );
                Ok(())
            }
            Err(e) if is_duplicate_key(&e) => Err(DedupError::AlreadyRecorded(key.clone())),
            Err(e) => Err(e.into()),
        }
    }

    /// Overwrite `last_sequence_number` with one conditional UPDATE
    ///
    /// Only that column changes. Returns whether a row was affected.
    pub fn update(
        &self,
        tx: &Transaction<'_>,
        key: &DeduplicationKey,
        meta: &MessageMeta,
    ) -> Result<bool, DedupError> {
        let updated = update_last_sequence_number(tx, key.as_str(), meta.last_sequence_number)?;
        debug!(
            key = %key,
            last_sequence_number = ?meta.last_sequence_number,
            updated,
            "DEDUP: session high-water mark"
        );
        Ok(updated)
    }

    /// Cache a committed key
    pub fn admit(&self, key: DeduplicationKey) {
        if self.capacity == 0 {
            return;
        }
        if self.cache.len() >= self.capacity && !self.cache.contains(&key) {
            trace!(key = %key, capacity = self.capacity, "DEDUP: cache full, not admitted");
            return;
        }
        self.cache.insert(key);
    }

    pub fn cached_len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_cached(&self, key: &DeduplicationKey) -> bool {
        self.cache.contains(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::start_memory_db;
    use crate::dedup::sender::sender_scope_hash;

    fn key(s: &str) -> DeduplicationKey {
        DeduplicationKey::new(s).unwrap()
    }

    fn put_committed(store: &DurableDedupStore, conn: &mut Connection, k: &str, meta: &MessageMeta) {
        let tx = conn.transaction().unwrap();
        store.put(&tx, &key(k), meta).unwrap();
        tx.commit().unwrap();
    }

    // ===== conversion tests =====

    #[test]
    fn test_row_conversion_keeps_sender_pair() {
        let scope = sender_scope_hash("u1", &[1u8; 32], false);
        let meta = MessageMeta::new(5, Some((scope, 3))).with_last_sequence_number(Some(9));

        let row = ProcessedMessageRow::from_entry(&key("K1"), &meta);
        assert_eq!(row.message_id, "K1");
        assert_eq!(row.sequence_number, Some(3));
        assert_eq!(row.sender.as_deref().map(str::len), Some(64));

        let (k, back) = row.into_entry().unwrap();
        assert_eq!(k, key("K1"));
        assert_eq!(back, meta);
    }

    #[test]
    fn test_half_populated_row_reads_as_no_sender() {
        let row = ProcessedMessageRow {
            message_id: "K1".to_string(),
            insertion_time: 1,
            sender: Some("abc".to_string()),
            sequence_number: None,
            last_sequence_number: None,
            version: 1,
        };
        let (_, meta) = row.into_entry().unwrap();
        assert!(meta.sender_scope().is_none());
        assert!(meta.sequence_number().is_none());
    }

    #[test]
    fn test_row_with_invalid_key_is_rejected() {
        let row = ProcessedMessageRow {
            message_id: String::new(),
            insertion_time: 1,
            sender: None,
            sequence_number: None,
            last_sequence_number: None,
            version: 1,
        };
        assert!(matches!(row.into_entry(), Err(DedupError::InvalidKey(_))));
    }

    // ===== store tests =====

    #[test]
    fn test_contains_after_commit() {
        let mut conn = start_memory_db().unwrap();
        let store = DurableDedupStore::new(16);

        assert!(!store.contains(&conn, &key("K1")).unwrap());
        put_committed(&store, &mut conn, "K1", &MessageMeta::new(1, None));
        assert!(store.contains(&conn, &key("K1")).unwrap());
    }

    #[test]
    fn test_read_through_populates_cache() {
        let mut conn = start_memory_db().unwrap();
        let store = DurableDedupStore::new(16);
        put_committed(&store, &mut conn, "K1", &MessageMeta::new(1, None));

        // put alone never caches
        assert!(!store.is_cached(&key("K1")));

        assert!(store.get(&conn, &key("K1")).unwrap().is_some());
        assert!(store.is_cached(&key("K1")));

        // contains is served from cache even after the row is gone underneath,
        // get still goes to the row
        conn.execute("DELETE FROM processed_messages", []).unwrap();
        assert!(store.contains(&conn, &key("K1")).unwrap());
        assert!(store.get(&conn, &key("K1")).unwrap().is_none());
    }

    #[test]
    fn test_misses_are_not_cached() {
        let conn = start_memory_db().unwrap();
        let store = DurableDedupStore::new(16);

        assert!(store.get(&conn, &key("K1")).unwrap().is_none());
        assert_eq!(store.cached_len(), 0);
    }

    #[test]
    fn test_joined_read_does_not_admit() {
        let mut conn = start_memory_db().unwrap();
        let store = DurableDedupStore::new(16);

        let tx = conn.transaction().unwrap();
        store.put(&tx, &key("K1"), &MessageMeta::new(1, None)).unwrap();
        assert!(store.contains(&tx, &key("K1")).unwrap());
        assert!(!store.is_cached(&key("K1")));
        drop(tx); // rollback

        assert!(!store.contains(&conn, &key("K1")).unwrap());
    }

    #[test]
    fn test_put_existing_key_is_hard_failure() {
        let mut conn = start_memory_db().unwrap();
        let store = DurableDedupStore::new(16);
        put_committed(&store, &mut conn, "K1", &MessageMeta::new(1, None));

        let tx = conn.transaction().unwrap();
        let err = store.put(&tx, &key("K1"), &MessageMeta::new(2, None)).unwrap_err();
        assert_eq!(err, DedupError::AlreadyRecorded(key("K1")));
    }

    #[test]
    fn test_update_changes_only_last_sequence_number() {
        let mut conn = start_memory_db().unwrap();
        let store = DurableDedupStore::new(16);
        let scope = sender_scope_hash("u1", &[1u8; 32], false);
        let meta = MessageMeta::new(7, Some((scope, 3)));
        put_committed(&store, &mut conn, "K1", &meta);

        store.get(&conn, &key("K1")).unwrap();
        assert!(store.is_cached(&key("K1")));

        let tx = conn.transaction().unwrap();
        let updated = meta.clone().with_last_sequence_number(Some(42));
        assert!(store.update(&tx, &key("K1"), &updated).unwrap());
        tx.commit().unwrap();
        assert!(store.is_cached(&key("K1")));

        let stored = store.get(&conn, &key("K1")).unwrap().unwrap();
        assert_eq!(stored, updated);
    }

    #[test]
    fn test_update_missing_row_affects_nothing() {
        let mut conn = start_memory_db().unwrap();
        let store = DurableDedupStore::new(16);

        let tx = conn.transaction().unwrap();
        let meta = MessageMeta::new(1, None).with_last_sequence_number(Some(1));
        assert!(!store.update(&tx, &key("missing"), &meta).unwrap());
    }

    #[test]
    fn test_cache_capacity() {
        let store = DurableDedupStore::new(2);
        store.admit(key("A"));
        store.admit(key("B"));
        store.admit(key("C"));

        assert_eq!(store.cached_len(), 2);
        assert!(!store.is_cached(&key("C")));

        // Re-admitting a cached key is fine
        store.admit(key("A"));
        assert_eq!(store.cached_len(), 2);

        let disabled = DurableDedupStore::new(0);
        disabled.admit(key("A"));
        assert_eq!(disabled.cached_len(), 0);
    }
}
