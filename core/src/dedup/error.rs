//! Deduplication errors

use super::ids::DeduplicationKey;

/// Errors raised by the deduplication core
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DedupError {
    /// The backing store failed (not masked, the caller decides whether to retry)
    Database(String),
    /// A deduplication key failed validation
    InvalidKey(String),
    /// A message identifier or one of its parts failed validation
    InvalidIdentifier(String),
    /// `persist` was called for a key that never went through `signal_process_start`
    NotInFlight(DeduplicationKey),
    /// The key already has a durable record
    AlreadyRecorded(DeduplicationKey),
}

impl std::fmt::Display for DedupError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DedupError::Database(e) => write!(f, "database error: {}", e),
            DedupError::InvalidKey(e) => write!(f, "invalid deduplication key: {}", e),
            DedupError::InvalidIdentifier(e) => write!(f, "invalid message identifier: {}", e),
            DedupError::NotInFlight(key) => {
                write!(f, "message {} was never marked as in flight", key)
            }
            DedupError::AlreadyRecorded(key) => {
                write!(f, "message {} is already durably recorded", key)
            }
        }
    }
}

impl std::error::Error for DedupError {}

impl From<rusqlite::Error> for DedupError {
    fn from(e: rusqlite::Error) -> Self {
        DedupError::Database(e.to_string())
    }
}
