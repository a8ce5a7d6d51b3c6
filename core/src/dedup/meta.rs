//! Message metadata attached to a deduplication key

use super::sender::SenderScope;

/// Schema version tag written with every new record
pub const META_VERSION: i32 = 1;

/// Metadata for a processed (or in-flight) message
///
/// `sender_scope` and `sequence_number` are either both set or both absent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageMeta {
    /// When the entry was first recorded (Unix seconds)
    pub insertion_time: i64,
    sender: Option<(SenderScope, i64)>,
    /// Final sequence number of a session (session-end markers only)
    pub last_sequence_number: Option<i64>,
    /// Schema version of the stored row
    pub version: i32,
}

impl MessageMeta {
    pub fn new(insertion_time: i64, sender: Option<(SenderScope, i64)>) -> Self {
        Self {
            insertion_time,
            sender,
            last_sequence_number: None,
            version: META_VERSION,
        }
    }

    /// Copy of this metadata with a new session high-water mark
    pub fn with_last_sequence_number(mut self, last: Option<i64>) -> Self {
        self.last_sequence_number = last;
        self
    }

    pub(crate) fn with_version(mut self, version: i32) -> Self {
        self.version = version;
        self
    }

    pub fn sender_scope(&self) -> Option<&SenderScope> {
        self.sender.as_ref().map(|(scope, _)| scope)
    }

    pub fn sequence_number(&self) -> Option<i64> {
        self.sender.as_ref().map(|(_, seq)| *seq)
    }
}
