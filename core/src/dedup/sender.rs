//! Sender-scope hashing
//!
//! Per-sender sequence numbers are only meaningful within one sender
//! incarnation talking to one peer. The scope token binds them together:
//!
//! Scope = BLAKE3(domain || len(sender_instance) || sender_instance || peer || is_session_init)

use std::fmt;

use super::ids::PeerId;

const SCOPE_DOMAIN: &[u8] = b"courier-sender-scope-v1";

/// Opaque sender-scope token (64 lowercase hex chars)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SenderScope(String);

impl SenderScope {
    /// Wrap a token read back from storage
    pub(crate) fn from_stored(value: String) -> Self {
        Self(value)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SenderScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Derive the scope token for (sender instance, peer, session-initiation flag)
pub fn sender_scope_hash(sender_instance: &str, peer: &PeerId, is_session_init: bool) -> SenderScope {
    let mut hasher = blake3::Hasher::new();
    hasher.update(SCOPE_DOMAIN);
    hasher.update(&(sender_instance.len() as u64).to_le_bytes());
    hasher.update(sender_instance.as_bytes());
    hasher.update(peer);
    hasher.update(&[is_session_init as u8]);
    SenderScope(hex::encode(hasher.finalize().as_bytes()))
}

/// Sender deduplication info carried by an inbound message
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SenderDedupInfo {
    /// Identifier of the sending process incarnation
    pub sender_instance: Option<String>,
    /// Position of the message within its sender scope
    pub sequence_number: Option<i64>,
}

impl SenderDedupInfo {
    pub fn new(sender_instance: impl Into<String>, sequence_number: i64) -> Self {
        Self {
            sender_instance: Some(sender_instance.into()),
            sequence_number: Some(sequence_number),
        }
    }

    /// No sender information at all
    pub fn none() -> Self {
        Self::default()
    }

    /// Both halves, or nothing
    pub fn pair(&self) -> Option<(&str, i64)> {
        match (&self.sender_instance, self.sequence_number) {
            (Some(instance), Some(seq)) => Some((instance.as_str(), seq)),
            _ => None,
        }
    }

    /// Scope token and sequence number, only when both are known
    pub fn scope(&self, peer: &PeerId, is_session_init: bool) -> Option<(SenderScope, i64)> {
        self.pair()
            .map(|(instance, seq)| (sender_scope_hash(instance, peer, is_session_init), seq))
    }
}
