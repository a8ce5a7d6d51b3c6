//! Identifier types
//!
//! - `DeduplicationKey`: names one logical message occurrence, stored as the
//!   primary key of `processed_messages`
//! - `MessageIdentifier`: structured `{type}-{shard}-{session}-{sequence}` key
//!   used for session control and marker entries
//!
//! The string form of a `MessageIdentifier` always fits in a `DeduplicationKey`
//! (at most 64 characters): the type tag is 2 chars, the session 32 hex chars,
//! the sequence at most 10 digits and the shard at most 16 chars.

use std::fmt;
use std::str::FromStr;

use super::error::DedupError;

/// Maximum length of a deduplication key (matches the `message_id` column)
pub const MAX_KEY_LEN: usize = 64;

/// Maximum length of a shard identifier
pub const MAX_SHARD_LEN: usize = 16;

/// 32-byte peer identity (public key)
pub type PeerId = [u8; 32];

/// Unique identifier for one logical message occurrence
///
/// Redeliveries of the same message carry the same key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeduplicationKey(String);

impl DeduplicationKey {
    /// Validate and wrap a raw key
    pub fn new(value: impl Into<String>) -> Result<Self, DedupError> {
        let value = value.into();
        if value.is_empty() {
            return Err(DedupError::InvalidKey("key cannot be empty".to_string()));
        }
        if value.len() > MAX_KEY_LEN {
            return Err(DedupError::InvalidKey(format!(
                "key is {} bytes, max {}",
                value.len(),
                MAX_KEY_LEN
            )));
        }
        Ok(Self(value))
    }

    /// Key for a message named by a structured identifier
    pub fn for_message(id: &MessageIdentifier) -> Self {
        Self(id.to_string())
    }

    /// Key of the session-end marker entry for a session
    pub fn session_end_marker(session_id: SessionId, shard_id: &ShardId) -> Self {
        Self::for_message(&MessageIdentifier::session_end_marker(session_id, shard_id.clone()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeduplicationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for DeduplicationKey {
    type Err = DedupError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

/// Session control message types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    SessionInit,
    SessionConfirm,
    SessionReject,
    SessionData,
    SessionError,
    SessionEnd,
}

impl MessageType {
    /// Two-letter tag used in the identifier string form
    pub fn tag(&self) -> &'static str {
        match self {
            MessageType::SessionInit => "SI",
            MessageType::SessionConfirm => "SC",
            MessageType::SessionReject => "SR",
            MessageType::SessionData => "SD",
            MessageType::SessionError => "SX",
            MessageType::SessionEnd => "SE",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "SI" => Some(MessageType::SessionInit),
            "SC" => Some(MessageType::SessionConfirm),
            "SR" => Some(MessageType::SessionReject),
            "SD" => Some(MessageType::SessionData),
            "SX" => Some(MessageType::SessionError),
            "SE" => Some(MessageType::SessionEnd),
            _ => None,
        }
    }
}

/// Shard a session is routed through
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ShardId(String);

impl ShardId {
    pub fn new(value: impl Into<String>) -> Result<Self, DedupError> {
        let value = value.into();
        if value.is_empty() || value.len() > MAX_SHARD_LEN {
            return Err(DedupError::InvalidIdentifier(format!(
                "shard id must be 1..={} chars, got {}",
                MAX_SHARD_LEN,
                value.len()
            )));
        }
        if value.contains('-') {
            return Err(DedupError::InvalidIdentifier(
                "shard id cannot contain '-'".to_string(),
            ));
        }
        Ok(Self(value))
    }

    /// Derive an 8 hex char shard from a peer identity
    pub fn for_peer(peer: &PeerId) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(b"courier-shard");
        hasher.update(peer);
        Self(hex::encode(&hasher.finalize().as_bytes()[..4]))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ShardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 128-bit session identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(pub u128);

impl SessionId {
    pub fn random() -> Self {
        Self(rand::random::<u128>())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:032x}", self.0)
    }
}

/// Structured message identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MessageIdentifier {
    pub message_type: MessageType,
    pub shard_id: ShardId,
    pub session_id: SessionId,
    pub sequence_number: u32,
}

impl MessageIdentifier {
    pub fn new(
        message_type: MessageType,
        shard_id: ShardId,
        session_id: SessionId,
        sequence_number: u32,
    ) -> Self {
        Self {
            message_type,
            shard_id,
            session_id,
            sequence_number,
        }
    }

    /// Identifier of the session-end marker (always position 0)
    pub fn session_end_marker(session_id: SessionId, shard_id: ShardId) -> Self {
        Self::new(MessageType::SessionEnd, shard_id, session_id, 0)
    }
}

impl fmt::Display for MessageIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}-{}-{}",
            self.message_type.tag(),
            self.shard_id,
            self.session_id,
            self.sequence_number
        )
    }
}

impl FromStr for MessageIdentifier {
    type Err = DedupError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || DedupError::InvalidIdentifier(s.to_string());

        let mut parts = s.splitn(4, '-');
        let (tag, shard, session, sequence) =
            match (parts.next(), parts.next(), parts.next(), parts.next()) {
                (Some(t), Some(sh), Some(se), Some(sq)) => (t, sh, se, sq),
                _ => return Err(invalid()),
            };

        let message_type = MessageType::from_tag(tag).ok_or_else(invalid)?;
        let shard_id = ShardId::new(shard)?;
        if session.len() != 32 {
            return Err(invalid());
        }
        let session_id = u128::from_str_radix(session, 16).map_err(|_| invalid())?;
        let sequence_number = sequence.parse::<u32>().map_err(|_| invalid())?;

        Ok(Self::new(
            message_type,
            shard_id,
            SessionId(session_id),
            sequence_number,
        ))
    }
}
