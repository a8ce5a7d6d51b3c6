//! Inbound message view
//!
//! The core only needs a handful of facts about a received message; everything
//! else (payload, transport handles) stays with the caller.

use super::ids::{DeduplicationKey, PeerId};
use super::sender::SenderDedupInfo;

/// What the deduplication core reads from a received message
pub trait ReceivedMessage {
    /// Key shared by every redelivery of this message
    fn dedup_key(&self) -> &DeduplicationKey;
    /// Identity of the peer that sent it
    fn peer(&self) -> &PeerId;
    /// Whether the message opens a new session
    fn is_session_init(&self) -> bool;
    /// Sender instance id and sequence number, if the sender supplied them
    fn sender_info(&self) -> &SenderDedupInfo;
}

/// Plain inbound message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub key: DeduplicationKey,
    pub peer: PeerId,
    pub session_init: bool,
    pub sender: SenderDedupInfo,
}

impl InboundMessage {
    pub fn new(key: DeduplicationKey, peer: PeerId) -> Self {
        Self {
            key,
            peer,
            session_init: false,
            sender: SenderDedupInfo::none(),
        }
    }

    pub fn with_sender(mut self, sender: SenderDedupInfo) -> Self {
        self.sender = sender;
        self
    }

    pub fn session_init(mut self) -> Self {
        self.session_init = true;
        self
    }
}

impl ReceivedMessage for InboundMessage {
    fn dedup_key(&self) -> &DeduplicationKey {
        &self.key
    }

    fn peer(&self) -> &PeerId {
        &self.peer
    }

    fn is_session_init(&self) -> bool {
        self.session_init
    }

    fn sender_info(&self) -> &SenderDedupInfo {
        &self.sender
    }
}
