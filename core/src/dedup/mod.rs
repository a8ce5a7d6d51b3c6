//! Exactly-once message deduplication
//!
//! The transport may redeliver a message any number of times. This module
//! decides whether a delivery was already accepted, using two tiers:
//! - `in_flight`: process-local map of messages being processed right now
//! - `store`: durable, read-cached `processed_messages` table
//!
//! `deduplicator` combines both behind one API, and maintains the per-session
//! high-water mark on session-end marker rows.

pub mod deduplicator;
pub mod error;
pub mod ids;
pub mod in_flight;
pub mod message;
pub mod meta;
pub mod sender;
pub mod store;

pub use deduplicator::{MessageDeduplicator, SessionEndOutcome};
pub use error::DedupError;
pub use ids::{
    DeduplicationKey, MessageIdentifier, MessageType, PeerId, SessionId, ShardId, MAX_KEY_LEN,
};
pub use in_flight::InFlightTracker;
pub use message::{InboundMessage, ReceivedMessage};
pub use meta::{MessageMeta, META_VERSION};
pub use sender::{sender_scope_hash, SenderDedupInfo, SenderScope};
pub use store::DurableDedupStore;
