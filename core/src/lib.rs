//! Courier Core
//!
//! Exactly-once delivery semantics on top of an at-least-once transport.
//!
//! The transport may hand the same message over many times (crashes, lost
//! acks, retries). This crate lets the delivery path run each message's side
//! effects once, by tracking messages in two tiers:
//! - in flight: processing started in this process, not yet committed
//! - processed: durably recorded in SQLite, survives restarts
//!
//! It also keeps a per-session high-water mark on session-end marker rows.
//!
//! # Module Structure
//!
//! - `protocol/`: Public interface (DedupService, config, errors, stats)
//! - `dedup/`: Identifiers, sender-scope hashing, in-flight tracker, store, engine
//! - `data/`: SQLite persistence (schema, migrations, rows)
//!
//! # Quick Start
//!
//! ```ignore
//! use courier_core::{DedupConfig, DedupService, DeduplicationKey, InboundMessage};
//!
//! let service = DedupService::start(DedupConfig::default())?;
//! let message = InboundMessage::new(DeduplicationKey::new("msg-1")?, peer_id);
//!
//! // Runs the closure once, however often the message is redelivered
//! service.deliver(&message, |tx| store_payload(tx, &payload)).await?;
//! ```

// Public interface
pub mod protocol;

// Infrastructure modules
pub mod data;
pub mod dedup;

pub use dedup::{
    DedupError, DeduplicationKey, InboundMessage, MessageDeduplicator, MessageIdentifier,
    MessageMeta, MessageType, PeerId, ReceivedMessage, SenderDedupInfo, SessionEndOutcome,
    SessionId, ShardId,
};
pub use protocol::{DedupConfig, DedupService, DedupStats, Delivery, ProtocolError};
