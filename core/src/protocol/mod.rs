//! Deduplication service - Public Interface
//!
//! # Module Structure
//!
//! - `core.rs`: DedupService struct, start/close, delivery lifecycle
//! - `config.rs`: DedupConfig builder
//! - `error.rs`: ProtocolError
//! - `stats.rs`: DedupStats
//!
//! # Example
//!
//! ```ignore
//! use courier_core::{DedupConfig, DedupService, Delivery, InboundMessage};
//!
//! let service = DedupService::start(DedupConfig::default())?;
//!
//! match service.deliver(&message, |tx| apply(tx, &payload)).await? {
//!     Delivery::Processed(_) => ack(),
//!     Delivery::Duplicate => ack(),
//! }
//! ```

mod config;
mod core;
mod error;
mod stats;

pub use config::{DedupConfig, DEFAULT_DB_PATH};
pub use self::core::{DedupService, Delivery};
pub use error::ProtocolError;
pub use stats::DedupStats;
