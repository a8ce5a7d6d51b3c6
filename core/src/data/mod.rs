//! Data layer for the deduplication store
//!
//! - `schema`: table creation and migrations
//! - `start`: opening the database
//! - `processed`: raw access to `processed_messages` rows

pub mod processed;
pub mod schema;
pub mod start;

pub use processed::{
    count_processed_messages, count_processed_with_prefix, current_timestamp,
    get_processed_message, insert_processed_message, update_last_sequence_number,
    ProcessedMessageRow,
};
pub use schema::{create_all_tables, run_migrations};
pub use start::{start_db, start_memory_db, StartError};
