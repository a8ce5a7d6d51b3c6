//! Stats for monitoring the deduplication service

use std::fmt;

/// Snapshot of deduplication state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DedupStats {
    /// Durable rows in `processed_messages`
    pub processed_messages: usize,
    /// Durable rows that are session-end markers
    pub session_end_markers: usize,
    /// Messages whose processing started but has not been confirmed committed
    pub in_flight: usize,
    /// Entries held by the read cache
    pub cached: usize,
}

impl fmt::Display for DedupStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "processed messages:  {}", self.processed_messages)?;
        writeln!(f, "session-end markers: {}", self.session_end_markers)?;
        writeln!(f, "in flight:           {}", self.in_flight)?;
        write!(f, "cached:              {}", self.cached)
    }
}
