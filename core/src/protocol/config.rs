//! Service configuration

use std::path::PathBuf;

/// Default database file when no path is configured
pub const DEFAULT_DB_PATH: &str = "courier_dedup.db";

/// Configuration for the deduplication service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DedupConfig {
    /// Path to the database file
    /// If None, uses `courier_dedup.db` in the working directory
    pub db_path: Option<PathBuf>,

    /// Use a throwaway in-memory database (tests only, nothing survives a restart)
    /// Default: false
    pub in_memory: bool,

    /// Maximum number of processed-message entries held in the read cache.
    /// 0 disables the cache.
    /// Default: 10_000
    pub cache_capacity: usize,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            in_memory: false,
            cache_capacity: 10_000,
        }
    }
}

impl DedupConfig {
    /// Create a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the database path
    pub fn with_db_path(mut self, path: PathBuf) -> Self {
        self.db_path = Some(path);
        self
    }

    /// Set the cache capacity
    pub fn with_cache_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = capacity;
        self
    }

    /// Resolved database path
    pub fn db_path_or_default(&self) -> PathBuf {
        self.db_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DB_PATH))
    }

    /// Configuration for testing (in-memory database, small cache)
    pub fn for_testing() -> Self {
        Self {
            db_path: None,
            in_memory: true,
            cache_capacity: 64,
        }
    }
}
