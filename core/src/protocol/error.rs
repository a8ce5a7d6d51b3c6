//! Service errors

use crate::data::StartError;
use crate::dedup::DedupError;

/// Errors returned by `DedupService`
#[derive(Debug)]
pub enum ProtocolError {
    /// Failed to start the service
    StartFailed(String),
    /// Database error outside the deduplication core (transactions, commits)
    Database(String),
    /// Deduplication core error
    Dedup(DedupError),
}

impl std::fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProtocolError::StartFailed(e) => write!(f, "failed to start service: {}", e),
            ProtocolError::Database(e) => write!(f, "database error: {}", e),
            ProtocolError::Dedup(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for ProtocolError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ProtocolError::Dedup(e) => Some(e),
            _ => None,
        }
    }
}

impl From<DedupError> for ProtocolError {
    fn from(e: DedupError) -> Self {
        ProtocolError::Dedup(e)
    }
}

impl From<rusqlite::Error> for ProtocolError {
    fn from(e: rusqlite::Error) -> Self {
        ProtocolError::Database(e.to_string())
    }
}

impl From<StartError> for ProtocolError {
    fn from(e: StartError) -> Self {
        ProtocolError::StartFailed(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_error_display() {
        let err = ProtocolError::StartFailed("locked".to_string());
        assert_eq!(err.to_string(), "failed to start service: locked");

        let err = ProtocolError::Database("busy".to_string());
        assert_eq!(err.to_string(), "database error: busy");

        let err = ProtocolError::from(DedupError::InvalidKey("empty".to_string()));
        assert_eq!(err.to_string(), "invalid deduplication key: empty");
    }

    #[test]
    fn test_protocol_error_source() {
        use std::error::Error;

        let err = ProtocolError::from(DedupError::Database("x".to_string()));
        assert!(err.source().is_some());
        assert!(ProtocolError::Database("x".to_string()).source().is_none());
    }
}
