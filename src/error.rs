//! Error types for cache operations

use std::time::Duration;
use thiserror::Error;

/// Boxed error produced by caller-supplied load functions.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors surfaced by the cache facade and the remote tier.
///
/// Read-path faults that only cost freshness (a failed opportunistic remote
/// read, an undecodable payload) are not represented here; `get` absorbs them
/// into a miss. Everything that affects the durability of a requested write,
/// or the outcome of a requested load, is.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Remote store error: {reason}")]
    Remote { reason: String },

    #[error("Serialization error: {reason}")]
    Serialization { reason: String },

    #[error("Load function failed: {source}")]
    Load {
        #[source]
        source: BoxError,
    },

    #[error("Load for key {key} exceeded {limit:?}")]
    LoadTimeout { key: String, limit: Duration },
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            reason: err.to_string(),
        }
    }
}

/// Result type alias for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_error_display() {
        let err = CacheError::Remote {
            reason: "connection refused".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("Remote store error"));
        assert!(msg.contains("connection refused"));
    }

    #[test]
    fn test_serialization_error_from_json() {
        let json_err = serde_json::from_str::<u32>("not json").unwrap_err();
        let err = CacheError::from(json_err);
        assert!(matches!(err, CacheError::Serialization { .. }));
    }

    #[test]
    fn test_load_error_preserves_source() {
        let inner: BoxError = "backend unavailable".into();
        let err = CacheError::Load { source: inner };
        let msg = format!("{}", err);
        assert!(msg.contains("Load function failed"));
        assert!(msg.contains("backend unavailable"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_load_timeout_display() {
        let err = CacheError::LoadTimeout {
            key: "user:42".to_string(),
            limit: Duration::from_secs(3),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("user:42"));
        assert!(msg.contains("3"));
    }
}
