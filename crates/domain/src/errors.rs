//! Error types used throughout the application
//!
//! The taxonomy mirrors how failures propagate: transient external failures
//! are retried with backoff, expired refresh tokens deactivate the owning
//! store, validation failures fall back to default policy, and ledger
//! conflicts are treated as success by callers.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for ShopSync
#[derive(Error, Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "message")]
pub enum SyncError {
    /// Network timeouts, 5xx responses, rate limits. Retried with backoff.
    #[error("Transient external error: {0}")]
    Transient(String),

    /// Refresh token expired. Requires re-authorization; never auto-retried.
    #[error("Credential expired: {0}")]
    CredentialExpired(String),

    /// Malformed classifier output, unknown supplier, invalid transition.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Ledger reservation already held or completed elsewhere.
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl SyncError {
    /// Whether a bounded retry with backoff is appropriate for this error.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

/// Result type alias for ShopSync operations
pub type Result<T> = std::result::Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_is_the_only_retryable_class() {
        assert!(SyncError::Transient("timeout".into()).is_transient());
        assert!(!SyncError::CredentialExpired("refresh expired".into()).is_transient());
        assert!(!SyncError::Validation("unknown supplier".into()).is_transient());
        assert!(!SyncError::Conflict("reserved".into()).is_transient());
        assert!(!SyncError::Database("locked".into()).is_transient());
    }

    #[test]
    fn errors_serialize_with_tagged_representation() {
        let err = SyncError::Validation("bad supplier".into());
        let json = serde_json::to_string(&err).unwrap();
        assert!(json.contains("\"Validation\""));
        assert!(json.contains("bad supplier"));
    }
}
