//! Error types used throughout the application

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for calsync
#[derive(Error, Debug, Serialize, Deserialize)]
#[serde(tag = "type", content = "message")]
pub enum CalsyncError {
    /// No credential link exists for the (user, provider) pair. The user
    /// must complete the authorization flow; not retryable.
    #[error("Credential missing: {0}")]
    CredentialMissing(String),

    /// A link existed but the provider revoked it. The stored credential
    /// has been invalidated; the user must re-link. Not retryable.
    #[error("Reauthorization required: {0}")]
    ReauthRequired(String),

    /// Transient provider failure (network, 5xx, malformed response).
    /// Safe to retry with backoff; the stored credential is left intact.
    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// Non-2xx response from the remote calendar API, surfaced with the
    /// raw body so the caller can classify it.
    #[error("Gateway error ({status}): {body}")]
    Gateway { status: u16, body: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for calsync operations
pub type Result<T> = std::result::Result<T, CalsyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gateway_error_display_includes_status() {
        let err = CalsyncError::Gateway { status: 403, body: "forbidden".to_string() };
        assert_eq!(err.to_string(), "Gateway error (403): forbidden");
    }

    #[test]
    fn test_error_serializes_tagged() {
        let err = CalsyncError::ReauthRequired("token revoked".to_string());
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["type"], "ReauthRequired");
        assert_eq!(json["message"], "token revoked");
    }
}
