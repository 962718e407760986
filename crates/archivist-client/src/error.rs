//! Error types for the Archivist client
//!
//! Provides the error taxonomy surfaced to callers:
//! - Transport failures (network, auth, rate limit), never retried here
//! - Confirmation failures (record settled to FAILED or carries no status)
//! - Confirmation timeouts, with the last status observed
//! - Subject import failures, raised before any remote call

use archivist_model::{ConfirmationStatus, ModelError};
use std::time::Duration;

/// Main client error type
#[derive(Debug, thiserror::Error)]
pub enum ArchivistError {
    /// Transport failed
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Record settled to a failure state
    #[error("confirmation failed for {identity}: {reason}")]
    Confirmation {
        /// Record identity
        identity: String,
        /// What the service reported
        reason: String,
    },

    /// Confirmation budget exhausted
    #[error("confirmation for {identity} timed out after {:.1}s (last status: {})", elapsed.as_secs_f64(), last_status.as_ref().map_or("unknown", ConfirmationStatus::as_str))]
    Timeout {
        /// Record identity
        identity: String,
        /// Time spent waiting
        elapsed: Duration,
        /// Last status observed, if any read succeeded
        last_status: Option<ConfirmationStatus>,
    },

    /// Source subject cannot be imported
    #[error("subject import failed: {0}")]
    Import(String),

    /// No record matches a signature
    #[error("no {label} match {query}")]
    NotFound {
        /// Endpoint label, e.g. `assets`
        label: String,
        /// Query that matched nothing
        query: String,
    },

    /// More than one record matches a signature
    #[error("more than one of {label} match {query}")]
    Ambiguous {
        /// Endpoint label
        label: String,
        /// Query that matched several records
        query: String,
    },

    /// Request data is incomplete, e.g. a selector names a missing key
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Service returned something the client cannot interpret
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Model validation failed
    #[error("model error: {0}")]
    Model(#[from] ModelError),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),
}

impl ArchivistError {
    /// Check if the error came from the transport
    #[inline]
    #[must_use]
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    /// Check if the error is a confirmation timeout
    #[inline]
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Create a confirmation error
    #[inline]
    pub fn confirmation(identity: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Confirmation {
            identity: identity.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid request error
    #[inline]
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }

    /// Create an invalid response error
    #[inline]
    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::InvalidResponse(message.into())
    }
}

/// Transport errors, propagated unchanged
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// Connection or protocol failure
    #[error("network error: {0}")]
    Network(String),

    /// Credential rejected
    #[error("unauthorized")]
    Unauthorized,

    /// Credential lacks permission
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Path does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// Service rate limit hit
    #[error("rate limited (retry after {retry_after_secs:?}s)")]
    RateLimited {
        /// Seconds until the limit resets, if the service said
        retry_after_secs: Option<u64>,
    },

    /// Any other non-success status
    #[error("status {code}: {body}")]
    Status {
        /// HTTP status code
        code: u16,
        /// Response body
        body: String,
    },

    /// Response body is not valid JSON
    #[error("decode error: {0}")]
    Decode(String),
}

/// Result alias for client operations
pub type ArchivistResult<T> = Result<T, ArchivistError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_display_includes_last_status() {
        let err = ArchivistError::Timeout {
            identity: "assets/1".into(),
            elapsed: Duration::from_millis(2500),
            last_status: Some(ConfirmationStatus::Pending),
        };
        assert_eq!(
            err.to_string(),
            "confirmation for assets/1 timed out after 2.5s (last status: PENDING)"
        );
        assert!(err.is_timeout());

        let err = ArchivistError::Timeout {
            identity: "assets/1".into(),
            elapsed: Duration::from_secs(1),
            last_status: None,
        };
        assert!(err.to_string().ends_with("(last status: unknown)"));
    }

    #[test]
    fn transport_error_converts() {
        let err: ArchivistError = TransportError::Unauthorized.into();
        assert!(err.is_transport());
        assert_eq!(err.to_string(), "transport error: unauthorized");
    }
}
