//! # Sync Error Types
//!
//! Error types for everything that talks to the store server or replays the
//! offline queue.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Sync Error Categories                             │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  Configuration  │  │   Transport     │  │     Rejection           │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  InvalidConfig  │  │  Connection     │  │  Rejected (4xx)         │ │
//! │  │  InvalidUrl     │  │  Timeout        │  │  Validation             │ │
//! │  │  ConfigLoad/Save│  │  ServerError    │  │                         │ │
//! │  │                 │  │  InvalidResponse│  │  → checkout failure,    │ │
//! │  │                 │  │  Unsuccessful   │  │    never queued         │ │
//! │  │                 │  │  → queue/cache  │  │                         │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────────────────────────────────┐ │
//! │  │    Database     │  │     Internal                                │ │
//! │  │                 │  │                                             │ │
//! │  │  DatabaseError  │  │  Internal (HTTP client construction)        │ │
//! │  └─────────────────┘  └─────────────────────────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

pub type SyncResult<T> = Result<T, SyncError>;

/// Failures of the server conversation and the queue around it.
#[derive(Debug, Error)]
pub enum SyncError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    #[error("Invalid register configuration: {0}")]
    InvalidConfig(String),

    /// Invalid server URL.
    #[error("Invalid server URL: {0}")]
    InvalidUrl(String),

    /// The config file exists but couldn't be read or parsed.
    #[error("Could not load register.toml: {0}")]
    ConfigLoadFailed(String),

    #[error("Could not write register.toml: {0}")]
    ConfigSaveFailed(String),

    // =========================================================================
    // Transport Errors
    // =========================================================================
    /// The server could not be reached at all.
    #[error("Server unreachable: {0}")]
    ConnectionFailed(String),

    /// The request did not complete in time.
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// The server answered with a 5xx status (or 408/429).
    #[error("Server error ({status}): {message}")]
    ServerError { status: u16, message: String },

    /// The server answered 2xx with something that isn't the expected JSON.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// The server answered 2xx but reported `success: false`.
    #[error("Server reported failure: {0}")]
    Unsuccessful(String),

    /// Any other request failure.
    #[error("Request failed: {0}")]
    RequestFailed(String),

    // =========================================================================
    // Rejection Errors
    // =========================================================================
    /// The server refused the request itself (4xx other than 408/429).
    ///
    /// Sending the same body again would be refused again.
    #[error("Rejected by server ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// The request failed local validation before being sent or queued.
    #[error("Validation failed: {0}")]
    Validation(String),

    // =========================================================================
    // Database Errors
    // =========================================================================
    /// Local store failure.
    #[error("Local store error: {0}")]
    DatabaseError(String),

    /// A request body or queued payload could not be encoded.
    #[error("Could not encode payload: {0}")]
    SerializationFailed(String),

    // =========================================================================
    // Internal Errors
    // =========================================================================
    #[error("Internal error: {0}")]
    Internal(String),
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<meridian_db::DbError> for SyncError {
    fn from(err: meridian_db::DbError) -> Self {
        SyncError::DatabaseError(err.to_string())
    }
}

impl From<meridian_core::CoreError> for SyncError {
    fn from(err: meridian_core::CoreError) -> Self {
        use meridian_core::CoreError;
        match err {
            CoreError::Validation(_) | CoreError::TotalsMismatch { .. } => {
                SyncError::Validation(err.to_string())
            }
            other => SyncError::SerializationFailed(other.to_string()),
        }
    }
}

impl From<meridian_core::ValidationError> for SyncError {
    fn from(err: meridian_core::ValidationError) -> Self {
        SyncError::Validation(err.to_string())
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::SerializationFailed(err.to_string())
    }
}

impl From<url::ParseError> for SyncError {
    fn from(err: url::ParseError) -> Self {
        SyncError::InvalidUrl(err.to_string())
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SyncError::Timeout(err.to_string())
        } else if err.is_connect() {
            SyncError::ConnectionFailed(err.to_string())
        } else if err.is_decode() {
            SyncError::InvalidResponse(err.to_string())
        } else if let Some(status) = err.status() {
            SyncError::from_status(status.as_u16(), err.to_string())
        } else {
            SyncError::RequestFailed(err.to_string())
        }
    }
}

impl From<std::io::Error> for SyncError {
    fn from(err: std::io::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for SyncError {
    fn from(err: toml::de::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for SyncError {
    fn from(err: toml::ser::Error) -> Self {
        SyncError::ConfigSaveFailed(err.to_string())
    }
}

// =============================================================================
// Error Categorization (for fallback logic)
// =============================================================================

impl SyncError {
    /// Classifies a non-2xx HTTP status.
    ///
    /// 408 and 429 say "not now" rather than "not this", so they count as
    /// server errors and the request may be queued.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            408 | 429 => SyncError::ServerError { status, message },
            400..=499 => SyncError::Rejected { status, message },
            _ => SyncError::ServerError { status, message },
        }
    }

    /// Returns true if the same request may succeed later.
    ///
    /// ## Retryable Errors
    /// - Connection failures and timeouts
    /// - 5xx, 408 and 429 responses
    /// - Malformed or `success: false` responses
    ///
    /// ## Non-Retryable Errors
    /// - Rejections and local validation failures
    /// - Configuration and local store errors
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SyncError::ConnectionFailed(_)
                | SyncError::Timeout(_)
                | SyncError::ServerError { .. }
                | SyncError::InvalidResponse(_)
                | SyncError::Unsuccessful(_)
                | SyncError::RequestFailed(_)
        )
    }

    /// Returns true if the request itself was refused.
    pub fn is_rejection(&self) -> bool {
        matches!(self, SyncError::Rejected { .. } | SyncError::Validation(_))
    }

    /// Returns true if this error indicates a configuration problem.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            SyncError::InvalidConfig(_)
                | SyncError::InvalidUrl(_)
                | SyncError::ConfigLoadFailed(_)
                | SyncError::ConfigSaveFailed(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_errors() {
        assert!(SyncError::ConnectionFailed("refused".into()).is_retryable());
        assert!(SyncError::Timeout("30s".into()).is_retryable());
        assert!(SyncError::from_status(503, "busy").is_retryable());
        assert!(SyncError::Unsuccessful("db locked".into()).is_retryable());

        assert!(!SyncError::InvalidConfig("bad config".into()).is_retryable());
        assert!(!SyncError::DatabaseError("disk full".into()).is_retryable());
        assert!(!SyncError::from_status(400, "bad").is_retryable());
    }

    #[test]
    fn test_status_classification() {
        assert!(SyncError::from_status(400, "missing branch").is_rejection());
        assert!(SyncError::from_status(422, "bad quantity").is_rejection());
        assert!(!SyncError::from_status(408, "timeout").is_rejection());
        assert!(!SyncError::from_status(429, "slow down").is_rejection());
        assert!(!SyncError::from_status(500, "boom").is_rejection());
    }

    #[test]
    fn test_core_error_conversion() {
        let err: SyncError = meridian_core::ValidationError::Required {
            field: "items".into(),
        }
        .into();
        assert!(err.is_rejection());

        let err: SyncError = meridian_core::CoreError::UnknownOperationKind("refund".into()).into();
        assert!(matches!(err, SyncError::SerializationFailed(_)));
    }

    #[test]
    fn test_error_display() {
        let err = SyncError::Rejected {
            status: 400,
            message: "branch_id is required".into(),
        };
        assert!(err.to_string().contains("400"));
        assert!(err.to_string().contains("branch_id"));
    }
}
