//! # Error Types
//!
//! Domain-specific error types for meridian-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  meridian-core errors (this file)                                      │
//! │  ├── CoreError        - Domain errors (payload decoding, totals)       │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  meridian-db errors                                                    │
//! │  └── DbError          - Local store failures                           │
//! │                                                                         │
//! │  meridian-sync errors                                                  │
//! │  └── SyncError        - Server, transport and config failures          │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → DbError/SyncError → UI outcome    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Order totals don't follow the discount/tax policy.
    ///
    /// ## When This Occurs
    /// A caller supplied its own totals and they differ from what
    /// [`crate::pricing::OrderTotals::compute`] produces for the same lines.
    #[error("Order {field} is {actual}, expected {expected}")]
    TotalsMismatch {
        field: String,
        expected: String,
        actual: String,
    },

    /// Queue entry kind string is not a known operation.
    #[error("Unknown operation kind: {0}")]
    UnknownOperationKind(String),

    /// Queued payload could not be encoded or decoded.
    #[error("Invalid {kind} payload: {reason}")]
    InvalidPayload { kind: String, reason: String },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Raised before an order or operation leaves the register, so a bad draft
/// is rejected at checkout instead of being queued.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Collection has too many entries.
    #[error("{field} must have at most {max} entries")]
    TooMany { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: String, max: String },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Value must not be negative.
    #[error("{field} must not be negative")]
    MustNotBeNegative { field: String },

    /// Invalid format.
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Two fields that must differ are equal.
    #[error("{field} must differ from {other}")]
    MustDiffer { field: String, other: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::TotalsMismatch {
            field: "total_amount".to_string(),
            expected: "25.875".to_string(),
            actual: "25.88".to_string(),
        };
        assert_eq!(err.to_string(), "Order total_amount is 25.88, expected 25.875");

        let err = CoreError::UnknownOperationKind("refund".to_string());
        assert_eq!(err.to_string(), "Unknown operation kind: refund");
    }

    #[test]
    fn test_validation_error_messages() {
        let err = ValidationError::Required {
            field: "items".to_string(),
        };
        assert_eq!(err.to_string(), "items is required");

        let err = ValidationError::MustDiffer {
            field: "to_branch_id".to_string(),
            other: "from_branch_id".to_string(),
        };
        assert_eq!(err.to_string(), "to_branch_id must differ from from_branch_id");
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::Required {
            field: "branch_id".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }
}
