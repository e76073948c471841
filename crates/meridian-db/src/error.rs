//! # Store Errors
//!
//! ```text
//! sqlx::Error ─┐
//! MigrateError ┼──► DbError ──► SyncError::DatabaseError ──► SubmitOutcome::Failed
//! CoreError ───┘    (payload decode)
//! ```
//!
//! Every variant ends the same way for a checkout: the write was not made
//! durable, so the submission fails.

use meridian_core::CoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    /// The store file could not be opened, or the pool is closed.
    #[error("Store unavailable: {0}")]
    ConnectionFailed(String),

    #[error("Store migration failed: {0}")]
    MigrationFailed(String),

    /// A CHECK, UNIQUE or FOREIGN KEY constraint rejected a write.
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// A queued payload no longer decodes into its operation.
    ///
    /// ## When This Occurs
    /// A row written by an older build whose payload shape has since changed.
    /// The entry stays at the head of the queue until it is dealt with.
    #[error("Sync queue entry {sequence} is unreadable: {reason}")]
    InvalidPayload { sequence: i64, reason: String },

    /// A mirrored record or setting could not be (de)serialized.
    #[error("Serialization failed: {0}")]
    Serialization(String),

    /// Every connection stayed busy past the acquire timeout.
    #[error("Store busy: no free connection")]
    Busy,

    #[error("Store error: {0}")]
    Internal(String),
}

impl DbError {
    pub(crate) fn invalid_payload(sequence: i64, err: CoreError) -> Self {
        DbError::InvalidPayload {
            sequence,
            reason: err.to_string(),
        }
    }

    /// True when the store itself can't be reached, as opposed to a bad
    /// statement or row.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, DbError::ConnectionFailed(_) | DbError::Busy)
    }
}

impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            // SQLite reports every constraint kind as "<KIND> constraint failed: ..."
            sqlx::Error::Database(db_err) if db_err.message().contains("constraint failed") => {
                DbError::ConstraintViolation(db_err.message().to_string())
            }
            sqlx::Error::Database(db_err) => DbError::QueryFailed(db_err.message().to_string()),
            sqlx::Error::RowNotFound => DbError::QueryFailed("no rows returned".to_string()),
            sqlx::Error::PoolTimedOut => DbError::Busy,
            sqlx::Error::PoolClosed => DbError::ConnectionFailed("pool is closed".to_string()),
            sqlx::Error::Io(e) => DbError::ConnectionFailed(e.to_string()),
            other => DbError::Internal(other.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

impl From<serde_json::Error> for DbError {
    fn from(err: serde_json::Error) -> Self {
        DbError::Serialization(err.to_string())
    }
}

pub type DbResult<T> = Result<T, DbError>;
