//! # Sync Queue Repository
//!
//! The durable FIFO of writes the server has not yet acknowledged.
//!
//! ## Queue Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Offline Queue                                        │
//! │                                                                         │
//! │  submit_order() while offline                                          │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  INSERT INTO sync_queue (kind, payload, enqueued_at)                   │
//! │       │   id = AUTOINCREMENT → replay order                            │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │            SYNC ENGINE (meridian-sync)                          │   │
//! │  │                                                                 │   │
//! │  │  1. SELECT * FROM sync_queue ORDER BY id ASC                   │   │
//! │  │                                                                 │   │
//! │  │  2. For each entry:                                            │   │
//! │  │     a. POST payload to its endpoint                            │   │
//! │  │     b. On success: DELETE FROM sync_queue WHERE id = ?         │   │
//! │  │     c. On failure: upsert sync_failures, stop pass             │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                                                         │
//! │  KEY GUARANTEES:                                                       │
//! │  • An entry is removed only after the server acknowledged it           │
//! │  • Entries never jump ahead of older ones                              │
//! │  • Queue rows are never updated in place                               │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::{debug, warn};

use crate::error::{DbError, DbResult};
use meridian_core::{OperationKind, SyncOperation, SyncQueueEntry};

/// Raw `sync_queue` row, joined with its failure record.
#[derive(Debug, sqlx::FromRow)]
struct QueueRow {
    id: i64,
    kind: OperationKind,
    payload: String,
    enqueued_at: DateTime<Utc>,
    attempts: i64,
    last_error: Option<String>,
}

impl QueueRow {
    fn into_entry(self) -> DbResult<SyncQueueEntry> {
        let operation = SyncOperation::from_payload(self.kind, &self.payload)
            .map_err(|e| DbError::invalid_payload(self.id, e))?;

        Ok(SyncQueueEntry {
            sequence: self.id,
            operation,
            enqueued_at: self.enqueued_at,
            attempts: u32::try_from(self.attempts).unwrap_or(u32::MAX),
            last_error: self.last_error,
        })
    }
}

const SELECT_ENTRY: &str = r#"
    SELECT q.id, q.kind, q.payload, q.enqueued_at,
           COALESCE(f.attempts, 0) AS attempts, f.last_error
    FROM sync_queue q
    LEFT JOIN sync_failures f ON f.sequence = q.id
"#;

/// Repository for sync queue operations.
#[derive(Debug, Clone)]
pub struct SyncQueueRepository {
    pool: SqlitePool,
}

impl SyncQueueRepository {
    /// Creates a new SyncQueueRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SyncQueueRepository { pool }
    }

    /// Appends an operation to the tail of the queue.
    ///
    /// The payload is stored exactly as it would have been sent.
    ///
    /// ## Returns
    /// The stored entry, whose `sequence` fixes its replay position.
    pub async fn enqueue(&self, operation: &SyncOperation) -> DbResult<SyncQueueEntry> {
        let kind = operation.kind();
        let payload = operation
            .payload_json()
            .map_err(|e| DbError::Serialization(e.to_string()))?;
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            INSERT INTO sync_queue (kind, payload, enqueued_at)
            VALUES (?1, ?2, ?3)
            "#,
        )
        .bind(kind)
        .bind(&payload)
        .bind(now)
        .execute(&self.pool)
        .await?;

        let sequence = result.last_insert_rowid();

        debug!(sequence, kind = %kind, "Queued operation for sync");

        Ok(SyncQueueEntry {
            sequence,
            operation: operation.clone(),
            enqueued_at: now,
            attempts: 0,
            last_error: None,
        })
    }

    /// All pending entries, oldest first.
    pub async fn pending(&self) -> DbResult<Vec<SyncQueueEntry>> {
        let rows: Vec<QueueRow> = sqlx::query_as(&format!("{SELECT_ENTRY} ORDER BY q.id ASC"))
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(QueueRow::into_entry).collect()
    }

    /// The oldest pending entry, if any.
    pub async fn head(&self) -> DbResult<Option<SyncQueueEntry>> {
        let row: Option<QueueRow> =
            sqlx::query_as(&format!("{SELECT_ENTRY} ORDER BY q.id ASC LIMIT 1"))
                .fetch_optional(&self.pool)
                .await?;

        row.map(QueueRow::into_entry).transpose()
    }

    /// Deletes an acknowledged entry. Its failure record goes with it.
    ///
    /// ## Returns
    /// `false` if no entry had that sequence.
    pub async fn remove(&self, sequence: i64) -> DbResult<bool> {
        let result = sqlx::query("DELETE FROM sync_queue WHERE id = ?1")
            .bind(sequence)
            .execute(&self.pool)
            .await?;

        let removed = result.rows_affected() > 0;
        if !removed {
            warn!(sequence, "Queue entry already gone");
        }
        Ok(removed)
    }

    /// Records a failed replay attempt on an entry. The queued row itself
    /// is left untouched; an entry that is already gone records nothing.
    pub async fn record_failure(&self, sequence: i64, error: &str) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO sync_failures (sequence, attempts, last_error, last_attempt_at)
            SELECT id, 1, ?2, ?3 FROM sync_queue WHERE id = ?1
            ON CONFLICT (sequence) DO UPDATE SET
                attempts = attempts + 1,
                last_error = excluded.last_error,
                last_attempt_at = excluded.last_attempt_at
            "#,
        )
        .bind(sequence)
        .bind(error)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Number of pending entries.
    pub async fn count(&self) -> DbResult<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sync_queue")
            .fetch_one(&self.pool)
            .await?;

        Ok(u64::try_from(count).unwrap_or(0))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
