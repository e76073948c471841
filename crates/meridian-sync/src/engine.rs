//! # Sync Engine
//!
//! Replays the offline queue to the server, oldest entry first.
//!
//! ## Drain Pass
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  sync_pending()                                                         │
//! │                                                                         │
//! │  offline? ──yes──► SyncReport::skipped_offline()   (no store, no net)  │
//! │     │                                                                   │
//! │     ▼                                                                   │
//! │  lock drain gate          ← a second caller waits here                  │
//! │     │                                                                   │
//! │     ▼                                                                   │
//! │  pending() ordered by sequence                                          │
//! │     │                                                                   │
//! │     ▼                                                                   │
//! │  ┌──────────────┐  ok   ┌───────────────┐                              │
//! │  │ POST entry N │──────►│ remove(N)     │──► next entry                │
//! │  └──────┬───────┘       └───────────────┘                              │
//! │         │ error                                                         │
//! │         ▼                                                               │
//! │  record_failure(N), stop. N..end stay queued in order.                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::client::ServerApi;
use crate::connectivity::ConnectivityMonitor;
use crate::error::SyncResult;
use meridian_core::OperationKind;
use meridian_db::Database;

/// The entry that stopped a drain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HaltInfo {
    pub sequence: i64,
    pub kind: OperationKind,
    pub error: String,
    /// False when the server refused the entry outright; it will keep
    /// blocking the queue until someone removes it.
    pub retryable: bool,
}

/// Summary of one drain pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub attempted: usize,
    pub synced: usize,
    pub remaining: u64,
    pub halted: Option<HaltInfo>,
    pub skipped_offline: bool,
}

impl SyncReport {
    pub fn skipped_offline() -> Self {
        SyncReport {
            skipped_offline: true,
            ..Default::default()
        }
    }

    /// True when the pass ran and left nothing behind.
    pub fn is_complete(&self) -> bool {
        !self.skipped_offline && self.halted.is_none() && self.remaining == 0
    }
}

/// FIFO replay of the sync queue.
pub struct SyncEngine {
    db: Database,
    api: Arc<dyn ServerApi>,
    connectivity: Arc<ConnectivityMonitor>,
    gate: Mutex<()>,
}

impl SyncEngine {
    pub fn new(
        db: Database,
        api: Arc<dyn ServerApi>,
        connectivity: Arc<ConnectivityMonitor>,
    ) -> Self {
        SyncEngine {
            db,
            api,
            connectivity,
            gate: Mutex::new(()),
        }
    }

    /// Replays every pending entry until the queue is empty or one fails.
    ///
    /// Passes never overlap: a caller arriving mid-pass waits, then drains
    /// whatever is still queued.
    ///
    /// ## Errors
    /// Only local store failures. Server failures end the pass and are
    /// reported in [`SyncReport::halted`].
    pub async fn sync_pending(&self) -> SyncResult<SyncReport> {
        if !self.connectivity.is_online() {
            debug!("Offline; skipping queue drain");
            return Ok(SyncReport::skipped_offline());
        }

        let _pass = self.gate.lock().await;

        let queue = self.db.sync_queue();
        let entries = queue.pending().await?;
        if entries.is_empty() {
            return Ok(SyncReport::default());
        }

        info!(pending = entries.len(), "Draining sync queue");

        let mut report = SyncReport::default();

        for entry in entries {
            report.attempted += 1;

            match self.api.submit(&entry.operation).await {
                Ok(ack) => {
                    queue.remove(entry.sequence).await?;
                    report.synced += 1;
                    info!(
                        sequence = entry.sequence,
                        kind = %entry.kind(),
                        server_id = ?ack.id,
                        "Replayed queued operation"
                    );
                }
                Err(e) => {
                    warn!(
                        sequence = entry.sequence,
                        kind = %entry.kind(),
                        attempts = entry.attempts + 1,
                        error = %e,
                        "Replay failed; stopping drain"
                    );

                    if let Err(db_err) = queue.record_failure(entry.sequence, &e.to_string()).await {
                        warn!(sequence = entry.sequence, error = %db_err, "Failed to record replay failure");
                    }

                    report.halted = Some(HaltInfo {
                        sequence: entry.sequence,
                        kind: entry.kind(),
                        error: e.to_string(),
                        retryable: e.is_retryable(),
                    });
                    break;
                }
            }
        }

        report.remaining = queue.count().await?;

        info!(
            synced = report.synced,
            remaining = report.remaining,
            halted = report.halted.is_some(),
            "Drain finished"
        );

        Ok(report)
    }

    /// Number of writes waiting in the queue.
    pub async fn pending_count(&self) -> SyncResult<u64> {
        Ok(self.db.sync_queue().count().await?)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SyncError;
    use crate::testing::{unavailable, FakeServer};
    use meridian_core::{
        Money, OrderDraft, OrderLine, PaymentMethod, StockTransfer, SyncOperation, WasteRecord,
    };
    use meridian_db::DbConfig;
    use rust_decimal::Decimal;
    use std::time::Duration;

    struct Fixture {
        db: Database,
        server: Arc<FakeServer>,
        connectivity: Arc<ConnectivityMonitor>,
        engine: Arc<SyncEngine>,
    }

    async fn fixture(online: bool) -> Fixture {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let server = Arc::new(FakeServer::new());
        let connectivity = Arc::new(ConnectivityMonitor::new(online));
        let engine = Arc::new(SyncEngine::new(db.clone(), server.clone(), connectivity.clone()));
        Fixture {
            db,
            server,
            connectivity,
            engine,
        }
    }

    fn order(branch_id: i64) -> SyncOperation {
        SyncOperation::from(OrderDraft::from_lines(
            branch_id,
            vec![OrderLine::new(1, Decimal::ONE, Money::from_minor(500), Money::zero())],
            Decimal::ZERO,
            PaymentMethod::Card,
            None,
        ))
    }

    async fn enqueue_all(db: &Database, ops: &[SyncOperation]) -> Vec<i64> {
        let mut sequences = Vec::new();
        for op in ops {
            sequences.push(db.sync_queue().enqueue(op).await.unwrap().sequence);
        }
        sequences
    }

    #[tokio::test]
    async fn test_replays_in_fifo_order_and_empties_queue() {
        let f = fixture(true).await;
        let ops = vec![
            order(1),
            SyncOperation::from(WasteRecord::new(1, 4, Decimal::ONE, "expired")),
            order(2),
            SyncOperation::from(StockTransfer::new(1, 2, 4, Decimal::TEN)),
        ];
        enqueue_all(&f.db, &ops).await;

        let report = f.engine.sync_pending().await.unwrap();

        assert_eq!(report.attempted, 4);
        assert_eq!(report.synced, 4);
        assert!(report.is_complete());
        assert_eq!(f.server.submitted(), ops);
        assert_eq!(
            f.server.calls(),
            vec!["POST /api/orders", "POST /api/waste", "POST /api/orders", "POST /api/transfers"]
        );
        assert_eq!(f.db.sync_queue().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_stops_at_first_failure() {
        let f = fixture(true).await;
        let ops: Vec<SyncOperation> = (1..=5).map(order).collect();
        let sequences = enqueue_all(&f.db, &ops).await;

        // Entries 1 and 2 succeed, entry 3 fails.
        f.server.script_submit(Ok(crate::client::WriteAck { id: Some(1) }));
        f.server.script_submit(Ok(crate::client::WriteAck { id: Some(2) }));
        f.server.script_submit(Err(unavailable()));

        let report = f.engine.sync_pending().await.unwrap();

        assert_eq!(report.attempted, 3);
        assert_eq!(report.synced, 2);
        assert_eq!(report.remaining, 3);
        let halted = report.halted.unwrap();
        assert_eq!(halted.sequence, sequences[2]);
        assert!(halted.retryable);

        let left: Vec<i64> = f
            .db
            .sync_queue()
            .pending()
            .await
            .unwrap()
            .iter()
            .map(|e| e.sequence)
            .collect();
        assert_eq!(left, sequences[2..].to_vec());

        let head = f.db.sync_queue().head().await.unwrap().unwrap();
        assert_eq!(head.attempts, 1);
        assert!(head.last_error.unwrap().contains("503"));
    }

    #[tokio::test]
    async fn test_rejected_entry_blocks_the_queue() {
        let f = fixture(true).await;
        enqueue_all(&f.db, &[order(1), order(2)]).await;
        f.server.script_submit(Err(SyncError::Rejected {
            status: 400,
            message: "Insufficient stock".into(),
        }));

        let report = f.engine.sync_pending().await.unwrap();
        assert_eq!(report.synced, 0);
        assert_eq!(report.remaining, 2);
        assert!(!report.halted.unwrap().retryable);
        assert_eq!(f.server.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_empty_queue_makes_no_network_calls() {
        let f = fixture(true).await;

        let report = f.engine.sync_pending().await.unwrap();
        assert_eq!(report, SyncReport::default());
        assert!(report.is_complete());
        assert!(f.server.calls().is_empty());
    }

    #[tokio::test]
    async fn test_offline_is_a_no_op() {
        let f = fixture(false).await;
        enqueue_all(&f.db, &[order(1)]).await;

        let report = f.engine.sync_pending().await.unwrap();
        assert!(report.skipped_offline);
        assert!(!report.is_complete());
        assert!(f.server.calls().is_empty());
        assert_eq!(f.engine.pending_count().await.unwrap(), 1);

        f.connectivity.set_online(true);
        assert!(f.engine.sync_pending().await.unwrap().is_complete());
    }

    #[tokio::test]
    async fn test_overlapping_drains_do_not_double_submit() {
        let f = fixture(true).await;
        let ops: Vec<SyncOperation> = (1..=3).map(order).collect();
        enqueue_all(&f.db, &ops).await;
        f.server.delay_submits(Duration::from_millis(20));

        let (a, b) = tokio::join!(f.engine.sync_pending(), f.engine.sync_pending());
        let (a, b) = (a.unwrap(), b.unwrap());

        assert_eq!(a.synced + b.synced, 3);
        assert_eq!(f.server.submitted(), ops);
        assert_eq!(f.db.sync_queue().count().await.unwrap(), 0);
    }
}
