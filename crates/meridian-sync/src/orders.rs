//! # Order Transaction Service
//!
//! Commits a checkout to the server when it can, and to the offline queue
//! when it can't.
//!
//! ## Submission Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  submit_order(draft)                                                    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  validate ──invalid──► Rejected { reason }            (nothing queued)  │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  online? ──yes──► POST /api/orders                                     │
//! │       │              ├── 2xx {success, orderId} ──► Committed          │
//! │       │              ├── 4xx ──────────────────────► Rejected           │
//! │       │              └── timeout / 5xx / malformed ─┐                   │
//! │       no                                            │                   │
//! │       ▼                                             ▼                   │
//! │  enqueue verbatim ──ok──► Queued { placeholder_id < 0, sequence }      │
//! │       │                                                                 │
//! │       └──error──► Failed { reason }                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A timed-out order is queued rather than retried in place. If the server
//! did commit it, the replayed copy carries the same `client_submission_id`.

use serde::Serialize;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::client::{LoyaltyCredit, ServerApi};
use crate::connectivity::ConnectivityMonitor;
use crate::error::{SyncError, SyncResult};
use meridian_core::loyalty::points_for_total;
use meridian_core::validation::validate_operation;
use meridian_core::{LoyaltyAward, OrderDraft, SyncOperation};
use meridian_db::Database;

// =============================================================================
// Placeholder Ids
// =============================================================================

/// Issues negative order ids for queued orders.
///
/// Each id is the negative of a millisecond timestamp, bumped past the
/// previous one so two orders in the same millisecond still differ.
#[derive(Debug, Default)]
pub struct PlaceholderIds {
    last: AtomicI64,
}

impl PlaceholderIds {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&self) -> i64 {
        let now = chrono::Utc::now().timestamp_millis();
        let previous = self
            .last
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |last| {
                Some(now.max(last + 1))
            })
            .unwrap_or_else(|last| last);

        -now.max(previous + 1)
    }
}

// =============================================================================
// Outcomes
// =============================================================================

/// Result of [`OrderService::submit_order`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(into = "SubmitResponse")]
pub enum SubmitOutcome {
    /// The server committed the order.
    Committed {
        order_id: i64,
        loyalty: Option<LoyaltyAward>,
    },
    /// The order is in the offline queue.
    Queued { placeholder_id: i64, sequence: i64 },
    /// The order itself is invalid. Nothing was queued.
    Rejected { reason: String },
    /// The order could not be stored locally.
    Failed { reason: String },
}

impl SubmitOutcome {
    pub fn success(&self) -> bool {
        matches!(self, SubmitOutcome::Committed { .. } | SubmitOutcome::Queued { .. })
    }

    /// Server id, or the negative placeholder for a queued order.
    pub fn order_id(&self) -> Option<i64> {
        match self {
            SubmitOutcome::Committed { order_id, .. } => Some(*order_id),
            SubmitOutcome::Queued { placeholder_id, .. } => Some(*placeholder_id),
            _ => None,
        }
    }

    pub fn is_offline(&self) -> bool {
        matches!(self, SubmitOutcome::Queued { .. })
    }
}

/// The UI-facing form: `{ success, orderId, offline, ... }`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_id: Option<i64>,
    pub offline: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loyalty: Option<LoyaltyAward>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<SubmitOutcome> for SubmitResponse {
    fn from(outcome: SubmitOutcome) -> Self {
        let success = outcome.success();
        let order_id = outcome.order_id();
        let offline = outcome.is_offline();

        let (loyalty, error) = match outcome {
            SubmitOutcome::Committed { loyalty, .. } => (loyalty, None),
            SubmitOutcome::Queued { .. } => (None, None),
            SubmitOutcome::Rejected { reason } | SubmitOutcome::Failed { reason } => {
                (None, Some(reason))
            }
        };

        SubmitResponse {
            success,
            order_id,
            offline,
            loyalty,
            error,
        }
    }
}

/// Result of [`OrderService::submit_operation`] for non-order writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    Sent { id: Option<i64> },
    Queued { sequence: i64 },
    Rejected { reason: String },
    Failed { reason: String },
}

impl WriteOutcome {
    pub fn success(&self) -> bool {
        matches!(self, WriteOutcome::Sent { .. } | WriteOutcome::Queued { .. })
    }
}

// =============================================================================
// Order Service
// =============================================================================

/// Where the first attempt at a write ended up.
enum Attempt {
    Sent(Option<i64>),
    Rejected(String),
    Queue,
}

/// Online-or-queue submission of orders and other writes.
pub struct OrderService {
    db: Database,
    api: Arc<dyn ServerApi>,
    connectivity: Arc<ConnectivityMonitor>,
    placeholders: PlaceholderIds,
}

impl OrderService {
    pub fn new(
        db: Database,
        api: Arc<dyn ServerApi>,
        connectivity: Arc<ConnectivityMonitor>,
    ) -> Self {
        OrderService {
            db,
            api,
            connectivity,
            placeholders: PlaceholderIds::new(),
        }
    }

    /// Commits an order online, or queues it.
    ///
    /// Only a local store failure makes the submission unsuccessful; every
    /// transport failure ends in the queue.
    pub async fn submit_order(&self, draft: OrderDraft) -> SubmitOutcome {
        let customer_id = draft.customer_id;
        let total = draft.total_amount;
        let submission_id = draft.client_submission_id;
        let operation = SyncOperation::Order(draft);

        match self.attempt(&operation).await {
            Attempt::Sent(Some(order_id)) => {
                info!(order_id, "Order committed online");
                let loyalty = match customer_id {
                    Some(customer_id) => self.award_loyalty(customer_id, total, order_id).await,
                    None => None,
                };
                return SubmitOutcome::Committed { order_id, loyalty };
            }
            Attempt::Sent(None) => {
                // The server may already hold this order. The replay carries the
                // same client_submission_id, so a server that dedupes on it
                // keeps one copy; one that ignores it records the sale twice.
                warn!(
                    client_submission_id = %submission_id,
                    "Order acknowledged without an orderId; queueing"
                );
            }
            Attempt::Rejected(reason) => return SubmitOutcome::Rejected { reason },
            Attempt::Queue => {}
        }

        match self.db.sync_queue().enqueue(&operation).await {
            Ok(entry) => {
                let placeholder_id = self.placeholders.next();
                info!(
                    sequence = entry.sequence,
                    placeholder_id, "Order queued for sync"
                );
                SubmitOutcome::Queued {
                    placeholder_id,
                    sequence: entry.sequence,
                }
            }
            Err(e) => {
                error!(error = %e, "Failed to queue order");
                SubmitOutcome::Failed {
                    reason: e.to_string(),
                }
            }
        }
    }

    /// Sends a waste, purchase, transfer (or order) write online, or queues it.
    pub async fn submit_operation(&self, operation: SyncOperation) -> WriteOutcome {
        match self.attempt(&operation).await {
            Attempt::Sent(id) => return WriteOutcome::Sent { id },
            Attempt::Rejected(reason) => return WriteOutcome::Rejected { reason },
            Attempt::Queue => {}
        }

        match self.db.sync_queue().enqueue(&operation).await {
            Ok(entry) => WriteOutcome::Queued {
                sequence: entry.sequence,
            },
            Err(e) => {
                error!(kind = %operation.kind(), error = %e, "Failed to queue operation");
                WriteOutcome::Failed {
                    reason: e.to_string(),
                }
            }
        }
    }

    /// Number of writes waiting in the queue.
    pub async fn pending_count(&self) -> SyncResult<u64> {
        Ok(self.db.sync_queue().count().await?)
    }

    async fn attempt(&self, operation: &SyncOperation) -> Attempt {
        if let Err(e) = validate_operation(operation) {
            warn!(kind = %operation.kind(), error = %e, "Rejected invalid operation");
            return Attempt::Rejected(SyncError::from(e).to_string());
        }

        if !self.connectivity.is_online() {
            return Attempt::Queue;
        }

        match self.api.submit(operation).await {
            Ok(ack) => Attempt::Sent(ack.id),
            Err(e) if e.is_rejection() => {
                warn!(kind = %operation.kind(), error = %e, "Server rejected operation");
                Attempt::Rejected(e.to_string())
            }
            Err(e) => {
                warn!(kind = %operation.kind(), error = %e, "Online submission failed; queueing");
                Attempt::Queue
            }
        }
    }

    async fn award_loyalty(
        &self,
        customer_id: i64,
        total: meridian_core::Money,
        order_id: i64,
    ) -> Option<LoyaltyAward> {
        let points = points_for_total(total);
        if points <= 0 {
            return None;
        }

        let credit = LoyaltyCredit {
            customer_id,
            points_to_add: points,
            order_id: Some(order_id),
        };

        match self.api.add_loyalty_points(&credit).await {
            Ok(new_total) => {
                info!(customer_id, points, new_total, "Loyalty points credited");
                Some(LoyaltyAward::credited(customer_id, points, new_total))
            }
            Err(e) => {
                warn!(customer_id, points, error = %e, "Failed to credit loyalty points");
                Some(LoyaltyAward::unconfirmed(customer_id, points))
            }
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
