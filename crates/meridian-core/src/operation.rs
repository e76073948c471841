//! # Queued Write Operations
//!
//! Every write the register may have to hold back while offline, as a typed
//! tagged union. The sync queue stores `(kind, payload)` where `payload` is the
//! exact JSON body the server endpoint expects.
//!
//! ## Operation Kinds
//! ```text
//! ┌──────────────┬──────────────────┬─────────────────────────────────────┐
//! │ kind         │ payload          │ server effect                       │
//! ├──────────────┼──────────────────┼─────────────────────────────────────┤
//! │ order        │ OrderDraft       │ insert order, decrement stock       │
//! │ waste        │ WasteRecord      │ log waste, decrement stock          │
//! │ purchase     │ PurchaseInvoice  │ insert invoice, increment stock     │
//! │ transfer     │ StockTransfer    │ move stock between branches         │
//! └──────────────┴──────────────────┴─────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::order::OrderDraft;

// =============================================================================
// Operation Kind
// =============================================================================

/// Discriminant stored next to each queued payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Order,
    Waste,
    Purchase,
    Transfer,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Order => "order",
            OperationKind::Waste => "waste",
            OperationKind::Purchase => "purchase",
            OperationKind::Transfer => "transfer",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "order" => Ok(OperationKind::Order),
            "waste" => Ok(OperationKind::Waste),
            "purchase" => Ok(OperationKind::Purchase),
            "transfer" => Ok(OperationKind::Transfer),
            other => Err(CoreError::UnknownOperationKind(other.to_string())),
        }
    }
}

// =============================================================================
// Payloads
// =============================================================================

/// Spoiled or damaged stock written off at a branch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WasteRecord {
    pub branch_id: i64,
    pub product_id: i64,
    #[serde(with = "rust_decimal::serde::float")]
    pub quantity: Decimal,
    pub reason: String,
    #[serde(default = "Uuid::new_v4")]
    pub client_submission_id: Uuid,
}

impl WasteRecord {
    pub fn new(branch_id: i64, product_id: i64, quantity: Decimal, reason: impl Into<String>) -> Self {
        WasteRecord {
            branch_id,
            product_id,
            quantity,
            reason: reason.into(),
            client_submission_id: Uuid::new_v4(),
        }
    }
}

/// One received product on a supplier invoice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchaseLine {
    pub product_id: i64,
    #[serde(with = "rust_decimal::serde::float")]
    pub quantity: Decimal,
    pub cost_price: Money,
}

/// Goods received from a supplier into a branch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchaseInvoice {
    pub branch_id: i64,
    pub supplier_id: i64,
    pub total_amount: Money,
    pub items: Vec<PurchaseLine>,
    #[serde(default = "Uuid::new_v4")]
    pub client_submission_id: Uuid,
}

impl PurchaseInvoice {
    /// Builds an invoice whose total is the sum of `quantity × cost_price`.
    pub fn new(branch_id: i64, supplier_id: i64, items: Vec<PurchaseLine>) -> Self {
        let total_amount = items
            .iter()
            .map(|line| line.cost_price.multiply_quantity(line.quantity))
            .sum();

        PurchaseInvoice {
            branch_id,
            supplier_id,
            total_amount,
            items,
            client_submission_id: Uuid::new_v4(),
        }
    }
}

/// Stock moved from one branch to another.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockTransfer {
    pub from_branch_id: i64,
    pub to_branch_id: i64,
    pub product_id: i64,
    #[serde(with = "rust_decimal::serde::float")]
    pub quantity: Decimal,
    #[serde(default = "Uuid::new_v4")]
    pub client_submission_id: Uuid,
}

impl StockTransfer {
    pub fn new(from_branch_id: i64, to_branch_id: i64, product_id: i64, quantity: Decimal) -> Self {
        StockTransfer {
            from_branch_id,
            to_branch_id,
            product_id,
            quantity,
            client_submission_id: Uuid::new_v4(),
        }
    }
}

// =============================================================================
// Sync Operation
// =============================================================================

/// A write bound for the server, online now or replayed later.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload", rename_all = "snake_case")]
pub enum SyncOperation {
    Order(OrderDraft),
    Waste(WasteRecord),
    Purchase(PurchaseInvoice),
    Transfer(StockTransfer),
}

impl SyncOperation {
    pub fn kind(&self) -> OperationKind {
        match self {
            SyncOperation::Order(_) => OperationKind::Order,
            SyncOperation::Waste(_) => OperationKind::Waste,
            SyncOperation::Purchase(_) => OperationKind::Purchase,
            SyncOperation::Transfer(_) => OperationKind::Transfer,
        }
    }

    /// Idempotency key carried inside the payload.
    pub fn client_submission_id(&self) -> Uuid {
        match self {
            SyncOperation::Order(draft) => draft.client_submission_id,
            SyncOperation::Waste(record) => record.client_submission_id,
            SyncOperation::Purchase(invoice) => invoice.client_submission_id,
            SyncOperation::Transfer(transfer) => transfer.client_submission_id,
        }
    }

    /// Serializes only the request body, without the kind tag.
    pub fn payload_json(&self) -> CoreResult<String> {
        let encoded = match self {
            SyncOperation::Order(draft) => serde_json::to_string(draft),
            SyncOperation::Waste(record) => serde_json::to_string(record),
            SyncOperation::Purchase(invoice) => serde_json::to_string(invoice),
            SyncOperation::Transfer(transfer) => serde_json::to_string(transfer),
        };

        encoded.map_err(|e| invalid_payload(self.kind(), e))
    }

    /// Rebuilds an operation from a stored `(kind, payload)` pair.
    pub fn from_payload(kind: OperationKind, payload: &str) -> CoreResult<Self> {
        let decoded = match kind {
            OperationKind::Order => serde_json::from_str(payload).map(SyncOperation::Order),
            OperationKind::Waste => serde_json::from_str(payload).map(SyncOperation::Waste),
            OperationKind::Purchase => serde_json::from_str(payload).map(SyncOperation::Purchase),
            OperationKind::Transfer => serde_json::from_str(payload).map(SyncOperation::Transfer),
        };

        decoded.map_err(|e| invalid_payload(kind, e))
    }
}

fn invalid_payload(kind: OperationKind, err: serde_json::Error) -> CoreError {
    CoreError::InvalidPayload {
        kind: kind.to_string(),
        reason: err.to_string(),
    }
}

impl From<OrderDraft> for SyncOperation {
    fn from(draft: OrderDraft) -> Self {
        SyncOperation::Order(draft)
    }
}

impl From<WasteRecord> for SyncOperation {
    fn from(record: WasteRecord) -> Self {
        SyncOperation::Waste(record)
    }
}

impl From<PurchaseInvoice> for SyncOperation {
    fn from(invoice: PurchaseInvoice) -> Self {
        SyncOperation::Purchase(invoice)
    }
}

impl From<StockTransfer> for SyncOperation {
    fn from(transfer: StockTransfer) -> Self {
        SyncOperation::Transfer(transfer)
    }
}

// =============================================================================
// Sync Queue Entry
// =============================================================================

/// A write parked in the local sync queue.
///
/// `sequence` is the store's auto-increment id; replay order is ascending
/// `sequence` and nothing else.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncQueueEntry {
    pub sequence: i64,
    pub operation: SyncOperation,
    pub enqueued_at: DateTime<Utc>,
    /// Replay attempts that failed so far.
    #[serde(default)]
    pub attempts: u32,
    #[serde(default)]
    pub last_error: Option<String>,
}

impl SyncQueueEntry {
    pub fn kind(&self) -> OperationKind {
        self.operation.kind()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::OrderLine;
    use crate::types::PaymentMethod;

    #[test]
    fn test_kind_round_trips_through_str() {
        for kind in [
            OperationKind::Order,
            OperationKind::Waste,
            OperationKind::Purchase,
            OperationKind::Transfer,
        ] {
            assert_eq!(kind.as_str().parse::<OperationKind>().unwrap(), kind);
        }
        assert!("refund".parse::<OperationKind>().is_err());
    }

    #[test]
    fn test_payload_is_bare_request_body() {
        let op = SyncOperation::from(WasteRecord::new(1, 9, Decimal::new(15, 1), "spoiled"));
        let body: serde_json::Value = serde_json::from_str(&op.payload_json().unwrap()).unwrap();

        assert_eq!(body["branch_id"], 1);
        assert_eq!(body["product_id"], 9);
        assert_eq!(body["quantity"].as_f64(), Some(1.5));
        assert_eq!(body["reason"], "spoiled");
        assert!(body.get("kind").is_none());
    }

    #[test]
    fn test_order_payload_restores_exact_figures() {
        let draft = OrderDraft::from_lines(
            2,
            vec![OrderLine::new(5, Decimal::new(3, 0), Money::from_minor(1250), Money::zero())],
            Decimal::new(5, 0),
            PaymentMethod::Card,
            Some(44),
        );
        let op = SyncOperation::from(draft.clone());

        let restored = SyncOperation::from_payload(OperationKind::Order, &op.payload_json().unwrap()).unwrap();
        assert_eq!(restored, op);
        assert_eq!(restored.client_submission_id(), draft.client_submission_id);
    }

    #[test]
    fn test_mismatched_kind_is_rejected() {
        let op = SyncOperation::from(StockTransfer::new(1, 2, 3, Decimal::ONE));
        let err = SyncOperation::from_payload(OperationKind::Order, &op.payload_json().unwrap()).unwrap_err();

        assert!(matches!(err, CoreError::InvalidPayload { ref kind, .. } if kind == "order"));
    }

    #[test]
    fn test_purchase_total_is_sum_of_cost() {
        let invoice = PurchaseInvoice::new(
            1,
            3,
            vec![
                PurchaseLine { product_id: 1, quantity: Decimal::new(10, 0), cost_price: Money::from_minor(250) },
                PurchaseLine { product_id: 2, quantity: Decimal::new(5, 1), cost_price: Money::from_minor(800) },
            ],
        );
        assert_eq!(invoice.total_amount, Money::from_minor(2900));
    }
}
