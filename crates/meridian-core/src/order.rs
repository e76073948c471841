//! # Order Drafts
//!
//! An [`OrderDraft`] is the exact body the register sends to `POST /api/orders`
//! and, when that isn't possible, the exact payload it parks in the sync
//! queue. It is immutable once built: totals are frozen at checkout.
//!
//! ## Lifecycle
//! ```text
//! Cart lines ──► OrderDraft::from_lines() ──► submit_order()
//!                     │                            │
//!                     │ totals frozen here         ├── online  → server id (> 0)
//!                     │                            └── offline → queued, placeholder (< 0)
//!                     ▼
//!            client_submission_id (UUID v4) rides along in both paths
//! ```

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::pricing::OrderTotals;
use crate::types::{PaymentMethod, Product};

// =============================================================================
// Order Line
// =============================================================================

/// One cart line, priced at the moment of checkout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct OrderLine {
    pub product_id: i64,

    /// Pieces, or kilograms for weighed products.
    #[serde(with = "rust_decimal::serde::float")]
    #[ts(type = "number")]
    pub quantity: Decimal,

    /// Unit price.
    #[ts(type = "number")]
    pub price: Money,

    /// Unit cost.
    #[ts(type = "number")]
    pub cost_price: Money,

    /// `price × quantity`.
    #[ts(type = "number")]
    pub total: Money,
}

impl OrderLine {
    /// Prices a line from explicit figures.
    pub fn new(product_id: i64, quantity: Decimal, price: Money, cost_price: Money) -> Self {
        OrderLine {
            product_id,
            quantity,
            price,
            cost_price,
            total: price.multiply_quantity(quantity),
        }
    }

    /// Prices a line from a mirrored product.
    pub fn for_product(product: &Product, quantity: Decimal) -> Self {
        Self::new(product.id, quantity, product.price, product.cost_price)
    }
}

// =============================================================================
// Order Draft
// =============================================================================

/// Largest difference allowed between a stored figure and its recomputed
/// value. Well below half a minor unit, so any edit a receipt would show
/// is still caught.
pub const TOTALS_TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, 3);

/// A complete sale, ready to be committed or queued.
///
/// ## Wire Format
/// ```json
/// {
///   "branch_id": 1,
///   "items": [{ "product_id": 7, "quantity": 2, "price": 10, "cost_price": 6, "total": 20 }],
///   "subtotal": 25, "discount_percent": 10, "discount_amount": 2.5,
///   "tax_amount": 3.375, "total_amount": 25.875,
///   "payment_method": "cash",
///   "client_submission_id": "9b2f…", "created_at": "2026-…"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct OrderDraft {
    pub branch_id: i64,
    pub items: Vec<OrderLine>,

    #[ts(type = "number")]
    pub subtotal: Money,

    #[serde(with = "rust_decimal::serde::float")]
    #[ts(type = "number")]
    pub discount_percent: Decimal,

    #[ts(type = "number")]
    pub discount_amount: Money,

    #[ts(type = "number")]
    pub tax_amount: Money,

    #[ts(type = "number")]
    pub total_amount: Money,

    pub payment_method: PaymentMethod,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_id: Option<i64>,

    /// Idempotency key. The server may use it to drop a replayed duplicate.
    #[ts(type = "string")]
    pub client_submission_id: Uuid,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl OrderDraft {
    /// Builds a draft from priced lines, applying the standard discount/tax
    /// policy.
    ///
    /// ## Example
    /// ```rust
    /// use meridian_core::money::Money;
    /// use meridian_core::order::{OrderDraft, OrderLine};
    /// use meridian_core::types::PaymentMethod;
    /// use rust_decimal::Decimal;
    ///
    /// let draft = OrderDraft::from_lines(
    ///     1,
    ///     vec![OrderLine::new(7, Decimal::new(2, 0), Money::from_minor(1000), Money::zero())],
    ///     Decimal::ZERO,
    ///     PaymentMethod::Cash,
    ///     None,
    /// );
    /// assert_eq!(draft.total_amount.to_string(), "23");
    /// ```
    pub fn from_lines(
        branch_id: i64,
        items: Vec<OrderLine>,
        discount_percent: Decimal,
        payment_method: PaymentMethod,
        customer_id: Option<i64>,
    ) -> Self {
        let totals = OrderTotals::compute(items.iter().map(|line| line.total), discount_percent);

        OrderDraft {
            branch_id,
            items,
            subtotal: totals.subtotal,
            discount_percent: totals.discount_percent,
            discount_amount: totals.discount_amount,
            tax_amount: totals.tax_amount,
            total_amount: totals.total,
            payment_method,
            customer_id,
            client_submission_id: Uuid::new_v4(),
            created_at: Utc::now(),
        }
    }

    /// Recomputes totals from the draft's own lines.
    pub fn recompute_totals(&self) -> OrderTotals {
        OrderTotals::compute(self.items.iter().map(|line| line.total), self.discount_percent)
    }

    /// Checks that every stored figure follows the pricing policy, within
    /// [`TOTALS_TOLERANCE`].
    ///
    /// Drafts assembled by hand (or by an older UI) are checked here before
    /// they are sent or queued. A UI that does its sums in binary floats
    /// lands a few ulps off the exact decimal figures and still passes.
    pub fn verify_totals(&self) -> CoreResult<()> {
        let expected = self.recompute_totals();

        for line in &self.items {
            let line_total = line.price.multiply_quantity(line.quantity);
            if !line.total.approx_eq(line_total, TOTALS_TOLERANCE) {
                return Err(mismatch(
                    &format!("line total for product {}", line.product_id),
                    line_total,
                    line.total,
                ));
            }
        }

        let checks = [
            ("subtotal", expected.subtotal, self.subtotal),
            ("discount_amount", expected.discount_amount, self.discount_amount),
            ("tax_amount", expected.tax_amount, self.tax_amount),
            ("total_amount", expected.total, self.total_amount),
        ];

        for (field, expected, actual) in checks {
            if !actual.approx_eq(expected, TOTALS_TOLERANCE) {
                return Err(mismatch(field, expected, actual));
            }
        }

        Ok(())
    }
}

fn mismatch(field: &str, expected: Money, actual: Money) -> CoreError {
    CoreError::TotalsMismatch {
        field: field.to_string(),
        expected: expected.to_string(),
        actual: actual.to_string(),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn sample_draft() -> OrderDraft {
        OrderDraft::from_lines(
            1,
            vec![
                OrderLine::new(1, Decimal::new(2, 0), Money::from_minor(1000), Money::from_minor(600)),
                OrderLine::new(2, Decimal::ONE, Money::from_minor(500), Money::from_minor(300)),
            ],
            Decimal::new(10, 0),
            PaymentMethod::Cash,
            None,
        )
    }

    #[test]
    fn test_from_lines_freezes_totals() {
        let draft = sample_draft();

        assert_eq!(draft.subtotal.as_decimal(), Decimal::new(25, 0));
        assert_eq!(draft.discount_amount.as_decimal(), Decimal::new(25, 1));
        assert_eq!(draft.tax_amount.as_decimal(), Decimal::new(3375, 3));
        assert_eq!(draft.total_amount.as_decimal(), Decimal::new(25875, 3));
        assert!(draft.verify_totals().is_ok());
    }

    #[test]
    fn test_wire_body_uses_plain_numbers() {
        let body: Value = serde_json::to_value(sample_draft()).unwrap();

        assert_eq!(body["branch_id"], 1);
        assert_eq!(body["total_amount"].as_f64(), Some(25.875));
        assert_eq!(body["tax_amount"].as_f64(), Some(3.375));
        assert_eq!(body["discount_amount"].as_f64(), Some(2.5));
        assert_eq!(body["payment_method"], "cash");
        assert_eq!(body["items"][0]["total"].as_f64(), Some(20.0));
        assert!(body.get("customer_id").is_none());
        assert!(body["client_submission_id"].is_string());
    }

    #[test]
    fn test_each_draft_gets_its_own_submission_id() {
        assert_ne!(
            sample_draft().client_submission_id,
            sample_draft().client_submission_id
        );
    }

    #[test]
    fn test_verify_totals_catches_tampered_total() {
        let mut draft = sample_draft();
        draft.total_amount = Money::from_minor(2588);

        let err = draft.verify_totals().unwrap_err();
        assert!(matches!(err, CoreError::TotalsMismatch { ref field, .. } if field == "total_amount"));
    }

    #[test]
    fn test_verify_totals_catches_bad_line() {
        let mut draft = sample_draft();
        draft.items[1].total = Money::from_minor(600);

        assert!(draft.verify_totals().is_err());
    }

    #[test]
    fn test_float_computed_totals_pass() {
        // 1.1 * 3 and 15% tax as a JavaScript register computes them.
        let body = r#"{
            "branch_id": 1,
            "items": [{ "product_id": 4, "quantity": 3, "price": 1.1, "cost_price": 0.7, "total": 3.3000000000000003 }],
            "subtotal": 3.3000000000000003, "discount_percent": 0, "discount_amount": 0,
            "tax_amount": 0.495, "total_amount": 3.7950000000000004,
            "payment_method": "cash",
            "client_submission_id": "0d5c3f4e-8a51-4f7e-9d3a-2b6f1c9e7a10",
            "created_at": "2026-03-01T10:00:00Z"
        }"#;
        let draft: OrderDraft = serde_json::from_str(body).unwrap();

        assert!(draft.verify_totals().is_ok());
    }

    #[test]
    fn test_verify_totals_catches_sub_cent_edit() {
        let mut draft = sample_draft();
        draft.tax_amount = Money::from_decimal(Decimal::new(3380, 3));
        draft.total_amount = Money::from_decimal(Decimal::new(25880, 3));

        let err = draft.verify_totals().unwrap_err();
        assert!(matches!(err, CoreError::TotalsMismatch { ref field, .. } if field == "tax_amount"));
    }
}
