//! # Validation Module
//!
//! Checks every write must pass before it is sent to the server or parked in
//! the sync queue.
//!
//! ## Where Validation Happens
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Register UI                                                  │
//! │  └── Immediate feedback (empty cart, bad weight)                       │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE (before send or enqueue)                         │
//! │  ├── Shape: ids, quantities, discount range                            │
//! │  └── Totals follow the discount/tax policy                             │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Server                                                       │
//! │  └── Stock, foreign keys, permissions (4xx → rejection)                │
//! │                                                                         │
//! │  A write failing layer 2 is a checkout failure. It is never queued,   │
//! │  since replaying it later could only fail again.                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use meridian_core::validation::{validate_discount_percent, validate_quantity};
//! use rust_decimal::Decimal;
//!
//! assert!(validate_quantity(Decimal::new(1250, 3)).is_ok());
//! assert!(validate_discount_percent(Decimal::new(101, 0)).is_err());
//! ```

use rust_decimal::Decimal;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::operation::{PurchaseInvoice, StockTransfer, SyncOperation, WasteRecord};
use crate::order::{OrderDraft, TOTALS_TOLERANCE};
use crate::{MAX_LINE_QUANTITY, MAX_ORDER_LINES, MAX_UNIT_AMOUNT};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// Field Validators
// =============================================================================

/// Validates a server-assigned id (branch, product, customer, supplier).
pub fn validate_id(field: &str, id: i64) -> ValidationResult<()> {
    if id <= 0 {
        return Err(ValidationError::MustBePositive {
            field: field.to_string(),
        });
    }
    Ok(())
}

/// Validates a line quantity. Fractional values are weights in kilograms.
pub fn validate_quantity(qty: Decimal) -> ValidationResult<()> {
    if qty <= Decimal::ZERO {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }
    if qty > Decimal::from(MAX_LINE_QUANTITY) {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: "0".to_string(),
            max: MAX_LINE_QUANTITY.to_string(),
        });
    }
    Ok(())
}

/// Validates an order discount, which must lie in `0..=100`.
pub fn validate_discount_percent(percent: Decimal) -> ValidationResult<()> {
    if percent < Decimal::ZERO || percent > Decimal::ONE_HUNDRED {
        return Err(ValidationError::OutOfRange {
            field: "discount_percent".to_string(),
            min: "0".to_string(),
            max: "100".to_string(),
        });
    }
    Ok(())
}

/// Validates a price or cost. Zero is allowed (free items).
pub fn validate_amount(field: &str, amount: Money) -> ValidationResult<()> {
    if amount.is_negative() {
        return Err(ValidationError::MustNotBeNegative {
            field: field.to_string(),
        });
    }
    if amount.as_decimal() > Decimal::from(MAX_UNIT_AMOUNT) {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: "0".to_string(),
            max: MAX_UNIT_AMOUNT.to_string(),
        });
    }
    Ok(())
}

fn validate_required(field: &str, value: &str) -> ValidationResult<()> {
    if value.trim().is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }
    Ok(())
}

fn validate_line_count(count: usize) -> ValidationResult<()> {
    if count == 0 {
        return Err(ValidationError::Required {
            field: "items".to_string(),
        });
    }
    if count > MAX_ORDER_LINES {
        return Err(ValidationError::TooMany {
            field: "items".to_string(),
            max: MAX_ORDER_LINES,
        });
    }
    Ok(())
}

// =============================================================================
// Write Validators
// =============================================================================

/// Validates the shape of an order draft.
///
/// Totals are checked separately by [`OrderDraft::verify_totals`]; use
/// [`validate_operation`] to run both.
pub fn validate_order_draft(draft: &OrderDraft) -> ValidationResult<()> {
    validate_id("branch_id", draft.branch_id)?;
    validate_line_count(draft.items.len())?;

    for line in &draft.items {
        validate_id("product_id", line.product_id)?;
        validate_quantity(line.quantity)?;
        validate_amount("price", line.price)?;
        validate_amount("cost_price", line.cost_price)?;
    }

    validate_discount_percent(draft.discount_percent)?;

    if let Some(customer_id) = draft.customer_id {
        validate_id("customer_id", customer_id)?;
    }

    Ok(())
}

fn validate_waste(record: &WasteRecord) -> ValidationResult<()> {
    validate_id("branch_id", record.branch_id)?;
    validate_id("product_id", record.product_id)?;
    validate_quantity(record.quantity)?;
    validate_required("reason", &record.reason)
}

fn validate_purchase(invoice: &PurchaseInvoice) -> CoreResult<()> {
    validate_id("branch_id", invoice.branch_id)?;
    validate_id("supplier_id", invoice.supplier_id)?;
    validate_line_count(invoice.items.len())?;

    for line in &invoice.items {
        validate_id("product_id", line.product_id)?;
        validate_quantity(line.quantity)?;
        validate_amount("cost_price", line.cost_price)?;
    }

    let expected: Money = invoice
        .items
        .iter()
        .map(|line| line.cost_price.multiply_quantity(line.quantity))
        .sum();

    if !invoice.total_amount.approx_eq(expected, TOTALS_TOLERANCE) {
        return Err(CoreError::TotalsMismatch {
            field: "total_amount".to_string(),
            expected: expected.to_string(),
            actual: invoice.total_amount.to_string(),
        });
    }

    Ok(())
}

fn validate_transfer(transfer: &StockTransfer) -> ValidationResult<()> {
    validate_id("from_branch_id", transfer.from_branch_id)?;
    validate_id("to_branch_id", transfer.to_branch_id)?;
    validate_id("product_id", transfer.product_id)?;
    validate_quantity(transfer.quantity)?;

    if transfer.from_branch_id == transfer.to_branch_id {
        return Err(ValidationError::MustDiffer {
            field: "to_branch_id".to_string(),
            other: "from_branch_id".to_string(),
        });
    }

    Ok(())
}

/// Full pre-flight check for any write, online or queued.
pub fn validate_operation(operation: &SyncOperation) -> CoreResult<()> {
    match operation {
        SyncOperation::Order(draft) => {
            validate_order_draft(draft)?;
            draft.verify_totals()
        }
        SyncOperation::Waste(record) => Ok(validate_waste(record)?),
        SyncOperation::Purchase(invoice) => validate_purchase(invoice),
        SyncOperation::Transfer(transfer) => Ok(validate_transfer(transfer)?),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
