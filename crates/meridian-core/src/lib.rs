//! # meridian-core: Pure Business Logic for Meridian POS
//!
//! Everything a register needs to decide *what* to write, without deciding
//! *where* or *when* it gets written. Storage lives in `meridian-db`, the
//! server conversation and offline queue replay live in `meridian-sync`.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Meridian Register Architecture                     │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    Register UI (external)                       │   │
//! │  │    Scan ──► Cart ──► Payment ──► submit_order()                 │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    meridian-sync                                │   │
//! │  │    OrderService, SyncEngine, CacheRefresher, Connectivity       │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ meridian-core (THIS CRATE) ★                    │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   order   │  │  pricing  │  │ operation │  │   scale   │  │   │
//! │  │   │ OrderDraft│  │OrderTotals│  │SyncOperat.│  │ScanInput  │  │   │
//! │  │   │ OrderLine │  │  Money    │  │ QueueEntry│  │ loyalty   │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                  meridian-db (Local Durable Store)              │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Reference data (Branch, Category, Product, User, settings)
//! - [`money`] - Exact decimal `Money`
//! - [`pricing`] - The fixed discount/tax policy
//! - [`order`] - Order drafts and line items
//! - [`operation`] - Queued write operations and queue entries
//! - [`scale`] - Weighed-item barcode decoding
//! - [`loyalty`] - Points earned per order
//! - [`validation`] - Checks run before anything is sent or queued
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use meridian_core::money::Money;
//! use meridian_core::pricing::OrderTotals;
//! use rust_decimal::Decimal;
//!
//! let totals = OrderTotals::compute(
//!     [Money::from_minor(2000), Money::from_minor(500)],
//!     Decimal::new(10, 0), // 10% discount
//! );
//!
//! assert_eq!(totals.subtotal, Money::from_minor(2500));
//! assert_eq!(totals.total.to_string(), "25.875");
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod loyalty;
pub mod money;
pub mod operation;
pub mod order;
pub mod pricing;
pub mod scale;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use loyalty::{LoyaltyAward, RewardHint};
pub use money::Money;
pub use operation::{
    OperationKind, PurchaseInvoice, PurchaseLine, StockTransfer, SyncOperation, SyncQueueEntry,
    WasteRecord,
};
pub use order::{OrderDraft, OrderLine};
pub use pricing::{OrderTotals, TaxRate};
pub use scale::{ScanInput, ScanMatch};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Standard VAT applied to every order, after discount.
pub const STANDARD_TAX_RATE: TaxRate = TaxRate::from_bps(1500);

/// Maximum line items accepted in a single order draft.
pub const MAX_ORDER_LINES: usize = 200;

/// Largest quantity (units, or kilograms for weighed goods) on one line.
pub const MAX_LINE_QUANTITY: i64 = 100_000;

/// Largest unit price or cost accepted on a line.
pub const MAX_UNIT_AMOUNT: i64 = 10_000_000;

/// Spend required for one loyalty point.
pub const SPEND_PER_LOYALTY_POINT: i64 = 10;
