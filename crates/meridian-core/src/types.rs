//! # Domain Types
//!
//! Reference data the register mirrors from the server, plus the small
//! enums orders are built from.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Reference Data                                  │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Branch       │   │    Category     │   │    Product      │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (server)    │◄──┤  id (server)    │◄──┤  id (server)    │       │
//! │  │  name           │   │  name           │   │  category_id    │       │
//! │  │  location       │   └─────────────────┘   │  price, unit    │       │
//! │  └────────▲────────┘                         │  stock_quantity │       │
//! │           │                                  │  (per branch)   │       │
//! │  ┌────────┴────────┐   ┌─────────────────┐   └─────────────────┘       │
//! │  │      User       │   │ ReceiptSettings │                              │
//! │  │  role, pin      │   │ (secondary)     │                              │
//! │  │  branch_id      │   └─────────────────┘                              │
//! │  └─────────────────┘                                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Identity
//! Ids are server-assigned integers. The register never invents ids for
//! reference data; it only mirrors what the server returned last.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;

// =============================================================================
// Branch & Category
// =============================================================================

/// A physical store location. Stock and orders are scoped per branch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Branch {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub location: Option<String>,
}

/// Product grouping shown as tabs on the register.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Category {
    pub id: i64,
    pub name: String,
}

// =============================================================================
// Product
// =============================================================================

/// How a product is sold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum ProductUnit {
    /// Weighed at the counter; quantities are fractional kilograms.
    Kg,
    /// Counted items. Unrecognized units fall back here.
    #[default]
    #[serde(other)]
    Piece,
}

/// A product as seen by one branch, including that branch's stock level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Product {
    pub id: i64,

    #[serde(default)]
    pub category_id: Option<i64>,

    pub name: String,

    /// Selling price per unit.
    #[ts(type = "number")]
    pub price: Money,

    /// Purchase cost per unit, sent with each order line for margin reporting.
    #[serde(default)]
    #[ts(type = "number")]
    pub cost_price: Money,

    #[serde(default)]
    pub unit: ProductUnit,

    #[serde(default)]
    pub barcode: Option<String>,

    #[serde(default)]
    pub image_url: Option<String>,

    /// Branch stock at the time of the last refresh. Stale while offline.
    #[serde(default, with = "rust_decimal::serde::float")]
    #[ts(type = "number")]
    pub stock_quantity: Decimal,

    #[serde(default = "default_low_stock_threshold", with = "rust_decimal::serde::float")]
    #[ts(type = "number")]
    pub low_stock_threshold: Decimal,
}

fn default_low_stock_threshold() -> Decimal {
    Decimal::TEN
}

impl Product {
    /// True once stock has fallen to or below the alert threshold.
    pub fn is_low_stock(&self) -> bool {
        self.stock_quantity <= self.low_stock_threshold
    }

    /// True for products priced per kilogram.
    pub fn is_weighed(&self) -> bool {
        self.unit == ProductUnit::Kg
    }
}

// =============================================================================
// User
// =============================================================================

/// Register operator role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Admin,
    BranchManager,
    Cashier,
    /// Role string this build doesn't know about.
    #[serde(other)]
    Other,
}

/// A register operator, mirrored so the register can log in offline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub pin: String,
    pub role: UserRole,
    #[serde(default)]
    pub branch_id: Option<i64>,
    #[serde(default)]
    pub branch_name: Option<String>,
}

// =============================================================================
// Payment Method
// =============================================================================

/// How the customer paid. Sent to the server as a lowercase string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Cash,
    Card,
    /// Paid with loyalty-partner points.
    Qitaf,
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentMethod::Cash => write!(f, "cash"),
            PaymentMethod::Card => write!(f, "card"),
            PaymentMethod::Qitaf => write!(f, "qitaf"),
        }
    }
}

// =============================================================================
// Receipt Settings
// =============================================================================

/// Store-wide receipt header/footer text. Pulled only when a refresh asks
/// for secondary settings, then cached for offline printing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(default)]
pub struct ReceiptSettings {
    pub store_name: String,
    pub branch_default_name: String,
    pub tax_number: String,
    pub invoice_type: String,
    pub thank_you_message: String,
    pub return_policy: String,
    pub qr_code_image_url: Option<String>,
}

// =============================================================================
// Unit Tests
// =============================================================================
