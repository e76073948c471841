//! # Pricing
//!
//! The one discount and tax policy every order goes through:
//!
//! ```text
//! subtotal        = Σ line.total
//! discount_amount = subtotal × discount_percent / 100
//! taxable         = subtotal − discount_amount
//! tax_amount      = taxable × 15%
//! total           = taxable + tax_amount
//! ```
//!
//! Totals are computed once, at checkout, and travel inside the order draft.
//! Nothing downstream recomputes them from later prices.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;
use crate::STANDARD_TAX_RATE;

// =============================================================================
// Tax Rate
// =============================================================================

/// Tax rate represented in basis points (bps).
///
/// 1 basis point = 0.01%, so 1500 bps = 15%.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TaxRate(u32);

impl TaxRate {
    /// Creates a tax rate from basis points.
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        TaxRate(bps)
    }

    /// Returns the rate in basis points.
    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Returns the rate as a percentage.
    #[inline]
    pub fn percentage(&self) -> Decimal {
        Decimal::new(i64::from(self.0), 2)
    }
}

impl Default for TaxRate {
    fn default() -> Self {
        STANDARD_TAX_RATE
    }
}

// =============================================================================
// Order Totals
// =============================================================================

/// Every money figure on an order, derived from its line totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderTotals {
    pub subtotal: Money,
    #[serde(with = "rust_decimal::serde::float")]
    pub discount_percent: Decimal,
    pub discount_amount: Money,
    pub taxable: Money,
    pub tax_amount: Money,
    pub total: Money,
}

impl OrderTotals {
    /// Applies the standard 15% policy.
    ///
    /// ## Example
    /// ```rust
    /// use meridian_core::money::Money;
    /// use meridian_core::pricing::OrderTotals;
    /// use rust_decimal::Decimal;
    ///
    /// let totals = OrderTotals::compute([Money::from_minor(10000)], Decimal::ZERO);
    /// assert_eq!(totals.tax_amount, Money::from_minor(1500));
    /// assert_eq!(totals.total, Money::from_minor(11500));
    /// ```
    pub fn compute<I>(line_totals: I, discount_percent: Decimal) -> Self
    where
        I: IntoIterator<Item = Money>,
    {
        Self::compute_with_rate(line_totals, discount_percent, STANDARD_TAX_RATE)
    }

    /// Same policy with an explicit rate.
    pub fn compute_with_rate<I>(line_totals: I, discount_percent: Decimal, rate: TaxRate) -> Self
    where
        I: IntoIterator<Item = Money>,
    {
        let subtotal: Money = line_totals.into_iter().sum();
        let discount_amount = subtotal.percentage(discount_percent);
        let taxable = subtotal - discount_amount;
        let tax_amount = taxable.calculate_tax(rate);

        OrderTotals {
            subtotal,
            discount_percent,
            discount_amount,
            taxable,
            tax_amount,
            total: taxable + tax_amount,
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
