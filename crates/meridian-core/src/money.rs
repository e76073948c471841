//! # Money Module
//!
//! Provides the `Money` type for handling monetary values exactly.
//!
//! ## Why Decimal Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  In binary floating point:                                              │
//! │    0.1 + 0.2 = 0.30000000000000004  ❌ WRONG!                           │
//! │                                                                         │
//! │  Tax on weighed goods regularly lands on tenths of a halala:           │
//! │    22.5 × 15% = 3.375               (must stay 3.375, not 3.38)         │
//! │                                                                         │
//! │  OUR SOLUTION: rust_decimal                                             │
//! │    Base-10 arithmetic, no rounding until someone asks for it.          │
//! │    On the wire it is still a plain JSON number.                        │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use meridian_core::money::Money;
//! use rust_decimal::Decimal;
//!
//! let price = Money::from_minor(1099); // 10.99
//! let line = price.multiply_quantity(Decimal::new(2, 0));
//! assert_eq!(line, Money::from_minor(2198));
//! ```

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Sub, SubAssign};

use crate::pricing::TaxRate;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in major units (riyal, dollar), stored as an exact decimal.
///
/// ## User Workflow Context
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │                    Where Money is Used                                  │
/// │                                                                         │
/// │  Product.price ──┬──► OrderLine.price ──► OrderLine.total               │
/// │                  │                                                      │
/// │                  └──► Displayed on the register screen                  │
/// │                                                                         │
/// │  Σ line totals ──► discount ──► tax ──► OrderDraft.total_amount         │
/// │                                                                         │
/// │  Serialized as a JSON number for the server and the sync queue          │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(#[serde(with = "rust_decimal::serde::float")] Decimal);

impl Money {
    /// Creates a Money value from minor units (2 decimal places).
    ///
    /// ## Example
    /// ```rust
    /// use meridian_core::money::Money;
    ///
    /// let price = Money::from_minor(1099);
    /// assert_eq!(price.to_string(), "10.99");
    /// ```
    #[inline]
    pub fn from_minor(minor: i64) -> Self {
        Money(Decimal::new(minor, 2))
    }

    /// Wraps an existing decimal.
    #[inline]
    pub const fn from_decimal(value: Decimal) -> Self {
        Money(value)
    }

    /// Converts a float coming from a UI or JSON boundary.
    ///
    /// Returns `None` for NaN and infinities.
    pub fn from_f64(value: f64) -> Option<Self> {
        Decimal::from_f64(value).map(Money)
    }

    /// Returns the underlying decimal.
    #[inline]
    pub const fn as_decimal(&self) -> Decimal {
        self.0
    }

    /// Lossy conversion for display layers that only speak floats.
    pub fn to_f64(&self) -> f64 {
        self.0.to_f64().unwrap_or_default()
    }

    /// Returns zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(Decimal::ZERO)
    }

    /// Checks if the value is zero.
    #[inline]
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Checks if the value is positive (greater than zero).
    #[inline]
    pub fn is_positive(&self) -> bool {
        self.0 > Decimal::ZERO
    }

    /// Checks if the value is negative (less than zero).
    #[inline]
    pub fn is_negative(&self) -> bool {
        self.0 < Decimal::ZERO
    }

    /// Calculates tax at the given rate. No rounding is applied.
    ///
    /// ## Example
    /// ```rust
    /// use meridian_core::money::Money;
    /// use meridian_core::pricing::TaxRate;
    ///
    /// let taxable = Money::from_minor(2250); // 22.50
    /// let tax = taxable.calculate_tax(TaxRate::from_bps(1500));
    /// assert_eq!(tax.to_string(), "3.375");
    /// ```
    pub fn calculate_tax(&self, rate: TaxRate) -> Money {
        Money(self.0.saturating_mul(Decimal::from(rate.bps())) / Decimal::from(10_000))
    }

    /// Returns `percent`% of this amount.
    ///
    /// ## Example
    /// ```rust
    /// use meridian_core::money::Money;
    /// use rust_decimal::Decimal;
    ///
    /// let subtotal = Money::from_minor(2500);
    /// let discount = subtotal.percentage(Decimal::new(10, 0));
    /// assert_eq!(discount.to_string(), "2.5");
    /// ```
    pub fn percentage(&self, percent: Decimal) -> Money {
        Money(self.0.saturating_mul(percent) / Decimal::ONE_HUNDRED)
    }

    /// Multiplies a unit price by a (possibly fractional) quantity.
    ///
    /// Saturates at `Decimal::MAX` instead of panicking.
    ///
    /// ## User Workflow
    /// ```text
    /// Bananas 6.50/kg, scale label 1.250 kg
    ///      │
    ///      ▼
    /// multiply_quantity(1.250) ← THIS FUNCTION
    ///      │
    ///      ▼
    /// Line Total: 8.125
    /// ```
    #[inline]
    pub fn multiply_quantity(&self, qty: Decimal) -> Self {
        Money(self.0.saturating_mul(qty))
    }

    /// True when the two amounts differ by at most `tolerance`.
    ///
    /// ```rust
    /// use meridian_core::money::Money;
    /// use rust_decimal::Decimal;
    ///
    /// let float_sum = Money::from_f64(3.3000000000000003).unwrap();
    /// assert!(float_sum.approx_eq(Money::from_minor(330), Decimal::new(1, 3)));
    /// ```
    pub fn approx_eq(&self, other: Money, tolerance: Decimal) -> bool {
        self.0.saturating_sub(other.0).abs() <= tolerance
    }

    /// Number of whole `unit`s contained in this amount (rounded down).
    ///
    /// Negative amounts and non-positive units yield zero.
    pub fn whole_units_of(&self, unit: i64) -> i64 {
        if unit <= 0 || !self.is_positive() {
            return 0;
        }
        (self.0 / Decimal::from(unit)).floor().to_i64().unwrap_or(0)
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Normalized decimal: `25.00` prints as `25`, `3.3750` as `3.375`.
///
/// Currency symbols and fixed places are a receipt concern.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.normalize())
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0.saturating_add(other.0))
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 = self.0.saturating_add(other.0);
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0.saturating_sub(other.0))
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 = self.0.saturating_sub(other.0);
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), Add::add)
    }
}

impl From<Decimal> for Money {
    fn from(value: Decimal) -> Self {
        Money(value)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_minor() {
        let money = Money::from_minor(1099);
        assert_eq!(money.as_decimal(), Decimal::new(1099, 2));
        assert_eq!(money.to_string(), "10.99");
    }

    #[test]
    fn test_display_is_normalized() {
        assert_eq!(Money::from_minor(2500).to_string(), "25");
        assert_eq!(Money::from_minor(250).to_string(), "2.5");
        assert_eq!(Money::zero().to_string(), "0");
    }

    #[test]
    fn test_arithmetic() {
        let a = Money::from_minor(1000);
        let b = Money::from_minor(500);

        assert_eq!(a + b, Money::from_minor(1500));
        assert_eq!(a - b, Money::from_minor(500));

        let total: Money = vec![a, b, b].into_iter().sum();
        assert_eq!(total, Money::from_minor(2000));
    }

    #[test]
    fn test_tax_is_not_rounded() {
        let taxable = Money::from_minor(2250);
        let tax = taxable.calculate_tax(TaxRate::from_bps(1500));
        assert_eq!(tax.as_decimal(), Decimal::new(3375, 3));
    }

    #[test]
    fn test_fractional_quantity() {
        let price = Money::from_minor(650);
        let line = price.multiply_quantity(Decimal::new(1250, 3));
        assert_eq!(line.as_decimal(), Decimal::new(8125, 3));
    }

    #[test]
    fn test_whole_units() {
        assert_eq!(Money::from_decimal(Decimal::new(25875, 3)).whole_units_of(10), 2);
        assert_eq!(Money::from_minor(999).whole_units_of(10), 0);
        assert_eq!(Money::from_minor(-5000).whole_units_of(10), 0);
        assert_eq!(Money::from_minor(5000).whole_units_of(0), 0);
    }

    #[test]
    fn test_serializes_as_json_number() {
        let money = Money::from_decimal(Decimal::new(25875, 3));
        let json = serde_json::to_string(&money).unwrap();
        assert_eq!(json, "25.875");

        let back: Money = serde_json::from_str("3.375").unwrap();
        assert_eq!(back.as_decimal(), Decimal::new(3375, 3));

        let whole: Money = serde_json::from_str("25").unwrap();
        assert_eq!(whole, Money::from_minor(2500));
    }

    #[test]
    fn test_from_f64() {
        assert_eq!(Money::from_f64(10.5), Some(Money::from_minor(1050)));
        assert_eq!(Money::from_f64(f64::NAN), None);
    }

    #[test]
    fn test_zero_and_checks() {
        let zero = Money::zero();
        assert!(zero.is_zero());
        assert!(!zero.is_positive());
        assert!(!zero.is_negative());

        let negative = Money::from_minor(-100);
        assert!(negative.is_negative());
        assert!(!negative.is_positive());
    }

    #[test]
    fn test_huge_amounts_saturate() {
        let huge = Money::from_decimal(Decimal::from(10u64.pow(15)));
        let line = huge.multiply_quantity(Decimal::from(10u64.pow(15)));
        assert_eq!(line.as_decimal(), Decimal::MAX);

        let sum: Money = vec![line, line].into_iter().sum();
        assert_eq!(sum.as_decimal(), Decimal::MAX);
        assert!(sum.calculate_tax(TaxRate::from_bps(1500)).is_positive());
        assert!(sum.percentage(Decimal::new(50, 0)).is_positive());
        assert_eq!(Money::from_decimal(Decimal::MIN) - line, Money::from_decimal(Decimal::MIN));
    }

    #[test]
    fn test_approx_eq() {
        let exact = Money::from_decimal(Decimal::new(3795, 3));
        let float = Money::from_f64(3.7950000000000004).unwrap();

        assert!(exact.approx_eq(float, Decimal::new(1, 3)));
        assert!(!exact.approx_eq(Money::from_minor(380), Decimal::new(1, 3)));
    }
}
