//! # Money Module
//!
//! Provides the `Money` type for handling monetary values safely.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  In floating point:                                                     │
//! │    0.1 + 0.2 = 0.30000000000000004  ❌ WRONG!                           │
//! │                                                                         │
//! │  In a VAT-extracting system this is fatal:                             │
//! │    €123.00 / 1.23 = 100.00000000000001 → stored totals drift,          │
//! │    reconciliation flags phantom inconsistencies                        │
//! │                                                                         │
//! │  OUR SOLUTION: Integer Cents                                            │
//! │    12300 cents net-of-VAT at 23% = exactly 10000 cents                 │
//! │    Rounding is explicit, in one place, in integer math                 │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use harbor_core::money::Money;
//! use harbor_core::tax::TaxRate;
//!
//! // Create from cents (preferred)
//! let price = Money::from_cents(12300); // €123.00
//!
//! // Extract VAT from a tax-inclusive amount at 23%
//! let net = price.net_of_inclusive(TaxRate::from_bps(2300));
//! assert_eq!(net.cents(), 10000); // €100.00
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Mul, Sub, SubAssign};

use crate::tax::TaxRate;

// =============================================================================
// Money Type
// =============================================================================

/// Represents a monetary value in the smallest currency unit (cents).
///
/// ## Design Decisions
/// - **i64 (signed)**: Allows negative values for drift deltas and corrections
/// - **Single field tuple struct**: Zero-cost abstraction over i64
/// - **Derives**: Full serde support for JSON serialization
///
/// Every monetary value in the system flows through this type: catalog
/// prices, line subtotals, tax amounts, stored aggregates and the
/// reconciliation deltas between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from cents (the smallest currency unit).
    ///
    /// ## Example
    /// ```rust
    /// use harbor_core::money::Money;
    ///
    /// let price = Money::from_cents(1099); // Represents €10.99
    /// assert_eq!(price.cents(), 1099);
    /// ```
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Returns the value in cents (smallest currency unit).
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Returns the major unit (euros) portion.
    #[inline]
    pub const fn euros(&self) -> i64 {
        self.0 / 100
    }

    /// Returns the minor unit (cents) portion (always 0-99).
    #[inline]
    pub const fn cents_part(&self) -> i64 {
        (self.0 % 100).abs()
    }

    /// Returns zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    /// Checks if the value is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Checks if the value is positive (greater than zero).
    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Checks if the value is negative (less than zero).
    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Returns the absolute value.
    #[inline]
    pub const fn abs(&self) -> Self {
        Money(self.0.abs())
    }

    /// Calculates tax on a tax-exclusive (net) amount.
    ///
    /// `tax = net × rate`, rounded half-up in integer math.
    ///
    /// ## Implementation
    /// We use integer math: `(amount × bps + 5000) / 10000`.
    /// i128 intermediates prevent overflow on large amounts.
    ///
    /// ## Example
    /// ```rust
    /// use harbor_core::money::Money;
    /// use harbor_core::tax::TaxRate;
    ///
    /// let net = Money::from_cents(10000);      // €100.00
    /// let rate = TaxRate::from_bps(2300);      // 23%
    /// assert_eq!(net.tax_on_exclusive(rate).cents(), 2300); // €23.00
    /// ```
    pub fn tax_on_exclusive(&self, rate: TaxRate) -> Money {
        let tax_cents = (self.0 as i128 * rate.bps() as i128 + 5000) / 10000;
        Money::from_cents(tax_cents as i64)
    }

    /// Extracts the net portion from a tax-inclusive (gross) amount.
    ///
    /// `net = gross / (1 + rate)`, rounded half-up in integer math.
    /// The tax portion is then `gross − net`, so net + tax always
    /// reconstructs the gross exactly - no cent is ever lost between
    /// the two components.
    ///
    /// ## Example
    /// ```rust
    /// use harbor_core::money::Money;
    /// use harbor_core::tax::TaxRate;
    ///
    /// let gross = Money::from_cents(12300);    // €123.00 incl. 23% VAT
    /// let rate = TaxRate::from_bps(2300);
    /// assert_eq!(gross.net_of_inclusive(rate).cents(), 10000);
    /// assert_eq!(gross.tax_in_inclusive(rate).cents(), 2300);
    /// ```
    pub fn net_of_inclusive(&self, rate: TaxRate) -> Money {
        let divisor = 10000 + rate.bps() as i128;
        let net_cents = (self.0 as i128 * 10000 + divisor / 2) / divisor;
        Money::from_cents(net_cents as i64)
    }

    /// Returns the tax portion embedded in a tax-inclusive (gross) amount.
    ///
    /// Defined as `gross − net_of_inclusive(gross)` so the two components
    /// always sum back to the gross.
    pub fn tax_in_inclusive(&self, rate: TaxRate) -> Money {
        *self - self.net_of_inclusive(rate)
    }

    /// Multiplies money by a quantity.
    ///
    /// ## Example
    /// ```rust
    /// use harbor_core::money::Money;
    ///
    /// let unit_price = Money::from_cents(299); // €2.99
    /// assert_eq!(unit_price.multiply_quantity(3).cents(), 897);
    /// ```
    #[inline]
    pub const fn multiply_quantity(&self, qty: i64) -> Self {
        Money(self.0 * qty)
    }

    /// Returns the larger of two Money values.
    #[inline]
    pub fn max(self, other: Self) -> Self {
        if self.0 >= other.0 {
            self
        } else {
            other
        }
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Display implementation shows money in a human-readable format.
///
/// ## Note
/// This is for logs and diagnostics. Consumers format for display
/// themselves to handle localization properly.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}€{}.{:02}", sign, self.euros().abs(), self.cents_part())
    }
}

/// Default money is zero.
impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

/// Addition of two Money values.
impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

/// Addition assignment (+=).
impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

/// Subtraction of two Money values.
impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

/// Subtraction assignment (-=).
impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

/// Multiplication by integer (for quantity calculations).
impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        Money(self.0 * qty)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_cents() {
        let money = Money::from_cents(1099);
        assert_eq!(money.cents(), 1099);
        assert_eq!(money.euros(), 10);
        assert_eq!(money.cents_part(), 99);
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", Money::from_cents(1099)), "€10.99");
        assert_eq!(format!("{}", Money::from_cents(500)), "€5.00");
        assert_eq!(format!("{}", Money::from_cents(-550)), "-€5.50");
        assert_eq!(format!("{}", Money::from_cents(0)), "€0.00");
    }

    #[test]
    fn test_arithmetic() {
        let a = Money::from_cents(1000);
        let b = Money::from_cents(500);

        assert_eq!((a + b).cents(), 1500);
        assert_eq!((a - b).cents(), 500);
        assert_eq!((a * 3).cents(), 3000);
    }

    #[test]
    fn test_tax_on_exclusive() {
        // €100.00 at 23% = €23.00
        let net = Money::from_cents(10000);
        assert_eq!(net.tax_on_exclusive(TaxRate::from_bps(2300)).cents(), 2300);

        // €100.00 at 13.5% = €13.50
        assert_eq!(net.tax_on_exclusive(TaxRate::from_bps(1350)).cents(), 1350);
    }

    #[test]
    fn test_tax_on_exclusive_rounds() {
        // €0.99 at 23% = 22.77c → €0.23
        let net = Money::from_cents(99);
        assert_eq!(net.tax_on_exclusive(TaxRate::from_bps(2300)).cents(), 23);
    }

    #[test]
    fn test_net_of_inclusive() {
        // €123.00 gross at 23% → €100.00 net, €23.00 tax
        let gross = Money::from_cents(12300);
        let rate = TaxRate::from_bps(2300);
        assert_eq!(gross.net_of_inclusive(rate).cents(), 10000);
        assert_eq!(gross.tax_in_inclusive(rate).cents(), 2300);
    }

    #[test]
    fn test_inclusive_components_sum_to_gross() {
        // Whatever the rounding does, net + tax must equal gross exactly
        let rate = TaxRate::from_bps(2300);
        for cents in [1, 7, 99, 101, 12345, 999_999] {
            let gross = Money::from_cents(cents);
            let net = gross.net_of_inclusive(rate);
            let tax = gross.tax_in_inclusive(rate);
            assert_eq!((net + tax).cents(), cents);
        }
    }

    #[test]
    fn test_exclusive_then_inclusive_round_trip() {
        // Exclusive compute followed by inclusive extraction of the
        // resulting gross returns the original net within 1 cent
        let rate = TaxRate::from_bps(2300);
        for cents in [100, 999, 10000, 123456] {
            let net = Money::from_cents(cents);
            let gross = net + net.tax_on_exclusive(rate);
            let back = gross.net_of_inclusive(rate);
            assert!((back.cents() - cents).abs() <= 1);
        }
    }

    #[test]
    fn test_zero_and_checks() {
        let zero = Money::zero();
        assert!(zero.is_zero());
        assert!(!zero.is_positive());
        assert!(!zero.is_negative());

        let negative = Money::from_cents(-100);
        assert!(negative.is_negative());
        assert_eq!(negative.abs().cents(), 100);
    }

    #[test]
    fn test_multiply_quantity() {
        let unit_price = Money::from_cents(299);
        assert_eq!(unit_price.multiply_quantity(3).cents(), 897);
    }

    #[test]
    fn test_max() {
        let a = Money::from_cents(-50);
        assert_eq!(a.max(Money::zero()).cents(), 0);
        assert_eq!(Money::from_cents(70).max(Money::zero()).cents(), 70);
    }
}
