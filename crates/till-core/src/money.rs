//! # Money Module
//!
//! Provides the `Money` type for handling monetary values safely.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  Stored as floats, 10% off 0.70 three times drifts:                     │
//! │    0.63 * 3 = 1.8900000000000001                                        │
//! │                                                                         │
//! │  OUR SOLUTION: Integer minor units                                      │
//! │    63 * 3 = 189, every intermediate value is exact                      │
//! │    Rounding happens in exactly one place: percentage_amount()           │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use till_core::money::Money;
//!
//! let price = Money::from_cents(1099);
//! let doubled = price * 2;
//! assert_eq!(doubled.cents(), 2198);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Mul, Sub, SubAssign};

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in the smallest currency unit.
///
/// ## Where Money Flows
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │  Product.price_cents ──► price_line() ──► OrderItem.discounted_price    │
/// │                                                                         │
/// │  OrderTotals.gross ── − item discounts ──► sub_total                    │
/// │                         − cart discount ──► total_amount                │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from cents.
    ///
    /// ```rust
    /// use till_core::money::Money;
    ///
    /// let price = Money::from_cents(1099);
    /// assert_eq!(price.cents(), 1099);
    /// ```
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Returns the value in cents.
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Returns the major unit portion.
    #[inline]
    pub const fn major(&self) -> i64 {
        self.0 / 100
    }

    /// Returns the minor unit portion (always 0-99).
    #[inline]
    pub const fn minor(&self) -> i64 {
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

    /// Checks if the value is negative (less than zero).
    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Clamps negative values to zero.
    ///
    /// ```rust
    /// use till_core::money::Money;
    ///
    /// assert_eq!(Money::from_cents(-5).non_negative(), Money::zero());
    /// assert_eq!(Money::from_cents(5).non_negative().cents(), 5);
    /// ```
    #[inline]
    pub fn non_negative(self) -> Self {
        Money(self.0.max(0))
    }

    /// Multiplies money by a quantity.
    ///
    /// ```rust
    /// use till_core::money::Money;
    ///
    /// let unit_price = Money::from_cents(299);
    /// assert_eq!(unit_price.multiply_quantity(3).cents(), 897);
    /// ```
    #[inline]
    pub const fn multiply_quantity(&self, qty: i64) -> Self {
        Money(self.0 * qty)
    }

    /// Returns `bps` basis points of this amount, rounded half-up to the cent.
    ///
    /// ## Implementation
    /// Integer math: `(amount * bps + 5000) / 10000`. The +5000 is the half
    /// that makes the truncating division round to nearest.
    ///
    /// ```rust
    /// use till_core::money::Money;
    ///
    /// let subtotal = Money::from_cents(60_000);
    /// assert_eq!(subtotal.percentage_amount(1000).cents(), 6_000);
    ///
    /// // 8.25% of 10.00 = 0.825 → 0.83
    /// assert_eq!(Money::from_cents(1000).percentage_amount(825).cents(), 83);
    /// ```
    pub fn percentage_amount(&self, bps: u32) -> Money {
        // i128 keeps large totals from overflowing the multiplication
        let cents = (self.0 as i128 * bps as i128 + 5000) / 10000;
        Money::from_cents(cents as i64)
    }

    /// Applies a percentage discount and returns the discounted amount.
    ///
    /// ## Arguments
    /// * `discount_bps` - Discount in basis points (1000 = 10%)
    ///
    /// ```rust
    /// use till_core::money::Money;
    ///
    /// let unit = Money::from_cents(10_000);
    /// assert_eq!(unit.apply_percentage_discount(1000).cents(), 9_000);
    /// ```
    pub fn apply_percentage_discount(&self, discount_bps: u32) -> Money {
        *self - self.percentage_amount(discount_bps)
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Display for logs: `12.34`, `-5.50`. Currency formatting belongs to callers.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}{}.{:02}", sign, self.major().abs(), self.minor())
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
        Money(self.0 + other.0)
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        Money(self.0 * qty)
    }
}

impl std::iter::Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
