//! Whole-đồng `Money`.
//!
//! VND has no minor unit, so every price, balance, bonus and ledger amount
//! is a whole number of đồng held in an `i64`. Percentages use integer math
//! with floor rounding, which keeps the ledger sum equal to the balance.
//!
//! ## Usage
//! ```rust
//! use meridian_core::money::Money;
//!
//! let price = Money::from_vnd(120_000);
//! let total = price * 3 + Money::from_vnd(30_000);
//! assert_eq!(total.vnd(), 390_000);
//! assert_eq!(total.to_string(), "390.000 ₫");
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};

// =============================================================================
// Money Type
// =============================================================================

/// A signed amount in đồng.
///
/// Signed so that ledger debits, refunds and discounts share one type.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from đồng.
    #[inline]
    pub const fn from_vnd(vnd: i64) -> Self {
        Money(vnd)
    }

    /// Returns the value in đồng.
    #[inline]
    pub const fn vnd(&self) -> i64 {
        self.0
    }

    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Multiplies by an item quantity, `None` on overflow.
    #[inline]
    pub const fn checked_mul(self, qty: i64) -> Option<Self> {
        match self.0.checked_mul(qty) {
            Some(v) => Some(Money(v)),
            None => None,
        }
    }

    #[inline]
    pub const fn checked_add(self, other: Money) -> Option<Self> {
        match self.0.checked_add(other.0) {
            Some(v) => Some(Money(v)),
            None => None,
        }
    }

    #[inline]
    pub const fn checked_sub(self, other: Money) -> Option<Self> {
        match self.0.checked_sub(other.0) {
            Some(v) => Some(Money(v)),
            None => None,
        }
    }

    /// Applies a whole-number percentage, rounding toward zero.
    ///
    /// ## Example
    /// ```rust
    /// use meridian_core::money::Money;
    ///
    /// // 10% of 155,555 = 15,555.5 → 15,555
    /// assert_eq!(Money::from_vnd(155_555).percent_floor(10).vnd(), 15_555);
    /// ```
    pub fn percent_floor(&self, percent: i64) -> Money {
        // i128 so the multiply cannot overflow
        let scaled = (self.0 as i128) * (percent as i128) / 100;
        Money(scaled as i64)
    }

    /// Returns the smaller of two amounts.
    pub fn min(self, other: Money) -> Money {
        if self.0 <= other.0 {
            self
        } else {
            other
        }
    }

    /// Subtraction that refuses to go below zero.
    ///
    /// Returns `None` when `other` exceeds `self`, which is the shape of an
    /// insufficient-balance check.
    pub fn checked_debit(self, other: Money) -> Option<Money> {
        let result = self.0.checked_sub(other.0)?;
        if result < 0 {
            None
        } else {
            Some(Money(result))
        }
    }
}

/// Displays with `.` thousands grouping and the đồng sign: `1.250.000 ₫`.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let digits = self.0.unsigned_abs().to_string();
        let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
        for (i, ch) in digits.chars().enumerate() {
            if i > 0 && (digits.len() - i) % 3 == 0 {
                grouped.push('.');
            }
            grouped.push(ch);
        }
        if self.0 < 0 {
            write!(f, "-{} ₫", grouped)
        } else {
            write!(f, "{} ₫", grouped)
        }
    }
}

// =============================================================================
// Arithmetic Operations
// =============================================================================
//
// Unchecked, for amounts already bounded by validation. Anything derived from
// catalogue prices times quantities goes through the `checked_*` methods.

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

impl Neg for Money {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        Money(-self.0)
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
