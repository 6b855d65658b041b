//! # Money Module
//!
//! Provides the `Money` type for rupiah amounts.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Rupiah has no minor unit in daily retail use.                          │
//! │                                                                         │
//! │  Kopi Hitam        Rp 5.000  × 3  = Rp 15.000                          │
//! │  Gorengan (Bakwan) Rp 1.000  × 10 = Rp 10.000                          │
//! │                                                                         │
//! │  Every price, line total, subtotal, cash and change value is a whole    │
//! │  number of rupiah stored as i64. Floats never enter the ledger.         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use warung_core::money::Money;
//!
//! let price = Money::from_rupiah(4000);
//! let line = price * 2;
//! assert_eq!(line.rupiah(), 8000);
//! assert_eq!(line.to_string(), "Rp 8.000");
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Sub, SubAssign};
use ts_rs::TS;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in whole rupiah.
///
/// Signed so that differences (change due, discounts) can be expressed
/// without a second type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from whole rupiah.
    #[inline]
    pub const fn from_rupiah(rupiah: i64) -> Self {
        Money(rupiah)
    }

    /// Returns the value in whole rupiah.
    #[inline]
    pub const fn rupiah(&self) -> i64 {
        self.0
    }

    /// Zero rupiah.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Multiplies by a quantity (for line totals).
    ///
    /// ## Example
    /// ```rust
    /// use warung_core::money::Money;
    ///
    /// let unit = Money::from_rupiah(15000);
    /// assert_eq!(unit.multiply_quantity(3).rupiah(), 45000);
    /// ```
    #[inline]
    pub const fn multiply_quantity(&self, qty: i64) -> Self {
        Money(self.0 * qty)
    }
}

/// Formats as Indonesian rupiah: `Rp 12.500`, `-Rp 500`.
///
/// Thousands are grouped with `.` as in id-ID locale formatting.
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
            write!(f, "-Rp {}", grouped)
        } else {
            write!(f, "Rp {}", grouped)
        }
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

// =============================================================================
// Arithmetic Operations
// =============================================================================

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

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), Add::add)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_groups_thousands() {
        assert_eq!(Money::from_rupiah(0).to_string(), "Rp 0");
        assert_eq!(Money::from_rupiah(600).to_string(), "Rp 600");
        assert_eq!(Money::from_rupiah(5000).to_string(), "Rp 5.000");
        assert_eq!(Money::from_rupiah(1234567).to_string(), "Rp 1.234.567");
        assert_eq!(Money::from_rupiah(-2500).to_string(), "-Rp 2.500");
    }

    #[test]
    fn test_arithmetic() {
        let a = Money::from_rupiah(5000);
        let b = Money::from_rupiah(3000);

        assert_eq!((a + b).rupiah(), 8000);
        assert_eq!((a - b).rupiah(), 2000);
        assert_eq!((b - a).rupiah(), -2000);
        assert_eq!((a * 3).rupiah(), 15000);

        let mut c = a;
        c += b;
        c -= Money::from_rupiah(1000);
        assert_eq!(c.rupiah(), 7000);
    }

    #[test]
    fn test_sum() {
        let total: Money = [1000, 2000, 500]
            .into_iter()
            .map(Money::from_rupiah)
            .sum();
        assert_eq!(total.rupiah(), 3500);
    }

    #[test]
    fn test_zero_and_checks() {
        assert!(Money::zero().is_zero());
        assert!(Money::from_rupiah(-1).is_negative());
        assert!(!Money::from_rupiah(1).is_negative());
        assert_eq!(Money::default(), Money::zero());
    }
}
