//! Amount type for Cageledger
//!
//! All monetary values are whole units (chips or yen-equivalent), so amounts
//! are plain i64 with overflow-checked arithmetic. Negative values appear only
//! in derived figures such as the settlement net amount; ledger rows are
//! always positive.

use crate::{LedgerError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, Sub};

/// A whole-unit monetary amount
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Amount(pub i64);

impl Amount {
    /// The zero amount
    pub const ZERO: Amount = Amount(0);

    /// Create a new amount
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    /// Raw value
    pub fn value(&self) -> i64 {
        self.0
    }

    /// Check if the amount is zero
    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Check if the amount is strictly positive
    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Check if the amount is strictly negative
    pub fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Absolute value
    pub fn abs(&self) -> Self {
        Self(self.0.abs())
    }

    /// Checked addition
    pub fn checked_add(self, other: Self) -> Result<Self> {
        self.0
            .checked_add(other.0)
            .map(Self)
            .ok_or(LedgerError::AmountOverflow)
    }

    /// Checked subtraction
    pub fn checked_sub(self, other: Self) -> Result<Self> {
        self.0
            .checked_sub(other.0)
            .map(Self)
            .ok_or(LedgerError::AmountOverflow)
    }

    /// Checked multiplication by a scalar
    pub fn checked_mul(self, multiplier: i64) -> Result<Self> {
        self.0
            .checked_mul(multiplier)
            .map(Self)
            .ok_or(LedgerError::AmountOverflow)
    }

    /// Checked division by a scalar (truncating)
    pub fn checked_div(self, divisor: i64) -> Result<Self> {
        if divisor == 0 {
            return Err(LedgerError::DivisionByZero);
        }
        Ok(Self(self.0 / divisor))
    }

    /// Multiply by basis points (10000 = 100%), truncating
    pub fn basis_points(self, bps: u32) -> Result<Self> {
        let value = self
            .0
            .checked_mul(bps as i64)
            .ok_or(LedgerError::AmountOverflow)?
            / 10_000;
        Ok(Self(value))
    }

    /// Smaller of two amounts
    pub fn min(self, other: Self) -> Self {
        Self(self.0.min(other.0))
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for Amount {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

// Convenience operators for contexts where overflow is structurally impossible
// (tests, small fixed tables). Domain code uses the checked variants.
impl Add for Amount {
    type Output = Self;

    fn add(self, other: Self) -> Self::Output {
        self.checked_add(other).expect("Amount addition overflow")
    }
}

impl Sub for Amount {
    type Output = Self;

    fn sub(self, other: Self) -> Self::Output {
        self.checked_sub(other).expect("Amount subtraction overflow")
    }
}

impl Sum for Amount {
    fn sum<I: Iterator<Item = Amount>>(iter: I) -> Self {
        iter.fold(Amount::ZERO, |acc, a| acc + a)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checked_arithmetic() {
        let a = Amount::new(100);
        let b = Amount::new(40);
        assert_eq!(a.checked_add(b).unwrap(), Amount::new(140));
        assert_eq!(a.checked_sub(b).unwrap(), Amount::new(60));
        assert_eq!(b.checked_sub(a).unwrap(), Amount::new(-60));
    }

    #[test]
    fn test_overflow_is_explicit() {
        let max = Amount::new(i64::MAX);
        assert!(matches!(
            max.checked_add(Amount::new(1)),
            Err(LedgerError::AmountOverflow)
        ));
    }

    #[test]
    fn test_basis_points() {
        assert_eq!(Amount::new(100_000).basis_points(1000).unwrap(), Amount::new(10_000));
        assert_eq!(Amount::new(1).basis_points(1000).unwrap(), Amount::ZERO);
    }

    #[test]
    fn test_division_by_zero() {
        assert!(matches!(
            Amount::new(10).checked_div(0),
            Err(LedgerError::DivisionByZero)
        ));
    }

    #[test]
    fn test_ordering_and_min() {
        assert!(Amount::new(50) < Amount::new(80));
        assert_eq!(Amount::new(50).min(Amount::new(80)), Amount::new(50));
    }
}
