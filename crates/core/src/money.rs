//! Monetary amounts.
//!
//! All amounts are held in the smallest currency unit (e.g. paise/cents) so that
//! arithmetic is exact. Conversion from floating point only happens at the edge,
//! through [`Money::try_from_major`], which is where negative and non-finite input
//! is rejected.

use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};

/// Minor units per major unit.
const MINOR_PER_MAJOR: u64 = 100;

/// A non-negative amount in the smallest currency unit.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(u64);

impl Money {
    pub const ZERO: Money = Money(0);

    pub const fn from_minor(minor: u64) -> Self {
        Self(minor)
    }

    /// Whole major units (e.g. `Money::from_major(500)` is 500.00).
    pub const fn from_major(major: u64) -> Self {
        Self(major * MINOR_PER_MAJOR)
    }

    /// Convert a floating point major amount, rounding to the nearest minor unit.
    pub fn try_from_major(amount: f64) -> DomainResult<Self> {
        if !amount.is_finite() {
            return Err(DomainError::invariant("amount must be a finite number"));
        }
        if amount < 0.0 {
            return Err(DomainError::invariant("amount must not be negative"));
        }
        let minor = (amount * MINOR_PER_MAJOR as f64).round();
        if minor > u64::MAX as f64 {
            return Err(DomainError::invariant("amount overflow"));
        }
        Ok(Self(minor as u64))
    }

    pub const fn minor(self) -> u64 {
        self.0
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(self, other: Money) -> DomainResult<Money> {
        self.0
            .checked_add(other.0)
            .map(Money)
            .ok_or_else(|| DomainError::invariant("amount overflow"))
    }

    pub fn checked_sub(self, other: Money) -> DomainResult<Money> {
        self.0
            .checked_sub(other.0)
            .map(Money)
            .ok_or_else(|| DomainError::invariant("amount underflow"))
    }

    pub fn checked_mul(self, factor: u64) -> DomainResult<Money> {
        self.0
            .checked_mul(factor)
            .map(Money)
            .ok_or_else(|| DomainError::invariant("amount overflow"))
    }

    /// Apply a rate expressed in basis points, rounding half up to the minor unit.
    pub fn apply_basis_points(self, bps: u64) -> Money {
        let scaled = (self.0 as u128) * (bps as u128);
        let rounded = (scaled + 5_000) / 10_000;
        Money(rounded.min(u64::MAX as u128) as u64)
    }
}

impl core::fmt::Display for Money {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}.{:02}", self.0 / MINOR_PER_MAJOR, self.0 % MINOR_PER_MAJOR)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn displays_two_decimal_places() {
        assert_eq!(Money::from_minor(5_000_001).to_string(), "50000.01");
        assert_eq!(Money::from_major(500).to_string(), "500.00");
        assert_eq!(Money::ZERO.to_string(), "0.00");
    }

    #[test]
    fn try_from_major_rejects_negative_and_non_finite() {
        assert!(matches!(
            Money::try_from_major(-0.01),
            Err(DomainError::InvariantViolation(_))
        ));
        assert!(Money::try_from_major(f64::NAN).is_err());
        assert!(Money::try_from_major(f64::INFINITY).is_err());
    }

    #[test]
    fn try_from_major_rounds_to_minor_unit() {
        assert_eq!(Money::try_from_major(50000.01).unwrap(), Money::from_minor(5_000_001));
        assert_eq!(Money::try_from_major(0.005).unwrap(), Money::from_minor(1));
    }

    #[test]
    fn basis_points_round_half_up() {
        // 2% of 0.25 is 0.005 -> rounds up to 0.01
        assert_eq!(Money::from_minor(25).apply_basis_points(200), Money::from_minor(1));
        assert_eq!(Money::from_major(100_000).apply_basis_points(200), Money::from_major(2_000));
    }

    #[test]
    fn checked_sub_reports_underflow() {
        let err = Money::from_minor(1).checked_sub(Money::from_minor(2)).unwrap_err();
        assert_eq!(err, DomainError::invariant("amount underflow"));
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 500,
                ..ProptestConfig::default()
            })]

            /// Rounded result is within half a minor unit of the exact product.
            #[test]
            fn basis_points_error_is_at_most_half_a_unit(minor in 0u64..=1_000_000_000_000, bps in 0u64..=10_000) {
                let exact = u128::from(minor) * u128::from(bps);
                let rounded = u128::from(Money::from_minor(minor).apply_basis_points(bps).minor()) * 10_000;
                prop_assert!(rounded.abs_diff(exact) <= 5_000);
            }
        }
    }
}
