//! Monetary amounts in cents.
//!
//! Every monetary value the engine computes or displays goes through this type:
//! `Money::parse` and `Money::share` are the only rounding paths (round to two
//! decimals, half away from zero) and `Display` is the only formatting path.

use core::iter::Sum;
use core::ops::{Add, AddAssign, Neg, Sub, SubAssign};
use core::str::FromStr;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Signed amount in the smallest currency unit (cents).
///
/// Arithmetic saturates at the `i64` bounds instead of wrapping.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    pub const ZERO: Money = Money(0);
    pub const MAX: Money = Money(i64::MAX);

    pub const fn from_cents(cents: i64) -> Self {
        Self(cents)
    }

    /// Whole currency units (e.g. `from_major(12)` is 12.00).
    pub const fn from_major(units: i64) -> Self {
        Self(units.saturating_mul(100))
    }

    pub const fn cents(self) -> i64 {
        self.0
    }

    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub const fn is_negative(self) -> bool {
        self.0 < 0
    }

    /// Multiply by an integer factor (quantity, units per pack).
    pub const fn times(self, factor: i64) -> Self {
        Self(self.0.saturating_mul(factor))
    }

    /// Restrict to `[lo, hi]`. An inverted range collapses to `lo`.
    pub fn bounded(self, lo: Money, hi: Money) -> Self {
        self.min(hi).max(lo)
    }

    /// Parse a user-entered decimal string, rounding to cents half away from zero.
    ///
    /// Returns `None` for anything that is not a plain decimal number, including
    /// values outside the representable range.
    pub fn parse(raw: &str) -> Option<Self> {
        let value = Decimal::from_str(raw.trim()).ok()?;
        Self::from_decimal(value)
    }

    /// Round to cents half away from zero; `None` when out of range.
    pub fn from_decimal(value: Decimal) -> Option<Self> {
        value
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
            .checked_mul(Decimal::ONE_HUNDRED)?
            .to_i64()
            .map(Self)
    }

    pub fn to_decimal(self) -> Decimal {
        Decimal::new(self.0, 2)
    }

    /// Proportional share `round2(part / whole * amount)`.
    ///
    /// `part * amount` can exceed `Decimal`'s 96-bit mantissa, so the quotient
    /// is computed exactly in `i128` and rounded once, half away from zero.
    /// Returns zero when `whole` is zero.
    pub fn share(part: Money, whole: Money, amount: Money) -> Self {
        if whole.is_zero() {
            return Self::ZERO;
        }
        let numerator = i128::from(part.0) * i128::from(amount.0);
        let denominator = i128::from(whole.0);
        let mut quotient = numerator / denominator;
        let remainder = numerator % denominator;
        if remainder.unsigned_abs() * 2 >= denominator.unsigned_abs() {
            if (numerator < 0) != (denominator < 0) {
                quotient -= 1;
            } else {
                quotient += 1;
            }
        }
        Self(quotient.clamp(i128::from(i64::MIN), i128::from(i64::MAX)) as i64)
    }
}

impl core::fmt::Display for Money {
    /// Two-decimal rendering shared by the engine and the UI (`"1234.50"`).
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.to_decimal())
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, rhs: Money) -> Money {
        Money(self.0.saturating_add(rhs.0))
    }
}

impl Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Money) -> Money {
        Money(self.0.saturating_sub(rhs.0))
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Money) {
        *self = *self + rhs;
    }
}

impl SubAssign for Money {
    fn sub_assign(&mut self, rhs: Money) {
        *self = *self - rhs;
    }
}

impl Neg for Money {
    type Output = Money;

    fn neg(self) -> Money {
        Money(self.0.saturating_neg())
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::ZERO, Add::add)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Money {
        iter.copied().sum()
    }
}
