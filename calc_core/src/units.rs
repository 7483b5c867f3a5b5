//! # Unit Types
//!
//! Type-safe wrappers for financial quantities. These exist mainly to keep the
//! two percentage conventions apart: some calculators take rates as fractions
//! (`0.065`) and others as whole-number percents (`6.5`). Mixing them silently
//! produces order-of-magnitude errors, so typed inputs convert through
//! [`Fraction`] and [`Percent`] explicitly.
//!
//! ## Example
//!
//! ```rust
//! use calc_core::units::{Fraction, Percent, Months, Years};
//!
//! let rate = Percent(6.5);
//! let fraction: Fraction = rate.into();
//! assert!((fraction.0 - 0.065).abs() < 1e-12);
//!
//! let term: Months = Years(30.0).into();
//! assert_eq!(term.0, 360.0);
//! ```

use serde::{Deserialize, Serialize};
use std::ops::{Add, Div, Mul, Sub};

// ============================================================================
// Money
// ============================================================================

/// Amount in US dollars
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(pub f64);

impl Money {
    /// Monthly share of an annual amount
    pub fn per_month(self) -> Money {
        Money(self.0 / 12.0)
    }

    /// Annual total of a monthly amount
    pub fn per_year(self) -> Money {
        Money(self.0 * 12.0)
    }

    /// Clamp negative amounts to zero
    pub fn non_negative(self) -> Money {
        Money(self.0.max(0.0))
    }
}

// ============================================================================
// Rates
// ============================================================================

/// Rate expressed as a fraction (0.065 = 6.5%)
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fraction(pub f64);

/// Rate expressed as a whole-number percent (6.5 = 6.5%)
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Percent(pub f64);

/// Tax rate in mills (dollars per $1,000 of taxable value)
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Mills(pub f64);

impl From<Percent> for Fraction {
    fn from(pct: Percent) -> Self {
        Fraction(pct.0 / 100.0)
    }
}

impl From<Fraction> for Percent {
    fn from(frac: Fraction) -> Self {
        Percent(frac.0 * 100.0)
    }
}

impl From<Mills> for Fraction {
    fn from(mills: Mills) -> Self {
        Fraction(mills.0 / 1000.0)
    }
}

impl Fraction {
    /// Apply the rate to an amount
    pub fn of(self, amount: Money) -> Money {
        Money(amount.0 * self.0)
    }

    /// Monthly periodic rate for an annual fraction
    pub fn monthly(self) -> f64 {
        self.0 / 12.0
    }
}

// ============================================================================
// Time
// ============================================================================

/// Duration in months
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Months(pub f64);

/// Duration in years
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Years(pub f64);

impl From<Years> for Months {
    fn from(years: Years) -> Self {
        Months(years.0 * 12.0)
    }
}

impl From<Months> for Years {
    fn from(months: Months) -> Self {
        Years(months.0 / 12.0)
    }
}

// ============================================================================
// Rounding
// ============================================================================

/// Round to a fixed number of decimal places.
///
/// Only applied at the output boundary; intermediate values keep full
/// precision. Negative zero is normalised so rounded output serializes as `0`.
///
/// ```rust
/// use calc_core::units::round_to;
///
/// assert_eq!(round_to(349.999, 2), 350.0);
/// assert_eq!(round_to(round_to(0.123456, 4), 4), round_to(0.123456, 4));
/// ```
pub fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    let rounded = (value * factor).round() / factor;
    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}

// ============================================================================
// Arithmetic Implementations (macro to reduce boilerplate)
// ============================================================================

macro_rules! impl_arithmetic {
    ($type:ty) => {
        impl Add for $type {
            type Output = Self;
            fn add(self, rhs: Self) -> Self::Output {
                Self(self.0 + rhs.0)
            }
        }

        impl Sub for $type {
            type Output = Self;
            fn sub(self, rhs: Self) -> Self::Output {
                Self(self.0 - rhs.0)
            }
        }

        impl Mul<f64> for $type {
            type Output = Self;
            fn mul(self, rhs: f64) -> Self::Output {
                Self(self.0 * rhs)
            }
        }

        impl Div<f64> for $type {
            type Output = Self;
            fn div(self, rhs: f64) -> Self::Output {
                Self(self.0 / rhs)
            }
        }

        impl $type {
            /// Get the raw f64 value
            pub fn value(self) -> f64 {
                self.0
            }

            /// Create from raw f64 value
            pub fn new(value: f64) -> Self {
                Self(value)
            }
        }
    };
}

impl_arithmetic!(Money);
impl_arithmetic!(Fraction);
impl_arithmetic!(Percent);
impl_arithmetic!(Mills);
impl_arithmetic!(Months);
impl_arithmetic!(Years);

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_percent_to_fraction() {
        let pct = Percent(80.0);
        let frac: Fraction = pct.into();
        assert!((frac.0 - 0.8).abs() < 1e-12);
    }

    #[test]
    fn test_mills_to_fraction() {
        let frac: Fraction = Mills(25.0).into();
        assert!((frac.0 - 0.025).abs() < 1e-12);
    }

    #[test]
    fn test_money_helpers() {
        assert_eq!(Money(4200.0).per_month().0, 350.0);
        assert_eq!(Money(350.0).per_year().0, 4200.0);
        assert_eq!(Money(-10.0).non_negative().0, 0.0);
        assert_eq!(Fraction(0.005).of(Money(400_000.0)).0, 2000.0);
    }

    #[test]
    fn test_arithmetic() {
        let a = Money(10.0);
        let b = Money(5.0);
        assert_eq!((a + b).0, 15.0);
        assert_eq!((a - b).0, 5.0);
        assert_eq!((a * 2.0).0, 20.0);
        assert_eq!((a / 2.0).0, 5.0);
    }

    #[test]
    fn test_round_to_cents() {
        assert_eq!(round_to(1712.995, 2), 1713.0);
        assert_eq!(round_to(-0.001, 2), 0.0);
        assert!(round_to(-0.001, 2).is_sign_positive());
    }

    #[test]
    fn test_serialization() {
        let m = Money(1363.5);
        let json = serde_json::to_string(&m).unwrap();
        assert_eq!(json, "1363.5");

        let roundtrip: Money = serde_json::from_str(&json).unwrap();
        assert_eq!(m, roundtrip);
    }

    proptest! {
        #[test]
        fn rounding_is_idempotent(x in -1.0e9f64..1.0e9, decimals in 0u32..5) {
            let once = round_to(x, decimals);
            prop_assert_eq!(round_to(once, decimals), once);
        }
    }
}
