//! Fixed-point money and ratio types.
//!
//! Amounts are stored as integer minor units (hundredths of the group currency)
//! so contribution sums and collateral checks never suffer floating-point error.
//! Ratios such as interest rates and quorum thresholds are basis points.

use crate::error::TypeError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, Sub};
use std::str::FromStr;

/// Minor units per whole currency unit.
pub const MINOR_PER_UNIT: u64 = 100;

/// One hundred percent, in basis points.
pub const BPS_SCALE: u32 = 10_000;

/// A non-negative money amount in minor units.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Amount(u64);

impl Amount {
    pub const ZERO: Self = Self(0);

    pub fn new(minor: u64) -> Self {
        Self(minor)
    }

    /// Build an amount from whole units and hundredths, e.g. `from_parts(1000, 1)` is 1000.01.
    pub fn from_parts(units: u64, hundredths: u8) -> Self {
        Self(units * MINOR_PER_UNIT + u64::from(hundredths.min(99)))
    }

    pub fn minor(&self) -> u64 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(self, other: Self) -> Option<Self> {
        self.0.checked_add(other.0).map(Self)
    }

    pub fn checked_sub(self, other: Self) -> Option<Self> {
        self.0.checked_sub(other.0).map(Self)
    }

    pub fn saturating_add(self, other: Self) -> Self {
        Self(self.0.saturating_add(other.0))
    }

    pub fn saturating_sub(self, other: Self) -> Self {
        Self(self.0.saturating_sub(other.0))
    }

    /// `self × rate`, rounded up to the next minor unit.
    ///
    /// Used for minimum-balance requirements, where rounding down would let a
    /// borrower slip under the rule by a fraction of a cent.
    pub fn share_ceil(self, rate: BasisPoints) -> Self {
        let scaled = u128::from(self.0) * u128::from(rate.get());
        let bps = u128::from(BPS_SCALE);
        let minor = scaled.div_ceil(bps);
        Self(u64::try_from(minor).unwrap_or(u64::MAX))
    }
}

impl Add for Amount {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl Sub for Amount {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self(self.0 - rhs.0)
    }
}

impl Sum for Amount {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Amount::saturating_add)
    }
}

impl<'a> Sum<&'a Amount> for Amount {
    fn sum<I: Iterator<Item = &'a Amount>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{:02}",
            self.0 / MINOR_PER_UNIT,
            self.0 % MINOR_PER_UNIT
        )
    }
}

impl FromStr for Amount {
    type Err = TypeError;

    /// Parse `"1000"`, `"1000.5"` or `"1000.01"`. More than two decimals is rejected.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || TypeError::InvalidAmount(s.to_string());
        let (units, frac) = match s.split_once('.') {
            Some((u, f)) => (u, f),
            None => (s, ""),
        };
        if units.is_empty() || frac.len() > 2 {
            return Err(invalid());
        }
        let units: u64 = units.parse().map_err(|_| invalid())?;
        let hundredths: u64 = match frac.len() {
            0 => 0,
            1 => frac.parse::<u64>().map_err(|_| invalid())? * 10,
            _ => frac.parse().map_err(|_| invalid())?,
        };
        units
            .checked_mul(MINOR_PER_UNIT)
            .and_then(|m| m.checked_add(hundredths))
            .map(Self)
            .ok_or_else(invalid)
    }
}

/// A ratio in basis points, constrained to `1..=10000` (0.01% to 100%).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct BasisPoints(u32);

impl BasisPoints {
    pub const FULL: Self = Self(BPS_SCALE);

    pub fn new(bps: u32) -> Result<Self, TypeError> {
        if bps == 0 || bps > BPS_SCALE {
            return Err(TypeError::InvalidBasisPoints(bps));
        }
        Ok(Self(bps))
    }

    /// Convert a fraction in `(0, 1]` (e.g. `0.6`) to basis points.
    pub fn from_fraction(fraction: f64) -> Result<Self, TypeError> {
        if !fraction.is_finite() || fraction <= 0.0 || fraction > 1.0 {
            return Err(TypeError::InvalidFraction(fraction.to_string()));
        }
        let bps = (fraction * f64::from(BPS_SCALE)).round() as u32;
        Self::new(bps.max(1))
    }

    pub fn get(&self) -> u32 {
        self.0
    }

    pub fn as_fraction(&self) -> f64 {
        f64::from(self.0) / f64::from(BPS_SCALE)
    }

    /// `ceil(count × self)`, computed in integers.
    pub fn ceil_of(&self, count: u32) -> u32 {
        let scaled = u64::from(count) * u64::from(self.0);
        scaled.div_ceil(u64::from(BPS_SCALE)) as u32
    }
}

impl TryFrom<u32> for BasisPoints {
    type Error = TypeError;
    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<BasisPoints> for u32 {
    fn from(value: BasisPoints) -> Self {
        value.0
    }
}

impl fmt::Display for BasisPoints {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}%", self.0 / 100, self.0 % 100)
    }
}
