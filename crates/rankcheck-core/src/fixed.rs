//! 32-bit signed fixed-point numbers in Q1.30 format.
//!
//! Every value in the system shares one binary-point position
//! ([`FRAC_BITS`]), giving a range of `[-2, 2)` with a resolution of
//! `2^-30`. Ranks, damping terms and tolerances all live in `[0, 1]`.
//!
//! # Arithmetic
//!
//! * `+` and `-` saturate at the range bounds.
//! * `*` widens to 64 bits and shifts the product right by [`FRAC_BITS`].
//!   Excess precision is truncated, never rounded.
//! * [`FixedPoint::div_int`] divides by a positive integer, truncating toward
//!   zero. This is bit-identical to dividing by the same integer converted to
//!   fixed point, but works for divisors outside the representable range.
//! * [`FixedPoint::lossy_encode`] drops the low [`PAYLOAD_HEADER_BITS`] bits,
//!   modelling the hardware payload that carries an iteration tag in them.
//!
//! Conversions from floating point round to nearest and fail on overflow.

use std::fmt;
use std::iter::Sum;
use std::ops::{Add, Mul, Neg, Shl, Shr, Sub};

use serde::{Deserialize, Serialize};

/// Number of fractional bits.
pub const FRAC_BITS: u32 = 30;

/// Low payload bits the hardware reserves for the iteration tag.
pub const PAYLOAD_HEADER_BITS: u32 = 2;

const SCALE: f64 = (1_u64 << FRAC_BITS) as f64;

/// Conversion failures.
#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum FixedPointError {
    #[error("value {0} does not fit in Q1.30 fixed point")]
    Overflow(f64),
    #[error("value {0} is not finite")]
    NotFinite(f64),
}

/// A Q1.30 fixed-point value. Equality is bit-pattern equality.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FixedPoint(i32);

impl FixedPoint {
    pub const ZERO: Self = Self(0);
    pub const ONE: Self = Self(1 << FRAC_BITS);
    /// Smallest positive value.
    pub const EPSILON: Self = Self(1);
    pub const MAX: Self = Self(i32::MAX);
    pub const MIN: Self = Self(i32::MIN);

    /// Wrap raw bits.
    #[must_use]
    pub const fn from_bits(bits: i32) -> Self {
        Self(bits)
    }

    /// Raw two's-complement bits.
    #[must_use]
    pub const fn to_bits(self) -> i32 {
        self.0
    }

    /// Convert from a float, rounding to the nearest representable value.
    ///
    /// # Errors
    ///
    /// Returns [`FixedPointError::NotFinite`] for NaN/infinity and
    /// [`FixedPointError::Overflow`] when the rounded value is out of range.
    #[allow(clippy::cast_possible_truncation)]
    pub fn from_f64(value: f64) -> Result<Self, FixedPointError> {
        if !value.is_finite() {
            return Err(FixedPointError::NotFinite(value));
        }
        let scaled = (value * SCALE).round();
        if scaled < f64::from(i32::MIN) || scaled > f64::from(i32::MAX) {
            return Err(FixedPointError::Overflow(value));
        }
        Ok(Self(scaled as i32))
    }

    /// Convert an integer literal.
    ///
    /// # Errors
    ///
    /// Returns [`FixedPointError::Overflow`] unless `value` is `-2`, `-1`,
    /// `0` or `1`.
    pub fn from_int(value: i32) -> Result<Self, FixedPointError> {
        value
            .checked_mul(1 << FRAC_BITS)
            .map(Self)
            .ok_or(FixedPointError::Overflow(f64::from(value)))
    }

    /// Lossless conversion to `f64`.
    #[must_use]
    pub fn to_f64(self) -> f64 {
        f64::from(self.0) / SCALE
    }

    #[must_use]
    pub const fn checked_add(self, rhs: Self) -> Option<Self> {
        match self.0.checked_add(rhs.0) {
            Some(v) => Some(Self(v)),
            None => None,
        }
    }

    #[must_use]
    pub const fn checked_sub(self, rhs: Self) -> Option<Self> {
        match self.0.checked_sub(rhs.0) {
            Some(v) => Some(Self(v)),
            None => None,
        }
    }

    /// Saturating absolute value.
    #[must_use]
    pub const fn abs(self) -> Self {
        Self(self.0.saturating_abs())
    }

    /// Absolute difference in raw units, widened so it cannot overflow.
    #[must_use]
    pub fn abs_diff_bits(self, other: Self) -> u64 {
        (i64::from(self.0) - i64::from(other.0)).unsigned_abs()
    }

    /// Divide by a positive integer, truncating toward zero.
    ///
    /// Returns `None` when `divisor` is zero.
    #[must_use]
    pub fn div_int(self, divisor: u32) -> Option<Self> {
        if divisor == 0 {
            return None;
        }
        let quotient = i64::from(self.0) / i64::from(divisor);
        // |quotient| <= |self| so this cannot fail.
        i32::try_from(quotient).ok().map(Self)
    }

    /// `(self >> k) << k`: clear the low `k` bits.
    #[must_use]
    pub fn truncate_low_bits(self, k: u32) -> Self {
        (self >> k) << k
    }

    /// Payload encoding loss applied to every packet before accumulation.
    #[must_use]
    pub fn lossy_encode(self) -> Self {
        self.truncate_low_bits(PAYLOAD_HEADER_BITS)
    }

    fn saturate(wide: i64) -> Self {
        Self(i32::try_from(wide).unwrap_or(if wide < 0 { i32::MIN } else { i32::MAX }))
    }
}

impl TryFrom<f64> for FixedPoint {
    type Error = FixedPointError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::from_f64(value)
    }
}

impl From<FixedPoint> for f64 {
    fn from(value: FixedPoint) -> Self {
        value.to_f64()
    }
}

impl Add for FixedPoint {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0.saturating_add(rhs.0))
    }
}

impl Sub for FixedPoint {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self(self.0.saturating_sub(rhs.0))
    }
}

impl Neg for FixedPoint {
    type Output = Self;

    fn neg(self) -> Self {
        Self(self.0.saturating_neg())
    }
}

impl Mul for FixedPoint {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self {
        let wide = (i64::from(self.0) * i64::from(rhs.0)) >> FRAC_BITS;
        Self::saturate(wide)
    }
}

impl Shr<u32> for FixedPoint {
    type Output = Self;

    fn shr(self, k: u32) -> Self {
        Self(self.0 >> k.min(31))
    }
}

impl Shl<u32> for FixedPoint {
    type Output = Self;

    fn shl(self, k: u32) -> Self {
        if self.0 == 0 {
            return self;
        }
        if k >= 32 {
            return Self::saturate(if self.0 < 0 { i64::MIN } else { i64::MAX });
        }
        Self::saturate(i64::from(self.0) << k)
    }
}

impl Sum for FixedPoint {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}

impl<'a> Sum<&'a FixedPoint> for FixedPoint {
    fn sum<I: Iterator<Item = &'a FixedPoint>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

impl fmt::Display for FixedPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.to_f64(), f)
    }
}

impl fmt::LowerHex for FixedPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        #[allow(clippy::cast_sign_loss)]
        let bits = self.0 as u32;
        fmt::LowerHex::fmt(&bits, f)
    }
}
