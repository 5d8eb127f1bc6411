//! Fixed-point decimal representation.
//!
//! Rates are published with a fixed number of fractional digits. Keeping
//! them as a scaled integer avoids binary floating point artifacts when the
//! value is rendered or compared against thresholds.

use core::fmt;

/// A decimal number stored as `unscaled * 10^-scale`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Decimal {
    unscaled: i64,
    scale: u32,
}

impl Decimal {
    /// Create a decimal from its unscaled value and scale.
    pub const fn new(unscaled: i64, scale: u32) -> Self {
        Self { unscaled, scale }
    }

    /// Zero at the given scale (`0.00` for scale 2).
    pub const fn zero(scale: u32) -> Self {
        Self { unscaled: 0, scale }
    }

    /// Divide `numerator` by `denominator`, rounding half-up to `scale`
    /// fractional digits.
    ///
    /// Half-up rounds ties away from zero, so `0.125` becomes `0.13` and
    /// `-0.125` becomes `-0.13`. Returns `None` for a zero denominator or
    /// when the result does not fit.
    pub fn from_ratio(numerator: i64, denominator: i64, scale: u32) -> Option<Self> {
        if denominator == 0 {
            return None;
        }
        let factor = 10_i128.checked_pow(scale)?;
        let num = i128::from(numerator).checked_mul(factor)?;
        let den = i128::from(denominator);

        let negative = (num < 0) != (den < 0);
        let (num, den) = (num.abs(), den.abs());
        let rounded = num.checked_mul(2)?.checked_add(den)? / den.checked_mul(2)?;
        let signed = if negative { -rounded } else { rounded };

        Some(Self {
            unscaled: i64::try_from(signed).ok()?,
            scale,
        })
    }

    /// The unscaled integer value.
    pub const fn unscaled(&self) -> i64 {
        self.unscaled
    }

    /// Number of fractional digits.
    pub const fn scale(&self) -> u32 {
        self.scale
    }

    /// Check if the value is zero.
    pub const fn is_zero(&self) -> bool {
        self.unscaled == 0
    }

    /// Convert to a float (lossy).
    pub fn to_f64(&self) -> f64 {
        self.unscaled as f64 / 10_f64.powi(self.scale as i32)
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.scale == 0 {
            return write!(f, "{}", self.unscaled);
        }

        let sign = if self.unscaled < 0 { "-" } else { "" };
        let digits = self.unscaled.unsigned_abs().to_string();
        let scale = self.scale as usize;
        let padded = format!("{:0>width$}", digits, width = scale + 1);
        let (int_part, frac_part) = padded.split_at(padded.len() - scale);
        write!(f, "{}{}.{}", sign, int_part, frac_part)
    }
}
