//! Fixed-point decimal values.
//!
//! A `Decimal` is an `i64` mantissa with a base-10 scale, so `19.99` is
//! stored as mantissa `1999`, scale `2`. This matches the
//! `ScalarType::Decimal { precision, scale }` column type.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Largest scale accepted; `10^18` still fits in an `i64`.
pub const MAX_SCALE: u8 = 18;

/// A fixed-point decimal number.
#[derive(Debug, Clone, Copy)]
pub struct Decimal {
    mantissa: i64,
    scale: u8,
}

/// Error returned when parsing or rescaling a decimal fails.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecimalError {
    /// Input was not a decimal literal.
    #[error("invalid decimal literal '{0}'")]
    Invalid(String),
    /// Value does not fit in the requested precision/scale.
    #[error("decimal {0} out of range")]
    OutOfRange(String),
}

impl Decimal {
    /// Create a decimal from a mantissa and scale.
    pub fn new(mantissa: i64, scale: u8) -> Result<Self, DecimalError> {
        if scale > MAX_SCALE {
            return Err(DecimalError::OutOfRange(format!("{mantissa}e-{scale}")));
        }
        Ok(Self { mantissa, scale })
    }

    /// The raw mantissa.
    pub fn mantissa(&self) -> i64 {
        self.mantissa
    }

    /// Number of digits after the decimal point.
    pub fn scale(&self) -> u8 {
        self.scale
    }

    /// Whether the value is below zero.
    pub fn is_negative(&self) -> bool {
        self.mantissa < 0
    }

    /// Re-express the value with exactly `scale` fractional digits.
    ///
    /// Fails rather than rounding when digits would be lost.
    pub fn rescale(&self, scale: u8) -> Result<Self, DecimalError> {
        if scale > MAX_SCALE {
            return Err(DecimalError::OutOfRange(self.to_string()));
        }
        match scale.cmp(&self.scale) {
            Ordering::Equal => Ok(*self),
            Ordering::Greater => {
                let factor = 10i64.pow(u32::from(scale - self.scale));
                let mantissa = self
                    .mantissa
                    .checked_mul(factor)
                    .ok_or_else(|| DecimalError::OutOfRange(self.to_string()))?;
                Ok(Self { mantissa, scale })
            }
            Ordering::Less => {
                let factor = 10i64.pow(u32::from(self.scale - scale));
                if self.mantissa % factor != 0 {
                    return Err(DecimalError::OutOfRange(self.to_string()));
                }
                Ok(Self {
                    mantissa: self.mantissa / factor,
                    scale,
                })
            }
        }
    }

    /// Check the value fits `precision` total digits once rescaled to `scale`.
    pub fn fit(&self, precision: u8, scale: u8) -> Result<Self, DecimalError> {
        let rescaled = self.rescale(scale)?;
        let digits = rescaled.mantissa.unsigned_abs().checked_ilog10().map_or(1, |d| d + 1);
        if digits > u32::from(precision) {
            return Err(DecimalError::OutOfRange(self.to_string()));
        }
        Ok(rescaled)
    }

    /// Widen both sides to a common scale for comparison.
    fn aligned(&self, other: &Self) -> (i128, i128) {
        let scale = self.scale.max(other.scale);
        let lhs = i128::from(self.mantissa) * 10i128.pow(u32::from(scale - self.scale));
        let rhs = i128::from(other.mantissa) * 10i128.pow(u32::from(scale - other.scale));
        (lhs, rhs)
    }
}

impl PartialEq for Decimal {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Decimal {}

impl PartialOrd for Decimal {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Decimal {
    fn cmp(&self, other: &Self) -> Ordering {
        let (lhs, rhs) = self.aligned(other);
        lhs.cmp(&rhs)
    }
}

impl FromStr for Decimal {
    type Err = DecimalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || DecimalError::Invalid(s.to_string());
        let trimmed = s.trim();
        let (negative, digits) = match trimmed.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
        };

        let (int_part, frac_part) = match digits.split_once('.') {
            Some((i, f)) => (i, f),
            None => (digits, ""),
        };
        if int_part.is_empty() && frac_part.is_empty() {
            return Err(invalid());
        }
        if !int_part.chars().chain(frac_part.chars()).all(|c| c.is_ascii_digit()) {
            return Err(invalid());
        }
        let scale = u8::try_from(frac_part.len())
            .ok()
            .filter(|s| *s <= MAX_SCALE)
            .ok_or_else(|| DecimalError::OutOfRange(s.to_string()))?;

        let joined = format!("{int_part}{frac_part}");
        let magnitude: i64 = if joined.is_empty() {
            0
        } else {
            joined
                .parse()
                .map_err(|_| DecimalError::OutOfRange(s.to_string()))?
        };

        Ok(Self {
            mantissa: if negative { -magnitude } else { magnitude },
            scale,
        })
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.scale == 0 {
            return write!(f, "{}", self.mantissa);
        }
        let factor = 10u64.pow(u32::from(self.scale));
        let magnitude = self.mantissa.unsigned_abs();
        let sign = if self.mantissa < 0 { "-" } else { "" };
        write!(
            f,
            "{sign}{}.{:0width$}",
            magnitude / factor,
            magnitude % factor,
            width = usize::from(self.scale)
        )
    }
}

impl From<i64> for Decimal {
    fn from(v: i64) -> Self {
        Self {
            mantissa: v,
            scale: 0,
        }
    }
}

impl Serialize for Decimal {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Decimal {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
