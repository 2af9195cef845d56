//! Value spaces: the bounded domains values are drawn from
//!
//! Both kinds are stored as inclusive bounds in fixed-point units, so
//! cardinality, membership and uniform sampling are plain integer arithmetic:
//!
//! - Integer `[lo, hi]` has `hi - lo + 1` values.
//! - Decimal `[lo, hi)` with precision `p` holds every multiple of `10^-p`
//!   in the range: `(hi - lo) * 10^p` values when both bounds sit on that
//!   grid. Unaligned bounds are moved inward, never outward.

use crate::error::{Error, Result};
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Largest integer magnitude a space may contain
///
/// Values are persisted as JSON numbers and SQLite `REAL`s, both of which
/// are exact only up to 2^53.
pub const MAX_INTEGER_MAGNITUDE: i64 = 1 << 53;

/// Largest decimal magnitude, in units
///
/// Keeps the float round-trip error of `units / 10^p * 10^p` well under
/// half a unit.
pub const MAX_DECIMAL_UNITS: i64 = 1 << 50;

/// Maximum number of fractional digits for decimal spaces
pub const MAX_DECIMAL_PRECISION: u32 = 9;

/// Kind of value space
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    /// Whole numbers in an inclusive range
    Integer,
    /// Fixed-precision decimals in a half-open range
    Decimal,
}

impl ValueKind {
    /// Canonical lowercase name
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueKind::Integer => "integer",
            ValueKind::Decimal => "decimal",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ValueKind {
    type Err = Error;

    /// Accepts `integer`/`int` and `decimal`/`float`, case-insensitive
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "integer" | "int" => Ok(ValueKind::Integer),
            "decimal" | "float" => Ok(ValueKind::Decimal),
            _ => Err(Error::UnknownKind(s.to_string())),
        }
    }
}

/// A bounded domain of values eligible for allocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ValueSpace {
    kind: ValueKind,
    /// Inclusive lower bound, in units
    lower: i64,
    /// Inclusive upper bound, in units
    upper: i64,
    precision: u32,
}

impl ValueSpace {
    /// Integer space over `[lower, upper]`, both inclusive
    ///
    /// # Errors
    ///
    /// `InvalidSpace` if `lower > upper` or either bound exceeds
    /// [`MAX_INTEGER_MAGNITUDE`].
    pub fn integer(lower: i64, upper: i64) -> Result<Self> {
        if lower > upper {
            return Err(Error::InvalidSpace(format!(
                "lower bound {} is greater than upper bound {}",
                lower, upper
            )));
        }
        for bound in [lower, upper] {
            if bound.unsigned_abs() > MAX_INTEGER_MAGNITUDE as u64 {
                return Err(Error::InvalidSpace(format!(
                    "bound {} exceeds the exact range of +/-2^53",
                    bound
                )));
            }
        }
        Ok(Self {
            kind: ValueKind::Integer,
            lower,
            upper,
            precision: 0,
        })
    }

    /// Decimal space over `[lower, upper)` with `precision` fractional digits
    ///
    /// # Errors
    ///
    /// `InvalidSpace` if a bound is not finite, the precision exceeds
    /// [`MAX_DECIMAL_PRECISION`], a scaled bound exceeds
    /// [`MAX_DECIMAL_UNITS`], or the range holds no value at this precision.
    pub fn decimal(lower: f64, upper: f64, precision: u32) -> Result<Self> {
        if !lower.is_finite() || !upper.is_finite() {
            return Err(Error::InvalidSpace(format!(
                "bounds must be finite, got [{}, {})",
                lower, upper
            )));
        }
        if precision > MAX_DECIMAL_PRECISION {
            return Err(Error::InvalidSpace(format!(
                "precision {} exceeds the maximum of {}",
                precision, MAX_DECIMAL_PRECISION
            )));
        }

        // First and one-past-last grid points inside [lower, upper)
        let scale = 10f64.powi(precision as i32);
        let lo = ceil_to_unit(lower * scale);
        let hi = ceil_to_unit(upper * scale);
        let limit = MAX_DECIMAL_UNITS as f64;
        if lo.abs() > limit || hi.abs() > limit {
            return Err(Error::InvalidSpace(format!(
                "[{}, {}) at precision {} exceeds 2^50 units",
                lower, upper, precision
            )));
        }
        if lo >= hi {
            return Err(Error::InvalidSpace(format!(
                "[{}, {}) holds no value at precision {}",
                lower, upper, precision
            )));
        }

        Ok(Self {
            kind: ValueKind::Decimal,
            lower: lo as i64,
            upper: hi as i64 - 1,
            precision,
        })
    }

    /// Kind of values in this space
    pub fn kind(&self) -> ValueKind {
        self.kind
    }

    /// Number of fractional digits (0 for integer spaces)
    pub fn precision(&self) -> u32 {
        self.precision
    }

    /// Inclusive unit bounds `(lower, upper)`
    pub fn unit_bounds(&self) -> (i64, i64) {
        (self.lower, self.upper)
    }

    /// Smallest value in the space
    pub fn lower_value(&self) -> Value {
        self.value_from_units(self.lower)
    }

    /// Largest value in the space
    pub fn upper_value(&self) -> Value {
        self.value_from_units(self.upper)
    }

    /// Number of distinct values in the space
    pub fn cardinality(&self) -> u128 {
        (self.upper as i128 - self.lower as i128 + 1) as u128
    }

    /// True if `value` has this space's kind and precision and lies in bounds
    pub fn contains(&self, value: &Value) -> bool {
        value.kind() == self.kind
            && value.precision() == self.precision
            && (self.lower..=self.upper).contains(&value.units())
    }

    /// Fail with `InvalidValue` unless `value` is in the space
    pub fn check(&self, value: &Value) -> Result<()> {
        if self.contains(value) {
            Ok(())
        } else {
            Err(Error::InvalidValue(format!("{} is outside {}", value, self)))
        }
    }

    /// Build a value of this space's kind from fixed-point units
    pub fn value_from_units(&self, units: i64) -> Value {
        match self.kind {
            ValueKind::Integer => Value::Integer(units),
            ValueKind::Decimal => Value::Decimal {
                units,
                precision: self.precision,
            },
        }
    }

    /// Decode a persisted float into a value of this space's kind
    ///
    /// Decimals are rounded to the space's precision. Membership is not
    /// checked; use [`ValueSpace::check`] for that.
    pub fn value_from_f64(&self, x: f64) -> Result<Value> {
        if !x.is_finite() {
            return Err(Error::InvalidValue(format!("{} is not a finite number", x)));
        }
        match self.kind {
            ValueKind::Integer => {
                if x.fract() != 0.0 || x.abs() > MAX_INTEGER_MAGNITUDE as f64 {
                    return Err(Error::InvalidValue(format!("{} is not an exact integer", x)));
                }
                Ok(Value::Integer(x as i64))
            }
            ValueKind::Decimal => {
                let units = (x * 10f64.powi(self.precision as i32)).round();
                if units.abs() > MAX_DECIMAL_UNITS as f64 {
                    return Err(Error::InvalidValue(format!("{} is out of decimal range", x)));
                }
                Ok(self.value_from_units(units as i64))
            }
        }
    }

    /// Decode a JSON number into a value of this space's kind
    pub fn value_from_json(&self, n: &serde_json::Number) -> Result<Value> {
        match (self.kind, n.as_i64()) {
            (ValueKind::Integer, Some(i)) => Ok(Value::Integer(i)),
            _ => {
                let x = n
                    .as_f64()
                    .ok_or_else(|| Error::InvalidValue(format!("{} is not representable", n)))?;
                self.value_from_f64(x)
            }
        }
    }
}

/// Smallest whole unit `>= x`, treating `x` within float noise of a whole
/// unit as that unit (`0.29 * 100` is `28.999999999999996`)
fn ceil_to_unit(x: f64) -> f64 {
    let nearest = x.round();
    let tolerance = (x.abs() * 4.0 * f64::EPSILON).max(1e-9);
    if (x - nearest).abs() <= tolerance {
        nearest
    } else {
        x.ceil()
    }
}

impl fmt::Display for ValueSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ValueKind::Integer => write!(f, "integer [{}, {}]", self.lower, self.upper),
            ValueKind::Decimal => write!(
                f,
                "decimal [{}, {})",
                self.lower_value(),
                self.value_from_units(self.upper + 1)
            ),
        }
    }
}
