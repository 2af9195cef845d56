//! Issued value type
//!
//! A `Value` is keyed by its exact fixed-point representation. Decimals carry
//! their precision and an integer count of `10^-precision` units, so two
//! decimals compare equal exactly when they round to the same digits.

use crate::space::ValueKind;
use serde::{Serialize, Serializer};
use std::fmt;

/// A value drawn from a value space
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Value {
    /// Whole number
    Integer(i64),
    /// Fixed-point decimal: `units * 10^-precision`
    Decimal {
        /// Value scaled by `10^precision`
        units: i64,
        /// Number of fractional digits
        precision: u32,
    },
}

impl Value {
    /// Kind of space this value belongs to
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Integer(_) => ValueKind::Integer,
            Value::Decimal { .. } => ValueKind::Decimal,
        }
    }

    /// Fixed-point units (the integer itself for `Integer`)
    pub fn units(&self) -> i64 {
        match *self {
            Value::Integer(n) => n,
            Value::Decimal { units, .. } => units,
        }
    }

    /// Number of fractional digits (0 for `Integer`)
    pub fn precision(&self) -> u32 {
        match *self {
            Value::Integer(_) => 0,
            Value::Decimal { precision, .. } => precision,
        }
    }

    /// Nearest `f64` to this value
    ///
    /// Exact for integers; for decimals the division is correctly rounded,
    /// so the same units always produce the same float.
    pub fn as_f64(&self) -> f64 {
        match *self {
            Value::Integer(n) => n as f64,
            Value::Decimal { units, precision } => units as f64 / 10f64.powi(precision as i32),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Value::Integer(n) => write!(f, "{}", n),
            Value::Decimal { units, precision: 0 } => write!(f, "{}", units),
            Value::Decimal { units, precision } => {
                let scale = 10u64.pow(precision);
                let magnitude = units.unsigned_abs();
                let sign = if units < 0 { "-" } else { "" };
                write!(
                    f,
                    "{}{}.{:0width$}",
                    sign,
                    magnitude / scale,
                    magnitude % scale,
                    width = precision as usize
                )
            }
        }
    }
}

// Serialized as a bare JSON number, which is also the snapshot file format.
impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match *self {
            Value::Integer(n) => serializer.serialize_i64(n),
            Value::Decimal { .. } => serializer.serialize_f64(self.as_f64()),
        }
    }
}
