//! Canonical comparable form of a [`Value`].

use crate::value::Value;
use std::fmt;

/// Lower bound (inclusive) of floats that convert exactly into `i64`.
const I64_MIN_F: f64 = -9_223_372_036_854_775_808.0;
/// Upper bound (exclusive) of floats that convert exactly into `i64`.
const I64_MAX_F: f64 = 9_223_372_036_854_775_808.0;

/// The comparable form of a value.
///
/// `Canonical` is hashable and totally ordered, so it can key a hash map.
/// Conversion from [`Value`] is total: every value has exactly one
/// canonical form.
///
/// Floats are held by bit pattern after integral floats have been folded
/// into `Integer`, which makes `-0.0` and `0.0` equal and gives every NaN
/// the same representation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Canonical {
    /// Null or absent.
    Null,
    /// Boolean.
    Bool(bool),
    /// Integer, including integral floats and canonical integer text.
    Integer(i64),
    /// Non-integral float, stored as IEEE-754 bits.
    Float(u64),
    /// Text that does not denote a number.
    Text(String),
}

impl Canonical {
    /// Converts a value into its canonical form.
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Null => Canonical::Null,
            Value::Bool(b) => Canonical::Bool(*b),
            Value::Integer(n) => Canonical::Integer(*n),
            Value::Float(f) => Self::from_float(*f),
            Value::Text(s) => Self::from_text(s),
        }
    }

    fn from_float(f: f64) -> Self {
        if f.is_nan() {
            return Canonical::Float(f64::NAN.to_bits());
        }
        if f.is_finite() && f.fract() == 0.0 && (I64_MIN_F..I64_MAX_F).contains(&f) {
            #[allow(clippy::cast_possible_truncation)]
            return Canonical::Integer(f as i64);
        }
        Canonical::Float(f.to_bits())
    }

    fn from_text(s: &str) -> Self {
        if let Ok(n) = s.parse::<i64>() {
            if n.to_string() == s {
                return Canonical::Integer(n);
            }
        }
        if is_decimal_literal(s) {
            if let Ok(f) = s.parse::<f64>() {
                if f.is_finite() {
                    return Self::from_float(f);
                }
            }
        }
        Canonical::Text(s.to_string())
    }

    /// Returns true for the null form.
    pub fn is_null(&self) -> bool {
        matches!(self, Canonical::Null)
    }
}

impl From<&Value> for Canonical {
    fn from(value: &Value) -> Self {
        Canonical::from_value(value)
    }
}

impl fmt::Display for Canonical {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Canonical::Null => f.write_str("null"),
            Canonical::Bool(b) => write!(f, "{b}"),
            Canonical::Integer(n) => write!(f, "{n}"),
            Canonical::Float(bits) => write!(f, "{}", f64::from_bits(*bits)),
            Canonical::Text(s) => write!(f, "{s:?}"),
        }
    }
}

/// Matches `-?(0|[1-9][0-9]*)\.[0-9]+`.
fn is_decimal_literal(s: &str) -> bool {
    let unsigned = s.strip_prefix('-').unwrap_or(s);
    let Some((int_part, frac_part)) = unsigned.split_once('.') else {
        return false;
    };
    let int_ok = int_part == "0"
        || (!int_part.is_empty()
            && !int_part.starts_with('0')
            && int_part.bytes().all(|b| b.is_ascii_digit()));
    int_ok && !frac_part.is_empty() && frac_part.bytes().all(|b| b.is_ascii_digit())
}
