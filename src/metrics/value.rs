//! Typed scalar values and inference from raw text cells

use serde::{Deserialize, Serialize};
use std::fmt;

/// Scalar carried by a metric field
///
/// Serialized untagged so integers and floats appear as JSON numbers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetricValue {
    /// Integer value (counters, gauges reported without a fraction)
    Integer(i64),
    /// Floating point value
    Float(f64),
    /// Anything that did not parse as a number
    String(String),
}

/// Discriminant of a [`MetricValue`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Integer,
    Float,
    String,
}

impl MetricValue {
    /// Classify a raw cell.
    ///
    /// Integer is tried first, then float, then the text is kept as-is.
    /// `"3"` is therefore an integer even though it is also a valid float.
    pub fn infer(raw: &str) -> MetricValue {
        if let Some(n) = parse_int(raw) {
            return MetricValue::Integer(n);
        }
        if let Ok(f) = raw.parse::<f64>() {
            return MetricValue::Float(f);
        }
        MetricValue::String(raw.to_string())
    }

    pub fn kind(&self) -> ValueKind {
        match self {
            MetricValue::Integer(_) => ValueKind::Integer,
            MetricValue::Float(_) => ValueKind::Float,
            MetricValue::String(_) => ValueKind::String,
        }
    }

    /// Get as f64, converting if necessary
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            MetricValue::Integer(i) => Some(*i as f64),
            MetricValue::Float(f) => Some(*f),
            MetricValue::String(_) => None,
        }
    }
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricValue::Integer(i) => write!(f, "{}", i),
            MetricValue::Float(v) => write!(f, "{}", v),
            MetricValue::String(s) => f.write_str(s),
        }
    }
}

impl From<i64> for MetricValue {
    fn from(v: i64) -> Self {
        MetricValue::Integer(v)
    }
}

impl From<f64> for MetricValue {
    fn from(v: f64) -> Self {
        MetricValue::Float(v)
    }
}

impl From<String> for MetricValue {
    fn from(v: String) -> Self {
        MetricValue::String(v)
    }
}

impl From<&str> for MetricValue {
    fn from(v: &str) -> Self {
        MetricValue::String(v.to_string())
    }
}

/// Parse a signed 64-bit integer, taking the base from the literal's prefix.
///
/// `0x`/`0X` is hex, `0b`/`0B` binary, `0o`/`0O` or a bare leading `0`
/// octal, anything else decimal. An optional `+`/`-` precedes the prefix.
pub fn parse_int(raw: &str) -> Option<i64> {
    let (negative, unsigned) = match raw.as_bytes().first()? {
        b'-' => (true, &raw[1..]),
        b'+' => (false, &raw[1..]),
        _ => (false, raw),
    };

    let (radix, digits) = if let Some(rest) = strip_prefix_ci(unsigned, "0x") {
        (16, rest)
    } else if let Some(rest) = strip_prefix_ci(unsigned, "0b") {
        (2, rest)
    } else if let Some(rest) = strip_prefix_ci(unsigned, "0o") {
        (8, rest)
    } else if unsigned.len() > 1 && unsigned.starts_with('0') {
        (8, &unsigned[1..])
    } else {
        (10, unsigned)
    };

    // from_str_radix tolerates its own sign; a second sign is not a number.
    if digits.is_empty() || !digits.as_bytes()[0].is_ascii_alphanumeric() {
        return None;
    }

    let magnitude = u64::from_str_radix(digits, radix).ok()?;
    if negative {
        0i64.checked_sub_unsigned(magnitude)
    } else {
        i64::try_from(magnitude).ok()
    }
}

fn strip_prefix_ci<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    if s.len() >= prefix.len() && s[..prefix.len()].eq_ignore_ascii_case(prefix) {
        Some(&s[prefix.len()..])
    } else {
        None
    }
}
