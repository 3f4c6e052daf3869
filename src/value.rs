//! Typed scalar values and text-token coercion.
//!
//! Monitor lines carry untyped text. [`coerce`] turns a token into the most
//! specific [`Value`]: integer, then float, then the text itself.
//!
//! ```rust
//! use spectre_monitor::value::{coerce, Value};
//!
//! assert_eq!(coerce("1.23D+04,"), Value::Float(12300.0));
//! assert_eq!(coerce("-7"), Value::Int(-7));
//! assert_eq!(coerce("NaN"), Value::Text("NaN".to_string()));
//! ```

use std::fmt;

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

lazy_static! {
    static ref INT_PATTERN: Regex = Regex::new(r"^[+-]?[0-9]+$").unwrap();
    static ref FLOAT_PATTERN: Regex =
        Regex::new(r"^[+-]?(?:[0-9]+\.?[0-9]*|\.[0-9]+)(?:[eE][+-]?[0-9]+)?$").unwrap();
}

/// A document field value.
///
/// Serialized untagged, so a document on disk is plain JSON. Equality is
/// type-strict: `Int(2)` and `Float(2.0)` are different values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// Signed integer
    Int(i64),
    /// Floating point number
    Float(f64),
    /// Text that is not numeric
    Text(String),
    /// Repeated field values in arrival order
    List(Vec<Value>),
}

impl Value {
    /// Integer payload, if this is an `Int`.
    #[must_use]
    pub const fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Float payload, if this is a `Float`.
    #[must_use]
    pub const fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// Text payload, if this is a `Text`.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(v) => Some(v),
            _ => None,
        }
    }

    /// List payload, if this is a `List`.
    #[must_use]
    pub fn as_list(&self) -> Option<&[Self]> {
        match self {
            Self::List(v) => Some(v),
            _ => None,
        }
    }

    /// Append a repeated value: a scalar is promoted to a two-element list,
    /// an existing list grows by one.
    pub fn append(&mut self, value: Self) {
        match self {
            Self::List(items) => items.push(value),
            scalar => {
                let first = std::mem::replace(scalar, Self::List(Vec::with_capacity(2)));
                if let Self::List(items) = scalar {
                    items.push(first);
                    items.push(value);
                }
            }
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Text(v) => f.write_str(v),
            Self::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<Vec<Self>> for Value {
    fn from(v: Vec<Self>) -> Self {
        Self::List(v)
    }
}

/// Convert a raw text token into the most specific [`Value`].
///
/// Surrounding whitespace and one trailing comma are removed, and Fortran
/// exponent markers (`D`/`d`) are read as `e`. Never fails: a token that is
/// neither an integer nor a finite float comes back as `Text`.
#[must_use]
pub fn coerce(token: &str) -> Value {
    let trimmed = token.trim();
    let trimmed = trimmed.strip_suffix(',').unwrap_or(trimmed).trim_end();
    let normalized = trimmed.replace(['D', 'd'], "e");

    if INT_PATTERN.is_match(&normalized) {
        if let Ok(v) = normalized.parse::<i64>() {
            return Value::Int(v);
        }
    }
    if FLOAT_PATTERN.is_match(&normalized) {
        // JSON has no encoding for inf; an overflowing exponent stays text.
        if let Some(v) = normalized.parse::<f64>().ok().filter(|v| v.is_finite()) {
            return Value::Float(v);
        }
    }
    Value::Text(trimmed.to_string())
}
