//! Scalar type tags and value representations.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A materialized row: column name to application value.
pub type Row = BTreeMap<String, Value>;

/// Column type tags supported by the data layer.
///
/// Columns tagged with anything outside this set are still stored, but
/// they are excluded from secondary indexing and equality filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScalarType {
    /// UTF-8 string
    String,
    /// 64-bit floating point number
    Number,
    /// Boolean value
    Boolean,
    /// Point in time (UTC)
    Date,
    /// Arbitrary-precision integer (i128 domain)
    #[serde(rename = "big-integer")]
    BigInt,
    /// Opaque value outside the supported scalar set
    Unsupported,
}

impl ScalarType {
    /// Returns `true` if columns of this type can back a secondary index
    /// and appear in `where` equality filters.
    pub fn supports_index(&self) -> bool {
        !matches!(self, ScalarType::Unsupported)
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalarType::String => write!(f, "string"),
            ScalarType::Number => write!(f, "number"),
            ScalarType::Boolean => write!(f, "boolean"),
            ScalarType::Date => write!(f, "date"),
            ScalarType::BigInt => write!(f, "big-integer"),
            ScalarType::Unsupported => write!(f, "unsupported"),
        }
    }
}

/// Application-side value for a single column.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// UTF-8 string
    String(String),
    /// 64-bit floating point number
    Number(f64),
    /// Boolean value
    Bool(bool),
    /// Point in time (UTC)
    Date(DateTime<Utc>),
    /// Arbitrary-precision integer
    BigInt(i128),
    /// Absent value for a nullable column
    Null,
}

impl Value {
    /// Returns the scalar tag this value naturally belongs to, or `None`
    /// for `Null`, which fits any nullable column.
    pub fn tag(&self) -> Option<ScalarType> {
        match self {
            Value::String(_) => Some(ScalarType::String),
            Value::Number(_) => Some(ScalarType::Number),
            Value::Bool(_) => Some(ScalarType::Boolean),
            Value::Date(_) => Some(ScalarType::Date),
            Value::BigInt(_) => Some(ScalarType::BigInt),
            Value::Null => None,
        }
    }

    /// Returns `true` if this value is `Null`.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Number(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i128> for Value {
    fn from(value: i128) -> Self {
        Value::BigInt(value)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(value: DateTime<Utc>) -> Self {
        Value::Date(value)
    }
}

/// Driver-side value as written into change records.
///
/// This is the encoded form produced by a column's codec; it is what the
/// log serializes and what a future sync process would ship.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StoredValue {
    /// UTF-8 text
    Text(String),
    /// 64-bit float
    Real(f64),
    /// 64-bit signed integer
    Int(i64),
    /// Boolean
    Bool(bool),
    /// Absent value
    Null,
}

impl StoredValue {
    /// Returns `true` if this stored value is `Null`.
    pub fn is_null(&self) -> bool {
        matches!(self, StoredValue::Null)
    }
}

impl fmt::Display for StoredValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoredValue::Text(s) => write!(f, "{}", s),
            StoredValue::Real(n) => write!(f, "{}", n),
            StoredValue::Int(n) => write!(f, "{}", n),
            StoredValue::Bool(b) => write!(f, "{}", b),
            StoredValue::Null => write!(f, "null"),
        }
    }
}
