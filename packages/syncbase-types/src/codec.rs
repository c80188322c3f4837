//! Codecs between application values and their stored driver form.
//!
//! One codec exists per scalar type tag and is resolved once when the
//! table descriptor is built. Encoding rules:
//!
//! | tag         | stored form                      |
//! |-------------|----------------------------------|
//! | string      | `Text` passthrough               |
//! | number      | `Real` passthrough               |
//! | boolean     | `Bool` passthrough               |
//! | date        | `Int` epoch milliseconds (UTC)   |
//! | big-integer | `Text` decimal string            |
//! | unsupported | `Text` passthrough, unindexed    |
//!
//! `Null` passes through every codec unchanged; nullability is enforced
//! by the mutation writer, not here.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::value::{ScalarType, StoredValue, Value};

/// Codec failures surfaced while encoding or decoding a column value.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CodecError {
    /// Value does not match the column's scalar tag
    #[error("type mismatch: expected {expected}, got {got}")]
    TypeMismatch { expected: String, got: String },

    /// Stored value cannot be decoded back into the application domain
    #[error("undecodable stored value for {tag}: {reason}")]
    Undecodable { tag: ScalarTypeName, reason: String },
}

/// Owned display name of a scalar tag, kept cheap to clone into errors.
pub type ScalarTypeName = String;

/// Per-tag value codec, resolved at schema-registration time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Codec {
    tag: ScalarType,
}

impl Codec {
    /// Resolves the codec for a scalar type tag.
    pub fn for_tag(tag: ScalarType) -> Self {
        Self { tag }
    }

    /// Returns the tag this codec was resolved for.
    pub fn tag(&self) -> ScalarType {
        self.tag
    }

    /// Encodes an application value into its stored driver form.
    pub fn to_storage(&self, value: &Value) -> Result<StoredValue, CodecError> {
        if value.is_null() {
            return Ok(StoredValue::Null);
        }

        match (self.tag, value) {
            (ScalarType::String, Value::String(s)) => Ok(StoredValue::Text(s.clone())),
            (ScalarType::Number, Value::Number(n)) => Ok(StoredValue::Real(*n)),
            (ScalarType::Boolean, Value::Bool(b)) => Ok(StoredValue::Bool(*b)),
            (ScalarType::Date, Value::Date(dt)) => Ok(StoredValue::Int(dt.timestamp_millis())),
            (ScalarType::BigInt, Value::BigInt(n)) => Ok(StoredValue::Text(n.to_string())),
            (ScalarType::Unsupported, Value::String(s)) => Ok(StoredValue::Text(s.clone())),
            (expected, got) => Err(CodecError::TypeMismatch {
                expected: expected.to_string(),
                got: got
                    .tag()
                    .map(|t| t.to_string())
                    .unwrap_or_else(|| "null".to_string()),
            }),
        }
    }

    /// Decodes a stored driver value back into the application domain.
    pub fn from_storage(&self, stored: &StoredValue) -> Result<Value, CodecError> {
        if stored.is_null() {
            return Ok(Value::Null);
        }

        match (self.tag, stored) {
            (ScalarType::String, StoredValue::Text(s)) => Ok(Value::String(s.clone())),
            (ScalarType::Number, StoredValue::Real(n)) => Ok(Value::Number(*n)),
            (ScalarType::Boolean, StoredValue::Bool(b)) => Ok(Value::Bool(*b)),
            (ScalarType::Date, StoredValue::Int(millis)) => {
                let dt: DateTime<Utc> = DateTime::from_timestamp_millis(*millis).ok_or_else(|| {
                    CodecError::Undecodable {
                        tag: self.tag.to_string(),
                        reason: format!("epoch millis {} out of range", millis),
                    }
                })?;
                Ok(Value::Date(dt))
            }
            (ScalarType::BigInt, StoredValue::Text(s)) => {
                let n = s.parse::<i128>().map_err(|e| CodecError::Undecodable {
                    tag: self.tag.to_string(),
                    reason: format!("'{}' is not a decimal integer: {}", s, e),
                })?;
                Ok(Value::BigInt(n))
            }
            (ScalarType::Unsupported, StoredValue::Text(s)) => Ok(Value::String(s.clone())),
            (expected, got) => Err(CodecError::Undecodable {
                tag: expected.to_string(),
                reason: format!("unexpected stored form {:?}", got),
            }),
        }
    }
}
