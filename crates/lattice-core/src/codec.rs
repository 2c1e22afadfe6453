//! Canonical JSON encoding used as the hash input for block identity.
//!
//! The encoding is byte-stable across implementations:
//!
//! - object keys are emitted in lexicographic (byte) order, whatever order
//!   they were inserted in
//! - strings escape `\\`, `"`, `\b`, `\f`, `\n`, `\r`, `\t`; remaining
//!   control characters become `\u00XX`; everything else is raw UTF-8
//! - integers render as plain decimal, with arbitrary width up to 128 bits
//! - byte strings (hashes, signatures, bitmaps) render as unpadded
//!   URL-safe base64 inside a JSON string
//! - no insignificant whitespace
//!
//! Floats have no representation. Converting untyped JSON that carries one
//! fails with [`CoreError::UnsupportedValue`] instead of coercing it.

use std::collections::BTreeMap;

use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};

use crate::crypto::{encode_base64, hash_sha256, Hash};
use crate::error::CoreError;

/// A value tree that can be canonically encoded
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CanonicalValue {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u128),
    Str(String),
    Bytes(Vec<u8>),
    Array(Vec<CanonicalValue>),
    Object(BTreeMap<String, CanonicalValue>),
}

impl CanonicalValue {
    /// Start an empty object
    pub fn object() -> ObjectBuilder {
        ObjectBuilder::default()
    }
}

impl From<&str> for CanonicalValue {
    fn from(value: &str) -> Self {
        CanonicalValue::Str(value.to_string())
    }
}

impl From<String> for CanonicalValue {
    fn from(value: String) -> Self {
        CanonicalValue::Str(value)
    }
}

impl From<u64> for CanonicalValue {
    fn from(value: u64) -> Self {
        CanonicalValue::UInt(value as u128)
    }
}

impl From<u128> for CanonicalValue {
    fn from(value: u128) -> Self {
        CanonicalValue::UInt(value)
    }
}

impl From<Hash> for CanonicalValue {
    fn from(value: Hash) -> Self {
        CanonicalValue::Bytes(value.to_vec())
    }
}

impl From<bool> for CanonicalValue {
    fn from(value: bool) -> Self {
        CanonicalValue::Bool(value)
    }
}

/// Fluent builder for canonical objects
#[derive(Debug, Default)]
pub struct ObjectBuilder {
    fields: BTreeMap<String, CanonicalValue>,
}

impl ObjectBuilder {
    pub fn field(mut self, key: &str, value: impl Into<CanonicalValue>) -> Self {
        self.fields.insert(key.to_string(), value.into());
        self
    }

    pub fn bytes(mut self, key: &str, value: &[u8]) -> Self {
        self.fields
            .insert(key.to_string(), CanonicalValue::Bytes(value.to_vec()));
        self
    }

    pub fn build(self) -> CanonicalValue {
        CanonicalValue::Object(self.fields)
    }
}

impl TryFrom<&serde_json::Value> for CanonicalValue {
    type Error = CoreError;

    fn try_from(value: &serde_json::Value) -> Result<Self, Self::Error> {
        use serde_json::Value;

        Ok(match value {
            Value::Null => CanonicalValue::Null,
            Value::Bool(b) => CanonicalValue::Bool(*b),
            Value::Number(n) => number_value(n)?,
            Value::String(s) => CanonicalValue::Str(s.clone()),
            Value::Array(items) => CanonicalValue::Array(
                items
                    .iter()
                    .map(CanonicalValue::try_from)
                    .collect::<Result<_, _>>()?,
            ),
            Value::Object(map) => {
                let mut fields = BTreeMap::new();
                for (key, item) in map {
                    fields.insert(key.clone(), CanonicalValue::try_from(item)?);
                }
                CanonicalValue::Object(fields)
            }
        })
    }
}

/// Integers only. The decimal text is re-parsed so amounts above `u64::MAX`
/// survive a round trip through untyped JSON.
fn number_value(n: &serde_json::Number) -> Result<CanonicalValue, CoreError> {
    let text = n.to_string();
    if let Ok(u) = text.parse::<u128>() {
        return Ok(CanonicalValue::UInt(u));
    }
    if let Ok(i) = text.parse::<i64>() {
        return Ok(CanonicalValue::Int(i));
    }
    Err(CoreError::UnsupportedValue(format!("float {}", text)))
}

impl Serialize for CanonicalValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            CanonicalValue::Null => serializer.serialize_unit(),
            CanonicalValue::Bool(b) => serializer.serialize_bool(*b),
            CanonicalValue::Int(i) => serializer.serialize_i64(*i),
            CanonicalValue::UInt(u) => serializer.serialize_u128(*u),
            CanonicalValue::Str(s) => serializer.serialize_str(s),
            CanonicalValue::Bytes(bytes) => serializer.serialize_str(&encode_base64(bytes)),
            CanonicalValue::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            CanonicalValue::Object(fields) => {
                // BTreeMap<String, _> iterates in byte order of the keys
                let mut map = serializer.serialize_map(Some(fields.len()))?;
                for (key, item) in fields {
                    map.serialize_entry(key, item)?;
                }
                map.end()
            }
        }
    }
}

/// Types with a canonical encoding
pub trait Canonical {
    fn to_canonical(&self) -> CanonicalValue;
}

impl Canonical for CanonicalValue {
    fn to_canonical(&self) -> CanonicalValue {
        self.clone()
    }
}

/// Encode a value canonically
pub fn canonicalize<T: Canonical + ?Sized>(value: &T) -> String {
    // Keys are always strings and output goes to memory
    serde_json::to_string(&value.to_canonical()).expect("serializing canonical value")
}

/// `SHA-256(utf8(canonicalize(value)))`
pub fn canonical_hash<T: Canonical + ?Sized>(value: &T) -> Hash {
    hash_sha256(canonicalize(value).as_bytes())
}
