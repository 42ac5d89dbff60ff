use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// A typed value stored under a [`Key`](crate::Key).
///
/// Chunk payloads are always [`KvValue::Bytes`]; the content-hash index
/// stores first-seen timestamps as [`KvValue::Timestamp`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum KvValue {
    Bytes(Vec<u8>),
    String(String),
    Int(i64),
    Timestamp(DateTime<Utc>),
}

impl KvValue {
    /// Short name of the value kind, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            KvValue::Bytes(_) => "bytes",
            KvValue::String(_) => "string",
            KvValue::Int(_) => "int",
            KvValue::Timestamp(_) => "timestamp",
        }
    }

    /// Approximate encoded size in bytes, compared against a backend's
    /// per-value limit.
    pub fn encoded_len(&self) -> usize {
        match self {
            KvValue::Bytes(b) => b.len(),
            KvValue::String(s) => s.len(),
            KvValue::Int(_) | KvValue::Timestamp(_) => 8,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            KvValue::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// Consume the value, returning its payload if it is binary.
    pub fn into_bytes(self) -> Result<Vec<u8>, TypeError> {
        match self {
            KvValue::Bytes(b) => Ok(b),
            other => Err(TypeError::UnexpectedValue {
                expected: "bytes",
                actual: other.kind(),
            }),
        }
    }

    pub fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            KvValue::Timestamp(t) => Some(*t),
            _ => None,
        }
    }
}

impl From<Vec<u8>> for KvValue {
    fn from(b: Vec<u8>) -> Self {
        KvValue::Bytes(b)
    }
}

impl From<&[u8]> for KvValue {
    fn from(b: &[u8]) -> Self {
        KvValue::Bytes(b.to_vec())
    }
}

impl From<String> for KvValue {
    fn from(s: String) -> Self {
        KvValue::String(s)
    }
}

impl From<&str> for KvValue {
    fn from(s: &str) -> Self {
        KvValue::String(s.to_string())
    }
}

impl From<i64> for KvValue {
    fn from(v: i64) -> Self {
        KvValue::Int(v)
    }
}

impl From<DateTime<Utc>> for KvValue {
    fn from(t: DateTime<Utc>) -> Self {
        KvValue::Timestamp(t)
    }
}
