//! Data types for documents, metadata values, and search results.

use std::collections::HashMap;

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Reserved metadata key carrying the caller's stable document identifier.
pub const DOC_ID_KEY: &str = "doc_id";

/// Reserved metadata key under which vector search attaches the row score.
pub const SCORE_KEY: &str = "score";

/// A text record with metadata, produced upstream and handed to a vector store.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Document {
    /// The text content of the document.
    pub content: String,
    /// Key-value metadata associated with the document.
    #[serde(default)]
    pub metadata: HashMap<String, MetadataValue>,
}

impl Document {
    /// Create a document with the given content and no metadata.
    pub fn new(content: impl Into<String>) -> Self {
        Self { content: content.into(), metadata: HashMap::new() }
    }

    /// Add a metadata entry, replacing any previous value for `key`.
    pub fn with_metadata(
        mut self,
        key: impl Into<String>,
        value: impl Into<MetadataValue>,
    ) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// The caller-supplied `doc_id`, rendered as a string, if present and not null.
    pub fn doc_id(&self) -> Option<String> {
        self.metadata.get(DOC_ID_KEY).and_then(MetadataValue::render)
    }

    /// The score attached by vector search, if any.
    pub fn score(&self) -> Option<f64> {
        match self.metadata.get(SCORE_KEY) {
            Some(MetadataValue::Float(score)) => Some(*score),
            Some(MetadataValue::Integer(score)) => Some(*score as f64),
            _ => None,
        }
    }
}

/// A dynamically typed metadata value.
///
/// Values are normalized to JSON scalars by [`MetadataValue::to_json`] before
/// they are sent to a backend. Date/time values become RFC 3339 strings, so
/// they come back from a backend as [`MetadataValue::Text`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum MetadataValue {
    /// An explicit null.
    Null,
    /// A boolean flag.
    Bool(bool),
    /// A signed integer.
    Integer(i64),
    /// A floating point number.
    Float(f64),
    /// A string.
    Text(String),
    /// A timestamp with offset.
    DateTime(DateTime<FixedOffset>),
    /// Any other JSON value (arrays, objects).
    Json(Value),
}

impl MetadataValue {
    /// Normalize this value to the JSON form sent over the wire.
    ///
    /// Non-finite floats have no JSON representation and map to `null`.
    pub fn to_json(&self) -> Value {
        match self {
            MetadataValue::Null => Value::Null,
            MetadataValue::Bool(b) => Value::Bool(*b),
            MetadataValue::Integer(i) => Value::from(*i),
            MetadataValue::Float(f) => {
                serde_json::Number::from_f64(*f).map(Value::Number).unwrap_or(Value::Null)
            }
            MetadataValue::Text(s) => Value::String(s.clone()),
            MetadataValue::DateTime(dt) => Value::String(dt.to_rfc3339()),
            MetadataValue::Json(v) => v.clone(),
        }
    }

    /// Decode a JSON value returned by a backend.
    pub fn from_json(value: Value) -> Self {
        match value {
            Value::Null => MetadataValue::Null,
            Value::Bool(b) => MetadataValue::Bool(b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => MetadataValue::Integer(i),
                None => MetadataValue::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Value::String(s) => MetadataValue::Text(s),
            other => MetadataValue::Json(other),
        }
    }

    /// Render a scalar as a plain string. Returns `None` for null.
    pub fn render(&self) -> Option<String> {
        match self {
            MetadataValue::Null => None,
            MetadataValue::Text(s) => Some(s.clone()),
            MetadataValue::Json(Value::String(s)) => Some(s.clone()),
            other => Some(other.to_json().to_string()),
        }
    }

    /// Borrow the value as a string slice if it is text.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            MetadataValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

/// Normalize a whole metadata map into a JSON object.
pub fn normalize_metadata(
    metadata: &HashMap<String, MetadataValue>,
) -> serde_json::Map<String, Value> {
    metadata.iter().map(|(k, v)| (k.clone(), v.to_json())).collect()
}

impl From<&str> for MetadataValue {
    fn from(value: &str) -> Self {
        MetadataValue::Text(value.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(value: String) -> Self {
        MetadataValue::Text(value)
    }
}

impl From<bool> for MetadataValue {
    fn from(value: bool) -> Self {
        MetadataValue::Bool(value)
    }
}

impl From<i64> for MetadataValue {
    fn from(value: i64) -> Self {
        MetadataValue::Integer(value)
    }
}

impl From<i32> for MetadataValue {
    fn from(value: i32) -> Self {
        MetadataValue::Integer(value.into())
    }
}

impl From<f64> for MetadataValue {
    fn from(value: f64) -> Self {
        MetadataValue::Float(value)
    }
}

impl From<f32> for MetadataValue {
    fn from(value: f32) -> Self {
        MetadataValue::Float(value.into())
    }
}

impl From<DateTime<FixedOffset>> for MetadataValue {
    fn from(value: DateTime<FixedOffset>) -> Self {
        MetadataValue::DateTime(value)
    }
}

impl From<DateTime<Utc>> for MetadataValue {
    fn from(value: DateTime<Utc>) -> Self {
        MetadataValue::DateTime(value.fixed_offset())
    }
}

impl From<Value> for MetadataValue {
    fn from(value: Value) -> Self {
        MetadataValue::from_json(value)
    }
}

/// A retrieved [`Document`] paired with its distance score.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchResult {
    /// The retrieved document. Its metadata carries the score under `score`.
    pub document: Document,
    /// The distance to the query vector (lower is more similar).
    pub score: f32,
}
