//! Flat archetype-path documents.
//!
//! A [`Document`] is the wire shape handed to the clinical-record store: a flat map from
//! archetype path to value. Keys are ordered so the serialised JSON is deterministic.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A single document value.
///
/// Every field type writes text except `integer`, which stores the parsed number.
///
/// Stored documents written by older clients may also hold `null`, floats or booleans. Those
/// load as [`DocumentValue::Other`] so the rest of the document stays readable; extraction skips
/// them as malformed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DocumentValue {
    Integer(i64),
    Text(String),
    Other(serde_json::Value),
}

impl DocumentValue {
    /// Returns the text content, or `None` for non-text values.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            DocumentValue::Text(text) => Some(text),
            DocumentValue::Integer(_) | DocumentValue::Other(_) => None,
        }
    }

    /// Converts the value into its form-side JSON representation.
    ///
    /// Returns `None` for [`DocumentValue::Other`], which has no form-side meaning.
    pub fn to_json(&self) -> Option<serde_json::Value> {
        match self {
            DocumentValue::Integer(n) => Some(serde_json::Value::from(*n)),
            DocumentValue::Text(text) => Some(serde_json::Value::String(text.clone())),
            DocumentValue::Other(_) => None,
        }
    }
}

impl fmt::Display for DocumentValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentValue::Integer(n) => write!(f, "{n}"),
            DocumentValue::Text(text) => write!(f, "{text}"),
            DocumentValue::Other(raw) => write!(f, "{raw}"),
        }
    }
}

impl From<&str> for DocumentValue {
    fn from(value: &str) -> Self {
        DocumentValue::Text(value.to_string())
    }
}

impl From<String> for DocumentValue {
    fn from(value: String) -> Self {
        DocumentValue::Text(value)
    }
}

impl From<i64> for DocumentValue {
    fn from(value: i64) -> Self {
        DocumentValue::Integer(value)
    }
}

/// Flat archetype-path keyed document.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Document(BTreeMap<String, DocumentValue>);

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&DocumentValue> {
        self.0.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Inserts a value, replacing any previous value at `key`.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<DocumentValue>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &DocumentValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Serialises the document to the JSON bytes uploaded to storage.
    pub fn to_json_vec(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}

impl FromIterator<(String, DocumentValue)> for Document {
    fn from_iter<I: IntoIterator<Item = (String, DocumentValue)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
