//! Form data and form paths.
//!
//! Form data is the nested JSON object produced by the data-entry screens. Fields inside it are
//! addressed by [`FormPath`]s: dot-separated keys with optional array indices, for example
//! `documents[0].number` or `address.city`.

use crate::{EhrError, EhrResult};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// One step of a [`FormPath`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

/// A parsed form path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FormPath {
    raw: String,
    segments: Vec<PathSegment>,
}

impl FormPath {
    /// Parses a dotted/indexed form path.
    ///
    /// # Errors
    ///
    /// Returns [`EhrError::InvalidFormPath`] if the path is empty, contains an empty key
    /// (`a..b`, trailing `.`), or an index that is not a base-10 number (`a[x]`, `a[`).
    pub fn parse(raw: &str) -> EhrResult<Self> {
        let invalid = || EhrError::InvalidFormPath(raw.to_string());

        if raw.trim().is_empty() {
            return Err(invalid());
        }

        let mut segments = Vec::new();
        for (position, part) in raw.split('.').enumerate() {
            let (key, mut rest) = match part.find('[') {
                Some(bracket) => (&part[..bracket], &part[bracket..]),
                None => (part, ""),
            };

            if key.is_empty() {
                // Only a leading index (`[0].name`) may omit the key.
                if position != 0 || rest.is_empty() {
                    return Err(invalid());
                }
            } else {
                segments.push(PathSegment::Key(key.to_string()));
            }

            while !rest.is_empty() {
                let close = rest.find(']').ok_or_else(invalid)?;
                let index = rest[1..close].parse::<usize>().map_err(|_| invalid())?;
                segments.push(PathSegment::Index(index));
                rest = &rest[close + 1..];
                if !rest.is_empty() && !rest.starts_with('[') {
                    return Err(invalid());
                }
            }
        }

        Ok(Self {
            raw: raw.to_string(),
            segments,
        })
    }

    /// Builds a path from a literal known to be well formed.
    ///
    /// Used by the built-in spec tables.
    pub(crate) fn from_static(raw: &'static str) -> Self {
        Self::parse(raw).expect("built-in form path is valid")
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    /// Looks up the value at this path inside `root`.
    pub fn lookup<'v>(&self, root: &'v Value) -> Option<&'v Value> {
        self.segments
            .iter()
            .try_fold(root, |current, segment| match segment {
                PathSegment::Key(key) => current.as_object()?.get(key),
                PathSegment::Index(index) => current.as_array()?.get(*index),
            })
    }

    /// Writes `value` at this path inside `root`, creating intermediate objects and arrays.
    ///
    /// Intermediate values of the wrong shape are replaced. Arrays are padded with `null` up
    /// to the written index.
    pub fn assign(&self, root: &mut Value, value: Value) {
        let mut current = root;
        for segment in &self.segments {
            current = match segment {
                PathSegment::Key(key) => {
                    if !current.is_object() {
                        *current = Value::Object(Map::new());
                    }
                    let Value::Object(map) = current else {
                        unreachable!("replaced with an object above")
                    };
                    map.entry(key.clone()).or_insert(Value::Null)
                }
                PathSegment::Index(index) => {
                    if !current.is_array() {
                        *current = Value::Array(Vec::new());
                    }
                    let Value::Array(items) = current else {
                        unreachable!("replaced with an array above")
                    };
                    if items.len() <= *index {
                        items.resize(*index + 1, Value::Null);
                    }
                    &mut items[*index]
                }
            };
        }
        *current = value;
    }
}

impl fmt::Display for FormPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl FromStr for FormPath {
    type Err = EhrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for FormPath {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.raw)
    }
}

impl<'de> Deserialize<'de> for FormPath {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// Nested form values as produced by the data-entry screens.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FormData(Value);

impl Default for FormData {
    fn default() -> Self {
        Self::new()
    }
}

impl FormData {
    /// Creates empty form data (`{}`).
    pub fn new() -> Self {
        Self(Value::Object(Map::new()))
    }

    pub fn get(&self, path: &FormPath) -> Option<&Value> {
        path.lookup(&self.0)
    }

    pub fn set(&mut self, path: &FormPath, value: Value) {
        path.assign(&mut self.0, value);
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }

    /// Returns `true` when the form holds no populated value.
    ///
    /// Empty objects and arrays, and `null`, do not count as populated.
    pub fn is_empty(&self) -> bool {
        !is_populated(&self.0)
    }
}

impl From<Value> for FormData {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

/// Returns `true` if `value` contains at least one non-null leaf.
pub(crate) fn is_populated(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Object(map) => map.values().any(is_populated),
        Value::Array(items) => items.iter().any(is_populated),
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_dotted_and_indexed_paths() {
        let path = FormPath::parse("documents[0].number").expect("valid path");
        assert_eq!(
            path.segments(),
            &[
                PathSegment::Key("documents".into()),
                PathSegment::Index(0),
                PathSegment::Key("number".into()),
            ]
        );

        let nested = FormPath::parse("matrix[1][2]").expect("valid path");
        assert_eq!(
            nested.segments(),
            &[
                PathSegment::Key("matrix".into()),
                PathSegment::Index(1),
                PathSegment::Index(2),
            ]
        );
    }

    #[test]
    fn test_parse_rejects_malformed_paths() {
        for raw in ["", "  ", "a..b", "a.", "a[x]", "a[1", "a[1]b", ".a"] {
            let err = FormPath::parse(raw).expect_err(raw);
            assert!(matches!(err, EhrError::InvalidFormPath(p) if p == raw));
        }
    }

    #[test]
    fn test_lookup_reads_nested_values() {
        let form = FormData::from(json!({
            "address": { "city": "Lesbos" },
            "documents": [{ "number": "A1" }, { "number": "B2" }]
        }));

        let city = FormPath::parse("address.city").unwrap();
        let second = FormPath::parse("documents[1].number").unwrap();
        let missing = FormPath::parse("documents[5].number").unwrap();

        assert_eq!(form.get(&city), Some(&json!("Lesbos")));
        assert_eq!(form.get(&second), Some(&json!("B2")));
        assert_eq!(form.get(&missing), None);
    }

    #[test]
    fn test_assign_creates_intermediate_containers() {
        let mut form = FormData::new();
        form.set(&FormPath::parse("family[1].name.given").unwrap(), json!("Omar"));

        assert_eq!(
            form.into_value(),
            json!({ "family": [null, { "name": { "given": "Omar" } }] })
        );
    }

    #[test]
    fn test_assign_overwrites_scalars_on_the_way() {
        let mut form = FormData::from(json!({ "address": "unknown" }));
        form.set(&FormPath::parse("address.city").unwrap(), json!("Athens"));

        assert_eq!(form.into_value(), json!({ "address": { "city": "Athens" } }));
    }

    #[test]
    fn test_is_empty_ignores_empty_containers() {
        assert!(FormData::new().is_empty());
        assert!(FormData::from(json!({ "items": [], "x": null, "y": {} })).is_empty());
        assert!(!FormData::from(json!({ "flag": false })).is_empty());
    }
}
