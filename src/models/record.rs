//! Record-related data models.
//!
//! This module defines field values, the row predicate and the loaded record.

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;

/// A loaded row: column name to value.
pub type Record = BTreeMap<String, FieldValue>;

/// A single field value, as stored or loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// NULL value
    Null,
    Bool(bool),
    /// Integer value (stored as i64 for maximum range)
    Int(i64),
    Float(f64),
    Text(String),
    /// Binary data, written to JSON as base64. Deserializing never produces
    /// this variant: a base64 string reads back as [`FieldValue::Text`].
    #[serde(serialize_with = "base64_bytes::serialize", skip_deserializing)]
    Bytes(Vec<u8>),
    /// Structured value from a JSON column
    Json(JsonValue),
}

impl FieldValue {
    /// Parse a command-line literal: `null`, `true`/`false`, integers and
    /// floats are typed; anything else is text.
    pub fn parse_literal(s: &str) -> Self {
        if s.eq_ignore_ascii_case("null") {
            return Self::Null;
        }
        if s.eq_ignore_ascii_case("true") {
            return Self::Bool(true);
        }
        if s.eq_ignore_ascii_case("false") {
            return Self::Bool(false);
        }
        if let Ok(v) = s.parse::<i64>() {
            return Self::Int(v);
        }
        // Keep "nan", "inf" and friends as text
        if s.chars().any(|c| c.is_ascii_digit()) {
            if let Ok(v) = s.parse::<f64>() {
                if v.is_finite() {
                    return Self::Float(v);
                }
            }
        }
        Self::Text(s.to_string())
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for FieldValue {
    fn from(v: i32) -> Self {
        Self::Int(v.into())
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<Vec<u8>> for FieldValue {
    fn from(v: Vec<u8>) -> Self {
        Self::Bytes(v)
    }
}

impl From<JsonValue> for FieldValue {
    fn from(v: JsonValue) -> Self {
        Self::Json(v)
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Self::Null)
    }
}

/// Binary data as base64.
mod base64_bytes {
    use base64::{Engine as _, engine::general_purpose::STANDARD};
    use serde::{Serialize, Serializer};

    pub fn serialize<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        STANDARD.encode(bytes).serialize(serializer)
    }
}

/// Equality conditions selecting the accessor's row, joined with AND.
///
/// Keeps insertion order so generated WHERE clauses are stable; inserting an
/// existing column replaces its value in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Predicate(Vec<(String, FieldValue)>);

impl Predicate {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<FieldValue>) {
        let column = column.into();
        let value = value.into();
        match self.0.iter_mut().find(|(c, _)| *c == column) {
            Some((_, existing)) => *existing = value,
            None => self.0.push((column, value)),
        }
    }

    pub fn get(&self, column: &str) -> Option<&FieldValue> {
        self.0.iter().find(|(c, _)| c == column).map(|(_, v)| v)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.0.iter().map(|(c, v)| (c.as_str(), v))
    }
}

impl<K: Into<String>, V: Into<FieldValue>> FromIterator<(K, V)> for Predicate {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut predicate = Predicate::new();
        for (column, value) in iter {
            predicate.insert(column, value);
        }
        predicate
    }
}

impl Serialize for Predicate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (column, value) in &self.0 {
            map.serialize_entry(column, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Predicate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct PredicateVisitor;

        impl<'de> Visitor<'de> for PredicateVisitor {
            type Value = Predicate;

            fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                f.write_str("a map of column names to values")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Predicate, A::Error> {
                let mut predicate = Predicate::new();
                while let Some((column, value)) = map.next_entry::<String, FieldValue>()? {
                    predicate.insert(column, value);
                }
                Ok(predicate)
            }
        }

        deserializer.deserialize_map(PredicateVisitor)
    }
}
