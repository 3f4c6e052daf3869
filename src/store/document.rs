//! Document - one persisted monitoring record

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

use super::timestamp::parse_scraped_at;
use crate::value::Value;

/// Field holding the document id.
pub const ID_FIELD: &str = "_id";
/// Field holding the ingestion timestamp.
pub const SCRAPED_AT_FIELD: &str = "_scraped_at";
/// Field holding the simulation timestep; the grouping key.
pub const TIMESTEP_FIELD: &str = "time_tsnumber";
/// Field holding the job identifier stamped on every record.
pub const JOB_ID_FIELD: &str = "job_id";

/// A mapping from field name to [`Value`].
///
/// ## Field Order
///
/// Serialization is canonical: `time_tsnumber` first, then every other field
/// in byte-wise alphabetical order. The same document always produces the
/// same JSON text.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct Document {
    fields: BTreeMap<String, Value>,
}

impl Document {
    /// Create an empty document.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a field value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Mutable access to a field value.
    pub fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        self.fields.get_mut(key)
    }

    /// Set a field, returning the previous value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.fields.insert(key.into(), value.into())
    }

    /// Remove a field.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.fields.remove(key)
    }

    /// Check whether a field is present.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    /// Number of fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Check if the document has no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterate fields in canonical order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        let timestep = self.fields.get_key_value(TIMESTEP_FIELD);
        timestep.into_iter().chain(
            self.fields
                .iter()
                .filter(|(k, _)| k.as_str() != TIMESTEP_FIELD),
        )
        .map(|(k, v)| (k.as_str(), v))
    }

    /// The document id, if assigned.
    #[must_use]
    pub fn id(&self) -> Option<&Value> {
        self.get(ID_FIELD)
    }

    /// The simulation timestep, if present and integral.
    #[must_use]
    pub fn timestep(&self) -> Option<i64> {
        self.get(TIMESTEP_FIELD).and_then(Value::as_i64)
    }

    /// The parsed ingestion timestamp, if present and well formed.
    #[must_use]
    pub fn scraped_at(&self) -> Option<DateTime<Utc>> {
        self.get(SCRAPED_AT_FIELD)
            .and_then(Value::as_str)
            .and_then(parse_scraped_at)
    }
}

impl Serialize for Document {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (key, value) in self.iter() {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Document {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            fields: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl<K: Into<String>, V: Into<Value>, const N: usize> From<[(K, V); N]> for Document {
    fn from(pairs: [(K, V); N]) -> Self {
        pairs.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_serialization_order() {
        let doc = Document::from([
            ("zeta", Value::Int(1)),
            ("_id", Value::from("3")),
            ("time_tsnumber", Value::Int(72)),
            ("alpha", Value::Float(0.5)),
        ]);

        let json = serde_json::to_string(&doc).unwrap();
        assert_eq!(
            json,
            r#"{"time_tsnumber":72,"_id":"3","alpha":0.5,"zeta":1}"#
        );
    }

    #[test]
    fn test_deserialize_any_order() {
        let doc: Document =
            serde_json::from_str(r#"{"b":[1,2],"time_tsnumber":5,"a":"x"}"#).unwrap();
        assert_eq!(doc.timestep(), Some(5));
        assert_eq!(
            doc.get("b"),
            Some(&Value::List(vec![Value::Int(1), Value::Int(2)]))
        );
        let keys: Vec<&str> = doc.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, ["time_tsnumber", "a", "b"]);
    }

    #[test]
    fn test_scraped_at_accessor() {
        let mut doc = Document::new();
        assert!(doc.scraped_at().is_none());

        doc.insert(SCRAPED_AT_FIELD, "2025-03-14 16:15:30 UTC");
        assert!(doc.scraped_at().is_some());

        doc.insert(SCRAPED_AT_FIELD, "not a time");
        assert!(doc.scraped_at().is_none());
    }

    #[test]
    fn test_rejects_unsupported_json() {
        assert!(serde_json::from_str::<Document>(r#"{"flag":true}"#).is_err());
        assert!(serde_json::from_str::<Document>("[1,2]").is_err());
    }
}
