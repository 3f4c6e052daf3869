//! Exact-match queries over documents

use std::collections::BTreeMap;

use super::Document;
use crate::value::Value;

/// A conjunction of `field == value` conditions.
///
/// A document matches when every queried field is present and equal in both
/// type and value. The empty query matches every document.
///
/// ```rust
/// use spectre_monitor::store::{Document, Query};
///
/// let doc = Document::from([("time_tsnumber", 10), ("job_id", 7)]);
/// assert!(Query::new().eq("job_id", 7).matches(&doc));
/// assert!(!Query::new().eq("job_id", 7.0).matches(&doc));
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    conditions: BTreeMap<String, Value>,
}

impl Query {
    /// Create a query that matches everything.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an equality condition.
    #[must_use]
    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conditions.insert(field.into(), value.into());
        self
    }

    /// Check whether the query has no conditions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// Iterate the conditions.
    pub fn conditions(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.conditions.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Test a document against every condition.
    #[must_use]
    pub fn matches(&self, doc: &Document) -> bool {
        self.conditions
            .iter()
            .all(|(field, expected)| doc.get(field) == Some(expected))
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Query {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            conditions: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}
