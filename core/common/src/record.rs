//! The normalized record model shared by the sync engine and index clients.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A normalized unit of indexable content.
///
/// Every record carries a stable `id` (unique within its physical index,
/// immutable once assigned) plus an open set of semantic fields chosen by
/// the transformer that produced it. Serializes as a single flat JSON
/// object with the identity under `"id"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexRecord {
    /// Identity of the record within its physical index.
    pub id: String,
    /// Open set of semantic fields exposed to the index.
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl IndexRecord {
    /// Create a record with an identity and no fields.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            fields: Map::new(),
        }
    }

    /// Builder-style field setter.
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Look up a field by name.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Insert or replace a field.
    pub fn set_field(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(name.into(), value.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_field_access() {
        let record = IndexRecord::new("a")
            .with_field("title", "Hello")
            .with_field("modified", 7);

        assert_eq!(record.id, "a");
        assert_eq!(record.field("title"), Some(&json!("Hello")));
        assert_eq!(record.field("modified"), Some(&json!(7)));
        assert_eq!(record.field("missing"), None);
    }

    #[test]
    fn test_serializes_flat() {
        let record = IndexRecord::new("a").with_field("slug", "hello");
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value, json!({"id": "a", "slug": "hello"}));

        let back: IndexRecord = serde_json::from_value(value).unwrap();
        assert_eq!(back, record);
    }
}
