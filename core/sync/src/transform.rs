//! Raw item to index record transformation.

use serde_json::Value;

use crate::config::CollectionSpec;
use syndex_common::{Error, IndexRecord, Result};

/// Fields carried over by the default transformer, besides the identity.
const DEFAULT_FIELDS: [&str; 3] = ["title", "slug", "modified"];

/// Default raw-item transformer.
///
/// Extracts `id`, `title`, `slug`, and `modified` from the raw item; `id`
/// becomes the record identity. Items without an id produce a record with
/// an empty identity, which the first-record check rejects.
pub fn default_transformer(item: &Value) -> IndexRecord {
    let id = match item.get("id") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    };

    let mut record = IndexRecord::new(id);
    for name in DEFAULT_FIELDS {
        if let Some(value) = item.get(name) {
            record.set_field(name, value.clone());
        }
    }
    record
}

/// Transform every raw item of a collection into an index record.
///
/// The identity field is checked once against the first produced record of
/// a non-empty collection; the transformer is assumed uniform, so a missing
/// identity is a configuration error for the whole collection rather than a
/// per-record condition.
pub(crate) fn transform_collection(
    items: &[Value],
    spec: &CollectionSpec,
    collection: usize,
) -> Result<Vec<IndexRecord>> {
    let records: Vec<IndexRecord> = match &spec.transformer {
        Some(transformer) => items.iter().map(|item| transformer(item)).collect(),
        None => items.iter().map(default_transformer).collect(),
    };

    if let Some(first) = records.first() {
        if first.id.is_empty() {
            return Err(Error::collection_configuration(
                collection,
                "records produced by the transformer have no identity field",
            ));
        }
    }

    Ok(records)
}
