//! Content store boundary with the host pipeline.

use serde_json::Value;
use std::collections::HashMap;

use syndex_common::{Error, Result};

/// Source of raw content items, supplied by the host pipeline.
///
/// Each content type maps to an ordered sequence of raw items; the sync
/// engine treats the items as opaque JSON and leaves interpretation to the
/// per-collection transformer.
pub trait ContentStore: Send + Sync {
    /// Fetch all raw items for a named content type, in pipeline order.
    ///
    /// # Errors
    /// - Unknown content type
    fn get_collection(&self, content_type_name: &str) -> Result<Vec<Value>>;
}

/// In-memory content store for testing and development.
#[derive(Debug, Default)]
pub struct MemoryContentStore {
    collections: HashMap<String, Vec<Value>>,
}

impl MemoryContentStore {
    /// Create a new empty content store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a content type's items.
    pub fn insert(&mut self, content_type_name: impl Into<String>, items: Vec<Value>) {
        self.collections.insert(content_type_name.into(), items);
    }
}

impl ContentStore for MemoryContentStore {
    fn get_collection(&self, content_type_name: &str) -> Result<Vec<Value>> {
        self.collections
            .get(content_type_name)
            .cloned()
            .ok_or_else(|| {
                Error::configuration(format!("unknown content type '{content_type_name}'"))
            })
    }
}
