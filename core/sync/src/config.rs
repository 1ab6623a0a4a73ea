//! Run and per-collection configuration.

use serde_json::Value;
use std::fmt;
use std::sync::Arc;

use syndex_common::{Error, IndexName, IndexRecord, Result};

/// Default number of records per write chunk.
pub const DEFAULT_CHUNK_SIZE: usize = 1000;

/// Maps a raw content item to a normalized index record.
pub type RecordTransformer = Arc<dyn Fn(&Value) -> IndexRecord + Send + Sync>;

fn default_match_fields() -> Vec<String> {
    vec!["modified".to_string()]
}

/// Configuration for syncing one logical collection.
///
/// Immutable for the duration of a run; validated once at run start.
#[derive(Clone)]
pub struct CollectionSpec {
    /// Target physical index.
    pub index_name: IndexName,
    /// Content type to pull from the content store.
    pub content_type_name: String,
    /// Record transformer; [`default_transformer`](crate::default_transformer)
    /// when unset.
    pub transformer: Option<RecordTransformer>,
    /// Fields compared to decide whether a record is unchanged.
    /// Defaults to `["modified"]`; must be non-empty.
    pub match_fields: Vec<String>,
    /// Per-collection override of the run-wide chunk size.
    pub chunk_size: Option<usize>,
}

impl CollectionSpec {
    /// Create a spec with default match fields and transformer.
    pub fn new(index_name: IndexName, content_type_name: impl Into<String>) -> Self {
        Self {
            index_name,
            content_type_name: content_type_name.into(),
            transformer: None,
            match_fields: default_match_fields(),
            chunk_size: None,
        }
    }

    /// Set a custom record transformer.
    pub fn with_transformer<F>(mut self, transformer: F) -> Self
    where
        F: Fn(&Value) -> IndexRecord + Send + Sync + 'static,
    {
        self.transformer = Some(Arc::new(transformer));
        self
    }

    /// Set the match fields used for change detection.
    pub fn with_match_fields(mut self, match_fields: Vec<String>) -> Self {
        self.match_fields = match_fields;
        self
    }

    /// Override the chunk size for this collection only.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = Some(chunk_size);
        self
    }

    /// Validate the spec, identifying it by its collection number.
    pub(crate) fn validate(&self, collection: usize) -> Result<()> {
        if self.content_type_name.is_empty() {
            return Err(Error::collection_configuration(
                collection,
                "contentTypeName is required",
            ));
        }
        if self.match_fields.is_empty() || self.match_fields.iter().any(String::is_empty) {
            return Err(Error::collection_configuration(
                collection,
                "matchFields must be a non-empty list of field names",
            ));
        }
        if self.chunk_size == Some(0) {
            return Err(Error::collection_configuration(
                collection,
                "chunkSize must be greater than zero",
            ));
        }
        Ok(())
    }
}

impl fmt::Debug for CollectionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CollectionSpec")
            .field("index_name", &self.index_name)
            .field("content_type_name", &self.content_type_name)
            .field("transformer", &self.transformer.as_ref().map(|_| "custom"))
            .field("match_fields", &self.match_fields)
            .field("chunk_size", &self.chunk_size)
            .finish()
    }
}

/// Options for one sync run.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Site-wide base URL of the host pipeline. Required; its absence is a
    /// fatal configuration error before any sync begins.
    pub site_url: Option<String>,
    /// Run-wide number of records per write chunk.
    pub chunk_size: usize,
    /// Diff against remote contents instead of rebuilding via shadow swap.
    pub enable_partial_updates: bool,
    /// Collections to sync, in configuration order.
    pub collections: Vec<CollectionSpec>,
}

impl SyncOptions {
    /// Create options with the required site URL and defaults elsewhere.
    pub fn new(site_url: impl Into<String>) -> Self {
        Self {
            site_url: Some(site_url.into()),
            ..Self::default()
        }
    }

    /// Set the run-wide chunk size.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Enable or disable partial updates.
    pub fn with_partial_updates(mut self, enabled: bool) -> Self {
        self.enable_partial_updates = enabled;
        self
    }

    /// Append a collection.
    pub fn with_collection(mut self, spec: CollectionSpec) -> Self {
        self.collections.push(spec);
        self
    }

    /// Validate the whole run configuration up front.
    pub(crate) fn validate(&self) -> Result<()> {
        match &self.site_url {
            Some(url) if !url.is_empty() => {}
            _ => return Err(Error::configuration("siteUrl is required")),
        }
        if self.chunk_size == 0 {
            return Err(Error::configuration("chunkSize must be greater than zero"));
        }
        for (number, spec) in self.collections.iter().enumerate() {
            spec.validate(number)?;
        }
        Ok(())
    }
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            site_url: None,
            chunk_size: DEFAULT_CHUNK_SIZE,
            enable_partial_updates: false,
            collections: Vec::new(),
        }
    }
}
