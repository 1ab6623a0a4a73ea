//! Search index client trait definition.

use async_trait::async_trait;
use serde_json::{Map, Value};

use syndex_common::{IndexName, IndexRecord, Result, TaskId};

/// A single object returned while browsing an index, reduced to its
/// identity and the attributes that were requested.
#[derive(Debug, Clone)]
pub struct BrowseHit {
    /// Identity of the remote object.
    pub id: String,
    /// Requested attributes present on the remote object.
    pub attributes: Map<String, Value>,
}

/// One page of a paginated enumeration over an index's full contents.
#[derive(Debug, Clone)]
pub struct BrowsePage {
    /// Objects on this page.
    pub hits: Vec<BrowseHit>,
    /// Cursor for the next page; `None` when enumeration is complete.
    pub cursor: Option<String>,
}

/// Index aspects that can be copied between physical indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyScope {
    /// Index settings.
    Settings,
    /// Synonym definitions.
    Synonyms,
    /// Query rules.
    Rules,
}

impl CopyScope {
    /// All configuration aspects, in the order they are conventionally copied.
    pub const ALL: [CopyScope; 3] = [CopyScope::Settings, CopyScope::Synonyms, CopyScope::Rules];
}

/// Client trait for remote search index services.
///
/// Mutating operations return a [`TaskId`] for an asynchronous remote task;
/// callers must await the task via [`wait_task`](SearchIndexClient::wait_task)
/// before treating the mutation as durable. Implementations own their
/// credentials, transport, and retry policy.
#[async_trait]
pub trait SearchIndexClient: Send + Sync {
    /// Get the client name (e.g., "memory", "algolia").
    fn name(&self) -> &str;

    /// Number of objects currently held by the index.
    ///
    /// Used as an existence probe before a full rebuild.
    ///
    /// # Errors
    /// - Index not found
    /// - Network/transport errors
    async fn object_count(&self, index: &IndexName) -> Result<u64>;

    /// Enumerate one page of the index's full contents.
    ///
    /// # Preconditions
    /// - `cursor` is `None` for the first page, otherwise the cursor of the
    ///   previous page
    ///
    /// # Postconditions
    /// - Returned hits carry only the requested `attributes` (identity is
    ///   always returned separately on the hit)
    ///
    /// # Errors
    /// - Index not found
    /// - Invalid or expired cursor
    async fn browse(
        &self,
        index: &IndexName,
        attributes: &[String],
        cursor: Option<&str>,
    ) -> Result<BrowsePage>;

    /// Insert or replace a batch of records, keyed by record identity.
    ///
    /// # Postconditions
    /// - Returns the id of the remote task performing the upsert
    async fn save_objects(&self, index: &IndexName, records: &[IndexRecord]) -> Result<TaskId>;

    /// Delete a batch of objects by identity.
    ///
    /// # Postconditions
    /// - Returns the id of the remote task performing the deletion
    async fn delete_objects(&self, index: &IndexName, ids: &[String]) -> Result<TaskId>;

    /// Wait until the given remote task has completed.
    ///
    /// # Errors
    /// - Task failed or is unknown to the service
    async fn wait_task(&self, index: &IndexName, task: &TaskId) -> Result<()>;

    /// Copy configuration aspects from `source` to `target`.
    ///
    /// Copies only the named `scopes` (never object data). The target index
    /// is created if it does not exist.
    async fn copy_index(
        &self,
        source: &IndexName,
        target: &IndexName,
        scopes: &[CopyScope],
    ) -> Result<TaskId>;

    /// Move `source` onto `target`, replacing it.
    ///
    /// The service guarantees readers observe the rename as a single
    /// transition; the target's prior content is destroyed.
    async fn move_index(&self, source: &IndexName, target: &IndexName) -> Result<TaskId>;
}
