//! In-memory search index client for testing.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, RwLock};
use uuid::Uuid;

use crate::client::{BrowseHit, BrowsePage, CopyScope, SearchIndexClient};
use syndex_common::{Error, IndexName, IndexRecord, Result, TaskId};

/// Stored state of one physical index.
#[derive(Debug, Clone, Default)]
struct StoredIndex {
    objects: BTreeMap<String, Map<String, Value>>,
    settings: Map<String, Value>,
    synonyms: Vec<Value>,
    rules: Vec<Value>,
}

/// Per-index operation counters.
#[derive(Debug, Clone, Default)]
pub struct OpCounts {
    /// Browse pages served.
    pub browses: usize,
    /// Upsert operations issued.
    pub saves: usize,
    /// Delete operations issued.
    pub deletes: usize,
    /// Configuration copies received (counted on the target).
    pub copies: usize,
    /// Moves received (counted on the target).
    pub moves: usize,
    /// Record count of each upsert operation, in issue order.
    pub save_sizes: Vec<usize>,
}

/// In-memory search index client.
///
/// Useful for testing and development. All data is stored in memory and
/// lost on drop. Records per-index operation counts and supports failure
/// injection for exercising error paths.
pub struct MemoryIndexClient {
    indices: Arc<RwLock<HashMap<String, StoredIndex>>>,
    /// Completed task ids; `wait_task` fails for ids not recorded here.
    tasks: Arc<RwLock<HashSet<String>>>,
    counts: Arc<RwLock<HashMap<String, OpCounts>>>,
    fail_saves: Arc<RwLock<HashSet<String>>>,
    fail_browses: Arc<RwLock<HashSet<String>>>,
    fail_deletes: Arc<RwLock<HashSet<String>>>,
    fail_moves: Arc<RwLock<HashSet<String>>>,
    page_size: usize,
}

impl MemoryIndexClient {
    /// Create a new empty client.
    pub fn new() -> Self {
        Self {
            indices: Arc::new(RwLock::new(HashMap::new())),
            tasks: Arc::new(RwLock::new(HashSet::new())),
            counts: Arc::new(RwLock::new(HashMap::new())),
            fail_saves: Arc::new(RwLock::new(HashSet::new())),
            fail_browses: Arc::new(RwLock::new(HashSet::new())),
            fail_deletes: Arc::new(RwLock::new(HashSet::new())),
            fail_moves: Arc::new(RwLock::new(HashSet::new())),
            page_size: 1000,
        }
    }

    /// Set the number of hits returned per browse page.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    /// Seed an object directly, creating the index if needed.
    pub fn seed_object(&self, index: &IndexName, id: impl Into<String>, fields: Map<String, Value>) {
        let mut indices = self.indices.write().unwrap();
        indices
            .entry(index.as_str().to_string())
            .or_default()
            .objects
            .insert(id.into(), fields);
    }

    /// Set index settings directly, creating the index if needed.
    pub fn set_settings(&self, index: &IndexName, settings: Map<String, Value>) {
        let mut indices = self.indices.write().unwrap();
        indices.entry(index.as_str().to_string()).or_default().settings = settings;
    }

    /// Whether a physical index exists.
    pub fn contains_index(&self, index: &IndexName) -> bool {
        self.indices.read().unwrap().contains_key(index.as_str())
    }

    /// Sorted ids of the objects currently held by an index.
    pub fn object_ids(&self, index: &IndexName) -> Vec<String> {
        self.indices
            .read()
            .unwrap()
            .get(index.as_str())
            .map(|idx| idx.objects.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Fields of a single stored object.
    pub fn object(&self, index: &IndexName, id: &str) -> Option<Map<String, Value>> {
        self.indices
            .read()
            .unwrap()
            .get(index.as_str())
            .and_then(|idx| idx.objects.get(id).cloned())
    }

    /// Settings of an index.
    pub fn settings(&self, index: &IndexName) -> Option<Map<String, Value>> {
        self.indices
            .read()
            .unwrap()
            .get(index.as_str())
            .map(|idx| idx.settings.clone())
    }

    /// Operation counts recorded for an index.
    pub fn op_counts(&self, index: &IndexName) -> OpCounts {
        self.counts
            .read()
            .unwrap()
            .get(index.as_str())
            .cloned()
            .unwrap_or_default()
    }

    /// Inject a failure into every subsequent upsert against the index.
    pub fn fail_saves_for(&self, index: &IndexName) {
        self.fail_saves.write().unwrap().insert(index.as_str().to_string());
    }

    /// Inject a failure into every subsequent browse against the index.
    pub fn fail_browses_for(&self, index: &IndexName) {
        self.fail_browses.write().unwrap().insert(index.as_str().to_string());
    }

    /// Inject a failure into every subsequent delete against the index.
    pub fn fail_deletes_for(&self, index: &IndexName) {
        self.fail_deletes.write().unwrap().insert(index.as_str().to_string());
    }

    /// Inject a failure into every subsequent move out of the index.
    pub fn fail_moves_for(&self, index: &IndexName) {
        self.fail_moves.write().unwrap().insert(index.as_str().to_string());
    }

    fn complete_task(&self) -> TaskId {
        let id = Uuid::new_v4().to_string();
        self.tasks.write().unwrap().insert(id.clone());
        TaskId::new(id)
    }

    fn count<F: FnOnce(&mut OpCounts)>(&self, index: &IndexName, update: F) {
        let mut counts = self.counts.write().unwrap();
        update(counts.entry(index.as_str().to_string()).or_default());
    }

    fn missing(index: &IndexName) -> Error {
        Error::Service(format!("index '{}' does not exist", index))
    }
}

impl Default for MemoryIndexClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SearchIndexClient for MemoryIndexClient {
    fn name(&self) -> &str {
        "memory"
    }

    async fn object_count(&self, index: &IndexName) -> Result<u64> {
        let indices = self.indices.read().unwrap();
        match indices.get(index.as_str()) {
            Some(idx) => Ok(idx.objects.len() as u64),
            None => Err(Self::missing(index)),
        }
    }

    async fn browse(
        &self,
        index: &IndexName,
        attributes: &[String],
        cursor: Option<&str>,
    ) -> Result<BrowsePage> {
        if self.fail_browses.read().unwrap().contains(index.as_str()) {
            return Err(Error::Service(format!("injected browse failure for '{}'", index)));
        }

        let offset: usize = match cursor {
            Some(c) => c
                .parse()
                .map_err(|_| Error::Service(format!("invalid cursor '{}'", c)))?,
            None => 0,
        };

        let indices = self.indices.read().unwrap();
        let idx = indices.get(index.as_str()).ok_or_else(|| Self::missing(index))?;

        let hits: Vec<BrowseHit> = idx
            .objects
            .iter()
            .skip(offset)
            .take(self.page_size)
            .map(|(id, fields)| BrowseHit {
                id: id.clone(),
                attributes: attributes
                    .iter()
                    .filter_map(|name| fields.get(name).map(|v| (name.clone(), v.clone())))
                    .collect(),
            })
            .collect();

        let next = offset + hits.len();
        let cursor = (next < idx.objects.len()).then(|| next.to_string());
        drop(indices);

        self.count(index, |c| c.browses += 1);

        Ok(BrowsePage { hits, cursor })
    }

    async fn save_objects(&self, index: &IndexName, records: &[IndexRecord]) -> Result<TaskId> {
        if self.fail_saves.read().unwrap().contains(index.as_str()) {
            return Err(Error::Service(format!("injected save failure for '{}'", index)));
        }

        {
            let mut indices = self.indices.write().unwrap();
            let idx = indices.entry(index.as_str().to_string()).or_default();
            for record in records {
                idx.objects.insert(record.id.clone(), record.fields.clone());
            }
        }

        self.count(index, |c| {
            c.saves += 1;
            c.save_sizes.push(records.len());
        });

        Ok(self.complete_task())
    }

    async fn delete_objects(&self, index: &IndexName, ids: &[String]) -> Result<TaskId> {
        if self.fail_deletes.read().unwrap().contains(index.as_str()) {
            return Err(Error::Service(format!("injected delete failure for '{}'", index)));
        }

        {
            let mut indices = self.indices.write().unwrap();
            let idx = indices
                .get_mut(index.as_str())
                .ok_or_else(|| Self::missing(index))?;
            for id in ids {
                idx.objects.remove(id);
            }
        }

        self.count(index, |c| c.deletes += 1);

        Ok(self.complete_task())
    }

    async fn wait_task(&self, index: &IndexName, task: &TaskId) -> Result<()> {
        if self.tasks.read().unwrap().contains(task.as_str()) {
            Ok(())
        } else {
            Err(Error::Service(format!(
                "unknown task '{}' for index '{}'",
                task, index
            )))
        }
    }

    async fn copy_index(
        &self,
        source: &IndexName,
        target: &IndexName,
        scopes: &[CopyScope],
    ) -> Result<TaskId> {
        {
            let mut indices = self.indices.write().unwrap();
            let src = indices
                .get(source.as_str())
                .cloned()
                .ok_or_else(|| Self::missing(source))?;

            let dst = indices.entry(target.as_str().to_string()).or_default();
            for scope in scopes {
                match scope {
                    CopyScope::Settings => dst.settings = src.settings.clone(),
                    CopyScope::Synonyms => dst.synonyms = src.synonyms.clone(),
                    CopyScope::Rules => dst.rules = src.rules.clone(),
                }
            }
        }

        self.count(target, |c| c.copies += 1);

        Ok(self.complete_task())
    }

    async fn move_index(&self, source: &IndexName, target: &IndexName) -> Result<TaskId> {
        if self.fail_moves.read().unwrap().contains(source.as_str()) {
            return Err(Error::Service(format!("injected move failure for '{}'", source)));
        }

        {
            let mut indices = self.indices.write().unwrap();
            let src = indices
                .remove(source.as_str())
                .ok_or_else(|| Self::missing(source))?;
            indices.insert(target.as_str().to_string(), src);
        }

        self.count(target, |c| c.moves += 1);

        Ok(self.complete_task())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn index(name: &str) -> IndexName {
        IndexName::new(name).unwrap()
    }

    fn fields(pairs: &[(&str, Value)]) -> Map<String, Value> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[tokio::test]
    async fn test_save_and_count() {
        let client = MemoryIndexClient::new();
        let posts = index("posts");

        let records = vec![
            IndexRecord::new("a").with_field("title", "A"),
            IndexRecord::new("b").with_field("title", "B"),
        ];
        let task = client.save_objects(&posts, &records).await.unwrap();
        client.wait_task(&posts, &task).await.unwrap();

        assert_eq!(client.object_count(&posts).await.unwrap(), 2);
        assert_eq!(client.object_ids(&posts), vec!["a", "b"]);
        assert_eq!(client.op_counts(&posts).saves, 1);
        assert_eq!(client.op_counts(&posts).save_sizes, vec![2]);
    }

    #[tokio::test]
    async fn test_browse_pagination_and_attribute_filtering() {
        let client = MemoryIndexClient::new().with_page_size(2);
        let posts = index("posts");

        for id in ["a", "b", "c", "d", "e"] {
            client.seed_object(&posts, id, fields(&[("modified", json!(1)), ("title", json!(id))]));
        }

        let attrs = vec!["modified".to_string()];
        let mut cursor: Option<String> = None;
        let mut seen = Vec::new();
        let mut pages = 0;

        loop {
            let page = client.browse(&posts, &attrs, cursor.as_deref()).await.unwrap();
            pages += 1;
            for hit in &page.hits {
                assert_eq!(hit.attributes.len(), 1);
                assert_eq!(hit.attributes.get("modified"), Some(&json!(1)));
                seen.push(hit.id.clone());
            }
            match page.cursor {
                Some(c) => cursor = Some(c),
                None => break,
            }
        }

        assert_eq!(pages, 3);
        assert_eq!(seen, vec!["a", "b", "c", "d", "e"]);
        assert_eq!(client.op_counts(&posts).browses, 3);
    }

    #[tokio::test]
    async fn test_browse_missing_index_fails() {
        let client = MemoryIndexClient::new();
        let result = client.browse(&index("nope"), &[], None).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_delete_objects() {
        let client = MemoryIndexClient::new();
        let posts = index("posts");
        client.seed_object(&posts, "a", Map::new());
        client.seed_object(&posts, "b", Map::new());

        let task = client
            .delete_objects(&posts, &["a".to_string(), "ghost".to_string()])
            .await
            .unwrap();
        client.wait_task(&posts, &task).await.unwrap();

        assert_eq!(client.object_ids(&posts), vec!["b"]);
        assert_eq!(client.op_counts(&posts).deletes, 1);
    }

    #[tokio::test]
    async fn test_copy_index_copies_configuration_not_data() {
        let client = MemoryIndexClient::new();
        let live = index("posts");
        let shadow = live.shadow();

        client.seed_object(&live, "a", Map::new());
        client.set_settings(&live, fields(&[("searchableAttributes", json!(["title"]))]));

        let task = client.copy_index(&live, &shadow, &CopyScope::ALL).await.unwrap();
        client.wait_task(&shadow, &task).await.unwrap();

        assert_eq!(client.settings(&shadow), client.settings(&live));
        assert!(client.object_ids(&shadow).is_empty());
    }

    #[tokio::test]
    async fn test_move_index_replaces_target() {
        let client = MemoryIndexClient::new();
        let live = index("posts");
        let shadow = live.shadow();

        client.seed_object(&live, "old", Map::new());
        client.seed_object(&shadow, "new", Map::new());

        let task = client.move_index(&shadow, &live).await.unwrap();
        client.wait_task(&live, &task).await.unwrap();

        assert!(!client.contains_index(&shadow));
        assert_eq!(client.object_ids(&live), vec!["new"]);
    }

    #[tokio::test]
    async fn test_wait_unknown_task_fails() {
        let client = MemoryIndexClient::new();
        let result = client.wait_task(&index("posts"), &TaskId::new("bogus")).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_failure_injection() {
        let client = MemoryIndexClient::new();
        let posts = index("posts");
        client.seed_object(&posts, "a", Map::new());

        client.fail_saves_for(&posts);
        assert!(client.save_objects(&posts, &[IndexRecord::new("b")]).await.is_err());

        client.fail_browses_for(&posts);
        assert!(client.browse(&posts, &[], None).await.is_err());

        client.fail_deletes_for(&posts);
        assert!(client.delete_objects(&posts, &["a".to_string()]).await.is_err());
        assert_eq!(client.object_ids(&posts), vec!["a"]);

        client.fail_moves_for(&posts);
        assert!(client.move_index(&posts, &index("other")).await.is_err());
    }
}
