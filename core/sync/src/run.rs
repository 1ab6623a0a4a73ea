//! The multi-collection sync coordinator.

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::batch;
use crate::config::{CollectionSpec, SyncOptions};
use crate::diff;
use crate::shadow::{self, WriteTarget};
use crate::snapshot::SnapshotCache;
use crate::store::ContentStore;
use crate::transform;
use syndex_client::SearchIndexClient;
use syndex_common::{Error, IndexName, IndexRecord, Result};

/// Outcome of syncing a single collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionReport {
    /// Position of the collection in the run configuration.
    pub collection: usize,
    /// Content type the collection was built from.
    pub content_type_name: String,
    /// Number of records produced by the transformer.
    pub items: usize,
    /// Number of records actually uploaded.
    pub written: usize,
    /// Number of removals this collection contributed.
    pub removed: usize,
}

/// Summary of a whole sync run.
#[derive(Debug, Clone)]
pub struct RunReport {
    /// When the run started.
    pub started: DateTime<Utc>,
    /// Wall-clock duration of the run.
    pub duration: Duration,
    /// Per-collection outcomes, in configuration order.
    pub collections: Vec<CollectionReport>,
}

/// Per-physical-index bookkeeping, created lazily on first reference.
#[derive(Debug, Default)]
struct IndexRunState {
    /// Ids every contributing collection produced locally this run. Removals
    /// are filtered against this, so the consolidated removal set is
    /// independent of collection scheduling order.
    claimed: HashSet<String>,
    /// Ids pending deletion after all collections finish.
    to_remove: HashSet<String>,
    /// Whether any contributing collection failed. The deletion pass is
    /// skipped for the index when set.
    failed: bool,
}

/// Mutable state scoped to a single run.
///
/// Created at run start, dropped at run end, never shared across runs. The
/// snapshot cache is written once per index; the removal states are mutated
/// by every collection targeting the index, always without holding the lock
/// across a suspension point.
struct RunContext {
    snapshots: SnapshotCache,
    states: Mutex<HashMap<IndexName, IndexRunState>>,
}

impl RunContext {
    fn new() -> Self {
        Self {
            snapshots: SnapshotCache::new(),
            states: Mutex::new(HashMap::new()),
        }
    }

    /// Fold one collection's diff outcome into the index's removal state.
    async fn record_outcome(
        &self,
        index: &IndexName,
        local: &[IndexRecord],
        to_remove: Vec<String>,
    ) {
        let mut states = self.states.lock().await;
        let state = states.entry(index.clone()).or_default();

        for record in local {
            state.claimed.insert(record.id.clone());
            state.to_remove.remove(&record.id);
        }
        for id in to_remove {
            if !state.claimed.contains(&id) {
                state.to_remove.insert(id);
            }
        }
    }

    async fn mark_failed(&self, index: &IndexName) {
        let mut states = self.states.lock().await;
        states.entry(index.clone()).or_default().failed = true;
    }

    async fn take_states(&self) -> HashMap<IndexName, IndexRunState> {
        std::mem::take(&mut *self.states.lock().await)
    }
}

/// Coordinator that synchronizes every configured collection with the
/// remote index service.
pub struct SyncEngine<C: SearchIndexClient + ?Sized> {
    /// Client for remote index operations.
    client: Arc<C>,
    /// Run configuration.
    options: SyncOptions,
}

impl<C: SearchIndexClient + 'static> SyncEngine<C> {
    /// Create a new sync engine.
    pub fn new(client: C, options: SyncOptions) -> Self {
        Self {
            client: Arc::new(client),
            options,
        }
    }
}

impl<C: SearchIndexClient + ?Sized + 'static> SyncEngine<C> {
    /// Create a new sync engine from an Arc-wrapped client.
    pub fn from_arc(client: Arc<C>, options: SyncOptions) -> Self {
        Self { client, options }
    }

    /// Get the run configuration.
    pub fn options(&self) -> &SyncOptions {
        &self.options
    }

    /// Run all configured collections and converge the remote indices.
    ///
    /// Collections run as concurrently-scheduled tasks; a failing collection
    /// never cancels its siblings. Once every collection has settled and at
    /// least one used partial mode, a single deletion pass runs per physical
    /// index that accumulated removals, skipping indices with a failed
    /// contributor. Any collection failure makes the run report
    /// [`Error::Aggregate`] after all tasks settle.
    pub async fn run<S: ContentStore + ?Sized>(&self, store: &S) -> Result<RunReport> {
        self.options.validate()?;

        let started = Instant::now();
        let started_at = Utc::now();
        let total = self.options.collections.len();
        info!(collections = total, "starting index sync");

        let ctx = RunContext::new();
        let jobs = self
            .options
            .collections
            .iter()
            .enumerate()
            .map(|(number, spec)| self.sync_collection(store, &ctx, number, spec));
        let settled = join_all(jobs).await;

        let mut reports = Vec::new();
        let mut failed = 0;
        for (number, outcome) in settled.into_iter().enumerate() {
            match outcome {
                Ok(report) => reports.push(report),
                Err(e) => {
                    failed += 1;
                    error!(collection = number, error = %e, "collection sync failed");
                }
            }
        }

        let deletion_error = if self.options.enable_partial_updates {
            self.delete_pending(&ctx).await
        } else {
            None
        };

        if failed > 0 {
            return Err(Error::Aggregate { failed, total });
        }
        if let Some(e) = deletion_error {
            return Err(e);
        }

        info!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            "finished index sync"
        );

        Ok(RunReport {
            started: started_at,
            duration: started.elapsed(),
            collections: reports,
        })
    }

    /// Sync one collection, recording a failure against its physical index.
    async fn sync_collection<S: ContentStore + ?Sized>(
        &self,
        store: &S,
        ctx: &RunContext,
        number: usize,
        spec: &CollectionSpec,
    ) -> Result<CollectionReport> {
        let result = self.sync_collection_inner(store, ctx, number, spec).await;
        if result.is_err() {
            ctx.mark_failed(&spec.index_name).await;
        }
        result
    }

    async fn sync_collection_inner<S: ContentStore + ?Sized>(
        &self,
        store: &S,
        ctx: &RunContext,
        number: usize,
        spec: &CollectionSpec,
    ) -> Result<CollectionReport> {
        spec.validate(number)?;
        let client = self.client.as_ref();

        // Full rebuilds against a populated index are staged in a shadow.
        let target = if self.options.enable_partial_updates {
            WriteTarget::Live(spec.index_name.clone())
        } else {
            shadow::resolve_target(client, &spec.index_name, number).await?
        };

        info!(
            collection = number,
            content_type = %spec.content_type_name,
            "fetching collection"
        );
        let raw = store
            .get_collection(&spec.content_type_name)
            .map_err(|e| match e {
                Error::Configuration {
                    collection: None,
                    message,
                } => Error::Configuration {
                    collection: Some(number),
                    message,
                },
                other => other,
            })?;

        let records = transform::transform_collection(&raw, spec, number)?;
        let items = records.len();
        info!(collection = number, items, "transformed collection");

        let diff_result = if self.options.enable_partial_updates {
            let snapshot = ctx
                .snapshots
                .get_or_fetch(client, &spec.index_name, &spec.match_fields)
                .await?;
            debug!(
                collection = number,
                existing = snapshot.len(),
                "diffing against remote snapshot"
            );
            let result = diff::diff(&records, Some(snapshot.as_ref()), &spec.match_fields)?;
            info!(
                collection = number,
                to_write = result.to_write.len(),
                total = items,
                removals = result.to_remove.len(),
                "partial update diff complete"
            );
            result
        } else {
            diff::diff(&records, None, &spec.match_fields)?
        };

        let removed = diff_result.to_remove.len();
        if self.options.enable_partial_updates {
            ctx.record_outcome(&spec.index_name, &records, diff_result.to_remove)
                .await;
        }

        let chunk_size = spec.chunk_size.unwrap_or(self.options.chunk_size);
        batch::write_in_chunks(client, target.index(), &diff_result.to_write, chunk_size).await?;

        shadow::promote(client, &target, number).await?;

        info!(
            collection = number,
            content_type = %spec.content_type_name,
            written = diff_result.to_write.len(),
            "collection sync complete"
        );

        Ok(CollectionReport {
            collection: number,
            content_type_name: spec.content_type_name.clone(),
            items,
            written: diff_result.to_write.len(),
            removed,
        })
    }

    /// Execute the consolidated deletion pass, one operation per physical
    /// index. Returns the first deletion failure, if any.
    async fn delete_pending(&self, ctx: &RunContext) -> Option<Error> {
        let mut states: Vec<(IndexName, IndexRunState)> =
            ctx.take_states().await.into_iter().collect();
        states.sort_by(|a, b| a.0.as_str().cmp(b.0.as_str()));

        let mut first_error = None;
        for (index, state) in states {
            if state.failed {
                warn!(
                    index = %index,
                    "skipping deletion pass, a contributing collection failed"
                );
                continue;
            }
            if state.to_remove.is_empty() {
                continue;
            }

            let mut ids: Vec<String> = state.to_remove.into_iter().collect();
            ids.sort_unstable();
            info!(index = %index, count = ids.len(), "deleting stale objects");

            if let Err(e) = self.delete_ids(&index, &ids).await {
                error!(index = %index, error = %e, "deletion pass failed");
                first_error.get_or_insert(e);
            }
        }
        first_error
    }

    async fn delete_ids(&self, index: &IndexName, ids: &[String]) -> Result<()> {
        let task = self
            .client
            .delete_objects(index, ids)
            .await
            .map_err(|e| Error::remote_write(index.as_str(), e))?;
        self.client
            .wait_task(index, &task)
            .await
            .map_err(|e| Error::remote_write(index.as_str(), e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryContentStore;
    use serde_json::{json, Map, Value};
    use syndex_client::MemoryIndexClient;

    fn index(name: &str) -> IndexName {
        IndexName::new(name).unwrap()
    }

    fn item(id: &str, modified: u64) -> Value {
        json!({
            "id": id,
            "title": id.to_uppercase(),
            "slug": id,
            "modified": modified,
        })
    }

    fn remote_fields(modified: u64) -> Map<String, Value> {
        [("modified".to_string(), json!(modified))].into_iter().collect()
    }

    fn options() -> SyncOptions {
        SyncOptions::new("https://example.com")
    }

    fn engine(
        client: &Arc<MemoryIndexClient>,
        options: SyncOptions,
    ) -> SyncEngine<MemoryIndexClient> {
        SyncEngine::from_arc(client.clone(), options)
    }

    #[tokio::test]
    async fn test_full_rebuild_of_fresh_index() {
        let client = Arc::new(MemoryIndexClient::new());
        let mut store = MemoryContentStore::new();
        store.insert("Post", vec![item("a", 1), item("b", 2)]);

        let posts = index("posts");
        let opts = options().with_collection(CollectionSpec::new(posts.clone(), "Post"));

        let report = engine(&client, opts).run(&store).await.unwrap();

        assert_eq!(client.object_ids(&posts), vec!["a", "b"]);
        assert!(!client.contains_index(&posts.shadow()));
        assert_eq!(report.collections.len(), 1);
        assert_eq!(report.collections[0].items, 2);
        assert_eq!(report.collections[0].written, 2);
        assert_eq!(report.collections[0].removed, 0);
    }

    #[tokio::test]
    async fn test_full_rebuild_swaps_shadow_over_populated_index() {
        let client = Arc::new(MemoryIndexClient::new());
        let posts = index("posts");
        client.seed_object(&posts, "stale", remote_fields(9));
        let settings: Map<String, Value> =
            [("searchableAttributes".to_string(), json!(["title"]))].into_iter().collect();
        client.set_settings(&posts, settings.clone());

        let mut store = MemoryContentStore::new();
        store.insert("Post", vec![item("a", 1)]);

        let opts = options().with_collection(CollectionSpec::new(posts.clone(), "Post"));
        engine(&client, opts).run(&store).await.unwrap();

        // Stale content gone, configuration preserved through the swap.
        assert_eq!(client.object_ids(&posts), vec!["a"]);
        assert_eq!(client.settings(&posts), Some(settings));
        assert!(!client.contains_index(&posts.shadow()));

        // Writes went to the shadow, never to the live index.
        assert_eq!(client.op_counts(&posts).saves, 0);
        assert_eq!(client.op_counts(&posts.shadow()).saves, 1);
    }

    #[tokio::test]
    async fn test_full_rebuild_write_failure_leaves_live_index_untouched() {
        let client = Arc::new(MemoryIndexClient::new());
        let posts = index("posts");
        let shadow = posts.shadow();
        client.seed_object(&posts, "old", remote_fields(1));
        client.fail_saves_for(&shadow);

        let mut store = MemoryContentStore::new();
        store.insert("Post", vec![item("a", 1)]);

        let opts = options().with_collection(CollectionSpec::new(posts.clone(), "Post"));
        let err = engine(&client, opts).run(&store).await.unwrap_err();

        assert!(matches!(err, Error::Aggregate { failed: 1, total: 1 }));
        // Promotion never ran: readers keep seeing the old content and the
        // shadow is left in place for inspection.
        assert_eq!(client.object_ids(&posts), vec!["old"]);
        assert!(client.contains_index(&shadow));
        assert_eq!(client.op_counts(&posts).moves, 0);
    }

    #[tokio::test]
    async fn test_partial_run_is_idempotent() {
        let client = Arc::new(MemoryIndexClient::new());
        let posts = index("posts");
        // Existing but empty index.
        client.set_settings(&posts, Map::new());

        let mut store = MemoryContentStore::new();
        store.insert("Post", vec![item("a", 1), item("b", 2)]);

        let opts = options()
            .with_partial_updates(true)
            .with_collection(CollectionSpec::new(posts.clone(), "Post"));
        let engine = engine(&client, opts);

        engine.run(&store).await.unwrap();
        assert_eq!(client.object_ids(&posts), vec!["a", "b"]);
        let after_first = client.op_counts(&posts);

        let report = engine.run(&store).await.unwrap();
        let after_second = client.op_counts(&posts);

        // Second run with unchanged data performs zero writes and deletes.
        assert_eq!(after_second.saves, after_first.saves);
        assert_eq!(after_second.deletes, after_first.deletes);
        assert_eq!(report.collections[0].written, 0);
        assert_eq!(report.collections[0].removed, 0);
    }

    #[tokio::test]
    async fn test_partial_run_converges_and_deletes_stale_objects() {
        let client = Arc::new(MemoryIndexClient::new());
        let posts = index("posts");
        client.seed_object(&posts, "a", remote_fields(1));
        client.seed_object(&posts, "c", remote_fields(9));

        let mut store = MemoryContentStore::new();
        store.insert("Post", vec![item("a", 1), item("b", 2)]);

        let opts = options()
            .with_partial_updates(true)
            .with_collection(CollectionSpec::new(posts.clone(), "Post"));
        let report = engine(&client, opts).run(&store).await.unwrap();

        assert_eq!(client.object_ids(&posts), vec!["a", "b"]);

        // a unchanged, b new, c removed.
        let counts = client.op_counts(&posts);
        assert_eq!(counts.save_sizes, vec![1]);
        assert_eq!(counts.deletes, 1);
        assert_eq!(report.collections[0].written, 1);
        assert_eq!(report.collections[0].removed, 1);
    }

    #[tokio::test]
    async fn test_partial_changed_match_field_rewrites_record() {
        let client = Arc::new(MemoryIndexClient::new());
        let posts = index("posts");
        client.seed_object(&posts, "a", remote_fields(1));

        let mut store = MemoryContentStore::new();
        store.insert("Post", vec![item("a", 2)]);

        let opts = options()
            .with_partial_updates(true)
            .with_collection(CollectionSpec::new(posts.clone(), "Post"));
        engine(&client, opts).run(&store).await.unwrap();

        assert_eq!(client.object(&posts, "a").unwrap().get("modified"), Some(&json!(2)));
        assert_eq!(client.op_counts(&posts).saves, 1);
    }

    #[tokio::test]
    async fn test_collections_sharing_an_index_consolidate_deletions() {
        let client = Arc::new(MemoryIndexClient::new());
        let site = index("site");
        client.seed_object(&site, "post-1", remote_fields(1));
        client.seed_object(&site, "page-1", remote_fields(1));
        client.seed_object(&site, "stale", remote_fields(9));

        let mut store = MemoryContentStore::new();
        store.insert("Post", vec![item("post-1", 1)]);
        store.insert("Page", vec![item("page-1", 1)]);

        let opts = options()
            .with_partial_updates(true)
            .with_collection(CollectionSpec::new(site.clone(), "Post"))
            .with_collection(CollectionSpec::new(site.clone(), "Page"));
        engine(&client, opts).run(&store).await.unwrap();

        // Each collection claims its own ids; only the truly stale object is
        // deleted, in a single consolidated operation.
        assert_eq!(client.object_ids(&site), vec!["page-1", "post-1"]);
        let counts = client.op_counts(&site);
        assert_eq!(counts.deletes, 1);
        // The snapshot is fetched once and shared by both collections.
        assert_eq!(counts.browses, 1);
    }

    #[tokio::test]
    async fn test_failed_collection_skips_deletion_for_its_index_only() {
        let client = Arc::new(MemoryIndexClient::new());
        let posts = index("posts");
        let pages = index("pages");
        client.seed_object(&posts, "a", remote_fields(1));
        client.seed_object(&posts, "stale-post", remote_fields(9));
        client.seed_object(&pages, "b", remote_fields(1));
        client.seed_object(&pages, "stale-page", remote_fields(9));
        client.fail_saves_for(&posts);

        let mut store = MemoryContentStore::new();
        // a changed, so the (failing) write path is exercised.
        store.insert("Post", vec![item("a", 2)]);
        store.insert("Page", vec![item("b", 1)]);

        let opts = options()
            .with_partial_updates(true)
            .with_collection(CollectionSpec::new(posts.clone(), "Post"))
            .with_collection(CollectionSpec::new(pages.clone(), "Page"));
        let err = engine(&client, opts).run(&store).await.unwrap_err();

        assert!(matches!(err, Error::Aggregate { failed: 1, total: 2 }));

        // Deletion skipped for the failed index, executed for the healthy one.
        assert!(client.object_ids(&posts).contains(&"stale-post".to_string()));
        assert!(!client.object_ids(&pages).contains(&"stale-page".to_string()));
        assert_eq!(client.op_counts(&posts).deletes, 0);
        assert_eq!(client.op_counts(&pages).deletes, 1);
    }

    #[tokio::test]
    async fn test_deletion_pass_failure_surfaces_as_run_error() {
        let client = Arc::new(MemoryIndexClient::new());
        let posts = index("posts");
        client.seed_object(&posts, "a", remote_fields(1));
        client.seed_object(&posts, "stale", remote_fields(9));
        client.fail_deletes_for(&posts);

        let mut store = MemoryContentStore::new();
        store.insert("Post", vec![item("a", 1)]);

        let opts = options()
            .with_partial_updates(true)
            .with_collection(CollectionSpec::new(posts.clone(), "Post"));
        let err = engine(&client, opts).run(&store).await.unwrap_err();

        // The collection itself succeeded, so the failed consolidated delete
        // becomes the run error and the stale object stays behind.
        assert!(matches!(err, Error::RemoteWrite { .. }));
        assert!(client.object_ids(&posts).contains(&"stale".to_string()));
    }

    #[tokio::test]
    async fn test_missing_site_url_aborts_before_remote_calls() {
        let client = Arc::new(MemoryIndexClient::new());
        let posts = index("posts");
        client.seed_object(&posts, "a", remote_fields(1));

        let mut store = MemoryContentStore::new();
        store.insert("Post", vec![item("a", 1)]);

        let opts = SyncOptions::default()
            .with_collection(CollectionSpec::new(posts.clone(), "Post"));
        let err = engine(&client, opts).run(&store).await.unwrap_err();

        assert!(matches!(err, Error::Configuration { .. }));
        let counts = client.op_counts(&posts);
        assert_eq!(counts.saves, 0);
        assert_eq!(counts.browses, 0);
        assert_eq!(counts.deletes, 0);
    }

    #[tokio::test]
    async fn test_transformer_without_identity_fails_the_collection() {
        let client = Arc::new(MemoryIndexClient::new());
        let mut store = MemoryContentStore::new();
        store.insert("Post", vec![json!({"title": "no id"})]);

        let posts = index("posts");
        let opts = options().with_collection(CollectionSpec::new(posts.clone(), "Post"));
        let err = engine(&client, opts).run(&store).await.unwrap_err();

        assert!(matches!(err, Error::Aggregate { failed: 1, total: 1 }));
        assert_eq!(client.op_counts(&posts).saves, 0);
    }

    #[tokio::test]
    async fn test_unknown_content_type_fails_the_collection() {
        let client = Arc::new(MemoryIndexClient::new());
        let store = MemoryContentStore::new();

        let opts = options().with_collection(CollectionSpec::new(index("posts"), "Ghost"));
        let err = engine(&client, opts).run(&store).await.unwrap_err();

        assert!(matches!(err, Error::Aggregate { failed: 1, total: 1 }));
    }

    #[tokio::test]
    async fn test_failing_collection_does_not_block_siblings() {
        let client = Arc::new(MemoryIndexClient::new());
        let mut store = MemoryContentStore::new();
        store.insert("Page", vec![item("b", 1)]);

        let pages = index("pages");
        let opts = options()
            .with_collection(CollectionSpec::new(index("posts"), "Ghost"))
            .with_collection(CollectionSpec::new(pages.clone(), "Page"));
        let err = engine(&client, opts).run(&store).await.unwrap_err();

        assert!(matches!(err, Error::Aggregate { failed: 1, total: 2 }));
        // The healthy sibling still converged.
        assert_eq!(client.object_ids(&pages), vec!["b"]);
    }

    #[tokio::test]
    async fn test_per_collection_chunk_size_override() {
        let client = Arc::new(MemoryIndexClient::new());
        let mut store = MemoryContentStore::new();
        store.insert("Post", vec![item("a", 1), item("b", 2), item("c", 3)]);

        let posts = index("posts");
        let opts = options()
            .with_collection(CollectionSpec::new(posts.clone(), "Post").with_chunk_size(1));
        engine(&client, opts).run(&store).await.unwrap();

        assert_eq!(client.op_counts(&posts).save_sizes, vec![1, 1, 1]);
    }

    #[tokio::test]
    async fn test_partial_mode_snapshot_failure_fails_the_collection() {
        let client = Arc::new(MemoryIndexClient::new());
        let posts = index("posts");
        client.seed_object(&posts, "a", remote_fields(1));
        client.fail_browses_for(&posts);

        let mut store = MemoryContentStore::new();
        store.insert("Post", vec![item("a", 1)]);

        let opts = options()
            .with_partial_updates(true)
            .with_collection(CollectionSpec::new(posts.clone(), "Post"));
        let err = engine(&client, opts).run(&store).await.unwrap_err();

        assert!(matches!(err, Error::Aggregate { failed: 1, total: 1 }));
        // No partial snapshot means no writes and no deletions.
        assert_eq!(client.op_counts(&posts).saves, 0);
        assert_eq!(client.op_counts(&posts).deletes, 0);
    }

    #[tokio::test]
    async fn test_custom_transformer_flows_through_the_run() {
        let client = Arc::new(MemoryIndexClient::new());
        let mut store = MemoryContentStore::new();
        store.insert("Post", vec![json!({"slug": "hello", "title": "Hello", "rev": 3})]);

        let posts = index("posts");
        let spec = CollectionSpec::new(posts.clone(), "Post")
            .with_match_fields(vec!["rev".to_string()])
            .with_transformer(|item: &Value| {
                IndexRecord::new(item["slug"].as_str().unwrap_or_default())
                    .with_field("rev", item["rev"].clone())
            });

        let opts = options().with_collection(spec);
        engine(&client, opts).run(&store).await.unwrap();

        assert_eq!(client.object_ids(&posts), vec!["hello"]);
        assert_eq!(client.object(&posts, "hello").unwrap().get("rev"), Some(&json!(3)));
    }
}
