//! Remote snapshot fetching and per-run memoization.

use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

use syndex_client::SearchIndexClient;
use syndex_common::{Error, IndexName, Result};

/// Identity-keyed mapping from record id to the last-known remote values of
/// the match fields. Bounded to the match fields rather than full records to
/// limit memory and bandwidth.
pub type RemoteSnapshot = HashMap<String, Map<String, Value>>;

/// Fetch the full contents of a physical index as a snapshot.
///
/// Paginates the remote enumeration primitive, retrieving only the match
/// fields (identity travels on the hit itself). Any pagination error aborts
/// the fetch; no partial snapshot is ever returned.
pub async fn fetch_snapshot<C: SearchIndexClient + ?Sized>(
    client: &C,
    index: &IndexName,
    match_fields: &[String],
) -> Result<RemoteSnapshot> {
    let mut snapshot = RemoteSnapshot::new();
    let mut cursor: Option<String> = None;

    loop {
        let page = client
            .browse(index, match_fields, cursor.as_deref())
            .await
            .map_err(|e| Error::remote_fetch(index.as_str(), e))?;

        for hit in page.hits {
            snapshot.insert(hit.id, hit.attributes);
        }

        match page.cursor {
            Some(next) => cursor = Some(next),
            None => break,
        }
    }

    debug!(index = %index, objects = snapshot.len(), "fetched remote snapshot");
    Ok(snapshot)
}

/// Per-run snapshot cache, one entry per physical index.
///
/// The lock is held across the fetch so that collections sharing an index
/// trigger exactly one remote enumeration; later callers receive the cached
/// snapshot. The cached value is immutable for the rest of the run.
#[derive(Default)]
pub(crate) struct SnapshotCache {
    inner: Mutex<HashMap<String, Arc<RemoteSnapshot>>>,
}

impl SnapshotCache {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Return the cached snapshot for the index, fetching it on first use.
    pub(crate) async fn get_or_fetch<C: SearchIndexClient + ?Sized>(
        &self,
        client: &C,
        index: &IndexName,
        match_fields: &[String],
    ) -> Result<Arc<RemoteSnapshot>> {
        let mut inner = self.inner.lock().await;
        if let Some(snapshot) = inner.get(index.as_str()) {
            return Ok(snapshot.clone());
        }

        let snapshot = Arc::new(fetch_snapshot(client, index, match_fields).await?);
        inner.insert(index.as_str().to_string(), snapshot.clone());
        Ok(snapshot)
    }
}
