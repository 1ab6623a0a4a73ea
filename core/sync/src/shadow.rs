//! Shadow index staging and atomic promotion for full rebuilds.

use tracing::{debug, info};

use syndex_client::{CopyScope, SearchIndexClient};
use syndex_common::{Error, IndexName, Result};

/// Where a collection's writes are directed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteTarget {
    /// Writes go straight to the live index (fresh index, or partial mode).
    Live(IndexName),
    /// Writes are staged in a shadow index and promoted afterwards.
    Shadow {
        /// The index readers query.
        live: IndexName,
        /// The staging index receiving this run's writes.
        shadow: IndexName,
    },
}

impl WriteTarget {
    /// The physical index writes should be addressed to.
    pub fn index(&self) -> &IndexName {
        match self {
            WriteTarget::Live(live) => live,
            WriteTarget::Shadow { shadow, .. } => shadow,
        }
    }
}

/// Resolve the write target for a full rebuild of `live`.
///
/// An empty or nonexistent live index is rebuilt in place; readers have
/// nothing to observe yet. A live index with content is never rebuilt in
/// place: a shadow index is created with the live index's settings,
/// synonyms, and rules (not its data) and returned as the write target, to
/// be promoted once all writes succeed.
pub async fn resolve_target<C: SearchIndexClient + ?Sized>(
    client: &C,
    live: &IndexName,
    collection: usize,
) -> Result<WriteTarget> {
    if !has_content(client, live).await {
        debug!(collection, index = %live, "live index is empty, writing directly");
        return Ok(WriteTarget::Live(live.clone()));
    }

    let shadow = live.shadow();
    info!(collection, index = %live, shadow = %shadow, "staging full rebuild in shadow index");

    let task = client
        .copy_index(live, &shadow, &CopyScope::ALL)
        .await
        .map_err(|e| Error::remote_promotion(live.as_str(), e))?;
    client
        .wait_task(&shadow, &task)
        .await
        .map_err(|e| Error::remote_promotion(live.as_str(), e))?;

    Ok(WriteTarget::Shadow {
        live: live.clone(),
        shadow,
    })
}

/// Promote the shadow index onto the live index, if one was used.
///
/// The move is observed by readers as a single transition; the old live
/// content is destroyed by it. Callers must not invoke this after a write
/// failure: the shadow is then left in place for inspection and the
/// collection is reported failed.
pub async fn promote<C: SearchIndexClient + ?Sized>(
    client: &C,
    target: &WriteTarget,
    collection: usize,
) -> Result<()> {
    let WriteTarget::Shadow { live, shadow } = target else {
        return Ok(());
    };

    info!(collection, index = %live, shadow = %shadow, "promoting shadow index");

    let task = client
        .move_index(shadow, live)
        .await
        .map_err(|e| Error::remote_promotion(live.as_str(), e))?;
    client
        .wait_task(live, &task)
        .await
        .map_err(|e| Error::remote_promotion(live.as_str(), e))
}

/// Existence probe. Probe failures are conservatively treated as "no
/// content" rather than escalated; probing is best-effort.
async fn has_content<C: SearchIndexClient + ?Sized>(client: &C, index: &IndexName) -> bool {
    match client.object_count(index).await {
        Ok(count) => count > 0,
        Err(_) => false,
    }
}
