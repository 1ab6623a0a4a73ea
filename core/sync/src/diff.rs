//! Change detection between local records and a remote snapshot.

use serde_json::{Map, Value};
use std::collections::HashMap;

use crate::snapshot::RemoteSnapshot;
use syndex_common::{Error, IndexRecord, Result};

/// Outcome of diffing a local record set against the remote snapshot.
#[derive(Debug, Clone, Default)]
pub struct DiffResult {
    /// Records to upsert, in local input order.
    pub to_write: Vec<IndexRecord>,
    /// Remote ids with no corresponding local record, in sorted order.
    pub to_remove: Vec<String>,
}

/// Compute the write and removal sets for one collection.
///
/// Without a snapshot (full-rebuild mode) everything is written and nothing
/// is removed; stale content is discarded by the shadow swap instead. With a
/// snapshot (partial mode), a record is written only when its id is missing
/// remotely or any match field differs; the snapshot entries left unmatched
/// after all local records are processed become the removal set.
///
/// Field comparison is direct value equality. A field present on one side
/// and absent on the other differs; absent on both sides is equal.
pub fn diff(
    local: &[IndexRecord],
    remote: Option<&RemoteSnapshot>,
    match_fields: &[String],
) -> Result<DiffResult> {
    if match_fields.is_empty() {
        return Err(Error::configuration(
            "matchFields must not be empty; change detection is impossible without them",
        ));
    }

    let Some(remote) = remote else {
        return Ok(DiffResult {
            to_write: local.to_vec(),
            to_remove: Vec::new(),
        });
    };

    // Working copy of the snapshot; every id looked up is drained, leaving
    // the remote-only residue behind.
    let mut remaining: HashMap<&str, &Map<String, Value>> = remote
        .iter()
        .map(|(id, fields)| (id.as_str(), fields))
        .collect();

    let mut to_write = Vec::new();
    for record in local {
        match remaining.remove(record.id.as_str()) {
            None => to_write.push(record.clone()),
            Some(existing) => {
                let changed = match_fields
                    .iter()
                    .any(|field| existing.get(field) != record.field(field));
                if changed {
                    to_write.push(record.clone());
                }
            }
        }
    }

    let mut to_remove: Vec<String> = remaining.into_keys().map(str::to_string).collect();
    to_remove.sort_unstable();

    Ok(DiffResult { to_write, to_remove })
}
