//! Chunked batch writing with task acknowledgment.

use futures::future::try_join_all;
use tracing::debug;

use syndex_client::SearchIndexClient;
use syndex_common::{Error, IndexName, IndexRecord, Result};

/// Upsert `records` into `index` in chunks of at most `chunk_size`.
///
/// Chunks preserve the input order within and across chunks and are issued
/// concurrently; the remote service provides per-operation identity, not
/// cross-chunk atomicity. Each chunk's task is awaited; the call resolves
/// only once every chunk has acknowledged. Any chunk failure fails the
/// whole call, with no partial-commit semantics: some chunks may have
/// already landed remotely.
///
/// `chunk_size` must be non-zero; run configuration is validated before
/// any writer runs. Returns the number of write operations issued.
pub async fn write_in_chunks<C: SearchIndexClient + ?Sized>(
    client: &C,
    index: &IndexName,
    records: &[IndexRecord],
    chunk_size: usize,
) -> Result<usize> {
    if records.is_empty() {
        return Ok(0);
    }

    let chunks: Vec<&[IndexRecord]> = records.chunks(chunk_size).collect();
    debug!(index = %index, chunks = chunks.len(), records = records.len(), "splitting write set");

    let jobs = chunks.iter().map(|chunk| async move {
        let task = client
            .save_objects(index, chunk)
            .await
            .map_err(|e| Error::remote_write(index.as_str(), e))?;
        client
            .wait_task(index, &task)
            .await
            .map_err(|e| Error::remote_write(index.as_str(), e))
    });

    try_join_all(jobs).await?;
    Ok(chunks.len())
}
