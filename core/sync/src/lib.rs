//! Syndex Sync Engine
//!
//! This module synchronizes locally-computed document collections with a
//! remote search index, including:
//! - Two sync strategies: partial updates (diff against remote contents)
//!   and full rebuilds via an atomic shadow-index swap
//! - Memoized remote snapshots, one fetch per physical index per run
//! - Chunked concurrent batch writes with task acknowledgment
//! - Cross-collection deletion bookkeeping per physical index

pub mod batch;
pub mod config;
pub mod diff;
pub mod run;
pub mod shadow;
pub mod snapshot;
pub mod store;
pub mod transform;

// Re-export main types
pub use batch::write_in_chunks;
pub use config::{CollectionSpec, RecordTransformer, SyncOptions, DEFAULT_CHUNK_SIZE};
pub use diff::{diff, DiffResult};
pub use run::{CollectionReport, RunReport, SyncEngine};
pub use shadow::WriteTarget;
pub use snapshot::{fetch_snapshot, RemoteSnapshot};
pub use store::{ContentStore, MemoryContentStore};
pub use transform::default_transformer;
