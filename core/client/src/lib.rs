//! Remote search index client abstraction for Syndex.
//!
//! This module provides a trait-based interface for remote search services
//! and an in-memory implementation for testing and development.
//!
//! # Design Principles
//! - Client isolation: No service-specific logic in the sync engine
//! - Async operations: Every remote call is awaited
//! - Deferred durability: Mutations return a task id that must be awaited
//! - Unified error semantics: Clients raise `Error::Service`; the engine
//!   adds index context

pub mod client;
pub mod memory;

pub use client::{BrowseHit, BrowsePage, CopyScope, SearchIndexClient};
pub use memory::{MemoryIndexClient, OpCounts};
