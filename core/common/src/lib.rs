//! Common utilities and types shared across Syndex modules.
//!
//! This module provides foundational types that are used throughout the
//! codebase: the shared error taxonomy, validated identifiers, and the
//! normalized record model that flows between the sync engine and the
//! remote index client.

pub mod error;
pub mod record;
pub mod types;

pub use error::{Error, Result};
pub use record::IndexRecord;
pub use types::{IndexName, TaskId};
