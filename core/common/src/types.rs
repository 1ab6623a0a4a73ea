//! Common identifier types used throughout Syndex.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Suffix appended to a live index name to derive its shadow index.
pub const SHADOW_SUFFIX: &str = "_tmp";

/// Name of a physical index on the remote search service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IndexName(String);

impl IndexName {
    /// Create a new IndexName from a string.
    ///
    /// # Preconditions
    /// - `name` must be non-empty
    ///
    /// # Errors
    /// - Returns error if name is empty
    pub fn new(name: impl Into<String>) -> crate::Result<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(crate::Error::InvalidInput(
                "IndexName cannot be empty".to_string(),
            ));
        }
        Ok(Self(name))
    }

    /// Get the inner string value.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Derive the shadow index name used to stage a full rebuild.
    pub fn shadow(&self) -> IndexName {
        IndexName(format!("{}{}", self.0, SHADOW_SUFFIX))
    }
}

impl fmt::Display for IndexName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque identifier of an asynchronous remote operation.
///
/// Returned by write/delete/copy/move calls; completion must be awaited
/// via the client's task-wait primitive before the operation is considered
/// durable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskId(String);

impl TaskId {
    /// Create a new TaskId from a string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the inner string value.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
