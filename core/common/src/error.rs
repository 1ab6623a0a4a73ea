//! Common error types for Syndex.

use thiserror::Error;

/// Top-level error type for Syndex operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Run or collection configuration is invalid.
    ///
    /// Raised before any remote call is made for the offending collection.
    #[error("configuration error{}: {message}", fmt_collection(.collection))]
    Configuration {
        /// Number of the offending collection, if the error is scoped to one.
        collection: Option<usize>,
        message: String,
    },

    /// Fetching the current remote index contents failed.
    #[error("failed to fetch remote objects from index '{index}': {message}")]
    RemoteFetch { index: String, message: String },

    /// A remote write, delete, or task acknowledgment failed.
    #[error("remote write to index '{index}' failed: {message}")]
    RemoteWrite { index: String, message: String },

    /// Staging or promoting a shadow index failed.
    #[error("failed to promote index '{index}': {message}")]
    RemotePromotion { index: String, message: String },

    /// Transport-level failure raised by a client implementation.
    ///
    /// The sync engine wraps these into the typed kinds above, adding the
    /// index the operation was addressed to.
    #[error("remote service error: {0}")]
    Service(String),

    /// One or more collection syncs failed during a run.
    #[error("{failed} of {total} collections failed to sync")]
    Aggregate { failed: usize, total: usize },

    /// Invalid input provided.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

fn fmt_collection(collection: &Option<usize>) -> String {
    match collection {
        Some(number) => format!(" (collection #{number})"),
        None => String::new(),
    }
}

impl Error {
    /// Configuration error that is not scoped to a single collection.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            collection: None,
            message: message.into(),
        }
    }

    /// Configuration error scoped to the numbered collection.
    pub fn collection_configuration(collection: usize, message: impl Into<String>) -> Self {
        Self::Configuration {
            collection: Some(collection),
            message: message.into(),
        }
    }

    /// Snapshot fetch failure for the named index.
    pub fn remote_fetch(index: impl Into<String>, source: impl ToString) -> Self {
        Self::RemoteFetch {
            index: index.into(),
            message: source.to_string(),
        }
    }

    /// Write, delete, or task failure for the named index.
    pub fn remote_write(index: impl Into<String>, source: impl ToString) -> Self {
        Self::RemoteWrite {
            index: index.into(),
            message: source.to_string(),
        }
    }

    /// Shadow copy or promotion failure for the named index.
    pub fn remote_promotion(index: impl Into<String>, source: impl ToString) -> Self {
        Self::RemotePromotion {
            index: index.into(),
            message: source.to_string(),
        }
    }
}

/// Result type alias using the common Error.
pub type Result<T> = std::result::Result<T, Error>;
