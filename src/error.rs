//! Error types for the `docqa` crate.

use thiserror::Error;
use uuid::Uuid;

/// Errors that can occur during ingestion, retrieval, or answer generation.
#[derive(Debug, Error)]
pub enum QaError {
    /// A configuration validation error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// An error occurred during embedding generation.
    #[error("Embedding error ({provider}): {message}")]
    Embedding {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// An error occurred in the vector index backend.
    #[error("Vector index error ({backend}): {message}")]
    Storage {
        /// The vector index backend that produced the error.
        backend: String,
        /// A description of the failure.
        message: String,
    },

    /// A search or upsert was issued against a collection that does not exist.
    ///
    /// Recoverable: call `ensure_collection` and retry once.
    #[error("Collection '{collection}' not found")]
    CollectionNotFound {
        /// The collection that was missing.
        collection: String,
    },

    /// An existing collection has a different dimension or distance metric
    /// than the one requested.
    #[error("Collection '{collection}' mismatch: {message}")]
    CollectionMismatch {
        /// The collection with conflicting parameters.
        collection: String,
        /// A description of the conflict.
        message: String,
    },

    /// An upsert batch was only partially committed.
    ///
    /// Carries the ids that failed so the caller can retry just those points.
    #[error(
        "Partial upsert into '{collection}': {succeeded} point(s) committed, {} failed: {message}",
        .failed.len()
    )]
    PartialUpsert {
        /// The collection that was being written.
        collection: String,
        /// How many points were committed before the failure.
        succeeded: usize,
        /// The point ids that were not committed.
        failed: Vec<Uuid>,
        /// A description of the failure.
        message: String,
    },

    /// An error occurred during answer generation.
    #[error("Generation error ({provider}): {message}")]
    Generation {
        /// The generation provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },
}

impl QaError {
    /// Whether the error is a transient storage failure worth retrying.
    ///
    /// Configuration, embedding, and generation errors are never retryable;
    /// [`QaError::CollectionNotFound`] has its own recovery path (recreate
    /// the collection, then retry once).
    pub fn is_retryable(&self) -> bool {
        matches!(self, QaError::Storage { .. } | QaError::PartialUpsert { .. })
    }
}

/// A convenience result type for document QA operations.
pub type Result<T> = std::result::Result<T, QaError>;
