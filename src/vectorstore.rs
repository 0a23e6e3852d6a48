//! Vector index trait for storing and searching embedding vectors.

use std::cmp::Ordering;
use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::document::{IndexPoint, SearchResult};
use crate::error::Result;

/// Distance metric of a collection.
///
/// The core only uses cosine similarity; the metric is still part of the
/// collection contract so a mismatched existing collection can be rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DistanceMetric {
    /// Cosine similarity (higher is more similar).
    Cosine,
}

impl fmt::Display for DistanceMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DistanceMetric::Cosine => write!(f, "cosine"),
        }
    }
}

/// A storage backend for embedding vectors with similarity search.
///
/// Implementations manage named collections of [`IndexPoint`]s. Collection
/// lifecycle is explicit: callers must [`ensure_collection`](VectorIndex::ensure_collection)
/// before the first `upsert` or `search`; the index never auto-creates on
/// those paths.
///
/// # Example
///
/// ```rust,ignore
/// use docqa::{DistanceMetric, InMemoryIndex, VectorIndex};
///
/// let index = InMemoryIndex::new();
/// index.ensure_collection("doc_chunks", 384, DistanceMetric::Cosine).await?;
/// index.upsert("doc_chunks", &points).await?;
/// let results = index.search("doc_chunks", &query_vector, 5, None).await?;
/// ```
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Create a named collection if absent. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns [`QaError::CollectionMismatch`](crate::QaError::CollectionMismatch)
    /// if the collection already exists with a different dimension or metric.
    async fn ensure_collection(
        &self,
        name: &str,
        dimensions: usize,
        metric: DistanceMetric,
    ) -> Result<()>;

    /// Destroy a collection and all its points. Deleting an absent
    /// collection is a no-op.
    async fn delete_collection(&self, name: &str) -> Result<()>;

    /// Insert or overwrite points by id.
    ///
    /// Atomic per point, not across the batch: a partial failure surfaces as
    /// [`QaError::PartialUpsert`](crate::QaError::PartialUpsert) carrying the
    /// ids that were not committed.
    async fn upsert(&self, collection: &str, points: &[IndexPoint]) -> Result<()>;

    /// Search for the `top_k` points most similar to `vector`.
    ///
    /// Returns at most `top_k` results ordered by descending similarity;
    /// results scoring below `score_threshold` (if given) are excluded.
    /// Equal scores order by ascending point id.
    async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        top_k: usize,
        score_threshold: Option<f32>,
    ) -> Result<Vec<SearchResult>>;
}

/// Order results by descending score, breaking ties by ascending id, and
/// truncate to `top_k`. Shared by the index backends so result ordering is
/// deterministic regardless of backend.
pub(crate) fn rank_results(results: &mut Vec<SearchResult>, top_k: usize) {
    results.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.id.cmp(&b.id))
    });
    results.truncate(top_k);
}
