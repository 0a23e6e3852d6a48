//! In-memory vector index using cosine similarity.
//!
//! This module provides [`InMemoryIndex`], a zero-dependency vector index
//! backed by a `HashMap` protected by a `tokio::sync::RwLock`. It is suitable
//! for development, testing, and small corpora.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::document::{IndexPoint, SearchResult};
use crate::error::{QaError, Result};
use crate::vectorstore::{rank_results, DistanceMetric, VectorIndex};

/// A collection held in memory: its parameters plus its points by id.
struct StoredCollection {
    dimensions: usize,
    metric: DistanceMetric,
    points: HashMap<Uuid, IndexPoint>,
}

/// An in-memory [`VectorIndex`] using cosine similarity for search.
///
/// Collections record their dimension and metric at creation time and reject
/// points or queries that do not match. All operations are async-safe via
/// `tokio::sync::RwLock`.
///
/// # Example
///
/// ```rust,ignore
/// use docqa::{DistanceMetric, InMemoryIndex, VectorIndex};
///
/// let index = InMemoryIndex::new();
/// index.ensure_collection("doc_chunks", 384, DistanceMetric::Cosine).await?;
/// ```
#[derive(Default)]
pub struct InMemoryIndex {
    collections: RwLock<HashMap<String, StoredCollection>>,
}

impl InMemoryIndex {
    /// Create a new empty in-memory index.
    pub fn new() -> Self {
        Self::default()
    }
}

/// Compute cosine similarity between two vectors of equal length.
///
/// Returns 0.0 if either vector has zero magnitude.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[async_trait]
impl VectorIndex for InMemoryIndex {
    async fn ensure_collection(
        &self,
        name: &str,
        dimensions: usize,
        metric: DistanceMetric,
    ) -> Result<()> {
        let mut collections = self.collections.write().await;
        if let Some(existing) = collections.get(name) {
            if existing.dimensions != dimensions {
                return Err(QaError::CollectionMismatch {
                    collection: name.to_string(),
                    message: format!(
                        "existing dimension {} does not match requested {dimensions}",
                        existing.dimensions
                    ),
                });
            }
            if existing.metric != metric {
                return Err(QaError::CollectionMismatch {
                    collection: name.to_string(),
                    message: format!(
                        "existing metric {} does not match requested {metric}",
                        existing.metric
                    ),
                });
            }
            return Ok(());
        }
        collections.insert(
            name.to_string(),
            StoredCollection { dimensions, metric, points: HashMap::new() },
        );
        Ok(())
    }

    async fn delete_collection(&self, name: &str) -> Result<()> {
        let mut collections = self.collections.write().await;
        collections.remove(name);
        Ok(())
    }

    async fn upsert(&self, collection: &str, points: &[IndexPoint]) -> Result<()> {
        let mut collections = self.collections.write().await;
        let stored = collections.get_mut(collection).ok_or_else(|| {
            QaError::CollectionNotFound { collection: collection.to_string() }
        })?;
        for point in points {
            if point.vector.len() != stored.dimensions {
                return Err(QaError::CollectionMismatch {
                    collection: collection.to_string(),
                    message: format!(
                        "point {} has dimension {}, collection expects {}",
                        point.id,
                        point.vector.len(),
                        stored.dimensions
                    ),
                });
            }
        }
        for point in points {
            stored.points.insert(point.id, point.clone());
        }
        Ok(())
    }

    async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        top_k: usize,
        score_threshold: Option<f32>,
    ) -> Result<Vec<SearchResult>> {
        let collections = self.collections.read().await;
        let stored = collections.get(collection).ok_or_else(|| {
            QaError::CollectionNotFound { collection: collection.to_string() }
        })?;
        if vector.len() != stored.dimensions {
            return Err(QaError::CollectionMismatch {
                collection: collection.to_string(),
                message: format!(
                    "query vector has dimension {}, collection expects {}",
                    vector.len(),
                    stored.dimensions
                ),
            });
        }

        let mut scored: Vec<SearchResult> = stored
            .points
            .values()
            .map(|point| SearchResult {
                id: point.id,
                score: cosine_similarity(&point.vector, vector),
                payload: point.payload.clone(),
            })
            .filter(|result| score_threshold.is_none_or(|t| result.score >= t))
            .collect();

        rank_results(&mut scored, top_k);
        Ok(scored)
    }
}
