//! Qdrant vector index backend.
//!
//! Provides [`QdrantIndex`] which implements [`VectorIndex`] using the
//! [qdrant-client](https://docs.rs/qdrant-client) crate over gRPC.
//!
//! # Example
//!
//! ```rust,ignore
//! use docqa::{DistanceMetric, QdrantIndex, VectorIndex};
//!
//! let index = QdrantIndex::new("http://localhost:6334")?;
//! index.ensure_collection("doc_chunks", 384, DistanceMetric::Cosine).await?;
//! index.upsert("doc_chunks", &points).await?;
//! let results = index.search("doc_chunks", &query_vector, 5, None).await?;
//! ```

use async_trait::async_trait;
use qdrant_client::qdrant::point_id::PointIdOptions;
use qdrant_client::qdrant::value::Kind;
use qdrant_client::qdrant::vectors_config::Config as VectorsConfigKind;
use qdrant_client::qdrant::{
    CreateCollectionBuilder, Distance, PointStruct, ScoredPoint, SearchPointsBuilder,
    UpsertPointsBuilder, Value as QdrantValue, VectorParamsBuilder,
};
use qdrant_client::{Payload, Qdrant};
use tracing::debug;
use uuid::Uuid;

use crate::document::{ChunkPayload, IndexPoint, SearchResult};
use crate::error::{QaError, Result};
use crate::vectorstore::{rank_results, DistanceMetric, VectorIndex};

const BACKEND: &str = "qdrant";

/// How many points are written per upsert request by default.
const DEFAULT_UPSERT_BATCH: usize = 64;

/// A [`VectorIndex`] backed by [Qdrant](https://qdrant.tech/).
///
/// Point ids are chunk UUIDs and payloads are [`ChunkPayload`]s stored as
/// Qdrant payload maps. Upserts are written in sub-batches so a mid-batch
/// failure can report exactly which points were not committed.
pub struct QdrantIndex {
    client: Qdrant,
    upsert_batch: usize,
}

impl QdrantIndex {
    /// Create a new Qdrant index connecting to the given URL.
    pub fn new(url: &str) -> Result<Self> {
        let client = Qdrant::from_url(url).build().map_err(Self::map_err)?;
        Ok(Self { client, upsert_batch: DEFAULT_UPSERT_BATCH })
    }

    /// Create a new Qdrant index authenticating with an API key.
    pub fn with_api_key(url: &str, api_key: &str) -> Result<Self> {
        let client = Qdrant::from_url(url).api_key(api_key).build().map_err(Self::map_err)?;
        Ok(Self { client, upsert_batch: DEFAULT_UPSERT_BATCH })
    }

    /// Create a new Qdrant index from an existing client.
    pub fn from_client(client: Qdrant) -> Self {
        Self { client, upsert_batch: DEFAULT_UPSERT_BATCH }
    }

    /// Set how many points are written per upsert request.
    pub fn with_upsert_batch(mut self, batch: usize) -> Self {
        self.upsert_batch = batch.max(1);
        self
    }

    fn map_err(e: qdrant_client::QdrantError) -> QaError {
        QaError::Storage { backend: BACKEND.to_string(), message: e.to_string() }
    }

    fn is_not_found(e: &qdrant_client::QdrantError) -> bool {
        let message = e.to_string().to_lowercase();
        message.contains("not found") || message.contains("doesn't exist")
    }

    /// Extract a string from a Qdrant payload value.
    fn extract_string(value: &QdrantValue) -> Option<String> {
        match &value.kind {
            Some(Kind::StringValue(s)) => Some(s.clone()),
            _ => None,
        }
    }

    /// Extract an integer from a Qdrant payload value.
    fn extract_integer(value: &QdrantValue) -> Option<i64> {
        match &value.kind {
            Some(Kind::IntegerValue(i)) => Some(*i),
            _ => None,
        }
    }

    fn to_point(point: &IndexPoint) -> Result<PointStruct> {
        let payload_value = serde_json::to_value(&point.payload).map_err(|e| QaError::Storage {
            backend: BACKEND.to_string(),
            message: format!("failed to serialize payload: {e}"),
        })?;
        let payload = Payload::try_from(payload_value).map_err(|e| QaError::Storage {
            backend: BACKEND.to_string(),
            message: format!("failed to convert payload: {e}"),
        })?;
        Ok(PointStruct::new(point.id.to_string(), point.vector.clone(), payload))
    }

    fn to_search_result(scored: ScoredPoint) -> Result<SearchResult> {
        let id = match scored.id.as_ref().and_then(|pid| pid.point_id_options.as_ref()) {
            Some(PointIdOptions::Uuid(s)) => {
                Uuid::parse_str(s).map_err(|_| QaError::Storage {
                    backend: BACKEND.to_string(),
                    message: format!("point id '{s}' is not a UUID"),
                })?
            }
            other => {
                return Err(QaError::Storage {
                    backend: BACKEND.to_string(),
                    message: format!("unexpected point id in search result: {other:?}"),
                });
            }
        };

        let text = scored.payload.get("text").and_then(Self::extract_string).unwrap_or_default();
        let document_id = scored
            .payload
            .get("document_id")
            .and_then(Self::extract_string)
            .unwrap_or_default();
        let chunk_index = scored
            .payload
            .get("chunk_index")
            .and_then(Self::extract_integer)
            .and_then(|i| usize::try_from(i).ok())
            .unwrap_or_default();

        Ok(SearchResult {
            id,
            score: scored.score,
            payload: ChunkPayload { text, document_id, chunk_index },
        })
    }

    async fn verify_collection(
        &self,
        name: &str,
        dimensions: usize,
        metric: DistanceMetric,
    ) -> Result<()> {
        let info = self.client.collection_info(name).await.map_err(Self::map_err)?;
        let params = info
            .result
            .and_then(|r| r.config)
            .and_then(|c| c.params)
            .and_then(|p| p.vectors_config)
            .and_then(|v| v.config)
            .and_then(|c| match c {
                VectorsConfigKind::Params(params) => Some(params),
                _ => None,
            })
            .ok_or_else(|| QaError::CollectionMismatch {
                collection: name.to_string(),
                message: "collection has an unexpected vector configuration".to_string(),
            })?;

        if params.size != dimensions as u64 {
            return Err(QaError::CollectionMismatch {
                collection: name.to_string(),
                message: format!(
                    "existing dimension {} does not match requested {dimensions}",
                    params.size
                ),
            });
        }
        if params.distance() != to_distance(metric) {
            return Err(QaError::CollectionMismatch {
                collection: name.to_string(),
                message: format!(
                    "existing distance {:?} does not match requested {metric}",
                    params.distance()
                ),
            });
        }

        debug!(collection = name, "qdrant collection already exists, skipping creation");
        Ok(())
    }
}

fn to_distance(metric: DistanceMetric) -> Distance {
    match metric {
        DistanceMetric::Cosine => Distance::Cosine,
    }
}

#[async_trait]
impl VectorIndex for QdrantIndex {
    async fn ensure_collection(
        &self,
        name: &str,
        dimensions: usize,
        metric: DistanceMetric,
    ) -> Result<()> {
        let exists = self.client.collection_exists(name).await.map_err(Self::map_err)?;
        if exists {
            return self.verify_collection(name, dimensions, metric).await;
        }

        self.client
            .create_collection(
                CreateCollectionBuilder::new(name).vectors_config(VectorParamsBuilder::new(
                    dimensions as u64,
                    to_distance(metric),
                )),
            )
            .await
            .map_err(Self::map_err)?;

        debug!(collection = name, dimensions, "created qdrant collection");
        Ok(())
    }

    async fn delete_collection(&self, name: &str) -> Result<()> {
        match self.client.delete_collection(name).await {
            Ok(_) => {
                debug!(collection = name, "deleted qdrant collection");
                Ok(())
            }
            Err(e) if Self::is_not_found(&e) => Ok(()),
            Err(e) => Err(Self::map_err(e)),
        }
    }

    async fn upsert(&self, collection: &str, points: &[IndexPoint]) -> Result<()> {
        if points.is_empty() {
            return Ok(());
        }

        let mut committed = 0usize;
        for batch in points.chunks(self.upsert_batch) {
            let batch_points: Vec<PointStruct> =
                batch.iter().map(Self::to_point).collect::<Result<_>>()?;

            match self
                .client
                .upsert_points(UpsertPointsBuilder::new(collection, batch_points).wait(true))
                .await
            {
                Ok(_) => committed += batch.len(),
                Err(e) if Self::is_not_found(&e) => {
                    return Err(QaError::CollectionNotFound {
                        collection: collection.to_string(),
                    });
                }
                Err(e) if committed > 0 => {
                    let failed = points[committed..].iter().map(|p| p.id).collect();
                    return Err(QaError::PartialUpsert {
                        collection: collection.to_string(),
                        succeeded: committed,
                        failed,
                        message: e.to_string(),
                    });
                }
                Err(e) => return Err(Self::map_err(e)),
            }
        }

        debug!(collection, count = points.len(), "upserted points to qdrant");
        Ok(())
    }

    async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        top_k: usize,
        score_threshold: Option<f32>,
    ) -> Result<Vec<SearchResult>> {
        let mut request = SearchPointsBuilder::new(collection, vector.to_vec(), top_k as u64)
            .with_payload(true);
        if let Some(threshold) = score_threshold {
            request = request.score_threshold(threshold);
        }

        let response = match self.client.search_points(request).await {
            Ok(response) => response,
            Err(e) if Self::is_not_found(&e) => {
                return Err(QaError::CollectionNotFound { collection: collection.to_string() });
            }
            Err(e) => return Err(Self::map_err(e)),
        };

        let mut results = response
            .result
            .into_iter()
            .map(Self::to_search_result)
            .collect::<Result<Vec<_>>>()?;
        rank_results(&mut results, top_k);
        Ok(results)
    }
}
