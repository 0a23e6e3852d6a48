//! Ingestion and query pipeline orchestrators.
//!
//! [`IngestionPipeline`] composes a [`Chunker`], an [`Embedder`], and a
//! [`VectorIndex`] to turn documents into indexed chunks, with bounded
//! retries around storage writes. [`QueryPipeline`] composes a
//! [`Retriever`] and an [`AnswerSynthesizer`] to turn a question into a
//! streamed, grounded answer.
//!
//! # Example
//!
//! ```rust,ignore
//! use docqa::{Document, IngestionPipeline, QaConfig, QueryPipeline};
//!
//! let ingestion = IngestionPipeline::builder()
//!     .config(config.clone())
//!     .embedder(embedder.clone())
//!     .index(index.clone())
//!     .build()?;
//! ingestion.ingest(&Document::new("doc1", text)).await?;
//!
//! let query = QueryPipeline::builder()
//!     .config(config)
//!     .embedder(embedder)
//!     .index(index)
//!     .model(model)
//!     .build()?;
//! let answer = query.answer("what does the document say?").await?;
//! ```

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};

use crate::chunking::{CharWindowChunker, Chunker};
use crate::config::QaConfig;
use crate::document::{Document, IndexPoint, IngestReport, RetrievedContext, SearchResult};
use crate::embedding::Embedder;
use crate::error::{QaError, Result};
use crate::generation::{GenerationModel, GenerationParams, SegmentStream};
use crate::retriever::Retriever;
use crate::synthesizer::AnswerSynthesizer;
use crate::vectorstore::{DistanceMetric, VectorIndex};

/// How many times a storage write is attempted before giving up.
const MAX_STORAGE_ATTEMPTS: usize = 3;

/// Base delay between storage retries; attempt `n` waits `n` times this.
const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(2);

/// The document ingestion orchestrator: chunk, embed, store.
///
/// Storage failures are retried up to three times with linearly growing
/// delay; a vanished collection is recreated and retried once; a partial
/// upsert narrows the retry to the points that failed.
///
/// Concurrent ingestion of different documents is safe because chunk ids are
/// deterministic per document and index. Concurrently re-ingesting the same
/// document is a last-writer-wins race on its chunk ids.
pub struct IngestionPipeline {
    config: QaConfig,
    chunker: Arc<dyn Chunker>,
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    retry_delay: Duration,
}

impl IngestionPipeline {
    /// Create a new [`IngestionPipelineBuilder`].
    pub fn builder() -> IngestionPipelineBuilder {
        IngestionPipelineBuilder::default()
    }

    /// Return a reference to the pipeline configuration.
    pub fn config(&self) -> &QaConfig {
        &self.config
    }

    /// Ingest a single document: chunk, embed, store.
    ///
    /// A document with no text is skipped with a warning and reported as
    /// skipped, not treated as an error.
    ///
    /// # Errors
    ///
    /// Returns [`QaError::Embedding`] if embedding fails, [`QaError::Config`]
    /// if the embedder violates its declared dimensionality, and a storage
    /// error if writing still fails after retries.
    pub async fn ingest(&self, document: &Document) -> Result<IngestReport> {
        let chunks = self.chunker.chunk(document);
        if chunks.is_empty() {
            warn!(document.id = %document.id, "document has no text, skipping ingestion");
            return Ok(IngestReport {
                document_id: document.id.clone(),
                chunk_count: 0,
                char_count: 0,
                skipped: true,
            });
        }

        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        let embeddings = self.embedder.embed_batch(&texts).await.inspect_err(|e| {
            error!(document.id = %document.id, error = %e, "embedding failed during ingestion");
        })?;

        if embeddings.len() != chunks.len() {
            return Err(QaError::Embedding {
                provider: self.embedder.model_id().to_string(),
                message: format!(
                    "expected {} embeddings, got {}",
                    chunks.len(),
                    embeddings.len()
                ),
            });
        }
        let dimensions = self.embedder.dimensions();
        for (chunk, embedding) in chunks.iter().zip(&embeddings) {
            if embedding.len() != dimensions {
                return Err(QaError::Config(format!(
                    "chunk {} of document '{}' embedded to dimension {}, expected {}",
                    chunk.index,
                    document.id,
                    embedding.len(),
                    dimensions
                )));
            }
        }

        let points: Vec<IndexPoint> = chunks
            .iter()
            .zip(embeddings)
            .map(|(chunk, vector)| IndexPoint { id: chunk.id, vector, payload: chunk.payload() })
            .collect();

        self.index
            .ensure_collection(&self.config.collection, dimensions, DistanceMetric::Cosine)
            .await?;
        self.upsert_with_retry(&points).await?;

        let report = IngestReport {
            document_id: document.id.clone(),
            chunk_count: chunks.len(),
            char_count: document.text.chars().count(),
            skipped: false,
        };
        info!(
            document.id = %document.id,
            chunk_count = report.chunk_count,
            char_count = report.char_count,
            "ingested document"
        );
        Ok(report)
    }

    /// Ingest multiple documents, returning one report per document.
    ///
    /// Empty documents are skipped with a warning and do not abort the
    /// batch; any other failure aborts on the first failing document.
    pub async fn ingest_batch(&self, documents: &[Document]) -> Result<Vec<IngestReport>> {
        let mut reports = Vec::with_capacity(documents.len());
        for document in documents {
            reports.push(self.ingest(document).await?);
        }
        Ok(reports)
    }

    /// Delete the configured collection and every chunk in it.
    ///
    /// The collection is recreated empty on the next ingest or search.
    pub async fn clear(&self) -> Result<()> {
        self.index.delete_collection(&self.config.collection).await?;
        info!(collection = %self.config.collection, "cleared collection");
        Ok(())
    }

    /// Write points with bounded retries.
    ///
    /// A missing collection is recreated and the write retried once; a
    /// partial upsert narrows the pending set to the failed ids; transient
    /// storage failures back off linearly between attempts.
    async fn upsert_with_retry(&self, points: &[IndexPoint]) -> Result<()> {
        let collection = self.config.collection.as_str();
        let mut pending: Vec<IndexPoint> = points.to_vec();
        let mut recreated = false;
        let mut attempt = 1;

        loop {
            match self.index.upsert(collection, &pending).await {
                Ok(()) => return Ok(()),
                Err(QaError::CollectionNotFound { .. }) if !recreated => {
                    warn!(collection, "collection missing during upsert, recreating");
                    self.index
                        .ensure_collection(
                            collection,
                            self.embedder.dimensions(),
                            DistanceMetric::Cosine,
                        )
                        .await?;
                    recreated = true;
                }
                Err(QaError::PartialUpsert { succeeded, failed, .. })
                    if attempt < MAX_STORAGE_ATTEMPTS =>
                {
                    warn!(
                        collection,
                        succeeded,
                        failed_count = failed.len(),
                        attempt,
                        "partial upsert, retrying failed points"
                    );
                    pending.retain(|point| failed.contains(&point.id));
                    tokio::time::sleep(self.retry_delay * attempt as u32).await;
                    attempt += 1;
                }
                Err(e) if e.is_retryable() && attempt < MAX_STORAGE_ATTEMPTS => {
                    warn!(collection, attempt, error = %e, "storage upsert failed, retrying");
                    tokio::time::sleep(self.retry_delay * attempt as u32).await;
                    attempt += 1;
                }
                Err(e) => {
                    error!(collection, error = %e, "upsert failed");
                    return Err(e);
                }
            }
        }
    }
}

/// Builder for constructing an [`IngestionPipeline`].
///
/// `config`, `embedder`, and `index` are required. The chunker defaults to a
/// [`CharWindowChunker`] built from the configuration.
#[derive(Default)]
pub struct IngestionPipelineBuilder {
    config: Option<QaConfig>,
    chunker: Option<Arc<dyn Chunker>>,
    embedder: Option<Arc<dyn Embedder>>,
    index: Option<Arc<dyn VectorIndex>>,
    retry_delay: Option<Duration>,
}

impl IngestionPipelineBuilder {
    /// Set the pipeline configuration.
    pub fn config(mut self, config: QaConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the document chunker. Defaults to a [`CharWindowChunker`] built
    /// from the configuration's chunk size and overlap.
    pub fn chunker(mut self, chunker: Arc<dyn Chunker>) -> Self {
        self.chunker = Some(chunker);
        self
    }

    /// Set the embedder.
    pub fn embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    /// Set the vector index backend.
    pub fn index(mut self, index: Arc<dyn VectorIndex>) -> Self {
        self.index = Some(index);
        self
    }

    /// Set the base delay between storage retries.
    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = Some(delay);
        self
    }

    /// Build the [`IngestionPipeline`], validating that all required fields
    /// are set.
    ///
    /// # Errors
    ///
    /// Returns [`QaError::Config`] if any required field is missing.
    pub fn build(self) -> Result<IngestionPipeline> {
        let config =
            self.config.ok_or_else(|| QaError::Config("config is required".to_string()))?;
        let embedder =
            self.embedder.ok_or_else(|| QaError::Config("embedder is required".to_string()))?;
        let index = self.index.ok_or_else(|| QaError::Config("index is required".to_string()))?;
        let chunker = match self.chunker {
            Some(chunker) => chunker,
            None => Arc::new(CharWindowChunker::new(config.chunk_size, config.chunk_overlap)?),
        };

        Ok(IngestionPipeline {
            config,
            chunker,
            embedder,
            index,
            retry_delay: self.retry_delay.unwrap_or(DEFAULT_RETRY_DELAY),
        })
    }
}

/// A retrieved context paired with the answer stream it grounds.
///
/// The context is returned alongside the stream so it survives a generation
/// failure and can be reused for a retry without re-running retrieval.
pub struct GroundedAnswer {
    /// The context the answer is grounded in.
    pub context: RetrievedContext,
    /// The streamed answer segments.
    pub stream: SegmentStream,
}

/// The question answering orchestrator: retrieve, then synthesize.
pub struct QueryPipeline {
    retriever: Retriever,
    synthesizer: AnswerSynthesizer,
}

impl QueryPipeline {
    /// Create a new [`QueryPipelineBuilder`].
    pub fn builder() -> QueryPipelineBuilder {
        QueryPipelineBuilder::default()
    }

    /// Return a reference to the pipeline configuration.
    pub fn config(&self) -> &QaConfig {
        self.retriever.config()
    }

    /// Search for ranked chunks without assembling a context.
    pub async fn search(&self, query: &str) -> Result<Vec<SearchResult>> {
        self.retriever.search(query).await
    }

    /// Retrieve a length-bounded context for `query`.
    pub async fn retrieve(&self, query: &str) -> Result<RetrievedContext> {
        self.retriever.retrieve(query).await
    }

    /// Stream an answer for `query` grounded in an already-retrieved context.
    pub async fn synthesize(
        &self,
        query: &str,
        context: &RetrievedContext,
    ) -> Result<SegmentStream> {
        self.synthesizer.synthesize(query, context).await
    }

    /// Answer a question: retrieve a context, then stream a grounded answer.
    pub async fn answer(&self, query: &str) -> Result<GroundedAnswer> {
        let context = self.retriever.retrieve(query).await?;
        info!(result_count = context.len(), "generating answer");
        let stream = self.synthesizer.synthesize(query, &context).await?;
        Ok(GroundedAnswer { context, stream })
    }
}

/// Builder for constructing a [`QueryPipeline`].
///
/// `config`, `embedder`, `index`, and `model` are required.
#[derive(Default)]
pub struct QueryPipelineBuilder {
    config: Option<QaConfig>,
    embedder: Option<Arc<dyn Embedder>>,
    index: Option<Arc<dyn VectorIndex>>,
    model: Option<Arc<dyn GenerationModel>>,
    params: Option<GenerationParams>,
}

impl QueryPipelineBuilder {
    /// Set the pipeline configuration.
    pub fn config(mut self, config: QaConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the embedder. Must be the same model family and dimensionality
    /// used at ingestion time.
    pub fn embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    /// Set the vector index backend.
    pub fn index(mut self, index: Arc<dyn VectorIndex>) -> Self {
        self.index = Some(index);
        self
    }

    /// Set the generation model.
    pub fn model(mut self, model: Arc<dyn GenerationModel>) -> Self {
        self.model = Some(model);
        self
    }

    /// Override the generation parameters.
    pub fn params(mut self, params: GenerationParams) -> Self {
        self.params = Some(params);
        self
    }

    /// Build the [`QueryPipeline`], validating that all required fields are
    /// set.
    ///
    /// # Errors
    ///
    /// Returns [`QaError::Config`] if any required field is missing.
    pub fn build(self) -> Result<QueryPipeline> {
        let config =
            self.config.ok_or_else(|| QaError::Config("config is required".to_string()))?;
        let embedder =
            self.embedder.ok_or_else(|| QaError::Config("embedder is required".to_string()))?;
        let index = self.index.ok_or_else(|| QaError::Config("index is required".to_string()))?;
        let model = self.model.ok_or_else(|| QaError::Config("model is required".to_string()))?;

        let retriever = Retriever::new(config, embedder, index);
        let mut synthesizer = AnswerSynthesizer::new(model);
        if let Some(params) = self.params {
            synthesizer = synthesizer.with_params(params);
        }

        Ok(QueryPipeline { retriever, synthesizer })
    }
}
