//! End-to-end tests for the ingestion and query pipelines over in-process
//! backends.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use docqa::config::QaConfig;
use docqa::document::{Document, IndexPoint, SearchResult};
use docqa::error::{QaError, Result};
use docqa::inmemory::InMemoryIndex;
use docqa::mock::{MockEmbedder, MockGenerator};
use docqa::pipeline::{IngestionPipeline, QueryPipeline};
use docqa::synthesizer::INSUFFICIENT_CONTEXT_REPLY;
use docqa::vectorstore::{DistanceMetric, VectorIndex};
use futures::StreamExt;

const DIM: usize = 8;

fn test_config() -> QaConfig {
    QaConfig::builder()
        .collection("test")
        .chunk_size(40)
        .chunk_overlap(10)
        .top_k(5)
        .max_context_chars(2000)
        .build()
        .unwrap()
}

fn ingestion_over(index: Arc<dyn VectorIndex>) -> IngestionPipeline {
    IngestionPipeline::builder()
        .config(test_config())
        .embedder(Arc::new(MockEmbedder::new(DIM)))
        .index(index)
        .retry_delay(Duration::ZERO)
        .build()
        .unwrap()
}

/// All points currently stored, fetched with a permissive search.
async fn stored_points(index: &InMemoryIndex) -> Vec<SearchResult> {
    index.search("test", &vec![1.0; DIM], 1000, None).await.unwrap()
}

#[tokio::test]
async fn ingest_stores_one_point_per_chunk() {
    let index = Arc::new(InMemoryIndex::new());
    let pipeline = ingestion_over(index.clone());

    let text = "x".repeat(100);
    let report = pipeline.ingest(&Document::new("doc_1", text)).await.unwrap();

    // 100 chars, window 40, step 30: chunks at 0, 30, 60 (last ends at 100).
    assert!(!report.skipped);
    assert_eq!(report.chunk_count, 3);
    assert_eq!(report.char_count, 100);
    assert_eq!(stored_points(&index).await.len(), 3);
}

#[tokio::test]
async fn reingesting_an_unchanged_document_does_not_grow_the_index() {
    let index = Arc::new(InMemoryIndex::new());
    let pipeline = ingestion_over(index.clone());
    let document = Document::new("doc_1", "y".repeat(150));

    pipeline.ingest(&document).await.unwrap();
    let first_count = stored_points(&index).await.len();

    pipeline.ingest(&document).await.unwrap();
    assert_eq!(stored_points(&index).await.len(), first_count);
}

#[tokio::test]
async fn different_documents_do_not_collide() {
    let index = Arc::new(InMemoryIndex::new());
    let pipeline = ingestion_over(index.clone());

    pipeline.ingest(&Document::new("doc_1", "z".repeat(50))).await.unwrap();
    pipeline.ingest(&Document::new("doc_2", "z".repeat(50))).await.unwrap();

    // Same text, different documents: two points per document survive.
    assert_eq!(stored_points(&index).await.len(), 4);
}

#[tokio::test]
async fn empty_document_is_skipped_without_aborting_the_batch() {
    let index = Arc::new(InMemoryIndex::new());
    let pipeline = ingestion_over(index.clone());

    let documents = vec![
        Document::new("first", "some document text"),
        Document::new("empty", ""),
        Document::new("last", "other document text"),
    ];
    let reports = pipeline.ingest_batch(&documents).await.unwrap();

    assert_eq!(reports.len(), 3);
    assert!(!reports[0].skipped);
    assert!(reports[1].skipped);
    assert_eq!(reports[1].chunk_count, 0);
    assert!(!reports[2].skipped);
    assert_eq!(stored_points(&index).await.len(), 2);
}

#[tokio::test]
async fn clear_deletes_the_collection_and_ingest_recreates_it() {
    let index = Arc::new(InMemoryIndex::new());
    let pipeline = ingestion_over(index.clone());

    pipeline.ingest(&Document::new("doc_1", "some document text")).await.unwrap();
    pipeline.clear().await.unwrap();

    let err = index.search("test", &vec![1.0; DIM], 5, None).await.unwrap_err();
    assert!(matches!(err, QaError::CollectionNotFound { .. }));

    pipeline.ingest(&Document::new("doc_1", "some document text")).await.unwrap();
    assert_eq!(stored_points(&index).await.len(), 1);
}

/// Delegates to an [`InMemoryIndex`] but fails the first `failures` upserts.
struct FlakyIndex {
    inner: InMemoryIndex,
    failures: AtomicUsize,
    partial: bool,
}

impl FlakyIndex {
    fn new(failures: usize, partial: bool) -> Self {
        Self { inner: InMemoryIndex::new(), failures: AtomicUsize::new(failures), partial }
    }
}

#[async_trait]
impl VectorIndex for FlakyIndex {
    async fn ensure_collection(
        &self,
        name: &str,
        dimensions: usize,
        metric: DistanceMetric,
    ) -> Result<()> {
        self.inner.ensure_collection(name, dimensions, metric).await
    }

    async fn delete_collection(&self, name: &str) -> Result<()> {
        self.inner.delete_collection(name).await
    }

    async fn upsert(&self, collection: &str, points: &[IndexPoint]) -> Result<()> {
        if self.failures.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            if self.partial && points.len() > 1 {
                // Commit the first point, report the rest as failed.
                self.inner.upsert(collection, &points[..1]).await?;
                return Err(QaError::PartialUpsert {
                    collection: collection.to_string(),
                    succeeded: 1,
                    failed: points[1..].iter().map(|p| p.id).collect(),
                    message: "injected partial failure".to_string(),
                });
            }
            return Err(QaError::Storage {
                backend: "flaky".to_string(),
                message: "injected failure".to_string(),
            });
        }
        self.inner.upsert(collection, points).await
    }

    async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        top_k: usize,
        score_threshold: Option<f32>,
    ) -> Result<Vec<SearchResult>> {
        self.inner.search(collection, vector, top_k, score_threshold).await
    }
}

#[tokio::test]
async fn transient_storage_failures_are_retried() {
    let index = Arc::new(FlakyIndex::new(2, false));
    let pipeline = ingestion_over(index.clone());

    let report = pipeline.ingest(&Document::new("doc_1", "w".repeat(100))).await.unwrap();

    assert_eq!(report.chunk_count, 3);
    assert_eq!(stored_points(&index.inner).await.len(), 3);
}

#[tokio::test]
async fn persistent_storage_failures_surface_after_bounded_retries() {
    let index = Arc::new(FlakyIndex::new(usize::MAX, false));
    let pipeline = ingestion_over(index);

    let err = pipeline.ingest(&Document::new("doc_1", "w".repeat(100))).await.unwrap_err();
    assert!(matches!(err, QaError::Storage { .. }));
}

#[tokio::test]
async fn partial_upsert_retries_only_the_failed_points() {
    let index = Arc::new(FlakyIndex::new(1, true));
    let pipeline = ingestion_over(index.clone());

    let report = pipeline.ingest(&Document::new("doc_1", "v".repeat(100))).await.unwrap();

    // Every chunk lands despite the injected partial failure.
    assert_eq!(report.chunk_count, 3);
    assert_eq!(stored_points(&index.inner).await.len(), 3);
}

#[tokio::test]
async fn answer_streams_segments_grounded_in_ingested_chunks() {
    let index = Arc::new(InMemoryIndex::new());
    let embedder = Arc::new(MockEmbedder::new(DIM));

    let ingestion = IngestionPipeline::builder()
        .config(test_config())
        .embedder(embedder.clone())
        .index(index.clone())
        .build()
        .unwrap();
    ingestion
        .ingest(&Document::new("warranty", "The warranty covers parts for two years."))
        .await
        .unwrap();

    let model = Arc::new(MockGenerator::new(["Two ", "years."]));
    let query = QueryPipeline::builder()
        .config(test_config())
        .embedder(embedder)
        .index(index)
        .model(model.clone())
        .build()
        .unwrap();

    let answer = query.answer("The warranty covers parts for two years.").await.unwrap();
    assert_eq!(answer.context.len(), 1);
    assert!(answer.context.text().contains("warranty"));

    let segments: Vec<String> =
        answer.stream.map(|segment| segment.unwrap()).collect().await;
    assert_eq!(segments.concat(), "Two years.");

    let prompt = model.last_prompt().unwrap();
    assert!(prompt.contains("The warranty covers parts"));
}

#[tokio::test]
async fn querying_an_empty_corpus_yields_the_fixed_no_information_reply() {
    let query = QueryPipeline::builder()
        .config(test_config())
        .embedder(Arc::new(MockEmbedder::new(DIM)))
        .index(Arc::new(InMemoryIndex::new()))
        .model(Arc::new(MockGenerator::new(["should not be used"])))
        .build()
        .unwrap();

    let answer = query.answer("anything at all").await.unwrap();
    assert!(answer.context.is_empty());

    let segments: Vec<String> =
        answer.stream.map(|segment| segment.unwrap()).collect().await;
    assert_eq!(segments, [INSUFFICIENT_CONTEXT_REPLY]);
}

#[tokio::test]
async fn dropping_the_stream_cancels_generation_without_touching_storage() {
    let index = Arc::new(InMemoryIndex::new());
    let embedder = Arc::new(MockEmbedder::new(DIM));
    let ingestion = IngestionPipeline::builder()
        .config(test_config())
        .embedder(embedder.clone())
        .index(index.clone())
        .build()
        .unwrap();
    ingestion.ingest(&Document::new("doc_1", "some document text")).await.unwrap();
    let before = stored_points(&index).await.len();

    let query = QueryPipeline::builder()
        .config(test_config())
        .embedder(embedder)
        .index(index.clone())
        .model(Arc::new(MockGenerator::new(["a", "b", "c"])))
        .build()
        .unwrap();

    let mut answer = query.answer("some document text").await.unwrap();
    let first = answer.stream.next().await.unwrap().unwrap();
    assert_eq!(first, "a");
    drop(answer);

    assert_eq!(stored_points(&index).await.len(), before);
}

#[test]
fn builders_reject_missing_components() {
    assert!(IngestionPipeline::builder().config(test_config()).build().is_err());
    assert!(QueryPipeline::builder()
        .config(test_config())
        .embedder(Arc::new(MockEmbedder::new(DIM)))
        .index(Arc::new(InMemoryIndex::new()))
        .build()
        .is_err());
}
