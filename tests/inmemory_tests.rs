//! Unit and property tests for the in-memory vector index.

use std::collections::HashMap;

use docqa::document::{ChunkPayload, IndexPoint};
use docqa::error::QaError;
use docqa::inmemory::InMemoryIndex;
use docqa::vectorstore::{DistanceMetric, VectorIndex};
use proptest::prelude::*;
use uuid::Uuid;

fn point(id: Uuid, vector: Vec<f32>, text: &str) -> IndexPoint {
    IndexPoint {
        id,
        vector,
        payload: ChunkPayload {
            text: text.to_string(),
            document_id: "doc_1".to_string(),
            chunk_index: 0,
        },
    }
}

/// Generate a non-zero L2-normalized embedding of the given dimension.
fn arb_normalized_embedding(dim: usize) -> impl Strategy<Value = Vec<f32>> {
    proptest::collection::vec(-1.0f32..1.0f32, dim).prop_filter_map(
        "non-zero embedding",
        |mut v| {
            let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
            if norm < 1e-8 {
                return None;
            }
            for val in &mut v {
                *val /= norm;
            }
            Some(v)
        },
    )
}

/// Generate an index point with a normalized embedding and a deterministic id.
fn arb_point(dim: usize) -> impl Strategy<Value = IndexPoint> {
    (any::<u128>(), "[a-z ]{5,30}", arb_normalized_embedding(dim))
        .prop_map(|(raw_id, text, vector)| point(Uuid::from_u128(raw_id), vector, &text))
}

/// **Property: search ordering.** *For any* set of points stored in an
/// [`InMemoryIndex`], searching returns results ordered by descending cosine
/// similarity with ties broken by ascending id, and at most `top_k` of them.
mod prop_inmemory_search_ordering {
    use super::*;

    const DIM: usize = 16;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn results_ordered_descending_and_bounded_by_top_k(
            points in proptest::collection::vec(arb_point(DIM), 1..20),
            query in arb_normalized_embedding(DIM),
            top_k in 1usize..25,
        ) {
            let rt = tokio::runtime::Runtime::new().unwrap();
            let (results, unique_count) = rt.block_on(async {
                let index = InMemoryIndex::new();
                index.ensure_collection("test", DIM, DistanceMetric::Cosine).await.unwrap();

                // Deduplicate points by id to avoid upsert overwriting
                let mut deduped: HashMap<Uuid, IndexPoint> = HashMap::new();
                for point in &points {
                    deduped.entry(point.id).or_insert_with(|| point.clone());
                }
                let unique_points: Vec<IndexPoint> = deduped.into_values().collect();
                let count = unique_points.len();

                index.upsert("test", &unique_points).await.unwrap();
                let results = index.search("test", &query, top_k, None).await.unwrap();
                (results, count)
            });

            // Result count is at most top_k and at most the number of stored points
            prop_assert!(results.len() <= top_k);
            prop_assert!(results.len() <= unique_count);

            // Results are ordered by descending score, ties by ascending id
            for window in results.windows(2) {
                prop_assert!(
                    window[0].score > window[1].score
                        || (window[0].score == window[1].score && window[0].id < window[1].id),
                    "results out of order: ({}, {}) before ({}, {})",
                    window[0].score,
                    window[0].id,
                    window[1].score,
                    window[1].id,
                );
            }
        }
    }
}

#[tokio::test]
async fn search_filters_results_below_threshold() {
    let index = InMemoryIndex::new();
    index.ensure_collection("test", 4, DistanceMetric::Cosine).await.unwrap();
    index
        .upsert(
            "test",
            &[
                point(Uuid::from_u128(1), vec![1.0, 0.0, 0.0, 0.0], "aligned"),
                point(Uuid::from_u128(2), vec![1.0, 1.0, 0.0, 0.0], "close"),
                point(Uuid::from_u128(3), vec![0.0, 1.0, 0.0, 0.0], "orthogonal"),
            ],
        )
        .await
        .unwrap();

    let results =
        index.search("test", &[1.0, 0.0, 0.0, 0.0], 10, Some(0.5)).await.unwrap();

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].payload.text, "aligned");
    assert!((results[0].score - 1.0).abs() < 1e-6);
    assert_eq!(results[1].payload.text, "close");
    assert!(results[1].score >= 0.5);
}

#[tokio::test]
async fn equal_scores_break_ties_by_ascending_id() {
    let index = InMemoryIndex::new();
    index.ensure_collection("test", 2, DistanceMetric::Cosine).await.unwrap();
    index
        .upsert(
            "test",
            &[
                point(Uuid::from_u128(2), vec![1.0, 0.0], "second"),
                point(Uuid::from_u128(1), vec![1.0, 0.0], "first"),
            ],
        )
        .await
        .unwrap();

    let results = index.search("test", &[1.0, 0.0], 10, None).await.unwrap();

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].id, Uuid::from_u128(1));
    assert_eq!(results[1].id, Uuid::from_u128(2));
}

#[tokio::test]
async fn ensure_collection_is_idempotent_but_rejects_changed_dimension() {
    let index = InMemoryIndex::new();
    index.ensure_collection("test", 4, DistanceMetric::Cosine).await.unwrap();
    index.ensure_collection("test", 4, DistanceMetric::Cosine).await.unwrap();

    let err = index.ensure_collection("test", 8, DistanceMetric::Cosine).await.unwrap_err();
    assert!(matches!(err, QaError::CollectionMismatch { .. }));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn operations_on_missing_collection_fail_with_not_found() {
    let index = InMemoryIndex::new();

    let err = index
        .upsert("missing", &[point(Uuid::from_u128(1), vec![1.0, 0.0], "text")])
        .await
        .unwrap_err();
    assert!(matches!(err, QaError::CollectionNotFound { .. }));

    let err = index.search("missing", &[1.0, 0.0], 5, None).await.unwrap_err();
    assert!(matches!(err, QaError::CollectionNotFound { .. }));
}

#[tokio::test]
async fn dimension_mismatches_are_rejected() {
    let index = InMemoryIndex::new();
    index.ensure_collection("test", 4, DistanceMetric::Cosine).await.unwrap();

    let err = index
        .upsert("test", &[point(Uuid::from_u128(1), vec![1.0, 0.0], "too short")])
        .await
        .unwrap_err();
    assert!(matches!(err, QaError::CollectionMismatch { .. }));

    let err = index.search("test", &[1.0, 0.0], 5, None).await.unwrap_err();
    assert!(matches!(err, QaError::CollectionMismatch { .. }));
}

#[tokio::test]
async fn delete_collection_is_idempotent_and_drops_points() {
    let index = InMemoryIndex::new();

    // Deleting an absent collection is not an error.
    index.delete_collection("test").await.unwrap();

    index.ensure_collection("test", 2, DistanceMetric::Cosine).await.unwrap();
    index
        .upsert("test", &[point(Uuid::from_u128(1), vec![1.0, 0.0], "text")])
        .await
        .unwrap();
    index.delete_collection("test").await.unwrap();

    let err = index.search("test", &[1.0, 0.0], 5, None).await.unwrap_err();
    assert!(matches!(err, QaError::CollectionNotFound { .. }));

    // Recreating yields an empty collection.
    index.ensure_collection("test", 2, DistanceMetric::Cosine).await.unwrap();
    let results = index.search("test", &[1.0, 0.0], 5, None).await.unwrap();
    assert!(results.is_empty());
}

#[tokio::test]
async fn upsert_overwrites_points_with_the_same_id() {
    let index = InMemoryIndex::new();
    index.ensure_collection("test", 2, DistanceMetric::Cosine).await.unwrap();

    let id = Uuid::from_u128(42);
    index.upsert("test", &[point(id, vec![1.0, 0.0], "old")]).await.unwrap();
    index.upsert("test", &[point(id, vec![0.0, 1.0], "new")]).await.unwrap();

    let results = index.search("test", &[0.0, 1.0], 10, None).await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].payload.text, "new");
}
