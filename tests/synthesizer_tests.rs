//! Tests for prompt construction and answer streaming.

use std::sync::Arc;

use docqa::document::{ChunkPayload, RetrievedContext, SearchResult};
use docqa::generation::SegmentStream;
use docqa::mock::MockGenerator;
use docqa::synthesizer::{AnswerSynthesizer, INSUFFICIENT_CONTEXT_REPLY};
use futures::StreamExt;
use uuid::Uuid;

fn result(raw_id: u128, text: &str) -> SearchResult {
    SearchResult {
        id: Uuid::from_u128(raw_id),
        score: 0.9,
        payload: ChunkPayload {
            text: text.to_string(),
            document_id: "doc_1".to_string(),
            chunk_index: 0,
        },
    }
}

async fn collect(stream: SegmentStream) -> Vec<String> {
    stream.map(|segment| segment.unwrap()).collect().await
}

#[tokio::test]
async fn empty_context_yields_fixed_reply_without_calling_the_model() {
    let model = Arc::new(MockGenerator::new(["should not be used"]));
    let synthesizer = AnswerSynthesizer::new(model.clone());

    let stream =
        synthesizer.synthesize("any question", &RetrievedContext::empty()).await.unwrap();
    let segments = collect(stream).await;

    assert_eq!(segments, [INSUFFICIENT_CONTEXT_REPLY]);
    assert_eq!(model.last_prompt(), None);
}

#[tokio::test]
async fn prompt_embeds_query_context_and_rules() {
    let model = Arc::new(MockGenerator::new(["ok"]));
    let synthesizer = AnswerSynthesizer::new(model.clone());
    let context =
        RetrievedContext { results: vec![result(1, "First chunk."), result(2, "Second chunk.")] };

    let stream = synthesizer.synthesize("What is covered?", &context).await.unwrap();
    collect(stream).await;

    let prompt = model.last_prompt().unwrap();
    assert!(prompt.contains("Use ONLY the context below"));
    assert!(prompt.contains("USER QUERY:\nWhat is covered?"));
    assert!(prompt.contains("CONTEXT:\nFirst chunk.\n\nSecond chunk."));
    assert!(prompt.contains("RULES:"));
    assert!(prompt.contains(INSUFFICIENT_CONTEXT_REPLY));
}

#[tokio::test]
async fn scripted_segments_stream_in_order() {
    let model = Arc::new(MockGenerator::new(["The ", "answer", "."]));
    let synthesizer = AnswerSynthesizer::new(model);
    let context = RetrievedContext { results: vec![result(1, "Context text.")] };

    let stream = synthesizer.synthesize("q", &context).await.unwrap();
    let segments = collect(stream).await;

    assert_eq!(segments, ["The ", "answer", "."]);
    assert_eq!(segments.concat(), "The answer.");
}

#[test]
fn context_text_joins_results_with_blank_lines() {
    let context = RetrievedContext {
        results: vec![result(1, "one"), result(2, "two"), result(3, "three")],
    };

    assert_eq!(context.text(), "one\n\ntwo\n\nthree");
    assert_eq!(context.char_count(), context.text().chars().count());
}
