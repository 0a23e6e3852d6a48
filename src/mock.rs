//! Deterministic in-process doubles for the embedding and generation traits.
//!
//! [`MockEmbedder`] hashes text into a unit vector and [`MockGenerator`]
//! replays scripted answer segments, so pipelines can be exercised end to
//! end without network access or API keys.

use std::sync::Mutex;

use async_trait::async_trait;
use futures::stream;

use crate::embedding::Embedder;
use crate::error::{QaError, Result};
use crate::generation::{GenerationModel, GenerationParams, SegmentStream};

/// A deterministic embedder that derives vectors from a text hash.
///
/// The same text always embeds to the same L2-normalized vector, so
/// similarity between a query and an identical stored chunk is maximal.
/// The vectors carry no semantic meaning.
pub struct MockEmbedder {
    dimensions: usize,
    model: String,
}

impl MockEmbedder {
    /// Create a mock embedder producing vectors of the given dimensionality.
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions, model: "mock-embedder".to_string() }
    }

    fn embed_text(&self, text: &str) -> Vec<f32> {
        let hash = text
            .bytes()
            .fold(0u64, |acc, b| acc.wrapping_mul(31).wrapping_add(u64::from(b)));
        let mut embedding = vec![0.0f32; self.dimensions];
        for (i, value) in embedding.iter_mut().enumerate() {
            *value = ((hash.wrapping_add(i as u64)) as f32).sin();
        }
        let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for value in &mut embedding {
                *value /= norm;
            }
        }
        embedding
    }
}

#[async_trait]
impl Embedder for MockEmbedder {
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|text| self.embed_text(text)).collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}

/// A generation model that replays a fixed sequence of segments.
///
/// Records the last prompt it was asked to complete, so tests can assert on
/// prompt construction.
pub struct MockGenerator {
    segments: Vec<String>,
    last_prompt: Mutex<Option<String>>,
}

impl MockGenerator {
    /// Create a mock generator that streams the given segments in order.
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            segments: segments.into_iter().map(Into::into).collect(),
            last_prompt: Mutex::new(None),
        }
    }

    /// The prompt passed to the most recent completion, if any.
    pub fn last_prompt(&self) -> Option<String> {
        self.last_prompt.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl GenerationModel for MockGenerator {
    fn name(&self) -> &str {
        "mock-generator"
    }

    async fn stream_completion(
        &self,
        prompt: &str,
        _params: GenerationParams,
    ) -> Result<SegmentStream> {
        *self.last_prompt.lock().unwrap_or_else(|e| e.into_inner()) = Some(prompt.to_string());
        let segments = self.segments.clone();
        Ok(Box::pin(stream::iter(segments.into_iter().map(Ok::<_, QaError>))))
    }
}
