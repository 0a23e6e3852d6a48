//! Embedder trait for generating vector embeddings from text.

use async_trait::async_trait;

use crate::error::{QaError, Result};

/// A provider that maps text to fixed-dimension vectors.
///
/// Implementations wrap specific embedding backends behind a unified async
/// interface. [`embed_batch`](Embedder::embed_batch) is the required
/// operation; batching is a throughput optimization only and must not change
/// the produced vectors or their order. For a fixed model, the same text
/// always embeds to the same vector.
///
/// # Example
///
/// ```rust,ignore
/// use docqa::Embedder;
///
/// let embedder = OpenAIEmbedder::new(api_key, "sentence-transformers/all-MiniLM-L6-v2", 384)?;
/// let vector = embedder.embed_one("hello world").await?;
/// assert_eq!(vector.len(), embedder.dimensions());
/// ```
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Generate embedding vectors for a batch of text inputs.
    ///
    /// The output preserves order and cardinality: `embed_batch(texts)[i]`
    /// is the embedding of `texts[i]`.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>>;

    /// Generate an embedding vector for a single text input.
    async fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        let vectors = self.embed_batch(&[text]).await?;
        vectors.into_iter().next().ok_or_else(|| QaError::Embedding {
            provider: self.model_id().to_string(),
            message: "empty batch response for a single input".to_string(),
        })
    }

    /// The dimensionality of embeddings produced by this provider.
    fn dimensions(&self) -> usize;

    /// Identifier of the underlying embedding model.
    fn model_id(&self) -> &str;
}
