//! Configuration for the ingestion and query pipelines.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{QaError, Result};

/// Configuration parameters shared by ingestion and retrieval.
///
/// Construct via [`QaConfig::builder()`] or [`QaConfig::from_env()`]; both
/// validate that the parameters are consistent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QaConfig {
    /// Name of the vector collection holding document chunks.
    pub collection: String,
    /// Identifier of the embedding model used for chunks and queries.
    pub embedding_model: String,
    /// Maximum chunk size in characters.
    pub chunk_size: usize,
    /// Number of overlapping characters between consecutive chunks.
    pub chunk_overlap: usize,
    /// Number of top results to request from vector search.
    pub top_k: usize,
    /// Maximum combined character length of the assembled context,
    /// separators included.
    pub max_context_chars: usize,
    /// Minimum similarity score for search results. `None` keeps everything.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score_threshold: Option<f32>,
}

impl Default for QaConfig {
    fn default() -> Self {
        Self {
            collection: "doc_chunks".to_string(),
            embedding_model: "sentence-transformers/all-MiniLM-L6-v2".to_string(),
            chunk_size: 500,
            chunk_overlap: 100,
            top_k: 5,
            max_context_chars: 4000,
            score_threshold: None,
        }
    }
}

impl QaConfig {
    /// Create a new builder for constructing a [`QaConfig`].
    pub fn builder() -> QaConfigBuilder {
        QaConfigBuilder::default()
    }

    /// Build a configuration from environment variables, falling back to the
    /// defaults for anything unset.
    ///
    /// Recognized variables: `COLLECTION_NAME`, `EMBEDDING_MODEL`,
    /// `CHUNK_SIZE`, `CHUNK_OVERLAP`, `MAX_SEARCH_RESULTS`,
    /// `MAX_CONTEXT_CHARS`, `SCORE_THRESHOLD`.
    ///
    /// # Errors
    ///
    /// Returns [`QaError::Config`] if a variable fails to parse or the
    /// resulting configuration is inconsistent.
    pub fn from_env() -> Result<QaConfig> {
        let mut builder = QaConfig::builder();
        if let Ok(value) = std::env::var("COLLECTION_NAME") {
            builder = builder.collection(value);
        }
        if let Ok(value) = std::env::var("EMBEDDING_MODEL") {
            builder = builder.embedding_model(value);
        }
        if let Ok(value) = std::env::var("CHUNK_SIZE") {
            builder = builder.chunk_size(parse_var("CHUNK_SIZE", &value)?);
        }
        if let Ok(value) = std::env::var("CHUNK_OVERLAP") {
            builder = builder.chunk_overlap(parse_var("CHUNK_OVERLAP", &value)?);
        }
        if let Ok(value) = std::env::var("MAX_SEARCH_RESULTS") {
            builder = builder.top_k(parse_var("MAX_SEARCH_RESULTS", &value)?);
        }
        if let Ok(value) = std::env::var("MAX_CONTEXT_CHARS") {
            builder = builder.max_context_chars(parse_var("MAX_CONTEXT_CHARS", &value)?);
        }
        if let Ok(value) = std::env::var("SCORE_THRESHOLD") {
            builder = builder.score_threshold(parse_var("SCORE_THRESHOLD", &value)?);
        }
        builder.build()
    }
}

fn parse_var<T: FromStr>(name: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| QaError::Config(format!("{name} must be a valid number, got '{value}'")))
}

/// Builder for constructing a validated [`QaConfig`].
#[derive(Debug, Clone, Default)]
pub struct QaConfigBuilder {
    config: QaConfig,
}

impl QaConfigBuilder {
    /// Set the collection name.
    pub fn collection(mut self, name: impl Into<String>) -> Self {
        self.config.collection = name.into();
        self
    }

    /// Set the embedding model identifier.
    pub fn embedding_model(mut self, model: impl Into<String>) -> Self {
        self.config.embedding_model = model.into();
        self
    }

    /// Set the maximum chunk size in characters.
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.config.chunk_size = size;
        self
    }

    /// Set the overlap between consecutive chunks in characters.
    pub fn chunk_overlap(mut self, overlap: usize) -> Self {
        self.config.chunk_overlap = overlap;
        self
    }

    /// Set the number of top results to request from vector search.
    pub fn top_k(mut self, k: usize) -> Self {
        self.config.top_k = k;
        self
    }

    /// Set the maximum combined character length of the assembled context.
    pub fn max_context_chars(mut self, chars: usize) -> Self {
        self.config.max_context_chars = chars;
        self
    }

    /// Set the minimum similarity score for search results.
    pub fn score_threshold(mut self, threshold: f32) -> Self {
        self.config.score_threshold = Some(threshold);
        self
    }

    /// Build the [`QaConfig`], validating that parameters are consistent.
    ///
    /// # Errors
    ///
    /// Returns [`QaError::Config`] if:
    /// - `collection` is empty
    /// - `chunk_size == 0`
    /// - `chunk_overlap >= chunk_size`
    /// - `top_k == 0`
    /// - `max_context_chars == 0`
    /// - `score_threshold` is not a finite number
    pub fn build(self) -> Result<QaConfig> {
        if self.config.collection.is_empty() {
            return Err(QaError::Config("collection name must not be empty".to_string()));
        }
        if self.config.chunk_size == 0 {
            return Err(QaError::Config("chunk_size must be greater than zero".to_string()));
        }
        if self.config.chunk_overlap >= self.config.chunk_size {
            return Err(QaError::Config(format!(
                "chunk_overlap ({}) must be less than chunk_size ({})",
                self.config.chunk_overlap, self.config.chunk_size
            )));
        }
        if self.config.top_k == 0 {
            return Err(QaError::Config("top_k must be greater than zero".to_string()));
        }
        if self.config.max_context_chars == 0 {
            return Err(QaError::Config(
                "max_context_chars must be greater than zero".to_string(),
            ));
        }
        if let Some(threshold) = self.config.score_threshold {
            if !threshold.is_finite() {
                return Err(QaError::Config(format!(
                    "score_threshold must be a finite number, got {threshold}"
                )));
            }
        }
        Ok(self.config)
    }
}
