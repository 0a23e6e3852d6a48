//! OpenAI-compatible embedding and generation backends.
//!
//! [`OpenAIEmbedder`] calls a `/v1/embeddings` endpoint over `reqwest`;
//! [`OpenAIChatModel`] streams chat completions via `async-openai`. Both work
//! against any OpenAI-compatible server, not just `api.openai.com`.

use async_openai::config::OpenAIConfig;
use async_openai::types::{ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs};
use async_openai::Client;
use async_stream::try_stream;
use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::embedding::Embedder;
use crate::error::{QaError, Result};
use crate::generation::{GenerationModel, GenerationParams, SegmentStream};

const PROVIDER: &str = "OpenAI";

/// The default embeddings endpoint.
const OPENAI_EMBEDDINGS_URL: &str = "https://api.openai.com/v1/embeddings";

/// An [`Embedder`] backed by an OpenAI-compatible embeddings API.
///
/// Uses `reqwest` to call the `/v1/embeddings` endpoint directly. Every
/// returned vector is validated against the declared dimensionality, and the
/// response `index` field is used to restore request order, so a reordering
/// server cannot produce misaligned embeddings.
///
/// # Example
///
/// ```rust,ignore
/// use docqa::OpenAIEmbedder;
///
/// let embedder = OpenAIEmbedder::new("sk-...", "text-embedding-3-small", 1536)?
///     .with_endpoint("https://api.openai.com/v1/embeddings");
/// let vector = embedder.embed_one("hello world").await?;
/// ```
pub struct OpenAIEmbedder {
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
    model: String,
    dimensions: usize,
}

impl OpenAIEmbedder {
    /// Create a new embedder for the given model and dimensionality.
    ///
    /// An empty `api_key` is allowed for self-hosted endpoints that do not
    /// authenticate; no `Authorization` header is sent in that case.
    ///
    /// # Errors
    ///
    /// Returns [`QaError::Config`] if `dimensions == 0` or `model` is empty.
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        dimensions: usize,
    ) -> Result<Self> {
        let model = model.into();
        if model.is_empty() {
            return Err(QaError::Config("embedding model must not be empty".to_string()));
        }
        if dimensions == 0 {
            return Err(QaError::Config(
                "embedding dimensions must be greater than zero".to_string(),
            ));
        }
        Ok(Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            endpoint: OPENAI_EMBEDDINGS_URL.to_string(),
            model,
            dimensions,
        })
    }

    /// Point the embedder at a different embeddings endpoint URL.
    pub fn with_endpoint(mut self, url: impl Into<String>) -> Self {
        self.endpoint = url.into();
        self
    }
}

// ── embeddings API request/response types ──────────────────────────

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: Vec<&'a str>,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

#[async_trait]
impl Embedder for OpenAIEmbedder {
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!(
            provider = PROVIDER,
            batch_size = texts.len(),
            model = %self.model,
            "embedding batch"
        );

        let request_body = EmbeddingRequest { model: &self.model, input: texts.to_vec() };

        let mut request = self.client.post(&self.endpoint).json(&request_body);
        if !self.api_key.is_empty() {
            request = request.bearer_auth(&self.api_key);
        }

        let response = request.send().await.map_err(|e| {
            error!(provider = PROVIDER, error = %e, "embedding request failed");
            QaError::Embedding {
                provider: PROVIDER.to_string(),
                message: format!("request failed: {e}"),
            }
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);

            error!(provider = PROVIDER, %status, "embeddings API error");
            return Err(QaError::Embedding {
                provider: PROVIDER.to_string(),
                message: format!("API returned {status}: {detail}"),
            });
        }

        let embedding_response: EmbeddingResponse = response.json().await.map_err(|e| {
            error!(provider = PROVIDER, error = %e, "failed to parse embeddings response");
            QaError::Embedding {
                provider: PROVIDER.to_string(),
                message: format!("failed to parse response: {e}"),
            }
        })?;

        // Restore request order from the response index field.
        let mut ordered: Vec<Option<Vec<f32>>> = vec![None; texts.len()];
        for item in embedding_response.data {
            if item.embedding.len() != self.dimensions {
                return Err(QaError::Embedding {
                    provider: PROVIDER.to_string(),
                    message: format!(
                        "embedding {} has dimension {}, expected {}",
                        item.index,
                        item.embedding.len(),
                        self.dimensions
                    ),
                });
            }
            let slot = ordered.get_mut(item.index).ok_or_else(|| QaError::Embedding {
                provider: PROVIDER.to_string(),
                message: format!(
                    "embedding index {} out of range for batch of {}",
                    item.index,
                    texts.len()
                ),
            })?;
            *slot = Some(item.embedding);
        }

        ordered
            .into_iter()
            .enumerate()
            .map(|(i, vector)| {
                vector.ok_or_else(|| QaError::Embedding {
                    provider: PROVIDER.to_string(),
                    message: format!("no embedding returned for input {i}"),
                })
            })
            .collect()
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}

/// A [`GenerationModel`] streaming chat completions from an OpenAI-compatible
/// API.
///
/// # Example
///
/// ```rust,ignore
/// use docqa::OpenAIChatModel;
///
/// let model = OpenAIChatModel::compatible(
///     api_key,
///     "https://api.groq.com/openai/v1",
///     "openai/gpt-oss-20b",
/// );
/// let stream = model.stream_completion(&prompt, GenerationParams::default()).await?;
/// ```
pub struct OpenAIChatModel {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAIChatModel {
    /// Create a client for the standard OpenAI API.
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        let config = OpenAIConfig::new().with_api_key(api_key.into());
        Self { client: Client::with_config(config), model: model.into() }
    }

    /// Create a client for an OpenAI-compatible API at a custom base URL.
    pub fn compatible(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        let config =
            OpenAIConfig::new().with_api_key(api_key.into()).with_api_base(base_url.into());
        Self { client: Client::with_config(config), model: model.into() }
    }
}

#[async_trait]
impl GenerationModel for OpenAIChatModel {
    fn name(&self) -> &str {
        &self.model
    }

    async fn stream_completion(
        &self,
        prompt: &str,
        params: GenerationParams,
    ) -> Result<SegmentStream> {
        let model = self.model.clone();
        let client = self.client.clone();
        let prompt = prompt.to_string();

        let stream = try_stream! {
            let message = ChatCompletionRequestUserMessageArgs::default()
                .content(prompt.as_str())
                .build()
                .map_err(|e| QaError::Generation {
                    provider: PROVIDER.to_string(),
                    message: format!("failed to build request: {e}"),
                })?;

            let request = CreateChatCompletionRequestArgs::default()
                .model(&model)
                .messages([message.into()])
                .temperature(params.temperature)
                .max_completion_tokens(params.max_tokens)
                .build()
                .map_err(|e| QaError::Generation {
                    provider: PROVIDER.to_string(),
                    message: format!("failed to build request: {e}"),
                })?;

            let mut stream = client.chat().create_stream(request).await.map_err(|e| {
                error!(provider = PROVIDER, model = %model, error = %e, "completion request failed");
                QaError::Generation {
                    provider: PROVIDER.to_string(),
                    message: format!("API error: {e}"),
                }
            })?;

            while let Some(result) = stream.next().await {
                let chunk = result.map_err(|e| QaError::Generation {
                    provider: PROVIDER.to_string(),
                    message: format!("stream error: {e}"),
                })?;
                for choice in &chunk.choices {
                    if let Some(content) = &choice.delta.content {
                        if !content.is_empty() {
                            yield content.clone();
                        }
                    }
                }
            }
        };

        Ok(Box::pin(stream))
    }
}
