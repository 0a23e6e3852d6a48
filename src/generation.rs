//! Generation model trait for streaming answer text.

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A cancellable stream of answer text segments.
///
/// The caller pulls segments until exhaustion, or drops the stream to cancel
/// generation; no segment is produced after cancellation.
pub type SegmentStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// Sampling parameters for answer generation.
///
/// Defaults to low-temperature sampling with a 512 token cap.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    /// Sampling temperature.
    pub temperature: f32,
    /// Maximum number of tokens to generate.
    pub max_tokens: u32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self { temperature: 0.2, max_tokens: 512 }
    }
}

/// A language model that streams completions for a prompt.
///
/// Implementations wrap specific chat-completion backends behind a unified
/// async interface. Generation is the one long-running operation in the
/// pipeline; it never writes to storage, so cancelling mid-stream leaves no
/// partial state behind.
#[async_trait]
pub trait GenerationModel: Send + Sync {
    /// Identifier of the underlying model.
    fn name(&self) -> &str;

    /// Stream a completion for the given prompt.
    async fn stream_completion(
        &self,
        prompt: &str,
        params: GenerationParams,
    ) -> Result<SegmentStream>;
}
