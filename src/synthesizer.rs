//! Grounded prompt construction and streaming answer synthesis.

use std::sync::Arc;

use tracing::debug;

use crate::document::RetrievedContext;
use crate::error::{QaError, Result};
use crate::generation::{GenerationModel, GenerationParams, SegmentStream};

/// The literal reply produced when the retrieved context is empty, and the
/// reply the model is instructed to give when the context is insufficient.
pub const INSUFFICIENT_CONTEXT_REPLY: &str = "Not enough information in the document.";

/// Build the grounded instruction prompt for a query and its context text.
pub(crate) fn build_prompt(query: &str, context: &str) -> String {
    format!(
        "You are an expert assistant. Use ONLY the context below to answer.\n\
         \n\
         USER QUERY:\n\
         {query}\n\
         \n\
         CONTEXT:\n\
         {context}\n\
         \n\
         RULES:\n\
         - Only use the provided context.\n\
         - If context is insufficient, respond: \"{INSUFFICIENT_CONTEXT_REPLY}\"\n"
    )
}

/// Streams answers grounded in a retrieved context.
///
/// If the context is empty the generation service is not called at all: the
/// synthesizer yields [`INSUFFICIENT_CONTEXT_REPLY`] as a single-segment
/// stream.
pub struct AnswerSynthesizer {
    model: Arc<dyn GenerationModel>,
    params: GenerationParams,
}

impl AnswerSynthesizer {
    /// Create a synthesizer with the default generation parameters.
    pub fn new(model: Arc<dyn GenerationModel>) -> Self {
        Self { model, params: GenerationParams::default() }
    }

    /// Override the generation parameters.
    pub fn with_params(mut self, params: GenerationParams) -> Self {
        self.params = params;
        self
    }

    /// Stream an answer for `query` grounded in `context`.
    ///
    /// # Errors
    ///
    /// Returns [`QaError::Generation`] if the generation service rejects the
    /// request. Stream items after the first may also carry generation
    /// errors.
    pub async fn synthesize(
        &self,
        query: &str,
        context: &RetrievedContext,
    ) -> Result<SegmentStream> {
        if context.is_empty() {
            debug!("empty context, yielding fixed reply without calling the model");
            let stream = futures::stream::once(async {
                Ok::<_, QaError>(INSUFFICIENT_CONTEXT_REPLY.to_string())
            });
            return Ok(Box::pin(stream));
        }

        let prompt = build_prompt(query, &context.text());
        debug!(
            model = self.model.name(),
            context_chars = context.char_count(),
            "requesting answer stream"
        );
        self.model.stream_completion(&prompt, self.params).await
    }
}
