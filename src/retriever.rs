//! Query-side retrieval: embed, search, and assemble a bounded context.

use std::sync::Arc;

use tracing::{debug, info};

use crate::config::QaConfig;
use crate::document::{RetrievedContext, SearchResult, CONTEXT_SEPARATOR};
use crate::embedding::Embedder;
use crate::error::{QaError, Result};
use crate::vectorstore::{DistanceMetric, VectorIndex};

/// Retrieves the most relevant chunks for a query and assembles them into a
/// length-bounded context.
///
/// The retriever uses the same embedder that populated the index; if the
/// embedder returns a vector that does not match its declared dimensionality,
/// retrieval fails with a configuration error before any search is issued.
pub struct Retriever {
    config: QaConfig,
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
}

impl Retriever {
    /// Create a new retriever over the given embedder and index.
    pub fn new(config: QaConfig, embedder: Arc<dyn Embedder>, index: Arc<dyn VectorIndex>) -> Self {
        Self { config, embedder, index }
    }

    /// Return a reference to the retriever configuration.
    pub fn config(&self) -> &QaConfig {
        &self.config
    }

    /// Search for the `top_k` chunks most similar to `query`.
    ///
    /// Returns ranked results without applying the context character budget.
    /// If the collection does not exist yet it is created empty and the
    /// search is retried once, yielding no results.
    pub async fn search(&self, query: &str) -> Result<Vec<SearchResult>> {
        debug!(query_chars = query.chars().count(), "embedding query");
        let vector = self.embedder.embed_one(query).await?;
        if vector.len() != self.embedder.dimensions() {
            return Err(QaError::Config(format!(
                "embedding model '{}' returned dimension {}, expected {}",
                self.embedder.model_id(),
                vector.len(),
                self.embedder.dimensions()
            )));
        }

        let collection = self.config.collection.as_str();
        let results = match self
            .index
            .search(collection, &vector, self.config.top_k, self.config.score_threshold)
            .await
        {
            Err(QaError::CollectionNotFound { .. }) => {
                debug!(collection, "collection absent, creating before retrying search");
                self.index
                    .ensure_collection(
                        collection,
                        self.embedder.dimensions(),
                        DistanceMetric::Cosine,
                    )
                    .await?;
                self.index
                    .search(collection, &vector, self.config.top_k, self.config.score_threshold)
                    .await?
            }
            other => other?,
        };

        debug!(result_count = results.len(), "search completed");
        Ok(results)
    }

    /// Retrieve a context for `query`: search, then greedily take results in
    /// descending score order until `max_context_chars` would be exceeded.
    ///
    /// Separator characters between entries count against the budget. An
    /// empty context is a valid outcome, not an error; the synthesizer
    /// answers it with the fixed no-information reply.
    pub async fn retrieve(&self, query: &str) -> Result<RetrievedContext> {
        let results = self.search(query).await?;

        let mut selected = Vec::new();
        let mut used_chars = 0usize;
        for result in results {
            let text_chars = result.payload.text.chars().count();
            let needed = if selected.is_empty() {
                text_chars
            } else {
                text_chars + CONTEXT_SEPARATOR.len()
            };
            if used_chars + needed > self.config.max_context_chars {
                break;
            }
            used_chars += needed;
            selected.push(result);
        }

        info!(
            result_count = selected.len(),
            context_chars = used_chars,
            "context assembled"
        );
        Ok(RetrievedContext { results: selected })
    }
}
