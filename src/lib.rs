//! # docqa
//!
//! Document question answering over a vector index: chunk, embed, store,
//! retrieve, and stream grounded answers.
//!
//! ## Overview
//!
//! Two pipelines cover the full lifecycle:
//!
//! - [`IngestionPipeline`] - chunk a document, embed the chunks, store them
//! - [`QueryPipeline`] - retrieve a context for a question and stream a
//!   grounded answer
//!
//! Each stage sits behind a trait so backends can be swapped:
//!
//! - [`Chunker`] - [`CharWindowChunker`] splits text into overlapping
//!   character windows
//! - [`Embedder`] - [`OpenAIEmbedder`] for OpenAI-compatible embedding
//!   endpoints, [`MockEmbedder`] for tests
//! - [`VectorIndex`] - [`QdrantIndex`] over gRPC, [`InMemoryIndex`] for tests
//! - [`GenerationModel`] - [`OpenAIChatModel`] for OpenAI-compatible chat
//!   APIs, [`MockGenerator`] for tests
//!
//! ## Quick Start
//!
//! ### Ingest
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use docqa::{Document, IngestionPipeline, OpenAIEmbedder, QaConfig, QdrantIndex};
//!
//! let config = QaConfig::from_env()?;
//! let embedder = Arc::new(OpenAIEmbedder::new(api_key, &config.embedding_model, 384)?);
//! let index = Arc::new(QdrantIndex::new("http://localhost:6334")?);
//!
//! let pipeline = IngestionPipeline::builder()
//!     .config(config)
//!     .embedder(embedder)
//!     .index(index)
//!     .build()?;
//! let report = pipeline.ingest(&Document::new("manual", text)).await?;
//! println!("{} chunk(s) indexed", report.chunk_count);
//! ```
//!
//! ### Ask
//!
//! ```rust,ignore
//! use futures::StreamExt;
//! use docqa::{OpenAIChatModel, QueryPipeline};
//!
//! let pipeline = QueryPipeline::builder()
//!     .config(config)
//!     .embedder(embedder)
//!     .index(index)
//!     .model(Arc::new(OpenAIChatModel::new(llm_key, "gpt-4o-mini")))
//!     .build()?;
//!
//! let mut answer = pipeline.answer("what does the warranty cover?").await?;
//! while let Some(segment) = answer.stream.next().await {
//!     print!("{}", segment?);
//! }
//! ```
//!
//! ## Features
//!
//! - Deterministic chunk ids, so re-ingesting a document overwrites its
//!   chunks in place
//! - Context assembly bounded by a configurable character budget
//! - Bounded retries around vector storage writes
//! - Streamed answers with a fixed reply when the context is insufficient

pub mod chunking;
pub mod config;
pub mod document;
pub mod embedding;
pub mod error;
pub mod generation;
pub mod inmemory;
pub mod mock;
pub mod openai;
pub mod pipeline;
pub mod qdrant;
pub mod retriever;
pub mod synthesizer;
pub mod vectorstore;

pub use chunking::{CharWindowChunker, Chunker};
pub use config::{QaConfig, QaConfigBuilder};
pub use document::{
    Chunk, ChunkPayload, Document, IndexPoint, IngestReport, RetrievedContext, SearchResult,
    SourceMeta,
};
pub use embedding::Embedder;
pub use error::{QaError, Result};
pub use generation::{GenerationModel, GenerationParams, SegmentStream};
pub use inmemory::InMemoryIndex;
pub use mock::{MockEmbedder, MockGenerator};
pub use openai::{OpenAIChatModel, OpenAIEmbedder};
pub use pipeline::{
    GroundedAnswer, IngestionPipeline, IngestionPipelineBuilder, QueryPipeline,
    QueryPipelineBuilder,
};
pub use qdrant::QdrantIndex;
pub use retriever::Retriever;
pub use synthesizer::{AnswerSynthesizer, INSUFFICIENT_CONTEXT_REPLY};
pub use vectorstore::{DistanceMetric, VectorIndex};
