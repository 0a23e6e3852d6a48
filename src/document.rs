//! Data types for documents, chunks, index points, and retrieval results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Separator placed between chunk texts when assembling a context.
///
/// Counted against the context character budget during assembly.
pub(crate) const CONTEXT_SEPARATOR: &str = "\n\n";

/// A source document supplied by the caller.
///
/// The core never persists raw documents, only the chunks derived from them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    /// Opaque identifier chosen by the caller.
    pub id: String,
    /// The full extracted text of the document, as a single UTF-8 string.
    pub text: String,
    /// Metadata about where the text came from.
    pub source: SourceMeta,
}

impl Document {
    /// Create a document with empty source metadata.
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self { id: id.into(), text: text.into(), source: SourceMeta::default() }
    }
}

/// Metadata about the origin of a [`Document`].
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SourceMeta {
    /// Original filename, if the document came from a file.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    /// When the document was uploaded or read.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uploaded_at: Option<DateTime<Utc>>,
}

/// A contiguous character window of a [`Document`].
///
/// Offsets are **character** offsets into the document text, not byte
/// offsets, so `end_offset - start_offset` always equals the chunk's
/// character count.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    /// Deterministic identifier, derived from `(document_id, index)`.
    pub id: Uuid,
    /// The text covered by this chunk.
    pub text: String,
    /// The id of the parent [`Document`].
    pub document_id: String,
    /// Position of this chunk within its document, starting at 0.
    pub index: usize,
    /// Character offset of the first character of `text` in the document.
    pub start_offset: usize,
    /// Character offset one past the last character of `text` in the document.
    pub end_offset: usize,
}

impl Chunk {
    /// Derive the deterministic id for a chunk of a document.
    ///
    /// The id is a UUIDv5 of `"{document_id}:{index}"` in a fixed namespace,
    /// so re-ingesting the same document with the same chunking parameters
    /// overwrites existing points instead of duplicating them.
    pub fn derive_id(document_id: &str, index: usize) -> Uuid {
        Uuid::new_v5(&Uuid::NAMESPACE_OID, format!("{document_id}:{index}").as_bytes())
    }

    /// Build the payload stored alongside this chunk's vector.
    pub fn payload(&self) -> ChunkPayload {
        ChunkPayload {
            text: self.text.clone(),
            document_id: self.document_id.clone(),
            chunk_index: self.index,
        }
    }
}

/// The payload stored with each indexed point.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChunkPayload {
    /// The chunk text.
    pub text: String,
    /// The id of the source document.
    pub document_id: String,
    /// Position of the chunk within its document.
    pub chunk_index: usize,
}

/// A vector point ready to be written to a [`VectorIndex`](crate::VectorIndex).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexPoint {
    /// Point id, equal to the chunk id it was derived from.
    pub id: Uuid,
    /// The embedding vector for the chunk text.
    pub vector: Vec<f32>,
    /// The stored payload.
    pub payload: ChunkPayload,
}

/// A retrieved point paired with its similarity score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    /// The id of the matching point.
    pub id: Uuid,
    /// Cosine similarity to the query vector (higher is more relevant).
    pub score: f32,
    /// The stored payload of the matching point.
    pub payload: ChunkPayload,
}

/// The ordered, length-bounded set of results handed to answer generation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RetrievedContext {
    /// Selected results in descending score order.
    pub results: Vec<SearchResult>,
}

impl RetrievedContext {
    /// An empty context. The synthesizer answers this with the fixed
    /// no-information reply instead of calling the generation service.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Whether no results were selected.
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Number of selected results.
    pub fn len(&self) -> usize {
        self.results.len()
    }

    /// The concatenated context text, in result order.
    pub fn text(&self) -> String {
        let texts: Vec<&str> = self.results.iter().map(|r| r.payload.text.as_str()).collect();
        texts.join(CONTEXT_SEPARATOR)
    }

    /// Character count of [`text()`](RetrievedContext::text), separators included.
    pub fn char_count(&self) -> usize {
        let text_chars: usize =
            self.results.iter().map(|r| r.payload.text.chars().count()).sum();
        let separators = self.results.len().saturating_sub(1) * CONTEXT_SEPARATOR.len();
        text_chars + separators
    }
}

/// Summary of one document ingestion.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IngestReport {
    /// The id of the document that was ingested.
    pub document_id: String,
    /// How many chunks were stored.
    pub chunk_count: usize,
    /// Character count of the document text.
    pub char_count: usize,
    /// Whether ingestion was skipped because the document had no text.
    pub skipped: bool,
}
