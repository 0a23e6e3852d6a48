//! Document chunking.
//!
//! This module provides the [`Chunker`] trait and [`CharWindowChunker`],
//! which splits text into overlapping fixed-size character windows.

use crate::document::{Chunk, Document};
use crate::error::{QaError, Result};

/// A strategy for splitting documents into chunks.
///
/// Implementations produce [`Chunk`]s with text and character offsets.
/// Embeddings are attached later by the ingestion pipeline.
pub trait Chunker: Send + Sync {
    /// Split a document into chunks.
    ///
    /// Returns an empty `Vec` if the document has empty text; the pipeline
    /// treats that as a skipped ingestion, not an error.
    fn chunk(&self, document: &Document) -> Vec<Chunk>;
}

/// Splits text into fixed-size chunks by character count with configurable overlap.
///
/// Window `i` starts at character offset `i * (chunk_size - chunk_overlap)`
/// and spans `chunk_size` characters, clipped at the end of the text.
/// Stepping stops once a window reaches the end, so text no longer than
/// `chunk_size` yields exactly one chunk. Boundaries are character-offset
/// based, not token- or sentence-aware; chunks may split mid-word.
///
/// # Example
///
/// ```rust,ignore
/// use docqa::CharWindowChunker;
///
/// let chunker = CharWindowChunker::new(500, 100)?;
/// let chunks = chunker.chunk(&document);
/// ```
#[derive(Debug, Clone)]
pub struct CharWindowChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl CharWindowChunker {
    /// Create a new `CharWindowChunker`.
    ///
    /// # Errors
    ///
    /// Returns [`QaError::Config`] if `chunk_size == 0` or
    /// `chunk_overlap >= chunk_size` (the window would never advance).
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(QaError::Config("chunk_size must be greater than zero".to_string()));
        }
        if chunk_overlap >= chunk_size {
            return Err(QaError::Config(format!(
                "chunk_overlap ({chunk_overlap}) must be less than chunk_size ({chunk_size})"
            )));
        }
        Ok(Self { chunk_size, chunk_overlap })
    }
}

impl Chunker for CharWindowChunker {
    fn chunk(&self, document: &Document) -> Vec<Chunk> {
        let chars: Vec<char> = document.text.chars().collect();
        if chars.is_empty() {
            return Vec::new();
        }

        let step = self.chunk_size - self.chunk_overlap;
        let mut chunks = Vec::new();
        let mut start = 0;
        let mut index = 0;

        loop {
            let end = (start + self.chunk_size).min(chars.len());
            let text: String = chars[start..end].iter().collect();

            chunks.push(Chunk {
                id: Chunk::derive_id(&document.id, index),
                text,
                document_id: document.id.clone(),
                index,
                start_offset: start,
                end_offset: end,
            });

            if end == chars.len() {
                break;
            }
            index += 1;
            start += step;
        }

        chunks
    }
}
