//! Core data models used throughout Lorebase.
//!
//! These types represent the documents, chunks, and conversation turns that
//! flow through the ingestion and query pipelines.

use serde::{Deserialize, Serialize};

/// Raw text produced by the extraction collaborator, before normalization.
///
/// Immutable once produced. Also the payload of the extraction cache
/// artifact, hence the serde derives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawDocument {
    /// Source identifier (the document's path within the corpus).
    pub source: String,
    /// Raw extracted text.
    pub text: String,
}

/// A bounded segment of normalized text, the unit of retrieval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Segment text, at most `chunking.max_chars` bytes.
    pub content: String,
    /// Source identifier of the originating document.
    pub source: String,
    /// Byte offset of this segment within the normalized document text.
    /// Strictly increasing across a document's chunks.
    pub start_offset: usize,
}

/// A chunk returned from the index together with its similarity score.
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f32,
}

/// One committed question/answer turn in a conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exchange {
    pub question: String,
    pub answer: String,
}
