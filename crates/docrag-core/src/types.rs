//! Domain types shared by the chunker, the index and the retrieval path.

use serde::{Deserialize, Serialize};

/// Dense embedding produced by one model; its length is the model's dimension.
pub type EmbeddingVector = Vec<f32>;

/// One ingested text file.
///
/// - `id`: short content digest, stable across rebuilds of unchanged text
/// - `text`: full UTF-8 body
/// - `source`: provenance identifier surfaced for citation (path relative
///   to the source directory)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub text: String,
    pub source: String,
}

impl Document {
    pub fn new(text: impl Into<String>, source: impl Into<String>) -> Self {
        let text = text.into();
        let digest = blake3::hash(text.as_bytes()).to_hex();
        Self { id: digest[..16].to_string(), text, source: source.into() }
    }
}

/// A contiguous slice of one document's text.
///
/// `sequence_index` is the chunk's position within its document and `start`
/// is the character offset where `text` begins in the document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub text: String,
    pub source: String,
    pub sequence_index: usize,
    #[serde(default)]
    pub start: usize,
}

/// A vector paired with the chunk it was computed from.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexEntry {
    pub vector: EmbeddingVector,
    pub chunk: Chunk,
}

impl IndexEntry {
    pub fn new(vector: EmbeddingVector, chunk: Chunk) -> Self {
        Self { vector, chunk }
    }
}
