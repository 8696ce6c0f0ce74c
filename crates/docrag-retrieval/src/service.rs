use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use docrag_core::traits::{AsyncEmbedder, Embedder, EmbeddingModel};
use docrag_core::{Error, Result};
use docrag_vector::VectorIndex;

pub const DEFAULT_K: usize = 3;

/// One ranked result with the provenance needed for citation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievedChunk {
    pub text: String,
    pub source: String,
    pub distance: f32,
    pub sequence_index: usize,
}

/// Answers top-k queries against one read-only index.
///
/// The index is shared behind an `Arc` and never mutated, so a service (or
/// clones of it) can serve concurrent queries.
pub struct RetrievalService<E: ?Sized> {
    index: Arc<VectorIndex>,
    embedder: Arc<E>,
    default_k: usize,
}

impl<E: ?Sized> Clone for RetrievalService<E> {
    fn clone(&self) -> Self {
        Self { index: Arc::clone(&self.index), embedder: Arc::clone(&self.embedder), default_k: self.default_k }
    }
}

impl<E: EmbeddingModel + ?Sized> RetrievalService<E> {
    /// Pair an already loaded index with an embedder. Both must agree on
    /// dimension and model.
    pub fn new(index: Arc<VectorIndex>, embedder: Arc<E>) -> Result<Self> {
        if index.dimension() != embedder.dimension() {
            return Err(Error::DimensionMismatch {
                expected: embedder.dimension(),
                actual: index.dimension(),
                context: "loaded index",
            });
        }
        if index.model() != embedder.model_id() {
            return Err(Error::ModelMismatch {
                persisted: index.model().to_string(),
                configured: embedder.model_id().to_string(),
            });
        }
        Ok(Self { index, embedder, default_k: DEFAULT_K })
    }

    /// Load the index persisted at `persist_dir`, validated against `embedder`.
    pub fn open(persist_dir: &Path, embedder: Arc<E>) -> Result<Self> {
        let index = VectorIndex::load(persist_dir, embedder.model_id(), embedder.dimension())?;
        Self::new(Arc::new(index), embedder)
    }

    #[must_use]
    pub fn with_default_k(mut self, k: usize) -> Self {
        self.default_k = k;
        self
    }

    pub fn default_k(&self) -> usize {
        self.default_k
    }

    pub fn index(&self) -> &VectorIndex {
        &self.index
    }

    fn rank(&self, query: &str, vector: &[f32], k: usize) -> Result<Vec<RetrievedChunk>> {
        let hits = self.index.search(vector, k)?;
        debug!(query, k, hits = hits.len(), "retrieved");
        Ok(hits
            .into_iter()
            .map(|hit| RetrievedChunk {
                text: hit.chunk.text,
                source: hit.chunk.source,
                distance: hit.distance,
                sequence_index: hit.chunk.sequence_index,
            })
            .collect())
    }
}

impl<E: Embedder + ?Sized> RetrievalService<E> {
    /// Top-`k` chunks for `query`, nearest first.
    pub fn retrieve(&self, query: &str, k: usize) -> Result<Vec<RetrievedChunk>> {
        let query = checked_query(query)?;
        let vector = self.embedder.embed_one(query)?;
        self.rank(query, &vector, k)
    }

    pub fn retrieve_default(&self, query: &str) -> Result<Vec<RetrievedChunk>> {
        self.retrieve(query, self.default_k)
    }
}

impl<E: AsyncEmbedder + ?Sized> RetrievalService<E> {
    pub async fn retrieve_async(&self, query: &str, k: usize) -> Result<Vec<RetrievedChunk>> {
        let query = checked_query(query)?;
        let vector = self.embedder.embed_one_async(query).await?;
        self.rank(query, &vector, k)
    }
}

fn checked_query(query: &str) -> Result<&str> {
    let trimmed = query.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidQuery("query is empty".into()));
    }
    Ok(trimmed)
}
