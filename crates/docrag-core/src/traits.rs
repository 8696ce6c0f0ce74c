//! Embedding interface. Callers depend on these traits only; each backend
//! (remote service, local hashing) provides one implementation.

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::types::EmbeddingVector;

/// Identity of an embedding configuration: which model, which vector length.
pub trait EmbeddingModel: Send + Sync {
    /// Stable model identifier recorded in persisted manifests.
    fn model_id(&self) -> &str;
    /// Length of every vector this embedder returns.
    fn dimension(&self) -> usize;
}

/// Blocking embedding calls, used by batch builds and CLI callers.
pub trait Embedder: EmbeddingModel {
    fn embed_one(&self, text: &str) -> Result<EmbeddingVector>;

    /// Embed each input independently, preserving input order. The first
    /// failure aborts the batch and is tagged with the failing position.
    fn embed_many(&self, texts: &[String]) -> Result<Vec<EmbeddingVector>> {
        texts
            .iter()
            .enumerate()
            .map(|(i, text)| self.embed_one(text).map_err(|e| e.at_input(i)))
            .collect()
    }
}

/// Non-blocking embedding calls for the interactive query path and for
/// backends that fan requests out concurrently.
#[async_trait]
pub trait AsyncEmbedder: EmbeddingModel {
    async fn embed_one_async(&self, text: &str) -> Result<EmbeddingVector>;

    async fn embed_many_async(&self, texts: &[String]) -> Result<Vec<EmbeddingVector>> {
        let mut out = Vec::with_capacity(texts.len());
        for (i, text) in texts.iter().enumerate() {
            out.push(self.embed_one_async(text).await.map_err(|e| e.at_input(i))?);
        }
        Ok(out)
    }
}

/// A backend usable from both sync and async callers.
pub trait EmbeddingBackend: Embedder + AsyncEmbedder {}

impl<T: Embedder + AsyncEmbedder + ?Sized> EmbeddingBackend for T {}

/// Reject blank input before any backend work.
pub fn ensure_non_empty(text: &str) -> Result<()> {
    if text.trim().is_empty() {
        return Err(Error::EmptyInput { input_index: None });
    }
    Ok(())
}

/// A vector coming back from a backend must have exactly the configured
/// length; anything else is an upstream fault, never padded or truncated.
/// `status` is the upstream status of the response that carried the vector.
pub fn ensure_vector_len(
    vector: EmbeddingVector,
    dimension: usize,
    status: Option<u16>,
) -> Result<EmbeddingVector> {
    if vector.len() != dimension {
        return Err(Error::embedding(
            status,
            format!("service returned a vector of length {}, expected {dimension}", vector.len()),
        ));
    }
    Ok(vector)
}
