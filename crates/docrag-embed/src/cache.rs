//! Transparent in-memory embedding cache keyed by `blake3(model, text)`.
//!
//! The cache holds at most `capacity` vectors. Once full, new results are
//! returned but not stored; nothing is evicted.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;

use docrag_core::traits::{AsyncEmbedder, Embedder, EmbeddingModel};
use docrag_core::{EmbeddingVector, Result};

pub const DEFAULT_CAPACITY: usize = 100_000;

#[derive(Debug)]
pub struct CachingEmbedder<E> {
    inner: E,
    entries: Mutex<HashMap<[u8; 32], EmbeddingVector>>,
    capacity: usize,
    concurrency: usize,
}

impl<E: EmbeddingModel> CachingEmbedder<E> {
    pub fn new(inner: E) -> Self {
        Self { inner, entries: Mutex::new(HashMap::new()), capacity: DEFAULT_CAPACITY, concurrency: 1 }
    }

    #[must_use]
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Calls in flight for async batches.
    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn inner(&self) -> &E {
        &self.inner
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    fn key(&self, text: &str) -> [u8; 32] {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.inner.model_id().as_bytes());
        hasher.update(&[0]);
        hasher.update(text.as_bytes());
        *hasher.finalize().as_bytes()
    }

    fn lookup(&self, key: &[u8; 32]) -> Option<EmbeddingVector> {
        self.entries.lock().get(key).cloned()
    }

    fn store(&self, key: [u8; 32], vector: &EmbeddingVector) {
        let mut entries = self.entries.lock();
        if entries.len() < self.capacity {
            entries.insert(key, vector.clone());
        }
    }
}

impl<E: EmbeddingModel> EmbeddingModel for CachingEmbedder<E> {
    fn model_id(&self) -> &str {
        self.inner.model_id()
    }

    fn dimension(&self) -> usize {
        self.inner.dimension()
    }
}

impl<E: Embedder> Embedder for CachingEmbedder<E> {
    fn embed_one(&self, text: &str) -> Result<EmbeddingVector> {
        let key = self.key(text);
        if let Some(hit) = self.lookup(&key) {
            return Ok(hit);
        }
        let vector = self.inner.embed_one(text)?;
        self.store(key, &vector);
        Ok(vector)
    }
}

#[async_trait]
impl<E: AsyncEmbedder> AsyncEmbedder for CachingEmbedder<E> {
    async fn embed_one_async(&self, text: &str) -> Result<EmbeddingVector> {
        let key = self.key(text);
        if let Some(hit) = self.lookup(&key) {
            return Ok(hit);
        }
        let vector = self.inner.embed_one_async(text).await?;
        self.store(key, &vector);
        Ok(vector)
    }

    async fn embed_many_async(&self, texts: &[String]) -> Result<Vec<EmbeddingVector>> {
        crate::embed_in_order(self, texts, self.concurrency).await
    }
}
