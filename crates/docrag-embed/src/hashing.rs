//! Feature-hashing embedder. Each token is hashed into one of `dimension`
//! buckets and the resulting bag is L2-normalised, so equal texts always map
//! to equal vectors and texts sharing words land close together.

use std::hash::{Hash, Hasher};

use async_trait::async_trait;
use twox_hash::XxHash64;

use docrag_core::traits::{ensure_non_empty, AsyncEmbedder, Embedder, EmbeddingModel};
use docrag_core::{EmbeddingVector, Error, Result};

#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dim: usize,
    model: String,
}

impl HashingEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim, model: format!("hashing-xxh64-d{dim}") }
    }

    fn embed(&self, text: &str) -> Result<EmbeddingVector> {
        ensure_non_empty(text)?;
        if self.dim == 0 {
            return Err(Error::InvalidConfig("hashing embedder needs a dimension greater than 0".into()));
        }
        let mut v = vec![0f32; self.dim];
        let lowered = text.to_lowercase();
        let mut tokens: Vec<&str> = lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .collect();
        if tokens.is_empty() {
            tokens.push(lowered.trim());
        }
        for token in tokens {
            let mut hasher = XxHash64::with_seed(0);
            token.hash(&mut hasher);
            let h = hasher.finish();
            let idx = (h % self.dim as u64) as usize;
            let val = 0.5 + ((h >> 32) as u32) as f32 / u32::MAX as f32;
            v[idx] += val;
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt().max(1e-6);
        for x in &mut v {
            *x /= norm;
        }
        Ok(v)
    }
}

impl EmbeddingModel for HashingEmbedder {
    fn model_id(&self) -> &str {
        &self.model
    }

    fn dimension(&self) -> usize {
        self.dim
    }
}

impl Embedder for HashingEmbedder {
    fn embed_one(&self, text: &str) -> Result<EmbeddingVector> {
        self.embed(text)
    }
}

#[async_trait]
impl AsyncEmbedder for HashingEmbedder {
    async fn embed_one_async(&self, text: &str) -> Result<EmbeddingVector> {
        self.embed(text)
    }
}
