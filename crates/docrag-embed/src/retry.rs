//! Bounded retry with exponential backoff around any embedder.
//!
//! Only transient failures are retried (transport errors, timeouts, 429 and
//! 5xx). Length mismatches, 4xx and empty input fail immediately.

use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use docrag_core::traits::{AsyncEmbedder, Embedder, EmbeddingModel};
use docrag_core::{EmbeddingVector, Result};

const MAX_BACKOFF: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_retries: 3, initial_backoff: Duration::from_millis(500) }
    }
}

impl RetryPolicy {
    fn backoff(&self, attempt: u32) -> Duration {
        self.initial_backoff
            .checked_mul(2u32.saturating_pow(attempt))
            .unwrap_or(MAX_BACKOFF)
            .min(MAX_BACKOFF)
    }
}

#[derive(Debug)]
pub struct RetryingEmbedder<E> {
    inner: E,
    policy: RetryPolicy,
    concurrency: usize,
}

impl<E> RetryingEmbedder<E> {
    pub fn new(inner: E, policy: RetryPolicy) -> Self {
        Self { inner, policy, concurrency: 1 }
    }

    /// Calls in flight for async batches; each call retries on its own.
    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn inner(&self) -> &E {
        &self.inner
    }
}

impl<E: EmbeddingModel> EmbeddingModel for RetryingEmbedder<E> {
    fn model_id(&self) -> &str {
        self.inner.model_id()
    }

    fn dimension(&self) -> usize {
        self.inner.dimension()
    }
}

impl<E: Embedder> Embedder for RetryingEmbedder<E> {
    fn embed_one(&self, text: &str) -> Result<EmbeddingVector> {
        let mut attempt = 0;
        loop {
            match self.inner.embed_one(text) {
                Err(e) if e.is_transient() && attempt < self.policy.max_retries => {
                    let delay = self.policy.backoff(attempt);
                    warn!(attempt = attempt + 1, ?delay, error = %e, "retrying embedding call");
                    std::thread::sleep(delay);
                    attempt += 1;
                }
                other => return other,
            }
        }
    }
}

#[async_trait]
impl<E: AsyncEmbedder> AsyncEmbedder for RetryingEmbedder<E> {
    async fn embed_one_async(&self, text: &str) -> Result<EmbeddingVector> {
        let mut attempt = 0;
        loop {
            match self.inner.embed_one_async(text).await {
                Err(e) if e.is_transient() && attempt < self.policy.max_retries => {
                    let delay = self.policy.backoff(attempt);
                    warn!(attempt = attempt + 1, ?delay, error = %e, "retrying embedding call");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                other => return other,
            }
        }
    }

    async fn embed_many_async(&self, texts: &[String]) -> Result<Vec<EmbeddingVector>> {
        crate::embed_in_order(self, texts, self.concurrency).await
    }
}
