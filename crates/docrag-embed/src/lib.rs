//! Embedding backends for docrag.
//!
//! - [`DashScopeEmbedder`]: remote text-embedding service over HTTP
//! - [`HashingEmbedder`]: deterministic offline backend for development and tests
//! - [`RetryingEmbedder`] / [`CachingEmbedder`]: transparent wrappers that keep
//!   the [`Embedder`](docrag_core::traits::Embedder) interface unchanged
//!
//! Set `APP_USE_FAKE_EMBEDDINGS=1` to force the hashing backend.

use std::sync::Arc;
use std::time::Duration;

use docrag_core::config::{BackendKind, EmbeddingSettings};
use docrag_core::traits::{AsyncEmbedder, EmbeddingBackend};
use docrag_core::{EmbeddingVector, Result};
use futures::{stream, StreamExt, TryStreamExt};
use tracing::info;

pub mod cache;
pub mod dashscope;
pub mod hashing;
pub mod retry;

pub use cache::CachingEmbedder;
pub use dashscope::{DashScopeEmbedder, DashScopeOptions};
pub use hashing::HashingEmbedder;
pub use retry::{RetryPolicy, RetryingEmbedder};

/// Compose the configured backend with its optional retry and cache wrappers.
pub fn build_embedder(settings: &EmbeddingSettings) -> Result<Arc<dyn EmbeddingBackend>> {
    let use_fake = docrag_core::config::use_fake_embeddings();
    if use_fake || settings.backend == BackendKind::Hashing {
        info!(dimension = settings.dimension, "using hashing embedder");
        let embedder = HashingEmbedder::new(settings.dimension);
        let backend: Arc<dyn EmbeddingBackend> = if settings.cache {
            Arc::new(CachingEmbedder::new(embedder))
        } else {
            Arc::new(embedder)
        };
        return Ok(backend);
    }

    let remote = DashScopeEmbedder::from_settings(settings)?;
    info!(model = %settings.model, dimension = settings.dimension, "using DashScope embedder");
    let policy = RetryPolicy {
        max_retries: settings.max_retries,
        initial_backoff: Duration::from_millis(settings.retry_backoff_ms),
    };
    let concurrency = settings.concurrency;
    let backend: Arc<dyn EmbeddingBackend> = match (settings.max_retries > 0, settings.cache) {
        (true, true) => Arc::new(
            CachingEmbedder::new(RetryingEmbedder::new(remote, policy).with_concurrency(concurrency))
                .with_concurrency(concurrency),
        ),
        (true, false) => Arc::new(RetryingEmbedder::new(remote, policy).with_concurrency(concurrency)),
        (false, true) => Arc::new(CachingEmbedder::new(remote).with_concurrency(concurrency)),
        (false, false) => Arc::new(remote),
    };
    Ok(backend)
}

/// Embed `texts` with up to `concurrency` calls in flight. Results come back
/// in input order and the first failure is tagged with its position.
pub(crate) async fn embed_in_order<E: AsyncEmbedder + ?Sized>(
    embedder: &E,
    texts: &[String],
    concurrency: usize,
) -> Result<Vec<EmbeddingVector>> {
    let calls: Vec<_> = texts
        .iter()
        .enumerate()
        .map(|(i, text)| async move { embedder.embed_one_async(text).await.map_err(|e| e.at_input(i)) })
        .collect();
    stream::iter(calls).buffered(concurrency.max(1)).try_collect().await
}
