//! DashScope text-embedding backend.
//!
//! One request per input text:
//! `{"model", "input": {"texts": [..]}, "parameters": {"dimension", "output_type": "dense"}}`.
//! A successful reply carries `output.embeddings[0].embedding`; failures carry
//! `{code, message}` with a non-2xx status.

use std::fmt;
use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use docrag_core::config::EmbeddingSettings;
use docrag_core::traits::{ensure_non_empty, ensure_vector_len, AsyncEmbedder, Embedder, EmbeddingModel};
use docrag_core::{EmbeddingVector, Error, Result};

#[derive(Clone)]
pub struct DashScopeOptions {
    pub endpoint: String,
    pub api_key: String,
    pub model: String,
    pub dimension: usize,
    pub timeout: Duration,
    /// In-flight requests for async batches.
    pub concurrency: usize,
}

impl fmt::Debug for DashScopeOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DashScopeOptions")
            .field("endpoint", &self.endpoint)
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("dimension", &self.dimension)
            .field("timeout", &self.timeout)
            .field("concurrency", &self.concurrency)
            .finish()
    }
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: EmbedInput<'a>,
    parameters: EmbedParameters,
}

#[derive(Serialize)]
struct EmbedInput<'a> {
    texts: Vec<&'a str>,
}

#[derive(Serialize)]
struct EmbedParameters {
    dimension: usize,
    output_type: &'static str,
}

#[derive(Deserialize)]
struct EmbedResponse {
    output: Option<EmbedOutput>,
}

#[derive(Deserialize)]
struct EmbedOutput {
    embeddings: Vec<EmbeddingItem>,
}

#[derive(Deserialize)]
struct EmbeddingItem {
    embedding: Vec<f32>,
}

#[derive(Deserialize, Default)]
struct ErrorBody {
    code: Option<String>,
    message: Option<String>,
}

#[derive(Debug)]
pub struct DashScopeEmbedder {
    options: DashScopeOptions,
    client: reqwest::Client,
    blocking: OnceLock<reqwest::blocking::Client>,
}

impl DashScopeEmbedder {
    pub fn new(options: DashScopeOptions) -> Result<Self> {
        if options.dimension == 0 {
            return Err(Error::InvalidConfig("embedding dimension must be greater than 0".into()));
        }
        let client = reqwest::Client::builder()
            .timeout(options.timeout)
            .build()
            .map_err(|e| Error::InvalidConfig(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            options: DashScopeOptions { concurrency: options.concurrency.max(1), ..options },
            client,
            blocking: OnceLock::new(),
        })
    }

    /// Build from settings, reading the API key from `settings.api_key_env`.
    pub fn from_settings(settings: &EmbeddingSettings) -> Result<Self> {
        let api_key = std::env::var(&settings.api_key_env).map_err(|_| {
            Error::InvalidConfig(format!("environment variable {} is not set", settings.api_key_env))
        })?;
        Self::new(DashScopeOptions {
            endpoint: settings.endpoint.clone(),
            api_key,
            model: settings.model.clone(),
            dimension: settings.dimension,
            timeout: Duration::from_secs(settings.timeout_secs),
            concurrency: settings.concurrency,
        })
    }

    fn request<'a>(&'a self, text: &'a str) -> EmbedRequest<'a> {
        EmbedRequest {
            model: &self.options.model,
            input: EmbedInput { texts: vec![text] },
            parameters: EmbedParameters { dimension: self.options.dimension, output_type: "dense" },
        }
    }

    // The blocking client owns a runtime thread; create it only when a sync
    // caller actually needs it.
    fn blocking_client(&self) -> Result<&reqwest::blocking::Client> {
        if let Some(client) = self.blocking.get() {
            return Ok(client);
        }
        let client = reqwest::blocking::Client::builder()
            .timeout(self.options.timeout)
            .build()
            .map_err(transport_error)?;
        Ok(self.blocking.get_or_init(|| client))
    }

    fn decode(&self, status: u16, body: &str) -> Result<EmbeddingVector> {
        if !(200..300).contains(&status) {
            let err: ErrorBody = serde_json::from_str(body).unwrap_or_default();
            let message = match (err.code, err.message) {
                (Some(code), Some(message)) => format!("{code}: {message}"),
                (None, Some(message)) => message,
                (Some(code), None) => code,
                (None, None) => body.chars().take(200).collect(),
            };
            return Err(Error::embedding(Some(status), message));
        }
        let parsed: EmbedResponse = serde_json::from_str(body)
            .map_err(|e| Error::embedding(Some(status), format!("malformed response: {e}")))?;
        let vector = parsed
            .output
            .and_then(|o| o.embeddings.into_iter().next())
            .map(|item| item.embedding)
            .ok_or_else(|| Error::embedding(Some(status), "response contained no embedding"))?;
        ensure_vector_len(vector, self.options.dimension, Some(status))
    }
}

fn transport_error(e: reqwest::Error) -> Error {
    let kind = if e.is_timeout() { "request timed out" } else { "request failed" };
    Error::embedding(e.status().map(|s| s.as_u16()), format!("{kind}: {e}"))
}

impl EmbeddingModel for DashScopeEmbedder {
    fn model_id(&self) -> &str {
        &self.options.model
    }

    fn dimension(&self) -> usize {
        self.options.dimension
    }
}

impl Embedder for DashScopeEmbedder {
    /// Blocking call. Must not be used from inside an async runtime; use
    /// [`AsyncEmbedder::embed_one_async`] there.
    fn embed_one(&self, text: &str) -> Result<EmbeddingVector> {
        ensure_non_empty(text)?;
        let response = self
            .blocking_client()?
            .post(&self.options.endpoint)
            .bearer_auth(&self.options.api_key)
            .json(&self.request(text))
            .send()
            .map_err(transport_error)?;
        let status = response.status().as_u16();
        let body = response.text().map_err(transport_error)?;
        debug!(status, chars = text.chars().count(), "embedding response");
        self.decode(status, &body)
    }
}

#[async_trait]
impl AsyncEmbedder for DashScopeEmbedder {
    async fn embed_one_async(&self, text: &str) -> Result<EmbeddingVector> {
        ensure_non_empty(text)?;
        let response = self
            .client
            .post(&self.options.endpoint)
            .bearer_auth(&self.options.api_key)
            .json(&self.request(text))
            .send()
            .await
            .map_err(transport_error)?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(transport_error)?;
        debug!(status, chars = text.chars().count(), "embedding response");
        self.decode(status, &body)
    }

    /// Up to `concurrency` requests in flight; results come back in input order.
    async fn embed_many_async(&self, texts: &[String]) -> Result<Vec<EmbeddingVector>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        crate::embed_in_order(self, texts, self.options.concurrency).await
    }
}
