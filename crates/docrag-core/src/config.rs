//! Layered configuration and path helpers.
//!
//! Uses Figment to merge built-in defaults, `config.toml`,
//! `config.<env>.toml` and `APP_*` environment variables (nested keys are
//! separated by `__`, e.g. `APP_EMBEDDING__DIMENSION=768`).

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::chunker::ChunkingConfig;
use crate::error::Error;

pub const DEFAULT_MODEL: &str = "text-embedding-v4";
pub const DEFAULT_DIMENSION: usize = 1024;
pub const DEFAULT_ENDPOINT: &str =
    "https://dashscope.aliyuncs.com/api/v1/services/embeddings/text-embedding/text-embedding";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Remote DashScope text-embedding service.
    Dashscope,
    /// Local feature-hashing embedder; deterministic, offline.
    Hashing,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub backend: BackendKind,
    pub model: String,
    pub dimension: usize,
    pub endpoint: String,
    /// Name of the environment variable holding the API key.
    pub api_key_env: String,
    pub timeout_secs: u64,
    /// Retries on transient failures; 0 disables the retry wrapper.
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
    /// Concurrent requests in async batches. Output order never changes.
    pub concurrency: usize,
    /// Wrap the backend in an in-memory content-hash cache.
    pub cache: bool,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            backend: BackendKind::Dashscope,
            model: DEFAULT_MODEL.to_string(),
            dimension: DEFAULT_DIMENSION,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            api_key_env: "DASHSCOPE_API_KEY".to_string(),
            timeout_secs: 30,
            max_retries: 0,
            retry_backoff_ms: 500,
            concurrency: 1,
            cache: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexSettings {
    pub source_directory: String,
    pub persist_directory: String,
    /// File extensions (without the dot) eligible for ingestion.
    pub extensions: Vec<String>,
    /// Ingest only the first N documents in enumeration order.
    pub max_documents: Option<usize>,
    /// Directory relative `source_directory`/`persist_directory` resolve
    /// against. Unset means the working directory.
    pub base_directory: Option<String>,
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self {
            source_directory: "notion_md".to_string(),
            persist_directory: "faiss_storage".to_string(),
            extensions: vec!["md".to_string()],
            max_documents: None,
            base_directory: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    pub k: usize,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self { k: 3 }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub embedding: EmbeddingSettings,
    pub chunking: ChunkingConfig,
    pub index: IndexSettings,
    pub retrieval: RetrievalSettings,
}

impl Settings {
    /// Load using `RUST_ENV` (default `dev`) to pick the overlay file.
    pub fn load() -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());
        Self::load_for_env(&env_name)
    }

    pub fn load_for_env(env_name: &str) -> anyhow::Result<Self> {
        let settings: Settings = Self::figment_for_env(env_name)
            .extract()
            .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn figment_for_env(env_name: &str) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file("config.toml"));
        match env_name {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));
        if use_fake_embeddings() {
            figment = figment.merge(Serialized::default("embedding.backend", BackendKind::Hashing));
        }
        figment
    }

    pub fn validate(&self) -> Result<(), Error> {
        self.chunking.validate()?;
        if self.embedding.dimension == 0 {
            return Err(Error::InvalidConfig("embedding.dimension must be greater than 0".into()));
        }
        if self.embedding.model.trim().is_empty() {
            return Err(Error::InvalidConfig("embedding.model must not be empty".into()));
        }
        if self.embedding.concurrency == 0 {
            return Err(Error::InvalidConfig("embedding.concurrency must be at least 1".into()));
        }
        if self.retrieval.k == 0 {
            return Err(Error::InvalidConfig("retrieval.k must be greater than 0".into()));
        }
        if self.index.extensions.is_empty() {
            return Err(Error::InvalidConfig("index.extensions must list at least one extension".into()));
        }
        Ok(())
    }

    pub fn source_directory(&self) -> PathBuf {
        self.index_path(&self.index.source_directory)
    }

    pub fn persist_directory(&self) -> PathBuf {
        self.index_path(&self.index.persist_directory)
    }

    fn index_path(&self, path: &str) -> PathBuf {
        match &self.index.base_directory {
            Some(base) => resolve_with_base(&expand_path(base), path),
            None => expand_path(path),
        }
    }
}

/// `APP_USE_FAKE_EMBEDDINGS=1|true` forces the offline hashing backend.
pub fn use_fake_embeddings() -> bool {
    env::var("APP_USE_FAKE_EMBEDDINGS")
        .ok()
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against a given base directory after expansion.
/// If `p` is absolute, it's returned as-is; otherwise `base.join(p)` is returned.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}
