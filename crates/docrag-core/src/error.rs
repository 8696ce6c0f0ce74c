use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// The remote embedding call failed or returned an unusable payload.
    ///
    /// `input_index` is set when the failure happened inside a batch and
    /// names the offending input position.
    #[error("embedding service error{}: {message}", upstream_context(.status, .input_index))]
    EmbeddingService {
        status: Option<u16>,
        message: String,
        input_index: Option<usize>,
    },

    #[error("dimension mismatch in {context}: expected {expected}, got {actual}")]
    DimensionMismatch {
        expected: usize,
        actual: usize,
        context: &'static str,
    },

    #[error("embedding model mismatch: index was built with '{persisted}', embedder is '{configured}'")]
    ModelMismatch { persisted: String, configured: String },

    #[error("invalid query: {0}")]
    InvalidQuery(String),

    #[error("cannot embed empty text{}", upstream_context(&None, .input_index))]
    EmptyInput { input_index: Option<usize> },

    #[error("persistence error at {}: {message}", .path.display())]
    Persistence { path: PathBuf, message: String },

    #[error("ingestion error at {}: {message}", .path.display())]
    Ingestion { path: PathBuf, message: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    pub fn embedding(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::EmbeddingService { status, message: message.into(), input_index: None }
    }

    pub fn persistence(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        Self::Persistence { path: path.into(), message: message.to_string() }
    }

    pub fn ingestion(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        Self::Ingestion { path: path.into(), message: message.to_string() }
    }

    /// Tag a per-input failure with the batch position it came from.
    /// Other variants pass through untouched.
    #[must_use]
    pub fn at_input(self, index: usize) -> Self {
        match self {
            Self::EmbeddingService { status, message, .. } => {
                Self::EmbeddingService { status, message, input_index: Some(index) }
            }
            Self::EmptyInput { .. } => Self::EmptyInput { input_index: Some(index) },
            other => other,
        }
    }

    /// Batch position carried by a tagged failure.
    pub fn input_index(&self) -> Option<usize> {
        match self {
            Self::EmbeddingService { input_index, .. } | Self::EmptyInput { input_index } => *input_index,
            _ => None,
        }
    }

    /// Transient failures are worth retrying: transport errors and timeouts
    /// (no status), throttling and upstream 5xx.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::EmbeddingService { status: None, .. } => true,
            Self::EmbeddingService { status: Some(s), .. } => *s == 429 || *s >= 500,
            _ => false,
        }
    }
}

fn upstream_context(status: &Option<u16>, input_index: &Option<usize>) -> String {
    let mut out = String::new();
    if let Some(status) = status {
        out.push_str(&format!(" (status {status})"));
    }
    if let Some(index) = input_index {
        out.push_str(&format!(" on input #{index}"));
    }
    out
}

pub type Result<T> = std::result::Result<T, Error>;
