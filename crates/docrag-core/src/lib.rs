//! Core domain for the docrag pipeline: documents and chunks, the error
//! taxonomy, layered configuration, the embedder interface, the chunker and
//! the document loader.

pub mod chunker;
pub mod config;
pub mod error;
pub mod ingest;
pub mod traits;
pub mod types;

pub use error::{Error, Result};
pub use types::{Chunk, Document, EmbeddingVector, IndexEntry};
