//! Flat vector index with on-disk persistence, plus the build pipeline that
//! fills it from a directory of documents.
//!
//! Typical flow:
//! 1) [`IndexBuilder::build_index`] loads, chunks and embeds the corpus
//! 2) the resulting [`VectorIndex`] is staged and swapped into the persist directory
//! 3) query processes reopen it with [`VectorIndex::load`], which checks the
//!    manifest against the embedder before any search runs

pub mod builder;
pub mod index;
pub mod layout;

pub use builder::{BuildSettings, IndexBuilder};
pub use index::{SearchHit, VectorIndex};
pub use layout::{read_manifest, Manifest};
