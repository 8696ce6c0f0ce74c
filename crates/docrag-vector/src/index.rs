use std::fs;
use std::path::Path;

use tempfile::TempDir;
use tracing::{debug, info, warn};

use docrag_core::{Chunk, Error, IndexEntry, Result};

use crate::layout::{self, Manifest};

/// One search result: the stored chunk, its insertion position and its
/// Euclidean distance to the query.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub position: usize,
    pub chunk: Chunk,
    pub distance: f32,
}

/// Exact nearest-neighbour index over fixed-length vectors.
///
/// Vectors are stored row-major in one contiguous buffer; row `i` belongs
/// to `chunks[i]`. Every vector was produced by `model` and has `dimension`
/// components.
#[derive(Debug, Clone)]
pub struct VectorIndex {
    model: String,
    dimension: usize,
    vectors: Vec<f32>,
    chunks: Vec<Chunk>,
}

impl VectorIndex {
    pub fn new(model: impl Into<String>, dimension: usize) -> Result<Self> {
        if dimension == 0 {
            return Err(Error::InvalidConfig("index dimension must be greater than 0".into()));
        }
        Ok(Self { model: model.into(), dimension, vectors: Vec::new(), chunks: Vec::new() })
    }

    /// Build a fresh index from `entries`, in order.
    pub fn build(model: impl Into<String>, dimension: usize, entries: Vec<IndexEntry>) -> Result<Self> {
        let mut index = Self::new(model, dimension)?;
        index.add_batch(entries)?;
        Ok(index)
    }

    /// Append entries. The whole batch is checked before anything is added,
    /// so a mismatched vector leaves the index unchanged.
    pub fn add_batch(&mut self, entries: Vec<IndexEntry>) -> Result<()> {
        if let Some(bad) = entries.iter().find(|e| e.vector.len() != self.dimension) {
            return Err(Error::DimensionMismatch {
                expected: self.dimension,
                actual: bad.vector.len(),
                context: "index entry",
            });
        }
        self.vectors.reserve(entries.len() * self.dimension);
        self.chunks.reserve(entries.len());
        for entry in entries {
            self.vectors.extend_from_slice(&entry.vector);
            self.chunks.push(entry.chunk);
        }
        Ok(())
    }

    /// Up to `k` nearest entries by ascending Euclidean distance. Equal
    /// distances keep insertion order.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        if query.len() != self.dimension {
            return Err(Error::DimensionMismatch {
                expected: self.dimension,
                actual: query.len(),
                context: "query vector",
            });
        }
        if k == 0 || self.chunks.is_empty() {
            return Ok(Vec::new());
        }
        let mut scored: Vec<(usize, f32)> = self
            .vectors
            .chunks_exact(self.dimension)
            .map(|row| squared_l2(row, query))
            .enumerate()
            .collect();
        // stable: ties stay in position order
        scored.sort_by(|a, b| a.1.total_cmp(&b.1));
        scored.truncate(k);
        Ok(scored
            .into_iter()
            .map(|(position, d2)| SearchHit { position, chunk: self.chunks[position].clone(), distance: d2.sqrt() })
            .collect())
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn chunk(&self, position: usize) -> Option<&Chunk> {
        self.chunks.get(position)
    }

    pub fn vector(&self, position: usize) -> Option<&[f32]> {
        let start = position.checked_mul(self.dimension)?;
        self.vectors.get(start..start + self.dimension)
    }

    /// Write the index to `dir`, replacing whatever is there.
    ///
    /// The files are written into a staging directory next to `dir` and
    /// moved into place only once complete. If anything fails, the previous
    /// contents of `dir` are left as they were.
    pub fn persist(&self, dir: &Path) -> Result<Manifest> {
        let parent = match dir.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        fs::create_dir_all(parent).map_err(|e| Error::persistence(parent, e))?;
        let staging = tempfile::Builder::new()
            .prefix(".docrag-staging-")
            .tempdir_in(parent)
            .map_err(|e| Error::persistence(parent, e))?;
        let manifest = layout::write(staging.path(), &self.model, self.dimension, &self.vectors, &self.chunks)?;
        swap_into_place(staging.path(), dir, parent)?;
        info!(path = %dir.display(), count = manifest.count, dimension = manifest.dimension, "index persisted");
        Ok(manifest)
    }

    /// Load an index persisted by [`VectorIndex::persist`].
    ///
    /// The manifest is checked against the caller's embedder first: a
    /// different dimension fails with `DimensionMismatch` and a different
    /// model with `ModelMismatch`, before any vector data is read.
    pub fn load(dir: &Path, model: &str, dimension: usize) -> Result<Self> {
        let manifest = layout::read_manifest(dir)?;
        if manifest.dimension != dimension {
            return Err(Error::DimensionMismatch {
                expected: dimension,
                actual: manifest.dimension,
                context: "persisted index",
            });
        }
        if manifest.model != model {
            return Err(Error::ModelMismatch { persisted: manifest.model, configured: model.to_string() });
        }
        let vectors = layout::read_vectors(dir, &manifest)?;
        let chunks = layout::read_chunks(dir, &manifest)?;
        debug!(path = %dir.display(), count = chunks.len(), "index loaded");
        Ok(Self { model: manifest.model, dimension, vectors, chunks })
    }
}

fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

fn swap_into_place(staged: &Path, dir: &Path, parent: &Path) -> Result<()> {
    if !dir.exists() {
        return fs::rename(staged, dir).map_err(|e| Error::persistence(dir, e));
    }
    // Move the old index aside; it is dropped with `previous` once the swap succeeds.
    let previous = tempfile::Builder::new()
        .prefix(".docrag-previous-")
        .tempdir_in(parent)
        .map_err(|e| Error::persistence(parent, e))?;
    let parked = previous.path().join("index");
    fs::rename(dir, &parked).map_err(|e| Error::persistence(dir, e))?;
    if let Err(e) = fs::rename(staged, dir) {
        return Err(restore_previous(previous, dir, &e.to_string()));
    }
    Ok(())
}

/// Put the parked index back at `dir`. If that fails too, the parked copy
/// is kept on disk and the error names where it is.
fn restore_previous(previous: TempDir, dir: &Path, cause: &str) -> Error {
    let parked = previous.path().join("index");
    match fs::rename(&parked, dir) {
        Ok(()) => Error::persistence(dir, cause),
        Err(restore) => {
            let kept = previous.keep().join("index");
            warn!(path = %kept.display(), error = %restore, "previous index could not be restored");
            Error::persistence(
                dir,
                format!("{cause}; previous index could not be restored ({restore}) and was kept at {}", kept.display()),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parked_index() -> TempDir {
        let previous = tempfile::tempdir().unwrap();
        fs::create_dir(previous.path().join("index")).unwrap();
        fs::write(previous.path().join("index").join("manifest.json"), "{}").unwrap();
        previous
    }

    #[test]
    fn restore_moves_the_parked_index_back() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("store");
        let err = restore_previous(parked_index(), &dir, "staged rename failed");
        assert!(dir.join("manifest.json").exists());
        assert!(matches!(err, Error::Persistence { ref message, .. } if message == "staged rename failed"));
    }

    #[test]
    fn failed_restore_keeps_the_parked_index() {
        let root = tempfile::tempdir().unwrap();
        // parent does not exist, so the restore rename fails
        let dir = root.path().join("missing").join("store");
        let previous = parked_index();
        let parked_root = previous.path().to_path_buf();
        let err = restore_previous(previous, &dir, "staged rename failed");

        assert!(parked_root.join("index").join("manifest.json").exists());
        match err {
            Error::Persistence { message, .. } => {
                assert!(message.contains("was kept at"), "{message}");
                assert!(message.contains(&parked_root.display().to_string()), "{message}");
            }
            other => panic!("unexpected {other:?}"),
        }
        fs::remove_dir_all(parked_root).unwrap();
    }
}
