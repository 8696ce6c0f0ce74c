//! Persisted index layout.
//!
//! ```text
//! <dir>/manifest.json   format version, model, dimension, count, checksum
//! <dir>/vectors.bin     count x dimension little-endian f32, row-major
//! <dir>/chunks.jsonl    one chunk record per position
//! ```
//!
//! The manifest is written last, so a directory without one is never a
//! usable index.

use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use docrag_core::{Chunk, Error, Result};

pub const FORMAT_VERSION: u32 = 1;
pub const MANIFEST_FILE: &str = "manifest.json";
pub const VECTORS_FILE: &str = "vectors.bin";
pub const CHUNKS_FILE: &str = "chunks.jsonl";

const F32_BYTES: usize = std::mem::size_of::<f32>();
/// Upper bound on up-front allocation driven by manifest counts.
const PREALLOC_LIMIT: usize = 1 << 16;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub format_version: u32,
    pub model: String,
    pub dimension: usize,
    pub count: usize,
    pub created_at: DateTime<Utc>,
    pub vectors_blake3: String,
}

#[derive(Serialize)]
struct ChunkRecordRef<'a> {
    position: usize,
    text: &'a str,
    source: &'a str,
    sequence_index: usize,
    start: usize,
}

#[derive(Deserialize)]
struct ChunkRecord {
    position: usize,
    text: String,
    source: String,
    sequence_index: usize,
    #[serde(default)]
    start: usize,
}

/// Read and sanity-check `manifest.json` without touching the data files.
pub fn read_manifest(dir: &Path) -> Result<Manifest> {
    let path = dir.join(MANIFEST_FILE);
    let raw = fs::read_to_string(&path).map_err(|e| Error::persistence(&path, e))?;
    let manifest: Manifest =
        serde_json::from_str(&raw).map_err(|e| Error::persistence(&path, format!("corrupt manifest: {e}")))?;
    if manifest.format_version != FORMAT_VERSION {
        return Err(Error::persistence(
            &path,
            format!("unsupported format version {} (expected {FORMAT_VERSION})", manifest.format_version),
        ));
    }
    if manifest.dimension == 0 {
        return Err(Error::persistence(&path, "manifest records dimension 0"));
    }
    Ok(manifest)
}

/// Write a complete index into `dir`, which must already exist.
pub(crate) fn write(dir: &Path, model: &str, dimension: usize, vectors: &[f32], chunks: &[Chunk]) -> Result<Manifest> {
    let bytes: Vec<u8> = vectors.iter().flat_map(|v| v.to_le_bytes()).collect();
    let vectors_path = dir.join(VECTORS_FILE);
    fs::write(&vectors_path, &bytes).map_err(|e| Error::persistence(&vectors_path, e))?;

    let chunks_path = dir.join(CHUNKS_FILE);
    let file = File::create(&chunks_path).map_err(|e| Error::persistence(&chunks_path, e))?;
    let mut out = BufWriter::new(file);
    for (position, chunk) in chunks.iter().enumerate() {
        let record = ChunkRecordRef {
            position,
            text: &chunk.text,
            source: &chunk.source,
            sequence_index: chunk.sequence_index,
            start: chunk.start,
        };
        serde_json::to_writer(&mut out, &record).map_err(|e| Error::persistence(&chunks_path, e))?;
        out.write_all(b"\n").map_err(|e| Error::persistence(&chunks_path, e))?;
    }
    out.flush().map_err(|e| Error::persistence(&chunks_path, e))?;

    let manifest = Manifest {
        format_version: FORMAT_VERSION,
        model: model.to_string(),
        dimension,
        count: chunks.len(),
        created_at: Utc::now(),
        vectors_blake3: blake3::hash(&bytes).to_hex().to_string(),
    };
    let manifest_path = dir.join(MANIFEST_FILE);
    let json = serde_json::to_vec_pretty(&manifest).map_err(|e| Error::persistence(&manifest_path, e))?;
    fs::write(&manifest_path, json).map_err(|e| Error::persistence(&manifest_path, e))?;
    Ok(manifest)
}

pub(crate) fn read_vectors(dir: &Path, manifest: &Manifest) -> Result<Vec<f32>> {
    let path = dir.join(VECTORS_FILE);
    let expected = manifest
        .count
        .checked_mul(manifest.dimension)
        .and_then(|n| n.checked_mul(F32_BYTES))
        .ok_or_else(|| {
            Error::persistence(
                &path,
                format!("manifest count {} x dimension {} is out of range", manifest.count, manifest.dimension),
            )
        })?;
    // check the size before reading anything
    let on_disk = fs::metadata(&path).map_err(|e| Error::persistence(&path, e))?.len();
    if u64::try_from(expected).ok() != Some(on_disk) {
        return Err(Error::persistence(
            &path,
            format!("expected {expected} bytes for {} vectors, found {on_disk}", manifest.count),
        ));
    }
    let bytes = fs::read(&path).map_err(|e| Error::persistence(&path, e))?;
    if bytes.len() != expected {
        return Err(Error::persistence(
            &path,
            format!("expected {expected} bytes for {} vectors, found {}", manifest.count, bytes.len()),
        ));
    }
    if blake3::hash(&bytes).to_hex().as_str() != manifest.vectors_blake3 {
        return Err(Error::persistence(&path, "checksum does not match manifest"));
    }
    Ok(bytes
        .chunks_exact(F32_BYTES)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}

pub(crate) fn read_chunks(dir: &Path, manifest: &Manifest) -> Result<Vec<Chunk>> {
    let path = dir.join(CHUNKS_FILE);
    let file = File::open(&path).map_err(|e| Error::persistence(&path, e))?;
    let mut chunks = Vec::with_capacity(manifest.count.min(PREALLOC_LIMIT));
    for line in BufReader::new(file).lines() {
        let line = line.map_err(|e| Error::persistence(&path, e))?;
        if line.trim().is_empty() {
            continue;
        }
        let record: ChunkRecord = serde_json::from_str(&line)
            .map_err(|e| Error::persistence(&path, format!("corrupt record at line {}: {e}", chunks.len() + 1)))?;
        if chunks.len() == manifest.count {
            return Err(Error::persistence(&path, format!("more than the {} records the manifest lists", manifest.count)));
        }
        if record.position != chunks.len() {
            return Err(Error::persistence(
                &path,
                format!("expected position {}, found {}", chunks.len(), record.position),
            ));
        }
        chunks.push(Chunk {
            text: record.text,
            source: record.source,
            sequence_index: record.sequence_index,
            start: record.start,
        });
    }
    if chunks.len() != manifest.count {
        return Err(Error::persistence(
            &path,
            format!("manifest lists {} chunks, found {}", manifest.count, chunks.len()),
        ));
    }
    Ok(chunks)
}
