//! Overlapping, boundary-aware text splitting.
//!
//! Every chunk is a contiguous character range of its document, at most
//! `chunk_size` characters long. Each cut starts the next piece exactly
//! `chunk_overlap` characters before the previous one ends, so dropping the
//! leading overlap of every piece after the first and concatenating
//! reconstructs the document. Pieces that are pure whitespace (a blank run
//! longer than the cut window) are dropped and never become chunks.
//! Cut points prefer, in order: paragraph breaks, line breaks, sentence
//! ends, whitespace; a hard cut at `chunk_size` is the last resort.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::{Chunk, Document};

/// Boundary groups tried from coarsest to finest. Within a group the cut
/// closest to the size limit wins.
const SEPARATORS: &[&[&str]] = &[
    &["\n\n"],
    &["\n"],
    &[". ", "! ", "? ", "; ", "。", "！", "？", "；"],
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Maximum chunk length in characters.
    pub chunk_size: usize,
    /// Characters shared by consecutive chunks of one document.
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self { chunk_size: 800, chunk_overlap: 120 }
    }
}

impl ChunkingConfig {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self { chunk_size, chunk_overlap }
    }

    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(Error::InvalidConfig("chunk_size must be greater than 0".into()));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(Error::InvalidConfig(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct Chunker {
    config: ChunkingConfig,
}

impl Chunker {
    pub fn new(config: ChunkingConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> ChunkingConfig {
        self.config
    }

    /// Split one document. Blank documents yield no chunks, and
    /// `sequence_index` stays dense when blank pieces are skipped.
    pub fn split(&self, document: &Document) -> Vec<Chunk> {
        let text = document.text.as_str();
        if text.trim().is_empty() {
            return Vec::new();
        }
        let offsets: Vec<usize> = text
            .char_indices()
            .map(|(byte, _)| byte)
            .chain(std::iter::once(text.len()))
            .collect();
        let total = offsets.len() - 1;
        let ChunkingConfig { chunk_size, chunk_overlap } = self.config;

        let mut chunks = Vec::new();
        let mut start = 0usize;
        loop {
            let end = if total - start <= chunk_size {
                total
            } else {
                let window = Window {
                    text,
                    offsets: &offsets,
                    start,
                    min_end: start + (chunk_overlap + 1).max(chunk_size / 2),
                    max_end: start + chunk_size,
                };
                window.cut(0)
            };
            let piece = &text[offsets[start]..offsets[end]];
            if !piece.trim().is_empty() {
                chunks.push(Chunk {
                    text: piece.to_string(),
                    source: document.source.clone(),
                    sequence_index: chunks.len(),
                    start,
                });
            }
            if end == total {
                break;
            }
            start = end - chunk_overlap;
        }
        chunks
    }

    /// Split every document in order; chunks never cross document boundaries.
    pub fn split_all(&self, documents: &[Document]) -> Vec<Chunk> {
        documents.iter().flat_map(|doc| self.split(doc)).collect()
    }
}

/// Split `document` with the given limits.
pub fn split(document: &Document, chunk_size: usize, chunk_overlap: usize) -> Result<Vec<Chunk>> {
    Ok(Chunker::new(ChunkingConfig::new(chunk_size, chunk_overlap))?.split(document))
}

/// Candidate cut range in character positions: any end in
/// `min_end..=max_end` keeps the chunk within size and moves past the overlap.
struct Window<'a> {
    text: &'a str,
    offsets: &'a [usize],
    start: usize,
    min_end: usize,
    max_end: usize,
}

impl Window<'_> {
    fn cut(&self, level: usize) -> usize {
        match SEPARATORS.get(level) {
            Some(group) => self.after_separator(group).unwrap_or_else(|| self.cut(level + 1)),
            None => self.after_whitespace().unwrap_or(self.max_end),
        }
    }

    fn slice(&self) -> &str {
        &self.text[self.offsets[self.start]..self.offsets[self.max_end]]
    }

    fn after_separator(&self, group: &[&str]) -> Option<usize> {
        let base = self.offsets[self.start];
        group
            .iter()
            .filter_map(|sep| {
                let pos = self.slice().rfind(sep)?;
                self.offsets.binary_search(&(base + pos + sep.len())).ok()
            })
            .filter(|&end| end >= self.min_end)
            .max()
    }

    fn after_whitespace(&self) -> Option<usize> {
        (self.min_end - 1..self.max_end)
            .rev()
            .find(|&i| {
                self.text[self.offsets[i]..]
                    .chars()
                    .next()
                    .is_some_and(char::is_whitespace)
            })
            .map(|i| i + 1)
    }
}
