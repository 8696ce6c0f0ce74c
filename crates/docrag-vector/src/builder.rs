//! Full-rebuild pipeline: documents -> chunks -> vectors -> persisted index.

use std::path::PathBuf;
use std::sync::Arc;

use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

use docrag_core::chunker::{Chunker, ChunkingConfig};
use docrag_core::config::Settings;
use docrag_core::ingest::{load_documents, DocumentFilter};
use docrag_core::traits::{AsyncEmbedder, Embedder, EmbeddingModel};
use docrag_core::{Chunk, EmbeddingVector, Error, IndexEntry, Result};

use crate::index::VectorIndex;

const DEFAULT_BATCH_SIZE: usize = 64;

#[derive(Debug, Clone)]
pub struct BuildSettings {
    pub source_directory: PathBuf,
    pub persist_directory: PathBuf,
    pub filter: DocumentFilter,
    pub chunking: ChunkingConfig,
    /// Chunks handed to one `embed_many` call.
    pub batch_size: usize,
    pub show_progress: bool,
}

impl BuildSettings {
    pub fn new(source_directory: impl Into<PathBuf>, persist_directory: impl Into<PathBuf>) -> Self {
        Self {
            source_directory: source_directory.into(),
            persist_directory: persist_directory.into(),
            filter: DocumentFilter::default(),
            chunking: ChunkingConfig::default(),
            batch_size: DEFAULT_BATCH_SIZE,
            show_progress: false,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            source_directory: settings.source_directory(),
            persist_directory: settings.persist_directory(),
            filter: DocumentFilter::new(&settings.index.extensions).with_limit(settings.index.max_documents),
            chunking: settings.chunking,
            batch_size: DEFAULT_BATCH_SIZE,
            show_progress: false,
        }
    }

    #[must_use]
    pub fn with_chunking(mut self, chunk_size: usize, chunk_overlap: usize) -> Self {
        self.chunking = ChunkingConfig::new(chunk_size, chunk_overlap);
        self
    }

    #[must_use]
    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }
}

/// Owns one build from start to finish. The index it produces is written
/// to `persist_directory` only when every step has succeeded.
pub struct IndexBuilder<E: ?Sized> {
    embedder: Arc<E>,
    settings: BuildSettings,
}

impl<E: EmbeddingModel + ?Sized> IndexBuilder<E> {
    pub fn new(embedder: Arc<E>, settings: BuildSettings) -> Self {
        Self { embedder, settings }
    }

    pub fn settings(&self) -> &BuildSettings {
        &self.settings
    }

    fn chunk_corpus(&self) -> Result<Vec<Chunk>> {
        let chunker = Chunker::new(self.settings.chunking)?;
        if self.settings.batch_size == 0 {
            return Err(Error::InvalidConfig("batch_size must be greater than 0".into()));
        }
        let documents = load_documents(&self.settings.source_directory, &self.settings.filter)?;
        let chunks = chunker.split_all(&documents);
        info!(
            documents = documents.len(),
            chunks = chunks.len(),
            source = %self.settings.source_directory.display(),
            "corpus chunked"
        );
        if chunks.is_empty() {
            warn!(source = %self.settings.source_directory.display(), "no chunks to index; persisting an empty index");
        }
        Ok(chunks)
    }

    fn progress(&self, total: usize) -> ProgressBar {
        if !self.settings.show_progress {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new(total as u64);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} chunks ({percent}%) {msg}")
        {
            pb.set_style(style.progress_chars("#>-"));
        }
        pb
    }

    fn finish(&self, chunks: Vec<Chunk>, vectors: Vec<EmbeddingVector>) -> Result<VectorIndex> {
        let entries = chunks.into_iter().zip(vectors).map(|(chunk, vector)| IndexEntry::new(vector, chunk)).collect();
        let index = VectorIndex::build(self.embedder.model_id(), self.embedder.dimension(), entries)?;
        index.persist(&self.settings.persist_directory)?;
        info!(
            entries = index.len(),
            model = index.model(),
            path = %self.settings.persist_directory.display(),
            "index build complete"
        );
        Ok(index)
    }
}

impl<E: Embedder + ?Sized> IndexBuilder<E> {
    /// Run the pipeline with blocking embedding calls.
    pub fn build_index(&self) -> Result<VectorIndex> {
        let chunks = self.chunk_corpus()?;
        let pb = self.progress(chunks.len());
        let mut vectors = Vec::with_capacity(chunks.len());
        for (batch_no, batch) in chunks.chunks(self.settings.batch_size).enumerate() {
            let offset = batch_no * self.settings.batch_size;
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            let embedded = self.embedder.embed_many(&texts).map_err(|e| shift_input(e, offset))?;
            check_batch_len(texts.len(), embedded.len(), offset)?;
            vectors.extend(embedded);
            pb.inc(batch.len() as u64);
        }
        pb.finish_and_clear();
        self.finish(chunks, vectors)
    }
}

impl<E: AsyncEmbedder + ?Sized> IndexBuilder<E> {
    /// Same pipeline, embedding through the async batch path.
    pub async fn build_index_async(&self) -> Result<VectorIndex> {
        let chunks = self.chunk_corpus()?;
        let pb = self.progress(chunks.len());
        let mut vectors = Vec::with_capacity(chunks.len());
        for (batch_no, batch) in chunks.chunks(self.settings.batch_size).enumerate() {
            let offset = batch_no * self.settings.batch_size;
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            let embedded = self.embedder.embed_many_async(&texts).await.map_err(|e| shift_input(e, offset))?;
            check_batch_len(texts.len(), embedded.len(), offset)?;
            vectors.extend(embedded);
            pb.inc(batch.len() as u64);
        }
        pb.finish_and_clear();
        self.finish(chunks, vectors)
    }
}

// Batch-local input positions become corpus-wide chunk positions.
fn shift_input(err: Error, offset: usize) -> Error {
    match err.input_index() {
        Some(position) => err.at_input(offset + position),
        None => err,
    }
}

fn check_batch_len(requested: usize, returned: usize, offset: usize) -> Result<()> {
    if requested == returned {
        return Ok(());
    }
    Err(Error::EmbeddingService {
        status: None,
        message: format!("embedder returned {returned} vectors for {requested} inputs"),
        input_index: Some(offset + returned.min(requested)),
    })
}
