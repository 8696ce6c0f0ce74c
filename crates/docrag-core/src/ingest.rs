//! Loads eligible text files from a source directory into [`Document`]s.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};
use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::types::Document;

/// Which files to pick up from a source directory.
#[derive(Debug, Clone)]
pub struct DocumentFilter {
    extensions: Vec<String>,
    max_documents: Option<usize>,
}

impl DocumentFilter {
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let extensions = extensions
            .into_iter()
            .map(|e| e.as_ref().trim_start_matches('.').to_ascii_lowercase())
            .collect();
        Self { extensions, max_documents: None }
    }

    #[must_use]
    pub fn with_limit(mut self, max_documents: Option<usize>) -> Self {
        self.max_documents = max_documents;
        self
    }

    fn matches(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|s| s.to_str())
            .is_some_and(|ext| self.extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)))
    }
}

impl Default for DocumentFilter {
    fn default() -> Self {
        Self::new(["md"])
    }
}

/// Enumerate eligible files under `root` in sorted path order.
///
/// Hidden files and directories are skipped. The order is deterministic so
/// that rebuilds from an unchanged directory insert entries identically.
pub fn list_documents(root: &Path, filter: &DocumentFilter) -> Result<Vec<PathBuf>> {
    if !root.is_dir() {
        return Err(Error::ingestion(root, "source directory does not exist or is not a directory"));
    }
    let mut files = Vec::new();
    let walker = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !e.file_name().to_string_lossy().starts_with('.'));
    for entry in walker {
        let entry = entry.map_err(|e| Error::ingestion(root, e))?;
        if entry.file_type().is_file() && filter.matches(entry.path()) {
            files.push(entry.into_path());
        }
    }
    files.sort();
    if let Some(limit) = filter.max_documents {
        if files.len() > limit {
            info!(limit, found = files.len(), "limiting ingestion to the first documents");
            files.truncate(limit);
        }
    }
    Ok(files)
}

/// Read one file as a document whose `source` is `path` relative to `root`.
pub fn read_document(root: &Path, path: &Path) -> Result<Document> {
    let bytes = fs::read(path).map_err(|e| Error::ingestion(path, e))?;
    let text = String::from_utf8(bytes).map_err(|e| Error::ingestion(path, format!("not valid UTF-8: {e}")))?;
    Ok(Document::new(text, source_name(root, path)))
}

/// Load every eligible document. Any unreadable file fails the whole load.
pub fn load_documents(root: &Path, filter: &DocumentFilter) -> Result<Vec<Document>> {
    let files = list_documents(root, filter)?;
    let mut documents = Vec::with_capacity(files.len());
    for (i, path) in files.iter().enumerate() {
        debug!(file = %path.display(), "loading {}/{}", i + 1, files.len());
        documents.push(read_document(root, path)?);
    }
    info!(count = documents.len(), root = %root.display(), "loaded documents");
    Ok(documents)
}

fn source_name(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
