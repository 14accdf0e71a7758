//! Corpus collection and text chunking.
//!
//! This module provides functionality to:
//! - Recursively collect documents from a directory
//! - Filter files by extension and exclude patterns
//! - Split documents into overlapping chunks

use super::types::{Chunk, Document};
use crate::config::IndexerConfig;
use crate::patterns::should_exclude;
use std::path::Path;
use thiserror::Error;
use tokio::fs;
use tracing::{debug, warn};

/// Errors that can occur during corpus collection.
#[derive(Debug, Error)]
pub enum IndexerError {
    /// An I/O error occurred while reading files or directories.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Corpus directory does not exist: {0}")]
    MissingDirectory(String),
}

/// Result type for indexing operations.
pub type Result<T> = std::result::Result<T, IndexerError>;

/// Splits text into overlapping chunks, returning each chunk with its byte offset.
///
/// Sizes are in bytes. Chunk boundaries are moved back to the nearest UTF-8
/// character boundary, so no chunk is longer than `chunk_size` unless a single
/// character is. Consecutive chunks share at most `overlap` bytes and never
/// leave a gap, so the document is the first chunk followed by each later
/// chunk minus the part it shares with its predecessor.
pub(crate) fn chunk_text(text: &str, chunk_size: usize, overlap: usize) -> Vec<(usize, &str)> {
    if text.is_empty() || chunk_size == 0 {
        return vec![];
    }

    if text.len() <= chunk_size {
        return vec![(0, text)];
    }

    let mut chunks = Vec::new();
    let mut start = 0;

    loop {
        let mut end = (start + chunk_size).min(text.len());
        while end > start && !text.is_char_boundary(end) {
            end -= 1;
        }
        if end == start {
            // A single character wider than the chunk size.
            end = start + text[start..].chars().next().map_or(1, char::len_utf8);
        }

        chunks.push((start, &text[start..end]));
        if end == text.len() {
            break;
        }

        let mut next = end.saturating_sub(overlap);
        while next > start && !text.is_char_boundary(next) {
            next -= 1;
        }
        start = if next > start { next } else { end };
    }

    chunks
}

/// Splits a document into chunks that carry its source and metadata.
pub fn chunk_document(document: &Document, chunk_size: usize, overlap: usize) -> Vec<Chunk> {
    if document.content.is_empty() {
        warn!(source = %document.source, "Skipping empty document");
        return vec![];
    }

    chunk_text(&document.content, chunk_size, overlap)
        .into_iter()
        .enumerate()
        .map(|(ordinal, (start, content))| {
            let mut chunk = Chunk::new(&document.source, ordinal, start, content);
            chunk.metadata = document.metadata.clone();
            chunk
        })
        .collect()
}

/// Recursively collects all indexable documents under `dir_path`.
///
/// Each document's source identifier is its path relative to `dir_path`, with
/// `/` separators. Files that are not valid UTF-8 are skipped. The result is
/// sorted by source so ingestion order does not depend on the file system.
pub async fn collect_documents(dir_path: impl AsRef<Path>, config: &IndexerConfig) -> Result<Vec<Document>> {
    let root = dir_path.as_ref();
    if !fs::try_exists(root).await? {
        return Err(IndexerError::MissingDirectory(root.display().to_string()));
    }

    let mut documents = Vec::new();
    collect_recursive(root, root, &mut documents, config).await?;
    documents.sort_by(|a, b| a.source.cmp(&b.source));
    Ok(documents)
}

fn collect_recursive<'a>(
    root: &'a Path,
    dir: &'a Path,
    documents: &'a mut Vec<Document>,
    config: &'a IndexerConfig,
) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<()>> + Send + 'a>> {
    Box::pin(async move {
        let mut entries = fs::read_dir(dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let relative = path.strip_prefix(root).unwrap_or(&path);

            if should_exclude(relative, &config.exclude_patterns) {
                continue;
            }

            let file_type = entry.file_type().await?;
            if file_type.is_dir() {
                collect_recursive(root, &path, documents, config).await?;
            } else if is_indexable(&path, &config.extensions) {
                match fs::read_to_string(&path).await {
                    Ok(content) => documents.push(Document::new(source_id(relative), content)),
                    Err(e) => debug!(path = %path.display(), error = %e, "Skipping unreadable file"),
                }
            }
        }

        Ok(())
    })
}

fn source_id(relative: &Path) -> String {
    relative
        .components()
        .map(|component| component.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Checks if a file should be indexed based on its extension.
///
/// If `extensions` is empty, all files are considered indexable.
fn is_indexable(path: &Path, extensions: &[String]) -> bool {
    if extensions.is_empty() {
        return true;
    }

    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| extensions.iter().any(|e| e == ext))
        .unwrap_or(false)
}
