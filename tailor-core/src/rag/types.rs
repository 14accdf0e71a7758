use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A source document before chunking.
///
/// # Example
///
/// ```no_run
/// # use tailor_core::rag::Document;
/// let doc = Document::new("guides/paris.txt", "Paris has the Eiffel Tower.")
///     .with_metadata("city", "paris");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub source: String,
    pub content: String,
    pub metadata: BTreeMap<String, String>,
}

impl Document {
    pub fn new(source: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            content: content.into(),
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// A bounded slice of a document, the unit both indexes store.
///
/// `id` is `"{source}#{ordinal}"` and is stable across rebuilds as long as
/// the document and the chunking parameters do not change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: String,
    pub source: String,
    pub content: String,
    /// Position of the chunk within its document.
    pub ordinal: usize,
    /// Byte offset of the chunk within its document.
    pub start: usize,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

impl Chunk {
    pub fn new(source: impl Into<String>, ordinal: usize, start: usize, content: impl Into<String>) -> Self {
        let source = source.into();
        Self {
            id: format!("{source}#{ordinal}"),
            source,
            content: content.into(),
            ordinal,
            start,
            metadata: BTreeMap::new(),
        }
    }
}

/// Which retrieval path produced a score. Scores are only comparable within
/// one strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Cosine similarity in `(0, 1]`.
    Lexical,
    /// Euclidean distance, lower is better.
    Semantic,
    /// `1 / (1 + distance)` over the candidate sub-index, higher is better.
    Hybrid,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Strategy::Lexical => "lexical",
            Strategy::Semantic => "semantic",
            Strategy::Hybrid => "hybrid",
        };
        f.write_str(name)
    }
}

/// One ranked retrieval hit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievalResult {
    pub chunk: Chunk,
    pub score: f32,
    pub strategy: Strategy,
}

impl RetrievalResult {
    pub fn content(&self) -> &str {
        &self.chunk.content
    }
}
