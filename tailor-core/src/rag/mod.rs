//! Retrieval over a persisted knowledge base.
//!
//! # Architecture
//!
//! - [`KnowledgeBase`]: owns every index handle and performs ingestion
//! - [`LexicalIndex`]: TF-IDF matrix, cosine ranking
//! - [`SemanticIndex`]: flat dense-vector index, Euclidean ranking
//! - [`Retriever`]: lexical, semantic and hybrid strategies
//! - [`indexer`]: corpus collection and chunking
//!
//! # How It Works
//!
//! 1. **Ingestion**:
//!    - Documents under the docs directory are split into chunks
//!    - Chunks from sources not yet registered are added to both indexes
//!    - The spelling dictionary absorbs the new documents' vocabulary
//!
//! 2. **Hybrid retrieval**:
//!    - The query is spelling-corrected
//!    - The lexical index returns `fuzzy_k` candidates
//!    - Query and candidates are embedded into a throwaway sub-index
//!    - The `k` nearest candidates are returned

mod artifact;
mod embedder;
pub mod indexer;
mod registry;
mod retriever;
mod semantic;
mod tfidf;
mod types;

pub use embedder::{Embedder, EmbedderError};
pub use indexer::{chunk_document, collect_documents, IndexerError};
pub use registry::SourceRegistry;
pub use retriever::{HybridRetriever, LexicalRetriever, Retriever, SemanticRetriever};
pub use semantic::SemanticIndex;
pub use tfidf::{LexicalIndex, SparseVector, TfidfVectorizer};
pub use types::{Chunk, Document, RetrievalResult, Strategy};

use crate::config::{Config, RagConfig, StorageConfig};
use crate::provider::{self, Provider};
use crate::text::{Lexicon, SpellingCorrector, TextError, TextNormalizer};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum RagError {
    #[error("Cannot build an index from an empty corpus")]
    EmptyCorpus,

    #[error("Embedding dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch { expected: usize, found: usize },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Missing index artifact: {0}")]
    MissingArtifact(PathBuf),

    #[error("Index artifacts in {0} were not written together")]
    StaleArtifacts(PathBuf),

    #[error("Unsupported format version {found} in {path}")]
    UnsupportedFormat { path: PathBuf, found: u32 },

    #[error("Corrupt index artifact {path}: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Embedder error: {0}")]
    Embedder(EmbedderError),

    #[error("Indexer error: {0}")]
    Indexer(#[from] IndexerError),

    #[error("Text processing error: {0}")]
    Text(#[from] TextError),
}

pub type Result<T> = std::result::Result<T, RagError>;

impl From<EmbedderError> for RagError {
    /// A wrongly sized vector is a configuration fault, not an endpoint one,
    /// so it never triggers the degraded fallback.
    fn from(e: EmbedderError) -> Self {
        match e {
            EmbedderError::DimensionMismatch { expected, found } => {
                RagError::DimensionMismatch { expected, found }
            }
            other => RagError::Embedder(other),
        }
    }
}

/// Whether an index handle was read from disk or starts empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexState {
    Fresh,
    Loaded,
}

/// What one ingestion pass changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub documents: usize,
    pub new_sources: usize,
    pub lexical_chunks: usize,
    pub semantic_chunks: usize,
}

/// Process-scoped retrieval state.
///
/// Holds the spelling corrector, both index handles, the embedder and the
/// configuration. Construct one per process (or per data directory) and
/// share it behind an `Arc`; reads run concurrently, ingestions are
/// serialized.
pub struct KnowledgeBase {
    config: RagConfig,
    storage: StorageConfig,
    normalizer: TextNormalizer,
    corrector: Arc<RwLock<SpellingCorrector>>,
    lexical: Arc<RwLock<LexicalIndex>>,
    semantic: Arc<RwLock<SemanticIndex>>,
    embedder: Embedder,
    ingest_lock: Mutex<()>,
}

impl KnowledgeBase {
    /// Open (or create) the knowledge base under `config.storage.data_path`.
    ///
    /// # Example
    ///
    /// ```no_run
    /// # use tailor_core::{Config, rag::KnowledgeBase};
    /// # async fn example() {
    /// let config = Config::default();
    /// let kb = KnowledgeBase::from_config(&config).await.unwrap();
    /// let results = kb.search("eiffel tower", 3).await.unwrap();
    /// # }
    /// ```
    pub async fn from_config(config: &Config) -> Result<Self> {
        let provider = provider::embedding_provider(
            &config.rag.embedding,
            Duration::from_secs(config.llm.timeout_secs),
        )
        .map_err(EmbedderError::from)?;
        Self::open(config, provider).await
    }

    /// Open with an explicit embedding provider.
    pub async fn open(config: &Config, embedding_provider: Arc<dyn Provider>) -> Result<Self> {
        let lexicon = match &config.rag.lexicon_path {
            Some(path) => Lexicon::from_json_file(path)?,
            None => Lexicon::english(),
        };
        let normalizer = TextNormalizer::new(lexicon);
        let dimensions = config.rag.embedding.dimensions();
        let embedder = Embedder::new(embedding_provider, config.rag.embedding.model.clone(), dimensions);

        let storage = &config.storage;
        let corrector = SpellingCorrector::load_or_empty(&storage.vocab_path(), normalizer.clone()).await;
        let lexical = LexicalIndex::open_or_create(storage.tfidf_dir(), normalizer.clone()).await?;
        let semantic = SemanticIndex::open_or_create(storage.vector_dir(), dimensions).await?;

        info!(
            data_path = %storage.data_path.display(),
            lexical = ?lexical.state(),
            semantic = ?semantic.state(),
            chunks = lexical.len(),
            vocabulary = corrector.len(),
            "Opened knowledge base"
        );

        Ok(Self {
            config: config.rag.clone(),
            storage: storage.clone(),
            normalizer,
            corrector: Arc::new(RwLock::new(corrector)),
            lexical: Arc::new(RwLock::new(lexical)),
            semantic: Arc::new(RwLock::new(semantic)),
            embedder,
            ingest_lock: Mutex::new(()),
        })
    }

    /// Ingest every document under `config.storage.docs_path`.
    pub async fn ingest(&self) -> Result<IngestReport> {
        let docs_path = self.storage.docs_path.clone();
        self.ingest_directory(&docs_path).await
    }

    /// Ingest every document under `dir`. Already-registered sources are skipped.
    pub async fn ingest_directory(&self, dir: &Path) -> Result<IngestReport> {
        let documents = collect_documents(dir, &self.config.indexer).await?;
        info!(dir = %dir.display(), documents = documents.len(), "Collected documents");
        self.ingest_documents(documents).await
    }

    /// Add documents to both indexes and the spelling dictionary.
    ///
    /// Each index and the dictionary only take documents absent from their
    /// own source sets, so ingesting the same corpus twice changes nothing.
    pub async fn ingest_documents(&self, documents: Vec<Document>) -> Result<IngestReport> {
        let _guard = self.ingest_lock.lock().await;

        let mut report = IngestReport {
            documents: documents.len(),
            ..IngestReport::default()
        };

        report.new_sources = {
            let lexical = self.lexical.read().await;
            documents
                .iter()
                .filter(|doc| !lexical.registry().contains(&doc.source))
                .count()
        };

        let chunks: Vec<Chunk> = documents
            .iter()
            .flat_map(|doc| chunk_document(doc, self.config.chunk_size, self.config.chunk_overlap))
            .collect();
        if chunks.is_empty() {
            debug!("Nothing to ingest");
            return Ok(report);
        }

        // The vocabulary is saved before the lexical commit: a failed save
        // leaves the lexical registry behind, so a retry redoes both.
        let mut corrector = self.corrector.read().await.clone();
        let absorbed = documents
            .iter()
            .filter(|doc| corrector.absorb(&doc.source, &doc.content))
            .count();
        if absorbed > 0 {
            corrector.save(&self.storage.vocab_path()).await?;
            *self.corrector.write().await = corrector;
        }

        // Fit outside the lock so readers are never blocked by a rebuild.
        let mut lexical = self.lexical.read().await.clone();
        report.lexical_chunks = lexical.augment(chunks.clone()).await?;
        *self.lexical.write().await = lexical;

        if self.config.semantic_index {
            let mut semantic = self.semantic.read().await.clone();
            report.semantic_chunks = semantic.add(&self.embedder, chunks).await?;
            *self.semantic.write().await = semantic;
        }

        info!(
            new_sources = report.new_sources,
            lexical_chunks = report.lexical_chunks,
            semantic_chunks = report.semantic_chunks,
            "Ingestion complete"
        );
        Ok(report)
    }

    pub fn lexical_retriever(&self) -> LexicalRetriever {
        LexicalRetriever::new(self.corrector.clone(), self.lexical.clone())
    }

    pub fn semantic_retriever(&self) -> SemanticRetriever {
        SemanticRetriever::new(self.corrector.clone(), self.semantic.clone(), self.embedder.clone())
    }

    /// Hybrid retriever with the configured `fuzzy_k` and degradation policy.
    pub fn hybrid_retriever(&self) -> HybridRetriever {
        HybridRetriever::new(
            self.corrector.clone(),
            self.lexical.clone(),
            self.embedder.clone(),
            self.config.fuzzy_k,
        )
        .allow_degraded(self.config.allow_degraded)
    }

    pub fn retriever(&self, strategy: Strategy) -> Arc<dyn Retriever> {
        match strategy {
            Strategy::Lexical => Arc::new(self.lexical_retriever()),
            Strategy::Semantic => Arc::new(self.semantic_retriever()),
            Strategy::Hybrid => Arc::new(self.hybrid_retriever()),
        }
    }

    /// Hybrid search for the top `k` chunks.
    pub async fn search(&self, query: &str, k: usize) -> Result<Vec<RetrievalResult>> {
        self.hybrid_retriever().retrieve(query, k).await
    }

    /// Retrieves relevant context for a query, formatted for a prompt.
    ///
    /// The format is:
    /// ```text
    /// Relevant context from your knowledge base:
    ///
    /// [1] <first most relevant chunk>
    /// [2] <second most relevant chunk>
    /// ```
    ///
    /// Returns an empty string when nothing relevant is found.
    pub async fn retrieve_context(&self, query: &str) -> Result<String> {
        let results = self.search(query, self.config.semantic_k).await?;
        debug!(results = results.len(), "Retrieved context");
        Ok(format_context(&results))
    }

    pub fn normalizer(&self) -> &TextNormalizer {
        &self.normalizer
    }

    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// Spelling-corrected form of `query`.
    pub async fn correct(&self, query: &str) -> String {
        self.corrector.read().await.correct(query)
    }

    /// Number of chunks in the lexical index.
    pub async fn count(&self) -> usize {
        self.lexical.read().await.len()
    }

    /// Sources present in the lexical index.
    pub async fn sources(&self) -> Vec<String> {
        self.lexical.read().await.registry().iter().map(str::to_string).collect()
    }

    pub async fn states(&self) -> (IndexState, IndexState) {
        (self.lexical.read().await.state(), self.semantic.read().await.state())
    }
}

/// Render results as a numbered context block.
pub fn format_context(results: &[RetrievalResult]) -> String {
    if results.is_empty() {
        return String::new();
    }

    let mut context = String::from("Relevant context from your knowledge base:\n");
    for (i, result) in results.iter().enumerate() {
        context.push_str(&format!("\n[{}] {}\n", i + 1, result.chunk.content.trim()));
    }
    context
}
