//! Retrieval strategies over a knowledge base.
//!
//! All three retrievers correct the query first. The hybrid retriever then
//! narrows the corpus with the lexical index and re-ranks only those
//! candidates by embedding distance.

use super::embedder::Embedder;
use super::semantic::SemanticIndex;
use super::tfidf::LexicalIndex;
use super::types::{RetrievalResult, Strategy};
use super::{RagError, Result};
use crate::text::SpellingCorrector;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// A strategy that turns a query into ranked chunks.
#[async_trait]
pub trait Retriever: Send + Sync {
    /// Up to `k` results, most relevant first.
    async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<RetrievalResult>>;

    fn strategy(&self) -> Strategy;
}

/// TF-IDF cosine ranking over the whole corpus.
#[derive(Clone)]
pub struct LexicalRetriever {
    corrector: Arc<RwLock<SpellingCorrector>>,
    lexical: Arc<RwLock<LexicalIndex>>,
}

impl LexicalRetriever {
    pub fn new(corrector: Arc<RwLock<SpellingCorrector>>, lexical: Arc<RwLock<LexicalIndex>>) -> Self {
        Self { corrector, lexical }
    }
}

#[async_trait]
impl Retriever for LexicalRetriever {
    async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<RetrievalResult>> {
        let corrected = self.corrector.read().await.correct(query);
        Ok(self.lexical.read().await.search(&corrected, k))
    }

    fn strategy(&self) -> Strategy {
        Strategy::Lexical
    }
}

/// Nearest neighbours in the persisted semantic index. Scores are distances.
#[derive(Clone)]
pub struct SemanticRetriever {
    corrector: Arc<RwLock<SpellingCorrector>>,
    semantic: Arc<RwLock<SemanticIndex>>,
    embedder: Embedder,
}

impl SemanticRetriever {
    pub fn new(
        corrector: Arc<RwLock<SpellingCorrector>>,
        semantic: Arc<RwLock<SemanticIndex>>,
        embedder: Embedder,
    ) -> Self {
        Self {
            corrector,
            semantic,
            embedder,
        }
    }
}

#[async_trait]
impl Retriever for SemanticRetriever {
    async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<RetrievalResult>> {
        if k == 0 || self.semantic.read().await.is_empty() {
            return Ok(Vec::new());
        }

        let corrected = self.corrector.read().await.correct(query);
        let query_vector = self.embedder.embed(&corrected).await?;
        self.semantic.read().await.search(&query_vector, k)
    }

    fn strategy(&self) -> Strategy {
        Strategy::Semantic
    }
}

/// Lexical prefilter followed by semantic re-ranking of the candidates.
#[derive(Clone)]
pub struct HybridRetriever {
    corrector: Arc<RwLock<SpellingCorrector>>,
    lexical: Arc<RwLock<LexicalIndex>>,
    embedder: Embedder,
    fuzzy_k: usize,
    allow_degraded: bool,
}

impl HybridRetriever {
    pub fn new(
        corrector: Arc<RwLock<SpellingCorrector>>,
        lexical: Arc<RwLock<LexicalIndex>>,
        embedder: Embedder,
        fuzzy_k: usize,
    ) -> Self {
        Self {
            corrector,
            lexical,
            embedder,
            fuzzy_k,
            allow_degraded: false,
        }
    }

    /// Return lexical results instead of failing when embedding is unavailable.
    pub fn allow_degraded(mut self, allow: bool) -> Self {
        self.allow_degraded = allow;
        self
    }

    pub fn fuzzy_k(&self) -> usize {
        self.fuzzy_k
    }

    async fn rerank(
        &self,
        query: &str,
        candidates: &[RetrievalResult],
        k: usize,
    ) -> Result<Vec<RetrievalResult>> {
        let mut texts = Vec::with_capacity(candidates.len() + 1);
        texts.push(query.to_string());
        texts.extend(candidates.iter().map(|c| c.chunk.content.clone()));

        let mut vectors = self.embedder.embed_batch(&texts).await?;
        let query_vector = vectors.remove(0);

        // Ephemeral: never persisted, dropped when this call returns.
        let sub_index = SemanticIndex::from_embeddings(
            candidates.iter().map(|c| c.chunk.clone()).collect(),
            vectors,
        )?;

        Ok(sub_index
            .search(&query_vector, k)?
            .into_iter()
            .map(|hit| RetrievalResult {
                score: 1.0 / (1.0 + hit.score),
                strategy: Strategy::Hybrid,
                chunk: hit.chunk,
            })
            .collect())
    }
}

#[async_trait]
impl Retriever for HybridRetriever {
    async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<RetrievalResult>> {
        if self.fuzzy_k < k {
            return Err(RagError::InvalidConfig(format!(
                "fuzzy_k ({}) must be at least k ({})",
                self.fuzzy_k, k
            )));
        }
        if k == 0 {
            return Ok(Vec::new());
        }

        let corrected = self.corrector.read().await.correct(query);
        let candidates = self.lexical.read().await.search(&corrected, self.fuzzy_k);
        debug!(query = %corrected, candidates = candidates.len(), "Lexical prefilter");

        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        match self.rerank(&corrected, &candidates, k).await {
            Ok(results) => Ok(results),
            Err(RagError::Embedder(e)) if self.allow_degraded => {
                warn!(error = %e, "Semantic re-ranking unavailable, returning lexical results");
                Ok(candidates.into_iter().take(k).collect())
            }
            Err(e) => Err(e),
        }
    }

    fn strategy(&self) -> Strategy {
        Strategy::Hybrid
    }
}
