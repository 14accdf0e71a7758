//! TF-IDF lexical index over chunks.
//!
//! Rows are raw term counts weighted by smoothed IDF,
//! `ln((1 + n) / (1 + df)) + 1`, and L2-normalized, so the dot product of two
//! rows is their cosine similarity. The analyzer is the [`TextNormalizer`].

use super::artifact::{self, ArtifactHeader, SOURCES_FILE};
use super::registry::SourceRegistry;
use super::types::{Chunk, RetrievalResult, Strategy};
use super::{IndexState, RagError, Result};
use crate::persist::new_generation;
use crate::text::TextNormalizer;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const VECTORIZER_FILE: &str = "vectorizer.json";
const MATRIX_FILE: &str = "matrix.json";

/// Sparse row: `(term index, weight)` sorted by term index.
pub type SparseVector = Vec<(u32, f32)>;

/// Vocabulary and IDF weights fitted on a corpus.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TfidfVectorizer {
    /// Terms in index order (sorted).
    terms: Vec<String>,
    idf: Vec<f32>,
    #[serde(skip)]
    lookup: HashMap<String, u32>,
}

impl TfidfVectorizer {
    pub fn fit<S: AsRef<str>>(normalizer: &TextNormalizer, documents: &[S]) -> Self {
        let tokenized: Vec<Vec<String>> = documents
            .iter()
            .map(|doc| normalizer.normalize(doc.as_ref()))
            .collect();

        let mut df: BTreeMap<&str, usize> = BTreeMap::new();
        for tokens in &tokenized {
            let unique: HashSet<&str> = tokens.iter().map(String::as_str).collect();
            for term in unique {
                *df.entry(term).or_insert(0) += 1;
            }
        }

        let n = documents.len() as f32;
        let (terms, idf): (Vec<String>, Vec<f32>) = df
            .into_iter()
            .map(|(term, count)| (term.to_string(), ((1.0 + n) / (1.0 + count as f32)).ln() + 1.0))
            .unzip();

        let mut vectorizer = Self {
            terms,
            idf,
            lookup: HashMap::new(),
        };
        vectorizer.rebuild_lookup();
        vectorizer
    }

    fn rebuild_lookup(&mut self) {
        self.lookup = self
            .terms
            .iter()
            .enumerate()
            .map(|(i, term)| (term.clone(), i as u32))
            .collect();
    }

    pub fn vocabulary_size(&self) -> usize {
        self.terms.len()
    }

    pub fn idf(&self, term: &str) -> Option<f32> {
        self.lookup.get(term).map(|&i| self.idf[i as usize])
    }

    /// Weight a text against the fitted vocabulary. Unknown terms are ignored.
    pub fn transform(&self, normalizer: &TextNormalizer, text: &str) -> SparseVector {
        let mut counts: BTreeMap<u32, f32> = BTreeMap::new();
        for token in normalizer.normalize(text) {
            if let Some(&index) = self.lookup.get(&token) {
                *counts.entry(index).or_insert(0.0) += 1.0;
            }
        }

        let mut row: SparseVector = counts
            .into_iter()
            .map(|(index, count)| (index, count * self.idf[index as usize]))
            .collect();

        let norm = row.iter().map(|(_, w)| w * w).sum::<f32>().sqrt();
        if norm > 0.0 {
            for (_, weight) in &mut row {
                *weight /= norm;
            }
        }
        row
    }
}

/// Dot product of two sorted sparse vectors.
fn sparse_dot(a: &[(u32, f32)], b: &[(u32, f32)]) -> f32 {
    let (mut i, mut j, mut sum) = (0, 0, 0.0);
    while i < a.len() && j < b.len() {
        match a[i].0.cmp(&b[j].0) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                sum += a[i].1 * b[j].1;
                i += 1;
                j += 1;
            }
        }
    }
    sum
}

#[derive(Serialize, Deserialize)]
struct VectorizerFile {
    #[serde(flatten)]
    header: ArtifactHeader,
    vectorizer: TfidfVectorizer,
}

#[derive(Serialize, Deserialize)]
struct MatrixFile {
    #[serde(flatten)]
    header: ArtifactHeader,
    chunks: Vec<Chunk>,
    rows: Vec<SparseVector>,
}

#[derive(Serialize, Deserialize)]
struct SourcesFile {
    #[serde(flatten)]
    header: ArtifactHeader,
    sources: SourceRegistry,
}

/// Fitted vectorizer and the matrix aligned with its chunk list.
#[derive(Debug, Clone, Default)]
struct Fitted {
    vectorizer: TfidfVectorizer,
    chunks: Vec<Chunk>,
    rows: Vec<SparseVector>,
}

impl Fitted {
    fn fit(normalizer: &TextNormalizer, chunks: Vec<Chunk>) -> Self {
        let texts: Vec<&str> = chunks.iter().map(|c| c.content.as_str()).collect();
        let vectorizer = TfidfVectorizer::fit(normalizer, &texts);
        let rows = texts
            .iter()
            .map(|text| vectorizer.transform(normalizer, text))
            .collect();
        Self { vectorizer, chunks, rows }
    }
}

/// Persisted TF-IDF index with its source registry.
#[derive(Debug, Clone)]
pub struct LexicalIndex {
    dir: PathBuf,
    normalizer: TextNormalizer,
    fitted: Fitted,
    registry: SourceRegistry,
    state: IndexState,
}

impl LexicalIndex {
    /// Empty, unfitted index that will persist under `dir`.
    pub fn new(dir: impl Into<PathBuf>, normalizer: TextNormalizer) -> Self {
        Self {
            dir: dir.into(),
            normalizer,
            fitted: Fitted::default(),
            registry: SourceRegistry::new(),
            state: IndexState::Fresh,
        }
    }

    /// Load the artifacts under `dir`; all three must exist and agree.
    pub async fn load(dir: impl Into<PathBuf>, normalizer: TextNormalizer) -> Result<Self> {
        let dir = dir.into();
        let (vectorizer_path, matrix_path, sources_path) = Self::paths(&dir);

        let vectorizer_file: VectorizerFile = artifact::read_required(&vectorizer_path).await?;
        let matrix_file: MatrixFile = artifact::read_required(&matrix_path).await?;
        let sources_file: SourcesFile = artifact::read_required(&sources_path).await?;

        artifact::check_headers(
            &dir,
            &[
                (&vectorizer_path, &vectorizer_file.header),
                (&matrix_path, &matrix_file.header),
                (&sources_path, &sources_file.header),
            ],
        )?;
        if matrix_file.rows.len() != matrix_file.chunks.len() {
            return Err(RagError::StaleArtifacts(dir));
        }

        let mut vectorizer = vectorizer_file.vectorizer;
        vectorizer.rebuild_lookup();

        info!(
            dir = %dir.display(),
            chunks = matrix_file.chunks.len(),
            vocabulary = vectorizer.vocabulary_size(),
            "Loaded lexical index"
        );

        Ok(Self {
            dir,
            normalizer,
            fitted: Fitted {
                vectorizer,
                chunks: matrix_file.chunks,
                rows: matrix_file.rows,
            },
            registry: sources_file.sources,
            state: IndexState::Loaded,
        })
    }

    /// Load the index under `dir`, or start fresh.
    ///
    /// Missing artifacts give a fresh index. Artifacts that are incomplete,
    /// unreadable or from different commits are treated as stale: the handle
    /// is fresh with an empty registry, so the next ingestion rebuilds
    /// everything. An unsupported format version is returned as an error so
    /// the artifacts are never overwritten.
    pub async fn open_or_create(dir: impl Into<PathBuf>, normalizer: TextNormalizer) -> Result<Self> {
        let dir = dir.into();
        let (vectorizer_path, matrix_path, sources_path) = Self::paths(&dir);
        if !artifact::any_exists(&[&vectorizer_path, &matrix_path, &sources_path]).await? {
            debug!(dir = %dir.display(), "No lexical index on disk, starting fresh");
            return Ok(Self::new(dir, normalizer));
        }

        match Self::load(dir.clone(), normalizer.clone()).await {
            Ok(index) => Ok(index),
            Err(e @ (RagError::Io { .. } | RagError::UnsupportedFormat { .. })) => Err(e),
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "Lexical index is stale, it will be rebuilt");
                Ok(Self::new(dir, normalizer))
            }
        }
    }

    fn paths(dir: &Path) -> (PathBuf, PathBuf, PathBuf) {
        (
            dir.join(VECTORIZER_FILE),
            dir.join(MATRIX_FILE),
            dir.join(SOURCES_FILE),
        )
    }

    /// Fit from scratch on `chunks`, replacing the current contents.
    ///
    /// The registry becomes the set of sources in `chunks`. Nothing is written
    /// until [`persist`](Self::persist).
    pub fn build(&mut self, chunks: Vec<Chunk>) -> Result<()> {
        if chunks.is_empty() {
            return Err(RagError::EmptyCorpus);
        }

        let mut registry = SourceRegistry::new();
        registry.extend(chunks.iter().map(|c| c.source.clone()));

        self.fitted = Fitted::fit(&self.normalizer, chunks);
        self.registry = registry;
        info!(
            chunks = self.fitted.chunks.len(),
            vocabulary = self.fitted.vectorizer.vocabulary_size(),
            "Built lexical index"
        );
        Ok(())
    }

    /// Write vectorizer, matrix and registry as one commit.
    pub async fn persist(&self) -> Result<()> {
        Self::write(&self.dir, &self.fitted, &self.registry).await
    }

    async fn write(dir: &Path, fitted: &Fitted, registry: &SourceRegistry) -> Result<()> {
        let generation = new_generation();
        let (vectorizer_path, matrix_path, sources_path) = Self::paths(dir);

        // Registry goes last: it may only name sources the matrix holds.
        let files = vec![
            artifact::encode(
                vectorizer_path,
                &VectorizerFile {
                    header: ArtifactHeader::new(&generation),
                    vectorizer: fitted.vectorizer.clone(),
                },
            )?,
            artifact::encode(
                matrix_path,
                &MatrixFile {
                    header: ArtifactHeader::new(&generation),
                    chunks: fitted.chunks.clone(),
                    rows: fitted.rows.clone(),
                },
            )?,
            artifact::encode(
                sources_path,
                &SourcesFile {
                    header: ArtifactHeader::new(&generation),
                    sources: registry.clone(),
                },
            )?,
        ];
        artifact::commit(dir, &files).await?;

        debug!(dir = %dir.display(), chunks = fitted.chunks.len(), "Persisted lexical index");
        Ok(())
    }

    /// Add chunks from sources not yet registered, refit and persist.
    ///
    /// Returns the number of chunks added. In-memory state changes only once
    /// the new artifacts are on disk.
    pub async fn augment(&mut self, chunks: Vec<Chunk>) -> Result<usize> {
        let new_chunks: Vec<Chunk> = chunks
            .into_iter()
            .filter(|c| !self.registry.contains(&c.source))
            .collect();
        if new_chunks.is_empty() {
            debug!("No new sources for the lexical index");
            return Ok(0);
        }

        let added = new_chunks.len();
        let mut registry = self.registry.clone();
        registry.extend(new_chunks.iter().map(|c| c.source.clone()));

        let mut all_chunks = self.fitted.chunks.clone();
        all_chunks.extend(new_chunks);
        let fitted = Fitted::fit(&self.normalizer, all_chunks);

        Self::write(&self.dir, &fitted, &registry).await?;

        self.fitted = fitted;
        self.registry = registry;
        self.state = IndexState::Loaded;
        info!(added, total = self.fitted.chunks.len(), "Augmented lexical index");
        Ok(added)
    }

    /// Top `k` chunks by cosine similarity, only those with similarity > 0.
    ///
    /// Ties keep insertion order.
    pub fn search(&self, query: &str, k: usize) -> Vec<RetrievalResult> {
        if k == 0 || self.fitted.rows.is_empty() {
            return Vec::new();
        }

        let query_row = self.fitted.vectorizer.transform(&self.normalizer, query);
        if query_row.is_empty() {
            return Vec::new();
        }

        let mut scored: Vec<(usize, f32)> = self
            .fitted
            .rows
            .iter()
            .enumerate()
            .map(|(i, row)| (i, sparse_dot(&query_row, row)))
            .filter(|(_, score)| *score > 0.0)
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(k);

        scored
            .into_iter()
            .map(|(i, score)| RetrievalResult {
                chunk: self.fitted.chunks[i].clone(),
                score,
                strategy: Strategy::Lexical,
            })
            .collect()
    }

    pub fn state(&self) -> IndexState {
        self.state
    }

    pub fn registry(&self) -> &SourceRegistry {
        &self.registry
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.fitted.chunks
    }

    pub fn vectorizer(&self) -> &TfidfVectorizer {
        &self.fitted.vectorizer
    }

    pub fn normalizer(&self) -> &TextNormalizer {
        &self.normalizer
    }

    pub fn len(&self) -> usize {
        self.fitted.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fitted.chunks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn chunks(texts: &[(&str, &str)]) -> Vec<Chunk> {
        texts
            .iter()
            .map(|(source, text)| Chunk::new(*source, 0, 0, *text))
            .collect()
    }

    fn corpus() -> Vec<Chunk> {
        chunks(&[
            ("paris.txt", "Paris has the Eiffel Tower."),
            ("tokyo.txt", "Tokyo has Senso-ji Temple."),
            ("rome.txt", "Rome has the Colosseum and many temples."),
        ])
    }

    #[test]
    fn test_smoothed_idf() {
        let normalizer = TextNormalizer::default();
        let v = TfidfVectorizer::fit(&normalizer, &["tower temple", "temple"]);

        let expected_tower = (3.0f32 / 2.0).ln() + 1.0;
        assert!((v.idf("tower").unwrap() - expected_tower).abs() < 1e-6);
        assert!((v.idf("temple").unwrap() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_rows_are_unit_length() {
        let normalizer = TextNormalizer::default();
        let v = TfidfVectorizer::fit(&normalizer, &["tower temple tower", "temple"]);
        let row = v.transform(&normalizer, "tower temple tower");
        let norm: f32 = row.iter().map(|(_, w)| w * w).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_build_empty_corpus_fails() {
        let mut index = LexicalIndex::new("unused", TextNormalizer::default());
        assert!(matches!(index.build(vec![]), Err(RagError::EmptyCorpus)));
    }

    #[test]
    fn test_search_bounds_and_order() {
        let mut index = LexicalIndex::new("unused", TextNormalizer::default());
        index.build(corpus()).unwrap();

        let results = index.search("temple", 10);
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.score > 0.0 && r.strategy == Strategy::Lexical));
        assert!(results.windows(2).all(|w| w[0].score >= w[1].score));

        assert_eq!(index.search("temple", 1).len(), 1);
        assert!(index.search("temple", 0).is_empty());
        assert!(index.search("submarine", 5).is_empty());
    }

    #[test]
    fn test_ties_keep_insertion_order() {
        let mut index = LexicalIndex::new("unused", TextNormalizer::default());
        index
            .build(chunks(&[("a", "harbor"), ("b", "harbor"), ("c", "harbor")]))
            .unwrap();

        let sources: Vec<String> = index
            .search("harbor", 3)
            .into_iter()
            .map(|r| r.chunk.source)
            .collect();
        assert_eq!(sources, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_persist_and_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let mut index = LexicalIndex::new(dir.path(), TextNormalizer::default());
        index.build(corpus()).unwrap();
        index.persist().await.unwrap();

        let loaded = LexicalIndex::load(dir.path(), TextNormalizer::default()).await.unwrap();
        assert_eq!(loaded.state(), IndexState::Loaded);
        assert_eq!(loaded.chunks(), index.chunks());
        assert_eq!(loaded.registry(), index.registry());
        assert_eq!(loaded.search("eiffel tower", 3), index.search("eiffel tower", 3));
    }

    #[tokio::test]
    async fn test_augment_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let mut index = LexicalIndex::open_or_create(dir.path(), TextNormalizer::default())
            .await
            .unwrap();
        assert_eq!(index.state(), IndexState::Fresh);

        assert_eq!(index.augment(corpus()).await.unwrap(), 3);
        let first = index.search("temple", 5);

        assert_eq!(index.augment(corpus()).await.unwrap(), 0);
        assert_eq!(index.len(), 3);
        assert_eq!(index.search("temple", 5), first);

        let reopened = LexicalIndex::open_or_create(dir.path(), TextNormalizer::default())
            .await
            .unwrap();
        assert_eq!(reopened.state(), IndexState::Loaded);
        assert_eq!(reopened.len(), 3);
    }

    #[tokio::test]
    async fn test_augment_adds_only_new_sources() {
        let dir = TempDir::new().unwrap();
        let mut index = LexicalIndex::new(dir.path(), TextNormalizer::default());
        index.augment(corpus()[..1].to_vec()).await.unwrap();

        let added = index.augment(corpus()).await.unwrap();
        assert_eq!(added, 2);
        assert_eq!(index.registry().len(), 3);
    }

    #[tokio::test]
    async fn test_half_written_artifacts_open_fresh() {
        let dir = TempDir::new().unwrap();
        let mut index = LexicalIndex::new(dir.path(), TextNormalizer::default());
        index.build(corpus()).unwrap();
        index.persist().await.unwrap();

        // Replace the matrix with one from another commit.
        let mut other = LexicalIndex::new(dir.path(), TextNormalizer::default());
        other.build(corpus()[..1].to_vec()).unwrap();
        let matrix = dir.path().join(MATRIX_FILE);
        let saved = std::fs::read(&matrix).unwrap();
        other.persist().await.unwrap();
        let other_matrix = std::fs::read(&matrix).unwrap();
        index.persist().await.unwrap();
        assert_ne!(saved, other_matrix);
        std::fs::write(&matrix, other_matrix).unwrap();

        let reopened = LexicalIndex::open_or_create(dir.path(), TextNormalizer::default())
            .await
            .unwrap();
        assert_eq!(reopened.state(), IndexState::Fresh);
        assert!(reopened.registry().is_empty());
        assert!(matches!(
            LexicalIndex::load(dir.path(), TextNormalizer::default()).await,
            Err(RagError::StaleArtifacts(_))
        ));
    }

    #[tokio::test]
    async fn test_unsupported_format_is_not_overwritten() {
        let dir = TempDir::new().unwrap();
        let mut index = LexicalIndex::new(dir.path(), TextNormalizer::default());
        index.build(corpus()).unwrap();
        index.persist().await.unwrap();

        for name in [VECTORIZER_FILE, MATRIX_FILE, SOURCES_FILE] {
            let path = dir.path().join(name);
            let text = std::fs::read_to_string(&path).unwrap();
            assert!(text.contains("\"format_version\":1"));
            std::fs::write(&path, text.replace("\"format_version\":1", "\"format_version\":99")).unwrap();
        }
        let before = std::fs::read(dir.path().join(MATRIX_FILE)).unwrap();

        let result = LexicalIndex::open_or_create(dir.path(), TextNormalizer::default()).await;
        assert!(matches!(result, Err(RagError::UnsupportedFormat { found: 99, .. })));
        assert_eq!(std::fs::read(dir.path().join(MATRIX_FILE)).unwrap(), before);
    }
}
