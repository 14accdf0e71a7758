//! Dense vector index over chunks.
//!
//! A flat index: every search scans all vectors and ranks them by Euclidean
//! distance (lower is better). Corpora here are small enough that an
//! approximate structure would not pay for itself, and the same type serves
//! as the ephemeral candidate index of the hybrid retriever.

use super::artifact::{self, ArtifactHeader, SOURCES_FILE};
use super::embedder::Embedder;
use super::registry::SourceRegistry;
use super::types::{Chunk, RetrievalResult, Strategy};
use super::{IndexState, RagError, Result};
use crate::persist::new_generation;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const INDEX_FILE: &str = "index.json";
const DOCSTORE_FILE: &str = "docstore.json";

#[derive(Serialize, Deserialize)]
struct IndexFile {
    #[serde(flatten)]
    header: ArtifactHeader,
    dimensions: usize,
    vectors: Vec<Vec<f32>>,
}

#[derive(Serialize, Deserialize)]
struct DocstoreFile {
    #[serde(flatten)]
    header: ArtifactHeader,
    chunks: Vec<Chunk>,
}

#[derive(Serialize, Deserialize)]
struct SourcesFile {
    #[serde(flatten)]
    header: ArtifactHeader,
    sources: SourceRegistry,
}

fn euclidean_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt()
}

/// Flat L2 index with an optional on-disk home.
#[derive(Debug, Clone)]
pub struct SemanticIndex {
    dir: Option<PathBuf>,
    dimensions: Option<usize>,
    chunks: Vec<Chunk>,
    vectors: Vec<Vec<f32>>,
    registry: SourceRegistry,
    state: IndexState,
}

impl SemanticIndex {
    /// Empty index persisted under `dir`. `dimensions` is fixed by the first
    /// insertion when not given.
    pub fn new(dir: impl Into<PathBuf>, dimensions: Option<usize>) -> Self {
        Self {
            dir: Some(dir.into()),
            ..Self::in_memory(dimensions)
        }
    }

    /// Index that lives only in memory.
    pub fn in_memory(dimensions: Option<usize>) -> Self {
        Self {
            dir: None,
            dimensions,
            chunks: Vec::new(),
            vectors: Vec::new(),
            registry: SourceRegistry::new(),
            state: IndexState::Fresh,
        }
    }

    /// In-memory index over precomputed vectors.
    pub fn from_embeddings(chunks: Vec<Chunk>, vectors: Vec<Vec<f32>>) -> Result<Self> {
        if chunks.is_empty() {
            return Err(RagError::EmptyCorpus);
        }
        let mut index = Self::in_memory(None);
        index.insert(chunks, vectors)?;
        Ok(index)
    }

    /// Load the artifacts under `dir`.
    ///
    /// Fails with [`RagError::DimensionMismatch`] when `expected` is given and
    /// differs from the persisted vector size.
    pub async fn load(dir: impl Into<PathBuf>, expected: Option<usize>) -> Result<Self> {
        let dir = dir.into();
        let (index_path, docstore_path, sources_path) = Self::paths(&dir);

        let index_file: IndexFile = artifact::read_required(&index_path).await?;
        let docstore: DocstoreFile = artifact::read_required(&docstore_path).await?;
        let sources: SourcesFile = artifact::read_required(&sources_path).await?;

        artifact::check_headers(
            &dir,
            &[
                (&index_path, &index_file.header),
                (&docstore_path, &docstore.header),
                (&sources_path, &sources.header),
            ],
        )?;

        if let Some(expected) = expected {
            if expected != index_file.dimensions {
                return Err(RagError::DimensionMismatch {
                    expected,
                    found: index_file.dimensions,
                });
            }
        }
        if index_file.vectors.len() != docstore.chunks.len()
            || index_file.vectors.iter().any(|v| v.len() != index_file.dimensions)
        {
            return Err(RagError::StaleArtifacts(dir));
        }

        info!(
            dir = %dir.display(),
            chunks = docstore.chunks.len(),
            dimensions = index_file.dimensions,
            "Loaded semantic index"
        );

        Ok(Self {
            dir: Some(dir),
            dimensions: Some(index_file.dimensions),
            chunks: docstore.chunks,
            vectors: index_file.vectors,
            registry: sources.sources,
            state: IndexState::Loaded,
        })
    }

    /// Load the index under `dir` or start fresh; stale artifacts open fresh
    /// with an empty registry. Dimension mismatches and unsupported format
    /// versions are never masked.
    pub async fn open_or_create(dir: impl Into<PathBuf>, expected: Option<usize>) -> Result<Self> {
        let dir = dir.into();
        let (index_path, docstore_path, sources_path) = Self::paths(&dir);
        if !artifact::any_exists(&[&index_path, &docstore_path, &sources_path]).await? {
            debug!(dir = %dir.display(), "No semantic index on disk, starting fresh");
            return Ok(Self::new(dir, expected));
        }

        match Self::load(dir.clone(), expected).await {
            Ok(index) => Ok(index),
            Err(
                e @ (RagError::DimensionMismatch { .. }
                | RagError::UnsupportedFormat { .. }
                | RagError::Io { .. }),
            ) => Err(e),
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "Semantic index is stale, it will be rebuilt");
                Ok(Self::new(dir, expected))
            }
        }
    }

    fn paths(dir: &Path) -> (PathBuf, PathBuf, PathBuf) {
        (
            dir.join(INDEX_FILE),
            dir.join(DOCSTORE_FILE),
            dir.join(SOURCES_FILE),
        )
    }

    fn check_dimensions(&self, vector: &[f32]) -> Result<()> {
        match self.dimensions {
            Some(expected) if expected != vector.len() => Err(RagError::DimensionMismatch {
                expected,
                found: vector.len(),
            }),
            _ => Ok(()),
        }
    }

    /// Append chunks with their vectors, in memory only.
    pub fn insert(&mut self, chunks: Vec<Chunk>, vectors: Vec<Vec<f32>>) -> Result<()> {
        if chunks.len() != vectors.len() {
            return Err(RagError::InvalidConfig(format!(
                "{} chunks but {} vectors",
                chunks.len(),
                vectors.len()
            )));
        }

        let mut dimensions = self.dimensions;
        for vector in &vectors {
            let expected = *dimensions.get_or_insert(vector.len());
            if expected != vector.len() {
                return Err(RagError::DimensionMismatch {
                    expected,
                    found: vector.len(),
                });
            }
        }

        self.dimensions = dimensions;
        self.registry.extend(chunks.iter().map(|c| c.source.clone()));
        self.chunks.extend(chunks);
        self.vectors.extend(vectors);
        Ok(())
    }

    /// Embed `chunks` and replace the index contents with them.
    pub async fn build(&mut self, embedder: &Embedder, chunks: Vec<Chunk>) -> Result<()> {
        if chunks.is_empty() {
            return Err(RagError::EmptyCorpus);
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let vectors = embedder.embed_batch(&texts).await?;

        let mut rebuilt = Self {
            dir: self.dir.clone(),
            ..Self::in_memory(self.dimensions)
        };
        rebuilt.insert(chunks, vectors)?;
        rebuilt.state = self.state;
        *self = rebuilt;

        info!(chunks = self.chunks.len(), "Built semantic index");
        Ok(())
    }

    /// Embed and add chunks from unregistered sources, then persist.
    ///
    /// Returns the number of chunks added. In-memory state changes only once
    /// the new artifacts are on disk.
    pub async fn add(&mut self, embedder: &Embedder, chunks: Vec<Chunk>) -> Result<usize> {
        let new_chunks: Vec<Chunk> = chunks
            .into_iter()
            .filter(|c| !self.registry.contains(&c.source))
            .collect();
        if new_chunks.is_empty() {
            debug!("No new sources for the semantic index");
            return Ok(0);
        }

        let texts: Vec<String> = new_chunks.iter().map(|c| c.content.clone()).collect();
        let vectors = embedder.embed_batch(&texts).await?;

        let added = new_chunks.len();
        let mut updated = self.clone();
        updated.insert(new_chunks, vectors)?;
        updated.persist().await?;
        updated.state = IndexState::Loaded;
        *self = updated;

        info!(added, total = self.chunks.len(), "Augmented semantic index");
        Ok(added)
    }

    /// Write vectors, docstore and registry as one commit. No-op in memory.
    pub async fn persist(&self) -> Result<()> {
        let Some(dir) = &self.dir else {
            return Ok(());
        };
        let generation = new_generation();
        let (index_path, docstore_path, sources_path) = Self::paths(dir);

        let files = vec![
            artifact::encode(
                index_path,
                &IndexFile {
                    header: ArtifactHeader::new(&generation),
                    dimensions: self.dimensions.unwrap_or(0),
                    vectors: self.vectors.clone(),
                },
            )?,
            artifact::encode(
                docstore_path,
                &DocstoreFile {
                    header: ArtifactHeader::new(&generation),
                    chunks: self.chunks.clone(),
                },
            )?,
            artifact::encode(
                sources_path,
                &SourcesFile {
                    header: ArtifactHeader::new(&generation),
                    sources: self.registry.clone(),
                },
            )?,
        ];
        artifact::commit(dir, &files).await?;

        debug!(dir = %dir.display(), chunks = self.chunks.len(), "Persisted semantic index");
        Ok(())
    }

    /// The `k` nearest chunks with their distances, closest first.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<RetrievalResult>> {
        self.check_dimensions(query)?;
        if k == 0 || self.vectors.is_empty() {
            return Ok(Vec::new());
        }

        let mut scored: Vec<(usize, f32)> = self
            .vectors
            .iter()
            .enumerate()
            .map(|(i, vector)| (i, euclidean_distance(query, vector)))
            .collect();
        scored.sort_by(|a, b| a.1.total_cmp(&b.1));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(i, distance)| RetrievalResult {
                chunk: self.chunks[i].clone(),
                score: distance,
                strategy: Strategy::Semantic,
            })
            .collect())
    }

    pub fn state(&self) -> IndexState {
        self.state
    }

    pub fn dimensions(&self) -> Option<usize> {
        self.dimensions
    }

    pub fn registry(&self) -> &SourceRegistry {
        &self.registry
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}
