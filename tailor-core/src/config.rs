use crate::models::ModelRegistry;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Configuration for the whole engine: model endpoint, retrieval and storage.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub rag: RagConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Which HTTP API a provider speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// OpenAI-compatible `/chat/completions` and `/embeddings`
    OpenAi,
    /// Ollama `/api/chat` and `/api/embed`
    Ollama,
}

/// Configuration for the model endpoint and the tool orchestration loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub provider: ProviderKind,
    pub model: String,
    pub base_url: String,
    pub api_key: Option<String>,
    pub temperature: f64,
    /// Model context window in tokens; used by compression helpers.
    pub context_window: usize,
    /// Per-attempt request timeout.
    pub timeout_secs: u64,
    /// Total attempts for a model request on transport failures.
    pub max_retries: u32,
    /// Base delay of the exponential backoff between attempts.
    pub retry_backoff_ms: u64,
    /// Hard ceiling on tool-calling rounds per query.
    pub max_tool_calls: usize,
    pub system_prompt: String,
}

/// Configuration for retrieval.
///
/// This covers embedding settings and text processing behavior (chunking,
/// candidate counts, lexicon).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RagConfig {
    pub embedding: EmbeddingConfig,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    /// Candidates kept by the lexical prefilter.
    pub fuzzy_k: usize,
    /// Final results returned by semantic (re-)ranking.
    pub semantic_k: usize,
    /// Fall back to lexical-only results when the semantic stage is unavailable.
    pub allow_degraded: bool,
    /// Maintain the persisted dense index during ingestion. Hybrid search
    /// embeds its candidates on the fly and does not need it.
    pub semantic_index: bool,
    /// Optional JSON lexicon replacing the built-in English one.
    pub lexicon_path: Option<PathBuf>,
    pub indexer: IndexerConfig,
}

/// Embedding endpoint and model.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub provider: ProviderKind,
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    /// Vector size; looked up in the model registry when omitted.
    pub dims: Option<usize>,
}

impl EmbeddingConfig {
    /// Resolved dimensionality of the configured embedding model.
    pub fn dimensions(&self) -> Option<usize> {
        self.dims.or_else(|| {
            ModelRegistry::new()
                .get_embedding(&self.model)
                .map(|model| model.embedding_dim)
        })
    }
}

/// Configuration for corpus collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexerConfig {
    /// File extensions to ingest (e.g., ["txt", "md"])
    /// Empty list means every readable text file
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,

    /// Directory or file names to skip; matched against whole path components
    #[serde(default = "default_exclude_patterns")]
    pub exclude_patterns: Vec<String>,
}

fn default_extensions() -> Vec<String> {
    vec!["txt".to_string()]
}

fn default_exclude_patterns() -> Vec<String> {
    crate::patterns::default_exclude_patterns()
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            extensions: default_extensions(),
            exclude_patterns: default_exclude_patterns(),
        }
    }
}

/// On-disk locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Root of every persisted artifact.
    pub data_path: PathBuf,
    /// Directory holding the source documents.
    pub docs_path: PathBuf,
}

impl StorageConfig {
    pub fn tfidf_dir(&self) -> PathBuf {
        self.data_path.join("tfidf")
    }

    pub fn vector_dir(&self) -> PathBuf {
        self.data_path.join("vector")
    }

    pub fn vocab_path(&self) -> PathBuf {
        self.data_path.join("vocab.json")
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_path: PathBuf::from("./data"),
            docs_path: PathBuf::from("./data/docs"),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::Ollama,
            base_url: "http://localhost:11434".to_string(),
            api_key: None,
            model: "nomic-embed-text".to_string(),
            dims: None,
        }
    }
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            embedding: EmbeddingConfig::default(),
            chunk_size: 512,
            chunk_overlap: 50,
            fuzzy_k: 20,
            semantic_k: 5,
            allow_degraded: false,
            semantic_index: true,
            lexicon_path: None,
            indexer: IndexerConfig::default(),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::OpenAi,
            model: "gpt-4o-mini".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: None,
            temperature: 0.7,
            context_window: 8192,
            timeout_secs: 30,
            max_retries: 3,
            retry_backoff_ms: 500,
            max_tool_calls: 5,
            system_prompt: "You are a helpful travel assistant. Use the provided context and tools \
                            to answer. If you don't know the answer, say that you don't know."
                .to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a YAML file and validate it.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&contents)?;
        config.validate()?;

        Ok(config)
    }

    /// Load configuration from `config.yaml` if it exists, otherwise use defaults.
    pub fn load_or_default() -> Self {
        let path = Path::new("config.yaml");
        if !path.exists() {
            return Self::default();
        }

        Self::load(path).unwrap_or_else(|e| {
            warn!(error = %e, "Ignoring config.yaml, falling back to defaults");
            Self::default()
        })
    }

    /// Reject settings that can never produce a correct result.
    pub fn validate(&self) -> Result<()> {
        let rag = &self.rag;
        if rag.chunk_size == 0 {
            return Err(ConfigError::Invalid("rag.chunk_size must be positive".into()));
        }
        if rag.chunk_overlap >= rag.chunk_size {
            return Err(ConfigError::Invalid(format!(
                "rag.chunk_overlap ({}) must be smaller than rag.chunk_size ({})",
                rag.chunk_overlap, rag.chunk_size
            )));
        }
        if rag.fuzzy_k < rag.semantic_k {
            return Err(ConfigError::Invalid(format!(
                "rag.fuzzy_k ({}) must be at least rag.semantic_k ({})",
                rag.fuzzy_k, rag.semantic_k
            )));
        }
        if !self.llm.base_url.starts_with("http://") && !self.llm.base_url.starts_with("https://") {
            return Err(ConfigError::Invalid(format!(
                "llm.base_url must start with http:// or https:// (got '{}')",
                self.llm.base_url
            )));
        }
        if self.llm.max_retries == 0 {
            return Err(ConfigError::Invalid("llm.max_retries must be at least 1".into()));
        }
        if self.llm.retry_backoff_ms >= self.llm.timeout_secs.saturating_mul(1000) {
            return Err(ConfigError::Invalid(
                "llm.retry_backoff_ms must be below the request timeout".into(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_storage_layout() {
        let config = StorageConfig::default();
        assert_eq!(config.tfidf_dir(), PathBuf::from("./data/tfidf"));
        assert_eq!(config.vector_dir(), PathBuf::from("./data/vector"));
        assert_eq!(config.vocab_path(), PathBuf::from("./data/vocab.json"));
    }

    #[test]
    fn test_rag_config_defaults() {
        let config = RagConfig::default();
        assert_eq!(config.chunk_size, 512);
        assert_eq!(config.chunk_overlap, 50);
        assert!(config.fuzzy_k >= config.semantic_k);
        assert_eq!(config.indexer.extensions, vec!["txt".to_string()]);
    }

    #[test]
    fn test_fuzzy_k_below_k_rejected() {
        let mut config = Config::default();
        config.rag.fuzzy_k = 2;
        config.rag.semantic_k = 3;

        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_overlap_must_be_smaller_than_chunk() {
        let mut config = Config::default();
        config.rag.chunk_overlap = config.rag.chunk_size;

        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let yaml = "llm:\n  model: test-model\n  max_tool_calls: 2\nrag:\n  fuzzy_k: 10\n";
        let config: Config = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.llm.model, "test-model");
        assert_eq!(config.llm.max_tool_calls, 2);
        assert_eq!(config.llm.max_retries, 3);
        assert_eq!(config.rag.fuzzy_k, 10);
        assert_eq!(config.rag.chunk_size, 512);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_provider_kind_names() {
        let kind: ProviderKind = serde_yaml::from_str("openai").unwrap();
        assert_eq!(kind, ProviderKind::OpenAi);
        let kind: ProviderKind = serde_yaml::from_str("ollama").unwrap();
        assert_eq!(kind, ProviderKind::Ollama);
    }

    #[test]
    fn test_embedding_dims_from_registry() {
        let config = EmbeddingConfig::default();
        assert_eq!(config.dimensions(), Some(768));

        let explicit = EmbeddingConfig {
            dims: Some(12),
            ..EmbeddingConfig::default()
        };
        assert_eq!(explicit.dimensions(), Some(12));
    }
}
