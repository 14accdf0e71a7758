use serde::{Deserialize, Serialize};

/// Descriptor of an embedding model the engine knows the shape of.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingModel {
    /// Name the provider expects in requests.
    pub id: String,
    pub name: String,
    pub context_length: usize,
    pub embedding_dim: usize,
    pub description: String,
}

/// Lookup table from model id to descriptor.
///
/// Used to resolve the vector size of the configured embedding model, which
/// persisted semantic indexes are checked against.
pub struct ModelRegistry {
    models: Vec<EmbeddingModel>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self {
            models: default_models(),
        }
    }

    /// Finds a model by id. A `:tag` suffix (Ollama style) is ignored.
    pub fn get_embedding(&self, id: &str) -> Option<&EmbeddingModel> {
        let base = id.split(':').next().unwrap_or(id);
        self.models.iter().find(|m| m.id == id || m.id == base)
    }

    pub fn embedding_models(&self) -> impl Iterator<Item = &EmbeddingModel> {
        self.models.iter()
    }
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn model(id: &str, name: &str, context_length: usize, embedding_dim: usize, description: &str) -> EmbeddingModel {
    EmbeddingModel {
        id: id.to_string(),
        name: name.to_string(),
        context_length,
        embedding_dim,
        description: description.to_string(),
    }
}

pub fn default_models() -> Vec<EmbeddingModel> {
    vec![
        model(
            "nomic-embed-text",
            "Nomic Embed Text",
            8192,
            768,
            "General purpose English embeddings (Ollama)",
        ),
        model(
            "mxbai-embed-large",
            "mxbai Embed Large",
            512,
            1024,
            "Higher quality English embeddings (Ollama)",
        ),
        model(
            "all-minilm",
            "all-MiniLM-L6-v2",
            256,
            384,
            "Small sentence-transformers model (Ollama)",
        ),
        model(
            "text-embedding-3-small",
            "OpenAI text-embedding-3-small",
            8191,
            1536,
            "OpenAI hosted embeddings",
        ),
        model(
            "text-embedding-3-large",
            "OpenAI text-embedding-3-large",
            8191,
            3072,
            "OpenAI hosted embeddings, large",
        ),
    ]
}
