//! LLM provider abstraction layer.
//!
//! This module defines a common interface for different LLM backends
//! (OpenAI-compatible servers, Ollama) to provide chat completions and embeddings.

mod types;
pub mod ollama;
pub mod openai;

use crate::config::{EmbeddingConfig, LlmConfig, ProviderKind};
use std::sync::Arc;
use std::time::Duration;

// Re-export common types
pub use types::{
    ChatRequest,
    ChatResponse,
    InvalidRole,
    Message,
    Provider,
    ProviderError,
    RawMessage,
    Result,
    Role,
    Tool,
    ToolCall,
    ToolCallFunction,
    ToolFunction,
};

// Re-export provider implementations
pub use ollama::OllamaProvider;
pub use openai::OpenAiProvider;

/// Build a provider speaking the given API.
pub fn create_provider(
    kind: ProviderKind,
    base_url: &str,
    api_key: Option<String>,
    timeout: Duration,
) -> Result<Arc<dyn Provider>> {
    let provider: Arc<dyn Provider> = match kind {
        ProviderKind::OpenAi => Arc::new(OpenAiProvider::new(base_url, api_key, timeout)?),
        ProviderKind::Ollama => Arc::new(OllamaProvider::new(base_url, timeout)?),
    };
    Ok(provider)
}

/// Provider for chat completions as configured under `llm`.
pub fn chat_provider(config: &LlmConfig) -> Result<Arc<dyn Provider>> {
    create_provider(
        config.provider,
        &config.base_url,
        config.api_key.clone(),
        Duration::from_secs(config.timeout_secs),
    )
}

/// Provider for embeddings as configured under `rag.embedding`.
pub fn embedding_provider(config: &EmbeddingConfig, timeout: Duration) -> Result<Arc<dyn Provider>> {
    create_provider(config.provider, &config.base_url, config.api_key.clone(), timeout)
}
