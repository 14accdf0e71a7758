//! tailor-core - retrieval and orchestration engine
//!
//! Provides the building blocks of a retrieval-augmented assistant:
//! - Model provider abstraction (OpenAI-compatible, Ollama)
//! - Text normalization and query spelling correction
//! - Lexical, semantic and hybrid retrieval over a persisted knowledge base
//! - Bounded tool-calling orchestration with retries
//! - Configuration management

pub mod chat;
pub mod config;
pub mod models;
pub mod patterns;
mod persist;
pub mod provider;
pub mod rag;
pub mod text;

pub use chat::{estimate_tokens, ChatError, ChatManager, QueryOutcome, RetryPolicy};
pub use config::{Config, IndexerConfig, LlmConfig, ProviderKind, RagConfig, StorageConfig};
pub use rag::{
    Chunk, Document, HybridRetriever, IndexState, IngestReport, KnowledgeBase, LexicalRetriever,
    RagError, RetrievalResult, Retriever, SemanticRetriever, Strategy,
};
pub use text::{SpellingCorrector, TextNormalizer};

// Provider exports
pub use provider::{
    ChatRequest, ChatResponse, Message, Provider, ProviderError, Role, Tool, ToolCall,
    ToolCallFunction, ToolFunction,
};
