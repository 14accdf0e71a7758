//! Tool-augmented conversation with a model endpoint.
//!
//! # Tool Calling Flow
//!
//! ```text
//! Context → Model → Tool calls?
//!             ↓          ↓
//!          Answer    Execute all calls (concurrently)
//!                        ↓
//!                  Merge results into one tool message → Model ...
//! ```
//!
//! The loop stops with [`QueryOutcome::Exceeded`] once `max_tool_calls`
//! rounds have run without a final answer.

mod dispatch;
mod manager;

pub use manager::{ChatManager, RetryPolicy};

use crate::provider::{InvalidRole, Message, ProviderError};
use crate::rag::RagError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChatError {
    /// Transport failures on every attempt.
    #[error("Model endpoint unavailable after {attempts} attempts: {source}")]
    EndpointUnavailable {
        attempts: u32,
        #[source]
        source: ProviderError,
    },

    /// The endpoint answered with an error; retrying would not help.
    #[error("Model endpoint rejected the request: {0}")]
    Api(#[source] ProviderError),

    #[error(transparent)]
    InvalidRole(#[from] InvalidRole),

    #[error("Query cancelled")]
    Cancelled,

    #[error("Knowledge base retrieval failed: {0}")]
    Retrieval(#[from] RagError),

    #[error("Failed to serialize context: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ChatError>;

/// Terminal result of a tool-enhanced query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryOutcome {
    /// The model answered without requesting more tools.
    Answer(String),
    /// Every allowed round requested tools.
    Exceeded { tool_call_count: usize },
}

impl QueryOutcome {
    pub fn answer(&self) -> Option<&str> {
        match self {
            QueryOutcome::Answer(answer) => Some(answer),
            QueryOutcome::Exceeded { .. } => None,
        }
    }

    pub fn is_exceeded(&self) -> bool {
        matches!(self, QueryOutcome::Exceeded { .. })
    }
}

/// Rough token count of a context: four characters per token plus a small
/// per-message overhead. Good enough to decide when to compress.
pub fn estimate_tokens(messages: &[Message]) -> usize {
    messages
        .iter()
        .map(|message| {
            let tool_calls: usize = message
                .tool_calls
                .iter()
                .flatten()
                .map(|call| call.function.name.len() + call.function.arguments.len())
                .sum();
            (message.content.chars().count() + tool_calls).div_ceil(4) + 4
        })
        .sum()
}
