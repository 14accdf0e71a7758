//! Common types for model providers.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur when interacting with a provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("JSON parsing failed: {0}")]
    Json(#[from] serde_json::Error),

    /// The endpoint answered with a well-formed rejection.
    #[error("API error ({status}): {body}")]
    Api { status: u16, body: String },

    /// The request never produced a response (connection refused, reset...).
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Provider error: {0}")]
    Other(String),
}

impl ProviderError {
    /// Whether the failure happened below the HTTP semantics layer.
    ///
    /// Only these are worth retrying; a response from the endpoint, even an
    /// error status, is final.
    pub fn is_transient(&self) -> bool {
        match self {
            ProviderError::Request(e) => e.status().is_none() && !e.is_decode() && !e.is_builder(),
            ProviderError::Transport(_) | ProviderError::Timeout(_) => true,
            ProviderError::Json(_) | ProviderError::Api { .. } | ProviderError::Other(_) => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, ProviderError>;

/// Provider trait for model backends.
///
/// Implementations provide chat completions and embeddings through
/// different HTTP APIs (OpenAI-compatible, Ollama).
#[async_trait]
pub trait Provider: Send + Sync {
    /// Run one chat completion and return the assistant message.
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse>;

    /// Generate an embedding vector for the given text.
    async fn embed(&self, text: &str, model: &str) -> Result<Vec<f32>>;

    /// Generate embeddings for several texts, in input order.
    async fn embed_batch(&self, texts: &[String], model: &str) -> Result<Vec<Vec<f32>>> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for text in texts {
            embeddings.push(self.embed(text, model).await?);
        }
        Ok(embeddings)
    }
}

/// Message author. Closed set; anything else is rejected when parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A role string outside {system, user, assistant, tool}.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Invalid role: {0}")]
pub struct InvalidRole(pub String);

impl FromStr for Role {
    type Err = InvalidRole;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "system" => Ok(Role::System),
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            "tool" => Ok(Role::Tool),
            other => Err(InvalidRole(other.to_string())),
        }
    }
}

/// Request for chat completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub temperature: f64,
    pub tools: Option<Vec<Tool>>,
}

impl ChatRequest {
    pub fn new(model: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            model: model.into(),
            messages,
            temperature: 0.7,
            tools: None,
        }
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_tools(mut self, tools: Vec<Tool>) -> Self {
        self.tools = Some(tools);
        self
    }
}

/// Response from a chat completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub model: String,
    pub message: Message,
}

/// A single message in a conversation context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub content: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,

    /// Call a tool-role message answers, for endpoints that require one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,

    /// Structured annotations (tool-call round index, compression stats...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_calls: None,
            tool_call_id: None,
            meta: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn tool(content: impl Into<String>) -> Self {
        Self::new(Role::Tool, content)
    }

    pub fn with_meta(mut self, meta: Value) -> Self {
        self.meta = Some(meta);
        self
    }

    pub fn with_tool_calls(mut self, tool_calls: Vec<ToolCall>) -> Self {
        self.tool_calls = Some(tool_calls);
        self
    }

    pub fn with_tool_call_id(mut self, id: Option<String>) -> Self {
        self.tool_call_id = id;
        self
    }

    /// Tool calls requested by this message, if any.
    pub fn requested_tool_calls(&self) -> Option<&[ToolCall]> {
        self.tool_calls.as_deref().filter(|calls| !calls.is_empty())
    }
}

// Assistant messages that only request tools carry `"content": null`.
fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// A message as supplied by an untyped caller (e.g. decoded from JSON).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawMessage {
    pub role: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub meta: Option<Value>,
}

impl TryFrom<RawMessage> for Message {
    type Error = InvalidRole;

    fn try_from(raw: RawMessage) -> std::result::Result<Self, Self::Error> {
        let role = raw.role.parse::<Role>()?;
        Ok(Message {
            role,
            content: raw.content,
            tool_calls: None,
            tool_call_id: None,
            meta: raw.meta,
        })
    }
}

/// Tool specification for function calling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tool {
    #[serde(rename = "type")]
    pub tool_type: String,
    pub function: ToolFunction,
}

/// Function definition within a tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolFunction {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// Tool call requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "type", default = "function_call_type")]
    pub call_type: String,
    pub function: ToolCallFunction,
}

fn function_call_type() -> String {
    "function".to_string()
}

impl ToolCall {
    pub fn new(name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            id: None,
            call_type: function_call_type(),
            function: ToolCallFunction {
                name: name.into(),
                arguments: arguments.into(),
            },
        }
    }
}

/// Function call details. `arguments` is the serialized JSON the model produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallFunction {
    pub name: String,
    pub arguments: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_round_trip_names() {
        for role in [Role::System, Role::User, Role::Assistant, Role::Tool] {
            assert_eq!(role.as_str().parse::<Role>(), Ok(role));
        }
    }

    #[test]
    fn test_unknown_role_rejected() {
        assert_eq!("moderator".parse::<Role>(), Err(InvalidRole("moderator".into())));
        assert!("System".parse::<Role>().is_err());
    }

    #[test]
    fn test_raw_message_validation() {
        let ok = RawMessage {
            role: "user".into(),
            content: "hi".into(),
            meta: None,
        };
        assert_eq!(Message::try_from(ok).unwrap(), Message::user("hi"));

        let bad = RawMessage {
            role: "robot".into(),
            content: "hi".into(),
            meta: None,
        };
        assert!(Message::try_from(bad).is_err());
    }

    #[test]
    fn test_message_deserialize_rejects_unknown_role() {
        let result: std::result::Result<Message, _> =
            serde_json::from_str(r#"{"role":"narrator","content":"x"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_transient_classification() {
        assert!(ProviderError::Transport("reset".into()).is_transient());
        assert!(ProviderError::Timeout(Duration::from_secs(1)).is_transient());
        assert!(!ProviderError::Api { status: 500, body: "boom".into() }.is_transient());
        assert!(!ProviderError::Other("bad".into()).is_transient());
    }

    #[test]
    fn test_tool_call_serializes_function_type() {
        let json = serde_json::to_value(ToolCall::new("add", "{}")).unwrap();
        assert_eq!(json["type"], "function");
        assert!(json.get("id").is_none());
    }

    #[test]
    fn test_empty_tool_calls_are_not_requests() {
        let message = Message::assistant("done").with_tool_calls(vec![]);
        assert!(message.requested_tool_calls().is_none());
    }
}
