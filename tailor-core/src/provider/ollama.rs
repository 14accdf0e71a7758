//! Ollama provider implementation.
//!
//! This module provides an Ollama HTTP API client that implements the Provider trait.

use super::types::*;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Ollama HTTP API provider.
#[derive(Debug, Clone)]
pub struct OllamaProvider {
    base_url: String,
    http_client: reqwest::Client,
}

impl OllamaProvider {
    /// Creates a new Ollama provider talking to `base_url`.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http_client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http_client,
        })
    }

    async fn post<Req: Serialize, Resp: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        body: &Req,
    ) -> Result<Resp> {
        let url = format!("{}{}", self.base_url, path);
        let response = self.http_client.post(&url).json(body).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Api {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.json::<Resp>().await?)
    }
}

#[async_trait]
impl Provider for OllamaProvider {
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse> {
        let ollama_request = OllamaChatRequest {
            model: request.model.clone(),
            messages: request.messages.iter().map(OllamaMessage::from_message).collect(),
            options: {
                let mut opts = HashMap::new();
                opts.insert("temperature".to_string(), serde_json::json!(request.temperature));
                Some(opts)
            },
            stream: false,
            tools: request.tools.clone(),
        };

        let response: OllamaChatResponse = self.post("/api/chat", &ollama_request).await?;

        Ok(ChatResponse {
            model: response.model,
            message: response.message.into_message()?,
        })
    }

    async fn embed(&self, text: &str, model: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[text.to_string()], model)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::Other("No embeddings returned".to_string()))
    }

    async fn embed_batch(&self, texts: &[String], model: &str) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let embed_request = OllamaEmbedRequest {
            model: model.to_string(),
            input: texts.to_vec(),
        };
        let response: OllamaEmbedResponse = self.post("/api/embed", &embed_request).await?;

        if response.embeddings.len() != texts.len() {
            return Err(ProviderError::Other(format!(
                "Expected {} embeddings, got {}",
                texts.len(),
                response.embeddings.len()
            )));
        }
        Ok(response.embeddings)
    }
}

// Ollama-specific request/response types (internal)

#[derive(Debug, Clone, Serialize)]
struct OllamaChatRequest {
    model: String,
    messages: Vec<OllamaMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<HashMap<String, serde_json::Value>>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<Tool>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct OllamaMessage {
    role: String,
    #[serde(default)]
    content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<OllamaToolCall>>,
}

impl OllamaMessage {
    fn from_message(message: &Message) -> Self {
        Self {
            role: message.role.to_string(),
            content: message.content.clone(),
            tool_calls: message.tool_calls.as_ref().map(|calls| {
                calls
                    .iter()
                    .map(|call| OllamaToolCall {
                        function: OllamaToolCallFunction {
                            name: call.function.name.clone(),
                            // Ollama expects an object; fall back to the raw string.
                            arguments: serde_json::from_str(&call.function.arguments)
                                .unwrap_or_else(|_| serde_json::Value::String(call.function.arguments.clone())),
                        },
                    })
                    .collect()
            }),
        }
    }

    fn into_message(self) -> Result<Message> {
        let role = self
            .role
            .parse::<Role>()
            .map_err(|e| ProviderError::Other(e.to_string()))?;

        let tool_calls = self.tool_calls.map(|calls| {
            calls
                .into_iter()
                .map(|call| {
                    let arguments = match call.function.arguments {
                        serde_json::Value::String(raw) => raw,
                        other => other.to_string(),
                    };
                    ToolCall::new(call.function.name, arguments)
                })
                .collect()
        });

        Ok(Message {
            role,
            content: self.content,
            tool_calls,
            tool_call_id: None,
            meta: None,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
struct OllamaChatResponse {
    model: String,
    message: OllamaMessage,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct OllamaToolCall {
    function: OllamaToolCallFunction,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct OllamaToolCallFunction {
    name: String,
    arguments: serde_json::Value,
}

#[derive(Debug, Clone, Serialize)]
struct OllamaEmbedRequest {
    model: String,
    input: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct OllamaEmbedResponse {
    embeddings: Vec<Vec<f32>>,
}
