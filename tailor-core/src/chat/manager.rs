//! Conversation orchestration with tool execution and retries.
//!
//! # Architecture
//!
//! The `ChatManager` implements a tool-augmented model pattern:
//! - Sends the context to the model with the available tool definitions
//! - Detects when the model requests tool execution
//! - Executes every requested tool from the plugin registry
//! - Returns the merged results to the model until it answers
//!
//! Every model request goes through [`ChatManager::send_request`], which
//! bounds each attempt by a timeout and retries transport failures with
//! exponential backoff.

use super::dispatch::{dispatch_round, tool_message};
use super::{estimate_tokens, ChatError, QueryOutcome, Result};
use crate::config::{Config, LlmConfig};
use crate::provider::{self, ChatRequest, Message, Provider, ProviderError, Role, Tool, ToolFunction};
use crate::rag::KnowledgeBase;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tailor_plugin::PluginRegistry;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// How model requests are retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    pub base_backoff: Duration,
    /// Per-attempt timeout.
    pub timeout: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &LlmConfig) -> Self {
        Self {
            max_attempts: config.max_retries.max(1),
            base_backoff: Duration::from_millis(config.retry_backoff_ms),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }

    /// Delay after the failed `attempt` (1-based): `base * 2^(attempt-1)`,
    /// kept below the per-attempt timeout.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32
            .checked_shl(attempt.saturating_sub(1))
            .unwrap_or(u32::MAX);
        let ceiling = self.timeout.saturating_sub(Duration::from_millis(1));
        self.base_backoff.saturating_mul(factor).min(ceiling)
    }
}

enum LoopState {
    AwaitingModel,
    ExecutingTools(Message),
    Done(String),
    Exceeded,
}

/// Orchestrates conversations between the user, the model and the tools.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use tailor_core::{ChatManager, Config};
/// use tailor_plugin::PluginRegistry;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = Config::load_or_default();
/// let manager = ChatManager::from_config(&config, Arc::new(PluginRegistry::new()))?;
/// let outcome = manager.query("What is 2 + 3?").await?;
/// println!("{:?}", outcome.answer());
/// # Ok(())
/// # }
/// ```
pub struct ChatManager {
    config: LlmConfig,
    provider: Arc<dyn Provider>,
    registry: Arc<PluginRegistry>,
    knowledge: Option<Arc<KnowledgeBase>>,
    retry: RetryPolicy,
}

impl ChatManager {
    pub fn new(config: LlmConfig, provider: Arc<dyn Provider>, registry: Arc<PluginRegistry>) -> Self {
        let retry = RetryPolicy::from_config(&config);
        Self {
            config,
            provider,
            registry,
            knowledge: None,
            retry,
        }
    }

    /// Create a manager talking to the configured chat endpoint.
    pub fn from_config(config: &Config, registry: Arc<PluginRegistry>) -> Result<Self> {
        let provider = provider::chat_provider(&config.llm).map_err(ChatError::Api)?;
        Ok(Self::new(config.llm.clone(), provider, registry))
    }

    /// Prepend retrieved context to every query.
    pub fn with_knowledge_base(mut self, knowledge: Arc<KnowledgeBase>) -> Self {
        self.knowledge = Some(knowledge);
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn config(&self) -> &LlmConfig {
        &self.config
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    pub fn knowledge_base(&self) -> Option<&Arc<KnowledgeBase>> {
        self.knowledge.as_ref()
    }

    /// Send one request, retrying transient failures.
    ///
    /// Each attempt is bounded by the policy's timeout. API errors are
    /// returned at once as [`ChatError::Api`]; after the last failed
    /// attempt the error is [`ChatError::EndpointUnavailable`].
    pub async fn send_request(
        &self,
        messages: &[Message],
        tools: &[Tool],
        cancel: &CancellationToken,
    ) -> Result<Message> {
        let mut request = ChatRequest::new(&self.config.model, messages.to_vec())
            .with_temperature(self.config.temperature);
        if !tools.is_empty() {
            request = request.with_tools(tools.to_vec());
        }

        let mut attempt = 0;
        loop {
            attempt += 1;

            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(ChatError::Cancelled),
                outcome = tokio::time::timeout(self.retry.timeout, self.provider.chat(request.clone())) => outcome,
            };

            let error = match outcome {
                Ok(Ok(response)) => return Ok(response.message),
                Ok(Err(e)) => e,
                Err(_) => ProviderError::Timeout(self.retry.timeout),
            };

            if !error.is_transient() {
                warn!(attempt, error = %error, "Model request rejected");
                return Err(ChatError::Api(error));
            }

            warn!(
                attempt,
                max_attempts = self.retry.max_attempts,
                error = %error,
                "Model request failed"
            );
            if attempt >= self.retry.max_attempts {
                return Err(ChatError::EndpointUnavailable {
                    attempts: attempt,
                    source: error,
                });
            }

            let delay = self.retry.backoff(attempt);
            debug!(delay_ms = delay.as_millis() as u64, "Backing off");
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(ChatError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    /// Single completion without tools: `context` followed by `prompt` as a
    /// user message.
    pub async fn chat_completion(&self, prompt: &str, context: &[Message]) -> Result<String> {
        let mut messages = context.to_vec();
        messages.push(Message::user(prompt));

        let reply = self
            .send_request(&messages, &[], &CancellationToken::new())
            .await?;
        Ok(reply.content)
    }

    /// Answer `question`, letting the model call tools.
    pub async fn query(&self, question: &str) -> Result<QueryOutcome> {
        self.query_with_cancel(question, &CancellationToken::new()).await
    }

    pub async fn query_with_cancel(&self, question: &str, cancel: &CancellationToken) -> Result<QueryOutcome> {
        let mut messages = self.initial_messages(question).await?;
        self.run_tool_loop(&mut messages, cancel).await
    }

    async fn initial_messages(&self, question: &str) -> Result<Vec<Message>> {
        let context = match &self.knowledge {
            Some(knowledge) => knowledge.retrieve_context(question).await?,
            None => String::new(),
        };

        let mut messages = Vec::with_capacity(2);
        if !self.config.system_prompt.is_empty() {
            messages.push(Message::system(&self.config.system_prompt));
        }
        if context.is_empty() {
            messages.push(Message::user(question));
        } else {
            messages.push(Message::user(format!("{context}\n{question}")));
        }
        Ok(messages)
    }

    /// Drive the tool loop over `messages` until the model answers or
    /// `max_tool_calls` rounds have run.
    ///
    /// Each round appends the assistant message carrying the tool calls and
    /// one tool message with every call's result, in request order. Tool
    /// failures are reported to the model, never raised.
    pub async fn run_tool_loop(
        &self,
        messages: &mut Vec<Message>,
        cancel: &CancellationToken,
    ) -> Result<QueryOutcome> {
        let tools = self.build_tools();
        let max_rounds = self.config.max_tool_calls;
        let mut round = 0;
        let mut state = LoopState::AwaitingModel;

        info!(tools = tools.len(), max_rounds, "Starting query");

        loop {
            state = match state {
                LoopState::AwaitingModel if round >= max_rounds => LoopState::Exceeded,
                LoopState::AwaitingModel => {
                    let reply = self.send_request(messages, &tools, cancel).await?;
                    if reply.requested_tool_calls().is_some() {
                        LoopState::ExecutingTools(reply)
                    } else {
                        LoopState::Done(reply.content)
                    }
                }
                LoopState::ExecutingTools(reply) => {
                    let calls = reply.tool_calls.clone().unwrap_or_default();
                    debug!(round, calls = calls.len(), "Model requested tools");
                    messages.push(reply);

                    let results = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return Err(ChatError::Cancelled),
                        results = dispatch_round(&self.registry, &calls) => results,
                    };
                    messages.push(tool_message(&calls, results, round));
                    round += 1;
                    LoopState::AwaitingModel
                }
                LoopState::Done(answer) => {
                    info!(rounds = round, "Query answered");
                    return Ok(QueryOutcome::Answer(answer));
                }
                LoopState::Exceeded => {
                    warn!(tool_call_count = round, "Maximum tool calls exceeded");
                    return Ok(QueryOutcome::Exceeded {
                        tool_call_count: round,
                    });
                }
            };
        }
    }

    /// Ask the model to summarize `context` into a single system message.
    ///
    /// Roles in `priority` (default: system, user) are favoured. An empty
    /// context compresses to nothing without contacting the model.
    pub async fn compress_context(
        &self,
        context: &[Message],
        target_tokens: usize,
        priority: Option<&[Role]>,
    ) -> Result<Vec<Message>> {
        if context.is_empty() {
            return Ok(Vec::new());
        }

        let priority = priority.unwrap_or(&[Role::System, Role::User]);
        let roles = priority.iter().map(Role::as_str).collect::<Vec<_>>().join(", ");
        let serialized = serde_json::to_string(context)?;
        let prompt = format!(
            "Compress the following context to under {target_tokens} tokens while prioritizing {roles} messages:\n{serialized}"
        );

        let summary = self.chat_completion(&prompt, &[]).await?;
        info!(original_length = context.len(), target_tokens, "Compressed context");

        Ok(vec![Message::system(summary).with_meta(json!({
            "compression_timestamp": chrono::Utc::now().to_rfc3339(),
            "original_length": context.len(),
        }))])
    }

    /// Compress `context` to half the context window when it no longer fits.
    pub async fn compress_if_needed(&self, context: Vec<Message>) -> Result<Vec<Message>> {
        let estimated = estimate_tokens(&context);
        if estimated <= self.config.context_window {
            return Ok(context);
        }

        debug!(estimated, window = self.config.context_window, "Context over budget");
        self.compress_context(&context, self.config.context_window / 2, None)
            .await
    }

    /// Tool definitions for every registered plugin.
    pub fn build_tools(&self) -> Vec<Tool> {
        self.registry
            .all()
            .iter()
            .map(|plugin| Tool {
                tool_type: "function".to_string(),
                function: ToolFunction {
                    name: plugin.name().to_string(),
                    description: plugin.description().to_string(),
                    parameters: plugin.parameter_schema(),
                },
            })
            .collect()
    }
}
