use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// Tool-level failure.
///
/// These never abort an orchestration round: the loop turns them into an
/// error entry in the tool-role message so the model can react.
#[derive(Debug, Error)]
pub enum PluginError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Plugin error: {0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, PluginError>;

/// Output from plugin execution.
///
/// `result` is any JSON-serializable value; it is embedded verbatim in the
/// tool-role message sent back to the model.
#[derive(Debug, Clone)]
pub struct PluginOutput {
    pub result: Value,
    pub metadata: Option<Value>,
}

impl PluginOutput {
    pub fn new(result: impl Into<Value>) -> Self {
        Self {
            result: result.into(),
            metadata: None,
        }
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

impl fmt::Display for PluginOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.result {
            Value::String(s) => write!(f, "{}", s),
            other => write!(f, "{}", other),
        }
    }
}

/// Core trait that all plugins must implement.
///
/// From the model's perspective, plugins appear as "tools" that can be
/// called during a conversation.
#[async_trait]
pub trait Plugin: Send + Sync {
    /// Unique identifier for this plugin.
    /// This is what the model will use to call the plugin.
    fn name(&self) -> &str;

    /// Human-readable description of what this plugin does.
    fn description(&self) -> &str;

    /// JSON schema describing the plugin's parameters.
    ///
    /// Exposed to the model as-is; arguments are not validated against it.
    fn parameter_schema(&self) -> Value;

    /// Execute the plugin with the given (already parsed) arguments.
    async fn execute(&self, input: Value) -> Result<PluginOutput>;
}
