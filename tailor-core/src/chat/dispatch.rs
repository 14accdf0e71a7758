//! Execution of the tool calls requested in one round.

use crate::provider::{Message, ToolCall};
use futures::future::join_all;
use serde_json::{json, Value};
use tailor_plugin::PluginRegistry;
use tracing::{info, warn};

/// Run every call of a round concurrently and collect one entry per call,
/// in request order.
///
/// Successful calls give `{"tool", "result", "timestamp"}`; unknown tools,
/// unparsable arguments and plugin failures give `{"tool", "error"}`.
pub(crate) async fn dispatch_round(registry: &PluginRegistry, calls: &[ToolCall]) -> Vec<Value> {
    join_all(calls.iter().map(|call| execute_call(registry, call))).await
}

async fn execute_call(registry: &PluginRegistry, call: &ToolCall) -> Value {
    let name = call.function.name.as_str();

    let arguments = match parse_arguments(&call.function.arguments) {
        Ok(arguments) => arguments,
        Err(e) => {
            warn!(tool = name, error = %e, "Tool arguments are not valid JSON");
            return json!({ "tool": name, "error": format!("Invalid arguments: {e}") });
        }
    };

    info!(tool = name, "Executing tool");
    match registry.execute(name, arguments).await {
        Ok(output) => json!({
            "tool": name,
            "result": output.result,
            "timestamp": chrono::Utc::now().to_rfc3339(),
        }),
        Err(e) => {
            warn!(tool = name, error = %e, "Tool execution failed");
            json!({ "tool": name, "error": e.to_string() })
        }
    }
}

fn parse_arguments(raw: &str) -> serde_json::Result<Value> {
    if raw.trim().is_empty() {
        return Ok(json!({}));
    }
    serde_json::from_str(raw)
}

/// The single tool-role message carrying a round's merged results.
///
/// Only the first call's id is kept as `tool_call_id`; the ids of the other
/// calls are dropped on purpose, since entries are matched to calls by
/// position in the merged array.
pub(crate) fn tool_message(calls: &[ToolCall], results: Vec<Value>, round: usize) -> Message {
    let content = Value::Array(results).to_string();
    let first_id = calls.iter().find_map(|call| call.id.clone());

    Message::tool(content)
        .with_tool_call_id(first_id)
        .with_meta(json!({ "tool_call_index": round }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Arc;
    use tailor_plugin::{Plugin, PluginError, PluginOutput};

    struct Echo;

    #[async_trait]
    impl Plugin for Echo {
        fn name(&self) -> &str {
            "echo"
        }

        fn description(&self) -> &str {
            "Echo the input"
        }

        fn parameter_schema(&self) -> Value {
            json!({"type": "object"})
        }

        async fn execute(&self, input: Value) -> tailor_plugin::Result<PluginOutput> {
            if input.get("fail").is_some() {
                return Err(PluginError::ExecutionFailed("asked to fail".into()));
            }
            Ok(PluginOutput::new(input))
        }
    }

    fn registry() -> PluginRegistry {
        let mut registry = PluginRegistry::new();
        registry.register(Arc::new(Echo));
        registry
    }

    #[tokio::test]
    async fn test_results_keep_request_order() {
        let calls = vec![
            ToolCall::new("echo", r#"{"n":1}"#),
            ToolCall::new("missing", "{}"),
            ToolCall::new("echo", "not json"),
            ToolCall::new("echo", r#"{"fail":true}"#),
            ToolCall::new("echo", ""),
        ];
        let results = dispatch_round(&registry(), &calls).await;

        assert_eq!(results.len(), 5);
        assert_eq!(results[0]["result"]["n"], 1);
        assert!(results[0]["timestamp"].is_string());
        assert_eq!(results[1]["tool"], "missing");
        assert!(results[1]["error"].as_str().unwrap().contains("Unknown tool"));
        assert!(results[2]["error"].as_str().unwrap().starts_with("Invalid arguments"));
        assert!(results[3]["error"].as_str().unwrap().contains("asked to fail"));
        assert_eq!(results[4]["result"], json!({}));
    }

    #[test]
    fn test_tool_message_shape() {
        let mut call = ToolCall::new("echo", "{}");
        call.id = Some("call_7".into());
        let message = tool_message(&[call], vec![json!({"tool": "echo", "result": 1})], 2);

        assert_eq!(message.role, crate::provider::Role::Tool);
        assert_eq!(message.tool_call_id.as_deref(), Some("call_7"));
        assert_eq!(message.meta, Some(json!({"tool_call_index": 2})));
        let content: Value = serde_json::from_str(&message.content).unwrap();
        assert_eq!(content[0]["tool"], "echo");
    }

    #[test]
    fn test_merged_message_keeps_first_id_only() {
        let mut first = ToolCall::new("echo", "{}");
        first.id = Some("call_1".into());
        let mut second = ToolCall::new("echo", "{}");
        second.id = Some("call_2".into());
        let results = vec![json!({"tool": "echo", "result": 1}), json!({"tool": "echo", "result": 2})];

        let message = tool_message(&[first, second], results, 0);
        assert_eq!(message.tool_call_id.as_deref(), Some("call_1"));
        assert!(!message.content.contains("call_2"));
        let content: Value = serde_json::from_str(&message.content).unwrap();
        assert_eq!(content[1]["result"], 2);
    }
}
