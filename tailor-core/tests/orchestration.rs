mod common;

use async_trait::async_trait;
use common::{config, travel_corpus, HashEmbedder, ScriptedChat};
use serde_json::{json, Value};
use std::sync::Arc;
use tailor_core::{ChatError, ChatManager, KnowledgeBase, Message, ProviderError, QueryOutcome, Role, ToolCall};
use tailor_plugin::{Plugin, PluginError, PluginOutput, PluginRegistry};
use tempfile::TempDir;

struct Add;

#[async_trait]
impl Plugin for Add {
    fn name(&self) -> &str {
        "add"
    }

    fn description(&self) -> &str {
        "Add two numbers"
    }

    fn parameter_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {"a": {"type": "number"}, "b": {"type": "number"}},
            "required": ["a", "b"]
        })
    }

    async fn execute(&self, input: Value) -> tailor_plugin::Result<PluginOutput> {
        let a = input["a"].as_f64().ok_or_else(|| PluginError::InvalidInput("a".into()))?;
        let b = input["b"].as_f64().ok_or_else(|| PluginError::InvalidInput("b".into()))?;
        Ok(PluginOutput::new(a + b))
    }
}

fn registry() -> Arc<PluginRegistry> {
    let mut registry = PluginRegistry::new();
    registry.register(Arc::new(Add));
    Arc::new(registry)
}

fn manager(provider: Arc<ScriptedChat>, max_tool_calls: usize) -> ChatManager {
    let dir = std::env::temp_dir();
    let mut config = config(&dir).llm;
    config.max_tool_calls = max_tool_calls;
    ChatManager::new(config, provider, registry())
}

fn call(name: &str, arguments: &str, id: &str) -> ToolCall {
    let mut call = ToolCall::new(name, arguments);
    call.id = Some(id.to_string());
    call
}

#[tokio::test]
async fn test_tool_result_feeds_final_answer() {
    let provider = Arc::new(ScriptedChat::new([
        Ok(Message::assistant("").with_tool_calls(vec![call("add", r#"{"a":2,"b":3}"#, "c1")])),
        Ok(Message::assistant("2 + 3 = 5")),
    ]));
    let manager = manager(provider.clone(), 5);

    let outcome = manager.query("What is 2 + 3?").await.unwrap();
    assert_eq!(outcome, QueryOutcome::Answer("2 + 3 = 5".into()));

    let requests = provider.requests();
    assert_eq!(requests.len(), 2);
    let tools = requests[0].tools.as_ref().unwrap();
    assert_eq!(tools[0].function.name, "add");

    let tool_message = requests[1].messages.last().unwrap();
    assert_eq!(tool_message.role, Role::Tool);
    assert_eq!(tool_message.tool_call_id.as_deref(), Some("c1"));
    let results: Value = serde_json::from_str(&tool_message.content).unwrap();
    assert_eq!(results[0]["tool"], "add");
    assert_eq!(results[0]["result"], 5.0);
}

#[tokio::test]
async fn test_parallel_calls_share_one_message() {
    let provider = Arc::new(ScriptedChat::new([
        Ok(Message::assistant("").with_tool_calls(vec![
            call("add", r#"{"a":1,"b":1}"#, "c1"),
            call("add", r#"{"a":2,"b":2}"#, "c2"),
        ])),
        Ok(Message::assistant("2 and 4")),
    ]));
    manager(provider.clone(), 5).query("sums").await.unwrap();

    let second = &provider.requests()[1];
    let tool_messages: Vec<&Message> = second.messages.iter().filter(|m| m.role == Role::Tool).collect();
    assert_eq!(tool_messages.len(), 1);

    let results: Value = serde_json::from_str(&tool_messages[0].content).unwrap();
    assert_eq!(results[0]["result"], 2.0);
    assert_eq!(results[1]["result"], 4.0);
}

#[tokio::test]
async fn test_unknown_tool_does_not_abort() {
    let provider = Arc::new(ScriptedChat::new([
        Ok(Message::assistant("").with_tool_calls(vec![call("teleport", "{}", "c1")])),
        Ok(Message::assistant("I cannot teleport.")),
    ]));
    let outcome = manager(provider.clone(), 5).query("Take me to Paris").await.unwrap();

    assert_eq!(outcome.answer(), Some("I cannot teleport."));
    let tool_message = provider.requests()[1].messages.last().cloned().unwrap();
    let results: Value = serde_json::from_str(&tool_message.content).unwrap();
    assert_eq!(results[0]["tool"], "teleport");
    assert!(results[0]["error"].is_string());
}

#[tokio::test]
async fn test_tool_budget_exhausted() {
    let provider = Arc::new(ScriptedChat::new((0..10).map(|i| {
        Ok(Message::assistant("").with_tool_calls(vec![call("add", r#"{"a":1,"b":1}"#, &format!("c{i}"))]))
    })));
    let outcome = manager(provider.clone(), 3).query("loop forever").await.unwrap();

    assert_eq!(outcome, QueryOutcome::Exceeded { tool_call_count: 3 });
    assert_eq!(provider.calls(), 3);
}

#[tokio::test]
async fn test_unreachable_endpoint_after_three_attempts() {
    let provider = Arc::new(ScriptedChat::new(
        (0..10).map(|_| Err(ProviderError::Transport("connection refused".into()))),
    ));
    let err = manager(provider.clone(), 3).query("hello").await.unwrap_err();

    assert!(matches!(err, ChatError::EndpointUnavailable { attempts: 3, .. }));
    assert_eq!(provider.calls(), 3);
}

#[tokio::test]
async fn test_query_carries_knowledge_base_context() {
    let dir = TempDir::new().unwrap();
    let config = config(dir.path());
    let kb = KnowledgeBase::open(&config, Arc::new(HashEmbedder::new(32))).await.unwrap();
    kb.ingest_documents(travel_corpus()).await.unwrap();

    let provider = Arc::new(ScriptedChat::new([Ok(Message::assistant("In Paris."))]));
    let manager = ChatManager::new(config.llm.clone(), provider.clone(), registry())
        .with_knowledge_base(Arc::new(kb));

    let outcome = manager.query("Where is the eifel tower?").await.unwrap();
    assert_eq!(outcome.answer(), Some("In Paris."));

    let request = &provider.requests()[0];
    assert_eq!(request.messages[0].role, Role::System);
    let user = &request.messages[1].content;
    assert!(user.starts_with("Relevant context from your knowledge base:\n"));
    assert!(user.contains("Eiffel Tower"));
    assert!(user.ends_with("Where is the eifel tower?"));
}
