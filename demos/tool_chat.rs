//! Example: a tool-calling conversation grounded in the knowledge base.
//!
//! Demonstrates the complete flow:
//! 1. Relevant passages are retrieved and attached to the question
//! 2. The model calls arithmetic or search tools as it sees fit
//! 3. The loop stops at an answer or after `llm.max_tool_calls` rounds

use std::sync::Arc;
use tailor::prelude::*;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::load_or_default();
    let kb = Arc::new(KnowledgeBase::from_config(&config).await?);
    kb.ingest().await?;

    let registry = Arc::new(standard_registry(kb.clone()));
    println!("Tools: {}", registry.all().iter().map(|p| p.name()).collect::<Vec<_>>().join(", "));

    let manager = ChatManager::from_config(&config, registry)?.with_knowledge_base(kb);

    let question = "How many years ago was the Eiffel Tower completed if it is now 2025?";
    println!("Question: {}\n", question);

    match manager.query(question).await? {
        QueryOutcome::Answer(answer) => println!("Answer: {}", answer),
        QueryOutcome::Exceeded { tool_call_count } => {
            println!("No answer after {} tool rounds", tool_call_count)
        }
    }

    Ok(())
}
