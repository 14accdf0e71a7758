//! Example: hybrid retrieval over a small travel corpus.
//!
//! Ingests two documents, then runs a misspelled query through every
//! retrieval strategy. Needs the embedding endpoint from `config.yaml`
//! (defaults to a local Ollama with `nomic-embed-text`).

use tailor::{Config, Document, KnowledgeBase, Retriever, Strategy};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    println!("Tailor - Hybrid Search Example");
    println!("==============================\n");

    let config = Config::load_or_default();
    let kb = KnowledgeBase::from_config(&config).await?;

    let report = kb
        .ingest_documents(vec![
            Document::new(
                "paris.txt",
                "Paris is the capital of France. The Eiffel Tower was completed in 1889.",
            )
            .with_metadata("country", "France"),
            Document::new(
                "tokyo.txt",
                "Tokyo is the capital of Japan. Senso-ji is its oldest temple.",
            )
            .with_metadata("country", "Japan"),
        ])
        .await?;
    println!("Ingested {} new sources ({} chunks)\n", report.new_sources, kb.count().await);

    let query = "eifel tower";
    println!("Query: {}  (corrected: {})\n", query, kb.correct(query).await);

    for strategy in [Strategy::Lexical, Strategy::Semantic, Strategy::Hybrid] {
        println!("{}:", strategy);
        for result in kb.retriever(strategy).retrieve(query, 2).await? {
            println!("  {:.4}  {}", result.score, result.chunk.id);
        }
    }

    println!("\n{}", kb.retrieve_context(query).await?);
    Ok(())
}
