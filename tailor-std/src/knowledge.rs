use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tailor_core::{Document, KnowledgeBase, RagError, Retriever, Strategy};
use tailor_plugin::{Plugin, PluginError, PluginOutput, Result};
use tracing::{debug, info};

/// Plugin exposing a knowledge-base retriever to the model.
///
/// The tool name follows the strategy: `hybrid_search`, `lexical_search`
/// or `semantic_search`.
pub struct RetrievePlugin {
    name: String,
    description: String,
    retriever: Arc<dyn Retriever>,
    default_k: usize,
}

#[derive(Debug, Deserialize)]
struct RetrieveParams {
    query: String,
    k: Option<usize>,
}

impl RetrievePlugin {
    pub fn new(retriever: Arc<dyn Retriever>, default_k: usize) -> Self {
        let strategy = retriever.strategy();
        let description = match strategy {
            Strategy::Lexical => "Keyword search over the travel knowledge base",
            Strategy::Semantic => "Meaning-based search over the travel knowledge base",
            Strategy::Hybrid => {
                "Search the travel knowledge base; tolerant to misspellings and paraphrases"
            }
        };

        Self {
            name: format!("{strategy}_search"),
            description: description.to_string(),
            retriever,
            default_k,
        }
    }
}

#[async_trait]
impl Plugin for RetrievePlugin {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameter_schema(&self) -> Value {
        json!({
            "type": "object",
            "required": ["query"],
            "properties": {
                "query": {
                    "type": "string",
                    "description": "What to look up"
                },
                "k": {
                    "type": "integer",
                    "description": format!("Number of passages to return (default {})", self.default_k)
                }
            }
        })
    }

    async fn execute(&self, input: Value) -> Result<PluginOutput> {
        let params: RetrieveParams = serde_json::from_value(input)
            .map_err(|e| PluginError::InvalidInput(format!("Invalid parameters: {}", e)))?;
        let k = params.k.unwrap_or(self.default_k);

        let results = self
            .retriever
            .retrieve(&params.query, k)
            .await
            .map_err(|e| match e {
                RagError::InvalidConfig(msg) => PluginError::InvalidInput(msg),
                other => PluginError::ExecutionFailed(other.to_string()),
            })?;
        debug!(tool = %self.name, query = %params.query, results = results.len(), "Retrieved passages");

        let passages: Vec<Value> = results
            .iter()
            .map(|result| {
                json!({
                    "content": result.content(),
                    "source": result.chunk.source,
                    "score": result.score,
                })
            })
            .collect();

        Ok(PluginOutput::new(passages).with_metadata(json!({ "strategy": self.retriever.strategy() })))
    }
}

/// Plugin letting the model store text in the knowledge base.
///
/// The text is ingested as one document under `source`. A source that is
/// already present is left as it is, so saving twice is harmless.
pub struct SavePlugin {
    knowledge: Arc<KnowledgeBase>,
}

#[derive(Debug, Deserialize)]
struct SaveParams {
    source: String,
    text: String,
}

impl SavePlugin {
    pub fn new(knowledge: Arc<KnowledgeBase>) -> Self {
        Self { knowledge }
    }
}

#[async_trait]
impl Plugin for SavePlugin {
    fn name(&self) -> &str {
        "save_to_vector_store"
    }

    fn description(&self) -> &str {
        "Save text to the travel knowledge base for later retrieval"
    }

    fn parameter_schema(&self) -> Value {
        json!({
            "type": "object",
            "required": ["source", "text"],
            "properties": {
                "source": {
                    "type": "string",
                    "description": "Name to file the text under, e.g. 'kyoto-notes'"
                },
                "text": {
                    "type": "string",
                    "description": "Text to save"
                }
            }
        })
    }

    async fn execute(&self, input: Value) -> Result<PluginOutput> {
        let params: SaveParams = serde_json::from_value(input)
            .map_err(|e| PluginError::InvalidInput(format!("Invalid parameters: {}", e)))?;
        if params.source.trim().is_empty() || params.text.trim().is_empty() {
            return Err(PluginError::InvalidInput(
                "Both source and text must be non-empty".to_string(),
            ));
        }

        let report = self
            .knowledge
            .ingest_documents(vec![Document::new(params.source.clone(), params.text)])
            .await
            .map_err(|e| PluginError::ExecutionFailed(e.to_string()))?;
        info!(source = %params.source, chunks = report.lexical_chunks, "Saved text to knowledge base");

        Ok(PluginOutput::new(json!({
            "source": params.source,
            "saved": report.new_sources > 0,
            "lexical_chunks": report.lexical_chunks,
            "semantic_chunks": report.semantic_chunks,
        })))
    }
}
