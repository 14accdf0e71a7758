//! Standard plugins for tailor
//!
//! Built-in tools that work out of the box:
//! - Knowledge-base search (lexical, semantic or hybrid)
//! - Saving text to the knowledge base
//! - Arithmetic (add, subtract, multiply, divide)

mod knowledge;
mod math;

pub use knowledge::{RetrievePlugin, SavePlugin};
pub use math::{arithmetic_plugins, ArithmeticPlugin, Operation};

use std::sync::Arc;
use tailor_core::KnowledgeBase;
use tailor_plugin::PluginRegistry;

/// Registry holding the arithmetic tools plus hybrid search and save tools
/// over `knowledge`.
pub fn standard_registry(knowledge: Arc<KnowledgeBase>) -> PluginRegistry {
    let mut registry = PluginRegistry::new();
    for plugin in arithmetic_plugins() {
        registry.register(plugin);
    }
    registry.register(Arc::new(RetrievePlugin::new(
        Arc::new(knowledge.hybrid_retriever()),
        knowledge.config().semantic_k,
    )));
    registry.register(Arc::new(SavePlugin::new(knowledge)));
    registry
}
