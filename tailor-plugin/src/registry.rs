use crate::{Plugin, PluginError, PluginOutput};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Registry for managing plugins.
///
/// The registry is responsible for:
/// - Registering plugins under unique names
/// - Looking up plugins by name
/// - Executing plugins
///
/// Plugins are kept ordered by name so the tool list sent to the model is
/// identical from one request to the next.
#[derive(Default)]
pub struct PluginRegistry {
    plugins: BTreeMap<String, Arc<dyn Plugin>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a plugin.
    /// Returns false (and keeps the existing one) if the name is already taken.
    pub fn register(&mut self, plugin: Arc<dyn Plugin>) -> bool {
        let name = plugin.name().to_string();
        if self.plugins.contains_key(&name) {
            return false;
        }

        self.plugins.insert(name, plugin);
        true
    }

    /// Get a plugin by name.
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Plugin>> {
        self.plugins.get(name)
    }

    /// Get all registered plugins, ordered by name.
    pub fn all(&self) -> Vec<&Arc<dyn Plugin>> {
        self.plugins.values().collect()
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    /// Execute a plugin by name.
    pub async fn execute(&self, name: &str, input: Value) -> Result<PluginOutput, PluginError> {
        let plugin = self
            .get(name)
            .ok_or_else(|| PluginError::UnknownTool(name.to_string()))?;

        plugin.execute(input).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct TestPlugin(&'static str);

    #[async_trait]
    impl Plugin for TestPlugin {
        fn name(&self) -> &str {
            self.0
        }

        fn description(&self) -> &str {
            "A test plugin"
        }

        fn parameter_schema(&self) -> Value {
            serde_json::json!({})
        }

        async fn execute(&self, _input: Value) -> crate::Result<PluginOutput> {
            Ok(PluginOutput::new("test output"))
        }
    }

    #[test]
    fn test_register_and_get() {
        let mut registry = PluginRegistry::new();

        assert!(registry.register(Arc::new(TestPlugin("test"))));
        assert!(registry.get("test").is_some());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let mut registry = PluginRegistry::new();

        assert!(registry.register(Arc::new(TestPlugin("test"))));
        assert!(!registry.register(Arc::new(TestPlugin("test"))));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_plugins_are_ordered_by_name() {
        let mut registry = PluginRegistry::new();
        registry.register(Arc::new(TestPlugin("zeta")));
        registry.register(Arc::new(TestPlugin("alpha")));

        let names: Vec<_> = registry.all().iter().map(|plugin| plugin.name()).collect();
        assert_eq!(names, vec!["alpha", "zeta"]);
    }

    #[tokio::test]
    async fn test_execute_unknown_tool() {
        let registry = PluginRegistry::new();
        let result = registry.execute("missing", serde_json::json!({})).await;

        assert!(matches!(result, Err(PluginError::UnknownTool(name)) if name == "missing"));
    }

    #[tokio::test]
    async fn test_execute_known_tool() {
        let mut registry = PluginRegistry::new();
        registry.register(Arc::new(TestPlugin("test")));

        let output = registry.execute("test", serde_json::json!({})).await.unwrap();
        assert_eq!(output.to_string(), "test output");
    }
}
