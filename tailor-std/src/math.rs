use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tailor_plugin::{Plugin, PluginError, PluginOutput, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Add,
    Subtract,
    Multiply,
    Divide,
}

/// Binary arithmetic on two numbers `a` and `b`.
pub struct ArithmeticPlugin {
    operation: Operation,
}

#[derive(Debug, Deserialize)]
struct OperandParams {
    a: f64,
    b: f64,
}

impl ArithmeticPlugin {
    pub fn new(operation: Operation) -> Self {
        Self { operation }
    }

    pub fn operation(&self) -> Operation {
        self.operation
    }
}

/// One plugin per operation.
pub fn arithmetic_plugins() -> Vec<Arc<dyn Plugin>> {
    [Operation::Add, Operation::Subtract, Operation::Multiply, Operation::Divide]
        .into_iter()
        .map(|operation| Arc::new(ArithmeticPlugin::new(operation)) as Arc<dyn Plugin>)
        .collect()
}

#[async_trait]
impl Plugin for ArithmeticPlugin {
    fn name(&self) -> &str {
        match self.operation {
            Operation::Add => "add",
            Operation::Subtract => "subtract",
            Operation::Multiply => "multiply",
            Operation::Divide => "divide",
        }
    }

    fn description(&self) -> &str {
        match self.operation {
            Operation::Add => "Add two numbers",
            Operation::Subtract => "Subtract b from a",
            Operation::Multiply => "Multiply two numbers",
            Operation::Divide => "Divide a by b",
        }
    }

    fn parameter_schema(&self) -> Value {
        json!({
            "type": "object",
            "required": ["a", "b"],
            "properties": {
                "a": { "type": "number", "description": "First operand" },
                "b": { "type": "number", "description": "Second operand" }
            }
        })
    }

    async fn execute(&self, input: Value) -> Result<PluginOutput> {
        let OperandParams { a, b } = serde_json::from_value(input)
            .map_err(|e| PluginError::InvalidInput(format!("Invalid parameters: {}", e)))?;

        let value = match self.operation {
            Operation::Add => a + b,
            Operation::Subtract => a - b,
            Operation::Multiply => a * b,
            Operation::Divide if b == 0.0 => {
                return Err(PluginError::ExecutionFailed("Division by zero".to_string()));
            }
            Operation::Divide => a / b,
        };

        Ok(PluginOutput::new(value))
    }
}
