//! A small arithmetic tool exercising the `Callable` contract: `add`,
//! `subtract`, `multiply`, `divide`, each dispatched from a single
//! registered component via an `operation` argument rather than one
//! component per operation.

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{info, instrument};

use crate::protocol::{Content, ProtocolError, ProtocolResult, Tool};
use crate::registry::Callable;

#[derive(Debug, Clone)]
pub struct MathTool {
    precision: usize,
}

impl MathTool {
    pub fn new() -> Self {
        Self { precision: 10 }
    }

    pub fn with_precision(mut self, precision: usize) -> Self {
        self.precision = precision;
        self
    }

    fn number(&self, arguments: &Value, name: &str) -> ProtocolResult<f64> {
        arguments
            .get(name)
            .and_then(Value::as_f64)
            .ok_or_else(|| ProtocolError::invalid_params(format!("'{name}' must be a number")))
    }

    fn format(&self, value: f64) -> String {
        format!("{:.prec$}", value, prec = self.precision)
    }
}

impl Default for MathTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Callable for MathTool {
    fn descriptor(&self) -> Tool {
        Tool {
            name: "math".to_string(),
            description: Some("Perform a basic arithmetic operation on two numbers".to_string()),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "operation": {
                        "type": "string",
                        "enum": ["add", "subtract", "multiply", "divide"]
                    },
                    "a": {"type": "number"},
                    "b": {"type": "number"}
                },
                "required": ["operation", "a", "b"]
            }),
        }
    }

    #[instrument(level = "debug", skip(self, arguments))]
    async fn call(&self, arguments: Value) -> ProtocolResult<Vec<Content>> {
        let operation = arguments
            .get("operation")
            .and_then(Value::as_str)
            .ok_or_else(|| ProtocolError::invalid_params("'operation' is required"))?;
        let a = self.number(&arguments, "a")?;
        let b = self.number(&arguments, "b")?;

        let result = match operation {
            "add" => a + b,
            "subtract" => a - b,
            "multiply" => a * b,
            "divide" => {
                if b == 0.0 {
                    return Err(ProtocolError::invalid_params("division by zero"));
                }
                a / b
            }
            other => {
                return Err(ProtocolError::invalid_params(format!(
                    "unknown operation '{other}'"
                )))
            }
        };

        info!(operation, result, "math tool evaluated");
        Ok(vec![Content::text(self.format(result))])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn adds_two_numbers() {
        let tool = MathTool::new();
        let result = tool.call(json!({"operation": "add", "a": 2, "b": 3})).await.unwrap();
        assert_eq!(result[0].as_text(), Some("5.0000000000"));
    }

    #[tokio::test]
    async fn rejects_division_by_zero() {
        let tool = MathTool::new();
        let err = tool
            .call(json!({"operation": "divide", "a": 1, "b": 0}))
            .await
            .unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidParams { .. }));
    }

    #[tokio::test]
    async fn rejects_unknown_operation() {
        let tool = MathTool::new();
        let err = tool
            .call(json!({"operation": "modulo", "a": 1, "b": 2}))
            .await
            .unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidParams { .. }));
    }
}
