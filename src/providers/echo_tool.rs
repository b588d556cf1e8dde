//! The simplest possible `Callable`: hands the caller's string straight
//! back. Exists mainly so the async pipeline and the transport layer have
//! a deterministic, side-effect-free tool to round-trip in tests.

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::protocol::{Content, ProtocolError, ProtocolResult, Tool};
use crate::registry::Callable;

#[derive(Debug, Clone, Default)]
pub struct EchoTool;

impl EchoTool {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Callable for EchoTool {
    fn descriptor(&self) -> Tool {
        Tool {
            name: "echo".to_string(),
            description: Some("Echo the 's' argument back unchanged".to_string()),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "s": {"type": "string", "description": "Text to echo back"}
                },
                "required": ["s"]
            }),
        }
    }

    async fn call(&self, arguments: Value) -> ProtocolResult<Vec<Content>> {
        let text = arguments
            .get("s")
            .and_then(Value::as_str)
            .ok_or_else(|| ProtocolError::invalid_params("'s' is required"))?;
        Ok(vec![Content::text(text.to_string())])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn echoes_input_back_unchanged() {
        let tool = EchoTool::new();
        let result = tool.call(json!({"s": "hi"})).await.unwrap();
        assert_eq!(result[0].as_text(), Some("hi"));
    }

    #[tokio::test]
    async fn rejects_missing_argument() {
        let tool = EchoTool::new();
        let err = tool.call(json!({})).await.unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidParams { .. }));
    }
}
