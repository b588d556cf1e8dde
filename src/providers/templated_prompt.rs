//! A `Renderable` prompt that fills `{{placeholder}}` slots in a static
//! template with the caller's arguments, standing in for the reference
//! implementation's code-review prompt provider without its domain-specific
//! wording.

use async_trait::async_trait;
use serde_json::Value;

use crate::protocol::{Content, Prompt, PromptArgument, PromptMessage, ProtocolError, ProtocolResult};
use crate::registry::Renderable;

pub struct TemplatedPrompt {
    name: String,
    description: Option<String>,
    template: String,
    arguments: Vec<PromptArgument>,
}

impl TemplatedPrompt {
    pub fn new(name: impl Into<String>, template: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            template: template.into(),
            arguments: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_argument(mut self, name: impl Into<String>, required: bool) -> Self {
        self.arguments.push(PromptArgument {
            name: name.into(),
            description: None,
            required,
        });
        self
    }

    fn fill(&self, arguments: &Value) -> ProtocolResult<String> {
        let mut rendered = self.template.clone();
        for arg in &self.arguments {
            let value = arguments.get(&arg.name).and_then(Value::as_str);
            match value {
                Some(value) => {
                    rendered = rendered.replace(&format!("{{{{{}}}}}", arg.name), value);
                }
                None if arg.required => {
                    return Err(ProtocolError::invalid_params(format!(
                        "missing required argument '{}'",
                        arg.name
                    )))
                }
                None => {}
            }
        }
        Ok(rendered)
    }
}

#[async_trait]
impl Renderable for TemplatedPrompt {
    fn descriptor(&self) -> Prompt {
        Prompt {
            name: self.name.clone(),
            description: self.description.clone(),
            arguments: self.arguments.clone(),
        }
    }

    async fn render(&self, arguments: Value) -> ProtocolResult<Vec<PromptMessage>> {
        let text = self.fill(&arguments)?;
        Ok(vec![PromptMessage::user(Content::text(text))])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fills_required_placeholder() {
        let prompt = TemplatedPrompt::new("greet", "Hello, {{name}}!").with_argument("name", true);
        let messages = prompt.render(serde_json::json!({"name": "Ada"})).await.unwrap();
        assert_eq!(messages[0].content.as_text(), Some("Hello, Ada!"));
    }

    #[tokio::test]
    async fn missing_required_argument_fails() {
        let prompt = TemplatedPrompt::new("greet", "Hello, {{name}}!").with_argument("name", true);
        let err = prompt.render(serde_json::json!({})).await.unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidParams { .. }));
    }
}
