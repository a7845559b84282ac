use super::{ExecContext, ExecutionFailure, Executor};
use crate::definition::McpConfig;
use crate::events::LogLevel;
use serde_json::{Map, Value};
use std::sync::Arc;

/// Model-call seam. Production backends live with the hosting service; the
/// engine only needs prompt-in, completion-out.
pub trait ModelBackend: Send + Sync {
    fn complete(&self, model: &str, prompt: &str) -> Result<String, String>;
}

/// Backend returning a fixed completion, for tests and dry runs.
#[derive(Debug, Clone)]
pub struct CannedModelBackend {
    completion: String,
}

impl CannedModelBackend {
    pub fn new(completion: impl Into<String>) -> Self {
        Self {
            completion: completion.into(),
        }
    }
}

impl ModelBackend for CannedModelBackend {
    fn complete(&self, _model: &str, _prompt: &str) -> Result<String, String> {
        Ok(self.completion.clone())
    }
}

/// Builds a prompt from the configured template (or a direct `prompt`
/// input) and returns the backend completion under `completion`.
pub struct LlmExecutor {
    backend: Arc<dyn ModelBackend>,
}

impl LlmExecutor {
    pub fn new(backend: Arc<dyn ModelBackend>) -> Self {
        Self { backend }
    }
}

impl Executor for LlmExecutor {
    fn execute(
        &self,
        config: &McpConfig,
        inputs: &Map<String, Value>,
        ctx: &ExecContext<'_>,
    ) -> Result<Map<String, Value>, ExecutionFailure> {
        let McpConfig::Llm(cfg) = config else {
            return Err(ExecutionFailure::definition(format!(
                "llm executor cannot run `{}` config",
                config.mcp_type()
            )));
        };

        let prompt = match &cfg.prompt_template {
            Some(template) => render_prompt_template(template, inputs)?,
            None => match inputs.get("prompt") {
                Some(value) => value_to_text(value)?,
                None => {
                    return Err(ExecutionFailure::definition(
                        "llm step without a prompt template requires a `prompt` input",
                    ))
                }
            },
        };

        ctx.log.log(
            LogLevel::Info,
            &format!("calling model `{}` with {} prompt chars", cfg.model, prompt.len()),
        );
        let completion = self
            .backend
            .complete(&cfg.model, &prompt)
            .map_err(ExecutionFailure::execution)?;

        Ok(Map::from_iter([(
            "completion".to_string(),
            Value::String(completion),
        )]))
    }
}

/// Substitutes `{{placeholder}}` tokens from the resolved inputs. A missing
/// input is fatal for the step.
fn render_prompt_template(
    template: &str,
    inputs: &Map<String, Value>,
) -> Result<String, ExecutionFailure> {
    let mut rendered = String::new();
    let mut cursor = template;

    while let Some(start) = cursor.find("{{") {
        rendered.push_str(&cursor[..start]);
        let after_open = &cursor[start + 2..];
        let Some(close_offset) = after_open.find("}}") else {
            return Err(ExecutionFailure::definition(
                "unclosed placeholder in prompt template",
            ));
        };
        let token = after_open[..close_offset].trim();
        if token.is_empty() {
            return Err(ExecutionFailure::definition(
                "empty placeholder in prompt template",
            ));
        }
        let value = inputs.get(token).ok_or_else(|| {
            ExecutionFailure::definition(format!(
                "prompt template placeholder `{token}` has no matching input"
            ))
        })?;
        rendered.push_str(&value_to_text(value)?);
        cursor = &after_open[close_offset + 2..];
    }

    rendered.push_str(cursor);
    Ok(rendered)
}

fn value_to_text(value: &Value) -> Result<String, ExecutionFailure> {
    if let Some(text) = value.as_str() {
        return Ok(text.to_string());
    }
    serde_json::to_string(value)
        .map_err(|err| ExecutionFailure::execution(format!("failed to render input value: {err}")))
}
