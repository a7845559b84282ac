use super::{ExecContext, ExecutionFailure, Executor};
use crate::definition::McpConfig;
use serde_json::{Map, Value};

const REQUIREMENTS_PREVIEW_LIMIT: usize = 5;

/// Executes nothing: reports descriptive metadata about an externally
/// hosted app so downstream steps and clients can link to it.
#[derive(Debug, Clone, Copy, Default)]
pub struct StreamlitExecutor;

impl Executor for StreamlitExecutor {
    fn execute(
        &self,
        config: &McpConfig,
        _inputs: &Map<String, Value>,
        _ctx: &ExecContext<'_>,
    ) -> Result<Map<String, Value>, ExecutionFailure> {
        let McpConfig::StreamlitApp(cfg) = config else {
            return Err(ExecutionFailure::definition(format!(
                "streamlit executor cannot run `{}` config",
                config.mcp_type()
            )));
        };

        let preview = cfg
            .requirements
            .iter()
            .take(REQUIREMENTS_PREVIEW_LIMIT)
            .cloned()
            .map(Value::String)
            .collect::<Vec<_>>();

        Ok(Map::from_iter([
            ("app_type".to_string(), Value::String("streamlit".to_string())),
            ("repo_url".to_string(), Value::String(cfg.repo_url.clone())),
            (
                "entry_script".to_string(),
                Value::String(cfg.entry_script.clone()),
            ),
            ("requirements_preview".to_string(), Value::Array(preview)),
        ]))
    }
}
