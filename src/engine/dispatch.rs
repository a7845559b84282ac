use super::error::EngineError;
use crate::definition::McpType;
use crate::executors::{
    resolve_interpreter_binaries, resolve_notebook_runner, Executor, LlmExecutor, ModelBackend,
    NotebookExecutor, ScriptExecutor, StreamlitExecutor,
};
use std::path::PathBuf;
use std::sync::Arc;

/// Fixed executor registry. Dispatch is an exhaustive match over the closed
/// component-type set; there is no fallback executor.
pub struct ExecutorRegistry {
    script: ScriptExecutor,
    notebook: NotebookExecutor,
    llm: LlmExecutor,
    streamlit: StreamlitExecutor,
}

impl ExecutorRegistry {
    /// Interpreter and notebook-runner binaries come from env overrides
    /// with conventional defaults.
    pub fn new(backend: Arc<dyn ModelBackend>, artifacts_root: impl Into<PathBuf>) -> Self {
        Self {
            script: ScriptExecutor::new(resolve_interpreter_binaries()),
            notebook: NotebookExecutor::new(resolve_notebook_runner(), artifacts_root),
            llm: LlmExecutor::new(backend),
            streamlit: StreamlitExecutor,
        }
    }

    /// Explicit injection of each executor, for callers that manage binaries
    /// and backends themselves.
    pub fn with_components(
        script: ScriptExecutor,
        notebook: NotebookExecutor,
        llm: LlmExecutor,
        streamlit: StreamlitExecutor,
    ) -> Self {
        Self {
            script,
            notebook,
            llm,
            streamlit,
        }
    }

    pub fn executor_for(&self, mcp_type: McpType) -> Result<&dyn Executor, EngineError> {
        match mcp_type {
            McpType::LlmPromptAgent => Ok(&self.llm),
            McpType::JupyterNotebook => Ok(&self.notebook),
            McpType::PythonScript | McpType::TypeScriptScript => Ok(&self.script),
            McpType::StreamlitApp => Ok(&self.streamlit),
            // MCP package versions are definable but not executable here.
            McpType::Mcp => Err(EngineError::UnsupportedStepType {
                mcp_type: mcp_type.to_string(),
            }),
        }
    }

    /// Dispatch from a raw discriminator string, for callers that have not
    /// parsed the type yet.
    pub fn executor_for_raw(&self, raw: &str) -> Result<&dyn Executor, EngineError> {
        let mcp_type = McpType::parse(raw).map_err(|_| EngineError::UnsupportedStepType {
            mcp_type: raw.to_string(),
        })?;
        self.executor_for(mcp_type)
    }
}
