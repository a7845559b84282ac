mod llm;
mod notebook;
mod script;
mod streamlit;
mod subprocess;

pub use llm::{CannedModelBackend, LlmExecutor, ModelBackend};
pub use notebook::{resolve_notebook_runner, NotebookExecutor};
pub use script::{
    resolve_interpreter_binaries, InterpreterBinaries, ScriptExecutor, INPUTS_ENV_VAR,
    RAW_OUTPUT_KEY,
};
pub use streamlit::StreamlitExecutor;
pub use subprocess::{run_command, CommandFailure, CommandOutput, CommandSpec};

use crate::definition::McpConfig;
use crate::engine::cancel::CancellationFlag;
use crate::events::StepLog;
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// How an executor failed, as a plain value the orchestrator matches on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The underlying work failed (non-zero exit, backend error, ...).
    Execution,
    /// The step exceeded its time budget.
    Timeout,
    /// The run was canceled while the step was in flight.
    Canceled,
    /// Authoring error: the config or resolved inputs cannot drive this
    /// executor. Never retried.
    Definition,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl ExecutionFailure {
    pub fn execution(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Execution,
            message: message.into(),
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Timeout,
            message: message.into(),
        }
    }

    pub fn canceled(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Canceled,
            message: message.into(),
        }
    }

    pub fn definition(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Definition,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ExecutionFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.kind {
            FailureKind::Execution => write!(f, "execution failed: {}", self.message),
            FailureKind::Timeout => write!(f, "timed out: {}", self.message),
            FailureKind::Canceled => write!(f, "canceled: {}", self.message),
            FailureKind::Definition => write!(f, "definition error: {}", self.message),
        }
    }
}

/// Per-step execution environment handed to an executor by the orchestrator.
pub struct ExecContext<'a> {
    /// Effective step time budget (config value clamped by engine limits).
    pub timeout: Duration,
    pub cancel: &'a CancellationFlag,
    pub log: &'a dyn StepLog,
}

/// Per-type strategy that performs one step's work over resolved inputs.
pub trait Executor: Send + Sync {
    fn execute(
        &self,
        config: &McpConfig,
        inputs: &Map<String, Value>,
        ctx: &ExecContext<'_>,
    ) -> Result<Map<String, Value>, ExecutionFailure>;
}

impl std::fmt::Debug for dyn Executor + '_ {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("dyn Executor")
    }
}

/// Scratch working directory removed on every exit path, including panics
/// and early returns.
pub(crate) struct ScratchDir {
    path: PathBuf,
}

impl ScratchDir {
    pub(crate) fn create(prefix: &str) -> std::io::Result<Self> {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        let path = std::env::temp_dir().join(format!(
            "mcpflow-{prefix}-{}-{nanos}",
            std::process::id()
        ));
        fs::create_dir_all(&path)?;
        Ok(Self { path })
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.path);
    }
}
