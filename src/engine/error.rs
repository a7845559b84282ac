use crate::definition::DefinitionError;
use crate::store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Definition(#[from] DefinitionError),
    #[error("input resolution failed for step `{step_id}`: {reason}")]
    Resolution { step_id: String, reason: String },
    #[error("unsupported step type `{mcp_type}`")]
    UnsupportedStepType { mcp_type: String },
    #[error("step execution failed for step `{step_id}`: {reason}")]
    StepExecution { step_id: String, reason: String },
    #[error("step `{step_id}` timed out after {timeout_seconds}s")]
    StepTimeout { step_id: String, timeout_seconds: u64 },
    #[error("workflow run timed out after {run_timeout_seconds}s")]
    RunTimeout { run_timeout_seconds: u64 },
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl EngineError {
    /// Authoring-time failures: never retried, surfaced verbatim as the
    /// run's error message.
    pub fn is_definition_error(&self) -> bool {
        matches!(
            self,
            EngineError::Definition(_)
                | EngineError::Resolution { .. }
                | EngineError::UnsupportedStepType { .. }
        )
    }
}
