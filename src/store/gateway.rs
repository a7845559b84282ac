use super::records::{RunStatus, StepExecutionRecord, WorkflowRunRecord};
use super::StoreError;
use crate::definition::{McpVersion, WorkflowDefinition};
use crate::shared::ids::{DefinitionId, McpVersionId, RunId};
use serde_json::{Map, Value};

/// Storage seam between the engine and whatever holds definitions and run
/// state. The orchestrator only ever talks to this trait; persistence
/// failures are mandatory failures and abort the run.
pub trait PersistenceGateway: Send + Sync {
    fn save_definition(&self, definition: &WorkflowDefinition) -> Result<(), StoreError>;
    fn load_definition(
        &self,
        definition_id: &DefinitionId,
    ) -> Result<WorkflowDefinition, StoreError>;

    fn register_mcp_version(&self, version: &McpVersion) -> Result<(), StoreError>;
    fn load_mcp_version(&self, version_id: &McpVersionId) -> Result<McpVersion, StoreError>;

    fn create_run(
        &self,
        definition_id: &DefinitionId,
        runtime_inputs: Map<String, Value>,
        now: i64,
    ) -> Result<WorkflowRunRecord, StoreError>;
    fn load_run(&self, run_id: &RunId) -> Result<WorkflowRunRecord, StoreError>;
    fn persist_run(&self, run: &WorkflowRunRecord) -> Result<(), StoreError>;

    fn persist_step_execution(&self, record: &StepExecutionRecord) -> Result<(), StoreError>;

    fn append_engine_log(&self, run_id: &RunId, now: i64, message: &str)
        -> Result<(), StoreError>;

    /// Validated status transition. Sets `started_at` on entering RUNNING and
    /// `ended_at` on entering a terminal status, then persists the record.
    fn transition_status(
        &self,
        run: &mut WorkflowRunRecord,
        next: RunStatus,
        now: i64,
        error_message: Option<String>,
    ) -> Result<(), StoreError> {
        if !run.status.can_transition_to(next) {
            return Err(StoreError::InvalidTransition {
                from: run.status,
                to: next,
            });
        }
        run.status = next;
        run.updated_at = now;
        if next == RunStatus::Running {
            run.started_at = Some(now);
        }
        if next.is_terminal() {
            run.ended_at = Some(now);
        }
        run.error_message = error_message;
        self.persist_run(run)
    }
}
