mod fs_store;
mod gateway;
mod records;

pub use fs_store::FsWorkflowStore;
pub use gateway::PersistenceGateway;
pub use records::{RunStatus, StepExecutionRecord, StepExecutionStatus, WorkflowRunRecord};

use crate::definition::DefinitionError;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("workflow definition `{definition_id}` not found")]
    UnknownDefinition { definition_id: String },
    #[error("mcp version `{mcp_version_id}` not found")]
    UnknownMcpVersion { mcp_version_id: String },
    #[error("workflow run `{run_id}` not found")]
    UnknownRun { run_id: String },
    #[error("workflow run status transition `{from}` -> `{to}` is invalid")]
    InvalidTransition { from: RunStatus, to: RunStatus },
    #[error("run id allocation failed: {0}")]
    RunIdAllocation(String),
    #[error(transparent)]
    Definition(#[from] DefinitionError),
    #[error("io error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("json error at {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("yaml error at {path}: {source}")]
    Yaml {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
}
