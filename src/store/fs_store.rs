use super::gateway::PersistenceGateway;
use super::records::{RunStatus, StepExecutionRecord, WorkflowRunRecord};
use super::StoreError;
use crate::definition::{validate_definition, McpVersion, WorkflowDefinition};
use crate::shared::fs_json::{read_json, write_atomic, write_json_atomic};
use crate::shared::ids::{generate_run_id, DefinitionId, McpVersionId, RunId};
use crate::shared::logging::{append_engine_log_line, engine_log_path};
use serde_json::{Map, Value};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Filesystem persistence: definitions and MCP versions as YAML, run and
/// step-execution records as atomically written JSON under a state root.
#[derive(Debug, Clone)]
pub struct FsWorkflowStore {
    state_root: PathBuf,
}

impl FsWorkflowStore {
    pub fn new(state_root: impl Into<PathBuf>) -> Self {
        Self {
            state_root: state_root.into(),
        }
    }

    pub fn state_root(&self) -> &Path {
        &self.state_root
    }

    fn definition_path(&self, definition_id: &DefinitionId) -> PathBuf {
        self.state_root
            .join("definitions")
            .join(format!("{definition_id}.yaml"))
    }

    fn mcp_version_path(&self, version_id: &McpVersionId) -> PathBuf {
        self.state_root
            .join("mcp_versions")
            .join(format!("{version_id}.yaml"))
    }

    fn run_path(&self, run_id: &RunId) -> PathBuf {
        self.state_root.join("runs").join(format!("{run_id}.json"))
    }

    fn step_execution_path(&self, run_id: &RunId, step_id: &str) -> PathBuf {
        self.state_root
            .join("runs")
            .join(run_id.as_str())
            .join("steps")
            .join(format!("{step_id}.json"))
    }

    fn write_yaml<T: serde::Serialize>(&self, path: &Path, value: &T) -> Result<(), StoreError> {
        let body = serde_yaml::to_string(value).map_err(|source| StoreError::Yaml {
            path: path.display().to_string(),
            source,
        })?;
        write_atomic(path, body.as_bytes()).map_err(|source| io_error(path, source))
    }

    fn read_yaml<T: serde::de::DeserializeOwned>(&self, path: &Path) -> Result<T, StoreError> {
        let raw = fs::read_to_string(path).map_err(|source| io_error(path, source))?;
        serde_yaml::from_str(&raw).map_err(|source| StoreError::Yaml {
            path: path.display().to_string(),
            source,
        })
    }
}

impl PersistenceGateway for FsWorkflowStore {
    fn save_definition(&self, definition: &WorkflowDefinition) -> Result<(), StoreError> {
        validate_definition(definition)?;
        for step in &definition.steps {
            let version_path = self.mcp_version_path(&step.mcp_version_id);
            if !version_path.is_file() {
                return Err(StoreError::UnknownMcpVersion {
                    mcp_version_id: step.mcp_version_id.to_string(),
                });
            }
        }
        self.write_yaml(&self.definition_path(&definition.id), definition)
    }

    fn load_definition(
        &self,
        definition_id: &DefinitionId,
    ) -> Result<WorkflowDefinition, StoreError> {
        let path = self.definition_path(definition_id);
        if !path.is_file() {
            return Err(StoreError::UnknownDefinition {
                definition_id: definition_id.to_string(),
            });
        }
        self.read_yaml(&path)
    }

    fn register_mcp_version(&self, version: &McpVersion) -> Result<(), StoreError> {
        self.write_yaml(&self.mcp_version_path(&version.id), version)
    }

    fn load_mcp_version(&self, version_id: &McpVersionId) -> Result<McpVersion, StoreError> {
        let path = self.mcp_version_path(version_id);
        if !path.is_file() {
            return Err(StoreError::UnknownMcpVersion {
                mcp_version_id: version_id.to_string(),
            });
        }
        self.read_yaml(&path)
    }

    fn create_run(
        &self,
        definition_id: &DefinitionId,
        runtime_inputs: Map<String, Value>,
        now: i64,
    ) -> Result<WorkflowRunRecord, StoreError> {
        // Fails early if the definition was never saved.
        self.load_definition(definition_id)?;
        let run_id = generate_run_id(now).map_err(StoreError::RunIdAllocation)?;
        let run = WorkflowRunRecord {
            run_id,
            definition_id: definition_id.clone(),
            status: RunStatus::Pending,
            runtime_inputs,
            outputs: Map::new(),
            error_message: None,
            current_step_id: None,
            created_at: now,
            started_at: None,
            ended_at: None,
            updated_at: now,
        };
        self.persist_run(&run)?;
        Ok(run)
    }

    fn load_run(&self, run_id: &RunId) -> Result<WorkflowRunRecord, StoreError> {
        let path = self.run_path(run_id);
        match read_json(&path) {
            Ok(run) => Ok(run),
            Err(source) if source.kind() == ErrorKind::NotFound => Err(StoreError::UnknownRun {
                run_id: run_id.to_string(),
            }),
            Err(source) => Err(io_error(&path, source)),
        }
    }

    fn persist_run(&self, run: &WorkflowRunRecord) -> Result<(), StoreError> {
        let path = self.run_path(&run.run_id);
        write_json_atomic(&path, run).map_err(|source| io_error(&path, source))
    }

    fn persist_step_execution(&self, record: &StepExecutionRecord) -> Result<(), StoreError> {
        let path = self.step_execution_path(&record.run_id, record.step_id.as_str());
        write_json_atomic(&path, record).map_err(|source| io_error(&path, source))
    }

    fn append_engine_log(
        &self,
        run_id: &RunId,
        now: i64,
        message: &str,
    ) -> Result<(), StoreError> {
        let line = format!("ts={now} run_id={run_id} {message}");
        append_engine_log_line(&self.state_root, &line)
            .map_err(|source| io_error(&engine_log_path(&self.state_root), source))
    }
}

fn io_error(path: &Path, source: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.display().to_string(),
        source,
    }
}
