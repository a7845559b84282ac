use super::subprocess::{run_command, CommandFailure, CommandSpec};
use super::{ExecContext, ExecutionFailure, Executor, ScratchDir};
use crate::definition::{McpConfig, NotebookConfig, NotebookSource};
use crate::events::LogLevel;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

pub fn resolve_notebook_runner() -> String {
    std::env::var("MCPFLOW_NOTEBOOK_RUNNER_BIN").unwrap_or_else(|_| "papermill".to_string())
}

/// Executes a parameterized notebook in a scratch working directory and
/// moves the executed copy into a persistent artifacts root. The runner is
/// invoked as `<runner> <input> <output> -f <parameters file>`.
#[derive(Debug, Clone)]
pub struct NotebookExecutor {
    runner: String,
    artifacts_root: PathBuf,
}

impl NotebookExecutor {
    pub fn new(runner: impl Into<String>, artifacts_root: impl Into<PathBuf>) -> Self {
        Self {
            runner: runner.into(),
            artifacts_root: artifacts_root.into(),
        }
    }
}

impl Executor for NotebookExecutor {
    fn execute(
        &self,
        config: &McpConfig,
        inputs: &Map<String, Value>,
        ctx: &ExecContext<'_>,
    ) -> Result<Map<String, Value>, ExecutionFailure> {
        let McpConfig::Notebook(cfg) = config else {
            return Err(ExecutionFailure::definition(format!(
                "notebook executor cannot run `{}` config",
                config.mcp_type()
            )));
        };

        let scratch = ScratchDir::create("notebook")
            .map_err(|err| ExecutionFailure::execution(format!("scratch dir: {err}")))?;
        let input_path = scratch.path().join("input.ipynb");
        materialize_notebook(cfg, &input_path)?;

        // Configured parameters first, resolved inputs win on collision.
        let mut parameters = cfg.parameters.clone();
        for (key, value) in inputs {
            parameters.insert(key.clone(), value.clone());
        }
        let params_path = scratch.path().join("parameters.json");
        let params_body = serde_json::to_vec_pretty(&parameters).map_err(|err| {
            ExecutionFailure::execution(format!("failed to encode parameters: {err}"))
        })?;
        fs::write(&params_path, params_body).map_err(|err| {
            ExecutionFailure::execution(format!("failed to write parameters file: {err}"))
        })?;

        let output_path = scratch.path().join("output.ipynb");
        let spec = CommandSpec {
            binary: self.runner.clone(),
            args: vec![
                input_path.display().to_string(),
                output_path.display().to_string(),
                "-f".to_string(),
                params_path.display().to_string(),
            ],
            cwd: scratch.path().to_path_buf(),
            env: BTreeMap::new(),
        };

        match run_command(&spec, ctx.timeout, ctx.cancel) {
            Ok(_) => {}
            Err(CommandFailure::Timeout { timeout }) => {
                return Err(ExecutionFailure::timeout(format!(
                    "notebook exceeded {}s budget",
                    timeout.as_secs()
                )))
            }
            Err(CommandFailure::Canceled) => {
                return Err(ExecutionFailure::canceled("notebook run terminated"))
            }
            Err(other) => return Err(ExecutionFailure::execution(other.to_string())),
        }

        let artifact = self.persist_artifact(&output_path)?;
        ctx.log.log(
            LogLevel::Info,
            &format!("executed notebook stored at {}", artifact.display()),
        );
        Ok(Map::from_iter([(
            "artifact_path".to_string(),
            Value::String(artifact.display().to_string()),
        )]))
    }
}

impl NotebookExecutor {
    fn persist_artifact(&self, output_path: &Path) -> Result<PathBuf, ExecutionFailure> {
        fs::create_dir_all(&self.artifacts_root).map_err(|err| {
            ExecutionFailure::execution(format!("failed to create artifacts root: {err}"))
        })?;
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        let dest = self
            .artifacts_root
            .join(format!("notebook-{}-{nanos}.ipynb", std::process::id()));
        // Copy rather than rename: scratch and artifacts root may live on
        // different filesystems.
        fs::copy(output_path, &dest).map_err(|err| {
            ExecutionFailure::execution(format!("failed to persist notebook artifact: {err}"))
        })?;
        Ok(dest)
    }
}

fn materialize_notebook(cfg: &NotebookConfig, dest: &Path) -> Result<(), ExecutionFailure> {
    match &cfg.source {
        NotebookSource::Path(path) => {
            fs::copy(path, dest).map_err(|err| {
                ExecutionFailure::execution(format!(
                    "failed to copy notebook from `{path}`: {err}"
                ))
            })?;
            Ok(())
        }
        NotebookSource::Cells(cells) => {
            let notebook = json!({
                "cells": cells
                    .iter()
                    .map(|source| json!({
                        "cell_type": "code",
                        "metadata": {},
                        "source": source,
                        "outputs": [],
                        "execution_count": null,
                    }))
                    .collect::<Vec<_>>(),
                "metadata": {},
                "nbformat": 4,
                "nbformat_minor": 5,
            });
            let body = serde_json::to_vec_pretty(&notebook).map_err(|err| {
                ExecutionFailure::execution(format!("failed to encode notebook: {err}"))
            })?;
            fs::write(dest, body).map_err(|err| {
                ExecutionFailure::execution(format!("failed to write notebook: {err}"))
            })
        }
    }
}
