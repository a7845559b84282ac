use super::subprocess::{run_command, CommandFailure, CommandSpec};
use super::{ExecContext, ExecutionFailure, Executor, ScratchDir};
use crate::definition::{McpConfig, ScriptConfig, ScriptLanguage};
use crate::events::LogLevel;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Env var carrying the JSON-encoded resolved inputs into the script
/// subprocess. The script is expected to print a JSON object on stdout.
pub const INPUTS_ENV_VAR: &str = "MCP_INPUTS";

/// Stdout that is not a JSON object is preserved under this key instead of
/// failing the step.
pub const RAW_OUTPUT_KEY: &str = "raw_output";

#[derive(Debug, Clone)]
pub struct InterpreterBinaries {
    pub python: String,
    pub typescript: String,
}

impl Default for InterpreterBinaries {
    fn default() -> Self {
        Self {
            python: "python3".to_string(),
            typescript: "tsx".to_string(),
        }
    }
}

pub fn resolve_interpreter_binaries() -> InterpreterBinaries {
    InterpreterBinaries {
        python: std::env::var("MCPFLOW_PYTHON_BIN").unwrap_or_else(|_| "python3".to_string()),
        typescript: std::env::var("MCPFLOW_TYPESCRIPT_BIN").unwrap_or_else(|_| "tsx".to_string()),
    }
}

/// Runs Python/TypeScript step code in a subprocess: the code is written to
/// a scratch source file, inputs travel through `MCP_INPUTS`, outputs come
/// back as a JSON object on stdout.
#[derive(Debug, Clone, Default)]
pub struct ScriptExecutor {
    binaries: InterpreterBinaries,
}

impl ScriptExecutor {
    pub fn new(binaries: InterpreterBinaries) -> Self {
        Self { binaries }
    }

    fn interpreter(&self, language: ScriptLanguage) -> &str {
        match language {
            ScriptLanguage::Python => &self.binaries.python,
            ScriptLanguage::TypeScript => &self.binaries.typescript,
        }
    }
}

impl Executor for ScriptExecutor {
    fn execute(
        &self,
        config: &McpConfig,
        inputs: &Map<String, Value>,
        ctx: &ExecContext<'_>,
    ) -> Result<Map<String, Value>, ExecutionFailure> {
        let (script, language) = match config {
            McpConfig::PythonScript(cfg) => (cfg, ScriptLanguage::Python),
            McpConfig::TypeScriptScript(cfg) => (cfg, ScriptLanguage::TypeScript),
            other => {
                return Err(ExecutionFailure::definition(format!(
                    "script executor cannot run `{}` config",
                    other.mcp_type()
                )))
            }
        };
        run_script(self.interpreter(language), script, language, inputs, ctx)
    }
}

fn run_script(
    interpreter: &str,
    script: &ScriptConfig,
    language: ScriptLanguage,
    inputs: &Map<String, Value>,
    ctx: &ExecContext<'_>,
) -> Result<Map<String, Value>, ExecutionFailure> {
    let scratch = ScratchDir::create("script")
        .map_err(|err| ExecutionFailure::execution(format!("scratch dir: {err}")))?;
    let source_path = scratch
        .path()
        .join(format!("step.{}", language.source_extension()));
    std::fs::write(&source_path, &script.code_content).map_err(|err| {
        ExecutionFailure::execution(format!("failed to write script source: {err}"))
    })?;

    let encoded_inputs = serde_json::to_string(inputs)
        .map_err(|err| ExecutionFailure::execution(format!("failed to encode inputs: {err}")))?;
    let spec = CommandSpec {
        binary: interpreter.to_string(),
        args: vec![source_path.display().to_string()],
        cwd: scratch.path().to_path_buf(),
        env: BTreeMap::from([(INPUTS_ENV_VAR.to_string(), encoded_inputs)]),
    };

    let output = match run_command(&spec, ctx.timeout, ctx.cancel) {
        Ok(output) => output,
        Err(CommandFailure::Timeout { timeout }) => {
            return Err(ExecutionFailure::timeout(format!(
                "script exceeded {}s budget",
                timeout.as_secs()
            )))
        }
        Err(CommandFailure::Canceled) => {
            return Err(ExecutionFailure::canceled("script terminated"))
        }
        Err(other) => return Err(ExecutionFailure::execution(other.to_string())),
    };

    match serde_json::from_str::<Value>(output.stdout.trim()) {
        Ok(Value::Object(outputs)) => Ok(outputs),
        _ => {
            ctx.log.log(
                LogLevel::Warning,
                "script stdout is not a JSON object; preserving raw text",
            );
            Ok(Map::from_iter([(
                RAW_OUTPUT_KEY.to_string(),
                Value::String(output.stdout),
            )]))
        }
    }
}
