use mcpflow::definition::{McpConfig, ScriptConfig};
use mcpflow::engine::CancellationFlag;
use mcpflow::events::{LogLevel, StepLog};
use mcpflow::executors::{
    ExecContext, Executor, FailureKind, InterpreterBinaries, ScriptExecutor, RAW_OUTPUT_KEY,
};
use serde_json::{json, Map, Value};
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;
use tempfile::tempdir;

fn write_script(path: &Path, body: &str) {
    fs::write(path, body).expect("write script");
    let mut perms = fs::metadata(path).expect("metadata").permissions();
    perms.set_mode(0o755);
    fs::set_permissions(path, perms).expect("chmod");
}

/// Stand-in interpreter: runs the step source as a shell script so tests
/// need no real Python or TypeScript toolchain.
fn shell_interpreter(dir: &Path) -> String {
    let bin = dir.join("interp-mock");
    write_script(&bin, "#!/bin/sh\nexec /bin/sh \"$1\"\n");
    bin.display().to_string()
}

fn executor(interpreter: String) -> ScriptExecutor {
    ScriptExecutor::new(InterpreterBinaries {
        python: interpreter,
        typescript: "unused".to_string(),
    })
}

fn python_config(code: &str, timeout_seconds: u64) -> McpConfig {
    McpConfig::PythonScript(ScriptConfig {
        code_content: code.to_string(),
        timeout_seconds,
    })
}

#[derive(Default)]
struct RecordingLog {
    lines: Mutex<Vec<(LogLevel, String)>>,
}

impl StepLog for RecordingLog {
    fn log(&self, level: LogLevel, message: &str) {
        self.lines
            .lock()
            .expect("log lock")
            .push((level, message.to_string()));
    }
}

fn ctx<'a>(cancel: &'a CancellationFlag, log: &'a RecordingLog, timeout: Duration) -> ExecContext<'a> {
    ExecContext {
        timeout,
        cancel,
        log,
    }
}

#[test]
fn json_stdout_becomes_the_step_outputs() {
    let dir = tempdir().expect("tempdir");
    let executor = executor(shell_interpreter(dir.path()));
    let cancel = CancellationFlag::new();
    let log = RecordingLog::default();

    let outputs = executor
        .execute(
            &python_config("echo '{\"answer\": 42}'", 10),
            &Map::new(),
            &ctx(&cancel, &log, Duration::from_secs(10)),
        )
        .expect("success");
    assert_eq!(outputs.get("answer"), Some(&json!(42)));
}

#[test]
fn resolved_inputs_travel_through_the_inputs_env_var() {
    let dir = tempdir().expect("tempdir");
    let executor = executor(shell_interpreter(dir.path()));
    let cancel = CancellationFlag::new();
    let log = RecordingLog::default();

    let mut inputs = Map::new();
    inputs.insert("text".to_string(), json!("Bonjour"));

    // Echoing the env var back yields the inputs as the outputs.
    let outputs = executor
        .execute(
            &python_config("printf '%s' \"$MCP_INPUTS\"", 10),
            &inputs,
            &ctx(&cancel, &log, Duration::from_secs(10)),
        )
        .expect("success");
    assert_eq!(outputs, inputs);
}

#[test]
fn non_json_stdout_is_preserved_under_raw_output() {
    let dir = tempdir().expect("tempdir");
    let executor = executor(shell_interpreter(dir.path()));
    let cancel = CancellationFlag::new();
    let log = RecordingLog::default();

    let outputs = executor
        .execute(
            &python_config("echo 'plain text result'", 10),
            &Map::new(),
            &ctx(&cancel, &log, Duration::from_secs(10)),
        )
        .expect("success");
    assert_eq!(
        outputs.get(RAW_OUTPUT_KEY),
        Some(&Value::String("plain text result\n".to_string()))
    );
    let lines = log.lines.lock().expect("log lock");
    assert!(lines
        .iter()
        .any(|(level, message)| *level == LogLevel::Warning && message.contains("raw text")));
}

#[test]
fn a_failing_script_is_an_execution_failure() {
    let dir = tempdir().expect("tempdir");
    let executor = executor(shell_interpreter(dir.path()));
    let cancel = CancellationFlag::new();
    let log = RecordingLog::default();

    let failure = executor
        .execute(
            &python_config("echo 'bad input' 1>&2; exit 2", 10),
            &Map::new(),
            &ctx(&cancel, &log, Duration::from_secs(10)),
        )
        .expect_err("must fail");
    assert_eq!(failure.kind, FailureKind::Execution);
    assert!(failure.message.contains("bad input"));
}

#[test]
fn a_slow_script_hits_the_step_timeout() {
    let dir = tempdir().expect("tempdir");
    let executor = executor(shell_interpreter(dir.path()));
    let cancel = CancellationFlag::new();
    let log = RecordingLog::default();

    let failure = executor
        .execute(
            &python_config("sleep 30", 10),
            &Map::new(),
            &ctx(&cancel, &log, Duration::from_millis(200)),
        )
        .expect_err("must time out");
    assert_eq!(failure.kind, FailureKind::Timeout);
}

#[test]
fn cancellation_surfaces_as_a_canceled_failure() {
    let dir = tempdir().expect("tempdir");
    let executor = executor(shell_interpreter(dir.path()));
    let cancel = CancellationFlag::new();
    let log = RecordingLog::default();

    let canceler = cancel.clone();
    let handle = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(100));
        canceler.cancel();
    });

    let failure = executor
        .execute(
            &python_config("sleep 30", 10),
            &Map::new(),
            &ctx(&cancel, &log, Duration::from_secs(30)),
        )
        .expect_err("must be canceled");
    assert_eq!(failure.kind, FailureKind::Canceled);
    handle.join().expect("canceler thread");
}

#[test]
fn mismatched_config_is_a_definition_failure() {
    let dir = tempdir().expect("tempdir");
    let executor = executor(shell_interpreter(dir.path()));
    let cancel = CancellationFlag::new();
    let log = RecordingLog::default();

    let config = McpConfig::Llm(mcpflow::definition::LlmConfig {
        model: "small".to_string(),
        prompt_template: None,
    });
    let failure = executor
        .execute(
            &config,
            &Map::new(),
            &ctx(&cancel, &log, Duration::from_secs(10)),
        )
        .expect_err("must reject");
    assert_eq!(failure.kind, FailureKind::Definition);
}
