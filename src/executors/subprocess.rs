use crate::engine::cancel::CancellationFlag;
use std::collections::BTreeMap;
use std::io::{BufReader, Read};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct CommandSpec {
    pub binary: String,
    pub args: Vec<String>,
    pub cwd: PathBuf,
    pub env: BTreeMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
}

#[derive(Debug)]
pub enum CommandFailure {
    MissingBinary {
        binary: String,
    },
    Timeout {
        timeout: Duration,
    },
    Canceled,
    NonZeroExit {
        exit_code: i32,
        stdout: String,
        stderr: String,
    },
    Io(std::io::Error),
}

impl std::fmt::Display for CommandFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CommandFailure::MissingBinary { binary } => {
                write!(f, "binary `{binary}` not found on PATH")
            }
            CommandFailure::Timeout { timeout } => {
                write!(f, "process exceeded {}s budget", timeout.as_secs())
            }
            CommandFailure::Canceled => write!(f, "process terminated by cancellation"),
            CommandFailure::NonZeroExit {
                exit_code,
                stdout,
                stderr,
            } => write!(
                f,
                "process exited with code {exit_code}; stderr: {stderr}; stdout: {stdout}"
            ),
            CommandFailure::Io(err) => write!(f, "io failure: {err}"),
        }
    }
}

/// Spawns a process with piped stdio and waits for it under a deadline,
/// polling the cancellation flag. The child is killed on timeout or
/// cancellation; stdout/stderr are drained on dedicated threads so a chatty
/// child cannot deadlock against a full pipe.
pub fn run_command(
    spec: &CommandSpec,
    timeout: Duration,
    cancel: &CancellationFlag,
) -> Result<CommandOutput, CommandFailure> {
    let mut command = Command::new(&spec.binary);
    command
        .current_dir(&spec.cwd)
        .args(&spec.args)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    for (key, value) in &spec.env {
        command.env(key, value);
    }

    let mut child = match command.spawn() {
        Ok(child) => child,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Err(CommandFailure::MissingBinary {
                binary: spec.binary.clone(),
            })
        }
        Err(err) => return Err(CommandFailure::Io(err)),
    };

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| CommandFailure::Io(std::io::Error::other("missing stdout pipe")))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| CommandFailure::Io(std::io::Error::other("missing stderr pipe")))?;

    let stdout_reader = thread::spawn(move || {
        let mut buf = String::new();
        let mut reader = BufReader::new(stdout);
        let _ = reader.read_to_string(&mut buf);
        buf
    });
    let stderr_reader = thread::spawn(move || {
        let mut buf = String::new();
        let mut reader = BufReader::new(stderr);
        let _ = reader.read_to_string(&mut buf);
        buf
    });

    let start = Instant::now();
    let exit_status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) => {
                if cancel.is_canceled() {
                    let _ = child.kill();
                    child.wait().map_err(CommandFailure::Io)?;
                    let _ = stdout_reader.join();
                    let _ = stderr_reader.join();
                    return Err(CommandFailure::Canceled);
                }
                if start.elapsed() > timeout {
                    let _ = child.kill();
                    child.wait().map_err(CommandFailure::Io)?;
                    let _ = stdout_reader.join();
                    let _ = stderr_reader.join();
                    return Err(CommandFailure::Timeout { timeout });
                }
                thread::sleep(Duration::from_millis(10));
            }
            Err(err) => return Err(CommandFailure::Io(err)),
        }
    };

    let stdout = stdout_reader.join().unwrap_or_default();
    let stderr = stderr_reader.join().unwrap_or_default();

    if !exit_status.success() {
        return Err(CommandFailure::NonZeroExit {
            exit_code: exit_status.code().unwrap_or(-1),
            stdout,
            stderr,
        });
    }

    Ok(CommandOutput { stdout, stderr })
}
