mod sse;

pub use sse::sse_block;

use crate::shared::ids::{RunId, StepId};
use crate::store::RunStatus;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;

pub const RUN_EVENT_CHANNEL_PREFIX: &str = "workflow_run_events";

/// Per-run pub/sub channel name the streaming collaborator subscribes to.
pub fn run_event_channel(run_id: &RunId) -> String {
    format!("{RUN_EVENT_CHANNEL_PREFIX}:{run_id}")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Info,
    Warning,
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Info => write!(f, "info"),
            LogLevel::Warning => write!(f, "warning"),
            LogLevel::Error => write!(f, "error"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunEvent {
    pub run_id: RunId,
    pub ts: i64,
    #[serde(flatten)]
    pub kind: RunEventKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event_type", content = "payload", rename_all = "snake_case")]
pub enum RunEventKind {
    Log {
        #[serde(default)]
        step_id: Option<StepId>,
        level: LogLevel,
        message: String,
    },
    StatusChange {
        from: RunStatus,
        to: RunStatus,
    },
    StepCompleted {
        step_id: StepId,
        outputs: Map<String, Value>,
    },
    Error {
        #[serde(default)]
        step_id: Option<StepId>,
        message: String,
    },
}

impl RunEventKind {
    pub fn event_type(&self) -> &'static str {
        match self {
            RunEventKind::Log { .. } => "log",
            RunEventKind::StatusChange { .. } => "status_change",
            RunEventKind::StepCompleted { .. } => "step_completed",
            RunEventKind::Error { .. } => "error",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("failed to encode run event: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("failed to deliver run event: {0}")]
    Sink(String),
}

/// Delivery seam for orchestrator progress. Publishing is best-effort: the
/// orchestrator logs and swallows errors from this trait.
pub trait ProgressPublisher: Send + Sync {
    fn publish(&self, event: &RunEvent) -> Result<(), PublishError>;
}

/// Drops every event. Useful when no streaming collaborator is attached.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullPublisher;

impl ProgressPublisher for NullPublisher {
    fn publish(&self, _event: &RunEvent) -> Result<(), PublishError> {
        Ok(())
    }
}

/// Collects events in memory, in publish order.
#[derive(Debug, Default)]
pub struct MemoryPublisher {
    events: Mutex<Vec<RunEvent>>,
}

impl MemoryPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<RunEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl ProgressPublisher for MemoryPublisher {
    fn publish(&self, event: &RunEvent) -> Result<(), PublishError> {
        self.events
            .lock()
            .map_err(|_| PublishError::Sink("publisher lock poisoned".to_string()))?
            .push(event.clone());
        Ok(())
    }
}

/// Appends one JSON line per event under `runs/<run_id>/events.log`, the
/// durable tail a relay process can follow.
#[derive(Debug, Clone)]
pub struct FileEventLog {
    state_root: PathBuf,
}

impl FileEventLog {
    pub fn new(state_root: impl Into<PathBuf>) -> Self {
        Self {
            state_root: state_root.into(),
        }
    }

    pub fn events_path(&self, run_id: &RunId) -> PathBuf {
        self.state_root
            .join("runs")
            .join(run_id.as_str())
            .join("events.log")
    }
}

impl ProgressPublisher for FileEventLog {
    fn publish(&self, event: &RunEvent) -> Result<(), PublishError> {
        let line = serde_json::to_string(event)?;
        let path = self.events_path(&event.run_id);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| PublishError::Sink(err.to_string()))?;
        }
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|err| PublishError::Sink(err.to_string()))?;
        writeln!(file, "{line}").map_err(|err| PublishError::Sink(err.to_string()))
    }
}

/// Logging side channel executors use for human-readable progress. The
/// orchestrator forwards these lines to the progress publisher.
pub trait StepLog {
    fn log(&self, level: LogLevel, message: &str);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NullStepLog;

impl StepLog for NullStepLog {
    fn log(&self, _level: LogLevel, _message: &str) {}
}
