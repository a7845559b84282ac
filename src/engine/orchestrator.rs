use super::cancel::CancellationFlag;
use super::context::RunContext;
use super::dispatch::ExecutorRegistry;
use super::error::EngineError;
use super::resolver::resolve_step_inputs;
use crate::definition::{McpConfig, OutputSelection, WorkflowDefinition, WorkflowStep};
use crate::events::{LogLevel, ProgressPublisher, RunEvent, RunEventKind, StepLog};
use crate::executors::{ExecContext, FailureKind};
use crate::shared::ids::{RunId, StepId};
use crate::store::{
    PersistenceGateway, RunStatus, StepExecutionRecord, StepExecutionStatus, StoreError,
    WorkflowRunRecord,
};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineLimits {
    pub run_timeout_seconds: u64,
    pub default_step_timeout_seconds: u64,
    pub max_step_timeout_seconds: Option<u64>,
}

impl Default for EngineLimits {
    fn default() -> Self {
        Self {
            run_timeout_seconds: 3600,
            default_step_timeout_seconds: 600,
            max_step_timeout_seconds: None,
        }
    }
}

impl EngineLimits {
    /// Effective step budget: the config's own timeout where it declares
    /// one, clamped by the engine-wide ceiling.
    pub fn resolve_step_timeout(&self, config: &McpConfig) -> u64 {
        let declared = config
            .step_timeout_seconds()
            .unwrap_or(self.default_step_timeout_seconds);
        match self.max_step_timeout_seconds {
            Some(ceiling) => declared.min(ceiling),
            None => declared,
        }
    }
}

/// Drives one workflow run from PENDING to a terminal status: resolves each
/// step's inputs from the run context, dispatches the type-specific
/// executor, records outputs, and reports progress. Fail-fast: the first
/// step failure ends the run; there are no per-step retries.
///
/// Event publishing is best-effort; persistence is mandatory and a storage
/// failure aborts the run.
pub struct RunOrchestrator {
    store: Arc<dyn PersistenceGateway>,
    publisher: Arc<dyn ProgressPublisher>,
    registry: ExecutorRegistry,
    limits: EngineLimits,
}

impl RunOrchestrator {
    pub fn new(
        store: Arc<dyn PersistenceGateway>,
        publisher: Arc<dyn ProgressPublisher>,
        registry: ExecutorRegistry,
    ) -> Self {
        Self {
            store,
            publisher,
            registry,
            limits: EngineLimits::default(),
        }
    }

    pub fn with_limits(mut self, limits: EngineLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn execute_run_now(
        &self,
        run_id: &RunId,
        cancel: &CancellationFlag,
    ) -> Result<WorkflowRunRecord, EngineError> {
        self.execute_run(run_id, cancel, chrono::Utc::now().timestamp())
    }

    /// Runs to a terminal status. Step-level failures terminate the run as
    /// FAILED and return the record; `Err` is reserved for infrastructure
    /// failures (storage), after a best-effort FAILED mark.
    pub fn execute_run(
        &self,
        run_id: &RunId,
        cancel: &CancellationFlag,
        now: i64,
    ) -> Result<WorkflowRunRecord, EngineError> {
        match self.run_to_terminal(run_id, cancel, now) {
            Ok(run) => Ok(run),
            Err(err) => {
                if let Ok(mut run) = self.store.load_run(run_id) {
                    if !run.status.is_terminal() {
                        let reason = format!("engine failure: {err}");
                        let _ = self.store.transition_status(
                            &mut run,
                            RunStatus::Failed,
                            now,
                            Some(reason),
                        );
                    }
                }
                Err(err)
            }
        }
    }

    fn run_to_terminal(
        &self,
        run_id: &RunId,
        cancel: &CancellationFlag,
        start_now: i64,
    ) -> Result<WorkflowRunRecord, EngineError> {
        let mut run = self.store.load_run(run_id)?;
        if run.status.is_terminal() {
            return Ok(run);
        }
        let definition = self.store.load_definition(&run.definition_id)?;
        let clock = Instant::now();

        if run.status == RunStatus::Pending {
            self.transition(&mut run, RunStatus::Running, start_now, None)?;
        }

        let mut context = RunContext::new(run.runtime_inputs.clone());
        let ordered = definition.ordered_steps();

        for (index, step) in ordered.iter().enumerate() {
            let step_started_at = elapsed_now(start_now, clock);

            if cancel.is_canceled() {
                let message = format!("run canceled before step `{}`", step.id);
                return self.abort_run(&mut run, &context, step_started_at, &step.id, message);
            }

            if let Some(started_at) = run.started_at {
                let budget = self.limits.run_timeout_seconds as i64;
                if step_started_at.saturating_sub(started_at) > budget {
                    let err = EngineError::RunTimeout {
                        run_timeout_seconds: self.limits.run_timeout_seconds,
                    };
                    return self.fail_run(&mut run, &context, step_started_at, &step.id, err);
                }
            }

            run.current_step_id = Some(step.id.clone());
            run.updated_at = step_started_at;
            self.store.persist_run(&run)?;
            self.store.append_engine_log(
                &run.run_id,
                step_started_at,
                &format!("decision=execute step_id={} status={}", step.id, run.status),
            )?;

            // The first step also sees the run's external inputs; explicit
            // mappings win on key collision.
            let mut inputs = if index == 0 {
                context.runtime_inputs().clone()
            } else {
                Map::new()
            };
            match resolve_step_inputs(step, &context) {
                Ok(resolved) => inputs.extend(resolved),
                Err(err) => {
                    let now = elapsed_now(start_now, clock);
                    return self.fail_run(&mut run, &context, now, &step.id, err);
                }
            }

            let version = match self.store.load_mcp_version(&step.mcp_version_id) {
                Ok(version) => version,
                Err(StoreError::UnknownMcpVersion { mcp_version_id }) => {
                    let now = elapsed_now(start_now, clock);
                    let err = EngineError::StepExecution {
                        step_id: step.id.to_string(),
                        reason: format!("references unknown mcp version `{mcp_version_id}`"),
                    };
                    return self.fail_run(&mut run, &context, now, &step.id, err);
                }
                Err(other) => return Err(other.into()),
            };

            let executor = match self.registry.executor_for(version.mcp_type()) {
                Ok(executor) => executor,
                Err(err) => {
                    let now = elapsed_now(start_now, clock);
                    return self.fail_run(&mut run, &context, now, &step.id, err);
                }
            };

            let timeout_seconds = self.limits.resolve_step_timeout(&version.config);
            let step_log = OrchestratorStepLog {
                orchestrator: self,
                run_id: run.run_id.clone(),
                step_id: step.id.clone(),
                base_now: start_now,
                clock,
            };
            let exec_ctx = ExecContext {
                timeout: Duration::from_secs(timeout_seconds),
                cancel,
                log: &step_log,
            };
            let result = executor.execute(&version.config, &inputs, &exec_ctx);
            let step_ended_at = elapsed_now(start_now, clock);

            match result {
                Ok(outputs) => {
                    self.store.persist_step_execution(&StepExecutionRecord {
                        run_id: run.run_id.clone(),
                        step_id: step.id.clone(),
                        status: StepExecutionStatus::Succeeded,
                        outputs: outputs.clone(),
                        error: None,
                        started_at: step_started_at,
                        ended_at: step_ended_at,
                    })?;
                    self.store.append_engine_log(
                        &run.run_id,
                        step_ended_at,
                        &format!("step_id={} outcome=succeeded", step.id),
                    )?;
                    self.publish(
                        &run.run_id,
                        step_ended_at,
                        RunEventKind::StepCompleted {
                            step_id: step.id.clone(),
                            outputs: outputs.clone(),
                        },
                    );
                    context.record_step_outputs(step.id.clone(), outputs);
                }
                Err(failure) => {
                    self.store.persist_step_execution(&StepExecutionRecord {
                        run_id: run.run_id.clone(),
                        step_id: step.id.clone(),
                        status: StepExecutionStatus::Failed,
                        outputs: Map::new(),
                        error: Some(failure.to_string()),
                        started_at: step_started_at,
                        ended_at: step_ended_at,
                    })?;
                    self.store.append_engine_log(
                        &run.run_id,
                        step_ended_at,
                        &format!("step_id={} outcome=failed error={failure}", step.id),
                    )?;
                    if failure.kind == FailureKind::Canceled {
                        let message = format!("run canceled during step `{}`", step.id);
                        return self.abort_run(&mut run, &context, step_ended_at, &step.id, message);
                    }
                    let err = match failure.kind {
                        FailureKind::Timeout => EngineError::StepTimeout {
                            step_id: step.id.to_string(),
                            timeout_seconds,
                        },
                        _ => EngineError::StepExecution {
                            step_id: step.id.to_string(),
                            reason: failure.to_string(),
                        },
                    };
                    return self.fail_run(&mut run, &context, step_ended_at, &step.id, err);
                }
            }
        }

        let end_now = elapsed_now(start_now, clock);
        run.current_step_id = None;
        run.outputs = aggregate_outputs(&definition, &ordered, &context);
        self.transition(&mut run, RunStatus::Success, end_now, None)?;
        Ok(run)
    }

    fn fail_run(
        &self,
        run: &mut WorkflowRunRecord,
        context: &RunContext,
        now: i64,
        step_id: &StepId,
        err: EngineError,
    ) -> Result<WorkflowRunRecord, EngineError> {
        let message = err.to_string();
        let category = if err.is_definition_error() {
            "authoring"
        } else {
            "execution"
        };
        let _ = self.store.append_engine_log(
            &run.run_id,
            now,
            &format!("step_id={step_id} failure_category={category}"),
        );
        run.outputs = context.partial_results();
        self.publish(
            &run.run_id,
            now,
            RunEventKind::Error {
                step_id: Some(step_id.clone()),
                message: message.clone(),
            },
        );
        self.transition(run, RunStatus::Failed, now, Some(message))?;
        Ok(run.clone())
    }

    fn abort_run(
        &self,
        run: &mut WorkflowRunRecord,
        context: &RunContext,
        now: i64,
        step_id: &StepId,
        message: String,
    ) -> Result<WorkflowRunRecord, EngineError> {
        run.outputs = context.partial_results();
        self.publish(
            &run.run_id,
            now,
            RunEventKind::Log {
                step_id: Some(step_id.clone()),
                level: LogLevel::Info,
                message: message.clone(),
            },
        );
        self.transition(run, RunStatus::Aborted, now, Some(message))?;
        Ok(run.clone())
    }

    fn transition(
        &self,
        run: &mut WorkflowRunRecord,
        next: RunStatus,
        now: i64,
        error_message: Option<String>,
    ) -> Result<(), EngineError> {
        let from = run.status;
        let reason = error_message
            .as_deref()
            .map(|message| format!(" reason={message}"))
            .unwrap_or_default();
        self.store.transition_status(run, next, now, error_message)?;
        self.store.append_engine_log(
            &run.run_id,
            now,
            &format!("transition={next} from={from}{reason}"),
        )?;
        self.publish(&run.run_id, now, RunEventKind::StatusChange { from, to: next });
        Ok(())
    }

    /// Best-effort delivery: a publish failure is logged and swallowed, it
    /// never affects the run.
    fn publish(&self, run_id: &RunId, now: i64, kind: RunEventKind) {
        let event = RunEvent {
            run_id: run_id.clone(),
            ts: now,
            kind,
        };
        if let Err(err) = self.publisher.publish(&event) {
            let _ = self
                .store
                .append_engine_log(run_id, now, &format!("event publish failed: {err}"));
        }
    }
}

struct OrchestratorStepLog<'a> {
    orchestrator: &'a RunOrchestrator,
    run_id: RunId,
    step_id: StepId,
    base_now: i64,
    clock: Instant,
}

impl StepLog for OrchestratorStepLog<'_> {
    fn log(&self, level: LogLevel, message: &str) {
        let now = elapsed_now(self.base_now, self.clock);
        let _ = self.orchestrator.store.append_engine_log(
            &self.run_id,
            now,
            &format!("step_id={} level={level} {message}", self.step_id),
        );
        self.orchestrator.publish(
            &self.run_id,
            now,
            RunEventKind::Log {
                step_id: Some(self.step_id.clone()),
                level,
                message: message.to_string(),
            },
        );
    }
}

fn aggregate_outputs(
    definition: &WorkflowDefinition,
    ordered: &[&WorkflowStep],
    context: &RunContext,
) -> Map<String, Value> {
    match &definition.output_selection {
        OutputSelection::LastStep => ordered
            .last()
            .and_then(|step| context.step_outputs(&step.id))
            .cloned()
            .unwrap_or_default(),
        OutputSelection::MergedSteps => {
            let mut merged = Map::new();
            for step in ordered {
                if let Some(outputs) = context.step_outputs(&step.id) {
                    for (key, value) in outputs {
                        merged.insert(key.clone(), value.clone());
                    }
                }
            }
            merged
        }
        OutputSelection::Steps(step_ids) => {
            let mut merged = Map::new();
            for step_id in step_ids {
                if let Some(outputs) = context.step_outputs(step_id) {
                    for (key, value) in outputs {
                        merged.insert(key.clone(), value.clone());
                    }
                }
            }
            merged
        }
    }
}

fn elapsed_now(base_now: i64, clock: Instant) -> i64 {
    base_now.saturating_add(clock.elapsed().as_secs() as i64)
}
