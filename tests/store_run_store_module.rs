use mcpflow::definition::{
    LlmConfig, McpConfig, McpVersion, OutputSelection, WorkflowDefinition, WorkflowStep,
};
use mcpflow::shared::ids::{DefinitionId, McpVersionId, RunId, StepId};
use mcpflow::store::{
    FsWorkflowStore, PersistenceGateway, RunStatus, StepExecutionRecord, StepExecutionStatus,
    StoreError,
};
use serde_json::{json, Map};
use std::collections::BTreeMap;
use tempfile::tempdir;

fn llm_version(id: &str) -> McpVersion {
    McpVersion {
        id: McpVersionId::parse(id).expect("version id"),
        mcp_definition_id: "translator".to_string(),
        config: McpConfig::Llm(LlmConfig {
            model: "small".to_string(),
            prompt_template: None,
        }),
    }
}

fn single_step_definition(version_id: &str) -> WorkflowDefinition {
    WorkflowDefinition {
        id: DefinitionId::parse("wf-1").expect("definition id"),
        name: "sample".to_string(),
        description: "one step".to_string(),
        output_selection: OutputSelection::LastStep,
        steps: vec![WorkflowStep {
            id: StepId::parse("only").expect("step id"),
            name: "only".to_string(),
            order: 1,
            mcp_version_id: McpVersionId::parse(version_id).expect("version id"),
            input_mappings: BTreeMap::new(),
        }],
    }
}

#[test]
fn definitions_round_trip_through_yaml() {
    let dir = tempdir().expect("tempdir");
    let store = FsWorkflowStore::new(dir.path());
    store
        .register_mcp_version(&llm_version("ver-1"))
        .expect("register version");

    let definition = single_step_definition("ver-1");
    store.save_definition(&definition).expect("save");

    let loaded = store.load_definition(&definition.id).expect("load");
    assert_eq!(loaded, definition);
    assert!(dir.path().join("definitions/wf-1.yaml").is_file());
}

#[test]
fn saving_a_definition_requires_registered_versions() {
    let dir = tempdir().expect("tempdir");
    let store = FsWorkflowStore::new(dir.path());

    let err = store
        .save_definition(&single_step_definition("ver-missing"))
        .expect_err("must reject");
    assert!(matches!(err, StoreError::UnknownMcpVersion { .. }));
}

#[test]
fn saving_an_invalid_definition_is_rejected_before_any_write() {
    let dir = tempdir().expect("tempdir");
    let store = FsWorkflowStore::new(dir.path());

    let mut definition = single_step_definition("ver-1");
    definition.steps.clear();
    let err = store.save_definition(&definition).expect_err("must reject");
    assert!(matches!(err, StoreError::Definition(_)));
    assert!(!dir.path().join("definitions/wf-1.yaml").exists());
}

#[test]
fn create_run_starts_pending_with_a_minted_id() {
    let dir = tempdir().expect("tempdir");
    let store = FsWorkflowStore::new(dir.path());
    store
        .register_mcp_version(&llm_version("ver-1"))
        .expect("register version");
    store
        .save_definition(&single_step_definition("ver-1"))
        .expect("save");

    let mut inputs = Map::new();
    inputs.insert("inputText".to_string(), json!("Hello"));
    let run = store
        .create_run(
            &DefinitionId::parse("wf-1").expect("id"),
            inputs.clone(),
            1_700_000_000,
        )
        .expect("create run");

    assert!(run.run_id.as_str().starts_with("run-"));
    assert_eq!(run.status, RunStatus::Pending);
    assert_eq!(run.runtime_inputs, inputs);
    assert_eq!(run.created_at, 1_700_000_000);
    assert!(run.started_at.is_none());

    let loaded = store.load_run(&run.run_id).expect("load run");
    assert_eq!(loaded, run);
}

#[test]
fn create_run_rejects_unknown_definitions() {
    let dir = tempdir().expect("tempdir");
    let store = FsWorkflowStore::new(dir.path());
    let err = store
        .create_run(
            &DefinitionId::parse("ghost").expect("id"),
            Map::new(),
            1,
        )
        .expect_err("must reject");
    assert!(matches!(err, StoreError::UnknownDefinition { .. }));
}

#[test]
fn unknown_run_id_is_an_explicit_error() {
    let dir = tempdir().expect("tempdir");
    let store = FsWorkflowStore::new(dir.path());
    let err = store
        .load_run(&RunId::parse("run-nope").expect("id"))
        .expect_err("must fail");
    assert!(matches!(err, StoreError::UnknownRun { .. }));
}

#[test]
fn transitions_stamp_lifecycle_timestamps() {
    let dir = tempdir().expect("tempdir");
    let store = FsWorkflowStore::new(dir.path());
    store
        .register_mcp_version(&llm_version("ver-1"))
        .expect("register version");
    store
        .save_definition(&single_step_definition("ver-1"))
        .expect("save");
    let mut run = store
        .create_run(&DefinitionId::parse("wf-1").expect("id"), Map::new(), 100)
        .expect("create run");

    store
        .transition_status(&mut run, RunStatus::Running, 110, None)
        .expect("to running");
    assert_eq!(run.status, RunStatus::Running);
    assert_eq!(run.started_at, Some(110));
    assert!(run.ended_at.is_none());

    store
        .transition_status(&mut run, RunStatus::Success, 120, None)
        .expect("to success");
    assert_eq!(run.ended_at, Some(120));

    let loaded = store.load_run(&run.run_id).expect("reload");
    assert_eq!(loaded.status, RunStatus::Success);
    assert_eq!(loaded.started_at, Some(110));
    assert_eq!(loaded.ended_at, Some(120));
}

#[test]
fn invalid_transitions_are_rejected_and_not_persisted() {
    let dir = tempdir().expect("tempdir");
    let store = FsWorkflowStore::new(dir.path());
    store
        .register_mcp_version(&llm_version("ver-1"))
        .expect("register version");
    store
        .save_definition(&single_step_definition("ver-1"))
        .expect("save");
    let mut run = store
        .create_run(&DefinitionId::parse("wf-1").expect("id"), Map::new(), 100)
        .expect("create run");

    // PENDING cannot jump straight to SUCCESS.
    let err = store
        .transition_status(&mut run, RunStatus::Success, 110, None)
        .expect_err("must reject");
    assert!(matches!(
        err,
        StoreError::InvalidTransition {
            from: RunStatus::Pending,
            to: RunStatus::Success
        }
    ));
    assert_eq!(run.status, RunStatus::Pending);

    store
        .transition_status(&mut run, RunStatus::Running, 110, None)
        .expect("to running");
    store
        .transition_status(
            &mut run,
            RunStatus::Failed,
            120,
            Some("step `only` failed".to_string()),
        )
        .expect("to failed");

    // Terminal statuses accept no further transitions.
    let err = store
        .transition_status(&mut run, RunStatus::Running, 130, None)
        .expect_err("must reject");
    assert!(matches!(err, StoreError::InvalidTransition { .. }));
    let loaded = store.load_run(&run.run_id).expect("reload");
    assert_eq!(loaded.error_message.as_deref(), Some("step `only` failed"));
}

#[test]
fn step_executions_persist_under_the_run_directory() {
    let dir = tempdir().expect("tempdir");
    let store = FsWorkflowStore::new(dir.path());

    let run_id = RunId::parse("run-abc-0001").expect("run id");
    let mut outputs = Map::new();
    outputs.insert("completion".to_string(), json!("Bonjour"));
    store
        .persist_step_execution(&StepExecutionRecord {
            run_id: run_id.clone(),
            step_id: StepId::parse("translate").expect("step id"),
            status: StepExecutionStatus::Succeeded,
            outputs,
            error: None,
            started_at: 100,
            ended_at: 101,
        })
        .expect("persist");

    let path = dir.path().join("runs/run-abc-0001/steps/translate.json");
    assert!(path.is_file());
    let raw = std::fs::read_to_string(path).expect("read back");
    assert!(raw.contains("\"stepId\": \"translate\""));
    assert!(raw.contains("\"status\": \"succeeded\""));
}

#[test]
fn engine_log_lines_accumulate_per_state_root() {
    let dir = tempdir().expect("tempdir");
    let store = FsWorkflowStore::new(dir.path());
    let run_id = RunId::parse("run-abc-0001").expect("run id");

    store
        .append_engine_log(&run_id, 100, "decision=execute step_id=only")
        .expect("append");
    store
        .append_engine_log(&run_id, 101, "step_id=only outcome=succeeded")
        .expect("append");

    let raw = std::fs::read_to_string(dir.path().join("logs/engine.log")).expect("read log");
    let lines: Vec<&str> = raw.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with("ts=100 run_id=run-abc-0001 "));
    assert!(lines[1].contains("outcome=succeeded"));
}
