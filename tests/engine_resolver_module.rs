use mcpflow::definition::{InputMapping, WorkflowStep};
use mcpflow::engine::{resolve_step_inputs, EngineError, RunContext};
use mcpflow::shared::ids::{McpVersionId, StepId};
use serde_json::{json, Map};
use std::collections::BTreeMap;

fn step_with_mappings(mappings: Vec<(&str, InputMapping)>) -> WorkflowStep {
    WorkflowStep {
        id: StepId::parse("current").expect("step id"),
        name: "current".to_string(),
        order: 2,
        mcp_version_id: McpVersionId::parse("ver-1").expect("version id"),
        input_mappings: mappings
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect::<BTreeMap<_, _>>(),
    }
}

fn context_with_upstream() -> RunContext {
    let mut context = RunContext::new(Map::new());
    let mut outputs = Map::new();
    outputs.insert("greeting".to_string(), json!("hello"));
    context.record_step_outputs(StepId::parse("upstream").expect("step id"), outputs);
    context
}

#[test]
fn static_values_pass_through_unchanged() {
    let step = step_with_mappings(vec![(
        "limit",
        InputMapping::Static {
            static_value: json!({"n": 3}),
        },
    )]);
    let resolved = resolve_step_inputs(&step, &RunContext::new(Map::new())).expect("resolved");
    assert_eq!(resolved.get("limit"), Some(&json!({"n": 3})));
}

#[test]
fn step_output_references_resolve_from_context() {
    let step = step_with_mappings(vec![(
        "text",
        InputMapping::StepOutput {
            source_step_id: StepId::parse("upstream").expect("id"),
            source_output_name: "greeting".to_string(),
        },
    )]);
    let resolved = resolve_step_inputs(&step, &context_with_upstream()).expect("resolved");
    assert_eq!(resolved.get("text"), Some(&json!("hello")));
}

#[test]
fn missing_source_step_names_the_input_and_step() {
    let step = step_with_mappings(vec![(
        "text",
        InputMapping::StepOutput {
            source_step_id: StepId::parse("ghost").expect("id"),
            source_output_name: "greeting".to_string(),
        },
    )]);
    let err = resolve_step_inputs(&step, &context_with_upstream()).expect_err("must fail");
    let EngineError::Resolution { step_id, reason } = err else {
        panic!("expected resolution error");
    };
    assert_eq!(step_id, "current");
    assert!(reason.contains("text"));
    assert!(reason.contains("ghost"));
}

#[test]
fn missing_output_name_is_an_error_not_a_null() {
    let step = step_with_mappings(vec![(
        "text",
        InputMapping::StepOutput {
            source_step_id: StepId::parse("upstream").expect("id"),
            source_output_name: "missing".to_string(),
        },
    )]);
    let err = resolve_step_inputs(&step, &context_with_upstream()).expect_err("must fail");
    let EngineError::Resolution { reason, .. } = err else {
        panic!("expected resolution error");
    };
    assert!(reason.contains("missing"));
    assert!(reason.contains("upstream"));
}

#[test]
fn resolution_is_deterministic_for_a_fixed_context() {
    let step = step_with_mappings(vec![
        (
            "text",
            InputMapping::StepOutput {
                source_step_id: StepId::parse("upstream").expect("id"),
                source_output_name: "greeting".to_string(),
            },
        ),
        (
            "mode",
            InputMapping::Static {
                static_value: json!("fast"),
            },
        ),
    ]);
    let context = context_with_upstream();
    let first = resolve_step_inputs(&step, &context).expect("resolved");
    let second = resolve_step_inputs(&step, &context).expect("resolved");
    assert_eq!(first, second);
}
