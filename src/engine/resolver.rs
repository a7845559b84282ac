use super::context::RunContext;
use super::error::EngineError;
use crate::definition::{InputMapping, WorkflowStep};
use serde_json::{Map, Value};

/// Turns a step's declared input mappings into concrete values using the
/// accumulated run context. Pure over its arguments: never re-queries
/// storage, deterministic for a fixed context. A dangling reference is an
/// authoring error, never retried.
pub fn resolve_step_inputs(
    step: &WorkflowStep,
    context: &RunContext,
) -> Result<Map<String, Value>, EngineError> {
    let mut resolved = Map::new();
    for (param, mapping) in &step.input_mappings {
        let value = match mapping {
            InputMapping::Static { static_value } => static_value.clone(),
            InputMapping::StepOutput {
                source_step_id,
                source_output_name,
            } => {
                let outputs = context.step_outputs(source_step_id).ok_or_else(|| {
                    EngineError::Resolution {
                        step_id: step.id.to_string(),
                        reason: format!(
                            "input `{param}` references step `{source_step_id}` which has not \
                             produced outputs"
                        ),
                    }
                })?;
                outputs
                    .get(source_output_name)
                    .cloned()
                    .ok_or_else(|| EngineError::Resolution {
                        step_id: step.id.to_string(),
                        reason: format!(
                            "input `{param}` references missing output \
                             `{source_output_name}` of step `{source_step_id}`"
                        ),
                    })?
            }
        };
        resolved.insert(param.clone(), value);
    }
    Ok(resolved)
}
