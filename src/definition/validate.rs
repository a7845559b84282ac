use super::model::{InputMapping, OutputSelection, WorkflowDefinition};
use std::collections::HashMap;

#[derive(Debug, thiserror::Error)]
pub enum DefinitionError {
    #[error("workflow `{definition_id}` requires at least one step")]
    EmptySteps { definition_id: String },
    #[error("workflow `{definition_id}` contains duplicate step id `{step_id}`")]
    DuplicateStepId {
        definition_id: String,
        step_id: String,
    },
    #[error(
        "step `{step_id}` input `{param}` references unknown step `{source_step_id}`"
    )]
    UnknownSourceStep {
        step_id: String,
        param: String,
        source_step_id: String,
    },
    #[error(
        "step `{step_id}` (order {order}) input `{param}` references step \
         `{source_step_id}` (order {source_order}); referenced steps must have \
         strictly smaller order"
    )]
    OrderViolation {
        step_id: String,
        param: String,
        order: u32,
        source_step_id: String,
        source_order: u32,
    },
    #[error("workflow `{definition_id}` output selection names unknown step `{step_id}`")]
    UnknownOutputStep {
        definition_id: String,
        step_id: String,
    },
}

/// Save-time structural validation. A definition that passes here cannot
/// produce a forward or self reference at run time: every step-output
/// reference points at a step with strictly smaller `order`, so the step
/// graph is acyclic by construction.
pub fn validate_definition(definition: &WorkflowDefinition) -> Result<(), DefinitionError> {
    if definition.steps.is_empty() {
        return Err(DefinitionError::EmptySteps {
            definition_id: definition.id.to_string(),
        });
    }

    let mut orders: HashMap<&str, u32> = HashMap::new();
    for step in &definition.steps {
        if orders.insert(step.id.as_str(), step.order).is_some() {
            return Err(DefinitionError::DuplicateStepId {
                definition_id: definition.id.to_string(),
                step_id: step.id.to_string(),
            });
        }
    }

    for step in &definition.steps {
        for (param, mapping) in &step.input_mappings {
            let InputMapping::StepOutput { source_step_id, .. } = mapping else {
                continue;
            };
            let Some(source_order) = orders.get(source_step_id.as_str()).copied() else {
                return Err(DefinitionError::UnknownSourceStep {
                    step_id: step.id.to_string(),
                    param: param.clone(),
                    source_step_id: source_step_id.to_string(),
                });
            };
            if source_order >= step.order {
                return Err(DefinitionError::OrderViolation {
                    step_id: step.id.to_string(),
                    param: param.clone(),
                    order: step.order,
                    source_step_id: source_step_id.to_string(),
                    source_order,
                });
            }
        }
    }

    if let OutputSelection::Steps(step_ids) = &definition.output_selection {
        for step_id in step_ids {
            if !orders.contains_key(step_id.as_str()) {
                return Err(DefinitionError::UnknownOutputStep {
                    definition_id: definition.id.to_string(),
                    step_id: step_id.to_string(),
                });
            }
        }
    }

    Ok(())
}
