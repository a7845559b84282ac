use crate::shared::ids::StepId;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// In-memory accumulation of one run's completed step outputs, keyed by
/// step id, plus the run's external inputs. Owned and mutated by a single
/// orchestrator; discarded (or flattened into the run record) at run end.
#[derive(Debug, Clone, Default)]
pub struct RunContext {
    runtime_inputs: Map<String, Value>,
    step_outputs: BTreeMap<StepId, Map<String, Value>>,
}

impl RunContext {
    pub fn new(runtime_inputs: Map<String, Value>) -> Self {
        Self {
            runtime_inputs,
            step_outputs: BTreeMap::new(),
        }
    }

    pub fn runtime_inputs(&self) -> &Map<String, Value> {
        &self.runtime_inputs
    }

    pub fn record_step_outputs(&mut self, step_id: StepId, outputs: Map<String, Value>) {
        self.step_outputs.insert(step_id, outputs);
    }

    pub fn step_outputs(&self, step_id: &StepId) -> Option<&Map<String, Value>> {
        self.step_outputs.get(step_id)
    }

    pub fn completed_steps(&self) -> impl Iterator<Item = (&StepId, &Map<String, Value>)> {
        self.step_outputs.iter()
    }

    /// Partial results for audit: every completed step's outputs as one
    /// object keyed by step id.
    pub fn partial_results(&self) -> Map<String, Value> {
        self.completed_steps()
            .map(|(step_id, outputs)| (step_id.to_string(), Value::Object(outputs.clone())))
            .collect()
    }
}
