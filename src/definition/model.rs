use super::config::McpConfig;
use crate::shared::ids::{DefinitionId, McpVersionId, StepId};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Component type discriminator as it appears in definition payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum McpType {
    #[serde(rename = "LLM Prompt Agent")]
    LlmPromptAgent,
    #[serde(rename = "Jupyter Notebook")]
    JupyterNotebook,
    #[serde(rename = "Python Script")]
    PythonScript,
    #[serde(rename = "TypeScript Script")]
    TypeScriptScript,
    #[serde(rename = "Streamlit App")]
    StreamlitApp,
    #[serde(rename = "MCP")]
    Mcp,
}

impl McpType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::LlmPromptAgent => "LLM Prompt Agent",
            Self::JupyterNotebook => "Jupyter Notebook",
            Self::PythonScript => "Python Script",
            Self::TypeScriptScript => "TypeScript Script",
            Self::StreamlitApp => "Streamlit App",
            Self::Mcp => "MCP",
        }
    }

    pub fn parse(raw: &str) -> Result<Self, String> {
        match raw.trim() {
            "LLM Prompt Agent" => Ok(Self::LlmPromptAgent),
            "Jupyter Notebook" => Ok(Self::JupyterNotebook),
            "Python Script" => Ok(Self::PythonScript),
            "TypeScript Script" => Ok(Self::TypeScriptScript),
            "Streamlit App" => Ok(Self::StreamlitApp),
            "MCP" => Ok(Self::Mcp),
            other => Err(format!("unknown mcp type `{other}`")),
        }
    }
}

impl std::fmt::Display for McpType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Immutable, versioned component configuration. New behavior means a new
/// version, never an in-place edit.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct McpVersion {
    pub id: McpVersionId,
    pub mcp_definition_id: String,
    pub config: McpConfig,
}

impl McpVersion {
    pub fn mcp_type(&self) -> McpType {
        self.config.mcp_type()
    }
}

/// Declares where one step input value comes from: a literal, or a named
/// output of an earlier step. Any other shape fails to deserialize.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum InputMapping {
    Static {
        static_value: Value,
    },
    StepOutput {
        source_step_id: StepId,
        source_output_name: String,
    },
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct WorkflowStep {
    pub id: StepId,
    pub name: String,
    /// Execution sequence position; ties are broken by step id.
    pub order: u32,
    pub mcp_version_id: McpVersionId,
    #[serde(default)]
    pub input_mappings: BTreeMap<String, InputMapping>,
}

/// How a finished run derives its aggregate `outputs` from per-step outputs.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputSelection {
    /// The final step's outputs (default).
    LastStep,
    /// All step outputs merged in execution order; later steps win on key
    /// collision.
    MergedSteps,
    /// The named steps' outputs merged in list order.
    Steps(Vec<StepId>),
}

impl Default for OutputSelection {
    fn default() -> Self {
        Self::LastStep
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct WorkflowDefinition {
    pub id: DefinitionId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub output_selection: OutputSelection,
    #[serde(default)]
    pub steps: Vec<WorkflowStep>,
}

impl WorkflowDefinition {
    /// Steps in execution order: ascending `order`, ties broken by step id.
    pub fn ordered_steps(&self) -> Vec<&WorkflowStep> {
        let mut steps: Vec<&WorkflowStep> = self.steps.iter().collect();
        steps.sort_by(|a, b| a.order.cmp(&b.order).then_with(|| a.id.cmp(&b.id)));
        steps
    }

    pub fn step(&self, step_id: &StepId) -> Option<&WorkflowStep> {
        self.steps.iter().find(|step| &step.id == step_id)
    }
}
