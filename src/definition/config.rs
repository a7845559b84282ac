use super::model::McpType;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

fn default_timeout_seconds() -> u64 {
    600
}

/// Typed per-component configuration. The serde tag is the component type
/// discriminator, so a config body can never disagree with its declared type.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type")]
pub enum McpConfig {
    #[serde(rename = "LLM Prompt Agent")]
    Llm(LlmConfig),
    #[serde(rename = "Jupyter Notebook")]
    Notebook(NotebookConfig),
    #[serde(rename = "Python Script")]
    PythonScript(ScriptConfig),
    #[serde(rename = "TypeScript Script")]
    TypeScriptScript(ScriptConfig),
    #[serde(rename = "Streamlit App")]
    StreamlitApp(StreamlitAppConfig),
    #[serde(rename = "MCP")]
    McpPackage(McpPackageConfig),
}

impl McpConfig {
    pub fn mcp_type(&self) -> McpType {
        match self {
            McpConfig::Llm(_) => McpType::LlmPromptAgent,
            McpConfig::Notebook(_) => McpType::JupyterNotebook,
            McpConfig::PythonScript(_) => McpType::PythonScript,
            McpConfig::TypeScriptScript(_) => McpType::TypeScriptScript,
            McpConfig::StreamlitApp(_) => McpType::StreamlitApp,
            McpConfig::McpPackage(_) => McpType::Mcp,
        }
    }

    /// Step timeout declared by the config, where the variant supports one.
    pub fn step_timeout_seconds(&self) -> Option<u64> {
        match self {
            McpConfig::Notebook(cfg) => Some(cfg.timeout_seconds),
            McpConfig::PythonScript(cfg) | McpConfig::TypeScriptScript(cfg) => {
                Some(cfg.timeout_seconds)
            }
            McpConfig::Llm(_) | McpConfig::StreamlitApp(_) | McpConfig::McpPackage(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScriptLanguage {
    Python,
    TypeScript,
}

impl ScriptLanguage {
    pub fn source_extension(self) -> &'static str {
        match self {
            ScriptLanguage::Python => "py",
            ScriptLanguage::TypeScript => "ts",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct LlmConfig {
    pub model: String,
    /// Prompt template with a single `{{placeholder}}` substituted from the
    /// step's resolved inputs. When absent, a direct `prompt` input is used.
    #[serde(default)]
    pub prompt_template: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct NotebookConfig {
    #[serde(flatten)]
    pub source: NotebookSource,
    #[serde(default)]
    pub parameters: Map<String, Value>,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

/// A notebook is materialized either from a file path or from embedded
/// code-cell sources.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub enum NotebookSource {
    #[serde(rename = "notebook_path")]
    Path(String),
    #[serde(rename = "cells")]
    Cells(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ScriptConfig {
    pub code_content: String,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct StreamlitAppConfig {
    pub repo_url: String,
    pub entry_script: String,
    #[serde(default)]
    pub requirements: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct McpPackageConfig {
    pub package: String,
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default)]
    pub args: Vec<String>,
}
