mod config;
mod model;
mod validate;

pub use config::{
    LlmConfig, McpConfig, McpPackageConfig, NotebookConfig, NotebookSource, ScriptConfig,
    ScriptLanguage, StreamlitAppConfig,
};
pub use model::{
    InputMapping, McpType, McpVersion, OutputSelection, WorkflowDefinition, WorkflowStep,
};
pub use validate::{validate_definition, DefinitionError};
