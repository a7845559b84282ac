pub mod cancel;
pub mod context;
pub mod dispatch;
pub mod error;
pub mod launcher;
pub mod orchestrator;
pub mod resolver;

pub use cancel::CancellationFlag;
pub use context::RunContext;
pub use dispatch::ExecutorRegistry;
pub use error::EngineError;
pub use launcher::RunLauncher;
pub use orchestrator::{EngineLimits, RunOrchestrator};
pub use resolver::resolve_step_inputs;
