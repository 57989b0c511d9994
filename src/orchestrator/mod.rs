//! Streaming response driver: the model-call and tool-phase loop.

pub mod driver;
pub mod state;
pub mod types;

pub use driver::{OrchestrationHandle, OrchestrationRequest, Orchestrator, OrchestratorBuilder};
pub use state::{transition, DoneReason, DriverInput, DriverState};
pub use types::{RunId, RunResult, RunStatus};
