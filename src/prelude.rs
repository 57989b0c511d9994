//! Convenience re-exports for common use.

pub use crate::config::OrchestratorConfig;
pub use crate::error::{OrchestratorError, Result};
pub use crate::normalize::InboundMessage;
pub use crate::orchestrator::{
    OrchestrationHandle, OrchestrationRequest, Orchestrator, RunResult, RunStatus,
};
pub use crate::prompt::{ScopeContext, ScopeContextFetcher, ScopeDocument};
pub use crate::protocol::{sse_headers, ChannelSink, EventSink, EventType, StreamEvent};
pub use crate::provider::{ModelClient, ModelDelta, ModelRequest};
pub use crate::tools::{ToolContext, ToolFilter, ToolHandler, ToolHandlers, ToolOutput, ToolRegistry};
pub use crate::types::{ContentPart, RequestContext, Role, ToolResult, ToolUseRequest, Turn, Usage};
