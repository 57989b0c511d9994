//! Model client seam and the Anthropic Messages implementation.

pub mod anthropic;
pub mod http;

pub use anthropic::AnthropicClient;

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::error::Result;
use crate::tools::ToolDefinition;
use crate::types::{ContentPart, ToolUseRequest, Turn, Usage};

/// One streaming model call.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelRequest {
    pub model: String,
    pub system: Option<String>,
    pub turns: Vec<Turn>,
    pub tools: Vec<ToolDefinition>,
    pub max_tokens: u32,
    pub temperature: Option<f64>,
}

/// Why the model stopped producing output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    EndTurn,
    ToolUse,
    MaxTokens,
    StopSequence,
    Other(String),
}

impl StopReason {
    pub fn from_wire(value: &str) -> Self {
        match value {
            "end_turn" => Self::EndTurn,
            "tool_use" => Self::ToolUse,
            "max_tokens" => Self::MaxTokens,
            "stop_sequence" => Self::StopSequence,
            other => Self::Other(other.to_string()),
        }
    }
}

/// The complete assistant turn once the model stream has finished.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FinishedTurn {
    pub content: Vec<ContentPart>,
    pub stop_reason: Option<StopReason>,
    pub usage: Usage,
}

impl FinishedTurn {
    pub fn tool_uses(&self) -> Vec<ToolUseRequest> {
        self.content
            .iter()
            .filter_map(|part| match part {
                ContentPart::ToolUse(request) => Some(request.clone()),
                _ => None,
            })
            .collect()
    }
}

/// Incremental output from a model stream. A well-formed stream yields any
/// number of `Text` and `Activity` deltas followed by exactly one `Finished`.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelDelta {
    Text(String),
    /// The stream is alive but produced no client-visible output, e.g. a
    /// tool input fragment or a keep-alive.
    Activity,
    Finished(FinishedTurn),
}

/// A streaming generative-model backend.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str {
        "model"
    }

    /// Open a stream for one model call. Errors returned here happen before
    /// any output; errors yielded by the stream are mid-stream failures.
    async fn stream(&self, request: &ModelRequest) -> Result<BoxStream<'static, Result<ModelDelta>>>;
}
