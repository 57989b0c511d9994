//! Anthropic Messages API client (streaming only).

use std::collections::BTreeMap;

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::OrchestratorConfig;
use crate::error::{OrchestratorError, Result};
use crate::tools::ToolDefinition;
use crate::types::{ContentPart, Role, ToolUseRequest, Turn, TurnContent, Usage};

use super::http::{anthropic_headers, status_to_error, SseLineBuffer};
use super::{FinishedTurn, ModelClient, ModelDelta, ModelRequest, StopReason};

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1";
const API_VERSION: &str = "2023-06-01";

pub struct AnthropicClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl AnthropicClient {
    /// Build a client from configuration. A missing API key is a
    /// configuration error.
    pub fn new(config: &OrchestratorConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| OrchestratorError::Configuration("Missing ANTHROPIC_API_KEY".into()))?;
        let http = reqwest::Client::builder()
            .connect_timeout(std::time::Duration::from_secs(10))
            .pool_max_idle_per_host(10)
            .build()?;
        Ok(Self {
            http,
            api_key,
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
        })
    }
}

impl std::fmt::Debug for AnthropicClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnthropicClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl ModelClient for AnthropicClient {
    fn name(&self) -> &str {
        "anthropic"
    }

    async fn stream(&self, request: &ModelRequest) -> Result<BoxStream<'static, Result<ModelDelta>>> {
        let body = WireRequest::from_request(request);
        let url = format!("{}/messages", self.base_url);

        debug!(model = %request.model, turns = request.turns.len(), tools = request.tools.len(), "Anthropic stream");

        let resp = self
            .http
            .post(&url)
            .headers(anthropic_headers(&self.api_key, API_VERSION))
            .json(&body)
            .send()
            .await?;

        let status = resp.status().as_u16();
        if !resp.status().is_success() {
            let body_text = resp.text().await.unwrap_or_default();
            return Err(status_to_error(status, &body_text));
        }

        let byte_stream = resp.bytes_stream();

        let stream = async_stream::stream! {
            let mut lines = SseLineBuffer::new();
            let mut turn = TurnAccumulator::default();
            futures::pin_mut!(byte_stream);

            while let Some(chunk_result) = byte_stream.next().await {
                let chunk = match chunk_result {
                    Ok(c) => c,
                    Err(e) => {
                        yield Err(OrchestratorError::Network(e));
                        return;
                    }
                };

                for data in lines.push(&chunk) {
                    let frame = match serde_json::from_str::<StreamFrame>(&data) {
                        Ok(frame) => frame,
                        Err(err) => {
                            debug!(error = %err, "skipping unparseable stream frame");
                            continue;
                        }
                    };
                    match turn.apply(frame) {
                        Ok(Some(delta)) => {
                            let finished = matches!(delta, ModelDelta::Finished(_));
                            yield Ok(delta);
                            if finished {
                                return;
                            }
                        }
                        Ok(None) => {}
                        Err(err) => {
                            yield Err(err);
                            return;
                        }
                    }
                }
            }

            yield Err(OrchestratorError::Stream(
                "model stream ended before message_stop".into(),
            ));
        };

        Ok(Box::pin(stream))
    }
}

// Request body

#[derive(Debug, Serialize)]
struct WireRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    messages: Vec<WireMessage<'a>>,
    #[serde(skip_serializing_if = "no_tools")]
    tools: &'a [ToolDefinition],
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    stream: bool,
}

fn no_tools(tools: &&[ToolDefinition]) -> bool {
    tools.is_empty()
}

impl<'a> WireRequest<'a> {
    fn from_request(request: &'a ModelRequest) -> Self {
        Self {
            model: &request.model,
            max_tokens: request.max_tokens,
            system: request.system.as_deref().filter(|s| !s.is_empty()),
            messages: request.turns.iter().filter_map(WireMessage::from_turn).collect(),
            tools: &request.tools,
            temperature: request.temperature,
            stream: true,
        }
    }
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: WireContent<'a>,
}

impl<'a> WireMessage<'a> {
    /// System turns never reach here; the system prompt travels separately.
    fn from_turn(turn: &'a Turn) -> Option<Self> {
        let role = match turn.role {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => return None,
        };
        let content = match &turn.content {
            TurnContent::Text(text) => WireContent::Text(text),
            TurnContent::Parts(parts) => WireContent::Blocks(parts.iter().map(WireBlock::from_part).collect()),
        };
        Some(Self { role, content })
    }
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum WireContent<'a> {
    Text(&'a str),
    Blocks(Vec<WireBlock<'a>>),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WireBlock<'a> {
    Text {
        text: &'a str,
    },
    ToolUse {
        id: &'a str,
        name: &'a str,
        input: &'a serde_json::Value,
    },
    ToolResult {
        tool_use_id: &'a str,
        content: &'a str,
        #[serde(skip_serializing_if = "std::ops::Not::not")]
        is_error: bool,
    },
}

impl<'a> WireBlock<'a> {
    fn from_part(part: &'a ContentPart) -> Self {
        match part {
            ContentPart::Text { text } => Self::Text { text },
            ContentPart::ToolUse(request) => Self::ToolUse {
                id: &request.id,
                name: &request.name,
                input: &request.input,
            },
            ContentPart::ToolResult(result) => Self::ToolResult {
                tool_use_id: &result.tool_use_id,
                content: &result.content,
                is_error: result.is_error,
            },
        }
    }
}

// Stream frames

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum StreamFrame {
    MessageStart {
        message: MessageStartBody,
    },
    ContentBlockStart {
        index: usize,
        content_block: BlockStart,
    },
    ContentBlockDelta {
        index: usize,
        delta: BlockDelta,
    },
    ContentBlockStop,
    MessageDelta {
        delta: MessageDeltaBody,
        #[serde(default)]
        usage: Option<WireUsage>,
    },
    MessageStop,
    Ping,
    Error {
        error: WireError,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct MessageStartBody {
    #[serde(default)]
    usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum BlockStart {
    Text {
        #[serde(default)]
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum BlockDelta {
    TextDelta { text: String },
    InputJsonDelta { partial_json: String },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct MessageDeltaBody {
    #[serde(default)]
    stop_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct WireUsage {
    #[serde(default)]
    input_tokens: Option<u32>,
    #[serde(default)]
    output_tokens: Option<u32>,
    #[serde(default)]
    cache_read_input_tokens: Option<u32>,
    #[serde(default)]
    cache_creation_input_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct WireError {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    message: String,
}

#[derive(Debug)]
enum PartialBlock {
    Text(String),
    ToolUse { id: String, name: String, json: String },
}

/// Folds stream frames into text deltas and one finished turn.
#[derive(Debug, Default)]
struct TurnAccumulator {
    blocks: BTreeMap<usize, PartialBlock>,
    stop_reason: Option<StopReason>,
    usage: Usage,
}

impl TurnAccumulator {
    fn apply(&mut self, frame: StreamFrame) -> Result<Option<ModelDelta>> {
        match frame {
            StreamFrame::MessageStart { message } => {
                if let Some(usage) = message.usage {
                    self.record_usage(&usage);
                }
            }
            StreamFrame::ContentBlockStart { index, content_block } => match content_block {
                BlockStart::Text { text } => {
                    self.blocks.insert(index, PartialBlock::Text(text.clone()));
                    if !text.is_empty() {
                        return Ok(Some(ModelDelta::Text(text)));
                    }
                }
                BlockStart::ToolUse { id, name } => {
                    self.blocks.insert(
                        index,
                        PartialBlock::ToolUse {
                            id,
                            name,
                            json: String::new(),
                        },
                    );
                    return Ok(Some(ModelDelta::Activity));
                }
                BlockStart::Other => {}
            },
            StreamFrame::ContentBlockDelta { index, delta } => match delta {
                BlockDelta::TextDelta { text } => {
                    match self.blocks.entry(index).or_insert_with(|| PartialBlock::Text(String::new())) {
                        PartialBlock::Text(buffer) => buffer.push_str(&text),
                        PartialBlock::ToolUse { .. } => {
                            return Err(OrchestratorError::Stream(format!(
                                "text delta for tool_use block {index}"
                            )))
                        }
                    }
                    return Ok(Some(ModelDelta::Text(text)));
                }
                BlockDelta::InputJsonDelta { partial_json } => {
                    if let Some(PartialBlock::ToolUse { json, .. }) = self.blocks.get_mut(&index) {
                        json.push_str(&partial_json);
                    }
                    return Ok(Some(ModelDelta::Activity));
                }
                BlockDelta::Other => {}
            },
            StreamFrame::ContentBlockStop => {}
            StreamFrame::Ping => return Ok(Some(ModelDelta::Activity)),
            StreamFrame::Other => {}
            StreamFrame::MessageDelta { delta, usage } => {
                if let Some(reason) = delta.stop_reason {
                    self.stop_reason = Some(StopReason::from_wire(&reason));
                }
                if let Some(usage) = usage {
                    self.record_usage(&usage);
                }
            }
            StreamFrame::MessageStop => {
                return Ok(Some(ModelDelta::Finished(self.finish())));
            }
            StreamFrame::Error { error } => {
                return Err(OrchestratorError::Stream(format!(
                    "{}: {}",
                    error.kind, error.message
                )));
            }
        }
        Ok(None)
    }

    fn record_usage(&mut self, usage: &WireUsage) {
        if let Some(v) = usage.input_tokens {
            self.usage.input_tokens = v;
        }
        if let Some(v) = usage.output_tokens {
            self.usage.output_tokens = v;
        }
        if usage.cache_read_input_tokens.is_some() {
            self.usage.cache_read_tokens = usage.cache_read_input_tokens;
        }
        if usage.cache_creation_input_tokens.is_some() {
            self.usage.cache_creation_tokens = usage.cache_creation_input_tokens;
        }
    }

    fn finish(&mut self) -> FinishedTurn {
        let content = std::mem::take(&mut self.blocks)
            .into_values()
            .filter_map(|block| match block {
                PartialBlock::Text(text) if text.trim().is_empty() => None,
                PartialBlock::Text(text) => Some(ContentPart::Text { text }),
                PartialBlock::ToolUse { id, name, json } => {
                    let input = tool_input(&name, json);
                    Some(ContentPart::ToolUse(ToolUseRequest { id, name, input }))
                }
            })
            .collect();
        FinishedTurn {
            content,
            stop_reason: self.stop_reason.take(),
            usage: std::mem::take(&mut self.usage),
        }
    }
}

/// Tool input replayed to the API must be an object; anything else, such as
/// JSON cut off by `max_tokens`, is kept under `_raw`.
fn tool_input(name: &str, json: String) -> serde_json::Value {
    if json.trim().is_empty() {
        return serde_json::json!({});
    }
    match serde_json::from_str::<serde_json::Value>(&json) {
        Ok(value @ serde_json::Value::Object(_)) => value,
        _ => {
            debug!(tool = name, "tool input is not a JSON object");
            serde_json::json!({ "_raw": json })
        }
    }
}
