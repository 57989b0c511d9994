//! Stream event envelope and typed payloads.

use chrono::{DateTime, Utc};
use serde::Serialize;
use strum::{Display, EnumString};

use crate::error::ErrorCode;
use crate::types::{RequestContext, ToolResult, ToolUseRequest};

/// Event `type` discriminator on the wire.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EventType {
    Connected,
    Text,
    ToolCall,
    ToolResult,
    UiComponent,
    Final,
    Error,
    EndOfStream,
}

/// `metadata.status` value.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EventStatus {
    Connected,
    Streaming,
    InProgress,
    Completed,
    Failed,
    Done,
}

/// `tool_call` data.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ToolCallData {
    pub id: String,
    pub name: String,
    pub input: serde_json::Value,
}

/// `tool_result` data.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ToolResultData {
    pub id: String,
    pub name: String,
    pub content: String,
    pub is_error: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_awaiting_user: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

/// `error` data.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ErrorData {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<ErrorCode>,
}

/// Event payloads; serialized as `{"type": .., "data": ..}`.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum EventPayload {
    Connected,
    Text(String),
    ToolCall(ToolCallData),
    ToolResult(ToolResultData),
    UiComponent(serde_json::Value),
    Final(String),
    Error(ErrorData),
    EndOfStream,
}

impl EventPayload {
    pub fn event_type(&self) -> EventType {
        match self {
            Self::Connected => EventType::Connected,
            Self::Text(_) => EventType::Text,
            Self::ToolCall(_) => EventType::ToolCall,
            Self::ToolResult(_) => EventType::ToolResult,
            Self::UiComponent(_) => EventType::UiComponent,
            Self::Final(_) => EventType::Final,
            Self::Error(_) => EventType::Error,
            Self::EndOfStream => EventType::EndOfStream,
        }
    }

    pub fn tool_call(request: &ToolUseRequest) -> Self {
        Self::ToolCall(ToolCallData {
            id: request.id.clone(),
            name: request.name.clone(),
            input: request.input.clone(),
        })
    }

    pub fn tool_result(name: &str, result: &ToolResult) -> Self {
        Self::ToolResult(ToolResultData {
            id: result.tool_use_id.clone(),
            name: name.to_string(),
            content: result.content.clone(),
            is_error: result.is_error,
            is_awaiting_user: result.is_awaiting_user,
            metadata: result.metadata.clone(),
        })
    }

    pub fn error(message: impl Into<String>, code: Option<ErrorCode>) -> Self {
        Self::Error(ErrorData {
            message: message.into(),
            code,
        })
    }

    /// Status implied by the payload when the caller does not override it.
    pub fn default_status(&self) -> EventStatus {
        match self {
            Self::Connected => EventStatus::Connected,
            Self::Text(_) => EventStatus::Streaming,
            Self::ToolCall(_) | Self::UiComponent(_) => EventStatus::InProgress,
            Self::ToolResult(data) if data.is_error => EventStatus::Failed,
            Self::ToolResult(_) | Self::Final(_) => EventStatus::Completed,
            Self::Error(_) => EventStatus::Failed,
            Self::EndOfStream => EventStatus::Done,
        }
    }
}

/// Per-event metadata.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EventMetadata {
    pub status: EventStatus,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl EventMetadata {
    pub fn new(status: EventStatus) -> Self {
        Self {
            status,
            timestamp: Utc::now(),
            model: None,
            conversation_id: None,
            user_id: None,
            source: None,
        }
    }

    pub fn with_context(mut self, ctx: &RequestContext) -> Self {
        self.model = ctx.model.clone();
        self.conversation_id = Some(ctx.conversation_id.clone());
        self.user_id = Some(ctx.user_id.clone());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

/// One emission: `{type, data, metadata}`.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct StreamEvent {
    #[serde(flatten)]
    pub payload: EventPayload,
    pub metadata: EventMetadata,
}

impl StreamEvent {
    pub fn new(payload: EventPayload, metadata: EventMetadata) -> Self {
        Self { payload, metadata }
    }

    pub fn event_type(&self) -> EventType {
        self.payload.event_type()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn context() -> RequestContext {
        RequestContext::builder()
            .user_id("u1")
            .conversation_id("c1")
            .model("claude-test")
            .build()
    }

    #[test]
    fn text_event_serializes_as_envelope() {
        let event = StreamEvent::new(
            EventPayload::Text("Hel".into()),
            EventMetadata::new(EventStatus::Streaming)
                .with_context(&context())
                .with_source("model"),
        );
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "text");
        assert_eq!(value["data"], "Hel");
        assert_eq!(value["metadata"]["status"], "streaming");
        assert_eq!(value["metadata"]["conversationId"], "c1");
        assert_eq!(value["metadata"]["userId"], "u1");
        assert_eq!(value["metadata"]["model"], "claude-test");
        assert!(value["metadata"]["timestamp"].is_string());
    }

    #[test]
    fn unit_events_have_no_data() {
        let event = StreamEvent::new(EventPayload::EndOfStream, EventMetadata::new(EventStatus::Done));
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "end_of_stream");
        assert!(value.get("data").is_none());
        assert!(value["metadata"].get("source").is_none());
    }

    #[test]
    fn tool_result_data_uses_camel_case() {
        let result = ToolResult::error("toolu_1", "Tool 'read_file' not found");
        let payload = EventPayload::tool_result("read_file", &result);
        assert_eq!(payload.default_status(), EventStatus::Failed);
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["type"], "tool_result");
        assert_eq!(value["data"]["id"], "toolu_1");
        assert_eq!(value["data"]["name"], "read_file");
        assert_eq!(value["data"]["isError"], true);
        assert!(value["data"].get("isAwaitingUser").is_none());
    }

    #[test]
    fn error_data_carries_code() {
        let payload = EventPayload::error("stream ended", Some(ErrorCode::StreamError));
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["data"], json!({"message": "stream ended", "code": "stream_error"}));
    }

    #[test]
    fn event_type_names_match_wire() {
        assert_eq!(EventType::EndOfStream.to_string(), "end_of_stream");
        assert_eq!(EventType::UiComponent.to_string(), "ui_component");
        assert_eq!(
            EventPayload::tool_call(&ToolUseRequest {
                id: "1".into(),
                name: "x".into(),
                input: json!({}),
            })
            .event_type(),
            EventType::ToolCall
        );
    }
}
