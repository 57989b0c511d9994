//! Shared test helpers: a scripted model client and a collecting sink.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};

use parley::error::{OrchestratorError, Result};
use parley::orchestrator::{OrchestrationRequest, Orchestrator};
use parley::config::OrchestratorConfig;
use parley::normalize::InboundMessage;
use parley::protocol::{EventPayload, EventSink, EventType, SinkClosed, StreamEvent};
use parley::provider::{FinishedTurn, ModelClient, ModelDelta, ModelRequest, StopReason};
use parley::tools::ToolHandlers;
use parley::types::{ContentPart, RequestContext, ToolUseRequest, Usage};

/// One step of a scripted model stream.
#[derive(Debug, Clone)]
pub enum Step {
    Text(String),
    /// Non-text progress, such as a tool input fragment.
    Activity,
    Finish(FinishedTurn),
    /// Yield a stream error.
    Fail(String),
    /// Sleep before the next step.
    Pause(Duration),
    /// Never yield again.
    Hang,
}

pub type Script = Vec<Step>;

/// A model client that plays back queued scripts, one per call.
#[derive(Default)]
pub struct ScriptedModelClient {
    scripts: Mutex<VecDeque<Script>>,
    fallback: Option<Script>,
    requests: Mutex<Vec<ModelRequest>>,
}

impl ScriptedModelClient {
    pub fn new(scripts: Vec<Script>) -> Self {
        Self {
            scripts: Mutex::new(scripts.into()),
            ..Default::default()
        }
    }

    /// Plays `script` for every call.
    pub fn repeating(script: Script) -> Self {
        Self {
            fallback: Some(script),
            ..Default::default()
        }
    }

    pub fn requests(&self) -> Vec<ModelRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl ModelClient for ScriptedModelClient {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn stream(&self, request: &ModelRequest) -> Result<BoxStream<'static, Result<ModelDelta>>> {
        self.requests.lock().unwrap().push(request.clone());
        let script = self
            .scripts
            .lock()
            .unwrap()
            .pop_front()
            .or_else(|| self.fallback.clone())
            .ok_or_else(|| OrchestratorError::Stream("no scripted response left".into()))?;

        let stream = async_stream::stream! {
            for step in script {
                match step {
                    Step::Text(text) => {
                        yield Ok(ModelDelta::Text(text));
                    }
                    Step::Activity => {
                        yield Ok(ModelDelta::Activity);
                    }
                    Step::Finish(turn) => {
                        yield Ok(ModelDelta::Finished(turn));
                    }
                    Step::Fail(message) => {
                        yield Err(OrchestratorError::Stream(message));
                    }
                    Step::Pause(duration) => tokio::time::sleep(duration).await,
                    Step::Hang => futures::future::pending::<()>().await,
                }
            }
        };
        Ok(stream.boxed())
    }
}

fn usage() -> Usage {
    Usage {
        input_tokens: 10,
        output_tokens: 5,
        ..Default::default()
    }
}

/// Stream `fragments`, then finish with their concatenation.
pub fn answer(fragments: &[&str]) -> Script {
    let mut script: Script = fragments.iter().map(|f| Step::Text(f.to_string())).collect();
    script.push(Step::Finish(FinishedTurn {
        content: vec![ContentPart::Text {
            text: fragments.concat(),
        }],
        stop_reason: Some(StopReason::EndTurn),
        usage: usage(),
    }));
    script
}

/// Optional preamble text, then a finished turn requesting `calls`.
pub fn tool_calls(preamble: Option<&str>, calls: &[(&str, &str, serde_json::Value)]) -> Script {
    let mut script = Vec::new();
    let mut content = Vec::new();
    if let Some(text) = preamble {
        script.push(Step::Text(text.to_string()));
        content.push(ContentPart::Text {
            text: text.to_string(),
        });
    }
    content.extend(calls.iter().map(|(id, name, input)| {
        ContentPart::ToolUse(ToolUseRequest {
            id: id.to_string(),
            name: name.to_string(),
            input: input.clone(),
        })
    }));
    script.push(Step::Finish(FinishedTurn {
        content,
        stop_reason: Some(StopReason::ToolUse),
        usage: usage(),
    }));
    script
}

/// Sink that records events; optionally refuses everything after `limit`.
#[derive(Default)]
pub struct CollectingSink {
    events: Mutex<Vec<StreamEvent>>,
    limit: Option<usize>,
    closed: AtomicBool,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept `limit` events, then behave like a disconnected client.
    pub fn disconnect_after(limit: usize) -> Self {
        Self {
            limit: Some(limit),
            ..Default::default()
        }
    }

    pub fn events(&self) -> Vec<StreamEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn types(&self) -> Vec<EventType> {
        self.events().iter().map(StreamEvent::event_type).collect()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn final_text(&self) -> Option<String> {
        self.events().into_iter().find_map(|event| match event.payload {
            EventPayload::Final(text) => Some(text),
            _ => None,
        })
    }
}

#[async_trait]
impl EventSink for CollectingSink {
    async fn send(&self, event: StreamEvent) -> std::result::Result<(), SinkClosed> {
        if self.is_closed() {
            return Err(SinkClosed);
        }
        let mut events = self.events.lock().unwrap();
        if self.limit.is_some_and(|limit| events.len() >= limit) {
            return Err(SinkClosed);
        }
        events.push(event);
        Ok(())
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

pub fn context() -> RequestContext {
    RequestContext::builder()
        .user_id("user-1")
        .conversation_id("conv-1")
        .build()
}

pub fn request(messages: Vec<InboundMessage>) -> OrchestrationRequest {
    OrchestrationRequest::new(messages, context())
}

pub fn orchestrator(
    config: OrchestratorConfig,
    client: Arc<ScriptedModelClient>,
    handlers: ToolHandlers,
) -> Orchestrator {
    Orchestrator::builder(config, client).handlers(handlers).build()
}
