//! Tool executor: concurrent dispatch of one turn's tool-use requests.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::stream::{FuturesUnordered, StreamExt};
use serde_json::json;

use crate::protocol::{EventEmitter, EventPayload, EventStatus, SinkClosed};
use crate::types::{ToolResult, ToolUseRequest};
use crate::util::with_timeout;

use super::handler::{ToolContext, ToolHandlers, ToolOutput};

/// Dispatches tool-use requests to their handlers.
#[derive(Debug, Clone)]
pub struct ToolExecutor {
    handlers: Arc<ToolHandlers>,
    timeout: Duration,
    long_running: Vec<String>,
}

impl ToolExecutor {
    pub fn new(handlers: Arc<ToolHandlers>, timeout: Duration) -> Self {
        Self {
            handlers,
            timeout,
            long_running: Vec::new(),
        }
    }

    /// Tools that get `ui_component` progress events before and after running.
    pub fn with_long_running(mut self, names: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.long_running = names.into_iter().map(Into::into).collect();
        self
    }

    fn is_long_running(&self, name: &str) -> bool {
        self.long_running.iter().any(|candidate| candidate == name)
    }

    /// Run every request concurrently and return one result per request, in
    /// request order.
    ///
    /// A `tool_result` event is emitted as each request resolves. Handler
    /// failures become error results. Each handler runs in its own task, so it
    /// finishes even if the caller stops waiting. Returns `SinkClosed` when the
    /// client is gone; results still in flight are then discarded.
    pub async fn execute(
        &self,
        requests: &[ToolUseRequest],
        ctx: &ToolContext,
        emitter: &EventEmitter,
    ) -> Result<Vec<ToolResult>, SinkClosed> {
        for request in requests {
            emitter.emit_from(EventPayload::tool_call(request), "tool").await?;
            if self.is_long_running(&request.name) {
                emitter
                    .emit_with(
                        progress_component(request, "started"),
                        EventStatus::InProgress,
                        Some("tool"),
                    )
                    .await?;
            }
        }

        let mut pending: FuturesUnordered<_> = requests
            .iter()
            .enumerate()
            .map(|(index, request)| {
                let task = tokio::spawn(run_handler(
                    self.handlers.clone(),
                    request.clone(),
                    ctx.for_call(&request.id),
                    self.timeout,
                ));
                async move { (index, task.await) }
            })
            .collect();

        let mut slots: Vec<Option<ToolResult>> = vec![None; requests.len()];
        while let Some((index, joined)) = pending.next().await {
            let request = &requests[index];
            let result = match joined {
                Ok(result) => result,
                Err(err) => {
                    tracing::warn!(tool = %request.name, tool_use_id = %request.id, error = %err, "tool task did not complete");
                    ToolResult::error(
                        &request.id,
                        format!("Tool '{}' did not complete: {err}", request.name),
                    )
                }
            };
            if self.is_long_running(&request.name) {
                let (stage, status) = if result.is_error {
                    ("failed", EventStatus::Failed)
                } else {
                    ("completed", EventStatus::Completed)
                };
                emitter
                    .emit_with(progress_component(request, stage), status, Some("tool"))
                    .await?;
            }
            emitter
                .emit_from(EventPayload::tool_result(&request.name, &result), "tool")
                .await?;
            slots[index] = Some(result);
        }

        Ok(slots.into_iter().flatten().collect())
    }
}

async fn run_handler(
    handlers: Arc<ToolHandlers>,
    request: ToolUseRequest,
    ctx: ToolContext,
    timeout: Duration,
) -> ToolResult {
    let Some(handler) = handlers.lookup(&request.name) else {
        tracing::warn!(tool = %request.name, tool_use_id = %request.id, "no handler registered");
        return ToolResult::error(&request.id, format!("Tool '{}' not found", request.name));
    };

    let started = Instant::now();
    let outcome = with_timeout(timeout, handler.call(request.input.clone(), ctx)).await;
    let elapsed_ms = started.elapsed().as_millis() as u64;

    match outcome {
        Ok(output) => {
            tracing::debug!(tool = %request.name, tool_use_id = %request.id, elapsed_ms, "tool completed");
            into_result(&request.id, output)
        }
        Err(err) => {
            tracing::warn!(tool = %request.name, tool_use_id = %request.id, elapsed_ms, error = %err, "tool failed");
            ToolResult::error(
                &request.id,
                format!("Tool '{}' failed: {err}", request.name),
            )
        }
    }
}

fn into_result(tool_use_id: &str, output: ToolOutput) -> ToolResult {
    ToolResult {
        tool_use_id: tool_use_id.to_string(),
        content: output.content_string(),
        is_error: false,
        is_awaiting_user: output.is_awaiting_user.then_some(true),
        metadata: output.metadata,
    }
}

fn progress_component(request: &ToolUseRequest, stage: &str) -> EventPayload {
    EventPayload::UiComponent(json!({
        "component": "tool_progress",
        "toolUseId": request.id,
        "name": request.name,
        "stage": stage,
        "input": request.input,
    }))
}
