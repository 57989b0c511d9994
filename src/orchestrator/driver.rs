//! The streaming response driver.

use std::sync::Arc;
use std::time::Instant;

use futures::stream::BoxStream;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::OrchestratorConfig;
use crate::error::{OrchestratorError, Result};
use crate::normalize::{apply_history_window, normalize, InboundMessage};
use crate::prompt::{ScopeContextFetcher, SystemPromptComposer};
use crate::protocol::{frames, ChannelSink, EventEmitter, EventPayload, EventSink};
use crate::provider::{FinishedTurn, ModelClient, ModelDelta, ModelRequest};
use crate::tools::{ToolContext, ToolExecutor, ToolHandlers, ToolRegistry};
use crate::types::{RequestContext, ToolUseRequest, Turn, Usage};

use super::state::{transition, DriverInput, DriverState};
use super::types::{RunResult, RunStatus};

const EVENT_BUFFER: usize = 64;

/// One orchestrated call as received from the client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrchestrationRequest {
    pub messages: Vec<InboundMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_tools: Option<Vec<serde_json::Value>>,
    pub context: RequestContext,
}

impl OrchestrationRequest {
    pub fn new(messages: Vec<InboundMessage>, context: RequestContext) -> Self {
        Self {
            messages,
            custom_tools: None,
            context,
        }
    }

    pub fn with_custom_tools(mut self, tools: Vec<serde_json::Value>) -> Self {
        self.custom_tools = Some(tools);
        self
    }
}

/// Handle for a run started with [`Orchestrator::start`].
///
/// The run only makes progress while `frames` is being read.
pub struct OrchestrationHandle {
    /// Encoded `data: ...\n\n` frames, ending with `end_of_stream`.
    pub frames: BoxStream<'static, String>,
    pub cancel: CancellationToken,
    pub join: JoinHandle<RunResult>,
}

impl OrchestrationHandle {
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Wait for the run to finish, discarding its frames.
    pub async fn wait(self) -> RunResult {
        let Self { mut frames, join, .. } = self;
        let drain = async { while frames.next().await.is_some() {} };
        let (_, joined) = tokio::join!(drain, join);
        joined.unwrap_or_else(|err| RunResult::aborted(format!("run task failed: {err}")))
    }
}

impl std::fmt::Debug for OrchestrationHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrchestrationHandle")
            .field("canceled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}

/// Builder for [`Orchestrator`].
pub struct OrchestratorBuilder {
    config: OrchestratorConfig,
    client: Arc<dyn ModelClient>,
    handlers: ToolHandlers,
    registry: ToolRegistry,
    fetcher: Option<Arc<dyn ScopeContextFetcher>>,
}

impl OrchestratorBuilder {
    pub fn handlers(mut self, handlers: ToolHandlers) -> Self {
        self.handlers = handlers;
        self
    }

    pub fn registry(mut self, registry: ToolRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn fetcher(mut self, fetcher: Arc<dyn ScopeContextFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    pub fn build(self) -> Orchestrator {
        let mut composer = SystemPromptComposer::new(&self.config);
        if let Some(fetcher) = self.fetcher {
            composer = composer.with_fetcher(fetcher);
        }
        let executor = ToolExecutor::new(Arc::new(self.handlers), self.config.tool_timeout())
            .with_long_running(self.config.long_running_tools.clone());
        Orchestrator {
            config: Arc::new(self.config),
            client: self.client,
            registry: self.registry,
            composer,
            executor,
        }
    }
}

/// Drives model calls and tool phases for one conversation turn at a time.
///
/// Cheap to clone; one instance serves any number of concurrent runs.
#[derive(Clone)]
pub struct Orchestrator {
    config: Arc<OrchestratorConfig>,
    client: Arc<dyn ModelClient>,
    registry: ToolRegistry,
    composer: SystemPromptComposer,
    executor: ToolExecutor,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("client", &self.client.name())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

enum TurnError {
    Aborted,
    Unavailable(OrchestratorError),
}

/// Mutable bookkeeping for one run.
#[derive(Default)]
struct RunState {
    turns: Vec<Turn>,
    text: String,
    usage: Usage,
    iterations: usize,
    tool_calls: usize,
    pending: Vec<ToolUseRequest>,
}

impl Orchestrator {
    pub fn builder(config: OrchestratorConfig, client: Arc<dyn ModelClient>) -> OrchestratorBuilder {
        OrchestratorBuilder {
            config,
            client,
            handlers: ToolHandlers::new(),
            registry: ToolRegistry::default(),
            fetcher: None,
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Validate, then run in a spawned task that writes to a channel sink.
    ///
    /// Configuration and request errors are returned here, before any frame
    /// is produced.
    pub fn start(&self, request: OrchestrationRequest) -> Result<OrchestrationHandle> {
        self.check(&request)?;
        let (sink, rx) = ChannelSink::channel(EVENT_BUFFER);
        let cancel = CancellationToken::new();
        let this = self.clone();
        let token = cancel.clone();
        let join = tokio::spawn(async move { this.drive(request, Arc::new(sink), token).await });
        Ok(OrchestrationHandle {
            frames: frames(rx),
            cancel,
            join,
        })
    }

    /// Run to completion against `sink`.
    pub async fn run(&self, request: OrchestrationRequest, sink: Arc<dyn EventSink>) -> Result<RunResult> {
        self.run_with_cancel(request, sink, CancellationToken::new()).await
    }

    pub async fn run_with_cancel(
        &self,
        request: OrchestrationRequest,
        sink: Arc<dyn EventSink>,
        cancel: CancellationToken,
    ) -> Result<RunResult> {
        self.check(&request)?;
        Ok(self.drive(request, sink, cancel).await)
    }

    fn check(&self, request: &OrchestrationRequest) -> Result<()> {
        self.config.validate()?;
        if request.context.conversation_id.trim().is_empty() {
            return Err(OrchestratorError::InvalidArgument(
                "conversation_id must not be empty".into(),
            ));
        }
        if request.context.user_id.trim().is_empty() {
            return Err(OrchestratorError::InvalidArgument(
                "user_id must not be empty".into(),
            ));
        }
        Ok(())
    }

    async fn drive(
        &self,
        request: OrchestrationRequest,
        sink: Arc<dyn EventSink>,
        cancel: CancellationToken,
    ) -> RunResult {
        let started = Instant::now();
        let run_id = Uuid::new_v4();
        let context = request.context.resolved(&self.config);
        let emitter = EventEmitter::new(sink, context.clone());
        let connected = emitter.emit(EventPayload::Connected).await.is_ok();

        let conversation = normalize(&request.messages);
        let mut run = RunState {
            turns: apply_history_window(conversation.turns, self.config.history_window),
            ..Default::default()
        };
        let system = if connected {
            self.composer
                .compose(conversation.system.as_deref(), &context)
                .await
        } else {
            String::new()
        };
        let tools = self
            .registry
            .resolve(request.custom_tools.as_deref(), context.scope_id.is_some());
        let tool_ctx = ToolContext::from_request(&context);

        debug!(
            %run_id,
            conversation_id = %context.conversation_id,
            model = %context.model_id(),
            turns = run.turns.len(),
            tools = tools.len(),
            "run start"
        );

        let max_iterations = self.config.max_iterations;
        let mut state = if connected {
            transition(&DriverState::Idle, &DriverInput::Start, max_iterations)
        } else {
            transition(&DriverState::Idle, &DriverInput::Aborted, max_iterations)
        };

        while !state.is_terminal() {
            let input = match state {
                DriverState::Streaming { iteration } => {
                    let model_request = ModelRequest {
                        model: context.model_id().to_string(),
                        system: Some(system.clone()),
                        turns: run.turns.clone(),
                        tools: tools.clone(),
                        max_tokens: context.max_tokens.unwrap_or(self.config.default_max_tokens),
                        temperature: context.temperature,
                    };
                    debug!(conversation_id = %context.conversation_id, iteration, "model call");
                    run.iterations += 1;
                    match self.stream_turn(&model_request, &emitter, &cancel, &mut run.text).await {
                        Ok(finished) => {
                            run.usage.merge(&finished.usage);
                            run.pending = finished.tool_uses();
                            run.turns.push(Turn::assistant_parts(finished.content));
                            DriverInput::TurnFinished {
                                tool_uses: run.pending.len(),
                            }
                        }
                        Err(TurnError::Aborted) => DriverInput::Aborted,
                        Err(TurnError::Unavailable(err)) => {
                            warn!(
                                conversation_id = %context.conversation_id,
                                iteration,
                                category = ?err.category(),
                                error = %err,
                                "model turn unavailable"
                            );
                            let _ = emitter
                                .emit_from(EventPayload::error(err.to_string(), Some(err.code())), "model")
                                .await;
                            DriverInput::TurnUnavailable {
                                error: err.to_string(),
                            }
                        }
                    }
                }
                DriverState::ToolPending { iteration } => {
                    let pending = std::mem::take(&mut run.pending);
                    debug!(conversation_id = %context.conversation_id, iteration, tools = pending.len(), "tool phase");
                    run.tool_calls += pending.len();
                    let outcome = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => None,
                        results = self.executor.execute(&pending, &tool_ctx, &emitter) => results.ok(),
                    };
                    match outcome {
                        Some(results) => {
                            let count = results.len();
                            if count > 0 {
                                run.turns.push(Turn::tool_results(results));
                            }
                            DriverInput::ToolsResolved { results: count }
                        }
                        None => DriverInput::Aborted,
                    }
                }
                DriverState::Idle | DriverState::Done { .. } | DriverState::Failed { .. } => {
                    DriverInput::Aborted
                }
            };
            state = transition(&state, &input, max_iterations);
        }

        if state.emits_final()
            && emitter
                .emit_from(EventPayload::Final(run.text.clone()), "model")
                .await
                .is_err()
        {
            debug!(conversation_id = %context.conversation_id, "client gone before final");
        }
        if RunStatus::from_state(&state) == RunStatus::Canceled {
            warn!(conversation_id = %context.conversation_id, "run canceled or client disconnected");
        }
        emitter.finish().await;

        let status = RunStatus::from_state(&state);
        let error = match &state {
            DriverState::Failed { error } => Some(error.clone()),
            _ => None,
        };
        info!(
            %run_id,
            conversation_id = %context.conversation_id,
            status = ?status,
            iterations = run.iterations,
            tool_calls = run.tool_calls,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "run finished"
        );

        RunResult {
            run_id,
            status,
            iterations: run.iterations,
            tool_calls: run.tool_calls,
            text: run.text,
            turns: run.turns,
            error,
            usage: run.usage,
            finished_at: chrono::Utc::now(),
        }
    }

    /// Stream one model call, forwarding text deltas, until the finished turn.
    async fn stream_turn(
        &self,
        request: &ModelRequest,
        emitter: &EventEmitter,
        cancel: &CancellationToken,
        text: &mut String,
    ) -> std::result::Result<FinishedTurn, TurnError> {
        let call_timeout = self.config.model_call_timeout();
        let deadline = time::sleep(call_timeout);
        tokio::pin!(deadline);
        let timed_out = || TurnError::Unavailable(OrchestratorError::Timeout(call_timeout.as_millis() as u64));

        let mut stream = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(TurnError::Aborted),
            _ = &mut deadline => return Err(timed_out()),
            opened = self.client.stream(request) => opened.map_err(TurnError::Unavailable)?,
        };

        let idle_timeout = self.config.stream_idle_timeout();
        let mut idle_sleep = idle_timeout.map(|d| Box::pin(time::sleep(d)));

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(TurnError::Aborted),
                _ = &mut deadline => return Err(timed_out()),
                _ = async {
                    match idle_sleep.as_mut() {
                        Some(sleep) => sleep.as_mut().await,
                        None => std::future::pending().await,
                    }
                } => {
                    return Err(TurnError::Unavailable(OrchestratorError::Stream(
                        "model stream idle timeout".into(),
                    )));
                }
                delta = stream.next() => {
                    if let (Some(Ok(_)), Some(sleep), Some(idle)) = (&delta, idle_sleep.as_mut(), idle_timeout) {
                        sleep.as_mut().reset(time::Instant::now() + idle);
                    }
                    match delta {
                        Some(Ok(ModelDelta::Activity)) => {}
                        Some(Ok(ModelDelta::Text(fragment))) => {
                            if fragment.is_empty() {
                                continue;
                            }
                            text.push_str(&fragment);
                            if emitter
                                .emit_from(EventPayload::Text(fragment), "model")
                                .await
                                .is_err()
                            {
                                return Err(TurnError::Aborted);
                            }
                        }
                        Some(Ok(ModelDelta::Finished(turn))) => return Ok(turn),
                        Some(Err(err)) => return Err(TurnError::Unavailable(err)),
                        None => {
                            return Err(TurnError::Unavailable(OrchestratorError::Stream(
                                "model stream ended without a finished turn".into(),
                            )));
                        }
                    }
                }
            }
        }
    }
}
