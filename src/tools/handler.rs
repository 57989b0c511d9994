//! Tool handler trait, closure-based handlers, and the lookup table.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::OrchestratorError;
use crate::types::RequestContext;

/// Context bag passed to every handler invocation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolContext {
    pub conversation_id: String,
    pub user_id: String,
    pub scope_id: Option<String>,
    pub tool_use_id: String,
}

impl ToolContext {
    pub fn from_request(ctx: &RequestContext) -> Self {
        Self {
            conversation_id: ctx.conversation_id.clone(),
            user_id: ctx.user_id.clone(),
            scope_id: ctx.scope_id.clone(),
            tool_use_id: String::new(),
        }
    }

    pub(crate) fn for_call(&self, tool_use_id: &str) -> Self {
        Self {
            tool_use_id: tool_use_id.to_string(),
            ..self.clone()
        }
    }
}

/// What a handler produced.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolOutput {
    pub content: serde_json::Value,
    pub is_awaiting_user: bool,
    pub metadata: Option<serde_json::Value>,
}

impl ToolOutput {
    pub fn json(content: serde_json::Value) -> Self {
        Self {
            content,
            is_awaiting_user: false,
            metadata: None,
        }
    }

    pub fn text(content: impl Into<String>) -> Self {
        Self::json(serde_json::Value::String(content.into()))
    }

    /// Mark the tool as waiting on a user action.
    pub fn awaiting_user(mut self) -> Self {
        self.is_awaiting_user = true;
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// String payload fed back to the model. Strings pass through, anything
    /// else is JSON-encoded.
    pub fn content_string(&self) -> String {
        match &self.content {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

/// Implemented by every tool the model may call.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn call(
        &self,
        input: serde_json::Value,
        ctx: ToolContext,
    ) -> Result<ToolOutput, OrchestratorError>;
}

type BoxedHandlerFn = dyn Fn(
        serde_json::Value,
        ToolContext,
    ) -> Pin<Box<dyn Future<Output = Result<ToolOutput, OrchestratorError>> + Send>>
    + Send
    + Sync;

/// Closure-based handler for quick registration.
pub struct FnToolHandler {
    handler: Arc<BoxedHandlerFn>,
}

impl FnToolHandler {
    pub fn new<F, Fut>(handler: F) -> Self
    where
        F: Fn(serde_json::Value, ToolContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<ToolOutput, OrchestratorError>> + Send + 'static,
    {
        Self {
            handler: Arc::new(move |input, ctx| Box::pin(handler(input, ctx))),
        }
    }
}

#[async_trait]
impl ToolHandler for FnToolHandler {
    async fn call(
        &self,
        input: serde_json::Value,
        ctx: ToolContext,
    ) -> Result<ToolOutput, OrchestratorError> {
        (self.handler)(input, ctx).await
    }
}

impl std::fmt::Debug for FnToolHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnToolHandler").finish_non_exhaustive()
    }
}

/// Handler lookup table keyed by tool name.
#[derive(Clone, Default)]
pub struct ToolHandlers {
    handlers: HashMap<String, Arc<dyn ToolHandler>>,
}

impl ToolHandlers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, handler: Arc<dyn ToolHandler>) -> &mut Self {
        self.handlers.insert(name.into(), handler);
        self
    }

    /// Register a closure as the handler for `name`.
    pub fn register_fn<F, Fut>(&mut self, name: impl Into<String>, handler: F) -> &mut Self
    where
        F: Fn(serde_json::Value, ToolContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<ToolOutput, OrchestratorError>> + Send + 'static,
    {
        self.register(name, Arc::new(FnToolHandler::new(handler)))
    }

    pub fn lookup(&self, name: &str) -> Option<Arc<dyn ToolHandler>> {
        self.handlers.get(name).cloned()
    }
}

impl std::fmt::Debug for ToolHandlers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<_> = self.handlers.keys().collect();
        names.sort();
        f.debug_struct("ToolHandlers").field("names", &names).finish()
    }
}
