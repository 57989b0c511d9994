//! System prompt composition.
//!
//! The final system string is built from up to five sections in a fixed
//! order: base instructions, the caller's system text, scope context, the
//! current date and time, and tool guidance. Empty sections are omitted and
//! the rest are joined with a blank line.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::OrchestratorConfig;
use crate::error::Result;
use crate::tools::READ_FILE_TOOL;
use crate::types::RequestContext;
use crate::util::with_timeout;

/// Metadata for the project or document scope a request runs in.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ScopeContext {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub documents: Vec<ScopeDocument>,
}

/// A document available to retrieval tools.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScopeDocument {
    pub id: String,
    pub name: String,
    /// Processing finished and the document can be read.
    #[serde(default)]
    pub ready: bool,
}

/// Source of scope context. Implemented by the host application's data store.
#[async_trait]
pub trait ScopeContextFetcher: Send + Sync {
    /// `Ok(None)` means the scope exists nowhere; the section is omitted.
    async fn get(&self, scope_id: &str) -> Result<Option<ScopeContext>>;
}

/// Builds the system string for one orchestrated call.
#[derive(Clone)]
pub struct SystemPromptComposer {
    base_instructions: String,
    tool_guidance: String,
    fetcher: Option<Arc<dyn ScopeContextFetcher>>,
    fetch_timeout: Duration,
}

impl SystemPromptComposer {
    pub fn new(config: &OrchestratorConfig) -> Self {
        Self {
            base_instructions: config.base_instructions.clone(),
            tool_guidance: config.tool_guidance.clone(),
            fetcher: None,
            fetch_timeout: config.scope_fetch_timeout(),
        }
    }

    pub fn with_fetcher(mut self, fetcher: Arc<dyn ScopeContextFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    pub async fn compose(&self, caller_system: Option<&str>, ctx: &RequestContext) -> String {
        self.compose_at(caller_system, ctx, Utc::now()).await
    }

    /// Compose with a fixed clock.
    pub async fn compose_at(
        &self,
        caller_system: Option<&str>,
        ctx: &RequestContext,
        now: DateTime<Utc>,
    ) -> String {
        let scope = match &ctx.scope_id {
            Some(scope_id) => self.fetch_scope(scope_id, ctx).await,
            None => None,
        };

        let sections = [
            Some(self.base_instructions.clone()),
            caller_system.map(str::to_string),
            scope.as_ref().map(render_scope),
            Some(render_now(now)),
            Some(self.tool_guidance.clone()),
        ];

        sections
            .into_iter()
            .flatten()
            .map(|section| section.trim().to_string())
            .filter(|section| !section.is_empty())
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    async fn fetch_scope(&self, scope_id: &str, ctx: &RequestContext) -> Option<ScopeContext> {
        let fetcher = self.fetcher.as_ref()?;
        match with_timeout(self.fetch_timeout, fetcher.get(scope_id)).await {
            Ok(scope) => scope,
            Err(err) => {
                warn!(
                    conversation_id = %ctx.conversation_id,
                    scope_id,
                    error = %err,
                    "scope context unavailable, omitting from system prompt"
                );
                None
            }
        }
    }
}

impl std::fmt::Debug for SystemPromptComposer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SystemPromptComposer")
            .field("has_fetcher", &self.fetcher.is_some())
            .field("fetch_timeout", &self.fetch_timeout)
            .finish_non_exhaustive()
    }
}

fn render_scope(scope: &ScopeContext) -> String {
    let mut out = format!("You are working in the project \"{}\".", scope.title);
    if let Some(description) = scope.description.as_deref().filter(|d| !d.trim().is_empty()) {
        out.push_str(&format!("\nProject description: {}", description.trim()));
    }
    if scope.documents.is_empty() {
        out.push_str("\nNo documents are attached to this project.");
        return out;
    }
    out.push_str(&format!(
        "\nAvailable documents (pass the id as document_id when calling {READ_FILE_TOOL}):"
    ));
    for doc in &scope.documents {
        let readiness = if doc.ready { "ready" } else { "still processing" };
        out.push_str(&format!("\n- {} (id: {}, {readiness})", doc.name, doc.id));
    }
    out
}

fn render_now(now: DateTime<Utc>) -> String {
    format!(
        "The current date and time is {} UTC.",
        now.format("%A, %B %-d, %Y %H:%M")
    )
}
