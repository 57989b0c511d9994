//! Per-request identity and decoding parameters.

use bon::Builder;
use serde::{Deserialize, Serialize};

use crate::config::OrchestratorConfig;

/// Caller identity and generation parameters for one orchestrated call.
///
/// Immutable for the lifetime of the call; its identifiers are copied into
/// the metadata of every emitted event.
#[derive(Debug, Clone, Builder, Serialize, Deserialize, PartialEq)]
pub struct RequestContext {
    #[builder(into)]
    pub user_id: String,
    #[builder(into)]
    pub conversation_id: String,
    /// Project or document scope used to fetch prompt context.
    #[builder(into)]
    pub scope_id: Option<String>,
    #[builder(into)]
    pub model: Option<String>,
    pub temperature: Option<f64>,
    pub max_tokens: Option<u32>,
}

impl RequestContext {
    /// Fill unset model parameters from the configuration.
    pub fn resolved(&self, config: &OrchestratorConfig) -> Self {
        let model = self
            .model
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .unwrap_or(&config.default_model)
            .to_string();
        Self {
            model: Some(model),
            temperature: self.temperature.or(config.default_temperature),
            max_tokens: Some(self.max_tokens.unwrap_or(config.default_max_tokens)),
            ..self.clone()
        }
    }

    pub fn model_id(&self) -> &str {
        self.model.as_deref().unwrap_or_default()
    }
}
