//! Configuration (layered: defaults < TOML file < environment < code).

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{OrchestratorError, Result};

const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";
const DEFAULT_MAX_TOKENS: u32 = 1024;
const DEFAULT_MAX_ITERATIONS: usize = 4;
const DEFAULT_HISTORY_WINDOW: usize = 20;
const DEFAULT_MODEL_CALL_TIMEOUT_MS: u64 = 120_000;
const DEFAULT_STREAM_IDLE_TIMEOUT_MS: u64 = 60_000;
const DEFAULT_TOOL_TIMEOUT_MS: u64 = 30_000;
const DEFAULT_SCOPE_FETCH_TIMEOUT_MS: u64 = 5_000;

/// Default behavioral rules placed at the top of every system prompt.
pub const DEFAULT_BASE_INSTRUCTIONS: &str = "You are a thoughtful assistant embedded in a live chat. \
Keep responses concise since this is a text conversation. Be warm but direct. \
Ask good questions when the request is ambiguous. Don't be preachy.";

/// Default guidance on when and how to call tools.
pub const DEFAULT_TOOL_GUIDANCE: &str = "Use the available tools when the answer depends on \
document contents you have not seen yet. Call independent tools in the same turn so they can \
run together. If a tool returns an error, explain the problem briefly or try a different \
approach instead of repeating the same call.";

/// Orchestrator configuration.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub default_model: String,
    pub default_max_tokens: u32,
    pub default_temperature: Option<f64>,
    pub max_iterations: usize,
    /// Most recent turns kept from the caller's history; `0` keeps everything.
    pub history_window: usize,
    pub model_call_timeout_ms: u64,
    pub stream_idle_timeout_ms: u64,
    pub tool_timeout_ms: u64,
    pub scope_fetch_timeout_ms: u64,
    pub base_instructions: String,
    pub tool_guidance: String,
    /// Tools that get `ui_component` progress events around execution.
    pub long_running_tools: Vec<String>,
}

impl std::fmt::Debug for OrchestratorConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrchestratorConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| ".."))
            .field("base_url", &self.base_url)
            .field("default_model", &self.default_model)
            .field("default_max_tokens", &self.default_max_tokens)
            .field("max_iterations", &self.max_iterations)
            .field("history_window", &self.history_window)
            .field("model_call_timeout_ms", &self.model_call_timeout_ms)
            .field("tool_timeout_ms", &self.tool_timeout_ms)
            .field("long_running_tools", &self.long_running_tools)
            .finish()
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: None,
            default_model: DEFAULT_MODEL.to_string(),
            default_max_tokens: DEFAULT_MAX_TOKENS,
            default_temperature: None,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            history_window: DEFAULT_HISTORY_WINDOW,
            model_call_timeout_ms: DEFAULT_MODEL_CALL_TIMEOUT_MS,
            stream_idle_timeout_ms: DEFAULT_STREAM_IDLE_TIMEOUT_MS,
            tool_timeout_ms: DEFAULT_TOOL_TIMEOUT_MS,
            scope_fetch_timeout_ms: DEFAULT_SCOPE_FETCH_TIMEOUT_MS,
            base_instructions: DEFAULT_BASE_INSTRUCTIONS.to_string(),
            tool_guidance: DEFAULT_TOOL_GUIDANCE.to_string(),
            long_running_tools: vec!["read_file".to_string()],
        }
    }
}

impl OrchestratorConfig {
    /// Load from environment variables on top of the defaults.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv(); // load .env if present, ignore error
        let mut config = Self::default();
        config.apply_env();
        config
    }

    /// Parse a TOML document. Missing keys keep their defaults.
    pub fn from_toml_str(source: &str) -> Result<Self> {
        toml::from_str(source)
            .map_err(|e| OrchestratorError::Configuration(format!("invalid config: {e}")))
    }

    /// Load a TOML file, then apply environment overrides.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|e| {
            OrchestratorError::Configuration(format!("cannot read {}: {e}", path.display()))
        })?;
        let _ = dotenvy::dotenv();
        let mut config = Self::from_toml_str(&source)?;
        config.apply_env();
        Ok(config)
    }

    fn apply_env(&mut self) {
        if let Ok(key) = std::env::var("ANTHROPIC_API_KEY") {
            if !key.trim().is_empty() {
                self.api_key = Some(key);
            }
        }
        if let Ok(url) = std::env::var("ANTHROPIC_BASE_URL") {
            if !url.trim().is_empty() {
                self.base_url = Some(url);
            }
        }
        if let Ok(model) = std::env::var("PARLEY_MODEL") {
            if !model.trim().is_empty() {
                self.default_model = model.trim().to_string();
            }
        }
        if let Some(v) = env_positive("PARLEY_MAX_TOKENS") {
            self.default_max_tokens = u32::try_from(v).unwrap_or(u32::MAX);
        }
        if let Some(v) = env_positive("PARLEY_MAX_ITERATIONS") {
            self.max_iterations = v as usize;
        }
        if let Some(v) = env_positive("PARLEY_HISTORY_WINDOW") {
            self.history_window = v as usize;
        }
        if let Some(v) = env_positive("PARLEY_TOOL_TIMEOUT_MS") {
            self.tool_timeout_ms = v;
        }
        if let Some(v) = env_positive("PARLEY_MODEL_TIMEOUT_MS") {
            self.model_call_timeout_ms = v;
        }
    }

    /// Reject settings that would make the loop unable to run or terminate.
    pub fn validate(&self) -> Result<()> {
        if self.max_iterations == 0 {
            return Err(OrchestratorError::Configuration(
                "max_iterations must be at least 1".into(),
            ));
        }
        if self.default_model.trim().is_empty() {
            return Err(OrchestratorError::Configuration(
                "default_model must not be empty".into(),
            ));
        }
        if self.model_call_timeout_ms == 0 || self.tool_timeout_ms == 0 {
            return Err(OrchestratorError::Configuration(
                "timeouts must be greater than zero".into(),
            ));
        }
        Ok(())
    }

    pub fn model_call_timeout(&self) -> Duration {
        Duration::from_millis(self.model_call_timeout_ms)
    }

    /// `None` disables the idle check.
    pub fn stream_idle_timeout(&self) -> Option<Duration> {
        (self.stream_idle_timeout_ms > 0).then(|| Duration::from_millis(self.stream_idle_timeout_ms))
    }

    pub fn tool_timeout(&self) -> Duration {
        Duration::from_millis(self.tool_timeout_ms)
    }

    pub fn scope_fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.scope_fetch_timeout_ms)
    }
}

fn env_positive(key: &str) -> Option<u64> {
    let value = std::env::var(key).ok()?;
    parse_positive(&value)
}

fn parse_positive(value: &str) -> Option<u64> {
    let parsed = value.trim().parse::<u64>().ok()?;
    if parsed == 0 {
        None
    } else {
        Some(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn defaults_are_valid() {
        let config = OrchestratorConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_iterations, 4);
        assert_eq!(config.history_window, 20);
        assert_eq!(config.long_running_tools, vec!["read_file".to_string()]);
    }

    #[test]
    fn toml_overrides_only_given_keys() {
        let config = OrchestratorConfig::from_toml_str(
            r#"
            max_iterations = 6
            tool_timeout_ms = 500
            long_running_tools = ["read_file", "ingest"]
            "#,
        )
        .unwrap();
        assert_eq!(config.max_iterations, 6);
        assert_eq!(config.tool_timeout(), Duration::from_millis(500));
        assert_eq!(config.long_running_tools.len(), 2);
        assert_eq!(config.default_model, DEFAULT_MODEL);
    }

    #[test]
    fn load_reads_file_from_disk() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "default_model = \"claude-test\"\nhistory_window = 8").unwrap();
        let config = OrchestratorConfig::load(file.path()).unwrap();
        assert_eq!(config.history_window, 8);
    }

    #[test]
    fn invalid_toml_is_configuration_error() {
        let err = OrchestratorConfig::from_toml_str("max_iterations = \"many\"").unwrap_err();
        assert!(matches!(err, OrchestratorError::Configuration(_)));
    }

    #[test]
    fn zero_iterations_rejected() {
        let config = OrchestratorConfig {
            max_iterations: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(OrchestratorError::Configuration(_))
        ));
    }

    #[test]
    fn parse_positive_ignores_zero_and_garbage() {
        assert_eq!(parse_positive(" 12 "), Some(12));
        assert_eq!(parse_positive("0"), None);
        assert_eq!(parse_positive("x"), None);
    }

    #[test]
    fn debug_redacts_api_key() {
        let config = OrchestratorConfig {
            api_key: Some("sk-secret".into()),
            ..Default::default()
        };
        assert!(!format!("{config:?}").contains("sk-secret"));
    }
}
