//! Tests for environment-driven configuration.

use std::sync::{Mutex, OnceLock};

use parley::config::OrchestratorConfig;
use parley::error::OrchestratorError;
use parley::provider::AnthropicClient;

static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

const CONFIG_ENV_VARS: [&str; 8] = [
    "ANTHROPIC_API_KEY",
    "ANTHROPIC_BASE_URL",
    "PARLEY_MODEL",
    "PARLEY_MAX_TOKENS",
    "PARLEY_MAX_ITERATIONS",
    "PARLEY_HISTORY_WINDOW",
    "PARLEY_TOOL_TIMEOUT_MS",
    "PARLEY_MODEL_TIMEOUT_MS",
];

struct EnvGuard {
    saved: Vec<(String, Option<String>)>,
}

impl EnvGuard {
    fn capture(keys: &[&str]) -> Self {
        let saved = keys
            .iter()
            .map(|key| ((*key).to_string(), std::env::var(key).ok()))
            .collect();
        Self { saved }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (key, value) in &self.saved {
            match value {
                Some(v) => std::env::set_var(key, v),
                None => std::env::remove_var(key),
            }
        }
    }
}

fn env_lock_guard() -> std::sync::MutexGuard<'static, ()> {
    ENV_LOCK
        .get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn clean_env() -> EnvGuard {
    let guard = EnvGuard::capture(&CONFIG_ENV_VARS);
    for key in CONFIG_ENV_VARS {
        std::env::remove_var(key);
    }
    guard
}

#[test]
fn from_env_maps_key_model_and_limits() {
    let _env_lock = env_lock_guard();
    let _env_guard = clean_env();

    std::env::set_var("ANTHROPIC_API_KEY", "test-anthropic-key");
    std::env::set_var("ANTHROPIC_BASE_URL", "http://localhost:9999/v1");
    std::env::set_var("PARLEY_MODEL", "claude-opus-4-20250514");
    std::env::set_var("PARLEY_MAX_ITERATIONS", "6");
    std::env::set_var("PARLEY_HISTORY_WINDOW", "12");
    std::env::set_var("PARLEY_TOOL_TIMEOUT_MS", "2500");

    let config = OrchestratorConfig::from_env();

    assert_eq!(config.api_key.as_deref(), Some("test-anthropic-key"));
    assert_eq!(config.base_url.as_deref(), Some("http://localhost:9999/v1"));
    assert_eq!(config.default_model, "claude-opus-4-20250514");
    assert_eq!(config.max_iterations, 6);
    assert_eq!(config.history_window, 12);
    assert_eq!(config.tool_timeout_ms, 2500);
}

#[test]
fn from_env_ignores_non_positive_values() {
    let _env_lock = env_lock_guard();
    let _env_guard = clean_env();

    std::env::set_var("PARLEY_MAX_ITERATIONS", "0");
    std::env::set_var("PARLEY_MAX_TOKENS", "lots");
    std::env::set_var("ANTHROPIC_API_KEY", "   ");

    let config = OrchestratorConfig::from_env();

    assert_eq!(config.max_iterations, 4);
    assert_eq!(config.default_max_tokens, 1024);
    assert!(config.validate().is_ok());
}

#[test]
fn client_requires_api_key() {
    let _env_lock = env_lock_guard();
    let _env_guard = clean_env();

    let mut config = OrchestratorConfig::from_env();
    config.api_key = None;
    let err = AnthropicClient::new(&config).unwrap_err();
    assert!(matches!(err, OrchestratorError::Configuration(ref m) if m.contains("ANTHROPIC_API_KEY")));
}
