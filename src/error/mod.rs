//! Error types for Parley.

pub mod unified;

pub use unified::{ErrorCategory, ErrorCode};

use thiserror::Error;

/// Primary error type for all orchestrator operations.
#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Rate limited: retry after {retry_after_ms:?}ms")]
    RateLimited { retry_after_ms: Option<u64> },

    #[error("Timeout after {0}ms")]
    Timeout(u64),

    #[error("Stream error: {0}")]
    Stream(String),

    #[error("Tool execution error: {tool_name}: {message}")]
    ToolExecution { tool_name: String, message: String },

    #[error("Context unavailable: {0}")]
    Context(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Canceled")]
    Canceled,
}

impl OrchestratorError {
    /// Create an API error.
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// Create a tool execution error.
    pub fn tool(tool_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ToolExecution {
            tool_name: tool_name.into(),
            message: message.into(),
        }
    }

    /// Classify this error into a category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Configuration(_) | Self::InvalidArgument(_) => ErrorCategory::Configuration,
            Self::ToolExecution { .. } => ErrorCategory::ToolExecution,
            Self::Context(_) => ErrorCategory::Degraded,
            Self::Canceled => ErrorCategory::Canceled,
            _ => ErrorCategory::StreamTransport,
        }
    }

    /// Stable code reported in `error` events.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Configuration(_) | Self::Io(_) => ErrorCode::Configuration,
            Self::InvalidArgument(_) | Self::Serialization(_) => ErrorCode::InvalidRequest,
            Self::Authentication(_) => ErrorCode::InvalidApiKey,
            Self::RateLimited { .. } => ErrorCode::RateLimitExceeded,
            Self::Api { status, .. } => match status {
                401 | 403 => ErrorCode::InvalidApiKey,
                429 => ErrorCode::RateLimitExceeded,
                500..=599 => ErrorCode::ServerError,
                _ => ErrorCode::InvalidRequest,
            },
            Self::Network(_) => ErrorCode::NetworkError,
            Self::Timeout(_) => ErrorCode::Timeout,
            Self::Stream(_) => ErrorCode::StreamError,
            Self::ToolExecution { .. } => ErrorCode::ToolError,
            Self::Context(_) => ErrorCode::ContextUnavailable,
            Self::Canceled => ErrorCode::Canceled,
        }
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, OrchestratorError>;
