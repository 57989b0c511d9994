//! Error classification shared by the driver and the event encoder.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Machine-readable error code carried in `error` events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ErrorCode {
    Configuration,
    InvalidApiKey,
    RateLimitExceeded,
    InvalidRequest,
    ServerError,
    NetworkError,
    StreamError,
    Timeout,
    ToolError,
    ContextUnavailable,
    Canceled,
}

/// Broad error category used to decide whether a run can continue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Detected before any event is emitted; reported to the caller.
    Configuration,
    /// The model call failed or produced nothing usable.
    StreamTransport,
    /// A single tool failed; converted into an error tool result.
    ToolExecution,
    /// Scoped context could not be fetched; the prompt section is omitted.
    Degraded,
    Canceled,
}
