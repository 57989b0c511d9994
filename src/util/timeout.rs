//! Timeout helper.

use std::future::Future;
use std::time::Duration;

use crate::error::OrchestratorError;

/// Run `future`, failing with [`OrchestratorError::Timeout`] once `duration`
/// elapses.
pub async fn with_timeout<T>(
    duration: Duration,
    future: impl Future<Output = Result<T, OrchestratorError>>,
) -> Result<T, OrchestratorError> {
    match tokio::time::timeout(duration, future).await {
        Ok(result) => result,
        Err(_) => Err(OrchestratorError::Timeout(duration.as_millis() as u64)),
    }
}
