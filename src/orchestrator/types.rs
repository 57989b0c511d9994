//! Run summary types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{Turn, Usage};

use super::state::{DoneReason, DriverState};

/// Unique run identifier.
pub type RunId = Uuid;

/// Run lifecycle status.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Completed,
    IterationLimit,
    Failed,
    Canceled,
}

impl RunStatus {
    pub(crate) fn from_state(state: &DriverState) -> Self {
        match state {
            DriverState::Done {
                reason: DoneReason::IterationLimit,
            } => Self::IterationLimit,
            DriverState::Done {
                reason: DoneReason::Canceled,
            } => Self::Canceled,
            DriverState::Done { .. } => Self::Completed,
            _ => Self::Failed,
        }
    }
}

/// Result of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    pub run_id: RunId,
    pub status: RunStatus,
    /// Model calls issued.
    pub iterations: usize,
    /// Tool-use requests executed across all iterations.
    pub tool_calls: usize,
    /// Text streamed across all iterations.
    pub text: String,
    /// Turn sequence at the end of the run, assistant and tool-result turns
    /// included.
    pub turns: Vec<Turn>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub usage: Usage,
    pub finished_at: DateTime<Utc>,
}

impl RunResult {
    pub fn is_success(&self) -> bool {
        matches!(self.status, RunStatus::Completed | RunStatus::IterationLimit)
    }

    /// Result for a run whose task never reported back.
    pub fn aborted(error: impl Into<String>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            status: RunStatus::Failed,
            iterations: 0,
            tool_calls: 0,
            text: String::new(),
            turns: Vec::new(),
            error: Some(error.into()),
            usage: Usage::default(),
            finished_at: Utc::now(),
        }
    }
}
