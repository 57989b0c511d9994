//! Driver state machine.
//!
//! The driver owns side effects; this module only decides what comes next.

use serde::Serialize;

/// Why a run ended normally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DoneReason {
    /// The model finished a turn without requesting tools.
    Completed,
    /// The iteration cap was reached after a tool phase.
    IterationLimit,
    /// Tools were requested but produced no results.
    NoToolResults,
    /// The client went away or the caller canceled.
    Canceled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverState {
    Idle,
    Streaming { iteration: usize },
    ToolPending { iteration: usize },
    Done { reason: DoneReason },
    Failed { error: String },
}

impl DriverState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done { .. } | Self::Failed { .. })
    }

    /// Whether the run ends with a `final` event.
    pub fn emits_final(&self) -> bool {
        matches!(self, Self::Done { reason } if *reason != DoneReason::Canceled)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverInput {
    Start,
    /// The model stream produced a finished turn with this many tool uses.
    TurnFinished { tool_uses: usize },
    /// No usable finished turn: stream error, early end, or deadline.
    TurnUnavailable { error: String },
    /// The tool phase produced this many results.
    ToolsResolved { results: usize },
    Aborted,
}

/// Next state for `input` in `state`.
///
/// Terminal states absorb every input. An input that makes no sense for the
/// current state fails the run.
pub fn transition(state: &DriverState, input: &DriverInput, max_iterations: usize) -> DriverState {
    use DriverInput as I;
    use DriverState as S;

    match (state, input) {
        (S::Done { .. } | S::Failed { .. }, _) => state.clone(),
        (_, I::Aborted) => S::Done {
            reason: DoneReason::Canceled,
        },
        (S::Idle, I::Start) => S::Streaming { iteration: 0 },
        (S::Streaming { .. }, I::TurnFinished { tool_uses: 0 }) => S::Done {
            reason: DoneReason::Completed,
        },
        (S::Streaming { iteration }, I::TurnFinished { .. }) => S::ToolPending {
            iteration: *iteration,
        },
        (S::Streaming { .. }, I::TurnUnavailable { error }) => S::Failed {
            error: error.clone(),
        },
        (S::ToolPending { .. }, I::ToolsResolved { results: 0 }) => S::Done {
            reason: DoneReason::NoToolResults,
        },
        (S::ToolPending { iteration }, I::ToolsResolved { .. }) => {
            if iteration + 1 >= max_iterations {
                S::Done {
                    reason: DoneReason::IterationLimit,
                }
            } else {
                S::Streaming {
                    iteration: iteration + 1,
                }
            }
        }
        (state, input) => S::Failed {
            error: format!("unexpected {input:?} while {state:?}"),
        },
    }
}
