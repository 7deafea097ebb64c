use std::fmt::{self, Display};

use crate::conversation::Message;

/// Something observable that happened during a turn.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StepEvent {
    /// The model answered. Emitted once the answer is checkpointed.
    Assistant(Message),
    /// A tool call has been resolved, successfully or not.
    ToolResult(Message),
    /// The turn failed, nothing after the last checkpoint was kept.
    Failed(TurnFailure),
}

impl StepEvent {
    /// Returns the message carried by this event, if any.
    #[inline]
    pub fn message(&self) -> Option<&Message> {
        match self {
            StepEvent::Assistant(msg) | StepEvent::ToolResult(msg) => Some(msg),
            StepEvent::Failed(_) => None,
        }
    }
}

/// Why a turn failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FailureReason {
    /// The model could not be reached within the retry budget.
    ModelUnavailable,
    /// The model answered something that is not a valid message.
    InvalidResponse,
    /// The model asked for a tool that is not registered.
    ToolNotFound,
    /// A tool kept failing beyond the failure budget.
    ToolExecutionError,
    /// The model kept asking for tools beyond the iteration limit.
    MaxIterationsExceeded,
    /// The caller cancelled the turn.
    Cancelled,
    /// The conversation could not be loaded or saved.
    CheckpointFailed,
}

impl FailureReason {
    /// Returns the reason code.
    pub fn as_str(self) -> &'static str {
        match self {
            FailureReason::ModelUnavailable => "model_unavailable",
            FailureReason::InvalidResponse => "invalid_response",
            FailureReason::ToolNotFound => "tool_not_found",
            FailureReason::ToolExecutionError => "tool_execution_error",
            FailureReason::MaxIterationsExceeded => "max_iterations_exceeded",
            FailureReason::Cancelled => "cancelled",
            FailureReason::CheckpointFailed => "checkpoint_failed",
        }
    }
}

impl Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A structured turn failure.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TurnFailure {
    reason: FailureReason,
    detail: String,
}

impl TurnFailure {
    #[inline]
    pub(crate) fn new<S: Into<String>>(reason: FailureReason, detail: S) -> Self {
        Self {
            reason,
            detail: detail.into(),
        }
    }

    #[inline]
    pub(crate) fn cancelled() -> Self {
        Self::new(FailureReason::Cancelled, "the turn was cancelled")
    }

    /// Returns the reason code.
    #[inline]
    pub fn reason(&self) -> FailureReason {
        self.reason
    }

    /// Returns the underlying error message, verbatim.
    #[inline]
    pub fn detail(&self) -> &str {
        &self.detail
    }
}

impl Display for TurnFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.reason, self.detail)
    }
}

impl std::error::Error for TurnFailure {}
