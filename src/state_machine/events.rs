use serde::{Deserialize, Serialize};

use crate::models::job::JobOutcome;

/// Events that can trigger job state transitions
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum JobEvent {
    /// Admit the job to the worker queue
    Enqueue,
    /// A worker picked the job up and is dispatching pushes
    Start,
    /// Every device push was accepted upstream
    Acknowledge(JobOutcome),
    /// The target resolved to zero devices
    CompleteEmpty(JobOutcome),
    /// Dispatch finished with failures, or processing raised an error
    Fail {
        outcome: Option<JobOutcome>,
        error: String,
    },
    /// Cancel the job before it finishes
    Cancel,
}

impl JobEvent {
    /// Get a string representation of the event type for logging
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Enqueue => "enqueue",
            Self::Start => "start",
            Self::Acknowledge(_) => "acknowledge",
            Self::CompleteEmpty(_) => "complete_empty",
            Self::Fail { .. } => "fail",
            Self::Cancel => "cancel",
        }
    }

    /// Extract error message if this is a failure event
    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Fail { error, .. } => Some(error),
            _ => None,
        }
    }

    /// Extract the outcome carried by a terminal event
    pub fn outcome(&self) -> Option<&JobOutcome> {
        match self {
            Self::Acknowledge(outcome) | Self::CompleteEmpty(outcome) => Some(outcome),
            Self::Fail { outcome, .. } => outcome.as_ref(),
            _ => None,
        }
    }

    /// Check if this event represents a terminal transition
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Acknowledge(_) | Self::CompleteEmpty(_) | Self::Fail { .. } | Self::Cancel
        )
    }

    /// Create a failure event with the given error message and no outcome
    pub fn fail_with_error(error: impl Into<String>) -> Self {
        Self::Fail {
            outcome: None,
            error: error.into(),
        }
    }

    /// Create a failure event carrying the partial delivery outcome
    pub fn fail_with_outcome(outcome: JobOutcome, error: impl Into<String>) -> Self {
        Self::Fail {
            outcome: Some(outcome),
            error: error.into(),
        }
    }
}
