use serde::{Deserialize, Serialize};
use std::fmt;

/// Job lifecycle states.
///
/// `Pending → Queued → Sent` is the happy dispatch path; `Sent` resolves to
/// `Acknowledged` (all device pushes accepted), `Completed` (target resolved
/// to zero devices), or `Failed`. `Cancelled` is reachable from any
/// non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    /// Initial state when the job record is created
    #[default]
    Pending,
    /// Admitted to the worker queue, awaiting pickup
    Queued,
    /// A worker is dispatching pushes for the job
    Sent,
    /// All device pushes were accepted upstream
    Acknowledged,
    /// The target resolved to zero devices; nothing was sent
    Completed,
    /// At least one push failed, or processing raised an error
    Failed,
    /// Cancelled before reaching a natural terminal state
    Cancelled,
}

impl JobState {
    /// Check if this is a terminal state (no further transitions allowed)
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Acknowledged | Self::Completed | Self::Failed | Self::Cancelled
        )
    }

    /// Check if this is an active state (job is being processed)
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Queued | Self::Sent)
    }

    /// Check if the job finished without any delivery failure
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Acknowledged | Self::Completed)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Queued => write!(f, "queued"),
            Self::Sent => write!(f, "sent"),
            Self::Acknowledged => write!(f, "acknowledged"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl std::str::FromStr for JobState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "queued" => Ok(Self::Queued),
            "sent" => Ok(Self::Sent),
            "acknowledged" => Ok(Self::Acknowledged),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(format!("Invalid job state: {s}")),
        }
    }
}
