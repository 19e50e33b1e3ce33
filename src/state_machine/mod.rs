//! # Job State Machine
//!
//! Explicit lifecycle management for configuration-push jobs. Transitions are
//! driven by [`JobEvent`]s, guarded against terminal-state mutation and
//! timestamp regressions, persisted through the job store, and announced on
//! the event publisher.

pub mod events;
pub mod job_state_machine;
pub mod states;

// Re-export main types for convenient access
pub use events::JobEvent;
pub use job_state_machine::JobStateMachine;
pub use states::JobState;

use thiserror::Error;

/// Errors raised while transitioning a job
#[derive(Debug, Error)]
pub enum StateMachineError {
    /// The event is not legal from the current state
    #[error("Invalid transition from '{from}' on event '{event}'")]
    InvalidTransition { from: String, event: String },

    /// A transition guard rejected the event
    #[error("Guard failed: {0}")]
    GuardFailed(String),

    /// Persisting the transition through the job store failed
    #[error("Persistence failed during {operation}: {detail}")]
    Persistence { operation: String, detail: String },
}

pub type StateMachineResult<T> = std::result::Result<T, StateMachineError>;
