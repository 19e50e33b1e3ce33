use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::json;
use tracing::debug;

use super::{
    events::JobEvent,
    states::JobState,
    StateMachineError, StateMachineResult,
};
use crate::events::{names, EventPublisher};
use crate::models::job::{Job, JobId};
use crate::store::JobStore;

/// State machine owning one job record for the duration of its processing.
///
/// The owning worker is the only writer of a job after queue admission, so the
/// machine holds the record directly, applies effects, and persists each
/// transition through the store before announcing it.
pub struct JobStateMachine {
    job: Job,
    store: Arc<dyn JobStore>,
    event_publisher: EventPublisher,
}

impl JobStateMachine {
    /// Create a new state machine around an existing job record
    pub fn new(job: Job, store: Arc<dyn JobStore>, event_publisher: EventPublisher) -> Self {
        Self {
            job,
            store,
            event_publisher,
        }
    }

    /// Get the current state of the job
    pub fn current_state(&self) -> JobState {
        self.job.status
    }

    /// Attempt to transition the job state
    pub async fn transition(&mut self, event: JobEvent) -> StateMachineResult<JobState> {
        let current_state = self.job.status;
        let target_state = self.determine_target_state(current_state, &event)?;

        self.check_guards(target_state)?;
        self.apply_effects(target_state, &event);

        self.store
            .update(&self.job)
            .await
            .map_err(|e| StateMachineError::Persistence {
                operation: "update_job".to_string(),
                detail: e.to_string(),
            })?;

        debug!(
            job_id = %self.job.id,
            from = %current_state,
            to = %target_state,
            event = event.event_type(),
            "Job state transition applied"
        );

        self.event_publisher
            .publish(
                names::JOB_STATE_CHANGED,
                json!({
                    "job_id": self.job.id.to_string(),
                    "from": current_state.to_string(),
                    "to": target_state.to_string(),
                    "event": event.event_type(),
                }),
            )
            .await;

        Ok(target_state)
    }

    /// Determine the target state based on current state and event
    fn determine_target_state(
        &self,
        current_state: JobState,
        event: &JobEvent,
    ) -> StateMachineResult<JobState> {
        let target = match (current_state, event) {
            // Dispatch path
            (JobState::Pending, JobEvent::Enqueue) => JobState::Queued,
            (JobState::Queued, JobEvent::Start) => JobState::Sent,

            // Natural terminal transitions
            (JobState::Sent, JobEvent::Acknowledge(_)) => JobState::Acknowledged,
            (JobState::Sent, JobEvent::CompleteEmpty(_)) => JobState::Completed,

            // Failure transitions: after dispatch started, or a store/dispatch
            // fault before any push went out
            (JobState::Sent, JobEvent::Fail { .. }) => JobState::Failed,
            (JobState::Queued, JobEvent::Fail { .. }) => JobState::Failed,

            // Cancellation from any non-terminal state
            (JobState::Pending, JobEvent::Cancel)
            | (JobState::Queued, JobEvent::Cancel)
            | (JobState::Sent, JobEvent::Cancel) => JobState::Cancelled,

            // Everything else, including any event against a terminal state
            (from_state, event) => {
                return Err(StateMachineError::InvalidTransition {
                    from: from_state.to_string(),
                    event: event.event_type().to_string(),
                })
            }
        };

        Ok(target)
    }

    /// Check guard conditions for the transition
    fn check_guards(&self, target_state: JobState) -> StateMachineResult<()> {
        if target_state == JobState::Sent && self.job.started_at.is_some() {
            return Err(StateMachineError::GuardFailed(format!(
                "job {} already has a start timestamp",
                self.job.id
            )));
        }
        if target_state.is_terminal() && self.job.completed_at.is_some() {
            return Err(StateMachineError::GuardFailed(format!(
                "job {} already has a completion timestamp",
                self.job.id
            )));
        }
        Ok(())
    }

    /// Apply record effects for the transition
    fn apply_effects(&mut self, target_state: JobState, event: &JobEvent) {
        match target_state {
            JobState::Queued => {}
            JobState::Sent => {
                self.job.started_at = Some(self.monotonic_now());
            }
            JobState::Acknowledged | JobState::Completed => {
                self.job.completed_at = Some(self.monotonic_now());
                self.job.result = event.outcome().cloned();
            }
            JobState::Failed => {
                self.job.completed_at = Some(self.monotonic_now());
                self.job.result = event.outcome().cloned();
                self.job.error_message = event.error_message().map(str::to_string);
            }
            JobState::Cancelled => {
                self.job.completed_at = Some(self.monotonic_now());
            }
            JobState::Pending => {}
        }
        self.job.status = target_state;
    }

    /// Now, clamped so job timestamps never run backwards even if the wall
    /// clock does.
    fn monotonic_now(&self) -> DateTime<Utc> {
        let mut now = Utc::now();
        if self.job.created_at > now {
            now = self.job.created_at;
        }
        if let Some(started) = self.job.started_at {
            if started > now {
                now = started;
            }
        }
        now
    }

    /// Check if the job is in a terminal state
    pub fn is_terminal(&self) -> bool {
        self.job.status.is_terminal()
    }

    /// Get job information
    pub fn job(&self) -> &Job {
        &self.job
    }

    /// Get job ID
    pub fn job_id(&self) -> JobId {
        self.job.id
    }
}
