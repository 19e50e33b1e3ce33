//! # Orchestration Types
//!
//! Request and projection types shared across orchestration components.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::job::{Job, JobId, JobOutcome, JobPriority, JobTarget};
use crate::state_machine::JobState;

/// Request to create a configuration-push job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateJobRequest {
    /// Site whose devices receive the push.
    pub site_id: String,
    /// Operator-supplied action name, e.g. `update_polling_interval`.
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Overrides the derived configuration URL when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_url: Option<String>,
    /// Overrides the synthesized version marker when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_version: Option<String>,
    /// Restricts the push to one device instead of the whole site.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
    /// Narrows a site-wide push to one device segment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub segment: Option<String>,
    #[serde(default)]
    pub priority: JobPriority,
    /// Extra key/value entries forwarded in the notification data map.
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub payload: serde_json::Map<String, serde_json::Value>,
}

impl CreateJobRequest {
    /// Create a site-wide request with default priority.
    pub fn new(site_id: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            site_id: site_id.into(),
            action: action.into(),
            description: None,
            config_url: None,
            config_version: None,
            device_id: None,
            segment: None,
            priority: JobPriority::default(),
            payload: serde_json::Map::new(),
        }
    }

    pub fn with_device(mut self, device_id: impl Into<String>) -> Self {
        self.device_id = Some(device_id.into());
        self
    }

    pub fn with_segment(mut self, segment: impl Into<String>) -> Self {
        self.segment = Some(segment.into());
        self
    }

    pub fn with_priority(mut self, priority: JobPriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_config(
        mut self,
        config_url: impl Into<String>,
        config_version: impl Into<String>,
    ) -> Self {
        self.config_url = Some(config_url.into());
        self.config_version = Some(config_version.into());
        self
    }

    pub fn with_payload(mut self, payload: serde_json::Map<String, serde_json::Value>) -> Self {
        self.payload = payload;
        self
    }
}

/// Read-only projection of a job's current state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobStatusView {
    pub job_id: JobId,
    pub action: String,
    pub status: JobState,
    pub priority: JobPriority,
    pub target: JobTarget,
    pub config_version: String,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<JobOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl From<&Job> for JobStatusView {
    fn from(job: &Job) -> Self {
        Self {
            job_id: job.id,
            action: job.action.clone(),
            status: job.status,
            priority: job.priority,
            target: job.target.clone(),
            config_version: job.config_version.clone(),
            created_at: job.created_at,
            started_at: job.started_at,
            completed_at: job.completed_at,
            result: job.result.clone(),
            error_message: job.error_message.clone(),
        }
    }
}

/// Point-in-time orchestrator diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorStats {
    pub worker_count: usize,
    pub queue_capacity: usize,
    /// Jobs admitted to the queue but not yet pulled by a worker.
    pub queued_jobs: usize,
    pub running: bool,
}
