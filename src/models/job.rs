//! # Job Record
//!
//! A configuration-push job targets either a single device or every device in
//! a site segment, and carries the payload fields that become the push
//! notification. Jobs are created by the orchestrator, mutated only by the
//! worker that pulled them from the queue, and frozen once terminal.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::delivery::DeliveryErrorCode;
use crate::state_machine::JobState;

/// Unique job identifier, generated at creation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for JobId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Processing priority, carried into the notification for platforms that
/// understand delivery urgency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobPriority {
    Low,
    #[default]
    Normal,
    High,
    Critical,
}

impl fmt::Display for JobPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobPriority::Low => "low",
            JobPriority::Normal => "normal",
            JobPriority::High => "high",
            JobPriority::Critical => "critical",
        };
        write!(f, "{s}")
    }
}

/// What the job targets: one device, or every device in a site segment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JobTarget {
    /// Push to a single known device.
    Device { device_id: String },
    /// Fan out to every device registered under the site, optionally narrowed
    /// to one segment.
    Segment {
        site_id: String,
        segment: Option<String>,
    },
}

impl JobTarget {
    /// The site the job belongs to, for logging and config-URL derivation.
    pub fn site_id(&self) -> Option<&str> {
        match self {
            JobTarget::Device { .. } => None,
            JobTarget::Segment { site_id, .. } => Some(site_id),
        }
    }
}

/// A configuration-push job and its full lifecycle state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    /// Operator-supplied action name, e.g. `update_polling_interval`.
    pub action: String,
    pub description: Option<String>,
    pub priority: JobPriority,
    pub target: JobTarget,

    /// URL the device fetches its new configuration from.
    pub config_url: String,
    /// Opaque version marker for the configuration being pushed.
    pub config_version: String,
    /// Arbitrary key/value payload forwarded in the notification data map.
    pub payload: serde_json::Map<String, serde_json::Value>,
    /// Delivery time-to-live in seconds.
    pub ttl_seconds: u32,
    /// Collapse key: newer pushes for the same target supersede older ones.
    pub collapse_key: String,

    pub status: JobState,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,

    /// Populated only on terminal states.
    pub result: Option<JobOutcome>,
    pub error_message: Option<String>,
}

impl Job {
    /// Create a new pending job with generated id and creation timestamp.
    pub fn new(
        action: String,
        target: JobTarget,
        config_url: String,
        config_version: String,
        collapse_key: String,
    ) -> Self {
        Self {
            id: JobId::new(),
            action,
            description: None,
            priority: JobPriority::default(),
            target,
            config_url,
            config_version,
            payload: serde_json::Map::new(),
            ttl_seconds: 3600,
            collapse_key,
            status: JobState::default(),
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            result: None,
            error_message: None,
        }
    }

    pub fn with_priority(mut self, priority: JobPriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_payload(mut self, payload: serde_json::Map<String, serde_json::Value>) -> Self {
        self.payload = payload;
        self
    }

    /// Whether the job has reached a terminal state and must not change again.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// Aggregate outcome kind recorded on a finished job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    /// Pushes were dispatched to at least one device.
    Dispatched,
    /// The target resolved to zero devices; nothing was sent.
    NoDevices,
}

/// Per-job aggregate delivery result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobOutcome {
    pub status: OutcomeKind,
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    pub devices: Vec<DeviceOutcome>,
}

impl JobOutcome {
    /// Outcome for a target that resolved to no devices.
    pub fn no_devices() -> Self {
        Self {
            status: OutcomeKind::NoDevices,
            total: 0,
            successful: 0,
            failed: 0,
            devices: Vec::new(),
        }
    }

    /// Aggregate per-device outcomes into a dispatched result.
    pub fn from_devices(devices: Vec<DeviceOutcome>) -> Self {
        let total = devices.len();
        let successful = devices
            .iter()
            .filter(|d| d.status == DeviceSendStatus::Sent)
            .count();
        Self {
            status: OutcomeKind::Dispatched,
            total,
            successful,
            failed: total - successful,
            devices,
        }
    }
}

/// How a single device send ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceSendStatus {
    /// The platform accepted the push.
    Sent,
    /// The platform or validation rejected the push.
    Failed,
    /// Delivery raised an unexpected error; the device was skipped.
    Error,
}

/// Result of one device send within a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceOutcome {
    pub device_id: String,
    pub status: DeviceSendStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<DeliveryErrorCode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl DeviceOutcome {
    pub fn sent(device_id: impl Into<String>, message_id: Option<String>) -> Self {
        Self {
            device_id: device_id.into(),
            status: DeviceSendStatus::Sent,
            message_id,
            error_code: None,
            detail: None,
        }
    }

    pub fn failed(
        device_id: impl Into<String>,
        error_code: Option<DeliveryErrorCode>,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            device_id: device_id.into(),
            status: DeviceSendStatus::Failed,
            message_id: None,
            error_code,
            detail: Some(detail.into()),
        }
    }

    pub fn error(device_id: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            status: DeviceSendStatus::Error,
            message_id: None,
            error_code: None,
            detail: Some(detail.into()),
        }
    }
}
