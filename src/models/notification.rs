//! # Push Notification Value
//!
//! The ephemeral notification a worker builds from a job's payload fields and
//! hands to every provider. Providers compose their platform-specific body
//! around the abstract payload contract produced by [`PushNotification::payload`].

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::job::{Job, JobPriority};

/// Platform-agnostic push notification content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushNotification {
    pub title: String,
    pub body: String,
    pub config_url: String,
    pub config_version: String,
    /// Arbitrary key/value data forwarded to the device.
    pub data: serde_json::Map<String, serde_json::Value>,
    pub ttl_seconds: u32,
    pub collapse_key: String,
    pub priority: JobPriority,
    pub created_at: DateTime<Utc>,
}

impl PushNotification {
    /// Build the notification for a job. The data map always carries the
    /// action, config URL, and config version alongside the job's own payload
    /// entries so devices can act without fetching first.
    pub fn for_job(job: &Job) -> Self {
        let mut data = job.payload.clone();
        data.insert("action".to_string(), json!(job.action));
        data.insert("config_url".to_string(), json!(job.config_url));
        data.insert("config_version".to_string(), json!(job.config_version));

        Self {
            title: "Configuration update".to_string(),
            body: format!("New configuration {} available", job.config_version),
            config_url: job.config_url.clone(),
            config_version: job.config_version.clone(),
            data,
            ttl_seconds: job.ttl_seconds,
            collapse_key: job.collapse_key.clone(),
            priority: job.priority,
            created_at: Utc::now(),
        }
    }

    /// Whether the notification's delivery window has elapsed.
    pub fn is_expired(&self) -> bool {
        Utc::now() > self.created_at + Duration::seconds(i64::from(self.ttl_seconds))
    }

    /// The abstract payload contract shared by all platforms. Providers add
    /// platform extras around this, never remove from it.
    pub fn payload(&self) -> serde_json::Value {
        json!({
            "title": self.title,
            "body": self.body,
            "data": self.data,
            "priority": self.priority,
            "ttl_seconds": self.ttl_seconds,
            "collapse_key": self.collapse_key,
        })
    }
}
