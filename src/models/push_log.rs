//! # Push Notification Log
//!
//! One row per delivery attempt, keyed by the platform message id. Created by
//! the worker at send time, updated exactly once by the acknowledgment tracker
//! when the device confirms receipt.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::delivery::{DeliveryErrorCode, Platform};
use crate::models::job::JobId;

/// Delivery status of a single push message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    /// Accepted by the platform; receipt not yet confirmed.
    #[default]
    Sent,
    /// The device acknowledged receipt.
    Delivered,
    /// The platform rejected the push, or the device reported failure.
    Failed,
    /// The delivery window elapsed before the device confirmed.
    Expired,
}

impl fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DeliveryStatus::Sent => "sent",
            DeliveryStatus::Delivered => "delivered",
            DeliveryStatus::Failed => "failed",
            DeliveryStatus::Expired => "expired",
        };
        write!(f, "{s}")
    }
}

impl FromStr for DeliveryStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sent" => Ok(DeliveryStatus::Sent),
            "delivered" => Ok(DeliveryStatus::Delivered),
            "failed" => Ok(DeliveryStatus::Failed),
            "expired" => Ok(DeliveryStatus::Expired),
            _ => Err(format!("Invalid delivery status: {s}")),
        }
    }
}

/// Per-message delivery record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushNotificationLog {
    /// Platform-assigned (or synthesized) message id; unique per attempt.
    pub message_id: String,
    pub job_id: JobId,
    pub device_id: String,
    pub platform: Platform,
    pub sent_at: DateTime<Utc>,
    pub received_at: Option<DateTime<Utc>>,
    /// Milliseconds between send and device receipt. Defined only once
    /// `received_at` is set; never negative.
    pub latency_ms: Option<i64>,
    pub status: DeliveryStatus,
    pub error_code: Option<DeliveryErrorCode>,
    pub error_message: Option<String>,
}

impl PushNotificationLog {
    /// Record a successful platform accept.
    pub fn sent(
        message_id: impl Into<String>,
        job_id: JobId,
        device_id: impl Into<String>,
        platform: Platform,
    ) -> Self {
        Self {
            message_id: message_id.into(),
            job_id,
            device_id: device_id.into(),
            platform,
            sent_at: Utc::now(),
            received_at: None,
            latency_ms: None,
            status: DeliveryStatus::Sent,
            error_code: None,
            error_message: None,
        }
    }

    /// Record a rejected send attempt.
    pub fn failed(
        message_id: impl Into<String>,
        job_id: JobId,
        device_id: impl Into<String>,
        platform: Platform,
        error_code: Option<DeliveryErrorCode>,
        error_message: impl Into<String>,
    ) -> Self {
        Self {
            message_id: message_id.into(),
            job_id,
            device_id: device_id.into(),
            platform,
            sent_at: Utc::now(),
            received_at: None,
            latency_ms: None,
            status: DeliveryStatus::Failed,
            error_code,
            error_message: Some(error_message.into()),
        }
    }

    /// Whether the row still awaits a device receipt.
    pub fn awaiting_receipt(&self) -> bool {
        self.status == DeliveryStatus::Sent && self.received_at.is_none()
    }

    /// Apply a device receipt: sets `received_at`, computes latency, and moves
    /// the row to its acknowledged status. Rejects receipts timestamped before
    /// the send (skewed device clock) and second receipts for the same row.
    pub fn mark_received(
        &mut self,
        received_at: DateTime<Utc>,
        status: DeliveryStatus,
    ) -> Result<(), String> {
        if self.received_at.is_some() {
            return Err(format!(
                "message {} already acknowledged at {}",
                self.message_id,
                self.received_at.map(|t| t.to_rfc3339()).unwrap_or_default()
            ));
        }
        let latency = received_at.signed_duration_since(self.sent_at).num_milliseconds();
        if latency < 0 {
            return Err(format!(
                "receipt for message {} predates its send time",
                self.message_id
            ));
        }
        self.received_at = Some(received_at);
        self.latency_ms = Some(latency);
        self.status = status;
        Ok(())
    }
}
