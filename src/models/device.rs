//! # Device Reference
//!
//! Read-only projection of a registered field device, resolved from the
//! device directory when a job fans out. The worker never mutates devices;
//! registration and token rotation happen outside this subsystem.

use serde::{Deserialize, Serialize};

use crate::delivery::Platform;

/// A registered field device as seen by the delivery layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceRef {
    pub device_id: String,
    pub site_id: String,
    /// Deployment segment within the site (e.g. `lobby`, `floor-2`).
    pub segment: Option<String>,
    pub platform: Platform,
    /// Platform push token / channel URI / subscription blob. A device
    /// without one yields a failed per-device outcome, not a job abort.
    pub push_token: Option<String>,
}

impl DeviceRef {
    pub fn new(
        device_id: impl Into<String>,
        site_id: impl Into<String>,
        platform: Platform,
    ) -> Self {
        Self {
            device_id: device_id.into(),
            site_id: site_id.into(),
            segment: None,
            platform,
            push_token: None,
        }
    }

    pub fn with_segment(mut self, segment: impl Into<String>) -> Self {
        self.segment = Some(segment.into());
        self
    }

    pub fn with_push_token(mut self, token: impl Into<String>) -> Self {
        self.push_token = Some(token.into());
        self
    }

    /// Whether the device matches a segment filter (no filter matches all).
    pub fn in_segment(&self, segment: Option<&str>) -> bool {
        match segment {
            None => true,
            Some(wanted) => self.segment.as_deref() == Some(wanted),
        }
    }
}
