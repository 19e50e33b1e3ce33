//! # Domain Models
//!
//! Core records for configuration-push jobs: the job itself, the ephemeral
//! notification value handed to providers, the per-message push log row, and
//! the read-only device reference resolved from the device directory.

pub mod device;
pub mod job;
pub mod notification;
pub mod push_log;

// Re-export core models for easy access
pub use device::DeviceRef;
pub use job::{
    DeviceOutcome, DeviceSendStatus, Job, JobId, JobOutcome, JobPriority, JobTarget, OutcomeKind,
};
pub use notification::PushNotification;
pub use push_log::{DeliveryStatus, PushNotificationLog};
