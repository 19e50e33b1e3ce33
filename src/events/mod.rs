//! # Lifecycle Events
//!
//! Broadcast-based publication of job and push lifecycle events. Subscribers
//! (dashboards, audit pipelines) attach through [`EventPublisher::subscribe`];
//! publishing never blocks job processing and tolerates having no listeners.

pub mod publisher;

// Re-export key types for convenience
pub use publisher::{EventPublisher, PublishedEvent};

/// Well-known lifecycle event names.
pub mod names {
    /// A job was created and admitted to the queue.
    pub const JOB_CREATED: &str = "job.created";
    /// A job moved between lifecycle states.
    pub const JOB_STATE_CHANGED: &str = "job.state_changed";
    /// A push was accepted by an upstream platform.
    pub const PUSH_SENT: &str = "push.sent";
    /// A device confirmed receipt of a push.
    pub const PUSH_ACKNOWLEDGED: &str = "push.acknowledged";
}
