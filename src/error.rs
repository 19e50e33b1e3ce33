//! # Error Types
//!
//! Crate-wide error taxonomy for the push orchestration core, using thiserror
//! for structured error types instead of `Box<dyn Error>` patterns.
//!
//! The taxonomy mirrors how failures propagate through the system: configuration
//! faults fail fast at construction time, network faults are retryable by the
//! caller, validation and upstream rejections are reported per device, and job
//! processing faults are caught at the worker boundary.

use thiserror::Error;

/// Crate-wide error type for orchestration, delivery, and tracking operations.
#[derive(Error, Debug)]
pub enum FleetcastError {
    /// Missing or invalid credentials, endpoints, or settings. Fails fast at
    /// construction time; non-retryable.
    #[error("Configuration error: {component}: {detail}")]
    Configuration { component: String, detail: String },

    /// Timeout or connection failure while talking to an upstream platform.
    /// Retryable by the caller.
    #[error("Network error during {operation}: {detail}")]
    Network { operation: String, detail: String },

    /// Structurally invalid input (device token, payload, request field).
    /// Non-retryable, reported per device.
    #[error("Validation error: {field}: {detail}")]
    Validation { field: String, detail: String },

    /// The upstream platform rejected the request (unauthorized, forbidden,
    /// not found). Non-retryable without operator intervention.
    #[error("Upstream rejection (status {status}): {detail}")]
    UpstreamRejection { status: u16, detail: String },

    /// Any error caught at the job-processing boundary. The worker loop
    /// converts these into a terminal `Failed` job state and keeps running.
    #[error("Job processing error for {job_id}: {detail}")]
    JobProcessing { job_id: String, detail: String },

    /// Target site does not exist in the device directory.
    #[error("Site not found: {site_id}")]
    SiteNotFound { site_id: String },

    /// Target device does not exist in the device directory.
    #[error("Device not found: {device_id}")]
    DeviceNotFound { device_id: String },

    /// No job record exists for the given id.
    #[error("Job not found: {job_id}")]
    JobNotFound { job_id: String },

    /// The shared job queue is at capacity; the job was not admitted.
    #[error("Job queue full: capacity {capacity} reached")]
    QueueFull { capacity: usize },

    /// A component was asked to start/stop from the wrong lifecycle state.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Job store or push log store operation failed.
    #[error("Store error during {operation}: {detail}")]
    Store { operation: String, detail: String },

    /// Authentication subsystem failure.
    #[error(transparent)]
    Auth(#[from] crate::auth::AuthError),

    /// Job state machine rejected a transition.
    #[error(transparent)]
    StateMachine(#[from] crate::state_machine::StateMachineError),

    /// Payload serialization failure.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl FleetcastError {
    /// Create a configuration error
    pub fn configuration(component: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::Configuration {
            component: component.into(),
            detail: detail.into(),
        }
    }

    /// Create a network error
    pub fn network(operation: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::Network {
            operation: operation.into(),
            detail: detail.into(),
        }
    }

    /// Create a validation error
    pub fn validation(field: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            detail: detail.into(),
        }
    }

    /// Create a job processing error
    pub fn job_processing(job_id: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::JobProcessing {
            job_id: job_id.into(),
            detail: detail.into(),
        }
    }

    /// Create a store error
    pub fn store(operation: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::Store {
            operation: operation.into(),
            detail: detail.into(),
        }
    }

    /// Whether a retry of the same call could reasonably succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network { .. } | Self::QueueFull { .. })
    }
}

/// Result type alias for fleetcast operations
pub type Result<T> = std::result::Result<T, FleetcastError>;
