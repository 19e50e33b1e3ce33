//! # Orchestration
//!
//! Job intake, queueing, and the worker pool that fans jobs out to push
//! providers.
//!
//! ## Architecture
//!
//! ```text
//!   create_job ──▶ JobStore (Pending) ──▶ JobQueue (Queued)
//!                                             │
//!                     ┌───────────────────────┴──────┐
//!                     ▼                              ▼
//!                JobWorker 0        ...         JobWorker N
//!                     │                              │
//!                     └────────▶ ProviderRegistry ◀──┘
//! ```
//!
//! The [`JobOrchestrator`] owns the queue and the pool; [`JobWorker`]s pull
//! job ids, resolve target devices, and drive each job to a terminal state
//! through its state machine.

pub mod orchestrator;
pub mod queue;
pub mod types;
pub mod worker;

pub use orchestrator::JobOrchestrator;
pub use queue::JobQueue;
pub use types::{CreateJobRequest, JobStatusView, OrchestratorStats};
pub use worker::JobWorker;
