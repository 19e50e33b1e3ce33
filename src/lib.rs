#![allow(clippy::doc_markdown)] // Allow technical terms like APNs, VAPID, OAuth2 in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Fleetcast Core
//!
//! Rust core for fleet configuration push orchestration: the job lifecycle
//! state machine, a bounded worker pool that fans configuration-change jobs
//! out to field devices, a pluggable multi-platform push delivery layer with
//! per-platform credential lifecycles, and delivery-acknowledgment tracking.
//!
//! ## Overview
//!
//! An operator triggers a configuration-change job against a group of field
//! devices ("update payment config for all terminals at site X"). The
//! orchestrator validates the request, persists a [`models::job::Job`], and
//! admits it to a bounded queue. Workers drain the queue, resolve the target
//! devices through a [`store::DeviceDirectory`], and deliver one push per
//! device through the platform's [`delivery::PushProvider`]. Per-device
//! outcomes aggregate into a single terminal job state; devices later confirm
//! receipt through the [`acknowledgment::AcknowledgmentTracker`], which
//! derives delivery latency per message.
//!
//! ## Architecture
//!
//! - **Job state machine**: `Pending → Queued → Sent → {Acknowledged |
//!   Completed | Failed} | Cancelled`, timestamps set at most once, terminal
//!   states immutable.
//! - **Worker pool**: N tokio tasks over one bounded FIFO; jobs are admitted
//!   to the queue only after their `Queued` state is persisted.
//! - **Delivery layer**: one provider per platform behind a common trait;
//!   providers validate tokens and payload size before any network call.
//! - **Authenticators**: four credential protocols (OAuth2 client
//!   credentials, service-account JWT exchange, self-issued signed JWT,
//!   static API key) behind one refresh-ahead token lifecycle.
//!
//! ## Module Organization
//!
//! - [`orchestration`] - Job intake, queueing, and the worker pool
//! - [`delivery`] - Platform providers, registry, and the HTTP transport seam
//! - [`auth`] - Token lifecycles for each platform protocol
//! - [`acknowledgment`] - Device receipt matching and latency
//! - [`models`] - Jobs, devices, notifications, and push log rows
//! - [`state_machine`] - Job lifecycle transitions and persistence
//! - [`store`] - Job, push log, and device directory contracts
//! - [`events`] - Lifecycle event publishing
//! - [`config`] - Configuration with environment overrides
//! - [`error`] - Structured error handling
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use fleetcast_core::config::FleetcastConfig;
//! use fleetcast_core::delivery::ProviderRegistry;
//! use fleetcast_core::events::EventPublisher;
//! use fleetcast_core::orchestration::{CreateJobRequest, JobOrchestrator};
//! use fleetcast_core::store::{
//!     InMemoryDeviceDirectory, InMemoryJobStore, InMemoryPushLogStore,
//! };
//!
//! # async fn example() -> fleetcast_core::error::Result<()> {
//! let config = FleetcastConfig::default();
//! let directory = Arc::new(InMemoryDeviceDirectory::new());
//! directory.register_site("site-001");
//!
//! let orchestrator = JobOrchestrator::new(
//!     &config,
//!     Arc::new(InMemoryJobStore::new()),
//!     Arc::new(InMemoryPushLogStore::new()),
//!     directory,
//!     Arc::new(ProviderRegistry::new()),
//!     EventPublisher::default(),
//! );
//! orchestrator.start().await?;
//!
//! let job_id = orchestrator
//!     .create_job(
//!         CreateJobRequest::new("site-001", "update_payment_config")
//!             .with_segment("pos-terminals"),
//!     )
//!     .await?;
//! println!("queued job {job_id}");
//! # Ok(())
//! # }
//! ```
//!
//! ## Testing
//!
//! Everything external sits behind a trait (`PushTransport`, `TokenExchanger`,
//! the stores), so the full pipeline runs in-process:
//!
//! ```bash
//! cargo test --lib    # Unit tests
//! cargo test          # All tests, including integration suites
//! ```

pub mod acknowledgment;
pub mod auth;
pub mod config;
pub mod delivery;
pub mod error;
pub mod events;
pub mod logging;
pub mod models;
pub mod orchestration;
pub mod state_machine;
pub mod store;

pub use acknowledgment::{AckReceipt, AckRequest, AcknowledgmentTracker};
pub use config::FleetcastConfig;
pub use delivery::{Platform, ProviderRegistry};
pub use error::{FleetcastError, Result};
pub use events::EventPublisher;
pub use models::job::{Job, JobId, JobOutcome, JobPriority, JobTarget};
pub use orchestration::{CreateJobRequest, JobOrchestrator, JobStatusView};
pub use state_machine::{JobEvent, JobState, JobStateMachine};
