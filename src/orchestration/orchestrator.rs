//! # Job Orchestrator
//!
//! Entry point of the subsystem: validates push requests against the device
//! directory, persists and queues jobs, runs the worker pool, and answers
//! status queries.
//!
//! ## Lifecycle
//!
//! `create_job` returns as soon as the job is persisted and admitted to the
//! queue; processing is asynchronous. `start` spawns the configured number of
//! workers against the shared queue; `stop` signals shutdown, lets each
//! worker finish the job it is processing, and joins the pool within the
//! configured window.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::json;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::queue::JobQueue;
use super::types::{CreateJobRequest, JobStatusView, OrchestratorStats};
use super::worker::JobWorker;
use crate::config::{FleetcastConfig, OrchestratorConfig};
use crate::delivery::ProviderRegistry;
use crate::error::{FleetcastError, Result};
use crate::events::{names, EventPublisher};
use crate::logging::log_job_operation;
use crate::models::job::{Job, JobId, JobTarget};
use crate::state_machine::{JobEvent, JobStateMachine};
use crate::store::{DeviceDirectory, JobStore, PushLogStore};

pub struct JobOrchestrator {
    orchestrator_config: OrchestratorConfig,
    config_base_url: String,
    queue: JobQueue,
    job_store: Arc<dyn JobStore>,
    push_log_store: Arc<dyn PushLogStore>,
    device_directory: Arc<dyn DeviceDirectory>,
    registry: Arc<ProviderRegistry>,
    event_publisher: EventPublisher,
    shutdown_tx: watch::Sender<bool>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl JobOrchestrator {
    pub fn new(
        config: &FleetcastConfig,
        job_store: Arc<dyn JobStore>,
        push_log_store: Arc<dyn PushLogStore>,
        device_directory: Arc<dyn DeviceDirectory>,
        registry: Arc<ProviderRegistry>,
        event_publisher: EventPublisher,
    ) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            orchestrator_config: config.orchestrator.clone(),
            config_base_url: config.config_base_url.clone(),
            queue: JobQueue::new(config.orchestrator.queue_capacity),
            job_store,
            push_log_store,
            device_directory,
            registry,
            event_publisher,
            shutdown_tx,
            workers: Mutex::new(Vec::new()),
        }
    }

    /// Validate, persist, and queue a configuration-push job. Returns the job
    /// id immediately; dispatch happens on the worker pool.
    pub async fn create_job(&self, request: CreateJobRequest) -> Result<JobId> {
        self.validate_request(&request).await?;

        let job = self.build_job(&request);
        let job_id = job.id;
        self.job_store.insert(job.clone()).await?;
        self.event_publisher
            .publish(
                names::JOB_CREATED,
                json!({
                    "job_id": job_id.to_string(),
                    "site_id": request.site_id.clone(),
                    "action": request.action.clone(),
                    "priority": request.priority,
                }),
            )
            .await;

        // Reserve before marking Queued: on a full queue the job record stays
        // Pending, and a worker can never pull an id that is not yet Queued.
        let slot = match self.queue.try_reserve() {
            Ok(slot) => slot,
            Err(e) => {
                warn!(job_id = %job_id, error = %e, "Queue admission rejected, job stays pending");
                return Err(e);
            }
        };

        let mut machine = JobStateMachine::new(
            job,
            Arc::clone(&self.job_store),
            self.event_publisher.clone(),
        );
        machine.transition(JobEvent::Enqueue).await?;
        slot.admit(job_id);

        log_job_operation(
            "create",
            Some(&job_id.to_string()),
            Some(&request.site_id),
            "queued",
            Some(&request.action),
        );
        Ok(job_id)
    }

    /// Read-only projection of a job's current state.
    pub async fn get_job_status(&self, job_id: &JobId) -> Result<Option<JobStatusView>> {
        Ok(self
            .job_store
            .get(job_id)
            .await?
            .map(|job| JobStatusView::from(&job)))
    }

    /// Externally cancel a job that has not finished. Cancelling a queued job
    /// leaves its id in the queue; the pulling worker observes the terminal
    /// state and skips it.
    pub async fn cancel_job(&self, job_id: &JobId) -> Result<JobStatusView> {
        let job = self
            .job_store
            .get(job_id)
            .await?
            .ok_or_else(|| FleetcastError::JobNotFound {
                job_id: job_id.to_string(),
            })?;

        let mut machine = JobStateMachine::new(
            job,
            Arc::clone(&self.job_store),
            self.event_publisher.clone(),
        );
        machine.transition(JobEvent::Cancel).await?;

        log_job_operation(
            "cancel",
            Some(&job_id.to_string()),
            machine.job().target.site_id(),
            "cancelled",
            None,
        );
        Ok(JobStatusView::from(machine.job()))
    }

    /// Warm the providers and spawn the worker pool.
    pub async fn start(&self) -> Result<()> {
        let mut workers = self.workers.lock().await;
        if !workers.is_empty() {
            return Err(FleetcastError::InvalidState(
                "orchestrator is already running".to_string(),
            ));
        }

        self.registry.initialize_all().await?;

        // A restart after stop() needs the signal lowered again
        if self.shutdown_tx.send(false).is_err() {
            debug!("No live shutdown receivers; continuing");
        }

        let pull_timeout = Duration::from_millis(self.orchestrator_config.pull_timeout_ms);
        for worker_id in 0..self.orchestrator_config.worker_count {
            let worker = JobWorker::new(
                worker_id,
                self.queue.clone(),
                Arc::clone(&self.job_store),
                Arc::clone(&self.push_log_store),
                Arc::clone(&self.device_directory),
                Arc::clone(&self.registry),
                self.event_publisher.clone(),
                pull_timeout,
                self.shutdown_tx.subscribe(),
            );
            workers.push(tokio::spawn(worker.run()));
        }

        info!(
            worker_count = workers.len(),
            queue_capacity = self.queue.capacity(),
            "🚀 ORCHESTRATOR: Worker pool started"
        );
        Ok(())
    }

    /// Signal shutdown and join the pool. Workers finish the job they are
    /// processing; ids still queued stay queued for a later restart.
    pub async fn stop(&self) -> Result<()> {
        let mut workers = self.workers.lock().await;
        if workers.is_empty() {
            debug!("Orchestrator is not running; nothing to stop");
            return Ok(());
        }

        if self.shutdown_tx.send(true).is_err() {
            debug!("All workers already dropped their shutdown receivers");
        }

        let window = Duration::from_millis(self.orchestrator_config.shutdown_timeout_ms);
        let handles: Vec<JoinHandle<()>> = workers.drain(..).collect();
        let abort_handles: Vec<_> = handles.iter().map(JoinHandle::abort_handle).collect();
        match tokio::time::timeout(window, futures::future::join_all(handles)).await {
            Ok(results) => {
                for result in results {
                    if let Err(e) = result {
                        warn!(error = %e, "Worker task ended abnormally");
                    }
                }
            }
            Err(_) => {
                warn!("Worker pool did not stop within the shutdown window, aborting");
                for abort in abort_handles {
                    abort.abort();
                }
            }
        }

        info!("🚀 ORCHESTRATOR: Worker pool stopped");
        Ok(())
    }

    /// Point-in-time diagnostics.
    pub async fn stats(&self) -> OrchestratorStats {
        let workers = self.workers.lock().await;
        OrchestratorStats {
            worker_count: workers.len(),
            queue_capacity: self.queue.capacity(),
            queued_jobs: self.queue.len(),
            running: !workers.is_empty() && !*self.shutdown_tx.borrow(),
        }
    }

    /// Provider capability records, for diagnostics surfaces.
    pub fn platform_info(&self) -> Vec<crate::delivery::PlatformInfo> {
        self.registry.info()
    }

    async fn validate_request(&self, request: &CreateJobRequest) -> Result<()> {
        if request.site_id.is_empty() {
            return Err(FleetcastError::validation("site_id", "must not be empty"));
        }
        if request.action.is_empty() {
            return Err(FleetcastError::validation("action", "must not be empty"));
        }
        if !self.device_directory.site_exists(&request.site_id).await? {
            return Err(FleetcastError::SiteNotFound {
                site_id: request.site_id.clone(),
            });
        }
        if let Some(device_id) = &request.device_id {
            match self.device_directory.device(device_id).await? {
                Some(device) if device.site_id == request.site_id => {}
                Some(_) => {
                    return Err(FleetcastError::validation(
                        "device_id",
                        format!(
                            "device {device_id} is not registered under site {}",
                            request.site_id
                        ),
                    ))
                }
                None => {
                    return Err(FleetcastError::DeviceNotFound {
                        device_id: device_id.clone(),
                    })
                }
            }
        }
        Ok(())
    }

    /// Materialize the job record: synthesize the config version from the
    /// clock when omitted, derive the config URL from the configured base, and
    /// pick the collapse key from the target scope.
    fn build_job(&self, request: &CreateJobRequest) -> Job {
        let config_version = request
            .config_version
            .clone()
            .unwrap_or_else(|| Utc::now().format("%Y%m%d.%H%M%S").to_string());
        let config_url = request.config_url.clone().unwrap_or_else(|| {
            format!(
                "{}/sites/{}/configs/{}",
                self.config_base_url.trim_end_matches('/'),
                request.site_id,
                config_version
            )
        });
        let (target, collapse_key) = match &request.device_id {
            Some(device_id) => (
                JobTarget::Device {
                    device_id: device_id.clone(),
                },
                format!("cfg-{device_id}"),
            ),
            None => (
                JobTarget::Segment {
                    site_id: request.site_id.clone(),
                    segment: request.segment.clone(),
                },
                format!("cfg-{}", request.site_id),
            ),
        };

        let mut job = Job::new(
            request.action.clone(),
            target,
            config_url,
            config_version,
            collapse_key,
        )
        .with_priority(request.priority);
        if let Some(description) = &request.description {
            job = job.with_description(description);
        }
        if !request.payload.is_empty() {
            job = job.with_payload(request.payload.clone());
        }
        job
    }
}
