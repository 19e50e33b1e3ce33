//! # Job Worker
//!
//! One worker of the pool: pulls job ids from the shared queue, drives each
//! job through its state machine, fans the push out to the resolved devices,
//! and aggregates the per-device outcomes into the job's terminal state.
//!
//! ## Isolation guarantees
//!
//! A device failure never aborts the rest of the fan-out; it becomes one
//! failed entry in the aggregate outcome. Any error that escapes dispatch is
//! caught at the job boundary and fails that job only. The worker loop itself
//! never dies on a bad job.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::queue::JobQueue;
use crate::delivery::{DeliveryErrorCode, DeliveryResponse, ProviderRegistry};
use crate::error::Result;
use crate::events::{names, EventPublisher};
use crate::logging::log_push_operation;
use crate::models::device::DeviceRef;
use crate::models::job::{DeviceOutcome, DeviceSendStatus, Job, JobId, JobOutcome, JobTarget};
use crate::models::notification::PushNotification;
use crate::models::push_log::PushNotificationLog;
use crate::state_machine::{JobEvent, JobStateMachine};
use crate::store::{DeviceDirectory, JobStore, PushLogStore};

pub struct JobWorker {
    worker_id: usize,
    queue: JobQueue,
    job_store: Arc<dyn JobStore>,
    push_log_store: Arc<dyn PushLogStore>,
    device_directory: Arc<dyn DeviceDirectory>,
    registry: Arc<ProviderRegistry>,
    event_publisher: EventPublisher,
    pull_timeout: Duration,
    shutdown: watch::Receiver<bool>,
}

impl JobWorker {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        worker_id: usize,
        queue: JobQueue,
        job_store: Arc<dyn JobStore>,
        push_log_store: Arc<dyn PushLogStore>,
        device_directory: Arc<dyn DeviceDirectory>,
        registry: Arc<ProviderRegistry>,
        event_publisher: EventPublisher,
        pull_timeout: Duration,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            worker_id,
            queue,
            job_store,
            push_log_store,
            device_directory,
            registry,
            event_publisher,
            pull_timeout,
            shutdown,
        }
    }

    /// Pull/process until the shutdown signal flips. A job being processed
    /// when the signal arrives is finished before the loop exits.
    pub async fn run(self) {
        debug!(worker_id = self.worker_id, "🔄 WORKER: Loop started");
        loop {
            if *self.shutdown.borrow() {
                break;
            }
            match self.queue.pull(self.pull_timeout).await {
                Some(job_id) => {
                    if let Err(e) = self.process_job(&job_id).await {
                        // Could not even record the failure on the job; the
                        // loop keeps going regardless.
                        error!(
                            worker_id = self.worker_id,
                            job_id = %job_id,
                            error = %e,
                            "Job processing failed past the job boundary"
                        );
                    }
                }
                // Timed out on an empty queue; loop back to re-check shutdown
                None => continue,
            }
        }
        debug!(worker_id = self.worker_id, "🔄 WORKER: Loop stopped");
    }

    /// Process one pulled job id end to end.
    async fn process_job(&self, job_id: &JobId) -> Result<()> {
        let job = match self.job_store.get(job_id).await? {
            Some(job) => job,
            None => {
                warn!(job_id = %job_id, "Queued job is missing from the store, skipping");
                return Ok(());
            }
        };
        // Cancelled (or otherwise finished) between admission and pull
        if job.is_terminal() {
            debug!(
                job_id = %job_id,
                status = %job.status,
                "Job reached a terminal state before dispatch, skipping"
            );
            return Ok(());
        }

        let mut machine = JobStateMachine::new(
            job,
            Arc::clone(&self.job_store),
            self.event_publisher.clone(),
        );
        machine.transition(JobEvent::Start).await?;

        let terminal_event = match self.dispatch(machine.job()).await {
            Ok(event) => event,
            Err(e) => {
                error!(
                    worker_id = self.worker_id,
                    job_id = %job_id,
                    error = %e,
                    "Job dispatch failed, marking job failed"
                );
                JobEvent::fail_with_error(e.to_string())
            }
        };
        machine.transition(terminal_event).await?;
        Ok(())
    }

    /// Resolve the target, fan the push out, and aggregate. Returns the
    /// terminal event to apply; the caller owns the transition.
    async fn dispatch(&self, job: &Job) -> Result<JobEvent> {
        let devices = self.resolve_devices(job).await?;
        if devices.is_empty() {
            info!(job_id = %job.id, "🎯 DISPATCH: Target resolved to zero devices");
            return Ok(JobEvent::CompleteEmpty(JobOutcome::no_devices()));
        }

        let notification = PushNotification::for_job(job);
        let mut outcomes = Vec::with_capacity(devices.len());
        for device in &devices {
            outcomes.push(self.send_to_device(job, device, &notification).await);
        }

        let outcome = JobOutcome::from_devices(outcomes);
        info!(
            job_id = %job.id,
            total = outcome.total,
            successful = outcome.successful,
            failed = outcome.failed,
            "🎯 DISPATCH: Fan-out complete"
        );
        if outcome.failed == 0 {
            Ok(JobEvent::Acknowledge(outcome))
        } else {
            let error = format!("{} of {} device pushes failed", outcome.failed, outcome.total);
            Ok(JobEvent::fail_with_outcome(outcome, error))
        }
    }

    async fn resolve_devices(&self, job: &Job) -> Result<Vec<DeviceRef>> {
        match &job.target {
            JobTarget::Device { device_id } => Ok(self
                .device_directory
                .device(device_id)
                .await?
                .into_iter()
                .collect()),
            JobTarget::Segment { site_id, segment } => {
                self.device_directory
                    .devices_for_target(site_id, segment.as_deref())
                    .await
            }
        }
    }

    /// Attempt one device send. Infallible by contract: everything that can
    /// go wrong becomes part of the returned outcome.
    async fn send_to_device(
        &self,
        job: &Job,
        device: &DeviceRef,
        notification: &PushNotification,
    ) -> DeviceOutcome {
        let token = match device.push_token.as_deref() {
            Some(token) => token,
            None => {
                let outcome = DeviceOutcome::failed(
                    &device.device_id,
                    Some(DeliveryErrorCode::InvalidSubscription),
                    "device has no registered push token",
                );
                self.record_attempt(job, device, &outcome, None).await;
                return outcome;
            }
        };
        let provider = match self.registry.provider(device.platform) {
            Some(provider) => provider,
            None => {
                let outcome = DeviceOutcome::error(
                    &device.device_id,
                    format!("no provider registered for platform {}", device.platform),
                );
                self.record_attempt(job, device, &outcome, None).await;
                return outcome;
            }
        };

        let response = provider.send_notification(token, notification).await;
        let outcome = if response.success {
            DeviceOutcome::sent(&device.device_id, response.message_id.clone())
        } else if response.error_code == Some(DeliveryErrorCode::NetworkError) {
            DeviceOutcome::error(&device.device_id, response.message.clone())
        } else {
            DeviceOutcome::failed(
                &device.device_id,
                response.error_code,
                response.message.clone(),
            )
        };
        self.record_attempt(job, device, &outcome, Some(&response)).await;
        outcome
    }

    /// Append the push log row for one attempt and announce the send. Both
    /// writes are best effort and never change the device outcome.
    async fn record_attempt(
        &self,
        job: &Job,
        device: &DeviceRef,
        outcome: &DeviceOutcome,
        response: Option<&DeliveryResponse>,
    ) {
        let log = match outcome.status {
            DeviceSendStatus::Sent => PushNotificationLog::sent(
                outcome
                    .message_id
                    .clone()
                    .unwrap_or_else(|| format!("msg-{}", Uuid::new_v4())),
                job.id,
                &device.device_id,
                device.platform,
            ),
            DeviceSendStatus::Failed | DeviceSendStatus::Error => PushNotificationLog::failed(
                format!("failed-{}", Uuid::new_v4()),
                job.id,
                &device.device_id,
                device.platform,
                response.and_then(|r| r.error_code).or(outcome.error_code),
                outcome
                    .detail
                    .clone()
                    .unwrap_or_else(|| "delivery failed".to_string()),
            ),
        };
        let message_id = log.message_id.clone();

        if let Err(e) = self.push_log_store.insert(log).await {
            warn!(
                job_id = %job.id,
                device_id = %device.device_id,
                error = %e,
                "Failed to record push log row"
            );
        }

        log_push_operation(
            "send",
            Some(&job.id.to_string()),
            Some(&device.device_id),
            Some(&device.platform.to_string()),
            match outcome.status {
                DeviceSendStatus::Sent => "sent",
                DeviceSendStatus::Failed => "failed",
                DeviceSendStatus::Error => "error",
            },
            outcome.detail.as_deref(),
        );

        self.event_publisher
            .publish(
                names::PUSH_SENT,
                json!({
                    "job_id": job.id.to_string(),
                    "device_id": device.device_id,
                    "platform": device.platform,
                    "message_id": message_id,
                    "status": outcome.status,
                }),
            )
            .await;
    }
}
