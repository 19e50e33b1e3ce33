//! # Store Interfaces
//!
//! Narrow read/write contracts toward the persistence engine and the device
//! registry, both of which live outside this subsystem. The crate ships
//! DashMap-backed in-memory implementations so orchestration is runnable and
//! testable without an external engine; they are reference collaborators, not
//! a persistence design.

use async_trait::async_trait;
use dashmap::{DashMap, DashSet};

use crate::error::{FleetcastError, Result};
use crate::models::device::DeviceRef;
use crate::models::job::{Job, JobId};
use crate::models::push_log::PushNotificationLog;

/// Read/write contract for job records.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Persist a new job; the id must not already exist.
    async fn insert(&self, job: Job) -> Result<()>;
    /// Replace the stored record for an existing job.
    async fn update(&self, job: &Job) -> Result<()>;
    async fn get(&self, id: &JobId) -> Result<Option<Job>>;
}

/// Read/write contract for per-message push delivery logs.
#[async_trait]
pub trait PushLogStore: Send + Sync {
    /// Persist a new log row; the message id must not already exist.
    async fn insert(&self, log: PushNotificationLog) -> Result<()>;
    /// Replace the stored row for an existing message id.
    async fn update(&self, log: &PushNotificationLog) -> Result<()>;
    async fn get_by_message_id(&self, message_id: &str) -> Result<Option<PushNotificationLog>>;
    async fn for_job(&self, job_id: &JobId) -> Result<Vec<PushNotificationLog>>;
}

/// Read-only view of the device registry.
#[async_trait]
pub trait DeviceDirectory: Send + Sync {
    async fn site_exists(&self, site_id: &str) -> Result<bool>;
    async fn device(&self, device_id: &str) -> Result<Option<DeviceRef>>;
    /// All registered devices for a site, optionally narrowed to one segment.
    async fn devices_for_target(
        &self,
        site_id: &str,
        segment: Option<&str>,
    ) -> Result<Vec<DeviceRef>>;
}

/// In-memory job store backed by a concurrent map.
#[derive(Debug, Default)]
pub struct InMemoryJobStore {
    jobs: DashMap<JobId, Job>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn insert(&self, job: Job) -> Result<()> {
        if self.jobs.contains_key(&job.id) {
            return Err(FleetcastError::store(
                "insert_job",
                format!("job {} already exists", job.id),
            ));
        }
        self.jobs.insert(job.id, job);
        Ok(())
    }

    async fn update(&self, job: &Job) -> Result<()> {
        match self.jobs.get_mut(&job.id) {
            Some(mut entry) => {
                *entry = job.clone();
                Ok(())
            }
            None => Err(FleetcastError::JobNotFound {
                job_id: job.id.to_string(),
            }),
        }
    }

    async fn get(&self, id: &JobId) -> Result<Option<Job>> {
        Ok(self.jobs.get(id).map(|entry| entry.clone()))
    }
}

/// In-memory push log store keyed by message id.
#[derive(Debug, Default)]
pub struct InMemoryPushLogStore {
    logs: DashMap<String, PushNotificationLog>,
}

impl InMemoryPushLogStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.logs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.logs.is_empty()
    }
}

#[async_trait]
impl PushLogStore for InMemoryPushLogStore {
    async fn insert(&self, log: PushNotificationLog) -> Result<()> {
        if self.logs.contains_key(&log.message_id) {
            return Err(FleetcastError::store(
                "insert_push_log",
                format!("message {} already logged", log.message_id),
            ));
        }
        self.logs.insert(log.message_id.clone(), log);
        Ok(())
    }

    async fn update(&self, log: &PushNotificationLog) -> Result<()> {
        match self.logs.get_mut(&log.message_id) {
            Some(mut entry) => {
                *entry = log.clone();
                Ok(())
            }
            None => Err(FleetcastError::store(
                "update_push_log",
                format!("message {} not found", log.message_id),
            )),
        }
    }

    async fn get_by_message_id(&self, message_id: &str) -> Result<Option<PushNotificationLog>> {
        Ok(self.logs.get(message_id).map(|entry| entry.clone()))
    }

    async fn for_job(&self, job_id: &JobId) -> Result<Vec<PushNotificationLog>> {
        let mut rows: Vec<PushNotificationLog> = self
            .logs
            .iter()
            .filter(|entry| entry.job_id == *job_id)
            .map(|entry| entry.clone())
            .collect();
        rows.sort_by(|a, b| a.sent_at.cmp(&b.sent_at).then(a.message_id.cmp(&b.message_id)));
        Ok(rows)
    }
}

/// In-memory device directory for tests and local runs.
#[derive(Debug, Default)]
pub struct InMemoryDeviceDirectory {
    devices: DashMap<String, DeviceRef>,
    sites: DashSet<String>,
}

impl InMemoryDeviceDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a site with no devices yet.
    pub fn register_site(&self, site_id: impl Into<String>) {
        self.sites.insert(site_id.into());
    }

    /// Register a device; its site is registered implicitly.
    pub fn register_device(&self, device: DeviceRef) {
        self.sites.insert(device.site_id.clone());
        self.devices.insert(device.device_id.clone(), device);
    }
}

#[async_trait]
impl DeviceDirectory for InMemoryDeviceDirectory {
    async fn site_exists(&self, site_id: &str) -> Result<bool> {
        Ok(self.sites.contains(site_id))
    }

    async fn device(&self, device_id: &str) -> Result<Option<DeviceRef>> {
        Ok(self.devices.get(device_id).map(|entry| entry.clone()))
    }

    async fn devices_for_target(
        &self,
        site_id: &str,
        segment: Option<&str>,
    ) -> Result<Vec<DeviceRef>> {
        let mut devices: Vec<DeviceRef> = self
            .devices
            .iter()
            .filter(|entry| entry.site_id == site_id && entry.in_segment(segment))
            .map(|entry| entry.clone())
            .collect();
        // Deterministic fan-out order for logs and tests
        devices.sort_by(|a, b| a.device_id.cmp(&b.device_id));
        Ok(devices)
    }
}
