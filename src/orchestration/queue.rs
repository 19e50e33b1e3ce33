//! # Job Queue
//!
//! Bounded FIFO of job ids between the orchestrator and the worker pool. The
//! sender side is cheap to clone; the single receiver sits behind an async
//! mutex so every worker drains the same queue. Admission never blocks: a
//! full queue is surfaced to the caller and the job record stays `Pending`.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::{self, error::TrySendError, Permit};
use tokio::sync::Mutex;

use crate::error::{FleetcastError, Result};
use crate::models::job::JobId;

#[derive(Debug, Clone)]
pub struct JobQueue {
    sender: mpsc::Sender<JobId>,
    receiver: Arc<Mutex<mpsc::Receiver<JobId>>>,
    capacity: usize,
}

/// A reserved queue slot. Holding a slot guarantees the later [`admit`] cannot
/// fail, so callers can persist state between reservation and admission.
///
/// [`admit`]: QueueSlot::admit
pub struct QueueSlot<'a> {
    permit: Permit<'a, JobId>,
}

impl QueueSlot<'_> {
    /// Place the job id into the reserved slot.
    pub fn admit(self, job_id: JobId) {
        self.permit.send(job_id);
    }
}

impl JobQueue {
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = mpsc::channel(capacity);
        Self {
            sender,
            receiver: Arc::new(Mutex::new(receiver)),
            capacity,
        }
    }

    /// Admit a job id without blocking.
    pub fn enqueue(&self, job_id: JobId) -> Result<()> {
        self.sender.try_send(job_id).map_err(|e| match e {
            TrySendError::Full(_) => FleetcastError::QueueFull {
                capacity: self.capacity,
            },
            TrySendError::Closed(_) => {
                FleetcastError::job_processing(job_id.to_string(), "job queue is closed")
            }
        })
    }

    /// Reserve a slot without admitting anything yet. The orchestrator
    /// persists the Queued transition between reservation and admission so a
    /// worker can never pull an id whose record is still Pending.
    pub fn try_reserve(&self) -> Result<QueueSlot<'_>> {
        match self.sender.try_reserve() {
            Ok(permit) => Ok(QueueSlot { permit }),
            Err(TrySendError::Full(())) => Err(FleetcastError::QueueFull {
                capacity: self.capacity,
            }),
            Err(TrySendError::Closed(())) => Err(FleetcastError::store(
                "reserve_queue_slot",
                "job queue is closed",
            )),
        }
    }

    /// Pull the next job id, waiting at most `timeout` so worker loops can
    /// observe a shutdown signal between pulls. Returns `None` on timeout or
    /// when the queue is closed.
    pub async fn pull(&self, timeout: Duration) -> Option<JobId> {
        let mut receiver = self.receiver.lock().await;
        match tokio::time::timeout(timeout, receiver.recv()).await {
            Ok(next) => next,
            Err(_) => None,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Ids admitted (or reserved) but not yet pulled.
    pub fn len(&self) -> usize {
        self.capacity - self.sender.capacity()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_enqueue_then_pull_fifo() {
        let queue = JobQueue::new(8);
        let first = JobId::new();
        let second = JobId::new();
        queue.enqueue(first).unwrap();
        queue.enqueue(second).unwrap();
        assert_eq!(queue.len(), 2);

        assert_eq!(queue.pull(Duration::from_millis(50)).await, Some(first));
        assert_eq!(queue.pull(Duration::from_millis(50)).await, Some(second));
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_full_queue_rejects_without_blocking() {
        let queue = JobQueue::new(1);
        queue.enqueue(JobId::new()).unwrap();

        let err = queue.enqueue(JobId::new()).unwrap_err();
        assert!(matches!(err, FleetcastError::QueueFull { capacity: 1 }));
    }

    #[tokio::test]
    async fn test_pull_times_out_on_empty_queue() {
        let queue = JobQueue::new(4);
        assert_eq!(queue.pull(Duration::from_millis(10)).await, None);
    }

    #[tokio::test]
    async fn test_reserved_slot_counts_against_capacity() {
        let queue = JobQueue::new(1);
        let slot = queue.try_reserve().unwrap();
        assert_eq!(queue.len(), 1);

        // The slot occupies the only position
        assert!(matches!(
            queue.try_reserve().err(),
            Some(FleetcastError::QueueFull { .. })
        ));

        let job_id = JobId::new();
        slot.admit(job_id);
        assert_eq!(queue.pull(Duration::from_millis(50)).await, Some(job_id));
    }

    #[tokio::test]
    async fn test_clones_share_one_fifo() {
        let queue = JobQueue::new(4);
        let producer = queue.clone();
        let job_id = JobId::new();
        producer.enqueue(job_id).unwrap();

        assert_eq!(queue.pull(Duration::from_millis(50)).await, Some(job_id));
    }
}
