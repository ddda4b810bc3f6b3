//! Bounded in-process job queue.
//!
//! Submitting returns a [`CompletionHandle`] that resolves once a worker
//! finishes (or abandons) the job. A job ID can be queued only once at a
//! time; it may be resubmitted after its previous run finished.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{mpsc, watch};
use tracing::{info, warn};

use talk_models::JobId;

use crate::error::{QueueError, QueueResult};
use crate::job::AnalyzeVideoJob;

/// Queue configuration.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Jobs that may wait for a worker before submissions are refused
    pub capacity: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self { capacity: 64 }
    }
}

impl QueueConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            capacity: std::env::var("QUEUE_CAPACITY")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|&n: &usize| n > 0)
                .unwrap_or(Self::default().capacity),
        }
    }
}

/// Observable state of a submitted job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Queued,
    Running,
    Completed,
    Failed(String),
}

impl JobOutcome {
    pub fn is_finished(&self) -> bool {
        matches!(self, JobOutcome::Completed | JobOutcome::Failed(_))
    }
}

#[derive(Debug, Default)]
struct Shared {
    in_flight: Mutex<HashSet<JobId>>,
}

impl Shared {
    fn claim(&self, id: JobId) -> bool {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id)
    }

    fn release(&self, id: &JobId) {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id);
    }

    fn contains(&self, id: &JobId) -> bool {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(id)
    }
}

/// Producer side of the queue.
#[derive(Debug, Clone)]
pub struct JobQueue {
    tx: mpsc::Sender<Delivery>,
    shared: Arc<Shared>,
    capacity: usize,
}

/// Consumer side of the queue, owned by the executor.
#[derive(Debug)]
pub struct JobReceiver {
    rx: mpsc::Receiver<Delivery>,
}

/// A job handed to a worker.
///
/// Report the result with [`Delivery::finish`]. Dropping a delivery without
/// finishing it marks the job failed and frees its ID for resubmission.
#[derive(Debug)]
pub struct Delivery {
    job: AnalyzeVideoJob,
    outcome: watch::Sender<JobOutcome>,
    shared: Arc<Shared>,
}

/// Waits for a submitted job to finish.
#[derive(Debug, Clone)]
pub struct CompletionHandle {
    job_id: JobId,
    rx: watch::Receiver<JobOutcome>,
}

impl JobQueue {
    pub fn new(config: QueueConfig) -> (Self, JobReceiver) {
        let capacity = config.capacity.max(1);
        let (tx, rx) = mpsc::channel(capacity);
        (
            Self {
                tx,
                shared: Arc::new(Shared::default()),
                capacity,
            },
            JobReceiver { rx },
        )
    }

    /// Submit a job. Fails if the queue is full or closed, or the same job
    /// is already queued or running.
    pub fn enqueue(&self, job: AnalyzeVideoJob) -> QueueResult<CompletionHandle> {
        let job_id = job.idempotency_key();
        if !self.shared.claim(job_id) {
            warn!(job_id = %job_id, "Duplicate job submission ignored");
            return Err(QueueError::Duplicate(job_id));
        }

        let (outcome, rx) = watch::channel(JobOutcome::Queued);
        let delivery = Delivery {
            job,
            outcome,
            shared: Arc::clone(&self.shared),
        };

        // A rejected delivery is dropped here, which releases the claim.
        self.tx.try_send(delivery).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => QueueError::Full(self.capacity),
            mpsc::error::TrySendError::Closed(_) => QueueError::Closed,
        })?;

        info!(job_id = %job_id, "Enqueued analysis job");
        Ok(CompletionHandle { job_id, rx })
    }

    /// Jobs waiting for a worker.
    pub fn len(&self) -> usize {
        self.capacity - self.tx.capacity()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Whether the job is queued or running.
    pub fn is_in_flight(&self, job_id: &JobId) -> bool {
        self.shared.contains(job_id)
    }
}

impl JobReceiver {
    /// Next job, or `None` once every [`JobQueue`] handle is dropped.
    pub async fn recv(&mut self) -> Option<Delivery> {
        self.rx.recv().await
    }

    /// Stop accepting new jobs; queued ones can still be received.
    pub fn close(&mut self) {
        self.rx.close();
    }
}

impl Delivery {
    pub fn job(&self) -> &AnalyzeVideoJob {
        &self.job
    }

    pub fn job_id(&self) -> JobId {
        self.job.job_id
    }

    /// Mark the job as picked up by a worker.
    pub fn start(&self) {
        self.outcome.send_replace(JobOutcome::Running);
    }

    /// Publish the final outcome and release the job ID.
    pub fn finish(self, outcome: JobOutcome) {
        self.outcome.send_replace(outcome);
    }
}

impl Drop for Delivery {
    fn drop(&mut self) {
        self.outcome.send_if_modified(|outcome| {
            if outcome.is_finished() {
                false
            } else {
                *outcome = JobOutcome::Failed("job abandoned before completion".to_string());
                true
            }
        });
        self.shared.release(&self.job.job_id);
    }
}

impl CompletionHandle {
    pub fn job_id(&self) -> JobId {
        self.job_id
    }

    /// Latest known state.
    pub fn current(&self) -> JobOutcome {
        self.rx.borrow().clone()
    }

    /// Wait until the job finishes.
    pub async fn wait(mut self) -> JobOutcome {
        loop {
            {
                let outcome = self.rx.borrow_and_update();
                if outcome.is_finished() {
                    return outcome.clone();
                }
            }
            if self.rx.changed().await.is_err() {
                return self.rx.borrow().clone();
            }
        }
    }
}
