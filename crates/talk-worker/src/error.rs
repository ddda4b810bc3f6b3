//! Worker error types.

use talk_models::JobId;
use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Job {0} is already running")]
    AlreadyRunning(JobId),

    #[error("Job failed: {0}")]
    JobFailed(String),

    #[error(transparent)]
    Stage(#[from] talk_stages::StageError),

    #[error("Store error: {0}")]
    Store(#[from] talk_store::StoreError),

    #[error("Queue error: {0}")]
    Queue(#[from] talk_queue::QueueError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub fn job_failed(msg: impl Into<String>) -> Self {
        Self::JobFailed(msg.into())
    }

    /// Whether the job should be marked failed for this error.
    pub fn fails_job(&self) -> bool {
        !matches!(self, WorkerError::AlreadyRunning(_))
    }
}
