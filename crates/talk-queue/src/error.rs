//! Queue error types.

use talk_models::JobId;
use thiserror::Error;

pub type QueueResult<T> = Result<T, QueueError>;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Queue is full ({0} jobs waiting)")]
    Full(usize),

    #[error("Queue is closed")]
    Closed,

    #[error("Job already queued or running: {0}")]
    Duplicate(JobId),

    #[error("Enqueue failed: {0}")]
    EnqueueFailed(String),
}

impl QueueError {
    pub fn enqueue_failed(msg: impl Into<String>) -> Self {
        Self::EnqueueFailed(msg.into())
    }

    /// Whether the caller may try again later.
    pub fn is_retryable(&self) -> bool {
        matches!(self, QueueError::Full(_))
    }
}
