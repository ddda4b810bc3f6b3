//! In-process job queue and progress log registry.
//!
//! This crate provides:
//! - A bounded job queue with duplicate suppression and completion handles
//! - A per-job progress log with broadcast/replay subscriptions
//!
//! Neither is durable; the job store is the source of truth for results.

pub mod error;
pub mod job;
pub mod progress;
pub mod queue;

pub use error::{QueueError, QueueResult};
pub use job::AnalyzeVideoJob;
pub use progress::{ProgressConfig, ProgressRegistry, ProgressStream};
pub use queue::{CompletionHandle, Delivery, JobOutcome, JobQueue, JobReceiver, QueueConfig};
