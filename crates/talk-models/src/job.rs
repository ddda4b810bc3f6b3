//! Job records: one uploaded video and the lifecycle of its analysis.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// Unique identifier for a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct JobId(pub Uuid);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse a job ID received from a client.
    pub fn parse(s: &str) -> Result<Self, JobIdError> {
        Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(|_| JobIdError(s.to_string()))
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for JobId {
    type Err = JobIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<Uuid> for JobId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

/// A string that is not a valid job ID.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("malformed job id: {0}")]
pub struct JobIdError(pub String);

/// Analysis lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Accepted, waiting for a worker
    #[default]
    Pending,
    /// Pipeline running
    Processing,
    /// All stages succeeded and results are persisted
    Completed,
    /// A stage or persistence step failed
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "processing" => Ok(JobStatus::Processing),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            other => Err(format!("unknown job status: {other}")),
        }
    }
}

/// Status of the uploaded video itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum VideoStatus {
    #[default]
    Pending,
    Processing,
    Completed,
    Failed,
}

impl VideoStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VideoStatus::Pending => "pending",
            VideoStatus::Processing => "processing",
            VideoStatus::Completed => "completed",
            VideoStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for VideoStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VideoStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(VideoStatus::Pending),
            "processing" => Ok(VideoStatus::Processing),
            "completed" => Ok(VideoStatus::Completed),
            "failed" => Ok(VideoStatus::Failed),
            other => Err(format!("unknown video status: {other}")),
        }
    }
}

/// Rejected status/progress update.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum JobTransitionError {
    #[error("job {job_id} is already {status}")]
    Terminal { job_id: JobId, status: JobStatus },

    #[error("progress for job {job_id} cannot go from {from} to {to}")]
    ProgressRegression { job_id: JobId, from: u8, to: u8 },

    #[error("progress for job {job_id} cannot reach 100 while {status}")]
    PrematureCompletion { job_id: JobId, status: JobStatus },

    #[error("job {job_id} cannot move from {from} back to {to}")]
    InvalidStatus {
        job_id: JobId,
        from: JobStatus,
        to: JobStatus,
    },
}

/// Input for creating a job record.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct NewJob {
    pub id: JobId,
    pub original_filename: String,
    pub stored_filename: String,
    pub file_size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
}

impl NewJob {
    pub fn new(
        id: JobId,
        original_filename: impl Into<String>,
        stored_filename: impl Into<String>,
        file_size: u64,
    ) -> Self {
        Self {
            id,
            original_filename: original_filename.into(),
            stored_filename: stored_filename.into(),
            file_size,
            duration: None,
        }
    }

    pub fn with_duration(mut self, seconds: f64) -> Self {
        self.duration = Some(seconds);
        self
    }
}

/// A submitted video and its analysis lifecycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Job {
    /// Unique job ID
    pub id: JobId,

    /// Filename as uploaded by the client
    pub original_filename: String,

    /// Filename under the upload directory
    pub stored_filename: String,

    /// Upload size in bytes
    pub file_size: u64,

    /// Known video duration in seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,

    /// Status of the uploaded video
    #[serde(default)]
    pub video_status: VideoStatus,

    /// Analysis status
    #[serde(default)]
    pub status: JobStatus,

    /// Progress (0-100)
    #[serde(default)]
    pub progress: u8,

    /// Error message (if failed)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Set when the video finished processing (either way)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processed_at: Option<DateTime<Utc>>,

    /// Set when the analysis completed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,

    /// Duration derived from the analysed signals
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_duration: Option<f64>,
}

impl Job {
    /// Create a pending job from upload metadata.
    pub fn new(new: NewJob) -> Self {
        Self {
            id: new.id,
            original_filename: new.original_filename,
            stored_filename: new.stored_filename,
            file_size: new.file_size,
            duration: new.duration,
            video_status: VideoStatus::Pending,
            status: JobStatus::Pending,
            progress: 0,
            error_message: None,
            created_at: Utc::now(),
            processed_at: None,
            completed_at: None,
            total_duration: None,
        }
    }

    /// Apply a status/progress update.
    ///
    /// Progress never decreases, reaches 100 only on completion, and a
    /// terminal job never changes again. Completing a job forces progress
    /// to 100 and stamps `completed_at`.
    pub fn apply_update(
        &mut self,
        status: JobStatus,
        progress: Option<u8>,
        error: Option<String>,
    ) -> Result<(), JobTransitionError> {
        if self.status.is_terminal() {
            return Err(JobTransitionError::Terminal {
                job_id: self.id,
                status: self.status,
            });
        }

        if status == JobStatus::Pending && self.status != JobStatus::Pending {
            return Err(JobTransitionError::InvalidStatus {
                job_id: self.id,
                from: self.status,
                to: status,
            });
        }

        let next = match status {
            JobStatus::Completed => 100,
            _ => progress.unwrap_or(self.progress).min(100),
        };

        if next < self.progress {
            return Err(JobTransitionError::ProgressRegression {
                job_id: self.id,
                from: self.progress,
                to: next,
            });
        }

        if next == 100 && status != JobStatus::Completed {
            return Err(JobTransitionError::PrematureCompletion {
                job_id: self.id,
                status,
            });
        }

        self.status = status;
        self.progress = next;
        if error.is_some() {
            self.error_message = error;
        }
        if status == JobStatus::Completed {
            self.completed_at = Some(Utc::now());
        }

        Ok(())
    }

    /// Update the video half of the record.
    pub fn set_video_status(&mut self, status: VideoStatus) {
        self.video_status = status;
        if matches!(status, VideoStatus::Completed | VideoStatus::Failed) {
            self.processed_at = Some(Utc::now());
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pending_job() -> Job {
        Job::new(NewJob::new(JobId::new(), "talk.mp4", "x_talk.mp4", 1024))
    }

    #[test]
    fn test_job_creation() {
        let job = pending_job();
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.video_status, VideoStatus::Pending);
        assert_eq!(job.progress, 0);
        assert!(job.completed_at.is_none());
    }

    #[test]
    fn test_job_id_parse() {
        let id = JobId::new();
        assert_eq!(JobId::parse(&id.to_string()), Ok(id));
        assert!(JobId::parse("not-a-uuid").is_err());
        assert!(JobId::parse("").is_err());
    }

    #[test]
    fn test_progress_is_monotonic() {
        let mut job = pending_job();
        job.apply_update(JobStatus::Processing, Some(30), None).unwrap();
        assert_eq!(job.progress, 30);

        let err = job
            .apply_update(JobStatus::Processing, Some(10), None)
            .unwrap_err();
        assert!(matches!(err, JobTransitionError::ProgressRegression { from: 30, to: 10, .. }));
        assert_eq!(job.progress, 30);
    }

    #[test]
    fn test_progress_100_requires_completion() {
        let mut job = pending_job();
        let err = job
            .apply_update(JobStatus::Processing, Some(100), None)
            .unwrap_err();
        assert!(matches!(err, JobTransitionError::PrematureCompletion { .. }));

        job.apply_update(JobStatus::Completed, None, None).unwrap();
        assert_eq!(job.progress, 100);
        assert!(job.completed_at.is_some());
    }

    #[test]
    fn test_terminal_job_is_immutable() {
        let mut job = pending_job();
        job.apply_update(JobStatus::Processing, Some(40), None).unwrap();
        job.apply_update(JobStatus::Failed, None, Some("boom".into()))
            .unwrap();
        assert_eq!(job.progress, 40);
        assert_eq!(job.error_message.as_deref(), Some("boom"));

        assert!(job.apply_update(JobStatus::Completed, None, None).is_err());
        assert!(job.apply_update(JobStatus::Processing, Some(50), None).is_err());
        assert_eq!(job.status, JobStatus::Failed);
    }

    #[test]
    fn test_cannot_return_to_pending() {
        let mut job = pending_job();
        job.apply_update(JobStatus::Processing, Some(10), None).unwrap();
        assert!(job.apply_update(JobStatus::Pending, None, None).is_err());
    }

    #[test]
    fn test_status_strings() {
        for status in [
            JobStatus::Pending,
            JobStatus::Processing,
            JobStatus::Completed,
            JobStatus::Failed,
        ] {
            assert_eq!(status.as_str().parse::<JobStatus>(), Ok(status));
        }
        assert_eq!(
            serde_json::to_string(&JobStatus::Processing).unwrap(),
            "\"processing\""
        );
    }
}
