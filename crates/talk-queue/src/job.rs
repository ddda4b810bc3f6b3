//! Job payloads carried by the queue.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use talk_models::JobId;

/// Run the analysis pipeline over one uploaded video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzeVideoJob {
    /// Job ID (also the store record ID)
    pub job_id: JobId,
    /// Location of the uploaded file on local disk
    pub video_path: PathBuf,
    /// Filename as uploaded, for progress messages
    pub original_filename: String,
    pub created_at: DateTime<Utc>,
}

impl AnalyzeVideoJob {
    pub fn new(job_id: JobId, video_path: impl Into<PathBuf>) -> Self {
        let video_path = video_path.into();
        let original_filename = video_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            job_id,
            video_path,
            original_filename,
            created_at: Utc::now(),
        }
    }

    pub fn with_original_filename(mut self, name: impl Into<String>) -> Self {
        self.original_filename = name.into();
        self
    }

    /// Key used to suppress duplicate submissions.
    pub fn idempotency_key(&self) -> JobId {
        self.job_id
    }

    /// Name of the stored file, as shown in progress messages.
    pub fn stored_name(&self) -> String {
        self.video_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.original_filename.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_builder() {
        let id = JobId::new();
        let job = AnalyzeVideoJob::new(id, format!("uploads/{id}_talk.mp4"))
            .with_original_filename("talk.mp4");

        assert_eq!(job.idempotency_key(), id);
        assert_eq!(job.original_filename, "talk.mp4");
        assert_eq!(job.stored_name(), format!("{id}_talk.mp4"));
    }

    #[test]
    fn test_job_serialization() {
        let job = AnalyzeVideoJob::new(JobId::new(), "/tmp/a.mp4");
        let json = serde_json::to_string(&job).unwrap();
        let parsed: AnalyzeVideoJob = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, job);
    }
}
