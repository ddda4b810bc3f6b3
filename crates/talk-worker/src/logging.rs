//! Structured job logging.

use std::time::Duration;

use talk_models::JobId;
use tracing::{error, info, warn, Span};

/// Consistent lifecycle logging for one job.
#[derive(Debug, Clone)]
pub struct JobLogger {
    job_id: JobId,
    operation: &'static str,
}

impl JobLogger {
    pub fn new(job_id: &JobId, operation: &'static str) -> Self {
        Self {
            job_id: *job_id,
            operation,
        }
    }

    pub fn log_start(&self, message: &str) {
        info!(
            job_id = %self.job_id,
            operation = self.operation,
            "Job started: {}", message
        );
    }

    /// A pipeline stage finished.
    pub fn log_stage(&self, stage: &str, elapsed: Duration) {
        info!(
            job_id = %self.job_id,
            operation = self.operation,
            stage,
            elapsed_ms = elapsed.as_millis() as u64,
            "Stage finished"
        );
    }

    pub fn log_warning(&self, message: &str) {
        warn!(
            job_id = %self.job_id,
            operation = self.operation,
            "Job warning: {}", message
        );
    }

    pub fn log_error(&self, message: &str) {
        error!(
            job_id = %self.job_id,
            operation = self.operation,
            "Job error: {}", message
        );
    }

    pub fn log_completion(&self, elapsed: Duration) {
        info!(
            job_id = %self.job_id,
            operation = self.operation,
            elapsed_secs = elapsed.as_secs_f64(),
            "Job completed"
        );
    }

    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }

    pub fn operation(&self) -> &'static str {
        self.operation
    }

    /// Span carrying the job's fields.
    pub fn span(&self) -> Span {
        tracing::info_span!("job", job_id = %self.job_id, operation = self.operation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_logger_creation() {
        let job_id = JobId::new();
        let logger = JobLogger::new(&job_id, "analyze_video");

        assert_eq!(logger.job_id(), &job_id);
        assert_eq!(logger.operation(), "analyze_video");
    }
}
