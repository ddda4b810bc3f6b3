//! Pipeline orchestrator.
//!
//! Runs the stages of one job strictly in order, checkpointing progress in
//! the store and narrating each step to the progress registry. Any stage or
//! persistence error aborts the job and marks it failed; rows already
//! persisted by earlier steps are kept.

use std::collections::HashSet;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use talk_models::{
    defuse_terminal_markers, JobId, JobStatus, Report, TranscriptSegment, VideoStatus,
};
use talk_queue::{AnalyzeVideoJob, ProgressRegistry};
use talk_stages::StageAdapters;
use talk_store::JobStore;
use tracing::Instrument;

use crate::correlator::correlate;
use crate::error::{WorkerError, WorkerResult};
use crate::logging::JobLogger;

/// Progress recorded after each step.
pub mod checkpoints {
    pub const STARTED: u8 = 10;
    pub const EMOTIONS: u8 = 30;
    pub const GESTURES: u8 = 40;
    pub const TRANSCRIPT: u8 = 60;
    pub const CONTENT: u8 = 75;
    pub const SUMMARY: u8 = 85;
    pub const COMPLETED: u8 = 100;
}

/// Message that ends a successful job's progress log.
pub const COMPLETED_MESSAGE: &str = "✅ Analysis completed successfully!";

/// Prefix of the message that ends a failed job's progress log.
pub const FAILED_PREFIX: &str = "❌ Error processing video: ";

/// Runs analysis jobs against shared stages, store and progress registry.
pub struct AnalysisPipeline {
    store: Arc<dyn JobStore>,
    progress: ProgressRegistry,
    stages: StageAdapters,
    running: Mutex<HashSet<JobId>>,
}

/// Releases a job's running claim when dropped.
struct RunningGuard<'a> {
    running: &'a Mutex<HashSet<JobId>>,
    job_id: JobId,
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.job_id);
    }
}

impl AnalysisPipeline {
    pub fn new(store: Arc<dyn JobStore>, progress: ProgressRegistry, stages: StageAdapters) -> Self {
        Self {
            store,
            progress,
            stages,
            running: Mutex::new(HashSet::new()),
        }
    }

    pub fn store(&self) -> &Arc<dyn JobStore> {
        &self.store
    }

    pub fn progress(&self) -> &ProgressRegistry {
        &self.progress
    }

    pub fn stages(&self) -> &StageAdapters {
        &self.stages
    }

    pub fn is_running(&self, job_id: &JobId) -> bool {
        self.running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(job_id)
    }

    fn claim(&self, job_id: JobId) -> WorkerResult<RunningGuard<'_>> {
        let mut running = self.running.lock().unwrap_or_else(PoisonError::into_inner);
        if !running.insert(job_id) {
            return Err(WorkerError::AlreadyRunning(job_id));
        }
        Ok(RunningGuard {
            running: &self.running,
            job_id,
        })
    }

    /// Run every stage for one job.
    ///
    /// On failure the job is already marked failed when this returns; the
    /// error is handed back for the caller's bookkeeping. A second call for
    /// a job that is still running is refused without touching the job.
    pub async fn run(&self, job: &AnalyzeVideoJob) -> WorkerResult<()> {
        let _guard = self.claim(job.job_id)?;
        let logger = JobLogger::new(&job.job_id, "analyze_video");
        let span = logger.span();

        async {
            logger.log_start(&job.stored_name());
            let started = Instant::now();

            match self.execute(job, &logger).await {
                Ok(_) => {
                    metrics::histogram!("talk_job_duration_seconds")
                        .record(started.elapsed().as_secs_f64());
                    logger.log_completion(started.elapsed());
                    Ok(())
                }
                Err(e) => {
                    self.record_failure(&job.job_id, &e.to_string()).await;
                    Err(e)
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn execute(&self, job: &AnalyzeVideoJob, logger: &JobLogger) -> WorkerResult<Report> {
        let id = &job.job_id;
        let video = job.video_path.as_path();

        self.progress.append(
            id,
            format!(
                "🎬 Processing video: {}",
                defuse_terminal_markers(&job.stored_name())
            ),
        );
        self.store
            .update_status(id, JobStatus::Processing, Some(checkpoints::STARTED), None)
            .await?;
        self.store
            .update_video_status(id, VideoStatus::Processing)
            .await?;

        self.progress.append(id, "😀 Analyzing emotions and gestures...");
        let emotions = timed(logger, "emotions", self.stages.emotions.detect_emotions(video)).await?;
        self.progress
            .append(id, format!("✅ Detected {} emotion samples", emotions.len()));
        self.checkpoint(id, checkpoints::EMOTIONS).await?;

        let gestures = timed(logger, "gestures", self.stages.gestures.detect_gestures(video)).await?;
        self.progress
            .append(id, format!("✅ Detected {} gestures", gestures.len()));
        self.checkpoint(id, checkpoints::GESTURES).await?;

        self.progress.append(id, "🎤 Extracting and transcribing audio...");
        let raw_transcript = timed(logger, "transcribe", self.stages.transcriber.transcribe(video)).await?;
        self.progress
            .append(id, format!("✅ Transcribed {} segments", raw_transcript.len()));
        self.checkpoint(id, checkpoints::TRANSCRIPT).await?;

        self.progress.append(id, "🧠 Performing AI content analysis...");
        let insights = timed(
            logger,
            "analyze_content",
            self.stages.analyzer.analyze_content(&raw_transcript),
        )
        .await;
        self.progress.append(id, "✅ Content analysis finished");
        self.checkpoint(id, checkpoints::CONTENT).await?;

        self.progress.append(id, "📝 Generating AI summary...");
        let summary = timed(
            logger,
            "summarize",
            self.stages
                .summarizer
                .summarize(&raw_transcript, &emotions, &gestures),
        )
        .await;
        let insights = insights.with_summary(summary);
        self.progress.append(id, "✅ AI summary generated");
        self.checkpoint(id, checkpoints::SUMMARY).await?;

        self.progress.append(id, "🔗 Correlating multimodal data...");
        let transcript = TranscriptSegment::enumerate(&raw_transcript);
        let report = correlate(&emotions, &gestures, &transcript, Some(&insights));

        self.progress.append(id, "💾 Saving analysis results...");
        self.store.bulk_insert_emotions(id, &report.emotions).await?;
        self.store.bulk_insert_gestures(id, &report.gestures).await?;
        self.store
            .bulk_insert_transcripts(id, &report.transcript)
            .await?;
        self.store.upsert_insights(id, &insights).await?;
        self.store
            .bulk_insert_key_moments(id, &report.summary.key_moments)
            .await?;
        self.store
            .set_duration(id, report.summary.total_duration)
            .await?;

        self.store
            .update_video_status(id, VideoStatus::Completed)
            .await?;
        self.store
            .update_status(
                id,
                JobStatus::Completed,
                Some(checkpoints::COMPLETED),
                None,
            )
            .await?;
        self.progress.append(id, COMPLETED_MESSAGE);

        Ok(report)
    }

    async fn checkpoint(&self, id: &JobId, progress: u8) -> WorkerResult<()> {
        self.store
            .update_status(id, JobStatus::Processing, Some(progress), None)
            .await?;
        Ok(())
    }

    /// Mark a job failed with `message`: progress log, job record and video
    /// record. Store errors are logged, not returned.
    pub async fn record_failure(&self, job_id: &JobId, message: &str) {
        let logger = JobLogger::new(job_id, "analyze_video");
        logger.log_error(message);
        self.progress
            .append(job_id, format!("{FAILED_PREFIX}{message}"));

        if let Err(e) = self
            .store
            .update_status(job_id, JobStatus::Failed, None, Some(message.to_string()))
            .await
        {
            logger.log_warning(&format!("Could not mark job failed: {e}"));
        }
        if let Err(e) = self
            .store
            .update_video_status(job_id, VideoStatus::Failed)
            .await
        {
            logger.log_warning(&format!("Could not mark video failed: {e}"));
        }
    }
}

/// Await one stage, recording its duration.
async fn timed<T>(logger: &JobLogger, stage: &'static str, fut: impl Future<Output = T>) -> T {
    let started = Instant::now();
    let output = fut.await;
    let elapsed = started.elapsed();
    metrics::histogram!("talk_stage_duration_seconds", "stage" => stage)
        .record(elapsed.as_secs_f64());
    logger.log_stage(stage, elapsed);
    output
}
