//! Durable storage for analysis jobs and their results.
//!
//! The [`JobStore`] trait is the only persistence surface the pipeline and
//! the HTTP layer see. Two implementations are provided:
//! - [`PgJobStore`]: PostgreSQL via sqlx, with embedded migrations
//! - [`MemoryJobStore`]: process-local, used when no database is configured
//!   and in tests
//!
//! Detail rows (emotions, gestures, transcript, insights, key moments) are
//! append-only and disappear only when their job is deleted.

pub mod config;
pub mod error;
pub mod memory;
pub mod postgres;
mod queries;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use talk_models::{
    ContentInsights, EmotionSample, GestureSample, Job, JobId, JobStatus, KeyMoment, NewJob,
    Report, TranscriptSegment, VideoStatus,
};
use tracing::warn;

pub use config::StoreConfig;
pub use error::{StoreError, StoreResult};
pub use memory::MemoryJobStore;
pub use postgres::PgJobStore;

/// Completed analysis matched by a search query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsightMatch {
    pub job_id: JobId,
    pub original_filename: String,
    pub main_topics: Vec<String>,
    pub persuasion_score: f64,
    pub overall_tone: String,
    pub completed_at: Option<DateTime<Utc>>,
}

impl InsightMatch {
    pub fn new(job: &Job, insights: &ContentInsights) -> Self {
        Self {
            job_id: job.id,
            original_filename: job.original_filename.clone(),
            main_topics: insights.main_topics.clone(),
            persuasion_score: insights.persuasion_score,
            overall_tone: insights.overall_tone.clone(),
            completed_at: job.completed_at,
        }
    }
}

/// Rows removed by [`JobStore::clear_all`], per table, children first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ClearSummary {
    pub tables: Vec<(&'static str, u64)>,
}

impl ClearSummary {
    pub fn total(&self) -> u64 {
        self.tables.iter().map(|(_, n)| n).sum()
    }
}

/// Persistence operations for jobs and their detail rows.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Short backend name for logs and readiness output.
    fn backend(&self) -> &'static str;

    /// Cheap connectivity check.
    async fn ping(&self) -> StoreResult<()>;

    async fn create_job(&self, new: NewJob) -> StoreResult<Job>;

    async fn get_job(&self, id: &JobId) -> StoreResult<Option<Job>>;

    /// Jobs newest first.
    async fn list_jobs(&self, limit: u32, offset: u32) -> StoreResult<Vec<Job>>;

    /// Apply a status/progress update, enforcing the lifecycle rules of
    /// [`Job::apply_update`]. Returns the updated job.
    async fn update_status(
        &self,
        id: &JobId,
        status: JobStatus,
        progress: Option<u8>,
        error: Option<String>,
    ) -> StoreResult<Job>;

    async fn update_video_status(&self, id: &JobId, status: VideoStatus) -> StoreResult<()>;

    /// Record the analysed duration in seconds.
    async fn set_duration(&self, id: &JobId, seconds: f64) -> StoreResult<()>;

    async fn bulk_insert_emotions(&self, id: &JobId, rows: &[EmotionSample]) -> StoreResult<usize>;

    async fn bulk_insert_gestures(&self, id: &JobId, rows: &[GestureSample]) -> StoreResult<usize>;

    async fn bulk_insert_transcripts(
        &self,
        id: &JobId,
        rows: &[TranscriptSegment],
    ) -> StoreResult<usize>;

    async fn upsert_insights(&self, id: &JobId, insights: &ContentInsights) -> StoreResult<()>;

    async fn bulk_insert_key_moments(&self, id: &JobId, rows: &[KeyMoment]) -> StoreResult<usize>;

    /// Rebuild the correlated report from stored rows.
    ///
    /// Returns `None` for unknown jobs. `video_path` is left unset; callers
    /// that know the public upload location attach it.
    async fn get_report(&self, id: &JobId) -> StoreResult<Option<Report>>;

    /// Delete a job and every detail row it owns. Returns whether it existed.
    async fn delete_job(&self, id: &JobId) -> StoreResult<bool>;

    /// Completed analyses whose main topics include `topic` (case-insensitive).
    async fn search_by_topic(&self, topic: &str, limit: u32) -> StoreResult<Vec<InsightMatch>>;

    /// Completed analyses scoring at least `min_score`, highest first.
    async fn high_persuasion(&self, min_score: f64, limit: u32) -> StoreResult<Vec<InsightMatch>>;

    /// Remove every row from every table.
    async fn clear_all(&self) -> StoreResult<ClearSummary>;
}

/// Assemble a report from stored parts, deriving the summary the same way
/// the correlator does.
pub fn assemble_report(
    job: &Job,
    emotions: Vec<EmotionSample>,
    gestures: Vec<GestureSample>,
    transcript: Vec<TranscriptSegment>,
    insights: Option<ContentInsights>,
    key_moments: Vec<KeyMoment>,
) -> Report {
    let summary = talk_models::ReportSummary {
        total_duration: job.total_duration.unwrap_or(0.0),
        emotional_range: talk_models::emotional_range(&emotions),
        key_moments,
        top_themes: talk_models::top_themes(insights.as_ref()),
    };

    Report {
        emotions,
        gestures,
        transcript,
        llm_insights: insights,
        summary,
        video_path: None,
    }
}

/// Open the configured store: PostgreSQL when a URL is set, otherwise memory.
pub async fn open_store(config: &StoreConfig) -> StoreResult<Arc<dyn JobStore>> {
    match &config.database_url {
        Some(_) => Ok(Arc::new(PgJobStore::connect(config).await?)),
        None => {
            warn!("DATABASE_URL not set, results will not survive a restart");
            Ok(Arc::new(MemoryJobStore::new()))
        }
    }
}
