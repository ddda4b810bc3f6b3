//! PostgreSQL job store.

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use talk_models::{
    ContentInsights, EmotionSample, GestureSample, Job, JobId, JobStatus, KeyMoment, NewJob,
    Report, TranscriptSegment, VideoStatus,
};
use tracing::{debug, info};

use crate::queries;
use crate::{
    assemble_report, ClearSummary, InsightMatch, JobStore, StoreConfig, StoreError, StoreResult,
};

/// Rows per INSERT; keeps bind parameters well under the protocol limit.
const INSERT_BATCH: usize = 1000;

/// [`JobStore`] backed by PostgreSQL.
///
/// Every bulk insert runs in one transaction so a stage's rows land
/// all-or-nothing.
#[derive(Debug, Clone)]
pub struct PgJobStore {
    pool: PgPool,
}

impl PgJobStore {
    /// Connect using `config.database_url` and apply migrations if enabled.
    pub async fn connect(config: &StoreConfig) -> StoreResult<Self> {
        let url = config
            .database_url
            .as_deref()
            .ok_or_else(|| StoreError::Database(sqlx::Error::Configuration("DATABASE_URL not set".into())))?;

        let pool = PgPoolOptions::new()
            .min_connections(config.pool_size.min(config.max_connections()))
            .max_connections(config.max_connections())
            .acquire_timeout(config.acquire_timeout)
            .test_before_acquire(true)
            .connect(url)
            .await?;

        info!(
            max_connections = config.max_connections(),
            "Connected to PostgreSQL"
        );

        let store = Self::from_pool(pool);
        if config.run_migrations {
            store.migrate().await?;
        }
        Ok(store)
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Apply embedded schema migrations.
    pub async fn migrate(&self) -> StoreResult<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        info!("Database migrations applied");
        Ok(())
    }
}

#[async_trait]
impl JobStore for PgJobStore {
    fn backend(&self) -> &'static str {
        "postgres"
    }

    async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn create_job(&self, new: NewJob) -> StoreResult<Job> {
        let mut tx = self.pool.begin().await?;
        if queries::fetch_job(&mut *tx, new.id.0).await?.is_some() {
            return Err(StoreError::AlreadyExists(new.id));
        }
        queries::insert_video(&mut *tx, &new).await?;
        queries::insert_analysis(&mut *tx, new.id.0).await?;
        let row = queries::fetch_job(&mut *tx, new.id.0)
            .await?
            .ok_or(StoreError::NotFound(new.id))?;
        tx.commit().await?;

        debug!(job_id = %new.id, "Created job");
        Job::try_from(row)
    }

    async fn get_job(&self, id: &JobId) -> StoreResult<Option<Job>> {
        queries::fetch_job(&self.pool, id.0)
            .await?
            .map(Job::try_from)
            .transpose()
    }

    async fn list_jobs(&self, limit: u32, offset: u32) -> StoreResult<Vec<Job>> {
        queries::list_jobs(&self.pool, limit, offset)
            .await?
            .into_iter()
            .map(Job::try_from)
            .collect()
    }

    async fn update_status(
        &self,
        id: &JobId,
        status: JobStatus,
        progress: Option<u8>,
        error: Option<String>,
    ) -> StoreResult<Job> {
        let mut tx = self.pool.begin().await?;
        let row = queries::fetch_job_for_update(&mut *tx, id.0)
            .await?
            .ok_or(StoreError::NotFound(*id))?;
        let mut job = Job::try_from(row)?;
        job.apply_update(status, progress, error)?;
        queries::update_analysis(&mut *tx, &job).await?;
        tx.commit().await?;
        Ok(job)
    }

    async fn update_video_status(&self, id: &JobId, status: VideoStatus) -> StoreResult<()> {
        match queries::update_video_status(&self.pool, id.0, status).await? {
            0 => Err(StoreError::NotFound(*id)),
            _ => Ok(()),
        }
    }

    async fn set_duration(&self, id: &JobId, seconds: f64) -> StoreResult<()> {
        match queries::set_duration(&self.pool, id.0, seconds).await? {
            0 => Err(StoreError::NotFound(*id)),
            _ => Ok(()),
        }
    }

    async fn bulk_insert_emotions(&self, id: &JobId, rows: &[EmotionSample]) -> StoreResult<usize> {
        if rows.is_empty() {
            return Ok(0);
        }
        let mut tx = self.pool.begin().await?;
        for chunk in rows.chunks(INSERT_BATCH) {
            queries::insert_emotions(&mut *tx, id.0, chunk).await?;
        }
        tx.commit().await?;
        Ok(rows.len())
    }

    async fn bulk_insert_gestures(&self, id: &JobId, rows: &[GestureSample]) -> StoreResult<usize> {
        if rows.is_empty() {
            return Ok(0);
        }
        let mut tx = self.pool.begin().await?;
        for chunk in rows.chunks(INSERT_BATCH) {
            queries::insert_gestures(&mut *tx, id.0, chunk).await?;
        }
        tx.commit().await?;
        Ok(rows.len())
    }

    async fn bulk_insert_transcripts(
        &self,
        id: &JobId,
        rows: &[TranscriptSegment],
    ) -> StoreResult<usize> {
        if rows.is_empty() {
            return Ok(0);
        }
        let mut tx = self.pool.begin().await?;
        for chunk in rows.chunks(INSERT_BATCH) {
            queries::insert_transcripts(&mut *tx, id.0, chunk).await?;
        }
        tx.commit().await?;
        Ok(rows.len())
    }

    async fn upsert_insights(&self, id: &JobId, insights: &ContentInsights) -> StoreResult<()> {
        queries::upsert_insights(&self.pool, id.0, insights).await?;
        Ok(())
    }

    async fn bulk_insert_key_moments(&self, id: &JobId, rows: &[KeyMoment]) -> StoreResult<usize> {
        if rows.is_empty() {
            return Ok(0);
        }
        let mut tx = self.pool.begin().await?;
        for chunk in rows.chunks(INSERT_BATCH) {
            queries::insert_key_moments(&mut *tx, id.0, chunk).await?;
        }
        tx.commit().await?;
        Ok(rows.len())
    }

    async fn get_report(&self, id: &JobId) -> StoreResult<Option<Report>> {
        // One snapshot for the whole report.
        let mut tx = self.pool.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ READ ONLY")
            .execute(&mut *tx)
            .await?;

        let Some(row) = queries::fetch_job(&mut *tx, id.0).await? else {
            return Ok(None);
        };
        let job = Job::try_from(row)?;

        let emotions = queries::fetch_emotions(&mut *tx, id.0)
            .await?
            .into_iter()
            .map(EmotionSample::try_from)
            .collect::<StoreResult<Vec<_>>>()?;
        let gestures = queries::fetch_gestures(&mut *tx, id.0)
            .await?
            .into_iter()
            .map(GestureSample::try_from)
            .collect::<StoreResult<Vec<_>>>()?;
        let transcript = queries::fetch_transcripts(&mut *tx, id.0)
            .await?
            .into_iter()
            .map(TranscriptSegment::try_from)
            .collect::<StoreResult<Vec<_>>>()?;
        let insights = queries::fetch_insights(&mut *tx, id.0)
            .await?
            .map(ContentInsights::from);
        let key_moments = queries::fetch_key_moments(&mut *tx, id.0)
            .await?
            .into_iter()
            .map(KeyMoment::try_from)
            .collect::<StoreResult<Vec<_>>>()?;
        tx.commit().await?;

        Ok(Some(assemble_report(
            &job,
            emotions,
            gestures,
            transcript,
            insights,
            key_moments,
        )))
    }

    async fn delete_job(&self, id: &JobId) -> StoreResult<bool> {
        let deleted = queries::delete_video(&self.pool, id.0).await?;
        if deleted > 0 {
            info!(job_id = %id, "Deleted job and its analysis rows");
        }
        Ok(deleted > 0)
    }

    async fn search_by_topic(&self, topic: &str, limit: u32) -> StoreResult<Vec<InsightMatch>> {
        Ok(queries::search_by_topic(&self.pool, topic, limit)
            .await?
            .into_iter()
            .map(InsightMatch::from)
            .collect())
    }

    async fn high_persuasion(&self, min_score: f64, limit: u32) -> StoreResult<Vec<InsightMatch>> {
        Ok(queries::high_persuasion(&self.pool, min_score, limit)
            .await?
            .into_iter()
            .map(InsightMatch::from)
            .collect())
    }

    async fn clear_all(&self) -> StoreResult<ClearSummary> {
        let mut tx = self.pool.begin().await?;
        let mut summary = ClearSummary::default();
        for table in queries::TABLES {
            let removed = queries::delete_all(&mut *tx, table).await?;
            summary.tables.push((table, removed));
        }
        tx.commit().await?;
        info!(rows = summary.total(), "Cleared all analysis tables");
        Ok(summary)
    }
}
