//! SQL for the PostgreSQL store.
//!
//! All functions use the generic Executor pattern, so they run against
//! either `&PgPool` or `&mut PgConnection` inside a transaction.

use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{Executor, Postgres, QueryBuilder};
use talk_models::{
    ContentInsights, EmotionSample, GestureSample, Job, JobId, KeyMoment, NewJob,
    TranscriptSegment, VideoStatus,
};
use uuid::Uuid;

use crate::{InsightMatch, StoreError};

const JOB_COLUMNS: &str = r#"
    v.id, v.original_filename, v.stored_filename, v.file_size, v.duration,
    v.status AS video_status, v.uploaded_at, v.processed_at,
    a.status, a.progress, a.error_message, a.completed_at, a.total_duration
"#;

/// Child tables first, so deletes never trip a foreign key.
pub(crate) const TABLES: [&str; 7] = [
    "key_moments",
    "llm_insights",
    "transcripts",
    "gestures",
    "emotions",
    "analyses",
    "videos",
];

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct JobRow {
    pub id: Uuid,
    pub original_filename: String,
    pub stored_filename: String,
    pub file_size: i64,
    pub duration: Option<f64>,
    pub video_status: String,
    pub uploaded_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
    pub status: String,
    pub progress: i32,
    pub error_message: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
    pub total_duration: Option<f64>,
}

impl TryFrom<JobRow> for Job {
    type Error = StoreError;

    fn try_from(row: JobRow) -> Result<Self, Self::Error> {
        Ok(Job {
            id: JobId(row.id),
            original_filename: row.original_filename,
            stored_filename: row.stored_filename,
            file_size: u64::try_from(row.file_size)
                .map_err(|_| StoreError::corrupt(format!("negative file size for {}", row.id)))?,
            duration: row.duration,
            video_status: row.video_status.parse().map_err(StoreError::Corrupt)?,
            status: row.status.parse().map_err(StoreError::Corrupt)?,
            progress: u8::try_from(row.progress)
                .map_err(|_| StoreError::corrupt(format!("progress out of range for {}", row.id)))?,
            error_message: row.error_message,
            created_at: row.uploaded_at,
            processed_at: row.processed_at,
            completed_at: row.completed_at,
            total_duration: row.total_duration,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct EmotionRow {
    pub timestamp_secs: f64,
    pub emotion: String,
    pub confidence: f64,
}

impl TryFrom<EmotionRow> for EmotionSample {
    type Error = StoreError;

    fn try_from(row: EmotionRow) -> Result<Self, Self::Error> {
        Ok(EmotionSample::new(
            row.timestamp_secs,
            row.emotion.parse().map_err(StoreError::Corrupt)?,
            row.confidence,
        ))
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct GestureRow {
    pub timestamp_secs: f64,
    pub gesture_type: String,
    pub description: String,
    pub confidence: f64,
}

impl TryFrom<GestureRow> for GestureSample {
    type Error = StoreError;

    fn try_from(row: GestureRow) -> Result<Self, Self::Error> {
        Ok(GestureSample::new(
            row.timestamp_secs,
            row.gesture_type.parse().map_err(StoreError::Corrupt)?,
            row.description,
            row.confidence,
        ))
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct TranscriptRow {
    pub segment_index: i32,
    pub start_time: f64,
    pub end_time: f64,
    pub text: String,
    pub confidence: Option<f64>,
}

impl TryFrom<TranscriptRow> for TranscriptSegment {
    type Error = StoreError;

    fn try_from(row: TranscriptRow) -> Result<Self, Self::Error> {
        Ok(TranscriptSegment {
            segment_index: u32::try_from(row.segment_index)
                .map_err(|_| StoreError::corrupt("negative segment index"))?,
            start_time: row.start_time,
            end_time: row.end_time,
            text: row.text,
            confidence: row.confidence,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct InsightRow {
    pub main_topics: Json<Vec<String>>,
    pub rhetorical_techniques: Json<Vec<String>>,
    pub argument_structure: String,
    pub persuasive_elements: Json<Vec<String>>,
    pub persuasion_score: f64,
    pub overall_tone: String,
    pub transcript_summary: String,
}

impl From<InsightRow> for ContentInsights {
    fn from(row: InsightRow) -> Self {
        ContentInsights {
            main_topics: row.main_topics.0,
            rhetorical_techniques: row.rhetorical_techniques.0,
            argument_structure: row.argument_structure,
            persuasive_elements: row.persuasive_elements.0,
            persuasion_score: row.persuasion_score,
            overall_tone: row.overall_tone,
            transcript_summary: row.transcript_summary,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct KeyMomentRow {
    pub timestamp_secs: f64,
    pub description: String,
    pub moment_type: String,
}

impl TryFrom<KeyMomentRow> for KeyMoment {
    type Error = StoreError;

    fn try_from(row: KeyMomentRow) -> Result<Self, Self::Error> {
        Ok(KeyMoment::new(
            row.timestamp_secs,
            row.description,
            row.moment_type.parse().map_err(StoreError::Corrupt)?,
        ))
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct MatchRow {
    pub id: Uuid,
    pub original_filename: String,
    pub completed_at: Option<DateTime<Utc>>,
    pub main_topics: Json<Vec<String>>,
    pub persuasion_score: f64,
    pub overall_tone: String,
}

impl From<MatchRow> for InsightMatch {
    fn from(row: MatchRow) -> Self {
        InsightMatch {
            job_id: JobId(row.id),
            original_filename: row.original_filename,
            main_topics: row.main_topics.0,
            persuasion_score: row.persuasion_score,
            overall_tone: row.overall_tone,
            completed_at: row.completed_at,
        }
    }
}

// ============================================================================
// Jobs
// ============================================================================

/// Convert a value for an integer column, rejecting anything out of range.
pub(crate) fn column_int<T, U>(value: U, column: &str) -> Result<T, StoreError>
where
    T: TryFrom<U>,
    U: Copy + std::fmt::Display,
{
    T::try_from(value)
        .map_err(|_| StoreError::corrupt(format!("{column} out of range: {value}")))
}

pub(crate) async fn insert_video<'e, E>(executor: E, new: &NewJob) -> Result<(), StoreError>
where
    E: Executor<'e, Database = Postgres>,
{
    let file_size = column_int::<i64, _>(new.file_size, "file_size")?;
    sqlx::query(
        r#"
        INSERT INTO videos (id, original_filename, stored_filename, file_size, duration)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(new.id.0)
    .bind(&new.original_filename)
    .bind(&new.stored_filename)
    .bind(file_size)
    .bind(new.duration)
    .execute(executor)
    .await?;
    Ok(())
}

pub(crate) async fn insert_analysis<'e, E>(executor: E, id: Uuid) -> Result<(), sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query("INSERT INTO analyses (id) VALUES ($1)")
        .bind(id)
        .execute(executor)
        .await?;
    Ok(())
}

pub(crate) async fn fetch_job<'e, E>(executor: E, id: Uuid) -> Result<Option<JobRow>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let sql = format!(
        "SELECT {JOB_COLUMNS} FROM videos v JOIN analyses a ON a.id = v.id WHERE v.id = $1"
    );
    sqlx::query_as(&sql).bind(id).fetch_optional(executor).await
}

/// Same as [`fetch_job`] but locks the analysis row for the transaction.
pub(crate) async fn fetch_job_for_update<'e, E>(
    executor: E,
    id: Uuid,
) -> Result<Option<JobRow>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let sql = format!(
        "SELECT {JOB_COLUMNS} FROM videos v JOIN analyses a ON a.id = v.id \
         WHERE v.id = $1 FOR UPDATE OF a"
    );
    sqlx::query_as(&sql).bind(id).fetch_optional(executor).await
}

pub(crate) async fn list_jobs<'e, E>(
    executor: E,
    limit: u32,
    offset: u32,
) -> Result<Vec<JobRow>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let sql = format!(
        "SELECT {JOB_COLUMNS} FROM videos v JOIN analyses a ON a.id = v.id \
         ORDER BY v.uploaded_at DESC, v.id LIMIT $1 OFFSET $2"
    );
    sqlx::query_as(&sql)
        .bind(i64::from(limit))
        .bind(i64::from(offset))
        .fetch_all(executor)
        .await
}

pub(crate) async fn update_analysis<'e, E>(executor: E, job: &Job) -> Result<(), sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query(
        r#"
        UPDATE analyses
        SET status = $2, progress = $3, error_message = $4, completed_at = $5
        WHERE id = $1
        "#,
    )
    .bind(job.id.0)
    .bind(job.status.as_str())
    .bind(i32::from(job.progress))
    .bind(&job.error_message)
    .bind(job.completed_at)
    .execute(executor)
    .await?;
    Ok(())
}

pub(crate) async fn update_video_status<'e, E>(
    executor: E,
    id: Uuid,
    status: VideoStatus,
) -> Result<u64, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let result = sqlx::query(
        r#"
        UPDATE videos
        SET status = $2,
            processed_at = CASE WHEN $2 IN ('completed', 'failed') THEN now() ELSE processed_at END
        WHERE id = $1
        "#,
    )
    .bind(id)
    .bind(status.as_str())
    .execute(executor)
    .await?;
    Ok(result.rows_affected())
}

pub(crate) async fn set_duration<'e, E>(executor: E, id: Uuid, seconds: f64) -> Result<u64, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let result = sqlx::query("UPDATE analyses SET total_duration = $2 WHERE id = $1")
        .bind(id)
        .bind(seconds)
        .execute(executor)
        .await?;
    Ok(result.rows_affected())
}

pub(crate) async fn delete_video<'e, E>(executor: E, id: Uuid) -> Result<u64, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let result = sqlx::query("DELETE FROM videos WHERE id = $1")
        .bind(id)
        .execute(executor)
        .await?;
    Ok(result.rows_affected())
}

pub(crate) async fn delete_all<'e, E>(executor: E, table: &'static str) -> Result<u64, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let sql = format!("DELETE FROM {table}");
    let result = sqlx::query(&sql).execute(executor).await?;
    Ok(result.rows_affected())
}

// ============================================================================
// Detail rows
// ============================================================================

pub(crate) async fn insert_emotions<'e, E>(
    executor: E,
    id: Uuid,
    rows: &[EmotionSample],
) -> Result<u64, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let mut builder = QueryBuilder::<Postgres>::new(
        "INSERT INTO emotions (analysis_id, timestamp_secs, emotion, confidence) ",
    );
    builder.push_values(rows, |mut b, row| {
        b.push_bind(id)
            .push_bind(row.timestamp)
            .push_bind(row.emotion.as_str())
            .push_bind(row.confidence);
    });
    Ok(builder.build().execute(executor).await?.rows_affected())
}

pub(crate) async fn insert_gestures<'e, E>(
    executor: E,
    id: Uuid,
    rows: &[GestureSample],
) -> Result<u64, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let mut builder = QueryBuilder::<Postgres>::new(
        "INSERT INTO gestures (analysis_id, timestamp_secs, gesture_type, description, confidence) ",
    );
    builder.push_values(rows, |mut b, row| {
        b.push_bind(id)
            .push_bind(row.timestamp)
            .push_bind(row.kind.as_str())
            .push_bind(row.description.clone())
            .push_bind(row.confidence);
    });
    Ok(builder.build().execute(executor).await?.rows_affected())
}

pub(crate) async fn insert_transcripts<'e, E>(
    executor: E,
    id: Uuid,
    rows: &[TranscriptSegment],
) -> Result<u64, StoreError>
where
    E: Executor<'e, Database = Postgres>,
{
    let indices = rows
        .iter()
        .map(|row| column_int::<i32, _>(row.segment_index, "segment_index"))
        .collect::<Result<Vec<_>, _>>()?;

    let mut builder = QueryBuilder::<Postgres>::new(
        "INSERT INTO transcripts (analysis_id, segment_index, start_time, end_time, text, confidence) ",
    );
    builder.push_values(rows.iter().zip(indices), |mut b, (row, index)| {
        b.push_bind(id)
            .push_bind(index)
            .push_bind(row.start_time)
            .push_bind(row.end_time)
            .push_bind(row.text.clone())
            .push_bind(row.confidence);
    });
    Ok(builder.build().execute(executor).await?.rows_affected())
}

pub(crate) async fn insert_key_moments<'e, E>(
    executor: E,
    id: Uuid,
    rows: &[KeyMoment],
) -> Result<u64, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let mut builder = QueryBuilder::<Postgres>::new(
        "INSERT INTO key_moments (analysis_id, timestamp_secs, description, moment_type) ",
    );
    builder.push_values(rows, |mut b, row| {
        b.push_bind(id)
            .push_bind(row.timestamp)
            .push_bind(row.description.clone())
            .push_bind(row.kind.as_str());
    });
    Ok(builder.build().execute(executor).await?.rows_affected())
}

pub(crate) async fn upsert_insights<'e, E>(
    executor: E,
    id: Uuid,
    insights: &ContentInsights,
) -> Result<(), sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query(
        r#"
        INSERT INTO llm_insights (
            analysis_id, main_topics, rhetorical_techniques, argument_structure,
            persuasive_elements, persuasion_score, overall_tone, transcript_summary
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        ON CONFLICT (analysis_id) DO UPDATE SET
            main_topics = EXCLUDED.main_topics,
            rhetorical_techniques = EXCLUDED.rhetorical_techniques,
            argument_structure = EXCLUDED.argument_structure,
            persuasive_elements = EXCLUDED.persuasive_elements,
            persuasion_score = EXCLUDED.persuasion_score,
            overall_tone = EXCLUDED.overall_tone,
            transcript_summary = EXCLUDED.transcript_summary
        "#,
    )
    .bind(id)
    .bind(Json(insights.main_topics.clone()))
    .bind(Json(insights.rhetorical_techniques.clone()))
    .bind(&insights.argument_structure)
    .bind(Json(insights.persuasive_elements.clone()))
    .bind(insights.persuasion_score)
    .bind(&insights.overall_tone)
    .bind(&insights.transcript_summary)
    .execute(executor)
    .await?;
    Ok(())
}

pub(crate) async fn fetch_emotions<'e, E>(executor: E, id: Uuid) -> Result<Vec<EmotionRow>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(
        r#"
        SELECT timestamp_secs, emotion, confidence FROM emotions
        WHERE analysis_id = $1
        ORDER BY timestamp_secs, id
        "#,
    )
    .bind(id)
    .fetch_all(executor)
    .await
}

pub(crate) async fn fetch_gestures<'e, E>(executor: E, id: Uuid) -> Result<Vec<GestureRow>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(
        r#"
        SELECT timestamp_secs, gesture_type, description, confidence FROM gestures
        WHERE analysis_id = $1
        ORDER BY id
        "#,
    )
    .bind(id)
    .fetch_all(executor)
    .await
}

pub(crate) async fn fetch_transcripts<'e, E>(
    executor: E,
    id: Uuid,
) -> Result<Vec<TranscriptRow>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(
        r#"
        SELECT segment_index, start_time, end_time, text, confidence FROM transcripts
        WHERE analysis_id = $1
        ORDER BY segment_index
        "#,
    )
    .bind(id)
    .fetch_all(executor)
    .await
}

pub(crate) async fn fetch_insights<'e, E>(executor: E, id: Uuid) -> Result<Option<InsightRow>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(
        r#"
        SELECT main_topics, rhetorical_techniques, argument_structure, persuasive_elements,
               persuasion_score, overall_tone, transcript_summary
        FROM llm_insights
        WHERE analysis_id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(executor)
    .await
}

pub(crate) async fn fetch_key_moments<'e, E>(
    executor: E,
    id: Uuid,
) -> Result<Vec<KeyMomentRow>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(
        r#"
        SELECT timestamp_secs, description, moment_type FROM key_moments
        WHERE analysis_id = $1
        ORDER BY timestamp_secs, id
        "#,
    )
    .bind(id)
    .fetch_all(executor)
    .await
}

// ============================================================================
// Search
// ============================================================================

pub(crate) async fn search_by_topic<'e, E>(
    executor: E,
    topic: &str,
    limit: u32,
) -> Result<Vec<MatchRow>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(
        r#"
        SELECT v.id, v.original_filename, a.completed_at,
               i.main_topics, i.persuasion_score, i.overall_tone
        FROM llm_insights i
        JOIN analyses a ON a.id = i.analysis_id
        JOIN videos v ON v.id = a.id
        WHERE EXISTS (
            SELECT 1 FROM jsonb_array_elements_text(i.main_topics) AS t(topic)
            WHERE lower(t.topic) = lower($1)
        )
        AND a.status = 'completed'
        ORDER BY a.completed_at DESC NULLS LAST, v.id
        LIMIT $2
        "#,
    )
    .bind(topic)
    .bind(i64::from(limit))
    .fetch_all(executor)
    .await
}

pub(crate) async fn high_persuasion<'e, E>(
    executor: E,
    min_score: f64,
    limit: u32,
) -> Result<Vec<MatchRow>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(
        r#"
        SELECT v.id, v.original_filename, a.completed_at,
               i.main_topics, i.persuasion_score, i.overall_tone
        FROM llm_insights i
        JOIN analyses a ON a.id = i.analysis_id
        JOIN videos v ON v.id = a.id
        WHERE i.persuasion_score >= $1
          AND a.status = 'completed'
        ORDER BY i.persuasion_score DESC, v.id
        LIMIT $2
        "#,
    )
    .bind(min_score)
    .bind(i64::from(limit))
    .fetch_all(executor)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_int_rejects_out_of_range() {
        assert_eq!(column_int::<i64, _>(2048u64, "file_size").unwrap(), 2048);
        assert_eq!(column_int::<i32, _>(7u32, "segment_index").unwrap(), 7);

        let err = column_int::<i64, _>(u64::MAX, "file_size").unwrap_err();
        assert!(matches!(err, StoreError::Corrupt(_)));
        assert!(err.to_string().contains("file_size out of range"));
        assert!(column_int::<i32, _>(u32::MAX, "segment_index").is_err());
    }
}
