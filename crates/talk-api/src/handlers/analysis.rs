//! Video submission and result retrieval.

use std::time::Instant;

use axum::extract::{Multipart, Path, State};
use axum::Json;
use serde::Serialize;
use tracing::{info, warn};

use talk_models::{defuse_terminal_markers, Job, JobId, JobStatus, NewJob, Report, VideoStatus};
use talk_queue::AnalyzeVideoJob;

use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::state::AppState;
use crate::uploads::{is_video_content_type, remove_upload, save_field, stored_filename};

/// Multipart field carrying the video.
pub const VIDEO_FIELD: &str = "video";

/// Response to a successful submission.
#[derive(Debug, Serialize)]
pub struct StartAnalysisResponse {
    pub analysis_id: JobId,
    pub status: &'static str,
}

/// Results of an analysis that has not failed.
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ResultsResponse {
    Processing { progress: u8 },
    Completed { data: Report, video_path: String },
}

struct SavedUpload {
    job_id: JobId,
    original_filename: String,
    stored_filename: String,
    size: u64,
}

/// Accept an uploaded video and queue it for analysis.
///
/// The upload is written to disk before the job record is created, so a
/// non-video or oversized upload never leaves a job behind.
pub async fn start_analysis(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<Json<StartAnalysisResponse>> {
    let mut saved = None;

    while let Some(mut field) = multipart.next_field().await? {
        if field.name() != Some(VIDEO_FIELD) {
            continue;
        }
        if !is_video_content_type(field.content_type()) {
            return Err(ApiError::bad_request("File must be a video"));
        }

        let original_filename = field
            .file_name()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or("video")
            .to_string();
        let job_id = JobId::new();
        let stored = stored_filename(&job_id, &original_filename);
        let path = state.config.upload_path(&stored);

        state
            .progress
            .append(&job_id, format!(
                "📹 Uploading video: {}",
                defuse_terminal_markers(&original_filename)
            ));

        let started = Instant::now();
        let size = match save_field(&mut field, &path, state.config.max_upload_size as u64).await {
            Ok(size) => size,
            Err(e) => {
                state.progress.remove(&job_id);
                return Err(e);
            }
        };
        metrics::record_upload(size, started.elapsed().as_secs_f64());
        state.progress.append(&job_id, "✅ Video uploaded successfully");

        saved = Some(SavedUpload {
            job_id,
            original_filename,
            stored_filename: stored,
            size,
        });
        break;
    }

    let Some(upload) = saved else {
        return Err(ApiError::bad_request("No video file provided"));
    };
    let job_id = upload.job_id;
    let path = state.config.upload_path(&upload.stored_filename);

    let new_job = NewJob::new(
        job_id,
        upload.original_filename.clone(),
        upload.stored_filename,
        upload.size,
    );
    if let Err(e) = state.store.create_job(new_job).await {
        state.progress.remove(&job_id);
        remove_upload(&path).await;
        return Err(e.into());
    }

    let job = AnalyzeVideoJob::new(job_id, path).with_original_filename(upload.original_filename);
    if let Err(e) = state.queue.enqueue(job) {
        warn!(job_id = %job_id, "Failed to enqueue analysis job: {}", e);
        reject_job(&state, &job_id, &e.to_string()).await;
        return Err(e.into());
    }

    metrics::record_job_enqueued();
    metrics::set_queue_length(state.queue.len());
    info!(job_id = %job_id, size = upload.size, "Analysis submitted");

    Ok(Json(StartAnalysisResponse {
        analysis_id: job_id,
        status: "processing",
    }))
}

/// Mark a job that could not be queued as failed so it does not sit pending.
async fn reject_job(state: &AppState, job_id: &JobId, reason: &str) {
    let message = format!("Could not queue analysis: {reason}");
    state
        .progress
        .append(job_id, format!("❌ Error processing video: {message}"));
    if let Err(e) = state
        .store
        .update_status(job_id, JobStatus::Failed, None, Some(message))
        .await
    {
        warn!(job_id = %job_id, "Failed to mark rejected job as failed: {}", e);
    }
    if let Err(e) = state
        .store
        .update_video_status(job_id, VideoStatus::Failed)
        .await
    {
        warn!(job_id = %job_id, "Failed to mark rejected video as failed: {}", e);
    }
}

/// Poll an analysis.
///
/// Processing jobs report their progress, failed jobs answer with the stored
/// failure message and completed jobs return the full report.
pub async fn get_results(
    State(state): State<AppState>,
    Path(analysis_id): Path<String>,
) -> ApiResult<Json<ResultsResponse>> {
    let job = load_job(&state, &analysis_id).await?;

    match job.status {
        JobStatus::Failed => Err(ApiError::AnalysisFailed(
            job.error_message
                .unwrap_or_else(|| "Analysis failed".to_string()),
        )),
        JobStatus::Completed => {
            let video_path = state.config.video_url(&job.stored_filename);
            let data = load_report(&state, &job).await?;
            Ok(Json(ResultsResponse::Completed { data, video_path }))
        }
        JobStatus::Pending | JobStatus::Processing => Ok(Json(ResultsResponse::Processing {
            progress: job.progress,
        })),
    }
}

/// Stored report of a completed analysis.
pub async fn get_analysis(
    State(state): State<AppState>,
    Path(analysis_id): Path<String>,
) -> ApiResult<Json<Report>> {
    let job = load_job(&state, &analysis_id).await?;
    if job.status != JobStatus::Completed {
        return Err(ApiError::conflict(format!(
            "Analysis is not completed (status: {})",
            job.status
        )));
    }
    Ok(Json(load_report(&state, &job).await?))
}

pub(crate) async fn load_job(state: &AppState, analysis_id: &str) -> ApiResult<Job> {
    let id = JobId::parse(analysis_id)?;
    state
        .store
        .get_job(&id)
        .await?
        .ok_or_else(|| ApiError::not_found("Analysis not found"))
}

async fn load_report(state: &AppState, job: &Job) -> ApiResult<Report> {
    let report = state
        .store
        .get_report(&job.id)
        .await?
        .ok_or_else(|| ApiError::not_found("Analysis not found"))?;
    Ok(report.with_video_path(state.config.video_url(&job.stored_filename)))
}
