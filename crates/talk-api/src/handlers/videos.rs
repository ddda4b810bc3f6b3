//! Listing, lookup, deletion and search over analysed videos.

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::info;

use talk_models::{Job, JobId};
use talk_store::InsightMatch;

use crate::error::{ApiError, ApiResult};
use crate::handlers::analysis::load_job;
use crate::state::AppState;
use crate::uploads::remove_upload;

const DEFAULT_LIMIT: u32 = 20;
const MAX_LIMIT: u32 = 100;
const DEFAULT_MIN_SCORE: f64 = 8.0;

#[derive(Debug, Deserialize)]
pub struct ListVideosQuery {
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub topic: Option<String>,
    pub limit: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct TopQuery {
    pub min_score: Option<f64>,
    pub limit: Option<u32>,
}

/// A job record with the public location of its video.
#[derive(Debug, Serialize)]
pub struct VideoResponse {
    #[serde(flatten)]
    pub job: Job,
    pub video_url: String,
}

#[derive(Debug, Serialize)]
pub struct VideoListResponse {
    pub videos: Vec<VideoResponse>,
    pub limit: u32,
    pub offset: u32,
}

#[derive(Debug, Serialize)]
pub struct DeleteVideoResponse {
    pub analysis_id: JobId,
    pub deleted: bool,
}

#[derive(Debug, Serialize)]
pub struct AnalysesResponse {
    pub analyses: Vec<InsightMatch>,
}

fn page_limit(limit: Option<u32>) -> ApiResult<u32> {
    match limit.unwrap_or(DEFAULT_LIMIT) {
        n @ 1..=MAX_LIMIT => Ok(n),
        _ => Err(ApiError::bad_request(format!(
            "limit must be between 1 and {MAX_LIMIT}"
        ))),
    }
}

fn video_response(state: &AppState, job: Job) -> VideoResponse {
    let video_url = state.config.video_url(&job.stored_filename);
    VideoResponse { job, video_url }
}

/// List videos, newest first.
pub async fn list_videos(
    State(state): State<AppState>,
    Query(query): Query<ListVideosQuery>,
) -> ApiResult<Json<VideoListResponse>> {
    let limit = page_limit(query.limit)?;
    let offset = query.offset.unwrap_or(0);
    let videos = state
        .store
        .list_jobs(limit, offset)
        .await?
        .into_iter()
        .map(|job| video_response(&state, job))
        .collect();

    Ok(Json(VideoListResponse {
        videos,
        limit,
        offset,
    }))
}

pub async fn get_video(
    State(state): State<AppState>,
    Path(analysis_id): Path<String>,
) -> ApiResult<Json<VideoResponse>> {
    let job = load_job(&state, &analysis_id).await?;
    Ok(Json(video_response(&state, job)))
}

/// Delete a video, its analysis rows, its uploaded file and its progress log.
///
/// Refused while an unfinished job is queued or running.
pub async fn delete_video(
    State(state): State<AppState>,
    Path(analysis_id): Path<String>,
) -> ApiResult<Json<DeleteVideoResponse>> {
    let job = load_job(&state, &analysis_id).await?;
    if !job.is_terminal() && state.queue.is_in_flight(&job.id) {
        return Err(ApiError::conflict("Analysis is still running"));
    }

    if !state.store.delete_job(&job.id).await? {
        return Err(ApiError::not_found("Analysis not found"));
    }
    remove_upload(&state.config.upload_path(&job.stored_filename)).await;
    state.progress.remove(&job.id);

    info!(job_id = %job.id, "Deleted video");
    Ok(Json(DeleteVideoResponse {
        analysis_id: job.id,
        deleted: true,
    }))
}

/// Completed analyses whose main topics include `topic`.
pub async fn search_analyses(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> ApiResult<Json<AnalysesResponse>> {
    let topic = query
        .topic
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::bad_request("topic is required"))?;
    let limit = page_limit(query.limit)?;

    let analyses = state.store.search_by_topic(topic, limit).await?;
    Ok(Json(AnalysesResponse { analyses }))
}

/// Completed analyses with a persuasion score of at least `min_score`.
pub async fn top_analyses(
    State(state): State<AppState>,
    Query(query): Query<TopQuery>,
) -> ApiResult<Json<AnalysesResponse>> {
    let min_score = query.min_score.unwrap_or(DEFAULT_MIN_SCORE);
    if !(0.0..=10.0).contains(&min_score) {
        return Err(ApiError::bad_request("min_score must be between 0 and 10"));
    }
    let limit = page_limit(query.limit)?;

    let analyses = state.store.high_persuasion(min_score, limit).await?;
    Ok(Json(AnalysesResponse { analyses }))
}
