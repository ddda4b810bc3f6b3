//! Uploaded video storage.

use std::path::Path;

use axum::extract::multipart::Field;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use talk_models::JobId;

use crate::error::{ApiError, ApiResult};

const MAX_FILENAME_LEN: usize = 200;
const FALLBACK_FILENAME: &str = "video";

/// Reduce a client-supplied filename to a safe single path component.
///
/// Directory parts are dropped, anything outside `[A-Za-z0-9._-]` becomes
/// `_`, and leading dots are stripped so the result is never hidden or a
/// traversal.
pub fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .take(MAX_FILENAME_LEN)
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        FALLBACK_FILENAME.to_string()
    } else {
        cleaned.to_string()
    }
}

/// Name an upload is stored under.
pub fn stored_filename(job_id: &JobId, original: &str) -> String {
    format!("{}_{}", job_id, sanitize_filename(original))
}

/// Whether a declared content type is a video.
pub fn is_video_content_type(content_type: Option<&str>) -> bool {
    content_type.is_some_and(|ct| ct.trim().to_ascii_lowercase().starts_with("video/"))
}

/// Stream a multipart field to `path`, refusing more than `max_bytes`.
///
/// A partially written file is removed on any failure.
pub async fn save_field(field: &mut Field<'_>, path: &Path, max_bytes: u64) -> ApiResult<u64> {
    let mut file = File::create(path).await?;
    match write_chunks(field, &mut file, max_bytes).await {
        Ok(written) => {
            file.flush().await?;
            debug!(path = %path.display(), bytes = written, "Saved upload");
            Ok(written)
        }
        Err(e) => {
            drop(file);
            remove_upload(path).await;
            Err(e)
        }
    }
}

async fn write_chunks(field: &mut Field<'_>, file: &mut File, max_bytes: u64) -> ApiResult<u64> {
    let mut written: u64 = 0;
    while let Some(chunk) = field.chunk().await? {
        written += chunk.len() as u64;
        if written > max_bytes {
            return Err(ApiError::PayloadTooLarge(format!(
                "Upload exceeds the maximum allowed size of {max_bytes} bytes"
            )));
        }
        file.write_all(&chunk).await?;
    }
    Ok(written)
}

/// Best-effort removal of a stored upload.
pub async fn remove_upload(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!(path = %path.display(), "Removed upload"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), "Failed to remove upload: {}", e),
    }
}
