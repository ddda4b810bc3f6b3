//! Prometheus metrics for the API server.

use std::time::Instant;

use axum::body::Body;
use axum::http::{Request, Response};
use axum::middleware::Next;
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use uuid::Uuid;

/// Install the Prometheus recorder.
/// Returns a handle that can be used to render metrics.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}

/// Metric names as constants for consistency.
pub mod names {
    // HTTP metrics
    pub const HTTP_REQUESTS_TOTAL: &str = "talk_http_requests_total";
    pub const HTTP_REQUEST_DURATION_SECONDS: &str = "talk_http_request_duration_seconds";
    pub const HTTP_REQUESTS_IN_FLIGHT: &str = "talk_http_requests_in_flight";

    // Queue metrics
    pub const QUEUE_LENGTH: &str = "talk_queue_length";
    pub const JOBS_ENQUEUED_TOTAL: &str = "talk_jobs_enqueued_total";

    // Upload metrics
    pub const UPLOAD_BYTES_TOTAL: &str = "talk_upload_bytes_total";
    pub const UPLOAD_DURATION_SECONDS: &str = "talk_upload_duration_seconds";

    // Progress streams
    pub const PROGRESS_STREAMS_TOTAL: &str = "talk_progress_streams_total";

    // Rate limiting metrics
    pub const RATE_LIMIT_HITS_TOTAL: &str = "talk_rate_limit_hits_total";
}

/// Record an HTTP request.
pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    let labels = [
        ("method", method.to_string()),
        ("path", sanitize_path(path)),
        ("status", status.to_string()),
    ];

    counter!(names::HTTP_REQUESTS_TOTAL, &labels).increment(1);
    histogram!(names::HTTP_REQUEST_DURATION_SECONDS, &labels).record(duration_secs);
}

/// Update queue length gauge.
pub fn set_queue_length(length: usize) {
    gauge!(names::QUEUE_LENGTH).set(length as f64);
}

/// Record job enqueued.
pub fn record_job_enqueued() {
    counter!(names::JOBS_ENQUEUED_TOTAL).increment(1);
}

/// Record a finished upload.
pub fn record_upload(bytes: u64, duration_secs: f64) {
    counter!(names::UPLOAD_BYTES_TOTAL).increment(bytes);
    histogram!(names::UPLOAD_DURATION_SECONDS).record(duration_secs);
}

/// Record a progress stream being opened.
pub fn record_progress_stream() {
    counter!(names::PROGRESS_STREAMS_TOTAL).increment(1);
}

/// Record rate limit hit.
pub fn record_rate_limit_hit(endpoint: &str) {
    let labels = [("endpoint", sanitize_path(endpoint))];
    counter!(names::RATE_LIMIT_HITS_TOTAL, &labels).increment(1);
}

/// Sanitize path for metrics labels: IDs and upload names become placeholders.
fn sanitize_path(path: &str) -> String {
    let mut previous = "";
    let segments: Vec<&str> = path
        .split('/')
        .map(|segment| {
            let replaced = if previous == "uploads" && !segment.is_empty() {
                ":file"
            } else if Uuid::parse_str(segment).is_ok()
                || (!segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit()))
            {
                ":id"
            } else {
                segment
            };
            previous = segment;
            replaced
        })
        .collect();
    segments.join("/")
}

/// Metrics middleware for HTTP requests.
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response<Body> {
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let start = Instant::now();

    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).increment(1.0);

    let response = next.run(request).await;

    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).decrement(1.0);

    let status = response.status().as_u16();
    let duration = start.elapsed().as_secs_f64();

    record_http_request(&method, &path, status, duration);

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_path() {
        assert_eq!(
            sanitize_path("/api/results/550e8400-e29b-41d4-a716-446655440000"),
            "/api/results/:id"
        );
        assert_eq!(
            sanitize_path("/uploads/550e8400-e29b-41d4-a716-446655440000_talk.mp4"),
            "/uploads/:file"
        );
        assert_eq!(sanitize_path("/api/videos/42"), "/api/videos/:id");
        assert_eq!(sanitize_path("/api/analyses/top"), "/api/analyses/top");
        assert_eq!(sanitize_path("/"), "/");
    }
}
