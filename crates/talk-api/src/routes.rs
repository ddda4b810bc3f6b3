//! API routes.

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::services::ServeDir;
use tower_http::timeout::TimeoutLayer;

use crate::handlers::{
    delete_video, get_analysis, get_results, get_video, health, list_videos, ready, root,
    search_analyses, start_analysis, stream_progress, top_analyses,
};
use crate::metrics::metrics_middleware;
use crate::middleware::{
    cors_layer, rate_limit_middleware, request_id, request_logging, security_headers,
    RateLimiterCache,
};
use crate::state::AppState;

/// Room for multipart boundaries and part headers on top of the file itself.
const MULTIPART_OVERHEAD: usize = 1024 * 1024;

/// Create the API router.
pub fn create_router(state: AppState, metrics_handle: Option<PrometheusHandle>) -> Router {
    // The upload itself is capped while streaming; this bounds the whole body.
    let upload_routes = Router::new()
        .route("/analyze", post(start_analysis))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(
            state.config.max_upload_size.saturating_add(MULTIPART_OVERHEAD),
        ));

    // Long-lived; no request timeout
    let stream_routes = Router::new().route("/progress/:analysis_id", get(stream_progress));

    let lookup_routes = Router::new()
        .route("/results/:analysis_id", get(get_results))
        .route("/analysis/:analysis_id", get(get_analysis))
        .route("/videos", get(list_videos))
        .route("/videos/:analysis_id", get(get_video).delete(delete_video))
        .route("/analyses/search", get(search_analyses))
        .route("/analyses/top", get(top_analyses))
        .layer(TimeoutLayer::new(state.config.request_timeout));

    let rate_limiter = Arc::new(RateLimiterCache::new(state.config.rate_limit_rps));

    let api_routes = Router::new()
        .merge(upload_routes)
        .merge(stream_routes)
        .merge(lookup_routes)
        .layer(middleware::from_fn_with_state(
            rate_limiter,
            rate_limit_middleware,
        ));

    let health_routes = Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/healthz", get(health))
        .route("/ready", get(ready));

    let metrics_routes = if let Some(handle) = metrics_handle {
        Router::new().route("/metrics", get(move || async move { handle.render() }))
    } else {
        Router::new()
    };

    Router::new()
        .nest("/api", api_routes)
        .nest_service("/uploads", ServeDir::new(&state.config.upload_dir))
        .merge(health_routes)
        .merge(metrics_routes)
        .layer(middleware::from_fn(metrics_middleware))
        .layer(middleware::from_fn(security_headers))
        .layer(middleware::from_fn(request_id))
        .layer(middleware::from_fn(request_logging))
        .layer(cors_layer(&state.config.cors_origins))
        .with_state(state)
}
