//! Health check handlers.

use std::time::Instant;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::Serialize;

use crate::state::AppState;

/// Service banner.
#[derive(Serialize)]
pub struct RootResponse {
    pub message: &'static str,
    pub status: &'static str,
    pub version: &'static str,
}

/// Health response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: String,
}

pub async fn root() -> Json<RootResponse> {
    Json(RootResponse {
        message: "TalkLens API",
        status: "running",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Health check endpoint (liveness probe).
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now().to_rfc3339(),
    })
}

/// Readiness check response.
#[derive(Serialize)]
pub struct ReadinessResponse {
    pub status: &'static str,
    pub checks: ReadinessChecks,
}

#[derive(Serialize)]
pub struct ReadinessChecks {
    pub store: Check,
    pub queue: Check,
}

/// Outcome of one dependency probe.
#[derive(Serialize)]
pub struct Check {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl Check {
    fn passed(detail: impl Into<String>) -> Self {
        Self {
            status: "ok",
            error: None,
            latency_ms: None,
            detail: Some(detail.into()),
        }
    }

    fn failed(detail: impl Into<String>, error: impl ToString) -> Self {
        Self {
            status: "error",
            error: Some(error.to_string()),
            latency_ms: None,
            detail: Some(detail.into()),
        }
    }

    fn timed(mut self, started: Instant) -> Self {
        self.latency_ms = Some(started.elapsed().as_millis() as u64);
        self
    }

    fn is_ok(&self) -> bool {
        self.status == "ok"
    }
}

/// Readiness probe: the job store answers and the executor still drains
/// the queue.
pub async fn ready(
    State(state): State<AppState>,
) -> Result<Json<ReadinessResponse>, (StatusCode, Json<ReadinessResponse>)> {
    let backend = state.store.backend();
    let started = Instant::now();
    let store = match state.store.ping().await {
        Ok(()) => Check::passed(backend).timed(started),
        Err(e) => Check::failed(backend, e),
    };

    let waiting = format!("{}/{} waiting", state.queue.len(), state.queue.capacity());
    let queue = if state.queue.is_closed() {
        Check::failed(waiting, "job queue is closed")
    } else {
        Check::passed(waiting)
    };

    let ready = store.is_ok() && queue.is_ok();
    let response = ReadinessResponse {
        status: if ready { "ready" } else { "degraded" },
        checks: ReadinessChecks { store, queue },
    };

    if ready {
        Ok(Json(response))
    } else {
        Err((StatusCode::SERVICE_UNAVAILABLE, Json(response)))
    }
}
