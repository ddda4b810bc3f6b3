//! HTTP API for submitting talk videos and reading their analyses.
//!
//! This crate provides:
//! - Multipart upload and job submission
//! - Server-sent progress streams
//! - Result, report, listing and search endpoints
//! - Static serving of uploaded videos

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod state;
pub mod uploads;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
