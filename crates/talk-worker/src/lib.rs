//! Analysis worker.
//!
//! This crate provides:
//! - The pipeline orchestrator that runs a job's stages in order
//! - The correlator that derives key moments and report summaries
//! - A job executor with bounded concurrency and graceful shutdown
//! - Structured job logging

pub mod config;
pub mod correlator;
pub mod error;
pub mod executor;
pub mod logging;
pub mod pipeline;

pub use config::WorkerConfig;
pub use correlator::{
    correlate, identify_key_moments, EMOTION_PEAK_CONFIDENCE, GESTURE_HIGHLIGHT_LIMIT,
};
pub use error::{WorkerError, WorkerResult};
pub use executor::JobExecutor;
pub use logging::JobLogger;
pub use pipeline::{AnalysisPipeline, COMPLETED_MESSAGE, FAILED_PREFIX};
