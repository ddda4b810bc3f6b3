//! Shared data models for the TalkLens analysis backend.
//!
//! This crate provides Serde-serializable types for:
//! - Jobs (an uploaded video plus its analysis) and their lifecycle rules
//! - Timestamped stage output (emotion, gesture and transcript samples)
//! - Language-model content insights
//! - Correlated reports and key moments
//! - Progress stream events

pub mod insights;
pub mod job;
pub mod progress;
pub mod report;
pub mod samples;

// Re-export common types
pub use insights::{ContentInsights, SUMMARY_FAILED};
pub use job::{
    Job, JobId, JobIdError, JobStatus, JobTransitionError, NewJob, VideoStatus,
};
pub use progress::{defuse_terminal_markers, is_terminal_message, ProgressEvent, DONE_MESSAGE};
pub use report::{
    emotional_range, top_themes, total_duration, KeyMoment, KeyMomentKind, Report, ReportSummary,
};
pub use samples::{
    Emotion, EmotionSample, GestureKind, GestureSample, RawTranscriptSegment, TranscriptSegment,
    DEFAULT_SEGMENT_SPAN,
};
