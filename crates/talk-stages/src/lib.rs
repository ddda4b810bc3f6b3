//! Analysis stages for TalkLens.
//!
//! This crate provides:
//! - Stage adapter traits consumed by the pipeline
//! - FFprobe/FFmpeg helpers and audio extraction
//! - Placeholder emotion and gesture detectors
//! - Whisper-compatible speech-to-text client
//! - OpenAI/Anthropic content analysis and summaries

pub mod audio;
pub mod command;
pub mod config;
pub mod emotion;
pub mod error;
pub mod gesture;
pub mod llm;
pub mod probe;
pub mod traits;
pub mod transcribe;

use std::sync::Arc;

pub use audio::extract_audio;
pub use command::{FfmpegCommand, FfmpegRunner};
pub use config::{LlmProvider, StageConfig};
pub use emotion::SampledEmotionDetector;
pub use error::{StageError, StageResult};
pub use gesture::PoseGestureDetector;
pub use llm::LlmAnalyzer;
pub use probe::{probe_video, VideoInfo};
pub use traits::{
    ContentAnalyzer, EmotionDetector, GestureDetector, StageAdapters, Summarizer, Transcriber,
};
pub use transcribe::WhisperApiTranscriber;

impl StageAdapters {
    /// Build the bundled implementations from configuration.
    ///
    /// One language-model client serves both analysis and summaries.
    pub fn from_config(config: &StageConfig) -> StageResult<Self> {
        let llm_client = reqwest::Client::builder()
            .timeout(config.llm_timeout)
            .build()?;
        let transcribe_client = reqwest::Client::builder()
            .timeout(config.transcribe_timeout)
            .build()?;

        if config.llm_api_key.is_none() {
            tracing::warn!(
                provider = %config.llm_provider,
                "No LLM API key configured; content analysis will use fallback insights"
            );
        }

        let llm = Arc::new(LlmAnalyzer::new(llm_client, config));
        Ok(Self::new(
            Arc::new(SampledEmotionDetector::new(config.detector_seed)),
            Arc::new(PoseGestureDetector::new(config.detector_seed)),
            Arc::new(WhisperApiTranscriber::new(transcribe_client, config)),
            llm.clone(),
            llm,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_config_names() {
        let adapters = StageAdapters::from_config(&StageConfig::default()).unwrap();
        assert_eq!(
            adapters.names(),
            ["sampled-emotions", "pose-rules", "whisper-api", "openai", "openai"]
        );
    }
}
