//! Stage adapter interfaces.
//!
//! Each stage is a strategy object constructed once and shared read-only
//! across jobs. Real models can replace the bundled implementations without
//! touching the pipeline.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use talk_models::{ContentInsights, EmotionSample, GestureSample, RawTranscriptSegment};

use crate::error::StageResult;

/// Facial-emotion sampling over a video.
#[async_trait]
pub trait EmotionDetector: Send + Sync {
    fn name(&self) -> &'static str;

    /// Samples at non-negative whole-second timestamps. Fails as a whole;
    /// never returns a partial list.
    async fn detect_emotions(&self, video: &Path) -> StageResult<Vec<EmotionSample>>;
}

/// Gesture classification over a video.
#[async_trait]
pub trait GestureDetector: Send + Sync {
    fn name(&self) -> &'static str;

    async fn detect_gestures(&self, video: &Path) -> StageResult<Vec<GestureSample>>;
}

/// Speech-to-text over a video's audio track.
#[async_trait]
pub trait Transcriber: Send + Sync {
    fn name(&self) -> &'static str;

    /// Segments in chronological order.
    async fn transcribe(&self, video: &Path) -> StageResult<Vec<RawTranscriptSegment>>;
}

/// Rhetorical analysis of a transcript.
#[async_trait]
pub trait ContentAnalyzer: Send + Sync {
    fn name(&self) -> &'static str;

    /// Always returns a usable structure; internal failures produce
    /// [`ContentInsights::fallback`].
    async fn analyze_content(&self, transcript: &[RawTranscriptSegment]) -> ContentInsights;
}

/// Natural-language summary of the whole analysis.
#[async_trait]
pub trait Summarizer: Send + Sync {
    fn name(&self) -> &'static str;

    /// Returns [`talk_models::SUMMARY_FAILED`] instead of failing.
    async fn summarize(
        &self,
        transcript: &[RawTranscriptSegment],
        emotions: &[EmotionSample],
        gestures: &[GestureSample],
    ) -> String;
}

/// One instance of every stage, shared by all jobs.
#[derive(Clone)]
pub struct StageAdapters {
    pub emotions: Arc<dyn EmotionDetector>,
    pub gestures: Arc<dyn GestureDetector>,
    pub transcriber: Arc<dyn Transcriber>,
    pub analyzer: Arc<dyn ContentAnalyzer>,
    pub summarizer: Arc<dyn Summarizer>,
}

impl StageAdapters {
    pub fn new(
        emotions: Arc<dyn EmotionDetector>,
        gestures: Arc<dyn GestureDetector>,
        transcriber: Arc<dyn Transcriber>,
        analyzer: Arc<dyn ContentAnalyzer>,
        summarizer: Arc<dyn Summarizer>,
    ) -> Self {
        Self {
            emotions,
            gestures,
            transcriber,
            analyzer,
            summarizer,
        }
    }

    /// Names of the configured implementations, in pipeline order.
    pub fn names(&self) -> [&'static str; 5] {
        [
            self.emotions.name(),
            self.gestures.name(),
            self.transcriber.name(),
            self.analyzer.name(),
            self.summarizer.name(),
        ]
    }
}

impl std::fmt::Debug for StageAdapters {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}
