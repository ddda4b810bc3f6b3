//! Placeholder facial-emotion detector.
//!
//! Samples the video once per second and assigns each sample a random
//! emotion label. Stands in for a real recognition model behind
//! [`EmotionDetector`].

use std::path::Path;

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use talk_models::{Emotion, EmotionSample};
use tracing::info;

use crate::error::StageResult;
use crate::probe::probe_video;
use crate::traits::EmotionDetector;

/// Seconds between emotion samples.
pub const EMOTION_SAMPLE_SECS: f64 = 1.0;

const MIN_CONFIDENCE: f64 = 0.70;
const MAX_CONFIDENCE: f64 = 0.95;

/// Whole-second timestamps of sampled frames.
///
/// Every `floor(fps * every_secs)`-th frame is sampled, counting frames from
/// one, and its time is rounded to the nearest second.
pub fn sample_times(frame_count: u64, fps: f64, every_secs: f64) -> Vec<f64> {
    if fps <= 0.0 || !fps.is_finite() {
        return Vec::new();
    }
    let step = ((fps * every_secs).floor() as u64).max(1);
    (1..=frame_count / step)
        .map(|k| ((k * step) as f64 / fps).round())
        .collect()
}

/// Round to two decimals.
pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Draw one random emotion per timestamp.
pub fn sample_emotions<R: Rng>(times: &[f64], rng: &mut R) -> Vec<EmotionSample> {
    times
        .iter()
        .map(|&t| {
            let emotion = Emotion::ALL[rng.random_range(0..Emotion::ALL.len())];
            let confidence = round2(rng.random_range(MIN_CONFIDENCE..=MAX_CONFIDENCE));
            EmotionSample::new(t, emotion, confidence)
        })
        .collect()
}

pub(crate) fn rng_for(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    }
}

/// Random-label emotion detector.
#[derive(Debug, Clone, Default)]
pub struct SampledEmotionDetector {
    seed: Option<u64>,
}

impl SampledEmotionDetector {
    /// A fixed seed makes every run produce the same labels.
    pub fn new(seed: Option<u64>) -> Self {
        Self { seed }
    }
}

#[async_trait]
impl EmotionDetector for SampledEmotionDetector {
    fn name(&self) -> &'static str {
        "sampled-emotions"
    }

    async fn detect_emotions(&self, video: &Path) -> StageResult<Vec<EmotionSample>> {
        let info = probe_video(video).await?;
        let times = sample_times(info.frame_count(), info.fps, EMOTION_SAMPLE_SECS);
        let samples = sample_emotions(&times, &mut rng_for(self.seed));
        info!("Detected {} emotion samples in {}", samples.len(), video.display());
        Ok(samples)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_times_once_per_second() {
        assert_eq!(sample_times(90, 30.0, 1.0), vec![1.0, 2.0, 3.0]);
        assert_eq!(sample_times(29, 30.0, 1.0), Vec::<f64>::new());
        assert!(sample_times(100, 0.0, 1.0).is_empty());
    }

    #[test]
    fn test_sample_times_fractional_fps() {
        // floor(29.97) = 29 frames per sample, so times drift slightly early
        let times = sample_times(300, 29.97, 1.0);
        assert_eq!(times.len(), 10);
        assert_eq!(times[0], 1.0);
        assert!(times.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_sample_emotions_ranges() {
        let times: Vec<f64> = (1..=50).map(f64::from).collect();
        let samples = sample_emotions(&times, &mut rng_for(Some(7)));
        assert_eq!(samples.len(), 50);
        for (sample, t) in samples.iter().zip(&times) {
            assert_eq!(sample.timestamp, *t);
            assert!((MIN_CONFIDENCE..=MAX_CONFIDENCE).contains(&sample.confidence));
            assert_eq!(sample.confidence, round2(sample.confidence));
        }
    }

    #[test]
    fn test_seed_is_deterministic() {
        let times = [1.0, 2.0, 3.0, 4.0];
        let a = sample_emotions(&times, &mut rng_for(Some(42)));
        let b = sample_emotions(&times, &mut rng_for(Some(42)));
        assert_eq!(a, b);
    }
}
