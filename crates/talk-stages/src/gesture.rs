//! Placeholder gesture detector.
//!
//! Classifies upper-body pose landmarks with simple position rules. Landmarks
//! are synthesized until a pose-estimation model is plugged in.

use std::path::Path;

use async_trait::async_trait;
use rand::Rng;
use talk_models::{GestureKind, GestureSample};
use tracing::info;

use crate::emotion::{rng_for, sample_times};
use crate::error::StageResult;
use crate::probe::probe_video;
use crate::traits::GestureDetector;

/// Seconds between gesture samples.
pub const GESTURE_SAMPLE_SECS: f64 = 2.0;

/// Horizontal wrist distance (normalized) that counts as open arms.
const OPEN_ARMS_SPREAD: f64 = 0.5;

/// Chance that an otherwise neutral pose is an explanatory hand movement.
const HAND_GESTURE_CHANCE: f64 = 0.3;

/// Description and confidence reported for each gesture kind.
pub fn catalog_entry(kind: GestureKind) -> (&'static str, f64) {
    match kind {
        GestureKind::HandRaise => ("Raised hands for emphasis", 0.85),
        GestureKind::Pointing => ("Pointing gesture to audience", 0.80),
        GestureKind::OpenArms => ("Open arms welcoming gesture", 0.88),
        GestureKind::HandGesture => ("Explanatory hand movement", 0.82),
    }
}

/// Normalized image coordinates; `y` grows downward.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Upper-body landmarks used for classification.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PoseLandmarks {
    pub left_wrist: Point,
    pub right_wrist: Point,
    pub left_shoulder: Point,
    pub right_shoulder: Point,
}

impl PoseLandmarks {
    fn random<R: Rng>(rng: &mut R) -> Self {
        let mut point = || Point::new(rng.random::<f64>(), rng.random::<f64>());
        Self {
            left_wrist: point(),
            right_wrist: point(),
            left_shoulder: point(),
            right_shoulder: point(),
        }
    }
}

/// Classify one pose. `roll` in `[0, 1)` decides the fallback hand
/// movement; `None` means no gesture.
pub fn classify_pose(pose: &PoseLandmarks, roll: f64) -> Option<GestureKind> {
    if pose.left_wrist.y < pose.left_shoulder.y || pose.right_wrist.y < pose.right_shoulder.y {
        Some(GestureKind::HandRaise)
    } else if (pose.left_wrist.x - pose.right_wrist.x).abs() > OPEN_ARMS_SPREAD {
        Some(GestureKind::OpenArms)
    } else if roll > 1.0 - HAND_GESTURE_CHANCE {
        Some(GestureKind::HandGesture)
    } else {
        None
    }
}

/// Build a sample for a classified gesture.
pub fn gesture_sample(timestamp: f64, kind: GestureKind) -> GestureSample {
    let (description, confidence) = catalog_entry(kind);
    GestureSample::new(timestamp, kind, description, confidence)
}

/// Rule-based detector over synthetic landmarks.
#[derive(Debug, Clone, Default)]
pub struct PoseGestureDetector {
    seed: Option<u64>,
}

impl PoseGestureDetector {
    pub fn new(seed: Option<u64>) -> Self {
        Self { seed }
    }

    /// Classify a synthetic pose at each timestamp.
    pub fn detect_at(&self, times: &[f64]) -> Vec<GestureSample> {
        // Offset the seed so gestures don't mirror the emotion stream.
        let mut rng = rng_for(self.seed.map(|s| s.wrapping_add(1)));
        times
            .iter()
            .filter_map(|&t| {
                let pose = PoseLandmarks::random(&mut rng);
                classify_pose(&pose, rng.random::<f64>()).map(|kind| gesture_sample(t, kind))
            })
            .collect()
    }
}

#[async_trait]
impl GestureDetector for PoseGestureDetector {
    fn name(&self) -> &'static str {
        "pose-rules"
    }

    async fn detect_gestures(&self, video: &Path) -> StageResult<Vec<GestureSample>> {
        let info = probe_video(video).await?;
        let times = sample_times(info.frame_count(), info.fps, GESTURE_SAMPLE_SECS);
        let gestures = self.detect_at(&times);
        info!("Detected {} gestures in {}", gestures.len(), video.display());
        Ok(gestures)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pose(lw: (f64, f64), rw: (f64, f64), ls: (f64, f64), rs: (f64, f64)) -> PoseLandmarks {
        PoseLandmarks {
            left_wrist: Point::new(lw.0, lw.1),
            right_wrist: Point::new(rw.0, rw.1),
            left_shoulder: Point::new(ls.0, ls.1),
            right_shoulder: Point::new(rs.0, rs.1),
        }
    }

    #[test]
    fn test_hands_above_shoulders() {
        let p = pose((0.4, 0.2), (0.6, 0.8), (0.4, 0.3), (0.6, 0.3));
        assert_eq!(classify_pose(&p, 0.0), Some(GestureKind::HandRaise));
    }

    #[test]
    fn test_open_arms() {
        let p = pose((0.1, 0.7), (0.9, 0.7), (0.4, 0.3), (0.6, 0.3));
        assert_eq!(classify_pose(&p, 0.0), Some(GestureKind::OpenArms));
    }

    #[test]
    fn test_neutral_pose_depends_on_roll() {
        let p = pose((0.45, 0.7), (0.55, 0.7), (0.4, 0.3), (0.6, 0.3));
        assert_eq!(classify_pose(&p, 0.5), None);
        assert_eq!(classify_pose(&p, 0.75), Some(GestureKind::HandGesture));
    }

    #[test]
    fn test_sample_uses_catalog() {
        let sample = gesture_sample(4.0, GestureKind::OpenArms);
        assert_eq!(sample.description, "Open arms welcoming gesture");
        assert_eq!(sample.confidence, 0.88);
    }

    #[test]
    fn test_detect_at_is_seeded_and_ordered() {
        let times: Vec<f64> = (1..=30).map(|k| f64::from(k * 2)).collect();
        let detector = PoseGestureDetector::new(Some(9));
        let a = detector.detect_at(&times);
        assert_eq!(a, detector.detect_at(&times));
        assert!(a.len() <= times.len());
        assert!(a.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
        assert!(a.iter().all(|g| g.kind != GestureKind::Pointing));
    }
}
