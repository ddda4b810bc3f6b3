//! Correlated analysis report.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::{ContentInsights, Emotion, EmotionSample, GestureSample, TranscriptSegment};

/// Origin of a key moment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum KeyMomentKind {
    Emotion,
    Gesture,
    Combined,
}

impl KeyMomentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyMomentKind::Emotion => "emotion",
            KeyMomentKind::Gesture => "gesture",
            KeyMomentKind::Combined => "combined",
        }
    }
}

impl std::str::FromStr for KeyMomentKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "emotion" => Ok(KeyMomentKind::Emotion),
            "gesture" => Ok(KeyMomentKind::Gesture),
            "combined" => Ok(KeyMomentKind::Combined),
            other => Err(format!("unknown key moment type: {other}")),
        }
    }
}

/// A highlighted point in the talk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct KeyMoment {
    #[serde(rename = "time")]
    pub timestamp: f64,
    pub description: String,
    #[serde(rename = "type")]
    pub kind: KeyMomentKind,
}

impl KeyMoment {
    pub fn new(timestamp: f64, description: impl Into<String>, kind: KeyMomentKind) -> Self {
        Self {
            timestamp,
            description: description.into(),
            kind,
        }
    }
}

/// Derived summary block of a report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ReportSummary {
    pub total_duration: f64,
    pub emotional_range: Vec<Emotion>,
    pub key_moments: Vec<KeyMoment>,
    pub top_themes: Vec<String>,
}

/// Full analysis result for one job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Report {
    pub emotions: Vec<EmotionSample>,
    pub gestures: Vec<GestureSample>,
    pub transcript: Vec<TranscriptSegment>,
    pub llm_insights: Option<ContentInsights>,
    pub summary: ReportSummary,
    /// Public location of the uploaded video
    #[serde(default)]
    pub video_path: Option<String>,
}

impl Report {
    pub fn with_video_path(mut self, path: impl Into<String>) -> Self {
        self.video_path = Some(path.into());
        self
    }
}

/// Largest emotion timestamp, or 0 when there are no samples.
pub fn total_duration(emotions: &[EmotionSample]) -> f64 {
    emotions
        .iter()
        .map(|e| e.timestamp)
        .fold(None, |max: Option<f64>, t| Some(max.map_or(t, |m| m.max(t))))
        .unwrap_or(0.0)
}

/// Distinct emotion labels, each listed once in label order.
pub fn emotional_range(emotions: &[EmotionSample]) -> Vec<Emotion> {
    emotions
        .iter()
        .map(|e| e.emotion)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Main topics of the insights, or nothing.
pub fn top_themes(insights: Option<&ContentInsights>) -> Vec<String> {
    insights.map(|i| i.main_topics.clone()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_duration() {
        assert_eq!(total_duration(&[]), 0.0);
        let emotions = vec![
            EmotionSample::new(4.0, Emotion::Happy, 0.8),
            EmotionSample::new(9.0, Emotion::Serious, 0.8),
            EmotionSample::new(2.0, Emotion::Happy, 0.8),
        ];
        assert_eq!(total_duration(&emotions), 9.0);
    }

    #[test]
    fn test_emotional_range_deduplicates() {
        let emotions = vec![
            EmotionSample::new(1.0, Emotion::Hopeful, 0.8),
            EmotionSample::new(2.0, Emotion::Happy, 0.8),
            EmotionSample::new(3.0, Emotion::Hopeful, 0.9),
            EmotionSample::new(4.0, Emotion::Happy, 0.7),
        ];
        assert_eq!(
            emotional_range(&emotions),
            vec![Emotion::Happy, Emotion::Hopeful]
        );
    }

    #[test]
    fn test_top_themes() {
        assert!(top_themes(None).is_empty());
        let insights = ContentInsights::fallback();
        assert_eq!(top_themes(Some(&insights)), insights.main_topics);
    }

    #[test]
    fn test_key_moment_wire_format() {
        let moment = KeyMoment::new(1.5, "Peak happy emotion detected", KeyMomentKind::Emotion);
        let json = serde_json::to_value(&moment).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"time": 1.5, "description": "Peak happy emotion detected", "type": "emotion"})
        );
    }
}
