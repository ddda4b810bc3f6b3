//! Timestamped samples produced by the analysis stages.
//!
//! Field names follow the report wire format: sample timestamps serialize as
//! `time` and gesture kinds as `type`.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Seconds assumed for a transcript segment without an end time.
pub const DEFAULT_SEGMENT_SPAN: f64 = 5.0;

/// Emotion labels the detectors can emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Emotion {
    Neutral,
    Happy,
    Serious,
    Passionate,
    Confident,
    Hopeful,
}

impl Emotion {
    pub const ALL: [Emotion; 6] = [
        Emotion::Neutral,
        Emotion::Happy,
        Emotion::Serious,
        Emotion::Passionate,
        Emotion::Confident,
        Emotion::Hopeful,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Emotion::Neutral => "neutral",
            Emotion::Happy => "happy",
            Emotion::Serious => "serious",
            Emotion::Passionate => "passionate",
            Emotion::Confident => "confident",
            Emotion::Hopeful => "hopeful",
        }
    }
}

impl fmt::Display for Emotion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Emotion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Emotion::ALL
            .into_iter()
            .find(|e| e.as_str() == s)
            .ok_or_else(|| format!("unknown emotion: {s}"))
    }
}

/// Gesture categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum GestureKind {
    HandRaise,
    Pointing,
    OpenArms,
    HandGesture,
}

impl GestureKind {
    pub const ALL: [GestureKind; 4] = [
        GestureKind::HandRaise,
        GestureKind::Pointing,
        GestureKind::OpenArms,
        GestureKind::HandGesture,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            GestureKind::HandRaise => "hand_raise",
            GestureKind::Pointing => "pointing",
            GestureKind::OpenArms => "open_arms",
            GestureKind::HandGesture => "hand_gesture",
        }
    }
}

impl fmt::Display for GestureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GestureKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        GestureKind::ALL
            .into_iter()
            .find(|g| g.as_str() == s)
            .ok_or_else(|| format!("unknown gesture type: {s}"))
    }
}

/// One facial-emotion observation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct EmotionSample {
    /// Seconds from the start of the video
    #[serde(rename = "time")]
    pub timestamp: f64,
    pub emotion: Emotion,
    pub confidence: f64,
}

impl EmotionSample {
    pub fn new(timestamp: f64, emotion: Emotion, confidence: f64) -> Self {
        Self {
            timestamp,
            emotion,
            confidence,
        }
    }
}

/// One gesture observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct GestureSample {
    #[serde(rename = "time")]
    pub timestamp: f64,
    #[serde(rename = "type")]
    pub kind: GestureKind,
    pub description: String,
    pub confidence: f64,
}

impl GestureSample {
    pub fn new(
        timestamp: f64,
        kind: GestureKind,
        description: impl Into<String>,
        confidence: f64,
    ) -> Self {
        Self {
            timestamp,
            kind,
            description: description.into(),
            confidence,
        }
    }
}

/// Transcript segment as produced by a transcriber.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RawTranscriptSegment {
    /// Segment start in seconds
    pub time: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<f64>,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

impl RawTranscriptSegment {
    pub fn new(time: f64, text: impl Into<String>) -> Self {
        Self {
            time,
            end_time: None,
            text: text.into(),
            confidence: None,
        }
    }

    pub fn with_end_time(mut self, end_time: f64) -> Self {
        self.end_time = Some(end_time);
        self
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = Some(confidence);
        self
    }
}

/// Persisted transcript segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TranscriptSegment {
    /// Position within the job's transcript; not part of the report format
    #[serde(default, skip_serializing)]
    pub segment_index: u32,
    #[serde(rename = "time")]
    pub start_time: f64,
    pub end_time: f64,
    pub text: String,
    pub confidence: Option<f64>,
}

impl TranscriptSegment {
    /// Number raw segments in order, filling in missing end times.
    pub fn enumerate(raw: &[RawTranscriptSegment]) -> Vec<TranscriptSegment> {
        raw.iter()
            .enumerate()
            .map(|(idx, seg)| TranscriptSegment {
                segment_index: idx as u32,
                start_time: seg.time,
                end_time: seg.end_time.unwrap_or(seg.time + DEFAULT_SEGMENT_SPAN),
                text: seg.text.clone(),
                confidence: seg.confidence,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emotion_sample_wire_format() {
        let sample = EmotionSample::new(3.0, Emotion::Passionate, 0.91);
        let json = serde_json::to_value(sample).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"time": 3.0, "emotion": "passionate", "confidence": 0.91})
        );
    }

    #[test]
    fn test_gesture_sample_wire_format() {
        let sample = GestureSample::new(4.0, GestureKind::OpenArms, "Open arms", 0.88);
        let json = serde_json::to_value(&sample).unwrap();
        assert_eq!(json["type"], "open_arms");
        assert_eq!(json["time"], 4.0);
    }

    #[test]
    fn test_enumerate_defaults_end_time() {
        let raw = vec![
            RawTranscriptSegment::new(0.0, "Hello").with_end_time(2.0),
            RawTranscriptSegment::new(2.0, "world"),
        ];
        let segments = TranscriptSegment::enumerate(&raw);

        assert_eq!(segments[0].segment_index, 0);
        assert_eq!(segments[0].end_time, 2.0);
        assert_eq!(segments[1].segment_index, 1);
        assert_eq!(segments[1].end_time, 7.0);
    }

    #[test]
    fn test_transcript_segment_hides_index() {
        let seg = TranscriptSegment {
            segment_index: 4,
            start_time: 1.0,
            end_time: 2.0,
            text: "hi".into(),
            confidence: None,
        };
        let json = serde_json::to_value(&seg).unwrap();
        assert!(json.get("segment_index").is_none());
        assert_eq!(json["time"], 1.0);
        assert!(json["confidence"].is_null());
    }

    #[test]
    fn test_labels_parse() {
        assert_eq!("hopeful".parse::<Emotion>(), Ok(Emotion::Hopeful));
        assert_eq!("pointing".parse::<GestureKind>(), Ok(GestureKind::Pointing));
        assert!("angry".parse::<Emotion>().is_err());
    }
}
