//! Multimodal correlation.
//!
//! Folds stage outputs into a [`Report`] and derives key moments. Pure and
//! deterministic; inputs are never modified.

use talk_models::{
    emotional_range, top_themes, total_duration, ContentInsights, EmotionSample, GestureSample,
    KeyMoment, KeyMomentKind, Report, ReportSummary, TranscriptSegment,
};

/// Emotion samples above this confidence become key moments.
///
/// Tuned for the placeholder detectors rather than derived from data.
pub const EMOTION_PEAK_CONFIDENCE: f64 = 0.85;

/// Gestures that become key moments, taken in input order.
///
/// Like [`EMOTION_PEAK_CONFIDENCE`], a placeholder heuristic.
pub const GESTURE_HIGHLIGHT_LIMIT: usize = 3;

/// Key moments in time order.
///
/// Emotion peaks are listed before gestures, so at equal timestamps the
/// stable sort keeps emotion moments first.
pub fn identify_key_moments(
    emotions: &[EmotionSample],
    gestures: &[GestureSample],
) -> Vec<KeyMoment> {
    let mut moments: Vec<KeyMoment> = emotions
        .iter()
        .filter(|e| e.confidence > EMOTION_PEAK_CONFIDENCE)
        .map(|e| {
            KeyMoment::new(
                e.timestamp,
                format!("Peak {} emotion detected", e.emotion),
                KeyMomentKind::Emotion,
            )
        })
        .collect();

    moments.extend(
        gestures
            .iter()
            .take(GESTURE_HIGHLIGHT_LIMIT)
            .map(|g| KeyMoment::new(g.timestamp, g.description.clone(), KeyMomentKind::Gesture)),
    );

    moments.sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));
    moments
}

/// Build the full report for one job.
pub fn correlate(
    emotions: &[EmotionSample],
    gestures: &[GestureSample],
    transcript: &[TranscriptSegment],
    insights: Option<&ContentInsights>,
) -> Report {
    Report {
        emotions: emotions.to_vec(),
        gestures: gestures.to_vec(),
        transcript: transcript.to_vec(),
        llm_insights: insights.cloned(),
        summary: ReportSummary {
            total_duration: total_duration(emotions),
            emotional_range: emotional_range(emotions),
            key_moments: identify_key_moments(emotions, gestures),
            top_themes: top_themes(insights),
        },
        video_path: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use talk_models::{Emotion, GestureKind, RawTranscriptSegment};

    fn gesture(t: f64, kind: GestureKind, desc: &str) -> GestureSample {
        GestureSample::new(t, kind, desc, 0.8)
    }

    #[test]
    fn test_key_moments_example() {
        let emotions = vec![
            EmotionSample::new(1.0, Emotion::Happy, 0.9),
            EmotionSample::new(2.0, Emotion::Serious, 0.5),
        ];
        let gestures = vec![
            gesture(3.0, GestureKind::Pointing, "A"),
            gesture(0.5, GestureKind::HandRaise, "B"),
        ];

        let moments = identify_key_moments(&emotions, &gestures);
        assert_eq!(
            moments,
            vec![
                KeyMoment::new(0.5, "B", KeyMomentKind::Gesture),
                KeyMoment::new(1.0, "Peak happy emotion detected", KeyMomentKind::Emotion),
                KeyMoment::new(3.0, "A", KeyMomentKind::Gesture),
            ]
        );
    }

    #[test]
    fn test_only_first_three_gestures() {
        let gestures: Vec<_> = (0..5)
            .map(|i| gesture(f64::from(10 - i), GestureKind::HandGesture, &format!("g{i}")))
            .collect();

        let moments = identify_key_moments(&[], &gestures);
        let descriptions: Vec<_> = moments.iter().map(|m| m.description.as_str()).collect();
        assert_eq!(descriptions, vec!["g2", "g1", "g0"]);
    }

    #[test]
    fn test_threshold_is_strict() {
        let emotions = vec![EmotionSample::new(1.0, Emotion::Passionate, 0.85)];
        assert!(identify_key_moments(&emotions, &[]).is_empty());
    }

    #[test]
    fn test_emotion_before_gesture_at_same_time() {
        let emotions = vec![EmotionSample::new(4.0, Emotion::Confident, 0.95)];
        let gestures = vec![gesture(4.0, GestureKind::OpenArms, "arms")];

        let moments = identify_key_moments(&emotions, &gestures);
        assert_eq!(moments[0].kind, KeyMomentKind::Emotion);
        assert_eq!(moments[1].kind, KeyMomentKind::Gesture);
    }

    #[test]
    fn test_correlate() {
        let emotions = vec![
            EmotionSample::new(2.0, Emotion::Hopeful, 0.9),
            EmotionSample::new(7.0, Emotion::Hopeful, 0.7),
            EmotionSample::new(5.0, Emotion::Neutral, 0.75),
        ];
        let transcript = TranscriptSegment::enumerate(&[RawTranscriptSegment::new(0.0, "Hi")]);
        let insights = ContentInsights {
            main_topics: vec!["Hope".into(), "Change".into()],
            ..Default::default()
        };
        let before = emotions.clone();

        let report = correlate(&emotions, &[], &transcript, Some(&insights));
        assert_eq!(emotions, before);
        assert_eq!(report.summary.total_duration, 7.0);
        assert_eq!(
            report.summary.emotional_range,
            vec![Emotion::Neutral, Emotion::Hopeful]
        );
        assert_eq!(report.summary.top_themes, vec!["Hope", "Change"]);
        assert_eq!(report.summary.key_moments.len(), 1);
        assert_eq!(report, correlate(&emotions, &[], &transcript, Some(&insights)));

        let bare = correlate(&[], &[], &[], None);
        assert_eq!(bare.summary.total_duration, 0.0);
        assert!(bare.summary.top_themes.is_empty());
        assert!(bare.llm_insights.is_none());
    }
}
