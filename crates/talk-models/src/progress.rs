//! Progress stream event schema.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Message that closes a progress stream.
pub const DONE_MESSAGE: &str = "DONE";

const TERMINAL_MARKERS: [&str; 2] = ["analysis completed", "error"];

/// One progress message as pushed to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ProgressEvent {
    pub message: String,
    pub index: usize,
}

impl ProgressEvent {
    pub fn new(index: usize, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            index,
        }
    }

    /// Closing event; `index` is the number of messages delivered before it.
    pub fn done(index: usize) -> Self {
        Self::new(index, DONE_MESSAGE)
    }

    pub fn is_terminal(&self) -> bool {
        is_terminal_message(&self.message)
    }
}

/// Whether a progress message ends a job's log (completion or failure).
pub fn is_terminal_message(message: &str) -> bool {
    let lower = message.to_lowercase();
    TERMINAL_MARKERS.iter().any(|marker| lower.contains(marker))
}

/// Make user-supplied text safe to embed in a progress message.
///
/// Every terminal marker inside `text` is broken with a hyphen, so only the
/// messages the pipeline itself emits can end a stream.
pub fn defuse_terminal_markers(text: &str) -> String {
    let mut out = text.to_string();
    for marker in TERMINAL_MARKERS {
        let mut from = 0;
        // ASCII lowercasing keeps byte offsets aligned with `out`.
        while let Some(pos) = out[from..].to_ascii_lowercase().find(marker) {
            let split = from + pos + marker.len() / 2;
            out.insert(split, '-');
            from = split + 1;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_markers() {
        assert!(is_terminal_message("✅ Analysis completed successfully!"));
        assert!(is_terminal_message("❌ Error processing video: boom"));
        assert!(is_terminal_message("ERROR"));
        assert!(!is_terminal_message("✅ AI analysis done"));
        assert!(!is_terminal_message("🎤 Extracting and transcribing audio..."));
    }

    #[test]
    fn test_defuse_terminal_markers() {
        assert_eq!(defuse_terminal_markers("talk.mp4"), "talk.mp4");
        assert_eq!(
            defuse_terminal_markers("Error_handling_ERROR.mp4"),
            "Er-ror_handling_ER-ROR.mp4"
        );
        assert_eq!(
            defuse_terminal_markers("my analysis completed.mov"),
            "my analysis -completed.mov"
        );

        let message = format!(
            "📹 Uploading video: {}",
            defuse_terminal_markers("résumé error Analysis Completed.mp4")
        );
        assert!(!is_terminal_message(&message));
    }

    #[test]
    fn test_done_event() {
        let done = ProgressEvent::done(7);
        assert_eq!(
            serde_json::to_value(&done).unwrap(),
            serde_json::json!({"message": "DONE", "index": 7})
        );
    }
}
