//! Language-model content insights.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Literal returned by summarizers that could not produce a summary.
pub const SUMMARY_FAILED: &str = "Summary generation failed.";

const MIN_PERSUASION: f64 = 1.0;
const MAX_PERSUASION: f64 = 10.0;

/// Rhetorical analysis of a transcript.
///
/// Missing fields deserialize to neutral defaults so a partial model answer
/// still yields a usable record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ContentInsights {
    #[serde(default)]
    pub main_topics: Vec<String>,

    #[serde(default)]
    pub rhetorical_techniques: Vec<String>,

    #[serde(default)]
    pub argument_structure: String,

    #[serde(default)]
    pub persuasive_elements: Vec<String>,

    #[serde(default = "default_persuasion_score")]
    pub persuasion_score: f64,

    #[serde(default = "default_overall_tone")]
    pub overall_tone: String,

    #[serde(default)]
    pub transcript_summary: String,
}

fn default_persuasion_score() -> f64 {
    5.0
}

fn default_overall_tone() -> String {
    "Neutral".to_string()
}

impl Default for ContentInsights {
    fn default() -> Self {
        Self {
            main_topics: Vec::new(),
            rhetorical_techniques: Vec::new(),
            argument_structure: String::new(),
            persuasive_elements: Vec::new(),
            persuasion_score: default_persuasion_score(),
            overall_tone: default_overall_tone(),
            transcript_summary: String::new(),
        }
    }
}

impl ContentInsights {
    /// Canned analysis returned when the language model is unavailable.
    pub fn fallback() -> Self {
        Self {
            main_topics: vec![
                "Climate change".to_string(),
                "Individual action".to_string(),
                "Hope".to_string(),
            ],
            rhetorical_techniques: vec![
                "Repetition".to_string(),
                "Emotional appeal".to_string(),
                "Data citation".to_string(),
            ],
            argument_structure: "Problem → Evidence → Solution → Call to action".to_string(),
            persuasive_elements: vec![
                "Personal stories".to_string(),
                "Data visualization".to_string(),
                "Emotional connection".to_string(),
            ],
            persuasion_score: 8.0,
            overall_tone: "Urgent yet hopeful with strong call to action".to_string(),
            transcript_summary: String::new(),
        }
    }

    /// Clamp the score into its 1..=10 scale; non-finite scores fall back
    /// to the default.
    pub fn normalized(mut self) -> Self {
        self.persuasion_score = if self.persuasion_score.is_finite() {
            self.persuasion_score.clamp(MIN_PERSUASION, MAX_PERSUASION)
        } else {
            default_persuasion_score()
        };
        self
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.transcript_summary = summary.into();
        self
    }

    /// Case-insensitive topic membership.
    pub fn has_topic(&self, topic: &str) -> bool {
        let topic = topic.to_lowercase();
        self.main_topics.iter().any(|t| t.to_lowercase() == topic)
    }
}
