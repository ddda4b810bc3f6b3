//! Language-model content analysis and summaries.
//!
//! Talks to either OpenAI chat completions or Anthropic messages. Both
//! [`ContentAnalyzer`] and [`Summarizer`] degrade to fixed fallbacks instead
//! of failing the job.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use talk_models::{
    ContentInsights, EmotionSample, GestureSample, RawTranscriptSegment, SUMMARY_FAILED,
};
use tracing::{debug, info, warn};

use crate::config::{LlmProvider, StageConfig};
use crate::error::{StageError, StageResult};
use crate::traits::{ContentAnalyzer, Summarizer};

const SYSTEM_PROMPT: &str = "You are an expert in rhetoric and communication analysis.";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const ANALYSIS_MAX_TOKENS: u32 = 2000;
const SUMMARY_MAX_TOKENS: u32 = 1000;
/// Transcript characters included in the summary prompt.
const SUMMARY_TRANSCRIPT_CHARS: usize = 1500;

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

/// OpenAI chat completion request.
#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

/// Anthropic messages request.
#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: String,
}

/// Join segment texts, one per line.
fn full_text(transcript: &[RawTranscriptSegment]) -> String {
    transcript
        .iter()
        .map(|seg| seg.text.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Prompt asking for the structured rhetorical analysis.
pub fn analysis_prompt(transcript: &[RawTranscriptSegment]) -> String {
    format!(
        r#"Analyze the following presentation transcript and provide insights:

TRANSCRIPT:
{}

Please provide a structured analysis covering:

1. Main Topics and Themes (3-5 key topics)
2. Rhetorical Techniques Used (list specific techniques)
3. Argument Structure (how the presentation is organized)
4. Persuasive Elements (what makes it compelling)
5. Persuasion Score (rate 1-10)
6. Overall Tone (describe in one sentence)

Format your response as JSON with these keys:
- main_topics: list of strings
- rhetorical_techniques: list of strings
- argument_structure: string
- persuasive_elements: list of strings
- persuasion_score: number (1-10)
- overall_tone: string
"#,
        full_text(transcript)
    )
}

/// Prompt for the executive summary.
pub fn summary_prompt(
    transcript: &[RawTranscriptSegment],
    emotions: &[EmotionSample],
    gestures: &[GestureSample],
) -> String {
    let text = full_text(transcript);
    let excerpt: String = text.chars().take(SUMMARY_TRANSCRIPT_CHARS).collect();
    let distinct_emotions = talk_models::emotional_range(emotions).len();

    format!(
        r#"Create a brief executive summary of this presentation analysis:

TRANSCRIPT: {excerpt}...

EMOTIONAL JOURNEY: The speaker showed {distinct_emotions} different emotions.

GESTURES: {} significant gestures detected.

Provide a concise one paragraph summary (4-5 sentences) that covers: what the presentation is about, how the speaker delivered it emotionally and physically, and its overall impact.

Write in a clear, professional tone. Keep it brief.
"#,
        gestures.len()
    )
}

/// Remove a surrounding markdown code fence, if any.
pub fn strip_code_fence(text: &str) -> &str {
    let text = text.trim();
    let text = text
        .strip_prefix("```json")
        .or_else(|| text.strip_prefix("```"))
        .unwrap_or(text);
    let text = text.strip_suffix("```").unwrap_or(text);
    text.trim()
}

/// Parse a model answer into insights.
pub fn parse_insights(answer: &str) -> StageResult<ContentInsights> {
    let insights: ContentInsights = serde_json::from_str(strip_code_fence(answer))?;
    Ok(insights.normalized())
}

/// Client for the configured language-model provider.
pub struct LlmAnalyzer {
    client: Client,
    provider: LlmProvider,
    api_key: Option<String>,
    model: String,
    base_url: String,
}

impl LlmAnalyzer {
    pub fn new(client: Client, config: &StageConfig) -> Self {
        info!(
            provider = %config.llm_provider,
            model = %config.llm_model,
            "Initialized LLM analyzer"
        );
        Self {
            client,
            provider: config.llm_provider,
            api_key: config.llm_api_key.clone(),
            model: config.llm_model.clone(),
            base_url: config.llm_base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn provider(&self) -> LlmProvider {
        self.provider
    }

    /// Send one user prompt and return the text answer.
    pub async fn complete(&self, prompt: &str, json: bool, max_tokens: u32) -> StageResult<String> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            StageError::config(format!("no API key configured for {}", self.provider))
        })?;

        match self.provider {
            LlmProvider::OpenAi => self.complete_openai(api_key, prompt, json).await,
            LlmProvider::Anthropic => self.complete_anthropic(api_key, prompt, max_tokens).await,
        }
    }

    async fn complete_openai(&self, api_key: &str, prompt: &str, json: bool) -> StageResult<String> {
        let mut messages = Vec::with_capacity(2);
        if json {
            messages.push(ChatMessage {
                role: "system",
                content: SYSTEM_PROMPT,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: prompt,
        });

        let request = ChatRequest {
            model: &self.model,
            messages,
            response_format: json.then_some(ResponseFormat {
                kind: "json_object",
            }),
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| StageError::llm_failed(format!("OpenAI request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(StageError::llm_failed(format!(
                "OpenAI returned {status}: {error_text}"
            )));
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| StageError::llm_failed(format!("Failed to parse OpenAI response: {e}")))?;

        body.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| StageError::llm_failed("No content in OpenAI response"))
    }

    async fn complete_anthropic(
        &self,
        api_key: &str,
        prompt: &str,
        max_tokens: u32,
    ) -> StageResult<String> {
        let request = MessagesRequest {
            model: &self.model,
            max_tokens,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
        };

        let response = self
            .client
            .post(format!("{}/messages", self.base_url))
            .header("x-api-key", api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&request)
            .send()
            .await
            .map_err(|e| StageError::llm_failed(format!("Anthropic request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(StageError::llm_failed(format!(
                "Anthropic returned {status}: {error_text}"
            )));
        }

        let body: MessagesResponse = response.json().await.map_err(|e| {
            StageError::llm_failed(format!("Failed to parse Anthropic response: {e}"))
        })?;

        body.content
            .into_iter()
            .next()
            .map(|block| block.text)
            .ok_or_else(|| StageError::llm_failed("No content in Anthropic response"))
    }

    async fn try_analyze(&self, transcript: &[RawTranscriptSegment]) -> StageResult<ContentInsights> {
        let prompt = analysis_prompt(transcript);
        debug!("Analyzing content ({} characters)", prompt.len());
        let answer = self.complete(&prompt, true, ANALYSIS_MAX_TOKENS).await?;
        parse_insights(&answer)
    }
}

#[async_trait]
impl ContentAnalyzer for LlmAnalyzer {
    fn name(&self) -> &'static str {
        match self.provider {
            LlmProvider::OpenAi => "openai",
            LlmProvider::Anthropic => "anthropic",
        }
    }

    async fn analyze_content(&self, transcript: &[RawTranscriptSegment]) -> ContentInsights {
        match self.try_analyze(transcript).await {
            Ok(insights) => insights,
            Err(e) => {
                warn!("Content analysis failed, using fallback insights: {}", e);
                ContentInsights::fallback()
            }
        }
    }
}

#[async_trait]
impl Summarizer for LlmAnalyzer {
    fn name(&self) -> &'static str {
        ContentAnalyzer::name(self)
    }

    async fn summarize(
        &self,
        transcript: &[RawTranscriptSegment],
        emotions: &[EmotionSample],
        gestures: &[GestureSample],
    ) -> String {
        let prompt = summary_prompt(transcript, emotions, gestures);
        match self.complete(&prompt, false, SUMMARY_MAX_TOKENS).await {
            Ok(summary) if !summary.trim().is_empty() => summary.trim().to_string(),
            Ok(_) => {
                warn!("Summary generation returned empty text");
                SUMMARY_FAILED.to_string()
            }
            Err(e) => {
                warn!("Summary generation failed: {}", e);
                SUMMARY_FAILED.to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use talk_models::{Emotion, GestureKind};
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn transcript() -> Vec<RawTranscriptSegment> {
        vec![
            RawTranscriptSegment::new(0.0, "We can fix this."),
            RawTranscriptSegment::new(5.0, "Together."),
        ]
    }

    fn analyzer(provider: LlmProvider, base_url: &str, key: Option<&str>) -> LlmAnalyzer {
        let config = StageConfig {
            llm_provider: provider,
            llm_api_key: key.map(String::from),
            llm_model: provider.default_model().to_string(),
            llm_base_url: base_url.to_string(),
            ..Default::default()
        };
        LlmAnalyzer::new(Client::new(), &config)
    }

    #[test]
    fn test_strip_code_fence() {
        assert_eq!(strip_code_fence("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fence("```\n{}\n```"), "{}");
        assert_eq!(strip_code_fence("  {} "), "{}");
    }

    #[test]
    fn test_parse_insights_clamps_score() {
        let insights =
            parse_insights("```json\n{\"main_topics\":[\"Hope\"],\"persuasion_score\":14}\n```")
                .unwrap();
        assert_eq!(insights.main_topics, vec!["Hope"]);
        assert_eq!(insights.persuasion_score, 10.0);
        assert!(parse_insights("not json").is_err());
    }

    #[test]
    fn test_summary_prompt_truncates_transcript() {
        let long = vec![RawTranscriptSegment::new(0.0, "a".repeat(4000))];
        let emotions = vec![
            EmotionSample::new(1.0, Emotion::Happy, 0.8),
            EmotionSample::new(2.0, Emotion::Happy, 0.8),
            EmotionSample::new(3.0, Emotion::Serious, 0.8),
        ];
        let gestures = vec![GestureSample::new(2.0, GestureKind::OpenArms, "x", 0.88)];
        let prompt = summary_prompt(&long, &emotions, &gestures);

        assert!(prompt.contains(&format!("TRANSCRIPT: {}...", "a".repeat(1500))));
        assert!(!prompt.contains(&"a".repeat(1501)));
        assert!(prompt.contains("showed 2 different emotions"));
        assert!(prompt.contains("GESTURES: 1 significant"));
    }

    #[tokio::test]
    async fn test_openai_analysis() {
        let server = MockServer::start().await;
        let answer = r#"{"main_topics":["Climate"],"rhetorical_techniques":[],"argument_structure":"","persuasive_elements":[],"persuasion_score":7,"overall_tone":"Calm"}"#;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"role": "assistant", "content": answer}}]
            })))
            .mount(&server)
            .await;

        let insights = analyzer(LlmProvider::OpenAi, &server.uri(), Some("sk-test"))
            .analyze_content(&transcript())
            .await;
        assert_eq!(insights.main_topics, vec!["Climate"]);
        assert_eq!(insights.persuasion_score, 7.0);
        assert_eq!(insights.overall_tone, "Calm");
    }

    #[tokio::test]
    async fn test_anthropic_summary() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/messages"))
            .and(header("x-api-key", "ak-test"))
            .and(header("anthropic-version", ANTHROPIC_VERSION))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "content": [{"type": "text", "text": "  A hopeful talk.  "}]
            })))
            .mount(&server)
            .await;

        let summary = analyzer(LlmProvider::Anthropic, &server.uri(), Some("ak-test"))
            .summarize(&transcript(), &[], &[])
            .await;
        assert_eq!(summary, "A hopeful talk.");
    }

    #[tokio::test]
    async fn test_failures_use_fallbacks() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let llm = analyzer(LlmProvider::OpenAi, &server.uri(), Some("sk-test"));
        assert_eq!(llm.analyze_content(&transcript()).await, ContentInsights::fallback());
        assert_eq!(llm.summarize(&transcript(), &[], &[]).await, SUMMARY_FAILED);
    }

    #[tokio::test]
    async fn test_missing_key_uses_fallbacks() {
        let llm = analyzer(LlmProvider::Anthropic, "http://127.0.0.1:9", None);
        assert_eq!(llm.analyze_content(&transcript()).await, ContentInsights::fallback());
        assert_eq!(llm.summarize(&transcript(), &[], &[]).await, SUMMARY_FAILED);
    }
}
