//! Stage adapter configuration.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Language-model vendor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LlmProvider {
    #[default]
    OpenAi,
    Anthropic,
}

impl LlmProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            LlmProvider::OpenAi => "openai",
            LlmProvider::Anthropic => "anthropic",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            LlmProvider::OpenAi => "gpt-4-turbo-preview",
            LlmProvider::Anthropic => "claude-3-5-sonnet-20241022",
        }
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            LlmProvider::OpenAi => "https://api.openai.com/v1",
            LlmProvider::Anthropic => "https://api.anthropic.com/v1",
        }
    }

    fn api_key_var(&self) -> &'static str {
        match self {
            LlmProvider::OpenAi => "OPENAI_API_KEY",
            LlmProvider::Anthropic => "ANTHROPIC_API_KEY",
        }
    }
}

impl fmt::Display for LlmProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LlmProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Ok(LlmProvider::OpenAi),
            "anthropic" => Ok(LlmProvider::Anthropic),
            other => Err(format!("unknown LLM provider: {other}")),
        }
    }
}

/// Settings for every stage adapter.
#[derive(Clone)]
pub struct StageConfig {
    pub llm_provider: LlmProvider,
    pub llm_api_key: Option<String>,
    pub llm_model: String,
    pub llm_base_url: String,
    pub llm_timeout: Duration,

    pub transcribe_api_key: Option<String>,
    pub transcribe_base_url: String,
    pub transcribe_model: String,
    pub transcribe_language: String,
    pub transcribe_timeout: Duration,

    /// Upper bound for a single FFmpeg run
    pub ffmpeg_timeout: Duration,
    /// Fixed seed for the placeholder detectors
    pub detector_seed: Option<u64>,
    /// Scratch space for extracted audio
    pub work_dir: PathBuf,
}

impl fmt::Debug for StageConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StageConfig")
            .field("llm_provider", &self.llm_provider)
            .field("llm_api_key", &self.llm_api_key.as_ref().map(|_| "***"))
            .field("llm_model", &self.llm_model)
            .field("llm_base_url", &self.llm_base_url)
            .field("transcribe_api_key", &self.transcribe_api_key.as_ref().map(|_| "***"))
            .field("transcribe_base_url", &self.transcribe_base_url)
            .field("transcribe_model", &self.transcribe_model)
            .field("detector_seed", &self.detector_seed)
            .field("work_dir", &self.work_dir)
            .finish()
    }
}

impl Default for StageConfig {
    fn default() -> Self {
        let provider = LlmProvider::default();
        Self {
            llm_provider: provider,
            llm_api_key: None,
            llm_model: provider.default_model().to_string(),
            llm_base_url: provider.default_base_url().to_string(),
            llm_timeout: Duration::from_secs(120),
            transcribe_api_key: None,
            transcribe_base_url: LlmProvider::OpenAi.default_base_url().to_string(),
            transcribe_model: "whisper-1".to_string(),
            transcribe_language: "en".to_string(),
            transcribe_timeout: Duration::from_secs(600),
            ffmpeg_timeout: Duration::from_secs(600),
            detector_seed: None,
            work_dir: std::env::temp_dir().join("talklens"),
        }
    }
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_secs(key: &str) -> Option<Duration> {
    env_string(key)
        .and_then(|s| s.parse().ok())
        .map(Duration::from_secs)
}

impl StageConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let provider = env_string("LLM_PROVIDER")
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.llm_provider);

        Self {
            llm_provider: provider,
            llm_api_key: env_string(provider.api_key_var()),
            llm_model: env_string("LLM_MODEL").unwrap_or_else(|| provider.default_model().to_string()),
            llm_base_url: env_string("LLM_BASE_URL")
                .unwrap_or_else(|| provider.default_base_url().to_string()),
            llm_timeout: env_secs("LLM_TIMEOUT_SECS").unwrap_or(defaults.llm_timeout),
            transcribe_api_key: env_string("TRANSCRIBE_API_KEY")
                .or_else(|| env_string("OPENAI_API_KEY")),
            transcribe_base_url: env_string("TRANSCRIBE_BASE_URL")
                .unwrap_or(defaults.transcribe_base_url),
            transcribe_model: env_string("TRANSCRIBE_MODEL").unwrap_or(defaults.transcribe_model),
            transcribe_language: env_string("TRANSCRIBE_LANGUAGE")
                .unwrap_or(defaults.transcribe_language),
            transcribe_timeout: env_secs("TRANSCRIBE_TIMEOUT_SECS")
                .unwrap_or(defaults.transcribe_timeout),
            ffmpeg_timeout: env_secs("FFMPEG_TIMEOUT_SECS").unwrap_or(defaults.ffmpeg_timeout),
            detector_seed: env_string("EMOTION_SEED").and_then(|s| s.parse().ok()),
            work_dir: env_string("WORKER_WORK_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.work_dir),
        }
    }
}
