//! Speech-to-text via a Whisper-compatible HTTP API.

use std::path::Path;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;
use talk_models::RawTranscriptSegment;
use tracing::{debug, info};

use crate::audio::extract_audio;
use crate::command::FfmpegRunner;
use crate::config::StageConfig;
use crate::error::{StageError, StageResult};
use crate::traits::Transcriber;

/// `verbose_json` transcription response.
#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    #[serde(default)]
    segments: Vec<WhisperSegment>,
}

#[derive(Debug, Deserialize)]
struct WhisperSegment {
    start: f64,
    end: f64,
    text: String,
    #[serde(default)]
    avg_logprob: f64,
}

impl From<WhisperSegment> for RawTranscriptSegment {
    fn from(seg: WhisperSegment) -> Self {
        RawTranscriptSegment::new(seg.start.round(), seg.text.trim())
            .with_end_time(seg.end.round())
            .with_confidence(seg.avg_logprob)
    }
}

/// Parse a `verbose_json` body into transcript segments.
pub fn parse_segments(body: &str) -> StageResult<Vec<RawTranscriptSegment>> {
    let response: TranscriptionResponse = serde_json::from_str(body)?;
    Ok(response.segments.into_iter().map(Into::into).collect())
}

/// Transcriber that extracts audio with FFmpeg and uploads it.
pub struct WhisperApiTranscriber {
    client: Client,
    api_key: Option<String>,
    base_url: String,
    model: String,
    language: String,
    runner: FfmpegRunner,
    work_dir: std::path::PathBuf,
}

impl WhisperApiTranscriber {
    pub fn new(client: Client, config: &StageConfig) -> Self {
        Self {
            client,
            api_key: config.transcribe_api_key.clone(),
            base_url: config.transcribe_base_url.trim_end_matches('/').to_string(),
            model: config.transcribe_model.clone(),
            language: config.transcribe_language.clone(),
            runner: FfmpegRunner::new(config.ffmpeg_timeout),
            work_dir: config.work_dir.clone(),
        }
    }

    /// Transcribe an already extracted audio file.
    pub async fn transcribe_audio(&self, audio: &Path) -> StageResult<Vec<RawTranscriptSegment>> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| StageError::config("TRANSCRIBE_API_KEY not set"))?;

        let bytes = tokio::fs::read(audio).await?;
        let file_name = audio
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "audio.wav".to_string());
        debug!("Uploading {} bytes of audio for transcription", bytes.len());

        let form = Form::new()
            .part("file", Part::bytes(bytes).file_name(file_name).mime_str("audio/wav")?)
            .text("model", self.model.clone())
            .text("language", self.language.clone())
            .text("response_format", "verbose_json")
            .text("timestamp_granularities[]", "segment");

        let url = format!("{}/audio/transcriptions", self.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| StageError::transcription_failed(format!("request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(StageError::transcription_failed(format!(
                "API returned {status}: {error_text}"
            )));
        }

        let body = response.text().await?;
        let segments = parse_segments(&body)
            .map_err(|e| StageError::transcription_failed(format!("bad response: {e}")))?;
        info!("Transcribed {} segments", segments.len());
        Ok(segments)
    }
}

#[async_trait]
impl Transcriber for WhisperApiTranscriber {
    fn name(&self) -> &'static str {
        "whisper-api"
    }

    async fn transcribe(&self, video: &Path) -> StageResult<Vec<RawTranscriptSegment>> {
        tokio::fs::create_dir_all(&self.work_dir).await?;
        // Removed with the extracted audio when dropped.
        let scratch = tempfile::Builder::new()
            .prefix("transcribe-")
            .tempdir_in(&self.work_dir)?;

        let audio = extract_audio(&self.runner, video, scratch.path()).await?;
        self.transcribe_audio(&audio).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const VERBOSE_JSON: &str = r#"{
        "text": "Hello world. Thanks.",
        "segments": [
            {"id": 0, "start": 0.0, "end": 2.4, "text": " Hello world. ", "avg_logprob": -0.21},
            {"id": 1, "start": 2.6, "end": 5.5, "text": "Thanks.", "avg_logprob": -0.35}
        ]
    }"#;

    fn transcriber(base_url: &str, api_key: Option<&str>) -> WhisperApiTranscriber {
        let config = StageConfig {
            transcribe_api_key: api_key.map(String::from),
            transcribe_base_url: base_url.to_string(),
            ..Default::default()
        };
        WhisperApiTranscriber::new(Client::new(), &config)
    }

    fn audio_file() -> tempfile::NamedTempFile {
        let file = tempfile::Builder::new().suffix(".wav").tempfile().unwrap();
        std::fs::write(file.path(), b"RIFF....WAVE").unwrap();
        file
    }

    #[test]
    fn test_parse_segments_rounds_and_trims() {
        let segments = parse_segments(VERBOSE_JSON).unwrap();
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].time, 0.0);
        assert_eq!(segments[0].end_time, Some(2.0));
        assert_eq!(segments[0].text, "Hello world.");
        assert_eq!(segments[0].confidence, Some(-0.21));
        assert_eq!(segments[1].time, 3.0);
        assert_eq!(segments[1].end_time, Some(6.0));
    }

    #[tokio::test]
    async fn test_transcribe_audio_against_api() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/audio/transcriptions"))
            .and(header("authorization", "Bearer test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_string(VERBOSE_JSON))
            .expect(1)
            .mount(&server)
            .await;

        let audio = audio_file();
        let segments = transcriber(&server.uri(), Some("test-key"))
            .transcribe_audio(audio.path())
            .await
            .unwrap();
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[1].text, "Thanks.");
    }

    #[tokio::test]
    async fn test_api_error_is_transcription_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("overloaded"))
            .mount(&server)
            .await;

        let audio = audio_file();
        let err = transcriber(&server.uri(), Some("k"))
            .transcribe_audio(audio.path())
            .await
            .unwrap_err();
        match err {
            StageError::TranscriptionFailed(msg) => assert!(msg.contains("overloaded")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_missing_key_is_config_error() {
        let audio = audio_file();
        let err = transcriber("http://127.0.0.1:9", None)
            .transcribe_audio(audio.path())
            .await
            .unwrap_err();
        assert!(matches!(err, StageError::Config(_)));
    }
}
