//! Router tests against the in-memory store and fake analysis stages.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use talk_api::{create_router, ApiConfig, AppState};
use talk_models::{
    ContentInsights, Emotion, EmotionSample, GestureKind, GestureSample, JobId, NewJob,
    RawTranscriptSegment,
};
use talk_queue::{JobQueue, ProgressRegistry, QueueConfig};
use talk_stages::{
    ContentAnalyzer, EmotionDetector, GestureDetector, StageAdapters, StageError, StageResult,
    Summarizer, Transcriber,
};
use talk_store::{JobStore, MemoryJobStore};
use talk_worker::{AnalysisPipeline, JobExecutor, WorkerConfig};

const BOUNDARY: &str = "talklens-test-boundary";
const TEST_TIMEOUT: Duration = Duration::from_secs(10);

struct FakeStages {
    transcribe_fails: bool,
}

#[async_trait]
impl EmotionDetector for FakeStages {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn detect_emotions(&self, _video: &Path) -> StageResult<Vec<EmotionSample>> {
        Ok(vec![
            EmotionSample::new(0.0, Emotion::Confident, 0.8),
            EmotionSample::new(1.0, Emotion::Passionate, 0.92),
            EmotionSample::new(2.0, Emotion::Happy, 0.75),
        ])
    }
}

#[async_trait]
impl GestureDetector for FakeStages {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn detect_gestures(&self, _video: &Path) -> StageResult<Vec<GestureSample>> {
        Ok(vec![GestureSample::new(
            2.0,
            GestureKind::OpenArms,
            "Open arms",
            0.8,
        )])
    }
}

#[async_trait]
impl Transcriber for FakeStages {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn transcribe(&self, _video: &Path) -> StageResult<Vec<RawTranscriptSegment>> {
        if self.transcribe_fails {
            return Err(StageError::transcription_failed("audio track is silent"));
        }
        Ok(vec![RawTranscriptSegment::new(0.0, "Cities are for people.")])
    }
}

#[async_trait]
impl ContentAnalyzer for FakeStages {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn analyze_content(&self, _transcript: &[RawTranscriptSegment]) -> ContentInsights {
        ContentInsights {
            main_topics: vec!["Cities".into()],
            persuasion_score: 8.5,
            ..Default::default()
        }
    }
}

#[async_trait]
impl Summarizer for FakeStages {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn summarize(
        &self,
        _transcript: &[RawTranscriptSegment],
        _emotions: &[EmotionSample],
        _gestures: &[GestureSample],
    ) -> String {
        "A talk about cities.".to_string()
    }
}

struct TestApp {
    router: Router,
    store: Arc<dyn JobStore>,
    config: ApiConfig,
    _dir: TempDir,
}

fn test_app(transcribe_fails: bool, max_upload_size: usize) -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let upload_dir = dir.path().join("uploads");
    std::fs::create_dir_all(&upload_dir).unwrap();
    let config = ApiConfig {
        upload_dir,
        public_base_url: "http://talks.test".to_string(),
        max_upload_size,
        metrics_enabled: false,
        ..ApiConfig::default()
    };

    let store: Arc<dyn JobStore> = Arc::new(MemoryJobStore::new());
    let progress = ProgressRegistry::default();
    let (queue, receiver) = JobQueue::new(QueueConfig::default());

    let fake = Arc::new(FakeStages { transcribe_fails });
    let stages = StageAdapters::new(
        fake.clone(),
        fake.clone(),
        fake.clone(),
        fake.clone(),
        fake,
    );
    let pipeline = Arc::new(AnalysisPipeline::new(
        Arc::clone(&store),
        progress.clone(),
        stages,
    ));
    let executor = Arc::new(JobExecutor::new(
        WorkerConfig {
            work_dir: dir.path().join("work"),
            ..WorkerConfig::default()
        },
        pipeline,
    ));
    tokio::spawn(async move { executor.run(receiver).await });

    let router = create_router(
        AppState::new(config.clone(), Arc::clone(&store), queue, progress),
        None,
    );

    TestApp {
        router,
        store,
        config,
        _dir: dir,
    }
}

fn upload_request(field: &str, filename: &str, content_type: &str, data: &[u8]) -> Request<Body> {
    let mut body = format!(
        "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\nContent-Type: {content_type}\r\n\r\n"
    )
    .into_bytes();
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    Request::post("/api/analyze")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

async fn send(app: &TestApp, request: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = tokio::time::timeout(TEST_TIMEOUT, app.router.clone().oneshot(request))
        .await
        .expect("request timed out")
        .unwrap();
    let status = response.status();
    let body = tokio::time::timeout(TEST_TIMEOUT, to_bytes(response.into_body(), usize::MAX))
        .await
        .expect("body timed out")
        .unwrap();
    (status, body.to_vec())
}

async fn send_json(app: &TestApp, request: Request<Body>) -> (StatusCode, Value) {
    let (status, body) = send(app, request).await;
    let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, json)
}

/// Submit a video and follow its progress stream to the end.
async fn submit_and_wait(app: &TestApp, filename: &str) -> (String, Vec<Value>) {
    let request = upload_request("video", filename, "video/mp4", b"fake mp4 bytes");
    let (status, body) = send_json(app, request).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["status"], "processing");
    let id = body["analysis_id"].as_str().unwrap().to_string();

    let (status, stream) = send(app, get(&format!("/api/progress/{id}"))).await;
    assert_eq!(status, StatusCode::OK);
    let events = String::from_utf8(stream)
        .unwrap()
        .lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|data| serde_json::from_str(data.trim_start()).unwrap())
        .collect();
    (id, events)
}

#[tokio::test]
async fn test_banner_and_health() {
    let app = test_app(false, 1024);

    let (status, body) = send_json(&app, get("/")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "running");

    let (status, body) = send_json(&app, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    let (status, body) = send_json(&app, get("/ready")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["checks"]["store"]["detail"], "memory");
}

#[tokio::test]
async fn test_full_analysis_flow() {
    let app = test_app(false, 1024);
    let (id, events) = submit_and_wait(&app, "city talk.mp4").await;

    let messages: Vec<&str> = events.iter().map(|e| e["message"].as_str().unwrap()).collect();
    assert_eq!(messages[0], "📹 Uploading video: city talk.mp4");
    assert_eq!(messages[1], "✅ Video uploaded successfully");
    assert!(messages.contains(&"✅ Transcribed 1 segments"));
    assert_eq!(messages[messages.len() - 2], "✅ Analysis completed successfully!");
    assert_eq!(*messages.last().unwrap(), "DONE");
    for (i, event) in events.iter().enumerate() {
        assert_eq!(event["index"], i);
    }

    let stored = format!("{id}_city_talk.mp4");
    let video_url = format!("http://talks.test/uploads/{stored}");

    let (status, body) = send_json(&app, get(&format!("/api/results/{id}"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "completed");
    assert_eq!(body["video_path"], video_url);
    assert_eq!(body["data"]["emotions"].as_array().unwrap().len(), 3);
    assert_eq!(body["data"]["llm_insights"]["transcript_summary"], "A talk about cities.");
    let moments: Vec<f64> = body["data"]["summary"]["key_moments"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["time"].as_f64().unwrap())
        .collect();
    assert_eq!(moments, vec![1.0, 2.0]);

    let (status, report) = send_json(&app, get(&format!("/api/analysis/{id}"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report, body["data"]);

    let (status, bytes) = send(&app, get(&format!("/uploads/{stored}"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(bytes, b"fake mp4 bytes");

    let (status, body) = send_json(&app, get("/api/videos")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["videos"][0]["id"], id.as_str());
    assert_eq!(body["videos"][0]["status"], "completed");
    assert_eq!(body["videos"][0]["video_url"], video_url);

    let (_, body) = send_json(&app, get("/api/analyses/search?topic=cities")).await;
    assert_eq!(body["analyses"].as_array().unwrap().len(), 1);
    let (_, body) = send_json(&app, get("/api/analyses/top?min_score=9")).await;
    assert!(body["analyses"].as_array().unwrap().is_empty());
    let (_, body) = send_json(&app, get("/api/analyses/top")).await;
    assert_eq!(body["analyses"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_delete_removes_job_and_file() {
    let app = test_app(false, 1024);
    let (id, _) = submit_and_wait(&app, "talk.mp4").await;
    let path = app.config.upload_path(&format!("{id}_talk.mp4"));
    assert!(path.exists());

    let delete = Request::delete(format!("/api/videos/{id}"))
        .body(Body::empty())
        .unwrap();
    let (status, body) = send_json(&app, delete).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["deleted"], true);
    assert!(!path.exists());

    let (status, _) = send_json(&app, get(&format!("/api/results/{id}"))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_failed_analysis_reports_stored_message() {
    let app = test_app(true, 1024);
    let (id, events) = submit_and_wait(&app, "talk.mp4").await;

    let last_message = events[events.len() - 2]["message"].as_str().unwrap();
    assert!(last_message.starts_with("❌ Error processing video: "));

    let (status, body) = send_json(&app, get(&format!("/api/results/{id}"))).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["detail"].as_str().unwrap().contains("audio track is silent"));

    let (status, _) = send_json(&app, get(&format!("/api/analysis/{id}"))).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_non_video_upload_rejected_without_job() {
    let app = test_app(false, 1024);

    let (status, body) =
        send_json(&app, upload_request("video", "notes.txt", "text/plain", b"hello")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "File must be a video");

    let (status, body) =
        send_json(&app, upload_request("attachment", "talk.mp4", "video/mp4", b"x")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "No video file provided");

    assert!(app.store.list_jobs(10, 0).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_oversized_upload_rejected() {
    let app = test_app(false, 8);

    let (status, _) = send_json(
        &app,
        upload_request("video", "talk.mp4", "video/mp4", &[0u8; 64]),
    )
    .await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);

    assert!(app.store.list_jobs(10, 0).await.unwrap().is_empty());
    let leftovers = std::fs::read_dir(&app.config.upload_dir).unwrap().count();
    assert_eq!(leftovers, 0);
}

#[tokio::test]
async fn test_results_while_processing() {
    let app = test_app(false, 1024);
    let id = JobId::new();
    app.store
        .create_job(NewJob::new(id, "talk.mp4", format!("{id}_talk.mp4"), 10))
        .await
        .unwrap();

    let (status, body) = send_json(&app, get(&format!("/api/results/{id}"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, serde_json::json!({"status": "processing", "progress": 0}));

    let (status, _) = send_json(&app, get(&format!("/api/analysis/{id}"))).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_lookup_errors() {
    let app = test_app(false, 1024);

    let (status, body) = send_json(&app, get("/api/results/not-a-uuid")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"].as_str().unwrap().contains("not-a-uuid"));

    let (status, body) = send_json(&app, get(&format!("/api/results/{}", JobId::new()))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["detail"], "Analysis not found");

    let (status, _) = send_json(&app, get("/api/videos?limit=0")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send_json(&app, get("/api/analyses/search")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_request_id_is_propagated() {
    let app = test_app(false, 1024);
    let request = Request::get("/health")
        .header("x-request-id", "req-123")
        .body(Body::empty())
        .unwrap();

    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.headers()["x-request-id"], "req-123");
    assert_eq!(response.headers()["x-content-type-options"], "nosniff");
}
