//! Analyze one local video and print the report as JSON.
//!
//! Usage: `talk-analyze <video>`

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use talk_models::{JobId, NewJob};
use talk_queue::{AnalyzeVideoJob, ProgressRegistry};
use talk_stages::{StageAdapters, StageConfig};
use talk_store::{JobStore, MemoryJobStore};
use talk_worker::AnalysisPipeline;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install rustls crypto provider"))?;

    dotenvy::dotenv().ok();

    // Logs go to stderr so stdout carries only the report.
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("talk=info"));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(env_filter)
        .init();

    let Some(video) = std::env::args_os().nth(1).map(PathBuf::from) else {
        bail!("usage: talk-analyze <video>");
    };
    if !video.is_file() {
        bail!("no such file: {}", video.display());
    }
    let size = tokio::fs::metadata(&video).await?.len();

    let stages = StageAdapters::from_config(&StageConfig::from_env())
        .context("failed to build stage adapters")?;
    let store: Arc<dyn JobStore> = Arc::new(MemoryJobStore::new());
    let pipeline = AnalysisPipeline::new(Arc::clone(&store), ProgressRegistry::default(), stages);

    let job_id = JobId::new();
    let file_name = video
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    store
        .create_job(NewJob::new(job_id, file_name.clone(), file_name, size))
        .await?;

    pipeline
        .run(&AnalyzeVideoJob::new(job_id, &video))
        .await
        .context("analysis failed")?;

    let report = store
        .get_report(&job_id)
        .await?
        .context("report missing after analysis")?
        .with_video_path(video.to_string_lossy());
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
