//! Axum API server binary.
//!
//! Runs the HTTP API and the analysis executor in one process.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use talk_api::{create_router, metrics, ApiConfig, AppState};
use talk_queue::{JobQueue, ProgressConfig, ProgressRegistry, QueueConfig};
use talk_stages::{StageAdapters, StageConfig};
use talk_store::{open_store, StoreConfig};
use talk_worker::{AnalysisPipeline, JobExecutor, WorkerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Required for rustls 0.23+
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install rustls crypto provider"))?;

    init_tracing()?;

    info!("Starting talk-api");

    let config = ApiConfig::from_env();
    info!("API config: host={}, port={}", config.host, config.port);

    tokio::fs::create_dir_all(&config.upload_dir)
        .await
        .with_context(|| format!("creating upload dir {}", config.upload_dir.display()))?;

    let store = open_store(&StoreConfig::from_env())
        .await
        .context("opening job store")?;
    let stages = StageAdapters::from_config(&StageConfig::from_env())
        .context("building stage adapters")?;
    let progress = ProgressRegistry::new(ProgressConfig::from_env());
    let (queue, receiver) = JobQueue::new(QueueConfig::from_env());

    let pipeline = Arc::new(AnalysisPipeline::new(
        Arc::clone(&store),
        progress.clone(),
        stages,
    ));
    let executor = Arc::new(JobExecutor::new(WorkerConfig::from_env(), pipeline));
    let executor_task = tokio::spawn({
        let executor = Arc::clone(&executor);
        async move {
            if let Err(e) = executor.run(receiver).await {
                error!("Job executor stopped: {}", e);
            }
        }
    });

    let metrics_handle = if config.metrics_enabled {
        info!("Prometheus metrics enabled at /metrics");
        Some(metrics::init_metrics().context("installing Prometheus recorder")?)
    } else {
        None
    };

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .context("invalid bind address")?;

    let state = AppState::new(config, store, queue, progress);
    let app = create_router(state, metrics_handle);

    info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("HTTP server stopped, draining jobs");
    executor.shutdown();
    if let Err(e) = executor_task.await {
        error!("Job executor task panicked: {}", e);
    }

    info!("Server shutdown complete");
    Ok(())
}

fn init_tracing() -> anyhow::Result<()> {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let env_filter = EnvFilter::from_default_env().add_directive("talk=info".parse()?);

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Received shutdown signal");
}
