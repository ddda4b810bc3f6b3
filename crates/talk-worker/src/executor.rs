//! Job executor.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::FutureExt;
use tokio::sync::{watch, Semaphore};
use tracing::{debug, error, info, warn};

use talk_queue::{Delivery, JobOutcome, JobReceiver};

use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::pipeline::AnalysisPipeline;

/// Pulls jobs off the queue and runs them with bounded concurrency.
pub struct JobExecutor {
    config: WorkerConfig,
    pipeline: Arc<AnalysisPipeline>,
    job_semaphore: Arc<Semaphore>,
    shutdown: watch::Sender<bool>,
}

impl JobExecutor {
    pub fn new(config: WorkerConfig, pipeline: Arc<AnalysisPipeline>) -> Self {
        let job_semaphore = Arc::new(Semaphore::new(config.max_concurrent_jobs.max(1)));
        let (shutdown, _) = watch::channel(false);

        Self {
            config,
            pipeline,
            job_semaphore,
            shutdown,
        }
    }

    pub fn pipeline(&self) -> &Arc<AnalysisPipeline> {
        &self.pipeline
    }

    /// Jobs currently running.
    pub fn active_jobs(&self) -> usize {
        self.config.max_concurrent_jobs.max(1) - self.job_semaphore.available_permits()
    }

    /// Consume jobs until shutdown is signalled or every queue handle is
    /// dropped, then wait (bounded) for running jobs.
    ///
    /// Jobs still queued at shutdown are marked failed so their progress
    /// streams end.
    pub async fn run(&self, mut receiver: JobReceiver) -> WorkerResult<()> {
        info!(
            "Starting job executor with {} max concurrent jobs",
            self.config.max_concurrent_jobs
        );
        tokio::fs::create_dir_all(&self.config.work_dir).await?;

        let mut shutdown_rx = self.shutdown.subscribe();

        loop {
            // Wait for a free slot before taking the next job.
            let permit = tokio::select! {
                _ = shutdown_rx.wait_for(|stop| *stop) => {
                    info!("Shutdown signal received, stopping executor");
                    break;
                }
                permit = self.job_semaphore.clone().acquire_owned() => permit
                    .map_err(|_| WorkerError::job_failed("Semaphore closed"))?,
            };

            let delivery = tokio::select! {
                _ = shutdown_rx.wait_for(|stop| *stop) => {
                    info!("Shutdown signal received, stopping executor");
                    break;
                }
                delivery = receiver.recv() => delivery,
            };

            let Some(delivery) = delivery else {
                info!("Job queue closed, stopping executor");
                break;
            };

            debug!(job_id = %delivery.job_id(), "Dequeued job");
            let pipeline = Arc::clone(&self.pipeline);
            tokio::spawn(async move {
                let _permit = permit;
                Self::execute_job(pipeline, delivery).await;
            });
        }

        receiver.close();
        while let Some(delivery) = receiver.recv().await {
            warn!(job_id = %delivery.job_id(), "Abandoning queued job at shutdown");
            self.pipeline
                .record_failure(&delivery.job_id(), "Server shut down before processing started")
                .await;
            delivery.finish(JobOutcome::Failed("shut down".to_string()));
        }

        info!("Waiting for in-flight jobs to complete...");
        if tokio::time::timeout(self.config.shutdown_timeout, self.wait_for_jobs())
            .await
            .is_err()
        {
            warn!(
                active = self.active_jobs(),
                "Shutdown timeout reached with jobs still running"
            );
        }

        info!("Job executor stopped");
        Ok(())
    }

    /// Run one delivery to completion. Panics inside the pipeline fail the
    /// job instead of taking the executor down.
    async fn execute_job(pipeline: Arc<AnalysisPipeline>, delivery: Delivery) {
        let job = delivery.job().clone();
        let job_id = job.job_id;
        delivery.start();
        info!("Executing job {}", job_id);
        let started = Instant::now();

        let result = AssertUnwindSafe(pipeline.run(&job)).catch_unwind().await;

        let outcome = match result {
            Ok(Ok(())) => {
                info!("Job {} completed in {:?}", job_id, started.elapsed());
                metrics::counter!("talk_jobs_completed_total").increment(1);
                JobOutcome::Completed
            }
            Ok(Err(e)) if !e.fails_job() => {
                warn!("Job {} skipped: {}", job_id, e);
                JobOutcome::Failed(e.to_string())
            }
            Ok(Err(e)) => {
                error!("Job {} failed: {}", job_id, e);
                metrics::counter!("talk_jobs_failed_total").increment(1);
                JobOutcome::Failed(e.to_string())
            }
            Err(_) => {
                error!("Job {} panicked", job_id);
                metrics::counter!("talk_jobs_failed_total").increment(1);
                let message = "Internal error while processing video";
                pipeline.record_failure(&job_id, message).await;
                JobOutcome::Failed(message.to_string())
            }
        };

        delivery.finish(outcome);
    }

    /// Wait for all in-flight jobs to complete.
    async fn wait_for_jobs(&self) {
        while self.active_jobs() > 0 {
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }

    /// Signal shutdown.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
    }
}
