//! Per-job progress logs with broadcast subscriptions.
//!
//! Each job owns an append-only list of human-readable messages. Appending
//! never blocks on readers; every subscriber replays the log from index 0 and
//! then follows new messages until a terminal message (completion or error)
//! has been delivered.

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use futures_util::stream::{self, Stream};
use talk_models::{JobId, ProgressEvent};
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info};

/// Stream of progress events for one job.
pub type ProgressStream = Pin<Box<dyn Stream<Item = ProgressEvent> + Send>>;

type Log = Arc<watch::Sender<Vec<String>>>;

/// Progress registry configuration.
#[derive(Debug, Clone)]
pub struct ProgressConfig {
    /// How long a new subscriber waits for a job's first message before it
    /// stops counting and simply keeps waiting quietly.
    pub wait_timeout: Duration,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            wait_timeout: Duration::from_secs(10),
        }
    }
}

impl ProgressConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            wait_timeout: std::env::var("PROGRESS_WAIT_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or_else(|| Self::default().wait_timeout),
        }
    }
}

#[derive(Debug)]
struct Inner {
    logs: RwLock<HashMap<JobId, Log>>,
    /// Bumped whenever a job's log is created, to wake waiting subscribers.
    created: watch::Sender<u64>,
    config: ProgressConfig,
}

/// Process-wide registry of job progress logs.
///
/// Entries are created on the first append and live until [`remove`] is
/// called or the process exits. This is a streaming aid, not a durable
/// record.
///
/// [`remove`]: ProgressRegistry::remove
#[derive(Debug, Clone)]
pub struct ProgressRegistry {
    inner: Arc<Inner>,
}

impl Default for ProgressRegistry {
    fn default() -> Self {
        Self::new(ProgressConfig::default())
    }
}

enum Subscription {
    Waiting {
        created: watch::Receiver<u64>,
        deadline: Instant,
        timed_out: bool,
    },
    Streaming {
        log: watch::Receiver<Vec<String>>,
        next: usize,
    },
    Finished,
}

impl ProgressRegistry {
    pub fn new(config: ProgressConfig) -> Self {
        let (created, _) = watch::channel(0);
        Self {
            inner: Arc::new(Inner {
                logs: RwLock::new(HashMap::new()),
                created,
                config,
            }),
        }
    }

    /// Append a message to a job's log, creating the log if needed.
    pub fn append(&self, job_id: &JobId, message: impl Into<String>) {
        let message = message.into();
        info!(job_id = %job_id, "{}", message);

        let (log, is_new) = self.log_or_create(job_id);
        log.send_modify(|messages| messages.push(message));
        if is_new {
            self.inner.created.send_modify(|n| *n = n.wrapping_add(1));
        }
    }

    /// Messages appended so far, or `None` if the job has no log.
    pub fn snapshot(&self, job_id: &JobId) -> Option<Vec<String>> {
        self.log(job_id).map(|log| log.borrow().clone())
    }

    pub fn contains(&self, job_id: &JobId) -> bool {
        self.log(job_id).is_some()
    }

    /// Drop a job's log. Open subscriptions end.
    pub fn remove(&self, job_id: &JobId) -> bool {
        let removed = self
            .inner
            .logs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(job_id)
            .is_some();
        if removed {
            debug!(job_id = %job_id, "Removed progress log");
        }
        removed
    }

    /// Number of jobs with a log.
    pub fn len(&self) -> usize {
        self.inner
            .logs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Follow a job's log from the beginning.
    ///
    /// The stream yields every message in append order and ends right after
    /// a terminal message, or when the log is removed. If the job has no log
    /// yet, the stream waits for one to appear.
    pub fn subscribe(&self, job_id: JobId) -> ProgressStream {
        let state = Subscription::Waiting {
            created: self.inner.created.subscribe(),
            deadline: Instant::now() + self.inner.config.wait_timeout,
            timed_out: false,
        };

        Box::pin(stream::unfold(
            (self.clone(), job_id, state),
            |(registry, job_id, state)| async move {
                let (event, next) = registry.next_event(&job_id, state).await?;
                Some((event, (registry, job_id, next)))
            },
        ))
    }

    async fn next_event(
        &self,
        job_id: &JobId,
        mut state: Subscription,
    ) -> Option<(ProgressEvent, Subscription)> {
        loop {
            state = match state {
                Subscription::Finished => return None,

                Subscription::Waiting {
                    mut created,
                    deadline,
                    timed_out,
                } => {
                    if let Some(log) = self.log(job_id) {
                        Subscription::Streaming {
                            log: log.subscribe(),
                            next: 0,
                        }
                    } else if timed_out {
                        created.changed().await.ok()?;
                        Subscription::Waiting {
                            created,
                            deadline,
                            timed_out,
                        }
                    } else {
                        let timed_out =
                            match tokio::time::timeout_at(deadline, created.changed()).await {
                                Ok(changed) => {
                                    changed.ok()?;
                                    false
                                }
                                Err(_) => {
                                    debug!(job_id = %job_id, "No progress yet, still waiting");
                                    true
                                }
                            };
                        Subscription::Waiting {
                            created,
                            deadline,
                            timed_out,
                        }
                    }
                }

                Subscription::Streaming { mut log, next } => {
                    let message = log.borrow_and_update().get(next).cloned();
                    match message {
                        Some(message) => {
                            let event = ProgressEvent::new(next, message);
                            let state = if event.is_terminal() {
                                Subscription::Finished
                            } else {
                                Subscription::Streaming {
                                    log,
                                    next: next + 1,
                                }
                            };
                            return Some((event, state));
                        }
                        None => {
                            // Err means the log was removed.
                            log.changed().await.ok()?;
                            Subscription::Streaming { log, next }
                        }
                    }
                }
            };
        }
    }

    fn log(&self, job_id: &JobId) -> Option<Log> {
        self.inner
            .logs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(job_id)
            .cloned()
    }

    fn log_or_create(&self, job_id: &JobId) -> (Log, bool) {
        if let Some(log) = self.log(job_id) {
            return (log, false);
        }
        let mut logs = self
            .inner
            .logs
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let mut is_new = false;
        let log = logs
            .entry(*job_id)
            .or_insert_with(|| {
                is_new = true;
                Arc::new(watch::channel(Vec::new()).0)
            })
            .clone();
        (log, is_new)
    }
}
