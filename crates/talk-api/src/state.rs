//! Application state.

use std::sync::Arc;

use talk_queue::{JobQueue, ProgressRegistry};
use talk_store::JobStore;

use crate::config::ApiConfig;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ApiConfig>,
    pub store: Arc<dyn JobStore>,
    pub queue: JobQueue,
    pub progress: ProgressRegistry,
}

impl AppState {
    /// Assemble state from already-built components. The executor that
    /// drains `queue` is owned by the caller.
    pub fn new(
        config: ApiConfig,
        store: Arc<dyn JobStore>,
        queue: JobQueue,
        progress: ProgressRegistry,
    ) -> Self {
        Self {
            config: Arc::new(config),
            store,
            queue,
            progress,
        }
    }
}
