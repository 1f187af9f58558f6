//! Application state.

use std::sync::Arc;
use std::time::Instant;

use mediaforge_catalog::MediaCatalog;
use mediaforge_config::{StorageConfig, WorkflowLibrary};
use mediaforge_progress::ProgressChannel;
use mediaforge_runtime::Orchestrator;

/// Shared state across handlers.
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub progress: Arc<ProgressChannel>,
    pub catalog: Arc<MediaCatalog>,
    pub library: Arc<WorkflowLibrary>,
    pub storage: StorageConfig,
    start_time: Instant,
}

impl AppState {
    pub fn new(
        orchestrator: Arc<Orchestrator>,
        progress: Arc<ProgressChannel>,
        catalog: Arc<MediaCatalog>,
        library: Arc<WorkflowLibrary>,
        storage: StorageConfig,
    ) -> Self {
        Self {
            orchestrator,
            progress,
            catalog,
            library,
            storage,
            start_time: Instant::now(),
        }
    }

    /// Time since the server started.
    pub fn uptime(&self) -> std::time::Duration {
        self.start_time.elapsed()
    }
}
