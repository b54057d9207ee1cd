//! Application state for the HTTP server.

use std::sync::Arc;

use crate::db::FullRepository;
use crate::services::ScheduleOrchestrator;

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: ScheduleOrchestrator,
}

impl AppState {
    pub fn new(orchestrator: ScheduleOrchestrator) -> Self {
        Self { orchestrator }
    }

    pub fn repository(&self) -> &Arc<dyn FullRepository> {
        self.orchestrator.repository()
    }
}
