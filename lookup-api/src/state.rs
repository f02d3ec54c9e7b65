//! Shared application state for Axum routers.

use std::sync::Arc;
use std::time::Instant;

use lookup_core::EngineConfig;
use lookup_engine::{LookupEngine, LookupOrchestrator};
use lookup_storage::LookupSource;

/// Application-wide state shared across all routes.
#[derive(Clone)]
pub struct AppState {
    /// Batch entry point for lookup requests.
    pub orchestrator: LookupOrchestrator,
    /// Data source, probed by the readiness check.
    pub source: Arc<dyn LookupSource>,
    /// Limits applied when validating request bodies.
    pub engine_config: EngineConfig,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(engine: Arc<LookupEngine>) -> Self {
        Self {
            source: engine.source().clone(),
            engine_config: engine.config().clone(),
            orchestrator: LookupOrchestrator::new(engine),
            start_time: Instant::now(),
        }
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("source", &self.source.source_name())
            .field("engine_config", &self.engine_config)
            .finish()
    }
}
