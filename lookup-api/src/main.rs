//! Lookup API Server Entry Point
//!
//! Bootstraps configuration, the registry, the PostgreSQL pool and the
//! snapshot cache, then starts the Axum HTTP server.

use std::sync::Arc;

use axum::Router;
use lookup_api::{
    build_snapshot_cache, create_api_router, load_registry, telemetry::init_tracing, ApiConfig,
    ApiError, ApiResult, AppState, DbConfig, PgLookupSource,
};
use lookup_core::{EngineConfig, LookupError};
use lookup_engine::LookupEngine;

#[tokio::main]
async fn main() -> ApiResult<()> {
    init_tracing()?;

    let api_config = ApiConfig::from_env()?;
    let engine_config = EngineConfig::from_env().map_err(LookupError::from)?;
    let registry = load_registry(&api_config, &engine_config).await?;

    let db_config = DbConfig::from_env();
    let source = Arc::new(PgLookupSource::from_config(&db_config)?);
    let cache = build_snapshot_cache(&api_config)?;

    let engine = Arc::new(LookupEngine::with_cache(
        Arc::new(registry),
        source,
        engine_config,
        cache,
    ));
    let app: Router = create_api_router(AppState::new(engine), &api_config);

    let addr = api_config.bind_addr()?;
    tracing::info!(%addr, "Starting lookup API server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to bind {}: {}", addr, e)))?;

    let server = axum::serve(listener, app);
    tokio::select! {
        result = server => {
            result.map_err(|e| ApiError::internal_error(format!("Server error: {}", e)))?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
    }

    Ok(())
}
