//! Lookup API - HTTP Surface and PostgreSQL Source
//!
//! Serves the batched lookup endpoint over axum and provides the
//! PostgreSQL [`lookup_storage::LookupSource`] the engine reads from.
//! Table and column names reach SQL only as validated identifiers from the
//! registry; every request value is a bound parameter.

pub mod config;
pub mod db;
pub mod error;
pub mod routes;
pub mod sql;
pub mod state;
pub mod telemetry;
pub mod validation;

use std::sync::Arc;
use std::time::Duration;

use lookup_core::{EngineConfig, LookupError, LookupRegistry};
use lookup_storage::{CacheConfig, HybridCache, LmdbSharedCache, LookupSnapshot};

pub use config::ApiConfig;
pub use db::{DbConfig, PgLookupSource};
pub use error::{ApiError, ApiResult, ErrorCode};
pub use routes::create_api_router;
pub use state::AppState;
pub use validation::{validate_batch, LookupRequestBody};

/// Cache settings implied by the API configuration.
pub fn snapshot_cache_config(config: &ApiConfig) -> CacheConfig {
    let cache_config =
        CacheConfig::default().with_shared_enabled(config.shared_cache_path.is_some());
    match config.shared_cache_ttl_secs {
        Some(secs) => cache_config.with_shared_ttl(Duration::from_secs(secs)),
        None => cache_config,
    }
}

/// Snapshot cache for the engine, with an LMDB shared tier when
/// `shared_cache_path` is configured.
pub fn build_snapshot_cache(config: &ApiConfig) -> ApiResult<HybridCache<LookupSnapshot>> {
    let cache_config = snapshot_cache_config(config);
    match &config.shared_cache_path {
        Some(path) => {
            let shared = LmdbSharedCache::open(path, config.shared_cache_size_mb)
                .map_err(LookupError::from)?;
            tracing::info!(path = %path.display(), "Shared snapshot cache enabled");
            Ok(HybridCache::with_shared(cache_config, Arc::new(shared)))
        }
        None => Ok(HybridCache::new(cache_config)),
    }
}

/// Registry from `registry_path` if set, else the built-in lookups.
///
/// Fails when a registered key is longer than requests may be, since
/// such a lookup could never be fetched.
pub async fn load_registry(
    config: &ApiConfig,
    engine_config: &EngineConfig,
) -> ApiResult<LookupRegistry> {
    let registry = read_registry(config).await?;
    registry
        .check_keys(engine_config.max_lookup_key_len)
        .map_err(LookupError::from)?;
    Ok(registry)
}

async fn read_registry(config: &ApiConfig) -> ApiResult<LookupRegistry> {
    match &config.registry_path {
        Some(path) => {
            let yaml = tokio::fs::read_to_string(path).await.map_err(|e| {
                ApiError::internal_error(format!(
                    "Failed to read registry {}: {}",
                    path.display(),
                    e
                ))
            })?;
            let registry = LookupRegistry::from_yaml_str(&yaml).map_err(LookupError::from)?;
            tracing::info!(path = %path.display(), lookups = registry.len(), "Loaded lookup registry");
            Ok(registry)
        }
        None => Ok(LookupRegistry::with_defaults()?),
    }
}
