//! API Configuration Module
//!
//! Server-level settings for the lookup API: bind address, CORS, request
//! concurrency, the optional LMDB shared cache tier and the registry file.
//! Loaded from environment variables with development-friendly defaults.

use std::net::SocketAddr;
use std::path::PathBuf;

use crate::error::{ApiError, ApiResult};

// ============================================================================
// API CONFIGURATION
// ============================================================================

/// API configuration for the HTTP server and its cache tier.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Interface to bind.
    pub bind_host: String,

    /// Port to bind.
    pub port: u16,

    // ========================================================================
    // CORS Configuration
    // ========================================================================
    /// Allowed CORS origins. Empty means allow all origins (dev mode).
    pub cors_origins: Vec<String>,

    /// Max age for CORS preflight cache in seconds.
    pub cors_max_age_secs: u64,

    /// Requests served concurrently before callers queue.
    pub max_concurrent_requests: usize,

    // ========================================================================
    // Shared Cache Tier
    // ========================================================================
    /// LMDB directory for the shared snapshot tier. `None` keeps snapshots
    /// in process memory only.
    pub shared_cache_path: Option<PathBuf>,

    /// LMDB map size in megabytes.
    pub shared_cache_size_mb: usize,

    /// Lifetime of shared-tier records in seconds; `None` uses each
    /// lookup's own cache lifetime.
    pub shared_cache_ttl_secs: Option<u64>,

    /// YAML registry file. `None` uses the built-in lookups.
    pub registry_path: Option<PathBuf>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_host: "0.0.0.0".to_string(),
            port: 3000,
            cors_origins: Vec::new(),
            cors_max_age_secs: 86400,
            max_concurrent_requests: 256,
            shared_cache_path: None,
            shared_cache_size_mb: 64,
            shared_cache_ttl_secs: None,
            registry_path: None,
        }
    }
}

impl ApiConfig {
    /// Create ApiConfig from environment variables.
    ///
    /// Environment variables:
    /// - `LOOKUP_API_BIND`: Interface to bind (default: 0.0.0.0)
    /// - `PORT` or `LOOKUP_API_PORT`: Port (default: 3000)
    /// - `LOOKUP_CORS_ORIGINS`: Comma-separated allowed origins (empty = allow all)
    /// - `LOOKUP_CORS_MAX_AGE_SECS`: Preflight cache duration (default: 86400)
    /// - `LOOKUP_MAX_CONCURRENT_REQUESTS`: In-flight request limit (default: 256)
    /// - `LOOKUP_CACHE_PATH`: LMDB directory for the shared cache tier (unset = disabled)
    /// - `LOOKUP_CACHE_SIZE_MB`: LMDB map size (default: 64)
    /// - `LOOKUP_CACHE_SHARED_TTL_SECS`: Shared-tier record lifetime (unset = per lookup)
    /// - `LOOKUP_REGISTRY_PATH`: YAML registry file (unset = built-in lookups)
    pub fn from_env() -> ApiResult<Self> {
        let defaults = Self::default();

        let port_str = std::env::var("PORT")
            .ok()
            .or_else(|| std::env::var("LOOKUP_API_PORT").ok());
        let port = match port_str {
            Some(raw) => raw
                .parse::<u16>()
                .map_err(|_| ApiError::invalid_input(format!("Invalid port value: {}", raw)))?,
            None => defaults.port,
        };

        let cors_origins = std::env::var("LOOKUP_CORS_ORIGINS")
            .ok()
            .map(|s| {
                s.split(',')
                    .map(|origin| origin.trim().to_string())
                    .filter(|origin| !origin.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            bind_host: std::env::var("LOOKUP_API_BIND").unwrap_or(defaults.bind_host),
            port,
            cors_origins,
            cors_max_age_secs: env_or("LOOKUP_CORS_MAX_AGE_SECS", defaults.cors_max_age_secs),
            max_concurrent_requests: env_or(
                "LOOKUP_MAX_CONCURRENT_REQUESTS",
                defaults.max_concurrent_requests,
            )
            .max(1),
            shared_cache_path: non_empty_path("LOOKUP_CACHE_PATH"),
            shared_cache_size_mb: env_or("LOOKUP_CACHE_SIZE_MB", defaults.shared_cache_size_mb),
            shared_cache_ttl_secs: std::env::var("LOOKUP_CACHE_SHARED_TTL_SECS")
                .ok()
                .and_then(|s| s.trim().parse().ok())
                .filter(|secs| *secs > 0),
            registry_path: non_empty_path("LOOKUP_REGISTRY_PATH"),
        })
    }

    /// Socket address the server listens on.
    pub fn bind_addr(&self) -> ApiResult<SocketAddr> {
        let addr = format!("{}:{}", self.bind_host, self.port);
        addr.parse::<SocketAddr>().map_err(|e| {
            ApiError::invalid_input(format!("Invalid bind address {}: {}", addr, e))
        })
    }

    /// Whether CORS is restricted to configured origins.
    pub fn is_cors_restricted(&self) -> bool {
        !self.cors_origins.is_empty()
    }
}

fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

fn non_empty_path(name: &str) -> Option<PathBuf> {
    std::env::var(name)
        .ok()
        .filter(|s| !s.trim().is_empty())
        .map(PathBuf::from)
}
