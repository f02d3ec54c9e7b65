//! Tracing subscriber setup for the API binary.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::{ApiError, ApiResult};

/// Filter used when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "lookup_api=debug,lookup_engine=debug,tower_http=debug,info";

/// Install a JSON-formatting subscriber filtered by `RUST_LOG`.
pub fn init_tracing() -> ApiResult<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().json().with_current_span(true))
        .try_init()
        .map_err(|e| ApiError::internal_error(format!("Failed to initialize tracing: {}", e)))
}
