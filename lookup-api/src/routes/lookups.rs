//! Lookup REST API Routes
//!
//! `POST /api/v1/lookups` resolves a batch of lookup requests and returns
//! every result keyed by lookup key. The batch is all-or-nothing: one
//! failing lookup fails the request.

use axum::{
    extract::{rejection::JsonRejection, State},
    routing::post,
    Json, Router,
};
use lookup_core::LookupResponse;
use tokio_util::sync::CancellationToken;

use crate::{
    error::{ApiError, ApiResult},
    state::AppState,
    validation::{validate_batch, LookupRequestBody},
};

// ============================================================================
// ROUTE HANDLERS
// ============================================================================

/// POST /api/v1/lookups - Resolve a batch of lookups
///
/// If the client goes away the handler future is dropped, which drops the
/// guard and cancels every fetch still running for this batch.
pub async fn fetch_lookups(
    State(state): State<AppState>,
    body: Result<Json<Vec<LookupRequestBody>>, JsonRejection>,
) -> ApiResult<Json<LookupResponse>> {
    let Json(bodies) = body.map_err(|rejection| ApiError::invalid_input(rejection.body_text()))?;
    let requests = validate_batch(bodies, &state.engine_config)?;

    let cancel = CancellationToken::new();
    let guard = cancel.clone().drop_guard();
    let result = state.orchestrator.process_batch(requests, &cancel).await;
    guard.disarm();

    Ok(Json(result?))
}

// ============================================================================
// ROUTER
// ============================================================================

/// Create the lookup router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/lookups", post(fetch_lookups))
        .with_state(state)
}
