//! Axum route handlers for the Match API.

use std::time::Duration;

use axum::{extract::State, Json};
use serde_json::{json, Value};
use tracing::info;

use crate::errors::AppError;
use crate::matching::models::{MatchRequest, MatchResponse};
use crate::matching::pipeline::run_match;
use crate::state::AppState;

/// POST /api/match
///
/// Runs the full match pipeline against the configured generation model.
/// Raw upstream text is redacted from error bodies unless diagnostic mode
/// is enabled.
pub async fn handle_match(
    State(state): State<AppState>,
    Json(request): Json<MatchRequest>,
) -> Result<Json<MatchResponse>, AppError> {
    info!("Processing match request for: {}", request.user_name);

    let timeout = Duration::from_secs(state.config.upstream_timeout_secs);
    run_match(state.generator.as_ref(), timeout, request)
        .await
        .map(Json)
        .map_err(|e| e.redact_upstream(state.config.debug_upstream))
}

/// GET /test-key
///
/// Confirms the Gemini credential is configured. Startup is fatal without
/// one, so a serving process implies a loaded key; the value itself is
/// never echoed.
pub async fn handle_test_key() -> Json<Value> {
    Json(json!({ "status": "OK", "message": "API key is loaded!" }))
}
