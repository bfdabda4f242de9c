//! AI diagnostics endpoint.

use axum::{extract::State, Json};
use serde::Serialize;

use reverie_ai::test_connection;
use reverie_core::{ChatDiagnostics, GenerationBackend};

use crate::{ApiError, AppState};

/// Connectivity report for the configured AI backend.
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct AiTestResponse {
    /// Whether an API credential is configured at all.
    pub configured: bool,
    /// Whether the provider answered a trivial metadata request.
    pub reachable: bool,
    /// Whether a full analysis round trip succeeded.
    pub round_trip: bool,
    pub model: String,
}

/// Diagnostic: report whether the AI credential is configured and whether
/// a trivial round trip succeeds. Not part of the job state machine.
#[utoipa::path(get, path = "/api/v1/ai/test", tag = "AI",
    responses((status = 200, description = "Connectivity report", body = AiTestResponse)))]
pub async fn test_ai(State(state): State<AppState>) -> Result<Json<AiTestResponse>, ApiError> {
    let backend = state.diagnostics.as_ref();

    let configured = backend.configured();
    let reachable = configured && backend.health_check().await.unwrap_or(false);
    let round_trip = reachable && test_connection(backend).await;

    Ok(Json(AiTestResponse {
        configured,
        reachable,
        round_trip,
        model: backend.model_name().to_string(),
    }))
}
