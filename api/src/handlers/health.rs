use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};

use crate::handlers::ErrorResponse;
use crate::state::AppState;

/// Health check endpoint; pings the event store
#[tracing::instrument(skip(state))]
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    match state.events.health_check().await {
        Ok(()) => (
            StatusCode::OK,
            Json(serde_json::json!({ "status": "ok", "database": "connected" })),
        )
            .into_response(),
        Err(e) => {
            tracing::warn!(error = %e, "Health check failed");
            ErrorResponse::new("unavailable", e.to_string()).into_response()
        }
    }
}
