//! Liveness endpoint.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use bpm_core::Store;
use tracing::warn;

use crate::AppState;

/// `GET /health`, unauthenticated. Pings the store.
///
/// # Returns
/// - 200 OK with `{ "status": "healthy", "version": ... }`
/// - 503 Service Unavailable when the store cannot be reached
pub async fn health_check<S: Store>(State(state): State<AppState<S>>) -> impl IntoResponse {
    match state.service.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "status": "healthy",
                "version": env!("CARGO_PKG_VERSION"),
            })),
        ),
        Err(e) => {
            warn!(subsystem = "api", component = "health", error = %e, "Health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(serde_json::json!({
                    "status": "unhealthy",
                    "version": env!("CARGO_PKG_VERSION"),
                })),
            )
        }
    }
}
