use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    /// Result of the most recent durable-store reachability probe. Sessions
    /// keep working on the local cache either way.
    pub remote_store_reachable: bool,
}

pub fn health_router() -> Router<AppState> {
    Router::new().route("/health", get(health))
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        remote_store_reachable: state.gateway.last_probe_result(),
    })
}
