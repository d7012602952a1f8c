use axum::{Json, Router, extract::State, http::StatusCode, routing::post};

use crate::api::models::SyncTriggerResponse;
use crate::api::server::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/", post(trigger_sync))
}

/// Start a pass now. Returns immediately; progress arrives as sync events.
async fn trigger_sync(State(state): State<AppState>) -> (StatusCode, Json<SyncTriggerResponse>) {
    let result = state.coordinator.trigger_now();
    (StatusCode::ACCEPTED, Json(SyncTriggerResponse { result }))
}
