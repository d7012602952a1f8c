//! Runtime settings. Changes apply from the next scheduler tick or pass.

use axum::{Json, Router, extract::State, routing::get};

use crate::api::error::ApiResult;
use crate::api::models::SettingsUpdate;
use crate::api::server::AppState;
use crate::config::Settings;

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(get_settings).put(update_settings))
}

async fn get_settings(State(state): State<AppState>) -> Json<Settings> {
    Json(state.settings.get())
}

async fn update_settings(
    State(state): State<AppState>,
    Json(update): Json<SettingsUpdate>,
) -> ApiResult<Json<Settings>> {
    let merged = update.apply_to(state.settings.get());
    Ok(Json(state.settings.replace(merged)?))
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tower::ServiceExt;

    use super::*;
    use crate::api::routes::test_support::{empty_request, json_request, read_json};
    use crate::api::server::testing;
    use crate::config::SettingsStore;

    #[tokio::test]
    async fn test_get_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let response = testing::router(dir.path())
            .oneshot(empty_request("GET", "/api/settings"))
            .await
            .unwrap();
        let (status, settings): (_, Settings) = read_json(response).await;
        assert!(status.is_success());
        assert_eq!(settings, Settings::default());
    }

    #[tokio::test]
    async fn test_update_parses_hours_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let app = testing::router(dir.path());

        let response = app
            .oneshot(json_request(
                "PUT",
                "/api/settings",
                json!({"sync_start_times": "22, 4, 30", "concurrent_limit": 0}),
            ))
            .await
            .unwrap();
        let (status, settings): (_, Settings) = read_json(response).await;
        assert!(status.is_success());
        // 30 is out of range and becomes midnight.
        assert_eq!(settings.sync_start_times, vec![0, 4, 22]);
        assert_eq!(settings.concurrent_limit, 1);

        let reloaded = SettingsStore::load(&dir.path().join("config"));
        assert_eq!(reloaded.get(), settings);
    }

    #[tokio::test]
    async fn test_unparseable_hours_fall_back_to_midnight() {
        let dir = tempfile::tempdir().unwrap();
        let response = testing::router(dir.path())
            .oneshot(json_request(
                "PUT",
                "/api/settings",
                json!({"sync_start_times": "3, later"}),
            ))
            .await
            .unwrap();
        let (_, settings): (_, Settings) = read_json(response).await;
        assert_eq!(settings.sync_start_times, vec![0]);
    }
}
