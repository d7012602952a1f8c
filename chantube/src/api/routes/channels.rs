//! Channel CRUD. Every edit is persisted before the response is sent.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::get,
};

use crate::api::error::{ApiError, ApiResult};
use crate::api::server::AppState;
use crate::domain::{Channel, ChannelDraft};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_channels).post(create_channel))
        .route(
            "/{id}",
            get(get_channel).put(update_channel).delete(delete_channel),
        )
}

async fn list_channels(State(state): State<AppState>) -> Json<Vec<Channel>> {
    Json(state.registry.list())
}

async fn create_channel(
    State(state): State<AppState>,
    Json(draft): Json<ChannelDraft>,
) -> ApiResult<(StatusCode, Json<Channel>)> {
    let channel = state.registry.add(draft)?;
    Ok((StatusCode::CREATED, Json(channel)))
}

async fn get_channel(State(state): State<AppState>, Path(id): Path<u64>) -> ApiResult<Json<Channel>> {
    state
        .registry
        .get(id)
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("channel with id '{id}' not found")))
}

async fn update_channel(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Json(draft): Json<ChannelDraft>,
) -> ApiResult<Json<Channel>> {
    Ok(Json(state.registry.update(id, draft)?))
}

/// Local media of a removed channel is left on disk.
async fn delete_channel(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> ApiResult<Json<Channel>> {
    Ok(Json(state.registry.remove(id)?))
}

#[cfg(test)]
mod tests {
    use axum::Router;
    use axum::http::StatusCode;
    use serde_json::json;
    use tower::ServiceExt;

    use super::*;
    use crate::api::routes::test_support::{empty_request, json_request, read_json};
    use crate::api::server::testing;
    use crate::domain::SyncStatus;

    async fn create(app: &Router, body: serde_json::Value) -> (StatusCode, serde_json::Value) {
        let response = app
            .clone()
            .oneshot(json_request("POST", "/api/channels", body))
            .await
            .unwrap();
        read_json(response).await
    }

    #[tokio::test]
    async fn test_create_list_get() {
        let dir = tempfile::tempdir().unwrap();
        let app = testing::router(dir.path());

        let (status, body) = create(&app, json!({"Name": "Rust Weekly", "DL_Days": 7})).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["Id"], 1);
        assert_eq!(body["Last_Synced"], "Never");

        let response = app
            .clone()
            .oneshot(empty_request("GET", "/api/channels"))
            .await
            .unwrap();
        let (_, list): (_, Vec<Channel>) = read_json(response).await;
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].dl_days, 7);
        assert_eq!(list[0].last_synced, SyncStatus::NeverSynced);

        let response = app
            .oneshot(empty_request("GET", "/api/channels/1"))
            .await
            .unwrap();
        let (status, channel): (_, Channel) = read_json(response).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(channel.name, "Rust Weekly");
    }

    #[tokio::test]
    async fn test_create_is_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let app = testing::router(dir.path());
        create(&app, json!({"Name": "Persisted"})).await;

        let reloaded = testing::state(dir.path());
        assert_eq!(reloaded.registry.list()[0].name, "Persisted");
    }

    #[tokio::test]
    async fn test_create_rejects_duplicates_and_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let app = testing::router(dir.path());
        create(&app, json!({"Name": "Dup"})).await;

        let (status, body) = create(&app, json!({"Name": "dup"})).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], "CONFLICT");

        let (status, _) = create(&app, json!({"Name": "  "})).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let dir = tempfile::tempdir().unwrap();
        let app = testing::router(dir.path());
        create(&app, json!({"Name": "Before"})).await;

        let response = app
            .clone()
            .oneshot(json_request(
                "PUT",
                "/api/channels/1",
                json!({"Name": "After", "Keep_Days": -1}),
            ))
            .await
            .unwrap();
        let (status, body): (_, serde_json::Value) = read_json(response).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["Name"], "After");
        assert_eq!(body["Keep_Days"], -1);

        let response = app
            .clone()
            .oneshot(empty_request("DELETE", "/api/channels/1"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .oneshot(empty_request("GET", "/api/channels/1"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_unknown_id_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let app = testing::router(dir.path());

        let response = app
            .clone()
            .oneshot(json_request("PUT", "/api/channels/42", json!({"Name": "x"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = app
            .oneshot(empty_request("DELETE", "/api/channels/42"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
