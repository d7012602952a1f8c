//! API routes, grouped by resource.

pub mod channels;
pub mod health;
pub mod logging;
pub mod settings;
pub mod sync;

use axum::Router;

use crate::api::server::AppState;

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .nest("/api/health", health::router())
        .nest("/api/channels", channels::router())
        .nest("/api/settings", settings::router())
        .nest("/api/sync", sync::router())
        .nest("/api/logging", logging::router())
        .with_state(state)
}

#[cfg(test)]
pub(crate) mod test_support {
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode};
    use axum::response::Response;
    use serde::de::DeserializeOwned;

    pub fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    pub fn empty_request(method: &str, uri: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    pub async fn read_json<T: DeserializeOwned>(response: Response) -> (StatusCode, T) {
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }
}
