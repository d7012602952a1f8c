//! API server setup and shared state.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::extract::Request;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::{
    DefaultMakeSpan, DefaultOnFailure, DefaultOnRequest, DefaultOnResponse, MakeSpan, OnRequest,
    TraceLayer,
};
use tracing::{Level, Span};

use crate::api::routes;
use crate::config::SettingsStore;
use crate::error::{Error, Result};
use crate::logging::LoggingConfig;
use crate::registry::ChannelRegistry;
use crate::sync::SyncCoordinator;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub enable_cors: bool,
}

impl Default for ApiServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 5000,
            enable_cors: true,
        }
    }
}

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub start_time: Instant,
    pub registry: Arc<ChannelRegistry>,
    pub settings: Arc<SettingsStore>,
    pub coordinator: Arc<SyncCoordinator>,
    /// Absent when the global subscriber was installed elsewhere (tests).
    pub logging_config: Option<Arc<LoggingConfig>>,
}

impl AppState {
    pub fn new(
        registry: Arc<ChannelRegistry>,
        settings: Arc<SettingsStore>,
        coordinator: Arc<SyncCoordinator>,
    ) -> Self {
        Self {
            start_time: Instant::now(),
            registry,
            settings,
            coordinator,
            logging_config: None,
        }
    }

    pub fn with_logging_config(mut self, config: Arc<LoggingConfig>) -> Self {
        self.logging_config = Some(config);
        self
    }
}

pub struct ApiServer {
    config: ApiServerConfig,
    state: AppState,
    cancel_token: CancellationToken,
}

impl ApiServer {
    /// The server stops accepting connections once `cancel_token` fires.
    pub fn new(config: ApiServerConfig, state: AppState, cancel_token: CancellationToken) -> Self {
        Self {
            config,
            state,
            cancel_token,
        }
    }

    /// Router with all routes and middleware applied.
    pub fn build_router(&self) -> Router {
        let mut router = routes::create_router(self.state.clone());

        if self.config.enable_cors {
            let cors = CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any);
            router = router.layer(cors);
        }

        // Health probes are polled often; keep them out of the request log.
        router.layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &Request| {
                    if req.uri().path().starts_with("/api/health") {
                        Span::none()
                    } else {
                        DefaultMakeSpan::new().level(Level::INFO).make_span(req)
                    }
                })
                .on_request(|req: &Request, span: &Span| {
                    if !span.is_disabled() {
                        DefaultOnRequest::new().level(Level::INFO).on_request(req, span);
                    }
                })
                .on_response(DefaultOnResponse::new().level(Level::INFO))
                .on_failure(DefaultOnFailure::new().level(Level::ERROR)),
        )
    }

    pub async fn run(&self) -> Result<()> {
        let addr: SocketAddr = format!("{}:{}", self.config.bind_address, self.config.port)
            .parse()
            .map_err(|e| Error::config(format!("Invalid API address: {e}")))?;

        let router = self.build_router();
        let listener = TcpListener::bind(addr).await?;
        tracing::info!("API server listening on http://{}", addr);

        let cancel_token = self.cancel_token.clone();
        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                cancel_token.cancelled().await;
                tracing::info!("API server shutting down...");
            })
            .await?;

        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = ApiServerConfig::default();
        assert_eq!(config.bind_address, "0.0.0.0");
        assert_eq!(config.port, 5000);
        assert!(config.enable_cors);
    }

    #[tokio::test]
    async fn test_invalid_address_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = ApiServerConfig {
            bind_address: "not an address".to_string(),
            ..ApiServerConfig::default()
        };
        let server = ApiServer::new(config, testing::state(dir.path()), CancellationToken::new());
        assert!(matches!(server.run().await, Err(Error::Configuration(_))));
    }
}
