//! Router assembly and the listening loop.

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};

use crate::config::ServerConfig;
use crate::error::{ApiError, Result};
use crate::models::ModelRegistry;

use super::handlers;

/// Largest accepted request body (uploads and code matrices).
pub const MAX_UPLOAD_BYTES: usize = 64 * 1024 * 1024;

/// State shared by every handler.
pub struct AppState {
    /// Loaded models; never changes after startup.
    pub registry: ModelRegistry,
    /// Longest generation a request may ask for, in seconds.
    pub max_duration_sec: f32,
}

impl AppState {
    pub fn new(registry: ModelRegistry, max_duration_sec: f32) -> Self {
        Self {
            registry,
            max_duration_sec,
        }
    }
}

/// Builds the application router with CORS open to every origin.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/generate/music", post(handlers::generate_music))
        .route("/generate/audio", post(handlers::generate_audio))
        .route("/encode", post(handlers::encode))
        .route("/decode", post(handlers::decode))
        .route("/analyze", post(handlers::analyze))
        .route("/health", get(handlers::health))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(cors)
        .with_state(state)
}

/// Binds the configured host and port. Host names are resolved.
pub async fn bind(config: &ServerConfig) -> Result<TcpListener> {
    TcpListener::bind((config.host.as_str(), config.port))
        .await
        .map_err(|e| {
            ApiError::internal(format!(
                "failed to bind {}: {}",
                config.listen_address(),
                e
            ))
        })
}

/// Binds the configured address and serves until Ctrl-C.
pub async fn serve(config: &ServerConfig, registry: ModelRegistry) -> Result<()> {
    let listener = bind(config).await?;
    let state = Arc::new(AppState::new(registry, config.max_duration_sec));
    let app = router(state);

    match listener.local_addr() {
        Ok(addr) => tracing::info!("Server listening on http://{}", addr),
        Err(_) => tracing::info!("Server listening on http://{}", config.listen_address()),
    }

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| ApiError::internal(format!("server error: {}", e)))?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown requested");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn binds_by_host_name() {
        let config = ServerConfig {
            host: "localhost".to_string(),
            port: 0,
            ..ServerConfig::default()
        };
        assert!(config.validate().is_none());

        let listener = bind(&config).await.unwrap();
        assert!(listener.local_addr().unwrap().ip().is_loopback());
    }

    #[tokio::test]
    async fn bind_failure_is_reported() {
        let config = ServerConfig {
            host: "no-such-host.invalid".to_string(),
            port: 0,
            ..ServerConfig::default()
        };
        let err = bind(&config).await.unwrap_err();
        assert!(err.message.contains("no-such-host.invalid:0"));
    }
}
