//! HTTP surface: routing, CORS and the serve loop.

pub mod cors;
pub mod error;
pub mod handlers;

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

use crate::classifier::EmotionClassifier;
use crate::config::{CorsConfig, ServiceConfig};
use crate::core::ConfigError;

pub use error::{ApiError, ErrorBody};
pub use handlers::{AnalyzeRequest, StatusResponse, LIVENESS_MESSAGE};

/// Shared by every request handler.
pub struct AppState {
    pub classifier: EmotionClassifier,
}

impl AppState {
    pub fn new(classifier: EmotionClassifier) -> Self {
        Self { classifier }
    }
}

/// Routes without the CORS policy.
///
/// Request bodies are unbounded unless `body_limit` caps them (in bytes).
pub fn router(state: Arc<AppState>, body_limit: Option<usize>) -> Router {
    let body_limit = match body_limit {
        Some(max) => DefaultBodyLimit::max(max),
        None => DefaultBodyLimit::disable(),
    };

    Router::new()
        .route("/", get(handlers::root))
        .route("/analyze", post(handlers::analyze))
        .layer(body_limit)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// The complete application.
pub fn app(
    state: Arc<AppState>,
    cors: &CorsConfig,
    body_limit: Option<usize>,
) -> Result<Router, ConfigError> {
    Ok(router(state, body_limit).layer(cors::cors_layer(cors)?))
}

/// Serve until `cancel_token` is cancelled.
pub async fn run(config: ServiceConfig, cancel_token: CancellationToken) -> anyhow::Result<()> {
    let classifier = EmotionClassifier::from_config(&config.model);
    if config.model.preload {
        classifier.warm_up().await?;
    }

    let state = Arc::new(AppState::new(classifier));
    let app = app(state, &config.cors, config.max_body_bytes)?;

    let address = config.bind_address();
    let listener = match TcpListener::bind(&address).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("Failed to bind to address {address}: {e}");
            return Err(anyhow::anyhow!("Failed to bind to address {address}: {e}"));
        }
    };
    tracing::info!(
        address = %listener.local_addr()?,
        model = %config.model.repo,
        device = %config.model.device,
        "InnerVoice API listening"
    );

    let observer = cancel_token.child_token();
    axum::serve(listener, app)
        .with_graceful_shutdown(observer.cancelled_owned())
        .await?;

    tracing::info!("InnerVoice API stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn shuts_down_when_cancelled() {
        let config = ServiceConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            ..ServiceConfig::default()
        };
        let cancel_token = CancellationToken::new();
        let server = tokio::spawn(run(config, cancel_token.clone()));

        tokio::time::sleep(Duration::from_millis(100)).await;
        cancel_token.cancel();

        let result = tokio::time::timeout(Duration::from_secs(5), server).await;
        assert!(
            matches!(result, Ok(Ok(Ok(())))),
            "server should stop once the token is cancelled"
        );
    }
}
