//! Webhook server implementation

use axum::{
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use labhook_core::{config::LabhookConfig, Error, Result, WebhookDispatcher};
use serde_json::json;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::{DefaultMakeSpan, TraceLayer};
use tracing::{info, warn};

use crate::metrics::{metrics_handler, MetricsRecorder};
use crate::middleware::{webhook_middleware, WebhookState};

/// Standalone host for a [`WebhookDispatcher`]
pub struct WebhookServer {
    config: LabhookConfig,
    dispatcher: WebhookDispatcher,
}

impl WebhookServer {
    /// Subscribers registered on `dispatcher` before or after this call
    /// receive the server's events.
    pub fn new(config: LabhookConfig, dispatcher: WebhookDispatcher) -> Self {
        Self { config, dispatcher }
    }

    pub async fn run(self) -> Result<()> {
        self.config.validate()?;

        let metrics = match MetricsRecorder::install() {
            Ok(metrics) => {
                info!("Prometheus metrics initialized");
                Some(Arc::new(metrics))
            }
            Err(e) => {
                warn!("Metrics disabled, failed to install recorder: {}", e);
                None
            }
        };

        let app = self.router(metrics);
        let addr = self.config.bind_addr();
        let listener = TcpListener::bind(&addr).await?;

        info!("Labhook listening on http://{}", addr);
        info!(
            "GitLab webhooks accepted at POST {}",
            self.dispatcher.config().path
        );
        if !self.dispatcher.config().verifies_secret() {
            warn!("No webhook secret configured, tokens will not be verified");
        }

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(Error::Io)?;

        info!("Labhook stopped");
        Ok(())
    }

    pub fn router(&self, metrics: Option<Arc<MetricsRecorder>>) -> Router {
        let state = WebhookState::new(self.dispatcher.clone())
            .with_max_body_bytes(self.config.server.max_body_bytes);

        let mut router = Router::new().route("/health", get(health_handler));

        if let Some(metrics) = metrics {
            router = router.merge(
                Router::new()
                    .route("/metrics", get(metrics_handler))
                    .with_state(metrics),
            );
        }

        router
            .fallback(not_found)
            .layer(middleware::from_fn_with_state(state, webhook_middleware))
            .layer(TraceLayer::new_for_http().make_span_with(DefaultMakeSpan::default()))
    }
}

async fn health_handler() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "version": labhook_core::VERSION,
    }))
}

async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Json(json!({ "error": "Not found" })))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
