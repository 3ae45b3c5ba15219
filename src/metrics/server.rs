//! HTTP surface for EWT requests, health checks and Prometheus metrics
//!
//! Serves `POST /ewt` for contact flows plus the monitoring endpoints,
//! using Axum.

use crate::error::EwtError;
use crate::metrics::collector::MetricsCollector;
use crate::service::app::AppState;
use crate::service::handler::EntryHandler;
use crate::service::health::{HealthCheck, HealthStatus};
use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use prometheus::{Encoder, TextEncoder};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

/// HTTP server configuration
#[derive(Debug, Clone)]
pub struct HttpServerConfig {
    /// Port to bind the server to
    pub port: u16,
    /// Host to bind to (typically "0.0.0.0" for all interfaces)
    pub host: String,
}

impl Default for HttpServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            host: "0.0.0.0".to_string(),
        }
    }
}

/// Shared state for the HTTP handlers
#[derive(Clone)]
pub struct HttpServerState {
    pub metrics_collector: Arc<MetricsCollector>,
    pub app_state: Option<Arc<AppState>>,
}

/// HTTP server with graceful shutdown
pub struct HttpServer {
    config: HttpServerConfig,
    state: HttpServerState,
    shutdown_tx: broadcast::Sender<()>,
}

impl HttpServer {
    pub fn new(config: HttpServerConfig, metrics_collector: Arc<MetricsCollector>) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            config,
            state: HttpServerState {
                metrics_collector,
                app_state: None,
            },
            shutdown_tx,
        }
    }

    /// Set the application state used by `/ewt` and the probes
    pub fn with_app_state(mut self, app_state: Arc<AppState>) -> Self {
        self.state.app_state = Some(app_state);
        self
    }

    /// Bind and serve until `stop` is called
    pub async fn start(&self) -> Result<()> {
        let addr: SocketAddr = format!("{}:{}", self.config.host, self.config.port)
            .parse()
            .context("Invalid HTTP server address")?;

        let app = self.create_router();
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind {}", addr))?;

        info!("HTTP server listening on http://{}", addr);

        let mut shutdown_rx = self.shutdown_tx.subscribe();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
                info!("HTTP server shutdown signal received");
            })
            .await?;

        info!("HTTP server stopped");
        Ok(())
    }

    pub fn create_router(&self) -> Router {
        Router::new()
            .route("/", get(root_handler))
            .route("/ewt", post(ewt_handler))
            .route("/health", get(health_handler))
            .route("/ready", get(ready_handler))
            .route("/metrics", get(metrics_handler))
            .with_state(self.state.clone())
    }

    /// Signal the serving task to drain and exit
    pub async fn stop(&self) -> Result<()> {
        info!("Stopping HTTP server...");

        if let Err(e) = self.shutdown_tx.send(()) {
            warn!("Failed to send shutdown signal to HTTP server: {}", e);
        }

        Ok(())
    }
}

async fn root_handler() -> impl IntoResponse {
    Json(json!({
        "service": "queue-ewt",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": ["POST /ewt", "/health", "/ready", "/metrics"]
    }))
}

/// Resolve the expected wait for the event in the request body
async fn ewt_handler(State(state): State<HttpServerState>, body: Bytes) -> Response {
    let Some(app_state) = &state.app_state else {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "error": "Service not initialized" })),
        )
            .into_response();
    };

    // Anything that is not JSON is treated as an event without a locator
    let event = EntryHandler::decode_event(&body).unwrap_or_else(|e| {
        debug!("{}, answering without a locator", e);
        Value::Null
    });

    match app_state.handler().handle(&event).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(e) => {
            let message = match e.downcast_ref::<EwtError>() {
                Some(ewt_error) => ewt_error.to_string(),
                None => format!("{:#}", e),
            };
            error!("EWT request failed: {}", message);

            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": message })),
            )
                .into_response()
        }
    }
}

/// Detailed health report
async fn health_handler(State(state): State<HttpServerState>) -> Response {
    debug!("Health check requested");

    let Some(app_state) = &state.app_state else {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "status": "unhealthy",
                "service": "queue-ewt",
                "error": "Service not initialized"
            })),
        )
            .into_response();
    };

    match HealthCheck::check(app_state.clone()).await {
        Ok(health) => {
            let status = match health.status {
                HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
                _ => StatusCode::OK,
            };
            (status, Json(health)).into_response()
        }
        Err(e) => {
            error!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "unhealthy", "service": "queue-ewt" })),
            )
                .into_response()
        }
    }
}

async fn ready_handler(State(state): State<HttpServerState>) -> impl IntoResponse {
    debug!("Readiness check requested");

    match &state.app_state {
        Some(app_state) => match HealthCheck::readiness_check(app_state.clone()).await {
            Ok(HealthStatus::Healthy) => (StatusCode::OK, "Ready"),
            Ok(HealthStatus::Degraded) => (StatusCode::OK, "Degraded but ready"),
            Ok(HealthStatus::Unhealthy) => (StatusCode::SERVICE_UNAVAILABLE, "Not ready"),
            Err(e) => {
                error!("Readiness check failed: {}", e);
                (StatusCode::SERVICE_UNAVAILABLE, "Not ready")
            }
        },
        None => (StatusCode::SERVICE_UNAVAILABLE, "Service not initialized"),
    }
}

async fn metrics_handler(State(state): State<HttpServerState>) -> Response {
    match encode_metrics(&state.metrics_collector) {
        Ok(text) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, TextEncoder::new().format_type().to_string())],
            text,
        )
            .into_response(),
        Err(e) => {
            error!("Failed to encode metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to encode metrics".to_string(),
            )
                .into_response()
        }
    }
}

/// Render the registry in Prometheus text format
pub fn encode_metrics(metrics_collector: &MetricsCollector) -> Result<String> {
    let metric_families = metrics_collector.registry().gather();

    TextEncoder::new()
        .encode_to_string(&metric_families)
        .map_err(|e| anyhow::anyhow!("Failed to encode metrics: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AppConfig, BackendSettings};
    use crate::store::MockEstimateStore;
    use crate::telemetry::{QueueSignals, StaticMetricsSource};
    use crate::types::LiveSnapshot;
    use crate::wait_time::PersistencePolicy;
    use axum::{
        body::{to_bytes, Body},
        http::Request,
    };
    use tower::ServiceExt; // for oneshot
    use uuid::Uuid;

    fn app_state(store: Arc<MockEstimateStore>, policy: PersistencePolicy) -> Arc<AppState> {
        let mut config = AppConfig {
            backend: BackendSettings::new("instance-1", "estimates"),
            ..Default::default()
        };
        config.estimation.persistence_policy = policy;

        let source = StaticMetricsSource::new("instance-1").with_queue(
            "busy",
            QueueSignals {
                live: LiveSnapshot {
                    contacts_in_queue: 10,
                    oldest_contact_age_seconds: 300,
                    agents_available: 2,
                },
                historical_average_seconds: None,
            },
        );

        let state = AppState::with_collaborators(config, Arc::new(source), store).unwrap();
        state.start();
        Arc::new(state)
    }

    fn router(app_state: Arc<AppState>) -> Router {
        HttpServer::new(HttpServerConfig::default(), app_state.metrics_collector())
            .with_app_state(app_state)
            .create_router()
    }

    fn post_ewt(body: &'static str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/ewt")
            .header("content-type", "application/json")
            .body(Body::from(body))
            .unwrap()
    }

    async fn body_json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_root_endpoint() {
        let collector = Arc::new(MetricsCollector::new().expect("Failed to create collector"));
        let app = HttpServer::new(HttpServerConfig::default(), collector).create_router();

        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_ewt_endpoint_answers_clamped_minutes() {
        let store = Arc::new(MockEstimateStore::new());
        let app = router(app_state(store.clone(), PersistencePolicy::BestEffort));

        let response = app
            .oneshot(post_ewt(r#"{"queueLocator":"arn:aws:connect:r:1:instance/i/queue/busy"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!({ "QUEUE_ANSWER_TIME": "20" }));
        assert_eq!(store.get_put_calls().len(), 1);
    }

    #[tokio::test]
    async fn test_ewt_endpoint_tolerates_garbage_body() {
        let store = Arc::new(MockEstimateStore::new());
        let app = router(app_state(store, PersistencePolicy::BestEffort));

        let response = app.oneshot(post_ewt("not json at all")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!({ "QUEUE_ANSWER_TIME": "1" }));
    }

    #[tokio::test]
    async fn test_ewt_endpoint_persist_failure() {
        let store = Arc::new(MockEstimateStore::new());
        store.fail_writes(true);

        let best_effort = router(app_state(store.clone(), PersistencePolicy::BestEffort));
        let response = best_effort
            .oneshot(post_ewt(r#"{"queueLocator":"arn:queue/busy"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let required = router(app_state(store, PersistencePolicy::Required));
        let response = required
            .oneshot(post_ewt(r#"{"queueLocator":"arn:queue/busy"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body_json(response).await["error"]
            .as_str()
            .unwrap()
            .contains("busy"));
    }

    #[tokio::test]
    async fn test_metrics_endpoint() {
        let store = Arc::new(MockEstimateStore::new());
        let state = app_state(store, PersistencePolicy::BestEffort);
        let app = router(state.clone());

        app.clone()
            .oneshot(post_ewt(r#"{"queueLocator":"arn:queue/busy"}"#))
            .await
            .unwrap();

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/metrics")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let content_type = response.headers().get("content-type").unwrap();
        assert!(content_type.to_str().unwrap().contains("text/plain"));

        let text = encode_metrics(&state.metrics_collector()).unwrap();
        assert!(text.contains("queue_ewt_resolutions_total"));
        assert!(text.contains("queue_ewt_requests_total"));
    }

    #[tokio::test]
    async fn test_metrics_exposition_ignores_locator_values() {
        let store = Arc::new(MockEstimateStore::new());
        let state = app_state(store, PersistencePolicy::BestEffort);
        let app = router(state.clone());

        let post = |locator: String| {
            Request::builder()
                .method("POST")
                .uri("/ewt")
                .header("content-type", "application/json")
                .body(Body::from(json!({ "queueLocator": locator }).to_string()))
                .unwrap()
        };

        // One request per estimate source that can appear
        for locator in ["arn:queue/busy".to_string(), format!("arn:queue/{}", Uuid::new_v4())] {
            app.clone().oneshot(post(locator)).await.unwrap();
        }
        let baseline = encode_metrics(&state.metrics_collector()).unwrap().lines().count();

        for _ in 0..50 {
            let response = app
                .clone()
                .oneshot(post(format!("arn:queue/{}", Uuid::new_v4())))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }

        let text = encode_metrics(&state.metrics_collector()).unwrap();
        assert_eq!(text.lines().count(), baseline);
        assert!(!text.contains("queue_id"));
    }

    #[tokio::test]
    async fn test_probes_without_app_state() {
        let collector = Arc::new(MetricsCollector::new().expect("Failed to create collector"));
        let app = HttpServer::new(HttpServerConfig::default(), collector).create_router();

        for uri in ["/health", "/ready"] {
            let response = app
                .clone()
                .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        }

        let response = app.oneshot(post_ewt("{}")).await.unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_probes_with_app_state() {
        let store = Arc::new(MockEstimateStore::new());
        let app = router(app_state(store, PersistencePolicy::BestEffort));

        let response = app
            .clone()
            .oneshot(Request::builder().uri("/ready").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["status"], "healthy");
    }

    #[tokio::test]
    async fn test_404_handling() {
        let collector = Arc::new(MetricsCollector::new().expect("Failed to create collector"));
        let app = HttpServer::new(HttpServerConfig::default(), collector).create_router();

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/nonexistent")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
