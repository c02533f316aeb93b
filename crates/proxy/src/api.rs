//! HTTP API: stats reports, health checks and Prometheus metrics

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use prometheus::{Encoder, TextEncoder};
use proxy_lib::{ComponentStatus, HealthRegistry, ProxyError, StatsPipeline};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub pipeline: StatsPipeline,
    pub health_registry: HealthRegistry,
    pub app_name: String,
}

impl AppState {
    pub fn new(pipeline: StatsPipeline, app_name: impl Into<String>) -> Self {
        Self {
            health_registry: pipeline.health().clone(),
            pipeline,
            app_name: app_name.into(),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

/// Pipeline failure mapped to an HTTP response
///
/// Only a fixed message is exposed; upstream status and body stay in the logs.
pub struct ApiError(pub ProxyError);

impl From<ProxyError> for ApiError {
    fn from(err: ProxyError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self.0 {
            ProxyError::NotFound(app) => (StatusCode::NOT_FOUND, format!("App {app} not found")),
            ProxyError::Authentication(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to log in to Cloud Foundry".to_string(),
            ),
            ProxyError::Upstream { .. } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to fetch app stats".to_string(),
            ),
            ProxyError::Configuration(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal Server Error".to_string(),
            ),
        };

        (status, Json(ErrorBody { error: message })).into_response()
    }
}

async fn index() -> &'static str {
    "Hello World!"
}

/// Per-instance stats for the configured app
async fn app_stats(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    let report = state.pipeline.instance_report(&state.app_name).await?;
    Ok(Json(report))
}

/// Datacenter-level totals for the configured app
async fn datacenter_metrics(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let report = state.pipeline.aggregate_report(&state.app_name).await?;
    Ok(Json(report))
}

/// Health check response - returns 200 if healthy, 503 if unhealthy
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_registry.health().await;

    let status_code = match health.status {
        ComponentStatus::Healthy | ComponentStatus::Degraded => StatusCode::OK,
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(health))
}

async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state.health_registry.readiness().await;

    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(readiness))
}

/// Prometheus metrics endpoint
async fn metrics() -> Response {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        error!(error = %e, "Failed to encode metrics");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    (
        StatusCode::OK,
        [("content-type", encoder.format_type().to_string())],
        buffer,
    )
        .into_response()
}

async fn log_request(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let response = next.run(request).await;

    info!(
        method = %method,
        uri = %uri,
        status = response.status().as_u16(),
        "Handled request"
    );
    response
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/app-stats", get(app_stats))
        .route("/datacenter-metrics", get(datacenter_metrics))
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .layer(middleware::from_fn(log_request))
        .with_state(state)
}

/// Start the API server and run until `shutdown` resolves
pub async fn serve(
    addr: &str,
    state: Arc<AppState>,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let app = create_router(state);

    info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}
