//! HTTP and WebSocket server
//!
//! One axum router serves the participant sockets, the presence socket, the
//! location endpoint, and the health and Prometheus endpoints.

use crate::service::app::AppState;
use crate::service::health::{HealthCheck, HealthStatus};
use crate::transport::ws::{client_address, stats_handler, text_handler, video_handler};
use anyhow::{Context, Result};
use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use prometheus::{Encoder, TextEncoder};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

/// Body returned by `/api/geo` when no location can be determined
pub const GEO_FAILURE_BODY: &str = "Failed to determine location";

pub struct HttpServer {
    state: Arc<AppState>,
    shutdown_tx: broadcast::Sender<()>,
}

impl HttpServer {
    pub fn new(state: Arc<AppState>) -> Self {
        let (shutdown_tx, _shutdown_rx) = broadcast::channel(1);
        Self { state, shutdown_tx }
    }

    /// Bind and serve until `stop` is called
    pub async fn start(&self) -> Result<()> {
        let bind_address = self.state.config().bind_address();
        let addr: SocketAddr = bind_address
            .parse()
            .with_context(|| format!("Invalid server address {}", bind_address))?;

        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind {}", addr))?;
        info!("Server listening on http://{}", addr);

        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let app = self.create_router();

        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.recv().await;
            info!("Server shutdown signal received");
        })
        .await?;

        info!("Server stopped");
        Ok(())
    }

    pub fn create_router(&self) -> Router {
        create_router(self.state.clone())
    }

    pub fn stop(&self) {
        info!("Stopping server...");
        if let Err(e) = self.shutdown_tx.send(()) {
            warn!("Failed to send shutdown signal to server: {}", e);
        }
    }
}

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .route("/ready", get(ready_handler))
        .route("/alive", get(alive_handler))
        .route("/metrics", get(metrics_handler))
        .route("/stats", get(stats_handler_http))
        .route("/api/geo", get(geo_handler))
        .route("/ws/text", get(text_handler))
        .route("/ws/video", get(video_handler))
        .route("/ws/stats", get(stats_handler))
        .with_state(state)
}

/// Root endpoint handler - shows service information
async fn root_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({
        "service": state.config().service.name,
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": [
            "/health",
            "/ready",
            "/alive",
            "/metrics",
            "/stats",
            "/api/geo",
            "/ws/text",
            "/ws/video",
            "/ws/stats"
        ]
    }))
}

async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    debug!("Health check requested");
    let service_name = state.config().service.name.clone();

    let (code, status) = match HealthCheck::liveness_check(state).await {
        Ok(HealthStatus::Healthy) => (StatusCode::OK, "healthy"),
        Ok(HealthStatus::Degraded) => (StatusCode::OK, "degraded"),
        Ok(HealthStatus::Unhealthy) | Err(_) => (StatusCode::SERVICE_UNAVAILABLE, "unhealthy"),
    };

    (
        code,
        Json(json!({
            "status": status,
            "service": service_name,
            "version": env!("CARGO_PKG_VERSION")
        })),
    )
}

async fn ready_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    debug!("Readiness check requested");
    match HealthCheck::readiness_check(state).await {
        Ok(HealthStatus::Healthy) => (StatusCode::OK, "Ready"),
        Ok(HealthStatus::Degraded) => (StatusCode::OK, "Degraded but ready"),
        Ok(HealthStatus::Unhealthy) => (StatusCode::SERVICE_UNAVAILABLE, "Not ready"),
        Err(e) => {
            error!("Readiness check failed: {}", e);
            (StatusCode::SERVICE_UNAVAILABLE, "Not ready")
        }
    }
}

async fn alive_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match HealthCheck::liveness_check(state).await {
        Ok(HealthStatus::Healthy) => (StatusCode::OK, "Alive"),
        _ => (StatusCode::SERVICE_UNAVAILABLE, "Not alive"),
    }
}

/// Prometheus metrics endpoint handler
async fn metrics_handler(State(state): State<Arc<AppState>>) -> Response {
    let metric_families = state.metrics_collector().registry().gather();
    let encoder = TextEncoder::new();

    match encoder.encode_to_string(&metric_families) {
        Ok(metrics_output) => {
            debug!("Serving {} metric families", metric_families.len());
            (
                StatusCode::OK,
                [(header::CONTENT_TYPE, encoder.format_type().to_string())],
                metrics_output,
            )
                .into_response()
        }
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

/// Matchmaking counts plus component health
async fn stats_handler_http(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    debug!("Stats endpoint requested");
    let snapshot = state.service().snapshot().await;

    match HealthCheck::check(state.clone()).await {
        Ok(health) => (
            StatusCode::OK,
            Json(json!({
                "service": {
                    "name": health.service,
                    "version": health.version,
                    "status": health.status,
                    "uptime_seconds": health.stats.uptime_seconds
                },
                "matchmaking": snapshot,
                "connections": health.stats.open_connections,
                "components": health.checks,
                "timestamp": chrono::Utc::now()
            })),
        ),
        Err(e) => {
            error!("Failed to get stats: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "error": "Failed to get service stats",
                    "timestamp": chrono::Utc::now()
                })),
            )
        }
    }
}

/// Location of the caller, as used for region scoping
async fn geo_handler(State(state): State<Arc<AppState>>, request: Request) -> Response {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);

    let Some(address) = client_address(request.headers(), peer) else {
        warn!("Location requested without a resolvable client address");
        return geo_failure();
    };

    match state.geo().locate(address).await {
        Ok(info) => {
            state.metrics_collector().record_geo_lookup(true);
            (StatusCode::OK, Json(info)).into_response()
        }
        Err(e) => {
            state.metrics_collector().record_geo_lookup(false);
            warn!("Location lookup for {} failed: {}", address, e);
            geo_failure()
        }
    }
}

fn geo_failure() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": GEO_FAILURE_BODY })),
    )
        .into_response()
}
