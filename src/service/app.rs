//! Main application state and service coordination
//!
//! This module contains the production AppState that wires the matchmaking
//! service, the connection hub, the geolocation collaborator and metrics.

use crate::config::AppConfig;
use crate::geo::{build_locator, GeoLocator};
use crate::matchmaking::MatchmakingService;
use crate::metrics::MetricsCollector;
use crate::transport::hub::ConnectionHub;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::info;

/// Service-level errors
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Service initialization error: {message}")]
    Initialization { message: String },

    #[error("Server error: {message}")]
    Server { message: String },
}

/// Main application state containing all service components
pub struct AppState {
    /// Application configuration
    config: AppConfig,

    /// Core matchmaking components
    service: Arc<MatchmakingService>,

    /// Outbound channels of live connections
    hub: Arc<ConnectionHub>,

    /// Country lookup for new connections
    geo: Arc<dyn GeoLocator>,

    metrics_collector: Arc<MetricsCollector>,

    /// Service status
    is_running: Arc<RwLock<bool>>,

    started_at: Instant,
}

impl AppState {
    /// Initialize the application with the locator described by the config
    pub fn new(config: AppConfig) -> Result<Self, ServiceError> {
        let geo = build_locator(&config.geo, config.geo_timeout()).map_err(|e| {
            ServiceError::Initialization {
                message: format!("Failed to create geo locator: {}", e),
            }
        })?;
        Self::with_geo_locator(config, geo)
    }

    /// Initialize the application with an explicit locator
    pub fn with_geo_locator(
        config: AppConfig,
        geo: Arc<dyn GeoLocator>,
    ) -> Result<Self, ServiceError> {
        info!("Initializing stranger-match service");
        info!(
            "Configuration: service={}, bind={}, static_geo={:?}",
            config.service.name,
            config.bind_address(),
            config.geo.static_country_code
        );

        let metrics_collector =
            Arc::new(
                MetricsCollector::new().map_err(|e| ServiceError::Initialization {
                    message: format!("Failed to create metrics collector: {}", e),
                })?,
            );

        let hub = Arc::new(ConnectionHub::new(config.service.outbound_buffer));
        let service = Arc::new(MatchmakingService::new(
            hub.clone(),
            metrics_collector.clone(),
        ));

        Ok(Self {
            config,
            service,
            hub,
            geo,
            metrics_collector,
            is_running: Arc::new(RwLock::new(false)),
            started_at: Instant::now(),
        })
    }

    /// Mark the service as accepting connections
    pub async fn start(&self) {
        *self.is_running.write().await = true;
        info!("✅ Stranger-match service started");
    }

    /// Stop accepting work and log the final state
    pub async fn shutdown(&self) {
        info!("Starting graceful shutdown of stranger-match service");
        *self.is_running.write().await = false;

        let snapshot = self.service.snapshot().await;
        info!(
            "Final service statistics: online={}, queued_text={}, queued_video={}, sessions={}",
            snapshot.online, snapshot.queued_text, snapshot.queued_video, snapshot.active_sessions
        );
        info!("✅ Stranger-match service shutdown completed");
    }

    /// Get service configuration
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Check if service is running
    pub async fn is_running(&self) -> bool {
        *self.is_running.read().await
    }

    pub fn service(&self) -> Arc<MatchmakingService> {
        self.service.clone()
    }

    pub fn hub(&self) -> Arc<ConnectionHub> {
        self.hub.clone()
    }

    pub fn geo(&self) -> Arc<dyn GeoLocator> {
        self.geo.clone()
    }

    pub fn metrics_collector(&self) -> Arc<MetricsCollector> {
        self.metrics_collector.clone()
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}
