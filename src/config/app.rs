//! Main application configuration
//!
//! This module defines the primary configuration structures for the
//! stranger-match service, including environment variable loading and validation.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub service: ServiceSettings,
    pub geo: GeoSettings,
}

/// Service-level settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceSettings {
    /// Service name for logging and metrics
    pub name: String,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Interface the HTTP/WebSocket server binds to
    pub host: String,
    /// Port for the HTTP/WebSocket server
    pub http_port: u16,
    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout_seconds: u64,
    /// Relayed frames a connection may have queued before further ones are dropped
    pub outbound_buffer: usize,
}

/// Geolocation lookup settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeoSettings {
    /// Primary provider, `{ip}` is substituted with the address
    pub primary_url: String,
    /// Secondary provider tried when the primary yields nothing usable
    pub fallback_url: String,
    /// Per-request timeout in milliseconds
    pub timeout_ms: u64,
    /// User-Agent sent to the providers
    pub user_agent: String,
    /// Location reported for loopback addresses during local development
    pub local_country: String,
    pub local_country_code: String,
    pub local_region: Option<String>,
    pub local_city: Option<String>,
    /// Skip remote lookups and report this country code for everyone
    pub static_country_code: Option<String>,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            name: "stranger-match".to_string(),
            log_level: "info".to_string(),
            host: "0.0.0.0".to_string(),
            http_port: 8080,
            shutdown_timeout_seconds: 30,
            outbound_buffer: 256,
        }
    }
}

impl Default for GeoSettings {
    fn default() -> Self {
        Self {
            primary_url: "https://ipapi.co/{ip}/json/".to_string(),
            fallback_url: "http://ip-api.com/json/{ip}".to_string(),
            timeout_ms: 3000,
            user_agent: concat!("stranger-match/", env!("CARGO_PKG_VERSION")).to_string(),
            local_country: "United States".to_string(),
            local_country_code: "US".to_string(),
            local_region: Some("CA".to_string()),
            local_city: Some("Los Angeles".to_string()),
            static_country_code: None,
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables with fallback to defaults
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env()?;
        validate_config(&config)?;
        Ok(config)
    }

    /// Load configuration from a TOML file, then apply environment overrides
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let mut config: AppConfig = toml::from_str(&raw)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        config.apply_env()?;
        validate_config(&config)?;
        Ok(config)
    }

    fn apply_env(&mut self) -> Result<()> {
        // Service settings
        if let Ok(name) = env::var("SERVICE_NAME") {
            self.service.name = name;
        }
        if let Ok(log_level) = env::var("LOG_LEVEL") {
            self.service.log_level = log_level;
        }
        if let Ok(host) = env::var("HTTP_HOST") {
            self.service.host = host;
        }
        if let Ok(port) = env::var("HTTP_PORT") {
            self.service.http_port = port
                .parse()
                .map_err(|_| anyhow!("Invalid HTTP_PORT value: {}", port))?;
        }
        if let Ok(timeout) = env::var("SHUTDOWN_TIMEOUT_SECONDS") {
            self.service.shutdown_timeout_seconds = timeout
                .parse()
                .map_err(|_| anyhow!("Invalid SHUTDOWN_TIMEOUT_SECONDS value: {}", timeout))?;
        }
        if let Ok(buffer) = env::var("OUTBOUND_BUFFER") {
            self.service.outbound_buffer = buffer
                .parse()
                .map_err(|_| anyhow!("Invalid OUTBOUND_BUFFER value: {}", buffer))?;
        }

        // Geo settings
        if let Ok(url) = env::var("GEO_PRIMARY_URL") {
            self.geo.primary_url = url;
        }
        if let Ok(url) = env::var("GEO_FALLBACK_URL") {
            self.geo.fallback_url = url;
        }
        if let Ok(timeout) = env::var("GEO_TIMEOUT_MS") {
            self.geo.timeout_ms = timeout
                .parse()
                .map_err(|_| anyhow!("Invalid GEO_TIMEOUT_MS value: {}", timeout))?;
        }
        if let Ok(code) = env::var("GEO_LOCAL_COUNTRY_CODE") {
            self.geo.local_country_code = code;
        }
        if let Ok(code) = env::var("GEO_STATIC_COUNTRY_CODE") {
            self.geo.static_country_code = Some(code);
        }

        Ok(())
    }

    /// Get shutdown timeout as Duration
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.service.shutdown_timeout_seconds)
    }

    /// Get geo lookup timeout as Duration
    pub fn geo_timeout(&self) -> Duration {
        Duration::from_millis(self.geo.timeout_ms)
    }

    /// Address the server binds to
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.service.host, self.service.http_port)
    }
}

/// Validate configuration values
pub fn validate_config(config: &AppConfig) -> Result<()> {
    // Validate log level
    match config.service.log_level.to_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => {}
        _ => return Err(anyhow!("Invalid log level: {}", config.service.log_level)),
    }

    if config.service.http_port == 0 {
        return Err(anyhow!("HTTP port cannot be 0"));
    }
    if config.service.shutdown_timeout_seconds == 0 {
        return Err(anyhow!("Shutdown timeout must be greater than 0"));
    }
    if config.service.outbound_buffer == 0 {
        return Err(anyhow!("Outbound buffer must be greater than 0"));
    }

    if config.geo.static_country_code.is_none() {
        if !config.geo.primary_url.contains("{ip}") {
            return Err(anyhow!("Geo primary URL must contain an {{ip}} placeholder"));
        }
        if !config.geo.fallback_url.contains("{ip}") {
            return Err(anyhow!("Geo fallback URL must contain an {{ip}} placeholder"));
        }
    }
    if config.geo.timeout_ms == 0 {
        return Err(anyhow!("Geo timeout must be greater than 0"));
    }
    if config.geo.local_country_code.is_empty() {
        return Err(anyhow!("Local country code cannot be empty"));
    }

    Ok(())
}
