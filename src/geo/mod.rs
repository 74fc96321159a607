//! Country lookup for connecting participants
//!
//! A participant's region scope comes from the country of its address. The
//! HTTP locator asks public providers; the static locator answers with a fixed
//! country for tests and offline runs.

pub mod http;

pub use http::HttpGeoLocator;

use crate::config::GeoSettings;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

/// Resolved location of an address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeoInfo {
    pub country: String,
    pub country_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum GeoError {
    #[error("{provider} request failed: {reason}")]
    Request {
        provider: &'static str,
        reason: String,
    },

    #[error("failed to build HTTP client: {reason}")]
    Client { reason: String },

    #[error("{provider} returned no usable location")]
    Incomplete { provider: &'static str },

    #[error("no provider could locate {address} (primary: {primary}; fallback: {fallback})")]
    Unresolved {
        address: IpAddr,
        primary: String,
        fallback: String,
    },
}

/// Resolves an address to a country
#[async_trait]
pub trait GeoLocator: Send + Sync {
    async fn locate(&self, address: IpAddr) -> Result<GeoInfo, GeoError>;
}

/// Answers every lookup with the same location
#[derive(Debug, Clone)]
pub struct StaticGeoLocator {
    info: GeoInfo,
}

impl StaticGeoLocator {
    pub fn new(info: GeoInfo) -> Self {
        Self { info }
    }

    /// Location carrying only a country code
    pub fn with_country_code(country_code: impl Into<String>) -> Self {
        let country_code = country_code.into().to_uppercase();
        Self::new(GeoInfo {
            country: country_code.clone(),
            country_code,
            region: None,
            city: None,
        })
    }
}

#[async_trait]
impl GeoLocator for StaticGeoLocator {
    async fn locate(&self, _address: IpAddr) -> Result<GeoInfo, GeoError> {
        Ok(self.info.clone())
    }
}

/// Locator that always fails, used to exercise rejection paths
#[derive(Debug, Clone, Default)]
pub struct FailingGeoLocator;

#[async_trait]
impl GeoLocator for FailingGeoLocator {
    async fn locate(&self, address: IpAddr) -> Result<GeoInfo, GeoError> {
        Err(GeoError::Unresolved {
            address,
            primary: "unavailable".to_string(),
            fallback: "unavailable".to_string(),
        })
    }
}

/// Unwrap IPv4-mapped IPv6 addresses
pub fn normalize_address(address: IpAddr) -> IpAddr {
    match address {
        IpAddr::V6(v6) => v6
            .to_ipv4_mapped()
            .map(IpAddr::V4)
            .unwrap_or(IpAddr::V6(v6)),
        v4 => v4,
    }
}

/// Addresses that only occur when running locally
pub fn is_local_address(address: IpAddr) -> bool {
    let address = normalize_address(address);
    address.is_loopback() || address.is_unspecified()
}

/// Build the locator described by the settings
pub fn build_locator(
    settings: &GeoSettings,
    timeout: Duration,
) -> Result<Arc<dyn GeoLocator>, GeoError> {
    Ok(match &settings.static_country_code {
        Some(code) => Arc::new(StaticGeoLocator::with_country_code(code.clone())),
        None => Arc::new(HttpGeoLocator::new(settings.clone(), timeout)?),
    })
}
