//! Country lookup against public IP geolocation providers

use super::{is_local_address, normalize_address, GeoError, GeoInfo, GeoLocator};
use crate::config::GeoSettings;
use async_trait::async_trait;
use serde::Deserialize;
use std::net::IpAddr;
use std::time::Duration;
use tracing::{debug, warn};

const PRIMARY: &str = "primary";
const FALLBACK: &str = "fallback";

/// Response body of the primary provider (ipapi.co layout)
#[derive(Debug, Deserialize)]
struct PrimaryResponse {
    country_name: Option<String>,
    country_code: Option<String>,
    region: Option<String>,
    city: Option<String>,
}

impl PrimaryResponse {
    fn into_info(self) -> Option<GeoInfo> {
        Some(GeoInfo {
            country: non_empty(self.country_name)?,
            country_code: non_empty(self.country_code)?.to_uppercase(),
            region: non_empty(self.region),
            city: non_empty(self.city),
        })
    }
}

/// Response body of the fallback provider (ip-api.com layout)
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FallbackResponse {
    country: Option<String>,
    country_code: Option<String>,
    region_name: Option<String>,
    city: Option<String>,
}

impl FallbackResponse {
    fn into_info(self) -> Option<GeoInfo> {
        Some(GeoInfo {
            country: non_empty(self.country)?,
            country_code: non_empty(self.country_code)?.to_uppercase(),
            region: non_empty(self.region_name),
            city: non_empty(self.city),
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

pub struct HttpGeoLocator {
    settings: GeoSettings,
    http_client: reqwest::Client,
}

impl HttpGeoLocator {
    pub fn new(settings: GeoSettings, timeout: Duration) -> Result<Self, GeoError> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(settings.user_agent.as_str())
            .build()
            .map_err(|e| GeoError::Client {
                reason: e.to_string(),
            })?;

        Ok(Self {
            settings,
            http_client,
        })
    }

    fn local_info(&self) -> GeoInfo {
        GeoInfo {
            country: self.settings.local_country.clone(),
            country_code: self.settings.local_country_code.clone(),
            region: self.settings.local_region.clone(),
            city: self.settings.local_city.clone(),
        }
    }

    fn provider_url(template: &str, address: IpAddr) -> String {
        template.replace("{ip}", &address.to_string())
    }

    async fn fetch<T: serde::de::DeserializeOwned>(
        &self,
        provider: &'static str,
        url: &str,
    ) -> Result<T, GeoError> {
        let response = self
            .http_client
            .get(url)
            .send()
            .await
            .map_err(|e| GeoError::Request {
                provider,
                reason: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(GeoError::Request {
                provider,
                reason: format!("status {}", response.status()),
            });
        }

        response.json::<T>().await.map_err(|e| GeoError::Request {
            provider,
            reason: e.to_string(),
        })
    }

    async fn query_primary(&self, address: IpAddr) -> Result<GeoInfo, GeoError> {
        let url = Self::provider_url(&self.settings.primary_url, address);
        let body: PrimaryResponse = self.fetch(PRIMARY, &url).await?;
        body.into_info()
            .ok_or(GeoError::Incomplete { provider: PRIMARY })
    }

    async fn query_fallback(&self, address: IpAddr) -> Result<GeoInfo, GeoError> {
        let url = Self::provider_url(&self.settings.fallback_url, address);
        let body: FallbackResponse = self.fetch(FALLBACK, &url).await?;
        body.into_info()
            .ok_or(GeoError::Incomplete { provider: FALLBACK })
    }
}

#[async_trait]
impl GeoLocator for HttpGeoLocator {
    async fn locate(&self, address: IpAddr) -> Result<GeoInfo, GeoError> {
        let address = normalize_address(address);

        if is_local_address(address) {
            debug!("Using development location for local address {}", address);
            return Ok(self.local_info());
        }

        let primary_error = match self.query_primary(address).await {
            Ok(info) => return Ok(info),
            Err(e) => {
                warn!("Primary location lookup for {} failed: {}", address, e);
                e
            }
        };

        match self.query_fallback(address).await {
            Ok(info) => Ok(info),
            Err(fallback_error) => Err(GeoError::Unresolved {
                address,
                primary: primary_error.to_string(),
                fallback: fallback_error.to_string(),
            }),
        }
    }
}
