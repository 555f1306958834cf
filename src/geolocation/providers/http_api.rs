//! Remote JSON API provider.
//!
//! Queries an ip-api.com-style endpoint. The endpoint URL is a template
//! with an `{ip}` placeholder, so compatible services can be substituted
//! through configuration.

use std::net::IpAddr;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use super::GeoProvider;
use crate::geolocation::{GeoError, GeoLocation};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

pub struct HttpApiProvider {
    client: Client,
    endpoint: String,
}

/// Response shape shared by ip-api.com and compatible services.
#[derive(Debug, Deserialize)]
struct ApiResponse {
    status: Option<String>,
    #[serde(rename = "countryCode")]
    country_code: Option<String>,
    #[serde(rename = "country")]
    country_name: Option<String>,
    city: Option<String>,
    isp: Option<String>,
    #[serde(rename = "as")]
    autonomous_system: Option<String>,
}

impl HttpApiProvider {
    pub fn new(endpoint: String) -> Result<Self, GeoError> {
        if !endpoint.contains("{ip}") {
            return Err(GeoError::Misconfigured(format!(
                "http endpoint '{}' is missing the {{ip}} placeholder",
                endpoint
            )));
        }
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(GeoError::Http)?;
        Ok(HttpApiProvider { client, endpoint })
    }

    fn into_location(response: ApiResponse) -> Option<GeoLocation> {
        if response.status.as_deref() == Some("fail") {
            return None;
        }
        let country_code = response.country_code?;
        let mut location = GeoLocation {
            country_name: response
                .country_name
                .unwrap_or_else(|| country_code.clone()),
            country_code,
            city: response.city,
            extra: Default::default(),
        };
        if let Some(isp) = response.isp {
            location.extra.insert("isp".to_string(), isp);
        }
        if let Some(asn) = response.autonomous_system {
            location.extra.insert("as".to_string(), asn);
        }
        Some(location)
    }
}

#[async_trait]
impl GeoProvider for HttpApiProvider {
    fn name(&self) -> &'static str {
        "http"
    }

    fn is_ready(&self) -> bool {
        true
    }

    async fn lookup(&self, ip: IpAddr) -> Result<Option<GeoLocation>, GeoError> {
        let url = self.endpoint.replace("{ip}", &ip.to_string());
        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(GeoError::MalformedResponse(format!(
                "endpoint returned status {}",
                response.status()
            )));
        }
        let body: ApiResponse = response.json().await?;
        Ok(Self::into_location(body))
    }
}
