//! Geolocation provider cascade.
//!
//! Providers are interchangeable lookup backends consulted in ascending
//! priority order; the first non-empty answer wins. A provider whose
//! construction fails is logged and left out of the cascade; it never
//! fails service construction.

pub mod http_api;
pub mod maxmind;
pub mod sqlite;

pub use http_api::HttpApiProvider;
pub use maxmind::MaxMindProvider;
pub use sqlite::SqliteProvider;

use std::net::IpAddr;
use std::sync::Arc;

use async_trait::async_trait;

use crate::config::ProviderConfig;
use crate::geolocation::{GeoError, GeoLocation};

/// A single geolocation lookup backend.
#[async_trait]
pub trait GeoProvider: Send + Sync {
    fn name(&self) -> &'static str;

    /// Only ready providers participate in the cascade.
    fn is_ready(&self) -> bool;

    /// Resolve an address. `Ok(None)` means "this provider has no answer"
    /// and falls through to the next provider in the cascade.
    async fn lookup(&self, ip: IpAddr) -> Result<Option<GeoLocation>, GeoError>;
}

/// Build the provider cascade from configuration, ascending priority order.
pub fn build_cascade(configs: &[ProviderConfig]) -> Vec<Arc<dyn GeoProvider>> {
    let mut ordered: Vec<&ProviderConfig> = configs.iter().filter(|c| c.enabled).collect();
    ordered.sort_by_key(|c| c.priority);

    let mut cascade: Vec<Arc<dyn GeoProvider>> = Vec::new();
    for config in ordered {
        match build_provider(config) {
            Ok(provider) => {
                log::info!(
                    "Geolocation provider '{}' ready (priority {})",
                    provider.name(),
                    config.priority
                );
                cascade.push(provider);
            }
            Err(e) => {
                log::warn!(
                    "Geolocation provider '{}' disabled: {}",
                    config.kind,
                    e
                );
            }
        }
    }
    cascade
}

fn build_provider(config: &ProviderConfig) -> Result<Arc<dyn GeoProvider>, GeoError> {
    match config.kind.as_str() {
        "maxmind" => {
            let path = config
                .path
                .as_ref()
                .ok_or_else(|| GeoError::Misconfigured("maxmind provider requires a path".into()))?;
            Ok(Arc::new(MaxMindProvider::new(path)?))
        }
        "sqlite" => {
            let path = config
                .path
                .as_ref()
                .ok_or_else(|| GeoError::Misconfigured("sqlite provider requires a path".into()))?;
            Ok(Arc::new(SqliteProvider::new(path)?))
        }
        "http" => {
            let endpoint = config.endpoint.as_ref().ok_or_else(|| {
                GeoError::Misconfigured("http provider requires an endpoint".into())
            })?;
            Ok(Arc::new(HttpApiProvider::new(endpoint.clone())?))
        }
        other => Err(GeoError::Misconfigured(format!(
            "unknown provider kind '{}'",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_unknown_kind_rejected() {
        let config = ProviderConfig {
            kind: "carrier-pigeon".to_string(),
            enabled: true,
            priority: 1,
            path: None,
            endpoint: None,
        };
        assert!(build_provider(&config).is_err());
    }

    #[test]
    fn test_failed_provider_skipped_not_fatal() {
        let configs = vec![ProviderConfig {
            kind: "maxmind".to_string(),
            enabled: true,
            priority: 1,
            path: Some(PathBuf::from("/nonexistent/GeoLite2-City.mmdb")),
            endpoint: None,
        }];
        let cascade = build_cascade(&configs);
        assert!(cascade.is_empty());
    }

    #[test]
    fn test_disabled_provider_excluded() {
        let configs = vec![ProviderConfig {
            kind: "http".to_string(),
            enabled: false,
            priority: 1,
            path: None,
            endpoint: Some("http://ip-api.com/json/{ip}".to_string()),
        }];
        let cascade = build_cascade(&configs);
        assert!(cascade.is_empty());
    }
}
