use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for the analysis engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Streaming statistics aggregator configuration
    pub aggregator: AggregatorConfig,
    /// GeoIP resolution service configuration
    pub geoip: GeoIpConfig,
    /// Anomaly detection configuration
    pub detection: DetectionConfig,
}

/// Streaming statistics aggregator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregatorConfig {
    /// Maximum distinct endpoint keys retained per direction before eviction
    pub max_endpoints: usize,
    /// Maximum distinct flow keys retained before eviction
    pub max_flows: usize,
    /// Optional cap on one-second throughput buckets. The default (None)
    /// keeps every populated second, trading memory for full-duration
    /// accuracy on long captures.
    pub max_throughput_buckets: Option<usize>,
}

/// GeoIP resolution service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeoIpConfig {
    /// Enable the resolution cache
    pub cache_enabled: bool,
    /// Cache entry time-to-live in seconds
    pub cache_ttl_seconds: u64,
    /// Maximum cache entries before oldest-insertion eviction
    pub max_cache_entries: usize,
    /// Continue to the next provider when one errors; when false the error
    /// propagates for that lookup
    pub fallback_on_error: bool,
    /// Log every provider consultation at debug level
    pub detailed_logging: bool,
    /// Maximum in-flight lookups during batch resolution
    pub batch_concurrency: usize,
    /// Provider cascade, consulted in ascending priority order
    pub providers: Vec<ProviderConfig>,
}

/// A single geolocation provider in the cascade
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Provider kind: "maxmind", "sqlite" or "http"
    pub kind: String,
    pub enabled: bool,
    /// Cascade position; lower values are consulted first
    pub priority: u32,
    /// Database file path (maxmind and sqlite kinds)
    pub path: Option<PathBuf>,
    /// Endpoint URL template with an `{ip}` placeholder (http kind)
    pub endpoint: Option<String>,
}

/// Anomaly detection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionConfig {
    /// Worker threads for the detector fan-out; None sizes the pool to the
    /// available cores
    pub worker_threads: Option<usize>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            aggregator: AggregatorConfig {
                max_endpoints: 5_000,
                max_flows: 10_000,
                max_throughput_buckets: None,
            },
            geoip: GeoIpConfig {
                cache_enabled: true,
                cache_ttl_seconds: 3_600,
                max_cache_entries: 10_000,
                fallback_on_error: true,
                detailed_logging: false,
                batch_concurrency: 50,
                providers: vec![
                    ProviderConfig {
                        kind: "maxmind".to_string(),
                        enabled: true,
                        priority: 1,
                        path: Some(PathBuf::from("GeoLite2-City.mmdb")),
                        endpoint: None,
                    },
                    ProviderConfig {
                        kind: "sqlite".to_string(),
                        enabled: false,
                        priority: 2,
                        path: Some(PathBuf::from("geoip.db")),
                        endpoint: None,
                    },
                    ProviderConfig {
                        kind: "http".to_string(),
                        enabled: false,
                        priority: 3,
                        path: None,
                        endpoint: Some("http://ip-api.com/json/{ip}".to_string()),
                    },
                ],
            },
            detection: DetectionConfig {
                worker_threads: None,
            },
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Save configuration to a file
    pub fn to_file(&self, path: &PathBuf) -> Result<(), Box<dyn std::error::Error>> {
        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_ceilings() {
        let config = Config::default();
        assert_eq!(config.aggregator.max_endpoints, 5_000);
        assert_eq!(config.aggregator.max_flows, 10_000);
        assert!(config.aggregator.max_throughput_buckets.is_none());
        assert_eq!(config.geoip.batch_concurrency, 50);
    }

    #[test]
    fn test_roundtrip_through_toml() {
        let config = Config::default();
        let text = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&text).unwrap();
        assert_eq!(parsed.geoip.providers.len(), config.geoip.providers.len());
        assert_eq!(parsed.geoip.cache_ttl_seconds, 3_600);
    }
}
