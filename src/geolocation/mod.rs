//! GeoIP resolution service.
//!
//! Answers "which country does this IP belong to" through a prioritized
//! cascade of pluggable providers backed by an expiring cache, and turns a
//! packet set into per-country and flow-direction rollups. Non-globally-
//! routable addresses short-circuit to synthesized pseudo-locations and
//! never reach a provider.

pub mod cache;
pub mod classify;
pub mod providers;
pub mod risk;

use std::collections::{HashMap, HashSet};
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::GeoIpConfig;
use crate::models::PacketRecord;
use cache::GeoCache;
use classify::{classify_special, is_public_ip};
use providers::{build_cascade, GeoProvider};

/// Errors that can occur during geolocation lookups
#[derive(Error, Debug)]
pub enum GeoError {
    #[error("Failed to open database: {0}")]
    DatabaseOpen(#[from] maxminddb::MaxMindDBError),

    #[error("Database file not found: {0}")]
    FileNotFound(String),

    #[error("SQL error: {0}")]
    Sql(#[from] rusqlite::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Provider response malformed: {0}")]
    MalformedResponse(String),

    #[error("Provider misconfigured: {0}")]
    Misconfigured(String),
}

/// A resolved geographic location. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeoLocation {
    /// ISO 3166-1 alpha-2 code, or a stable pseudo-code for
    /// non-globally-routable addresses.
    pub country_code: String,
    pub country_name: String,
    pub city: Option<String>,
    /// Provider extension data (continent, timezone, ISP, ...).
    #[serde(default)]
    pub extra: HashMap<String, String>,
}

/// Per-country traffic rollup built once per analysis run.
#[derive(Debug, Clone, Serialize)]
pub struct CountryTrafficStatistics {
    pub country_code: String,
    pub country_name: String,
    /// Packets whose destination resolved to this country.
    pub packets_in: u64,
    /// Packets whose source resolved to this country.
    pub packets_out: u64,
    pub bytes_in: u64,
    pub bytes_out: u64,
    pub unique_ips: HashSet<IpAddr>,
    /// Share of the total resolved byte volume, in percent.
    pub byte_share_percent: f64,
}

impl CountryTrafficStatistics {
    fn new(country_code: String, country_name: String) -> Self {
        CountryTrafficStatistics {
            country_code,
            country_name,
            packets_in: 0,
            packets_out: 0,
            bytes_in: 0,
            bytes_out: 0,
            unique_ips: HashSet::new(),
            byte_share_percent: 0.0,
        }
    }

    pub fn total_packets(&self) -> u64 {
        self.packets_in + self.packets_out
    }

    pub fn total_bytes(&self) -> u64 {
        self.bytes_in + self.bytes_out
    }
}

/// Aggregate for one ordered (source-country, destination-country) pair.
#[derive(Debug, Clone, Serialize)]
pub struct TrafficFlowDirection {
    pub source_country: String,
    pub dest_country: String,
    pub source_name: String,
    pub dest_name: String,
    pub packets: u64,
    pub bytes: u64,
}

/// GeoIP resolution service orchestrating the cache and provider cascade.
pub struct GeoIpResolver {
    providers: Vec<Arc<dyn GeoProvider>>,
    cache: Option<GeoCache>,
    fallback_on_error: bool,
    detailed_logging: bool,
    batch_concurrency: usize,
}

impl GeoIpResolver {
    /// Build the service from configuration. Providers whose init fails are
    /// logged and skipped; construction itself never fails on provider
    /// trouble.
    pub fn new(config: &GeoIpConfig) -> Self {
        let providers = build_cascade(&config.providers);
        Self::with_providers(config, providers)
    }

    /// Build the service around an explicit provider cascade (callers
    /// supplying custom providers, tests supplying mocks). The slice order
    /// is the cascade order.
    pub fn with_providers(config: &GeoIpConfig, providers: Vec<Arc<dyn GeoProvider>>) -> Self {
        let cache = if config.cache_enabled {
            Some(GeoCache::new(
                Duration::from_secs(config.cache_ttl_seconds),
                config.max_cache_entries,
            ))
        } else {
            None
        };
        GeoIpResolver {
            providers,
            cache,
            fallback_on_error: config.fallback_on_error,
            detailed_logging: config.detailed_logging,
            batch_concurrency: config.batch_concurrency.max(1),
        }
    }

    /// Resolve an address, surfacing provider errors.
    ///
    /// Special-range addresses yield their pseudo-location without touching
    /// cache or providers. `Ok(None)` means no provider had an answer.
    pub async fn try_locate(&self, ip: IpAddr) -> Result<Option<GeoLocation>, GeoError> {
        if let Some(pseudo) = classify_special(&ip) {
            return Ok(Some(pseudo));
        }
        self.resolve_public(ip).await
    }

    /// Resolve an address, treating provider errors as "no answer".
    pub async fn locate(&self, ip: IpAddr) -> Option<GeoLocation> {
        match self.try_locate(ip).await {
            Ok(result) => result,
            Err(e) => {
                log::warn!("Geolocation lookup failed for {}: {}", ip, e);
                None
            }
        }
    }

    /// Resolve an address given in text form. Unparseable text is
    /// "unknown", never an error.
    pub async fn locate_text(&self, ip_text: &str) -> Option<GeoLocation> {
        let ip: IpAddr = ip_text.parse().ok()?;
        self.locate(ip).await
    }

    /// Resolve a set of addresses concurrently under the configured
    /// in-flight ceiling, so cache hits and provider calls overlap without
    /// unbounded fan-out. Unresolvable addresses are absent from the
    /// result.
    pub async fn locate_batch(&self, ips: &[IpAddr]) -> HashMap<IpAddr, GeoLocation> {
        let results: Vec<(IpAddr, Option<GeoLocation>)> = stream::iter(ips.iter().copied())
            .map(|ip| async move { (ip, self.locate(ip).await) })
            .buffer_unordered(self.batch_concurrency)
            .collect()
            .await;

        results
            .into_iter()
            .filter_map(|(ip, location)| location.map(|loc| (ip, loc)))
            .collect()
    }

    /// Resolve locations for caller-owned addresses in text form, for
    /// attaching onto endpoint or flow records. Unresolvable addresses are
    /// absent from the result.
    pub async fn enrich_addresses(&self, addresses: &[String]) -> HashMap<String, GeoLocation> {
        let results: Vec<(String, Option<GeoLocation>)> = stream::iter(addresses.iter().cloned())
            .map(|text| async move {
                let location = self.locate_text(&text).await;
                (text, location)
            })
            .buffer_unordered(self.batch_concurrency)
            .collect()
            .await;

        results
            .into_iter()
            .filter_map(|(text, location)| location.map(|loc| (text, loc)))
            .collect()
    }

    async fn resolve_public(&self, ip: IpAddr) -> Result<Option<GeoLocation>, GeoError> {
        if let Some(cache) = &self.cache {
            if let Some(hit) = cache.get(&ip) {
                return Ok(Some(hit));
            }
        }

        for provider in &self.providers {
            if !provider.is_ready() {
                continue;
            }
            if self.detailed_logging {
                log::debug!("Consulting provider '{}' for {}", provider.name(), ip);
            }
            match provider.lookup(ip).await {
                Ok(Some(location)) => {
                    if let Some(cache) = &self.cache {
                        cache.insert(ip, location.clone());
                    }
                    return Ok(Some(location));
                }
                Ok(None) => continue,
                Err(e) => {
                    if self.fallback_on_error {
                        log::warn!(
                            "Provider '{}' failed for {}, trying next: {}",
                            provider.name(),
                            ip,
                            e
                        );
                        continue;
                    }
                    return Err(e);
                }
            }
        }
        Ok(None)
    }

    /// Per-country packet/byte/direction rollup over a packet set.
    ///
    /// One scan collects the distinct globally-routable addresses, which are
    /// resolved concurrently; a data-parallel second pass classifies each
    /// packet side into per-worker accumulators merged exactly once. An
    /// unresolvable side is skipped, not an error.
    pub async fn analyze_country_traffic(
        &self,
        packets: &[PacketRecord],
    ) -> HashMap<String, CountryTrafficStatistics> {
        let mut public_ips: HashSet<IpAddr> = HashSet::new();
        for packet in packets {
            for side in [&packet.source_ip, &packet.dest_ip] {
                if let Ok(ip) = side.parse::<IpAddr>() {
                    if is_public_ip(&ip) {
                        public_ips.insert(ip);
                    }
                }
            }
        }

        let ips: Vec<IpAddr> = public_ips.into_iter().collect();
        let resolved = self.locate_batch(&ips).await;

        let workers = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4);
        let chunk_size = packets.len().div_ceil(workers).max(1);

        let locals: Vec<HashMap<String, LocalCountryAccumulator>> = std::thread::scope(|scope| {
            let handles: Vec<_> = packets
                .chunks(chunk_size)
                .map(|chunk| {
                    let resolved = &resolved;
                    scope.spawn(move || accumulate_chunk(chunk, resolved))
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        // Single merge pass; IP sets deduplicate only here.
        let mut merged: HashMap<String, CountryTrafficStatistics> = HashMap::new();
        for local in locals {
            for (code, acc) in local {
                let entry = merged
                    .entry(code.clone())
                    .or_insert_with(|| CountryTrafficStatistics::new(code, acc.country_name.clone()));
                entry.packets_in += acc.packets_in;
                entry.packets_out += acc.packets_out;
                entry.bytes_in += acc.bytes_in;
                entry.bytes_out += acc.bytes_out;
                entry.unique_ips.extend(acc.ips);
            }
        }

        let grand_total: u64 = merged.values().map(|c| c.total_bytes()).sum();
        if grand_total > 0 {
            for country in merged.values_mut() {
                country.byte_share_percent =
                    country.total_bytes() as f64 * 100.0 / grand_total as f64;
            }
        }

        merged
    }

    /// Ordered (source-country, destination-country) rollup over a packet
    /// set. Packets with an unclassifiable side are skipped. Returned
    /// sorted by packet count descending.
    pub async fn analyze_flow_directions(
        &self,
        packets: &[PacketRecord],
    ) -> Vec<TrafficFlowDirection> {
        let mut public_ips: HashSet<IpAddr> = HashSet::new();
        for packet in packets {
            for side in [&packet.source_ip, &packet.dest_ip] {
                if let Ok(ip) = side.parse::<IpAddr>() {
                    if is_public_ip(&ip) {
                        public_ips.insert(ip);
                    }
                }
            }
        }
        let ips: Vec<IpAddr> = public_ips.into_iter().collect();
        let resolved = self.locate_batch(&ips).await;

        // Single serialized fold into the ordered-pair map.
        let mut directions: HashMap<(String, String), TrafficFlowDirection> = HashMap::new();
        for packet in packets {
            if packet.source_ip.is_empty() || packet.dest_ip.is_empty() {
                continue;
            }
            let source = match classify_side(&packet.source_ip, &resolved) {
                Some(side) => side,
                None => continue,
            };
            let dest = match classify_side(&packet.dest_ip, &resolved) {
                Some(side) => side,
                None => continue,
            };

            let key = (source.code.clone(), dest.code.clone());
            let entry = directions
                .entry(key)
                .or_insert_with(|| TrafficFlowDirection {
                    source_country: source.code,
                    dest_country: dest.code,
                    source_name: source.name,
                    dest_name: dest.name,
                    packets: 0,
                    bytes: 0,
                });
            entry.packets += 1;
            entry.bytes += packet.length;
        }

        let mut flows: Vec<TrafficFlowDirection> = directions.into_values().collect();
        flows.sort_by(|a, b| b.packets.cmp(&a.packets));
        flows
    }

    /// Number of registered, ready providers.
    pub fn ready_providers(&self) -> usize {
        self.providers.iter().filter(|p| p.is_ready()).count()
    }

    /// The resolution cache, when enabled.
    pub fn cache(&self) -> Option<&GeoCache> {
        self.cache.as_ref()
    }
}

/// Thread-local accumulator for the data-parallel country pass. Unique-IP
/// lists stay as plain Vecs here; deduplication happens once at merge.
#[derive(Debug, Default)]
struct LocalCountryAccumulator {
    country_name: String,
    packets_in: u64,
    packets_out: u64,
    bytes_in: u64,
    bytes_out: u64,
    ips: Vec<IpAddr>,
}

struct ClassifiedSide {
    code: String,
    name: String,
    ip: IpAddr,
}

fn classify_side(
    ip_text: &str,
    resolved: &HashMap<IpAddr, GeoLocation>,
) -> Option<ClassifiedSide> {
    let ip: IpAddr = ip_text.parse().ok()?;
    if let Some(pseudo) = classify_special(&ip) {
        return Some(ClassifiedSide {
            code: pseudo.country_code,
            name: pseudo.country_name,
            ip,
        });
    }
    let location = resolved.get(&ip)?;
    Some(ClassifiedSide {
        code: location.country_code.clone(),
        name: location.country_name.clone(),
        ip,
    })
}

fn accumulate_chunk(
    chunk: &[PacketRecord],
    resolved: &HashMap<IpAddr, GeoLocation>,
) -> HashMap<String, LocalCountryAccumulator> {
    let mut local: HashMap<String, LocalCountryAccumulator> = HashMap::new();
    for packet in chunk {
        if let Some(side) = classify_side(&packet.source_ip, resolved) {
            let acc = local.entry(side.code).or_default();
            if acc.country_name.is_empty() {
                acc.country_name = side.name;
            }
            acc.packets_out += 1;
            acc.bytes_out += packet.length;
            acc.ips.push(side.ip);
        }
        if let Some(side) = classify_side(&packet.dest_ip, resolved) {
            let acc = local.entry(side.code).or_default();
            if acc.country_name.is_empty() {
                acc.country_name = side.name;
            }
            acc.packets_in += 1;
            acc.bytes_in += packet.length;
            acc.ips.push(side.ip);
        }
    }
    local
}
