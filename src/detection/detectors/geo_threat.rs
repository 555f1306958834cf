//! Geo-threat detector.
//!
//! Unlike the other built-ins this detector needs context beyond the
//! packet set: a resolved IP-to-country map from a prior geolocation
//! pass, supplied at construction time.

use std::collections::{HashMap, HashSet};

use crate::detection::AnomalyDetector;
use crate::geolocation::risk;
use crate::models::{DetectorCategory, NetworkAnomaly, PacketRecord, Severity};

/// Flags traffic exchanged with countries in the static high-risk table.
pub struct HighRiskCountryDetector {
    /// IP (text form) to resolved country code.
    ip_countries: HashMap<String, String>,
}

impl HighRiskCountryDetector {
    pub fn new(ip_countries: HashMap<String, String>) -> Self {
        HighRiskCountryDetector { ip_countries }
    }

    fn country_of(&self, ip: &str) -> Option<&str> {
        self.ip_countries.get(ip).map(String::as_str)
    }
}

impl AnomalyDetector for HighRiskCountryDetector {
    fn name(&self) -> &'static str {
        "high-risk-country"
    }

    fn category(&self) -> DetectorCategory {
        DetectorCategory::GeoThreat
    }

    fn can_detect(&self, _packets: &[PacketRecord]) -> bool {
        !self.ip_countries.is_empty()
    }

    fn detect(&self, packets: &[PacketRecord]) -> Vec<NetworkAnomaly> {
        struct RiskTraffic<'a> {
            packets: u64,
            bytes: u64,
            remote_ips: HashSet<&'a str>,
            local_ips: HashSet<&'a str>,
        }

        let mut per_country: HashMap<&str, RiskTraffic> = HashMap::new();
        for packet in packets {
            for (remote, local) in [
                (&packet.dest_ip, &packet.source_ip),
                (&packet.source_ip, &packet.dest_ip),
            ] {
                let Some(code) = self.country_of(remote) else {
                    continue;
                };
                if !risk::is_high_risk(code) {
                    continue;
                }
                let entry = per_country.entry(code).or_insert_with(|| RiskTraffic {
                    packets: 0,
                    bytes: 0,
                    remote_ips: HashSet::new(),
                    local_ips: HashSet::new(),
                });
                entry.packets += 1;
                entry.bytes += packet.length;
                entry.remote_ips.insert(remote);
                if !local.is_empty() {
                    entry.local_ips.insert(local);
                }
            }
        }

        per_country
            .into_iter()
            .map(|(code, traffic)| {
                let info = risk::risk_info(code);
                let country_name = info.map(|i| i.country_name).unwrap_or(code);
                let mut anomaly = NetworkAnomaly::new(
                    "High-Risk Country Traffic",
                    DetectorCategory::GeoThreat,
                    Severity::High,
                    format!(
                        "{} packets exchanged with {} hosts in {}",
                        traffic.packets,
                        traffic.remote_ips.len(),
                        country_name
                    ),
                )
                .with_endpoints(
                    traffic
                        .remote_ips
                        .iter()
                        .chain(traffic.local_ips.iter())
                        .map(|ip| ip.to_string())
                        .collect(),
                )
                .with_evidence("country", code)
                .with_evidence("packets", traffic.packets.to_string())
                .with_evidence("bytes", traffic.bytes.to_string());
                if let Some(info) = info {
                    anomaly = anomaly
                        .with_evidence("reason", info.reason)
                        .with_evidence("known_threats", info.known_threats.join(", "));
                }
                anomaly
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn packet(src: &str, dst: &str) -> PacketRecord {
        PacketRecord {
            timestamp: 1700000000.0,
            frame_number: 0,
            length: 100,
            protocol: "TCP".to_string(),
            source_ip: src.to_string(),
            dest_ip: dst.to_string(),
            source_port: 40000,
            dest_port: 443,
            app_protocol: None,
            info: None,
        }
    }

    fn countries() -> HashMap<String, String> {
        let mut map = HashMap::new();
        map.insert("175.45.178.1".to_string(), "KP".to_string());
        map.insert("93.184.216.34".to_string(), "US".to_string());
        map
    }

    #[test]
    fn test_high_risk_destination_flagged() {
        let detector = HighRiskCountryDetector::new(countries());
        let packets = vec![
            packet("10.0.0.5", "175.45.178.1"),
            packet("175.45.178.1", "10.0.0.5"),
            packet("10.0.0.5", "93.184.216.34"),
        ];

        let findings = detector.detect(&packets);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].evidence.get("country").unwrap(), "KP");
        assert_eq!(findings[0].evidence.get("packets").unwrap(), "2");
        assert!(findings[0]
            .evidence
            .get("known_threats")
            .unwrap()
            .contains("Lazarus"));
    }

    #[test]
    fn test_empty_map_gates_off() {
        let detector = HighRiskCountryDetector::new(HashMap::new());
        assert!(!detector.can_detect(&[packet("10.0.0.5", "175.45.178.1")]));
    }
}
