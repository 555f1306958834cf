//! Application-layer detectors: DNS tunneling and suspicious payload text.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::RegexSet;

use crate::detection::AnomalyDetector;
use crate::models::{DetectorCategory, NetworkAnomaly, PacketRecord, Severity};

/// Longest DNS label a legitimate zone is likely to carry.
const MAX_LABEL_LENGTH: usize = 52;
/// Query names longer than this are treated as encoded payloads.
const MAX_NAME_LENGTH: usize = 100;
/// Suspicious queries one source must issue before being flagged.
const TUNNEL_QUERY_THRESHOLD: usize = 5;

static PAYLOAD_PATTERNS: Lazy<RegexSet> = Lazy::new(|| {
    RegexSet::new([
        r"(?i)union\s+select",
        r"(?i)<script>",
        r"(?i)cmd\.exe",
        r"(?i)powershell\s+-enc",
        r"(?i)/etc/passwd",
        r"(?i)shellcode",
        r"(?i)\beval\s*\(",
    ])
    .expect("payload patterns are valid regexes")
});

fn is_dns(packet: &PacketRecord) -> bool {
    packet
        .app_protocol
        .as_deref()
        .map(|p| p.eq_ignore_ascii_case("dns"))
        .unwrap_or(false)
        || packet.dest_port == 53
        || packet.source_port == 53
}

/// Pull the query name out of a dissector info line: the longest
/// dot-separated token.
fn query_name(info: &str) -> Option<&str> {
    info.split_whitespace()
        .filter(|token| token.contains('.'))
        .max_by_key(|token| token.len())
}

fn looks_tunneled(name: &str) -> bool {
    if name.len() > MAX_NAME_LENGTH {
        return true;
    }
    name.split('.').any(|label| label.len() > MAX_LABEL_LENGTH)
}

/// Flags sources issuing DNS queries with oversized, payload-like names.
#[derive(Default)]
pub struct DnsTunnelingDetector;

impl DnsTunnelingDetector {
    pub fn new() -> Self {
        DnsTunnelingDetector
    }
}

impl AnomalyDetector for DnsTunnelingDetector {
    fn name(&self) -> &'static str {
        "dns-tunneling"
    }

    fn category(&self) -> DetectorCategory {
        DetectorCategory::Application
    }

    fn can_detect(&self, packets: &[PacketRecord]) -> bool {
        packets.iter().any(is_dns)
    }

    fn detect(&self, packets: &[PacketRecord]) -> Vec<NetworkAnomaly> {
        let mut suspicious: HashMap<&str, usize> = HashMap::new();
        for packet in packets {
            if !is_dns(packet) || packet.source_ip.is_empty() {
                continue;
            }
            let Some(info) = &packet.info else { continue };
            let Some(name) = query_name(info) else { continue };
            if looks_tunneled(name) {
                *suspicious.entry(&packet.source_ip).or_insert(0) += 1;
            }
        }

        suspicious
            .into_iter()
            .filter(|(_, count)| *count >= TUNNEL_QUERY_THRESHOLD)
            .map(|(source, count)| {
                NetworkAnomaly::new(
                    "DNS Tunneling",
                    DetectorCategory::Application,
                    Severity::High,
                    format!(
                        "{} issued {} DNS queries with payload-sized names",
                        source, count
                    ),
                )
                .with_endpoints(vec![source.to_string()])
                .with_evidence("suspicious_queries", count.to_string())
            })
            .collect()
    }
}

/// Flags dissector info text matching known attack-tool patterns.
#[derive(Default)]
pub struct SuspiciousPayloadDetector;

impl SuspiciousPayloadDetector {
    pub fn new() -> Self {
        SuspiciousPayloadDetector
    }
}

impl AnomalyDetector for SuspiciousPayloadDetector {
    fn name(&self) -> &'static str {
        "suspicious-payload"
    }

    fn category(&self) -> DetectorCategory {
        DetectorCategory::Application
    }

    fn detect(&self, packets: &[PacketRecord]) -> Vec<NetworkAnomaly> {
        let mut matches: HashMap<&str, usize> = HashMap::new();
        for packet in packets {
            if packet.source_ip.is_empty() {
                continue;
            }
            let Some(info) = &packet.info else { continue };
            if PAYLOAD_PATTERNS.is_match(info) {
                *matches.entry(&packet.source_ip).or_insert(0) += 1;
            }
        }

        matches
            .into_iter()
            .map(|(source, count)| {
                NetworkAnomaly::new(
                    "Suspicious Payload",
                    DetectorCategory::Application,
                    Severity::Medium,
                    format!(
                        "{} sent {} packets matching attack-tool patterns",
                        source, count
                    ),
                )
                .with_endpoints(vec![source.to_string()])
                .with_evidence("matching_packets", count.to_string())
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dns_packet(src: &str, name: &str) -> PacketRecord {
        PacketRecord {
            timestamp: 1700000000.0,
            frame_number: 0,
            length: 90,
            protocol: "UDP".to_string(),
            source_ip: src.to_string(),
            dest_ip: "8.8.8.8".to_string(),
            source_port: 40000,
            dest_port: 53,
            app_protocol: Some("DNS".to_string()),
            info: Some(format!("Standard query 0x1a2b A {}", name)),
        }
    }

    #[test]
    fn test_tunneled_names_flagged() {
        let encoded = format!("{}.tunnel.example.com", "a".repeat(60));
        let packets: Vec<PacketRecord> =
            (0..6).map(|_| dns_packet("10.0.0.5", &encoded)).collect();

        let detector = DnsTunnelingDetector::new();
        assert!(detector.can_detect(&packets));

        let findings = detector.detect(&packets);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].anomaly_type, "DNS Tunneling");
    }

    #[test]
    fn test_normal_queries_pass() {
        let packets: Vec<PacketRecord> = (0..20)
            .map(|_| dns_packet("10.0.0.5", "www.example.com"))
            .collect();
        assert!(DnsTunnelingDetector::new().detect(&packets).is_empty());
    }

    #[test]
    fn test_payload_patterns_matched() {
        let mut packet = dns_packet("10.0.0.5", "www.example.com");
        packet.info = Some("GET /login?user=admin' UNION SELECT password FROM users".to_string());

        let findings = SuspiciousPayloadDetector::new().detect(&[packet]);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].severity, Severity::Medium);
    }

    #[test]
    fn test_benign_info_ignored() {
        let packet = dns_packet("10.0.0.5", "www.example.com");
        assert!(SuspiciousPayloadDetector::new().detect(&[packet]).is_empty());
    }
}
