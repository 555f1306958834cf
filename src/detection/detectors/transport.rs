//! Transport-layer detectors.

use std::collections::{HashMap, HashSet};

use crate::detection::AnomalyDetector;
use crate::models::{DetectorCategory, NetworkAnomaly, PacketRecord, Severity};

/// Bare SYNs one target must receive before a flood is flagged.
const SYN_FLOOD_THRESHOLD: usize = 100;
const SYN_FLOOD_CRITICAL: usize = 1_000;

/// Flags a burst of connection attempts (SYN without ACK in the decoded
/// info line) against one target.
#[derive(Default)]
pub struct SynFloodDetector;

impl SynFloodDetector {
    pub fn new() -> Self {
        SynFloodDetector
    }
}

fn is_bare_syn(packet: &PacketRecord) -> bool {
    if !packet.protocol.eq_ignore_ascii_case("tcp") {
        return false;
    }
    match &packet.info {
        Some(info) => info.contains("SYN") && !info.contains("ACK"),
        None => false,
    }
}

impl AnomalyDetector for SynFloodDetector {
    fn name(&self) -> &'static str {
        "syn-flood"
    }

    fn category(&self) -> DetectorCategory {
        DetectorCategory::Transport
    }

    fn can_detect(&self, packets: &[PacketRecord]) -> bool {
        packets.iter().any(is_bare_syn)
    }

    fn detect(&self, packets: &[PacketRecord]) -> Vec<NetworkAnomaly> {
        let mut syn_counts: HashMap<&str, usize> = HashMap::new();
        let mut syn_sources: HashMap<&str, HashSet<&str>> = HashMap::new();
        for packet in packets {
            if !is_bare_syn(packet) || packet.dest_ip.is_empty() {
                continue;
            }
            *syn_counts.entry(&packet.dest_ip).or_insert(0) += 1;
            if !packet.source_ip.is_empty() {
                syn_sources
                    .entry(&packet.dest_ip)
                    .or_default()
                    .insert(&packet.source_ip);
            }
        }

        syn_counts
            .into_iter()
            .filter(|(_, count)| *count >= SYN_FLOOD_THRESHOLD)
            .map(|(target, count)| {
                let severity = if count >= SYN_FLOOD_CRITICAL {
                    Severity::Critical
                } else {
                    Severity::High
                };
                let sources = syn_sources.get(target).map(|s| s.len()).unwrap_or(0);
                NetworkAnomaly::new(
                    "SYN Flood",
                    DetectorCategory::Transport,
                    severity,
                    format!(
                        "{} received {} bare SYNs from {} distinct sources",
                        target, count, sources
                    ),
                )
                .with_endpoints(vec![target.to_string()])
                .with_evidence("syn_count", count.to_string())
                .with_evidence("source_count", sources.to_string())
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn syn_packet(src: &str, dst: &str) -> PacketRecord {
        PacketRecord {
            timestamp: 1700000000.0,
            frame_number: 0,
            length: 60,
            protocol: "TCP".to_string(),
            source_ip: src.to_string(),
            dest_ip: dst.to_string(),
            source_port: 40000,
            dest_port: 80,
            app_protocol: None,
            info: Some("40000 > 80 [SYN] Seq=0 Win=64240".to_string()),
        }
    }

    #[test]
    fn test_flood_flagged() {
        let packets: Vec<PacketRecord> = (0..150)
            .map(|i| syn_packet(&format!("192.0.2.{}", i % 50), "198.51.100.1"))
            .collect();

        let detector = SynFloodDetector::new();
        assert!(detector.can_detect(&packets));

        let findings = detector.detect(&packets);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].severity, Severity::High);
        assert_eq!(findings[0].evidence.get("syn_count").unwrap(), "150");
    }

    #[test]
    fn test_syn_ack_not_counted() {
        let mut packet = syn_packet("192.0.2.1", "198.51.100.1");
        packet.info = Some("80 > 40000 [SYN, ACK] Seq=0 Ack=1".to_string());

        let detector = SynFloodDetector::new();
        assert!(!detector.can_detect(&[packet]));
    }
}
