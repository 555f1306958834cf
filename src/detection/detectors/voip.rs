//! VoIP detectors.

use std::collections::HashMap;

use crate::detection::AnomalyDetector;
use crate::models::{DetectorCategory, NetworkAnomaly, PacketRecord, Severity};

const SIP_PORT: u16 = 5060;
/// SIP requests one source must send before a flood is flagged.
const SIP_FLOOD_THRESHOLD: usize = 50;
const SIP_FLOOD_HIGH: usize = 200;

fn is_sip(packet: &PacketRecord) -> bool {
    packet
        .app_protocol
        .as_deref()
        .map(|p| p.eq_ignore_ascii_case("sip"))
        .unwrap_or(false)
        || packet.dest_port == SIP_PORT
        || packet.source_port == SIP_PORT
}

/// Flags REGISTER/INVITE bursts typical of SIP scanners and toll-fraud
/// tooling.
#[derive(Default)]
pub struct SipFloodDetector;

impl SipFloodDetector {
    pub fn new() -> Self {
        SipFloodDetector
    }
}

impl AnomalyDetector for SipFloodDetector {
    fn name(&self) -> &'static str {
        "sip-flood"
    }

    fn category(&self) -> DetectorCategory {
        DetectorCategory::Voip
    }

    fn can_detect(&self, packets: &[PacketRecord]) -> bool {
        packets.iter().any(is_sip)
    }

    fn detect(&self, packets: &[PacketRecord]) -> Vec<NetworkAnomaly> {
        let mut requests: HashMap<&str, usize> = HashMap::new();
        for packet in packets {
            if !is_sip(packet) || packet.source_ip.is_empty() {
                continue;
            }
            let Some(info) = &packet.info else { continue };
            if info.contains("REGISTER") || info.contains("INVITE") {
                *requests.entry(&packet.source_ip).or_insert(0) += 1;
            }
        }

        requests
            .into_iter()
            .filter(|(_, count)| *count >= SIP_FLOOD_THRESHOLD)
            .map(|(source, count)| {
                let severity = if count >= SIP_FLOOD_HIGH {
                    Severity::High
                } else {
                    Severity::Medium
                };
                NetworkAnomaly::new(
                    "SIP Flood",
                    DetectorCategory::Voip,
                    severity,
                    format!("{} sent {} SIP REGISTER/INVITE requests", source, count),
                )
                .with_endpoints(vec![source.to_string()])
                .with_evidence("request_count", count.to_string())
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sip_packet(src: &str, method: &str) -> PacketRecord {
        PacketRecord {
            timestamp: 1700000000.0,
            frame_number: 0,
            length: 400,
            protocol: "UDP".to_string(),
            source_ip: src.to_string(),
            dest_ip: "198.51.100.20".to_string(),
            source_port: 40000,
            dest_port: SIP_PORT,
            app_protocol: Some("SIP".to_string()),
            info: Some(format!("Request: {} sip:100@example.com", method)),
        }
    }

    #[test]
    fn test_register_burst_flagged() {
        let packets: Vec<PacketRecord> = (0..60)
            .map(|_| sip_packet("192.0.2.9", "REGISTER"))
            .collect();

        let detector = SipFloodDetector::new();
        assert!(detector.can_detect(&packets));

        let findings = detector.detect(&packets);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].severity, Severity::Medium);
    }

    #[test]
    fn test_gate_rejects_non_sip_traffic() {
        let mut packet = sip_packet("192.0.2.9", "REGISTER");
        packet.app_protocol = None;
        packet.dest_port = 443;
        packet.source_port = 40000;
        assert!(!SipFloodDetector::new().can_detect(&[packet]));
    }

    #[test]
    fn test_responses_not_counted() {
        let mut packets = Vec::new();
        for _ in 0..60 {
            let mut p = sip_packet("192.0.2.9", "REGISTER");
            p.info = Some("Status: 200 OK".to_string());
            packets.push(p);
        }
        assert!(SipFloodDetector::new().detect(&packets).is_empty());
    }
}
