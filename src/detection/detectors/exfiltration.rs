//! Exfiltration detectors.

use std::collections::HashMap;
use std::net::IpAddr;

use crate::detection::AnomalyDetector;
use crate::geolocation::classify::is_public_ip;
use crate::models::{DetectorCategory, NetworkAnomaly, PacketRecord, Severity};

/// Outbound bytes from one internal host to one external destination
/// before the transfer is flagged.
const EXFIL_BYTES_THRESHOLD: u64 = 50 * 1024 * 1024;
const EXFIL_BYTES_CRITICAL: u64 = 500 * 1024 * 1024;

/// Flags large one-way transfers from an internal host to a single
/// external destination.
#[derive(Default)]
pub struct DataExfiltrationDetector;

impl DataExfiltrationDetector {
    pub fn new() -> Self {
        DataExfiltrationDetector
    }
}

impl AnomalyDetector for DataExfiltrationDetector {
    fn name(&self) -> &'static str {
        "data-exfiltration"
    }

    fn category(&self) -> DetectorCategory {
        DetectorCategory::Exfiltration
    }

    fn detect(&self, packets: &[PacketRecord]) -> Vec<NetworkAnomaly> {
        let mut outbound: HashMap<(&str, &str), u64> = HashMap::new();
        for packet in packets {
            let (Ok(src), Ok(dst)) = (
                packet.source_ip.parse::<IpAddr>(),
                packet.dest_ip.parse::<IpAddr>(),
            ) else {
                continue;
            };
            // Internal-to-external only: the interesting direction.
            if is_public_ip(&src) || !is_public_ip(&dst) {
                continue;
            }
            *outbound
                .entry((&packet.source_ip, &packet.dest_ip))
                .or_insert(0) += packet.length;
        }

        outbound
            .into_iter()
            .filter(|(_, bytes)| *bytes >= EXFIL_BYTES_THRESHOLD)
            .map(|((source, dest), bytes)| {
                let severity = if bytes >= EXFIL_BYTES_CRITICAL {
                    Severity::Critical
                } else {
                    Severity::High
                };
                NetworkAnomaly::new(
                    "Data Exfiltration",
                    DetectorCategory::Exfiltration,
                    severity,
                    format!(
                        "{} uploaded {} MiB to external host {}",
                        source,
                        bytes / (1024 * 1024),
                        dest
                    ),
                )
                .with_endpoints(vec![source.to_string(), dest.to_string()])
                .with_evidence("outbound_bytes", bytes.to_string())
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upload_packet(src: &str, dst: &str, length: u64) -> PacketRecord {
        PacketRecord {
            timestamp: 1700000000.0,
            frame_number: 0,
            length,
            protocol: "TCP".to_string(),
            source_ip: src.to_string(),
            dest_ip: dst.to_string(),
            source_port: 40000,
            dest_port: 443,
            app_protocol: None,
            info: None,
        }
    }

    #[test]
    fn test_large_upload_flagged() {
        let packets: Vec<PacketRecord> = (0..60)
            .map(|_| upload_packet("10.0.0.5", "203.0.114.9", 1024 * 1024))
            .collect();

        let findings = DataExfiltrationDetector::new().detect(&packets);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].severity, Severity::High);
        assert!(findings[0]
            .affected_endpoints
            .contains(&"10.0.0.5".to_string()));
    }

    #[test]
    fn test_internal_transfer_ignored() {
        let packets: Vec<PacketRecord> = (0..60)
            .map(|_| upload_packet("10.0.0.5", "10.0.0.6", 1024 * 1024))
            .collect();
        assert!(DataExfiltrationDetector::new().detect(&packets).is_empty());
    }

    #[test]
    fn test_inbound_download_ignored() {
        let packets: Vec<PacketRecord> = (0..60)
            .map(|_| upload_packet("203.0.114.9", "10.0.0.5", 1024 * 1024))
            .collect();
        assert!(DataExfiltrationDetector::new().detect(&packets).is_empty());
    }
}
