//! IoT detectors.

use std::collections::{HashMap, HashSet};

use crate::detection::AnomalyDetector;
use crate::models::{DetectorCategory, NetworkAnomaly, PacketRecord, Severity};

/// Ports associated with IoT management and messaging protocols: Telnet,
/// Telnet-alt, MQTT, MQTT-TLS, CoAP.
const IOT_PORTS: [u16; 5] = [23, 2323, 1883, 8883, 5683];

/// Distinct devices one source must probe before a sweep is flagged.
const SWEEP_THRESHOLD: usize = 10;
const SWEEP_HIGH: usize = 50;

fn touches_iot_port(packet: &PacketRecord) -> bool {
    IOT_PORTS.contains(&packet.dest_port)
}

/// Flags one source probing IoT protocol ports across many devices,
/// the spreading pattern of Mirai-style botnets.
#[derive(Default)]
pub struct IotProtocolSweepDetector;

impl IotProtocolSweepDetector {
    pub fn new() -> Self {
        IotProtocolSweepDetector
    }
}

impl AnomalyDetector for IotProtocolSweepDetector {
    fn name(&self) -> &'static str {
        "iot-protocol-sweep"
    }

    fn category(&self) -> DetectorCategory {
        DetectorCategory::Iot
    }

    fn can_detect(&self, packets: &[PacketRecord]) -> bool {
        packets.iter().any(touches_iot_port)
    }

    fn detect(&self, packets: &[PacketRecord]) -> Vec<NetworkAnomaly> {
        let mut probed: HashMap<&str, HashSet<&str>> = HashMap::new();
        for packet in packets {
            if !touches_iot_port(packet)
                || packet.source_ip.is_empty()
                || packet.dest_ip.is_empty()
            {
                continue;
            }
            probed
                .entry(&packet.source_ip)
                .or_default()
                .insert(&packet.dest_ip);
        }

        probed
            .into_iter()
            .filter(|(_, devices)| devices.len() >= SWEEP_THRESHOLD)
            .map(|(source, devices)| {
                let severity = if devices.len() >= SWEEP_HIGH {
                    Severity::High
                } else {
                    Severity::Medium
                };
                NetworkAnomaly::new(
                    "IoT Protocol Sweep",
                    DetectorCategory::Iot,
                    severity,
                    format!(
                        "{} probed IoT service ports on {} distinct devices",
                        source,
                        devices.len()
                    ),
                )
                .with_endpoints(vec![source.to_string()])
                .with_evidence("device_count", devices.len().to_string())
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn telnet_packet(src: &str, dst: &str) -> PacketRecord {
        PacketRecord {
            timestamp: 1700000000.0,
            frame_number: 0,
            length: 60,
            protocol: "TCP".to_string(),
            source_ip: src.to_string(),
            dest_ip: dst.to_string(),
            source_port: 40000,
            dest_port: 23,
            app_protocol: None,
            info: None,
        }
    }

    #[test]
    fn test_sweep_flagged() {
        let packets: Vec<PacketRecord> = (0..15)
            .map(|i| telnet_packet("203.0.113.7", &format!("10.0.0.{}", i + 1)))
            .collect();

        let detector = IotProtocolSweepDetector::new();
        assert!(detector.can_detect(&packets));

        let findings = detector.detect(&packets);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].severity, Severity::Medium);
        assert_eq!(findings[0].evidence.get("device_count").unwrap(), "15");
    }

    #[test]
    fn test_single_device_session_passes() {
        let packets: Vec<PacketRecord> = (0..100)
            .map(|_| telnet_packet("10.0.0.1", "10.0.0.2"))
            .collect();
        assert!(IotProtocolSweepDetector::new().detect(&packets).is_empty());
    }
}
