//! Network-layer detectors: port scans and ping sweeps.

use std::collections::{HashMap, HashSet};

use crate::detection::AnomalyDetector;
use crate::models::{DetectorCategory, NetworkAnomaly, PacketRecord, Severity};

/// Distinct destination ports one source must probe on a single target
/// before the traffic is flagged as a scan.
const PORT_SCAN_THRESHOLD: usize = 50;
const PORT_SCAN_CRITICAL: usize = 500;

/// Distinct targets one source must ping before an ICMP sweep is flagged.
const PING_SWEEP_THRESHOLD: usize = 20;

/// Flags one source probing many distinct ports on a single target.
#[derive(Default)]
pub struct PortScanDetector;

impl PortScanDetector {
    pub fn new() -> Self {
        PortScanDetector
    }
}

impl AnomalyDetector for PortScanDetector {
    fn name(&self) -> &'static str {
        "port-scan"
    }

    fn category(&self) -> DetectorCategory {
        DetectorCategory::Network
    }

    fn detect(&self, packets: &[PacketRecord]) -> Vec<NetworkAnomaly> {
        let mut probed: HashMap<(&str, &str), HashSet<u16>> = HashMap::new();
        for packet in packets {
            if packet.dest_port == 0 || packet.source_ip.is_empty() || packet.dest_ip.is_empty() {
                continue;
            }
            probed
                .entry((&packet.source_ip, &packet.dest_ip))
                .or_default()
                .insert(packet.dest_port);
        }

        probed
            .into_iter()
            .filter(|(_, ports)| ports.len() >= PORT_SCAN_THRESHOLD)
            .map(|((source, target), ports)| {
                let severity = if ports.len() >= PORT_SCAN_CRITICAL {
                    Severity::Critical
                } else {
                    Severity::High
                };
                NetworkAnomaly::new(
                    "Port Scan",
                    DetectorCategory::Network,
                    severity,
                    format!(
                        "{} probed {} distinct ports on {}",
                        source,
                        ports.len(),
                        target
                    ),
                )
                .with_endpoints(vec![source.to_string(), target.to_string()])
                .with_evidence("distinct_ports", ports.len().to_string())
            })
            .collect()
    }
}

/// Flags one source sending ICMP echoes to many distinct targets.
#[derive(Default)]
pub struct PingSweepDetector;

impl PingSweepDetector {
    pub fn new() -> Self {
        PingSweepDetector
    }
}

impl AnomalyDetector for PingSweepDetector {
    fn name(&self) -> &'static str {
        "ping-sweep"
    }

    fn category(&self) -> DetectorCategory {
        DetectorCategory::Network
    }

    fn can_detect(&self, packets: &[PacketRecord]) -> bool {
        packets
            .iter()
            .any(|p| p.protocol.eq_ignore_ascii_case("icmp") || p.protocol.eq_ignore_ascii_case("icmpv6"))
    }

    fn detect(&self, packets: &[PacketRecord]) -> Vec<NetworkAnomaly> {
        let mut targets: HashMap<&str, HashSet<&str>> = HashMap::new();
        for packet in packets {
            let is_icmp = packet.protocol.eq_ignore_ascii_case("icmp")
                || packet.protocol.eq_ignore_ascii_case("icmpv6");
            if !is_icmp || packet.source_ip.is_empty() || packet.dest_ip.is_empty() {
                continue;
            }
            targets
                .entry(&packet.source_ip)
                .or_default()
                .insert(&packet.dest_ip);
        }

        targets
            .into_iter()
            .filter(|(_, dsts)| dsts.len() >= PING_SWEEP_THRESHOLD)
            .map(|(source, dsts)| {
                NetworkAnomaly::new(
                    "Ping Sweep",
                    DetectorCategory::Network,
                    Severity::Medium,
                    format!("{} sent ICMP echoes to {} distinct hosts", source, dsts.len()),
                )
                .with_endpoints(vec![source.to_string()])
                .with_evidence("target_count", dsts.len().to_string())
            })
            .collect()
    }
}
