//! Streaming statistics aggregator
//!
//! Consumes packet batches of arbitrary size and exposes, at any time, a
//! consistent rolling snapshot without retaining raw packets. One coarse
//! lock guards both ingestion and snapshot construction, so batch sizing
//! directly controls achievable throughput.

pub mod accumulators;
pub mod ports;

use std::collections::{BTreeMap, HashMap, HashSet};
use std::hash::Hash;

use parking_lot::Mutex;
use serde::Serialize;

use crate::config::AggregatorConfig;
use crate::models::PacketRecord;
use accumulators::{
    EndpointAccumulator, FlowAccumulator, FlowKey, PortAccumulator, PortKey, ProtocolAccumulator,
    ThroughputBucket,
};

/// Number of entries reported per top-N table.
const TOP_N: usize = 30;

/// Ports associated with SMB/NetBIOS, used by the threat heuristic.
const SMB_NETBIOS_PORTS: [u16; 4] = [137, 138, 139, 445];

/// Info-text keywords that mark a packet as threatening.
const THREAT_KEYWORDS: [&str; 4] = ["scan", "attack", "malware", "suspicious"];

/// Bounded-memory streaming statistics aggregator.
///
/// Thread-safe: `add_batch`, `build_statistics` and `reset` may be called
/// from any thread; they are mutually exclusive.
pub struct TrafficAggregator {
    config: AggregatorConfig,
    state: Mutex<AggregatorState>,
}

#[derive(Default)]
struct AggregatorState {
    total_packets: u64,
    total_bytes: u64,
    threat_count: u64,
    first_seen: Option<f64>,
    last_seen: Option<f64>,
    unique_ips: HashSet<String>,
    protocols: HashMap<String, ProtocolAccumulator>,
    sources: HashMap<String, EndpointAccumulator>,
    destinations: HashMap<String, EndpointAccumulator>,
    flows: HashMap<FlowKey, FlowAccumulator>,
    ports: HashMap<PortKey, PortAccumulator>,
    throughput: BTreeMap<i64, ThroughputBucket>,
}

impl TrafficAggregator {
    pub fn new(config: AggregatorConfig) -> Self {
        TrafficAggregator {
            config,
            state: Mutex::new(AggregatorState::default()),
        }
    }

    /// Fold a batch of packet records into the running aggregates.
    ///
    /// An empty batch is a no-op. Eviction runs once after the batch, never
    /// mid-update.
    pub fn add_batch(&self, packets: &[PacketRecord]) {
        if packets.is_empty() {
            return;
        }

        let mut state = self.state.lock();
        for packet in packets {
            state.ingest(packet);
        }
        state.evict(&self.config);
    }

    /// Materialize a point-in-time snapshot of the running aggregates.
    pub fn build_statistics(&self) -> TrafficSnapshot {
        let state = self.state.lock();

        let mut protocols: Vec<ProtocolStats> = state
            .protocols
            .iter()
            .map(|(name, acc)| ProtocolStats {
                protocol: name.clone(),
                packets: acc.packets,
                bytes: acc.bytes,
            })
            .collect();
        protocols.sort_by(|a, b| b.packets.cmp(&a.packets));

        let top_sources = top_endpoints(&state.sources);
        let top_destinations = top_endpoints(&state.destinations);

        let mut flows: Vec<FlowStats> = state
            .flows
            .iter()
            .map(|(key, acc)| FlowStats {
                source_ip: key.source_ip.clone(),
                dest_ip: key.dest_ip.clone(),
                source_port: key.source_port,
                dest_port: key.dest_port,
                protocol: key.protocol.clone(),
                packets: acc.packets,
                bytes: acc.bytes,
                first_seen: acc.first_seen,
                last_seen: acc.last_seen,
            })
            .collect();
        flows.sort_by(|a, b| b.packets.cmp(&a.packets));
        flows.truncate(TOP_N);

        let distinct_ports = state.ports.len();
        let mut ports: Vec<PortStats> = state
            .ports
            .iter()
            .map(|(key, acc)| PortStats {
                port: key.port,
                protocol: key.protocol.clone(),
                service: ports::service_name(key.port),
                packets: acc.packets,
                bytes: acc.bytes,
            })
            .collect();
        ports.sort_by(|a, b| b.packets.cmp(&a.packets));
        ports.truncate(TOP_N);

        let throughput: Vec<ThroughputPoint> = state
            .throughput
            .iter()
            .map(|(second, bucket)| ThroughputPoint {
                second: *second,
                packets: bucket.packets,
                bytes: bucket.bytes,
            })
            .collect();

        TrafficSnapshot {
            total_packets: state.total_packets,
            total_bytes: state.total_bytes,
            unique_ip_count: state.unique_ips.len(),
            threat_count: state.threat_count,
            first_seen: state.first_seen,
            last_seen: state.last_seen,
            protocols,
            top_sources,
            top_destinations,
            top_flows: flows,
            distinct_ports,
            top_ports: ports,
            throughput,
        }
    }

    /// Clear all accumulators and counters. The only path back to empty.
    pub fn reset(&self) {
        let mut state = self.state.lock();
        *state = AggregatorState::default();
    }
}

impl AggregatorState {
    fn ingest(&mut self, packet: &PacketRecord) {
        self.total_packets += 1;
        self.total_bytes += packet.length;

        self.first_seen = Some(match self.first_seen {
            Some(t) if t <= packet.timestamp => t,
            _ => packet.timestamp,
        });
        self.last_seen = Some(match self.last_seen {
            Some(t) if t >= packet.timestamp => t,
            _ => packet.timestamp,
        });

        if !packet.source_ip.is_empty() {
            self.unique_ips.insert(packet.source_ip.clone());
        }
        if !packet.dest_ip.is_empty() {
            self.unique_ips.insert(packet.dest_ip.clone());
        }

        self.protocols
            .entry(packet.protocol.clone())
            .or_default()
            .record(packet.length);

        let flow_protocol = packet.flow_protocol().to_string();
        if !packet.source_ip.is_empty() {
            self.sources
                .entry(packet.source_ip.clone())
                .or_default()
                .record(&flow_protocol, packet.length);
        }
        if !packet.dest_ip.is_empty() {
            self.destinations
                .entry(packet.dest_ip.clone())
                .or_default()
                .record(&flow_protocol, packet.length);
        }

        if !packet.source_ip.is_empty() && !packet.dest_ip.is_empty() {
            let key = FlowKey {
                source_ip: packet.source_ip.clone(),
                dest_ip: packet.dest_ip.clone(),
                source_port: packet.source_port,
                dest_port: packet.dest_port,
                protocol: flow_protocol.clone(),
            };
            self.flows
                .entry(key)
                .or_insert_with(|| FlowAccumulator::new(packet.timestamp))
                .record(packet.timestamp, packet.length);
        }

        // Source and destination ports count independently, but a packet
        // whose ports coincide bumps the shared (port, protocol) entry once.
        let mut seen_ports: [Option<u16>; 2] = [None, None];
        for (slot, port) in [packet.source_port, packet.dest_port].into_iter().enumerate() {
            if port == 0 || seen_ports.contains(&Some(port)) {
                continue;
            }
            seen_ports[slot] = Some(port);
            self.ports
                .entry(PortKey {
                    port,
                    protocol: packet.protocol.clone(),
                })
                .or_default()
                .record(packet.length);
        }

        self.throughput
            .entry(packet.second_bucket())
            .or_default()
            .record(packet.length);

        if is_threatening(packet) {
            self.threat_count += 1;
        }
    }

    fn evict(&mut self, config: &AggregatorConfig) {
        evict_lowest_score(&mut self.sources, config.max_endpoints, |acc| acc.score());
        evict_lowest_score(&mut self.destinations, config.max_endpoints, |acc| {
            acc.score()
        });
        evict_lowest_score(&mut self.flows, config.max_flows, |acc| acc.score());

        if let Some(cap) = config.max_throughput_buckets {
            while self.throughput.len() > cap {
                let oldest = *self.throughput.keys().next().unwrap();
                self.throughput.remove(&oldest);
            }
        }
    }
}

/// Remove the `len - ceiling` lowest-score entries. Tie-break order among
/// equal scores is unspecified.
fn evict_lowest_score<K, V, F>(map: &mut HashMap<K, V>, ceiling: usize, score: F)
where
    K: Clone + Eq + Hash,
    F: Fn(&V) -> u64,
{
    if map.len() <= ceiling {
        return;
    }
    let excess = map.len() - ceiling;
    let mut ranked: Vec<(u64, K)> = map.iter().map(|(k, v)| (score(v), k.clone())).collect();
    ranked.sort_by_key(|(s, _)| *s);
    for (_, key) in ranked.into_iter().take(excess) {
        map.remove(&key);
    }
}

/// Cheap heuristic marking a packet as potentially threatening: ICMP
/// traffic, SMB/NetBIOS ports, or dissector info text mentioning a threat
/// keyword.
fn is_threatening(packet: &PacketRecord) -> bool {
    let protocol = packet.protocol.to_ascii_lowercase();
    if protocol == "icmp" || protocol == "icmpv6" {
        return true;
    }
    if SMB_NETBIOS_PORTS.contains(&packet.source_port)
        || SMB_NETBIOS_PORTS.contains(&packet.dest_port)
    {
        return true;
    }
    if let Some(info) = &packet.info {
        let info = info.to_ascii_lowercase();
        if THREAT_KEYWORDS.iter().any(|kw| info.contains(kw)) {
            return true;
        }
    }
    false
}

fn top_endpoints(map: &HashMap<String, EndpointAccumulator>) -> Vec<EndpointStats> {
    let mut endpoints: Vec<EndpointStats> = map
        .iter()
        .map(|(address, acc)| EndpointStats {
            address: address.clone(),
            packets: acc.packets,
            bytes: acc.bytes,
            protocols: acc.protocols.clone(),
        })
        .collect();
    endpoints.sort_by(|a, b| b.packets.cmp(&a.packets));
    endpoints.truncate(TOP_N);
    endpoints
}

/// Immutable point-in-time view of the running aggregates.
#[derive(Debug, Clone, Serialize)]
pub struct TrafficSnapshot {
    pub total_packets: u64,
    pub total_bytes: u64,
    pub unique_ip_count: usize,
    pub threat_count: u64,
    pub first_seen: Option<f64>,
    pub last_seen: Option<f64>,
    /// Protocol table, packet count descending.
    pub protocols: Vec<ProtocolStats>,
    pub top_sources: Vec<EndpointStats>,
    pub top_destinations: Vec<EndpointStats>,
    pub top_flows: Vec<FlowStats>,
    /// Total distinct (port, protocol) pairs observed.
    pub distinct_ports: usize,
    pub top_ports: Vec<PortStats>,
    /// One point per populated second, time-ordered.
    pub throughput: Vec<ThroughputPoint>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProtocolStats {
    pub protocol: String,
    pub packets: u64,
    pub bytes: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct EndpointStats {
    pub address: String,
    pub packets: u64,
    pub bytes: u64,
    pub protocols: HashMap<String, u64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FlowStats {
    pub source_ip: String,
    pub dest_ip: String,
    pub source_port: u16,
    pub dest_port: u16,
    pub protocol: String,
    pub packets: u64,
    pub bytes: u64,
    pub first_seen: f64,
    pub last_seen: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PortStats {
    pub port: u16,
    pub protocol: String,
    /// Well-known service label, when the port is tabled.
    pub service: Option<&'static str>,
    pub packets: u64,
    pub bytes: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ThroughputPoint {
    pub second: i64,
    pub packets: u64,
    pub bytes: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn packet(src: &str, dst: &str, sport: u16, dport: u16, ts: f64) -> PacketRecord {
        PacketRecord {
            timestamp: ts,
            frame_number: 0,
            length: 100,
            protocol: "TCP".to_string(),
            source_ip: src.to_string(),
            dest_ip: dst.to_string(),
            source_port: sport,
            dest_port: dport,
            app_protocol: None,
            info: None,
        }
    }

    fn default_aggregator() -> TrafficAggregator {
        TrafficAggregator::new(crate::config::Config::default().aggregator)
    }

    #[test]
    fn test_empty_batch_is_noop() {
        let aggregator = default_aggregator();
        aggregator.add_batch(&[]);
        let snapshot = aggregator.build_statistics();
        assert_eq!(snapshot.total_packets, 0);
        assert!(snapshot.first_seen.is_none());
    }

    #[test]
    fn test_split_batches_match_single_batch() {
        let b1: Vec<PacketRecord> = (0..10)
            .map(|i| packet("10.0.0.1", "10.0.0.2", 50000, 80, 100.0 + i as f64))
            .collect();
        let b2: Vec<PacketRecord> = (0..7)
            .map(|i| packet("10.0.0.3", "10.0.0.4", 50001, 443, 200.0 + i as f64))
            .collect();

        let split = default_aggregator();
        split.add_batch(&b1);
        split.add_batch(&b2);

        let combined: Vec<PacketRecord> = b1.iter().chain(b2.iter()).cloned().collect();
        let single = default_aggregator();
        single.add_batch(&combined);

        let s1 = split.build_statistics();
        let s2 = single.build_statistics();
        assert_eq!(s1.total_packets, s2.total_packets);
        assert_eq!(s1.total_bytes, s2.total_bytes);
        assert_eq!(s1.unique_ip_count, s2.unique_ip_count);
    }

    #[test]
    fn test_reset_returns_to_empty() {
        let aggregator = default_aggregator();
        aggregator.add_batch(&[packet("10.0.0.1", "10.0.0.2", 50000, 80, 100.0)]);
        aggregator.reset();

        let snapshot = aggregator.build_statistics();
        assert_eq!(snapshot.total_packets, 0);
        assert_eq!(snapshot.total_bytes, 0);
        assert!(snapshot.protocols.is_empty());
        assert!(snapshot.top_flows.is_empty());
        assert!(snapshot.throughput.is_empty());
    }

    #[test]
    fn test_single_conversation_aggregates_to_one_flow() {
        let aggregator = default_aggregator();
        let packets: Vec<PacketRecord> = (0..10_000)
            .map(|i| packet("10.0.0.1", "10.0.0.2", 51000, 443, 100.0 + (i % 60) as f64))
            .collect();
        aggregator.add_batch(&packets);

        let snapshot = aggregator.build_statistics();
        assert_eq!(snapshot.top_flows.len(), 1);
        assert_eq!(snapshot.top_flows[0].packets, 10_000);
        assert_eq!(snapshot.total_packets, 10_000);
    }

    #[test]
    fn test_endpoint_ceiling_enforced() {
        let config = AggregatorConfig {
            max_endpoints: 5_000,
            max_flows: 10_000,
            max_throughput_buckets: None,
        };
        let aggregator = TrafficAggregator::new(config);

        let packets: Vec<PacketRecord> = (0..6_000)
            .map(|i| {
                packet(
                    &format!("10.{}.{}.{}", i / 65536, (i / 256) % 256, i % 256),
                    "192.0.2.1",
                    40000,
                    80,
                    100.0,
                )
            })
            .collect();
        aggregator.add_batch(&packets);

        let state = aggregator.state.lock();
        assert!(state.sources.len() <= 5_000);
    }

    #[test]
    fn test_eviction_keeps_highest_score() {
        let config = AggregatorConfig {
            max_endpoints: 1,
            max_flows: 10,
            max_throughput_buckets: None,
        };
        let aggregator = TrafficAggregator::new(config);

        let mut packets = vec![packet("10.0.0.9", "192.0.2.1", 40000, 80, 100.0)];
        for _ in 0..5 {
            packets.push(packet("10.0.0.1", "192.0.2.1", 40001, 80, 100.0));
        }
        aggregator.add_batch(&packets);

        let snapshot = aggregator.build_statistics();
        assert_eq!(snapshot.top_sources.len(), 1);
        assert_eq!(snapshot.top_sources[0].address, "10.0.0.1");
        assert_eq!(snapshot.top_sources[0].packets, 5);
    }

    #[test]
    fn test_equal_ports_count_once() {
        let aggregator = default_aggregator();
        aggregator.add_batch(&[packet("10.0.0.1", "10.0.0.2", 53, 53, 100.0)]);

        let snapshot = aggregator.build_statistics();
        assert_eq!(snapshot.distinct_ports, 1);
        assert_eq!(snapshot.top_ports[0].packets, 1);
    }

    #[test]
    fn test_port_zero_skipped() {
        let aggregator = default_aggregator();
        let mut record = packet("10.0.0.1", "10.0.0.2", 0, 0, 100.0);
        record.protocol = "ICMP".to_string();
        aggregator.add_batch(&[record]);

        let snapshot = aggregator.build_statistics();
        assert_eq!(snapshot.distinct_ports, 0);
    }

    #[test]
    fn test_threat_heuristic() {
        let aggregator = default_aggregator();

        let mut icmp = packet("10.0.0.1", "10.0.0.2", 0, 0, 100.0);
        icmp.protocol = "ICMP".to_string();

        let smb = packet("10.0.0.1", "10.0.0.2", 49832, 445, 101.0);

        let mut flagged = packet("10.0.0.1", "10.0.0.2", 50000, 80, 102.0);
        flagged.info = Some("Possible port SCAN in progress".to_string());

        let benign = packet("10.0.0.1", "10.0.0.2", 50001, 443, 103.0);

        aggregator.add_batch(&[icmp, smb, flagged, benign]);
        let snapshot = aggregator.build_statistics();
        assert_eq!(snapshot.threat_count, 3);
    }

    #[test]
    fn test_throughput_buckets_time_ordered() {
        let aggregator = default_aggregator();
        aggregator.add_batch(&[
            packet("10.0.0.1", "10.0.0.2", 50000, 80, 102.7),
            packet("10.0.0.1", "10.0.0.2", 50000, 80, 100.1),
            packet("10.0.0.1", "10.0.0.2", 50000, 80, 100.9),
        ]);

        let snapshot = aggregator.build_statistics();
        assert_eq!(snapshot.throughput.len(), 2);
        assert_eq!(snapshot.throughput[0].second, 100);
        assert_eq!(snapshot.throughput[0].packets, 2);
        assert_eq!(snapshot.throughput[1].second, 102);
    }

    #[test]
    fn test_protocol_table_sorted_descending() {
        let aggregator = default_aggregator();
        let mut packets = Vec::new();
        for _ in 0..3 {
            let mut p = packet("10.0.0.1", "10.0.0.2", 50000, 443, 100.0);
            p.protocol = "UDP".to_string();
            packets.push(p);
        }
        packets.push(packet("10.0.0.1", "10.0.0.2", 50000, 80, 100.0));
        aggregator.add_batch(&packets);

        let snapshot = aggregator.build_statistics();
        assert_eq!(snapshot.protocols[0].protocol, "UDP");
        assert_eq!(snapshot.protocols[0].packets, 3);
    }
}
