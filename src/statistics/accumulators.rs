//! Accumulator family owned by the streaming aggregator.
//!
//! Counters are monotonically non-decreasing until the aggregator resets.
//! Each accumulator exposes a `score` (packet count) used only to rank
//! entries during eviction.

use std::collections::HashMap;

/// Per-protocol packet and byte totals.
#[derive(Debug, Clone, Default)]
pub struct ProtocolAccumulator {
    pub packets: u64,
    pub bytes: u64,
}

impl ProtocolAccumulator {
    pub fn record(&mut self, bytes: u64) {
        self.packets += 1;
        self.bytes += bytes;
    }
}

/// Per-endpoint totals with a per-protocol packet sub-breakdown.
#[derive(Debug, Clone, Default)]
pub struct EndpointAccumulator {
    pub packets: u64,
    pub bytes: u64,
    pub protocols: HashMap<String, u64>,
}

impl EndpointAccumulator {
    pub fn record(&mut self, protocol: &str, bytes: u64) {
        self.packets += 1;
        self.bytes += bytes;
        *self.protocols.entry(protocol.to_string()).or_insert(0) += 1;
    }

    pub fn score(&self) -> u64 {
        self.packets
    }
}

/// 5-tuple key identifying a flow (conversation).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FlowKey {
    pub source_ip: String,
    pub dest_ip: String,
    pub source_port: u16,
    pub dest_port: u16,
    /// Application protocol when the dissector identified one, transport
    /// protocol otherwise.
    pub protocol: String,
}

/// Per-flow totals with first/last-seen bounds.
#[derive(Debug, Clone)]
pub struct FlowAccumulator {
    pub packets: u64,
    pub bytes: u64,
    pub first_seen: f64,
    pub last_seen: f64,
}

impl FlowAccumulator {
    pub fn new(timestamp: f64) -> Self {
        FlowAccumulator {
            packets: 0,
            bytes: 0,
            first_seen: timestamp,
            last_seen: timestamp,
        }
    }

    pub fn record(&mut self, timestamp: f64, bytes: u64) {
        self.packets += 1;
        self.bytes += bytes;
        if timestamp < self.first_seen {
            self.first_seen = timestamp;
        }
        if timestamp > self.last_seen {
            self.last_seen = timestamp;
        }
    }

    pub fn score(&self) -> u64 {
        self.packets
    }
}

/// (port, protocol) key for port-usage accounting.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PortKey {
    pub port: u16,
    pub protocol: String,
}

/// Per-(port, protocol) totals.
#[derive(Debug, Clone, Default)]
pub struct PortAccumulator {
    pub packets: u64,
    pub bytes: u64,
}

impl PortAccumulator {
    pub fn record(&mut self, bytes: u64) {
        self.packets += 1;
        self.bytes += bytes;
    }
}

/// One-second throughput bucket.
#[derive(Debug, Clone, Default)]
pub struct ThroughputBucket {
    pub packets: u64,
    pub bytes: u64,
}

impl ThroughputBucket {
    pub fn record(&mut self, bytes: u64) {
        self.packets += 1;
        self.bytes += bytes;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_breakdown() {
        let mut acc = EndpointAccumulator::default();
        acc.record("TCP", 100);
        acc.record("TCP", 200);
        acc.record("DNS", 50);

        assert_eq!(acc.packets, 3);
        assert_eq!(acc.bytes, 350);
        assert_eq!(*acc.protocols.get("TCP").unwrap(), 2);
        assert_eq!(*acc.protocols.get("DNS").unwrap(), 1);
        assert_eq!(acc.score(), 3);
    }

    #[test]
    fn test_flow_seen_bounds() {
        let mut acc = FlowAccumulator::new(100.5);
        acc.record(100.5, 60);
        acc.record(99.0, 60);
        acc.record(105.25, 60);

        assert_eq!(acc.packets, 3);
        assert_eq!(acc.first_seen, 99.0);
        assert_eq!(acc.last_seen, 105.25);
    }
}
