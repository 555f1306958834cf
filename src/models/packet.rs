use serde::{Deserialize, Serialize};

/// A decoded packet record produced by the external dissection process.
///
/// Records are immutable inputs: the analysis core only ever reads them.
/// IP addresses arrive in text form; ports are 0 when the transport has no
/// port concept (ICMP, ARP).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PacketRecord {
    /// Capture timestamp as epoch seconds (fractional part preserves
    /// sub-second capture precision).
    pub timestamp: f64,
    /// Frame sequence number within the capture.
    pub frame_number: u64,
    /// Frame length in bytes.
    pub length: u64,
    /// Transport-protocol tag (e.g. "TCP", "UDP", "ICMP").
    pub protocol: String,
    /// Source IP address in text form (may be empty for non-IP frames).
    #[serde(default)]
    pub source_ip: String,
    /// Destination IP address in text form.
    #[serde(default)]
    pub dest_ip: String,
    /// Source port, 0 if inapplicable.
    #[serde(default)]
    pub source_port: u16,
    /// Destination port, 0 if inapplicable.
    #[serde(default)]
    pub dest_port: u16,
    /// Application-layer protocol label when the dissector identified one.
    #[serde(default)]
    pub app_protocol: Option<String>,
    /// Free-text summary line from the dissector.
    #[serde(default)]
    pub info: Option<String>,
}

impl PacketRecord {
    /// Protocol label used for flow keying: the application-layer label when
    /// present, the transport tag otherwise.
    pub fn flow_protocol(&self) -> &str {
        self.app_protocol.as_deref().unwrap_or(&self.protocol)
    }

    /// Truncated one-second bucket for throughput accounting.
    pub fn second_bucket(&self) -> i64 {
        self.timestamp as i64
    }
}
