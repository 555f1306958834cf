use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Ordered anomaly severity. Derived `Ord` follows declaration order, so
/// `Low < Medium < High < Critical`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Severity::Low => "LOW",
            Severity::Medium => "MEDIUM",
            Severity::High => "HIGH",
            Severity::Critical => "CRITICAL",
        };
        write!(f, "{}", label)
    }
}

/// Category a detector plugin is scoped to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DetectorCategory {
    Network,
    Transport,
    Application,
    Voip,
    Iot,
    Exfiltration,
    GeoThreat,
}

/// A security finding produced by a detector plugin. Immutable once returned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkAnomaly {
    /// Short type tag, e.g. "Port Scan".
    pub anomaly_type: String,
    /// Category of the detector that produced the finding.
    pub category: DetectorCategory,
    pub severity: Severity,
    /// Wall-clock time the finding was produced.
    pub detected_at: DateTime<Utc>,
    /// Endpoints (IPs, IP:port pairs) involved in the finding.
    pub affected_endpoints: Vec<String>,
    /// Free-form supporting evidence, keyed by metric name.
    pub evidence: HashMap<String, String>,
    pub description: String,
}

impl NetworkAnomaly {
    /// Convenience constructor stamping the detection time.
    pub fn new(
        anomaly_type: impl Into<String>,
        category: DetectorCategory,
        severity: Severity,
        description: impl Into<String>,
    ) -> Self {
        NetworkAnomaly {
            anomaly_type: anomaly_type.into(),
            category,
            severity,
            detected_at: Utc::now(),
            affected_endpoints: Vec::new(),
            evidence: HashMap::new(),
            description: description.into(),
        }
    }

    pub fn with_endpoints(mut self, endpoints: Vec<String>) -> Self {
        self.affected_endpoints = endpoints;
        self
    }

    pub fn with_evidence(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.evidence.insert(key.into(), value.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Low < Severity::Medium);
        assert!(Severity::Medium < Severity::High);
        assert!(Severity::High < Severity::Critical);
    }

    #[test]
    fn test_builder_attaches_evidence() {
        let anomaly = NetworkAnomaly::new(
            "Port Scan",
            DetectorCategory::Network,
            Severity::High,
            "Host probed 120 distinct ports",
        )
        .with_endpoints(vec!["192.0.2.1".to_string()])
        .with_evidence("distinct_ports", "120");

        assert_eq!(anomaly.affected_endpoints.len(), 1);
        assert_eq!(anomaly.evidence.get("distinct_ports").unwrap(), "120");
        assert_eq!(anomaly.severity, Severity::High);
    }
}
