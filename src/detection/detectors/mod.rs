//! Built-in detector plugins, one module per category.

pub mod application;
pub mod exfiltration;
pub mod geo_threat;
pub mod iot;
pub mod network;
pub mod transport;
pub mod voip;

pub use application::{DnsTunnelingDetector, SuspiciousPayloadDetector};
pub use exfiltration::DataExfiltrationDetector;
pub use geo_threat::HighRiskCountryDetector;
pub use iot::IotProtocolSweepDetector;
pub use network::{PingSweepDetector, PortScanDetector};
pub use transport::SynFloodDetector;
pub use voip::SipFloodDetector;

use std::sync::Arc;

use super::AnomalyDetector;

/// The standard detector set, minus the geo-threat detector (which needs a
/// resolved IP-to-country map from a geolocation pass).
pub fn default_detectors() -> Vec<Arc<dyn AnomalyDetector>> {
    vec![
        Arc::new(PortScanDetector::new()),
        Arc::new(PingSweepDetector::new()),
        Arc::new(SynFloodDetector::new()),
        Arc::new(DnsTunnelingDetector::new()),
        Arc::new(SuspiciousPayloadDetector::new()),
        Arc::new(SipFloodDetector::new()),
        Arc::new(IotProtocolSweepDetector::new()),
        Arc::new(DataExfiltrationDetector::new()),
    ]
}
