pub mod config;
pub mod detection;
pub mod geolocation;
pub mod input;
pub mod models;
pub mod statistics;

// Re-export commonly used types
pub use config::Config;
pub use detection::{AnomalyDetector, AnomalyEngine, DetectionProgress, ProgressSink};
pub use geolocation::{CountryTrafficStatistics, GeoIpResolver, GeoLocation, TrafficFlowDirection};
pub use models::{DetectorCategory, NetworkAnomaly, PacketRecord, Severity};
pub use statistics::{TrafficAggregator, TrafficSnapshot};
