pub mod anomaly;
pub mod packet;

pub use anomaly::{DetectorCategory, NetworkAnomaly, Severity};
pub use packet::PacketRecord;
