//! vpnode Core Library
//!
//! Address allocation, peer liveness, traffic sampling and health reporting
//! for a single VPN gateway node.

pub mod config;
pub mod error;
pub mod host;
pub mod network;
pub mod observability;
pub mod publish;
pub mod report;
pub mod snapshot;
pub mod traffic;

// Re-export commonly used items
pub use config::Config;
pub use error::{Result, VpnodeError};
pub use network::{AddressPool, AllocationDomain, PeerDirectory, PeerRecord, PeerRegistrar};
pub use observability::{
    health::HealthChecker, init as init_observability, shutdown as shutdown_observability,
};
pub use report::{CycleReport, ReportCycle, ReportSources, Source};
pub use snapshot::NodeHealthSnapshot;
