//! Peer-facing network management.
//!
//! Handles address allocation, the peer directory and liveness classification.

pub mod defaults;
pub mod directory;
pub mod ipam;
pub mod liveness;
pub mod registrar;

// Re-exports for commonly used types
pub use directory::{
    parse_allowed_ips, parse_dump, ControlToolDirectory, MemoryDirectory, PeerCommitter,
    PeerDirectory, PeerRecord,
};
pub use ipam::{allocate, AddressPool, AllocationDomain};
pub use liveness::{classify, LivenessClassifier};
pub use registrar::{validate_public_key, PeerRegistrar};
