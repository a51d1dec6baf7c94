//! Host-level probes: CPU pressure, service state, public address and time.
//!
//! Each probe is a narrow capability trait with one system-backed
//! implementation, so the reporting cycle can run against deterministic fakes.

mod clock;
mod cpu;
mod public_ip;
mod service;

pub use clock::{Clock, FixedClock, SystemClock};
pub use cpu::{load_to_pct, parse_loadavg, CpuProbe, LoadAverageProbe};
pub use public_ip::{HttpIpResolver, PublicIpResolver, FALLBACK_PUBLIC_IP};
pub use service::{ServiceProbe, SystemctlProbe};
