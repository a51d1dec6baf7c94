//! Per-cycle node health snapshot.

use crate::traffic::{round2, TrafficRollup};
use serde::Serialize;
use std::net::Ipv4Addr;

/// Immutable view of node health for one reporting cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeHealthSnapshot {
    active_peer_count: usize,
    cpu_utilization_pct: f64,
    service_active: bool,
    download_rate_mbps: f64,
    #[serde(rename = "dailyGiB")]
    daily_gib: f64,
    #[serde(rename = "weeklyGiB")]
    weekly_gib: f64,
    #[serde(rename = "monthlyGiB")]
    monthly_gib: f64,
    public_ip: Ipv4Addr,
    timestamp: u64,
}

/// Aggregate collected values into a snapshot. Numeric fields are rounded to
/// two decimals; nothing is cross-validated.
pub fn assemble(
    cpu_pct: f64,
    active_peer_count: usize,
    service_active: bool,
    rate_mbps: f64,
    rollup: TrafficRollup,
    public_ip: Ipv4Addr,
    timestamp: u64,
) -> NodeHealthSnapshot {
    NodeHealthSnapshot {
        active_peer_count,
        cpu_utilization_pct: round2(cpu_pct),
        service_active,
        download_rate_mbps: round2(rate_mbps),
        daily_gib: round2(rollup.daily_gib),
        weekly_gib: round2(rollup.weekly_gib),
        monthly_gib: round2(rollup.monthly_gib),
        public_ip,
        timestamp,
    }
}

impl NodeHealthSnapshot {
    pub fn active_peer_count(&self) -> usize {
        self.active_peer_count
    }

    pub fn cpu_utilization_pct(&self) -> f64 {
        self.cpu_utilization_pct
    }

    pub fn service_active(&self) -> bool {
        self.service_active
    }

    pub fn download_rate_mbps(&self) -> f64 {
        self.download_rate_mbps
    }

    pub fn daily_gib(&self) -> f64 {
        self.daily_gib
    }

    pub fn weekly_gib(&self) -> f64 {
        self.weekly_gib
    }

    pub fn monthly_gib(&self) -> f64 {
        self.monthly_gib
    }

    pub fn public_ip(&self) -> Ipv4Addr {
        self.public_ip
    }

    /// Unix epoch at which the cycle started.
    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rollup() -> TrafficRollup {
        TrafficRollup { daily_gib: 1.234, weekly_gib: 8.0, monthly_gib: 30.005 }
    }

    #[test]
    fn test_assemble_rounds() {
        let snap = assemble(12.3456, 2, true, 8.004, rollup(), Ipv4Addr::new(203, 0, 113, 7), 1000);
        assert_eq!(snap.cpu_utilization_pct(), 12.35);
        assert_eq!(snap.download_rate_mbps(), 8.0);
        assert_eq!(snap.daily_gib(), 1.23);
        assert_eq!(snap.weekly_gib(), 8.0);
        assert_eq!(snap.active_peer_count(), 2);
        assert!(snap.service_active());
        assert_eq!(snap.public_ip(), Ipv4Addr::new(203, 0, 113, 7));
        assert_eq!(snap.timestamp(), 1000);
    }

    #[test]
    fn test_assemble_is_idempotent() {
        let a = assemble(50.0, 3, false, 1.5, rollup(), Ipv4Addr::UNSPECIFIED, 42);
        let b = assemble(50.0, 3, false, 1.5, rollup(), Ipv4Addr::UNSPECIFIED, 42);
        assert_eq!(a, b);

        // Re-assembling from an assembled snapshot changes nothing.
        let again = assemble(
            a.cpu_utilization_pct(),
            a.active_peer_count(),
            a.service_active(),
            a.download_rate_mbps(),
            TrafficRollup {
                daily_gib: a.daily_gib(),
                weekly_gib: a.weekly_gib(),
                monthly_gib: a.monthly_gib(),
            },
            a.public_ip(),
            a.timestamp(),
        );
        assert_eq!(a, again);
    }

    #[test]
    fn test_serializes_camel_case() {
        let snap = assemble(0.0, 0, false, 0.0, TrafficRollup::default(), Ipv4Addr::UNSPECIFIED, 0);
        let json = serde_json::to_value(&snap).unwrap();
        assert_eq!(json["activePeerCount"], 0);
        assert_eq!(json["publicIp"], "0.0.0.0");
        assert_eq!(json["weeklyGiB"], 0.0);
    }
}
