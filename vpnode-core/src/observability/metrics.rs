//! Core metrics definitions.
//!
//! All metrics follow Prometheus naming conventions:
//! - `_total` suffix for counters
//! - plain names for last-seen gauges

use crate::report::Source;
use crate::snapshot::NodeHealthSnapshot;
use metrics::{counter, describe_counter, describe_gauge, gauge};

/// Register all core metrics with descriptions.
///
/// This ensures metrics appear in `/metrics` with proper metadata.
pub fn register_core_metrics() {
    // Allocation metrics
    describe_counter!(
        "vpnode_ip_allocated_total",
        "Total address allocations (by status: success, exhausted)"
    );
    describe_gauge!("vpnode_ip_pool_available", "Free addresses left in the allocation domain");
    describe_counter!(
        "vpnode_peer_registrations_total",
        "Total peer registrations (by status: created, existing)"
    );

    // Reporting metrics
    describe_counter!(
        "vpnode_report_cycles_total",
        "Total reporting cycles (by outcome: complete, partial)"
    );
    describe_counter!(
        "vpnode_source_degraded_total",
        "Total degraded source reads (by source)"
    );
    describe_counter!(
        "vpnode_publish_total",
        "Total metric submissions (by metric, status: delivered, failed, timeout)"
    );

    // Last-seen node state
    describe_gauge!("vpnode_active_peers", "Peers with a handshake inside the liveness threshold");
    describe_gauge!("vpnode_cpu_utilization_percent", "15-minute load average per core, percent");
    describe_gauge!("vpnode_download_rate_mbps", "Last sampled download rate in Mbps");
    describe_gauge!("vpnode_service_active", "1 when the VPN service unit is active");
}

pub fn record_degraded(source: Source) {
    counter!("vpnode_source_degraded_total", "source" => source.as_str()).increment(1);
}

pub fn record_cycle(complete: bool) {
    let outcome = if complete { "complete" } else { "partial" };
    counter!("vpnode_report_cycles_total", "outcome" => outcome).increment(1);
}

pub fn record_snapshot(snapshot: &NodeHealthSnapshot) {
    gauge!("vpnode_active_peers").set(snapshot.active_peer_count() as f64);
    gauge!("vpnode_cpu_utilization_percent").set(snapshot.cpu_utilization_pct());
    gauge!("vpnode_download_rate_mbps").set(snapshot.download_rate_mbps());
    gauge!("vpnode_service_active").set(if snapshot.service_active() { 1.0 } else { 0.0 });
}
