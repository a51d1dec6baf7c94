//! Traffic history rollups from bucketed counters.
//!
//! Buckets are pre-aggregated by an external accountant (vnstat) per calendar
//! day and month, ordered oldest to newest. A node without history reports zeros.

use super::bytes_to_gib;
use crate::error::{Result, VpnodeError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::{debug, instrument};

/// Days summed into the weekly total.
pub const WEEK_DAYS: usize = 7;

/// Received and transmitted bytes for one day or one month.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollupBucket {
    pub rx: u64,
    pub tx: u64,
}

impl RollupBucket {
    pub fn new(rx: u64, tx: u64) -> Self {
        Self { rx, tx }
    }

    pub fn total(&self) -> u128 {
        self.rx as u128 + self.tx as u128
    }
}

/// Day and month buckets of one interface, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrafficBuckets {
    pub days: Vec<RollupBucket>,
    pub months: Vec<RollupBucket>,
}

/// Daily, weekly and monthly traffic in GiB.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TrafficRollup {
    pub daily_gib: f64,
    pub weekly_gib: f64,
    pub monthly_gib: f64,
}

/// Sum of rx+tx over the newest `window` buckets.
pub fn window_bytes(buckets: &[RollupBucket], window: usize) -> u128 {
    let start = buckets.len().saturating_sub(window);
    buckets[start..].iter().map(RollupBucket::total).sum()
}

/// Roll day and month buckets up into the reported windows.
///
/// - daily: newest day bucket
/// - weekly: newest `min(7, days)` day buckets
/// - monthly: newest month bucket
pub fn rollup(daily: &[RollupBucket], monthly: &[RollupBucket]) -> TrafficRollup {
    TrafficRollup {
        daily_gib: bytes_to_gib(window_bytes(daily, 1)),
        weekly_gib: bytes_to_gib(window_bytes(daily, WEEK_DAYS)),
        monthly_gib: bytes_to_gib(window_bytes(monthly, 1)),
    }
}

impl TrafficBuckets {
    pub fn rollup(&self) -> TrafficRollup {
        rollup(&self.days, &self.months)
    }
}

/// Source of bucketed traffic history.
#[async_trait]
pub trait RollupSource: Send + Sync {
    async fn buckets(&self) -> Result<TrafficBuckets>;
}

#[derive(Deserialize)]
struct VnstatReport {
    #[serde(default)]
    jsonversion: serde_json::Value,
    #[serde(default)]
    interfaces: Vec<VnstatInterface>,
}

#[derive(Deserialize)]
struct VnstatInterface {
    #[serde(default)]
    traffic: VnstatTraffic,
}

#[derive(Default, Deserialize)]
struct VnstatTraffic {
    #[serde(default, alias = "days")]
    day: Vec<RollupBucket>,
    #[serde(default, alias = "months")]
    month: Vec<RollupBucket>,
}

/// Parse `vnstat --json` output.
///
/// JSON version 1 (vnstat 1.x) reports KiB and is scaled to bytes. A report
/// without interfaces yields empty buckets.
pub fn parse_vnstat_json(raw: &str) -> Result<TrafficBuckets> {
    let report: VnstatReport = serde_json::from_str(raw).map_err(|e| {
        VpnodeError::unavailable("traffic history", format!("bad vnstat json: {}", e))
    })?;

    let scale = match &report.jsonversion {
        serde_json::Value::String(v) if v == "1" => 1024,
        serde_json::Value::Number(n) if n.as_u64() == Some(1) => 1024,
        _ => 1,
    };
    let scaled = |buckets: Vec<RollupBucket>| -> Vec<RollupBucket> {
        buckets
            .into_iter()
            .map(|b| RollupBucket::new(b.rx.saturating_mul(scale), b.tx.saturating_mul(scale)))
            .collect()
    };

    Ok(report
        .interfaces
        .into_iter()
        .next()
        .map(|iface| TrafficBuckets {
            days: scaled(iface.traffic.day),
            months: scaled(iface.traffic.month),
        })
        .unwrap_or_default())
}

/// Traffic history read from `vnstat -i <iface> --json`.
#[derive(Debug, Clone)]
pub struct VnstatSource {
    binary: String,
    interface: String,
}

impl VnstatSource {
    pub fn new(interface: impl Into<String>) -> Self {
        Self { binary: "vnstat".to_string(), interface: interface.into() }
    }

    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }
}

#[async_trait]
impl RollupSource for VnstatSource {
    #[instrument(skip(self), fields(interface = %self.interface))]
    async fn buckets(&self) -> Result<TrafficBuckets> {
        let output = Command::new(&self.binary)
            .args(["-i", &self.interface, "--json"])
            .output()
            .await
            .map_err(|e| VpnodeError::unavailable("traffic history", e.to_string()))?;

        if !output.status.success() {
            return Err(VpnodeError::unavailable(
                "traffic history",
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        if stdout.trim().is_empty() {
            debug!("vnstat returned no output");
            return Ok(TrafficBuckets::default());
        }

        parse_vnstat_json(&stdout)
    }
}
