//! Interface traffic: instantaneous throughput and historical rollups.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐  two reads   ┌──────────────┐
//! │ /sys/class/net/  │ ───────────► │ RateSampler  │──► download Mbps
//! │   rx_bytes       │   interval   └──────────────┘
//! └──────────────────┘
//! ┌──────────────────┐  day/month   ┌──────────────┐
//! │ vnstat --json    │ ───────────► │ rollup()     │──► daily/weekly/monthly GiB
//! └──────────────────┘   buckets    └──────────────┘
//! ```

mod history;
mod rate;

pub use history::{
    parse_vnstat_json, rollup, window_bytes, RollupBucket, RollupSource, TrafficBuckets,
    TrafficRollup, VnstatSource, WEEK_DAYS,
};
pub use rate::{throughput_mbps, CounterReader, RateMeasurement, RateSampler, SysfsCounter};

/// Bytes in one GiB (2^30).
pub const BYTES_PER_GIB: f64 = 1_073_741_824.0;

/// Round to two decimal places. Non-finite values collapse to zero.
pub fn round2(value: f64) -> f64 {
    if !value.is_finite() {
        return 0.0;
    }
    (value * 100.0).round() / 100.0
}

/// Convert a byte total to GiB, rounded to two decimals.
pub fn bytes_to_gib(bytes: u128) -> f64 {
    round2(bytes as f64 / BYTES_PER_GIB)
}
