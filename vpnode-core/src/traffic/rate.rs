//! Throughput sampling from a monotonically increasing byte counter.

use super::round2;
use crate::config::Config;
use crate::error::{Result, VpnodeError};
use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Throughput in Mbps between two reads taken `interval` apart.
///
/// A second read smaller than the first (counter reset) clamps to zero.
pub fn throughput_mbps(first: u64, second: u64, interval: Duration) -> f64 {
    let secs = interval.as_secs_f64();
    if secs <= 0.0 {
        return 0.0;
    }
    let delta = second.saturating_sub(first);
    round2(delta as f64 * 8.0 / 1_000_000.0 / secs)
}

/// A byte counter readable on demand.
#[async_trait]
pub trait CounterReader: Send + Sync {
    async fn read_bytes(&self) -> Result<u64>;
}

/// Interface counter exposed under `/sys/class/net`.
#[derive(Debug, Clone)]
pub struct SysfsCounter {
    path: PathBuf,
}

impl SysfsCounter {
    /// Received-bytes counter of `interface`.
    pub fn rx_bytes(interface: &str) -> Self {
        Self::at(format!("/sys/class/net/{}/statistics/rx_bytes", interface))
    }

    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl CounterReader for SysfsCounter {
    async fn read_bytes(&self) -> Result<u64> {
        let unavailable = |e: &dyn std::fmt::Display| {
            VpnodeError::unavailable(
                "interface counter",
                format!("{}: {}", self.path.display(), e),
            )
        };
        let raw = tokio::fs::read_to_string(&self.path).await.map_err(|e| unavailable(&e))?;
        raw.trim().parse().map_err(|e: std::num::ParseIntError| unavailable(&e))
    }
}

/// Outcome of one sampling operation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateMeasurement {
    pub mbps: f64,
    /// A read failed and was taken as zero, or the deadline passed.
    pub degraded: bool,
}

impl RateMeasurement {
    fn degraded() -> Self {
        Self { mbps: 0.0, degraded: true }
    }
}

/// Samples a counter twice, `interval` apart, bounded by `deadline`.
#[derive(Debug, Clone, Copy)]
pub struct RateSampler {
    interval: Duration,
    deadline: Duration,
}

impl RateSampler {
    pub fn new(interval: Duration, deadline: Duration) -> Self {
        Self { interval, deadline: deadline.max(interval) }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.sample_interval(), config.sample_deadline())
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Download rate in Mbps, `0.00` when the sample could not be taken.
    pub async fn sample(&self, reader: &dyn CounterReader) -> f64 {
        self.measure(reader).await.mbps
    }

    /// Sample and report whether the value is a fallback.
    #[instrument(skip_all, fields(interval_ms = self.interval.as_millis() as u64))]
    pub async fn measure(&self, reader: &dyn CounterReader) -> RateMeasurement {
        match tokio::time::timeout(self.deadline, self.measure_unbounded(reader)).await {
            Ok(measurement) => measurement,
            Err(_) => {
                warn!(deadline_ms = self.deadline.as_millis() as u64, "Rate sample timed out");
                RateMeasurement::degraded()
            }
        }
    }

    async fn measure_unbounded(&self, reader: &dyn CounterReader) -> RateMeasurement {
        let (first, first_failed) = Self::read(reader).await;
        tokio::time::sleep(self.interval).await;
        let (second, second_failed) = Self::read(reader).await;

        if second < first {
            debug!(first, second, "Counter went backwards, clamping rate to zero");
        }
        RateMeasurement {
            mbps: throughput_mbps(first, second, self.interval),
            degraded: first_failed || second_failed,
        }
    }

    /// Unreadable counters read as zero; the flag marks the substitution.
    async fn read(reader: &dyn CounterReader) -> (u64, bool) {
        match reader.read_bytes().await {
            Ok(bytes) => (bytes, false),
            Err(e) => {
                warn!(error = %e, "Counter unreadable, treating as zero");
                (0, true)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Returns queued values in order, then errors.
    struct ScriptedCounter {
        reads: Mutex<Vec<Result<u64>>>,
    }

    impl ScriptedCounter {
        fn new(mut reads: Vec<Result<u64>>) -> Self {
            reads.reverse();
            Self { reads: Mutex::new(reads) }
        }
    }

    #[async_trait]
    impl CounterReader for ScriptedCounter {
        async fn read_bytes(&self) -> Result<u64> {
            self.reads
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| Err(VpnodeError::unavailable("interface counter", "drained")))
        }
    }

    struct StuckCounter;

    #[async_trait]
    impl CounterReader for StuckCounter {
        async fn read_bytes(&self) -> Result<u64> {
            std::future::pending().await
        }
    }

    fn sampler() -> RateSampler {
        RateSampler::new(Duration::from_secs(1), Duration::from_secs(5))
    }

    #[test]
    fn test_throughput_one_megabyte_per_second() {
        assert_eq!(throughput_mbps(1_000_000, 2_000_000, Duration::from_secs(1)), 8.0);
    }

    #[test]
    fn test_throughput_counter_reset_clamps() {
        assert_eq!(throughput_mbps(1_000_000, 500_000, Duration::from_secs(1)), 0.0);
    }

    #[test]
    fn test_throughput_divides_by_interval() {
        assert_eq!(throughput_mbps(0, 1_000_000, Duration::from_secs(2)), 4.0);
        assert_eq!(throughput_mbps(0, 123_456, Duration::from_secs(1)), 0.99);
        assert_eq!(throughput_mbps(0, 1_000_000, Duration::ZERO), 0.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sample_reads_twice() {
        let counter = ScriptedCounter::new(vec![Ok(1_000_000), Ok(2_000_000)]);
        let measurement = sampler().measure(&counter).await;
        assert_eq!(measurement, RateMeasurement { mbps: 8.0, degraded: false });
    }

    #[tokio::test(start_paused = true)]
    async fn test_sample_reset_is_not_degraded() {
        let counter = ScriptedCounter::new(vec![Ok(1_000_000), Ok(500_000)]);
        let measurement = sampler().measure(&counter).await;
        assert_eq!(measurement, RateMeasurement { mbps: 0.0, degraded: false });
    }

    #[tokio::test(start_paused = true)]
    async fn test_sample_unreadable_first_read_counts_as_zero() {
        let counter = ScriptedCounter::new(vec![
            Err(VpnodeError::unavailable("interface counter", "gone")),
            Ok(2_000_000),
        ]);
        let measurement = sampler().measure(&counter).await;
        assert_eq!(measurement, RateMeasurement { mbps: 16.0, degraded: true });
    }

    #[tokio::test(start_paused = true)]
    async fn test_sample_unreadable_second_read_counts_as_zero() {
        let counter = ScriptedCounter::new(vec![
            Ok(2_000_000),
            Err(VpnodeError::unavailable("interface counter", "gone")),
        ]);
        let measurement = sampler().measure(&counter).await;
        assert_eq!(measurement, RateMeasurement { mbps: 0.0, degraded: true });

        let counter = ScriptedCounter::new(vec![]);
        assert_eq!(sampler().sample(&counter).await, 0.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sample_deadline() {
        let measurement = sampler().measure(&StuckCounter).await;
        assert_eq!(measurement, RateMeasurement { mbps: 0.0, degraded: true });
    }

    #[tokio::test]
    async fn test_sysfs_counter() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rx_bytes");
        std::fs::write(&path, "123456\n").unwrap();
        assert_eq!(SysfsCounter::at(&path).read_bytes().await.unwrap(), 123_456);

        std::fs::write(&path, "garbage").unwrap();
        assert!(SysfsCounter::at(&path).read_bytes().await.is_err());

        let missing = SysfsCounter::at(dir.path().join("missing"));
        assert!(matches!(
            missing.read_bytes().await,
            Err(VpnodeError::SourceUnavailable { .. })
        ));
    }
}
