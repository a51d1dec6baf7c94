//! CPU pressure from the 15-minute load average.

use crate::error::{Result, VpnodeError};
use crate::traffic::round2;
use async_trait::async_trait;
use std::path::PathBuf;

/// CPU utilization source.
#[async_trait]
pub trait CpuProbe: Send + Sync {
    /// Utilization in percent, rounded to two decimals.
    async fn utilization_pct(&self) -> Result<f64>;
}

/// Load average per core as a percentage.
pub fn load_to_pct(load: f64, cores: usize) -> f64 {
    round2(load / cores.max(1) as f64 * 100.0)
}

/// Extract the 15-minute load average from `/proc/loadavg` content.
pub fn parse_loadavg(raw: &str) -> Result<f64> {
    raw.split_whitespace()
        .nth(2)
        .and_then(|field| field.parse::<f64>().ok())
        .ok_or_else(|| VpnodeError::unavailable("cpu probe", format!("bad loadavg: {:?}", raw)))
}

/// Reads `/proc/loadavg` and normalizes by the number of logical CPUs.
#[derive(Debug, Clone)]
pub struct LoadAverageProbe {
    path: PathBuf,
    cores: usize,
}

impl LoadAverageProbe {
    pub fn new() -> Self {
        Self { path: PathBuf::from("/proc/loadavg"), cores: num_cpus::get() }
    }

    pub fn with_source(path: impl Into<PathBuf>, cores: usize) -> Self {
        Self { path: path.into(), cores }
    }
}

impl Default for LoadAverageProbe {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CpuProbe for LoadAverageProbe {
    async fn utilization_pct(&self) -> Result<f64> {
        let raw = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| VpnodeError::unavailable("cpu probe", e.to_string()))?;
        Ok(load_to_pct(parse_loadavg(&raw)?, self.cores))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_to_pct() {
        assert_eq!(load_to_pct(1.0, 4), 25.0);
        assert_eq!(load_to_pct(0.333, 1), 33.3);
        assert_eq!(load_to_pct(2.0, 0), 200.0);
    }

    #[test]
    fn test_parse_loadavg() {
        assert_eq!(parse_loadavg("0.52 0.58 0.59 1/467 12345\n").unwrap(), 0.59);
        assert!(parse_loadavg("0.52 0.58").is_err());
        assert!(parse_loadavg("").is_err());
    }

    #[tokio::test]
    async fn test_probe_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("loadavg");
        std::fs::write(&path, "3.00 2.50 2.00 2/300 999\n").unwrap();

        let probe = LoadAverageProbe::with_source(&path, 8);
        assert_eq!(probe.utilization_pct().await.unwrap(), 25.0);
    }
}
