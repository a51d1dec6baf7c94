//! Configuration management.
//!
//! A single immutable [`Config`] value is loaded once at startup and handed to every
//! component at construction. Nothing in the crate reads ambient globals.

use crate::error::{Result, VpnodeError};
use crate::network::AllocationDomain;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable that overrides the configuration file location.
pub const CONFIG_ENV: &str = "VPNODE_CONFIG";

/// Default configuration file location.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/vpnode/config.json";

/// Node configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// VPN interface managed by the control tool (e.g. `awg0`).
    pub interface: String,
    /// VPN control tool binary (`awg` for AmneziaWG, `wg` for WireGuard).
    pub tool: String,
    /// Prefix control-tool invocations with `sudo`.
    pub use_sudo: bool,
    /// Run `<tool>-quick save <iface>` after committing a new peer.
    pub save_after_commit: bool,
    /// Physical interface whose counters and traffic history are reported.
    pub network_interface: String,
    /// Two-octet prefix of the allocation domain (e.g. `10.100`).
    pub subnet_prefix: String,
    /// Maximum handshake age, in seconds, still counted as active.
    pub handshake_threshold_secs: u64,
    /// Service unit probed for liveness. Derived from the tool and interface when unset.
    pub service_name: Option<String>,
    /// VPN flavor tag used in collector endpoints.
    pub vpn_flavor: String,
    /// Platform tag used in collector endpoints.
    pub platform: String,
    /// Base URL of the central collector API.
    pub api_base_url: String,
    /// Echo service returning the caller's public IPv4 address.
    pub public_ip_url: String,
    /// Wait between the two counter reads of a rate sample.
    pub sample_interval_secs: u64,
    /// Upper bound on a whole rate sample, including both reads.
    pub sample_deadline_secs: u64,
    /// Per-submission timeout for the collector.
    pub publish_timeout_secs: u64,
    /// Period of the daemon's reporting loop.
    pub report_interval_secs: u64,
    /// Listen address of the daemon's registration API.
    pub listen_addr: String,
    /// Advisory lock file serializing allocate-then-commit across processes.
    pub lock_file: PathBuf,
    /// Prometheus exporter port for the daemon (disabled when unset).
    pub metrics_port: Option<u16>,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            interface: "awg0".to_string(),
            tool: "awg".to_string(),
            use_sudo: false,
            save_after_commit: true,
            network_interface: "eth0".to_string(),
            subnet_prefix: "10.100".to_string(),
            handshake_threshold_secs: 180,
            service_name: None,
            vpn_flavor: "amnezia".to_string(),
            platform: "android".to_string(),
            api_base_url: "https://papi.fusionsai.net/api".to_string(),
            public_ip_url: "https://icanhazip.com".to_string(),
            sample_interval_secs: 1,
            sample_deadline_secs: 10,
            publish_timeout_secs: 10,
            report_interval_secs: 60,
            listen_addr: "0.0.0.0:9008".to_string(),
            lock_file: PathBuf::from("/var/lock/amnezia_peer_alloc.lock"),
            metrics_port: None,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        std::env::var_os(CONFIG_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
    }

    /// Load configuration from the default location.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from `path`, falling back to defaults when the file is absent.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|e| VpnodeError::InvalidConfig {
            reason: format!("Failed to read config {}: {}", path.display(), e),
        })?;
        let config: Self = serde_json::from_str(&content).map_err(|e| {
            VpnodeError::InvalidConfig { reason: format!("Failed to parse config: {}", e) }
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to `path`.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| VpnodeError::IoError { path: parent.to_path_buf(), source: e })?;
        }
        let content = serde_json::to_string_pretty(self).map_err(|e| {
            VpnodeError::InvalidConfig { reason: format!("Failed to serialize config: {}", e) }
        })?;
        std::fs::write(path, content)
            .map_err(|e| VpnodeError::IoError { path: path.to_path_buf(), source: e })
    }

    /// Reject values no component can work with.
    pub fn validate(&self) -> Result<()> {
        self.allocation_domain()?;

        let positive = [
            ("handshake_threshold_secs", self.handshake_threshold_secs),
            ("sample_interval_secs", self.sample_interval_secs),
            ("sample_deadline_secs", self.sample_deadline_secs),
            ("publish_timeout_secs", self.publish_timeout_secs),
            ("report_interval_secs", self.report_interval_secs),
        ];
        if let Some((name, _)) = positive.iter().find(|(_, v)| *v == 0) {
            return Err(VpnodeError::InvalidConfig { reason: format!("{} must be > 0", name) });
        }

        if self.sample_deadline_secs < self.sample_interval_secs {
            return Err(VpnodeError::InvalidConfig {
                reason: "sample_deadline_secs must not be shorter than sample_interval_secs"
                    .to_string(),
            });
        }

        if self.interface.is_empty() || self.tool.is_empty() {
            return Err(VpnodeError::InvalidConfig {
                reason: "interface and tool must be set".to_string(),
            });
        }

        Ok(())
    }

    /// The allocation domain described by `subnet_prefix`.
    pub fn allocation_domain(&self) -> Result<AllocationDomain> {
        self.subnet_prefix.parse()
    }

    /// Service unit probed for liveness.
    pub fn service_unit(&self) -> String {
        self.service_name
            .clone()
            .unwrap_or_else(|| format!("{}-quick@{}.service", self.tool, self.interface))
    }

    pub fn handshake_threshold(&self) -> Duration {
        Duration::from_secs(self.handshake_threshold_secs)
    }

    pub fn sample_interval(&self) -> Duration {
        Duration::from_secs(self.sample_interval_secs)
    }

    pub fn sample_deadline(&self) -> Duration {
        Duration::from_secs(self.sample_deadline_secs)
    }

    pub fn publish_timeout(&self) -> Duration {
        Duration::from_secs(self.publish_timeout_secs)
    }

    pub fn report_interval(&self) -> Duration {
        Duration::from_secs(self.report_interval_secs)
    }
}
