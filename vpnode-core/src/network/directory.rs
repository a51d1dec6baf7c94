//! Peer directory: the VPN control tool's view of configured peers.
//!
//! The directory is the only source of truth for which addresses are in use.
//! Two dump formats are understood:
//!
//! - `<tool> show <iface> dump`: tab separated, first line describes the
//!   interface itself, every following line is one peer
//!   (`public-key  preshared-key  endpoint  allowed-ips  latest-handshake  ...`).
//! - `<tool> show <iface> allowed-ips`: one peer per line, public key followed
//!   by its CIDR entries.

use crate::config::Config;
use crate::error::{Result, VpnodeError};
use async_trait::async_trait;
use std::collections::HashSet;
use std::net::Ipv4Addr;
use tokio::process::Command;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

/// Rows with fewer columns than this are skipped.
pub const DUMP_MIN_COLUMNS: usize = 5;

const ALLOWED_IPS_COLUMN: usize = 3;
const HANDSHAKE_COLUMN: usize = 4;

/// One configured peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerRecord {
    /// Opaque peer identifier (the peer's public key).
    pub public_key: String,
    /// IPv4 addresses routed to this peer, subnet suffix stripped.
    pub allowed_ips: Vec<Ipv4Addr>,
    /// Epoch of the latest handshake. `None` or `Some(0)` means never.
    pub latest_handshake: Option<u64>,
}

impl PeerRecord {
    pub fn new(public_key: impl Into<String>) -> Self {
        Self { public_key: public_key.into(), allowed_ips: Vec::new(), latest_handshake: None }
    }

    pub fn with_address(mut self, addr: Ipv4Addr) -> Self {
        self.allowed_ips.push(addr);
        self
    }

    pub fn with_handshake(mut self, epoch: u64) -> Self {
        self.latest_handshake = Some(epoch);
        self
    }

    /// The peer's allocated address.
    pub fn address(&self) -> Option<Ipv4Addr> {
        self.allowed_ips.first().copied()
    }

    /// Seconds since the latest handshake, if there ever was one.
    pub fn handshake_age(&self, now_epoch: u64) -> Option<u64> {
        self.latest_handshake
            .filter(|epoch| *epoch > 0)
            .map(|epoch| now_epoch.saturating_sub(epoch))
    }
}

/// Parse `<tool> show <iface> dump` output.
///
/// Short rows and rows without a key are skipped. A non-numeric handshake
/// column leaves `latest_handshake` empty rather than rejecting the row.
pub fn parse_dump(output: &str) -> Vec<PeerRecord> {
    output
        .lines()
        .skip(1)
        .filter_map(|line| {
            let parts: Vec<&str> = line.split('\t').collect();
            if parts.len() < DUMP_MIN_COLUMNS {
                debug!(columns = parts.len(), "Skipping short directory row");
                return None;
            }

            let public_key = parts[0].trim();
            if public_key.is_empty() {
                return None;
            }

            Some(PeerRecord {
                public_key: public_key.to_string(),
                allowed_ips: parse_cidr_list(parts[ALLOWED_IPS_COLUMN]),
                latest_handshake: parts[HANDSHAKE_COLUMN].trim().parse().ok(),
            })
        })
        .collect()
}

/// Parse `<tool> show <iface> allowed-ips` output into the allocated set.
pub fn parse_allowed_ips(output: &str) -> HashSet<Ipv4Addr> {
    output
        .lines()
        .filter_map(|line| line.split_once(char::is_whitespace))
        .flat_map(|(_key, entries)| parse_cidr_list(entries))
        .collect()
}

/// Extract IPv4 addresses from a comma or whitespace separated CIDR list.
fn parse_cidr_list(field: &str) -> Vec<Ipv4Addr> {
    field
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|entry| !entry.is_empty() && *entry != "(none)")
        .filter_map(|entry| entry.split('/').next())
        .filter_map(|addr| addr.parse::<Ipv4Addr>().ok())
        .collect()
}

/// Read access to the peer directory.
#[async_trait]
pub trait PeerDirectory: Send + Sync {
    /// Current peer records, in directory order.
    async fn peers(&self) -> Result<Vec<PeerRecord>>;

    /// Every address currently routed to some peer.
    async fn allocated_addresses(&self) -> Result<HashSet<Ipv4Addr>> {
        Ok(self.peers().await?.into_iter().flat_map(|peer| peer.allowed_ips).collect())
    }
}

/// Write access to the peer directory.
#[async_trait]
pub trait PeerCommitter: Send + Sync {
    /// Route `address` to the peer identified by `public_key`.
    async fn commit(&self, public_key: &str, address: Ipv4Addr) -> Result<()>;
}

/// Peer directory backed by the VPN control tool (`awg` / `wg`).
#[derive(Debug, Clone)]
pub struct ControlToolDirectory {
    tool: String,
    interface: String,
    use_sudo: bool,
    save_after_commit: bool,
}

impl ControlToolDirectory {
    pub fn new(tool: impl Into<String>, interface: impl Into<String>) -> Self {
        Self {
            tool: tool.into(),
            interface: interface.into(),
            use_sudo: false,
            save_after_commit: false,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self {
            tool: config.tool.clone(),
            interface: config.interface.clone(),
            use_sudo: config.use_sudo,
            save_after_commit: config.save_after_commit,
        }
    }

    fn command(&self, program: &str, args: &[&str]) -> Command {
        let mut cmd = if self.use_sudo {
            let mut cmd = Command::new("sudo");
            cmd.arg(program);
            cmd
        } else {
            Command::new(program)
        };
        cmd.args(args);
        cmd
    }

    async fn run(&self, program: &str, args: &[&str]) -> Result<String> {
        let command = format!("{} {}", program, args.join(" "));
        let output = self.command(program, args).output().await.map_err(|e| {
            VpnodeError::CommandFailed { command: command.clone(), reason: e.to_string() }
        })?;

        if !output.status.success() {
            return Err(VpnodeError::CommandFailed {
                command,
                reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl PeerDirectory for ControlToolDirectory {
    #[instrument(skip(self), fields(interface = %self.interface))]
    async fn peers(&self) -> Result<Vec<PeerRecord>> {
        let output = self
            .run(&self.tool, &["show", &self.interface, "dump"])
            .await
            .map_err(|e| VpnodeError::unavailable("peer directory", e.to_string()))?;
        Ok(parse_dump(&output))
    }

    #[instrument(skip(self), fields(interface = %self.interface))]
    async fn allocated_addresses(&self) -> Result<HashSet<Ipv4Addr>> {
        let output = self
            .run(&self.tool, &["show", &self.interface, "allowed-ips"])
            .await
            .map_err(|e| VpnodeError::unavailable("peer directory", e.to_string()))?;
        Ok(parse_allowed_ips(&output))
    }
}

#[async_trait]
impl PeerCommitter for ControlToolDirectory {
    #[instrument(skip(self, public_key), fields(interface = %self.interface))]
    async fn commit(&self, public_key: &str, address: Ipv4Addr) -> Result<()> {
        let allowed = format!("{}/32", address);
        self.run(&self.tool, &["set", &self.interface, "peer", public_key, "allowed-ips", &allowed])
            .await?;
        info!(%address, "Peer committed to {}", self.interface);

        if self.save_after_commit {
            let quick = format!("{}-quick", self.tool);
            // The peer is already live at this point; only persistence failed.
            if let Err(e) = self.run(&quick, &["save", &self.interface]).await {
                warn!(error = %e, "Failed to persist interface configuration");
            }
        }

        Ok(())
    }
}

/// In-memory peer directory.
///
/// Useful for dry runs and tests; commits are visible to subsequent queries.
#[derive(Debug, Default)]
pub struct MemoryDirectory {
    peers: RwLock<Vec<PeerRecord>>,
}

impl MemoryDirectory {
    pub fn new(peers: Vec<PeerRecord>) -> Self {
        Self { peers: RwLock::new(peers) }
    }

    pub async fn len(&self) -> usize {
        self.peers.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.peers.read().await.is_empty()
    }
}

#[async_trait]
impl PeerDirectory for MemoryDirectory {
    async fn peers(&self) -> Result<Vec<PeerRecord>> {
        Ok(self.peers.read().await.clone())
    }
}

#[async_trait]
impl PeerCommitter for MemoryDirectory {
    async fn commit(&self, public_key: &str, address: Ipv4Addr) -> Result<()> {
        let mut peers = self.peers.write().await;
        match peers.iter_mut().find(|p| p.public_key == public_key) {
            Some(peer) => peer.allowed_ips = vec![address],
            None => peers.push(PeerRecord::new(public_key).with_address(address)),
        }
        Ok(())
    }
}
