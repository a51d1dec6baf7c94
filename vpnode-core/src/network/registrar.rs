//! Serialized peer registration.
//!
//! [`AddressPool`] is pure and offers no mutual exclusion. The registrar is the
//! single writer: it holds an in-process mutex and an exclusive advisory lock on
//! a lock file across the whole query, allocate and commit sequence, so that
//! concurrent requests in this process and in other processes (CLI invocations,
//! provisioning scripts using `flock`) never observe the same "next free"
//! address.

use super::directory::{ControlToolDirectory, PeerCommitter, PeerDirectory};
use super::ipam::AddressPool;
use crate::config::Config;
use crate::error::{Result, VpnodeError};
use base64::Engine;
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, instrument, warn};

/// Length of a decoded WireGuard public key.
pub const PUBLIC_KEY_LEN: usize = 32;

/// Check that `key` is a base64 encoded 32-byte public key.
pub fn validate_public_key(key: &str) -> Result<()> {
    let decoded = base64::engine::general_purpose::STANDARD
        .decode(key)
        .map_err(|e| VpnodeError::InvalidPublicKey { reason: e.to_string() })?;

    if decoded.len() != PUBLIC_KEY_LEN {
        return Err(VpnodeError::InvalidPublicKey {
            reason: format!("expected {} bytes, got {}", PUBLIC_KEY_LEN, decoded.len()),
        });
    }

    Ok(())
}

/// Exclusive advisory lock held for the lifetime of the value.
struct AllocationLock {
    file: File,
}

impl AllocationLock {
    /// Block until the lock on `path` is acquired.
    fn acquire(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(path)
            .map_err(|e| VpnodeError::IoError { path: path.to_path_buf(), source: e })?;

        file.lock_exclusive()
            .map_err(|e| VpnodeError::LockFailed { path: path.to_path_buf(), source: e })?;

        Ok(Self { file })
    }
}

impl Drop for AllocationLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            warn!(error = %e, "Failed to release allocation lock");
        }
    }
}

/// Single writer for new peer allocations.
pub struct PeerRegistrar {
    pool: AddressPool,
    directory: Arc<dyn PeerDirectory>,
    committer: Arc<dyn PeerCommitter>,
    lock_file: Option<PathBuf>,
    writer: Mutex<()>,
}

impl PeerRegistrar {
    pub fn new(
        pool: AddressPool,
        directory: Arc<dyn PeerDirectory>,
        committer: Arc<dyn PeerCommitter>,
    ) -> Self {
        Self { pool, directory, committer, lock_file: None, writer: Mutex::new(()) }
    }

    /// Registrar committing through the control tool, locked on the configured file.
    pub fn from_config(config: &Config) -> Result<Self> {
        let tool = Arc::new(ControlToolDirectory::from_config(config));
        let pool = AddressPool::new(config.allocation_domain()?);
        Ok(Self::new(pool, tool.clone(), tool).with_lock_file(&config.lock_file))
    }

    /// Also serialize with other processes through an advisory lock on `path`.
    pub fn with_lock_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.lock_file = Some(path.into());
        self
    }

    pub fn pool(&self) -> &AddressPool {
        &self.pool
    }

    /// Assign an address to `public_key` and commit it to the directory.
    ///
    /// Re-registering a key that already has an address returns that address
    /// without allocating.
    ///
    /// # Errors
    ///
    /// - `VpnodeError::InvalidPublicKey` if the key is malformed
    /// - `VpnodeError::PoolExhausted` if the domain is full
    /// - `VpnodeError::SourceUnavailable` if the directory cannot be queried
    #[instrument(skip(self, public_key))]
    pub async fn register(&self, public_key: &str) -> Result<Ipv4Addr> {
        let public_key = public_key.trim();
        validate_public_key(public_key)?;

        let _writer = self.writer.lock().await;
        let _lock = match &self.lock_file {
            Some(path) => {
                let path = path.clone();
                let lock = tokio::task::spawn_blocking(move || AllocationLock::acquire(&path))
                    .await
                    .map_err(VpnodeError::internal)??;
                Some(lock)
            }
            None => None,
        };

        let peers = self.directory.peers().await?;
        if let Some(existing) =
            peers.iter().find(|p| p.public_key == public_key).and_then(|p| p.address())
        {
            info!(address = %existing, "Peer already registered");
            metrics::counter!("vpnode_peer_registrations_total", "status" => "existing")
                .increment(1);
            return Ok(existing);
        }

        let allocated = peers.into_iter().flat_map(|p| p.allowed_ips).collect();
        let address = self.pool.allocate(&allocated)?;
        self.committer.commit(public_key, address).await?;

        info!(%address, "Registered new peer");
        metrics::counter!("vpnode_peer_registrations_total", "status" => "created").increment(1);

        Ok(address)
    }
}
