//! Service-manager liveness probe.

use crate::error::{Result, VpnodeError};
use async_trait::async_trait;
use tokio::process::Command;
use tracing::instrument;

/// Reports whether a service unit is running.
#[async_trait]
pub trait ServiceProbe: Send + Sync {
    async fn is_active(&self, unit: &str) -> Result<bool>;
}

/// Probe backed by `systemctl is-active`.
#[derive(Debug, Clone)]
pub struct SystemctlProbe {
    binary: String,
}

impl SystemctlProbe {
    pub fn new() -> Self {
        Self { binary: "systemctl".to_string() }
    }

    pub fn with_binary(binary: impl Into<String>) -> Self {
        Self { binary: binary.into() }
    }
}

impl Default for SystemctlProbe {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ServiceProbe for SystemctlProbe {
    #[instrument(skip(self))]
    async fn is_active(&self, unit: &str) -> Result<bool> {
        // `is-active` exits non-zero for inactive units, so only stdout decides.
        let output = Command::new(&self.binary)
            .args(["is-active", unit])
            .output()
            .await
            .map_err(|e| VpnodeError::unavailable("service probe", e.to_string()))?;

        Ok(String::from_utf8_lossy(&output.stdout).trim() == "active")
    }
}
