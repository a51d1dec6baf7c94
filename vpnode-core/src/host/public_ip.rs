//! Public IPv4 address resolution.

use crate::error::{Result, VpnodeError};
use async_trait::async_trait;
use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;
use tracing::instrument;

/// Identity reported when the public address cannot be resolved.
pub const FALLBACK_PUBLIC_IP: Ipv4Addr = Ipv4Addr::UNSPECIFIED;

/// Resolves this node's public IPv4 address.
#[async_trait]
pub trait PublicIpResolver: Send + Sync {
    async fn public_ip(&self) -> Result<Ipv4Addr>;
}

/// Asks an echo service (icanhazip-style, plain text body) over IPv4.
#[derive(Debug, Clone)]
pub struct HttpIpResolver {
    client: reqwest::Client,
    url: String,
}

impl HttpIpResolver {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        // Binding to an IPv4 wildcard forces the lookup over IPv4.
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .local_address(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
            .build()
            .map_err(|e| VpnodeError::InvalidConfig {
                reason: format!("Failed to create HTTP client: {}", e),
            })?;
        Ok(Self { client, url: url.into() })
    }
}

#[async_trait]
impl PublicIpResolver for HttpIpResolver {
    #[instrument(skip(self), fields(url = %self.url))]
    async fn public_ip(&self) -> Result<Ipv4Addr> {
        let unavailable = |e: reqwest::Error| VpnodeError::unavailable("public ip", e.to_string());

        let body = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(unavailable)?
            .error_for_status()
            .map_err(unavailable)?
            .text()
            .await
            .map_err(unavailable)?;

        body.trim().parse().map_err(|_| {
            VpnodeError::unavailable("public ip", format!("not an IPv4 address: {:?}", body.trim()))
        })
    }
}
