//! `vpnode allocate` and `vpnode register` commands

use anyhow::{Context, Result};
use vpnode_core::network::{AddressPool, ControlToolDirectory, PeerRegistrar};
use vpnode_core::Config;

/// Print the next free address. Nothing is committed.
pub async fn allocate(config: &Config) -> Result<()> {
    let pool = AddressPool::new(config.allocation_domain()?);
    let directory = ControlToolDirectory::from_config(config);

    let address = pool.next_free(&directory).await.context("No address available")?;
    println!("{}", address);

    Ok(())
}

/// Assign an address to `public_key` and add the peer to the interface.
pub async fn register(config: &Config, public_key: &str) -> Result<()> {
    let registrar = PeerRegistrar::from_config(config)?;

    let address = registrar.register(public_key).await.context("Failed to add peer")?;
    println!("{}", address);

    Ok(())
}
