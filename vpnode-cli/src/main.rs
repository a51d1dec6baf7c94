use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::warn;
use vpnode_core::Config;

mod commands;

#[derive(Parser)]
#[command(name = "vpnode")]
#[command(about = "VPN gateway node agent", long_about = None)]
struct Cli {
    /// Configuration file (default: $VPNODE_CONFIG or /etc/vpnode/config.json)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Collect node health and publish it once
    Report {
        /// Print the snapshot as JSON instead of publishing it
        #[arg(long)]
        dry_run: bool,
    },

    /// Print the next free peer address without assigning it
    Allocate,

    /// Assign an address to a peer public key and add it to the interface
    Register {
        /// Base64 public key of the peer
        public_key: String,
    },

    /// List interface peers with their liveness
    Peers,

    /// Print the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let loaded = match &cli.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    };

    let level = match &loaded {
        _ if cli.verbose => "debug",
        Ok(config) => config.log_level.as_str(),
        Err(_) => "info",
    };
    vpnode_core::observability::init_cli(level);

    let config = effective_config(&cli.command, loaded)?;

    match cli.command {
        Commands::Report { dry_run } => {
            commands::report(&config, dry_run).await?;
        }

        Commands::Allocate => {
            commands::allocate(&config).await?;
        }

        Commands::Register { public_key } => {
            commands::register(&config, &public_key).await?;
        }

        Commands::Peers => {
            commands::peers(&config).await?;
        }

        Commands::Config => {
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
    }

    Ok(())
}

/// Reporting is best-effort, so an unusable config file falls back to defaults there.
/// Every other command fails on it.
fn effective_config(command: &Commands, loaded: vpnode_core::Result<Config>) -> Result<Config> {
    match loaded {
        Ok(config) => Ok(config),
        Err(e) if matches!(command, Commands::Report { .. }) => {
            warn!(error = %e, "Config unusable, reporting with defaults");
            Ok(Config::default())
        }
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vpnode_core::VpnodeError;

    fn broken() -> vpnode_core::Result<Config> {
        Err(VpnodeError::InvalidConfig { reason: "Failed to parse config".to_string() })
    }

    #[test]
    fn test_report_falls_back_to_defaults() {
        let config = effective_config(&Commands::Report { dry_run: false }, broken()).unwrap();
        assert_eq!(config.interface, Config::default().interface);
        assert!(effective_config(&Commands::Report { dry_run: true }, broken()).is_ok());
    }

    #[test]
    fn test_other_commands_reject_bad_config() {
        assert!(effective_config(&Commands::Allocate, broken()).is_err());
        assert!(effective_config(&Commands::Peers, broken()).is_err());
        let register = Commands::Register { public_key: "k".to_string() };
        assert!(effective_config(&register, broken()).is_err());
    }

    #[test]
    fn test_unreadable_config_file_with_report() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();

        let loaded = Config::load_from(&path);
        assert!(loaded.is_err());
        assert!(effective_config(&Commands::Report { dry_run: false }, loaded).is_ok());
    }
}
