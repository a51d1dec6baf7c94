//! `vpnode peers` command

use anyhow::Result;
use tabled::{settings::Style, Table, Tabled};
use vpnode_core::host::{Clock, SystemClock};
use vpnode_core::network::{ControlToolDirectory, LivenessClassifier, PeerDirectory, PeerRecord};
use vpnode_core::Config;

#[derive(Tabled)]
struct PeerRow {
    #[tabled(rename = "PUBLIC KEY")]
    public_key: String,
    #[tabled(rename = "ADDRESS")]
    address: String,
    #[tabled(rename = "LAST HANDSHAKE")]
    handshake: String,
    #[tabled(rename = "ACTIVE")]
    active: &'static str,
}

fn short_key(key: &str) -> String {
    match key.get(..12) {
        Some(prefix) if key.len() > 12 => format!("{}...", prefix),
        _ => key.to_string(),
    }
}

fn row(peer: &PeerRecord, classifier: &LivenessClassifier, now: u64) -> PeerRow {
    PeerRow {
        public_key: short_key(&peer.public_key),
        address: peer.address().map(|a| a.to_string()).unwrap_or_else(|| "-".to_string()),
        handshake: match peer.handshake_age(now) {
            Some(age) => format!("{}s ago", age),
            None => "never".to_string(),
        },
        active: if classifier.is_active(peer, now) { "yes" } else { "no" },
    }
}

/// List interface peers
pub async fn peers(config: &Config) -> Result<()> {
    let directory = ControlToolDirectory::from_config(config);
    let classifier = LivenessClassifier::from_config(config);
    let now = SystemClock.now_epoch();

    let peers = directory.peers().await?;
    if peers.is_empty() {
        println!("No peers on {}", config.interface);
        return Ok(());
    }

    let rows: Vec<PeerRow> = peers.iter().map(|p| row(p, &classifier, now)).collect();
    let mut table = Table::new(rows);
    table.with(Style::modern());

    println!("{}", table);
    println!(
        "{} of {} peers active (threshold {}s)",
        classifier.classify(&peers, now),
        peers.len(),
        classifier.threshold().as_secs()
    );

    Ok(())
}
