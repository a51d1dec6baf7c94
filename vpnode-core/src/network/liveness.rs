//! Peer liveness from handshake recency.

use super::directory::PeerRecord;
use crate::config::Config;
use std::time::Duration;

/// Whether a handshake at `handshake` epoch is recent enough to count as active.
///
/// Absent or zero handshakes never count. A handshake stamped after `now_epoch`
/// has age zero.
pub fn is_active(handshake: Option<u64>, threshold_secs: u64, now_epoch: u64) -> bool {
    match handshake {
        Some(epoch) if epoch > 0 => now_epoch.saturating_sub(epoch) <= threshold_secs,
        _ => false,
    }
}

/// Count the peers whose latest handshake lies within `threshold_secs` of `now_epoch`.
pub fn classify(peers: &[PeerRecord], threshold_secs: u64, now_epoch: u64) -> usize {
    peers.iter().filter(|peer| is_active(peer.latest_handshake, threshold_secs, now_epoch)).count()
}

/// Liveness classifier bound to a configured threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LivenessClassifier {
    threshold: Duration,
}

impl LivenessClassifier {
    pub fn new(threshold: Duration) -> Self {
        Self { threshold }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.handshake_threshold())
    }

    pub fn threshold(&self) -> Duration {
        self.threshold
    }

    pub fn is_active(&self, peer: &PeerRecord, now_epoch: u64) -> bool {
        is_active(peer.latest_handshake, self.threshold.as_secs(), now_epoch)
    }

    pub fn classify(&self, peers: &[PeerRecord], now_epoch: u64) -> usize {
        classify(peers, self.threshold.as_secs(), now_epoch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::directory::parse_dump;

    #[test]
    fn test_threshold_boundaries() {
        assert!(is_active(Some(850), 180, 1000));
        assert!(is_active(Some(820), 180, 1000));
        assert!(!is_active(Some(819), 180, 1000));
        assert!(!is_active(Some(700), 180, 1000));
    }

    #[test]
    fn test_never_handshaked() {
        assert!(!is_active(Some(0), 180, 1000));
        assert!(!is_active(None, 180, 1000));
    }

    #[test]
    fn test_future_handshake_counts() {
        assert!(is_active(Some(1005), 180, 1000));
    }

    #[test]
    fn test_classify_mixed() {
        let peers = vec![
            PeerRecord::new("a").with_handshake(850),
            PeerRecord::new("b").with_handshake(700),
            PeerRecord::new("c").with_handshake(0),
            PeerRecord::new("d"),
            PeerRecord::new("e").with_handshake(999),
        ];
        let classifier = LivenessClassifier::new(Duration::from_secs(180));
        assert_eq!(classifier.classify(&peers, 1000), 2);
    }

    #[test]
    fn test_classify_malformed_rows_contribute_nothing() {
        let dump = "iface\tline\t51820\toff\n\
                    a=\t(none)\t(none)\t10.100.0.2/32\t850\t0\t0\toff\n\
                    garbage without tabs\n\
                    b=\t(none)\t(none)\t10.100.0.3/32\tnever\t0\t0\toff\n\
                    c=\t(none)\n";
        let peers = parse_dump(dump);
        assert_eq!(classify(&peers, 180, 1000), 1);
    }

    #[test]
    fn test_classify_empty() {
        assert_eq!(classify(&[], 180, 1000), 0);
    }
}
