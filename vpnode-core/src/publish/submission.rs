use crate::config::Config;
use crate::snapshot::NodeHealthSnapshot;
use serde::Serialize;

/// One metric value addressed to its endpoint path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricSubmission {
    pub metric: &'static str,
    /// Path relative to the API base URL, values embedded.
    pub path: String,
}

impl MetricSubmission {
    pub fn new(metric: &'static str, path: impl Into<String>) -> Self {
        Self { metric, path: path.into() }
    }
}

/// Render a reported number the way the monitoring API expects it: integral
/// values keep one decimal (`8.0`), others print their shortest form.
pub fn format_value(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{:.1}", value)
    } else {
        value.to_string()
    }
}

/// Node identity tags attached to every submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishTarget {
    vpn_flavor: String,
    platform: String,
}

impl PublishTarget {
    pub fn new(vpn_flavor: impl Into<String>, platform: impl Into<String>) -> Self {
        Self { vpn_flavor: vpn_flavor.into(), platform: platform.into() }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.vpn_flavor, &config.platform)
    }

    /// Map a snapshot to its five submissions.
    pub fn submissions(&self, snapshot: &NodeHealthSnapshot) -> Vec<MetricSubmission> {
        let flavor = &self.vpn_flavor;
        let ip = snapshot.public_ip();
        let status = if snapshot.service_active() { 1 } else { 0 };

        vec![
            MetricSubmission::new(
                "total_users",
                format!("total-users/{}/{}/{}", flavor, ip, snapshot.active_peer_count()),
            ),
            MetricSubmission::new(
                "cpu_usage",
                format!(
                    "cpu-usage/{}/{}/{}",
                    flavor,
                    ip,
                    format_value(snapshot.cpu_utilization_pct())
                ),
            ),
            MetricSubmission::new(
                "instance_status",
                format!("update-instance-status/{}/{}/{}/{}", ip, flavor, self.platform, status),
            ),
            MetricSubmission::new(
                "server_speed",
                format!(
                    "server-speed/{}/{}/{}",
                    flavor,
                    ip,
                    format_value(snapshot.download_rate_mbps())
                ),
            ),
            MetricSubmission::new(
                "historical_bandwidth",
                format!(
                    "historical-bandwidth/{}/{}/{}/{}/{}",
                    flavor,
                    ip,
                    format_value(snapshot.daily_gib()),
                    format_value(snapshot.weekly_gib()),
                    format_value(snapshot.monthly_gib())
                ),
            ),
        ]
    }
}
