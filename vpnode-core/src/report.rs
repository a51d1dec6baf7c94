//! One reporting cycle: fetch, classify, sample, roll up, assemble, dispatch.
//!
//! Every source failure degrades to its neutral value (0, false, empty, or the
//! fallback address) and is listed in the [`CycleReport`]; a cycle never fails.

use crate::config::Config;
use crate::error::Result;
use crate::host::{
    Clock, CpuProbe, HttpIpResolver, LoadAverageProbe, PublicIpResolver, ServiceProbe,
    SystemClock, SystemctlProbe, FALLBACK_PUBLIC_IP,
};
use crate::network::{ControlToolDirectory, LivenessClassifier, PeerDirectory};
use crate::observability::metrics as telemetry;
use crate::publish::{DispatchReport, Dispatcher, HttpPublisher, MetricPublisher, PublishTarget};
use crate::snapshot::{assemble, NodeHealthSnapshot};
use crate::traffic::{CounterReader, RateSampler, RollupSource, SysfsCounter, VnstatSource};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// A collaborator whose failure degrades the snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    PeerDirectory,
    InterfaceCounter,
    TrafficHistory,
    ServiceProbe,
    CpuProbe,
    PublicIp,
}

impl Source {
    pub const ALL: [Source; 6] = [
        Source::PeerDirectory,
        Source::InterfaceCounter,
        Source::TrafficHistory,
        Source::ServiceProbe,
        Source::CpuProbe,
        Source::PublicIp,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Source::PeerDirectory => "peer_directory",
            Source::InterfaceCounter => "interface_counter",
            Source::TrafficHistory => "traffic_history",
            Source::ServiceProbe => "service_probe",
            Source::CpuProbe => "cpu_probe",
            Source::PublicIp => "public_ip",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one cycle. `dispatch` is `None` when nothing was sent.
#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub snapshot: NodeHealthSnapshot,
    pub degraded_sources: Vec<Source>,
    pub dispatch: Option<DispatchReport>,
}

impl CycleReport {
    pub fn is_degraded(&self, source: Source) -> bool {
        self.degraded_sources.contains(&source)
    }
}

/// External collaborators of a cycle.
#[derive(Clone)]
pub struct ReportSources {
    pub directory: Arc<dyn PeerDirectory>,
    pub counter: Arc<dyn CounterReader>,
    pub rollups: Arc<dyn RollupSource>,
    pub service: Arc<dyn ServiceProbe>,
    pub cpu: Arc<dyn CpuProbe>,
    pub public_ip: Arc<dyn PublicIpResolver>,
    pub clock: Arc<dyn Clock>,
}

impl ReportSources {
    /// System-backed sources for the configured interfaces.
    pub fn system(config: &Config) -> Result<Self> {
        Ok(Self {
            directory: Arc::new(ControlToolDirectory::from_config(config)),
            counter: Arc::new(SysfsCounter::rx_bytes(&config.network_interface)),
            rollups: Arc::new(VnstatSource::new(&config.network_interface)),
            service: Arc::new(SystemctlProbe::new()),
            cpu: Arc::new(LoadAverageProbe::new()),
            public_ip: Arc::new(HttpIpResolver::new(
                &config.public_ip_url,
                config.publish_timeout(),
            )?),
            clock: Arc::new(SystemClock),
        })
    }
}

/// Runs reporting cycles against a fixed set of sources.
pub struct ReportCycle {
    sources: ReportSources,
    classifier: LivenessClassifier,
    sampler: RateSampler,
    target: PublishTarget,
    dispatcher: Dispatcher,
    service_unit: String,
}

impl ReportCycle {
    pub fn new(
        config: &Config,
        sources: ReportSources,
        publisher: Arc<dyn MetricPublisher>,
    ) -> Self {
        Self {
            sources,
            classifier: LivenessClassifier::from_config(config),
            sampler: RateSampler::from_config(config),
            target: PublishTarget::from_config(config),
            dispatcher: Dispatcher::new(publisher, config.publish_timeout()),
            service_unit: config.service_unit(),
        }
    }

    /// Cycle wired to the system sources and the HTTP collector.
    pub fn from_config(config: &Config) -> Result<Self> {
        let publisher = Arc::new(HttpPublisher::from_config(config)?);
        Ok(Self::new(config, ReportSources::system(config)?, publisher))
    }

    /// Gather every value and assemble the snapshot without dispatching.
    #[instrument(skip(self))]
    pub async fn collect(&self) -> CycleReport {
        let mut degraded = Vec::new();
        let now = self.sources.clock.now_epoch();

        let active_peers = match self.sources.directory.peers().await {
            Ok(peers) => self.classifier.classify(&peers, now),
            Err(e) => {
                degrade(&mut degraded, Source::PeerDirectory, &e);
                0
            }
        };
        info!(active_peers, "Active users");

        let rate = self.sampler.measure(self.sources.counter.as_ref()).await;
        if rate.degraded {
            warn!(
                source = %Source::InterfaceCounter,
                "Source degraded: counter read as zero or sample timed out"
            );
            degraded.push(Source::InterfaceCounter);
            telemetry::record_degraded(Source::InterfaceCounter);
        }
        info!(download_mbps = rate.mbps, "Download speed");

        let rollup = match self.sources.rollups.buckets().await {
            Ok(buckets) => buckets.rollup(),
            Err(e) => {
                degrade(&mut degraded, Source::TrafficHistory, &e);
                Default::default()
            }
        };
        info!(
            daily_gib = rollup.daily_gib,
            weekly_gib = rollup.weekly_gib,
            monthly_gib = rollup.monthly_gib,
            "Traffic history"
        );

        let service_active = match self.sources.service.is_active(&self.service_unit).await {
            Ok(active) => active,
            Err(e) => {
                degrade(&mut degraded, Source::ServiceProbe, &e);
                false
            }
        };
        info!(unit = %self.service_unit, service_active, "Service state");

        let cpu_pct = match self.sources.cpu.utilization_pct().await {
            Ok(pct) => pct,
            Err(e) => {
                degrade(&mut degraded, Source::CpuProbe, &e);
                0.0
            }
        };
        info!(cpu_pct, "CPU usage");

        let public_ip = match self.sources.public_ip.public_ip().await {
            Ok(ip) => ip,
            Err(e) => {
                degrade(&mut degraded, Source::PublicIp, &e);
                FALLBACK_PUBLIC_IP
            }
        };
        info!(%public_ip, "Public IP");

        let snapshot =
            assemble(cpu_pct, active_peers, service_active, rate.mbps, rollup, public_ip, now);
        telemetry::record_snapshot(&snapshot);

        CycleReport { snapshot, degraded_sources: degraded, dispatch: None }
    }

    /// Collect, then dispatch every field of the snapshot.
    #[instrument(skip(self))]
    pub async fn run_once(&self) -> CycleReport {
        let mut report = self.collect().await;
        let dispatch = self.dispatcher.dispatch(self.target.submissions(&report.snapshot)).await;

        info!(
            delivered = dispatch.delivered(),
            failed = dispatch.failed(),
            degraded = report.degraded_sources.len(),
            "Report cycle finished"
        );
        telemetry::record_cycle(dispatch.is_complete() && report.degraded_sources.is_empty());

        report.dispatch = Some(dispatch);
        report
    }
}

fn degrade(degraded: &mut Vec<Source>, source: Source, error: &crate::error::VpnodeError) {
    warn!(source = %source, error = %error, "Source degraded");
    degraded.push(source);
    telemetry::record_degraded(source);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_names_are_unique() {
        let mut names: Vec<_> = Source::ALL.iter().map(Source::as_str).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), Source::ALL.len());
    }

    #[test]
    fn test_source_serializes_snake_case() {
        assert_eq!(serde_json::to_value(Source::PublicIp).unwrap(), "public_ip");
        assert_eq!(Source::InterfaceCounter.to_string(), "interface_counter");
    }
}
