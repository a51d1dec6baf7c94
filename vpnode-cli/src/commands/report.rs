//! `vpnode report` command

use anyhow::Result;
use tabled::{settings::Style, Table, Tabled};
use tracing::warn;
use vpnode_core::publish::DispatchStatus;
use vpnode_core::{Config, ReportCycle};

#[derive(Tabled)]
struct OutcomeRow {
    #[tabled(rename = "METRIC")]
    metric: &'static str,
    #[tabled(rename = "RESULT")]
    result: String,
}

fn describe(status: &DispatchStatus) -> String {
    match status {
        DispatchStatus::Delivered(code) => format!("HTTP {}", code),
        DispatchStatus::Failed(reason) => format!("failed: {}", reason),
        DispatchStatus::TimedOut => "timed out".to_string(),
    }
}

/// Run one reporting cycle. Partial failures still exit successfully.
pub async fn report(config: &Config, dry_run: bool) -> Result<()> {
    let cycle = ReportCycle::from_config(config)?;

    if dry_run {
        let report = cycle.collect().await;
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let report = cycle.run_once().await;
    for source in &report.degraded_sources {
        warn!(source = %source, "Source unavailable, reported default value");
    }

    if let Some(dispatch) = &report.dispatch {
        let rows: Vec<OutcomeRow> = dispatch
            .outcomes()
            .iter()
            .map(|o| OutcomeRow { metric: o.metric, result: describe(&o.status) })
            .collect();
        let mut table = Table::new(rows);
        table.with(Style::modern());
        println!("{}", table);
    }

    Ok(())
}
