use super::{MetricPublisher, MetricSubmission};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{debug, warn};

/// Result of one submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchStatus {
    /// The API answered with this status code, whatever it was.
    Delivered(u16),
    Failed(String),
    TimedOut,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DispatchOutcome {
    pub metric: &'static str,
    pub status: DispatchStatus,
}

impl DispatchOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self.status, DispatchStatus::Delivered(_))
    }
}

/// Outcomes in submission order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DispatchReport {
    outcomes: Vec<DispatchOutcome>,
}

impl DispatchReport {
    pub fn outcomes(&self) -> &[DispatchOutcome] {
        &self.outcomes
    }

    pub fn delivered(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_delivered()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.delivered()
    }

    pub fn is_complete(&self) -> bool {
        self.failed() == 0
    }
}

/// Sends submissions concurrently, each bounded by its own timeout.
#[derive(Clone)]
pub struct Dispatcher {
    publisher: Arc<dyn MetricPublisher>,
    timeout: Duration,
}

impl Dispatcher {
    pub fn new(publisher: Arc<dyn MetricPublisher>, timeout: Duration) -> Self {
        Self { publisher, timeout }
    }

    pub async fn dispatch(&self, submissions: Vec<MetricSubmission>) -> DispatchReport {
        let metrics: Vec<&'static str> = submissions.iter().map(|s| s.metric).collect();
        let mut join_set = JoinSet::new();

        for (index, submission) in submissions.into_iter().enumerate() {
            let publisher = Arc::clone(&self.publisher);
            let timeout = self.timeout;
            join_set.spawn(async move {
                let status =
                    match tokio::time::timeout(timeout, publisher.submit(&submission)).await {
                        Ok(Ok(code)) => DispatchStatus::Delivered(code),
                        Ok(Err(e)) => DispatchStatus::Failed(e.to_string()),
                        Err(_) => DispatchStatus::TimedOut,
                    };
                (index, status)
            });
        }

        let mut statuses: Vec<Option<DispatchStatus>> = vec![None; metrics.len()];
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((index, status)) => statuses[index] = Some(status),
                Err(e) => warn!(error = %e, "Submission task aborted"),
            }
        }

        let outcomes = metrics
            .into_iter()
            .zip(statuses)
            .map(|(metric, status)| {
                let status =
                    status.unwrap_or_else(|| DispatchStatus::Failed("task aborted".to_string()));
                record(metric, &status);
                DispatchOutcome { metric, status }
            })
            .collect();

        DispatchReport { outcomes }
    }
}

fn record(metric: &'static str, status: &DispatchStatus) {
    let label = match status {
        DispatchStatus::Delivered(code) => {
            debug!(metric, code, "Metric delivered");
            "delivered"
        }
        DispatchStatus::Failed(reason) => {
            warn!(metric, reason = %reason, "Metric submission failed");
            "failed"
        }
        DispatchStatus::TimedOut => {
            warn!(metric, "Metric submission timed out");
            "timeout"
        }
    };
    metrics::counter!("vpnode_publish_total", "metric" => metric, "status" => label).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Result, VpnodeError};
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct RecordingPublisher {
        seen: Mutex<Vec<String>>,
        fail: &'static str,
        hang: &'static str,
    }

    #[async_trait]
    impl MetricPublisher for RecordingPublisher {
        async fn submit(&self, submission: &MetricSubmission) -> Result<u16> {
            if submission.metric == self.hang {
                std::future::pending::<()>().await;
            }
            self.seen.lock().unwrap().push(submission.path.clone());
            if submission.metric == self.fail {
                return Err(VpnodeError::PublishFailed {
                    metric: submission.metric.to_string(),
                    reason: "connection refused".to_string(),
                });
            }
            Ok(if submission.metric == "b" { 500 } else { 200 })
        }
    }

    fn submissions() -> Vec<MetricSubmission> {
        ["a", "b", "c", "d"]
            .into_iter()
            .map(|m| MetricSubmission::new(m, format!("{}/1", m)))
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_failures_are_isolated() {
        let publisher =
            Arc::new(RecordingPublisher { seen: Mutex::new(Vec::new()), fail: "a", hang: "c" });
        let dispatcher = Dispatcher::new(publisher.clone(), Duration::from_secs(10));

        let report = dispatcher.dispatch(submissions()).await;

        let statuses: Vec<_> = report.outcomes().iter().map(|o| o.status.clone()).collect();
        assert_eq!(
            statuses[0],
            DispatchStatus::Failed("Failed to publish a: connection refused".into())
        );
        assert_eq!(statuses[1], DispatchStatus::Delivered(500));
        assert_eq!(statuses[2], DispatchStatus::TimedOut);
        assert_eq!(statuses[3], DispatchStatus::Delivered(200));
        assert_eq!(report.delivered(), 2);
        assert_eq!(report.failed(), 2);
        assert!(!report.is_complete());

        let mut seen = publisher.seen.lock().unwrap().clone();
        seen.sort();
        assert_eq!(seen, vec!["a/1", "b/1", "d/1"]);
    }

    #[tokio::test]
    async fn test_empty_dispatch() {
        let publisher =
            Arc::new(RecordingPublisher { seen: Mutex::new(Vec::new()), fail: "", hang: "" });
        let report = Dispatcher::new(publisher, Duration::from_secs(1)).dispatch(vec![]).await;
        assert!(report.outcomes().is_empty());
        assert!(report.is_complete());
    }
}
