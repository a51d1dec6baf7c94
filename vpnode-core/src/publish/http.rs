use super::{MetricPublisher, MetricSubmission};
use crate::config::Config;
use crate::error::{Result, VpnodeError};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::{info, instrument};

/// Publishes submissions as empty-bodied HTTP POSTs under a base URL.
#[derive(Debug, Clone)]
pub struct HttpPublisher {
    client: Client,
    base_url: String,
}

impl HttpPublisher {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build().map_err(|e| {
            VpnodeError::InvalidConfig { reason: format!("Failed to create HTTP client: {}", e) }
        })?;

        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self { client, base_url })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(&config.api_base_url, config.publish_timeout())
    }

    pub fn url_for(&self, submission: &MetricSubmission) -> String {
        format!("{}/{}", self.base_url, submission.path)
    }
}

#[async_trait]
impl MetricPublisher for HttpPublisher {
    #[instrument(skip(self, submission), fields(metric = submission.metric))]
    async fn submit(&self, submission: &MetricSubmission) -> Result<u16> {
        let url = self.url_for(submission);
        let response =
            self.client.post(&url).send().await.map_err(|e| VpnodeError::PublishFailed {
                metric: submission.metric.to_string(),
                reason: e.to_string(),
            })?;

        let status = response.status().as_u16();
        info!(url = %url, status, "Submitted metric");
        Ok(status)
    }
}
