//! Metric publishing to the central monitoring API.
//!
//! A snapshot is mapped to one [`MetricSubmission`] per reported field and the
//! [`Dispatcher`] sends them concurrently. Each submission carries its own
//! timeout and its failure is recorded without affecting the others.

mod dispatcher;
mod http;
mod submission;

pub use dispatcher::{DispatchOutcome, DispatchReport, DispatchStatus, Dispatcher};
pub use http::HttpPublisher;
pub use submission::{format_value, MetricSubmission, PublishTarget};

use crate::error::Result;
use async_trait::async_trait;

/// Sends one metric submission to the monitoring API.
#[async_trait]
pub trait MetricPublisher: Send + Sync {
    /// Submit and return the HTTP status code. Non-success codes are not errors.
    async fn submit(&self, submission: &MetricSubmission) -> Result<u16>;
}
