//! Component health derived from reporting cycles.

use crate::report::{CycleReport, Source};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Name of the publisher component.
pub const PUBLISHER: &str = "publisher";

/// Overall node health status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

/// Health check result.
#[derive(Debug, Clone, Serialize)]
pub struct HealthCheck {
    pub status: HealthStatus,
    pub version: &'static str,
    /// Epoch of the last observed cycle, if any.
    pub last_cycle: Option<u64>,
    pub components: Vec<ComponentHealth>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub name: String,
    pub status: HealthStatus,
    pub message: Option<String>,
}

#[derive(Default)]
struct State {
    components: Vec<ComponentHealth>,
    last_cycle: Option<u64>,
}

/// Tracks component status; cheap to clone and share between tasks.
#[derive(Clone)]
pub struct HealthChecker {
    state: Arc<RwLock<State>>,
}

impl HealthChecker {
    pub fn new() -> Self {
        Self { state: Arc::new(RwLock::new(State::default())) }
    }

    /// Checker pre-registered with every report source and the publisher.
    pub async fn for_reporting() -> Self {
        let checker = Self::new();
        for source in Source::ALL {
            checker.register_component(source.as_str()).await;
        }
        checker.register_component(PUBLISHER).await;
        checker
    }

    /// Register a component as healthy. Re-registering is a no-op.
    pub async fn register_component(&self, name: &str) {
        let mut state = self.state.write().await;
        if state.components.iter().all(|c| c.name != name) {
            state.components.push(ComponentHealth {
                name: name.to_string(),
                status: HealthStatus::Healthy,
                message: None,
            });
        }
    }

    pub async fn update_component(
        &self,
        name: &str,
        status: HealthStatus,
        message: Option<String>,
    ) {
        let mut state = self.state.write().await;
        if let Some(component) = state.components.iter_mut().find(|c| c.name == name) {
            component.status = status;
            component.message = message;
        }
    }

    /// Fold a finished cycle into component health.
    ///
    /// A degraded source is `Degraded`. The publisher is `Degraded` when some
    /// submissions failed and `Unhealthy` when none got through.
    pub async fn observe_cycle(&self, report: &CycleReport) {
        for source in Source::ALL {
            if report.is_degraded(source) {
                self.update_component(
                    source.as_str(),
                    HealthStatus::Degraded,
                    Some("fell back to default value".to_string()),
                )
                .await;
            } else {
                self.update_component(source.as_str(), HealthStatus::Healthy, None).await;
            }
        }

        if let Some(dispatch) = &report.dispatch {
            let (status, message) = if dispatch.is_complete() {
                (HealthStatus::Healthy, None)
            } else if dispatch.delivered() == 0 {
                (HealthStatus::Unhealthy, Some("no submission delivered".to_string()))
            } else {
                let failed = dispatch.failed();
                (HealthStatus::Degraded, Some(format!("{} submissions failed", failed)))
            };
            self.update_component(PUBLISHER, status, message).await;
        }

        self.state.write().await.last_cycle = Some(report.snapshot.timestamp());
    }

    /// Overall status:
    /// - Healthy: all components healthy
    /// - Degraded: at least one degraded, none unhealthy
    /// - Unhealthy: at least one unhealthy
    pub async fn get_health(&self) -> HealthCheck {
        let state = self.state.read().await;
        let components = state.components.clone();

        let status = if components.iter().any(|c| c.status == HealthStatus::Unhealthy) {
            HealthStatus::Unhealthy
        } else if components.iter().any(|c| c.status == HealthStatus::Degraded) {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        };

        HealthCheck {
            status,
            version: env!("CARGO_PKG_VERSION"),
            last_cycle: state.last_cycle,
            components,
        }
    }

    /// Ready once every component is healthy.
    pub async fn is_ready(&self) -> bool {
        self.get_health().await.status == HealthStatus::Healthy
    }
}

impl Default for HealthChecker {
    fn default() -> Self {
        Self::new()
    }
}
