//! Observability infrastructure: tracing, metrics, health checks.
//!
//! The daemon calls [`init`] once at startup; one-shot CLI commands use
//! [`init_cli`], which only installs the fmt logger.

use crate::config::Config;
use metrics_exporter_prometheus::PrometheusBuilder;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::trace::{self, RandomIdGenerator, Sampler};
use opentelemetry_sdk::Resource;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub mod health;
pub mod metrics;

/// Check if OTLP tracing is enabled via environment variable.
/// Set VPNODE_OTLP_ENABLED=1 or OTEL_EXPORTER_OTLP_ENDPOINT to enable.
fn otlp_enabled() -> bool {
    std::env::var("VPNODE_OTLP_ENABLED").is_ok()
        || std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT").is_ok()
}

/// Get the OTLP endpoint (default: http://localhost:4317)
fn otlp_endpoint() -> String {
    std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT")
        .unwrap_or_else(|_| "http://localhost:4317".to_string())
}

/// `RUST_LOG` wins over the configured level.
fn env_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

/// Initialize the daemon's observability stack.
///
/// Must be called once, before the first cycle runs.
pub fn init(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let subscriber = tracing_subscriber::registry()
        .with(env_filter(&config.log_level))
        .with(tracing_subscriber::fmt::layer().with_target(true).with_level(true));

    if otlp_enabled() {
        let endpoint = otlp_endpoint();

        let exporter = opentelemetry_otlp::new_exporter().tonic().with_endpoint(&endpoint);

        let tracer = opentelemetry_otlp::new_pipeline()
            .tracing()
            .with_exporter(exporter)
            .with_trace_config(
                trace::config()
                    .with_sampler(Sampler::AlwaysOn)
                    .with_id_generator(RandomIdGenerator::default())
                    .with_resource(Resource::new(vec![
                        opentelemetry::KeyValue::new("service.name", "vpnoded"),
                        opentelemetry::KeyValue::new("service.version", env!("CARGO_PKG_VERSION")),
                        opentelemetry::KeyValue::new("vpn.interface", config.interface.clone()),
                    ])),
            )
            .install_batch(opentelemetry_sdk::runtime::Tokio)?;

        let telemetry = tracing_opentelemetry::layer().with_tracer(tracer);
        subscriber.with(telemetry).init();
        tracing::info!("Observability initialized with OTLP tracing (endpoint: {})", endpoint);
    } else {
        subscriber.init();
        tracing::info!(
            "Observability initialized (OTLP disabled - set VPNODE_OTLP_ENABLED=1 to enable)"
        );
    }

    if let Some(port) = config.metrics_port {
        PrometheusBuilder::new().with_http_listener(([0, 0, 0, 0], port)).install()?;
        tracing::info!(port, "Prometheus exporter listening");
    }

    metrics::register_core_metrics();

    Ok(())
}

/// Logging for one-shot commands: fmt to stderr, no exporters.
pub fn init_cli(level: &str) {
    // A second init (e.g. from tests) keeps the first subscriber.
    let _ = tracing_subscriber::registry()
        .with(env_filter(level))
        .with(tracing_subscriber::fmt::layer().with_target(false).with_writer(std::io::stderr))
        .try_init();
}

/// Flush pending spans.
pub fn shutdown() {
    opentelemetry::global::shutdown_tracer_provider();
}
