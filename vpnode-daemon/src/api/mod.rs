//! HTTP API: peer registration and health.
//!
//! - `POST /api/register-key-get-ip` with `{"public_key": "..."}` returns `{"ipaddress": "..."}`
//! - `GET /health` returns the component health report
//! - `GET /ready` returns 200 once every component is healthy, 503 otherwise

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{error, info, warn};
use vpnode_core::observability::health::{HealthCheck, HealthStatus};
use vpnode_core::{HealthChecker, PeerRegistrar, VpnodeError};

/// Health component fed by registration outcomes.
pub const REGISTRAR: &str = "registrar";

#[derive(Clone)]
pub struct AppState {
    pub registrar: Arc<PeerRegistrar>,
    pub health: HealthChecker,
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub public_key: String,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/register-key-get-ip", post(register_handler))
        .route("/health", get(health_handler))
        .route("/ready", get(ready_handler))
        .with_state(state)
}

/// POST /api/register-key-get-ip
pub async fn register_handler(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> (StatusCode, Json<Value>) {
    match state.registrar.register(&payload.public_key).await {
        Ok(address) => {
            info!(%address, "Peer registered via API");
            state.health.update_component(REGISTRAR, HealthStatus::Healthy, None).await;
            (StatusCode::OK, Json(json!({ "ipaddress": address.to_string() })))
        }
        Err(e @ VpnodeError::InvalidPublicKey { .. }) => {
            warn!(error = %e, "Rejected registration");
            (StatusCode::BAD_REQUEST, Json(json!({ "error": e.to_string() })))
        }
        Err(VpnodeError::PoolExhausted) => {
            error!("Registration failed: address pool exhausted");
            state
                .health
                .update_component(
                    REGISTRAR,
                    HealthStatus::Unhealthy,
                    Some("address pool exhausted".to_string()),
                )
                .await;
            (StatusCode::SERVICE_UNAVAILABLE, Json(json!({ "error": "Address pool exhausted" })))
        }
        Err(e) => {
            error!(error = %e, "Registration failed");
            state
                .health
                .update_component(REGISTRAR, HealthStatus::Degraded, Some(e.to_string()))
                .await;
            (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": "Failed to add peer" })))
        }
    }
}

/// GET /health
pub async fn health_handler(State(state): State<AppState>) -> (StatusCode, Json<HealthCheck>) {
    let health = state.health.get_health().await;
    let code = match health.status {
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::OK,
    };
    (code, Json(health))
}

/// GET /ready
pub async fn ready_handler(State(state): State<AppState>) -> StatusCode {
    if state.health.is_ready().await {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}
