//! Health check endpoint

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::get,
};
use chrono::Utc;
use mcp_agent_monitoring::{ComponentHealth, MetricsSnapshot, Monitor, OverallStatus};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: OverallStatus,
    /// Unix epoch milliseconds
    pub timestamp: i64,
    pub last_check: Option<i64>,
    pub version: String,
    pub components: BTreeMap<String, ComponentHealth>,
    pub monitoring: MetricsSnapshot,
}

impl HealthResponse {
    pub fn from_monitor(monitor: &Monitor) -> Self {
        let report = monitor.health_report();
        Self {
            status: report.status,
            timestamp: Utc::now().timestamp_millis(),
            last_check: report.last_check,
            version: env!("CARGO_PKG_VERSION").to_string(),
            components: report.components,
            monitoring: monitor.snapshot(),
        }
    }

    /// 503 only when a component reports an error
    pub fn status_code(&self) -> StatusCode {
        match self.status {
            OverallStatus::Error => StatusCode::SERVICE_UNAVAILABLE,
            OverallStatus::Starting | OverallStatus::Healthy | OverallStatus::Warning => {
                StatusCode::OK
            }
        }
    }
}

/// Handler for `GET /health`
pub async fn health_handler(State(monitor): State<Monitor>) -> impl IntoResponse {
    let response = HealthResponse::from_monitor(&monitor);
    (response.status_code(), Json(response))
}

/// Create health check router
pub fn create_health_router(monitor: Monitor) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .with_state(monitor)
}
