//! HTTP surface for MCP agent monitoring
//!
//! This crate exposes a [`Monitor`] over HTTP:
//! - Request instrumentation middleware for the agent's own routes
//! - Pull endpoints for snapshots, activity, reset, health and Prometheus
//! - A WebSocket channel that pushes a snapshot, every monitor event and a
//!   periodic snapshot to each connected observer
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use axum::{Router, routing::post};
//! use mcp_agent_monitoring::{Monitor, MonitoringConfig};
//! use mcp_agent_server::{LoggingConfig, MonitoringServer, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     LoggingConfig::from_env().initialize()?;
//!
//!     let monitor = Monitor::try_new(MonitoringConfig::from_env())?;
//!     let server = MonitoringServer::new(monitor.clone(), ServerConfig::from_env())?;
//!
//!     let app = Router::new().route("/chat", post(|| async { "ok" }));
//!     let listener = server.bind().await?;
//!     server.serve(listener, app).await?;
//!     Ok(())
//! }
//! ```

pub mod broadcaster;
pub mod error;
pub mod health_endpoint;
pub mod logging;
pub mod metrics_endpoint;
pub mod middleware;
pub mod server;
pub mod websocket;

pub use broadcaster::{
    ChannelMessage, EventBroadcaster, SnapshotKind, SubscriberInfo, Subscription,
    spawn_event_logger,
};
pub use error::ServerError;
pub use health_endpoint::HealthResponse;
pub use logging::{LogFormat, LoggingConfig};
pub use metrics_endpoint::PrometheusMetrics;
pub use middleware::{UNMATCHED_ROUTE, instrument, instrument_requests};
pub use server::{MonitoringServer, ServerConfig};

pub use mcp_agent_monitoring::Monitor;

#[cfg(test)]
mod broadcaster_tests;
