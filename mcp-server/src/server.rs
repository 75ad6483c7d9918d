//! Router assembly and serving

use crate::broadcaster::{EventBroadcaster, spawn_event_logger};
use crate::error::ServerError;
use crate::health_endpoint::create_health_router;
use crate::metrics_endpoint::{PrometheusMetrics, create_metrics_router};
use crate::middleware::instrument;
use crate::websocket::create_websocket_router;
use axum::Router;
use mcp_agent_monitoring::Monitor;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::env;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tracing::info;

/// Listener and HTTP surface configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub enable_cors: bool,
    /// Forward every monitor event to `tracing` at debug level
    pub log_events: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            enable_cors: true,
            log_events: false,
        }
    }
}

impl ServerConfig {
    /// Read `HOST` and `PORT`, keeping defaults for anything unset or invalid
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: env::var("HOST").unwrap_or(defaults.host),
            port: env::var("PORT")
                .ok()
                .and_then(|port| port.parse().ok())
                .unwrap_or(defaults.port),
            ..defaults
        }
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, ServerError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| ServerError::config(format!("Invalid address: {e}")))
    }
}

/// Monitoring HTTP surface bound to one [`Monitor`]
pub struct MonitoringServer {
    config: ServerConfig,
    monitor: Monitor,
    broadcaster: Arc<EventBroadcaster>,
    prometheus: Arc<PrometheusMetrics>,
}

impl MonitoringServer {
    pub fn new(monitor: Monitor, config: ServerConfig) -> Result<Self, ServerError> {
        let broadcaster = Arc::new(EventBroadcaster::new(monitor.clone()));
        Self::with_broadcaster(broadcaster, config)
    }

    /// Share an existing broadcaster (and its subscriber registry)
    pub fn with_broadcaster(
        broadcaster: Arc<EventBroadcaster>,
        config: ServerConfig,
    ) -> Result<Self, ServerError> {
        Ok(Self {
            config,
            monitor: broadcaster.monitor().clone(),
            broadcaster,
            prometheus: Arc::new(PrometheusMetrics::new()?),
        })
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn monitor(&self) -> &Monitor {
        &self.monitor
    }

    pub fn broadcaster(&self) -> &Arc<EventBroadcaster> {
        &self.broadcaster
    }

    /// Merge `app` with the monitoring routes.
    ///
    /// The application routes and the pull endpoints are instrumented; the
    /// WebSocket upgrade route is not, since a `101` is not a completed
    /// request.
    pub fn router(&self, app: Router) -> Router {
        let instrumented = app
            .merge(create_metrics_router(
                self.monitor.clone(),
                Arc::clone(&self.prometheus),
            ))
            .merge(create_health_router(self.monitor.clone()));

        let router = instrument(instrumented, self.monitor.clone())
            .merge(create_websocket_router(Arc::clone(&self.broadcaster)));

        if self.config.enable_cors {
            router.layer(ServiceBuilder::new().layer(CorsLayer::very_permissive()))
        } else {
            router
        }
    }

    pub async fn bind(&self) -> Result<TcpListener, ServerError> {
        let addr = self.config.socket_addr()?;
        Ok(TcpListener::bind(addr).await?)
    }

    /// Serve `app` plus the monitoring routes on `listener` until the
    /// connection loop stops
    pub async fn serve(self, listener: TcpListener, app: Router) -> Result<(), ServerError> {
        let addr = listener.local_addr()?;
        let router = self.router(app);

        if self.config.log_events {
            spawn_event_logger(&self.monitor);
        }

        self.monitor
            .log_activity("SERVER_START", json!({ "address": addr.to_string() }))?;
        info!("Monitoring server listening on {}", addr);
        info!("  GET    http://{}/metrics             - Metrics snapshot", addr);
        info!("  GET    http://{}/activity            - Recent activity", addr);
        info!("  POST   http://{}/monitoring/reset    - Reset metrics", addr);
        info!("  GET    http://{}/health              - Health check", addr);
        info!("  GET    http://{}/metrics/prometheus  - Prometheus export", addr);
        info!("  GET    ws://{}/ws                    - Live channel", addr);

        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await?;
        Ok(())
    }
}
