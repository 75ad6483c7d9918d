//! Pull endpoints: snapshot, activity, reset and Prometheus export

use crate::error::ServerError;
use axum::{
    Router,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, post},
};
use mcp_agent_monitoring::{ActivityRecord, ComponentStatus, MetricsSnapshot, Monitor};
use prometheus::{Encoder, IntGauge, IntGaugeVec, Opts, Registry, TextEncoder};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::warn;

/// Prometheus view over a monitor snapshot
pub struct PrometheusMetrics {
    registry: Registry,
    render_lock: Mutex<()>,
    uptime_seconds: IntGauge,
    requests: IntGaugeVec,
    endpoint_requests: IntGaugeVec,
    endpoint_time_ms: IntGaugeVec,
    tool_calls: IntGaugeVec,
    tool_time_ms: IntGaugeVec,
    calls: IntGaugeVec,
    average_response_ms: IntGaugeVec,
    success_rate: IntGaugeVec,
    model_warmup: IntGauge,
    component_health: IntGaugeVec,
}

impl PrometheusMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let uptime_seconds = IntGauge::new("agent_uptime_seconds", "Seconds since monitor start")?;
        let requests = IntGaugeVec::new(
            Opts::new("agent_requests_total", "Inbound HTTP requests by result"),
            &["result"],
        )?;
        let endpoint_requests = IntGaugeVec::new(
            Opts::new("agent_endpoint_requests_total", "Inbound HTTP requests by endpoint"),
            &["endpoint"],
        )?;
        let endpoint_time_ms = IntGaugeVec::new(
            Opts::new(
                "agent_endpoint_time_ms_total",
                "Cumulative request latency by endpoint in milliseconds",
            ),
            &["endpoint"],
        )?;
        let tool_calls = IntGaugeVec::new(
            Opts::new("agent_tool_calls_total", "MCP tool calls by tool and result"),
            &["tool", "result"],
        )?;
        let tool_time_ms = IntGaugeVec::new(
            Opts::new(
                "agent_tool_time_ms_total",
                "Cumulative tool call latency in milliseconds",
            ),
            &["tool"],
        )?;
        let calls = IntGaugeVec::new(
            Opts::new("agent_calls_total", "Outbound calls by class and result"),
            &["class", "result"],
        )?;
        let average_response_ms = IntGaugeVec::new(
            Opts::new(
                "agent_average_response_ms",
                "Average response time in milliseconds",
            ),
            &["class"],
        )?;
        let success_rate = IntGaugeVec::new(
            Opts::new("agent_success_rate_percent", "Outbound call success rate"),
            &["class"],
        )?;
        let model_warmup = IntGauge::new("agent_model_warmup", "1 once the model has warmed up")?;
        let component_health = IntGaugeVec::new(
            Opts::new(
                "agent_component_health",
                "Component status (0 unknown, 1 healthy, 2 warning, 3 error)",
            ),
            &["component"],
        )?;

        registry.register(Box::new(uptime_seconds.clone()))?;
        registry.register(Box::new(requests.clone()))?;
        registry.register(Box::new(endpoint_requests.clone()))?;
        registry.register(Box::new(endpoint_time_ms.clone()))?;
        registry.register(Box::new(tool_calls.clone()))?;
        registry.register(Box::new(tool_time_ms.clone()))?;
        registry.register(Box::new(calls.clone()))?;
        registry.register(Box::new(average_response_ms.clone()))?;
        registry.register(Box::new(success_rate.clone()))?;
        registry.register(Box::new(model_warmup.clone()))?;
        registry.register(Box::new(component_health.clone()))?;

        Ok(Self {
            registry,
            render_lock: Mutex::new(()),
            uptime_seconds,
            requests,
            endpoint_requests,
            endpoint_time_ms,
            tool_calls,
            tool_time_ms,
            calls,
            average_response_ms,
            success_rate,
            model_warmup,
            component_health,
        })
    }

    fn update_from_snapshot(&self, snapshot: &MetricsSnapshot) {
        let counters = &snapshot.counters;

        self.uptime_seconds.set(gauge(counters.uptime / 1000));

        self.requests.reset();
        self.requests
            .with_label_values(&["total"])
            .set(gauge(counters.requests.total));
        self.requests
            .with_label_values(&["successful"])
            .set(gauge(counters.requests.successful));
        self.requests
            .with_label_values(&["failed"])
            .set(gauge(counters.requests.failed));

        self.endpoint_requests.reset();
        self.endpoint_time_ms.reset();
        for (endpoint, stats) in &counters.requests.by_endpoint {
            self.endpoint_requests
                .with_label_values(&[endpoint.as_str()])
                .set(gauge(stats.count));
            self.endpoint_time_ms
                .with_label_values(&[endpoint.as_str()])
                .set(gauge(stats.total_time));
        }

        self.tool_calls.reset();
        self.tool_time_ms.reset();
        for (tool, stats) in &counters.mcp.tools {
            self.tool_calls
                .with_label_values(&[tool.as_str(), "attempted"])
                .set(gauge(stats.count));
            self.tool_calls
                .with_label_values(&[tool.as_str(), "successful"])
                .set(gauge(stats.successful));
            self.tool_calls
                .with_label_values(&[tool.as_str(), "failed"])
                .set(gauge(stats.failed));
            self.tool_time_ms
                .with_label_values(&[tool.as_str()])
                .set(gauge(stats.total_time));
        }

        self.calls.reset();
        for (class, calls, successful, failed) in [
            ("mcp", counters.mcp.calls, counters.mcp.successful, counters.mcp.failed),
            (
                "model",
                counters.model.calls,
                counters.model.successful,
                counters.model.failed,
            ),
        ] {
            self.calls
                .with_label_values(&[class, "attempted"])
                .set(gauge(calls));
            self.calls
                .with_label_values(&[class, "successful"])
                .set(gauge(successful));
            self.calls
                .with_label_values(&[class, "failed"])
                .set(gauge(failed));
        }

        self.average_response_ms
            .with_label_values(&["request"])
            .set(gauge(counters.average_response_time));
        self.average_response_ms
            .with_label_values(&["mcp"])
            .set(gauge(counters.average_mcp_response_time));
        self.average_response_ms
            .with_label_values(&["model"])
            .set(gauge(counters.average_model_response_time));

        self.success_rate
            .with_label_values(&["mcp"])
            .set(gauge(counters.mcp_success_rate));
        self.success_rate
            .with_label_values(&["model"])
            .set(gauge(counters.model_success_rate));

        self.model_warmup.set(i64::from(counters.model.warmup));

        self.component_health.reset();
        for (component, status) in &snapshot.health.components {
            self.component_health
                .with_label_values(&[component.as_str()])
                .set(status_code(*status));
        }
    }

    /// Refresh every gauge from `snapshot` and render the text exposition
    pub fn render(&self, snapshot: &MetricsSnapshot) -> Result<String, ServerError> {
        let _guard = self
            .render_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        self.update_from_snapshot(snapshot);

        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = vec![];
        encoder.encode(&metric_families, &mut buffer)?;
        String::from_utf8(buffer)
            .map_err(|e| ServerError::Prometheus(prometheus::Error::Msg(e.to_string())))
    }
}

fn gauge(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn status_code(status: ComponentStatus) -> i64 {
    match status {
        ComponentStatus::Unknown => 0,
        ComponentStatus::Healthy => 1,
        ComponentStatus::Warning => 2,
        ComponentStatus::Error => 3,
    }
}

/// State for the pull endpoints
pub struct MetricsState {
    pub monitor: Monitor,
    pub prometheus: Arc<PrometheusMetrics>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ActivityQuery {
    /// Kept as text so a malformed value falls back to the default
    pub limit: Option<String>,
}

impl ActivityQuery {
    pub fn resolve(&self, default: usize) -> usize {
        self.limit
            .as_deref()
            .and_then(|raw| raw.trim().parse::<usize>().ok())
            .filter(|limit| *limit > 0)
            .unwrap_or(default)
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ResetResponse {
    pub message: String,
}

/// Handler for `GET /metrics`
pub async fn metrics_handler(State(state): State<Arc<MetricsState>>) -> Json<MetricsSnapshot> {
    Json(state.monitor.snapshot())
}

/// Handler for `GET /activity?limit=N`
pub async fn activity_handler(
    State(state): State<Arc<MetricsState>>,
    Query(query): Query<ActivityQuery>,
) -> Json<Vec<ActivityRecord>> {
    let limit = query.resolve(state.monitor.config().default_activity_limit);
    Json(state.monitor.recent_activity(limit))
}

/// Handler for `POST /monitoring/reset`
pub async fn reset_handler(State(state): State<Arc<MetricsState>>) -> Json<ResetResponse> {
    state.monitor.reset();
    Json(ResetResponse {
        message: "Monitoring metrics reset".to_string(),
    })
}

/// Handler for `GET /metrics/prometheus`
pub async fn prometheus_handler(State(state): State<Arc<MetricsState>>) -> impl IntoResponse {
    let snapshot = state.monitor.snapshot();
    match state.prometheus.render(&snapshot) {
        Ok(metrics) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4")],
            metrics,
        )
            .into_response(),
        Err(e) => {
            warn!("Failed to render Prometheus metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Error rendering metrics: {e}"),
            )
                .into_response()
        }
    }
}

/// Create the pull endpoint router
pub fn create_metrics_router(monitor: Monitor, prometheus: Arc<PrometheusMetrics>) -> Router {
    let state = Arc::new(MetricsState {
        monitor,
        prometheus,
    });

    Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/metrics/prometheus", get(prometheus_handler))
        .route("/activity", get(activity_handler))
        .route("/monitoring/reset", post(reset_handler))
        .with_state(state)
}
