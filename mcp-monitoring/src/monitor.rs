//! Monitor facade
//!
//! [`Monitor`] owns the metrics store, the activity log and the health
//! aggregator behind a single lock. Every mutation goes through one of its
//! tracking methods, which also publishes the matching [`MonitorEvent`]s.
//! Cloning a monitor is cheap and yields a handle to the same state.

use crate::activity::{ActivityKind, ActivityLog, ActivityRecord};
use crate::config::{MAX_EVENT_BUFFER, MonitoringConfig};
use crate::error::{MonitorError, Result};
use crate::events::{EventFilter, EventKind, EventSubscription, MonitorEvent};
use crate::health::{ComponentStatus, HealthAggregator, HealthReport};
use crate::metrics::{MetricsSnapshot, MetricsStore, is_success_status};
use crate::request::{ABORTED_STATUS, InFlightRequest, RequestInfo};
use crate::tracker::{CallHandle, CallKind, CallOutcome, summarize, truncate_chars};
use chrono::Utc;
use serde_json::{Value, json};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, info};

/// Bucket used when a caller passes an empty tool or model name
pub const UNKNOWN_IDENTITY: &str = "unknown";

struct MonitorState {
    metrics: MetricsStore,
    activity: ActivityLog,
    health: HealthAggregator,
}

struct Shared {
    config: MonitoringConfig,
    state: Mutex<MonitorState>,
    events: broadcast::Sender<MonitorEvent>,
}

/// Central monitoring instance shared by every instrumented collaborator
#[derive(Clone)]
pub struct Monitor {
    shared: Arc<Shared>,
}

impl fmt::Debug for Monitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Monitor")
            .field("config", &self.shared.config)
            .field("subscribers", &self.shared.events.receiver_count())
            .finish()
    }
}

impl Default for Monitor {
    fn default() -> Self {
        Self::new(MonitoringConfig::default())
    }
}

/// Lock-scoped view that mutates state and publishes events in mutation order
struct Tracking<'a> {
    state: MutexGuard<'a, MonitorState>,
    events: &'a broadcast::Sender<MonitorEvent>,
    config: &'a MonitoringConfig,
}

impl Tracking<'_> {
    fn emit(&self, kind: EventKind, data: Value) {
        let event = MonitorEvent {
            kind,
            data,
            timestamp: Utc::now().timestamp_millis(),
        };
        // No receivers is not an error for the tracked process
        let _ = self.events.send(event);
    }

    fn log(&mut self, kind: ActivityKind, data: Value) -> ActivityRecord {
        let record = self.state.activity.append(kind, data);
        debug!(id = record.id, kind = %record.kind, "Activity recorded");
        match serde_json::to_value(&record) {
            Ok(payload) => self.emit(EventKind::Activity, payload),
            Err(e) => debug!("Failed to serialize activity record: {}", e),
        }
        record
    }

    fn update_health(&mut self, component: &str, status: ComponentStatus, details: Value) {
        let now = Utc::now().timestamp_millis();
        let change = self.state.health.update(component, status, details, now);
        debug!(
            component = %change.component,
            status = %change.status,
            overall = %change.overall,
            "Health updated"
        );

        let payload = json!({
            "component": change.component,
            "status": change.status,
            "overall": change.overall,
            "details": change.details,
        });
        self.log(ActivityKind::HealthUpdate, payload.clone());
        self.emit(EventKind::HealthUpdated, payload);
    }

    fn complete_request(&mut self, endpoint: &str, status_code: u16, latency: Duration, aborted: bool) {
        let latency_ms = millis(latency);
        let success = is_success_status(status_code);
        self.state
            .metrics
            .record_request(endpoint, status_code, latency_ms);

        let mut record = json!({
            "endpoint": endpoint,
            "statusCode": status_code,
            "responseTime": latency_ms,
            "success": success,
        });
        if aborted {
            record["aborted"] = Value::Bool(true);
        }
        self.log(ActivityKind::RequestEnd, record.clone());
        self.emit(EventKind::RequestCompleted, record);
    }
}

impl Monitor {
    /// Create a monitor. Zero capacities are clamped to one and the event
    /// buffer to [`MAX_EVENT_BUFFER`].
    pub fn new(config: MonitoringConfig) -> Self {
        let (events, _) = broadcast::channel(config.event_buffer.clamp(1, MAX_EVENT_BUFFER));
        let state = MonitorState {
            metrics: MetricsStore::new(config.latency_sample_limit)
                .with_endpoint_limit(config.endpoint_limit),
            activity: ActivityLog::new(config.activity_capacity),
            health: HealthAggregator::new(config.components.iter().cloned()),
        };

        Self {
            shared: Arc::new(Shared {
                config,
                state: Mutex::new(state),
                events,
            }),
        }
    }

    /// Create a monitor after validating the configuration
    pub fn try_new(config: MonitoringConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::new(config))
    }

    pub fn config(&self) -> &MonitoringConfig {
        &self.shared.config
    }

    fn tracking(&self) -> Tracking<'_> {
        Tracking {
            // Tracking must never panic the instrumented process
            state: self
                .shared
                .state
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
            events: &self.shared.events,
            config: &self.shared.config,
        }
    }

    /// Subscribe to the event kinds selected by `filter`.
    ///
    /// Only events published after this call are delivered.
    pub fn subscribe(&self, filter: EventFilter) -> EventSubscription {
        EventSubscription::new(self.shared.events.subscribe(), filter)
    }

    /// Number of live event subscriptions
    pub fn subscriber_count(&self) -> usize {
        self.shared.events.receiver_count()
    }

    /// Append a free-form activity record (connection attempts, lifecycle
    /// markers and the like).
    ///
    /// Names owned by the tracking methods (`REQUEST_END`, `MCP_CALL_END`
    /// and so on) are rejected so the log cannot disagree with the counters.
    pub fn log_activity(&self, name: &str, data: Value) -> Result<ActivityRecord> {
        let kind = ActivityKind::from(name);
        if !matches!(kind, ActivityKind::Custom(_)) {
            return Err(MonitorError::ReservedActivity(name.to_string()));
        }
        Ok(self.tracking().log(kind, data))
    }

    /// Log `REQUEST_START` and return the guard that completes the request
    pub fn begin_request(&self, info: RequestInfo) -> InFlightRequest {
        let endpoint = normalize_endpoint(&info.path);
        self.tracking().log(
            ActivityKind::RequestStart,
            json!({
                "method": info.method,
                "endpoint": endpoint,
                "ip": info.remote_addr,
                "userAgent": info.user_agent,
            }),
        );
        InFlightRequest::new(self.clone(), endpoint)
    }

    /// Hook for the HTTP layer once a response status is final
    pub fn on_response_sent(&self, endpoint: &str, status_code: u16, latency: Duration) {
        let endpoint = normalize_endpoint(endpoint);
        self.tracking()
            .complete_request(&endpoint, status_code, latency, false);
    }

    pub(crate) fn record_aborted_request(&self, endpoint: &str, latency: Duration) {
        debug!(endpoint, "Request dropped before a response was produced");
        self.tracking()
            .complete_request(endpoint, ABORTED_STATUS, latency, true);
    }

    /// Start tracking an MCP tool call
    pub fn track_tool_call(&self, tool: &str, params: &Value) -> CallHandle {
        let tool = normalize_identity(tool);
        let mut tracking = self.tracking();
        tracking.state.metrics.begin_tool_call(&tool);
        let params = summarize(params, tracking.config.summary_max_chars);
        tracking.log(
            ActivityKind::McpCallStart,
            json!({ "tool": tool, "params": params }),
        );
        drop(tracking);

        CallHandle::new(self.clone(), CallKind::Tool, tool)
    }

    /// Start tracking a model inference call
    pub fn track_model_call(&self, model: &str, prompt: &str) -> CallHandle {
        let model = normalize_identity(model);
        let mut tracking = self.tracking();
        tracking.state.metrics.begin_model_call();
        tracking.log(
            ActivityKind::ModelCallStart,
            json!({ "model": model, "promptLength": prompt.chars().count() }),
        );
        drop(tracking);

        CallHandle::new(self.clone(), CallKind::Model, model)
    }

    pub(crate) fn complete_call(
        &self,
        kind: CallKind,
        identity: &str,
        outcome: CallOutcome,
        latency: Duration,
        result: Option<&Value>,
    ) {
        let latency_ms = millis(latency);
        let success = outcome.is_success();
        let mut tracking = self.tracking();
        let max_chars = tracking.config.summary_max_chars;
        let summary = result
            .map(|value| summarize(value, max_chars))
            .unwrap_or_else(|| "error".to_string());

        let (identity_key, event_kind) = match kind {
            CallKind::Tool => {
                tracking
                    .state
                    .metrics
                    .record_tool_call(identity, success, latency_ms);
                tracking.log(
                    ActivityKind::McpCallEnd,
                    json!({
                        "tool": identity,
                        "success": success,
                        "responseTime": latency_ms,
                        "result": summary,
                    }),
                );
                ("tool", EventKind::McpCallCompleted)
            }
            CallKind::Model => {
                let warmed_up = tracking
                    .state
                    .metrics
                    .record_model_call(success, latency_ms);
                if warmed_up {
                    info!(model = identity, "Model warmed up");
                    tracking.log(
                        ActivityKind::ModelWarmup,
                        json!({ "model": identity, "message": "Model is now warmed up" }),
                    );
                }
                let result_length = result.map(|value| match value {
                    Value::String(s) => s.chars().count(),
                    other => other.to_string().chars().count(),
                });
                tracking.log(
                    ActivityKind::ModelCallEnd,
                    json!({
                        "model": identity,
                        "success": success,
                        "responseTime": latency_ms,
                        "resultLength": result_length.unwrap_or(0),
                    }),
                );
                ("model", EventKind::ModelCallCompleted)
            }
        };

        tracking.emit(
            event_kind,
            json!({
                identity_key: identity,
                "success": success,
                "outcome": outcome,
                "responseTime": latency_ms,
                "result": summary,
            }),
        );

        let details = match outcome {
            CallOutcome::Success => json!({}),
            CallOutcome::ApplicationError => json!({ identity_key: identity, "lastError": summary }),
            CallOutcome::TransportError => json!({ identity_key: identity, "error": summary }),
        };
        tracking.update_health(kind.component(), outcome.health_status(), details);
    }

    /// Set a component's status; appends `HEALTH_UPDATE` and publishes
    /// `health_updated`
    pub fn update_health(&self, component: &str, status: ComponentStatus, details: Value) {
        let component = normalize_identity(component);
        self.tracking().update_health(&component, status, details);
    }

    /// Point-in-time view of all counters, health and recent activity
    pub fn snapshot(&self) -> MetricsSnapshot {
        let state = self.tracking().state;
        MetricsSnapshot {
            counters: state.metrics.snapshot(),
            health: state.health.summary(),
            recent_activity: state
                .activity
                .recent(self.shared.config.snapshot_activity_len)
                .cloned()
                .collect(),
        }
    }

    /// The last `limit` activity records, oldest first
    pub fn recent_activity(&self, limit: usize) -> Vec<ActivityRecord> {
        self.tracking()
            .state
            .activity
            .recent(limit)
            .cloned()
            .collect()
    }

    pub fn health_report(&self) -> HealthReport {
        self.tracking().state.health.report()
    }

    /// Zero every counter, clear the activity log and health, then append a
    /// single `METRICS_RESET` record
    pub fn reset(&self) {
        let mut tracking = self.tracking();
        let config = tracking.config;
        tracking.state.metrics.reset();
        tracking.state.activity.clear();
        tracking.state.health = HealthAggregator::new(config.components.iter().cloned());
        tracking.log(
            ActivityKind::MetricsReset,
            json!({ "timestamp": Utc::now().to_rfc3339() }),
        );
        info!("Monitoring metrics reset");
    }
}

fn millis(latency: Duration) -> u64 {
    u64::try_from(latency.as_millis()).unwrap_or(u64::MAX)
}

fn normalize_identity(name: &str) -> String {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        UNKNOWN_IDENTITY.to_string()
    } else {
        trimmed.to_string()
    }
}

fn normalize_endpoint(path: &str) -> String {
    if path.is_empty() {
        "/".to_string()
    } else {
        truncate_chars(path, 512)
    }
}
