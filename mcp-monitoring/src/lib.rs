//! Real-time monitoring core for MCP agents
//!
//! This crate provides the in-process observability state of an agent that
//! serves HTTP requests and calls out to MCP tools and a model endpoint:
//! - Request, tool-call and model-call counters with derived statistics
//! - A bounded activity log of timestamped records
//! - Per-component health with a derived overall status
//! - An event bus that live subscribers (WebSocket clients, loggers) read from
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use mcp_agent_monitoring::{CallOutcome, Monitor, MonitoringConfig};
//! use serde_json::json;
//!
//! let monitor = Monitor::new(MonitoringConfig::default());
//!
//! let call = monitor.track_tool_call("search", &json!({"query": "rust"}));
//! // ... perform the call ...
//! let _ = call.finish(CallOutcome::Success, Some(&json!({"hits": 3})));
//!
//! let snapshot = monitor.snapshot();
//! println!("MCP calls: {}", snapshot.counters.mcp.calls);
//! println!("Uptime: {}", snapshot.counters.uptime_formatted);
//! ```
//!
//! The monitor is an explicit instance: clone it into every collaborator that
//! needs to record something. There is no global.

pub mod activity;
pub mod config;
pub mod error;
pub mod events;
pub mod health;
pub mod metrics;
pub mod monitor;
pub mod request;
pub mod tracker;

pub use activity::{ActivityKind, ActivityLog, ActivityRecord};
pub use config::{MAX_EVENT_BUFFER, MonitoringConfig};
pub use error::{MonitorError, Result};
pub use events::{EventFilter, EventKind, EventSubscription, MonitorEvent};
pub use health::{
    ComponentHealth, ComponentStatus, HealthAggregator, HealthReport, HealthSummary, OverallStatus,
};
pub use metrics::{
    CounterSnapshot, EndpointStats, McpMetrics, MetricsSnapshot, MetricsStore, ModelMetrics,
    OVERFLOW_ENDPOINT, RequestMetrics, ToolStats,
};
pub use monitor::Monitor;
pub use request::{ABORTED_STATUS, InFlightRequest, RequestInfo};
pub use tracker::{CallHandle, CallKind, CallOutcome};

/// Default monitoring configuration
pub fn default_config() -> MonitoringConfig {
    MonitoringConfig::default()
}

#[cfg(test)]
mod monitor_tests;
#[cfg(test)]
mod tracker_tests;
