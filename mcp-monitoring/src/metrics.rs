//! In-memory metrics store and the snapshot types it produces
//!
//! Counters only grow until [`MetricsStore::reset`]. Call groups count an
//! attempt when the call starts and a success or failure when it completes,
//! so `successful + failed <= calls` holds at every point in time.

use crate::activity::ActivityRecord;
use crate::health::HealthSummary;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};

/// Bucket shared by endpoints seen after the endpoint limit is reached
pub const OVERFLOW_ENDPOINT: &str = "<other>";

const DEFAULT_ENDPOINT_LIMIT: usize = 100;

/// Per-endpoint request counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointStats {
    pub count: u64,
    /// Sum of latencies in milliseconds
    pub total_time: u64,
}

/// Inbound HTTP request counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestMetrics {
    pub total: u64,
    pub successful: u64,
    pub failed: u64,
    pub by_endpoint: BTreeMap<String, EndpointStats>,
}

/// Per-tool call counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolStats {
    /// Attempts, counted when the call starts
    pub count: u64,
    pub total_time: u64,
    pub successful: u64,
    pub failed: u64,
}

/// Tool-call group as it appears in a snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct McpMetrics {
    pub calls: u64,
    pub successful: u64,
    pub failed: u64,
    pub tools: BTreeMap<String, ToolStats>,
    pub response_times: Vec<u64>,
}

/// Model-call group as it appears in a snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelMetrics {
    pub calls: u64,
    pub successful: u64,
    pub failed: u64,
    pub response_times: Vec<u64>,
    pub warmup: bool,
}

/// Counters plus derived statistics, without health or activity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CounterSnapshot {
    /// Unix epoch milliseconds
    pub start_time: i64,
    /// Milliseconds since `start_time`
    pub uptime: u64,
    pub uptime_formatted: String,
    pub requests: RequestMetrics,
    pub mcp: McpMetrics,
    pub model: ModelMetrics,
    pub average_response_time: u64,
    pub requests_per_minute: u64,
    pub mcp_success_rate: u64,
    pub model_success_rate: u64,
    #[serde(rename = "averageMCPResponseTime")]
    pub average_mcp_response_time: u64,
    pub average_model_response_time: u64,
}

/// Full point-in-time view served by the pull endpoint and pushed to
/// live subscribers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    #[serde(flatten)]
    pub counters: CounterSnapshot,
    pub health: HealthSummary,
    pub recent_activity: Vec<ActivityRecord>,
}

/// Bounded window of latency samples with an exact running mean
#[derive(Debug, Clone)]
struct LatencyWindow {
    samples: VecDeque<u64>,
    limit: usize,
    sum: u64,
    count: u64,
}

impl LatencyWindow {
    fn new(limit: usize) -> Self {
        Self {
            samples: VecDeque::new(),
            limit: limit.max(1),
            sum: 0,
            count: 0,
        }
    }

    fn push(&mut self, latency_ms: u64) {
        self.sum = self.sum.saturating_add(latency_ms);
        self.count += 1;
        self.samples.push_back(latency_ms);
        if self.samples.len() > self.limit {
            self.samples.pop_front();
        }
    }

    fn average(&self) -> u64 {
        average(self.sum, self.count)
    }

    fn to_vec(&self) -> Vec<u64> {
        self.samples.iter().copied().collect()
    }
}

#[derive(Debug, Clone)]
struct CallGroup {
    calls: u64,
    successful: u64,
    failed: u64,
    latency: LatencyWindow,
}

impl CallGroup {
    fn new(sample_limit: usize) -> Self {
        Self {
            calls: 0,
            successful: 0,
            failed: 0,
            latency: LatencyWindow::new(sample_limit),
        }
    }

    fn complete(&mut self, success: bool, latency_ms: u64) {
        if success {
            self.successful += 1;
        } else {
            self.failed += 1;
        }
        self.latency.push(latency_ms);
    }
}

/// Counters and timers for requests, tool calls and model calls
#[derive(Debug, Clone)]
pub struct MetricsStore {
    start_time: DateTime<Utc>,
    sample_limit: usize,
    endpoint_limit: usize,
    requests: RequestMetrics,
    mcp: CallGroup,
    tools: BTreeMap<String, ToolStats>,
    model: CallGroup,
    model_warmup: bool,
}

impl MetricsStore {
    pub fn new(sample_limit: usize) -> Self {
        Self::starting_at(Utc::now(), sample_limit)
    }

    pub fn starting_at(start_time: DateTime<Utc>, sample_limit: usize) -> Self {
        Self {
            start_time,
            sample_limit,
            endpoint_limit: DEFAULT_ENDPOINT_LIMIT,
            requests: RequestMetrics::default(),
            mcp: CallGroup::new(sample_limit),
            tools: BTreeMap::new(),
            model: CallGroup::new(sample_limit),
            model_warmup: false,
        }
    }

    /// Cap the number of distinct endpoint keys; later ones share
    /// [`OVERFLOW_ENDPOINT`]
    pub fn with_endpoint_limit(mut self, limit: usize) -> Self {
        self.endpoint_limit = limit.max(1);
        self
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    /// Record a finished inbound request. `200..400` counts as success.
    pub fn record_request(&mut self, endpoint: &str, status_code: u16, latency_ms: u64) {
        self.requests.total += 1;
        if is_success_status(status_code) {
            self.requests.successful += 1;
        } else {
            self.requests.failed += 1;
        }

        let by_endpoint = &mut self.requests.by_endpoint;
        let key = if by_endpoint.contains_key(endpoint) || by_endpoint.len() < self.endpoint_limit
        {
            endpoint
        } else {
            OVERFLOW_ENDPOINT
        };
        let stats = by_endpoint.entry(key.to_string()).or_default();
        stats.count += 1;
        stats.total_time = stats.total_time.saturating_add(latency_ms);
    }

    /// Count a tool-call attempt
    pub fn begin_tool_call(&mut self, tool: &str) {
        self.mcp.calls += 1;
        self.tools.entry(tool.to_string()).or_default().count += 1;
    }

    /// Record the outcome of a tool call started with [`Self::begin_tool_call`]
    pub fn record_tool_call(&mut self, tool: &str, success: bool, latency_ms: u64) {
        self.mcp.complete(success, latency_ms);

        let stats = self.tools.entry(tool.to_string()).or_default();
        stats.total_time = stats.total_time.saturating_add(latency_ms);
        if success {
            stats.successful += 1;
        } else {
            stats.failed += 1;
        }
    }

    /// Count a model-call attempt
    pub fn begin_model_call(&mut self) {
        self.model.calls += 1;
    }

    /// Record the outcome of a model call started with
    /// [`Self::begin_model_call`].
    ///
    /// Returns `true` when this call warmed the model up, i.e. it is the
    /// first successful model call since start or reset.
    pub fn record_model_call(&mut self, success: bool, latency_ms: u64) -> bool {
        self.model.complete(success, latency_ms);
        if success && !self.model_warmup {
            self.model_warmup = true;
            return true;
        }
        false
    }

    pub fn requests(&self) -> &RequestMetrics {
        &self.requests
    }

    pub fn tool(&self, name: &str) -> Option<&ToolStats> {
        self.tools.get(name)
    }

    /// Zero every counter and restart the uptime clock
    pub fn reset(&mut self) {
        *self = Self::new(self.sample_limit).with_endpoint_limit(self.endpoint_limit);
    }

    /// Materialise counters and derived statistics as of `now`
    pub fn snapshot_at(&self, now: DateTime<Utc>) -> CounterSnapshot {
        let uptime = u64::try_from((now - self.start_time).num_milliseconds()).unwrap_or(0);

        CounterSnapshot {
            start_time: self.start_time.timestamp_millis(),
            uptime,
            uptime_formatted: format_uptime(uptime),
            requests: self.requests.clone(),
            mcp: McpMetrics {
                calls: self.mcp.calls,
                successful: self.mcp.successful,
                failed: self.mcp.failed,
                tools: self.tools.clone(),
                response_times: self.mcp.latency.to_vec(),
            },
            model: ModelMetrics {
                calls: self.model.calls,
                successful: self.model.successful,
                failed: self.model.failed,
                response_times: self.model.latency.to_vec(),
                warmup: self.model_warmup,
            },
            average_response_time: self.average_response_time(),
            requests_per_minute: requests_per_minute(self.requests.total, uptime),
            mcp_success_rate: success_rate(self.mcp.successful, self.mcp.calls),
            model_success_rate: success_rate(self.model.successful, self.model.calls),
            average_mcp_response_time: self.mcp.latency.average(),
            average_model_response_time: self.model.latency.average(),
        }
    }

    pub fn snapshot(&self) -> CounterSnapshot {
        self.snapshot_at(Utc::now())
    }

    /// Mean of the per-endpoint mean latencies
    fn average_response_time(&self) -> u64 {
        let means: Vec<f64> = self
            .requests
            .by_endpoint
            .values()
            .filter(|stats| stats.count > 0)
            .map(|stats| stats.total_time as f64 / stats.count as f64)
            .collect();

        if means.is_empty() {
            return 0;
        }
        (means.iter().sum::<f64>() / means.len() as f64).round() as u64
    }
}

pub fn is_success_status(status_code: u16) -> bool {
    (200..400).contains(&status_code)
}

/// `round(successful / attempted * 100)`, or 100 when nothing was attempted
pub fn success_rate(successful: u64, attempted: u64) -> u64 {
    if attempted == 0 {
        return 100;
    }
    (successful as f64 / attempted as f64 * 100.0).round() as u64
}

/// Rounded mean, 0 without samples
pub fn average(sum: u64, count: u64) -> u64 {
    if count == 0 {
        return 0;
    }
    (sum as f64 / count as f64).round() as u64
}

/// Requests per elapsed minute, 0 before any time has passed
pub fn requests_per_minute(total: u64, uptime_ms: u64) -> u64 {
    if uptime_ms == 0 {
        return 0;
    }
    let minutes = uptime_ms as f64 / 60_000.0;
    (total as f64 / minutes).round() as u64
}

/// `HH:MM:SS`; hours keep counting past 24
pub fn format_uptime(uptime_ms: u64) -> String {
    let seconds = uptime_ms / 1000;
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let remaining = seconds % 60;
    format!("{hours:02}:{minutes:02}:{remaining:02}")
}
