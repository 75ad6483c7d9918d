//! Start/complete handles for outbound calls
//!
//! [`Monitor::track_tool_call`] and [`Monitor::track_model_call`] count the
//! attempt and hand back a [`CallHandle`]. Completing the handle records the
//! outcome once; later completions are rejected and leave metrics untouched.
//! A handle that is never completed stays counted as an unresolved attempt.

use crate::error::{MonitorError, Result};
use crate::health::ComponentStatus;
use crate::monitor::Monitor;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Class of outbound call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallKind {
    /// MCP tool invocation
    Tool,
    /// Model inference request
    Model,
}

impl CallKind {
    /// Health component that owns this class of call
    pub fn component(&self) -> &'static str {
        match self {
            Self::Tool => "mcp",
            Self::Model => "model",
        }
    }
}

impl fmt::Display for CallKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tool => f.write_str("tool"),
            Self::Model => f.write_str("model"),
        }
    }
}

/// How an outbound call ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallOutcome {
    Success,
    /// The peer answered with an application-level error
    ApplicationError,
    /// The call failed at the transport or protocol level
    TransportError,
}

impl CallOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    /// Status the owning component moves to after this outcome
    pub fn health_status(&self) -> ComponentStatus {
        match self {
            Self::Success => ComponentStatus::Healthy,
            Self::ApplicationError => ComponentStatus::Warning,
            Self::TransportError => ComponentStatus::Error,
        }
    }
}

/// Handle for one in-flight outbound call
#[derive(Debug)]
pub struct CallHandle {
    monitor: Monitor,
    kind: CallKind,
    identity: String,
    started: Instant,
    completed: AtomicBool,
}

impl CallHandle {
    pub(crate) fn new(monitor: Monitor, kind: CallKind, identity: String) -> Self {
        Self {
            monitor,
            kind,
            identity,
            started: Instant::now(),
            completed: AtomicBool::new(false),
        }
    }

    pub fn kind(&self) -> CallKind {
        self.kind
    }

    /// Tool name or model name
    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn started(&self) -> Instant {
        self.started
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn is_completed(&self) -> bool {
        self.completed.load(Ordering::Acquire)
    }

    /// Record the outcome with a caller-measured latency.
    ///
    /// Only the first completion is recorded; any later one returns
    /// [`MonitorError::AlreadyCompleted`].
    pub fn complete(
        &self,
        outcome: CallOutcome,
        latency: Duration,
        result: Option<&Value>,
    ) -> Result<()> {
        if self.completed.swap(true, Ordering::AcqRel) {
            return Err(MonitorError::AlreadyCompleted {
                kind: self.kind,
                identity: self.identity.clone(),
            });
        }
        self.monitor
            .complete_call(self.kind, &self.identity, outcome, latency, result);
        Ok(())
    }

    /// Record the outcome using the time elapsed since the call started
    pub fn finish(&self, outcome: CallOutcome, result: Option<&Value>) -> Result<()> {
        self.complete(outcome, self.elapsed(), result)
    }
}

/// Serialise `value` and keep at most `max_chars` characters
pub fn summarize(value: &Value, max_chars: usize) -> String {
    let text = match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    truncate_chars(&text, max_chars)
}

pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => text[..cut].to_string(),
        None => text.to_string(),
    }
}
