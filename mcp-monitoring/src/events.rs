//! Monitor event bus
//!
//! The monitor publishes one [`MonitorEvent`] per tracked change on a
//! bounded broadcast channel. Consumers subscribe for the kinds they care
//! about; publishing never blocks the tracking call.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;
use tokio::sync::broadcast;

pub use tokio::sync::broadcast::error::{RecvError, TryRecvError};

/// Kind of a published event; the serialised name is the wire `type`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// An activity record was appended
    Activity,
    RequestCompleted,
    McpCallCompleted,
    ModelCallCompleted,
    HealthUpdated,
}

impl EventKind {
    pub const ALL: [EventKind; 5] = [
        EventKind::Activity,
        EventKind::RequestCompleted,
        EventKind::McpCallCompleted,
        EventKind::ModelCallCompleted,
        EventKind::HealthUpdated,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Activity => "activity",
            Self::RequestCompleted => "request_completed",
            Self::McpCallCompleted => "mcp_call_completed",
            Self::ModelCallCompleted => "model_call_completed",
            Self::HealthUpdated => "health_updated",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A structured event emitted by the monitor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorEvent {
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub data: Value,
    /// Unix epoch milliseconds at emission
    pub timestamp: i64,
}

/// Set of event kinds a subscriber wants
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventFilter {
    kinds: HashSet<EventKind>,
}

impl EventFilter {
    pub fn all() -> Self {
        Self::only(EventKind::ALL)
    }

    pub fn only<I: IntoIterator<Item = EventKind>>(kinds: I) -> Self {
        Self {
            kinds: kinds.into_iter().collect(),
        }
    }

    pub fn matches(&self, kind: EventKind) -> bool {
        self.kinds.contains(&kind)
    }
}

impl Default for EventFilter {
    fn default() -> Self {
        Self::all()
    }
}

/// Receiving end of a filtered subscription
#[derive(Debug)]
pub struct EventSubscription {
    receiver: broadcast::Receiver<MonitorEvent>,
    filter: EventFilter,
}

impl EventSubscription {
    pub(crate) fn new(receiver: broadcast::Receiver<MonitorEvent>, filter: EventFilter) -> Self {
        Self { receiver, filter }
    }

    /// Wait for the next matching event.
    ///
    /// `RecvError::Lagged(n)` means `n` events were overwritten before this
    /// subscriber read them; the subscription stays usable afterwards.
    pub async fn recv(&mut self) -> Result<MonitorEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.filter.matches(event.kind) {
                return Ok(event);
            }
        }
    }

    /// Next matching event if one is already queued
    pub fn try_recv(&mut self) -> Result<MonitorEvent, TryRecvError> {
        loop {
            let event = self.receiver.try_recv()?;
            if self.filter.matches(event.kind) {
                return Ok(event);
            }
        }
    }

    pub fn filter(&self) -> &EventFilter {
        &self.filter
    }
}
