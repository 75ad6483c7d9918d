//! Bounded activity log
//!
//! A fixed-capacity FIFO of timestamped records. Every tracked event lands
//! here; once the log is full the oldest record is evicted.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::collections::VecDeque;
use std::fmt;

/// Type tag of an activity record
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ActivityKind {
    RequestStart,
    RequestEnd,
    McpCallStart,
    McpCallEnd,
    ModelCallStart,
    ModelCallEnd,
    ModelWarmup,
    HealthUpdate,
    MetricsReset,
    /// Free-form type appended by collaborators (e.g. `MCP_CONNECT_START`)
    Custom(String),
}

impl ActivityKind {
    pub fn as_str(&self) -> &str {
        match self {
            Self::RequestStart => "REQUEST_START",
            Self::RequestEnd => "REQUEST_END",
            Self::McpCallStart => "MCP_CALL_START",
            Self::McpCallEnd => "MCP_CALL_END",
            Self::ModelCallStart => "MODEL_CALL_START",
            Self::ModelCallEnd => "MODEL_CALL_END",
            Self::ModelWarmup => "MODEL_WARMUP",
            Self::HealthUpdate => "HEALTH_UPDATE",
            Self::MetricsReset => "METRICS_RESET",
            Self::Custom(name) => name,
        }
    }
}

impl From<&str> for ActivityKind {
    fn from(name: &str) -> Self {
        match name {
            "REQUEST_START" => Self::RequestStart,
            "REQUEST_END" => Self::RequestEnd,
            "MCP_CALL_START" => Self::McpCallStart,
            "MCP_CALL_END" => Self::McpCallEnd,
            "MODEL_CALL_START" => Self::ModelCallStart,
            "MODEL_CALL_END" => Self::ModelCallEnd,
            "MODEL_WARMUP" => Self::ModelWarmup,
            "HEALTH_UPDATE" => Self::HealthUpdate,
            "METRICS_RESET" => Self::MetricsReset,
            other => Self::Custom(other.to_string()),
        }
    }
}

impl fmt::Display for ActivityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ActivityKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ActivityKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Ok(Self::from(name.as_str()))
    }
}

/// A single immutable activity entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityRecord {
    /// Unique, strictly increasing per monitor
    pub id: u64,
    #[serde(rename = "type")]
    pub kind: ActivityKind,
    pub data: Value,
    /// Unix epoch milliseconds
    pub timestamp: i64,
}

/// Fixed-capacity ring of activity records
#[derive(Debug)]
pub struct ActivityLog {
    records: VecDeque<ActivityRecord>,
    capacity: usize,
    next_id: u64,
}

impl ActivityLog {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            records: VecDeque::with_capacity(capacity),
            capacity,
            next_id: 1,
        }
    }

    /// Append a record stamped with the current time
    pub fn append(&mut self, kind: ActivityKind, data: Value) -> ActivityRecord {
        self.append_at(kind, data, chrono::Utc::now().timestamp_millis())
    }

    /// Append a record with an explicit timestamp
    pub fn append_at(&mut self, kind: ActivityKind, data: Value, timestamp: i64) -> ActivityRecord {
        let record = ActivityRecord {
            id: self.next_id,
            kind,
            data,
            timestamp,
        };
        self.next_id += 1;

        self.records.push_back(record.clone());
        while self.records.len() > self.capacity {
            self.records.pop_front();
        }
        record
    }

    /// The last `n` records in insertion order.
    ///
    /// The iterator borrows the log, so each call starts from the current
    /// contents; cloning it restarts the walk.
    pub fn recent(&self, n: usize) -> impl DoubleEndedIterator<Item = &ActivityRecord> + Clone {
        let skip = self.records.len().saturating_sub(n);
        self.records.iter().skip(skip)
    }

    /// Drop every record. Ids keep increasing so they are never reused.
    pub fn clear(&mut self) {
        self.records.clear();
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
