//! Error types for the monitoring core

use crate::tracker::CallKind;
use thiserror::Error;

/// Result type for monitoring operations
pub type Result<T> = std::result::Result<T, MonitorError>;

/// Errors surfaced by the monitoring API
///
/// Tracking itself never fails the instrumented process; these errors only
/// report misuse (a handle completed twice, a spoofed activity type) or a bad
/// configuration.
#[derive(Debug, Error)]
pub enum MonitorError {
    /// A call handle was completed more than once; the first completion stands
    #[error("{kind} call '{identity}' was already completed")]
    AlreadyCompleted { kind: CallKind, identity: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// A free-form activity used a name reserved for tracked records
    #[error("Activity type '{0}' is reserved for tracked events")]
    ReservedActivity(String),
}

impl MonitorError {
    /// Create a configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }
}
