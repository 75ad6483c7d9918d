//! In-flight inbound request guard
//!
//! [`Monitor::begin_request`] logs `REQUEST_START` and returns an
//! [`InFlightRequest`]. The HTTP layer calls [`InFlightRequest::finish`] once
//! the response status is final. A guard dropped without finishing (client
//! went away, handler panicked) is counted once as a failed request with
//! status [`ABORTED_STATUS`].

use crate::monitor::Monitor;
use std::time::{Duration, Instant};

/// Status recorded for requests whose response was never produced
pub const ABORTED_STATUS: u16 = 499;

/// What the HTTP layer knows about a request at entry
#[derive(Debug, Clone, Default)]
pub struct RequestInfo {
    pub method: String,
    pub path: String,
    pub remote_addr: Option<String>,
    pub user_agent: Option<String>,
}

/// Guard for a request whose response has not been finalised yet
#[derive(Debug)]
pub struct InFlightRequest {
    monitor: Monitor,
    endpoint: String,
    started: Instant,
    finished: bool,
}

impl InFlightRequest {
    pub(crate) fn new(monitor: Monitor, endpoint: String) -> Self {
        Self {
            monitor,
            endpoint,
            started: Instant::now(),
            finished: false,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Record the finalised response and return the measured latency
    pub fn finish(mut self, status_code: u16) -> Duration {
        let latency = self.elapsed();
        self.finished = true;
        self.monitor
            .on_response_sent(&self.endpoint, status_code, latency);
        latency
    }
}

impl Drop for InFlightRequest {
    fn drop(&mut self) {
        if !self.finished {
            self.monitor
                .record_aborted_request(&self.endpoint, self.elapsed());
        }
    }
}
