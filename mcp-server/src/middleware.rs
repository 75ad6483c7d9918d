//! Request instrumentation middleware
//!
//! Wraps every inbound request so that each one is recorded exactly once:
//! `REQUEST_START` on entry, then either the finalized status or, if the
//! handler future is dropped first, an aborted request.
//!
//! Requests are keyed by their route template so that per-endpoint counters
//! stay bounded by the router rather than by what callers send.

use axum::{
    Router,
    extract::{ConnectInfo, MatchedPath, Request, State},
    http::header::USER_AGENT,
    middleware::{self, Next},
    response::Response,
};
use mcp_agent_monitoring::{Monitor, RequestInfo};
use std::net::SocketAddr;
use tracing::debug;

/// Endpoint key for requests that matched no route
pub const UNMATCHED_ROUTE: &str = "<unmatched>";

/// Axum middleware recording request start, status and latency
pub async fn instrument_requests(
    State(monitor): State<Monitor>,
    request: Request,
    next: Next,
) -> Response {
    let info = request_info(&request);
    let in_flight = monitor.begin_request(info);

    let response = next.run(request).await;

    let status = response.status().as_u16();
    let latency = in_flight.finish(status);
    let latency_ms = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX);
    debug!(status, latency_ms, "Request completed");
    response
}

/// Apply [`instrument_requests`] to every route currently in `router`
pub fn instrument<S>(router: Router<S>, monitor: Monitor) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    router.layer(middleware::from_fn_with_state(monitor, instrument_requests))
}

fn request_info(request: &Request) -> RequestInfo {
    RequestInfo {
        method: request.method().to_string(),
        path: request
            .extensions()
            .get::<MatchedPath>()
            .map_or(UNMATCHED_ROUTE, MatchedPath::as_str)
            .to_string(),
        remote_addr: request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.to_string()),
        user_agent: request
            .headers()
            .get(USER_AGENT)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string),
    }
}
