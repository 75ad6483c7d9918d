//! Integration tests for the MCP agent monitoring workspace
//!
//! These tests run a real listener with a small simulated agent behind the
//! instrumentation middleware, then observe it through the pull endpoints
//! and the WebSocket channel.

#![allow(clippy::uninlined_format_args)] // Allow traditional format strings in tests

pub mod end_to_end_scenarios;
pub mod monitoring_integration;

/// Common test utilities for integration tests
pub mod test_utils {
    use axum::{
        Json, Router,
        extract::State,
        http::StatusCode,
        routing::{get, post},
    };
    use mcp_agent_monitoring::{CallOutcome, Monitor, MonitoringConfig};
    use mcp_agent_server::{EventBroadcaster, MonitoringServer, ServerConfig};
    use serde_json::{Value, json};
    use std::net::SocketAddr;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::task::JoinHandle;

    /// Monitoring config with a short snapshot interval
    pub fn test_monitoring_config() -> MonitoringConfig {
        MonitoringConfig {
            snapshot_interval_ms: 750,
            ..Default::default()
        }
    }

    /// A running agent with monitoring attached
    pub struct TestAgent {
        pub addr: SocketAddr,
        pub monitor: Monitor,
        pub broadcaster: Arc<EventBroadcaster>,
        handle: JoinHandle<()>,
    }

    impl TestAgent {
        pub fn url(&self, path: &str) -> String {
            format!("http://{}{}", self.addr, path)
        }

        pub fn ws_url(&self) -> String {
            format!("ws://{}/ws", self.addr)
        }
    }

    impl Drop for TestAgent {
        fn drop(&mut self) {
            self.handle.abort();
        }
    }

    /// Stand-in for the agent's dispatch logic: a search tool when the
    /// message asks for one, then a model call
    async fn chat(State(monitor): State<Monitor>, Json(body): Json<Value>) -> Json<Value> {
        let message = body["message"].as_str().unwrap_or_default().to_string();

        if message.contains("search") {
            let call = monitor.track_tool_call("search", &json!({ "query": message }));
            let _ = call.finish(CallOutcome::Success, Some(&json!({ "hits": 3 })));
        }

        let model = monitor.track_model_call("gemma", &message);
        let reply = format!("echo: {message}");
        let _ = model.finish(CallOutcome::Success, Some(&Value::String(reply.clone())));

        Json(json!({ "reply": reply }))
    }

    /// Tool endpoint that is unreachable
    async fn broken_tool(State(monitor): State<Monitor>) -> StatusCode {
        let call = monitor.track_tool_call("weather", &json!({ "city": "Oslo" }));
        let _ = call.finish(
            CallOutcome::TransportError,
            Some(&json!("connection refused")),
        );
        StatusCode::BAD_GATEWAY
    }

    pub fn agent_routes(monitor: Monitor) -> Router {
        Router::new()
            .route("/chat", post(chat))
            .route("/weather", post(broken_tool))
            .route("/ping", get(|| async { "pong" }))
            .with_state(monitor)
    }

    /// Bind an ephemeral port and serve the agent plus monitoring routes
    pub async fn spawn_agent(config: MonitoringConfig) -> anyhow::Result<TestAgent> {
        let monitor = Monitor::try_new(config)?;
        let server = MonitoringServer::new(
            monitor.clone(),
            ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
                ..Default::default()
            },
        )?;
        let broadcaster = Arc::clone(server.broadcaster());
        let listener = server.bind().await?;
        let addr = listener.local_addr()?;

        let routes = agent_routes(monitor.clone());
        let handle = tokio::spawn(async move {
            if let Err(e) = server.serve(listener, routes).await {
                tracing::error!("Test agent stopped: {}", e);
            }
        });

        Ok(TestAgent {
            addr,
            monitor,
            broadcaster,
            handle,
        })
    }

    /// Wait for a condition with timeout
    pub async fn wait_for_condition<F>(
        mut condition: F,
        timeout_duration: Duration,
        check_interval: Duration,
    ) -> anyhow::Result<()>
    where
        F: FnMut() -> bool,
    {
        let start = std::time::Instant::now();
        while start.elapsed() < timeout_duration {
            if condition() {
                return Ok(());
            }
            tokio::time::sleep(check_interval).await;
        }
        anyhow::bail!("Condition timeout")
    }
}
