//! Integration tests for the pull endpoints against a running agent

use crate::test_utils::*;
use mcp_agent_monitoring::MonitoringConfig;
use serde_json::{Value, json};

async fn get_json(client: &reqwest::Client, url: String) -> anyhow::Result<Value> {
    Ok(client.get(url).send().await?.json().await?)
}

#[tokio::test]
async fn test_chat_traffic_shows_up_in_snapshot() -> anyhow::Result<()> {
    let agent = spawn_agent(test_monitoring_config()).await?;
    let client = reqwest::Client::new();

    for message in ["hello", "search rust", "search tokio"] {
        let reply: Value = client
            .post(agent.url("/chat"))
            .json(&json!({ "message": message }))
            .send()
            .await?
            .json()
            .await?;
        assert_eq!(reply["reply"], format!("echo: {message}"));
    }

    let metrics = get_json(&client, agent.url("/metrics")).await?;
    assert_eq!(metrics["requests"]["total"], 3);
    assert_eq!(metrics["requests"]["successful"], 3);
    assert_eq!(metrics["requests"]["byEndpoint"]["/chat"]["count"], 3);
    assert_eq!(metrics["mcp"]["calls"], 2);
    assert_eq!(metrics["mcp"]["tools"]["search"]["successful"], 2);
    assert_eq!(metrics["model"]["calls"], 3);
    assert_eq!(metrics["model"]["warmup"], true);
    assert_eq!(metrics["mcpSuccessRate"], 100);
    assert_eq!(metrics["health"]["status"], "warning");
    assert_eq!(metrics["health"]["components"]["model"], "healthy");
    assert_eq!(metrics["health"]["components"]["app"], "unknown");
    Ok(())
}

#[tokio::test]
async fn test_request_start_carries_caller_address() -> anyhow::Result<()> {
    let agent = spawn_agent(test_monitoring_config()).await?;
    let client = reqwest::Client::new();
    client
        .get(agent.url("/ping"))
        .header("user-agent", "integration/1.0")
        .send()
        .await?;

    let records = agent.monitor.recent_activity(10);
    let start = records
        .iter()
        .find(|r| r.kind.as_str() == "REQUEST_START")
        .ok_or_else(|| anyhow::anyhow!("no REQUEST_START record"))?;
    assert_eq!(start.data["endpoint"], "/ping");
    assert_eq!(start.data["userAgent"], "integration/1.0");
    assert!(
        start.data["ip"]
            .as_str()
            .unwrap_or_default()
            .starts_with("127.0.0.1")
    );
    Ok(())
}

#[tokio::test]
async fn test_activity_limit_and_reset() -> anyhow::Result<()> {
    let agent = spawn_agent(MonitoringConfig {
        activity_capacity: 30,
        ..test_monitoring_config()
    })
    .await?;
    let client = reqwest::Client::new();

    for _ in 0..20 {
        client.get(agent.url("/ping")).send().await?;
    }

    // 20 requests produce 40 records, trimmed to capacity
    assert_eq!(agent.monitor.recent_activity(100).len(), 30);

    let limited = get_json(&client, agent.url("/activity?limit=4")).await?;
    assert_eq!(limited.as_array().map(Vec::len), Some(4));

    let fallback = get_json(&client, agent.url("/activity?limit=nope")).await?;
    assert_eq!(fallback.as_array().map(Vec::len), Some(30));

    let reset = client.post(agent.url("/monitoring/reset")).send().await?;
    assert!(reset.status().is_success());
    let body: Value = reset.json().await?;
    assert_eq!(body["message"], "Monitoring metrics reset");

    let records = agent.monitor.recent_activity(100);
    let kinds: Vec<&str> = records.iter().map(|r| r.kind.as_str()).collect();
    assert_eq!(kinds, vec!["METRICS_RESET", "REQUEST_END"]);
    Ok(())
}

#[tokio::test]
async fn test_health_goes_unavailable_on_transport_failure() -> anyhow::Result<()> {
    let agent = spawn_agent(test_monitoring_config()).await?;
    let client = reqwest::Client::new();

    let starting = client.get(agent.url("/health")).send().await?;
    assert_eq!(starting.status().as_u16(), 200);
    let body: Value = starting.json().await?;
    assert_eq!(body["status"], "starting");

    let failed = client.post(agent.url("/weather")).send().await?;
    assert_eq!(failed.status().as_u16(), 502);

    let unhealthy = client.get(agent.url("/health")).send().await?;
    assert_eq!(unhealthy.status().as_u16(), 503);
    let body: Value = unhealthy.json().await?;
    assert_eq!(body["status"], "error");
    assert_eq!(body["components"]["mcp"]["details"]["tool"], "weather");
    assert_eq!(
        body["components"]["mcp"]["details"]["error"],
        "connection refused"
    );
    assert_eq!(body["monitoring"]["mcp"]["failed"], 1);

    // A later success flips the component back
    client
        .post(agent.url("/chat"))
        .json(&json!({ "message": "search again" }))
        .send()
        .await?;
    let recovered = client.get(agent.url("/health")).send().await?;
    assert_eq!(recovered.status().as_u16(), 200);
    Ok(())
}

#[tokio::test]
async fn test_prometheus_export_over_http() -> anyhow::Result<()> {
    let agent = spawn_agent(test_monitoring_config()).await?;
    let client = reqwest::Client::new();
    client.get(agent.url("/ping")).send().await?;

    let response = client.get(agent.url("/metrics/prometheus")).send().await?;
    assert!(response.status().is_success());
    let text = response.text().await?;
    assert!(text.contains("agent_endpoint_requests_total{endpoint=\"/ping\"} 1"));
    assert!(text.contains("agent_uptime_seconds"));
    Ok(())
}
