//! End-to-end scenarios over the live WebSocket channel

use crate::test_utils::*;
use futures::{SinkExt, StreamExt};
use mcp_agent_monitoring::CallOutcome;
use serde_json::{Value, json};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

const WAIT: Duration = Duration::from_secs(5);

async fn next_json(client: &mut Client) -> anyhow::Result<Value> {
    loop {
        let frame = timeout(WAIT, client.next())
            .await?
            .ok_or_else(|| anyhow::anyhow!("channel closed"))??;
        if let Message::Text(text) = frame {
            return Ok(serde_json::from_str(&text)?);
        }
    }
}

/// Skip activity, health and model events
async fn next_significant(client: &mut Client) -> anyhow::Result<Value> {
    loop {
        let message = next_json(client).await?;
        match message["type"].as_str() {
            Some("activity" | "health_updated" | "model_call_completed") => continue,
            _ => return Ok(message),
        }
    }
}

#[tokio::test]
async fn test_subscriber_sees_request_then_tool_call_then_snapshot() -> anyhow::Result<()> {
    let agent = spawn_agent(test_monitoring_config()).await?;
    let (mut client, _) = connect_async(agent.ws_url()).await?;

    let initial = next_json(&mut client).await?;
    assert_eq!(initial["type"], "metrics");
    assert_eq!(initial["data"]["requests"]["total"], 0);

    let http = reqwest::Client::new();
    let response = http.get(agent.url("/ping")).send().await?;
    assert!(response.status().is_success());

    let call = agent
        .monitor
        .track_tool_call("search", &json!({ "query": "rust" }));
    call.complete(CallOutcome::Success, Duration::from_millis(10), None)?;

    let first = next_significant(&mut client).await?;
    assert_eq!(first["type"], "request_completed");
    assert_eq!(first["data"]["endpoint"], "/ping");
    assert_eq!(first["data"]["statusCode"], 200);
    assert!(first["timestamp"].is_number());

    let second = next_significant(&mut client).await?;
    assert_eq!(second["type"], "mcp_call_completed");
    assert_eq!(second["data"]["tool"], "search");
    assert_eq!(second["data"]["success"], true);

    let update = next_significant(&mut client).await?;
    assert_eq!(update["type"], "metrics_update");
    assert_eq!(update["data"]["requests"]["total"], 1);
    assert_eq!(update["data"]["mcp"]["calls"], 1);
    assert_eq!(update["data"]["mcp"]["tools"]["search"]["totalTime"], 10);
    assert_eq!(update["data"]["health"]["components"]["mcp"], "healthy");

    Ok(())
}

#[tokio::test]
async fn test_chat_flow_is_streamed() -> anyhow::Result<()> {
    let agent = spawn_agent(test_monitoring_config()).await?;
    let (mut client, _) = connect_async(agent.ws_url()).await?;
    assert_eq!(next_json(&mut client).await?["type"], "metrics");

    let http = reqwest::Client::new();
    http.post(agent.url("/chat"))
        .json(&json!({ "message": "search for rust crates" }))
        .send()
        .await?;

    let mut kinds = Vec::new();
    while kinds.last().map(String::as_str) != Some("request_completed") {
        let message = next_json(&mut client).await?;
        let kind = message["type"].as_str().unwrap_or_default().to_string();
        if kind == "activity" || kind == "metrics_update" {
            continue;
        }
        kinds.push(kind);
    }

    assert_eq!(
        kinds,
        vec![
            "mcp_call_completed",
            "health_updated",
            "model_call_completed",
            "health_updated",
            "request_completed",
        ]
    );
    Ok(())
}

#[tokio::test]
async fn test_activity_events_carry_records() -> anyhow::Result<()> {
    let agent = spawn_agent(test_monitoring_config()).await?;
    let (mut client, _) = connect_async(agent.ws_url()).await?;
    assert_eq!(next_json(&mut client).await?["type"], "metrics");

    let record = agent
        .monitor
        .log_activity("CONNECTION_ATTEMPT", json!({ "target": "mcp" }))?;

    loop {
        let message = next_json(&mut client).await?;
        if message["type"] == "activity" && message["data"]["type"] == "CONNECTION_ATTEMPT" {
            assert_eq!(message["data"]["id"], record.id);
            assert_eq!(message["data"]["data"]["target"], "mcp");
            break;
        }
    }
    Ok(())
}

#[tokio::test]
async fn test_disconnect_releases_subscriber() -> anyhow::Result<()> {
    let agent = spawn_agent(test_monitoring_config()).await?;
    let (mut client, _) = connect_async(agent.ws_url()).await?;
    assert_eq!(next_json(&mut client).await?["type"], "metrics");
    assert_eq!(agent.broadcaster.active_subscribers(), 1);

    client.close(None).await?;

    let broadcaster = agent.broadcaster.clone();
    wait_for_condition(
        || broadcaster.active_subscribers() == 0,
        WAIT,
        Duration::from_millis(20),
    )
    .await?;

    // The monitor keeps working for everyone else
    let http = reqwest::Client::new();
    http.get(agent.url("/ping")).send().await?;
    assert_eq!(agent.monitor.snapshot().counters.requests.total, 1);
    Ok(())
}

#[tokio::test]
async fn test_several_subscribers_receive_the_same_events() -> anyhow::Result<()> {
    let agent = spawn_agent(test_monitoring_config()).await?;
    let (mut first, _) = connect_async(agent.ws_url()).await?;
    let (mut second, _) = connect_async(agent.ws_url()).await?;
    assert_eq!(next_json(&mut first).await?["type"], "metrics");
    assert_eq!(next_json(&mut second).await?["type"], "metrics");

    let broadcaster = agent.broadcaster.clone();
    wait_for_condition(
        || broadcaster.active_subscribers() == 2,
        WAIT,
        Duration::from_millis(20),
    )
    .await?;

    agent
        .monitor
        .on_response_sent("/external", 204, Duration::from_millis(2));

    for client in [&mut first, &mut second] {
        let message = next_significant(client).await?;
        assert_eq!(message["type"], "request_completed");
        assert_eq!(message["data"]["endpoint"], "/external");
    }

    drop(first);
    wait_for_condition(
        || broadcaster.active_subscribers() == 1,
        WAIT,
        Duration::from_millis(20),
    )
    .await?;

    second.send(Message::Ping(Vec::new())).await?;
    assert_eq!(next_significant(&mut second).await?["type"], "metrics_update");
    Ok(())
}
