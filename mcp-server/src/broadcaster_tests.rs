//! Tests for live event fan-out

#[cfg(test)]
mod tests {
    use super::super::*;
    use mcp_agent_monitoring::{CallOutcome, EventKind, MonitoringConfig};
    use serde_json::json;
    use std::time::Duration;
    use tokio::time::timeout;

    const WAIT: Duration = Duration::from_secs(2);

    fn broadcaster(interval_ms: u64) -> EventBroadcaster {
        let monitor = Monitor::new(MonitoringConfig::default());
        EventBroadcaster::with_interval(monitor, Duration::from_millis(interval_ms))
    }

    async fn next(subscription: &mut Subscription) -> ChannelMessage {
        timeout(WAIT, subscription.recv())
            .await
            .expect("timed out waiting for a message")
            .expect("subscription closed")
    }

    /// Next message that is not an activity or health event
    async fn next_significant(subscription: &mut Subscription) -> ChannelMessage {
        loop {
            let message = next(subscription).await;
            match &message {
                ChannelMessage::Event(event)
                    if matches!(event.kind, EventKind::Activity | EventKind::HealthUpdated) => {}
                _ => return message,
            }
        }
    }

    async fn wait_for_subscribers(broadcaster: &EventBroadcaster, expected: usize) {
        timeout(WAIT, async {
            while broadcaster.active_subscribers() != expected {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("subscriber count never settled");
    }

    #[tokio::test]
    async fn test_first_message_is_full_snapshot() {
        let broadcaster = broadcaster(10_000);
        broadcaster
            .monitor()
            .on_response_sent("/chat", 200, Duration::from_millis(4));

        let mut subscription = broadcaster.subscribe();
        match next(&mut subscription).await {
            ChannelMessage::Snapshot { kind, data } => {
                assert_eq!(kind, SnapshotKind::Metrics);
                assert_eq!(data.counters.requests.total, 1);
            }
            other => panic!("unexpected first message: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_events_then_periodic_snapshot_in_order() {
        let broadcaster = broadcaster(150);
        let monitor = broadcaster.monitor().clone();
        let mut subscription = broadcaster.subscribe();
        assert_eq!(next(&mut subscription).await.type_name(), "metrics");

        monitor.on_response_sent("/chat", 200, Duration::from_millis(8));
        let call = monitor.track_tool_call("search", &json!({"q": "rust"}));
        call.complete(CallOutcome::Success, Duration::from_millis(10), None)
            .unwrap();

        let first = next_significant(&mut subscription).await;
        assert_eq!(first.type_name(), "request_completed");

        let second = next_significant(&mut subscription).await;
        assert_eq!(second.type_name(), "mcp_call_completed");
        if let ChannelMessage::Event(event) = &second {
            assert_eq!(event.data["tool"], "search");
        }

        match next_significant(&mut subscription).await {
            ChannelMessage::Snapshot { kind, data } => {
                assert_eq!(kind, SnapshotKind::MetricsUpdate);
                assert_eq!(data.counters.requests.total, 1);
                assert_eq!(data.counters.mcp.calls, 1);
                assert_eq!(data.counters.mcp.successful, 1);
            }
            other => panic!("expected metrics_update, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_periodic_snapshots_keep_coming() {
        let broadcaster = broadcaster(20);
        let mut subscription = broadcaster.subscribe();
        assert_eq!(next(&mut subscription).await.type_name(), "metrics");

        for _ in 0..3 {
            assert_eq!(next(&mut subscription).await.type_name(), "metrics_update");
        }
    }

    #[tokio::test]
    async fn test_dropping_subscription_unregisters_once() {
        let broadcaster = broadcaster(20);
        let subscription = broadcaster.subscribe();
        let id = subscription.id();
        assert!(broadcaster.is_subscribed(id));
        assert_eq!(broadcaster.active_subscribers(), 1);
        assert_eq!(broadcaster.monitor().subscriber_count(), 1);

        drop(subscription);
        wait_for_subscribers(&broadcaster, 0).await;
        assert!(!broadcaster.is_subscribed(id));

        // The pump released its monitor subscription too
        timeout(WAIT, async {
            while broadcaster.monitor().subscriber_count() != 0 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_one_disconnect_leaves_others_running() {
        let broadcaster = broadcaster(10_000);
        let gone = broadcaster.subscribe();
        let mut staying = broadcaster.subscribe();
        assert_eq!(broadcaster.subscribers().len(), 2);
        assert_eq!(next(&mut staying).await.type_name(), "metrics");

        drop(gone);
        wait_for_subscribers(&broadcaster, 1).await;

        broadcaster
            .monitor()
            .on_response_sent("/chat", 500, Duration::from_millis(1));
        assert_eq!(
            next_significant(&mut staying).await.type_name(),
            "request_completed"
        );
    }

    #[tokio::test]
    async fn test_lagging_subscriber_gets_resync_snapshot() {
        let monitor = Monitor::new(MonitoringConfig {
            event_buffer: 4,
            ..Default::default()
        });
        let broadcaster = EventBroadcaster::with_interval(monitor.clone(), Duration::from_secs(60));
        let mut subscription = broadcaster.subscribe();

        // The pump cannot run until this test yields, so the ring overflows
        for i in 0..20 {
            monitor.log_activity("TICK", json!({ "i": i })).unwrap();
        }

        assert_eq!(next(&mut subscription).await.type_name(), "metrics");
        match next(&mut subscription).await {
            ChannelMessage::Snapshot { kind, data } => {
                assert_eq!(kind, SnapshotKind::MetricsUpdate);
                let last = data.recent_activity.last().unwrap();
                assert_eq!(last.data["i"], 19);
            }
            other => panic!("expected resync snapshot, got {other:?}"),
        }

        // Remaining buffered events still arrive afterwards
        match next(&mut subscription).await {
            ChannelMessage::Event(event) => assert_eq!(event.kind, EventKind::Activity),
            other => panic!("expected buffered event, got {other:?}"),
        }
    }

    #[test]
    fn test_channel_message_wire_format() {
        let monitor = Monitor::new(MonitoringConfig::default());
        let metrics = serde_json::to_value(ChannelMessage::metrics(monitor.snapshot())).unwrap();
        assert_eq!(metrics["type"], "metrics");
        assert!(metrics["data"]["requests"].is_object());
        assert!(metrics.get("timestamp").is_none());

        let update =
            serde_json::to_value(ChannelMessage::metrics_update(monitor.snapshot())).unwrap();
        assert_eq!(update["type"], "metrics_update");

        let mut events = monitor.subscribe(mcp_agent_monitoring::EventFilter::only([
            EventKind::RequestCompleted,
        ]));
        monitor.on_response_sent("/chat", 200, Duration::from_millis(2));
        let event = events.try_recv().unwrap();
        let wire = serde_json::to_value(ChannelMessage::Event(event)).unwrap();
        assert_eq!(wire["type"], "request_completed");
        assert_eq!(wire["data"]["statusCode"], 200);
        assert!(wire["timestamp"].is_number());

        let parsed: ChannelMessage = serde_json::from_value(wire).unwrap();
        assert_eq!(parsed.type_name(), "request_completed");
    }

    #[tokio::test]
    async fn test_event_logger_stops_with_monitor() {
        let monitor = Monitor::new(MonitoringConfig::default());
        let handle = spawn_event_logger(&monitor);
        assert_eq!(monitor.subscriber_count(), 1);

        monitor.log_activity("SERVER_START", json!({})).unwrap();
        drop(monitor);

        timeout(WAIT, handle).await.unwrap().unwrap();
    }
}
