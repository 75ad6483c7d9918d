//! Unit tests for the monitor facade

#[cfg(test)]
mod tests {
    use super::super::*;
    use serde_json::json;
    use std::time::Duration;

    fn monitor() -> Monitor {
        Monitor::new(MonitoringConfig::default())
    }

    fn request(path: &str) -> RequestInfo {
        RequestInfo {
            method: "POST".to_string(),
            path: path.to_string(),
            remote_addr: Some("127.0.0.1:5000".to_string()),
            user_agent: Some("test-agent".to_string()),
        }
    }

    #[test]
    fn test_new_monitor_is_empty() {
        let monitor = monitor();
        let snapshot = monitor.snapshot();

        assert_eq!(snapshot.counters.requests.total, 0);
        assert!(snapshot.recent_activity.is_empty());
        assert_eq!(snapshot.health.status, OverallStatus::Starting);
        assert_eq!(snapshot.health.components.len(), 3);
    }

    #[test]
    fn test_instances_are_independent() {
        let a = monitor();
        let b = monitor();
        a.on_response_sent("/chat", 200, Duration::from_millis(5));

        assert_eq!(a.snapshot().counters.requests.total, 1);
        assert_eq!(b.snapshot().counters.requests.total, 0);
    }

    #[test]
    fn test_clones_share_state() {
        let a = monitor();
        let b = a.clone();
        b.on_response_sent("/chat", 200, Duration::from_millis(5));

        assert_eq!(a.snapshot().counters.requests.total, 1);
    }

    #[test]
    fn test_request_guard_records_start_and_end() {
        let monitor = monitor();
        let guard = monitor.begin_request(request("/chat"));
        assert_eq!(guard.endpoint(), "/chat");
        guard.finish(201);

        let snapshot = monitor.snapshot();
        assert_eq!(snapshot.counters.requests.total, 1);
        assert_eq!(snapshot.counters.requests.successful, 1);
        assert_eq!(snapshot.counters.requests.by_endpoint["/chat"].count, 1);

        let records = monitor.recent_activity(10);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].kind, ActivityKind::RequestStart);
        assert_eq!(records[0].data["method"], "POST");
        assert_eq!(records[0].data["ip"], "127.0.0.1:5000");
        assert_eq!(records[0].data["userAgent"], "test-agent");
        assert_eq!(records[1].kind, ActivityKind::RequestEnd);
        assert_eq!(records[1].data["statusCode"], 201);
        assert_eq!(records[1].data["success"], true);
        assert!(records[1].data.get("aborted").is_none());
    }

    #[test]
    fn test_dropped_request_counts_once_as_failed() {
        let monitor = monitor();
        {
            let _guard = monitor.begin_request(request("/chat"));
        }

        let snapshot = monitor.snapshot();
        assert_eq!(snapshot.counters.requests.total, 1);
        assert_eq!(snapshot.counters.requests.failed, 1);
        assert_eq!(snapshot.counters.requests.successful, 0);

        let end = monitor
            .recent_activity(10)
            .into_iter()
            .find(|r| r.kind == ActivityKind::RequestEnd)
            .unwrap();
        assert_eq!(end.data["statusCode"], ABORTED_STATUS);
        assert_eq!(end.data["aborted"], true);
    }

    #[test]
    fn test_finished_request_is_not_counted_again_on_drop() {
        let monitor = monitor();
        let guard = monitor.begin_request(request("/chat"));
        guard.finish(200);

        let requests = monitor.snapshot().counters.requests;
        assert_eq!(requests.total, 1);
        assert_eq!(requests.failed, 0);
    }

    #[test]
    fn test_empty_path_is_bucketed_as_root() {
        let monitor = monitor();
        monitor.on_response_sent("", 404, Duration::from_millis(1));

        let requests = monitor.snapshot().counters.requests;
        assert_eq!(requests.by_endpoint["/"].count, 1);
        assert_eq!(requests.failed, 1);
    }

    #[test]
    fn test_snapshot_embeds_last_twenty_records() {
        let monitor = monitor();
        for i in 0..30 {
            monitor.log_activity("TICK", json!({ "i": i })).unwrap();
        }

        let snapshot = monitor.snapshot();
        assert_eq!(snapshot.recent_activity.len(), 20);
        assert_eq!(snapshot.recent_activity[0].data["i"], 10);
        assert_eq!(snapshot.recent_activity[19].data["i"], 29);
    }

    #[test]
    fn test_activity_log_is_bounded_through_monitor() {
        let monitor = Monitor::new(MonitoringConfig {
            activity_capacity: 10,
            ..Default::default()
        });
        for i in 0..25 {
            monitor.log_activity("TICK", json!({ "i": i })).unwrap();
        }

        let records = monitor.recent_activity(100);
        assert_eq!(records.len(), 10);
        assert_eq!(records[0].data["i"], 15);
        assert!(records.windows(2).all(|w| w[0].id < w[1].id));
    }

    #[test]
    fn test_reset_clears_everything_and_logs_once() {
        let monitor = monitor();
        monitor.on_response_sent("/chat", 200, Duration::from_millis(5));
        let call = monitor.track_tool_call("search", &json!({}));
        call.finish(CallOutcome::Success, None).unwrap();
        let model = monitor.track_model_call("gemma", "hi");
        model.finish(CallOutcome::Success, None).unwrap();
        monitor.update_health("app", ComponentStatus::Healthy, json!({}));

        monitor.reset();

        let snapshot = monitor.snapshot();
        assert_eq!(snapshot.counters.requests, RequestMetrics::default());
        assert_eq!(snapshot.counters.mcp, McpMetrics::default());
        assert_eq!(snapshot.counters.model, ModelMetrics::default());
        assert_eq!(snapshot.health.status, OverallStatus::Starting);
        assert!(snapshot.health.last_check.is_none());
        assert!(
            snapshot
                .health
                .components
                .values()
                .all(|s| *s == ComponentStatus::Unknown)
        );

        let records = monitor.recent_activity(100);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].kind, ActivityKind::MetricsReset);
    }

    #[test]
    fn test_update_health_logs_record() {
        let monitor = monitor();
        monitor.update_health("app", ComponentStatus::Healthy, json!({"model": "gemma"}));

        let record = monitor.recent_activity(1).pop().unwrap();
        assert_eq!(record.kind, ActivityKind::HealthUpdate);
        assert_eq!(record.data["component"], "app");
        assert_eq!(record.data["status"], "healthy");
        assert_eq!(record.data["overall"], "warning");
        assert_eq!(record.data["details"]["model"], "gemma");
    }

    #[tokio::test]
    async fn test_events_follow_mutation_order() {
        let monitor = monitor();
        let mut events = monitor.subscribe(EventFilter::only([
            EventKind::RequestCompleted,
            EventKind::McpCallCompleted,
            EventKind::HealthUpdated,
        ]));

        monitor.on_response_sent("/chat", 200, Duration::from_millis(3));
        let call = monitor.track_tool_call("search", &json!({}));
        call.complete(CallOutcome::Success, Duration::from_millis(7), None)
            .unwrap();

        let first = events.recv().await.unwrap();
        assert_eq!(first.kind, EventKind::RequestCompleted);
        assert_eq!(first.data["endpoint"], "/chat");
        assert_eq!(first.data["responseTime"], 3);

        let second = events.recv().await.unwrap();
        assert_eq!(second.kind, EventKind::McpCallCompleted);
        assert_eq!(second.data["tool"], "search");
        assert_eq!(second.data["success"], true);

        let third = events.recv().await.unwrap();
        assert_eq!(third.kind, EventKind::HealthUpdated);
        assert_eq!(third.data["component"], "mcp");

        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_activity_events_carry_records() {
        let monitor = monitor();
        let mut events = monitor.subscribe(EventFilter::only([EventKind::Activity]));

        let record = monitor.log_activity("SERVER_START", json!({"port": 3000})).unwrap();

        let event = events.recv().await.unwrap();
        assert_eq!(event.kind, EventKind::Activity);
        assert_eq!(event.data["id"], record.id);
        assert_eq!(event.data["type"], "SERVER_START");
    }

    #[tokio::test]
    async fn test_subscription_only_sees_later_events() {
        let monitor = monitor();
        monitor.log_activity("BEFORE", json!({})).unwrap();
        let mut events = monitor.subscribe(EventFilter::all());
        assert!(events.try_recv().is_err());

        monitor.log_activity("AFTER", json!({})).unwrap();
        let event = events.recv().await.unwrap();
        assert_eq!(event.data["type"], "AFTER");
    }

    #[test]
    fn test_subscriber_count() {
        let monitor = monitor();
        assert_eq!(monitor.subscriber_count(), 0);
        let sub = monitor.subscribe(EventFilter::all());
        assert_eq!(monitor.subscriber_count(), 1);
        drop(sub);
        assert_eq!(monitor.subscriber_count(), 0);
    }

    #[test]
    fn test_concurrent_tracking_keeps_invariants() {
        let monitor = monitor();
        let threads: Vec<_> = (0..8)
            .map(|t| {
                let monitor = monitor.clone();
                std::thread::spawn(move || {
                    for i in 0..50 {
                        let status = if (t + i) % 3 == 0 { 500 } else { 200 };
                        monitor.on_response_sent("/chat", status, Duration::from_millis(1));
                        let call = monitor.track_tool_call("search", &json!({}));
                        let outcome = if i % 2 == 0 {
                            CallOutcome::Success
                        } else {
                            CallOutcome::ApplicationError
                        };
                        call.finish(outcome, None).unwrap();
                    }
                })
            })
            .collect();
        for thread in threads {
            thread.join().unwrap();
        }

        let snapshot = monitor.snapshot();
        let requests = &snapshot.counters.requests;
        assert_eq!(requests.total, 400);
        assert_eq!(requests.successful + requests.failed, requests.total);
        assert_eq!(requests.by_endpoint["/chat"].count, 400);

        let mcp = &snapshot.counters.mcp;
        assert_eq!(mcp.calls, 400);
        assert_eq!(mcp.successful, 200);
        assert_eq!(mcp.failed, 200);
        assert_eq!(monitor.recent_activity(1000).len(), 100);
    }

    #[test]
    fn test_reserved_activity_names_are_rejected() {
        let monitor = monitor();
        let mut events = monitor.subscribe(EventFilter::all());

        for name in ["REQUEST_END", "MCP_CALL_END", "METRICS_RESET"] {
            let err = monitor
                .log_activity(name, json!({ "statusCode": 200 }))
                .unwrap_err();
            assert!(matches!(err, MonitorError::ReservedActivity(ref n) if n == name));
        }

        let snapshot = monitor.snapshot();
        assert_eq!(snapshot.counters.requests.total, 0);
        assert!(monitor.recent_activity(10).is_empty());
        assert!(events.try_recv().is_err());

        let record = monitor.log_activity("MCP_CONNECT_START", json!({})).unwrap();
        assert_eq!(record.kind.as_str(), "MCP_CONNECT_START");
    }

    #[test]
    fn test_endpoint_keys_are_bounded_through_monitor() {
        let monitor = Monitor::new(MonitoringConfig {
            endpoint_limit: 10,
            ..Default::default()
        });
        for i in 0..1_000 {
            monitor.on_response_sent(&format!("/scan/{i}"), 404, Duration::from_millis(1));
        }

        let requests = monitor.snapshot().counters.requests;
        assert_eq!(requests.total, 1_000);
        assert_eq!(requests.by_endpoint.len(), 11);
        assert_eq!(requests.by_endpoint[OVERFLOW_ENDPOINT].count, 990);
    }

    #[test]
    fn test_oversized_event_buffer_is_clamped() {
        let monitor = Monitor::new(MonitoringConfig {
            event_buffer: usize::MAX,
            ..Default::default()
        });
        let mut events = monitor.subscribe(EventFilter::all());

        monitor.on_response_sent("/chat", 200, Duration::from_millis(1));
        assert!(events.try_recv().is_ok());
    }
}
