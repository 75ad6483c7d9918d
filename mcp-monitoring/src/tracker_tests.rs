//! Unit tests for call tracking handles

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::tracker::{summarize, truncate_chars};
    use serde_json::json;
    use std::time::Duration;

    fn monitor() -> Monitor {
        Monitor::new(MonitoringConfig::default())
    }

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn test_search_scenario() {
        let monitor = monitor();
        let handles: Vec<CallHandle> = (0..5)
            .map(|i| monitor.track_tool_call("search", &json!({ "query": i })))
            .collect();

        for (handle, latency) in handles.iter().take(3).zip([10, 20, 30]) {
            handle
                .complete(CallOutcome::Success, ms(latency), Some(&json!({"hits": 1})))
                .unwrap();
        }
        for (handle, latency) in handles.iter().skip(3).zip([5, 15]) {
            handle
                .complete(CallOutcome::ApplicationError, ms(latency), None)
                .unwrap();
        }

        let snapshot = monitor.snapshot();
        let mcp = &snapshot.counters.mcp;
        assert_eq!((mcp.calls, mcp.successful, mcp.failed), (5, 3, 2));
        assert_eq!(
            mcp.tools["search"],
            ToolStats {
                count: 5,
                successful: 3,
                failed: 2,
                total_time: 80,
            }
        );
    }

    #[test]
    fn test_double_completion_first_wins() {
        let monitor = monitor();
        let handle = monitor.track_tool_call("search", &json!({}));

        handle.complete(CallOutcome::Success, ms(10), None).unwrap();
        let err = handle
            .complete(CallOutcome::TransportError, ms(99), None)
            .unwrap_err();

        assert!(matches!(
            err,
            MonitorError::AlreadyCompleted {
                kind: CallKind::Tool,
                ..
            }
        ));
        assert!(handle.is_completed());

        let snapshot = monitor.snapshot();
        assert_eq!(snapshot.counters.mcp.successful, 1);
        assert_eq!(snapshot.counters.mcp.failed, 0);
        assert_eq!(snapshot.counters.mcp.tools["search"].total_time, 10);
        // The rejected completion must not flip health to error
        assert_eq!(snapshot.health.components["mcp"], ComponentStatus::Healthy);
    }

    #[test]
    fn test_never_completed_call_stays_unresolved() {
        let monitor = monitor();
        let resolved = monitor.track_tool_call("search", &json!({}));
        let _stuck = monitor.track_tool_call("search", &json!({}));
        resolved.finish(CallOutcome::Success, None).unwrap();

        let mcp = monitor.snapshot().counters.mcp;
        assert_eq!(mcp.calls, 2);
        assert_eq!(mcp.successful + mcp.failed, 1);
        assert!(mcp.successful + mcp.failed < mcp.calls);
    }

    #[test]
    fn test_dropping_uncompleted_handle_changes_nothing() {
        let monitor = monitor();
        {
            let _handle = monitor.track_model_call("gemma", "hello");
        }

        let model = monitor.snapshot().counters.model;
        assert_eq!(model.calls, 1);
        assert_eq!(model.successful, 0);
        assert_eq!(model.failed, 0);
        assert!(model.response_times.is_empty());
    }

    #[test]
    fn test_outcome_drives_component_health() {
        let monitor = monitor();

        let call = monitor.track_tool_call("search", &json!({}));
        call.finish(CallOutcome::TransportError, None).unwrap();
        assert_eq!(
            monitor.health_report().components["mcp"].status,
            ComponentStatus::Error
        );

        let call = monitor.track_tool_call("search", &json!({}));
        call.finish(CallOutcome::ApplicationError, Some(&json!({"code": -32000})))
            .unwrap();
        let report = monitor.health_report();
        assert_eq!(report.components["mcp"].status, ComponentStatus::Warning);
        assert!(report.components["mcp"].details["lastError"].is_string());

        // A single success restores healthy immediately
        let call = monitor.track_tool_call("search", &json!({}));
        call.finish(CallOutcome::Success, None).unwrap();
        assert_eq!(
            monitor.health_report().components["mcp"].status,
            ComponentStatus::Healthy
        );
    }

    #[test]
    fn test_model_call_updates_model_component_and_warmup() {
        let monitor = monitor();
        let call = monitor.track_model_call("ai/gemma3-qat", "Hello");
        call.complete(CallOutcome::Success, ms(120), Some(&json!("Hi there")))
            .unwrap();

        let snapshot = monitor.snapshot();
        assert!(snapshot.counters.model.warmup);
        assert_eq!(snapshot.counters.model.response_times, vec![120]);
        assert_eq!(snapshot.health.components["model"], ComponentStatus::Healthy);

        let kinds: Vec<ActivityKind> = monitor
            .recent_activity(10)
            .into_iter()
            .map(|r| r.kind)
            .collect();
        assert_eq!(
            kinds,
            vec![
                ActivityKind::ModelCallStart,
                ActivityKind::ModelWarmup,
                ActivityKind::ModelCallEnd,
                ActivityKind::HealthUpdate,
            ]
        );
    }

    #[test]
    fn test_empty_tool_name_uses_unknown_bucket() {
        let monitor = monitor();
        let call = monitor.track_tool_call("  ", &json!({}));
        assert_eq!(call.identity(), "unknown");
        call.finish(CallOutcome::Success, None).unwrap();

        assert_eq!(monitor.snapshot().counters.mcp.tools["unknown"].count, 1);
    }

    #[test]
    fn test_result_summary_is_truncated() {
        let monitor = monitor();
        let long = "x".repeat(1000);
        let call = monitor.track_tool_call("search", &json!({ "q": long }));
        call.finish(CallOutcome::Success, Some(&json!(long))).unwrap();

        let records = monitor.recent_activity(10);
        let start = records
            .iter()
            .find(|r| r.kind == ActivityKind::McpCallStart)
            .unwrap();
        let end = records
            .iter()
            .find(|r| r.kind == ActivityKind::McpCallEnd)
            .unwrap();
        assert_eq!(start.data["params"].as_str().unwrap().chars().count(), 200);
        assert_eq!(end.data["result"].as_str().unwrap().chars().count(), 200);
    }

    #[test]
    fn test_missing_result_is_reported_as_error() {
        let monitor = monitor();
        let call = monitor.track_tool_call("search", &json!({}));
        call.finish(CallOutcome::TransportError, None).unwrap();

        let end = monitor
            .recent_activity(10)
            .into_iter()
            .find(|r| r.kind == ActivityKind::McpCallEnd)
            .unwrap();
        assert_eq!(end.data["result"], "error");
        assert_eq!(end.data["success"], false);
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
        assert_eq!(summarize(&json!({"a": 1}), 3), "{\"a");
        assert_eq!(summarize(&json!("plain"), 10), "plain");
    }

    #[test]
    fn test_outcome_mapping() {
        assert!(CallOutcome::Success.is_success());
        assert!(!CallOutcome::ApplicationError.is_success());
        assert_eq!(
            CallOutcome::ApplicationError.health_status(),
            ComponentStatus::Warning
        );
        assert_eq!(
            CallOutcome::TransportError.health_status(),
            ComponentStatus::Error
        );
        assert_eq!(CallKind::Tool.component(), "mcp");
        assert_eq!(CallKind::Model.component(), "model");
    }
}
