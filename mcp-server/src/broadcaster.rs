//! Live fan-out of monitor events to connected subscribers
//!
//! Each subscriber gets its own pump task that forwards monitor events and
//! pushes a periodic snapshot. The task owns the subscriber's timer and is
//! the only place that removes the subscriber from the registry.

use chrono::{DateTime, Utc};
use mcp_agent_monitoring::events::RecvError;
use mcp_agent_monitoring::{EventFilter, EventSubscription, MetricsSnapshot, Monitor, MonitorEvent};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Snapshot message flavours
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotKind {
    /// Sent once, right after subscribing
    Metrics,
    /// Sent on every interval tick and after a lag resync
    MetricsUpdate,
}

/// One message on a live channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChannelMessage {
    Snapshot {
        #[serde(rename = "type")]
        kind: SnapshotKind,
        data: Box<MetricsSnapshot>,
    },
    Event(MonitorEvent),
}

impl ChannelMessage {
    pub fn metrics(snapshot: MetricsSnapshot) -> Self {
        Self::Snapshot {
            kind: SnapshotKind::Metrics,
            data: Box::new(snapshot),
        }
    }

    pub fn metrics_update(snapshot: MetricsSnapshot) -> Self {
        Self::Snapshot {
            kind: SnapshotKind::MetricsUpdate,
            data: Box::new(snapshot),
        }
    }

    /// Value of the `type` field on the wire
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Snapshot {
                kind: SnapshotKind::Metrics,
                ..
            } => "metrics",
            Self::Snapshot {
                kind: SnapshotKind::MetricsUpdate,
                ..
            } => "metrics_update",
            Self::Event(event) => event.kind.as_str(),
        }
    }
}

/// Registry entry for a connected subscriber
#[derive(Debug, Clone)]
pub struct SubscriberInfo {
    pub id: Uuid,
    pub connected_at: DateTime<Utc>,
}

type Registry = Arc<Mutex<HashMap<Uuid, SubscriberInfo>>>;

/// Receiving end handed to a transport (e.g. a WebSocket task).
///
/// Dropping it disconnects the subscriber.
#[derive(Debug)]
pub struct Subscription {
    id: Uuid,
    receiver: mpsc::UnboundedReceiver<ChannelMessage>,
}

impl Subscription {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Next message, or `None` once the pump has stopped
    pub async fn recv(&mut self) -> Option<ChannelMessage> {
        self.receiver.recv().await
    }

    pub fn try_recv(&mut self) -> Option<ChannelMessage> {
        self.receiver.try_recv().ok()
    }
}

/// Publish/subscribe hub between a [`Monitor`] and live observers
#[derive(Debug, Clone)]
pub struct EventBroadcaster {
    monitor: Monitor,
    interval: Duration,
    subscribers: Registry,
}

impl EventBroadcaster {
    /// Uses the monitor's configured snapshot interval
    pub fn new(monitor: Monitor) -> Self {
        let interval = Duration::from_millis(monitor.config().snapshot_interval_ms.max(1));
        Self::with_interval(monitor, interval)
    }

    pub fn with_interval(monitor: Monitor, interval: Duration) -> Self {
        Self {
            monitor,
            interval: interval.max(Duration::from_millis(1)),
            subscribers: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn monitor(&self) -> &Monitor {
        &self.monitor
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Register a subscriber.
    ///
    /// The first message queued is a full `metrics` snapshot; every monitor
    /// event published after this call follows. Must be called from within
    /// a Tokio runtime.
    pub fn subscribe(&self) -> Subscription {
        let id = Uuid::new_v4();
        let (tx, receiver) = mpsc::unbounded_channel();

        // Subscribe before taking the snapshot so nothing falls in between
        let events = self.monitor.subscribe(EventFilter::all());
        let _ = tx.send(ChannelMessage::metrics(self.monitor.snapshot()));

        let count = {
            let mut subscribers = self.registry();
            subscribers.insert(
                id,
                SubscriberInfo {
                    id,
                    connected_at: Utc::now(),
                },
            );
            subscribers.len()
        };
        info!(subscriber = %id, active = count, "Subscriber connected");

        tokio::spawn(pump(
            self.monitor.clone(),
            events,
            tx,
            self.interval,
            id,
            Arc::clone(&self.subscribers),
        ));

        Subscription { id, receiver }
    }

    pub fn active_subscribers(&self) -> usize {
        self.registry().len()
    }

    pub fn subscribers(&self) -> Vec<SubscriberInfo> {
        self.registry().values().cloned().collect()
    }

    pub fn is_subscribed(&self, id: Uuid) -> bool {
        self.registry().contains_key(&id)
    }

    fn registry(&self) -> MutexGuard<'_, HashMap<Uuid, SubscriberInfo>> {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

async fn pump(
    monitor: Monitor,
    mut events: EventSubscription,
    tx: mpsc::UnboundedSender<ChannelMessage>,
    period: Duration,
    id: Uuid,
    subscribers: Registry,
) {
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        let message = tokio::select! {
            biased;
            _ = tx.closed() => break,
            event = events.recv() => match event {
                Ok(event) => ChannelMessage::Event(event),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(subscriber = %id, skipped, "Subscriber lagged, resending snapshot");
                    ChannelMessage::metrics_update(monitor.snapshot())
                }
                Err(RecvError::Closed) => break,
            },
            _ = ticker.tick() => ChannelMessage::metrics_update(monitor.snapshot()),
        };

        if tx.send(message).is_err() {
            break;
        }
    }

    let remaining = {
        let mut registry = subscribers.lock().unwrap_or_else(PoisonError::into_inner);
        registry.remove(&id);
        registry.len()
    };
    info!(subscriber = %id, active = remaining, "Subscriber disconnected");
}

/// Forward every monitor event to `tracing` at debug level.
///
/// The task ends once every handle to the monitor is gone.
pub fn spawn_event_logger(monitor: &Monitor) -> JoinHandle<()> {
    let mut events = monitor.subscribe(EventFilter::all());
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => debug!(
                    event = event.kind.as_str(),
                    timestamp = event.timestamp,
                    data = %event.data,
                    "Monitor event"
                ),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Event logger lagged behind the monitor")
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}
