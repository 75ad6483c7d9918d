//! WebSocket transport for the live channel

use crate::broadcaster::{EventBroadcaster, Subscription};
use axum::{
    Router,
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
    routing::get,
};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tracing::{debug, warn};

/// Handler for `GET /ws`
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(broadcaster): State<Arc<EventBroadcaster>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, broadcaster))
}

async fn handle_socket(socket: WebSocket, broadcaster: Arc<EventBroadcaster>) {
    let subscription = broadcaster.subscribe();
    let id = subscription.id();
    let (sender, mut receiver) = socket.split();

    let mut send_task = tokio::spawn(forward(subscription, sender));

    let mut recv_task = tokio::spawn(async move {
        while let Some(message) = receiver.next().await {
            match message {
                Ok(Message::Close(_)) => break,
                Ok(_) => {}
                Err(e) => {
                    warn!(subscriber = %id, "WebSocket receive error: {}", e);
                    break;
                }
            }
        }
    });

    // Whichever side finishes first tears down the other; dropping the
    // subscription stops the pump and its timer.
    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }
    debug!(subscriber = %id, "WebSocket closed");
}

async fn forward(
    mut subscription: Subscription,
    mut sender: futures::stream::SplitSink<WebSocket, Message>,
) {
    let id = subscription.id();
    while let Some(message) = subscription.recv().await {
        let text = match serde_json::to_string(&message) {
            Ok(text) => text,
            Err(e) => {
                warn!(subscriber = %id, "Failed to serialize {}: {}", message.type_name(), e);
                continue;
            }
        };
        if let Err(e) = sender.send(Message::Text(text)).await {
            warn!(subscriber = %id, "WebSocket send error: {}", e);
            break;
        }
    }
}

/// Router exposing `GET /ws`
pub fn create_websocket_router(broadcaster: Arc<EventBroadcaster>) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .with_state(broadcaster)
}
