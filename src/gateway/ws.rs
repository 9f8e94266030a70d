//! WebSocket notification channel. One socket is one subscriber: a
//! `subscribe` command starts (or replaces) its connection worker, closing
//! the socket unsubscribes it.

use crate::events::Notification;
use crate::gateway::AppState;
use crate::source::ConnectOptions;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
enum ClientCommand {
    Subscribe {
        target: String,
        #[serde(default)]
        options: HashMap<String, serde_json::Value>,
    },
    Unsubscribe,
}

pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Pushes queued notifications out to the socket until either side closes.
fn pusher_loop(
    mut rx: mpsc::Receiver<Notification>,
    mut sender: futures_util::stream::SplitSink<WebSocket, Message>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(notification) = rx.recv().await {
            let json = match serde_json::to_string(&notification) {
                Ok(json) => json,
                Err(e) => {
                    log::error!("Failed to encode notification: {}", e);
                    continue;
                }
            };
            if sender.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
    })
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let subscriber_id = Uuid::new_v4().to_string();
    log::info!("Subscriber {} connected", subscriber_id);

    let (sender, mut receiver) = socket.split();
    let (tx, rx) = mpsc::channel::<Notification>(256);
    let pusher = pusher_loop(rx, sender);

    while let Some(Ok(message)) = receiver.next().await {
        let Message::Text(text) = message else {
            continue;
        };
        match serde_json::from_str::<ClientCommand>(&text) {
            Ok(ClientCommand::Subscribe { target, options }) => {
                log::info!("Subscriber {} requests target '{}'", subscriber_id, target);
                if let Err(e) = state.supervisor.subscribe(
                    &subscriber_id,
                    &target,
                    ConnectOptions::from(options),
                    tx.clone(),
                ) {
                    // A failed subscribe surfaces as an immediate disconnect
                    // with the detail in the reason
                    let _ = tx
                        .send(Notification::disconnected(format!("Error: {}", e)))
                        .await;
                }
            }
            Ok(ClientCommand::Unsubscribe) => {
                state.supervisor.unsubscribe(&subscriber_id);
            }
            Err(e) => {
                log::debug!(
                    "Ignoring malformed command from {}: {}",
                    subscriber_id,
                    e
                );
            }
        }
    }

    // Socket gone: implicit unsubscribe
    state.supervisor.unsubscribe(&subscriber_id);
    drop(tx);
    let _ = pusher.await;
    log::info!("Subscriber {} disconnected", subscriber_id);
}
